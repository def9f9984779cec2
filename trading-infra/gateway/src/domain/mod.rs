pub mod connection_state;
pub mod events;
pub mod traits;

pub use connection_state::ConnectionState;
pub use events::{Decoded, WsRequest, WsResponse};
pub use traits::{DecodeError, EventParser, FrameContext, SessionKeyError, SessionKeyProvider};

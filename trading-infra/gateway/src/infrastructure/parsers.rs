use serde_json::Value;
use tracing::debug;
use trading_core::{
    BalanceUpdate, Bbo, ExchangeId, ExchangeMessage, OrderStatus, OrderUpdate, Payload,
    PositionUpdate, Price, PriceLevel, Quantity, Side, Symbol, Timestamp, Trade,
};

use crate::domain::{Decoded, DecodeError, EventParser, FrameContext, WsResponse};

/// Event tag the exchange sends when the session key has lapsed
pub const LISTEN_KEY_EXPIRED: &str = "listenKeyExpired";

/// Frame codec: raw text frame in, [`Decoded`] out
///
/// Stateless apart from the parser registry. Data frames are routed by
/// their embedded `"e"` tag; for combined-stream frames whose payload has
/// no tag (spot book ticker) the suffix of the stream name stands in.
pub struct FrameCodec {
    exchange: ExchangeId,
    parsers: Vec<Box<dyn EventParser>>,
}

impl FrameCodec {
    /// Codec with the default parser set
    pub fn new(exchange: ExchangeId) -> Self {
        Self {
            exchange,
            parsers: vec![
                Box::new(BookTickerParser),
                Box::new(TradeParser),
                Box::new(OrderTradeUpdateParser),
                Box::new(AccountUpdateParser),
            ],
        }
    }

    /// Codec with a custom parser set
    pub fn with_parsers(exchange: ExchangeId, parsers: Vec<Box<dyn EventParser>>) -> Self {
        Self { exchange, parsers }
    }

    pub fn add_parser(&mut self, parser: Box<dyn EventParser>) {
        self.parsers.push(parser);
    }

    pub fn exchange(&self) -> &ExchangeId {
        &self.exchange
    }

    pub fn decode(&self, text: &str, received_at: Timestamp) -> Result<Decoded, DecodeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

        if value.get("e").is_some() {
            return self.route(&value, None, received_at);
        }

        let envelope: WsResponse =
            serde_json::from_value(value).map_err(|_| DecodeError::MissingEventType)?;
        match envelope {
            WsResponse::Result { id, result } => Ok(Decoded::Ack { id, result }),
            WsResponse::Error { id, code, msg } => Ok(Decoded::Rejected { id, code, msg }),
            WsResponse::Stream { stream, data } => self.route(&data, Some(&stream), received_at),
        }
    }

    fn route(
        &self,
        data: &Value,
        stream: Option<&str>,
        received_at: Timestamp,
    ) -> Result<Decoded, DecodeError> {
        let event_type = match data.get("e").and_then(Value::as_str) {
            Some(e) => e,
            None => stream
                .and_then(|s| s.split_once('@'))
                .map(|(_, kind)| kind)
                .ok_or(DecodeError::MissingEventType)?,
        };

        if event_type == LISTEN_KEY_EXPIRED {
            return Ok(Decoded::SessionExpired);
        }

        let Some(parser) = self.parsers.iter().find(|p| p.can_parse(event_type)) else {
            debug!(
                event = %event_type,
                "No parser matched event type"
            );
            return Err(DecodeError::UnknownEvent(event_type.to_string()));
        };

        let ctx = FrameContext {
            exchange: self.exchange.clone(),
            received_at,
        };
        parser.parse(&ctx, data).map(Decoded::Messages)
    }
}

/// `bookTicker` → one BBO
pub struct BookTickerParser;

impl EventParser for BookTickerParser {
    fn can_parse(&self, event_type: &str) -> bool {
        event_type == "bookTicker"
    }

    fn parse(&self, ctx: &FrameContext, data: &Value) -> Result<Vec<ExchangeMessage>, DecodeError> {
        const EVENT: &str = "bookTicker";
        let symbol = str_field(data, EVENT, "s")?;
        let bbo = Bbo {
            bid: PriceLevel::new(price_field(data, EVENT, "b")?, qty_field(data, EVENT, "B")?),
            ask: PriceLevel::new(price_field(data, EVENT, "a")?, qty_field(data, EVENT, "A")?),
        };
        Ok(vec![message(ctx, symbol, Payload::Bbo(bbo))])
    }
}

/// `trade` (spot) and `aggTrade` (futures) → Trade
pub struct TradeParser;

impl EventParser for TradeParser {
    fn can_parse(&self, event_type: &str) -> bool {
        matches!(event_type, "trade" | "aggTrade")
    }

    fn parse(&self, ctx: &FrameContext, data: &Value) -> Result<Vec<ExchangeMessage>, DecodeError> {
        const EVENT: &str = "trade";
        let symbol = str_field(data, EVENT, "s")?;
        let buyer_is_maker = data
            .get("m")
            .and_then(Value::as_bool)
            .ok_or(DecodeError::Field { event: EVENT, field: "m" })?;
        let trade = Trade {
            side: Side::aggressor(buyer_is_maker),
            price: price_field(data, EVENT, "p")?,
            size: qty_field(data, EVENT, "q")?,
            traded_at: millis_field(data, EVENT, "T")?,
        };
        Ok(vec![message(ctx, symbol, Payload::Trade(trade))])
    }
}

/// `ORDER_TRADE_UPDATE` → OrderUpdate
pub struct OrderTradeUpdateParser;

impl EventParser for OrderTradeUpdateParser {
    fn can_parse(&self, event_type: &str) -> bool {
        event_type == "ORDER_TRADE_UPDATE"
    }

    fn parse(&self, ctx: &FrameContext, data: &Value) -> Result<Vec<ExchangeMessage>, DecodeError> {
        const EVENT: &str = "ORDER_TRADE_UPDATE";
        let order = data
            .get("o")
            .filter(|o| o.is_object())
            .ok_or(DecodeError::Field { event: EVENT, field: "o" })?;

        let symbol = str_field(order, EVENT, "s")?;
        let side = Side::from_exchange(str_field(order, EVENT, "S")?)
            .ok_or(DecodeError::Field { event: EVENT, field: "S" })?;
        let exchange_order_id = order
            .get("i")
            .and_then(Value::as_i64)
            .ok_or(DecodeError::Field { event: EVENT, field: "i" })?;

        let update = OrderUpdate {
            client_order_id: str_field(order, EVENT, "c")?.to_string(),
            exchange_order_id: exchange_order_id.to_string(),
            side,
            status: OrderStatus::from_exchange(str_field(order, EVENT, "X")?),
            filled_size: qty_field(order, EVENT, "z")?,
            average_price: price_field(order, EVENT, "ap")?,
            updated_at: millis_field(order, EVENT, "T")?,
        };
        Ok(vec![message(ctx, symbol, Payload::OrderUpdate(update))])
    }
}

/// `ACCOUNT_UPDATE` → one BalanceUpdate per balance, one PositionUpdate per position
pub struct AccountUpdateParser;

impl EventParser for AccountUpdateParser {
    fn can_parse(&self, event_type: &str) -> bool {
        event_type == "ACCOUNT_UPDATE"
    }

    fn parse(&self, ctx: &FrameContext, data: &Value) -> Result<Vec<ExchangeMessage>, DecodeError> {
        const EVENT: &str = "ACCOUNT_UPDATE";
        let account = data
            .get("a")
            .filter(|a| a.is_object())
            .ok_or(DecodeError::Field { event: EVENT, field: "a" })?;

        let mut out = Vec::new();
        for balance in array_field(account, "B") {
            let asset = str_field(balance, EVENT, "a")?;
            let update = BalanceUpdate {
                asset: asset.to_string(),
                balance: qty_field(balance, EVENT, "wb")?,
            };
            out.push(message(ctx, asset, Payload::BalanceUpdate(update)));
        }
        for position in array_field(account, "P") {
            let symbol = str_field(position, EVENT, "s")?;
            let update = PositionUpdate {
                symbol: Symbol::new(symbol),
                amount: qty_field(position, EVENT, "pa")?,
                entry_price: price_field(position, EVENT, "ep")?,
            };
            out.push(message(ctx, symbol, Payload::PositionUpdate(update)));
        }
        Ok(out)
    }
}

fn message(ctx: &FrameContext, symbol: &str, payload: Payload) -> ExchangeMessage {
    ExchangeMessage::new(ctx.exchange.clone(), symbol, ctx.received_at, payload)
}

fn array_field<'a>(data: &'a Value, field: &str) -> impl Iterator<Item = &'a Value> {
    data.get(field)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn str_field<'a>(
    data: &'a Value,
    event: &'static str,
    field: &'static str,
) -> Result<&'a str, DecodeError> {
    data.get(field)
        .and_then(Value::as_str)
        .ok_or(DecodeError::Field { event, field })
}

fn price_field(data: &Value, event: &'static str, field: &'static str) -> Result<Price, DecodeError> {
    Price::parse(str_field(data, event, field)?)
        .map_err(|source| DecodeError::Decimal { event, field, source })
}

fn qty_field(data: &Value, event: &'static str, field: &'static str) -> Result<Quantity, DecodeError> {
    Quantity::parse(str_field(data, event, field)?)
        .map_err(|source| DecodeError::Decimal { event, field, source })
}

fn millis_field(
    data: &Value,
    event: &'static str,
    field: &'static str,
) -> Result<Timestamp, DecodeError> {
    data.get(field)
        .and_then(Value::as_i64)
        .and_then(Timestamp::from_timestamp_millis)
        .ok_or(DecodeError::Field { event, field })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use trading_core::MessageKind;

    fn codec() -> FrameCodec {
        FrameCodec::new(ExchangeId::binance_futures())
    }

    fn messages(decoded: Decoded) -> Vec<ExchangeMessage> {
        match decoded {
            Decoded::Messages(m) => m,
            other => panic!("expected messages, got {other:?}"),
        }
    }

    #[test]
    fn test_book_ticker() {
        let frame = r#"{"e":"bookTicker","u":400900217,"E":1568014460893,"T":1568014460891,
            "s":"BNBUSDT","b":"25.35190000","B":"31.21000000","a":"25.36520000","A":"40.66000000"}"#;
        let now = Utc::now();
        let msgs = messages(codec().decode(frame, now).unwrap());

        assert_eq!(msgs.len(), 1);
        let msg = &msgs[0];
        assert_eq!(msg.symbol.as_str(), "bnbusdt");
        assert_eq!(msg.timestamp, now);
        assert_eq!(msg.exchange, ExchangeId::binance_futures());
        let Payload::Bbo(bbo) = msg.payload else {
            panic!("expected bbo");
        };
        assert_eq!(bbo.bid.price.inner(), dec!(25.35190000));
        assert_eq!(bbo.bid.size.inner(), dec!(31.21));
        assert_eq!(bbo.ask.price.inner(), dec!(25.3652));
        assert_eq!(bbo.ask.size.inner(), dec!(40.66));
    }

    #[test]
    fn test_decimal_strings_stay_exact() {
        let frame = r#"{"e":"bookTicker","s":"BTCUSDT","b":"0.1000000000000000055511",
            "B":"1","a":"0.3","A":"2"}"#;
        let msgs = messages(codec().decode(frame, Utc::now()).unwrap());
        let Payload::Bbo(bbo) = msgs[0].payload else {
            panic!("expected bbo");
        };
        assert_eq!(bbo.bid.price.to_string(), "0.1000000000000000055511");
    }

    #[test]
    fn test_agg_trade_aggressor_side() {
        let sell = r#"{"e":"aggTrade","E":123456789,"s":"BTCUSDT","a":5933014,"p":"27000.10",
            "q":"0.250","f":100,"l":105,"T":123456785,"m":true}"#;
        let msgs = messages(codec().decode(sell, Utc::now()).unwrap());
        let Payload::Trade(trade) = msgs[0].payload else {
            panic!("expected trade");
        };
        assert_eq!(trade.side, Side::Sell);
        assert_eq!(trade.price.inner(), dec!(27000.10));
        assert_eq!(trade.size.inner(), dec!(0.25));
        assert_eq!(trade.traded_at.timestamp_millis(), 123456785);

        let buy = r#"{"e":"trade","E":1,"s":"ETHUSDT","t":12345,"p":"1800","q":"1",
            "T":2,"m":false}"#;
        let msgs = messages(codec().decode(buy, Utc::now()).unwrap());
        assert!(matches!(msgs[0].payload, Payload::Trade(Trade { side: Side::Buy, .. })));
    }

    #[test]
    fn test_order_trade_update() {
        let frame = r#"{"e":"ORDER_TRADE_UPDATE","E":1568879465651,"T":1568879465650,
            "o":{"s":"BTCUSDT","c":"TEST","S":"SELL","o":"LIMIT","f":"GTC","q":"0.001",
                 "p":"9910","ap":"9909.5","X":"PARTIALLY_FILLED","i":8886774,"z":"0.0005",
                 "T":1568879465650}}"#;
        let msgs = messages(codec().decode(frame, Utc::now()).unwrap());
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].kind(), MessageKind::OrderUpdate);
        let Payload::OrderUpdate(update) = &msgs[0].payload else {
            panic!("expected order update");
        };
        assert_eq!(update.client_order_id, "TEST");
        assert_eq!(update.exchange_order_id, "8886774");
        assert_eq!(update.side, Side::Sell);
        assert_eq!(update.status, OrderStatus::PartiallyFilled);
        assert_eq!(update.filled_size.inner(), dec!(0.0005));
        assert_eq!(update.average_price.inner(), dec!(9909.5));
    }

    #[test]
    fn test_expired_order_reads_as_canceled() {
        let frame = r#"{"e":"ORDER_TRADE_UPDATE","o":{"s":"BTCUSDT","c":"x","S":"BUY",
            "X":"EXPIRED","i":1,"z":"0","ap":"0","T":1}}"#;
        let msgs = messages(codec().decode(frame, Utc::now()).unwrap());
        let Payload::OrderUpdate(update) = &msgs[0].payload else {
            panic!("expected order update");
        };
        assert_eq!(update.status, OrderStatus::Canceled);
    }

    #[test]
    fn test_account_update_fans_out() {
        let frame = r#"{"e":"ACCOUNT_UPDATE","E":1564745798939,"T":1564745798938,
            "a":{"m":"ORDER",
                 "B":[{"a":"USDT","wb":"122624.12345678","cw":"100.12345678","bc":"50.12345678"},
                      {"a":"BUSD","wb":"1.00000000","cw":"0","bc":"-49.12345678"}],
                 "P":[{"s":"BTCUSDT","pa":"-0.020","ep":"6563.66500","cr":"0","up":"2.5",
                       "mt":"isolated","iw":"0","ps":"BOTH"}]}}"#;
        let msgs = messages(codec().decode(frame, Utc::now()).unwrap());
        let kinds: Vec<_> = msgs.iter().map(|m| m.kind()).collect();
        assert_eq!(
            kinds,
            vec![MessageKind::BalanceUpdate, MessageKind::BalanceUpdate, MessageKind::PositionUpdate]
        );
        assert_eq!(msgs[0].symbol.as_str(), "usdt");
        let Payload::PositionUpdate(pos) = &msgs[2].payload else {
            panic!("expected position");
        };
        assert!(pos.amount.is_negative());
        assert_eq!(pos.entry_price.inner(), dec!(6563.665));
    }

    #[test]
    fn test_combined_stream_is_unwrapped() {
        let frame = r#"{"stream":"btcusdt@aggTrade","data":{"e":"aggTrade","s":"BTCUSDT",
            "p":"1","q":"2","T":5,"m":false}}"#;
        let msgs = messages(codec().decode(frame, Utc::now()).unwrap());
        assert_eq!(msgs[0].kind(), MessageKind::Trade);
    }

    #[test]
    fn test_untagged_spot_ticker_uses_stream_name() {
        let frame = r#"{"stream":"bnbusdt@bookTicker","data":{"u":400900217,"s":"BNBUSDT",
            "b":"25.35","B":"31.21","a":"25.36","A":"40.66"}}"#;
        let msgs = messages(codec().decode(frame, Utc::now()).unwrap());
        assert_eq!(msgs[0].kind(), MessageKind::Bbo);
    }

    #[test]
    fn test_control_frames() {
        let c = codec();
        assert_eq!(
            c.decode(r#"{"result":null,"id":12}"#, Utc::now()).unwrap(),
            Decoded::Ack { id: 12, result: None }
        );
        assert_eq!(
            c.decode(r#"{"code":2,"msg":"Invalid request","id":13}"#, Utc::now()).unwrap(),
            Decoded::Rejected {
                id: Some(13),
                code: 2,
                msg: "Invalid request".into()
            }
        );
        assert_eq!(
            c.decode(r#"{"e":"listenKeyExpired","E":1576653824250,"listenKey":"abc"}"#, Utc::now())
                .unwrap(),
            Decoded::SessionExpired
        );
    }

    #[test]
    fn test_malformed_frames() {
        let c = codec();
        assert!(matches!(
            c.decode("{not json", Utc::now()),
            Err(DecodeError::InvalidJson(_))
        ));
        assert!(matches!(
            c.decode(r#"{"foo":1}"#, Utc::now()),
            Err(DecodeError::MissingEventType)
        ));
        assert!(matches!(
            c.decode(r#"{"e":"kline","s":"BTCUSDT"}"#, Utc::now()),
            Err(DecodeError::UnknownEvent(e)) if e == "kline"
        ));
        assert!(matches!(
            c.decode(r#"{"e":"bookTicker","s":"BTCUSDT","b":"1","B":"1","a":"1"}"#, Utc::now()),
            Err(DecodeError::Field { field: "A", .. })
        ));
        assert!(matches!(
            c.decode(r#"{"e":"bookTicker","s":"BTCUSDT","b":"1.2.3","B":"1","a":"1","A":"1"}"#, Utc::now()),
            Err(DecodeError::Decimal { field: "b", .. })
        ));
    }

    #[test]
    fn test_codec_extensibility() {
        struct MarkPriceParser;
        impl EventParser for MarkPriceParser {
            fn can_parse(&self, event_type: &str) -> bool {
                event_type == "markPriceUpdate"
            }
            fn parse(
                &self,
                _ctx: &FrameContext,
                _data: &Value,
            ) -> Result<Vec<ExchangeMessage>, DecodeError> {
                Ok(Vec::new())
            }
        }

        let mut c = codec();
        c.add_parser(Box::new(MarkPriceParser));
        assert_eq!(
            c.decode(r#"{"e":"markPriceUpdate","s":"BTCUSDT"}"#, Utc::now()).unwrap(),
            Decoded::Messages(Vec::new())
        );
        // built-ins still work
        assert!(c
            .decode(r#"{"e":"aggTrade","s":"X","p":"1","q":"1","T":1,"m":true}"#, Utc::now())
            .is_ok());
    }
}

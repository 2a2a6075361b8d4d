/// Binary packet format for the incremental multicast feed
///
/// Fixed header: 12 bytes
///   - msg_type: u8 (1 byte)
///   - version: u8 (1 byte)
///   - payload_size: u16 (2 bytes)
///   - packet_sequence: u64 (8 bytes) - monotonically increasing
///
/// All multi-byte fields are little-endian; payloads are packed at fixed
/// offsets after the header.

use byteorder::{ByteOrder, LittleEndian};

pub const HEADER_LEN: usize = 12;
pub const TRADE_PAYLOAD_LEN: usize = 40;
pub const QUOTE_PAYLOAD_LEN: usize = 52;
pub const TRADE_FRAME_LEN: usize = HEADER_LEN + TRADE_PAYLOAD_LEN;
pub const QUOTE_FRAME_LEN: usize = HEADER_LEN + QUOTE_PAYLOAD_LEN;
pub const HEARTBEAT_FRAME_LEN: usize = HEADER_LEN;

pub const PROTOCOL_VERSION: u8 = 1;

/// Prices travel as fixed-point integers: real price * 10_000.
pub const PRICE_SCALE: u64 = 10_000;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Trade = 0x01,
    Quote = 0x02,
    OrderAdd = 0x03,
    OrderDelete = 0x04,
    OrderModify = 0x05,
    Heartbeat = 0xFF,
}

impl MessageType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(MessageType::Trade),
            0x02 => Some(MessageType::Quote),
            0x03 => Some(MessageType::OrderAdd),
            0x04 => Some(MessageType::OrderDelete),
            0x05 => Some(MessageType::OrderModify),
            0xFF => Some(MessageType::Heartbeat),
            _ => None,
        }
    }
}

/// Packet header: [msg_type(1)][version(1)][payload_size(2)][packet_sequence(8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub msg_type: u8,
    pub version: u8,
    pub payload_size: u16,
    pub packet_sequence: u64,
}

impl PacketHeader {
    /// Read a header from the front of `frame`; `None` if too short.
    pub fn read(frame: &[u8]) -> Option<Self> {
        if frame.len() < HEADER_LEN {
            return None;
        }
        Some(PacketHeader {
            msg_type: frame[0],
            version: frame[1],
            payload_size: LittleEndian::read_u16(&frame[2..4]),
            packet_sequence: LittleEndian::read_u64(&frame[4..12]),
        })
    }

    pub fn write(&self, out: &mut [u8]) {
        out[0] = self.msg_type;
        out[1] = self.version;
        LittleEndian::write_u16(&mut out[2..4], self.payload_size);
        LittleEndian::write_u64(&mut out[4..12], self.packet_sequence);
    }
}

/// Trade payload: 40 bytes
/// [ts(8)][seq_num(8)][symbol_id(4)][trade_id(4)][price(8)][qty(4)][side(1)][pad(3)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeFrame {
    pub ts: u64,
    pub seq_num: u64,
    pub symbol_id: u32,
    pub trade_id: u32,
    pub price: u64,
    pub qty: u32,
    pub side: u8,
}

impl TradeFrame {
    /// Read from a payload slice of at least `TRADE_PAYLOAD_LEN` bytes.
    pub fn read_payload(payload: &[u8]) -> Self {
        TradeFrame {
            ts: LittleEndian::read_u64(&payload[0..8]),
            seq_num: LittleEndian::read_u64(&payload[8..16]),
            symbol_id: LittleEndian::read_u32(&payload[16..20]),
            trade_id: LittleEndian::read_u32(&payload[20..24]),
            price: LittleEndian::read_u64(&payload[24..32]),
            qty: LittleEndian::read_u32(&payload[32..36]),
            side: payload[36],
        }
    }

    pub fn write_payload(&self, out: &mut [u8]) {
        LittleEndian::write_u64(&mut out[0..8], self.ts);
        LittleEndian::write_u64(&mut out[8..16], self.seq_num);
        LittleEndian::write_u32(&mut out[16..20], self.symbol_id);
        LittleEndian::write_u32(&mut out[20..24], self.trade_id);
        LittleEndian::write_u64(&mut out[24..32], self.price);
        LittleEndian::write_u32(&mut out[32..36], self.qty);
        out[36] = self.side;
        out[37..40].fill(0);
    }

    /// Encode a complete frame (header + payload).
    pub fn encode(&self, packet_sequence: u64) -> [u8; TRADE_FRAME_LEN] {
        let mut frame = [0u8; TRADE_FRAME_LEN];
        let header = PacketHeader {
            msg_type: MessageType::Trade as u8,
            version: PROTOCOL_VERSION,
            payload_size: TRADE_PAYLOAD_LEN as u16,
            packet_sequence,
        };
        header.write(&mut frame[..HEADER_LEN]);
        self.write_payload(&mut frame[HEADER_LEN..]);
        frame
    }
}

/// Quote payload: 52 bytes
/// [ts(8)][seq_num(8)][symbol_id(4)][bid_px(8)][ask_px(8)][bid_sz(4)][ask_sz(4)][n_levels(1)][pad(7)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteFrame {
    pub ts: u64,
    pub seq_num: u64,
    pub symbol_id: u32,
    pub bid_px: u64,
    pub ask_px: u64,
    pub bid_sz: u32,
    pub ask_sz: u32,
    pub n_levels: u8,
}

impl QuoteFrame {
    /// Read from a payload slice of at least `QUOTE_PAYLOAD_LEN` bytes.
    pub fn read_payload(payload: &[u8]) -> Self {
        QuoteFrame {
            ts: LittleEndian::read_u64(&payload[0..8]),
            seq_num: LittleEndian::read_u64(&payload[8..16]),
            symbol_id: LittleEndian::read_u32(&payload[16..20]),
            bid_px: LittleEndian::read_u64(&payload[20..28]),
            ask_px: LittleEndian::read_u64(&payload[28..36]),
            bid_sz: LittleEndian::read_u32(&payload[36..40]),
            ask_sz: LittleEndian::read_u32(&payload[40..44]),
            n_levels: payload[44],
        }
    }

    pub fn write_payload(&self, out: &mut [u8]) {
        LittleEndian::write_u64(&mut out[0..8], self.ts);
        LittleEndian::write_u64(&mut out[8..16], self.seq_num);
        LittleEndian::write_u32(&mut out[16..20], self.symbol_id);
        LittleEndian::write_u64(&mut out[20..28], self.bid_px);
        LittleEndian::write_u64(&mut out[28..36], self.ask_px);
        LittleEndian::write_u32(&mut out[36..40], self.bid_sz);
        LittleEndian::write_u32(&mut out[40..44], self.ask_sz);
        out[44] = self.n_levels;
        out[45..52].fill(0);
    }

    /// Encode a complete frame (header + payload).
    pub fn encode(&self, packet_sequence: u64) -> [u8; QUOTE_FRAME_LEN] {
        let mut frame = [0u8; QUOTE_FRAME_LEN];
        let header = PacketHeader {
            msg_type: MessageType::Quote as u8,
            version: PROTOCOL_VERSION,
            payload_size: QUOTE_PAYLOAD_LEN as u16,
            packet_sequence,
        };
        header.write(&mut frame[..HEADER_LEN]);
        self.write_payload(&mut frame[HEADER_LEN..]);
        frame
    }
}

/// Encode a heartbeat frame: header only, consumes a sequence number.
pub fn encode_heartbeat(packet_sequence: u64) -> [u8; HEARTBEAT_FRAME_LEN] {
    let mut frame = [0u8; HEARTBEAT_FRAME_LEN];
    let header = PacketHeader {
        msg_type: MessageType::Heartbeat as u8,
        version: PROTOCOL_VERSION,
        payload_size: 0,
        packet_sequence,
    };
    header.write(&mut frame);
    frame
}

/// Convert price from fixed-point to float
pub fn price_from_fixed(fixed: u64) -> f64 {
    fixed as f64 / PRICE_SCALE as f64
}

/// Convert price to fixed-point
pub fn price_to_fixed(price: f64) -> u64 {
    (price * PRICE_SCALE as f64) as u64
}

// Compile-time assertions for wire layout
const _: () = {
    assert!(HEADER_LEN == 12);
    assert!(TRADE_FRAME_LEN == 52);
    assert!(QUOTE_FRAME_LEN == 64);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_conversion() {
        assert_eq!(MessageType::from_u8(0x01), Some(MessageType::Trade));
        assert_eq!(MessageType::from_u8(0x02), Some(MessageType::Quote));
        assert_eq!(MessageType::from_u8(0xFF), Some(MessageType::Heartbeat));
        assert_eq!(MessageType::from_u8(0x99), None);
    }

    #[test]
    fn test_header_round_trip() {
        let header = PacketHeader {
            msg_type: MessageType::Quote as u8,
            version: PROTOCOL_VERSION,
            payload_size: QUOTE_PAYLOAD_LEN as u16,
            packet_sequence: 987_654_321,
        };
        let mut buf = [0u8; HEADER_LEN];
        header.write(&mut buf);
        assert_eq!(PacketHeader::read(&buf), Some(header));
    }

    #[test]
    fn test_header_too_short() {
        assert_eq!(PacketHeader::read(&[0u8; 11]), None);
    }

    #[test]
    fn test_trade_frame_round_trip() {
        let trade = TradeFrame {
            ts: 1_000_000,
            seq_num: 42,
            symbol_id: 7,
            trade_id: 1001,
            price: 101_2500,
            qty: 300,
            side: b'B',
        };
        let frame = trade.encode(42);
        assert_eq!(frame.len(), TRADE_FRAME_LEN);
        assert_eq!(TradeFrame::read_payload(&frame[HEADER_LEN..]), trade);
    }

    #[test]
    fn test_quote_frame_round_trip() {
        let quote = QuoteFrame {
            ts: 2_000_000,
            seq_num: 43,
            symbol_id: 7,
            bid_px: 101_2400,
            ask_px: 101_2600,
            bid_sz: 500,
            ask_sz: 700,
            n_levels: 1,
        };
        let frame = quote.encode(43);
        assert_eq!(frame.len(), QUOTE_FRAME_LEN);
        assert_eq!(QuoteFrame::read_payload(&frame[HEADER_LEN..]), quote);
    }

    #[test]
    fn test_price_conversions() {
        let price = 123.4567;
        let fixed = price_to_fixed(price);
        let back = price_from_fixed(fixed);
        assert!((back - price).abs() < 1e-4);
    }
}

/// Packet decoder
///
/// Normalizes raw feed frames into `Event` records. All reads are at fixed
/// offsets into the frame; nothing is allocated. Sequencing happens before
/// decoding, so a frame that fails here has already consumed its sequence
/// number.

use crate::event::{Event, EventBody};
use crate::protocol::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame too short: need {need} bytes, have {have}")]
    FrameTooShort { need: usize, have: usize },

    #[error("invalid message type: {0:#04x}")]
    InvalidMessageType(u8),

    #[error("truncated payload: declared {declared} bytes, have {have}")]
    TruncatedPayload { declared: u16, have: usize },
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Extract the packet sequence from a frame header without touching the
/// payload. The sequencer needs this before any parse work.
pub fn read_packet_sequence(frame: &[u8]) -> Option<u64> {
    PacketHeader::read(frame).map(|h| h.packet_sequence)
}

/// Decode one frame into a normalized event.
///
/// `Ok(None)` means the frame was well-formed but carries no normalized
/// event: heartbeats and the book-maintenance types consume a sequence
/// number without reaching the consumer.
pub fn decode_event(frame: &[u8], recv_ts: u64) -> DecodeResult<Option<Event>> {
    let header = PacketHeader::read(frame).ok_or(DecodeError::FrameTooShort {
        need: HEADER_LEN,
        have: frame.len(),
    })?;

    let msg_type = MessageType::from_u8(header.msg_type)
        .ok_or(DecodeError::InvalidMessageType(header.msg_type))?;

    let payload = &frame[HEADER_LEN..];
    if payload.len() < header.payload_size as usize {
        return Err(DecodeError::TruncatedPayload {
            declared: header.payload_size,
            have: payload.len(),
        });
    }

    match msg_type {
        MessageType::Trade => {
            if payload.len() < TRADE_PAYLOAD_LEN {
                return Err(DecodeError::TruncatedPayload {
                    declared: TRADE_PAYLOAD_LEN as u16,
                    have: payload.len(),
                });
            }
            let trade = TradeFrame::read_payload(payload);
            Ok(Some(Event {
                recv_ts,
                exchange_ts: trade.ts,
                symbol_id: trade.symbol_id,
                body: EventBody::Trade {
                    price: trade.price,
                    qty: trade.qty,
                    side: trade.side,
                },
            }))
        }

        MessageType::Quote => {
            if payload.len() < QUOTE_PAYLOAD_LEN {
                return Err(DecodeError::TruncatedPayload {
                    declared: QUOTE_PAYLOAD_LEN as u16,
                    have: payload.len(),
                });
            }
            let quote = QuoteFrame::read_payload(payload);
            Ok(Some(Event {
                recv_ts,
                exchange_ts: quote.ts,
                symbol_id: quote.symbol_id,
                body: EventBody::Quote {
                    bid_px: quote.bid_px,
                    ask_px: quote.ask_px,
                    bid_sz: quote.bid_sz,
                    ask_sz: quote.ask_sz,
                },
            }))
        }

        // Sequence consumed, nothing to hand downstream.
        MessageType::Heartbeat
        | MessageType::OrderAdd
        | MessageType::OrderDelete
        | MessageType::OrderModify => Ok(None),
    }
}

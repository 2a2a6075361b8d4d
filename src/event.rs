/// Normalized market event
///
/// The record handed from the ingest thread to the consumer thread. Trivially
/// copyable, no owned heap data; fits within two cache lines so it can be
/// value-copied through the SPSC queue.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Trade,
    Quote,
}

/// Tagged payload variant, dispatched on the wire `msg_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBody {
    Trade {
        price: u64,
        qty: u32,
        side: u8,
    },
    Quote {
        bid_px: u64,
        ask_px: u64,
        bid_sz: u32,
        ask_sz: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Ingest timestamp in monotonic tick units, sampled on arrival.
    pub recv_ts: u64,
    /// Timestamp carried in the payload.
    pub exchange_ts: u64,
    pub symbol_id: u32,
    pub body: EventBody,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self.body {
            EventBody::Trade { .. } => EventKind::Trade,
            EventBody::Quote { .. } => EventKind::Quote,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_dispatch() {
        let trade = Event {
            recv_ts: 1,
            exchange_ts: 2,
            symbol_id: 3,
            body: EventBody::Trade {
                price: 100_0000,
                qty: 10,
                side: b'B',
            },
        };
        assert_eq!(trade.kind(), EventKind::Trade);

        let quote = Event {
            body: EventBody::Quote {
                bid_px: 99_0000,
                ask_px: 101_0000,
                bid_sz: 5,
                ask_sz: 7,
            },
            ..trade
        };
        assert_eq!(quote.kind(), EventKind::Quote);
    }

    #[test]
    fn test_event_is_compact() {
        // Two cache lines is the ceiling for queue slots.
        assert!(std::mem::size_of::<Event>() <= 128);
    }
}

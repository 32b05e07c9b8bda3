//! Outbound packet queue
//!
//! A bounded FIFO of [`PacketAction`]s. Multi-packet sequences such as a
//! button press and release are enqueued all or nothing, and a failed
//! transmit stays at the front so that a sequence is never split.

use heapless::Deque;
use portcullis_protocol::Packet;

use crate::error::Error;

/// Queue capacity
pub const QUEUE_DEPTH: usize = 8;

/// A packet with its scheduling envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketAction {
    pub packet: Packet,
    /// Consume a rolling code on successful transmit
    pub inc: bool,
    /// Quiet time after this packet before the next may be sent
    pub post_delay_ms: u32,
}

impl PacketAction {
    pub const fn new(packet: Packet, inc: bool, post_delay_ms: u32) -> Self {
        Self {
            packet,
            inc,
            post_delay_ms,
        }
    }
}

/// Bounded FIFO of outbound actions
#[derive(Debug, Clone, Default)]
pub struct TxQueue {
    items: Deque<PacketAction, QUEUE_DEPTH>,
}

impl TxQueue {
    pub const fn new() -> Self {
        Self { items: Deque::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a whole sequence, or nothing when it does not fit
    pub fn push_all(&mut self, actions: &[PacketAction]) -> Result<(), Error> {
        if QUEUE_DEPTH - self.items.len() < actions.len() {
            return Err(Error::QueueFull);
        }
        for action in actions {
            self.items.push_back(*action).map_err(|_| Error::QueueFull)?;
        }
        Ok(())
    }

    /// Next action to send, left in place until it is sent
    pub fn front(&self) -> Option<&PacketAction> {
        self.items.front()
    }

    pub fn pop_front(&mut self) -> Option<PacketAction> {
        self.items.pop_front()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Remove every action matching `drop`, keeping the rest in order
    pub fn discard(&mut self, mut drop: impl FnMut(&PacketAction) -> bool) -> usize {
        let mut removed = 0;
        for _ in 0..self.items.len() {
            let Some(action) = self.items.pop_front() else {
                break;
            };
            if drop(&action) {
                removed += 1;
            } else {
                // Capacity was just freed by the pop
                let _ = self.items.push_back(action);
            }
        }
        removed
    }
}

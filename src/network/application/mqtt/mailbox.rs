//! Single-slot receive mailbox.
//!
//! Written from the modem receive notification (interrupt context on most
//! targets), drained by [`Session::pump`](super::Session::pump). Capacity is
//! exactly one: while a message is pending, further notifications are dropped
//! with a warning and counted.

use super::MAX_TOPIC_LEN;
use core::cell::RefCell;
use critical_section::Mutex;
use heapless::String;

/// An inbound message announced by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub topic: String<MAX_TOPIC_LEN>,
    /// Payload length in bytes.
    pub length: usize,
    /// Broker message id, `None` for QoS 0 deliveries.
    pub message_id: Option<u16>,
}

#[derive(Debug)]
struct Slot {
    pending: Option<Notification>,
    dropped: u32,
}

/// Capacity-1 inbound notification slot.
///
/// `const`-constructible so firmware can place it in a `static`:
///
/// ```rust
/// use iotconnect::network::application::mqtt::Mailbox;
///
/// static MAILBOX: Mailbox = Mailbox::new();
/// ```
#[derive(Debug)]
pub struct Mailbox {
    slot: Mutex<RefCell<Slot>>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(RefCell::new(Slot {
                pending: None,
                dropped: 0,
            })),
        }
    }

    /// Record an inbound message. Returns `false` if it was dropped.
    ///
    /// A `raw_message_id` of 0 is how transports report "no id" for QoS 0
    /// deliveries; it is stored as `None`.
    pub fn notify(&self, topic: &str, length: usize, raw_message_id: u16) -> bool {
        let message_id = (raw_message_id != 0).then_some(raw_message_id);
        let Ok(topic) = String::try_from(topic) else {
            critical_section::with(|cs| self.slot.borrow_ref_mut(cs).dropped += 1);
            warn!("Dropping message with oversized topic ({} bytes)", topic.len());
            return false;
        };

        let accepted = critical_section::with(|cs| {
            let mut slot = self.slot.borrow_ref_mut(cs);
            if slot.pending.is_some() {
                slot.dropped += 1;
                false
            } else {
                slot.pending = Some(Notification {
                    topic,
                    length,
                    message_id,
                });
                true
            }
        });

        if !accepted {
            warn!("Message pending, dropping new message of {} bytes", length);
        }
        accepted
    }

    /// Remove the pending notification, leaving the slot free.
    pub fn take(&self) -> Option<Notification> {
        critical_section::with(|cs| self.slot.borrow_ref_mut(cs).pending.take())
    }

    pub fn is_pending(&self) -> bool {
        critical_section::with(|cs| self.slot.borrow_ref(cs).pending.is_some())
    }

    /// Number of notifications dropped since creation.
    pub fn dropped(&self) -> u32 {
        critical_section::with(|cs| self.slot.borrow_ref(cs).dropped)
    }

    /// Discard any pending notification.
    pub fn clear(&self) {
        let _ = self.take();
    }
}

//! Action classification
//!
//! Maps a raw event to a canonical [`ActionKind`]. Call-data events are
//! classified by destination market (which picks the protocol version) and
//! function selector; action-log events by their label.

use crate::models::{ActionKind, EventPayload, RawEvent};
use crate::registry::{MarketRegistry, SELECTOR_LEN};

pub struct ActionClassifier<'a> {
    registry: &'a MarketRegistry,
}

impl<'a> ActionClassifier<'a> {
    pub fn new(registry: &'a MarketRegistry) -> Self {
        Self { registry }
    }

    /// Classify one event. `None` means unrecognized; the event is dropped.
    pub fn classify(&self, event: &RawEvent) -> Option<ActionKind> {
        let action = match &event.payload {
            EventPayload::CallData(input) => match event.to.as_deref() {
                Some(to) => self.classify_call(to, input),
                None => None,
            },
            EventPayload::Label(label) => ActionKind::from_label(label),
        };

        match action {
            Some(a) => {
                tracing::trace!(tx_hash = %event.tx_hash, action = %a, "Event classified");
            }
            None => {
                tracing::trace!(
                    tx_hash = %event.tx_hash,
                    to = ?event.to,
                    "Unrecognized event, skipping"
                );
            }
        }

        action
    }

    /// Classify a contract call by destination and call data.
    pub fn classify_call(&self, to: &str, input: &str) -> Option<ActionKind> {
        let market = self.registry.lookup(to)?;
        let selector = selector_of(input)?;
        market.action_for(&selector)
    }
}

/// Lower-cased selector prefix of call data, or `None` if the payload is too short.
pub fn selector_of(input: &str) -> Option<String> {
    let input = input.trim();
    input.get(..SELECTOR_LEN).map(|s| s.to_lowercase())
}

//! Warning sink for recoverable parse and write problems.
//!
//! Malformed-but-salvageable input (bad escapes, wrong stream lengths,
//! shifted object headers, unsupported filters) is reported here instead of
//! aborting the load. Each sink is scoped to one load or save call and
//! de-duplicates identical messages, so a document with ten thousand broken
//! streams produces one line per distinct problem.

use rustc_hash::FxHashSet;

/// Collects warnings for a single load/save call.
///
/// A message is recorded and emitted through `tracing::warn!` the first
/// time it is seen; repeats are dropped.
#[derive(Debug, Default)]
pub struct WarningSink {
    seen: FxHashSet<String>,
    messages: Vec<String>,
}

impl WarningSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning, emitting it if it has not been seen before.
    pub fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        if self.seen.insert(msg.clone()) {
            tracing::warn!(target: "folio", "{msg}");
            self.messages.push(msg);
        }
    }

    /// All distinct warnings recorded so far, in first-seen order.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Move another sink's messages into this one.
    pub fn absorb(&mut self, other: WarningSink) {
        for msg in other.messages {
            if self.seen.insert(msg.clone()) {
                self.messages.push(msg);
            }
        }
    }
}

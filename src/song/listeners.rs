//! Change listeners and their cancellation tokens.

use std::fmt;

/// Zero-argument change callback.
pub type Listener = Box<dyn FnMut() + Send>;

/// Token returned by the `subscribe*` methods of [`Song`](crate::song::Song).
///
/// Pass it back to `Song::unsubscribe` to remove the listener. Tokens are
/// unique within one song, so a token stays valid when the note or track it
/// was registered on moves to another index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use = "dropping the token makes the listener impossible to remove"]
pub struct Subscription(pub(crate) u64);

/// Listeners registered on one entity.
#[derive(Default)]
pub(crate) struct Listeners {
    entries: Vec<(u64, Listener)>,
}

impl Listeners {
    pub fn insert(&mut self, id: u64, listener: Listener) {
        self.entries.push((id, listener));
    }

    /// Returns `false` if no listener with this id was registered here.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub fn notify(&mut self) {
        for (_, listener) in self.entries.iter_mut() {
            listener();
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

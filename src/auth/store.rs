// In-memory credential holder

use parking_lot::RwLock;
use std::sync::Arc;

use super::types::CredentialState;

/// Holds the current `CredentialState` behind a short-lived read/write lock.
///
/// The lock is never held across an await point. `replace` swaps the whole
/// state in one write, so readers see either the old or the new state.
#[derive(Default)]
pub struct CredentialStore {
    state: RwLock<Arc<CredentialState>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Owned copy of the current state
    pub fn snapshot(&self) -> CredentialState {
        let current = Arc::clone(&self.state.read());
        CredentialState::clone(&current)
    }

    /// Atomically replace the whole state
    pub fn replace(&self, new_state: CredentialState) {
        *self.state.write() = Arc::new(new_state);
    }

    /// Reset every field to absent/false
    pub fn clear(&self) {
        self.replace(CredentialState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::TokenPair;
    use std::thread;

    #[test]
    fn test_starts_empty() {
        let store = CredentialStore::new();
        assert_eq!(store.snapshot(), CredentialState::default());
        assert!(!store.snapshot().authenticated);
    }

    #[test]
    fn test_replace_and_clear() {
        let store = CredentialStore::new();
        store.replace(CredentialState::from_pair(TokenPair::new("A1", "R1"), None));
        assert_eq!(store.snapshot().access_token.as_deref(), Some("A1"));

        store.clear();
        assert_eq!(store.snapshot(), CredentialState::default());
    }

    #[test]
    fn test_snapshot_is_detached_from_later_writes() {
        let store = CredentialStore::new();
        store.replace(CredentialState::from_pair(TokenPair::new("A1", "R1"), None));
        let before = store.snapshot();

        store.replace(CredentialState::from_pair(TokenPair::new("A2", "R2"), None));

        assert_eq!(before.access_token.as_deref(), Some("A1"));
        assert_eq!(before.refresh_token.as_deref(), Some("R1"));
    }

    #[test]
    fn test_concurrent_readers_never_see_mixed_pairs() {
        let store = Arc::new(CredentialStore::new());
        store.replace(CredentialState::from_pair(TokenPair::new("A0", "R0"), None));

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 1..=2000 {
                    store.replace(CredentialState::from_pair(
                        TokenPair::new(format!("A{}", i), format!("R{}", i)),
                        None,
                    ));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..2000 {
                        let snap = store.snapshot();
                        let access = snap.access_token.unwrap();
                        let refresh = snap.refresh_token.unwrap();
                        assert_eq!(access[1..], refresh[1..]);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}

//! Session and scope control.
//!
//! Owns the active identity and is the single writer of the store's
//! scope: every identity change clears the in-memory collections first
//! and only then loads the new scope, so no read after a switch can see
//! the previous identity's data.

use std::sync::Arc;

use tokio::sync::watch;

use crate::models::Identity;
use crate::store::{ScopeKey, StorageBackend, WardrobeStore, SESSION_KEY};

/// Controller for the current identity and its scoped store.
pub struct SessionController {
    backend: Arc<dyn StorageBackend>,
    store: WardrobeStore,
    identity: Option<Identity>,
    identity_tx: watch::Sender<Option<Identity>>,
}

impl SessionController {
    /// Start signed out, with the guest scope loaded.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let mut store = WardrobeStore::new(backend.clone());
        store.load_scope(ScopeKey::guest());
        let (identity_tx, _) = watch::channel(None);

        Self {
            backend,
            store,
            identity: None,
            identity_tx,
        }
    }

    /// Restore a persisted session, if any. Call once at startup.
    pub fn restore(&mut self) {
        match self.backend.get(SESSION_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Identity>(&raw) {
                Ok(identity) => {
                    tracing::info!(id = %identity.id, "restored persisted session");
                    self.set_identity(Some(identity));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "ignoring unreadable persisted session");
                }
            },
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(error = %err, "failed to read persisted session");
            }
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn store(&self) -> &WardrobeStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut WardrobeStore {
        &mut self.store
    }

    /// Subscribe to identity changes. The receiver always holds the
    /// current value.
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }

    /// Switch the active identity and re-scope the whole dataset.
    ///
    /// `None` signs out: per-identity collections reset and the guest
    /// scope is loaded.
    pub fn set_identity(&mut self, identity: Option<Identity>) {
        let scope = ScopeKey::for_identity(identity.as_ref());
        tracing::info!(scope = scope.as_str(), "switching identity scope");

        // Clear before loading: a reader between the two steps sees an
        // empty store, never the previous identity's data.
        self.store.reset();
        self.store.load_scope(scope);

        self.persist_session(identity.as_ref());
        self.identity = identity.clone();
        self.identity_tx.send_replace(identity);
    }

    /// Sign out and return to the guest scope.
    pub fn sign_out(&mut self) {
        self.set_identity(None);
    }

    fn persist_session(&self, identity: Option<&Identity>) {
        let result = match identity {
            Some(identity) => match serde_json::to_string(identity) {
                Ok(raw) => self.backend.set(SESSION_KEY, &raw),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to serialize session");
                    return;
                }
            },
            None => self.backend.remove(SESSION_KEY),
        };

        if let Err(err) = result {
            tracing::warn!(error = %err, "failed to persist session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassificationRecord, ClothingCategory, ClothingItem};
    use crate::store::MemoryBackend;

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            photo_url: None,
        }
    }

    fn item() -> ClothingItem {
        ClothingItem::from_classification(
            b"img",
            ClassificationRecord {
                category: Some(ClothingCategory::Top),
                color: "Navy".to_string(),
                style: "Minimalist".to_string(),
                material: "Cotton".to_string(),
                description: "A navy top".to_string(),
            },
        )
    }

    #[test]
    fn test_switch_clears_before_loading() {
        let backend = Arc::new(MemoryBackend::new());
        let mut session = SessionController::new(backend);

        session.set_identity(Some(identity("user_a")));
        session.store_mut().add_clothing_item(item());
        assert_eq!(session.store().clothes().len(), 1);

        // B has no data: reads immediately after the switch are empty,
        // never A's.
        session.set_identity(Some(identity("user_b")));
        assert!(session.store().clothes().is_empty());
        assert!(session.store().profile().is_none());

        session.set_identity(Some(identity("user_a")));
        assert_eq!(session.store().clothes().len(), 1);
    }

    #[test]
    fn test_sign_out_resets_to_guest_scope() {
        let backend = Arc::new(MemoryBackend::new());
        let mut session = SessionController::new(backend);

        session.set_identity(Some(identity("user_a")));
        session.store_mut().add_clothing_item(item());

        session.sign_out();
        assert!(session.identity().is_none());
        assert!(session.store().clothes().is_empty());
        assert_eq!(session.store().scope(), &ScopeKey::guest());
    }

    #[test]
    fn test_session_persists_and_restores() {
        let backend = Arc::new(MemoryBackend::new());

        {
            let mut session = SessionController::new(backend.clone());
            session.set_identity(Some(identity("user_a")));
        }

        let mut restored = SessionController::new(backend.clone());
        restored.restore();
        assert_eq!(restored.identity().map(|i| i.id.as_str()), Some("user_a"));

        restored.sign_out();
        let mut guest = SessionController::new(backend);
        guest.restore();
        assert!(guest.identity().is_none());
    }

    #[test]
    fn test_identity_changes_are_observable() {
        let backend = Arc::new(MemoryBackend::new());
        let mut session = SessionController::new(backend);
        let rx = session.subscribe();

        assert!(rx.borrow().is_none());

        session.set_identity(Some(identity("user_a")));
        assert_eq!(
            rx.borrow().as_ref().map(|i| i.id.clone()),
            Some("user_a".to_string())
        );

        session.sign_out();
        assert!(rx.borrow().is_none());
    }
}

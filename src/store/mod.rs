//! Persistent collection store.
//!
//! Keyed CRUD over the per-identity collections (profile, clothing
//! catalogue, outfits, calendar) plus the global shared-looks feed.
//! Every mutator applies to memory first and then attempts a
//! best-effort persist: a failed write is reported, never rolled back,
//! so the session keeps working when the backing store is full.

pub mod backend;
pub mod sqlite;

pub use backend::{MemoryBackend, StorageBackend};
pub use sqlite::SqliteBackend;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;
use crate::models::{CalendarEvent, ClothingItem, Identity, Outfit, Profile, SharedLook};

/// The shared feed persists under one fixed key for all identities.
pub const SOCIAL_KEY: &str = "wardrobe_social";

/// Fixed key for the persisted session identity.
pub(crate) const SESSION_KEY: &str = "wardrobe_session";

const GUEST_SCOPE: &str = "guest";

/// Identity-derived namespace for persisted collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeKey(String);

impl ScopeKey {
    pub fn guest() -> Self {
        Self(GUEST_SCOPE.to_string())
    }

    pub fn for_identity(identity: Option<&Identity>) -> Self {
        match identity {
            Some(identity) => Self(identity.id.clone()),
            None => Self::guest(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn collection_key(&self, collection: &str) -> String {
        format!("{}_{}", self.0, collection)
    }
}

/// Durability of a completed mutation. `SessionOnly` means the change is
/// live in memory but did not reach the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Persisted,
    SessionOnly,
}

impl WriteStatus {
    pub fn is_durable(&self) -> bool {
        matches!(self, WriteStatus::Persisted)
    }

    fn and(self, other: WriteStatus) -> WriteStatus {
        if self.is_durable() && other.is_durable() {
            WriteStatus::Persisted
        } else {
            WriteStatus::SessionOnly
        }
    }
}

/// In-memory collections for one scope, backed by a key-value store.
pub struct WardrobeStore {
    backend: Arc<dyn StorageBackend>,
    scope: ScopeKey,
    profile: Option<Profile>,
    clothes: Vec<ClothingItem>,
    outfits: Vec<Outfit>,
    calendar: Vec<CalendarEvent>,
    shared_looks: Vec<SharedLook>,
}

impl WardrobeStore {
    /// Empty store scoped to guest. Call [`load_scope`](Self::load_scope)
    /// to pull persisted data.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            scope: ScopeKey::guest(),
            profile: None,
            clothes: Vec::new(),
            outfits: Vec::new(),
            calendar: Vec::new(),
            shared_looks: Vec::new(),
        }
    }

    // === Read path ===

    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// Catalogue in most-recent-first order.
    pub fn clothes(&self) -> &[ClothingItem] {
        &self.clothes
    }

    pub fn outfits(&self) -> &[Outfit] {
        &self.outfits
    }

    pub fn calendar_events(&self) -> &[CalendarEvent] {
        &self.calendar
    }

    pub fn shared_looks(&self) -> &[SharedLook] {
        &self.shared_looks
    }

    pub fn clothing_item(&self, id: &str) -> Option<&ClothingItem> {
        self.clothes.iter().find(|c| c.id == id)
    }

    pub fn outfit(&self, id: &str) -> Option<&Outfit> {
        self.outfits.iter().find(|o| o.id == id)
    }

    /// Resolve an outfit's item references against the catalogue.
    /// Dangling references (items deleted after the outfit was saved) are
    /// dropped silently; they are identifiers, not owning pointers.
    pub fn resolve_outfit_items(&self, outfit: &Outfit) -> Vec<&ClothingItem> {
        outfit
            .item_ids
            .iter()
            .filter_map(|id| self.clothing_item(id))
            .collect()
    }

    // === Scope lifecycle ===

    /// Drop all per-identity collections. The shared feed is global and
    /// stays.
    pub fn reset(&mut self) {
        self.profile = None;
        self.clothes.clear();
        self.outfits.clear();
        self.calendar.clear();
    }

    /// Switch to `scope` and load everything persisted under it. Clears
    /// current in-memory state first so a failed load never leaks the
    /// previous identity's data.
    pub fn load_scope(&mut self, scope: ScopeKey) {
        self.reset();
        self.scope = scope;

        self.profile = self.load_collection(&self.scope.collection_key("profile"));
        self.clothes = self
            .load_collection(&self.scope.collection_key("clothes"))
            .unwrap_or_default();
        self.outfits = self
            .load_collection(&self.scope.collection_key("outfits"))
            .unwrap_or_default();
        self.calendar = self
            .load_collection(&self.scope.collection_key("calendar"))
            .unwrap_or_default();
        self.shared_looks = self.load_collection(SOCIAL_KEY).unwrap_or_default();

        tracing::debug!(
            scope = self.scope.as_str(),
            items = self.clothes.len(),
            outfits = self.outfits.len(),
            "loaded scope"
        );
    }

    /// Re-persist every collection, e.g. after the backing store freed
    /// space. Durable only if every write is.
    pub fn flush(&self) -> WriteStatus {
        let mut status = WriteStatus::Persisted;
        if let Some(profile) = &self.profile {
            status = status.and(self.persist(&self.scope.collection_key("profile"), profile));
        }
        status = status.and(self.persist(&self.scope.collection_key("clothes"), &self.clothes));
        status = status.and(self.persist(&self.scope.collection_key("outfits"), &self.outfits));
        status = status.and(self.persist(&self.scope.collection_key("calendar"), &self.calendar));
        status.and(self.persist(SOCIAL_KEY, &self.shared_looks))
    }

    // === Mutators ===
    //
    // Each mutator snapshots its collection key from the current scope at
    // entry; a scope switched by the session controller wins over any
    // overlapping mutation.

    pub fn set_profile(&mut self, profile: Profile) -> WriteStatus {
        let key = self.scope.collection_key("profile");
        self.profile = Some(profile);
        match &self.profile {
            Some(profile) => self.persist(&key, profile),
            None => WriteStatus::SessionOnly,
        }
    }

    pub fn add_clothing_item(&mut self, item: ClothingItem) -> WriteStatus {
        let key = self.scope.collection_key("clothes");
        self.clothes.insert(0, item);
        self.persist(&key, &self.clothes)
    }

    pub fn delete_clothing_item(&mut self, id: &str) -> WriteStatus {
        let key = self.scope.collection_key("clothes");
        // No cascade: outfits and calendar entries keep their references
        // and resolve them lazily.
        self.clothes.retain(|c| c.id != id);
        self.persist(&key, &self.clothes)
    }

    pub fn save_outfit(&mut self, outfit: Outfit) -> WriteStatus {
        let key = self.scope.collection_key("outfits");
        self.outfits.insert(0, outfit);
        self.persist(&key, &self.outfits)
    }

    pub fn delete_outfit(&mut self, id: &str) -> WriteStatus {
        let key = self.scope.collection_key("outfits");
        self.outfits.retain(|o| o.id != id);
        self.persist(&key, &self.outfits)
    }

    pub fn add_calendar_event(&mut self, event: CalendarEvent) -> WriteStatus {
        let key = self.scope.collection_key("calendar");
        self.calendar.push(event);
        self.persist(&key, &self.calendar)
    }

    /// Post to the shared feed. Not scope-keyed by design: the feed
    /// emulates a shared space with purely local persistence.
    pub fn share_look(&mut self, look: SharedLook) -> WriteStatus {
        self.shared_looks.insert(0, look);
        self.persist(SOCIAL_KEY, &self.shared_looks)
    }

    /// Bump the like counter on a feed post. `None` if the post is gone.
    pub fn like_look(&mut self, id: &str) -> Option<WriteStatus> {
        let look = self.shared_looks.iter_mut().find(|l| l.id == id)?;
        look.likes += 1;
        Some(self.persist(SOCIAL_KEY, &self.shared_looks))
    }

    /// Append a comment to a feed post. `None` if the post is gone.
    pub fn comment_look(&mut self, id: &str, comment: impl Into<String>) -> Option<WriteStatus> {
        let look = self.shared_looks.iter_mut().find(|l| l.id == id)?;
        look.comments.push(comment.into());
        Some(self.persist(SOCIAL_KEY, &self.shared_looks))
    }

    // === Persistence plumbing ===

    fn load_collection<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to read collection");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to parse stored collection");
                None
            }
        }
    }

    /// Best-effort persist. Failures become a warning and a
    /// `SessionOnly` status; the in-memory state is never rolled back.
    fn persist<T: Serialize>(&self, key: &str, value: &T) -> WriteStatus {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to serialize collection");
                return WriteStatus::SessionOnly;
            }
        };

        match self.backend.set(key, &payload) {
            Ok(()) => WriteStatus::Persisted,
            Err(StorageError::QuotaExceeded) => {
                tracing::warn!(
                    key,
                    "storage quota exceeded; change kept for this session only"
                );
                WriteStatus::SessionOnly
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to persist collection");
                WriteStatus::SessionOnly
            }
        }
    }
}

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::{PersistentStore, StateError, STATE_NAMESPACE};

/// Persisted shape of all user-local state.
///
/// Serialized as `{"favorites": [...], "darkMode": bool}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateDocument {
    pub favorites: Vec<String>,
    pub dark_mode: bool,
}

impl StateDocument {
    /// Drops repeated favorite ids, keeping the first occurrence.
    fn dedup_favorites(&mut self) -> usize {
        let before = self.favorites.len();
        let mut seen = std::collections::HashSet::with_capacity(before);
        self.favorites.retain(|id| seen.insert(id.clone()));
        before - self.favorites.len()
    }
}

struct StateInner {
    store: Arc<dyn PersistentStore>,
    key: String,
    document: Mutex<StateDocument>,
}

/// Shared container for the state document and its backing store.
///
/// Cloning the handle is cheap; all clones see and mutate the same document.
/// Obtain the typed views with [`StateHandle::favorites`] and
/// [`StateHandle::preference`].
#[derive(Clone)]
pub struct StateHandle {
    inner: Arc<StateInner>,
}

impl std::fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateHandle")
            .field("key", &self.inner.key)
            .field("document", &*self.lock())
            .finish()
    }
}

impl StateHandle {
    /// Loads the document stored under [`STATE_NAMESPACE`].
    pub fn open(store: Arc<dyn PersistentStore>) -> Result<Self, StateError> {
        Self::open_with_key(store, STATE_NAMESPACE)
    }

    /// Loads the document stored under `key`, starting from defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Corrupt`] when the stored value is not a valid
    /// state document, or any error raised by the store itself.
    pub fn open_with_key(
        store: Arc<dyn PersistentStore>,
        key: impl Into<String>,
    ) -> Result<Self, StateError> {
        let key = key.into();
        let mut document = match store.load(&key)? {
            Some(value) => serde_json::from_value::<StateDocument>(value).map_err(|error| {
                StateError::Corrupt {
                    key: key.clone(),
                    message: error.to_string(),
                }
            })?,
            None => StateDocument::default(),
        };

        let dropped = document.dedup_favorites();
        if dropped > 0 {
            tracing::warn!(key = %key, dropped, "discarded duplicate favorite ids while loading state");
        }

        Ok(Self {
            inner: Arc::new(StateInner {
                store,
                key,
                document: Mutex::new(document),
            }),
        })
    }

    pub fn favorites(&self) -> FavoritesStore {
        FavoritesStore {
            state: self.clone(),
        }
    }

    pub fn preference(&self) -> PreferenceStore {
        PreferenceStore {
            state: self.clone(),
        }
    }

    /// Returns a copy of the current document.
    pub fn document(&self) -> StateDocument {
        self.lock().clone()
    }

    /// Writes the current document to the store.
    pub fn persist(&self) -> Result<(), StateError> {
        let document = self.lock();
        self.write(&document)
    }

    fn lock(&self) -> MutexGuard<'_, StateDocument> {
        self.inner
            .document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, document: &StateDocument) -> Result<(), StateError> {
        let value = serde_json::to_value(document)?;
        self.inner.store.save(&self.inner.key, &value)
    }

    /// Applies `change` to a copy of the document and persists it.
    ///
    /// The in-memory document is replaced only after the store accepted the
    /// write. `change` returns whether it modified anything; unchanged
    /// documents are not written.
    fn mutate<R>(
        &self,
        change: impl FnOnce(&mut StateDocument) -> (bool, R),
    ) -> Result<R, StateError> {
        let mut current = self.lock();
        let mut next = current.clone();
        let (modified, output) = change(&mut next);
        if modified {
            self.write(&next)?;
            *current = next;
        }
        Ok(output)
    }
}

/// Favorite asset ids, kept in insertion order with at most one entry per id.
#[derive(Debug, Clone)]
pub struct FavoritesStore {
    state: StateHandle,
}

impl FavoritesStore {
    /// Marks `id` as favorite. Returns `false` when it already was one.
    pub fn add(&self, id: &str) -> Result<bool, StateError> {
        self.state.mutate(|document| {
            if document.favorites.iter().any(|fav| fav == id) {
                return (false, false);
            }
            document.favorites.push(id.to_owned());
            (true, true)
        })
    }

    /// Removes `id`. Returns `false`, without error, when it was not a favorite.
    pub fn remove(&self, id: &str) -> Result<bool, StateError> {
        self.state.mutate(|document| {
            let before = document.favorites.len();
            document.favorites.retain(|fav| fav != id);
            let removed = document.favorites.len() != before;
            (removed, removed)
        })
    }

    /// Flips membership of `id` and returns the new membership.
    pub fn toggle(&self, id: &str) -> Result<bool, StateError> {
        self.state.mutate(|document| {
            if let Some(index) = document.favorites.iter().position(|fav| fav == id) {
                document.favorites.remove(index);
                (true, false)
            } else {
                document.favorites.push(id.to_owned());
                (true, true)
            }
        })
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.state.lock().favorites.iter().any(|fav| fav == id)
    }

    /// Favorite ids in the order they were added.
    pub fn list(&self) -> Vec<String> {
        self.state.lock().favorites.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().favorites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The dark-mode display preference. Defaults to `false`.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    state: StateHandle,
}

impl PreferenceStore {
    pub fn get(&self) -> bool {
        self.state.lock().dark_mode
    }

    /// Flips the preference, persists it, and returns the new value.
    pub fn toggle(&self) -> Result<bool, StateError> {
        self.state.mutate(|document| {
            document.dark_mode = !document.dark_mode;
            (true, document.dark_mode)
        })
    }

    pub fn set(&self, dark_mode: bool) -> Result<(), StateError> {
        self.state.mutate(|document| {
            let modified = document.dark_mode != dark_mode;
            document.dark_mode = dark_mode;
            (modified, ())
        })
    }
}

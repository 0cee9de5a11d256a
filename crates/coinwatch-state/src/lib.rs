//! # Coinwatch State
//!
//! Durable user-local state for coinwatch: the favorite-asset set and the
//! dark-mode display preference.
//!
//! ## Overview
//!
//! All state lives in one JSON document stored under a single namespace key
//! ([`STATE_NAMESPACE`]). Loads and saves are whole-document operations; there
//! is no partial-field persistence.
//!
//! ```text
//! ┌───────────────┐   ┌─────────────────┐
//! │ FavoritesStore│   │ PreferenceStore │
//! └───────┬───────┘   └────────┬────────┘
//!         └─────────┬──────────┘
//!                   ▼
//!           ┌──────────────┐
//!           │ StateHandle  │  (in-memory StateDocument + save-on-mutate)
//!           └──────┬───────┘
//!                  ▼
//!         ┌─────────────────┐
//!         │ PersistentStore │  (JsonFileStore / MemoryStore)
//!         └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use coinwatch_state::{MemoryStore, StateHandle};
//!
//! let state = StateHandle::open(Arc::new(MemoryStore::default()))?;
//! let favorites = state.favorites();
//! favorites.add("bitcoin")?;
//! assert!(favorites.is_favorite("bitcoin"));
//!
//! let preference = state.preference();
//! assert!(preference.toggle()?);
//! # Ok::<(), coinwatch_state::StateError>(())
//! ```
//!
//! ## Durability
//!
//! Every mutation serializes the full document and writes it through the
//! [`PersistentStore`] before returning. When the write fails the in-memory
//! document is left untouched and the [`StateError`] is returned to the caller.

mod document;
mod error;
mod store;

pub use document::{FavoritesStore, PreferenceStore, StateDocument, StateHandle};
pub use error::StateError;
pub use store::{resolve_coinwatch_home, JsonFileStore, MemoryStore, PersistentStore};

/// Namespace key under which the coinwatch state document is persisted.
pub const STATE_NAMESPACE: &str = "coinwatch-storage";

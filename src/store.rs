//! Content-addressed geometry store and change detection.
//!
//! DESIGN
//! ======
//! The in-memory record list is the working truth for the session; the
//! injected [`Storage`] backend is the durable truth across reloads, gated
//! by the persist preference. The mutation discipline is mutate-cache then
//! persist, with a single writer by construction.
//!
//! Each record carries two identities: `id` is a surrogate assigned once at
//! creation and stable across edits (the UI and the live-feature mapping
//! key on it), `hash` is the content address — always the checksum of `wkt`
//! as of the last save, recomputed on every update. Deduplication keys on
//! `hash`.
//!
//! ERROR HANDLING
//! ==============
//! Nothing in the interactive mutation path throws outward: degenerate
//! geometry on `add` and unknown ids on `update` are logged and absorbed,
//! and a failed persist after a mutation is reported via `error!` while the
//! cache keeps the mutation (durability problems must be loud, but they
//! never crash a gesture). Only `load` and `save` — the explicit
//! persistence entry points — surface errors to their caller.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::checksum;
use crate::consts::GEOMETRIES_KEY;
use crate::settings::Settings;
use crate::storage::{Storage, StorageError};
use crate::wkt::{self, Geometry};

/// Persisted unit: a geometry with its surrogate id and content address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryRecord {
    /// Stable surrogate identity, assigned once and never changed.
    pub id: Uuid,
    /// Checksum of `wkt` as of the last successful save.
    pub hash: String,
    /// Canonical geometry text.
    pub wkt: String,
}

/// Error returned by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("persisted records are not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// The content-addressed store: an ordered in-memory record list with
/// injected persistence and preference dependencies.
pub struct GeometryStore {
    storage: Arc<dyn Storage>,
    settings: Arc<dyn Settings>,
    records: Vec<GeometryRecord>,
}

impl GeometryStore {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, settings: Arc<dyn Settings>) -> Self {
        Self { storage, settings, records: Vec::new() }
    }

    /// Re-synchronize the cache from persisted storage.
    ///
    /// With the persist preference disabled nothing survives a reload: the
    /// cache is emptied and returned as-is. Otherwise the persisted list
    /// replaces the cache. Records whose stored hash no longer matches
    /// their text are re-keyed, and records duplicating an earlier content
    /// hash are dropped, both with a warning — persisted data is not
    /// trusted to uphold the store's invariants.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] on read failure and
    /// [`StoreError::Corrupt`] when the persisted text is not a record list.
    pub async fn load(&mut self) -> Result<&[GeometryRecord], StoreError> {
        if !self.settings.persist() {
            self.records.clear();
            return Ok(&self.records);
        }

        let raw = self.storage.get_item(GEOMETRIES_KEY).await?;
        let mut records: Vec<GeometryRecord> = match raw {
            Some(text) => serde_json::from_str(&text)?,
            None => Vec::new(),
        };

        for record in &mut records {
            let expected = checksum::checksum(&record.wkt);
            if record.hash != expected {
                warn!(id = %record.id, "re-keying record with stale content hash");
                record.hash = expected;
            }
        }

        let mut seen = Vec::with_capacity(records.len());
        records.retain(|record| {
            if seen.contains(&record.hash) {
                warn!(id = %record.id, "dropping persisted record with duplicate content");
                false
            } else {
                seen.push(record.hash.clone());
                true
            }
        });

        self.records = records;
        Ok(&self.records)
    }

    /// Write the cache to persisted storage, if the persist preference is
    /// enabled; otherwise a storage no-op (the cache stays authoritative
    /// for the session).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] on write failure.
    pub async fn save(&self) -> Result<(), StoreError> {
        if !self.settings.persist() {
            return Ok(());
        }
        let text = serde_json::to_string(&self.records)?;
        self.storage.set_item(GEOMETRIES_KEY, &text).await?;
        Ok(())
    }

    /// Persist after a mutation, containing any failure: the cache keeps
    /// the mutation and the failure is reported loudly instead of aborting
    /// the gesture that caused it.
    async fn persist_after(&self, operation: &'static str) {
        if let Err(e) = self.save().await {
            error!(error = %e, operation, "persisting geometry records failed");
        }
    }

    /// Add a geometry, deduplicating on content.
    ///
    /// Returns the id of the record now holding this content: a fresh one
    /// for new content, the existing one for a duplicate (idempotent add).
    /// A geometry with empty canonical text is refused with a warning and
    /// `None` — degenerate input never crashes the interaction flow.
    pub async fn add(&mut self, geometry: &Geometry) -> Option<Uuid> {
        let text = wkt::write(geometry);
        if text.is_empty() {
            warn!("refusing to add geometry with empty canonical text");
            return None;
        }

        let hash = checksum::checksum(&text);
        if let Some(existing) = self.records.iter().find(|r| r.hash == hash) {
            debug!(id = %existing.id, hash = checksum::short(&hash), "duplicate add ignored");
            return Some(existing.id);
        }

        let id = Uuid::new_v4();
        self.records.push(GeometryRecord { id, hash, wkt: text });
        self.persist_after("add").await;
        Some(id)
    }

    /// Remove the record with `id` if present; persists regardless of
    /// whether anything was removed.
    pub async fn remove(&mut self, id: Uuid) {
        self.records.retain(|r| r.id != id);
        self.persist_after("remove").await;
    }

    /// Rewrite the text of the record with `id` in place, recomputing its
    /// content hash so the content-addressing invariant holds. An unknown
    /// id logs a warning and is otherwise a no-op.
    pub async fn update(&mut self, id: Uuid, new_wkt: &str) {
        let hash = checksum::checksum(new_wkt);
        if self.records.iter().any(|r| r.id != id && r.hash == hash) {
            // An edit can converge on another record's content; ids still
            // differ, so both records are kept and only `add` dedups.
            warn!(%id, "update duplicates another record's content");
        }

        let Some(record) = self.records.iter_mut().find(|r| r.id == id) else {
            warn!(%id, "update for unknown record ignored");
            return;
        };
        record.wkt = new_wkt.to_owned();
        record.hash = hash;
        self.persist_after("update").await;
    }

    /// Independently clear the working set and/or the persisted copy.
    pub async fn clear(&mut self, from_working_set: bool, from_persistence: bool) {
        if from_working_set {
            self.records.clear();
        }
        if from_persistence {
            if let Err(e) = self.storage.remove_item(GEOMETRIES_KEY).await {
                error!(error = %e, "clearing persisted geometry records failed");
            }
        }
    }

    /// The current cache, in insertion order. No persistence I/O.
    #[must_use]
    pub fn get(&self) -> &[GeometryRecord] {
        &self.records
    }

    /// Look up a record by surrogate id.
    #[must_use]
    pub fn record(&self, id: Uuid) -> Option<&GeometryRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Number of records in the cache.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Change detection: decide whether a live geometry differs from its
    /// stored counterpart, committing the new text when it does.
    ///
    /// Returns `false` when the canonical texts are identical or when `id`
    /// has no record (nothing to commit). On a difference the record is
    /// updated in place — same surrogate id, new content hash — and `true`
    /// is returned so the caller can refresh thumbnails and notify views.
    pub async fn changed(&mut self, id: Uuid, live: &Geometry) -> bool {
        let text = wkt::write(live);
        let Some(record) = self.records.iter().find(|r| r.id == id) else {
            return false;
        };
        if record.wkt == text {
            return false;
        }

        self.update(id, &text).await;
        true
    }
}

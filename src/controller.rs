//! Selection/edit lifecycle controller.
//!
//! All logic that reacts to map-surface gestures lives here, with no
//! dependency on the rendering toolkit — the surface is reached only
//! through the boundary traits in [`crate::surface`], so the whole
//! lifecycle is testable headlessly.
//!
//! DESIGN
//! ======
//! The controller owns the selection set, the mode state machine, and the
//! explicit mapping between store record ids and live feature keys (no
//! persistent identity is ever written into a renderer-owned object). Every
//! gesture that can mutate geometry funnels into the store's change
//! detector; views are notified through the typed event bus instead of
//! being called synchronously.

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;

use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::combine;
use crate::events::{EventBus, SyncEvent};
use crate::settings::Settings;
use crate::store::{GeometryStore, StoreError};
use crate::surface::{FeatureKey, FeatureLayer, LiveFeature, MapView, Projection, UndoRedo};
use crate::thumbnail::{self, ThumbnailTracker};
use crate::wkt::{self, Geometry, WktError};

/// Interaction mode. `Drawing` is reachable from `Idle` via the drawing
/// tool and from `Selecting`; every state returns to `Idle` on Escape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// No interaction tool active.
    #[default]
    Idle,
    /// Selection tool active; clicks change the selection set.
    Selecting,
    /// A modify session is editing the selected geometries in place.
    Modifying,
    /// The drawing tool is sketching a new geometry.
    Drawing,
}

/// A keyboard key as reported by the host (e.g. `"Delete"`, `"Escape"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

/// Modifier keys held during a key event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// The platform shortcut modifier: Ctrl, or Command on mac hosts.
    #[must_use]
    pub fn platform(self) -> bool {
        self.ctrl || self.meta
    }
}

/// One rejected line from a clipboard import.
#[derive(Debug)]
pub struct ImportFailure {
    /// 1-based line number within the pasted text.
    pub line: usize,
    pub error: WktError,
}

/// Outcome of a clipboard import: what was added, what was rejected.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub added: Vec<Uuid>,
    pub failures: Vec<ImportFailure>,
}

/// The synchronization engine's interaction controller.
pub struct SyncController {
    /// Content-addressed record store; single source of reload truth.
    pub store: GeometryStore,
    /// Live working copies owned by the map surface.
    pub layer: FeatureLayer,
    settings: Arc<dyn Settings>,
    view: Box<dyn MapView>,
    history: Box<dyn UndoRedo>,
    projection: Box<dyn Projection>,
    bus: EventBus,
    mode: Mode,
    selection: Vec<FeatureKey>,
    id_to_key: HashMap<Uuid, FeatureKey>,
    key_to_id: HashMap<FeatureKey, Uuid>,
    panel_text: String,
    thumbnails: HashMap<Uuid, RgbaImage>,
    tracker: ThumbnailTracker,
}

impl SyncController {
    #[must_use]
    pub fn new(
        store: GeometryStore,
        settings: Arc<dyn Settings>,
        view: Box<dyn MapView>,
        history: Box<dyn UndoRedo>,
        projection: Box<dyn Projection>,
    ) -> Self {
        Self {
            store,
            layer: FeatureLayer::new(),
            settings,
            view,
            history,
            projection,
            bus: EventBus::new(),
            mode: Mode::Idle,
            selection: Vec::new(),
            id_to_key: HashMap::new(),
            key_to_id: HashMap::new(),
            panel_text: String::new(),
            thumbnails: HashMap::new(),
            tracker: ThumbnailTracker::new(),
        }
    }

    // --- Startup ---

    /// Load persisted records and rebuild the live layer to match, so the
    /// store and the layer leave startup with equal cardinality.
    ///
    /// # Errors
    ///
    /// Returns the store's load error when persisted data cannot be read;
    /// the session then starts empty rather than half-synchronized.
    pub async fn initialize(&mut self) -> Result<(), StoreError> {
        let records = self.store.load().await?.to_vec();

        self.layer = FeatureLayer::new();
        self.id_to_key.clear();
        self.key_to_id.clear();
        self.selection.clear();
        self.panel_text.clear();
        self.thumbnails.clear();

        for record in records {
            match wkt::parse(&record.wkt) {
                Ok(canonical) => {
                    let projected = canonical.map_coords(|c| self.projection.to_projected(c));
                    let key = self.layer.insert(LiveFeature { geometry: projected });
                    self.id_to_key.insert(record.id, key);
                    self.key_to_id.insert(key, record.id);
                    self.refresh_thumbnail(record.id).await;
                }
                Err(e) => {
                    // Records are validated on the way in, so this means
                    // the persisted copy was edited out-of-band.
                    warn!(id = %record.id, error = %e, "stored record no longer parses; no live copy created");
                }
            }
        }

        self.refit_view();
        self.mode = Mode::Selecting;
        Ok(())
    }

    // --- Queries ---

    /// Subscribe to the controller's domain events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.bus.subscribe()
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The current selection, in selection order.
    #[must_use]
    pub fn selection(&self) -> &[FeatureKey] {
        &self.selection
    }

    /// Current contents of the geometry text panel.
    #[must_use]
    pub fn panel_text(&self) -> &str {
        &self.panel_text
    }

    /// Record id for a live feature key, if the feature is persisted.
    #[must_use]
    pub fn record_id(&self, key: FeatureKey) -> Option<Uuid> {
        self.key_to_id.get(&key).copied()
    }

    /// Live feature key for a record id.
    #[must_use]
    pub fn feature_key(&self, id: Uuid) -> Option<FeatureKey> {
        self.id_to_key.get(&id).copied()
    }

    /// Borrow the current thumbnail for a record, if one is ready.
    #[must_use]
    pub fn thumbnail(&self, id: Uuid) -> Option<&RgbaImage> {
        self.thumbnails.get(&id)
    }

    /// Take ownership of a record's thumbnail for display. The raster has
    /// a bounded lifetime: the caller drops it once it has been shown.
    pub fn take_thumbnail(&mut self, id: Uuid) -> Option<RgbaImage> {
        self.thumbnails.remove(&id)
    }

    // --- Tool activation ---

    /// Activate the selection tool.
    pub fn activate_selection(&mut self) {
        self.mode = Mode::Selecting;
    }

    /// Activate the drawing tool.
    pub fn activate_draw(&mut self) {
        self.mode = Mode::Drawing;
    }

    // --- Gestures ---

    /// The surface reported a new selection set.
    ///
    /// Deselected features get their pending edits committed through the
    /// change detector; the text panel is repopulated; a
    /// [`SyncEvent::SelectionChanged`] carries the highlight diff.
    pub async fn on_select(&mut self, new_selection: Vec<FeatureKey>) {
        let mut incoming: Vec<FeatureKey> = new_selection
            .into_iter()
            .filter(|key| self.layer.get(*key).is_some())
            .collect();

        if !self.settings.multi_select() && incoming.len() > 1 {
            // Keep only the most recently selected.
            incoming.drain(..incoming.len() - 1);
        }

        let newly_selected: Vec<FeatureKey> =
            incoming.iter().copied().filter(|k| !self.selection.contains(k)).collect();
        let newly_deselected: Vec<FeatureKey> =
            self.selection.iter().copied().filter(|k| !incoming.contains(k)).collect();

        for key in &newly_deselected {
            self.commit_feature(*key).await;
        }

        self.selection = incoming;
        self.mode = Mode::Selecting;
        self.refresh_panel();

        if !newly_selected.is_empty() || !newly_deselected.is_empty() {
            self.bus.emit(SyncEvent::SelectionChanged {
                selected: self.record_ids_of(&newly_selected),
                deselected: self.record_ids_of(&newly_deselected),
            });
        }
    }

    /// A drawing gesture completed with a new geometry in the surface's
    /// projected coordinates.
    pub async fn on_draw_end(&mut self, geometry: Geometry) {
        let canonical = self.to_geographic(&geometry);
        let Some(id) = self.store.add(&canonical).await else {
            return;
        };

        if self.id_to_key.contains_key(&id) {
            // Idempotent add hit: identical content is already live, so
            // the fresh sketch is discarded rather than duplicated.
            debug!(%id, "drawn geometry duplicates an existing record");
        } else {
            let key = self.layer.insert(LiveFeature { geometry });
            self.id_to_key.insert(id, key);
            self.key_to_id.insert(key, id);
            self.refresh_thumbnail(id).await;
            self.bus.emit(SyncEvent::FeatureCreated { id });
        }

        self.refit_view();
        // Hand control back to selection, leaving the new feature unselected.
        self.mode = Mode::Selecting;
    }

    /// A modify session started on the current selection.
    pub fn on_modify_start(&mut self) {
        self.mode = Mode::Modifying;
    }

    /// A modify gesture ended; commit every feature that was part of it.
    pub async fn on_modify_end(&mut self, edited: &[FeatureKey]) {
        for key in edited {
            self.commit_feature(*key).await;
        }
        self.mode = Mode::Selecting;
        self.refresh_panel();
    }

    /// A click landed outside the geometry layer while a modify session
    /// was active: commit the whole selection set.
    pub async fn on_click_outside(&mut self) {
        if self.mode != Mode::Modifying {
            return;
        }
        let selected = self.selection.clone();
        for key in selected {
            self.commit_feature(key).await;
        }
        self.mode = Mode::Selecting;
        self.refresh_panel();
    }

    /// Delete the selected geometry. Requires exactly one selected feature;
    /// anything else is a no-op.
    pub async fn on_delete(&mut self) {
        if self.selection.len() != 1 {
            debug!(count = self.selection.len(), "delete requires exactly one selected geometry");
            return;
        }
        let key = self.selection[0];
        let Some(id) = self.key_to_id.get(&key).copied() else {
            warn!("selected feature has no record; clearing selection");
            self.selection.clear();
            self.refresh_panel();
            return;
        };

        self.store.remove(id).await;
        self.layer.remove(key);
        self.id_to_key.remove(&id);
        self.key_to_id.remove(&key);
        self.thumbnails.remove(&id);
        self.tracker.forget(id);
        self.selection.clear();
        self.refresh_panel();
        self.bus.emit(SyncEvent::FeatureDeleted { id });
        self.refit_view();
    }

    /// Keyboard shortcuts: Escape (deselect or toggle the selection tool),
    /// Delete, and platform-modifier Z/Y for undo/redo.
    pub async fn on_key(&mut self, key: &Key, modifiers: Modifiers) {
        match key.0.as_str() {
            "Escape" => {
                if self.selection.is_empty() {
                    self.mode = match self.mode {
                        Mode::Idle => Mode::Selecting,
                        _ => Mode::Idle,
                    };
                } else {
                    // Deselect-with-commit.
                    self.on_select(Vec::new()).await;
                }
            }
            "Delete" => {
                if !self.selection.is_empty() {
                    self.on_delete().await;
                }
            }
            "z" | "Z" if modifiers.platform() => self.history.undo(),
            "y" | "Y" if modifiers.platform() => self.history.redo(),
            _ => {}
        }
    }

    /// Clipboard-import entry point: each non-empty line is independently
    /// validated and added. Parse failures are collected per line and
    /// never abort the rest of the paste.
    pub async fn import_text(&mut self, text: &str) -> ImportReport {
        let mut report = ImportReport::default();

        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match wkt::parse(trimmed) {
                Ok(canonical) => {
                    let Some(id) = self.store.add(&canonical).await else {
                        continue;
                    };
                    if self.id_to_key.contains_key(&id) {
                        debug!(%id, line = index + 1, "imported line duplicates an existing record");
                        continue;
                    }
                    let projected = canonical.map_coords(|c| self.projection.to_projected(c));
                    let key = self.layer.insert(LiveFeature { geometry: projected });
                    self.id_to_key.insert(id, key);
                    self.key_to_id.insert(key, id);
                    self.refresh_thumbnail(id).await;
                    self.bus.emit(SyncEvent::FeatureCreated { id });
                    report.added.push(id);
                }
                Err(error) => report.failures.push(ImportFailure { line: index + 1, error }),
            }
        }

        if !report.added.is_empty() {
            self.refit_view();
        }
        report
    }

    // --- Internals ---

    /// Run the change detector for one live feature, refreshing its
    /// thumbnail and notifying views when an edit was committed.
    async fn commit_feature(&mut self, key: FeatureKey) {
        let Some(id) = self.key_to_id.get(&key).copied() else {
            return;
        };
        let Some(feature) = self.layer.get(key) else {
            return;
        };
        let canonical = self.to_geographic(&feature.geometry);
        if self.store.changed(id, &canonical).await {
            self.refresh_thumbnail(id).await;
            self.bus.emit(SyncEvent::FeatureModified { id });
        }
    }

    /// Re-rasterize a record's thumbnail, discarding the result if another
    /// request for the same record was issued in the meantime.
    async fn refresh_thumbnail(&mut self, id: Uuid) {
        let Some(text) = self.store.record(id).map(|r| r.wkt.clone()) else {
            return;
        };
        let generation = self.tracker.begin(id);
        let raster = thumbnail::rasterize(&text).await;
        if !self.tracker.is_current(id, generation) {
            debug!(%id, "discarding stale thumbnail result");
            return;
        }
        match raster {
            Some(img) => {
                self.thumbnails.insert(id, img);
            }
            None => {
                self.thumbnails.remove(&id);
            }
        }
    }

    fn refresh_panel(&mut self) {
        self.panel_text = match self.selection.len() {
            0 => String::new(),
            1 => self.canonical_text(self.selection[0]).unwrap_or_default(),
            _ => {
                let canonicals: Vec<Geometry> = self
                    .selection
                    .iter()
                    .filter_map(|&key| self.layer.get(key))
                    .map(|f| self.to_geographic(&f.geometry))
                    .collect();
                let refs: Vec<&Geometry> = canonicals.iter().collect();
                combine::combine(&refs, self.settings.combine_policy())
                    .map(|g| wkt::write(&g))
                    .unwrap_or_default()
            }
        };
    }

    fn canonical_text(&self, key: FeatureKey) -> Option<String> {
        let feature = self.layer.get(key)?;
        Some(wkt::write(&self.to_geographic(&feature.geometry)))
    }

    fn to_geographic(&self, geometry: &Geometry) -> Geometry {
        geometry.map_coords(|c| self.projection.to_geographic(c))
    }

    fn record_ids_of(&self, keys: &[FeatureKey]) -> Vec<Uuid> {
        keys.iter().filter_map(|k| self.key_to_id.get(k).copied()).collect()
    }

    fn refit_view(&mut self) {
        if let Some(extent) = self.layer.bounding_box() {
            self.view.fit_to(extent);
        }
    }
}

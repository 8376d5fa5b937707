//! Live feature layer and map-surface boundary traits.
//!
//! The map surface owns the rendered geometry objects; this module models
//! its feature collection as an arena so the engine can be exercised
//! without a map. Persistent identity is never embedded in a live feature —
//! the controller keeps an explicit record-id to [`FeatureKey`] mapping.

#[cfg(test)]
#[path = "surface_test.rs"]
mod surface_test;

use crate::wkt::{Coord, Geometry, Rect};

/// Stable handle to a slot in a [`FeatureLayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureKey(usize);

/// An editable geometry held by the map surface.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveFeature {
    pub geometry: Geometry,
}

/// Arena of live features: insert/remove/get/iterate, with slot reuse.
#[derive(Default)]
pub struct FeatureLayer {
    slots: Vec<Option<LiveFeature>>,
    free: Vec<usize>,
}

impl FeatureLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feature, returning its key.
    pub fn insert(&mut self, feature: LiveFeature) -> FeatureKey {
        if let Some(index) = self.free.pop() {
            self.slots[index] = Some(feature);
            FeatureKey(index)
        } else {
            self.slots.push(Some(feature));
            FeatureKey(self.slots.len() - 1)
        }
    }

    /// Remove a feature by key, returning it if it was present.
    pub fn remove(&mut self, key: FeatureKey) -> Option<LiveFeature> {
        let slot = self.slots.get_mut(key.0)?;
        let feature = slot.take();
        if feature.is_some() {
            self.free.push(key.0);
        }
        feature
    }

    #[must_use]
    pub fn get(&self, key: FeatureKey) -> Option<&LiveFeature> {
        self.slots.get(key.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, key: FeatureKey) -> Option<&mut LiveFeature> {
        self.slots.get_mut(key.0).and_then(Option::as_mut)
    }

    /// Iterate live features with their keys.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureKey, &LiveFeature)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|f| (FeatureKey(i), f)))
    }

    /// Number of live features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bounding box covering every live feature, or `None` when the layer
    /// is empty (or holds only EMPTY geometries).
    #[must_use]
    pub fn bounding_box(&self) -> Option<Rect> {
        self.iter()
            .filter_map(|(_, f)| f.geometry.bounding_box())
            .reduce(Rect::union)
    }
}

// =============================================================
// Boundary traits (external collaborators)
// =============================================================

/// Map framing: the surface recenters/zooms to show the given extent.
pub trait MapView {
    fn fit_to(&mut self, extent: Rect);
}

/// Undo/redo facility supplied by the mapping toolkit.
pub trait UndoRedo {
    fn undo(&mut self);
    fn redo(&mut self);
}

/// Two-projection transform between the surface's projected meter system
/// and geographic degrees. The engine canonicalizes in geographic space.
pub trait Projection {
    fn to_geographic(&self, c: Coord) -> Coord;
    fn to_projected(&self, c: Coord) -> Coord;
}

/// Identity transform for surfaces already working in geographic degrees,
/// and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityProjection;

impl Projection for IdentityProjection {
    fn to_geographic(&self, c: Coord) -> Coord {
        c
    }

    fn to_projected(&self, c: Coord) -> Coord {
        c
    }
}

//! Shared constants for the geometry synchronization engine.

// ── Persistence ─────────────────────────────────────────────────

/// Storage key under which the geometry record list is persisted.
pub const GEOMETRIES_KEY: &str = "geosketch.geometries";

// ── Thumbnails ──────────────────────────────────────────────────

/// Thumbnail raster width in pixels.
pub const THUMB_WIDTH: u32 = 96;

/// Thumbnail raster height in pixels.
pub const THUMB_HEIGHT: u32 = 96;

/// Zoom-out factor applied when fitting a geometry into the thumbnail
/// canvas, leaving visual margin around the shape.
pub const THUMB_PADDING: f64 = 1.25;

/// Radius in pixels of the disc drawn for a point geometry.
pub const THUMB_POINT_RADIUS: i32 = 3;

// ── Geometry ────────────────────────────────────────────────────

/// Coordinate tolerance for intersection and containment tests.
pub const GEOM_EPSILON: f64 = 1e-9;

/// Display truncation length for content hashes in the list view.
pub const HASH_DISPLAY_LEN: usize = 8;

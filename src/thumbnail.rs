//! Thumbnail rasterization for the geometry list view.
//!
//! Renders a geometry into a fixed-size RGBA raster: the geometry is fitted
//! uniformly into the canvas with a zoom-out margin, mapped to pixels with
//! the vertical axis inverted (north-up to down-positive), and drawn over a
//! static background tile with distinct treatments per kind — filled and
//! stroked polygons, stroked lines, disc points.
//!
//! Rasterization runs off the interaction thread and results can arrive out
//! of order under rapid successive edits; [`ThumbnailTracker`] hands out a
//! generation per request so a stale result is discarded instead of
//! overwriting a newer one.

#[cfg(test)]
#[path = "thumbnail_test.rs"]
mod thumbnail_test;

use std::collections::HashMap;
use std::sync::OnceLock;

use image::{Rgba, RgbaImage};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::consts::{THUMB_HEIGHT, THUMB_PADDING, THUMB_POINT_RADIUS, THUMB_WIDTH};
use crate::wkt::{self, Coord, Geometry, Ring};

/// Background base tone.
const BG_BASE: Rgba<u8> = Rgba([245, 241, 232, 255]);
/// Background graticule lines.
const BG_GRID: Rgba<u8> = Rgba([224, 218, 204, 255]);
/// Graticule spacing in pixels.
const BG_GRID_STEP: u32 = 16;
/// Outline color for every kind.
const STROKE: Rgba<u8> = Rgba([31, 26, 23, 255]);
/// Translucent polygon fill.
const POLY_FILL: Rgba<u8> = Rgba([91, 155, 213, 96]);
/// Point disc fill.
const POINT_FILL: Rgba<u8> = Rgba([217, 75, 75, 255]);

/// Rasterize WKT text into a thumbnail image.
///
/// Returns `None` for empty, unparsable, or coordinate-less (`EMPTY`)
/// input. The returned image is owned by the caller and is expected to be
/// dropped once displayed; nothing is cached here.
pub async fn rasterize(wkt_text: &str) -> Option<RgbaImage> {
    let text = wkt_text.trim().to_owned();
    if text.is_empty() {
        return None;
    }
    match tokio::task::spawn_blocking(move || render(&text)).await {
        Ok(raster) => raster,
        Err(e) => {
            warn!(error = %e, "rasterization task failed");
            None
        }
    }
}

fn render(text: &str) -> Option<RgbaImage> {
    let geometry = match wkt::parse(text) {
        Ok(g) => g,
        Err(e) => {
            debug!(error = %e, "skipping thumbnail for unparsable text");
            return None;
        }
    };
    let bbox = geometry.bounding_box()?;

    let mut img = background_tile().clone();
    let mapper = PixelMapper::fit(bbox);
    draw_geometry(&mut img, &geometry, &mapper);
    Some(img)
}

/// The shared background: a flat base with a faint graticule.
fn background_tile() -> &'static RgbaImage {
    static TILE: OnceLock<RgbaImage> = OnceLock::new();
    TILE.get_or_init(|| {
        let mut img = RgbaImage::from_pixel(THUMB_WIDTH, THUMB_HEIGHT, BG_BASE);
        for y in 0..THUMB_HEIGHT {
            for x in 0..THUMB_WIDTH {
                if x % BG_GRID_STEP == 0 || y % BG_GRID_STEP == 0 {
                    img.put_pixel(x, y, BG_GRID);
                }
            }
        }
        img
    })
}

/// World-to-pixel transform: uniform scale fitting the bounding box into
/// the canvas with margin, y inverted.
struct PixelMapper {
    center: Coord,
    scale: f64,
}

impl PixelMapper {
    fn fit(bbox: wkt::Rect) -> Self {
        let w = bbox.width();
        let h = bbox.height();
        let scale = if w <= 0.0 && h <= 0.0 {
            // A lone point has no extent; any scale centers it.
            1.0
        } else {
            let sx = f64::from(THUMB_WIDTH) / w.max(f64::EPSILON);
            let sy = f64::from(THUMB_HEIGHT) / h.max(f64::EPSILON);
            sx.min(sy) / THUMB_PADDING
        };
        Self { center: bbox.center(), scale }
    }

    fn to_pixel(&self, c: Coord) -> (f64, f64) {
        let px = f64::from(THUMB_WIDTH) * 0.5 + (c.x - self.center.x) * self.scale;
        let py = f64::from(THUMB_HEIGHT) * 0.5 - (c.y - self.center.y) * self.scale;
        (px, py)
    }
}

fn draw_geometry(img: &mut RgbaImage, geometry: &Geometry, mapper: &PixelMapper) {
    match geometry {
        Geometry::Point(c) => draw_point(img, mapper.to_pixel(*c)),
        Geometry::LineString(coords) => stroke_path(img, coords, mapper),
        Geometry::Polygon(rings) => draw_polygon(img, rings, mapper),
        Geometry::MultiPolygon(parts) => {
            for rings in parts {
                draw_polygon(img, rings, mapper);
            }
        }
    }
}

fn draw_polygon(img: &mut RgbaImage, rings: &[Ring], mapper: &PixelMapper) {
    fill_rings(img, rings, mapper);
    for ring in rings {
        stroke_path(img, ring, mapper);
    }
}

/// Even-odd scanline fill over all rings of one polygon, so holes are left
/// unfilled without special-casing them.
fn fill_rings(img: &mut RgbaImage, rings: &[Ring], mapper: &PixelMapper) {
    let edges: Vec<((f64, f64), (f64, f64))> = rings
        .iter()
        .flat_map(|ring| {
            ring.windows(2)
                .map(|pair| (mapper.to_pixel(pair[0]), mapper.to_pixel(pair[1])))
        })
        .collect();
    if edges.is_empty() {
        return;
    }

    for y in 0..THUMB_HEIGHT {
        let sample = f64::from(y) + 0.5;
        let mut crossings: Vec<f64> = edges
            .iter()
            .filter(|((_, ay), (_, by))| (*ay > sample) != (*by > sample))
            .map(|((ax, ay), (bx, by))| ax + (sample - ay) / (by - ay) * (bx - ax))
            .collect();
        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            let lo = span[0].ceil().max(0.0);
            let hi = span[1].floor().min(f64::from(THUMB_WIDTH - 1));
            if hi < lo {
                continue;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            for x in (lo as u32)..=(hi as u32) {
                blend_pixel(img, x, y, POLY_FILL);
            }
        }
    }
}

fn stroke_path(img: &mut RgbaImage, coords: &[Coord], mapper: &PixelMapper) {
    for pair in coords.windows(2) {
        let (ax, ay) = mapper.to_pixel(pair[0]);
        let (bx, by) = mapper.to_pixel(pair[1]);
        draw_line(img, ax, ay, bx, by);
    }
}

/// Bresenham line with blending.
#[allow(clippy::cast_possible_truncation)]
fn draw_line(img: &mut RgbaImage, ax: f64, ay: f64, bx: f64, by: f64) {
    let (mut x0, mut y0) = (ax.round() as i64, ay.round() as i64);
    let (x1, y1) = (bx.round() as i64, by.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_clipped(img, x0, y0, STROKE);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let doubled = 2 * err;
        if doubled >= dy {
            err += dy;
            x0 += sx;
        }
        if doubled <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn draw_point(img: &mut RgbaImage, (px, py): (f64, f64)) {
    let r = THUMB_POINT_RADIUS;
    let (cx, cy) = (px.round() as i64, py.round() as i64);
    for dy in -r..=r {
        for dx in -r..=r {
            let dist_sq = dx * dx + dy * dy;
            if dist_sq <= r * r {
                let color = if dist_sq >= (r - 1) * (r - 1) { STROKE } else { POINT_FILL };
                put_clipped(img, cx + i64::from(dx), cy + i64::from(dy), color);
            }
        }
    }
}

fn put_clipped(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && x < i64::from(THUMB_WIDTH) && y < i64::from(THUMB_HEIGHT) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        blend_pixel(img, x as u32, y as u32, color);
    }
}

/// Source-over alpha blend.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend_pixel(img: &mut RgbaImage, x: u32, y: u32, src: Rgba<u8>) {
    let dst = img.get_pixel(x, y);
    let alpha = f64::from(src.0[3]) / 255.0;
    let mix = |s: u8, d: u8| -> u8 {
        let v = f64::from(s) * alpha + f64::from(d) * (1.0 - alpha);
        v.round().clamp(0.0, 255.0) as u8
    };
    let blended = Rgba([
        mix(src.0[0], dst.0[0]),
        mix(src.0[1], dst.0[1]),
        mix(src.0[2], dst.0[2]),
        dst.0[3].max(src.0[3]),
    ]);
    img.put_pixel(x, y, blended);
}

// =============================================================
// Staleness control
// =============================================================

/// Per-record generation counters for in-flight rasterizations.
#[derive(Default)]
pub struct ThumbnailTracker {
    generations: HashMap<Uuid, u64>,
}

impl ThumbnailTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new rasterization request for `id`, superseding any
    /// in-flight one. Returns the generation to present to
    /// [`Self::is_current`] when the result arrives.
    pub fn begin(&mut self, id: Uuid) -> u64 {
        let counter = self.generations.entry(id).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Whether a result computed under `generation` is still the latest
    /// requested for `id`.
    #[must_use]
    pub fn is_current(&self, id: Uuid, generation: u64) -> bool {
        self.generations.get(&id) == Some(&generation)
    }

    /// Drop tracking for a deleted record.
    pub fn forget(&mut self, id: Uuid) {
        self.generations.remove(&id);
    }
}

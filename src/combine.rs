//! Multi-select geometry combination: join and boolean union.
//!
//! Both policies are pure, read-only projections used to populate the text
//! panel for a multi-selection — they never mutate the store or the
//! selected geometries, and the combined result is never persisted.
//!
//! Join wraps every polygonal input's rings into one multi-polygon without
//! touching boundaries. Union merges overlapping or adjacent areas by
//! tracing the outer boundary of each overlapping pair: rings are
//! normalized counter-clockwise, subdivided at boundary crossings, and
//! walked, always leaving a crossing on the edge that stays outside the
//! other ring. Union operates on exterior rings; holes are display-only
//! omissions (see DESIGN.md).

#[cfg(test)]
#[path = "combine_test.rs"]
mod combine_test;

use tracing::warn;

use crate::consts::GEOM_EPSILON;
use crate::settings::CombinePolicy;
use crate::wkt::{Coord, Geometry, Ring};

/// Combine ≥2 selected geometries under the given policy.
///
/// Non-polygonal geometries are excluded; `None` when nothing polygonal
/// remains (the text panel shows empty text).
#[must_use]
pub fn combine(geometries: &[&Geometry], policy: CombinePolicy) -> Option<Geometry> {
    match policy {
        CombinePolicy::Join => join(geometries),
        CombinePolicy::Union => union(geometries),
    }
}

/// Structural aggregation: all polygonal ring sets side by side in a single
/// multi-polygon, boundaries (and holes) unaltered.
#[must_use]
pub fn join(geometries: &[&Geometry]) -> Option<Geometry> {
    let mut polys: Vec<Vec<Ring>> = Vec::new();
    for geometry in geometries {
        match geometry {
            Geometry::Polygon(rings) if !rings.is_empty() => polys.push(rings.clone()),
            Geometry::MultiPolygon(parts) => {
                polys.extend(parts.iter().filter(|rings| !rings.is_empty()).cloned());
            }
            _ => {}
        }
    }
    if polys.is_empty() {
        None
    } else {
        Some(Geometry::MultiPolygon(polys))
    }
}

/// Boolean union: merge overlapping or adjacent areas into minimal
/// boundary rings; disjoint inputs stay separate rings.
#[must_use]
pub fn union(geometries: &[&Geometry]) -> Option<Geometry> {
    let mut exteriors: Vec<Ring> = Vec::new();
    for geometry in geometries {
        match geometry {
            Geometry::Polygon(rings) => {
                if let Some(open) = rings.first().and_then(|r| normalize_ring(r)) {
                    exteriors.push(open);
                }
            }
            Geometry::MultiPolygon(parts) => {
                for rings in parts {
                    if let Some(open) = rings.first().and_then(|r| normalize_ring(r)) {
                        exteriors.push(open);
                    }
                }
            }
            _ => {}
        }
    }
    if exteriors.is_empty() {
        return None;
    }

    // Fold each ring into a list of pairwise-disjoint merged rings. Every
    // merge shrinks the list, so the scan terminates.
    let mut merged: Vec<Ring> = Vec::new();
    for ring in exteriors {
        let mut current = ring;
        let mut i = 0;
        while i < merged.len() {
            match union_two(&merged[i], &current) {
                RingUnion::Disjoint => i += 1,
                RingUnion::FirstContainsSecond => {
                    current = merged.swap_remove(i);
                    i = 0;
                }
                RingUnion::SecondContainsFirst => {
                    merged.swap_remove(i);
                }
                RingUnion::Merged(combined) => {
                    merged.swap_remove(i);
                    current = combined;
                    i = 0;
                }
            }
        }
        merged.push(current);
    }

    let mut closed = merged.into_iter().map(close_ring).collect::<Vec<_>>();
    if closed.len() == 1 {
        let Some(only) = closed.pop() else {
            return None;
        };
        Some(Geometry::Polygon(vec![only]))
    } else {
        Some(Geometry::MultiPolygon(closed.into_iter().map(|r| vec![r]).collect()))
    }
}

// =============================================================
// Ring normalization and measures
// =============================================================

/// Open, deduplicate, and orient a ring counter-clockwise. `None` for
/// degenerate rings (fewer than three distinct vertices or ~zero area).
fn normalize_ring(ring: &Ring) -> Option<Ring> {
    let mut open: Ring = Vec::with_capacity(ring.len());
    for &c in ring {
        if open.last().is_none_or(|&prev| !near(prev, c)) {
            open.push(c);
        }
    }
    while open.len() > 1 && near(open[0], open[open.len() - 1]) {
        open.pop();
    }
    if open.len() < 3 {
        return None;
    }

    let area = ring_area(&open);
    if area.abs() < GEOM_EPSILON {
        return None;
    }
    if area < 0.0 {
        open.reverse();
    }
    Some(open)
}

fn close_ring(mut open: Ring) -> Ring {
    if let Some(&first) = open.first() {
        open.push(first);
    }
    open
}

/// Signed shoelace area of an open ring; positive = counter-clockwise.
fn ring_area(open: &Ring) -> f64 {
    let n = open.len();
    let mut acc = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        acc += open[i].x * open[j].y - open[j].x * open[i].y;
    }
    acc * 0.5
}

fn near(a: Coord, b: Coord) -> bool {
    (a.x - b.x).abs() < GEOM_EPSILON && (a.y - b.y).abs() < GEOM_EPSILON
}

/// Signed angle from direction `d` to direction `c` in (-π, π]; negative is
/// a clockwise (right) turn, π is a U-turn.
fn turn_angle(d: Coord, c: Coord) -> f64 {
    let cross = d.x * c.y - d.y * c.x;
    let dot = d.x * c.x + d.y * c.y;
    cross.atan2(dot)
}

/// Distance from `p` to the segment `a..b`.
fn segment_distance(p: Coord, a: Coord, b: Coord) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq < GEOM_EPSILON {
        0.0
    } else {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

fn on_boundary(p: Coord, open: &Ring) -> bool {
    let n = open.len();
    (0..n).any(|i| segment_distance(p, open[i], open[(i + 1) % n]) < GEOM_EPSILON)
}

/// Even-odd containment test; boundary points count as outside.
fn strictly_inside(p: Coord, open: &Ring) -> bool {
    if on_boundary(p, open) {
        return false;
    }
    let n = open.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (open[i], open[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_at = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_at {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

// =============================================================
// Pairwise union
// =============================================================

enum RingUnion {
    Disjoint,
    FirstContainsSecond,
    SecondContainsFirst,
    /// Overlapping boundaries merged into one outer ring (open, CCW).
    Merged(Ring),
}

/// Intersection points of two segments, including the endpoints of a
/// collinear overlap. Zero, one, or two points.
fn segment_intersections(p1: Coord, p2: Coord, p3: Coord, p4: Coord) -> Vec<Coord> {
    let r = Coord::new(p2.x - p1.x, p2.y - p1.y);
    let s = Coord::new(p4.x - p3.x, p4.y - p3.y);
    let denom = r.x * s.y - r.y * s.x;
    let qp = Coord::new(p3.x - p1.x, p3.y - p1.y);

    if denom.abs() > GEOM_EPSILON {
        let t = (qp.x * s.y - qp.y * s.x) / denom;
        let u = (qp.x * r.y - qp.y * r.x) / denom;
        if (-GEOM_EPSILON..=1.0 + GEOM_EPSILON).contains(&t)
            && (-GEOM_EPSILON..=1.0 + GEOM_EPSILON).contains(&u)
        {
            return vec![Coord::new(p1.x + t * r.x, p1.y + t * r.y)];
        }
        return Vec::new();
    }

    // Parallel: only a collinear overlap produces points.
    if (qp.x * r.y - qp.y * r.x).abs() > GEOM_EPSILON {
        return Vec::new();
    }
    let len_sq = r.x * r.x + r.y * r.y;
    if len_sq < GEOM_EPSILON {
        return Vec::new();
    }
    let t3 = (qp.x * r.x + qp.y * r.y) / len_sq;
    let t4 = ((p4.x - p1.x) * r.x + (p4.y - p1.y) * r.y) / len_sq;
    let lo = t3.min(t4).max(0.0);
    let hi = t3.max(t4).min(1.0);
    if lo > hi + GEOM_EPSILON {
        return Vec::new();
    }
    let first = Coord::new(p1.x + lo * r.x, p1.y + lo * r.y);
    let second = Coord::new(p1.x + hi * r.x, p1.y + hi * r.y);
    if near(first, second) {
        vec![first]
    } else {
        vec![first, second]
    }
}

/// One entry of an augmented ring walk: a coordinate, and the shared
/// crossing-node id when this entry lies on the other ring's boundary.
#[derive(Clone, Copy)]
struct WalkEntry {
    coord: Coord,
    node: Option<usize>,
}

/// Subdivide `open` at every crossing with `other`, keeping edge order.
/// `nodes` assigns a shared id to each distinct crossing coordinate.
fn augment(open: &Ring, other: &Ring, nodes: &mut Vec<Coord>) -> Vec<WalkEntry> {
    let n = open.len();
    let m = other.len();
    let mut entries: Vec<WalkEntry> = Vec::with_capacity(n + 4);

    for i in 0..n {
        let (a, b) = (open[i], open[(i + 1) % n]);
        entries.push(WalkEntry { coord: a, node: node_near(nodes, a) });

        // Crossings on this edge, ordered by distance from its start.
        let mut crossings: Vec<(f64, Coord)> = Vec::new();
        for j in 0..m {
            for p in segment_intersections(a, b, other[j], other[(j + 1) % m]) {
                let along = (p.x - a.x).hypot(p.y - a.y);
                crossings.push((along, p));
            }
        }
        crossings.sort_by(|x, y| x.0.total_cmp(&y.0));

        for (_, p) in crossings {
            if near(p, a) || near(p, b) {
                // Vertex crossings surface when the vertex itself is pushed.
                intern_node(nodes, p);
                continue;
            }
            let id = intern_node(nodes, p);
            if entries.last().is_some_and(|e| e.node == Some(id)) {
                continue;
            }
            entries.push(WalkEntry { coord: p, node: Some(id) });
        }
    }

    // Vertices that coincide with a crossing node registered later in the
    // scan get their node id stitched in now.
    for entry in &mut entries {
        if entry.node.is_none() {
            entry.node = node_near(nodes, entry.coord);
        }
    }
    entries
}

fn intern_node(nodes: &mut Vec<Coord>, p: Coord) -> usize {
    if let Some(id) = node_near(nodes, p) {
        return id;
    }
    nodes.push(p);
    nodes.len() - 1
}

fn node_near(nodes: &[Coord], p: Coord) -> Option<usize> {
    nodes.iter().position(|&n| near(n, p))
}

fn node_position(entries: &[WalkEntry], node: usize) -> Option<usize> {
    entries.iter().position(|e| e.node == Some(node))
}

/// Union of two open CCW rings.
fn union_two(first: &Ring, second: &Ring) -> RingUnion {
    let mut nodes: Vec<Coord> = Vec::new();
    let first_walk = augment(first, second, &mut nodes);
    let second_walk = augment(second, first, &mut nodes);

    if nodes.is_empty() {
        if strictly_inside(second[0], first) {
            return RingUnion::FirstContainsSecond;
        }
        if strictly_inside(first[0], second) {
            return RingUnion::SecondContainsFirst;
        }
        return RingUnion::Disjoint;
    }

    // Start on a plain vertex that is strictly outside the other ring; the
    // outer boundary passes through it exactly once.
    let start = first_walk
        .iter()
        .position(|e| e.node.is_none() && !strictly_inside(e.coord, second))
        .map(|idx| (true, idx))
        .or_else(|| {
            second_walk
                .iter()
                .position(|e| e.node.is_none() && !strictly_inside(e.coord, first))
                .map(|idx| (false, idx))
        });
    let Some(start) = start else {
        // Boundaries coincide everywhere that matters: keep the larger.
        return if ring_area(first).abs() >= ring_area(second).abs() {
            RingUnion::Merged(first.clone())
        } else {
            RingUnion::Merged(second.clone())
        };
    };

    let cap = 2 * (first_walk.len() + second_walk.len()) + 4;
    let mut out: Ring = Vec::new();
    let mut cursor = start;
    loop {
        let (on_first, idx) = cursor;
        let (walk, other_walk) = if on_first {
            (&first_walk, &second_walk)
        } else {
            (&second_walk, &first_walk)
        };
        let entry = walk[idx];
        if out.last().is_none_or(|&prev| !near(prev, entry.coord)) {
            out.push(entry.coord);
        }
        if out.len() > cap {
            warn!("union boundary trace did not close; treating rings as disjoint");
            return RingUnion::Disjoint;
        }

        cursor = match entry.node {
            None => (on_first, (idx + 1) % walk.len()),
            Some(node) => {
                // At a crossing, take the most clockwise outgoing edge
                // relative to the incoming direction. That hugs the outer
                // face of the planar overlay, which is the union boundary.
                let prev = out[out.len().saturating_sub(2)];
                let incoming = Coord::new(entry.coord.x - prev.x, entry.coord.y - prev.y);

                let continue_to = (on_first, (idx + 1) % walk.len());
                let continue_coord = walk[continue_to.1].coord;
                let continue_turn = turn_angle(
                    incoming,
                    Coord::new(continue_coord.x - entry.coord.x, continue_coord.y - entry.coord.y),
                );

                match node_position(other_walk, node) {
                    Some(other_idx) => {
                        let switch_to = (!on_first, (other_idx + 1) % other_walk.len());
                        let switch_coord = other_walk[switch_to.1].coord;
                        let switch_turn = turn_angle(
                            incoming,
                            Coord::new(switch_coord.x - entry.coord.x, switch_coord.y - entry.coord.y),
                        );
                        if switch_turn.total_cmp(&continue_turn).is_lt() {
                            switch_to
                        } else {
                            continue_to
                        }
                    }
                    None => continue_to,
                }
            }
        };

        if cursor == start {
            break;
        }
    }

    while out.len() > 1 && near(out[0], out[out.len() - 1]) {
        out.pop();
    }
    if out.len() < 3 {
        warn!("union boundary trace collapsed; treating rings as disjoint");
        return RingUnion::Disjoint;
    }
    RingUnion::Merged(out)
}

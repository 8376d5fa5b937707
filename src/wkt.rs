//! WKT geometry model, parser, and canonical writer.
//!
//! The writer is the single canonicalization authority in the engine: the
//! text it produces is what gets hashed for deduplication and compared for
//! change detection, so formatting is deterministic — uppercase tags, the
//! tag immediately followed by `(`, coordinates as `x y` joined by `,`, and
//! shortest round-trip float formatting. The parser is deliberately more
//! liberal than the writer (case-insensitive tags, arbitrary whitespace) so
//! pasted text from other tools is accepted; re-writing a parsed geometry
//! always yields canonical form.

#[cfg(test)]
#[path = "wkt_test.rs"]
mod wkt_test;

/// A 2D coordinate in the geographic (degree) system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A closed ring of coordinates. The first ring of a polygon is the
/// exterior boundary; subsequent rings are holes.
pub type Ring = Vec<Coord>;

/// A parsed geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    LineString(Vec<Coord>),
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    /// Whether this geometry contributes rings to a multi-select
    /// combination (join or union).
    #[must_use]
    pub fn is_polygonal(&self) -> bool {
        matches!(self, Self::Polygon(_) | Self::MultiPolygon(_))
    }

    /// Axis-aligned bounding box, or `None` for a geometry with no
    /// coordinates (`EMPTY` forms).
    #[must_use]
    pub fn bounding_box(&self) -> Option<Rect> {
        let mut bbox: Option<Rect> = None;
        self.for_each_coord(&mut |c| {
            bbox = Some(match bbox {
                None => Rect::point(c),
                Some(r) => r.expanded(c),
            });
        });
        bbox
    }

    /// Transform every coordinate, preserving structure. Used to move a
    /// geometry between the surface's projected system and geographic
    /// degrees before canonicalization.
    #[must_use]
    pub fn map_coords(&self, f: impl Fn(Coord) -> Coord) -> Self {
        let map_ring = |ring: &Ring| ring.iter().map(|&c| f(c)).collect::<Ring>();
        match self {
            Self::Point(c) => Self::Point(f(*c)),
            Self::LineString(coords) => Self::LineString(map_ring(coords)),
            Self::Polygon(rings) => Self::Polygon(rings.iter().map(&map_ring).collect()),
            Self::MultiPolygon(polys) => Self::MultiPolygon(
                polys.iter().map(|rings| rings.iter().map(&map_ring).collect()).collect(),
            ),
        }
    }

    fn for_each_coord(&self, f: &mut impl FnMut(Coord)) {
        match self {
            Self::Point(c) => f(*c),
            Self::LineString(coords) => coords.iter().copied().for_each(f),
            Self::Polygon(rings) => {
                for ring in rings {
                    ring.iter().copied().for_each(&mut *f);
                }
            }
            Self::MultiPolygon(polys) => {
                for rings in polys {
                    for ring in rings {
                        ring.iter().copied().for_each(&mut *f);
                    }
                }
            }
        }
    }
}

/// Axis-aligned rectangle in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    /// Degenerate rect covering a single coordinate.
    #[must_use]
    pub fn point(c: Coord) -> Self {
        Self { min_x: c.x, min_y: c.y, max_x: c.x, max_y: c.y }
    }

    /// Smallest rect covering `self` and `c`.
    #[must_use]
    pub fn expanded(self, c: Coord) -> Self {
        Self {
            min_x: self.min_x.min(c.x),
            min_y: self.min_y.min(c.y),
            max_x: self.max_x.max(c.x),
            max_y: self.max_y.max(c.y),
        }
    }

    /// Smallest rect covering both rects.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    #[must_use]
    pub fn center(&self) -> Coord {
        Coord::new((self.min_x + self.max_x) * 0.5, (self.min_y + self.max_y) * 0.5)
    }
}

/// Error returned by [`parse`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WktError {
    /// Input was empty or all whitespace.
    #[error("empty geometry text")]
    Empty,
    /// The leading tag is not a supported geometry type.
    #[error("unknown geometry tag {0:?}")]
    UnknownTag(String),
    /// `POINT EMPTY` carries no coordinate and cannot enter the store.
    #[error("POINT EMPTY has no coordinate")]
    EmptyPoint,
    /// A coordinate component failed to parse as a number.
    #[error("invalid number {text:?} at offset {offset}")]
    InvalidNumber { text: String, offset: usize },
    /// A structural token was missing.
    #[error("expected {expected} at offset {offset}")]
    Expected { expected: &'static str, offset: usize },
    /// Extra characters after a complete geometry.
    #[error("trailing characters at offset {0}")]
    Trailing(usize),
}

/// Parse WKT text into a [`Geometry`].
///
/// Accepts `POINT`, `LINESTRING`, `POLYGON` and `MULTIPOLYGON`, with
/// case-insensitive tags and arbitrary whitespace. `EMPTY` is accepted for
/// the sequence types and yields empty coordinate sets.
///
/// # Errors
///
/// Returns a [`WktError`] describing the first problem encountered.
pub fn parse(input: &str) -> Result<Geometry, WktError> {
    let mut cursor = Cursor::new(input);
    cursor.skip_ws();
    if cursor.at_end() {
        return Err(WktError::Empty);
    }

    let tag = cursor.read_word();
    let geometry = match tag.to_ascii_uppercase().as_str() {
        "POINT" => parse_point(&mut cursor)?,
        "LINESTRING" => parse_linestring(&mut cursor)?,
        "POLYGON" => parse_polygon(&mut cursor)?,
        "MULTIPOLYGON" => parse_multipolygon(&mut cursor)?,
        _ => return Err(WktError::UnknownTag(tag)),
    };

    cursor.skip_ws();
    if !cursor.at_end() {
        return Err(WktError::Trailing(cursor.pos));
    }
    Ok(geometry)
}

/// Write a geometry in canonical form.
#[must_use]
pub fn write(geometry: &Geometry) -> String {
    let mut out = String::new();
    match geometry {
        Geometry::Point(c) => {
            out.push_str("POINT(");
            write_coord(&mut out, *c);
            out.push(')');
        }
        Geometry::LineString(coords) => {
            if coords.is_empty() {
                out.push_str("LINESTRING EMPTY");
            } else {
                out.push_str("LINESTRING(");
                write_coord_seq(&mut out, coords);
                out.push(')');
            }
        }
        Geometry::Polygon(rings) => {
            if rings.is_empty() {
                out.push_str("POLYGON EMPTY");
            } else {
                out.push_str("POLYGON");
                write_rings(&mut out, rings);
            }
        }
        Geometry::MultiPolygon(polys) => {
            if polys.is_empty() {
                out.push_str("MULTIPOLYGON EMPTY");
            } else {
                out.push_str("MULTIPOLYGON(");
                for (i, rings) in polys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_rings(&mut out, rings);
                }
                out.push(')');
            }
        }
    }
    out
}

fn write_rings(out: &mut String, rings: &[Ring]) {
    out.push('(');
    for (i, ring) in rings.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('(');
        write_coord_seq(out, ring);
        out.push(')');
    }
    out.push(')');
}

fn write_coord_seq(out: &mut String, coords: &[Coord]) {
    for (i, c) in coords.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_coord(out, *c);
    }
}

fn write_coord(out: &mut String, c: Coord) {
    out.push_str(&format!("{} {}", c.x, c.y));
}

// =============================================================
// Parsing internals
// =============================================================

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    /// Read a run of ASCII letters (a geometry tag or the `EMPTY` keyword).
    fn read_word(&mut self) -> String {
        let rest = self.rest();
        let end = rest
            .find(|ch: char| !ch.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let word = &rest[..end];
        self.pos += end;
        word.to_owned()
    }

    /// Consume `ch` or fail with an [`WktError::Expected`].
    fn expect_char(&mut self, ch: char, expected: &'static str) -> Result<(), WktError> {
        self.skip_ws();
        if self.rest().starts_with(ch) {
            self.pos += ch.len_utf8();
            Ok(())
        } else {
            Err(WktError::Expected { expected, offset: self.pos })
        }
    }

    /// True (and consumed) if the next word is `EMPTY`, case-insensitive.
    fn take_empty_keyword(&mut self) -> bool {
        self.skip_ws();
        let mark = self.pos;
        let word = self.read_word();
        if word.eq_ignore_ascii_case("EMPTY") {
            true
        } else {
            self.pos = mark;
            false
        }
    }

    fn read_number(&mut self) -> Result<f64, WktError> {
        self.skip_ws();
        let rest = self.rest();
        let end = rest
            .find(|ch: char| !(ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.' | 'e' | 'E')))
            .unwrap_or(rest.len());
        let text = &rest[..end];
        let offset = self.pos;
        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => {
                self.pos += end;
                Ok(value)
            }
            _ => Err(WktError::InvalidNumber { text: text.to_owned(), offset }),
        }
    }

    fn read_coord(&mut self) -> Result<Coord, WktError> {
        let x = self.read_number()?;
        let y = self.read_number()?;
        Ok(Coord::new(x, y))
    }

    /// Read `c, c, c` until the closing paren, consuming it.
    fn read_coord_seq(&mut self) -> Result<Vec<Coord>, WktError> {
        let mut coords = vec![self.read_coord()?];
        loop {
            self.skip_ws();
            if self.rest().starts_with(',') {
                self.pos += 1;
                coords.push(self.read_coord()?);
            } else {
                self.expect_char(')', "`,` or `)`")?;
                return Ok(coords);
            }
        }
    }

    /// Read `(seq),(seq)` ring list until the closing paren, consuming it.
    fn read_ring_list(&mut self) -> Result<Vec<Ring>, WktError> {
        let mut rings = Vec::new();
        loop {
            self.expect_char('(', "`(` opening a ring")?;
            rings.push(self.read_coord_seq()?);
            self.skip_ws();
            if self.rest().starts_with(',') {
                self.pos += 1;
            } else {
                self.expect_char(')', "`,` or `)`")?;
                return Ok(rings);
            }
        }
    }
}

fn parse_point(cursor: &mut Cursor) -> Result<Geometry, WktError> {
    if cursor.take_empty_keyword() {
        return Err(WktError::EmptyPoint);
    }
    cursor.expect_char('(', "`(` after POINT")?;
    let c = cursor.read_coord()?;
    cursor.expect_char(')', "`)` closing POINT")?;
    Ok(Geometry::Point(c))
}

fn parse_linestring(cursor: &mut Cursor) -> Result<Geometry, WktError> {
    if cursor.take_empty_keyword() {
        return Ok(Geometry::LineString(Vec::new()));
    }
    cursor.expect_char('(', "`(` after LINESTRING")?;
    Ok(Geometry::LineString(cursor.read_coord_seq()?))
}

fn parse_polygon(cursor: &mut Cursor) -> Result<Geometry, WktError> {
    if cursor.take_empty_keyword() {
        return Ok(Geometry::Polygon(Vec::new()));
    }
    cursor.expect_char('(', "`(` after POLYGON")?;
    Ok(Geometry::Polygon(cursor.read_ring_list()?))
}

fn parse_multipolygon(cursor: &mut Cursor) -> Result<Geometry, WktError> {
    if cursor.take_empty_keyword() {
        return Ok(Geometry::MultiPolygon(Vec::new()));
    }
    cursor.expect_char('(', "`(` after MULTIPOLYGON")?;
    let mut polys = Vec::new();
    loop {
        cursor.expect_char('(', "`(` opening a polygon")?;
        polys.push(cursor.read_ring_list()?);
        cursor.skip_ws();
        if cursor.rest().starts_with(',') {
            cursor.pos += 1;
        } else {
            cursor.expect_char(')', "`,` or `)`")?;
            return Ok(Geometry::MultiPolygon(polys));
        }
    }
}

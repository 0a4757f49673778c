//! Plant coordinates and vehicle occupancy envelopes.
//!
//! Coordinates are integer millimetres in the plant's layout frame.  Integer
//! arithmetic keeps envelope overlap tests exact: two envelopes that merely
//! touch along an edge are reported as overlapping, never as "almost".

/// A 2-D position in millimetres.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Couple {
    pub x: i64,
    pub y: i64,
}

impl Couple {
    #[inline]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in millimetres.
    pub fn distance(self, other: Couple) -> f64 {
        let dx = (other.x - self.x) as f64;
        let dy = (other.y - self.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::fmt::Display for Couple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// The physical footprint a vehicle occupies while standing on or travelling
/// along a resource, as a simple (non self-intersecting) polygon.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Envelope {
    pub vertices: Vec<Couple>,
}

impl Envelope {
    pub fn new(vertices: Vec<Couple>) -> Self {
        Self { vertices }
    }

    /// Axis-aligned rectangle spanning `min` to `max`.
    pub fn rect(min: Couple, max: Couple) -> Self {
        Self::new(vec![
            Couple::new(min.x, min.y),
            Couple::new(max.x, min.y),
            Couple::new(max.x, max.y),
            Couple::new(min.x, max.y),
        ])
    }

    /// Fewer than three vertices describe no area.
    pub fn is_empty(&self) -> bool {
        self.vertices.len() < 3
    }

    /// `(min, max)` corners of the bounding box, or `None` for an empty envelope.
    pub fn bounds(&self) -> Option<(Couple, Couple)> {
        if self.is_empty() {
            return None;
        }
        let mut min = self.vertices[0];
        let mut max = self.vertices[0];
        for v in &self.vertices[1..] {
            min.x = min.x.min(v.x);
            min.y = min.y.min(v.y);
            max.x = max.x.max(v.x);
            max.y = max.y.max(v.y);
        }
        Some((min, max))
    }

    /// `true` if the two polygons share any area or boundary point.
    ///
    /// Bounding boxes are compared first; the exact test checks every edge
    /// pair for intersection and then containment of one polygon in the other.
    pub fn overlaps(&self, other: &Envelope) -> bool {
        let (Some((a_min, a_max)), Some((b_min, b_max))) = (self.bounds(), other.bounds()) else {
            return false;
        };
        if a_max.x < b_min.x || b_max.x < a_min.x || a_max.y < b_min.y || b_max.y < a_min.y {
            return false;
        }

        for (p1, p2) in self.edges() {
            for (q1, q2) in other.edges() {
                if segments_intersect(p1, p2, q1, q2) {
                    return true;
                }
            }
        }

        self.contains(other.vertices[0]) || other.contains(self.vertices[0])
    }

    /// Even-odd point-in-polygon test (boundary points are handled by the
    /// edge test in [`overlaps`](Self::overlaps)).
    pub fn contains(&self, p: Couple) -> bool {
        if self.is_empty() {
            return false;
        }
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                // x coordinate of the edge at height p.y, compared without division.
                let lhs = (p.x - a.x) as i128 * (b.y - a.y) as i128;
                let rhs = (b.x - a.x) as i128 * (p.y - a.y) as i128;
                let crosses = if b.y > a.y { lhs < rhs } else { lhs > rhs };
                if crosses {
                    inside = !inside;
                }
            }
        }
        inside
    }

    fn edges(&self) -> impl Iterator<Item = (Couple, Couple)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }
}

#[inline]
fn orientation(a: Couple, b: Couple, c: Couple) -> i128 {
    let v = (b.x - a.x) as i128 * (c.y - a.y) as i128 - (b.y - a.y) as i128 * (c.x - a.x) as i128;
    v.signum()
}

#[inline]
fn on_segment(a: Couple, b: Couple, p: Couple) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

fn segments_intersect(p1: Couple, p2: Couple, q1: Couple, q2: Couple) -> bool {
    let o1 = orientation(p1, p2, q1);
    let o2 = orientation(p1, p2, q2);
    let o3 = orientation(q1, q2, p1);
    let o4 = orientation(q1, q2, p2);

    if o1 != o2 && o3 != o4 {
        return true;
    }
    (o1 == 0 && on_segment(p1, p2, q1))
        || (o2 == 0 && on_segment(p1, p2, q2))
        || (o3 == 0 && on_segment(q1, q2, p1))
        || (o4 == 0 && on_segment(q1, q2, p2))
}

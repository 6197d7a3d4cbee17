//! # Coverage Area
//!
//! Tracks which part of a unit square is still uncovered as block faces are
//! stacked over it, as a set of disjoint rectangles.
//!
//! ## Subtraction
//!
//! Every tracked rectangle that overlaps the cutout is replaced by up to
//! four residuals. The left and right strips keep the full height of the
//! original; the bottom and top strips only span the x-range shared with
//! the cutout:
//!
//! ```text
//!   ┌────┬─────┬────┐
//!   │    │ top │    │
//!   │left├─────┤right
//!   │    │ cut │    │
//!   │    ├─────┤    │
//!   │    │ bot │    │
//!   └────┴─────┴────┘
//! ```
//!
//! Residuals never overlap each other or other tracked rectangles, so the
//! set stays disjoint without a merge pass. Once nothing is left the area
//! is permanently empty (fully covered).

use std::mem;

/// Axis-aligned rectangle, `x1 <= x2` and `y1 <= y2`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub x1: f64,
    /// Bottom edge.
    pub y1: f64,
    /// Right edge.
    pub x2: f64,
    /// Top edge.
    pub y2: f64,
}

impl Rect {
    /// The unit square.
    pub const UNIT: Self = Self {
        x1: 0.0,
        y1: 0.0,
        x2: 1.0,
        y2: 1.0,
    };

    /// Creates a rectangle.
    ///
    /// # Panics
    ///
    /// Panics if an edge is NaN or the rectangle is inverted.
    #[must_use]
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        assert!(
            x1 <= x2 && y1 <= y2,
            "inverted rectangle ({x1}, {y1}, {x2}, {y2})"
        );
        Self { x1, y1, x2, y2 }
    }

    /// Width.
    #[inline]
    #[must_use]
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    /// Height.
    #[inline]
    #[must_use]
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Area.
    #[inline]
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Returns true if the rectangle has no area.
    #[inline]
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.x1 >= self.x2 || self.y1 >= self.y2
    }

    /// Returns true if the interiors overlap.
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x1 < other.x2 && other.x1 < self.x2 && self.y1 < other.y2 && other.y1 < self.y2
    }

    /// Overlapping part, if any.
    #[must_use]
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        self.overlaps(other).then(|| Rect {
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
            x2: self.x2.min(other.x2),
            y2: self.y2.min(other.y2),
        })
    }

    /// Returns true if the point lies inside (lower edges inclusive).
    #[inline]
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }
}

/// Uncovered part of the unit square.
#[derive(Clone, Debug)]
pub struct CoverageArea {
    remaining: Vec<Rect>,
    scratch: Vec<Rect>,
    empty: bool,
}

impl Default for CoverageArea {
    fn default() -> Self {
        Self::new()
    }
}

impl CoverageArea {
    /// A fully uncovered unit square.
    #[must_use]
    pub fn new() -> Self {
        let mut remaining = Vec::with_capacity(8);
        remaining.push(Rect::UNIT);
        Self {
            remaining,
            scratch: Vec::with_capacity(8),
            empty: false,
        }
    }

    /// Covers `(x1, y1)..(x2, y2)`.
    ///
    /// Zero-width or zero-height cutouts are ignored, as is every call once
    /// the area is empty.
    ///
    /// # Panics
    ///
    /// Panics if the cutout is inverted or has a NaN edge.
    pub fn subtract(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.subtract_rect(&Rect::new(x1, y1, x2, y2));
    }

    /// Covers `cut`. See [`CoverageArea::subtract`].
    ///
    /// # Panics
    ///
    /// Panics if `cut` is inverted or has a NaN edge.
    pub fn subtract_rect(&mut self, cut: &Rect) {
        assert!(
            cut.x1 <= cut.x2 && cut.y1 <= cut.y2,
            "inverted rectangle ({}, {}, {}, {})",
            cut.x1,
            cut.y1,
            cut.x2,
            cut.y2
        );
        if self.empty || cut.is_degenerate() {
            return;
        }

        self.scratch.clear();
        for r in &self.remaining {
            if !r.overlaps(cut) {
                self.scratch.push(*r);
                continue;
            }

            if cut.x1 > r.x1 {
                self.scratch.push(Rect { x2: cut.x1, ..*r });
            }
            if cut.x2 < r.x2 {
                self.scratch.push(Rect { x1: cut.x2, ..*r });
            }

            let x1 = r.x1.max(cut.x1);
            let x2 = r.x2.min(cut.x2);
            if cut.y1 > r.y1 {
                self.scratch.push(Rect {
                    x1,
                    y1: r.y1,
                    x2,
                    y2: cut.y1,
                });
            }
            if cut.y2 < r.y2 {
                self.scratch.push(Rect {
                    x1,
                    y1: cut.y2,
                    x2,
                    y2: r.y2,
                });
            }
        }
        mem::swap(&mut self.remaining, &mut self.scratch);

        if self.remaining.is_empty() {
            self.empty = true;
        }
    }

    /// Returns true once the whole square is covered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// Disjoint rectangles still uncovered.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> &[Rect] {
        &self.remaining
    }

    /// Uncovered area, in `[0, 1]`.
    #[must_use]
    pub fn uncovered_fraction(&self) -> f64 {
        self.remaining.iter().map(Rect::area).sum()
    }

    /// Covered area, in `[0, 1]`.
    #[must_use]
    pub fn covered_fraction(&self) -> f64 {
        if self.empty {
            1.0
        } else {
            (1.0 - self.uncovered_fraction()).clamp(0.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic cutouts, some reaching outside the unit square.
    fn cutouts(seed: u64, count: usize) -> Vec<Rect> {
        let mut state = seed;
        let mut next = move || {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            // Multiples of 1/16 keep the arithmetic exact.
            f64::from((state >> 33) as u32 % 20) / 16.0 - 0.125
        };
        (0..count)
            .map(|_| {
                let (a, b, c, d) = (next(), next(), next(), next());
                Rect::new(a.min(c), b.min(d), a.max(c), b.max(d))
            })
            .collect()
    }

    fn assert_disjoint(area: &CoverageArea) {
        let rects = area.remaining();
        for (i, a) in rects.iter().enumerate() {
            assert!(!a.is_degenerate(), "degenerate residual {a:?}");
            for b in &rects[i + 1..] {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_full_cut_empties() {
        let mut area = CoverageArea::new();
        area.subtract(0.25, 0.25, 0.5, 0.75);
        area.subtract(0.0, 0.0, 1.0, 1.0);
        assert!(area.is_empty());
        assert!(area.remaining().is_empty());
        assert_eq!(area.covered_fraction(), 1.0);
    }

    #[test]
    fn test_empty_is_permanent() {
        let mut area = CoverageArea::new();
        area.subtract(-1.0, -1.0, 2.0, 2.0);
        assert!(area.is_empty());
        area.subtract(0.0, 0.0, 0.5, 0.5);
        assert!(area.is_empty());
        assert!(area.remaining().is_empty());
    }

    #[test]
    fn test_degenerate_cut_is_noop() {
        let mut area = CoverageArea::new();
        area.subtract(0.5, 0.0, 0.5, 1.0);
        area.subtract(0.0, 0.3, 1.0, 0.3);
        assert_eq!(area.remaining(), &[Rect::UNIT]);
        assert!(!area.is_empty());
    }

    #[test]
    #[should_panic(expected = "inverted rectangle")]
    fn test_inverted_cut_panics() {
        CoverageArea::new().subtract(0.6, 0.0, 0.4, 1.0);
    }

    #[test]
    fn test_x_strips_take_full_height() {
        let mut area = CoverageArea::new();
        area.subtract(0.25, 0.25, 0.75, 0.75);
        assert_eq!(
            area.remaining(),
            &[
                Rect::new(0.0, 0.0, 0.25, 1.0),
                Rect::new(0.75, 0.0, 1.0, 1.0),
                Rect::new(0.25, 0.0, 0.75, 0.25),
                Rect::new(0.25, 0.75, 0.75, 1.0),
            ]
        );
        assert_eq!(area.covered_fraction(), 0.25);
    }

    #[test]
    fn test_slab_halves() {
        let mut area = CoverageArea::new();
        area.subtract(0.0, 0.0, 1.0, 0.5);
        assert_eq!(area.remaining(), &[Rect::new(0.0, 0.5, 1.0, 1.0)]);
        area.subtract(0.0, 0.5, 1.0, 1.0);
        assert!(area.is_empty());
    }

    #[test]
    fn test_remaining_matches_square_minus_cutouts() {
        for seed in 1..40 {
            let cuts = cutouts(seed, 6);
            let mut area = CoverageArea::new();
            for cut in &cuts {
                area.subtract_rect(cut);
                assert_disjoint(&area);
            }

            for i in 0..32 {
                for j in 0..32 {
                    let (x, y) = ((f64::from(i) + 0.5) / 32.0, (f64::from(j) + 0.5) / 32.0);
                    let cut = cuts.iter().any(|c| c.contains(x, y));
                    let left = area.remaining().iter().any(|r| r.contains(x, y));
                    assert_ne!(cut, left, "seed {seed} point ({x}, {y})");
                }
            }
            assert_eq!(area.is_empty(), area.remaining().is_empty());
        }
    }
}

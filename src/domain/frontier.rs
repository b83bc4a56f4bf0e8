//! Efficient frontier (skyline) maintenance.
//!
//! Keeps the points that are not dominated when maximizing `x` (return) and
//! minimizing `y` (risk). Surviving points also form a convex curve: every
//! interior point lies strictly below the chord joining its neighbours, so
//! iteration yields strictly ascending `x` and strictly ascending `y`.

use std::cmp::Ordering;
use std::fmt;

use super::ordered_index::{Cursor, OrderedIndex};

/// One (return, risk) point and whatever produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierPoint<P> {
    pub x: f64,
    pub y: f64,
    pub payload: P,
}

type ByX<P> = fn(&FrontierPoint<P>, &FrontierPoint<P>) -> Ordering;

fn by_x<P>(a: &FrontierPoint<P>, b: &FrontierPoint<P>) -> Ordering {
    a.x.total_cmp(&b.x)
}

/// True when `(x, y)` lies strictly below the chord from `left` to `right`.
/// Requires `left.x < x < right.x`.
fn below_chord<P>(left: &FrontierPoint<P>, x: f64, y: f64, right: &FrontierPoint<P>) -> bool {
    assert!(
        left.x < x && x < right.x,
        "chord test out of order: {} < {} < {}",
        left.x,
        x,
        right.x
    );
    let expected_y = left.y + (right.y - left.y) * (x - left.x) / (right.x - left.x);
    y < expected_y
}

pub struct Frontier<P> {
    index: OrderedIndex<FrontierPoint<P>, ByX<P>>,
}

impl<P> Frontier<P> {
    pub fn new() -> Self {
        Self {
            index: OrderedIndex::new(by_x::<P> as ByX<P>),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Offers a point. Returns true iff it is on the frontier afterwards;
    /// points it makes redundant are evicted. A rejected point leaves the
    /// frontier untouched.
    ///
    /// # Panics
    ///
    /// When `x` or `y` is not finite.
    pub fn insert(&mut self, x: f64, y: f64, payload: P) -> bool {
        assert!(
            x.is_finite() && y.is_finite(),
            "frontier point ({x}, {y}) is not finite"
        );
        // Fold -0.0 into 0.0 so that total_cmp agrees with ==.
        let x = if x == 0.0 { 0.0 } else { x };
        let point = FrontierPoint { x, y, payload };

        if self.index.is_empty() {
            self.store(point);
            return true;
        }

        // The exact-match branch must run before the chord test, which
        // divides by the width between the neighbours.
        let right = self.index.find_ge_by(|p| x.total_cmp(&p.x));
        if !right.is_done() {
            let existing = self.index.item(right);
            if existing.x == x {
                if y >= existing.y {
                    return false;
                }
                self.index.delete_at(right);
                self.store(point);
                self.prune(x, y);
                return true;
            }
        }

        let left = self.index.find_le_by(|p| x.total_cmp(&p.x));
        let survives = if left.is_done() {
            // Below every stored return: must also beat the lowest risk.
            y < self.index.item(right).y
        } else if right.is_done() {
            true
        } else {
            below_chord(self.index.item(left), x, y, self.index.item(right))
        };
        if !survives {
            return false;
        }

        self.store(point);
        self.prune(x, y);
        true
    }

    fn store(&mut self, point: FrontierPoint<P>) {
        let inserted = self.index.insert(point);
        assert!(inserted, "frontier already holds a point at this return");
    }

    fn locate(&self, x: f64) -> Cursor {
        let at = self.index.find_ge_by(|p| x.total_cmp(&p.x));
        assert!(
            !at.is_done() && self.index.item(at).x == x,
            "frontier lost the point at return {x}"
        );
        at
    }

    /// Evicts neighbours of the point at `x` that it made redundant. Cursors
    /// are re-resolved after every deletion.
    fn prune(&mut self, x: f64, y: f64) {
        loop {
            let at = self.locate(x);
            let left = self.index.prev(at);
            if left.is_done() {
                break;
            }
            let l = self.index.item(left);
            let further = self.index.prev(left);
            let redundant = l.y >= y
                || (!further.is_done()
                    && !below_chord(self.index.item(further), l.x, l.y, self.index.item(at)));
            if !redundant {
                break;
            }
            self.index.delete_at(left);
        }

        loop {
            let at = self.locate(x);
            let right = self.index.next(at);
            if right.is_done() {
                break;
            }
            let further = self.index.next(right);
            if further.is_done() {
                break;
            }
            let r = self.index.item(right);
            if below_chord(self.index.item(at), r.x, r.y, self.index.item(further)) {
                break;
            }
            self.index.delete_at(right);
        }
    }

    /// Points in ascending return order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &FrontierPoint<P>> + ExactSizeIterator {
        self.index.iter()
    }

    /// Largest surviving return, `None` when empty.
    pub fn max_x(&self) -> Option<f64> {
        let last = self.index.last();
        (!last.is_done()).then(|| self.index.item(last).x)
    }

    /// Lowest surviving risk, which belongs to the lowest-return point.
    pub fn min_y(&self) -> Option<f64> {
        let first = self.index.first();
        (!first.is_done()).then(|| self.index.item(first).y)
    }
}

impl<P> Default for Frontier<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: fmt::Debug> fmt::Debug for Frontier<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<P: fmt::Display> fmt::Display for Frontier<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in self.iter() {
            writeln!(f, "return={:.6} risk={:.6} {}", p.x, p.y, p.payload)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy(f: &Frontier<()>) -> Vec<(f64, f64)> {
        f.iter().map(|p| (p.x, p.y)).collect()
    }

    #[test]
    fn same_x_keeps_lower_risk() {
        let mut f = Frontier::new();
        assert!(f.insert(0.0, 1.0, ()));
        assert!(!f.insert(0.0, 1.5, ()));
        assert!(f.insert(0.0, 0.5, ()));
        assert!(!f.insert(0.0, 0.5, ()));
        assert_eq!(xy(&f), vec![(0.0, 0.5)]);
    }

    #[test]
    fn negative_zero_matches_zero() {
        let mut f = Frontier::new();
        assert!(f.insert(0.0, 1.0, ()));
        assert!(!f.insert(-0.0, 1.0, ()));
        assert!(f.insert(-0.0, 0.5, ()));
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn different_x_chord_test() {
        let mut f = Frontier::new();
        assert!(f.insert(0.0, 0.0, ()));
        assert!(f.insert(1.0, 1.0, ()));
        assert!(f.insert(2.0, 3.0, ()));
        assert!(!f.insert(0.3, 0.31, ()));
        assert!(f.insert(0.3, 0.29, ()));
        assert!(!f.insert(1.1, 1.22, ()));
        assert!(f.insert(1.1, 1.18, ()));
    }

    #[test]
    fn better_point_evicts_chain_of_neighbours() {
        let mut f = Frontier::new();
        assert!(f.insert(0.0, 1.0, ()));
        // (1, 1) dominates (0, 1): more return at equal risk.
        assert!(f.insert(1.0, 1.0, ()));
        assert!(f.insert(2.0, 2.0, ()));
        // (2, 2) sits on the chord from (1, 1) to (3, 3).
        assert!(f.insert(3.0, 3.0, ()));
        assert_eq!(xy(&f), vec![(1.0, 1.0), (3.0, 3.0)]);

        assert!(f.insert(1.1, 0.1, ()));
        assert_eq!(xy(&f), vec![(1.1, 0.1), (3.0, 3.0)]);

        assert!(!f.insert(1.0, 1.1, ()));
        assert!(!f.insert(2.0, 2.1, ()));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn remove_existing_from_zero_origin() {
        let mut f = Frontier::new();
        assert!(f.insert(0.0, 0.0, ()));
        assert!(f.insert(1.0, 1.0, ()));
        assert!(f.insert(2.0, 2.0, ()));
        assert!(f.insert(3.0, 3.0, ()));
        assert!(f.insert(1.1, 0.1, ()));
        assert!(!f.insert(1.0, 1.1, ()));
        assert!(!f.insert(2.0, 2.1, ()));
        assert_eq!(xy(&f), vec![(0.0, 0.0), (1.1, 0.1), (3.0, 3.0)]);
    }

    #[test]
    fn collinear_point_is_rejected() {
        let mut f = Frontier::new();
        assert!(f.insert(0.0, 0.0, ()));
        assert!(f.insert(2.0, 2.0, ()));
        assert!(!f.insert(1.0, 1.0, ()));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn new_minimum_return_needs_lower_risk() {
        let mut f = Frontier::new();
        assert!(f.insert(1.0, 1.0, ()));
        assert!(!f.insert(0.5, 1.0, ()));
        assert!(!f.insert(0.5, 2.0, ()));
        assert!(f.insert(0.5, 0.5, ()));
        assert_eq!(xy(&f), vec![(0.5, 0.5), (1.0, 1.0)]);
    }

    #[test]
    fn new_maximum_return_always_survives() {
        let mut f = Frontier::new();
        assert!(f.insert(1.0, 1.0, ()));
        assert!(f.insert(2.0, 10.0, ()));
        assert_eq!(f.max_x(), Some(2.0));
    }

    #[test]
    fn new_maximum_with_lower_risk_evicts_everything_below() {
        let mut f = Frontier::new();
        assert!(f.insert(0.0, 1.0, ()));
        assert!(f.insert(1.0, 2.0, ()));
        assert!(f.insert(2.0, 4.0, ()));
        assert!(f.insert(3.0, 0.5, ()));
        assert_eq!(xy(&f), vec![(3.0, 0.5)]);
    }

    #[test]
    fn exact_match_replacement_prunes_both_sides() {
        let mut f = Frontier::new();
        for (x, y) in [(0.0, 0.0), (1.0, 0.2), (2.0, 0.6), (3.0, 1.5), (4.0, 3.0)] {
            assert!(f.insert(x, y, ()));
        }
        assert_eq!(f.len(), 5);

        assert!(f.insert(2.0, -0.5, ()));
        assert_eq!(xy(&f), vec![(2.0, -0.5), (4.0, 3.0)]);
    }

    #[test]
    fn max_x_and_min_y() {
        let mut f: Frontier<()> = Frontier::new();
        assert_eq!(f.max_x(), None);
        assert_eq!(f.min_y(), None);
        f.insert(1.0, 0.2, ());
        f.insert(2.0, 0.9, ());
        assert_eq!(f.max_x(), Some(2.0));
        assert_eq!(f.min_y(), Some(0.2));
    }

    #[test]
    fn rejected_point_leaves_tree_shape_untouched() {
        let mut f = Frontier::new();
        for (i, (x, y)) in [(0.0, 0.0), (1.0, 0.5), (2.0, 2.0), (3.0, 4.5)]
            .into_iter()
            .enumerate()
        {
            assert!(f.insert(x, y, i));
        }
        let before: Vec<_> = f
            .index
            .preorder()
            .into_iter()
            .map(|(p, c, d)| (p.clone(), c, d))
            .collect();
        for _ in 0..2 {
            assert!(!f.insert(1.5, 1.9, 99));
            let after: Vec<_> = f
                .index
                .preorder()
                .into_iter()
                .map(|(p, c, d)| (p.clone(), c, d))
                .collect();
            assert_eq!(before, after);
        }
    }

    #[test]
    fn payload_travels_with_point() {
        let mut f = Frontier::new();
        f.insert(1.0, 1.0, "a");
        f.insert(2.0, 3.0, "b");
        f.insert(1.0, 0.5, "c");
        let payloads: Vec<_> = f.iter().map(|p| p.payload).collect();
        assert_eq!(payloads, vec!["c", "b"]);
    }

    #[test]
    fn display_one_line_per_point() {
        let mut f = Frontier::new();
        f.insert(0.01, 0.02, "x");
        assert_eq!(f.to_string(), "return=0.010000 risk=0.020000 x\n");
    }

    #[test]
    #[should_panic(expected = "not finite")]
    fn nan_is_a_contract_violation() {
        let mut f = Frontier::new();
        f.insert(f64::NAN, 0.0, ());
    }
}

use crate::{
    knot::KnotVector,
    misc::{scalar_from_usize, FloatingPoint},
};

/// One parametric direction of a tensor-product surface.
/// Knots of a closed direction are expanded to a periodic knot vector on construction,
/// so `knots()` always addresses the unwrapped pole sequence.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfaceDirection<T: FloatingPoint> {
    order: usize,
    num_poles: usize,
    closed: bool,
    knots: KnotVector<T>,
}

impl<T: FloatingPoint> SurfaceDirection<T> {
    /// Create a direction from its order, knots and pole count.
    /// An open direction needs `num_poles + order` knots, a closed one `num_poles + 1`.
    pub fn try_new(order: usize, knots: Vec<T>, num_poles: usize, closed: bool) -> anyhow::Result<Self> {
        anyhow::ensure!(order >= 1, "order must be at least 1");
        anyhow::ensure!(num_poles >= 1, "at least one pole is required");
        let knots = KnotVector::new(knots);
        anyhow::ensure!(knots.is_non_decreasing(), "knots must be non-decreasing");
        let degree = order - 1;

        let knots = if closed {
            anyhow::ensure!(
                knots.len() == num_poles + 1,
                "closed direction expects {} knots, got {}",
                num_poles + 1,
                knots.len()
            );
            anyhow::ensure!(num_poles >= 2, "closed direction needs at least 2 poles");
            anyhow::ensure!(knots.last() > knots.first(), "closed direction has an empty period");
            KnotVector::periodic(knots.as_slice(), num_poles, degree)
        } else {
            anyhow::ensure!(
                knots.len() == num_poles + order,
                "open direction expects {} knots, got {}",
                num_poles + order,
                knots.len()
            );
            anyhow::ensure!(num_poles >= order, "open direction needs at least {} poles", order);
            let (min, max) = knots.domain(degree);
            anyhow::ensure!(max > min, "knot domain is empty");
            knots
        };

        Ok(Self {
            order,
            num_poles,
            closed,
            knots,
        })
    }

    /// Open direction with a clamped uniform knot vector over `[0, 1]`.
    pub fn clamped(order: usize, num_poles: usize) -> anyhow::Result<Self> {
        let degree = order.saturating_sub(1);
        let knots = KnotVector::<T>::clamped_uniform(num_poles, degree);
        let last = knots.last();
        Self::try_new(order, knots.iter().map(|k| *k / last).collect(), num_poles, false)
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn degree(&self) -> usize {
        self.order - 1
    }

    /// Number of stored poles
    pub fn num_poles(&self) -> usize {
        self.num_poles
    }

    /// Number of poles addressed by the (expanded) knot vector
    pub fn num_unwrapped_poles(&self) -> usize {
        self.knots.len() - self.order
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn knots(&self) -> &KnotVector<T> {
        &self.knots
    }

    pub fn domain(&self) -> (T, T) {
        self.knots.domain(self.degree())
    }

    /// Number of Bezier spans, zero-length spans included
    pub fn span_count(&self) -> usize {
        self.knots.interval_count(self.degree())
    }

    /// Knot interval of the `i`-th Bezier span
    pub fn span(&self, i: usize) -> (T, T) {
        self.knots.interval(self.degree(), i)
    }

    /// Parameter-fraction interval of the `i`-th Bezier span
    pub fn span_fractions(&self, i: usize) -> (T, T) {
        let (a, b) = self.span(i);
        (self.knot_to_fraction(a), self.knot_to_fraction(b))
    }

    /// Distinct span boundaries as fractions, starting at 0 and ending at 1
    pub fn breakpoint_fractions(&self) -> Vec<T> {
        let mut fractions = vec![T::zero()];
        for i in 0..self.span_count() {
            let (_, b) = self.span_fractions(i);
            if let Some(last) = fractions.last() {
                if b > *last {
                    fractions.push(b);
                }
            }
        }
        if let Some(last) = fractions.last_mut() {
            *last = T::one();
        }
        fractions
    }

    /// Map an unwrapped pole index onto a stored pole index
    pub fn wrap(&self, index: usize) -> usize {
        if self.closed {
            index % self.num_poles
        } else {
            index.min(self.num_poles - 1)
        }
    }

    pub fn fraction_to_knot(&self, fraction: T) -> T {
        let (a, b) = self.domain();
        a + (b - a) * fraction
    }

    pub fn knot_to_fraction(&self, knot: T) -> T {
        let (a, b) = self.domain();
        (knot - a) / (b - a)
    }

    /// Uniformly spaced fractions `0, 1/n, .., 1`
    pub fn uniform_fractions(n: usize) -> Vec<T> {
        let n = n.max(1);
        let div = scalar_from_usize::<T>(n);
        (0..=n).map(|i| scalar_from_usize::<T>(i) / div).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_direction_validates_knot_count() {
        assert!(SurfaceDirection::try_new(3, vec![0., 0., 0., 1., 1., 1.], 3, false).is_ok());
        assert!(SurfaceDirection::try_new(3, vec![0., 0., 1., 1., 1.], 3, false).is_err());
        assert!(SurfaceDirection::<f64>::try_new(0, vec![], 0, false).is_err());
    }

    #[test]
    fn closed_direction_expands() {
        let dir = SurfaceDirection::try_new(3, vec![0., 1., 2., 3., 4.], 4, true).unwrap();
        assert_eq!(dir.num_unwrapped_poles(), 6);
        assert_eq!(dir.span_count(), 4);
        assert_eq!(dir.domain(), (0., 4.));
        assert_eq!(dir.wrap(5), 1);
    }

    #[test]
    fn breakpoints_skip_repeated_knots() {
        let dir = SurfaceDirection::try_new(2, vec![0., 0., 0.5, 0.5, 1., 1.], 4, false).unwrap();
        assert_eq!(dir.span_count(), 3);
        assert_eq!(dir.breakpoint_fractions(), vec![0., 0.5, 1.]);
    }
}

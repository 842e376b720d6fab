use std::ops::Index;

use nalgebra::{convert, RealField};

/// Knot vector representation
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnotVector<T>(Vec<T>);

impl<T: RealField + Copy> KnotVector<T> {
    pub fn new(knots: Vec<T>) -> Self {
        Self(knots)
    }

    /// Create a clamped uniform knot vector for `n` poles of the given degree.
    /// The interior knots are spaced by one and the ends carry `degree + 1` multiplicity.
    /// # Example
    /// ```
    /// use bsurf::prelude::KnotVector;
    /// let knots: KnotVector<f64> = KnotVector::clamped_uniform(4, 2);
    /// assert_eq!(knots.to_vec(), vec![0., 0., 0., 1., 2., 2., 2.]);
    /// ```
    pub fn clamped_uniform(n: usize, degree: usize) -> Self {
        let spans = n.saturating_sub(degree).max(1);
        let mut knots = vec![T::zero(); degree + 1];
        for i in 1..spans {
            knots.push(convert(i as f64));
        }
        knots.extend(std::iter::repeat_n(convert::<f64, T>(spans as f64), degree + 1));
        Self(knots)
    }

    /// Expand the `num_poles + 1` knots of a closed (periodic) direction into the full
    /// `num_poles + 2 * degree + 1` knot vector of the unwrapped net.
    /// Pole `k` of the unwrapped net is pole `k mod num_poles` of the closed net.
    /// # Example
    /// ```
    /// use bsurf::prelude::KnotVector;
    /// let knots = KnotVector::periodic(&[0., 1., 2., 3.], 3, 2);
    /// assert_eq!(knots.to_vec(), vec![-2., -1., 0., 1., 2., 3., 4., 5.]);
    /// ```
    pub fn periodic(knots: &[T], num_poles: usize, degree: usize) -> Self {
        let period = knots[num_poles] - knots[0];
        let n = num_poles as isize;
        let p = degree as isize;
        let expanded = (0..(num_poles + 2 * degree + 1) as isize)
            .map(|j| {
                let k = j - p;
                let wrap = k.div_euclid(n);
                let index = k.rem_euclid(n) as usize;
                knots[index] + period * convert(wrap as f64)
            })
            .collect();
        Self(expanded)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.0.clone()
    }

    pub fn first(&self) -> T {
        self.0[0]
    }

    pub fn last(&self) -> T {
        self.0[self.0.len() - 1]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    /// Check that the knots never decrease
    pub fn is_non_decreasing(&self) -> bool {
        self.0.windows(2).all(|w| w[0] <= w[1])
    }

    /// Get the domain of the knot vector by degree
    pub fn domain(&self, degree: usize) -> (T, T) {
        (self.0[degree], self.0[self.0.len() - 1 - degree])
    }

    pub fn clamp(&self, degree: usize, u: T) -> T {
        let (min, max) = self.domain(degree);
        u.clamp(min, max)
    }

    /// Number of knot intervals inside the domain, zero-length intervals included
    pub fn interval_count(&self, degree: usize) -> usize {
        self.0.len().saturating_sub(2 * degree + 1)
    }

    /// Get the knot interval `[t(degree + i), t(degree + i + 1)]`
    pub fn interval(&self, degree: usize, i: usize) -> (T, T) {
        (self.0[degree + i], self.0[degree + i + 1])
    }

    /// Find the knot span index by binary search
    ///
    /// # Example
    /// ```
    /// use bsurf::prelude::KnotVector;
    /// let knots = KnotVector::new(vec![0., 0., 0., 1., 2., 3., 3., 3.]);
    /// let idx = knots.find_knot_span_index(4, 2, 2.5);
    /// assert_eq!(idx, 4);
    /// ```
    pub fn find_knot_span_index(&self, n: usize, degree: usize, u: T) -> usize {
        if u >= self[n + 1] {
            return n;
        }

        if u <= self[degree] {
            return degree;
        }

        let mut low = degree;
        let mut high = n + 1;
        let mut mid = (low + high) / 2;
        while u < self[mid] || self[mid + 1] <= u {
            if u < self[mid] {
                high = mid;
            } else {
                low = mid;
            }
            let next = (low + high) / 2;
            if mid == next {
                break;
            }
            mid = next;
        }

        mid
    }

    /// Compute the non-vanishing basis functions
    pub fn basis_functions(&self, knot_span_index: usize, u: T, degree: usize) -> Vec<T> {
        let mut basis_functions = vec![T::zero(); degree + 1];
        let mut left = vec![T::zero(); degree + 1];
        let mut right = vec![T::zero(); degree + 1];

        basis_functions[0] = T::one();

        for j in 1..=degree {
            left[j] = u - self[knot_span_index + 1 - j];
            right[j] = self[knot_span_index + j] - u;
            let mut saved = T::zero();

            for r in 0..j {
                let temp = basis_functions[r] / (right[r + 1] + left[j - r]);
                basis_functions[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }

            basis_functions[j] = saved;
        }

        basis_functions
    }

    /// Compute the non-vanishing basis functions and their derivatives up to order `n`.
    /// Row `k` of the result holds the `k`-th derivatives; row 0 holds the basis values.
    pub fn derivative_basis_functions(
        &self,
        knot_index: usize,
        u: T,
        degree: usize,
        n: usize,
    ) -> Vec<Vec<T>> {
        let mut ndu = vec![vec![T::zero(); degree + 1]; degree + 1];
        let mut left = vec![T::zero(); degree + 1];
        let mut right = vec![T::zero(); degree + 1];

        ndu[0][0] = T::one();

        for j in 1..=degree {
            left[j] = u - self[knot_index + 1 - j];
            right[j] = self[knot_index + j] - u;

            let mut saved = T::zero();
            for r in 0..j {
                // lower triangle
                ndu[j][r] = right[r + 1] + left[j - r];
                let temp = ndu[r][j - 1] / ndu[j][r];

                // upper triangle
                ndu[r][j] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[j][j] = saved;
        }

        let mut ders = vec![vec![T::zero(); degree + 1]; n + 1];
        let mut a = vec![vec![T::zero(); degree + 1]; 2];

        for j in 0..=degree {
            ders[0][j] = ndu[j][degree];
        }

        let idegree = degree as isize;
        let n = n as isize;

        for r in 0..=idegree {
            let mut s1 = 0;
            let mut s2 = 1;
            a[0][0] = T::one();

            for k in 1..=n {
                let mut d = T::zero();
                let rk = r - k;
                let pk = idegree - k;

                if r >= k {
                    a[s2][0] = a[s1][0] / ndu[(pk + 1) as usize][rk as usize];
                    d = a[s2][0] * ndu[rk as usize][pk as usize];
                }

                let j1 = if rk >= -1 { 1 } else { -rk };
                let j2 = if r - 1 <= pk { k - 1 } else { idegree - r };

                for j in j1..=j2 {
                    a[s2][j as usize] = (a[s1][j as usize] - a[s1][j as usize - 1])
                        / ndu[(pk + 1) as usize][(rk + j) as usize];
                    d += a[s2][j as usize] * ndu[(rk + j) as usize][pk as usize];
                }

                let uk = k as usize;
                let ur = r as usize;
                if r <= pk {
                    a[s2][uk] = -a[s1][(k - 1) as usize] / ndu[(pk + 1) as usize][ur];
                    d += a[s2][uk] * ndu[ur][pk as usize];
                }

                ders[uk][ur] = d;

                std::mem::swap(&mut s1, &mut s2);
            }
        }

        let mut acc = idegree;
        for k in 1..=n {
            for j in 0..=idegree {
                ders[k as usize][j as usize] *= convert::<f64, T>(acc as f64);
            }
            acc *= idegree - k;
        }
        ders
    }
}

impl<T> Index<usize> for KnotVector<T> {
    type Output = T;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<T> FromIterator<T> for KnotVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

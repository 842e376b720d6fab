use crate::misc::{scalar_from_usize, FloatingPoint};

/// Returns the binomial coefficient of `n` and `k`.
pub fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.;
    }
    let k = k.min(n - k);
    let mut r = 1.;
    for i in 0..k {
        r = r * (n - i) as f64 / (i + 1) as f64;
    }
    r
}

/// Pascal triangle rows cached up to a maximum order.
/// Rational derivative evaluation asks for the same small coefficients over and over,
/// so the rows are built once per evaluator.
#[derive(Clone, Debug)]
pub struct Binomial<T> {
    rows: Vec<Vec<T>>,
}

impl<T: FloatingPoint> Binomial<T> {
    pub fn new() -> Self {
        Self { rows: vec![vec![T::one()]] }
    }

    /// Create a table holding every row up to `n`.
    pub fn with_rows(n: usize) -> Self {
        let mut table = Self::new();
        table.grow(n);
        table
    }

    fn grow(&mut self, n: usize) {
        while self.rows.len() <= n {
            let prev = &self.rows[self.rows.len() - 1];
            let mut row = Vec::with_capacity(prev.len() + 1);
            row.push(T::one());
            for k in 1..prev.len() {
                row.push(prev[k - 1] + prev[k]);
            }
            row.push(T::one());
            self.rows.push(row);
        }
    }

    /// Returns the binomial coefficient of `n` and `k`, extending the table on demand.
    pub fn get(&mut self, n: usize, k: usize) -> T {
        if k > n {
            return T::zero();
        }
        self.grow(n);
        self.rows[n][k]
    }
}

impl<T: FloatingPoint> Default for Binomial<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate all Bernstein polynomials of the given order at `t`.
/// The returned vector has `order` entries; order 1 is the constant basis.
pub fn bernstein<T: FloatingPoint>(order: usize, t: T) -> Vec<T> {
    if order == 0 {
        return vec![];
    }
    let mut basis = vec![T::zero(); order];
    basis[0] = T::one();
    let s = T::one() - t;
    // de Casteljau style build up of the triangle
    for j in 1..order {
        let mut saved = T::zero();
        for k in 0..j {
            let temp = basis[k];
            basis[k] = saved + s * temp;
            saved = t * temp;
        }
        basis[j] = saved;
    }
    basis
}

/// Evaluate the Bernstein polynomials of the given order and their first derivatives at `t`.
pub fn bernstein_with_derivatives<T: FloatingPoint>(order: usize, t: T) -> (Vec<T>, Vec<T>) {
    let basis = bernstein(order, t);
    let mut derivatives = vec![T::zero(); order];
    if order < 2 {
        return (basis, derivatives);
    }
    let degree = order - 1;
    let lower = bernstein(degree, t);
    let scale = scalar_from_usize::<T>(degree);
    for (i, d) in derivatives.iter_mut().enumerate() {
        let left = if i > 0 { lower[i - 1] } else { T::zero() };
        let right = if i < degree { lower[i] } else { T::zero() };
        *d = scale * (left - right);
    }
    (basis, derivatives)
}

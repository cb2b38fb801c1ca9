use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Bessel radial basis `sqrt(2/r_max) sin(nπr/r_max)/r` multiplied by a
/// smooth polynomial cutoff that goes to zero, with zero slope, at `r_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadialBasis {
    pub r_max: f64,
    pub n_basis: usize,
    /// Cutoff polynomial order.
    pub p: u32,
}

impl RadialBasis {
    pub fn new(r_max: f64, n_basis: usize) -> Self {
        RadialBasis { r_max, n_basis, p: 6 }
    }

    /// Basis values and their derivatives w.r.t. `r`. Both are zero at and
    /// beyond the cutoff.
    pub fn evaluate(&self, r: f64) -> (Vec<f64>, Vec<f64>) {
        let mut values = vec![0.0; self.n_basis];
        let mut derivs = vec![0.0; self.n_basis];
        if r <= 0.0 || r >= self.r_max {
            return (values, derivs);
        }

        let (fc, dfc) = self.cutoff(r);
        let prefactor = (2.0 / self.r_max).sqrt();
        for n in 0..self.n_basis {
            let k = (n + 1) as f64 * PI / self.r_max;
            let (s, c) = (k * r).sin_cos();
            let phi = prefactor * s / r;
            let dphi = prefactor * (k * c / r - s / (r * r));
            values[n] = phi * fc;
            derivs[n] = dphi * fc + phi * dfc;
        }
        (values, derivs)
    }

    fn cutoff(&self, r: f64) -> (f64, f64) {
        let p = self.p as f64;
        let x = r / self.r_max;
        let xp = x.powi(self.p as i32);
        let f = 1.0 - (p + 1.0) * (p + 2.0) / 2.0 * xp + p * (p + 2.0) * xp * x
            - p * (p + 1.0) / 2.0 * xp * x * x;
        let df = -p * (p + 1.0) * (p + 2.0) / 2.0 * x.powi(self.p as i32 - 1) * (1.0 - x).powi(2)
            / self.r_max;
        (f, df)
    }
}

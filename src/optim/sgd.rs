use serde::{Deserialize, Serialize};

/// Stochastic gradient descent with optional (Nesterov) momentum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sgd {
    pub momentum: f64,
    pub nesterov: bool,
    buf: Vec<f64>,
    started: bool,
}

impl Sgd {
    pub fn new(n_params: usize, momentum: f64, nesterov: bool) -> Sgd {
        Sgd { momentum, nesterov, buf: vec![0.0; n_params], started: false }
    }

    /// Applies one update. `decay` holds the L2 penalty for each parameter.
    pub fn step(&mut self, params: &mut [f64], grads: &[f64], decay: &[f64], lr: f64) {
        for i in 0..params.len() {
            let mut d_p = grads[i] + decay[i] * params[i];

            if self.momentum != 0.0 {
                // The first step seeds the buffer with the raw gradient.
                self.buf[i] = if self.started { self.momentum * self.buf[i] + d_p } else { d_p };
                d_p = if self.nesterov { d_p + self.momentum * self.buf[i] } else { self.buf[i] };
            }

            params[i] -= lr * d_p;
        }
        self.started = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_step_without_momentum() {
        let mut sgd = Sgd::new(2, 0.0, true);
        let mut p = [1.0, -1.0];
        sgd.step(&mut p, &[0.5, -0.5], &[0.0, 0.0], 0.1);
        assert!((p[0] - 0.95).abs() < 1e-12 && (p[1] + 0.95).abs() < 1e-12);
    }

    #[test]
    fn classical_momentum_accumulates() {
        let mut sgd = Sgd::new(1, 0.9, false);
        let mut p = [0.0];
        sgd.step(&mut p, &[1.0], &[0.0], 1.0);
        assert_eq!(p, [-1.0]);
        sgd.step(&mut p, &[1.0], &[0.0], 1.0);
        assert!((p[0] - (-1.0 - 1.9)).abs() < 1e-12);
    }

    #[test]
    fn nesterov_looks_ahead() {
        let mut sgd = Sgd::new(1, 0.5, true);
        let mut p = [0.0];
        sgd.step(&mut p, &[1.0], &[0.0], 1.0);
        // d_p = g + m * buf = 1 + 0.5
        assert_eq!(p, [-1.5]);
    }

    #[test]
    fn weight_decay_pulls_towards_zero() {
        let mut sgd = Sgd::new(1, 0.0, false);
        let mut p = [2.0];
        sgd.step(&mut p, &[0.0], &[0.5], 0.1);
        assert!((p[0] - 1.9).abs() < 1e-12);
    }
}

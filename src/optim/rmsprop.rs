use serde::{Deserialize, Serialize};

/// RMSprop with optional momentum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RmsProp {
    pub alpha: f64,
    pub momentum: f64,
    pub eps: f64,
    square_avg: Vec<f64>,
    buf: Vec<f64>,
}

impl RmsProp {
    pub fn new(n_params: usize, alpha: f64, momentum: f64, eps: f64) -> RmsProp {
        RmsProp {
            alpha,
            momentum,
            eps,
            square_avg: vec![0.0; n_params],
            buf: vec![0.0; n_params],
        }
    }

    pub fn step(&mut self, params: &mut [f64], grads: &[f64], decay: &[f64], lr: f64) {
        for i in 0..params.len() {
            let g = grads[i] + decay[i] * params[i];
            self.square_avg[i] = self.alpha * self.square_avg[i] + (1.0 - self.alpha) * g * g;
            let avg = self.square_avg[i].sqrt() + self.eps;

            if self.momentum > 0.0 {
                self.buf[i] = self.momentum * self.buf[i] + g / avg;
                params[i] -= lr * self.buf[i];
            } else {
                params[i] -= lr * g / avg;
            }
        }
    }
}

/// Adadelta; `lr` scales the computed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adadelta {
    pub rho: f64,
    pub eps: f64,
    square_avg: Vec<f64>,
    acc_delta: Vec<f64>,
}

impl Adadelta {
    pub fn new(n_params: usize, eps: f64) -> Adadelta {
        Adadelta {
            rho: 0.9,
            eps,
            square_avg: vec![0.0; n_params],
            acc_delta: vec![0.0; n_params],
        }
    }

    pub fn step(&mut self, params: &mut [f64], grads: &[f64], decay: &[f64], lr: f64) {
        for i in 0..params.len() {
            let g = grads[i] + decay[i] * params[i];
            self.square_avg[i] = self.rho * self.square_avg[i] + (1.0 - self.rho) * g * g;
            let std = (self.square_avg[i] + self.eps).sqrt();
            let delta = (self.acc_delta[i] + self.eps).sqrt() / std * g;
            self.acc_delta[i] = self.rho * self.acc_delta[i] + (1.0 - self.rho) * delta * delta;
            params[i] -= lr * delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rmsprop_first_step_is_normalised() {
        let mut opt = RmsProp::new(1, 0.99, 0.0, 0.0);
        let mut p = [0.0];
        opt.step(&mut p, &[4.0], &[0.0], 0.01);
        // sqrt(0.01 * 16) = 0.4, step = 0.01 * 4 / 0.4
        assert!((p[0] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn adadelta_moves_against_gradient() {
        let mut opt = Adadelta::new(2, 1e-6);
        let mut p = [1.0, 1.0];
        opt.step(&mut p, &[1.0, -1.0], &[0.0, 0.0], 1.0);
        assert!(p[0] < 1.0 && p[1] > 1.0);
    }
}

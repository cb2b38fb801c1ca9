use serde::{Deserialize, Serialize};

/// Members of the Adam family that share the first/second moment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdamVariant {
    Adam,
    /// Decoupled weight decay.
    AdamW,
    /// Nesterov-accelerated Adam.
    Nadam,
    /// Rectified Adam.
    RAdam,
    /// Second moment of `g - m` instead of `g`.
    AdaBelief,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adam {
    pub variant: AdamVariant,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    m: Vec<f64>,
    v: Vec<f64>,
    t: u64,
}

impl Adam {
    pub fn new(n_params: usize, variant: AdamVariant, betas: (f64, f64), eps: f64) -> Adam {
        Adam {
            variant,
            beta1: betas.0,
            beta2: betas.1,
            eps,
            m: vec![0.0; n_params],
            v: vec![0.0; n_params],
            t: 0,
        }
    }

    pub fn step(&mut self, params: &mut [f64], grads: &[f64], decay: &[f64], lr: f64) {
        self.t += 1;
        let t = self.t as i32;
        let (b1, b2) = (self.beta1, self.beta2);
        let bias1 = 1.0 - b1.powi(t);
        let bias2 = 1.0 - b2.powi(t);

        // RAdam variance rectification term, shared by every parameter.
        let rho_inf = 2.0 / (1.0 - b2) - 1.0;
        let rho_t = rho_inf - 2.0 * self.t as f64 * b2.powi(t) / bias2;
        let rect = if rho_t > 5.0 {
            Some(((rho_t - 4.0) * (rho_t - 2.0) * rho_inf / ((rho_inf - 4.0) * (rho_inf - 2.0) * rho_t)).sqrt())
        } else {
            None
        };

        for i in 0..params.len() {
            let mut g = grads[i];
            if self.variant == AdamVariant::AdamW {
                params[i] *= 1.0 - lr * decay[i];
            } else {
                g += decay[i] * params[i];
            }

            self.m[i] = b1 * self.m[i] + (1.0 - b1) * g;
            let second = if self.variant == AdamVariant::AdaBelief { g - self.m[i] } else { g };
            self.v[i] = b2 * self.v[i] + (1.0 - b2) * second * second;
            if self.variant == AdamVariant::AdaBelief {
                self.v[i] += self.eps;
            }

            let m_hat = self.m[i] / bias1;
            let denom = (self.v[i] / bias2).sqrt() + self.eps;

            params[i] -= match self.variant {
                AdamVariant::Nadam => lr * (b1 * m_hat + (1.0 - b1) * g / bias1) / denom,
                AdamVariant::RAdam => match rect {
                    Some(r) => lr * r * m_hat / denom,
                    None => lr * m_hat,
                },
                _ => lr * m_hat / denom,
            };
        }
    }
}

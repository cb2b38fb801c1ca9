use serde::{Deserialize, Serialize};

/// Lookahead wrapper: every `k` inner steps the slow weights move a fraction
/// `alpha` towards the fast weights, and the fast weights restart from there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lookahead {
    pub k: u64,
    pub alpha: f64,
    slow: Vec<f64>,
    counter: u64,
}

impl Lookahead {
    pub fn new(params: &[f64]) -> Lookahead {
        Lookahead { k: 6, alpha: 0.5, slow: params.to_vec(), counter: 0 }
    }

    /// Call after every inner optimizer step.
    pub fn after_step(&mut self, params: &mut [f64]) {
        self.counter += 1;
        if self.counter % self.k != 0 {
            return;
        }
        for (slow, fast) in self.slow.iter_mut().zip(params.iter_mut()) {
            *slow += self.alpha * (*fast - *slow);
            *fast = *slow;
        }
    }
}

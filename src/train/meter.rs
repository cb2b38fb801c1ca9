/// Streaming weighted mean over scalar observations.
///
/// `weight` is normally the number of graphs in the batch the value was
/// measured on, so per-sample averages stay correct across short batches.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AverageMeter {
    /// Last value passed to `update`.
    pub val: f64,
    pub avg: f64,
    pub sum: f64,
    pub count: usize,
}

impl AverageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// A zero weight leaves the meter untouched.
    pub fn update(&mut self, val: f64, weight: usize) {
        if weight == 0 {
            return;
        }
        self.val = val;
        self.sum += val * weight as f64;
        self.count += weight;
        self.avg = self.sum / self.count as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_average_matches_definition() {
        let mut m = AverageMeter::new();
        let obs = [(1.0, 2), (4.0, 1), (0.5, 5)];
        for &(v, w) in &obs {
            m.update(v, w);
        }
        let expected = obs.iter().map(|&(v, w)| v * w as f64).sum::<f64>() / 8.0;
        assert!((m.avg - expected).abs() < 1e-12);
        assert!((m.sum / m.count as f64 - m.avg).abs() < 1e-12);
        assert_eq!(m.count, 8);
        assert_eq!(m.val, 0.5);
    }

    #[test]
    fn reset_zeroes_everything_and_can_repeat() {
        let mut m = AverageMeter::new();
        m.update(3.0, 4);
        m.reset();
        m.reset();
        assert_eq!(m, AverageMeter::default());
        m.update(2.0, 1);
        assert_eq!(m.avg, 2.0);
    }

    #[test]
    fn zero_weight_is_ignored() {
        let mut m = AverageMeter::new();
        m.update(7.0, 0);
        assert_eq!(m, AverageMeter::default());
        m.update(1.0, 1);
        m.update(9.0, 0);
        assert_eq!(m.avg, 1.0);
        assert_eq!(m.val, 1.0);
    }
}

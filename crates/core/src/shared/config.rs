use crate::shared::constants::{
    DEFAULT_FLUSH_THRESHOLD, DEFAULT_INTERVAL_MS, DEFAULT_RESOLUTION,
};

pub const MIN_RESIDUAL_ITERATIONS: u32 = 1;
pub const MAX_RESIDUAL_ITERATIONS: u32 = 10;
pub const MIN_RESIDUAL_GAIN: f64 = 0.1;
pub const MAX_RESIDUAL_GAIN: f64 = 100.0;

/// Tunables for noise-residual extraction.
///
/// Out-of-range assignments saturate to the permitted range instead of
/// failing; hosts may set these per job but never mid-run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResidualConfig {
    iterations: u32,
    gain: f64,
    equalize: bool,
}

impl ResidualConfig {
    pub fn new(iterations: u32, gain: f64, equalize: bool) -> Self {
        let mut config = Self {
            iterations: MIN_RESIDUAL_ITERATIONS,
            gain: 1.0,
            equalize,
        };
        config.set_iterations(iterations);
        config.set_gain(gain);
        config
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn equalize(&self) -> bool {
        self.equalize
    }

    /// Clamped to [1, 10].
    pub fn set_iterations(&mut self, iterations: u32) {
        self.iterations = iterations.clamp(MIN_RESIDUAL_ITERATIONS, MAX_RESIDUAL_ITERATIONS);
    }

    /// Clamped to [0.1, 100.0]; NaN saturates to the minimum.
    pub fn set_gain(&mut self, gain: f64) {
        self.gain = if gain.is_nan() {
            MIN_RESIDUAL_GAIN
        } else {
            gain.clamp(MIN_RESIDUAL_GAIN, MAX_RESIDUAL_GAIN)
        };
    }

    pub fn set_equalize(&mut self, equalize: bool) {
        self.equalize = equalize;
    }
}

impl Default for ResidualConfig {
    fn default() -> Self {
        Self::new(1, 1.0, true)
    }
}

/// Configuration bundle for one pipeline invocation.
#[derive(Clone, Debug)]
pub struct ExtractionConfig {
    pub interval_ms: u32,
    pub resolution: u32,
    pub residual: ResidualConfig,
    pub flush_threshold: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            resolution: DEFAULT_RESOLUTION,
            residual: ResidualConfig::default(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(5, 5)]
    #[case(10, 10)]
    #[case(11, 10)]
    #[case(1000, 10)]
    fn test_iterations_saturate(#[case] set: u32, #[case] expected: u32) {
        let mut config = ResidualConfig::default();
        config.set_iterations(set);
        assert_eq!(config.iterations(), expected);
    }

    #[rstest]
    #[case(0.0, 0.1)]
    #[case(0.05, 0.1)]
    #[case(1.0, 1.0)]
    #[case(50.0, 50.0)]
    #[case(100.0, 100.0)]
    #[case(250.0, 100.0)]
    fn test_gain_saturates(#[case] set: f64, #[case] expected: f64) {
        let mut config = ResidualConfig::default();
        config.set_gain(set);
        assert_relative_eq!(config.gain(), expected);
    }

    #[test]
    fn test_nan_gain_saturates_to_minimum() {
        let mut config = ResidualConfig::default();
        config.set_gain(f64::NAN);
        assert_relative_eq!(config.gain(), 0.1);
    }

    #[test]
    fn test_constructor_applies_clamping() {
        let config = ResidualConfig::new(99, 0.0, false);
        assert_eq!(config.iterations(), 10);
        assert_relative_eq!(config.gain(), 0.1);
        assert!(!config.equalize());
    }

    #[test]
    fn test_extraction_defaults() {
        let config = ExtractionConfig::default();
        assert_eq!(config.interval_ms, 1000);
        assert_eq!(config.resolution, 200);
        assert_eq!(config.flush_threshold, 100);
        assert_eq!(config.residual.iterations(), 1);
    }
}

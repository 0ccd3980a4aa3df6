//! Logarithmic frequency plan generation

use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};

/// Ordered set of target frequencies for one sweep.
///
/// Points are log-uniformly spaced between the start and end frequency at a
/// fixed points-per-decade density, endpoints inclusive, strictly increasing.
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyPlan {
    points: Vec<f64>,
}

impl FrequencyPlan {
    /// Generate a plan spanning `start_hz..=end_hz`.
    ///
    /// The point count is `round(decades * points_per_decade)`, clamped to at
    /// least one. Deterministic for identical inputs; no side effects.
    pub fn generate(start_hz: f64, end_hz: f64, points_per_decade: f64) -> Result<Self> {
        if !(start_hz > 0.0) || !(end_hz > start_hz) {
            return Err(SweepError::InvalidRange {
                start: start_hz,
                end: end_hz,
            });
        }
        if !(points_per_decade > 0.0) {
            return Err(SweepError::InvalidDensity(points_per_decade));
        }

        let log_start = start_hz.log10();
        let log_end = end_hz.log10();
        let decades = log_end - log_start;
        let count = ((decades * points_per_decade).round() as usize).max(1);

        let mut points = Vec::with_capacity(count);
        if count == 1 {
            points.push(start_hz);
        } else {
            let step = decades / (count - 1) as f64;
            for i in 0..count {
                points.push(10f64.powf(log_start + step * i as f64));
            }
            // Pin the endpoints so accumulated float error cannot shift them.
            points[0] = start_hz;
            points[count - 1] = end_hz;
        }

        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.points.iter()
    }
}

impl<'a> IntoIterator for &'a FrequencyPlan {
    type Item = &'a f64;
    type IntoIter = std::slice::Iter<'a, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_matches_decade_density() {
        // 10 Hz .. 10 MHz is 6 decades
        let plan = FrequencyPlan::generate(10.0, 10_000_000.0, 10.0).unwrap();
        assert_eq!(plan.len(), 60);
    }

    #[test]
    fn test_endpoints_exact_and_strictly_increasing() {
        let plan = FrequencyPlan::generate(10.0, 100_000.0, 25.0).unwrap();
        let pts = plan.as_slice();
        assert_eq!(pts[0], 10.0);
        assert_eq!(pts[pts.len() - 1], 100_000.0);
        for pair in pts.windows(2) {
            assert!(pair[1] > pair[0], "{} !> {}", pair[1], pair[0]);
        }
    }

    #[test]
    fn test_log_uniform_spacing() {
        let plan = FrequencyPlan::generate(10.0, 1000.0, 5.0).unwrap();
        let pts = plan.as_slice();
        assert_eq!(pts.len(), 10);
        let ratios: Vec<f64> = pts.windows(2).map(|p| p[1] / p[0]).collect();
        for r in &ratios {
            assert!((r - ratios[0]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sub_decade_range_clamps_to_one_point() {
        let plan = FrequencyPlan::generate(1000.0, 1010.0, 10.0).unwrap();
        assert_eq!(plan.as_slice(), &[1000.0]);
    }

    #[test]
    fn test_deterministic() {
        let a = FrequencyPlan::generate(17.0, 31_000.0, 7.5).unwrap();
        let b = FrequencyPlan::generate(17.0, 31_000.0, 7.5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_invalid_range() {
        assert!(matches!(
            FrequencyPlan::generate(0.0, 100.0, 10.0),
            Err(SweepError::InvalidRange { .. })
        ));
        assert!(matches!(
            FrequencyPlan::generate(-5.0, 100.0, 10.0),
            Err(SweepError::InvalidRange { .. })
        ));
        assert!(matches!(
            FrequencyPlan::generate(100.0, 100.0, 10.0),
            Err(SweepError::InvalidRange { .. })
        ));
        assert!(matches!(
            FrequencyPlan::generate(100.0, 10.0, 10.0),
            Err(SweepError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_density() {
        assert!(matches!(
            FrequencyPlan::generate(10.0, 100.0, 0.0),
            Err(SweepError::InvalidDensity(_))
        ));
        assert!(matches!(
            FrequencyPlan::generate(10.0, 100.0, -1.0),
            Err(SweepError::InvalidDensity(_))
        ));
    }
}

//! Field statistics for command output.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSummary {
    pub points: usize,
    pub min: f32,
    pub max: f32,
    pub mean: f64,
    /// NaN marks missing values and is excluded from the statistics
    pub missing: usize,
}

impl FieldSummary {
    pub fn of(values: &[f32]) -> Self {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        let mut missing = 0;

        for &v in values {
            if v.is_nan() {
                missing += 1;
                continue;
            }
            min = min.min(v);
            max = max.max(v);
            sum += v as f64;
        }

        let valid = values.len() - missing;
        if valid == 0 {
            return Self {
                points: values.len(),
                min: f32::NAN,
                max: f32::NAN,
                mean: f64::NAN,
                missing,
            };
        }

        Self {
            points: values.len(),
            min,
            max,
            mean: sum / valid as f64,
            missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, uniform};

    #[test]
    fn test_summary_skips_missing() {
        let s = FieldSummary::of(&[1.0, f32::NAN, 3.0, -2.0]);
        assert_eq!(s.points, 4);
        assert_eq!(s.missing, 1);
        assert_eq!((s.min, s.max), (-2.0, 3.0));
        assert_approx_eq!(s.mean, 2.0 / 3.0, 1e-9);
    }

    #[test]
    fn test_uniform_field() {
        let s = FieldSummary::of(&uniform(1_000, -20.0));
        assert_eq!(s.missing, 0);
        assert_eq!((s.min, s.max), (-20.0, -20.0));
        assert_approx_eq!(s.mean, -20.0, 1e-9);
    }

    #[test]
    fn test_all_missing() {
        let s = FieldSummary::of(&[f32::NAN; 3]);
        assert_eq!(s.missing, 3);
        assert!(s.mean.is_nan());
    }
}

//! Shared test utilities for the weather streaming workspace.
//!
//! - Deterministic field generators (ramps, uniform fields, the wind cyclone)
//! - Container builders shaped like the bucket's per-parameter files
//! - A [`MockBucket`] that serves those containers from memory
//! - Fixture names, the cyclone fixture writer and fixture path helpers
//!
//! Add to a crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod bucket;
pub mod containers;
pub mod fixtures;
pub mod generators;
pub mod paths;

pub use bucket::*;
pub use containers::*;
pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Skip a test if a fixture file is not present.
///
/// ```ignore
/// let path = test_utils::require_fixture!("wind-cyclone-u.bin");
/// ```
#[macro_export]
macro_rules! require_fixture {
    ($name:expr) => {{
        match $crate::find_fixture($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: Fixture '{}' not found. Generate fixtures or set TEST_FIXTURES_DIR.",
                    $name
                );
                return;
            }
        }
    }};
}

/// Approximate floating-point equality.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Element-wise approximate equality of two f32 slices.
#[macro_export]
macro_rules! assert_slices_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: &[f32] = &$left;
        let right: &[f32] = &$right;
        assert_eq!(left.len(), right.len(), "slice lengths differ");
        for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            if ((l - r).abs() as f64) > ($epsilon as f64) {
                panic!(
                    "assertion failed at index {}: `{:?}` vs `{:?}` (epsilon `{:?}`)",
                    i, l, r, $epsilon
                );
            }
        }
    }};
}

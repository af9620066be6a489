//! Grid sizing helpers.

/// Number of points in the O1280 reduced Gaussian grid used by the IFS HRES fields.
pub const O1280_POINTS: u64 = 6_599_680;

/// Number of points in a reduced ("octahedral") Gaussian grid `O{n}`.
///
/// The grid has `2n` latitude rings. Ring `i` counted from the nearest pole
/// (starting at 1) holds `4i + 16` points.
pub fn gaussian_grid_points(n: u64) -> u64 {
    // Sum over both hemispheres of (4i + 16) for i in 1..=n
    2 * (2 * n * (n + 1) + 16 * n)
}

/// The `n` of the `O{n}` grid holding exactly `points` points.
pub fn gaussian_grid_order(points: u64) -> Option<u64> {
    // points = 4n^2 + 36n
    let estimate = ((1296.0 + 16.0 * points as f64).sqrt() - 36.0) / 8.0;
    let n = estimate.round().max(1.0) as u64;
    (n.saturating_sub(1)..=n + 1).find(|&n| n > 0 && gaussian_grid_points(n) == points)
}

/// Points per latitude ring of an `O{n}` grid, north to south.
pub fn gaussian_ring_sizes(n: u64) -> impl Iterator<Item = u64> {
    let rings = 2 * n;
    (0..rings).map(move |ring| {
        let from_pole = if ring < n { ring + 1 } else { rings - ring };
        4 * from_pole + 16
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_o1280_point_count() {
        assert_eq!(gaussian_grid_points(1280), O1280_POINTS);
    }

    #[test]
    fn test_grid_order_inverts_point_count() {
        assert_eq!(gaussian_grid_order(O1280_POINTS), Some(1280));
        for n in [1, 8, 32, 320, 640] {
            assert_eq!(gaussian_grid_order(gaussian_grid_points(n)), Some(n));
        }
        assert_eq!(gaussian_grid_order(O1280_POINTS + 1), None);
        assert_eq!(gaussian_grid_order(0), None);
    }

    #[test]
    fn test_ring_sizes_sum_to_total() {
        let total: u64 = gaussian_ring_sizes(320).sum();
        assert_eq!(total, gaussian_grid_points(320));
    }

    #[test]
    fn test_ring_sizes_symmetric() {
        let rings: Vec<u64> = gaussian_ring_sizes(4).collect();
        assert_eq!(rings, vec![20, 24, 28, 32, 32, 28, 24, 20]);
    }
}

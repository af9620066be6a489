//! Deterministic field generators.
//!
//! Fields are row-major f32 over a reduced Gaussian grid or a plain
//! `[1, N]` layout, matching what the containers store.

use std::f64::consts::PI;
use stream_common::grid::gaussian_ring_sizes;

/// `0, 1, 2, ...` scaled by `step`.
pub fn ramp(n: u64, step: f32) -> Vec<f32> {
    (0..n).map(|i| i as f32 * step).collect()
}

pub fn uniform(n: u64, value: f32) -> Vec<f32> {
    vec![value; n as usize]
}

/// A ramp offset by the timestep index so neighbouring timesteps differ.
pub fn timestep_field(n: u64, index: u32) -> Vec<f32> {
    let base = index as f32 * 1000.0;
    (0..n).map(|i| base + (i % 1000) as f32).collect()
}

/// Latitude and longitude (radians) of every point of an `O<n>` grid.
///
/// Ring `r` sits at `90 - (r + 0.5) * 180 / (2n)` degrees; points are evenly
/// spaced in longitude starting at 0.
pub fn gaussian_coordinates(n: u64) -> (Vec<f64>, Vec<f64>) {
    let rings = 2 * n;
    let mut lats = Vec::new();
    let mut lons = Vec::new();
    for (ring, points) in gaussian_ring_sizes(n).enumerate() {
        let lat = (90.0 - (ring as f64 + 0.5) * 180.0 / rings as f64).to_radians();
        for i in 0..points {
            lats.push(lat);
            lons.push(2.0 * PI * i as f64 / points as f64);
        }
    }
    (lats, lons)
}

/// Synthetic cyclone parameters.
#[derive(Debug, Clone, Copy)]
pub struct Cyclone {
    /// Centre latitude (radians)
    pub lat: f64,
    /// Centre longitude (radians)
    pub lon: f64,
    /// Peak wind speed in m/s
    pub max_wind: f64,
    /// Radius of maximum wind (radians)
    pub core_radius: f64,
    /// Radius beyond which wind is zero (radians)
    pub outer_radius: f64,
    /// Fraction of the tangential speed turned inward
    pub inflow: f64,
}

impl Default for Cyclone {
    fn default() -> Self {
        Self {
            lat: 20f64.to_radians(),
            lon: 140f64.to_radians(),
            max_wind: 25.0,
            core_radius: 0.1,
            outer_radius: 0.8,
            inflow: 0.3,
        }
    }
}

impl Cyclone {
    /// Wind speed at an angular distance from the centre.
    pub fn speed_at(&self, distance: f64) -> f64 {
        if distance >= self.outer_radius {
            0.0
        } else if distance <= self.core_radius {
            self.max_wind * distance / self.core_radius
        } else {
            let t = (distance - self.core_radius) / (self.outer_radius - self.core_radius);
            self.max_wind * (1.0 - t)
        }
    }

    /// `(u, v)` components at every coordinate.
    ///
    /// Rotation is counter-clockwise (northern hemisphere) with a share of
    /// the speed pointing at the centre.
    pub fn wind(&self, lats: &[f64], lons: &[f64]) -> (Vec<f32>, Vec<f32>) {
        let mut u = Vec::with_capacity(lats.len());
        let mut v = Vec::with_capacity(lats.len());
        for (&lat, &lon) in lats.iter().zip(lons) {
            let distance = angular_distance(self.lat, self.lon, lat, lon);
            let speed = self.speed_at(distance);
            if speed == 0.0 || distance == 0.0 {
                u.push(0.0);
                v.push(0.0);
                continue;
            }
            // Local east/north offsets from the centre
            let mut dlon = lon - self.lon;
            if dlon > PI {
                dlon -= 2.0 * PI;
            } else if dlon < -PI {
                dlon += 2.0 * PI;
            }
            let dx = dlon * self.lat.cos();
            let dy = lat - self.lat;
            let norm = (dx * dx + dy * dy).sqrt().max(f64::EPSILON);
            let (rx, ry) = (dx / norm, dy / norm);

            let tangential = (-ry * speed, rx * speed);
            let radial = (-rx * speed * self.inflow, -ry * speed * self.inflow);
            u.push((tangential.0 + radial.0) as f32);
            v.push((tangential.1 + radial.1) as f32);
        }
        (u, v)
    }
}

/// Great-circle distance in radians.
pub fn angular_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * a.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx_eq;
    use stream_common::gaussian_grid_points;

    #[test]
    fn test_ramp_and_uniform() {
        assert_eq!(ramp(4, 0.5), vec![0.0, 0.5, 1.0, 1.5]);
        assert!(uniform(10, 55.0).iter().all(|&v| v == 55.0));
    }

    #[test]
    fn test_timestep_fields_differ() {
        assert_ne!(timestep_field(16, 0), timestep_field(16, 1));
        assert_eq!(timestep_field(16, 2)[3], 2003.0);
    }

    #[test]
    fn test_gaussian_coordinates_cover_grid() {
        let (lats, lons) = gaussian_coordinates(8);
        assert_eq!(lats.len() as u64, gaussian_grid_points(8));
        assert_eq!(lats.len(), lons.len());
        // First ring is in the northern hemisphere, last in the southern
        assert!(lats[0] > 0.0);
        assert!(*lats.last().unwrap() < 0.0);
    }

    #[test]
    fn test_cyclone_speed_profile() {
        let c = Cyclone::default();
        assert_approx_eq!(c.speed_at(0.0), 0.0, 1e-9);
        assert_approx_eq!(c.speed_at(c.core_radius), c.max_wind, 1e-9);
        assert_approx_eq!(c.speed_at(c.outer_radius), 0.0, 1e-9);
        assert!(c.speed_at(0.45) < c.max_wind);
    }

    #[test]
    fn test_cyclone_rotates_counter_clockwise() {
        let c = Cyclone::default();
        // Due north of the centre the tangential flow points west
        let (u, v) = c.wind(&[c.lat + c.core_radius], &[c.lon]);
        assert!(u[0] < 0.0);
        // Inflow pulls it south
        assert!(v[0] < 0.0);

        // Far away there is no wind
        let (u, v) = c.wind(&[-c.lat], &[c.lon + PI]);
        assert_eq!((u[0], v[0]), (0.0, 0.0));
    }
}

//! Raw `.bin` fixtures, read and written with [`stream_common::raw`].

use std::io;
use std::path::{Path, PathBuf};
use stream_common::write_f32_file;

use crate::generators::{gaussian_coordinates, Cyclone};

/// Uniform 55 °C over the full O1280 grid.
pub const UNIFORM_55: &str = "uniform-55.bin";
/// Uniform -20 °C over the full O1280 grid.
pub const UNIFORM_MINUS_20: &str = "uniform-minus20.bin";
pub const WIND_CYCLONE_U: &str = "wind-cyclone-u.bin";
pub const WIND_CYCLONE_V: &str = "wind-cyclone-v.bin";

/// Write the cyclone u/v fixtures for an `O<n>` grid into `dir`.
///
/// `n = 1280` reproduces the full-size fixtures.
pub fn write_wind_fixtures(dir: impl AsRef<Path>, n: u64) -> io::Result<(PathBuf, PathBuf)> {
    let (lats, lons) = gaussian_coordinates(n);
    let (u, v) = Cyclone::default().wind(&lats, &lons);

    let u_path = dir.as_ref().join(WIND_CYCLONE_U);
    let v_path = dir.as_ref().join(WIND_CYCLONE_V);
    write_f32_file(&u_path, &u)?;
    write_f32_file(&v_path, &v)?;
    Ok((u_path, v_path))
}

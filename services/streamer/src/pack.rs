//! `pack`: build a timestep container from raw `.bin` fields.
//!
//! Each input holds one slab of the parameter on a full `O{grid}` reduced
//! Gaussian grid. The output can be published to a bucket or served locally
//! for demo loads.

use anyhow::{bail, Context, Result};
use grid_container::{Compression, ContainerWriter};
use serde::Serialize;
use std::path::PathBuf;
use stream_common::{decode_f32_le, gaussian_grid_order, gaussian_grid_points, Param};
use tracing::{debug, info};

/// Default points per chunk: 64 Ki cells, 256 KiB uncompressed.
pub const DEFAULT_CHUNK_POINTS: u64 = 64 * 1024;

#[derive(Debug, Clone)]
pub struct PackRequest {
    pub param: Param,
    /// One file per slab, in slab order.
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    /// Octahedral grid order `n` of `O{n}`.
    pub grid: u64,
    pub chunk_points: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackReport {
    pub param: Param,
    pub grid: String,
    pub points: u64,
    pub variables: Vec<String>,
    pub bytes: usize,
}

pub async fn run(request: &PackRequest) -> Result<PackReport> {
    let param = request.param;
    let variables = param.variables();
    if request.inputs.len() != variables.len() {
        bail!(
            "{} needs {} input file(s) ({}), got {}",
            param,
            variables.len(),
            variables.join(", "),
            request.inputs.len()
        );
    }
    if request.chunk_points == 0 {
        bail!("chunk points must be positive");
    }

    let points = gaussian_grid_points(request.grid);
    let mut writer = ContainerWriter::new();
    for (name, path) in variables.iter().zip(&request.inputs) {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let values = decode_f32_le(&raw).with_context(|| format!("invalid field file {}", path.display()))?;

        if values.len() as u64 != points {
            let found = match gaussian_grid_order(values.len() as u64) {
                Some(n) => format!("O{}", n),
                None => "no Gaussian grid".to_string(),
            };
            bail!(
                "{} holds {} points ({}), O{} needs {}",
                path.display(),
                values.len(),
                found,
                request.grid,
                points
            );
        }

        debug!(variable = *name, path = %path.display(), points, "Adding slab");
        writer = writer
            .array(
                *name,
                vec![1, points],
                vec![1, request.chunk_points.min(points)],
                Compression::Deflate,
                values,
            )
            .with_context(|| format!("failed to add {}", name))?;
    }

    let bytes = writer.finish().context("failed to encode container")?;
    if let Some(parent) = request.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&request.output, &bytes)
        .await
        .with_context(|| format!("failed to write {}", request.output.display()))?;

    info!(
        param = %param,
        grid = request.grid,
        output = %request.output.display(),
        bytes = bytes.len(),
        "Container written"
    );

    Ok(PackReport {
        param,
        grid: format!("O{}", request.grid),
        points,
        variables: variables.iter().map(|v| v.to_string()).collect(),
        bytes: bytes.len(),
    })
}

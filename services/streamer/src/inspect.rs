//! `inspect`: list a container's variables, optionally decoding one.

use anyhow::{Context, Result};
use grid_container::ContainerDecoder;
use serde_json::json;
use std::sync::Arc;
use stream_common::{gaussian_grid_order, CacheLayer, Param};
use tracing::info;

use crate::source::StreamSource;
use crate::summary::FieldSummary;

pub async fn run(
    source: Arc<StreamSource>,
    url: &str,
    variable: Option<&str>,
    param: Option<Param>,
) -> Result<()> {
    let layer = param.map(|p| p.cache_layer()).unwrap_or(CacheLayer::Meta);
    let decoder = ContainerDecoder::open(source, url, layer)
        .await
        .with_context(|| format!("failed to open container {}", url))?;

    info!(url, variables = decoder.variables().len(), "Container opened");
    for var in decoder.variables() {
        println!(
            "{}",
            serde_json::to_string(&json!({
                "variable": var,
                "grid": grid_label(var.cell_count()),
            }))?
        );
    }

    if let Some(name) = variable {
        let array = decoder
            .read_variable(name)
            .await
            .with_context(|| format!("failed to decode '{}'", name))?;
        let summary = FieldSummary::of(&array.data);
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "variable": name,
                "grid": grid_label(Some(array.data.len() as u64)),
                "dims": array.dims,
                "summary": summary,
            }))?
        );
    }

    Ok(())
}

/// `O{n}` when the point count matches a reduced Gaussian grid.
fn grid_label(points: Option<u64>) -> Option<String> {
    points
        .and_then(gaussian_grid_order)
        .map(|n| format!("O{}", n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stream_common::{gaussian_grid_points, O1280_POINTS};

    #[test]
    fn test_grid_label() {
        assert_eq!(grid_label(Some(O1280_POINTS)).as_deref(), Some("O1280"));
        assert_eq!(grid_label(Some(gaussian_grid_points(320))).as_deref(), Some("O320"));
        assert_eq!(grid_label(Some(64)), None);
        assert_eq!(grid_label(None), None);
    }
}

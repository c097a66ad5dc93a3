//! Least-squares trajectory fit.
//!
//! Fits `y = slope · x + intercept` to the X/Y coordinates of the sampled
//! tool-tip positions. The normal equations are solved in centred form:
//!
//! ```text
//! slope     = Σ(x − x̄)(y − ȳ) / Σ(x − x̄)²
//! intercept = ȳ − slope · x̄
//! ```

use harvest_types::HarvestError;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Spread of X values below which the fit is considered vertical.
const DEGENERATE_SPREAD: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
}

/// Fit a line through the X/Y projection of `points`.
///
/// Returns [`HarvestError::InsufficientData`] for fewer than two points or
/// when every point shares the same X coordinate.
pub fn fit_line(points: &[Point3<f64>]) -> Result<LineFit, HarvestError> {
    let samples = points.len();
    if samples < 2 {
        return Err(HarvestError::InsufficientData { samples });
    }
    let n = samples as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;

    let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), p| {
        let dx = p.x - mean_x;
        (sxx + dx * dx, sxy + dx * (p.y - mean_y))
    });
    if sxx <= DEGENERATE_SPREAD * n {
        return Err(HarvestError::InsufficientData { samples });
    }

    let slope = sxy / sxx;
    Ok(LineFit {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

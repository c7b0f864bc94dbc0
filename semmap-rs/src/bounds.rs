use crate::error::LayoutError;
use crate::error::Result;
use ndarray::Array2;
use serde::Deserialize;
use serde::Serialize;

/// Target rectangle for a finished layout.
///
/// [`LayoutBounds::fit`] scales the layout uniformly (aspect ratio is kept) so
/// that it fits inside `[margin, width - margin] × [margin, height - margin]`
/// and centers it there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutBounds {
  pub width: f64,
  pub height: f64,
  pub margin: f64,
}

impl LayoutBounds {
  pub fn new(width: f64, height: f64, margin: f64) -> Self {
    Self {
      width,
      height,
      margin,
    }
  }

  pub fn validate(&self) -> Result<()> {
    if !(self.width > 0.0 && self.width.is_finite()) {
      return Err(LayoutError::InvalidParameter {
        name: "bounds.width",
        reason: format!("must be a positive number, got {}", self.width),
      });
    }
    if !(self.height > 0.0 && self.height.is_finite()) {
      return Err(LayoutError::InvalidParameter {
        name: "bounds.height",
        reason: format!("must be a positive number, got {}", self.height),
      });
    }
    if !(self.margin >= 0.0) || 2.0 * self.margin >= self.width.min(self.height) {
      return Err(LayoutError::InvalidParameter {
        name: "bounds.margin",
        reason: format!(
          "must be non-negative and leave room inside {}x{}, got {}",
          self.width, self.height, self.margin
        ),
      });
    }
    Ok(())
  }

  /// Fit `positions` (an `n × 2` array) into the bounds in place.
  ///
  /// A layout whose points all share one location is moved to the center.
  pub fn fit(&self, positions: &mut Array2<f64>) {
    if positions.nrows() == 0 {
      return;
    }

    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for row in positions.rows() {
      min_x = min_x.min(row[0]);
      max_x = max_x.max(row[0]);
      min_y = min_y.min(row[1]);
      max_y = max_y.max(row[1]);
    }

    let inner_w = self.width - 2.0 * self.margin;
    let inner_h = self.height - 2.0 * self.margin;
    let span_x = max_x - min_x;
    let span_y = max_y - min_y;

    let scale = match (span_x > 0.0, span_y > 0.0) {
      (true, true) => (inner_w / span_x).min(inner_h / span_y),
      (true, false) => inner_w / span_x,
      (false, true) => inner_h / span_y,
      (false, false) => 0.0,
    };

    let center_x = self.width / 2.0;
    let center_y = self.height / 2.0;
    let mid_x = (min_x + max_x) / 2.0;
    let mid_y = (min_y + max_y) / 2.0;
    for mut row in positions.rows_mut() {
      row[0] = center_x + (row[0] - mid_x) * scale;
      row[1] = center_y + (row[1] - mid_y) * scale;
    }
  }
}

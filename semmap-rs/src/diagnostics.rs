use crate::layout::LayoutStage;
use std::fmt::Debug;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
  Debug,
  Info,
  Warn,
}

/// Receiver for non-fatal conditions found while computing a layout.
///
/// Implementations must not fail; a sink that does nothing is valid.
pub trait DiagnosticsSink: Debug + Send + Sync {
  fn report(&self, level: DiagnosticLevel, stage: LayoutStage, message: &str);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
  fn report(&self, level: DiagnosticLevel, stage: LayoutStage, message: &str) {
    match level {
      DiagnosticLevel::Debug => debug!(%stage, "{message}"),
      DiagnosticLevel::Info => info!(%stage, "{message}"),
      DiagnosticLevel::Warn => warn!(%stage, "{message}"),
    }
  }
}

/// Discards every diagnostic.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDiagnostics;

impl DiagnosticsSink for NoopDiagnostics {
  fn report(&self, _level: DiagnosticLevel, _stage: LayoutStage, _message: &str) {}
}

/// Report the isolated rows of an equation system: one diagnostic per row and a
/// summary whose level depends on the isolated fraction.
pub(crate) fn report_isolated_points(
  sink: &dyn DiagnosticsSink,
  stage: LayoutStage,
  isolated: &[usize],
  total_rows: usize,
  warn_fraction: f64,
) {
  for &row in isolated {
    sink.report(
      DiagnosticLevel::Warn,
      stage,
      &format!("Instance #{row} has no neighborhood; it is constrained only by itself."),
    );
  }

  let n_isolated = isolated.len();
  if n_isolated == 0 {
    sink.report(
      DiagnosticLevel::Debug,
      stage,
      "Every instance has at least one neighbor above the similarity threshold.",
    );
  } else if n_isolated <= (warn_fraction * total_rows as f64) as usize {
    sink.report(
      DiagnosticLevel::Info,
      stage,
      &format!(
        "{n_isolated} of {total_rows} instances have no neighborhood and are pinned to the origin."
      ),
    );
  } else {
    sink.report(
      DiagnosticLevel::Warn,
      stage,
      &format!(
        "{n_isolated} of {total_rows} instances have no neighborhood and are pinned to the origin; a lower similarity threshold or a larger neighborhood size connects more of them."
      ),
    );
  }
}

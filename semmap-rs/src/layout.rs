use crate::config::SemanticLayoutConfig;
use crate::context::LayoutContext;
use crate::diagnostics::DiagnosticsSink;
use crate::diagnostics::TracingDiagnostics;
use crate::diagnostics::report_isolated_points;
use crate::embedding::LandmarkLayoutEngine;
use crate::embedding::stress_majorization::StressMajorization;
use crate::equations::EquationSystem;
use crate::equations::NeighborhoodEquations;
use crate::error::LayoutError;
use crate::error::Result;
use crate::landmarks::LandmarkSelector;
use crate::landmarks::kmeans::SphericalKMeans;
use crate::similarity::MatrixShape;
use crate::similarity::SimilarityMatrixBuilder;
use crate::solver::LeastSquaresSolution;
use crate::solver::LeastSquaresSolver;
use crate::solver::SolveReport;
use crate::solver::default_max_iterations;
use crate::solver::lsqr::Lsqr;
use crate::solver::validate_system;
use crate::sparse::AugmentedDataset;
use crate::sparse::DatasetView;
use crate::sparse::SparseVector;
use ndarray::Array2;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::info;

/// Fraction of isolated points above which the summary diagnostic is a warning.
pub(crate) const ISOLATED_WARNING_FRACTION: f64 = 0.1;

/// Pipeline states, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LayoutStage {
  Idle,
  LandmarksClustered,
  LandmarksEmbedded,
  SimilaritiesComputed,
  EquationsBuilt,
  XSolved,
  YSolved,
  Done,
}

impl fmt::Display for LayoutStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      LayoutStage::Idle => "idle",
      LayoutStage::LandmarksClustered => "landmark clustering",
      LayoutStage::LandmarksEmbedded => "landmark embedding",
      LayoutStage::SimilaritiesComputed => "similarity computation",
      LayoutStage::EquationsBuilt => "equation construction",
      LayoutStage::XSolved => "x-axis solve",
      LayoutStage::YSolved => "y-axis solve",
      LayoutStage::Done => "done",
    };
    f.write_str(name)
  }
}

/// Output of [`SemanticLayout::compute_layout`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
  positions: Array2<f64>,
  landmark_positions: Array2<f64>,
  isolated: Vec<usize>,
  x_report: SolveReport,
  y_report: SolveReport,
}

impl LayoutResult {
  /// `n × 2` coordinates, row `i` belonging to dataset vector `i`.
  pub fn positions(&self) -> &Array2<f64> {
    &self.positions
  }

  pub fn into_positions(self) -> Array2<f64> {
    self.positions
  }

  pub fn position(&self, index: usize) -> Option<[f64; 2]> {
    (index < self.positions.nrows()).then(|| [self.positions[(index, 0)], self.positions[(index, 1)]])
  }

  pub fn len(&self) -> usize {
    self.positions.nrows()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// `k × 2` anchor coordinates from the landmark embedding. These are in
  /// the embedding's own frame and are not affected by layout bounds.
  pub fn landmark_positions(&self) -> &Array2<f64> {
    &self.landmark_positions
  }

  /// Dataset indices that had no neighbor above the similarity threshold.
  pub fn isolated(&self) -> &[usize] {
    &self.isolated
  }

  pub fn x_report(&self) -> &SolveReport {
    &self.x_report
  }

  pub fn y_report(&self) -> &SolveReport {
    &self.y_report
  }
}

/// Landmark-based least-squares semantic layout.
///
/// Places a dataset of sparse vectors in 2D so that similar vectors end up
/// close together:
///
/// 1. Cluster the dataset into landmarks.
/// 2. Embed the landmark centroids in 2D from their pairwise dissimilarities.
/// 3. Compute point-level similarities over the points plus centroids.
/// 4. Express every point as the average of its nearest neighbors and pin each
///    landmark to its embedded position.
/// 5. Solve the resulting sparse system by least squares, once per axis.
///
/// The three numerical engines are swappable through [`LandmarkSelector`],
/// [`LandmarkLayoutEngine`] and [`LeastSquaresSolver`].
///
/// # Example
///
/// ```
/// use semmap_rs::SemanticLayout;
/// use semmap_rs::SemanticLayoutConfig;
/// use semmap_rs::SparseVector;
///
/// let data: Vec<SparseVector> = (0..20)
///   .map(|i| SparseVector::from_pairs([(i % 4, 1.0), (4 + i % 2, 0.5)]).unwrap())
///   .collect();
///
/// let mut config = SemanticLayoutConfig::default();
/// config.landmarks.n_landmarks = 4;
/// let layout = SemanticLayout::new(config);
/// let result = layout.compute_layout_seeded(&data).unwrap();
/// assert_eq!(result.len(), 20);
/// ```
#[derive(Debug)]
pub struct SemanticLayout {
  config: SemanticLayoutConfig,
  selector: Box<dyn LandmarkSelector>,
  embedder: Box<dyn LandmarkLayoutEngine>,
  solver: Box<dyn LeastSquaresSolver>,
  diagnostics: Box<dyn DiagnosticsSink>,
}

impl SemanticLayout {
  /// Create a layout with the default engines, configured from `config`.
  ///
  /// # Arguments
  ///
  /// * `config` - Layout parameters
  pub fn new(config: SemanticLayoutConfig) -> Self {
    let selector = Box::new(SphericalKMeans::new(config.landmarks.max_iterations));
    let embedder = Box::new(StressMajorization::new(
      config.embedding.eps,
      config.embedding.max_iterations,
    ));
    let solver = Box::new(Lsqr::new(config.solver.atol, config.solver.btol));
    Self::with_engines(config, selector, embedder, solver)
  }

  /// Create a layout with custom engines.
  ///
  /// # Arguments
  ///
  /// * `config` - Layout parameters
  /// * `selector` - Clusters the dataset into landmarks
  /// * `embedder` - Places the landmarks in 2D
  /// * `solver` - Solves the neighborhood system for each axis
  pub fn with_engines(
    config: SemanticLayoutConfig,
    selector: Box<dyn LandmarkSelector>,
    embedder: Box<dyn LandmarkLayoutEngine>,
    solver: Box<dyn LeastSquaresSolver>,
  ) -> Self {
    Self {
      config,
      selector,
      embedder,
      solver,
      diagnostics: Box::new(TracingDiagnostics),
    }
  }

  /// Replace the sink that receives non-fatal diagnostics such as isolated points.
  pub fn with_diagnostics(mut self, diagnostics: Box<dyn DiagnosticsSink>) -> Self {
    self.diagnostics = diagnostics;
    self
  }

  pub fn config(&self) -> &SemanticLayoutConfig {
    &self.config
  }

  /// Compute a layout with a fresh context seeded from `config.seed`.
  pub fn compute_layout_seeded(&self, dataset: &dyn DatasetView) -> Result<LayoutResult> {
    let mut ctx = LayoutContext::new(self.config.seed);
    self.compute_layout(dataset, &mut ctx)
  }

  /// Compute the 2D layout of `dataset`.
  ///
  /// The computation is all-or-nothing. On failure no layout is returned and
  /// the generator in `ctx` is restored to its state on entry, so rerunning
  /// with the same context reproduces exactly what an uninterrupted run
  /// would have produced.
  ///
  /// # Arguments
  ///
  /// * `dataset` - Vectors to lay out; output row `i` belongs to vector `i`
  /// * `ctx` - Shared generator and cancellation token
  ///
  /// # Errors
  ///
  /// * Precondition violations, before any engine runs
  /// * `LayoutError::Cancelled` if the token is set between stages
  /// * Any error raised by an engine, unchanged
  pub fn compute_layout(
    &self,
    dataset: &dyn DatasetView,
    ctx: &mut LayoutContext,
  ) -> Result<LayoutResult> {
    self.validate_parameters(dataset)?;

    let snapshot = ctx.rng.clone();
    let result = self.run(dataset, ctx);
    if result.is_err() {
      ctx.rng = snapshot;
    }
    result
  }

  fn validate_parameters(&self, dataset: &dyn DatasetView) -> Result<()> {
    let config = &self.config;
    if dataset.is_empty() {
      return Err(LayoutError::EmptyDataset);
    }
    if config.landmarks.n_landmarks < 2 {
      return Err(LayoutError::TooFewLandmarks(config.landmarks.n_landmarks));
    }
    if !(config.similarity.threshold >= 0.0) {
      return Err(LayoutError::NegativeThreshold(config.similarity.threshold));
    }
    if config.neighborhood.size < 1 {
      return Err(LayoutError::InvalidNeighborhoodSize(config.neighborhood.size));
    }
    if config.landmarks.trials < 1 {
      return Err(LayoutError::InvalidParameter {
        name: "landmarks.trials",
        reason: "at least one trial is required".into(),
      });
    }
    let tolerances = [
      ("landmarks.kmeans_eps", config.landmarks.kmeans_eps),
      ("embedding.eps", config.embedding.eps),
      ("solver.atol", config.solver.atol),
      ("solver.btol", config.solver.btol),
    ];
    for (name, value) in tolerances {
      if !(value >= 0.0) {
        return Err(LayoutError::InvalidParameter {
          name,
          reason: format!("must be a non-negative number, got {value}"),
        });
      }
    }
    if let Some(bounds) = &config.bounds {
      bounds.validate()?;
    }
    Ok(())
  }

  fn run(&self, dataset: &dyn DatasetView, ctx: &mut LayoutContext) -> Result<LayoutResult> {
    let config = &self.config;
    let n_points = dataset.len();
    let k = config.landmarks.n_landmarks;
    info!(n_points, k, "starting semantic layout");
    let total_started = Instant::now();

    // Landmarks.
    check_cancelled(ctx, LayoutStage::LandmarksClustered)?;
    let started = Instant::now();
    let landmarks = self.selector.select(
      dataset,
      k,
      config.landmarks.kmeans_eps,
      ctx.rng(),
      config.landmarks.trials,
    )?;
    if landmarks.len() != k {
      return Err(LayoutError::DimensionMismatch {
        context: "landmarks returned by selector",
        expected: k,
        actual: landmarks.len(),
      });
    }
    let centroids: Vec<SparseVector> = landmarks.into_iter().map(|l| l.centroid).collect();
    log_stage(LayoutStage::LandmarksClustered, started);

    // Landmark placement.
    check_cancelled(ctx, LayoutStage::LandmarksEmbedded)?;
    let started = Instant::now();
    let landmark_sim = SimilarityMatrixBuilder::new(config.similarity.threshold)
      .with_measure(config.similarity.measure)
      .with_shape(MatrixShape::UpperTriangular)
      .build(&centroids)?;
    let distance = |i: usize, j: usize| landmark_sim.distance(i, j);
    let landmark_positions = self.embedder.embed(k, &distance, ctx.rng())?;
    if landmark_positions.dim() != (k, 2) {
      return Err(LayoutError::DimensionMismatch {
        context: "landmark positions returned by embedder",
        expected: k,
        actual: landmark_positions.nrows(),
      });
    }
    log_stage(LayoutStage::LandmarksEmbedded, started);

    // Point-level similarities over points followed by centroids.
    check_cancelled(ctx, LayoutStage::SimilaritiesComputed)?;
    let started = Instant::now();
    let augmented = AugmentedDataset::new(dataset, centroids);
    let similarity = SimilarityMatrixBuilder::new(config.similarity.threshold)
      .with_measure(config.similarity.measure)
      .with_shape(MatrixShape::Full)
      .build(&augmented)?;
    log_stage(LayoutStage::SimilaritiesComputed, started);

    // Equations.
    check_cancelled(ctx, LayoutStage::EquationsBuilt)?;
    let started = Instant::now();
    let system = NeighborhoodEquations::builder()
      .similarity(&similarity)
      .n_points(n_points)
      .n_landmarks(k)
      .neighborhood_size(config.neighborhood.size)
      .build()
      .exec()?;
    report_isolated_points(
      self.diagnostics.as_ref(),
      LayoutStage::EquationsBuilt,
      system.isolated(),
      n_points,
      ISOLATED_WARNING_FRACTION,
    );
    log_stage(LayoutStage::EquationsBuilt, started);

    // One solve per axis over the same coefficients.
    check_cancelled(ctx, LayoutStage::XSolved)?;
    let x = self.solve_axis(&system, &landmark_positions.column(0).to_vec(), LayoutStage::XSolved)?;
    check_cancelled(ctx, LayoutStage::YSolved)?;
    let y = self.solve_axis(&system, &landmark_positions.column(1).to_vec(), LayoutStage::YSolved)?;

    let mut positions = Array2::<f64>::zeros((n_points, 2));
    for i in 0..n_points {
      positions[(i, 0)] = x.solution[i];
      positions[(i, 1)] = y.solution[i];
    }
    if let Some(bounds) = &config.bounds {
      bounds.fit(&mut positions);
    }

    info!(
      duration_ms = total_started.elapsed().as_millis(),
      stage = %LayoutStage::Done,
      isolated = system.isolated().len(),
      "semantic layout complete"
    );

    Ok(LayoutResult {
      positions,
      landmark_positions,
      isolated: system.isolated().to_vec(),
      x_report: x.report,
      y_report: y.report,
    })
  }

  fn solve_axis(
    &self,
    system: &EquationSystem,
    anchors: &[f64],
    stage: LayoutStage,
  ) -> Result<LeastSquaresSolution> {
    let started = Instant::now();
    let rhs = system.rhs_for_axis(anchors)?;
    let n_unknowns = system.n_unknowns();
    validate_system(n_unknowns, system.matrix(), &rhs)?;
    let max_iterations = self
      .config
      .solver
      .max_iterations
      .unwrap_or_else(|| default_max_iterations(n_unknowns, system.n_equations()));

    let solution = self
      .solver
      .solve(n_unknowns, system.matrix(), &rhs, max_iterations)?;
    if solution.solution.len() != n_unknowns {
      return Err(LayoutError::DimensionMismatch {
        context: "solution returned by solver",
        expected: n_unknowns,
        actual: solution.solution.len(),
      });
    }
    if let Some(i) = solution.solution.iter().position(|v| !v.is_finite()) {
      return Err(LayoutError::Solver(format!(
        "non-finite coordinate for unknown {i} during {stage}"
      )));
    }
    log_stage(stage, started);
    Ok(solution)
  }
}

fn check_cancelled(ctx: &LayoutContext, next: LayoutStage) -> Result<()> {
  if ctx.is_cancelled() {
    return Err(LayoutError::Cancelled(next));
  }
  Ok(())
}

fn log_stage(stage: LayoutStage, started: Instant) {
  info!(
    duration_ms = started.elapsed().as_millis(),
    %stage, "layout stage complete"
  );
}

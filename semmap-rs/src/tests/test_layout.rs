use super::init_tracing;
use super::sv;
use super::topic_documents;
use crate::bounds::LayoutBounds;
use crate::config::SemanticLayoutConfig;
use crate::context::CancellationToken;
use crate::context::LayoutContext;
use crate::context::LayoutRng;
use crate::diagnostics::DiagnosticLevel;
use crate::diagnostics::DiagnosticsSink;
use crate::diagnostics::report_isolated_points;
use crate::embedding::DistanceFn;
use crate::embedding::LandmarkLayoutEngine;
use crate::embedding::stress_majorization::StressMajorization;
use crate::error::LayoutError;
use crate::error::Result;
use crate::landmarks::Landmark;
use crate::landmarks::LandmarkSelector;
use crate::landmarks::kmeans::SphericalKMeans;
use crate::layout::ISOLATED_WARNING_FRACTION;
use crate::layout::LayoutStage;
use crate::layout::SemanticLayout;
use crate::solver::LeastSquaresSolution;
use crate::solver::LeastSquaresSolver;
use crate::solver::lsqr::Lsqr;
use crate::sparse::DatasetView;
use crate::sparse::SparseVector;
use approx::assert_abs_diff_eq;
use ndarray::Array2;
use rand::Rng;
use sprs::CsMat;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

fn config(k: usize) -> SemanticLayoutConfig {
  let mut config = SemanticLayoutConfig::default();
  config.landmarks.n_landmarks = k;
  config
}

fn dist(x: &Array2<f64>, i: usize, j: usize) -> f64 {
  (x[(i, 0)] - x[(j, 0)]).hypot(x[(i, 1)] - x[(j, 1)])
}

/// Delegates to [`SphericalKMeans`] and counts calls.
#[derive(Debug, Default)]
struct CountingSelector {
  calls: Arc<AtomicUsize>,
  inner: SphericalKMeans,
}

impl LandmarkSelector for CountingSelector {
  fn select(
    &self,
    dataset: &dyn DatasetView,
    k: usize,
    eps: f64,
    rng: &mut LayoutRng,
    trials: usize,
  ) -> Result<Vec<Landmark>> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.inner.select(dataset, k, eps, rng, trials)
  }
}

/// Draws from the generator, then fails.
#[derive(Debug)]
struct FailingSelector;

impl LandmarkSelector for FailingSelector {
  fn select(
    &self,
    _dataset: &dyn DatasetView,
    _k: usize,
    _eps: f64,
    rng: &mut LayoutRng,
    _trials: usize,
  ) -> Result<Vec<Landmark>> {
    let _: u64 = rng.random();
    Err(LayoutError::Clustering("degenerate input".into()))
  }
}

/// Delegates to [`StressMajorization`] and then trips the token.
#[derive(Debug)]
struct CancellingEmbedder {
  token: CancellationToken,
}

impl LandmarkLayoutEngine for CancellingEmbedder {
  fn embed(&self, n: usize, distance: &DistanceFn<'_>, rng: &mut LayoutRng) -> Result<Array2<f64>> {
    let positions = StressMajorization::default().embed(n, distance, rng)?;
    self.token.cancel();
    Ok(positions)
  }
}

type SolveCall = (CsMat<f64>, Vec<f64>, usize);

/// Delegates to [`Lsqr`] and records every call.
#[derive(Debug, Default)]
struct RecordingSolver {
  calls: Arc<Mutex<Vec<SolveCall>>>,
  inner: Lsqr,
}

impl LeastSquaresSolver for RecordingSolver {
  fn solve(
    &self,
    num_unknowns: usize,
    equations: &CsMat<f64>,
    rhs: &[f64],
    max_iterations: usize,
  ) -> Result<LeastSquaresSolution> {
    self
      .calls
      .lock()
      .unwrap()
      .push((equations.clone(), rhs.to_vec(), max_iterations));
    self.inner.solve(num_unknowns, equations, rhs, max_iterations)
  }
}

#[derive(Debug)]
struct FailingSolver;

impl LeastSquaresSolver for FailingSolver {
  fn solve(
    &self,
    _num_unknowns: usize,
    _equations: &CsMat<f64>,
    _rhs: &[f64],
    _max_iterations: usize,
  ) -> Result<LeastSquaresSolution> {
    Err(LayoutError::Solver("did not converge".into()))
  }
}

#[derive(Debug, Default)]
struct RecordingSink {
  events: Arc<Mutex<Vec<(DiagnosticLevel, LayoutStage, String)>>>,
}

impl DiagnosticsSink for RecordingSink {
  fn report(&self, level: DiagnosticLevel, stage: LayoutStage, message: &str) {
    self
      .events
      .lock()
      .unwrap()
      .push((level, stage, message.to_string()));
  }
}

#[test]
fn test_identical_vectors_coincide() {
  init_tracing();
  let data: Vec<SparseVector> = (0..10)
    .map(|_| sv(&[(0, 0.6), (2, 0.8)]))
    .collect();

  let result = SemanticLayout::new(config(2)).compute_layout_seeded(&data).unwrap();

  assert_eq!(result.len(), 10);
  for i in 1..10 {
    assert!(dist(result.positions(), 0, i) < 1e-6);
  }
  // Everything sits on the one non-empty landmark.
  let anchor = result.landmark_positions().row(0);
  assert_abs_diff_eq!(result.positions()[(0, 0)], anchor[0], epsilon = 1e-6);
  assert_abs_diff_eq!(result.positions()[(0, 1)], anchor[1], epsilon = 1e-6);
}

#[test]
fn test_separated_clusters_stay_apart() {
  init_tracing();
  let data = vec![
    sv(&[(0, 1.0), (1, 1.0)]),
    sv(&[(0, 2.0), (1, 2.0)]),
    sv(&[(0, 0.5), (1, 0.5)]),
    sv(&[(5, 1.0), (6, 2.0)]),
    sv(&[(5, 0.5), (6, 1.0)]),
  ];

  let result = SemanticLayout::new(config(2)).compute_layout_seeded(&data).unwrap();
  let x = result.positions();

  let within = [(0, 1), (0, 2), (1, 2)]
    .iter()
    .map(|&(i, j)| dist(x, i, j))
    .fold(0.0, f64::max);
  let across = [0, 1, 2]
    .iter()
    .flat_map(|&i| [3, 4].map(|j| dist(x, i, j)))
    .fold(f64::INFINITY, f64::min);
  assert!(within < across, "within {within} vs across {across}");
}

#[test]
fn test_isolated_point_gets_finite_coordinate() {
  init_tracing();
  let data = vec![
    sv(&[(0, 1.0), (1, 1.0)]),
    sv(&[(0, 2.0), (1, 2.0)]),
    sv(&[(0, 0.5), (1, 0.5)]),
    sv(&[(5, 1.0), (6, 2.0)]),
    sv(&[(5, 0.5), (6, 1.0)]),
    SparseVector::empty(),
  ];

  let result = SemanticLayout::new(config(2)).compute_layout_seeded(&data).unwrap();
  assert_eq!(result.isolated(), &[5]);
  let [x, y] = result.position(5).unwrap();
  assert!(x.is_finite() && y.is_finite());
  assert!(result.positions().iter().all(|v| v.is_finite()));
}

#[test]
fn test_one_position_per_input() {
  let data = topic_documents(80, 4, 3);
  for k in [2, 5, 12] {
    let result = SemanticLayout::new(config(k)).compute_layout_seeded(&data).unwrap();
    assert_eq!(result.positions().dim(), (80, 2));
    assert_eq!(result.landmark_positions().dim(), (k, 2));
    assert!(result.positions().iter().all(|v| v.is_finite()));
  }
}

#[test]
fn test_same_seed_same_layout() {
  let data = topic_documents(120, 3, 13);
  let layout = SemanticLayout::new(config(8));

  let a = layout.compute_layout(&data, &mut LayoutContext::new(99)).unwrap();
  let b = layout.compute_layout(&data, &mut LayoutContext::new(99)).unwrap();
  for (p, q) in a.positions().iter().zip(b.positions()) {
    assert_abs_diff_eq!(p, q, epsilon = 1e-12);
  }
  assert_eq!(a.isolated(), b.isolated());
}

#[test]
fn test_topics_form_groups() {
  let data = topic_documents(90, 3, 1);
  let mut config = config(6);
  config.neighborhood.size = 5;
  let result = SemanticLayout::new(config).compute_layout_seeded(&data).unwrap();
  let x = result.positions();

  // Mean distance to documents of the same topic versus other topics.
  let (mut same, mut same_n, mut other, mut other_n) = (0.0, 0, 0.0, 0);
  for i in 0..90 {
    for j in (i + 1)..90 {
      if i % 3 == j % 3 {
        same += dist(x, i, j);
        same_n += 1;
      } else {
        other += dist(x, i, j);
        other_n += 1;
      }
    }
  }
  assert!(same / (same_n as f64) < other / (other_n as f64));
}

#[test]
fn test_preconditions_fail_before_any_engine_runs() {
  let data = topic_documents(20, 2, 2);
  let cases: Vec<(SemanticLayoutConfig, LayoutError)> = vec![
    (config(1), LayoutError::TooFewLandmarks(1)),
    (
      {
        let mut c = config(3);
        c.similarity.threshold = -0.5;
        c
      },
      LayoutError::NegativeThreshold(-0.5),
    ),
    (
      {
        let mut c = config(3);
        c.neighborhood.size = 0;
        c
      },
      LayoutError::InvalidNeighborhoodSize(0),
    ),
  ];

  for (config, expected) in cases {
    let calls = Arc::new(AtomicUsize::new(0));
    let selector = CountingSelector {
      calls: calls.clone(),
      inner: SphericalKMeans::default(),
    };
    let layout = SemanticLayout::with_engines(
      config,
      Box::new(selector),
      Box::new(StressMajorization::default()),
      Box::new(Lsqr::default()),
    );
    let err = layout.compute_layout_seeded(&data).unwrap_err();
    assert_eq!(err, expected);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  let empty: Vec<SparseVector> = Vec::new();
  assert_eq!(
    SemanticLayout::new(config(2)).compute_layout_seeded(&empty).unwrap_err(),
    LayoutError::EmptyDataset
  );

  let mut bad_bounds = config(2);
  bad_bounds.bounds = Some(LayoutBounds::new(10.0, 10.0, 6.0));
  assert!(matches!(
    SemanticLayout::new(bad_bounds).compute_layout_seeded(&data),
    Err(LayoutError::InvalidParameter { name: "bounds.margin", .. })
  ));
}

#[test]
fn test_engine_errors_propagate_and_restore_rng() {
  let data = topic_documents(20, 2, 2);

  let layout = SemanticLayout::with_engines(
    config(3),
    Box::new(FailingSelector),
    Box::new(StressMajorization::default()),
    Box::new(Lsqr::default()),
  );
  let mut ctx = LayoutContext::new(5);
  let err = layout.compute_layout(&data, &mut ctx).unwrap_err();
  assert_eq!(err, LayoutError::Clustering("degenerate input".into()));
  assert_eq!(ctx.rng().random::<u64>(), LayoutContext::new(5).rng().random::<u64>());

  let layout = SemanticLayout::with_engines(
    config(3),
    Box::new(SphericalKMeans::default()),
    Box::new(StressMajorization::default()),
    Box::new(FailingSolver),
  );
  let mut ctx = LayoutContext::new(5);
  let err = layout.compute_layout(&data, &mut ctx).unwrap_err();
  assert_eq!(err, LayoutError::Solver("did not converge".into()));
  assert_eq!(ctx.rng().random::<u64>(), LayoutContext::new(5).rng().random::<u64>());
}

#[test]
fn test_cancelled_before_start() {
  let data = topic_documents(20, 2, 2);
  let token = CancellationToken::new();
  token.cancel();
  let mut ctx = LayoutContext::new(1).with_cancellation(token);

  let err = SemanticLayout::new(config(2))
    .compute_layout(&data, &mut ctx)
    .unwrap_err();
  assert_eq!(err, LayoutError::Cancelled(LayoutStage::LandmarksClustered));
}

#[test]
fn test_cancellation_midway_keeps_rerun_reproducible() {
  init_tracing();
  let data = topic_documents(40, 2, 8);
  let token = CancellationToken::new();

  let cancelling = SemanticLayout::with_engines(
    config(3),
    Box::new(SphericalKMeans::default()),
    Box::new(CancellingEmbedder {
      token: token.clone(),
    }),
    Box::new(Lsqr::default()),
  );
  let mut ctx = LayoutContext::new(7).with_cancellation(token.clone());
  let err = cancelling.compute_layout(&data, &mut ctx).unwrap_err();
  assert_eq!(err, LayoutError::Cancelled(LayoutStage::SimilaritiesComputed));

  // The same context, once the token is cleared, reproduces a fresh run.
  token.reset();
  let plain = SemanticLayout::new(config(3));
  let rerun = plain.compute_layout(&data, &mut ctx).unwrap();
  let fresh = plain.compute_layout(&data, &mut LayoutContext::new(7)).unwrap();
  assert_eq!(rerun, fresh);
}

#[test]
fn test_solver_sees_one_structure_and_two_right_hand_sides() {
  let data = topic_documents(30, 3, 6);
  let calls = Arc::new(Mutex::new(Vec::new()));
  let solver = RecordingSolver {
    calls: calls.clone(),
    inner: Lsqr::default(),
  };
  let k = 4;
  let layout = SemanticLayout::with_engines(
    config(k),
    Box::new(SphericalKMeans::default()),
    Box::new(StressMajorization::default()),
    Box::new(solver),
  );
  let result = layout.compute_layout_seeded(&data).unwrap();

  let calls = calls.lock().unwrap();
  assert_eq!(calls.len(), 2);
  let (mx, rhs_x, iters_x) = &calls[0];
  let (my, rhs_y, iters_y) = &calls[1];
  assert_eq!(mx, my);

  let n = 30 + k;
  assert_eq!(mx.shape(), (n, n));
  assert_eq!(*iters_x, n + n + 50);
  assert_eq!(iters_y, iters_x);

  // Only the anchor rows carry a right-hand side.
  assert!(rhs_x[..30].iter().chain(&rhs_y[..30]).all(|&v| v == 0.0));
  let anchors = result.landmark_positions();
  for l in 0..k {
    assert_eq!(rhs_x[30 + l], anchors[(l, 0)]);
    assert_eq!(rhs_y[30 + l], anchors[(l, 1)]);
  }
}

#[test]
fn test_isolated_points_are_reported() {
  let mut data = topic_documents(20, 2, 2);
  data.push(SparseVector::empty());
  data.push(SparseVector::empty());

  let sink = RecordingSink::default();
  let events = sink.events.clone();
  let layout = SemanticLayout::new(config(2)).with_diagnostics(Box::new(sink));
  let result = layout.compute_layout_seeded(&data).unwrap();

  assert!(result.isolated().contains(&20));
  assert!(result.isolated().contains(&21));

  let events = events.lock().unwrap();
  for row in [20, 21] {
    let needle = format!("Instance #{row} has no neighborhood");
    assert!(
      events
        .iter()
        .any(|(level, stage, msg)| *level == DiagnosticLevel::Warn
          && *stage == LayoutStage::EquationsBuilt
          && msg.contains(&needle)),
      "missing report for row {row}"
    );
  }
  assert!(
    events
      .iter()
      .any(|(_, _, msg)| msg.contains(&format!("of {} instances have no neighborhood", data.len())))
  );
}

#[test]
fn test_isolated_summary_level_follows_fraction() {
  let summary = |isolated: &[usize], total: usize| {
    let sink = RecordingSink::default();
    report_isolated_points(
      &sink,
      LayoutStage::EquationsBuilt,
      isolated,
      total,
      ISOLATED_WARNING_FRACTION,
    );
    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), isolated.len() + 1);
    assert!(
      events[..isolated.len()]
        .iter()
        .all(|(level, _, _)| *level == DiagnosticLevel::Warn)
    );
    events[isolated.len()].clone()
  };

  assert_eq!(summary(&[], 40).0, DiagnosticLevel::Debug);

  let (level, _, msg) = summary(&[3, 7, 11, 12], 40);
  assert_eq!(level, DiagnosticLevel::Info);
  assert!(msg.starts_with("4 of 40 instances have no neighborhood"));

  let (level, _, msg) = summary(&[3, 7, 11, 12, 30], 40);
  assert_eq!(level, DiagnosticLevel::Warn);
  assert!(msg.contains("similarity threshold"));
}

#[test]
fn test_bounds_fit_layout_into_rectangle() {
  let data = topic_documents(50, 3, 4);
  let mut config = config(4);
  config.bounds = Some(LayoutBounds::new(800.0, 600.0, 20.0));
  let result = SemanticLayout::new(config).compute_layout_seeded(&data).unwrap();

  let xs = result.positions().column(0).to_vec();
  let ys = result.positions().column(1).to_vec();
  let eps = 1e-9;
  assert!(xs.iter().all(|&x| x >= 20.0 - eps && x <= 780.0 + eps));
  assert!(ys.iter().all(|&y| y >= 20.0 - eps && y <= 580.0 + eps));

  // At least one axis is stretched to the full inner extent.
  let span = |v: &[f64]| {
    v.iter().cloned().fold(f64::NEG_INFINITY, f64::max) - v.iter().cloned().fold(f64::INFINITY, f64::min)
  };
  let fills_x = (span(&xs) - 760.0).abs() < 1e-6;
  let fills_y = (span(&ys) - 560.0).abs() < 1e-6;
  assert!(fills_x || fills_y);
}

#[test]
fn test_bounds_center_degenerate_layout() {
  let bounds = LayoutBounds::new(100.0, 50.0, 5.0);
  let mut positions = Array2::from_elem((3, 2), 7.0);
  bounds.fit(&mut positions);
  for row in positions.rows() {
    assert_eq!(row[0], 50.0);
    assert_eq!(row[1], 25.0);
  }
}

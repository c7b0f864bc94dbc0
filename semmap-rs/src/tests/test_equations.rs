use super::sv;
use super::topic_documents;
use crate::equations::EquationKind;
use crate::equations::NeighborhoodEquations;
use crate::error::LayoutError;
use crate::similarity::SimilarityMatrixBuilder;
use crate::sparse::SparseVector;
use approx::assert_abs_diff_eq;

#[test]
fn test_neighborhood_rows_average_to_minus_one() {
  let mut data = topic_documents(30, 3, 21);
  data.push(sv(&[(0, 1.0), (1, 1.0)]));
  data.push(sv(&[(20, 1.0), (21, 1.0)]));
  let sim = SimilarityMatrixBuilder::new(0.01).build(&data).unwrap();

  let system = NeighborhoodEquations::builder()
    .similarity(&sim)
    .n_points(30)
    .n_landmarks(2)
    .neighborhood_size(4)
    .build()
    .exec()
    .unwrap();

  assert_eq!(system.n_unknowns(), 32);
  assert_eq!(system.n_equations(), 32);
  assert_eq!(system.matrix().shape(), (32, 32));

  for eq in &system.equations()[..30] {
    assert_eq!(eq.self_column, eq.row);
    match eq.kind {
      EquationKind::Neighborhood => {
        assert!(!eq.neighbors.is_empty() && eq.neighbors.len() <= 4);
        assert_eq!(eq.neighbor_sum(), -1.0);
        let weight = -1.0 / eq.neighbors.len() as f64;
        assert!(eq.neighbors.iter().all(|&(_, c)| (c - weight).abs() <= 1e-15));
        assert!(eq.neighbors.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(eq.neighbors.iter().all(|&(col, _)| col != eq.row));
      }
      EquationKind::Isolated => assert!(eq.neighbors.is_empty()),
      EquationKind::Anchor { .. } => panic!("point row {} is an anchor", eq.row),
    }
    let row = system.matrix().outer_view(eq.row).unwrap();
    assert_eq!(row.get(eq.row), Some(&1.0));
    assert_eq!(row.nnz(), eq.neighbors.len() + 1);
  }
}

#[test]
fn test_neighbor_coefficients_sum_exactly_at_every_count() {
  // 12 identical vectors: every point sees 11 candidates.
  let data: Vec<SparseVector> = (0..12).map(|_| sv(&[(0, 1.0), (3, 2.0)])).collect();
  let sim = SimilarityMatrixBuilder::new(0.0).build(&data).unwrap();

  for size in 1..=11 {
    let system = NeighborhoodEquations::builder()
      .similarity(&sim)
      .n_points(10)
      .n_landmarks(2)
      .neighborhood_size(size)
      .build()
      .exec()
      .unwrap();
    for eq in &system.equations()[..10] {
      assert_eq!(eq.neighbors.len(), size);
      assert_eq!(eq.neighbor_sum(), -1.0, "size {size}, row {}", eq.row);
    }
  }

  // Default neighborhood of 10.
  let system = NeighborhoodEquations::builder()
    .similarity(&sim)
    .n_points(10)
    .n_landmarks(2)
    .build()
    .exec()
    .unwrap();
  let eq = &system.equations()[0];
  assert_eq!(eq.neighbors.len(), 10);
  assert_eq!(eq.neighbor_sum(), -1.0);
}

#[test]
fn test_keeps_most_similar_neighbors() {
  // Point 0 is most similar to 1, then 2, then 3.
  let data = vec![
    sv(&[(0, 1.0)]),
    sv(&[(0, 1.0), (1, 0.1)]),
    sv(&[(0, 1.0), (1, 0.5)]),
    sv(&[(0, 1.0), (1, 2.0)]),
    sv(&[(9, 1.0)]),
  ];
  let sim = SimilarityMatrixBuilder::new(0.0).build(&data).unwrap();
  let system = NeighborhoodEquations::builder()
    .similarity(&sim)
    .n_points(4)
    .n_landmarks(1)
    .neighborhood_size(2)
    .build()
    .exec()
    .unwrap();

  let cols: Vec<usize> = system.equations()[0].neighbors.iter().map(|&(c, _)| c).collect();
  assert_eq!(cols, vec![1, 2]);
  assert_abs_diff_eq!(system.equations()[0].neighbors[0].1, -0.5);
}

#[test]
fn test_equal_similarities_prefer_lower_columns() {
  let data = vec![
    sv(&[(0, 1.0)]),
    sv(&[(0, 1.0)]),
    sv(&[(0, 1.0)]),
    sv(&[(0, 1.0)]),
    sv(&[(0, 1.0)]),
  ];
  let sim = SimilarityMatrixBuilder::new(0.0).build(&data).unwrap();
  let system = NeighborhoodEquations::builder()
    .similarity(&sim)
    .n_points(3)
    .n_landmarks(2)
    .neighborhood_size(2)
    .build()
    .exec()
    .unwrap();

  let cols = |row: usize| -> Vec<usize> {
    system.equations()[row].neighbors.iter().map(|&(c, _)| c).collect()
  };
  assert_eq!(cols(0), vec![1, 2]);
  assert_eq!(cols(2), vec![0, 1]);
}

#[test]
fn test_isolated_point_gets_self_only_row() {
  let data = vec![
    sv(&[(0, 1.0)]),
    sv(&[(0, 1.0), (1, 1.0)]),
    SparseVector::empty(),
    sv(&[(7, 1.0)]),
    sv(&[(0, 1.0)]),
    sv(&[(3, 1.0)]),
  ];
  let sim = SimilarityMatrixBuilder::new(0.0).build(&data).unwrap();
  let system = NeighborhoodEquations::builder()
    .similarity(&sim)
    .n_points(4)
    .n_landmarks(2)
    .build()
    .exec()
    .unwrap();

  assert_eq!(system.isolated(), &[2, 3]);
  for row in [2, 3] {
    let eq = &system.equations()[row];
    assert_eq!(eq.kind, EquationKind::Isolated);
    assert!(eq.neighbors.is_empty());
    assert_eq!(eq.neighbor_sum(), 0.0);
    let matrix_row = system.matrix().outer_view(row).unwrap();
    assert_eq!(matrix_row.nnz(), 1);
    assert_eq!(matrix_row.get(row), Some(&1.0));
  }
  let rhs = system.rhs_for_axis(&[4.0, -4.0]).unwrap();
  assert_eq!(rhs[2], 0.0);
  assert_eq!(rhs[3], 0.0);
}

#[test]
fn test_anchor_rows_and_axis_rhs() {
  let data = topic_documents(12, 2, 4);
  let mut augmented = data.clone();
  augmented.push(data[0].normalized());
  augmented.push(data[1].normalized());
  let sim = SimilarityMatrixBuilder::new(0.0).build(&augmented).unwrap();
  let system = NeighborhoodEquations::builder()
    .similarity(&sim)
    .n_points(12)
    .n_landmarks(2)
    .build()
    .exec()
    .unwrap();

  for (landmark, row) in [(0, 12), (1, 13)] {
    let eq = &system.equations()[row];
    assert_eq!(eq.kind, EquationKind::Anchor { landmark });
    assert_eq!(eq.self_column, row);
    assert!(eq.neighbors.is_empty());
  }

  let x = system.rhs_for_axis(&[0.25, -3.0]).unwrap();
  let y = system.rhs_for_axis(&[1.5, 2.0]).unwrap();
  assert!(x[..12].iter().chain(&y[..12]).all(|&v| v == 0.0));
  assert_eq!(&x[12..], &[0.25, -3.0]);
  assert_eq!(&y[12..], &[1.5, 2.0]);

  assert!(matches!(
    system.rhs_for_axis(&[1.0]),
    Err(LayoutError::DimensionMismatch { .. })
  ));
}

#[test]
fn test_rejects_invalid_configuration() {
  let data = vec![sv(&[(0, 1.0)]), sv(&[(0, 1.0)]), sv(&[(0, 1.0)])];
  let sim = SimilarityMatrixBuilder::new(0.0).build(&data).unwrap();

  let zero_size = NeighborhoodEquations::builder()
    .similarity(&sim)
    .n_points(2)
    .n_landmarks(1)
    .neighborhood_size(0)
    .build()
    .exec();
  assert_eq!(zero_size.unwrap_err(), LayoutError::InvalidNeighborhoodSize(0));

  let wrong_size = NeighborhoodEquations::builder()
    .similarity(&sim)
    .n_points(3)
    .n_landmarks(1)
    .build()
    .exec();
  assert!(matches!(wrong_size, Err(LayoutError::DimensionMismatch { .. })));
}

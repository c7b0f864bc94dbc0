//! Thresholded pairwise similarity over a dataset of sparse vectors.
//!
//! Similarities are accumulated through an inverted index (feature -> postings),
//! so only pairs that share at least one feature are ever touched. Pairs whose
//! similarity is below the threshold, or not strictly positive, are not stored.
//! Self-similarity is never computed.

use crate::error::LayoutError;
use crate::error::Result;
use crate::sparse::DatasetView;
use crate::sparse::SparseVector;
use rayon::prelude::*;
use serde::Deserialize;
use serde::Serialize;
use sprs::CsMat;
use sprs::TriMat;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;
use tracing::info;

/// How a pair of vectors is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SimilarityMeasure {
  /// Dot product divided by the product of L2 lengths, capped at 1.0.
  #[default]
  Cosine,
  /// Raw dot product. Only meaningful for pre-normalized data.
  DotProduct,
}

impl SimilarityMeasure {
  /// Similarity of two vectors. A zero-length vector scores 0 against anything.
  pub fn similarity(self, a: &SparseVector, b: &SparseVector) -> f64 {
    self.finish(a.dot(b), a.norm_l2(), b.norm_l2())
  }

  #[inline]
  fn finish(self, dot: f64, norm_a: f64, norm_b: f64) -> f64 {
    match self {
      SimilarityMeasure::Cosine => {
        let denom = norm_a * norm_b;
        if denom > 0.0 {
          (dot / denom).min(1.0)
        } else {
          0.0
        }
      }
      SimilarityMeasure::DotProduct => dot,
    }
  }
}

/// Which pairs of a similarity matrix are materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixShape {
  /// Both (i, j) and (j, i) are stored.
  #[default]
  Full,
  /// Only (i, j) with i < j is stored; lookups symmetrize on the fly.
  UpperTriangular,
}

/// Sparse, symmetric similarity structure produced by [`SimilarityMatrixBuilder`].
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
  matrix: CsMat<f64>,
  shape: MatrixShape,
  threshold: f64,
}

impl SimilarityMatrix {
  /// Number of vectors (rows) covered by the matrix.
  pub fn n_vectors(&self) -> usize {
    self.matrix.rows()
  }

  /// Number of stored entries.
  pub fn nnz(&self) -> usize {
    self.matrix.nnz()
  }

  pub fn shape(&self) -> MatrixShape {
    self.shape
  }

  pub fn threshold(&self) -> f64 {
    self.threshold
  }

  /// The underlying CSR matrix.
  pub fn matrix(&self) -> &CsMat<f64> {
    &self.matrix
  }

  /// Similarity of `i` and `j`, or `None` when the pair was not materialized
  /// (below threshold, no shared features, or `i == j`).
  pub fn get(&self, i: usize, j: usize) -> Option<f64> {
    if i == j {
      return None;
    }
    let (row, col) = match self.shape {
      MatrixShape::Full => (i, j),
      MatrixShape::UpperTriangular => (i.min(j), i.max(j)),
    };
    self.matrix.get(row, col).copied()
  }

  /// Dissimilarity `1 - sim(i, j)` in [0, 1].
  ///
  /// Pairs absent from the matrix are treated as similarity 0, i.e. distance 1.
  pub fn distance(&self, i: usize, j: usize) -> f64 {
    (1.0 - self.get(i, j).unwrap_or(0.0)).clamp(0.0, 1.0)
  }

  /// Every stored `(j, sim)` involving `i`, excluding `i` itself, ordered by `j`.
  ///
  /// On an upper-triangular matrix this scans all earlier rows.
  pub fn neighbors(&self, i: usize) -> Vec<(usize, f64)> {
    let mut out: Vec<(usize, f64)> = Vec::new();
    if self.shape == MatrixShape::UpperTriangular {
      for row in 0..i {
        if let Some(&sim) = self.matrix.get(row, i) {
          out.push((row, sim));
        }
      }
    }
    if let Some(row) = self.matrix.outer_view(i) {
      out.extend(row.iter().filter(|&(j, _)| j != i).map(|(j, &sim)| (j, sim)));
    }
    out
  }
}

/// Builds a [`SimilarityMatrix`] over any [`DatasetView`].
///
/// Cost is proportional to the number of co-occurring feature pairs, which is
/// O(N² · avg-nnz) in the worst case. The threshold is the only memory cap.
#[derive(Debug, Clone)]
pub struct SimilarityMatrixBuilder {
  threshold: f64,
  measure: SimilarityMeasure,
  shape: MatrixShape,
}

impl SimilarityMatrixBuilder {
  pub fn new(threshold: f64) -> Self {
    Self {
      threshold,
      measure: SimilarityMeasure::default(),
      shape: MatrixShape::default(),
    }
  }

  pub fn with_measure(mut self, measure: SimilarityMeasure) -> Self {
    self.measure = measure;
    self
  }

  pub fn with_shape(mut self, shape: MatrixShape) -> Self {
    self.shape = shape;
    self
  }

  pub fn build<D: DatasetView + ?Sized>(&self, dataset: &D) -> Result<SimilarityMatrix> {
    if !(self.threshold >= 0.0) {
      return Err(LayoutError::NegativeThreshold(self.threshold));
    }
    let n = dataset.len();
    let threshold = self.threshold;
    let measure = self.measure;

    info!(
      n_vectors = n,
      threshold,
      measure = ?measure,
      shape = ?self.shape,
      "starting similarity matrix"
    );
    let started = Instant::now();

    let norms: Vec<f64> = (0..n)
      .into_par_iter()
      .map(|i| dataset.vector(i).norm_l2())
      .collect();

    // Postings are appended in vector order, so each list is sorted by vector id.
    let mut postings: HashMap<u32, Vec<(usize, f64)>> = HashMap::new();
    for i in 0..n {
      for (feature, value) in dataset.vector(i).iter() {
        postings.entry(feature).or_default().push((i, value));
      }
    }
    debug!(
      features = postings.len(),
      duration_ms = started.elapsed().as_millis(),
      "inverted index complete"
    );

    // Strict upper triangle, one row per vector. Collection preserves row order.
    let upper_rows: Vec<Vec<(usize, f64)>> = (0..n)
      .into_par_iter()
      .map(|i| {
        let mut acc: BTreeMap<usize, f64> = BTreeMap::new();
        for (feature, value) in dataset.vector(i).iter() {
          let Some(list) = postings.get(&feature) else {
            continue;
          };
          let start = list.partition_point(|&(j, _)| j <= i);
          for &(j, other) in &list[start..] {
            *acc.entry(j).or_insert(0.0) += value * other;
          }
        }
        acc
          .into_iter()
          .filter_map(|(j, dot)| {
            let sim = measure.finish(dot, norms[i], norms[j]);
            (sim > 0.0 && sim >= threshold).then_some((j, sim))
          })
          .collect()
      })
      .collect();

    let upper_nnz: usize = upper_rows.iter().map(|r| r.len()).sum();

    let matrix = match self.shape {
      MatrixShape::UpperTriangular => {
        let mut indptr = Vec::with_capacity(n + 1);
        let mut indices = Vec::with_capacity(upper_nnz);
        let mut data = Vec::with_capacity(upper_nnz);
        indptr.push(0);
        for row in upper_rows {
          for (j, sim) in row {
            indices.push(j);
            data.push(sim);
          }
          indptr.push(indices.len());
        }
        CsMat::new((n, n), indptr, indices, data)
      }
      MatrixShape::Full => {
        let mut tri = TriMat::with_capacity((n, n), 2 * upper_nnz);
        for (i, row) in upper_rows.into_iter().enumerate() {
          for (j, sim) in row {
            tri.add_triplet(i, j, sim);
            tri.add_triplet(j, i, sim);
          }
        }
        tri.to_csr::<usize>()
      }
    };

    info!(
      duration_ms = started.elapsed().as_millis(),
      nnz = matrix.nnz(),
      "similarity matrix complete"
    );

    Ok(SimilarityMatrix {
      matrix,
      shape: self.shape,
      threshold,
    })
  }
}

use crate::error::LayoutError;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;

/// A sparse feature vector stored as parallel index/value arrays.
///
/// Indices are strictly increasing and every stored value is finite and
/// non-zero. Vectors are immutable once constructed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSparseVector")]
pub struct SparseVector {
  indices: Vec<u32>,
  values: Vec<f64>,
}

/// Unchecked wire form; deserialized vectors go through [`SparseVector::new`].
#[derive(Deserialize)]
struct RawSparseVector {
  indices: Vec<u32>,
  values: Vec<f64>,
}

impl TryFrom<RawSparseVector> for SparseVector {
  type Error = LayoutError;

  fn try_from(raw: RawSparseVector) -> Result<Self> {
    SparseVector::new(raw.indices, raw.values)
  }
}

impl SparseVector {
  /// Create a vector from parallel index/value arrays.
  ///
  /// Explicit zeros are dropped. Fails if the arrays differ in length, the
  /// indices are not strictly increasing, or a value is not finite.
  pub fn new(indices: Vec<u32>, values: Vec<f64>) -> Result<Self> {
    if indices.len() != values.len() {
      return Err(LayoutError::InvalidVector(format!(
        "{} indices but {} values",
        indices.len(),
        values.len()
      )));
    }
    for w in indices.windows(2) {
      if w[0] >= w[1] {
        return Err(LayoutError::InvalidVector(format!(
          "indices must be strictly increasing, found {} followed by {}",
          w[0], w[1]
        )));
      }
    }
    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
      return Err(LayoutError::InvalidVector(format!(
        "value at index {} is not finite",
        indices[pos]
      )));
    }

    if values.iter().all(|&v| v != 0.0) {
      return Ok(Self { indices, values });
    }
    let (indices, values) = indices
      .into_iter()
      .zip(values)
      .filter(|&(_, v)| v != 0.0)
      .unzip();
    Ok(Self { indices, values })
  }

  /// Create a vector from unordered `(index, value)` pairs.
  ///
  /// Pairs are sorted by index; duplicate indices are rejected.
  pub fn from_pairs<I>(pairs: I) -> Result<Self>
  where
    I: IntoIterator<Item = (u32, f64)>,
  {
    let mut pairs: Vec<(u32, f64)> = pairs.into_iter().collect();
    pairs.sort_unstable_by_key(|&(idx, _)| idx);
    let (indices, values) = pairs.into_iter().unzip();
    Self::new(indices, values)
  }

  /// The all-zero vector.
  pub fn empty() -> Self {
    Self::default()
  }

  /// Number of stored (non-zero) entries.
  pub fn nnz(&self) -> usize {
    self.indices.len()
  }

  pub fn is_empty(&self) -> bool {
    self.indices.is_empty()
  }

  pub fn indices(&self) -> &[u32] {
    &self.indices
  }

  pub fn values(&self) -> &[f64] {
    &self.values
  }

  /// Iterate over `(index, value)` pairs in ascending index order.
  pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
    self.indices.iter().copied().zip(self.values.iter().copied())
  }

  /// Value stored at `index`, or 0.0.
  pub fn get(&self, index: u32) -> f64 {
    match self.indices.binary_search(&index) {
      Ok(pos) => self.values[pos],
      Err(_) => 0.0,
    }
  }

  /// Dot product via a merge over both index lists.
  pub fn dot(&self, other: &SparseVector) -> f64 {
    let (a_idx, b_idx) = (&self.indices, &other.indices);
    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0;
    while i < a_idx.len() && j < b_idx.len() {
      match a_idx[i].cmp(&b_idx[j]) {
        std::cmp::Ordering::Less => i += 1,
        std::cmp::Ordering::Greater => j += 1,
        std::cmp::Ordering::Equal => {
          dot += self.values[i] * other.values[j];
          i += 1;
          j += 1;
        }
      }
    }
    dot
  }

  pub fn norm_l2(&self) -> f64 {
    self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
  }

  /// Copy of this vector scaled to unit L2 length. The zero vector stays zero.
  pub fn normalized(&self) -> SparseVector {
    let norm = self.norm_l2();
    if norm == 0.0 {
      return self.clone();
    }
    SparseVector {
      indices: self.indices.clone(),
      values: self.values.iter().map(|v| v / norm).collect(),
    }
  }
}

/// Read-only, random-access view over a sequence of sparse vectors.
pub trait DatasetView: Sync {
  fn len(&self) -> usize;

  /// Vector at position `index`; panics if `index >= len()`.
  fn vector(&self, index: usize) -> &SparseVector;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl DatasetView for [SparseVector] {
  fn len(&self) -> usize {
    <[SparseVector]>::len(self)
  }

  fn vector(&self, index: usize) -> &SparseVector {
    &self[index]
  }
}

impl DatasetView for Vec<SparseVector> {
  fn len(&self) -> usize {
    Vec::len(self)
  }

  fn vector(&self, index: usize) -> &SparseVector {
    &self[index]
  }
}

/// The input points followed by the landmark centroids.
///
/// Positions `0..n_points` borrow the caller's dataset; positions
/// `n_points..n_points + n_landmarks` are the owned centroids.
pub struct AugmentedDataset<'a, D: DatasetView + ?Sized> {
  points: &'a D,
  landmarks: Vec<SparseVector>,
}

impl<'a, D: DatasetView + ?Sized> AugmentedDataset<'a, D> {
  pub fn new(points: &'a D, landmarks: Vec<SparseVector>) -> Self {
    Self { points, landmarks }
  }

  pub fn n_points(&self) -> usize {
    self.points.len()
  }

  pub fn n_landmarks(&self) -> usize {
    self.landmarks.len()
  }
}

impl<D: DatasetView + ?Sized> DatasetView for AugmentedDataset<'_, D> {
  fn len(&self) -> usize {
    self.points.len() + self.landmarks.len()
  }

  fn vector(&self, index: usize) -> &SparseVector {
    let n = self.points.len();
    if index < n {
      self.points.vector(index)
    } else {
      &self.landmarks[index - n]
    }
  }
}

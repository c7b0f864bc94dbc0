//! Spherical k-means: Lloyd iterations under cosine similarity with
//! k-means++ seeding.
//!
//! Every random draw comes from the caller's generator. Cluster assignment runs
//! in parallel but is collected in dataset order, so results are reproducible.

use crate::context::LayoutRng;
use crate::error::LayoutError;
use crate::error::Result;
use crate::landmarks::Landmark;
use crate::landmarks::LandmarkSelector;
use crate::sparse::DatasetView;
use crate::sparse::SparseVector;
use rand::Rng;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Default [`LandmarkSelector`]: cosine k-means over sparse vectors.
#[derive(Debug, Clone)]
pub struct SphericalKMeans {
  max_iterations: usize,
}

impl SphericalKMeans {
  /// # Arguments
  ///
  /// * `max_iterations` - Cap on Lloyd iterations per trial (at least one is always run)
  pub fn new(max_iterations: usize) -> Self {
    Self {
      max_iterations: max_iterations.max(1),
    }
  }
}

impl Default for SphericalKMeans {
  fn default() -> Self {
    Self::new(100)
  }
}

struct Clustering {
  assignments: Vec<usize>,
  quality: f64,
  iterations: usize,
}

impl LandmarkSelector for SphericalKMeans {
  fn select(
    &self,
    dataset: &dyn DatasetView,
    k: usize,
    eps: f64,
    rng: &mut LayoutRng,
    trials: usize,
  ) -> Result<Vec<Landmark>> {
    let n = dataset.len();
    if n == 0 {
      return Err(LayoutError::EmptyDataset);
    }
    if k < 2 {
      return Err(LayoutError::TooFewLandmarks(k));
    }
    if trials == 0 {
      return Err(LayoutError::InvalidParameter {
        name: "trials",
        reason: "at least one trial is required".into(),
      });
    }
    if !(eps >= 0.0) {
      return Err(LayoutError::InvalidParameter {
        name: "eps",
        reason: format!("must be a non-negative number, got {eps}"),
      });
    }
    if k > n {
      warn!(k, n, "more clusters requested than vectors; some clusters will be empty");
    }

    info!(n, k, trials, eps, "starting spherical k-means");
    let started = Instant::now();

    let norms: Vec<f64> = (0..n)
      .into_par_iter()
      .map(|i| dataset.vector(i).norm_l2())
      .collect();

    let mut best = self.run_trial(dataset, &norms, k, eps, rng)?;
    debug!(trial = 0, quality = best.quality, iterations = best.iterations, "k-means trial complete");
    for trial in 1..trials {
      let clustering = self.run_trial(dataset, &norms, k, eps, rng)?;
      debug!(trial, quality = clustering.quality, iterations = clustering.iterations, "k-means trial complete");
      if clustering.quality > best.quality {
        best = clustering;
      }
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); k];
    for (i, &c) in best.assignments.iter().enumerate() {
      members[c].push(i);
    }

    let landmarks: Vec<Landmark> = members
      .into_par_iter()
      .enumerate()
      .map(|(id, members)| -> Result<Landmark> {
        let centroid = if members.is_empty() {
          SparseVector::empty()
        } else {
          centroid_of(dataset, &members)?
        };
        Ok(Landmark {
          id,
          centroid,
          members,
        })
      })
      .collect::<Result<_>>()?;

    let empty = landmarks.iter().filter(|l| l.members.is_empty()).count();
    if empty > 0 {
      warn!(empty, k, "k-means produced empty clusters; their centroids are zero vectors");
    }
    info!(
      duration_ms = started.elapsed().as_millis(),
      quality = best.quality,
      "spherical k-means complete"
    );

    Ok(landmarks)
  }
}

impl SphericalKMeans {
  fn run_trial(
    &self,
    dataset: &dyn DatasetView,
    norms: &[f64],
    k: usize,
    eps: f64,
    rng: &mut LayoutRng,
  ) -> Result<Clustering> {
    let mut centroids = seed_centroids(dataset, norms, k, rng);
    let mut assignments = Vec::new();
    let mut quality = f64::NEG_INFINITY;
    let mut iterations = 0;

    while iterations < self.max_iterations {
      let (next_assignments, next_quality) = assign(dataset, norms, &centroids);
      iterations += 1;
      let converged = (next_quality - quality).abs() <= eps;
      assignments = next_assignments;
      quality = next_quality;
      if converged {
        break;
      }
      centroids = update_centroids(dataset, &assignments, centroids)?;
    }

    Ok(Clustering {
      assignments,
      quality,
      iterations,
    })
  }
}

/// Cosine dissimilarity between a dataset vector and a unit (or zero) centroid.
#[inline]
fn dissimilarity(x: &SparseVector, norm: f64, centroid: &SparseVector) -> f64 {
  (1.0 - cosine_to_centroid(x, norm, centroid)).max(0.0)
}

#[inline]
fn cosine_to_centroid(x: &SparseVector, norm: f64, centroid: &SparseVector) -> f64 {
  if norm == 0.0 {
    0.0
  } else {
    x.dot(centroid) / norm
  }
}

/// k-means++ seeding with cosine dissimilarity as the distance.
///
/// When every vector coincides with an existing seed, the next seed is drawn
/// uniformly from the vectors not chosen yet.
fn seed_centroids(
  dataset: &dyn DatasetView,
  norms: &[f64],
  k: usize,
  rng: &mut LayoutRng,
) -> Vec<SparseVector> {
  let n = dataset.len();
  let first = rng.random_range(0..n);
  let mut chosen = vec![first];
  let mut centroids = vec![dataset.vector(first).normalized()];

  let mut min_dist: Vec<f64> = (0..n)
    .map(|i| dissimilarity(dataset.vector(i), norms[i], &centroids[0]))
    .collect();

  while centroids.len() < k {
    let total: f64 = min_dist.iter().sum();
    let next = if total > 1e-12 {
      let mut target = rng.random::<f64>() * total;
      let mut pick = None;
      for (i, &d) in min_dist.iter().enumerate() {
        if d <= 0.0 {
          continue;
        }
        pick = Some(i);
        target -= d;
        if target < 0.0 {
          break;
        }
      }
      pick.unwrap_or(first)
    } else {
      let remaining: Vec<usize> = (0..n).filter(|i| !chosen.contains(i)).collect();
      if remaining.is_empty() {
        rng.random_range(0..n)
      } else {
        remaining[rng.random_range(0..remaining.len())]
      }
    };

    let centroid = dataset.vector(next).normalized();
    for (i, d) in min_dist.iter_mut().enumerate() {
      *d = d.min(dissimilarity(dataset.vector(i), norms[i], &centroid));
    }
    chosen.push(next);
    centroids.push(centroid);
  }

  centroids
}

/// Assign every vector to its most similar centroid (ties go to the lower id).
/// Returns the assignments and the mean best similarity.
fn assign(dataset: &dyn DatasetView, norms: &[f64], centroids: &[SparseVector]) -> (Vec<usize>, f64) {
  let n = dataset.len();
  let best: Vec<(usize, f64)> = (0..n)
    .into_par_iter()
    .map(|i| {
      let x = dataset.vector(i);
      let mut best_c = 0;
      let mut best_sim = f64::NEG_INFINITY;
      for (c, centroid) in centroids.iter().enumerate() {
        let sim = cosine_to_centroid(x, norms[i], centroid);
        if sim > best_sim {
          best_c = c;
          best_sim = sim;
        }
      }
      (best_c, best_sim)
    })
    .collect();

  let quality = best.iter().map(|&(_, s)| s).sum::<f64>() / n as f64;
  (best.into_iter().map(|(c, _)| c).collect(), quality)
}

/// Recompute centroids from assignments. Empty clusters keep their previous centroid.
fn update_centroids(
  dataset: &dyn DatasetView,
  assignments: &[usize],
  previous: Vec<SparseVector>,
) -> Result<Vec<SparseVector>> {
  let mut members: Vec<Vec<usize>> = vec![Vec::new(); previous.len()];
  for (i, &c) in assignments.iter().enumerate() {
    members[c].push(i);
  }

  previous
    .into_par_iter()
    .zip(members.into_par_iter())
    .map(|(prev, members)| {
      if members.is_empty() {
        Ok(prev)
      } else {
        centroid_of(dataset, &members)
      }
    })
    .collect()
}

/// L2-normalized sum of the given members.
fn centroid_of(dataset: &dyn DatasetView, members: &[usize]) -> Result<SparseVector> {
  let mut sum: BTreeMap<u32, f64> = BTreeMap::new();
  for &i in members {
    for (idx, value) in dataset.vector(i).iter() {
      *sum.entry(idx).or_insert(0.0) += value;
    }
  }
  let (indices, values): (Vec<u32>, Vec<f64>) = sum.into_iter().unzip();
  Ok(SparseVector::new(indices, values)?.normalized())
}

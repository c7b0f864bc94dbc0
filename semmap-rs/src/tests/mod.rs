mod test_equations;
mod test_layout;

use crate::sparse::SparseVector;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sprs::CsMat;
use sprs::TriMat;

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_test_writer()
    .with_max_level(tracing::Level::DEBUG)
    .try_init();
}

pub fn sv(pairs: &[(u32, f64)]) -> SparseVector {
  SparseVector::from_pairs(pairs.iter().copied()).unwrap()
}

/// Synthetic "documents": each draws most of its terms from one topic's
/// vocabulary and one term from a small shared vocabulary.
pub fn topic_documents(n: usize, topics: usize, seed: u64) -> Vec<SparseVector> {
  const TOPIC_VOCAB: u32 = 20;
  let shared_base = topics as u32 * TOPIC_VOCAB;
  let mut rng = ChaCha8Rng::seed_from_u64(seed);
  (0..n)
    .map(|i| {
      let topic = (i % topics) as u32;
      let mut pairs: Vec<(u32, f64)> = Vec::new();
      while pairs.len() < 5 {
        let term = topic * TOPIC_VOCAB + rng.random_range(0..TOPIC_VOCAB);
        if !pairs.iter().any(|&(t, _)| t == term) {
          pairs.push((term, rng.random_range(0.5..2.0)));
        }
      }
      pairs.push((shared_base + rng.random_range(0..5), 0.25));
      SparseVector::from_pairs(pairs).unwrap()
    })
    .collect()
}

/// CSR matrix from `(row, col, value)` triplets.
pub fn csr(shape: (usize, usize), entries: &[(usize, usize, f64)]) -> CsMat<f64> {
  let mut tri = TriMat::new(shape);
  for &(r, c, v) in entries {
    tri.add_triplet(r, c, v);
  }
  tri.to_csr::<usize>()
}

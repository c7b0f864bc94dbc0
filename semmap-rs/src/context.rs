use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

/// The generator threaded through clustering and landmark embedding.
///
/// ChaCha8 gives the same stream on every platform for a given seed.
pub type LayoutRng = ChaCha8Rng;

/// Cooperative cancellation flag, cheap to clone and share across threads.
///
/// The pipeline checks the flag between stages; a stage that is already
/// running is allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
  flag: Arc<AtomicBool>,
}

impl CancellationToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.flag.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::SeqCst)
  }

  /// Clear the flag so the token can be reused for another run.
  pub fn reset(&self) {
    self.flag.store(false, Ordering::SeqCst);
  }
}

/// Mutable state shared by every stage of one layout computation.
///
/// There is exactly one generator per context. Collaborators receive it by
/// `&mut` and must never seed a generator of their own.
#[derive(Debug, Clone)]
pub struct LayoutContext {
  pub(crate) rng: LayoutRng,
  cancellation: CancellationToken,
}

impl LayoutContext {
  pub fn new(seed: u64) -> Self {
    Self::from_rng(LayoutRng::seed_from_u64(seed))
  }

  pub fn from_rng(rng: LayoutRng) -> Self {
    Self {
      rng,
      cancellation: CancellationToken::new(),
    }
  }

  /// Replace the cancellation token, e.g. with one held by another thread.
  pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
    self.cancellation = token;
    self
  }

  pub fn rng(&mut self) -> &mut LayoutRng {
    &mut self.rng
  }

  pub fn cancellation(&self) -> &CancellationToken {
    &self.cancellation
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancellation.is_cancelled()
  }
}

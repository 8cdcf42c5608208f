//! The two seams the tick scheduler is built against.
//!
//! The write path (command submission) and the read path (population
//! projection) are deliberately separate interfaces with no implicit
//! synchronization between them. The projection is allowed to lag the
//! authoritative store; consumers that need read-after-write freshness
//! poll with [`crate::consistency::poll_until`] instead of reading once.

use crate::error::SimResult;
use crate::types::{PetId, Tick};

/// Write path: apply one time tick to one pet's authoritative state.
///
/// Fails with [`crate::error::SimError::PetNotFound`] when the pet is
/// absent from the authoritative store — an expected steady-state
/// condition, since population snapshots are stale by construction.
/// Must be safe to call concurrently up to the scheduler's bound.
pub trait TickCommandPort: Send + Sync {
    fn submit_pet_tick(&self, pet_id: &str, tick_seq: Tick) -> SimResult<()>;
}

/// Read path: the eventually consistent view of which pets are alive.
///
/// The returned snapshot may not yet reflect very recent mutations
/// (creations, deaths). Callers must not assume freshness.
pub trait PopulationQueryPort: Send + Sync {
    fn alive_pets(&self) -> SimResult<Vec<PetId>>;
}

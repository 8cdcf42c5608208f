//! Shared primitive types used across the entire simulation.

/// A global tick sequence number. Exactly one value is allocated per
/// dispatched per-pet tick command — not one per round.
pub type Tick = u64;

/// A stable, unique identifier for a pet (UUID v4 text).
pub type PetId = String;

//! Domain events — the only channel between the write model and the
//! status projection.
//!
//! RULE: The projector never reads `Pet` aggregates directly. Every
//! state change it needs must arrive as a `PetEvent`.

use crate::pet::{EvolutionPath, PetKind, PetStage};
use crate::types::{PetId, Tick};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every event emitted by the write model.
/// Variants are appended — never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PetEvent {
    PetCreated {
        pet_id: PetId,
        name: String,
        kind: PetKind,
        at: DateTime<Utc>,
    },
    PetFed {
        pet_id: PetId,
        hunger_reduction: u8,
        at: DateTime<Utc>,
    },
    PetPlayedWith {
        pet_id: PetId,
        happiness_increase: u8,
        hunger_increase: u8,
        at: DateTime<Utc>,
    },
    PetCleaned {
        pet_id: PetId,
        health_increase: u8,
        at: DateTime<Utc>,
    },
    TimePassed {
        pet_id: PetId,
        tick_seq: Tick,
        hunger_increase: u8,
        happiness_decrease: u8,
        age_increase: u8,
        at: DateTime<Utc>,
    },
    PetHealthDeteriorated {
        pet_id: PetId,
        health_decrease: u8,
        reason: String,
        at: DateTime<Utc>,
    },
    PetEvolved {
        pet_id: PetId,
        from_stage: PetStage,
        to_stage: PetStage,
        path: EvolutionPath,
        at: DateTime<Utc>,
    },
    PetDied {
        pet_id: PetId,
        age: u32,
        total_ticks: u64,
        cause: String,
        at: DateTime<Utc>,
    },
}

impl PetEvent {
    pub fn pet_id(&self) -> &str {
        match self {
            Self::PetCreated { pet_id, .. }
            | Self::PetFed { pet_id, .. }
            | Self::PetPlayedWith { pet_id, .. }
            | Self::PetCleaned { pet_id, .. }
            | Self::TimePassed { pet_id, .. }
            | Self::PetHealthDeteriorated { pet_id, .. }
            | Self::PetEvolved { pet_id, .. }
            | Self::PetDied { pet_id, .. } => pet_id,
        }
    }

    /// Stable string name for the event_type column in event_log.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PetCreated { .. } => "pet_created",
            Self::PetFed { .. } => "pet_fed",
            Self::PetPlayedWith { .. } => "pet_played_with",
            Self::PetCleaned { .. } => "pet_cleaned",
            Self::TimePassed { .. } => "time_passed",
            Self::PetHealthDeteriorated { .. } => "pet_health_deteriorated",
            Self::PetEvolved { .. } => "pet_evolved",
            Self::PetDied { .. } => "pet_died",
        }
    }
}

/// An event as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub pet_id: PetId,
    pub event_type: String,
    pub payload: String, // JSON-serialized PetEvent
    pub recorded_at: DateTime<Utc>,
}

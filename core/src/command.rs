use crate::pet::PetKind;
use crate::types::{PetId, Tick};
use serde::{Deserialize, Serialize};

/// All commands accepted by the write model.
/// Variants are appended — never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PetCommand {
    CreatePet {
        pet_id: PetId,
        name: String,
        kind: PetKind,
    },
    FeedPet {
        pet_id: PetId,
        food_amount: u8,
    },
    PlayWithPet {
        pet_id: PetId,
    },
    CleanPet {
        pet_id: PetId,
    },
    /// One per-pet dispatch from the tick scheduler, stamped with its
    /// globally unique sequence number.
    TimeTick {
        pet_id: PetId,
        tick_seq: Tick,
    },
}

impl PetCommand {
    pub fn pet_id(&self) -> &str {
        match self {
            Self::CreatePet { pet_id, .. }
            | Self::FeedPet { pet_id, .. }
            | Self::PlayWithPet { pet_id }
            | Self::CleanPet { pet_id }
            | Self::TimeTick { pet_id, .. } => pet_id,
        }
    }
}

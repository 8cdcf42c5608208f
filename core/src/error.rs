use crate::types::PetId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The target pet does not exist in the authoritative store.
    /// Expected under eventual consistency — projections can report
    /// pets the write model no longer (or does not yet) know about.
    #[error("Pet '{0}' not found")]
    PetNotFound(PetId),

    #[error("Pet '{pet_id}' rejected command: {reason}")]
    CommandRejected { pet_id: PetId, reason: String },

    #[error("Scheduler already running")]
    AlreadyRunning,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimError {
    /// True for the one failure class the dispatch pipeline swallows
    /// with a warning instead of reporting on its error channel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SimError::PetNotFound(_))
    }
}

pub type SimResult<T> = Result<T, SimError>;

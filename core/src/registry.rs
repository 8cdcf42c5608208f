//! The pet registry — the authoritative write model.
//!
//! RULES:
//!   - Only the registry mutates `Pet` aggregates.
//!   - Every emitted event is appended to the event log and forwarded
//!     to the status projector. The registry never touches pet_status.
//!   - Reads for display go through the store's projection, which lags
//!     this registry by construction.

use crate::command::PetCommand;
use crate::error::{SimError, SimResult};
use crate::event::{EventLogEntry, PetEvent};
use crate::pet::{Pet, PetKind};
use crate::ports::TickCommandPort;
use crate::store::SimStore;
use crate::types::{PetId, Tick};
use chrono::Utc;
use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct PetRegistry {
    pets: Mutex<HashMap<PetId, Pet>>,
    store: Arc<SimStore>,
    events_tx: Sender<PetEvent>,
}

impl PetRegistry {
    pub fn new(store: Arc<SimStore>, events_tx: Sender<PetEvent>) -> Self {
        Self {
            pets: Mutex::new(HashMap::new()),
            store,
            events_tx,
        }
    }

    /// Create a pet with a fresh UUID. Returns the new id.
    pub fn create_pet(&self, name: &str, kind: PetKind) -> SimResult<PetId> {
        let pet_id = uuid::Uuid::new_v4().to_string();
        self.handle(PetCommand::CreatePet {
            pet_id: pet_id.clone(),
            name: name.to_string(),
            kind,
        })?;
        Ok(pet_id)
    }

    /// Apply one command to its target aggregate.
    pub fn handle(&self, command: PetCommand) -> SimResult<()> {
        let events = {
            let mut pets = self.pets.lock().expect("registry mutex poisoned");
            match command {
                PetCommand::CreatePet { pet_id, name, kind } => {
                    let (pet, event) = Pet::create(pet_id.clone(), &name, kind)?;
                    pets.insert(pet_id, pet);
                    vec![event]
                }
                PetCommand::FeedPet { pet_id, food_amount } => {
                    Self::with_pet(&mut pets, &pet_id, |pet| pet.feed(food_amount))?
                }
                PetCommand::PlayWithPet { pet_id } => {
                    Self::with_pet(&mut pets, &pet_id, |pet| pet.play())?
                }
                PetCommand::CleanPet { pet_id } => {
                    Self::with_pet(&mut pets, &pet_id, |pet| pet.clean())?
                }
                PetCommand::TimeTick { pet_id, tick_seq } => {
                    Self::with_pet(&mut pets, &pet_id, |pet| Ok(pet.time_tick(tick_seq)))?
                }
            }
        };
        self.publish(events)
    }

    /// Authoritative alive count — used by the runner summary, not by
    /// the scheduler (which must go through the projection).
    pub fn alive_count(&self) -> usize {
        let pets = self.pets.lock().expect("registry mutex poisoned");
        pets.values().filter(|p| p.alive).count()
    }

    fn with_pet<F>(
        pets: &mut HashMap<PetId, Pet>,
        pet_id: &str,
        f: F,
    ) -> SimResult<Vec<PetEvent>>
    where
        F: FnOnce(&mut Pet) -> SimResult<Vec<PetEvent>>,
    {
        let pet = pets
            .get_mut(pet_id)
            .ok_or_else(|| SimError::PetNotFound(pet_id.to_string()))?;
        f(pet)
    }

    fn publish(&self, events: Vec<PetEvent>) -> SimResult<()> {
        for event in events {
            let entry = EventLogEntry {
                id: None,
                pet_id: event.pet_id().to_string(),
                event_type: event.type_name().to_string(),
                payload: serde_json::to_string(&event)?,
                recorded_at: Utc::now(),
            };
            self.store.append_event(&entry)?;
            // A closed channel means the projector is gone; the event
            // log still has the record, so keep going.
            if self.events_tx.send(event).is_err() {
                log::debug!("Event channel closed, projector no longer listening");
            }
        }
        Ok(())
    }
}

impl TickCommandPort for PetRegistry {
    fn submit_pet_tick(&self, pet_id: &str, tick_seq: Tick) -> SimResult<()> {
        self.handle(PetCommand::TimeTick {
            pet_id: pet_id.to_string(),
            tick_seq,
        })
    }
}

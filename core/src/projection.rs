//! The status projector — keeps the pet_status read model in sync with
//! the write model, asynchronously.
//!
//! The projector runs on its own thread and applies events in arrival
//! order. Its lag behind the registry is the source of the engine's
//! eventual consistency: a population snapshot taken between a mutation
//! and its projection will be stale. That lag is part of the contract,
//! not a bug (see [`crate::consistency`]).

use crate::event::PetEvent;
use crate::store::{PetStatusRow, SimStore};
use chrono::Utc;
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct StatusProjector;

impl StatusProjector {
    /// Spawn the projector thread. It exits when every event sender has
    /// been dropped and the channel drains.
    pub fn spawn(store: Arc<SimStore>, events: Receiver<PetEvent>) -> JoinHandle<()> {
        thread::Builder::new()
            .name("status-projector".into())
            .spawn(move || {
                for event in events.iter() {
                    if let Err(e) = apply(&store, &event) {
                        log::error!(
                            "Projection failed for pet {}: {e}",
                            event.pet_id()
                        );
                    }
                }
                log::debug!("Status projector shutting down (event channel closed)");
            })
            .expect("failed to spawn status projector")
    }
}

fn apply(store: &SimStore, event: &PetEvent) -> crate::error::SimResult<()> {
    match event {
        PetEvent::PetCreated { pet_id, name, kind, at } => {
            store.upsert_status(&PetStatusRow {
                pet_id: pet_id.clone(),
                name: name.clone(),
                kind: kind.name().to_string(),
                hunger: 30,
                happiness: 70,
                health: 100,
                stage: "egg".into(),
                path: "undetermined".into(),
                alive: true,
                age: 0,
                total_ticks: 0,
                last_tick_seq: None,
                updated_at: *at,
            })?;
            log::info!("Pet created: {name} ({})", kind.name());
        }
        PetEvent::PetFed { pet_id, hunger_reduction, at } => {
            if let Some(mut row) = store.status(pet_id)? {
                row.hunger = row.hunger.saturating_sub(*hunger_reduction);
                row.updated_at = *at;
                store.upsert_status(&row)?;
            }
        }
        PetEvent::PetPlayedWith { pet_id, happiness_increase, hunger_increase, at } => {
            if let Some(mut row) = store.status(pet_id)? {
                row.happiness = (row.happiness + happiness_increase).min(100);
                row.hunger = (row.hunger + hunger_increase).min(100);
                row.updated_at = *at;
                store.upsert_status(&row)?;
            }
        }
        PetEvent::PetCleaned { pet_id, health_increase, at } => {
            if let Some(mut row) = store.status(pet_id)? {
                row.health = (row.health + health_increase).min(100);
                row.updated_at = *at;
                store.upsert_status(&row)?;
            }
        }
        PetEvent::TimePassed {
            pet_id,
            tick_seq,
            hunger_increase,
            happiness_decrease,
            age_increase,
            at,
        } => {
            if let Some(mut row) = store.status(pet_id)? {
                row.hunger = (row.hunger + hunger_increase).min(100);
                row.happiness = row.happiness.saturating_sub(*happiness_decrease);
                row.age += *age_increase as u32;
                row.total_ticks += 1;
                row.last_tick_seq = Some(*tick_seq);
                row.updated_at = *at;
                store.upsert_status(&row)?;
            }
        }
        PetEvent::PetHealthDeteriorated { pet_id, health_decrease, reason, at } => {
            if let Some(mut row) = store.status(pet_id)? {
                row.health = row.health.saturating_sub(*health_decrease);
                row.updated_at = *at;
                store.upsert_status(&row)?;
                log::warn!("Pet {} health dropped by {health_decrease}: {reason}", row.name);
            }
        }
        PetEvent::PetEvolved { pet_id, to_stage, path, at, .. } => {
            if let Some(mut row) = store.status(pet_id)? {
                row.stage = to_stage.name().to_string();
                row.path = path.name().to_string();
                row.updated_at = *at;
                store.upsert_status(&row)?;
                log::info!("Pet {} evolved to {}", row.name, to_stage.name());
            }
        }
        PetEvent::PetDied { pet_id, age, total_ticks, cause, .. } => {
            if let Some(mut row) = store.status(pet_id)? {
                row.alive = false;
                row.age = *age;
                row.total_ticks = *total_ticks;
                row.updated_at = Utc::now();
                store.upsert_status(&row)?;
                log::warn!("Pet {} died at age {age}: {cause}", row.name);
            }
        }
    }
    Ok(())
}

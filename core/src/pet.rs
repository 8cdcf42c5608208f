//! The pet aggregate — authoritative state and business rules.
//!
//! RULES:
//!   - All stat fields stay in 0..=100; every mutation clamps.
//!   - Dead pets accept no commands. Time ticks on a dead pet are a
//!     silent no-op, not an error.
//!   - Tick application is idempotent per global sequence number: a
//!     tick with a sequence at or below the last one applied is ignored.

use crate::error::{SimError, SimResult};
use crate::event::PetEvent;
use crate::types::{PetId, Tick};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetKind {
    Dog,
    Cat,
    Dragon,
}

impl PetKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dog => "dog",
            Self::Cat => "cat",
            Self::Dragon => "dragon",
        }
    }
}

/// Growth stages, in order. Evolution is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetStage {
    Egg,
    Baby,
    Teen,
    Adult,
}

impl PetStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Egg => "egg",
            Self::Baby => "baby",
            Self::Teen => "teen",
            Self::Adult => "adult",
        }
    }
}

/// Care quality, fixed at the first evolution and never revised.
/// Neglected pets decay 50% faster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionPath {
    Undetermined,
    Healthy,
    Neglected,
}

impl EvolutionPath {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Undetermined => "undetermined",
            Self::Healthy => "healthy",
            Self::Neglected => "neglected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pet {
    pub pet_id: PetId,
    pub name: String,
    pub kind: PetKind,
    pub hunger: u8,    // 0 = full, 100 = starving
    pub happiness: u8, // 0 = miserable, 100 = delighted
    pub health: u8,    // 0 = dead
    pub stage: PetStage,
    pub path: EvolutionPath,
    pub alive: bool,
    pub age: u32, // one age unit per 10 ticks
    pub total_ticks: u64,
    /// Last applied global tick sequence — the idempotency guard.
    pub last_tick_seq: Option<Tick>,
}

impl Pet {
    pub fn create(pet_id: PetId, name: &str, kind: PetKind) -> SimResult<(Self, PetEvent)> {
        if name.trim().is_empty() {
            return Err(SimError::CommandRejected {
                pet_id,
                reason: "pet name cannot be empty".into(),
            });
        }
        let pet = Self {
            pet_id: pet_id.clone(),
            name: name.to_string(),
            kind,
            hunger: 30,
            happiness: 70,
            health: 100,
            stage: PetStage::Egg,
            path: EvolutionPath::Undetermined,
            alive: true,
            age: 0,
            total_ticks: 0,
            last_tick_seq: None,
        };
        let event = PetEvent::PetCreated {
            pet_id,
            name: name.to_string(),
            kind,
            at: Utc::now(),
        };
        Ok((pet, event))
    }

    pub fn feed(&mut self, food_amount: u8) -> SimResult<Vec<PetEvent>> {
        self.require_alive("feed")?;
        if food_amount == 0 {
            return Err(SimError::CommandRejected {
                pet_id: self.pet_id.clone(),
                reason: "food amount must be positive".into(),
            });
        }
        let reduction = food_amount.min(self.hunger);
        self.hunger -= reduction;
        Ok(vec![PetEvent::PetFed {
            pet_id: self.pet_id.clone(),
            hunger_reduction: reduction,
            at: Utc::now(),
        }])
    }

    /// Playing raises happiness (+15) at the cost of hunger (+5).
    pub fn play(&mut self) -> SimResult<Vec<PetEvent>> {
        self.require_alive("play with")?;
        if self.happiness >= 100 {
            return Err(SimError::CommandRejected {
                pet_id: self.pet_id.clone(),
                reason: "pet is already at maximum happiness".into(),
            });
        }
        let happiness_increase = 15u8.min(100 - self.happiness);
        let hunger_increase = 5u8.min(100 - self.hunger);
        self.happiness += happiness_increase;
        self.hunger += hunger_increase;
        Ok(vec![PetEvent::PetPlayedWith {
            pet_id: self.pet_id.clone(),
            happiness_increase,
            hunger_increase,
            at: Utc::now(),
        }])
    }

    /// Cleaning restores health (+10). Allowed even at full health.
    pub fn clean(&mut self) -> SimResult<Vec<PetEvent>> {
        self.require_alive("clean")?;
        let health_increase = 10u8.min(100 - self.health);
        self.health += health_increase;
        Ok(vec![PetEvent::PetCleaned {
            pet_id: self.pet_id.clone(),
            health_increase,
            at: Utc::now(),
        }])
    }

    /// Apply one global time tick. Returns the emitted events; an empty
    /// vec means the tick was a no-op (dead pet or stale sequence).
    pub fn time_tick(&mut self, tick_seq: Tick) -> Vec<PetEvent> {
        if !self.alive {
            return Vec::new();
        }
        if let Some(last) = self.last_tick_seq {
            if tick_seq <= last {
                return Vec::new();
            }
        }

        let (base_hunger, base_happiness) = self.decay_rates();
        let hunger_increase = base_hunger.min(100 - self.hunger);
        let happiness_decrease = base_happiness.min(self.happiness);
        let age_increase = if (self.total_ticks + 1) % 10 == 0 { 1 } else { 0 };

        self.hunger += hunger_increase;
        self.happiness -= happiness_decrease;
        self.age += age_increase as u32;
        self.total_ticks += 1;
        self.last_tick_seq = Some(tick_seq);

        let mut events = vec![PetEvent::TimePassed {
            pet_id: self.pet_id.clone(),
            tick_seq,
            hunger_increase,
            happiness_decrease,
            age_increase,
            at: Utc::now(),
        }];

        // Neglect takes its toll after the decay lands.
        let mut health_decrease = 0u8;
        let mut reason = String::new();
        if self.hunger > 80 {
            health_decrease += 5;
            reason.push_str("extreme hunger");
        }
        if self.happiness < 20 {
            health_decrease += 3;
            if !reason.is_empty() {
                reason.push_str(" and ");
            }
            reason.push_str("low happiness");
        }
        if health_decrease > 0 {
            let health_decrease = health_decrease.min(self.health);
            self.health -= health_decrease;
            events.push(PetEvent::PetHealthDeteriorated {
                pet_id: self.pet_id.clone(),
                health_decrease,
                reason: reason.clone(),
                at: Utc::now(),
            });
        }

        if self.health == 0 {
            self.alive = false;
            events.push(PetEvent::PetDied {
                pet_id: self.pet_id.clone(),
                age: self.age,
                total_ticks: self.total_ticks,
                cause: format!("health reached zero: {reason}"),
                at: Utc::now(),
            });
            return events;
        }

        if let Some(next_stage) = self.evolution_target() {
            let from_stage = self.stage;
            if self.path == EvolutionPath::Undetermined {
                self.path = if self.hunger > 70 || self.happiness < 30 {
                    EvolutionPath::Neglected
                } else {
                    EvolutionPath::Healthy
                };
            }
            self.stage = next_stage;
            events.push(PetEvent::PetEvolved {
                pet_id: self.pet_id.clone(),
                from_stage,
                to_stage: next_stage,
                path: self.path,
                at: Utc::now(),
            });
        }

        events
    }

    /// Per-tick stat decay: hunger up, happiness down. Adults degrade
    /// slower; the neglected path degrades 50% faster (rounded up).
    fn decay_rates(&self) -> (u8, u8) {
        let (mut hunger, mut happiness) = match self.stage {
            PetStage::Adult => (2u8, 1u8),
            _ => (3u8, 2u8),
        };
        if self.path == EvolutionPath::Neglected {
            hunger = (hunger as u16 * 3).div_ceil(2) as u8;
            happiness = (happiness as u16 * 3).div_ceil(2) as u8;
        }
        (hunger, happiness)
    }

    /// Next stage if the thresholds are met this tick, else None.
    fn evolution_target(&self) -> Option<PetStage> {
        match self.stage {
            PetStage::Egg if self.age >= 5 => Some(PetStage::Baby),
            PetStage::Baby if self.age >= 20 && self.happiness > 50 => Some(PetStage::Teen),
            PetStage::Teen if self.age >= 50 && self.health > 60 && self.happiness > 60 => {
                Some(PetStage::Adult)
            }
            _ => None,
        }
    }

    fn require_alive(&self, action: &str) -> SimResult<()> {
        if self.alive {
            Ok(())
        } else {
            Err(SimError::CommandRejected {
                pet_id: self.pet_id.clone(),
                reason: format!("cannot {action} a dead pet"),
            })
        }
    }
}

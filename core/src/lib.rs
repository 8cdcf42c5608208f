//! hatchling-core — a virtual-pet colony with a CQRS split.
//!
//! The write model ([`registry::PetRegistry`]) owns the authoritative
//! pet aggregates; the read model ([`store::SimStore`]'s pet_status
//! projection) is updated asynchronously by [`projection::StatusProjector`]
//! and lags behind it. [`scheduler::TickScheduler`] drives the whole
//! population forward on a fixed cadence through the two ports in
//! [`ports`], with a global concurrency bound and per-pet failure
//! isolation.

pub mod command;
pub mod config;
pub mod consistency;
pub mod error;
pub mod event;
pub mod pet;
pub mod ports;
pub mod projection;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod types;

//! pet-runner: headless colony runner.
//!
//! Usage:
//!   pet-runner --pets 5 --rounds 10 --interval-ms 1000
//!   pet-runner --db colony.db --config sim.json

use anyhow::Result;
use hatchling_core::{
    config::SimConfig,
    pet::PetKind,
    projection::StatusProjector,
    registry::PetRegistry,
    scheduler::{DispatchOutcome, TickScheduler},
    store::SimStore,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let pets = parse_arg(&args, "--pets", 3u64);
    let rounds = parse_arg(&args, "--rounds", 10u64);
    let db = str_arg(&args, "--db").unwrap_or(":memory:");

    let mut config = match str_arg(&args, "--config") {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    // CLI flags win over the config file.
    config.tick_interval_ms = parse_arg(&args, "--interval-ms", config.tick_interval_ms);
    config.concurrency = parse_arg(&args, "--concurrency", config.concurrency as u64) as usize;

    println!("Hatchling — pet-runner");
    println!("  pets:        {pets}");
    println!("  rounds:      {rounds}");
    println!("  interval:    {} ms", config.tick_interval_ms);
    println!("  concurrency: {}", config.concurrency);
    println!("  db:          {db}");
    println!();

    let store = Arc::new(if db == ":memory:" {
        SimStore::in_memory()?
    } else {
        SimStore::open(db)?
    });
    store.migrate()?;

    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let projector = StatusProjector::spawn(Arc::clone(&store), events_rx);
    let registry = Arc::new(PetRegistry::new(Arc::clone(&store), events_tx));

    let kinds = [PetKind::Dog, PetKind::Cat, PetKind::Dragon];
    for n in 0..pets {
        let kind = kinds[(n % kinds.len() as u64) as usize];
        let pet_id = registry.create_pet(&format!("pet-{n}"), kind)?;
        log::info!("Created pet {pet_id}");
    }

    let commands: Arc<dyn hatchling_core::ports::TickCommandPort> = registry.clone();
    let population: Arc<dyn hatchling_core::ports::PopulationQueryPort> = store.clone();
    let mut scheduler = TickScheduler::new(&config, commands, population);

    if config.start_paused {
        println!("start_paused is set — not starting the scheduler.");
        return Ok(());
    }

    let outcomes = scheduler.start()?;
    std::thread::sleep(Duration::from_millis(
        config.tick_interval_ms * rounds + config.tick_interval_ms / 2,
    ));
    scheduler.stop();

    let (mut delivered, mut skipped, mut failed) = (0u64, 0u64, 0u64);
    while let Ok(outcome) = outcomes.try_recv() {
        match outcome {
            DispatchOutcome::Delivered { .. } => delivered += 1,
            DispatchOutcome::SkippedMissing { .. } => skipped += 1,
            DispatchOutcome::Failed { .. } => failed += 1,
        }
    }

    println!("── Run summary ────────────────────────────");
    println!("  sequences allocated: {}", scheduler.dispatched_count());
    println!("  delivered:           {delivered}");
    println!("  skipped (missing):   {skipped}");
    println!("  failed:              {failed}");
    println!("  alive (write model): {}", registry.alive_count());
    println!("  alive (projection):  {}", store.alive_count()?);
    println!();
    for row in store.all_statuses()? {
        println!(
            "  {} [{}] {} — hunger {}, happiness {}, health {}, age {}, ticks {}{}",
            row.name,
            row.kind,
            row.stage,
            row.hunger,
            row.happiness,
            row.health,
            row.age,
            row.total_ticks,
            if row.alive { "" } else { " (dead)" },
        );
    }

    // Dropping the registry closes the event channel; the projector
    // drains what is left and exits.
    drop(registry);
    drop(scheduler);
    let _ = projector.join();

    Ok(())
}

fn parse_arg(args: &[String], flag: &str, default: u64) -> u64 {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

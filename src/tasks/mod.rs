//! Background Tasks Module
//!
//! Contains the tasks that run alongside the pipeline.
//!
//! # Tasks
//! - Sweep: purges expired beacons at the configured interval
//! - Timers: one cancellable re-evaluation per pending beacon

mod sweep;
mod timers;

pub use sweep::spawn_sweep_task;
pub use timers::TimerRegistry;

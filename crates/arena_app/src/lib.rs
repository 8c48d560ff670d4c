//! World assembly and the headless match harness.

pub mod simulation;

pub use simulation::{
    Simulation, SimulationConfig, SimulationError, StepInput, default_lanes, default_unit_table,
    projectile_contacts,
};

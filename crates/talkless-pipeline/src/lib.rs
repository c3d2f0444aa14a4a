//! Run orchestration for the Talk-Less pipeline.
//!
//! A thin layer over the domain crates: the [`Orchestrator`] wires the
//! ingestor, grouper, bias detector, and summarizer into the seven-stage
//! run and assembles the [`RunArtifacts`] handed to the persistence
//! collaborator; [`schedule::run_scheduled`] repeats runs on an interval.

pub mod artifacts;
pub mod orchestrator;
pub mod schedule;

pub use artifacts::RunArtifacts;
pub use orchestrator::Orchestrator;

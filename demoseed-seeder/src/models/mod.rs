//! Core types flowing through the seeding pipeline

mod records;

pub use records::{
    CandidateRecord, HistoricalWindow, RunSummary, SeedStatus, SeededRecord, TemporalAssignment,
};

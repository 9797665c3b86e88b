//! # key-sweep
//!
//! Multi-source discovery and validation pipeline for leaked API keys.
//!
//! Candidates are gathered concurrently from several public search backends,
//! deduplicated within the run and against a durable store of previously
//! handled keys, then fanned out to a validator under a concurrency bound.
//!
//! ## Architecture
//!
//! - [`core::traits::SourceAdapter`]: pages through one search backend and
//!   pushes candidates into the shared pool
//! - [`extract::TokenPattern`]: pure text-to-candidate extraction
//! - [`core::traits::KeyValidator`]: classifies one candidate against the
//!   provider, keeping transient failures distinct from definitive verdicts
//! - [`pipeline::Pipeline`]: drives one run end to end
//! - [`store::DedupStore`]: the only state shared across runs

pub mod cli;
pub mod core;
pub mod extract;
pub mod pipeline;
pub mod sources;
pub mod store;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use crate::core::{
    Candidate, Classification, Config, KeyFacts, KeyReport, KeySweepError, KeyValidator, Result,
    RunSummary, SearchCursor, SourceAdapter, SourceId,
};
pub use crate::extract::TokenPattern;
pub use crate::pipeline::{CandidatePool, Pipeline};
pub use crate::store::{CredList, DedupStore};

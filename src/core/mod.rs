pub mod config;
pub mod error;
pub mod results;
pub mod traits;

pub use config::Config;
pub use error::{KeySweepError, Result};
pub use results::{
    Candidate, Classification, KeyFacts, KeyReport, RunSummary, SearchCursor, SourceId,
};
pub use traits::{KeyValidator, SourceAdapter};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::error::Result;
use super::results::{Classification, SourceId};
use crate::pipeline::CandidatePool;

/// One search backend. An adapter pages through its backend and pushes every
/// candidate it finds into the shared pool; adapters never call the
/// validator.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> SourceId;

    /// Run the full discovery loop for this backend. Returns the number of
    /// tokens newly inserted into `pool`.
    async fn discover(&self, pool: Arc<CandidatePool>) -> Result<usize>;
}

/// Checks one candidate against the authorization provider.
///
/// `Err` means the check itself failed (network trouble, backend errors) and
/// the candidate must not be treated as classified; only `Ok` carries a
/// verdict.
#[async_trait]
pub trait KeyValidator: Send + Sync {
    async fn validate(&self, key: &str) -> Result<Classification>;

    /// Delay applied before each validation call.
    fn rate_limit(&self) -> Duration {
        Duration::from_secs(1)
    }
}

//! Work items, per-item results and the adapter seam the runner drives

use crate::{FetchError, FetchOutcome};
use async_trait::async_trait;

/// A unit of work submitted to a batch
pub trait WorkItem: Send + Sync {
    /// Identifier used to key results; duplicates in one batch are collapsed
    fn id(&self) -> String;

    /// Human-readable name for logs and progress
    fn label(&self) -> String;
}

/// Outcome of one work item in one run
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult<P> {
    Success(P),
    Failure(FetchError),
    Skipped(String),
}

impl<P> FetchResult<P> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// Returns the payload of a successful result
    pub fn payload(&self) -> Option<&P> {
        match self {
            Self::Success(p) => Some(p),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Failure(e) => Some(e),
            _ => None,
        }
    }
}

/// Performs the external call for one work item
///
/// Implementations make one logical call per `fetch` and report failures as
/// `FetchError` values; the runner owns retries, pacing and admission.
#[async_trait]
pub trait BatchAdapter: Send + Sync {
    type Item: WorkItem;
    type Output: Send + Sync;

    async fn fetch(&self, item: &Self::Item) -> FetchOutcome<Self::Output>;

    /// Returns true if the item's result is already available locally
    fn is_cached(&self, _item: &Self::Item) -> bool {
        false
    }

    /// Quota units one `fetch` of the item is expected to consume
    fn estimated_cost(&self, _item: &Self::Item) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_result_accessors() {
        let ok: FetchResult<u32> = FetchResult::Success(7);
        assert!(ok.is_success());
        assert_eq!(ok.payload(), Some(&7));
        assert!(ok.error().is_none());

        let failed: FetchResult<u32> = FetchResult::Failure(FetchError::Api("down".into()));
        assert!(failed.is_failure());
        assert_eq!(failed.error(), Some(&FetchError::Api("down".into())));

        let skipped: FetchResult<u32> = FetchResult::Skipped("cached".into());
        assert!(skipped.is_skipped());
        assert!(skipped.payload().is_none());
    }
}

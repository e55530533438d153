use async_trait::async_trait;

pub mod quote;
pub mod search;

pub use quote::{QuoteClient, QuoteOutcome};
pub use search::{SearchClient, SymbolValidator, Validation};

/// Boundary between the refresh loop and whatever answers quote requests.
/// Implementations must resolve every request to a terminal outcome:
/// transport failures are classified into `QuoteOutcome::Failed`, never
/// propagated as errors.
#[async_trait]
pub trait QuoteLookup: Send + Sync {
    async fn lookup(&self, symbol: &str) -> QuoteOutcome;
}

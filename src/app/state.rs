use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::{Config, ValidationMode};
use crate::error::Result;
use crate::fetch::{QuoteClient, QuoteLookup, SearchClient, SymbolValidator, Validation};
use crate::holdings::{HoldingsBook, PendingHolding};
use crate::refresh::{QuoteBoard, RefreshScheduler};
use crate::utils::current_clock_time;

/// Everything the dashboard screen works against: the holdings book, the
/// refresh scheduler, and the symbol validator, wired up from `Config`.
pub struct DashboardState {
    config: Config,
    holdings: HoldingsBook,
    scheduler: RefreshScheduler,
    validator: Arc<SymbolValidator>,
    scheduled_revision: u64,
    seen_resolved: usize,
    updated_at: Option<String>,
}

impl DashboardState {
    pub fn new(config: Config) -> Result<Self> {
        let source = match config.api_key.clone() {
            Some(key) => Some(
                Arc::new(QuoteClient::new(key, config.request_timeout)?) as Arc<dyn QuoteLookup>,
            ),
            None => None,
        };

        let validator = match (config.validation, config.api_key.clone()) {
            (ValidationMode::Live, Some(key)) => {
                SymbolValidator::Live(SearchClient::new(key, config.request_timeout)?)
            }
            _ => SymbolValidator::Mock,
        };

        let scheduler = RefreshScheduler::new(source, config.pacing);

        Ok(Self {
            config,
            holdings: HoldingsBook::new(),
            scheduler,
            validator: Arc::new(validator),
            scheduled_revision: 0,
            seen_resolved: 0,
            updated_at: None,
        })
    }

    pub fn holdings(&self) -> &HoldingsBook {
        &self.holdings
    }

    pub fn quotes_enabled(&self) -> bool {
        self.config.quotes_enabled()
    }

    pub fn validation_mode(&self) -> ValidationMode {
        self.config.validation
    }

    pub fn board_snapshot(&self) -> QuoteBoard {
        self.scheduler.snapshot()
    }

    /// Time of the most recent board change, for the status line.
    pub fn updated_at(&self) -> Option<&str> {
        self.updated_at.as_deref()
    }

    /// Run the validator off the draw loop; the screen polls the handle.
    pub fn spawn_validation(&self, symbol: String) -> JoinHandle<Validation> {
        let validator = Arc::clone(&self.validator);
        tokio::spawn(async move { validator.validate(&symbol).await })
    }

    pub fn add_validated(&mut self, pending: PendingHolding) {
        self.holdings.add(pending.into_holding());
    }

    /// Called once per tick: restart the refresh loop when holdings changed
    /// since the last scheduled run, and stamp the board's last update.
    /// Restarts are cheap because the run skips every resolved symbol.
    pub fn sync_refresh(&mut self) {
        let revision = self.holdings.revision();
        if revision != self.scheduled_revision {
            self.scheduled_revision = revision;
            self.scheduler.refresh(self.holdings.work_set());
        }

        let resolved = self.scheduler.snapshot().resolved_count();
        if resolved != self.seen_resolved {
            self.seen_resolved = resolved;
            self.updated_at = Some(current_clock_time());
        }
    }

    /// Explicit user retry: failed symbols get one more attempt, resolved
    /// prices are never refetched.
    pub fn retry_errors(&mut self) {
        self.scheduler.retry_errors(self.holdings.work_set());
        self.seen_resolved = self.scheduler.snapshot().resolved_count();
    }

    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
    }
}

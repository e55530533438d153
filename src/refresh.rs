use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::fetch::{QuoteLookup, QuoteOutcome};

/// Resolution state of one symbol on the board.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteState {
    Pending,
    Price(f64),
    Failed(String),
}

/// Latest price or error per symbol. The two buckets are disjoint and
/// append-only: once a symbol is resolved (either way) it is never
/// refetched for the lifetime of the board generation.
#[derive(Debug, Clone, Default)]
pub struct QuoteBoard {
    prices: HashMap<String, f64>,
    errors: HashMap<String, String>,
}

impl QuoteBoard {
    pub fn state_of(&self, symbol: &str) -> QuoteState {
        if let Some(price) = self.prices.get(symbol) {
            return QuoteState::Price(*price);
        }
        if let Some(reason) = self.errors.get(symbol) {
            return QuoteState::Failed(reason.clone());
        }
        QuoteState::Pending
    }

    pub fn price_of(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied()
    }

    pub fn is_resolved(&self, symbol: &str) -> bool {
        self.prices.contains_key(symbol) || self.errors.contains_key(symbol)
    }

    pub fn resolved_count(&self) -> usize {
        self.prices.len() + self.errors.len()
    }

    /// Drop resolved errors so an explicit retry can refetch them. Prices
    /// are untouched.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub(crate) fn record(&mut self, symbol: &str, outcome: QuoteOutcome) {
        // First resolution wins; the buckets stay disjoint.
        if self.is_resolved(symbol) {
            return;
        }
        match outcome {
            QuoteOutcome::Price(price) => {
                self.prices.insert(symbol.to_string(), price);
            }
            QuoteOutcome::Failed(reason) => {
                self.errors.insert(symbol.to_string(), reason);
            }
        }
    }
}

struct RunHandle {
    cancelled: Arc<AtomicBool>,
    #[allow(dead_code)]
    task: JoinHandle<()>,
}

/// Owns the result board and guarantees at most one live run. The UI may
/// call `refresh` as often as it likes: resolved symbols are skipped, so
/// restarts are cheap and idempotent.
pub struct RefreshScheduler {
    board: Arc<Mutex<QuoteBoard>>,
    source: Option<Arc<dyn QuoteLookup>>,
    pacing: Duration,
    live_run: Option<RunHandle>,
}

impl RefreshScheduler {
    /// `source = None` is the recognized unconfigured state: every refresh
    /// degrades to a no-op instead of failing.
    pub fn new(source: Option<Arc<dyn QuoteLookup>>, pacing: Duration) -> Self {
        Self {
            board: Arc::new(Mutex::new(QuoteBoard::default())),
            source,
            pacing,
            live_run: None,
        }
    }

    /// Clone of the board for rendering; the live run keeps writing to the
    /// shared copy behind the lock.
    pub fn snapshot(&self) -> QuoteBoard {
        self.board.lock().unwrap().clone()
    }

    /// Resolve every pending symbol in `work_set`, superseding any earlier
    /// run. Returns immediately; results land on the board as requests
    /// complete, one at a time.
    pub fn refresh(&mut self, work_set: Vec<String>) {
        self.cancel_live_run();

        let Some(source) = self.source.clone() else {
            log::debug!("Quote source unconfigured; refresh is a no-op");
            return;
        };

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let board = Arc::clone(&self.board);
        let pacing = self.pacing;

        let task = tokio::spawn(async move {
            run_once(&work_set, &board, source.as_ref(), pacing, &flag).await;
        });

        self.live_run = Some(RunHandle { cancelled, task });
    }

    /// Explicit retry: clear the error bucket (prices are kept) and run
    /// again so failed symbols get one more attempt each.
    pub fn retry_errors(&mut self, work_set: Vec<String>) {
        self.board.lock().unwrap().clear_errors();
        self.refresh(work_set);
    }

    /// Mark the live run abandoned. Cooperative: the run notices at its
    /// next per-symbol check and stops recording, the in-flight request is
    /// not aborted.
    pub fn shutdown(&mut self) {
        self.cancel_live_run();
    }

    fn cancel_live_run(&mut self) {
        if let Some(run) = self.live_run.take() {
            run.cancelled.store(true, Ordering::SeqCst);
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One sequential pass over the work-set: skip already-resolved symbols,
/// fetch the rest one at a time in stable order, and wait `pacing` between
/// consecutive requests to honor the provider throttle. Cancellation is
/// checked at each symbol boundary and after each await, never mid-flight;
/// a result that lands after abandonment is discarded, not recorded.
pub async fn run_once(
    work_set: &[String],
    board: &Mutex<QuoteBoard>,
    source: &dyn QuoteLookup,
    pacing: Duration,
    cancelled: &AtomicBool,
) {
    for symbol in work_set {
        if cancelled.load(Ordering::SeqCst) {
            return;
        }
        if board.lock().unwrap().is_resolved(symbol) {
            continue;
        }

        let outcome = source.lookup(symbol).await;

        if cancelled.load(Ordering::SeqCst) {
            return;
        }

        match &outcome {
            QuoteOutcome::Price(price) => log::debug!("{} resolved to {}", symbol, price),
            QuoteOutcome::Failed(reason) => log::debug!("{} failed: {}", symbol, reason),
        }
        board.lock().unwrap().record(symbol, outcome);

        sleep(pacing).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Instant;

    /// Test double that records call order/time and replays fixed outcomes.
    struct ScriptedSource {
        outcomes: HashMap<String, QuoteOutcome>,
        calls: Mutex<Vec<(String, Instant)>>,
        delay: Duration,
        cancel_on_call: Option<(usize, Arc<AtomicBool>)>,
    }

    impl ScriptedSource {
        fn new(outcomes: &[(&str, QuoteOutcome)]) -> Self {
            Self {
                outcomes: outcomes
                    .iter()
                    .map(|(symbol, outcome)| (symbol.to_string(), outcome.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
                cancel_on_call: None,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Trip the given flag while the nth call (1-based) is in flight.
        fn cancelling(mut self, nth: usize, flag: Arc<AtomicBool>) -> Self {
            self.cancel_on_call = Some((nth, flag));
            self
        }

        fn call_symbols(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(symbol, _)| symbol.clone())
                .collect()
        }

        fn call_instants(&self) -> Vec<Instant> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(_, instant)| *instant)
                .collect()
        }
    }

    #[async_trait]
    impl QuoteLookup for ScriptedSource {
        async fn lookup(&self, symbol: &str) -> QuoteOutcome {
            let call_index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((symbol.to_string(), Instant::now()));
                calls.len()
            };
            if let Some((nth, flag)) = &self.cancel_on_call {
                if call_index == *nth {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            self.outcomes
                .get(symbol)
                .cloned()
                .unwrap_or_else(|| QuoteOutcome::Failed("unscripted symbol".to_string()))
        }
    }

    fn symbols(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[tokio::test]
    async fn completed_run_resolves_every_symbol_in_order() {
        let source = ScriptedSource::new(&[
            ("AAPL", QuoteOutcome::Price(160.0)),
            ("MSFT", QuoteOutcome::Failed("Invalid API call.".to_string())),
            ("NVDA", QuoteOutcome::Price(900.5)),
        ]);
        let board = Mutex::new(QuoteBoard::default());
        let cancelled = AtomicBool::new(false);

        run_once(
            &symbols(&["AAPL", "MSFT", "NVDA"]),
            &board,
            &source,
            Duration::ZERO,
            &cancelled,
        )
        .await;

        assert_eq!(source.call_symbols(), vec!["AAPL", "MSFT", "NVDA"]);

        let board = board.lock().unwrap();
        assert_eq!(board.state_of("AAPL"), QuoteState::Price(160.0));
        assert_eq!(
            board.state_of("MSFT"),
            QuoteState::Failed("Invalid API call.".to_string())
        );
        assert_eq!(board.state_of("NVDA"), QuoteState::Price(900.5));
        assert_eq!(board.price_of("MSFT"), None);
        assert_eq!(board.resolved_count(), 3);
    }

    #[tokio::test]
    async fn rerunning_a_resolved_work_set_issues_no_calls() {
        let source = ScriptedSource::new(&[
            ("AAPL", QuoteOutcome::Price(160.0)),
            ("MSFT", QuoteOutcome::Price(410.0)),
        ]);
        let board = Mutex::new(QuoteBoard::default());
        let cancelled = AtomicBool::new(false);
        let work_set = symbols(&["AAPL", "MSFT"]);

        run_once(&work_set, &board, &source, Duration::ZERO, &cancelled).await;
        run_once(&work_set, &board, &source, Duration::ZERO, &cancelled).await;

        assert_eq!(source.call_symbols().len(), 2);
    }

    #[tokio::test]
    async fn resolved_errors_are_not_refetched_either() {
        let source = ScriptedSource::new(&[
            ("AAPL", QuoteOutcome::Failed("rate limited".to_string())),
            ("MSFT", QuoteOutcome::Price(410.0)),
        ]);
        let board = Mutex::new(QuoteBoard::default());
        let cancelled = AtomicBool::new(false);
        let work_set = symbols(&["AAPL", "MSFT"]);

        run_once(&work_set, &board, &source, Duration::ZERO, &cancelled).await;
        run_once(&work_set, &board, &source, Duration::ZERO, &cancelled).await;

        assert_eq!(source.call_symbols(), vec!["AAPL", "MSFT"]);
    }

    #[tokio::test]
    async fn pacing_separates_consecutive_requests() {
        let pacing = Duration::from_millis(120);
        let source = ScriptedSource::new(&[
            ("AAPL", QuoteOutcome::Price(1.0)),
            ("MSFT", QuoteOutcome::Price(2.0)),
            ("NVDA", QuoteOutcome::Price(3.0)),
        ]);
        let board = Mutex::new(QuoteBoard::default());
        let cancelled = AtomicBool::new(false);

        run_once(
            &symbols(&["AAPL", "MSFT", "NVDA"]),
            &board,
            &source,
            pacing,
            &cancelled,
        )
        .await;

        let instants = source.call_instants();
        assert_eq!(instants.len(), 3);
        for pair in instants.windows(2) {
            // sleep() waits at least the requested duration, so gaps can
            // only be longer than the pacing delay, never shorter.
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(110));
        }
    }

    #[tokio::test]
    async fn cancellation_discards_the_in_flight_result_and_stops() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let source = ScriptedSource::new(&[
            ("AAPL", QuoteOutcome::Price(160.0)),
            ("MSFT", QuoteOutcome::Price(410.0)),
            ("NVDA", QuoteOutcome::Price(900.0)),
        ])
        .cancelling(2, Arc::clone(&cancelled));
        let board = Mutex::new(QuoteBoard::default());

        run_once(
            &symbols(&["AAPL", "MSFT", "NVDA"]),
            &board,
            &source,
            Duration::ZERO,
            &cancelled,
        )
        .await;

        // The flag tripped while MSFT was in flight: its late result is
        // discarded and NVDA is never requested.
        assert_eq!(source.call_symbols(), vec!["AAPL", "MSFT"]);

        let board = board.lock().unwrap();
        assert_eq!(board.state_of("AAPL"), QuoteState::Price(160.0));
        assert_eq!(board.state_of("MSFT"), QuoteState::Pending);
        assert_eq!(board.state_of("NVDA"), QuoteState::Pending);
    }

    #[tokio::test]
    async fn superseding_refresh_cancels_the_previous_run() {
        let source = Arc::new(
            ScriptedSource::new(&[
                ("AAPL", QuoteOutcome::Price(160.0)),
                ("MSFT", QuoteOutcome::Price(410.0)),
                ("NVDA", QuoteOutcome::Price(900.0)),
            ])
            .with_delay(Duration::from_millis(150)),
        );
        let mut scheduler =
            RefreshScheduler::new(Some(source.clone() as Arc<dyn QuoteLookup>), Duration::ZERO);

        scheduler.refresh(symbols(&["AAPL", "MSFT", "NVDA"]));
        sleep(Duration::from_millis(40)).await;

        // Supersede while the first run is still inside its AAPL request.
        scheduler.refresh(Vec::new());
        sleep(Duration::from_millis(400)).await;

        // The abandoned run discarded AAPL and never reached MSFT or NVDA.
        assert_eq!(source.call_symbols(), vec!["AAPL"]);
        assert_eq!(scheduler.snapshot().resolved_count(), 0);
    }

    #[tokio::test]
    async fn scheduler_without_a_source_is_a_no_op() {
        let mut scheduler = RefreshScheduler::new(None, Duration::ZERO);

        scheduler.refresh(symbols(&["AAPL", "MSFT"]));
        sleep(Duration::from_millis(30)).await;

        assert_eq!(scheduler.snapshot().resolved_count(), 0);
    }

    #[tokio::test]
    async fn retry_errors_refetches_only_failed_symbols() {
        let source = Arc::new(ScriptedSource::new(&[
            ("AAPL", QuoteOutcome::Price(160.0)),
            ("MSFT", QuoteOutcome::Failed("rate limited".to_string())),
        ]));
        let mut scheduler =
            RefreshScheduler::new(Some(source.clone() as Arc<dyn QuoteLookup>), Duration::ZERO);
        let work_set = symbols(&["AAPL", "MSFT"]);

        scheduler.refresh(work_set.clone());
        sleep(Duration::from_millis(100)).await;
        assert_eq!(scheduler.snapshot().resolved_count(), 2);

        scheduler.retry_errors(work_set);
        sleep(Duration::from_millis(100)).await;

        // AAPL kept its price without a second request; MSFT was retried.
        assert_eq!(source.call_symbols(), vec!["AAPL", "MSFT", "MSFT"]);
        assert_eq!(scheduler.snapshot().state_of("AAPL"), QuoteState::Price(160.0));
    }

    #[test]
    fn board_buckets_stay_disjoint() {
        let mut board = QuoteBoard::default();
        board.record("AAPL", QuoteOutcome::Price(160.0));
        board.record("AAPL", QuoteOutcome::Failed("late duplicate".to_string()));

        assert_eq!(board.state_of("AAPL"), QuoteState::Price(160.0));
        assert_eq!(board.resolved_count(), 1);
    }
}

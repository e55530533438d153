use std::time::Duration;

/// Environment variable holding the Alpha Vantage credential. When it is
/// absent the dashboard still runs: quote refresh degrades to a no-op and
/// symbol validation stays in mock mode.
pub const API_KEY_ENV: &str = "ALPHAVANTAGE_API_KEY";

/// Opt-in switch for live symbol validation (`mock` or `live`).
pub const VALIDATION_ENV: &str = "PORTFOLIO_VALIDATION";

/// Optional override for the pacing delay, in milliseconds.
pub const PACING_ENV: &str = "PORTFOLIO_PACING_MS";

/// Alpha Vantage's free tier throttles at roughly one request per second;
/// 1100 ms keeps a run safely under that.
const DEFAULT_PACING_MS: u64 = 1100;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Builtin symbol table used by mock validation, keyed by the uppercase
/// symbol the user is expected to enter.
pub const MOCK_SYMBOLS: &[(&str, &str)] = &[
    ("NVDA", "NVIDIA Corp"),
    ("ADBE", "Adobe Inc"),
    ("MSFT", "Microsoft Corporation"),
    ("AAPL", "Apple Inc"),
];

/// How symbols are checked before a holding is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Exact match against `MOCK_SYMBOLS`; no network, no rate limit.
    Mock,
    /// Query the provider's SYMBOL_SEARCH endpoint.
    Live,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub validation: ValidationMode,
    /// Minimum wait between consecutive quote requests within one run.
    pub pacing: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = lookup(API_KEY_ENV)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let validation = match lookup(VALIDATION_ENV).as_deref().map(str::trim) {
            Some("live") if api_key.is_some() => ValidationMode::Live,
            Some("live") => {
                log::warn!(
                    "{} requested live validation but {} is not set; staying in mock mode",
                    VALIDATION_ENV,
                    API_KEY_ENV
                );
                ValidationMode::Mock
            }
            Some("mock") | None => ValidationMode::Mock,
            Some(other) => {
                log::warn!("Unknown {} value `{}`; using mock mode", VALIDATION_ENV, other);
                ValidationMode::Mock
            }
        };

        let pacing_ms = match lookup(PACING_ENV).as_deref().map(str::trim) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(ms) => ms,
                Err(_) => {
                    log::warn!("Invalid {} value `{}`; using default", PACING_ENV, raw);
                    DEFAULT_PACING_MS
                }
            },
            None => DEFAULT_PACING_MS,
        };

        Self {
            api_key,
            validation,
            pacing: Duration::from_millis(pacing_ms),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn quotes_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

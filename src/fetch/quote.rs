use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{Context, Result};
use crate::fetch::QuoteLookup;

const QUERY_URL: &str = "https://www.alphavantage.co/query";

pub(crate) const NETWORK_ERROR_REASON: &str = "Network/API error fetching latest price.";
pub(crate) const MALFORMED_REASON: &str = "Malformed quote response.";
pub(crate) const MISSING_PRICE_REASON: &str = "Global Quote missing price field.";

/// Terminal outcome of one quote request. A symbol resolves to exactly one
/// of these; they map onto the disjoint price/error buckets on the board.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteOutcome {
    Price(f64),
    Failed(String),
}

/// Alpha Vantage GLOBAL_QUOTE client.
pub struct QuoteClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl QuoteClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to construct quote HTTP client")?;
        Ok(Self {
            client,
            api_key,
            base_url: QUERY_URL.to_string(),
        })
    }
}

#[async_trait]
impl QuoteLookup for QuoteClient {
    async fn lookup(&self, symbol: &str) -> QuoteOutcome {
        let request = self.client.get(&self.base_url).query(&[
            ("function", "GLOBAL_QUOTE"),
            ("symbol", symbol),
            ("apikey", self.api_key.as_str()),
        ]);

        let body = match request.send().await {
            Ok(response) => match response.text().await {
                Ok(body) => body,
                Err(err) => {
                    log::warn!("Failed to read quote body for {}: {}", symbol, err);
                    return QuoteOutcome::Failed(NETWORK_ERROR_REASON.to_string());
                }
            },
            Err(err) => {
                log::warn!("Quote request failed for {}: {}", symbol, err);
                return QuoteOutcome::Failed(NETWORK_ERROR_REASON.to_string());
            }
        };

        let outcome = parse_global_quote(&body);
        if let QuoteOutcome::Failed(reason) = &outcome {
            log::debug!("Quote for {} resolved to error: {}", symbol, reason);
        }
        outcome
    }
}

// ── GLOBAL_QUOTE payload ────────────────────────────────────────────

#[derive(Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
}

/// Classify one GLOBAL_QUOTE body into a terminal outcome. The provider
/// reports throttling and bad symbols through `Note` / `Information` /
/// `Error Message` fields rather than HTTP status codes, so those are
/// surfaced verbatim as the error reason.
pub fn parse_global_quote(body: &str) -> QuoteOutcome {
    let response: GlobalQuoteResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) => return QuoteOutcome::Failed(MALFORMED_REASON.to_string()),
    };

    if let Some(note) = response.note {
        return QuoteOutcome::Failed(note);
    }
    if let Some(information) = response.information {
        return QuoteOutcome::Failed(information);
    }
    if let Some(message) = response.error_message {
        return QuoteOutcome::Failed(message);
    }

    let price = response
        .global_quote
        .and_then(|quote| quote.price)
        .and_then(|raw| raw.trim().parse::<f64>().ok());

    match price {
        Some(value) if value.is_finite() => QuoteOutcome::Price(value),
        _ => QuoteOutcome::Failed(MISSING_PRICE_REASON.to_string()),
    }
}

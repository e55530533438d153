use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::config::MOCK_SYMBOLS;
use crate::error::{Context, Result};

const QUERY_URL: &str = "https://www.alphavantage.co/query";

pub(crate) const NETWORK_ERROR_REASON: &str = "Network/API error while validating symbol.";
pub(crate) const NO_MATCHES_REASON: &str = "No matches returned.";

/// Outcome of validating a symbol before a holding is created.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// The symbol exists; `name` is the listed company name when known.
    Valid { name: Option<String> },
    Rejected { reason: String },
}

/// Validates symbols either against the builtin table or the provider's
/// SYMBOL_SEARCH endpoint.
pub enum SymbolValidator {
    Mock,
    Live(SearchClient),
}

impl SymbolValidator {
    pub async fn validate(&self, symbol: &str) -> Validation {
        match self {
            SymbolValidator::Mock => mock_validate(symbol),
            SymbolValidator::Live(client) => client.validate(symbol).await,
        }
    }
}

/// Offline validation against the builtin table: exact uppercase match, no
/// network round trip, no rate limit.
pub fn mock_validate(symbol: &str) -> Validation {
    match MOCK_SYMBOLS.iter().find(|(known, _)| *known == symbol) {
        Some((_, name)) => Validation::Valid {
            name: Some((*name).to_string()),
        },
        None => Validation::Rejected {
            reason: format!("Symbol not found in mock table: {}", symbol),
        },
    }
}

/// Alpha Vantage SYMBOL_SEARCH client.
pub struct SearchClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl SearchClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to construct symbol search HTTP client")?;
        Ok(Self {
            client,
            api_key,
            base_url: QUERY_URL.to_string(),
        })
    }

    pub async fn validate(&self, symbol: &str) -> Validation {
        let request = self.client.get(&self.base_url).query(&[
            ("function", "SYMBOL_SEARCH"),
            ("keywords", symbol),
            ("apikey", self.api_key.as_str()),
        ]);

        let body = match request.send().await {
            Ok(response) => match response.text().await {
                Ok(body) => body,
                Err(err) => {
                    log::warn!("Failed to read search body for {}: {}", symbol, err);
                    return Validation::Rejected {
                        reason: NETWORK_ERROR_REASON.to_string(),
                    };
                }
            },
            Err(err) => {
                log::warn!("Symbol search failed for {}: {}", symbol, err);
                return Validation::Rejected {
                    reason: NETWORK_ERROR_REASON.to_string(),
                };
            }
        };

        parse_symbol_search(&body, symbol)
    }
}

// ── SYMBOL_SEARCH payload ───────────────────────────────────────────

#[derive(Deserialize)]
struct SymbolSearchResponse {
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "bestMatches")]
    best_matches: Option<Vec<SymbolMatch>>,
}

#[derive(Deserialize)]
struct SymbolMatch {
    #[serde(rename = "1. symbol")]
    symbol: Option<String>,
    #[serde(rename = "2. name")]
    name: Option<String>,
}

/// A symbol is valid only when `bestMatches` contains an exact entry for
/// it; fuzzy matches (the endpoint is a search, not a lookup) are rejected.
pub fn parse_symbol_search(body: &str, symbol: &str) -> Validation {
    let response: SymbolSearchResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) => {
            return Validation::Rejected {
                reason: NO_MATCHES_REASON.to_string(),
            }
        }
    };

    if let Some(note) = response.note {
        return Validation::Rejected { reason: note };
    }
    if let Some(information) = response.information {
        return Validation::Rejected {
            reason: information,
        };
    }
    if let Some(message) = response.error_message {
        return Validation::Rejected { reason: message };
    }

    let Some(matches) = response.best_matches else {
        return Validation::Rejected {
            reason: NO_MATCHES_REASON.to_string(),
        };
    };

    match matches
        .iter()
        .find(|candidate| candidate.symbol.as_deref() == Some(symbol))
    {
        Some(exact) => Validation::Valid {
            name: exact.name.clone(),
        },
        None => Validation::Rejected {
            reason: format!("Invalid symbol: {}", symbol),
        },
    }
}

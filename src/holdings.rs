use std::collections::HashSet;

/// A single position entered through the dashboard form. Immutable once
/// created; duplicates by symbol are allowed as separate holdings.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
    pub purchase_price: f64,
    pub validated: bool,
}

/// A submission that passed the synchronous form checks but has not been
/// validated against the symbol table/API yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingHolding {
    pub symbol: String,
    pub quantity: f64,
    pub purchase_price: f64,
}

impl PendingHolding {
    pub fn into_holding(self) -> Holding {
        Holding {
            symbol: self.symbol,
            quantity: self.quantity,
            purchase_price: self.purchase_price,
            validated: true,
        }
    }
}

/// Synchronous checks applied on submit, before any validation round trip.
/// Failures block submission and never create a holding.
pub fn parse_submission(
    symbol: &str,
    quantity: &str,
    price: &str,
) -> std::result::Result<PendingHolding, String> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err("Please enter a stock symbol.".to_string());
    }

    let quantity = match quantity.trim().parse::<f64>() {
        Ok(value) if value > 0.0 && value.is_finite() => value,
        _ => return Err("Please enter a valid quantity.".to_string()),
    };

    let price = match price.trim().parse::<f64>() {
        Ok(value) if value > 0.0 && value.is_finite() => value,
        _ => return Err("Please enter a valid purchase price.".to_string()),
    };

    Ok(PendingHolding {
        symbol,
        quantity,
        purchase_price: price,
    })
}

/// Prepend-only store backing the dashboard list. Holdings are never
/// removed or edited in place.
#[derive(Debug, Default)]
pub struct HoldingsBook {
    entries: Vec<Holding>,
    revision: u64,
}

impl HoldingsBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest first, matching the reverse-chronological dashboard list.
    pub fn add(&mut self, holding: Holding) {
        self.entries.insert(0, holding);
        self.revision += 1;
    }

    pub fn entries(&self) -> &[Holding] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bumped on every mutation; callers compare revisions instead of the
    /// sequence itself to decide when the work-set must be re-derived.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn work_set(&self) -> Vec<String> {
        work_set(&self.entries)
    }
}

/// Distinct validated symbols in first-occurrence order. Malformed entries
/// (blank symbols, unvalidated rows) are filtered out, not reported.
pub fn work_set(holdings: &[Holding]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut symbols = Vec::new();

    for holding in holdings {
        if !holding.validated {
            continue;
        }
        let symbol = holding.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            continue;
        }
        if seen.insert(symbol.clone()) {
            symbols.push(symbol);
        }
    }

    symbols
}

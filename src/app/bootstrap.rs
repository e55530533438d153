use crate::app::state::DashboardState;
use crate::config::{Config, API_KEY_ENV};
use crate::error::Result;
use crate::ui::run_dashboard;

/// Entry point used by `main`: read configuration, wire the quote stack,
/// and hand control to the dashboard screen.
pub async fn run() -> Result<()> {
    let config = Config::from_env();

    if !config.quotes_enabled() {
        log::warn!(
            "{} is not set; holdings can be added but quote refresh is disabled",
            API_KEY_ENV
        );
    }

    let mut state = DashboardState::new(config)?;
    run_dashboard(&mut state).await
}

use portfolio_tui::app;
use portfolio_tui::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging goes to stderr; the dashboard owns the terminal once raw mode
    // is entered, so keep RUST_LOG quiet unless debugging.
    env_logger::init();

    app::bootstrap::run().await
}

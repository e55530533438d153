use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::{prelude::*, widgets::*};
use tokio::task::JoinHandle;

use crate::app::state::DashboardState;
use crate::config::ValidationMode;
use crate::error::Result;
use crate::fetch::Validation;
use crate::holdings::{parse_submission, Holding, PendingHolding};
use crate::refresh::{QuoteBoard, QuoteState};
use crate::ui::components::layout::split_vertical;
use crate::ui::TerminalGuard;
use crate::utils::{format_money, format_quantity, truncate_to_width};

const EVENT_POLL: Duration = Duration::from_millis(100);
const IDLE_TICK: Duration = Duration::from_millis(50);

const ERROR_CELL_WIDTH: usize = 26;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum FormField {
    #[default]
    Symbol,
    Quantity,
    Price,
}

impl FormField {
    const ALL: [FormField; 3] = [FormField::Symbol, FormField::Quantity, FormField::Price];

    fn label(self) -> &'static str {
        match self {
            FormField::Symbol => "Stock Symbol",
            FormField::Quantity => "Quantity",
            FormField::Price => "Purchase Price",
        }
    }

    fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|field| *field == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|field| *field == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Character filtering while typing; full checks happen on submit.
    fn accepts(self, ch: char) -> bool {
        match self {
            FormField::Symbol => ch.is_ascii_alphanumeric() || ch == '.' || ch == '-',
            FormField::Quantity | FormField::Price => ch.is_ascii_digit() || ch == '.',
        }
    }
}

#[derive(Default)]
struct FormState {
    symbol: String,
    quantity: String,
    price: String,
    focus: FormField,
}

impl FormState {
    fn buffer_mut(&mut self) -> &mut String {
        match self.focus {
            FormField::Symbol => &mut self.symbol,
            FormField::Quantity => &mut self.quantity,
            FormField::Price => &mut self.price,
        }
    }

    fn buffer(&self, field: FormField) -> &str {
        match field {
            FormField::Symbol => &self.symbol,
            FormField::Quantity => &self.quantity,
            FormField::Price => &self.price,
        }
    }

    fn clear_fields(&mut self) {
        self.symbol.clear();
        self.quantity.clear();
        self.price.clear();
        self.focus = FormField::Symbol;
    }
}

enum FormStatus {
    Idle,
    Validating,
    Added(String),
    Error(String),
}

struct PendingValidation {
    pending: PendingHolding,
    task: JoinHandle<Validation>,
}

/// The single dashboard page: add-holding form on top, holdings table
/// below, status line in between. Runs until Esc/Ctrl+C.
pub async fn run_dashboard(state: &mut DashboardState) -> Result<()> {
    let mut guard = TerminalGuard::new()?;
    let mut form = FormState::default();
    let mut status = FormStatus::Idle;
    let mut validation: Option<PendingValidation> = None;

    loop {
        state.sync_refresh();
        let board = state.board_snapshot();
        let busy = validation.is_some();

        guard
            .terminal_mut()
            .draw(|frame| draw_dashboard(frame, state, &form, &status, &board, busy))?;

        // The validation round trip runs on its own task; keep drawing and
        // poll the handle until it lands.
        if let Some(inflight) = validation.take() {
            if inflight.task.is_finished() {
                match inflight.task.await? {
                    Validation::Valid { name } => {
                        let symbol = inflight.pending.symbol.clone();
                        state.add_validated(inflight.pending);
                        form.clear_fields();
                        status = FormStatus::Added(match name {
                            Some(name) => format!("Added: {} ({})", symbol, name),
                            None => format!("Added: {}", symbol),
                        });
                    }
                    Validation::Rejected { reason } => {
                        status = FormStatus::Error(reason);
                    }
                }
            } else {
                validation = Some(inflight);
            }
        }

        if event::poll(EVENT_POLL)? {
            if let Event::Key(key) = event::read()? {
                if is_quit(key) {
                    break;
                }
                let busy = validation.is_some();
                match key.code {
                    KeyCode::Tab | KeyCode::Down => form.focus = form.focus.next(),
                    KeyCode::BackTab | KeyCode::Up => form.focus = form.focus.prev(),
                    KeyCode::Backspace if !busy => {
                        form.buffer_mut().pop();
                    }
                    KeyCode::Enter if !busy => {
                        match parse_submission(&form.symbol, &form.quantity, &form.price) {
                            Ok(pending) => {
                                status = FormStatus::Validating;
                                let task = state.spawn_validation(pending.symbol.clone());
                                validation = Some(PendingValidation { pending, task });
                            }
                            Err(message) => status = FormStatus::Error(message),
                        }
                    }
                    KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        state.retry_errors();
                        status = FormStatus::Idle;
                    }
                    KeyCode::Char(ch)
                        if !busy
                            && !key.modifiers.contains(KeyModifiers::CONTROL)
                            && form.focus.accepts(ch) =>
                    {
                        form.buffer_mut().push(ch);
                    }
                    _ => {}
                }
            }
        }

        tokio::time::sleep(IDLE_TICK).await;
    }

    state.shutdown();
    guard.restore()?;
    Ok(())
}

fn is_quit(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Esc)
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

fn draw_dashboard(
    frame: &mut Frame,
    state: &DashboardState,
    form: &FormState,
    status: &FormStatus,
    board: &QuoteBoard,
    busy: bool,
) {
    let chunks = split_vertical(
        frame.size(),
        &[
            Constraint::Length(2),
            Constraint::Length(5),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ],
    );

    draw_header(frame, chunks[0], state);
    draw_form(frame, chunks[1], form, busy);
    draw_status(frame, chunks[2], status);
    draw_holdings(frame, chunks[3], state.holdings().entries(), board);

    let help = Paragraph::new(
        "Tab/↑/↓ switch field • Enter add stock • Ctrl+R retry errors • Esc quit",
    )
    .style(Style::default().fg(Color::Gray));
    frame.render_widget(help, chunks[4]);
}

fn draw_header(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let quotes_note = if state.quotes_enabled() {
        "quotes: live".to_string()
    } else {
        "quotes: disabled (set ALPHAVANTAGE_API_KEY)".to_string()
    };
    let validation_note = match state.validation_mode() {
        ValidationMode::Mock => "validation: mock",
        ValidationMode::Live => "validation: live",
    };
    let updated_note = match state.updated_at() {
        Some(at) => format!(" • updated {}", at),
        None => String::new(),
    };

    let header = Paragraph::new(format!(
        "Finance Dashboard\n{} • {}{}",
        quotes_note, validation_note, updated_note
    ))
    .style(Style::default().fg(Color::Cyan));
    frame.render_widget(header, area);
}

fn draw_form(frame: &mut Frame, area: Rect, form: &FormState, busy: bool) {
    let title = if busy { "Add Stock — Checking..." } else { "Add Stock" };
    let block = Block::default().borders(Borders::ALL).title(title);
    frame.render_widget(block.clone(), area);
    let inner = block.inner(area);

    let rows = split_vertical(
        inner,
        &[
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ],
    );

    for (row, field) in rows.iter().zip(FormField::ALL) {
        let focused = form.focus == field && !busy;
        let mut style = if busy {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };
        if focused {
            style = style.add_modifier(Modifier::REVERSED);
        }
        let line = format!("{:<16}{}", field.label(), form.buffer(field));
        frame.render_widget(Paragraph::new(line).style(style), *row);
    }
}

fn draw_status(frame: &mut Frame, area: Rect, status: &FormStatus) {
    let (text, color) = match status {
        FormStatus::Idle => (String::new(), Color::Gray),
        FormStatus::Validating => ("Validating symbol...".to_string(), Color::Yellow),
        FormStatus::Added(message) => (message.clone(), Color::Green),
        FormStatus::Error(message) => (message.clone(), Color::Red),
    };
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(color)),
        area,
    );
}

fn draw_holdings(frame: &mut Frame, area: Rect, holdings: &[Holding], board: &QuoteBoard) {
    let block = Block::default().borders(Borders::ALL).title("Stock List");
    if holdings.is_empty() {
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(
            Paragraph::new("No stocks added yet.").style(Style::default().fg(Color::Gray)),
            inner,
        );
        return;
    }

    let header = Row::new(vec!["Symbol", "Qty", "Buy ($)", "Last ($)", "P/L ($)"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = build_rows(holdings, board)
        .into_iter()
        .map(|view| {
            let (last, last_style) = match view.last {
                LastCell::Loading => (
                    "Loading...".to_string(),
                    Style::default().fg(Color::DarkGray),
                ),
                LastCell::Error(reason) => (
                    truncate_to_width(&reason, ERROR_CELL_WIDTH),
                    Style::default().fg(Color::Gray),
                ),
                LastCell::Price(price) => (price, Style::default()),
            };

            let (pnl, pnl_style) = match view.pnl {
                Some(value) if value < 0.0 => {
                    (format_money(value), Style::default().fg(Color::Red))
                }
                Some(value) => (format_money(value), Style::default().fg(Color::Green)),
                None => ("—".to_string(), Style::default().fg(Color::DarkGray)),
            };

            Row::new(vec![
                Cell::from(view.symbol),
                Cell::from(view.quantity),
                Cell::from(view.buy),
                Cell::from(last).style(last_style),
                Cell::from(pnl).style(pnl_style),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Min(ERROR_CELL_WIDTH as u16 + 2),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(block);

    frame.render_widget(table, area);
}

// ── Result merge (pure, renders one holding against the board) ──────

#[derive(Debug, PartialEq)]
enum LastCell {
    Loading,
    Price(String),
    Error(String),
}

#[derive(Debug, PartialEq)]
struct RowView {
    symbol: String,
    quantity: String,
    buy: String,
    last: LastCell,
    pnl: Option<f64>,
}

fn build_row(holding: &Holding, board: &QuoteBoard) -> RowView {
    let symbol = holding.symbol.trim().to_uppercase();
    let (last, pnl) = match board.state_of(&symbol) {
        QuoteState::Price(price) => (
            LastCell::Price(format_money(price)),
            Some((price - holding.purchase_price) * holding.quantity),
        ),
        QuoteState::Failed(reason) => (LastCell::Error(reason), None),
        QuoteState::Pending => (LastCell::Loading, None),
    };

    RowView {
        symbol,
        quantity: format_quantity(holding.quantity),
        buy: format_money(holding.purchase_price),
        last,
        pnl,
    }
}

fn build_rows(holdings: &[Holding], board: &QuoteBoard) -> Vec<RowView> {
    holdings
        .iter()
        .map(|holding| build_row(holding, board))
        .collect()
}

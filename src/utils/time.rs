use chrono::Local;

/// Wall-clock time for the "updated" note on the status line.
pub fn current_clock_time() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

pub mod text;
pub mod time;

pub use text::{format_money, format_quantity, truncate_to_width};
pub use time::current_clock_time;

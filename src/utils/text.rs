use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Two-decimal money formatting shared by the price and P/L columns.
pub fn format_money(value: f64) -> String {
    format!("{:.2}", value)
}

/// Quantities render without a decimal tail unless the user entered one.
pub fn format_quantity(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Clip `text` to `max_width` display columns, appending an ellipsis when
/// anything was cut. Width-aware so wide glyphs never overflow the column.
pub fn truncate_to_width(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }

    let mut clipped = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + ch_width > max_width.saturating_sub(1) {
            break;
        }
        clipped.push(ch);
        used += ch_width;
    }
    clipped.push('…');
    clipped
}

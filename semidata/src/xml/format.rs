/// Shortest text that parses back to exactly `value`.
///
/// Plain decimal notation is used for magnitudes in `[1e-4, 1e16)`, Rust's
/// shortest exponent form (`1e-6`, `2.5e-9`) otherwise.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs();
    if (1e-4..1e16).contains(&magnitude) {
        format!("{value}")
    } else {
        format!("{value:e}")
    }
}

/// `value` rounded to 12 significant digits, for derived quantities such
/// as sums where accumulated binary error is noise (`0.1 + 0.2` -> `0.3`).
pub fn format_summary(value: f64) -> String {
    if !value.is_finite() {
        return format_number(value);
    }
    let rounded = format!("{value:.11e}").parse::<f64>().unwrap_or(value);
    format_number(rounded)
}

/// Space-separated numeric text used for axes and table rows.
pub fn format_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format_number(*v))
        .collect::<Vec<_>>()
        .join(" ")
}

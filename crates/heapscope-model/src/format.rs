//! Number formatting for tile and summary text.

/// Formats an integer with `,` thousands separators: `1234567` → `1,234,567`.
pub fn format_size(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    group_into(&mut out, &digits);
    out
}

/// Formats a percentage with exactly one decimal and grouped integer part.
///
/// Non-finite values render as `∞`, `-∞` or `NaN`.
pub fn format_percentage(value: f64) -> String {
    if value.is_nan() {
        return "NaN".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "∞".into() } else { "-∞".into() };
    }
    let fixed = format!("{:.1}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, "0"));
    let mut out = String::with_capacity(fixed.len() + int_part.len() / 3 + 1);
    if value < 0.0 && fixed != "0.0" {
        out.push('-');
    }
    group_into(&mut out, int_part);
    out.push('.');
    out.push_str(frac_part);
    out
}

/// `val * 100 / max`, in floating point.
pub fn percentage(val: i64, max: i64) -> f64 {
    val as f64 * 100.0 / max as f64
}

pub fn pad_left(s: &str, width: usize) -> String {
    format!("{s:>width$}")
}

pub fn pad_right(s: &str, width: usize) -> String {
    format!("{s:<width$}")
}

fn group_into(out: &mut String, digits: &str) {
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
}

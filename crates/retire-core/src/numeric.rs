//! Number parsing and thousands-separator formatting for user-entered values.

pub fn sanitize_number(value: &str) -> String {
    value.replace(',', "").trim().to_string()
}

/// Groups the integer part of `value` in threes. Separators already present
/// are stripped first, so the function is idempotent.
pub fn format_with_commas(value: &str) -> String {
    let sanitized = sanitize_number(value);
    if sanitized.is_empty() {
        return String::new();
    }
    let (integer, decimal) = match sanitized.split_once('.') {
        Some((integer, decimal)) => (integer, Some(decimal)),
        None => (sanitized.as_str(), None),
    };
    let (sign, digits) = match integer.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", integer),
    };
    let mut grouped = group_thousands(digits);
    if grouped.is_empty() {
        grouped.push('0');
    }
    match decimal {
        Some(decimal) => format!("{sign}{grouped}.{decimal}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Groups each run of digits separately; other characters break a run.
fn group_thousands(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut digits_ahead = vec![0usize; chars.len() + 1];
    for idx in (0..chars.len()).rev() {
        if chars[idx].is_ascii_digit() {
            digits_ahead[idx] = digits_ahead[idx + 1] + 1;
        }
    }
    let mut out = String::with_capacity(chars.len() + chars.len() / 3);
    for (idx, ch) in chars.iter().enumerate() {
        let inside_run = idx > 0 && chars[idx - 1].is_ascii_digit() && ch.is_ascii_digit();
        if inside_run && digits_ahead[idx] % 3 == 0 {
            out.push(',');
        }
        out.push(*ch);
    }
    out
}

/// Parses a user-entered number, ignoring thousands separators. Empty,
/// malformed and non-finite input yields `None`.
pub fn parse_number(value: &str) -> Option<f64> {
    let sanitized = sanitize_number(value);
    if sanitized.is_empty() {
        return None;
    }
    sanitized
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}

/// Whole-number parse: fractional input is truncated toward zero.
pub fn parse_whole(value: &str) -> Option<i64> {
    parse_number(value).map(|number| number.trunc() as i64)
}

/// Renders a stored amount for an editable field, e.g. `1234.5` -> `1,234.5`.
pub fn format_number_for_input(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    format_with_commas(&format!("{value}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reformatted {
    pub text: String,
    pub caret: usize,
    pub raw: String,
}

/// Re-applies grouping to `previous` and shifts the caret (in chars) by the
/// length delta the formatting introduced.
pub fn reformat_with_caret(previous: &str, caret: usize) -> Reformatted {
    let raw = sanitize_number(previous);
    let text = format_with_commas(&raw);
    let before = previous.chars().count() as i64;
    let after = text.chars().count() as i64;
    let shifted = (caret as i64 + (after - before)).clamp(0, after);
    Reformatted {
        text,
        caret: shifted as usize,
        raw,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn groups_integer_part_only() {
        assert_eq!(format_with_commas("1234567.891"), "1,234,567.891");
        assert_eq!(format_with_commas("-1234"), "-1,234");
        assert_eq!(format_with_commas("999"), "999");
        assert_eq!(format_with_commas("1,2,3,4"), "1,234");
        assert_eq!(format_with_commas(".5"), "0.5");
        assert_eq!(format_with_commas("  "), "");
    }

    #[test]
    fn separators_stay_inside_digit_runs() {
        assert_eq!(format_with_commas("1-000"), "1-000");
        assert_eq!(format_with_commas("12-3456"), "12-3,456");
        assert_eq!(format_with_commas("-1000000"), "-1,000,000");
    }

    #[test]
    fn parse_strips_separators_and_rejects_garbage() {
        assert_eq!(parse_number("100,000"), Some(100_000.0));
        assert_eq!(parse_number(" 4.5 "), Some(4.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_whole("65.9"), Some(65));
    }

    #[test]
    fn caret_follows_inserted_separator() {
        // "1234|" typed into "123|" -> "1,234|"
        let out = reformat_with_caret("1234", 4);
        assert_eq!(out.text, "1,234");
        assert_eq!(out.caret, 5);
        assert_eq!(out.raw, "1234");

        // caret in the middle keeps its relative position
        let out = reformat_with_caret("12345", 2);
        assert_eq!(out.text, "12,345");
        assert_eq!(out.caret, 3);
    }

    #[test]
    fn caret_is_clamped_when_separators_disappear() {
        let out = reformat_with_caret("1,00", 4);
        assert_eq!(out.text, "100");
        assert_eq!(out.caret, 3);

        let out = reformat_with_caret(",", 0);
        assert_eq!(out.text, "");
        assert_eq!(out.caret, 0);
    }

    #[test]
    fn input_rendering_of_stored_amounts() {
        assert_eq!(format_number_for_input(100_000.0), "100,000");
        assert_eq!(format_number_for_input(1234.5), "1,234.5");
        assert_eq!(format_number_for_input(f64::NAN), "");
    }
}

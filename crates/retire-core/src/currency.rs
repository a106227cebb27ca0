use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use super::numeric::format_with_commas;
use super::numeric::parse_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CurrencyCode {
    #[serde(rename = "CAD")]
    Cad,
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "GBP")]
    Gbp,
}

/// Currency every plan is calculated and stored in.
pub const BASE_CURRENCY: CurrencyCode = CurrencyCode::Cad;

impl CurrencyCode {
    pub const ALL: [CurrencyCode; 3] = [Self::Cad, Self::Usd, Self::Gbp];

    pub fn label(self) -> &'static str {
        match self {
            Self::Cad => "CAD",
            Self::Usd => "USD",
            Self::Gbp => "GBP",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        Self::ALL
            .into_iter()
            .find(|code| code.label().eq_ignore_ascii_case(input))
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Cad => "$",
            Self::Usd => "US$",
            Self::Gbp => "£",
        }
    }

    pub fn short_symbol(self) -> &'static str {
        match self {
            Self::Cad => "CA$",
            Self::Usd => "US$",
            Self::Gbp => "GBP",
        }
    }

    /// Units of this currency per unit of base currency.
    pub fn default_rate(self) -> f64 {
        match self {
            Self::Cad => 1.0,
            Self::Usd => 0.74,
            Self::Gbp => 0.58,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Cad => Self::Usd,
            Self::Usd => Self::Gbp,
            Self::Gbp => Self::Cad,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyState {
    pub selected: CurrencyCode,
    pub rates: BTreeMap<CurrencyCode, f64>,
}

impl Default for CurrencyState {
    fn default() -> Self {
        Self {
            selected: BASE_CURRENCY,
            rates: CurrencyCode::ALL
                .into_iter()
                .map(|code| (code, code.default_rate()))
                .collect(),
        }
    }
}

impl CurrencyState {
    /// Builds state from stored JSON. Unknown codes and unusable rates are
    /// skipped one by one; anything unrecognisable leaves the defaults.
    pub fn from_value(value: &Value) -> Self {
        let mut state = Self::default();
        let Some(object) = value.as_object() else {
            return state;
        };
        if let Some(code) = object
            .get("selected")
            .and_then(Value::as_str)
            .and_then(CurrencyCode::parse)
        {
            state.selected = code;
        }
        if let Some(rates) = object.get("rates").and_then(Value::as_object) {
            for (key, raw) in rates {
                let Some(code) = CurrencyCode::parse(key) else {
                    continue;
                };
                let rate = match raw {
                    Value::Number(number) => number.as_f64(),
                    Value::String(text) => parse_number(text),
                    _ => None,
                };
                if let Some(rate) = rate.filter(|rate| is_usable_rate(*rate)) {
                    state.rates.insert(code, rate);
                }
            }
        }
        state
    }

    pub fn ensure_rate(&mut self, code: CurrencyCode) {
        let usable = self
            .rates
            .get(&code)
            .is_some_and(|rate| is_usable_rate(*rate));
        if !usable {
            self.rates.insert(code, code.default_rate());
        }
    }

    pub fn set_selected(&mut self, code: CurrencyCode) {
        self.selected = code;
        self.ensure_rate(code);
    }

    /// Applies a user-entered rate and returns the value actually stored.
    pub fn set_rate(&mut self, code: CurrencyCode, raw: &str) -> f64 {
        let previous = self.rates.get(&code).copied();
        let rate = sanitize_rate(parse_number(raw), previous);
        self.rates.insert(code, rate);
        rate
    }

    pub fn rate(&self, code: CurrencyCode) -> f64 {
        self.rates
            .get(&code)
            .copied()
            .filter(|rate| is_usable_rate(*rate))
            .unwrap_or(1.0)
    }

    pub fn active_rate(&self) -> f64 {
        self.rate(self.selected)
    }

    pub fn cycle(&mut self) -> CurrencyCode {
        let next = self.selected.next();
        self.set_selected(next);
        next
    }
}

pub fn is_usable_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A usable `value` rounded to cents, else the rounded fallback, else 1.
pub fn sanitize_rate(value: Option<f64>, fallback: Option<f64>) -> f64 {
    match value.filter(|rate| is_usable_rate(*rate)) {
        Some(rate) => round2(rate),
        None => round2(fallback.filter(|rate| is_usable_rate(*rate)).unwrap_or(1.0)),
    }
}

pub fn format_rate(rate: f64) -> String {
    let rate = if is_usable_rate(rate) { rate } else { 1.0 };
    format!("{rate:.2}")
}

/// Whole units, grouped, with the currency symbol: `-$1,234`, `£950`.
pub fn format_currency(amount: f64, code: CurrencyCode) -> String {
    let value = if amount.is_finite() { amount.round() } else { 0.0 };
    let sign = if value < 0.0 { "-" } else { "" };
    let digits = format_with_commas(&format!("{:.0}", value.abs()));
    format!("{sign}{}{digits}", code.symbol())
}

/// Compact axis label: `CA$1.2M`, `US$850K`, `GBP950`.
pub fn format_currency_short(amount: f64, code: CurrencyCode) -> String {
    let value = if amount.is_finite() { amount } else { 0.0 };
    let sign = if value < 0.0 { "-" } else { "" };
    let absolute = value.abs();
    let symbol = code.short_symbol();
    if absolute >= 1_000_000.0 {
        format!("{sign}{symbol}{:.1}M", absolute / 1_000_000.0)
    } else if absolute >= 1_000.0 {
        format!("{sign}{symbol}{:.0}K", absolute / 1_000.0)
    } else {
        format!("{sign}{symbol}{absolute:.0}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_cover_every_known_code() {
        let state = CurrencyState::default();
        assert_eq!(state.selected, CurrencyCode::Cad);
        assert_eq!(state.rate(CurrencyCode::Cad), 1.0);
        assert_eq!(state.rate(CurrencyCode::Usd), 0.74);
        assert_eq!(state.rate(CurrencyCode::Gbp), 0.58);
        assert_eq!(state.active_rate(), 1.0);
    }

    #[test]
    fn stored_state_is_merged_leniently() {
        let state = CurrencyState::from_value(&json!({
            "selected": "USD",
            "rates": {
                "USD": "0.80",
                "GBP": -2,
                "EUR": 0.9,
                "CAD": "abc"
            }
        }));
        assert_eq!(state.selected, CurrencyCode::Usd);
        assert_eq!(state.rate(CurrencyCode::Usd), 0.8);
        assert_eq!(state.rate(CurrencyCode::Gbp), 0.58);
        assert_eq!(state.rate(CurrencyCode::Cad), 1.0);
        assert_eq!(state.rates.len(), 3);
    }

    #[test]
    fn unknown_selection_and_garbage_fall_back_to_defaults() {
        let state = CurrencyState::from_value(&json!({"selected": "JPY"}));
        assert_eq!(state, CurrencyState::default());
        let state = CurrencyState::from_value(&json!([1, 2, 3]));
        assert_eq!(state, CurrencyState::default());
    }

    #[test]
    fn set_rate_rounds_or_keeps_previous() {
        let mut state = CurrencyState::default();
        assert_eq!(state.set_rate(CurrencyCode::Usd, "0.756"), 0.76);
        assert_eq!(state.set_rate(CurrencyCode::Usd, "0"), 0.76);
        assert_eq!(state.set_rate(CurrencyCode::Usd, "nope"), 0.76);

        state.rates.insert(CurrencyCode::Gbp, f64::NAN);
        assert_eq!(state.set_rate(CurrencyCode::Gbp, "-1"), 1.0);
    }

    #[test]
    fn selecting_seeds_missing_rate() {
        let mut state = CurrencyState::default();
        state.rates.remove(&CurrencyCode::Gbp);
        state.set_selected(CurrencyCode::Gbp);
        assert_eq!(state.active_rate(), 0.58);

        assert_eq!(state.cycle(), CurrencyCode::Cad);
        assert_eq!(state.cycle(), CurrencyCode::Usd);
    }

    #[test]
    fn state_serializes_with_currency_codes() {
        let encoded = serde_json::to_value(CurrencyState::default()).expect("encode");
        assert_eq!(
            encoded,
            json!({"selected": "CAD", "rates": {"CAD": 1.0, "USD": 0.74, "GBP": 0.58}})
        );
    }

    #[test]
    fn currency_formatting() {
        assert_eq!(format_currency(1234567.6, CurrencyCode::Cad), "$1,234,568");
        assert_eq!(format_currency(-74000.0, CurrencyCode::Usd), "-US$74,000");
        assert_eq!(format_currency(950.0, CurrencyCode::Gbp), "£950");
        assert_eq!(format_currency(f64::NAN, CurrencyCode::Cad), "$0");
        assert_eq!(format_currency(-0.2, CurrencyCode::Cad), "$0");

        assert_eq!(format_currency_short(1_200_000.0, CurrencyCode::Cad), "CA$1.2M");
        assert_eq!(format_currency_short(850_000.0, CurrencyCode::Usd), "US$850K");
        assert_eq!(format_currency_short(950.0, CurrencyCode::Gbp), "GBP950");
        assert_eq!(format_currency_short(-2_000.0, CurrencyCode::Cad), "-CA$2K");

        assert_eq!(format_rate(0.7), "0.70");
        assert_eq!(format_rate(-3.0), "1.00");
    }
}

//! Free-text price parsing
//!
//! Handles French and English layouts: `31,90 €`, `EUR 31.90`, `1 234,56 €`,
//! `1.234,56`, `1,234.56`, and per-unit markers such as `54,00 €/m²`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static UNIT_PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?P<amount>\d(?:[\d\s\x{a0}\x{202f}.,']*\d)?)\s*(?:€|eur|\$|usd|£|gbp|chf)?\s*/\s*(?P<unit>m²|m³|m2|m3|ml|kg|unités?|unites?|units?|pièces?|pieces?|pce|pcs?|u|l|m|g)(?:[^\p{L}\p{N}]|$)",
    )
    .expect("unit price regex is valid")
});

static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d(?:[\d\s\x{a0}\x{202f}.,']*\d)?").expect("amount regex is valid")
});

static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?P<symbol>€|\$|£)|\b(?P<code>eur|usd|gbp|chf)\b").expect("currency regex is valid")
});

/// Result of parsing one price text
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPrice {
    pub amount: Option<f64>,
    pub currency: String,
    pub unit_price: Option<UnitPrice>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitPrice {
    pub amount: f64,
    pub unit: String,
}

/// Canonical text form; parsing it yields the same value.
impl fmt::Display for ParsedPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        if let Some(amount) = self.amount {
            write!(f, "{amount:.2} {}", self.currency)?;
            wrote = true;
        }
        if let Some(unit) = &self.unit_price {
            if wrote {
                f.write_str(" ")?;
            }
            write!(f, "{:.2} {}/{}", unit.amount, self.currency, unit.unit)?;
        }
        Ok(())
    }
}

/// Parse a price text. `currency_hint` is used when the text carries no
/// symbol or code, `default_currency` when neither is available.
pub fn parse_price(text: &str, currency_hint: Option<&str>, default_currency: &str) -> ParsedPrice {
    let currency = detect_currency(text)
        .or_else(|| currency_hint.and_then(normalize_currency_code))
        .unwrap_or_else(|| default_currency.to_string());

    let mut remainder = text.to_string();
    let mut unit_price = None;
    if let Some(caps) = UNIT_PRICE_RE.captures(text) {
        let amount = caps.name("amount").and_then(|m| parse_amount(m.as_str()));
        let unit = caps.name("unit").map(|m| canonical_unit(m.as_str()));
        if let (Some(amount), Some(unit)) = (amount, unit) {
            unit_price = Some(UnitPrice { amount, unit });
            if let Some(whole) = caps.get(0) {
                remainder.replace_range(whole.range(), " ");
            }
        }
    }

    let amount = AMOUNT_RE
        .find(&remainder)
        .and_then(|m| parse_amount(m.as_str()));

    ParsedPrice {
        amount,
        currency,
        unit_price,
    }
}

/// Parse a bare number with locale-dependent separators, rounded to cents.
/// A lone comma followed by more than two digits groups thousands.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '\u{a0}' && *c != '\u{202f}')
        .collect();
    if compact.is_empty() {
        return None;
    }

    let last_comma = compact.rfind(',');
    let last_dot = compact.rfind('.');
    let normalized = match (last_comma, last_dot) {
        (Some(comma), Some(dot)) => {
            if comma > dot {
                compact.replace('.', "").replace(',', ".")
            } else {
                compact.replace(',', "")
            }
        }
        (Some(comma), None) => {
            let decimals = compact[comma + 1..].chars().take_while(char::is_ascii_digit).count();
            if compact.matches(',').count() == 1 && decimals <= 2 {
                compact.replace(',', ".")
            } else {
                compact.replace(',', "")
            }
        }
        (None, Some(_)) => {
            if compact.matches('.').count() == 1 {
                compact
            } else {
                compact.replace('.', "")
            }
        }
        (None, None) => compact,
    };

    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(round_cents(value))
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn detect_currency(text: &str) -> Option<String> {
    let caps = CURRENCY_RE.captures(text)?;
    if let Some(symbol) = caps.name("symbol") {
        return match symbol.as_str() {
            "€" => Some("EUR".to_string()),
            "$" => Some("USD".to_string()),
            "£" => Some("GBP".to_string()),
            _ => None,
        };
    }
    caps.name("code").map(|code| code.as_str().to_ascii_uppercase())
}

fn normalize_currency_code(code: &str) -> Option<String> {
    let code = code.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_uppercase())
    } else {
        detect_currency(code)
    }
}

/// Canonical spelling of a per-unit marker
pub fn canonical_unit(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    match lower.as_str() {
        "m²" | "m2" => "m²".to_string(),
        "m³" | "m3" => "m³".to_string(),
        "l" => "L".to_string(),
        "ml" => "mL".to_string(),
        "u" | "pce" | "pc" | "pcs" | "unit" | "units" | "unité" | "unités" | "unite" | "unites"
        | "pièce" | "pièces" | "piece" | "pieces" => "unit".to_string(),
        _ => lower,
    }
}

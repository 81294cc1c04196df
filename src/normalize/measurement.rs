//! Dimension text parsing (`30x60 cm`, `100x200mm`, `20.0 x 20.0`)

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::Measurement;

const UNIT_PATTERN: &str = r"millimètres?|millimetres?|mm|centimètres?|centimetres?|cm|mètres?|metres?|m";

/// A number may only end where no digit, letter or further decimal part follows.
const END_PATTERN: &str = r"(?:[^\p{L}\p{N}.,]|[.,](?:[^\p{N}]|$)|$)";

static DIMENSIONS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?P<length>\d+(?:[.,]\d+)?)\s*(?P<unit1>{UNIT_PATTERN})?\s*[x×*]\s*(?P<width>\d+(?:[.,]\d+)?)\s*(?P<unit2>{UNIT_PATTERN})?(?:\s*[x×*]\s*(?P<thickness>\d+(?:[.,]\d+)?)\s*(?P<unit3>{UNIT_PATTERN})?)?{END_PATTERN}"
    ))
    .expect("dimensions regex is valid")
});

static SINGLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?P<value>\d+(?:[.,]\d+)?)\s*(?P<unit>{UNIT_PATTERN})?{END_PATTERN}"
    ))
    .expect("single dimension regex is valid")
});

/// Parse a combined `LxW unit` text. A trailing thickness (`60x60x1 cm`) is
/// dropped but its unit applies to the whole text. Anything without two
/// dimensions gives an empty measurement.
pub fn parse_dimensions(text: &str, default_unit: &str) -> Measurement {
    let Some(caps) = DIMENSIONS_RE.captures(text) else {
        return Measurement::default();
    };
    let length = caps.name("length").and_then(|m| format_dimension(m.as_str()));
    let width = caps.name("width").and_then(|m| format_dimension(m.as_str()));
    let unit = caps
        .name("unit3")
        .or_else(|| caps.name("unit2"))
        .or_else(|| caps.name("unit1"))
        .map(|m| canonical_length_unit(m.as_str()))
        .unwrap_or_else(|| canonical_length_unit(default_unit));

    match (length, width) {
        (Some(length), Some(width)) => Measurement {
            length: Some(length),
            width: Some(width),
            unit: Some(unit),
        },
        _ => Measurement::default(),
    }
}

/// Build a measurement from separate length and width texts, e.g. the
/// "Hauteur" and "Largeur" rows of a specification table.
pub fn parse_parts(length_text: &str, width_text: &str, default_unit: &str) -> Measurement {
    let (Some((length, unit_l)), Some((width, unit_w))) =
        (parse_single(length_text), parse_single(width_text))
    else {
        return Measurement::default();
    };
    let unit = unit_l
        .or(unit_w)
        .unwrap_or_else(|| canonical_length_unit(default_unit));
    Measurement {
        length: Some(length),
        width: Some(width),
        unit: Some(unit),
    }
}

fn parse_single(text: &str) -> Option<(String, Option<String>)> {
    let caps = SINGLE_RE.captures(text)?;
    let value = format_dimension(caps.name("value")?.as_str())?;
    let unit = caps.name("unit").map(|m| canonical_length_unit(m.as_str()));
    Some((value, unit))
}

/// `20` → `20.0`, `20,5` → `20.5`, `20.25` → `20.25`
pub fn format_dimension(raw: &str) -> Option<String> {
    let value: f64 = raw.trim().replace(',', ".").parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    if value.fract() == 0.0 {
        Some(format!("{value:.1}"))
    } else {
        Some(format!("{value}"))
    }
}

pub fn canonical_length_unit(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    if lower.starts_with("mm") || lower.starts_with("millim") {
        "mm".to_string()
    } else if lower.starts_with("cm") || lower.starts_with("centim") {
        "cm".to_string()
    } else if lower == "m" || lower.starts_with("mètre") || lower.starts_with("metre") {
        "m".to_string()
    } else {
        lower
    }
}

use crate::domain::Availability;

/// Classify stock text. Any configured out-of-stock phrase wins; everything
/// else, including missing text, is `in_stock`.
pub fn classify_availability(text: Option<&str>, out_of_stock_phrases: &[String]) -> Availability {
    let Some(text) = text else {
        return Availability::InStock;
    };
    let folded = fold(text);
    if folded.is_empty() {
        return Availability::InStock;
    }
    let negative = out_of_stock_phrases
        .iter()
        .map(|phrase| fold(phrase))
        .filter(|phrase| !phrase.is_empty())
        .any(|phrase| folded.contains(&phrase));
    if negative {
        Availability::OutOfStock
    } else {
        Availability::InStock
    }
}

/// Lowercase, strip French accents, treat `_` as a space and collapse runs
/// of whitespace. `out_of_stock` folds to `out of stock`.
fn fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        match c {
            'à' | 'â' | 'ä' | 'á' => out.push('a'),
            'é' | 'è' | 'ê' | 'ë' => out.push('e'),
            'î' | 'ï' | 'í' => out.push('i'),
            'ô' | 'ö' | 'ó' => out.push('o'),
            'ù' | 'û' | 'ü' | 'ú' => out.push('u'),
            'ç' => out.push('c'),
            'œ' => out.push_str("oe"),
            '_' | '-' => out.push(' '),
            c if c.is_whitespace() => out.push(' '),
            c => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

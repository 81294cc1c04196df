use crate::domain::UNKNOWN_BRAND;

/// Title-case a brand and strip boilerplate such as `Marque :` prefixes.
/// Blank input (or input made only of noise words) maps to `Unknown`.
pub fn normalize_brand(raw: Option<&str>, noise_words: &[String]) -> String {
    let Some(raw) = raw else {
        return UNKNOWN_BRAND.to_string();
    };

    let mut tokens: Vec<String> = raw.split_whitespace().map(str::to_string).collect();

    // Leading noise, including the glued form `Marque:Grohe`
    loop {
        let Some(first) = tokens.first().cloned() else {
            break;
        };
        if is_noise(first.trim_end_matches(':'), noise_words) || first == ":" {
            tokens.remove(0);
            continue;
        }
        if let Some((head, tail)) = first.split_once(':') {
            if is_noise(head, noise_words) {
                tokens[0] = tail.to_string();
                if tokens[0].is_empty() {
                    tokens.remove(0);
                }
                continue;
            }
        }
        break;
    }

    while tokens
        .last()
        .is_some_and(|last| is_noise(last.trim_end_matches(':'), noise_words))
    {
        tokens.pop();
    }

    let titled: Vec<String> = tokens.iter().map(|t| title_case_word(t)).collect();
    let brand = titled.join(" ");
    if brand.is_empty() {
        UNKNOWN_BRAND.to_string()
    } else {
        brand
    }
}

fn is_noise(token: &str, noise_words: &[String]) -> bool {
    !token.is_empty()
        && noise_words
            .iter()
            .any(|w| w.to_lowercase() == token.to_lowercase())
}

/// `saint-gobain` → `Saint-Gobain`, `l'oréal` → `L'Oréal`
fn title_case_word(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut at_start = true;
    for c in word.chars() {
        if at_start {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        at_start = matches!(c, '-' | '\'' | '’' | '/' | '&');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn noise() -> Vec<String> {
        vec!["marque".into(), "brand".into()]
    }

    #[rstest]
    #[case(Some("GROHE"), "Grohe")]
    #[case(Some("  leroy   merlin "), "Leroy Merlin")]
    #[case(Some("saint-gobain"), "Saint-Gobain")]
    #[case(Some("Marque : Jacob Delafon"), "Jacob Delafon")]
    #[case(Some("marque:goodhome"), "Goodhome")]
    #[case(Some("Brand: V33"), "V33")]
    #[case(Some("Porcelanosa marque"), "Porcelanosa")]
    #[case(Some("   "), "Unknown")]
    #[case(Some("Marque"), "Unknown")]
    #[case(None, "Unknown")]
    fn test_normalize_brand(#[case] input: Option<&str>, #[case] expected: &str) {
        assert_eq!(normalize_brand(input, &noise()), expected);
    }

    #[test]
    fn test_idempotent_on_examples() {
        for raw in ["GROHE", "l'oréal", "Marque: dulux valentine", "Unknown"] {
            let once = normalize_brand(Some(raw), &noise());
            assert_eq!(normalize_brand(Some(&once), &noise()), once);
        }
    }
}

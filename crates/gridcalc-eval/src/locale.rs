/// Number-formatting conventions used when text is read as a number.
///
/// The defaults come from the process environment (`LC_ALL`, then
/// `LC_NUMERIC`, then `LANG`), falling back to `.`/`,`/`$` when none of them
/// names a known convention. Every field can be overridden afterwards.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Locale {
    pub decimal_separator: char,
    pub thousands_separator: char,
    pub currency_symbol: String,
}

impl Default for Locale {
    fn default() -> Self {
        Self::invariant()
    }
}

// (language[_territory] prefix, decimal, thousands, currency)
const CONVENTIONS: &[(&str, char, char, &str)] = &[
    ("en_gb", '.', ',', "£"),
    ("en_in", '.', ',', "₹"),
    ("en_ie", '.', ',', "€"),
    ("en", '.', ',', "$"),
    ("de_ch", '.', '\'', "CHF"),
    ("de", ',', '.', "€"),
    ("fr_ch", '.', '\'', "CHF"),
    ("fr", ',', ' ', "€"),
    ("es_mx", '.', ',', "$"),
    ("es", ',', '.', "€"),
    ("it", ',', '.', "€"),
    ("nl", ',', '.', "€"),
    ("pt_br", ',', '.', "R$"),
    ("pt", ',', ' ', "€"),
    ("pl", ',', ' ', "zł"),
    ("ru", ',', ' ', "₽"),
    ("sv", ',', ' ', "kr"),
    ("da", ',', '.', "kr"),
    ("nb", ',', ' ', "kr"),
    ("ja", '.', ',', "¥"),
    ("zh", '.', ',', "¥"),
];

impl Locale {
    pub fn invariant() -> Self {
        Locale {
            decimal_separator: '.',
            thousands_separator: ',',
            currency_symbol: "$".to_string(),
        }
    }

    pub fn from_env() -> Self {
        ["LC_ALL", "LC_NUMERIC", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|v| !v.is_empty() && v != "C" && v != "POSIX")
            .map(|tag| Self::from_tag(&tag))
            .unwrap_or_else(Self::invariant)
    }

    /// Conventions for a POSIX locale tag such as `de_DE.UTF-8` or `en-GB`.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag
            .split(['.', '@'])
            .next()
            .unwrap_or_default()
            .replace('-', "_")
            .to_ascii_lowercase();
        CONVENTIONS
            .iter()
            .find(|(prefix, ..)| {
                tag == *prefix
                    || tag
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('_'))
            })
            .map(|(_, decimal, thousands, currency)| Locale {
                decimal_separator: *decimal,
                thousands_separator: *thousands,
                currency_symbol: currency.to_string(),
            })
            .unwrap_or_else(Self::invariant)
    }

    pub fn with_decimal_separator(mut self, sep: char) -> Self {
        self.decimal_separator = sep;
        self
    }

    pub fn with_thousands_separator(mut self, sep: char) -> Self {
        self.thousands_separator = sep;
        self
    }

    pub fn with_currency_symbol<S: Into<String>>(mut self, symbol: S) -> Self {
        self.currency_symbol = symbol.into();
        self
    }

    /// Parse a plain number written with this locale's separators.
    ///
    /// Thousands separators are only accepted between digits, before the
    /// decimal separator. Infinity and NaN spellings are rejected.
    pub fn parse_number(&self, s: &str) -> Option<f64> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        let mut normalised = String::with_capacity(s.len());
        let mut seen_decimal = false;
        let mut seen_exponent = false;
        let mut prev: Option<char> = None;
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            match c {
                '0'..='9' => normalised.push(c),
                '+' | '-' if prev.is_none() || matches!(prev, Some('e' | 'E')) => {
                    normalised.push(c)
                }
                'e' | 'E' if !seen_exponent && prev.is_some_and(|p| p.is_ascii_digit()) => {
                    seen_exponent = true;
                    normalised.push('e');
                }
                c if c == self.decimal_separator && !seen_decimal && !seen_exponent => {
                    seen_decimal = true;
                    normalised.push('.');
                }
                c if c == self.thousands_separator
                    && !seen_decimal
                    && !seen_exponent
                    && prev.is_some_and(|p| p.is_ascii_digit())
                    && is_digit_group(chars.clone()) => {}
                _ => return None,
            }
            prev = Some(c);
        }
        if !normalised.bytes().any(|b| b.is_ascii_digit()) {
            return None;
        }
        normalised.parse::<f64>().ok().filter(|n| n.is_finite())
    }

    /// General-format rendering of a number with this locale's decimal
    /// separator. General never groups thousands.
    pub fn format_general(&self, n: f64) -> String {
        let text = crate::coercion::format_number(n);
        if self.decimal_separator == '.' {
            text
        } else {
            text.replace('.', self.decimal_separator.encode_utf8(&mut [0; 4]))
        }
    }

    /// Case folding for case-insensitive comparison.
    pub fn fold_case(&self, s: &str) -> String {
        s.to_lowercase()
    }
}

/// Exactly three digits follow a thousands separator.
fn is_digit_group(mut rest: impl Iterator<Item = char>) -> bool {
    (0..3).all(|_| rest.next().is_some_and(|c| c.is_ascii_digit()))
        && !rest.next().is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_map_to_conventions() {
        let de = Locale::from_tag("de_DE.UTF-8");
        assert_eq!(de.decimal_separator, ',');
        assert_eq!(de.thousands_separator, '.');
        assert_eq!(de.currency_symbol, "€");
        assert_eq!(Locale::from_tag("en-GB").currency_symbol, "£");
        assert_eq!(Locale::from_tag("xx_YY"), Locale::invariant());
        // "en" must not swallow unrelated prefixes
        assert_eq!(Locale::from_tag("eo").decimal_separator, '.');
    }

    #[test]
    fn parse_number_honours_separators() {
        let inv = Locale::invariant();
        assert_eq!(inv.parse_number(" 1,234.5 "), Some(1234.5));
        assert_eq!(inv.parse_number("-1.5e3"), Some(-1500.0));
        assert_eq!(inv.parse_number(".5"), Some(0.5));
        assert_eq!(inv.parse_number("1,,2"), None);
        assert_eq!(inv.parse_number("inf"), None);
        assert_eq!(inv.parse_number("1.2.3"), None);
        assert_eq!(inv.parse_number("-"), None);

        let de = Locale::from_tag("de_DE");
        assert_eq!(de.parse_number("2.020,20"), Some(2020.2));
        assert_eq!(de.parse_number("1.5"), None);
    }

    #[test]
    fn general_rendering_uses_the_decimal_separator() {
        let de = Locale::from_tag("de_DE");
        assert_eq!(de.format_general(1234.5), "1234,5");
        assert_eq!(de.format_general(-0.25), "-0,25");
        assert_eq!(de.format_general(42.0), "42");
        assert_eq!(Locale::invariant().format_general(1234.5), "1234.5");
        let fr = Locale::from_tag("fr_FR");
        assert_eq!(fr.parse_number(&fr.format_general(0.1 + 0.2)), Some(0.3));
    }
}

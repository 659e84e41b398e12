//! Number-format masks as used by `TEXT`.
//!
//! A mask has up to four `;`-separated sections: positive, negative, zero
//! and text. Digit placeholders are `0` (always shown), `#` (shown when
//! significant) and `?` (a space when not significant). Masks are written
//! with `.` and `,`; the output carries the configured locale's separators.

use gridcalc_common::{ExcelError, is_date_time_format_code};

use super::datetime::{day_of_week, serial_to_ymd};
use super::utils::round_to_precision;
use crate::config::EvalConfig;
use crate::locale::Locale;

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Render a number through a mask.
///
/// One section covers every value and negatives gain a leading `-`. With
/// two or more, the second section renders the magnitude of negatives and
/// the third renders zero. A date or time section rejects serials outside
/// the calendar with `#VALUE!`.
pub fn format_with_mask(value: f64, mask: &str, config: &EvalConfig) -> Result<String, ExcelError> {
    if !value.is_finite() {
        return Err(ExcelError::new_num());
    }
    let sections = split_sections(mask);
    let (section, value, auto_sign) = if value < 0.0 && sections.len() > 1 {
        (sections[1], -value, false)
    } else if value == 0.0 && sections.len() > 2 {
        (sections[2], value, false)
    } else {
        (sections[0], value, true)
    };

    if section.trim().eq_ignore_ascii_case("general") {
        return Ok(config.locale.format_general(value));
    }
    if is_date_time_format_code(section) {
        return format_date_time(value, section, config);
    }
    Ok(format_numeric(value, section, auto_sign, &config.locale))
}

/// Render text through a mask's text section: the fourth one, or a lone
/// section holding `@`. Without one the text comes back unchanged.
pub fn format_text_with_mask(text: &str, mask: &str) -> String {
    let sections = split_sections(mask);
    let section = match sections.as_slice() {
        [_, _, _, text_section, ..] => *text_section,
        [only] if bare_chars(only).iter().any(|&(_, c)| c == '@') => *only,
        _ => return text.to_string(),
    };
    render_literal(section, Some(text))
}

/// Mask characters outside quotes, escapes and bracket tokens. The
/// character after `_` or `*` is skipped as well.
fn bare_chars(s: &str) -> Vec<(usize, char)> {
    let mut out = Vec::new();
    let mut chars = s.char_indices();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '"' => {
                for (_, c) in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                }
            }
            '[' => {
                for (_, c) in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            _ => out.push((idx, ch)),
        }
    }
    out
}

fn split_sections(mask: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0;
    for (idx, ch) in bare_chars(mask) {
        if ch == ';' {
            sections.push(&mask[start..idx]);
            start = idx + 1;
        }
    }
    sections.push(&mask[start..]);
    sections
}

/// Literal text of a mask segment. `@` stands for `text` when given.
fn render_literal(segment: &str, text: Option<&str>) -> String {
    let mut out = String::new();
    let mut chars = segment.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    out.push(c);
                }
            }
            '\\' => out.extend(chars.next()),
            '_' => {
                chars.next();
                out.push(' ');
            }
            '*' => {
                chars.next();
            }
            '[' => {
                let mut content = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    content.push(c);
                }
                if !closed {
                    out.push('[');
                    out.push_str(&content);
                } else if let Some(symbol) = currency_symbol(&content) {
                    out.push_str(symbol);
                }
            }
            '@' => match text {
                Some(text) => out.push_str(text),
                None => out.push('@'),
            },
            _ => out.push(ch),
        }
    }
    out
}

/// `$€-407` names the symbol `€`; `$-409` carries only a locale id.
fn currency_symbol(bracket: &str) -> Option<&str> {
    let after = bracket.strip_prefix('$')?;
    let symbol = after.split_once('-').map_or(after, |(symbol, _)| symbol);
    (!symbol.is_empty()).then_some(symbol)
}

fn format_numeric(value: f64, pattern: &str, auto_sign: bool, locale: &Locale) -> String {
    let bare = bare_chars(pattern);
    let placeholders: Vec<usize> = bare
        .iter()
        .filter(|&&(_, c)| matches!(c, '0' | '#' | '?'))
        .map(|&(idx, _)| idx)
        .collect();
    let (Some(&start), Some(&last)) = (placeholders.first(), placeholders.last()) else {
        return render_literal(pattern, None);
    };
    let mut end = last + 1;
    while pattern[end..].starts_with(',') {
        end += 1;
    }

    let percents = bare.iter().filter(|&&(_, c)| c == '%').count();
    let mut magnitude = value.abs();
    for _ in 0..percents {
        magnitude *= 100.0;
    }

    let number_raw = &pattern[start..end];
    let body = match parse_scientific(number_raw) {
        Some(spec) => format_scientific(magnitude, &spec, locale),
        None => format_fixed(magnitude, &parse_fixed(number_raw), locale),
    };
    let mut out = render_literal(&pattern[..start], None);
    out.push_str(&body);
    out.push_str(&render_literal(&pattern[end..], None));
    if value < 0.0 && auto_sign {
        out.insert(0, '-');
    }
    out
}

#[derive(Debug, Clone, Default)]
struct FixedSpec {
    min_int: usize,
    pad_int: usize,
    min_frac: usize,
    pad_frac: usize,
    max_frac: usize,
    grouping: bool,
    scale_commas: usize,
    has_point: bool,
}

fn parse_fixed(number_raw: &str) -> FixedSpec {
    let raw = number_raw.trim_end_matches(',');
    let mut spec = FixedSpec {
        scale_commas: number_raw.len() - raw.len(),
        ..FixedSpec::default()
    };
    for (_, ch) in bare_chars(raw) {
        match (ch, spec.has_point) {
            ('.', false) => spec.has_point = true,
            (',', false) => spec.grouping = true,
            ('0', false) => {
                spec.min_int += 1;
                spec.pad_int += 1;
            }
            ('?', false) => spec.pad_int += 1,
            ('0', true) => {
                spec.min_frac += 1;
                spec.pad_frac += 1;
                spec.max_frac += 1;
            }
            ('?', true) => {
                spec.pad_frac += 1;
                spec.max_frac += 1;
            }
            ('#', true) => spec.max_frac += 1,
            _ => {}
        }
    }
    spec
}

fn format_fixed(value: f64, spec: &FixedSpec, locale: &Locale) -> String {
    let mut value = value;
    for _ in 0..spec.scale_commas {
        value /= 1000.0;
    }
    let rounded = round_to_precision(value, spec.max_frac as i32);
    let digits = format!("{:.*}", spec.max_frac, rounded);
    let (int_digits, frac_digits) = digits.split_once('.').unwrap_or((digits.as_str(), ""));

    let mut int_part = if spec.min_int == 0 && int_digits == "0" {
        String::new()
    } else {
        int_digits.to_string()
    };
    while int_part.len() < spec.min_int {
        int_part.insert(0, '0');
    }
    let shown = int_part.len();
    if spec.grouping {
        int_part = group_thousands(&int_part, locale.thousands_separator);
    }
    let mut out = " ".repeat(spec.pad_int.saturating_sub(shown));
    out.push_str(&int_part);

    if spec.has_point {
        out.push(locale.decimal_separator);
        let significant = frac_digits.trim_end_matches('0');
        let keep = significant.len().max(spec.min_frac.min(frac_digits.len()));
        out.push_str(&frac_digits[..keep]);
        out.push_str(&" ".repeat(spec.pad_frac.saturating_sub(keep)));
    }
    out
}

fn group_thousands(digits: &str, sep: char) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        out.push(ch);
        let remaining = len - i - 1;
        if remaining > 0 && remaining % 3 == 0 {
            out.push(sep);
        }
    }
    out
}

#[derive(Debug, Clone)]
struct ScientificSpec {
    mantissa: FixedSpec,
    exp_width: usize,
    exp_sign_always: bool,
    e_char: char,
}

fn parse_scientific(number_raw: &str) -> Option<ScientificSpec> {
    let &(e_idx, e_char) = bare_chars(number_raw)
        .iter()
        .find(|&&(_, c)| matches!(c, 'E' | 'e'))?;
    let exponent = &number_raw[e_idx + 1..];
    let (exp_sign_always, digits) = match exponent.chars().next() {
        Some('+') => (true, &exponent[1..]),
        Some('-') => (false, &exponent[1..]),
        _ => return None,
    };
    let exp_width = digits.chars().filter(|c| matches!(c, '0' | '#' | '?')).count();
    (exp_width > 0).then(|| ScientificSpec {
        mantissa: parse_fixed(&number_raw[..e_idx]),
        exp_width,
        exp_sign_always,
        e_char,
    })
}

fn format_scientific(value: f64, spec: &ScientificSpec, locale: &Locale) -> String {
    let mut exponent = if value == 0.0 {
        0
    } else {
        value.log10().floor() as i32
    };
    let mut mantissa = round_to_precision(value / 10f64.powi(exponent), spec.mantissa.max_frac as i32);
    if mantissa >= 10.0 {
        mantissa /= 10.0;
        exponent += 1;
    }
    let sign = if exponent < 0 {
        "-"
    } else if spec.exp_sign_always {
        "+"
    } else {
        ""
    };
    format!(
        "{}{}{sign}{:0width$}",
        format_fixed(mantissa, &spec.mantissa, locale),
        spec.e_char,
        exponent.unsigned_abs(),
        width = spec.exp_width
    )
}

#[derive(Debug, Clone, PartialEq)]
enum DatePart {
    Literal(String),
    Year(usize),
    Month(usize),
    Minute(usize),
    MonthOrMinute(usize),
    Day(usize),
    Hour(usize),
    Second(usize),
    Fraction(usize),
    Meridiem { short: bool, lower: bool },
    Elapsed(char, usize),
}

fn tokenize_date(section: &str) -> Vec<DatePart> {
    let chars: Vec<char> = section.chars().collect();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    let run = |i: usize, lower: char| {
        chars[i..]
            .iter()
            .take_while(|c| c.to_ascii_lowercase() == lower)
            .count()
    };
    let starts_with = |i: usize, word: &str| {
        let len = word.chars().count();
        chars.len() >= i + len
            && chars[i..i + len]
                .iter()
                .zip(word.chars())
                .all(|(a, b)| a.eq_ignore_ascii_case(&b))
    };

    while i < chars.len() {
        let ch = chars[i];
        let lower = ch.to_ascii_lowercase();
        let part = match lower {
            '"' => {
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    literal.push(chars[i]);
                    i += 1;
                }
                i += 1;
                continue;
            }
            '\\' => {
                literal.extend(chars.get(i + 1));
                i += 2;
                continue;
            }
            '_' => {
                literal.push(' ');
                i += 2;
                continue;
            }
            '*' => {
                i += 2;
                continue;
            }
            '[' => {
                let close = chars[i..].iter().position(|&c| c == ']').map(|p| i + p);
                let Some(close) = close else {
                    literal.extend(&chars[i..]);
                    break;
                };
                let content: String = chars[i + 1..close].iter().collect();
                i = close + 1;
                let unit = content.chars().next().map(|c| c.to_ascii_lowercase());
                match unit {
                    Some(u @ ('h' | 'm' | 's'))
                        if content.chars().all(|c| c.to_ascii_lowercase() == u) =>
                    {
                        DatePart::Elapsed(u, content.len())
                    }
                    _ => {
                        literal.extend(currency_symbol(&content).unwrap_or_default().chars());
                        continue;
                    }
                }
            }
            'a' if starts_with(i, "am/pm") => {
                i += 5;
                DatePart::Meridiem {
                    short: false,
                    lower: ch.is_lowercase(),
                }
            }
            'a' if starts_with(i, "a/p") => {
                i += 3;
                DatePart::Meridiem {
                    short: true,
                    lower: ch.is_lowercase(),
                }
            }
            'y' | 'm' | 'd' | 'h' | 's' => {
                let n = run(i, lower);
                i += n;
                match lower {
                    'y' => DatePart::Year(n),
                    'm' => DatePart::MonthOrMinute(n),
                    'd' => DatePart::Day(n),
                    'h' => DatePart::Hour(n),
                    _ => DatePart::Second(n),
                }
            }
            '.' if matches!(parts.last(), Some(DatePart::Second(_)))
                && literal.is_empty()
                && run(i + 1, '0') > 0 =>
            {
                let n = run(i + 1, '0');
                i += n + 1;
                DatePart::Fraction(n)
            }
            _ => {
                literal.push(ch);
                i += 1;
                continue;
            }
        };
        if !literal.is_empty() {
            parts.push(DatePart::Literal(std::mem::take(&mut literal)));
        }
        parts.push(part);
    }
    if !literal.is_empty() {
        parts.push(DatePart::Literal(literal));
    }
    resolve_minutes(&mut parts);
    parts
}

/// `m` is a minute right after an hour or right before a second, and a
/// month otherwise.
fn resolve_minutes(parts: &mut [DatePart]) {
    let fields: Vec<usize> = (0..parts.len())
        .filter(|&i| !matches!(parts[i], DatePart::Literal(_)))
        .collect();
    for (pos, &i) in fields.iter().enumerate() {
        let DatePart::MonthOrMinute(n) = parts[i] else {
            continue;
        };
        let after_hour = pos
            .checked_sub(1)
            .map(|p| &parts[fields[p]])
            .is_some_and(|p| matches!(p, DatePart::Hour(_) | DatePart::Elapsed('h', _)));
        let before_second = fields
            .get(pos + 1)
            .map(|&next| &parts[next])
            .is_some_and(|p| matches!(p, DatePart::Second(_) | DatePart::Elapsed('s', _)));
        parts[i] = if after_hour || before_second {
            DatePart::Minute(n)
        } else {
            DatePart::Month(n)
        };
    }
}

fn format_date_time(serial: f64, section: &str, config: &EvalConfig) -> Result<String, ExcelError> {
    let calendar = config.calendar;
    if serial < 0.0 || serial >= calendar.last_serial() + 1.0 {
        return Err(ExcelError::new_value().with_message("value is not a valid date"));
    }
    let parts = tokenize_date(section);
    let frac_digits = parts
        .iter()
        .find_map(|p| match p {
            DatePart::Fraction(n) => Some((*n).min(3)),
            _ => None,
        })
        .unwrap_or(0);
    let unit = 10i64.pow(frac_digits as u32);
    let ticks = (serial * 86_400.0 * unit as f64).round() as i64;
    let per_day = 86_400 * unit;
    let days = ticks.div_euclid(per_day);
    let of_day = ticks.rem_euclid(per_day);
    let seconds = of_day / unit;
    let (year, month, day) =
        serial_to_ymd(days as f64, calendar).map_err(|_| ExcelError::new_value())?;
    let weekday = day_of_week(days as f64, calendar) as usize;
    let hour = seconds / 3600;
    let twelve_hour = parts.iter().any(|p| matches!(p, DatePart::Meridiem { .. }));
    let month_name = MONTHS[(month.max(1) - 1) as usize];

    let mut out = String::new();
    for part in &parts {
        let two = |v: i64, n: usize| if n > 1 { format!("{v:02}") } else { v.to_string() };
        match part {
            DatePart::Literal(s) => out.push_str(s),
            DatePart::Year(n) if *n <= 2 => out.push_str(&format!("{:02}", year % 100)),
            DatePart::Year(_) => out.push_str(&format!("{year:04}")),
            DatePart::Month(n) => match *n {
                1 | 2 => out.push_str(&two(month as i64, *n)),
                3 => out.push_str(&month_name[..3]),
                4 => out.push_str(month_name),
                _ => out.push_str(&month_name[..1]),
            },
            DatePart::Day(n) => match *n {
                1 | 2 => out.push_str(&two(day as i64, *n)),
                3 => out.push_str(&WEEKDAYS[weekday][..3]),
                _ => out.push_str(WEEKDAYS[weekday]),
            },
            DatePart::Hour(n) => {
                let h = if twelve_hour {
                    match hour % 12 {
                        0 => 12,
                        h => h,
                    }
                } else {
                    hour
                };
                out.push_str(&two(h, *n));
            }
            DatePart::Minute(n) | DatePart::MonthOrMinute(n) => {
                out.push_str(&two(seconds / 60 % 60, *n))
            }
            DatePart::Second(n) => out.push_str(&two(seconds % 60, *n)),
            DatePart::Fraction(_) => {
                out.push(config.locale.decimal_separator);
                out.push_str(&format!("{:0width$}", of_day % unit, width = frac_digits));
            }
            DatePart::Meridiem { short, lower } => {
                let marker = match (*short, hour < 12) {
                    (false, true) => "AM",
                    (false, false) => "PM",
                    (true, true) => "A",
                    (true, false) => "P",
                };
                if *lower {
                    out.push_str(&marker.to_ascii_lowercase());
                } else {
                    out.push_str(marker);
                }
            }
            DatePart::Elapsed(unit_char, n) => {
                let per = match unit_char {
                    'h' => 3600,
                    'm' => 60,
                    _ => 1,
                };
                let total = ticks / unit / per;
                out.push_str(&format!("{total:0width$}", width = *n));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_common::Calendar;

    fn inv() -> EvalConfig {
        EvalConfig::default().with_locale(Locale::invariant())
    }

    fn de() -> EvalConfig {
        EvalConfig::default().with_locale(Locale::from_tag("de_DE"))
    }

    fn fmt(value: f64, mask: &str) -> String {
        format_with_mask(value, mask, &inv()).unwrap()
    }

    #[test]
    fn fixed_placeholders() {
        assert_eq!(fmt(1234.567, "#,##0.00"), "1,234.57");
        assert_eq!(fmt(-1234.567, "#,##0.00"), "-1,234.57");
        assert_eq!(fmt(5.0, "00000"), "00005");
        assert_eq!(fmt(0.5, "#.##"), ".5");
        assert_eq!(fmt(12.0, "#.##"), "12.");
        assert_eq!(fmt(0.0, "#"), "");
        assert_eq!(fmt(2.675, "0.00"), "2.68");
        assert_eq!(fmt(1.5, "0.0?"), "1.5 ");
        assert_eq!(fmt(7.0, "??0"), "  7");
        assert_eq!(fmt(12.5, ".00"), "12.50");
        assert_eq!(fmt(1_234_567.0, "#,##0,"), "1,235");
        assert_eq!(fmt(1_234_567.0, "0.0,,\"M\""), "1.2M");
        assert_eq!(fmt(1e6, "#,##0"), "1,000,000");
    }

    #[test]
    fn percent_and_scientific() {
        assert_eq!(fmt(0.5, "0%"), "50%");
        assert_eq!(fmt(0.1234, "0.0%"), "12.3%");
        assert_eq!(fmt(12345.0, "0.00E+00"), "1.23E+04");
        assert_eq!(fmt(0.001234, "0.0E+00"), "1.2E-03");
        assert_eq!(fmt(99999.0, "0.0E+0"), "1.0E+5");
        assert_eq!(fmt(0.0, "0.00E+00"), "0.00E+00");
    }

    #[test]
    fn literals_and_currency() {
        assert_eq!(fmt(7.0, "\"Qty: \"0"), "Qty: 7");
        assert_eq!(fmt(12.0, "[$€-407]#,##0.00"), "€12.00");
        assert_eq!(fmt(12.0, "[$-409]0"), "12");
        assert_eq!(fmt(3.0, "0\\x"), "3x");
        assert_eq!(fmt(3.0, "0_)"), "3 ");
        assert_eq!(fmt(3.0, "$0"), "$3");
        assert_eq!(fmt(3.0, "\"none\""), "none");
    }

    #[test]
    fn sections_pick_by_sign() {
        let mask = "#,##0.00;(#,##0.00);\"zero\"";
        assert_eq!(fmt(1234.5, mask), "1,234.50");
        assert_eq!(fmt(-1234.5, mask), "(1,234.50)");
        assert_eq!(fmt(0.0, mask), "zero");
        assert_eq!(fmt(-3.0, "0;0"), "3");
        assert_eq!(fmt(0.0, "0;-0"), "0");
        assert_eq!(fmt(-2.0, "0;;"), "");
        assert_eq!(fmt(1.0, "\"a;b\"0"), "a;b1");
    }

    #[test]
    fn separators_follow_the_locale() {
        let de = de();
        assert_eq!(format_with_mask(1234.567, "#,##0.00", &de).unwrap(), "1.234,57");
        assert_eq!(format_with_mask(1234.5, "General", &de).unwrap(), "1234,5");
        assert_eq!(format_with_mask(0.25, "0.0%", &de).unwrap(), "25,0%");
        let fr = EvalConfig::default().with_locale(Locale::from_tag("fr_FR"));
        assert_eq!(format_with_mask(1e6, "#,##0", &fr).unwrap(), "1 000 000");
        assert_eq!(format_with_mask(-1.5, "general", &inv()).unwrap(), "-1.5");
    }

    #[test]
    fn date_and_time_masks() {
        // 2012-01-31 12:00
        assert_eq!(fmt(40939.5, "yyyy-mm-dd hh:mm"), "2012-01-31 12:00");
        assert_eq!(fmt(40939.0, "dddd, mmmm d, yyyy"), "Tuesday, January 31, 2012");
        assert_eq!(fmt(40939.0, "ddd d-mmm-yy"), "Tue 31-Jan-12");
        assert_eq!(fmt(40939.0, "d/m/yyyy"), "31/1/2012");
        assert_eq!(fmt(40939.0, "mmmmm"), "J");
        assert_eq!(fmt(0.75, "h:mm AM/PM"), "6:00 PM");
        assert_eq!(fmt(0.25, "hh:mm a/p"), "06:00 a");
        assert_eq!(fmt(0.0, "h:mm am/pm"), "12:00 am");
        assert_eq!(fmt(3723.45 / 86_400.0, "h:mm:ss.00"), "1:02:03.45");
        assert_eq!(fmt(1.5, "[h]:mm"), "36:00");
        assert_eq!(fmt(0.5, "[mm]:ss"), "720:00");
        assert_eq!(fmt(61.0 / 1440.0, "mm:ss"), "01:00");
        assert_eq!(fmt(60.0, "yyyy-mm-dd"), "1900-02-29");
        assert_eq!(fmt(40939.0, "\"Due\" yyyy"), "Due 2012");
    }

    #[test]
    fn dates_outside_the_calendar_are_value_errors() {
        let err = format_with_mask(-1.0, "yyyy", &inv()).unwrap_err();
        assert_eq!(err, ExcelError::new_value());
        assert!(format_with_mask(2_958_466.0, "yyyy", &inv()).is_err());
        assert_eq!(fmt(2_958_465.0, "yyyy"), "9999");
        assert_eq!(format_with_mask(f64::INFINITY, "0", &inv()), Err(ExcelError::new_num()));

        let mac = inv().with_calendar(Calendar::Mac1904);
        assert_eq!(format_with_mask(0.0, "yyyy-mm-dd", &mac).unwrap(), "1904-01-01");
    }

    #[test]
    fn text_sections() {
        assert_eq!(format_text_with_mask("abc", "0;0;0;\"[\"@\"]\""), "[abc]");
        assert_eq!(format_text_with_mask("abc", "@\"!\""), "abc!");
        assert_eq!(format_text_with_mask("abc", "0.00"), "abc");
        assert_eq!(format_text_with_mask("abc", "0;-0"), "abc");
    }
}

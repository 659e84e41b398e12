//! Shared helpers for the lookup family (MATCH, VLOOKUP, HLOOKUP).
//! Lookups only compare values of the same kind: numbers with numbers, text
//! with text (case-insensitively) and logicals with logicals. Blanks and
//! errors never match.

use std::cmp::Ordering;

use gridcalc_common::{Calendar, LiteralValue, native_to_excel};

use crate::coercion::cmp_f64;
use crate::locale::Locale;

/// Ordering of two lookup values, `None` when they are not comparable.
pub fn lookup_cmp(
    a: &LiteralValue,
    b: &LiteralValue,
    calendar: Calendar,
    locale: &Locale,
) -> Option<Ordering> {
    let number = |v: &LiteralValue| match v {
        LiteralValue::Number(n) => Some(*n),
        LiteralValue::DateTime(dt) => Some(native_to_excel(dt, calendar)),
        _ => None,
    };
    if let (Some(x), Some(y)) = (number(a), number(b)) {
        return Some(cmp_f64(x, y));
    }
    match (a, b) {
        (LiteralValue::Text(x), LiteralValue::Text(y)) => {
            Some(locale.fold_case(x).cmp(&locale.fold_case(y)))
        }
        (LiteralValue::Boolean(x), LiteralValue::Boolean(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Index of the first value equal to `key`.
pub fn exact_position(
    values: &[LiteralValue],
    key: &LiteralValue,
    calendar: Calendar,
    locale: &Locale,
) -> Option<usize> {
    values
        .iter()
        .position(|v| lookup_cmp(v, key, calendar, locale) == Some(Ordering::Equal))
}

/// Index of the largest value not greater than `key`, assuming `values`
/// ascends. Unsorted input gives some answer, never a panic; values of
/// another kind are stepped over.
pub fn approximate_position(
    values: &[LiteralValue],
    key: &LiteralValue,
    calendar: Calendar,
    locale: &Locale,
) -> Option<usize> {
    let (mut lo, mut hi) = (0usize, values.len());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match lookup_cmp(&values[mid], key, calendar, locale) {
            Some(Ordering::Greater) => hi = mid,
            Some(_) => lo = mid + 1,
            // incomparable: look for a comparable neighbour to decide
            None => match (lo..mid)
                .rev()
                .find_map(|i| lookup_cmp(&values[i], key, calendar, locale).map(|o| (i, o)))
            {
                Some((i, Ordering::Greater)) => hi = i,
                Some(_) => lo = mid + 1,
                None => lo = mid + 1,
            },
        }
    }
    // walk back over incomparable values to the candidate
    (0..lo).rev().find(|&i| {
        matches!(
            lookup_cmp(&values[i], key, calendar, locale),
            Some(Ordering::Less | Ordering::Equal)
        )
    })
}

/// Index of the smallest value not less than `key`, assuming `values`
/// descends.
pub fn descending_position(
    values: &[LiteralValue],
    key: &LiteralValue,
    calendar: Calendar,
    locale: &Locale,
) -> Option<usize> {
    let mut best = None;
    for (i, v) in values.iter().enumerate() {
        match lookup_cmp(v, key, calendar, locale) {
            Some(Ordering::Equal) => return Some(i),
            Some(Ordering::Greater) => best = Some(i),
            Some(Ordering::Less) => break,
            None => {}
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: f64) -> LiteralValue {
        LiteralValue::Number(v)
    }

    fn t(s: &str) -> LiteralValue {
        LiteralValue::Text(s.into())
    }

    const CAL: Calendar = Calendar::Windows1900;

    #[test]
    fn kinds_do_not_mix() {
        let loc = Locale::invariant();
        assert_eq!(lookup_cmp(&n(1.0), &t("1"), CAL, &loc), None);
        assert_eq!(lookup_cmp(&t("Apple"), &t("apple"), CAL, &loc), Some(Ordering::Equal));
        assert_eq!(lookup_cmp(&LiteralValue::Empty, &n(0.0), CAL, &loc), None);
        assert_eq!(
            lookup_cmp(&LiteralValue::Boolean(false), &LiteralValue::Boolean(true), CAL, &loc),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn approximate_on_sorted_and_unsorted_data() {
        let loc = Locale::invariant();
        let sorted = [n(1.0), n(3.0), n(5.0), n(7.0)];
        assert_eq!(approximate_position(&sorted, &n(6.0), CAL, &loc), Some(2));
        assert_eq!(approximate_position(&sorted, &n(7.0), CAL, &loc), Some(3));
        assert_eq!(approximate_position(&sorted, &n(99.0), CAL, &loc), Some(3));
        assert_eq!(approximate_position(&sorted, &n(0.5), CAL, &loc), None);

        let mixed = [n(1.0), t("x"), LiteralValue::Empty, n(5.0)];
        assert_eq!(approximate_position(&mixed, &n(4.0), CAL, &loc), Some(0));
        assert_eq!(approximate_position(&mixed, &n(5.0), CAL, &loc), Some(3));

        let unsorted = [n(9.0), n(2.0), n(7.0), n(1.0), n(4.0)];
        let hit = approximate_position(&unsorted, &n(3.0), CAL, &loc);
        assert!(hit.is_none_or(|i| i < unsorted.len()));
        assert_eq!(approximate_position(&[], &n(3.0), CAL, &loc), None);
    }

    #[test]
    fn descending() {
        let loc = Locale::invariant();
        let values = [n(9.0), n(7.0), n(4.0), n(1.0)];
        assert_eq!(descending_position(&values, &n(5.0), CAL, &loc), Some(1));
        assert_eq!(descending_position(&values, &n(4.0), CAL, &loc), Some(2));
        assert_eq!(descending_position(&values, &n(10.0), CAL, &loc), None);
    }
}

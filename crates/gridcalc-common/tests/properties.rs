use gridcalc_common::{
    Calendar, MAX_COLS, column_reverse_sort, column_sort, column_to_letters, excel_to_native,
    letters_to_column_index, native_to_excel,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn column_index_round_trip(col in 1u32..=MAX_COLS) {
        let letters = column_to_letters(col);
        prop_assert_eq!(letters_to_column_index(&letters), Some(col));
        prop_assert_eq!(column_to_letters(letters_to_column_index(&letters).unwrap()), letters);
    }

    #[test]
    fn lowercase_letters_resolve_to_same_column(col in 1u32..=MAX_COLS) {
        let letters = column_to_letters(col);
        prop_assert_eq!(letters_to_column_index(&letters.to_ascii_lowercase()), Some(col));
    }

    #[test]
    fn column_sort_agrees_with_index(a in 1u32..=MAX_COLS, b in 1u32..=MAX_COLS) {
        let (la, lb) = (column_to_letters(a), column_to_letters(b));
        prop_assert_eq!(column_sort(&la, &lb), a.cmp(&b));
    }

    #[test]
    fn reverse_sort_is_exact_inverse(cols in prop::collection::vec(1u32..=MAX_COLS, 0..40)) {
        let labels: Vec<String> = cols.iter().map(|c| column_to_letters(*c)).collect();
        let mut asc = labels.clone();
        asc.sort_by(|a, b| column_sort(a, b));
        let mut desc = labels;
        desc.sort_by(|a, b| column_reverse_sort(a, b));
        desc.reverse();
        prop_assert_eq!(asc, desc);
    }

    #[test]
    fn serial_round_trip_1900(days in 1i64..2_958_465, secs in 0i64..86_400) {
        prop_assume!(days != 60);
        let serial = days as f64 + secs as f64 / 86_400.0;
        let native = excel_to_native(serial, Calendar::Windows1900).unwrap();
        let back = native_to_excel(&native, Calendar::Windows1900);
        prop_assert!((back - serial).abs() < 1e-9, "{serial} -> {native} -> {back}");
    }

    #[test]
    fn serial_round_trip_1904(days in 0i64..2_957_003, secs in 0i64..86_400) {
        let serial = days as f64 + secs as f64 / 86_400.0;
        let native = excel_to_native(serial, Calendar::Mac1904).unwrap();
        let back = native_to_excel(&native, Calendar::Mac1904);
        prop_assert!((back - serial).abs() < 1e-9, "{serial} -> {native} -> {back}");
    }
}

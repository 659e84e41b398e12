use gridcalc_common::{Calendar, LiteralValue};
use proptest::prelude::*;

use crate::test_workbook::TestWorkbook;

fn eval_number(wb: &TestWorkbook, formula: &str) -> f64 {
    match wb.eval(formula) {
        LiteralValue::Number(n) => n,
        other => panic!("{formula} gave {other:?}"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn calendars_differ_by_a_constant(year in 1905i64..9999, month in 1i64..=12, day in 1i64..=28) {
        let formula = format!("=DATE({year},{month},{day})");
        let windows = TestWorkbook::new();
        let mut mac = TestWorkbook::new();
        mac.config_mut().calendar = Calendar::Mac1904;
        prop_assert_eq!(eval_number(&windows, &formula) - eval_number(&mac, &formula), 1462.0);
    }

    #[test]
    fn consecutive_days_are_consecutive_serials(year in 1901i64..9999, month in 1i64..=12, day in 1i64..=27) {
        let wb = TestWorkbook::new();
        let a = eval_number(&wb, &format!("=DATE({year},{month},{day})"));
        let b = eval_number(&wb, &format!("=DATE({year},{month},{})", day + 1));
        prop_assert_eq!(b - a, 1.0);
    }

    #[test]
    fn integer_comparison_matches_rust(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
        let wb = TestWorkbook::new();
        prop_assert_eq!(wb.eval(&format!("=({a})<({b})")), LiteralValue::Boolean(a < b));
        prop_assert_eq!(wb.eval(&format!("=({a})=({b})")), LiteralValue::Boolean(a == b));
    }
}

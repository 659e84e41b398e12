//! Circular references resolve to #REF! without recursing forever.
use super::common::{engine_with, eval, n, ref_error};

#[test]
fn test_self_reference() {
    let engine = engine_with(&[("A1", "=A1+1")]);
    assert_eq!(eval(&engine, "A1"), ref_error());
}

#[test]
fn test_two_node_cycle() {
    let engine = engine_with(&[("A1", "=B1"), ("B1", "=A1")]);
    assert_eq!(eval(&engine, "A1"), ref_error());
    assert_eq!(eval(&engine, "B1"), ref_error());
}

#[test]
fn test_three_node_cycle_and_downstream_reader() {
    let engine = engine_with(&[
        ("A1", "=B1+1"),
        ("B1", "=C1+1"),
        ("C1", "=A1+1"),
        ("D1", "=A1*2"),
        ("E1", "=IFERROR(D1, 42)"),
    ]);
    for cell in ["A1", "B1", "C1", "D1"] {
        assert_eq!(eval(&engine, cell), ref_error(), "{cell}");
    }
    assert_eq!(eval(&engine, "E1"), n(42.0));
}

#[test]
fn test_reentered_cell_is_pinned_even_when_error_is_swallowed() {
    // B1 sees #REF! for A1; A1 would turn that into 7 but stays pinned
    let engine = engine_with(&[("A1", "=IFERROR(B1, 7)"), ("B1", "=A1")]);
    assert_eq!(eval(&engine, "A1"), ref_error());
    assert_eq!(eval(&engine, "B1"), ref_error());
}

#[test]
fn test_cycle_through_range() {
    let engine = engine_with(&[("A1", "1"), ("A2", "2"), ("A3", "=SUM(A1:A3)")]);
    assert_eq!(eval(&engine, "A3"), ref_error());
}

#[test]
fn test_diamond_is_not_a_cycle() {
    let engine = engine_with(&[
        ("A1", "=B1+C1"),
        ("B1", "=D1"),
        ("C1", "=D1*10"),
        ("D1", "2"),
    ]);
    let summary = engine.evaluate_all().unwrap();
    assert_eq!(summary.cycle_errors, 0);
    assert_eq!(summary.evaluated, 3);
    assert_eq!(eval(&engine, "A1"), n(22.0));
}

#[test]
fn test_deep_chain_does_not_overflow() {
    const DEPTH: u32 = 10_000;
    let mut engine = engine_with(&[]);
    engine
        .set_cell_value("Sheet1", DEPTH, 1, n(1.0))
        .unwrap();
    // entered bottom-up so each edit only touches its own cell
    for row in (1..DEPTH).rev() {
        engine
            .set_cell_formula("Sheet1", row, 1, &format!("=A{}+1", row + 1))
            .unwrap();
    }
    assert_eq!(engine.evaluate_cell("Sheet1", 1, 1).unwrap(), n(DEPTH as f64));
}

#[test]
fn test_long_cycle_does_not_overflow() {
    const LEN: u32 = 5_000;
    let mut engine = engine_with(&[]);
    engine
        .set_cell_formula("Sheet1", LEN, 1, "=A1")
        .unwrap();
    for row in (1..LEN).rev() {
        engine
            .set_cell_formula("Sheet1", row, 1, &format!("=A{}", row + 1))
            .unwrap();
    }
    let summary = engine.evaluate_all().unwrap();
    assert_eq!(summary.evaluated, LEN as usize);
    assert_eq!(summary.cycle_errors, 1);
    assert_eq!(engine.evaluate_cell("Sheet1", 1, 1).unwrap(), ref_error());
    assert_eq!(engine.evaluate_cell("Sheet1", LEN / 2, 1).unwrap(), ref_error());
}

#[test]
fn test_breaking_the_cycle_recovers() {
    let mut engine = engine_with(&[("A1", "=B1"), ("B1", "=A1")]);
    assert_eq!(eval(&engine, "A1"), ref_error());
    super::common::set(&mut engine, "B1", "5");
    assert_eq!(eval(&engine, "A1"), n(5.0));
}

//! Constant folding: binary operators over two numeric literals collapse
//! to a single numeric literal under IEEE-754 semantics. NaN and Infinity
//! results are ordinary literals here, not errors.

use crate::ast::{navigate, BinaryOp, Node};
use crate::select::{compiled, QueryError};

/// Fold every foldable binary node, bottom-up so chains collapse in one
/// application. Returns the number of folds performed.
pub fn fold_constants(tree: &mut Node) -> Result<usize, QueryError> {
    let candidate = compiled("Binary[left.kind=Number][right.kind=Number]")?;
    let mut folds = 0;

    navigate::rewrite_post(tree, &mut |node| {
        if !candidate.matches(node) {
            return;
        }
        let (op, lhs, rhs) = match &*node {
            Node::Binary { op, left, right } => {
                match (left.as_ref(), right.as_ref()) {
                    (Node::Number { value: lhs }, Node::Number { value: rhs }) => {
                        (*op, *lhs, *rhs)
                    }
                    _ => return,
                }
            }
            _ => return,
        };
        // Comparison and logical operators yield booleans and are left to
        // the idiom passes; only number-valued operators fold here.
        if let Some(value) = fold_numeric(op, lhs, rhs) {
            *node = Node::Number { value };
            folds += 1;
        }
    });

    Ok(folds)
}

fn fold_numeric(op: BinaryOp, lhs: f64, rhs: f64) -> Option<f64> {
    let value = match op {
        BinaryOp::Add => lhs + rhs,
        BinaryOp::Sub => lhs - rhs,
        BinaryOp::Mul => lhs * rhs,
        BinaryOp::Div => lhs / rhs,
        BinaryOp::Mod => lhs % rhs,
        BinaryOp::Exp => lhs.powf(rhs),
        BinaryOp::BitAnd => (js_int32(lhs) & js_int32(rhs)) as f64,
        BinaryOp::BitOr => (js_int32(lhs) | js_int32(rhs)) as f64,
        BinaryOp::BitXor => (js_int32(lhs) ^ js_int32(rhs)) as f64,
        BinaryOp::Shl => (js_int32(lhs) << (js_uint32(rhs) & 31)) as f64,
        BinaryOp::Shr => (js_int32(lhs) >> (js_uint32(rhs) & 31)) as f64,
        BinaryOp::UShr => (js_uint32(lhs) >> (js_uint32(rhs) & 31)) as f64,
        _ => return None,
    };
    Some(value)
}

fn js_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    n as i64 as u32 as i32
}

fn js_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n as i64 as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::print_script;
    use crate::parse_source_silent;

    fn fold(source: &str) -> String {
        let mut tree = parse_source_silent(source).expect("parse errors");
        fold_constants(&mut tree).unwrap();
        print_script(&tree)
    }

    #[test]
    fn test_subtraction_of_large_literals() {
        assert_eq!(fold("x = 12345678 - 12345677;"), "x = 1;\n");
    }

    #[test]
    fn test_chain_collapses_in_one_run() {
        assert_eq!(fold("x = 1 + 2 + 3;"), "x = 6;\n");
    }

    #[test]
    fn test_division_by_zero_propagates_infinity() {
        assert_eq!(fold("x = 1 / 0;"), "x = Infinity;\n");
        assert_eq!(fold("x = 0 / 0;"), "x = NaN;\n");
    }

    #[test]
    fn test_bitwise_uses_int32_semantics() {
        assert_eq!(fold("x = 5 & 3;"), "x = 1;\n");
        // 0 - 1 folds first, then the shift sees two numeric literals
        assert_eq!(fold("x = 0 - 1 >>> 0;"), "x = 4294967295;\n");
    }

    #[test]
    fn test_non_literal_operand_left_alone() {
        assert_eq!(fold("x = a + 2;"), "x = a + 2;\n");
    }

    #[test]
    fn test_comparisons_not_folded() {
        assert_eq!(fold("x = 1 < 2;"), "x = 1 < 2;\n");
    }

    #[test]
    fn test_idempotent() {
        let once = fold("x = 40 + 2;");
        let mut tree = parse_source_silent(&once).unwrap();
        let folds = fold_constants(&mut tree).unwrap();
        assert_eq!(folds, 0);
        assert_eq!(print_script(&tree), once);
    }
}

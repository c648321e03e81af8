//! Obfuscation-idiom normalization: small syntactic disguises the
//! obfuscator leaves behind, each collapsed back to the plain form.

use crate::ast::{navigate, BinaryOp, Node, UnaryOp};
use crate::format::escape_template_raw;
use crate::lexeme::Lexeme;
use crate::select::{compiled, QueryError};

/// `!![]` (double negation of an empty array) is always `true`.
pub fn squish_boolean_literals(tree: &mut Node) -> Result<usize, QueryError> {
    let candidate = compiled("Unary[op=\"!\"][operand.op=\"!\"]")?;
    let mut rewrites = 0;

    navigate::rewrite_pre(tree, &mut |node| {
        if !candidate.matches(node) {
            return;
        }
        let is_shape = match &*node {
            Node::Unary {
                op: UnaryOp::Not,
                operand,
            } => match operand.as_ref() {
                Node::Unary {
                    op: UnaryOp::Not,
                    operand: inner,
                } => matches!(inner.as_ref(), Node::Array { elements } if elements.is_empty()),
                _ => false,
            },
            _ => false,
        };
        if is_shape {
            *node = Node::boolean(true);
            rewrites += 1;
        }
    });
    Ok(rewrites)
}

/// `NaN === NaN` is `false` — equality is non-reflexive for the one value
/// the obfuscator exploits. Only the `NaN` identifier qualifies; ordinary
/// self-comparisons stay untouched.
pub fn fold_nan_compares(tree: &mut Node) -> Result<usize, QueryError> {
    let candidate =
        compiled("Binary[op=\"===\"][left.name=\"NaN\"][right.name=\"NaN\"]")?;
    let mut rewrites = 0;

    navigate::rewrite_pre(tree, &mut |node| {
        if !candidate.matches(node) {
            return;
        }
        if matches!(
            node,
            Node::Binary {
                op: BinaryOp::StrictEq,
                ..
            }
        ) {
            *node = Node::boolean(false);
            rewrites += 1;
        }
    });
    Ok(rewrites)
}

/// Merge interpolated string literals into the surrounding template text:
/// `` `a${"b"}c` `` becomes `` `abc` ``, repeated until no literal
/// interpolation remains. The concatenated text is preserved exactly.
pub fn squish_templates(tree: &mut Node) -> Result<usize, QueryError> {
    let candidate = compiled("Template")?;
    let mut rewrites = 0;

    navigate::rewrite_pre(tree, &mut |node| {
        if !candidate.matches(node) {
            return;
        }
        if let Node::Template { elements } = node {
            rewrites += squish_elements(elements);
        }
    });
    Ok(rewrites)
}

fn squish_elements(elements: &mut Vec<Node>) -> usize {
    let mut merges = 0;
    loop {
        let Some(i) = elements
            .iter()
            .position(|e| matches!(e, Node::Str { .. }))
        else {
            break;
        };
        // Interpolations always sit between two text segments
        let neighbors_ok = i > 0
            && i + 1 < elements.len()
            && matches!(&elements[i - 1], Node::TemplateElement { .. })
            && matches!(&elements[i + 1], Node::TemplateElement { .. });
        if !neighbors_ok {
            break;
        }

        let Node::Str { value } = elements.remove(i) else {
            unreachable!();
        };
        let Node::TemplateElement { raw: tail } = elements.remove(i) else {
            unreachable!();
        };
        if let Node::TemplateElement { raw } = &mut elements[i - 1] {
            raw.push_str(&escape_template_raw(&value));
            raw.push_str(&tail);
        }
        merges += 1;
    }
    merges
}

/// A block whose only statement is a counted loop adds nothing; replace it
/// with the loop. Bottom-up, so nested wrappers collapse in one run.
pub fn strip_dead_wrappers(tree: &mut Node) -> Result<usize, QueryError> {
    let candidate = compiled("Block[body.length=1][body.0.kind=For]")?;
    let mut rewrites = 0;

    navigate::rewrite_post(tree, &mut |node| {
        if !candidate.matches(node) {
            return;
        }
        if let Node::Block { body } = node {
            let inner = body.remove(0);
            *node = inner;
            rewrites += 1;
        }
    });
    Ok(rewrites)
}

/// `obj["name"]` reads better as `obj.name` whenever the key is a valid
/// identifier (the shape string decoding leaves behind everywhere).
pub fn computed_to_static(tree: &mut Node) -> Result<usize, QueryError> {
    let candidate = compiled("ComputedMember[property.kind=Str]")?;
    let mut rewrites = 0;

    navigate::rewrite_pre(tree, &mut |node| {
        if !candidate.matches(node) {
            return;
        }
        let Node::ComputedMember { object, property } = node else {
            return;
        };
        let Node::Str { value } = property.as_ref() else {
            return;
        };
        if !is_identifier_name(value) {
            return;
        }
        let property = value.clone();
        let object = std::mem::take(object);
        *node = Node::StaticMember { object, property };
        rewrites += 1;
    });
    Ok(rewrites)
}

/// Whether a string can be written as a static member name.
fn is_identifier_name(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return false;
    }
    // A reserved word would not survive a re-parse as a member name
    Lexeme::from_keyword(s).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::print_script;
    use crate::parse_source_silent;

    fn apply(source: &str, pass: fn(&mut Node) -> Result<usize, QueryError>) -> String {
        let mut tree = parse_source_silent(source).expect("parse errors");
        pass(&mut tree).unwrap();
        print_script(&tree)
    }

    #[test]
    fn test_double_negated_empty_array() {
        assert_eq!(apply("x = !![];", squish_boolean_literals), "x = true;\n");
    }

    #[test]
    fn test_non_empty_array_untouched() {
        assert_eq!(apply("x = !![1];", squish_boolean_literals), "x = !![1];\n");
    }

    #[test]
    fn test_nan_strict_equality() {
        assert_eq!(apply("x = NaN === NaN;", fold_nan_compares), "x = false;\n");
    }

    #[test]
    fn test_ordinary_self_comparison_untouched() {
        assert_eq!(apply("x = y === y;", fold_nan_compares), "x = y === y;\n");
        assert_eq!(apply("x = NaN == NaN;", fold_nan_compares), "x = NaN == NaN;\n");
    }

    #[test]
    fn test_template_literal_merge() {
        assert_eq!(
            apply("x = `a${\"mid\"}b${z}c`;", squish_templates),
            "x = `amidb${z}c`;\n"
        );
    }

    #[test]
    fn test_template_fully_literal() {
        assert_eq!(apply("x = `a${\"b\"}c`;", squish_templates), "x = `abc`;\n");
    }

    #[test]
    fn test_template_merge_escapes_specials() {
        // The merged text must re-escape characters special inside templates
        assert_eq!(
            apply("x = `a${\"`\"}b`;", squish_templates),
            "x = `a\\`b`;\n"
        );
    }

    #[test]
    fn test_dead_wrapper_removed() {
        assert_eq!(
            apply("{ for (;;) f(); }", strip_dead_wrappers),
            "for (;;) f();\n"
        );
    }

    #[test]
    fn test_nested_wrappers_collapse() {
        assert_eq!(
            apply("{ { for (;;) f(); } }", strip_dead_wrappers),
            "for (;;) f();\n"
        );
    }

    #[test]
    fn test_wrapper_with_two_statements_kept() {
        let out = apply("{ for (;;) f(); g(); }", strip_dead_wrappers);
        assert_eq!(out, "{\n    for (;;) f();\n    g();\n}\n");
    }

    #[test]
    fn test_computed_to_static() {
        assert_eq!(
            apply("a[\"log\"](b[\"c0\"]);", computed_to_static),
            "a.log(b.c0);\n"
        );
    }

    #[test]
    fn test_computed_with_invalid_name_kept() {
        assert_eq!(
            apply("a[\"not-a-name\"] = a[\"0abc\"];", computed_to_static),
            "a[\"not-a-name\"] = a[\"0abc\"];\n"
        );
        assert_eq!(apply("a[\"new\"]();", computed_to_static), "a[\"new\"]();\n");
    }
}

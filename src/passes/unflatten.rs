//! Control-flow reconstruction: recognizes the three flattened encodings
//! the obfuscator emits (a state variable driving a switch dispatch inside
//! a loop) and rebuilds the structured `if`, `for`, and `do-while` they
//! replaced.
//!
//! Every assumed position is validated before rewriting; any mismatch
//! leaves the node untouched. The three shapes probe mutually exclusive
//! sentinel/layout combinations, so their relative order is irrelevant.

use super::PassOutcome;
use crate::ast::{navigate, AssignOp, DeclKind, Node};
use crate::select::{compiled, QueryError};

/// The sentinel the dispatch assigns to leave an unflattened conditional.
const IF_SENTINEL: f64 = 65535.0;
/// The sentinel marking the "test, then body, at least once" encoding.
const DO_WHILE_SENTINEL: f64 = 1.0;

/// Rebuild `if`/`else` statements from flattened conditionals.
pub fn rebuild_ifs(tree: &mut Node) -> Result<PassOutcome, QueryError> {
    run_shape_pass(tree, "if()", &|node| {
        let (state, replacement) = match_if_shape(node)?;
        Some((vec![state], replacement))
    })
}

/// Rebuild counted `for` loops from the four-slot encoding.
pub fn rebuild_fors(tree: &mut Node) -> Result<PassOutcome, QueryError> {
    run_shape_pass(tree, "for()", &|node| {
        let (state, iterator, replacement) = match_for_shape(node)?;
        Some((vec![state, iterator], replacement))
    })
}

/// Rebuild post-test `do-while` loops.
pub fn rebuild_do_whiles(tree: &mut Node) -> Result<PassOutcome, QueryError> {
    run_shape_pass(tree, "do while()", &|node| {
        let (state, replacement) = match_do_while_shape(node)?;
        Some((vec![state], replacement))
    })
}

/// Shared driver: find candidate loops, apply the shape matcher, then
/// delete the helper declarations the rewrite made dead.
fn run_shape_pass(
    tree: &mut Node,
    label: &str,
    matcher: &dyn Fn(&Node) -> Option<(Vec<String>, Node)>,
) -> Result<PassOutcome, QueryError> {
    let candidate = compiled("While")?;
    let mut outcome = PassOutcome::default();
    let mut dead_declarations: Vec<String> = Vec::new();

    navigate::rewrite_pre(tree, &mut |node| {
        if !candidate.matches(node) {
            return;
        }
        if let Some((names, replacement)) = matcher(node) {
            outcome.note(format!("Generating {} statement: {}", label, names.join(" ")));
            outcome.rewrites += 1;
            dead_declarations.extend(names);
            *node = replacement;
        }
    });

    for name in &dead_declarations {
        let selector = compiled(&format!("VarDecl[declarators.0.name=\"{}\"]", name))?;
        if !navigate::remove_first(tree, &|n| selector.matches(n)) {
            outcome.warn(format!(
                "expected declaration of '{}' was already gone",
                name
            ));
        }
    }
    Ok(outcome)
}

/// Flattened conditional: a `while` directly wrapping a switch whose
/// second branch opens by assigning the 65535 sentinel.
///
/// ```text
/// while (...) switch (s) {
///     case A: s = cond ? B : C; break;
///     case B: s = 65535; <consequent>; break;
///     case C: s = 65535; <alternate>; break;   // optional
/// }
/// ```
fn match_if_shape(node: &Node) -> Option<(String, Node)> {
    let Node::While { body, .. } = node else {
        return None;
    };
    let (state, cases) = switch_parts(body)?;
    if cases.len() < 2 {
        return None;
    }

    let dispatch = case_body(&cases[0])?;
    let branch = case_body(&cases[1])?;
    if sentinel_assignment(branch.first()?)? != IF_SENTINEL {
        return None;
    }

    let test = dispatch_test(dispatch.first()?)?.clone();
    let consequent = branch.get(1)?.clone();
    let alternate = match cases.get(2) {
        Some(case) => {
            let body = case_body(case)?;
            // The alternate sits just before the trailing break
            if body.len() < 2 {
                return None;
            }
            Some(Box::new(body[body.len() - 2].clone()))
        }
        None => None,
    };

    Some((
        state.to_string(),
        Node::If {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate,
        },
    ))
}

/// Flattened counted loop: a `while` wrapping a block whose only statement
/// is a four-branch switch with fixed positional roles.
///
/// ```text
/// while (...) {
///     switch (s) {
///         case A: s = B; i = <init>; break;
///         case B: s = <i test> ? C : EXIT; break;
///         case C: s = D; <body>; break;
///         case D: s = B; <update>; break;
///     }
/// }
/// ```
fn match_for_shape(node: &Node) -> Option<(String, String, Node)> {
    let Node::While { body, .. } = node else {
        return None;
    };
    let Node::Block { body: statements } = body.as_ref() else {
        return None;
    };
    if statements.len() != 1 {
        return None;
    }
    let (state, cases) = switch_parts(statements.first()?)?;
    if cases.len() != 4 {
        return None;
    }

    let init_branch = case_body(&cases[0])?;
    let test_branch = case_body(&cases[1])?;
    let body_branch = case_body(&cases[2])?;
    let update_branch = case_body(&cases[3])?;

    let (iterator, init_value) = iterator_assignment(init_branch.get(1)?)?;
    let test = dispatch_test(test_branch.first()?)?.clone();
    let loop_body = body_branch.get(1)?.clone();
    let update = bare_expression(update_branch.get(1)?)?.clone();

    let init = Node::VarDecl {
        kind: DeclKind::Let,
        declarators: vec![Node::Declarator {
            name: iterator.to_string(),
            init: Some(Box::new(init_value.clone())),
        }],
    };

    Some((
        state.to_string(),
        iterator.to_string(),
        Node::For {
            init: Some(Box::new(init)),
            test: Some(Box::new(test)),
            update: Some(Box::new(update)),
            body: Box::new(loop_body),
        },
    ))
}

/// Flattened post-test loop: like the conditional shape, but the second
/// branch re-arms the dispatch with sentinel 1 — test, then body, with the
/// body guaranteed to run at least once.
fn match_do_while_shape(node: &Node) -> Option<(String, Node)> {
    let Node::While { body, .. } = node else {
        return None;
    };
    let (state, cases) = switch_parts(body)?;
    if cases.len() < 2 {
        return None;
    }

    let dispatch = case_body(&cases[0])?;
    let branch = case_body(&cases[1])?;
    if sentinel_assignment(branch.first()?)? != DO_WHILE_SENTINEL {
        return None;
    }

    let test = dispatch_test(dispatch.first()?)?.clone();
    let loop_body = branch.get(1)?.clone();

    Some((
        state.to_string(),
        Node::DoWhile {
            body: Box::new(loop_body),
            test: Box::new(test),
        },
    ))
}

// --- Structural accessors, each validating one assumed position ---

/// A switch dispatching on a plain identifier: its name and cases.
fn switch_parts(node: &Node) -> Option<(&str, &[Node])> {
    let Node::Switch {
        discriminant,
        cases,
    } = node
    else {
        return None;
    };
    let Node::Ident { name } = discriminant.as_ref() else {
        return None;
    };
    Some((name, cases))
}

fn case_body(case: &Node) -> Option<&[Node]> {
    match case {
        Node::SwitchCase { body, .. } => Some(body),
        _ => None,
    }
}

/// `state = <number>;` — the sentinel a branch assigns.
fn sentinel_assignment(stmt: &Node) -> Option<f64> {
    let Node::ExprStmt { expr } = stmt else {
        return None;
    };
    let Node::Assign {
        op: AssignOp::Assign,
        value,
        ..
    } = expr.as_ref()
    else {
        return None;
    };
    match value.as_ref() {
        Node::Number { value } => Some(*value),
        _ => None,
    }
}

/// `state = cond ? a : b;` — the condition driving a dispatch branch.
fn dispatch_test(stmt: &Node) -> Option<&Node> {
    let Node::ExprStmt { expr } = stmt else {
        return None;
    };
    let Node::Assign {
        op: AssignOp::Assign,
        value,
        ..
    } = expr.as_ref()
    else {
        return None;
    };
    match value.as_ref() {
        Node::Conditional { test, .. } => Some(test),
        _ => None,
    }
}

/// `name = <expr>;` — the iterator initialization slot.
fn iterator_assignment(stmt: &Node) -> Option<(&str, &Node)> {
    let Node::ExprStmt { expr } = stmt else {
        return None;
    };
    let Node::Assign {
        op: AssignOp::Assign,
        target,
        value,
    } = expr.as_ref()
    else {
        return None;
    };
    match target.as_ref() {
        Node::Ident { name } => Some((name, value)),
        _ => None,
    }
}

/// A bare expression statement — the increment slot.
fn bare_expression(stmt: &Node) -> Option<&Node> {
    match stmt {
        Node::ExprStmt { expr } => Some(expr),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::print_script;
    use crate::parse_source_silent;

    fn parse(source: &str) -> Node {
        parse_source_silent(source).expect("parse errors")
    }

    const FLAT_IF: &str = "\
var s = 0;
while (s != 65535) switch (s) {
    case 0:
        s = cond ? 1 : 2;
        break;
    case 1:
        s = 65535;
        { A(); }
        break;
    case 2:
        s = 65535;
        { B(); }
        break;
}";

    #[test]
    fn test_if_shape_rebuilt() {
        let mut tree = parse(FLAT_IF);
        let outcome = rebuild_ifs(&mut tree).unwrap();
        assert_eq!(outcome.rewrites, 1);
        assert!(outcome.warnings.is_empty());
        assert_eq!(
            print_script(&tree),
            "if (cond) {\n    A();\n} else {\n    B();\n}\n"
        );
    }

    #[test]
    fn test_if_shape_without_alternate() {
        let source = "\
var q = 0;
while (q != 65535) switch (q) {
    case 0:
        q = ready() ? 1 : 65535;
        break;
    case 1:
        q = 65535;
        { go(); }
        break;
}";
        let mut tree = parse(source);
        rebuild_ifs(&mut tree).unwrap();
        assert_eq!(print_script(&tree), "if (ready()) {\n    go();\n}\n");
    }

    #[test]
    fn test_for_shape_rebuilt() {
        let source = "\
var s = 0;
var i;
while (s != 65535) {
    switch (s) {
        case 0:
            s = 1;
            i = 0;
            break;
        case 1:
            s = i < 3 ? 2 : 65535;
            break;
        case 2:
            s = 3;
            { log(i); }
            break;
        case 3:
            s = 1;
            i++;
            break;
    }
}";
        let mut tree = parse(source);
        let outcome = rebuild_fors(&mut tree).unwrap();
        assert_eq!(outcome.rewrites, 1);
        assert!(outcome.warnings.is_empty());
        assert_eq!(
            print_script(&tree),
            "for (let i = 0; i < 3; i++) {\n    log(i);\n}\n"
        );
    }

    #[test]
    fn test_do_while_shape_rebuilt() {
        let source = "\
var s = 9;
while (s != 1) switch (s) {
    case 9:
        s = more() ? 9 : 1;
        break;
    case 1:
        s = 1;
        { work(); }
        break;
}";
        let mut tree = parse(source);
        let outcome = rebuild_do_whiles(&mut tree).unwrap();
        assert_eq!(outcome.rewrites, 1);
        assert_eq!(
            print_script(&tree),
            "do {\n    work();\n} while (more());\n"
        );
    }

    #[test]
    fn test_ordinary_while_untouched() {
        let source = "while (x < 10) { x++; }";
        let mut tree = parse(source);
        let before = print_script(&tree);
        let passes: [fn(&mut Node) -> Result<PassOutcome, QueryError>; 3] =
            [rebuild_ifs, rebuild_fors, rebuild_do_whiles];
        for pass in passes {
            let outcome = pass(&mut tree).unwrap();
            assert_eq!(outcome.rewrites, 0);
        }
        assert_eq!(print_script(&tree), before);
    }

    #[test]
    fn test_shapes_are_mutually_exclusive() {
        // The do-while pass must not fire on the 65535 conditional shape
        let mut tree = parse(FLAT_IF);
        let outcome = rebuild_do_whiles(&mut tree).unwrap();
        assert_eq!(outcome.rewrites, 0);
        let outcome = rebuild_fors(&mut tree).unwrap();
        assert_eq!(outcome.rewrites, 0);
    }

    #[test]
    fn test_guard_failure_is_silent_no_op() {
        // Sentinel present but the dispatch slot is not a conditional
        let source = "\
var s = 0;
while (s != 65535) switch (s) {
    case 0:
        s = 1;
        break;
    case 1:
        s = 65535;
        { A(); }
        break;
}";
        let mut tree = parse(source);
        let before = print_script(&tree);
        let outcome = rebuild_ifs(&mut tree).unwrap();
        assert_eq!(outcome.rewrites, 0);
        assert_eq!(print_script(&tree), before);
    }

    #[test]
    fn test_nested_flattened_conditionals() {
        let source = "\
var outer = 0;
while (outer != 65535) switch (outer) {
    case 0:
        outer = a ? 1 : 2;
        break;
    case 1:
        outer = 65535;
        {
            var inner = 0;
            while (inner != 65535) switch (inner) {
                case 0:
                    inner = b ? 1 : 2;
                    break;
                case 1:
                    inner = 65535;
                    { deep(); }
                    break;
            }
        }
        break;
    case 2:
        outer = 65535;
        { other(); }
        break;
}";
        let mut tree = parse(source);
        let outcome = rebuild_ifs(&mut tree).unwrap();
        assert_eq!(outcome.rewrites, 2);
        assert!(outcome.warnings.is_empty());
        let output = print_script(&tree);
        assert!(output.contains("if (a)"));
        assert!(output.contains("if (b)"));
        assert!(!output.contains("switch"));
        assert!(!output.contains("var outer"));
        assert!(!output.contains("var inner"));
    }

    #[test]
    fn test_missing_declaration_is_flagged() {
        // Same shape, but no `var s` declaration anywhere
        let source = "\
while (s != 65535) switch (s) {
    case 0:
        s = cond ? 1 : 2;
        break;
    case 1:
        s = 65535;
        { A(); }
        break;
}";
        let mut tree = parse(source);
        let outcome = rebuild_ifs(&mut tree).unwrap();
        assert_eq!(outcome.rewrites, 1);
        assert_eq!(outcome.warnings.len(), 1);
    }
}

//! Tree traversal: child enumeration in document order, preorder and
//! postorder rewriting, and statement deletion.

use super::Node;

/// Immediate children of a node, in document order.
pub fn children(node: &Node) -> Vec<&Node> {
    let mut out = Vec::new();

    fn opt<'a>(out: &mut Vec<&'a Node>, field: &'a Option<Box<Node>>) {
        if let Some(node) = field {
            out.push(node);
        }
    }

    match node {
        Node::Script { body } | Node::Block { body } => out.extend(body.iter()),
        Node::VarDecl { declarators, .. } => out.extend(declarators.iter()),
        Node::Declarator { init, .. } => opt(&mut out, init),
        Node::FuncDecl { body, .. } | Node::FuncExpr { body, .. } => out.extend(body.iter()),
        Node::ExprStmt { expr } => out.push(expr),
        Node::If {
            test,
            consequent,
            alternate,
        } => {
            out.push(test);
            out.push(consequent);
            opt(&mut out, alternate);
        }
        Node::While { test, body } => {
            out.push(test);
            out.push(body);
        }
        Node::DoWhile { body, test } => {
            out.push(body);
            out.push(test);
        }
        Node::For {
            init,
            test,
            update,
            body,
        } => {
            opt(&mut out, init);
            opt(&mut out, test);
            opt(&mut out, update);
            out.push(body);
        }
        Node::ForIn { object, body, .. } => {
            out.push(object);
            out.push(body);
        }
        Node::Switch {
            discriminant,
            cases,
        } => {
            out.push(discriminant);
            out.extend(cases.iter());
        }
        Node::SwitchCase { test, body } => {
            opt(&mut out, test);
            out.extend(body.iter());
        }
        Node::Return { argument } => opt(&mut out, argument),
        Node::Throw { argument } => out.push(argument),
        Node::Array { elements } => out.extend(elements.iter()),
        Node::Object { properties } => out.extend(properties.iter()),
        Node::Property { key, value } => {
            out.push(key);
            out.push(value);
        }
        Node::Template { elements } => out.extend(elements.iter()),
        Node::Binary { left, right, .. } => {
            out.push(left);
            out.push(right);
        }
        Node::Unary { operand, .. } | Node::Update { operand, .. } => out.push(operand),
        Node::Assign { target, value, .. } => {
            out.push(target);
            out.push(value);
        }
        Node::Conditional {
            test,
            consequent,
            alternate,
        } => {
            out.push(test);
            out.push(consequent);
            out.push(alternate);
        }
        Node::Call { callee, arguments } | Node::New { callee, arguments } => {
            out.push(callee);
            out.extend(arguments.iter());
        }
        Node::StaticMember { object, .. } => out.push(object),
        Node::ComputedMember { object, property } => {
            out.push(object);
            out.push(property);
        }
        Node::Sequence { expressions } => out.extend(expressions.iter()),
        Node::Arrow { body, .. } => out.push(body),
        Node::Break
        | Node::Continue
        | Node::Empty
        | Node::Ident { .. }
        | Node::Number { .. }
        | Node::Str { .. }
        | Node::Bool { .. }
        | Node::Null
        | Node::Regex { .. }
        | Node::TemplateElement { .. } => {}
    }

    out
}

/// Mutable counterpart of [`children`].
pub fn children_mut(node: &mut Node) -> Vec<&mut Node> {
    let mut out: Vec<&mut Node> = Vec::new();

    fn opt<'a>(out: &mut Vec<&'a mut Node>, field: &'a mut Option<Box<Node>>) {
        if let Some(node) = field {
            out.push(node);
        }
    }

    match node {
        Node::Script { body } | Node::Block { body } => out.extend(body.iter_mut()),
        Node::VarDecl { declarators, .. } => out.extend(declarators.iter_mut()),
        Node::Declarator { init, .. } => opt(&mut out, init),
        Node::FuncDecl { body, .. } | Node::FuncExpr { body, .. } => out.extend(body.iter_mut()),
        Node::ExprStmt { expr } => out.push(expr),
        Node::If {
            test,
            consequent,
            alternate,
        } => {
            out.push(test);
            out.push(consequent);
            opt(&mut out, alternate);
        }
        Node::While { test, body } => {
            out.push(test);
            out.push(body);
        }
        Node::DoWhile { body, test } => {
            out.push(body);
            out.push(test);
        }
        Node::For {
            init,
            test,
            update,
            body,
        } => {
            opt(&mut out, init);
            opt(&mut out, test);
            opt(&mut out, update);
            out.push(body);
        }
        Node::ForIn { object, body, .. } => {
            out.push(object);
            out.push(body);
        }
        Node::Switch {
            discriminant,
            cases,
        } => {
            out.push(discriminant);
            out.extend(cases.iter_mut());
        }
        Node::SwitchCase { test, body } => {
            opt(&mut out, test);
            out.extend(body.iter_mut());
        }
        Node::Return { argument } => opt(&mut out, argument),
        Node::Throw { argument } => out.push(argument),
        Node::Array { elements } => out.extend(elements.iter_mut()),
        Node::Object { properties } => out.extend(properties.iter_mut()),
        Node::Property { key, value } => {
            out.push(key);
            out.push(value);
        }
        Node::Template { elements } => out.extend(elements.iter_mut()),
        Node::Binary { left, right, .. } => {
            out.push(left);
            out.push(right);
        }
        Node::Unary { operand, .. } | Node::Update { operand, .. } => out.push(operand),
        Node::Assign { target, value, .. } => {
            out.push(target);
            out.push(value);
        }
        Node::Conditional {
            test,
            consequent,
            alternate,
        } => {
            out.push(test);
            out.push(consequent);
            out.push(alternate);
        }
        Node::Call { callee, arguments } | Node::New { callee, arguments } => {
            out.push(callee);
            out.extend(arguments.iter_mut());
        }
        Node::StaticMember { object, .. } => out.push(object),
        Node::ComputedMember { object, property } => {
            out.push(object);
            out.push(property);
        }
        Node::Sequence { expressions } => out.extend(expressions.iter_mut()),
        Node::Arrow { body, .. } => out.push(body),
        Node::Break
        | Node::Continue
        | Node::Empty
        | Node::Ident { .. }
        | Node::Number { .. }
        | Node::Str { .. }
        | Node::Bool { .. }
        | Node::Null
        | Node::Regex { .. }
        | Node::TemplateElement { .. } => {}
    }

    out
}

/// Preorder walk over the whole tree.
pub fn walk<'a>(node: &'a Node, f: &mut impl FnMut(&'a Node)) {
    f(node);
    for child in children(node) {
        walk(child, f);
    }
}

/// Preorder rewrite: `f` sees each node before its children, so a rewrite
/// installed by `f` is itself traversed afterwards. This is what lets one
/// pass unflatten loops nested inside other flattened loops.
pub fn rewrite_pre(node: &mut Node, f: &mut impl FnMut(&mut Node)) {
    f(node);
    for child in children_mut(node) {
        rewrite_pre(child, f);
    }
}

/// Postorder rewrite: children first, so nested rewrites (e.g. constant
/// folding of `1 + 2 + 3`) collapse in a single application.
pub fn rewrite_post(node: &mut Node, f: &mut impl FnMut(&mut Node)) {
    for child in children_mut(node) {
        rewrite_post(child, f);
    }
    f(node);
}

/// Delete the first statement (in document order) matching `pred`.
/// Deletion removes the element from its parent's statement list, so no
/// dangling child slot is left behind. Returns whether anything was removed.
pub fn remove_first(node: &mut Node, pred: &impl Fn(&Node) -> bool) -> bool {
    match node {
        Node::Script { body }
        | Node::Block { body }
        | Node::FuncDecl { body, .. }
        | Node::FuncExpr { body, .. } => remove_from_list(body, pred),
        Node::SwitchCase { test, body } => {
            if let Some(test) = test {
                if remove_first(test, pred) {
                    return true;
                }
            }
            remove_from_list(body, pred)
        }
        _ => {
            for child in children_mut(node) {
                if remove_first(child, pred) {
                    return true;
                }
            }
            false
        }
    }
}

fn remove_from_list(list: &mut Vec<Node>, pred: &impl Fn(&Node) -> bool) -> bool {
    for i in 0..list.len() {
        if pred(&list[i]) {
            list.remove(i);
            return true;
        }
        if remove_first(&mut list[i], pred) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, NodeKind};

    fn sample() -> Node {
        Node::Script {
            body: vec![
                Node::ExprStmt {
                    expr: Box::new(Node::Binary {
                        op: BinaryOp::Add,
                        left: Box::new(Node::number(1.0)),
                        right: Box::new(Node::number(2.0)),
                    }),
                },
                Node::Empty,
            ],
        }
    }

    #[test]
    fn test_walk_preorder() {
        let tree = sample();
        let mut kinds = Vec::new();
        walk(&tree, &mut |n| kinds.push(n.kind()));
        assert_eq!(
            kinds,
            vec![
                NodeKind::Script,
                NodeKind::ExprStmt,
                NodeKind::Binary,
                NodeKind::Number,
                NodeKind::Number,
                NodeKind::Empty,
            ]
        );
    }

    #[test]
    fn test_rewrite_post_sees_children_first() {
        let mut tree = sample();
        rewrite_post(&mut tree, &mut |n| {
            if let Node::Number { value } = n {
                *value += 10.0;
            } else if let Node::Binary { left, right, .. } = n {
                // Children must already be rewritten when the parent is seen
                assert_eq!(**left, Node::number(11.0));
                assert_eq!(**right, Node::number(12.0));
            }
        });
    }

    #[test]
    fn test_remove_first_statement() {
        let mut tree = sample();
        let removed = remove_first(&mut tree, &|n| n.kind() == NodeKind::ExprStmt);
        assert!(removed);
        if let Node::Script { body } = &tree {
            assert_eq!(body.len(), 1);
            assert_eq!(body[0], Node::Empty);
        } else {
            unreachable!();
        }
        // A second attempt finds nothing
        assert!(!remove_first(&mut tree, &|n| n.kind() == NodeKind::ExprStmt));
    }
}

//! Attribute reflection over `Node`, the lookup layer selector queries
//! resolve their dotted paths against.

use super::Node;

/// The value of one named attribute of a node.
#[derive(Clone, Copy, Debug)]
pub enum AttrValue<'a> {
    Node(&'a Node),
    List(&'a [Node]),
    Str(&'a str),
    Num(f64),
    Bool(bool),
    /// The field does not exist on this kind, or an optional field is unset.
    Absent,
}

impl Node {
    /// Look up a named attribute. Unknown names yield `Absent`, never an
    /// error — passes probe optional shapes freely.
    pub fn attr<'a>(&'a self, name: &str) -> AttrValue<'a> {
        use AttrValue::{Absent, Bool, List, Node as NodeVal, Num, Str};

        fn opt(field: &Option<Box<Node>>) -> AttrValue<'_> {
            match field {
                Some(node) => AttrValue::Node(node),
                None => AttrValue::Absent,
            }
        }

        match (self, name) {
            (Node::Script { body }, "body") => List(body),
            (Node::Block { body }, "body") => List(body),
            (Node::VarDecl { declarators, .. }, "declarators") => List(declarators),
            (Node::Declarator { name, .. }, "name") => Str(name),
            (Node::Declarator { init, .. }, "init") => opt(init),
            (Node::FuncDecl { name, .. }, "name") => Str(name),
            (Node::FuncDecl { body, .. }, "body") => List(body),
            (Node::ExprStmt { expr }, "expr") => NodeVal(expr),
            (Node::If { test, .. }, "test") => NodeVal(test),
            (Node::If { consequent, .. }, "consequent") => NodeVal(consequent),
            (Node::If { alternate, .. }, "alternate") => opt(alternate),
            (Node::While { test, .. }, "test") => NodeVal(test),
            (Node::While { body, .. }, "body") => NodeVal(body),
            (Node::DoWhile { test, .. }, "test") => NodeVal(test),
            (Node::DoWhile { body, .. }, "body") => NodeVal(body),
            (Node::For { init, .. }, "init") => opt(init),
            (Node::For { test, .. }, "test") => opt(test),
            (Node::For { update, .. }, "update") => opt(update),
            (Node::For { body, .. }, "body") => NodeVal(body),
            (Node::ForIn { name, .. }, "name") => Str(name),
            (Node::ForIn { of, .. }, "of") => Bool(*of),
            (Node::ForIn { object, .. }, "object") => NodeVal(object),
            (Node::ForIn { body, .. }, "body") => NodeVal(body),
            (Node::Switch { discriminant, .. }, "discriminant") => NodeVal(discriminant),
            (Node::Switch { cases, .. }, "cases") => List(cases),
            (Node::SwitchCase { test, .. }, "test") => opt(test),
            (Node::SwitchCase { body, .. }, "body") => List(body),
            (Node::Return { argument }, "argument") => opt(argument),
            (Node::Throw { argument }, "argument") => NodeVal(argument),
            (Node::Ident { name }, "name") => Str(name),
            (Node::Number { value }, "value") => Num(*value),
            (Node::Str { value }, "value") => Str(value),
            (Node::Bool { value }, "value") => Bool(*value),
            (Node::Regex { raw }, "raw") => Str(raw),
            (Node::Array { elements }, "elements") => List(elements),
            (Node::Object { properties }, "properties") => List(properties),
            (Node::Property { key, .. }, "key") => NodeVal(key),
            (Node::Property { value, .. }, "value") => NodeVal(value),
            (Node::Template { elements }, "elements") => List(elements),
            (Node::TemplateElement { raw }, "raw") => Str(raw),
            (Node::Binary { op, .. }, "op") => Str(op.as_str()),
            (Node::Binary { left, .. }, "left") => NodeVal(left),
            (Node::Binary { right, .. }, "right") => NodeVal(right),
            (Node::Unary { op, .. }, "op") => Str(op.as_str()),
            (Node::Unary { operand, .. }, "operand") => NodeVal(operand),
            (Node::Update { op, .. }, "op") => Str(op.as_str()),
            (Node::Update { prefix, .. }, "prefix") => Bool(*prefix),
            (Node::Update { operand, .. }, "operand") => NodeVal(operand),
            (Node::Assign { op, .. }, "op") => Str(op.as_str()),
            (Node::Assign { target, .. }, "target") => NodeVal(target),
            (Node::Assign { value, .. }, "value") => NodeVal(value),
            (Node::Conditional { test, .. }, "test") => NodeVal(test),
            (Node::Conditional { consequent, .. }, "consequent") => NodeVal(consequent),
            (Node::Conditional { alternate, .. }, "alternate") => NodeVal(alternate),
            (Node::Call { callee, .. }, "callee") => NodeVal(callee),
            (Node::Call { arguments, .. }, "arguments") => List(arguments),
            (Node::New { callee, .. }, "callee") => NodeVal(callee),
            (Node::New { arguments, .. }, "arguments") => List(arguments),
            (Node::StaticMember { object, .. }, "object") => NodeVal(object),
            (Node::StaticMember { property, .. }, "property") => Str(property),
            (Node::ComputedMember { object, .. }, "object") => NodeVal(object),
            (Node::ComputedMember { property, .. }, "property") => NodeVal(property),
            (Node::Sequence { expressions }, "expressions") => List(expressions),
            (Node::FuncExpr { name, .. }, "name") => match name {
                Some(name) => Str(name),
                None => Absent,
            },
            (Node::FuncExpr { body, .. }, "body") => List(body),
            (Node::Arrow { body, .. }, "body") => NodeVal(body),
            _ => Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;

    #[test]
    fn test_attr_on_binary() {
        let node = Node::Binary {
            op: BinaryOp::Add,
            left: Box::new(Node::number(1.0)),
            right: Box::new(Node::ident("x")),
        };
        assert!(matches!(node.attr("op"), AttrValue::Str("+")));
        assert!(matches!(node.attr("left"), AttrValue::Node(_)));
        assert!(matches!(node.attr("missing"), AttrValue::Absent));
    }

    #[test]
    fn test_absent_optional_field() {
        let node = Node::Declarator {
            name: "decoders".to_string(),
            init: None,
        };
        assert!(matches!(node.attr("name"), AttrValue::Str("decoders")));
        assert!(matches!(node.attr("init"), AttrValue::Absent));
    }
}

//! Tree-to-text serialization: turns the rewritten tree back into valid
//! JavaScript. Output is deterministic; parentheses are reinserted from
//! operator precedence rather than preserved from the source.

use crate::ast::*;

const INDENT: &str = "    ";

/// Serialize a script back to JavaScript source.
pub fn print_script(script: &Node) -> String {
    let mut ctx = PrintCtx::new();
    match script {
        Node::Script { body } => {
            for stmt in body {
                ctx.emit_stmt(stmt);
            }
        }
        other => ctx.emit_stmt(other),
    }
    let mut out = ctx.output;
    while out.ends_with("\n\n") {
        out.pop();
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

// Expression precedence levels, loosest binding first.
const PREC_SEQUENCE: u8 = 0;
const PREC_ASSIGN: u8 = 1;
const PREC_OR: u8 = 2;
const PREC_AND: u8 = 3;
const PREC_BIT_OR: u8 = 4;
const PREC_BIT_XOR: u8 = 5;
const PREC_BIT_AND: u8 = 6;
const PREC_EQUALITY: u8 = 7;
const PREC_RELATIONAL: u8 = 8;
const PREC_SHIFT: u8 = 9;
const PREC_ADDITIVE: u8 = 10;
const PREC_MULTIPLICATIVE: u8 = 11;
const PREC_EXP: u8 = 12;
const PREC_UNARY: u8 = 13;
const PREC_POSTFIX: u8 = 14;
const PREC_CALL: u8 = 15;
const PREC_PRIMARY: u8 = 16;

struct PrintCtx {
    output: String,
    indent: usize,
}

impl PrintCtx {
    fn new() -> Self {
        Self {
            output: String::new(),
            indent: 0,
        }
    }

    fn line_start(&mut self) {
        for _ in 0..self.indent {
            self.output.push_str(INDENT);
        }
    }

    fn emit_stmt(&mut self, stmt: &Node) {
        self.line_start();
        self.emit_stmt_inline(stmt);
        self.output.push('\n');
    }

    /// Emit a statement without the leading indent or trailing newline.
    fn emit_stmt_inline(&mut self, stmt: &Node) {
        match stmt {
            Node::Script { body } | Node::Block { body } => {
                self.output.push_str("{\n");
                self.indent += 1;
                for inner in body {
                    self.emit_stmt(inner);
                }
                self.indent -= 1;
                self.line_start();
                self.output.push('}');
            }
            Node::VarDecl { .. } => {
                self.emit_var_decl(stmt);
                self.output.push(';');
            }
            Node::FuncDecl { name, params, body } => {
                self.output.push_str("function ");
                self.output.push_str(name);
                self.emit_param_list(params);
                self.output.push(' ');
                self.emit_brace_body(body);
            }
            Node::ExprStmt { expr } => {
                // A leading `function` or `{` would re-parse as a
                // declaration or block
                let needs_parens = starts_with_function_or_brace(expr);
                if needs_parens {
                    self.output.push('(');
                }
                self.emit_expr(expr, PREC_SEQUENCE);
                if needs_parens {
                    self.output.push(')');
                }
                self.output.push(';');
            }
            Node::If {
                test,
                consequent,
                alternate,
            } => {
                self.output.push_str("if (");
                self.emit_expr(test, PREC_SEQUENCE);
                self.output.push_str(") ");
                self.emit_substatement(consequent);
                if let Some(alternate) = alternate {
                    self.output.push_str(" else ");
                    self.emit_substatement(alternate);
                }
            }
            Node::While { test, body } => {
                self.output.push_str("while (");
                self.emit_expr(test, PREC_SEQUENCE);
                self.output.push_str(") ");
                self.emit_substatement(body);
            }
            Node::DoWhile { body, test } => {
                self.output.push_str("do ");
                self.emit_substatement(body);
                self.output.push_str(" while (");
                self.emit_expr(test, PREC_SEQUENCE);
                self.output.push_str(");");
            }
            Node::For {
                init,
                test,
                update,
                body,
            } => {
                self.output.push_str("for (");
                if let Some(init) = init {
                    match init.as_ref() {
                        decl @ Node::VarDecl { .. } => self.emit_var_decl(decl),
                        expr => self.emit_expr(expr, PREC_SEQUENCE),
                    }
                }
                self.output.push(';');
                if let Some(test) = test {
                    self.output.push(' ');
                    self.emit_expr(test, PREC_SEQUENCE);
                }
                self.output.push(';');
                if let Some(update) = update {
                    self.output.push(' ');
                    self.emit_expr(update, PREC_SEQUENCE);
                }
                self.output.push_str(") ");
                self.emit_substatement(body);
            }
            Node::ForIn {
                decl,
                name,
                of,
                object,
                body,
            } => {
                self.output.push_str("for (");
                if let Some(decl) = decl {
                    self.output.push_str(decl.as_str());
                    self.output.push(' ');
                }
                self.output.push_str(name);
                self.output.push_str(if *of { " of " } else { " in " });
                self.emit_expr(object, PREC_ASSIGN);
                self.output.push_str(") ");
                self.emit_substatement(body);
            }
            Node::Switch {
                discriminant,
                cases,
            } => {
                self.output.push_str("switch (");
                self.emit_expr(discriminant, PREC_SEQUENCE);
                self.output.push_str(") {\n");
                self.indent += 1;
                for case in cases {
                    if let Node::SwitchCase { test, body } = case {
                        self.line_start();
                        match test {
                            Some(test) => {
                                self.output.push_str("case ");
                                self.emit_expr(test, PREC_SEQUENCE);
                                self.output.push_str(":\n");
                            }
                            None => self.output.push_str("default:\n"),
                        }
                        self.indent += 1;
                        for inner in body {
                            self.emit_stmt(inner);
                        }
                        self.indent -= 1;
                    }
                }
                self.indent -= 1;
                self.line_start();
                self.output.push('}');
            }
            Node::Return { argument } => {
                self.output.push_str("return");
                if let Some(argument) = argument {
                    self.output.push(' ');
                    self.emit_expr(argument, PREC_SEQUENCE);
                }
                self.output.push(';');
            }
            Node::Break => self.output.push_str("break;"),
            Node::Continue => self.output.push_str("continue;"),
            Node::Throw { argument } => {
                self.output.push_str("throw ");
                self.emit_expr(argument, PREC_SEQUENCE);
                self.output.push(';');
            }
            Node::Empty => self.output.push(';'),
            // An expression in statement position (guarded rewrites never
            // produce this, but stay printable)
            expr => {
                self.emit_expr(expr, PREC_SEQUENCE);
                self.output.push(';');
            }
        }
    }

    /// Emit the body of an `if`/`while`/`for` arm: blocks inline, other
    /// statements on the same line.
    fn emit_substatement(&mut self, stmt: &Node) {
        self.emit_stmt_inline(stmt);
    }

    fn emit_var_decl(&mut self, decl: &Node) {
        if let Node::VarDecl { kind, declarators } = decl {
            self.output.push_str(kind.as_str());
            self.output.push(' ');
            for (i, declarator) in declarators.iter().enumerate() {
                if i > 0 {
                    self.output.push_str(", ");
                }
                if let Node::Declarator { name, init } = declarator {
                    self.output.push_str(name);
                    if let Some(init) = init {
                        self.output.push_str(" = ");
                        self.emit_expr(init, PREC_ASSIGN);
                    }
                }
            }
        }
    }

    fn emit_param_list(&mut self, params: &[String]) {
        self.output.push('(');
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.output.push_str(", ");
            }
            self.output.push_str(param);
        }
        self.output.push(')');
    }

    fn emit_brace_body(&mut self, body: &[Node]) {
        self.output.push_str("{\n");
        self.indent += 1;
        for stmt in body {
            self.emit_stmt(stmt);
        }
        self.indent -= 1;
        self.line_start();
        self.output.push('}');
    }

    fn emit_expr(&mut self, expr: &Node, min_prec: u8) {
        let prec = expr_precedence(expr);
        if prec < min_prec {
            self.output.push('(');
            self.emit_expr(expr, PREC_SEQUENCE);
            self.output.push(')');
            return;
        }

        match expr {
            Node::Ident { name } => self.output.push_str(name),
            Node::Number { value } => self.output.push_str(&js_number(*value)),
            Node::Str { value } => {
                self.output.push('"');
                self.output.push_str(&escape_string(value));
                self.output.push('"');
            }
            Node::Bool { value } => self.output.push_str(if *value { "true" } else { "false" }),
            Node::Null => self.output.push_str("null"),
            Node::Regex { raw } => self.output.push_str(raw),
            Node::Array { elements } => {
                self.output.push('[');
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.output.push_str(", ");
                    }
                    if !matches!(element, Node::Empty) {
                        self.emit_expr(element, PREC_ASSIGN);
                    }
                }
                self.output.push(']');
            }
            Node::Object { properties } => {
                if properties.is_empty() {
                    self.output.push_str("{}");
                    return;
                }
                self.output.push_str("{ ");
                for (i, property) in properties.iter().enumerate() {
                    if i > 0 {
                        self.output.push_str(", ");
                    }
                    if let Node::Property { key, value } = property {
                        self.emit_expr(key, PREC_PRIMARY);
                        self.output.push_str(": ");
                        self.emit_expr(value, PREC_ASSIGN);
                    }
                }
                self.output.push_str(" }");
            }
            Node::Template { elements } => {
                self.output.push('`');
                for element in elements {
                    match element {
                        Node::TemplateElement { raw } => self.output.push_str(raw),
                        interpolated => {
                            self.output.push_str("${");
                            self.emit_expr(interpolated, PREC_SEQUENCE);
                            self.output.push('}');
                        }
                    }
                }
                self.output.push('`');
            }
            Node::TemplateElement { raw } => self.output.push_str(raw),
            Node::Binary { op, left, right } => {
                let (left_min, right_min) = match op {
                    // Right-associative
                    BinaryOp::Exp => (prec + 1, prec),
                    _ => (prec, prec + 1),
                };
                self.emit_expr(left, left_min);
                self.output.push(' ');
                self.output.push_str(op.as_str());
                self.output.push(' ');
                self.emit_expr(right, right_min);
            }
            Node::Unary { op, operand } => {
                self.output.push_str(op.as_str());
                let needs_space = matches!(op, UnaryOp::Typeof | UnaryOp::Void | UnaryOp::Delete)
                    || adjacent_sign_clash(*op, operand);
                if needs_space {
                    self.output.push(' ');
                }
                self.emit_expr(operand, PREC_UNARY);
            }
            Node::Update {
                op,
                prefix,
                operand,
            } => {
                if *prefix {
                    self.output.push_str(op.as_str());
                    self.emit_expr(operand, PREC_UNARY);
                } else {
                    self.emit_expr(operand, PREC_POSTFIX);
                    self.output.push_str(op.as_str());
                }
            }
            Node::Assign { op, target, value } => {
                self.emit_expr(target, PREC_CALL);
                self.output.push(' ');
                self.output.push_str(op.as_str());
                self.output.push(' ');
                self.emit_expr(value, PREC_ASSIGN);
            }
            Node::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.emit_expr(test, PREC_OR);
                self.output.push_str(" ? ");
                self.emit_expr(consequent, PREC_ASSIGN);
                self.output.push_str(" : ");
                self.emit_expr(alternate, PREC_ASSIGN);
            }
            Node::Call { callee, arguments } => {
                self.emit_expr(callee, PREC_CALL);
                self.emit_argument_list(arguments);
            }
            Node::New { callee, arguments } => {
                self.output.push_str("new ");
                self.emit_expr(callee, PREC_CALL);
                self.emit_argument_list(arguments);
            }
            Node::StaticMember { object, property } => {
                self.emit_member_object(object);
                self.output.push('.');
                self.output.push_str(property);
            }
            Node::ComputedMember { object, property } => {
                self.emit_member_object(object);
                self.output.push('[');
                self.emit_expr(property, PREC_SEQUENCE);
                self.output.push(']');
            }
            Node::Sequence { expressions } => {
                for (i, inner) in expressions.iter().enumerate() {
                    if i > 0 {
                        self.output.push_str(", ");
                    }
                    self.emit_expr(inner, PREC_ASSIGN);
                }
            }
            Node::FuncExpr { name, params, body } => {
                self.output.push_str("function ");
                if let Some(name) = name {
                    self.output.push_str(name);
                }
                self.emit_param_list(params);
                self.output.push(' ');
                self.emit_brace_body(body);
            }
            Node::Arrow { params, body } => {
                self.emit_param_list(params);
                self.output.push_str(" => ");
                match body.as_ref() {
                    block @ Node::Block { .. } => self.emit_stmt_inline(block),
                    // An object literal body would re-parse as a block
                    obj @ Node::Object { .. } => {
                        self.output.push('(');
                        self.emit_expr(obj, PREC_SEQUENCE);
                        self.output.push(')');
                    }
                    expr => self.emit_expr(expr, PREC_ASSIGN),
                }
            }
            // Statement kinds never reach emit_expr through well-formed
            // trees; print something recognizable rather than panicking
            other => self.output.push_str(&format!("/* {} */", other.kind().name())),
        }
    }

    /// Member-access objects need parens around numeric literals so the
    /// dot is not read as a decimal point.
    fn emit_member_object(&mut self, object: &Node) {
        if matches!(object, Node::Number { .. }) {
            self.output.push('(');
            self.emit_expr(object, PREC_SEQUENCE);
            self.output.push(')');
        } else {
            self.emit_expr(object, PREC_CALL);
        }
    }

    fn emit_argument_list(&mut self, arguments: &[Node]) {
        self.output.push('(');
        for (i, argument) in arguments.iter().enumerate() {
            if i > 0 {
                self.output.push_str(", ");
            }
            self.emit_expr(argument, PREC_ASSIGN);
        }
        self.output.push(')');
    }
}

/// Whether the leftmost token of this expression is `function` or `{`,
/// which would re-parse as a declaration or block in statement position.
fn starts_with_function_or_brace(expr: &Node) -> bool {
    match expr {
        Node::FuncExpr { .. } | Node::Object { .. } => true,
        Node::Call { callee, .. } => starts_with_function_or_brace(callee),
        Node::StaticMember { object, .. } | Node::ComputedMember { object, .. } => {
            starts_with_function_or_brace(object)
        }
        Node::Binary { left, .. } => starts_with_function_or_brace(left),
        Node::Assign { target, .. } => starts_with_function_or_brace(target),
        Node::Conditional { test, .. } => starts_with_function_or_brace(test),
        Node::Update {
            prefix: false,
            operand,
            ..
        } => starts_with_function_or_brace(operand),
        Node::Sequence { expressions } => expressions
            .first()
            .map(starts_with_function_or_brace)
            .unwrap_or(false),
        _ => false,
    }
}

fn expr_precedence(expr: &Node) -> u8 {
    match expr {
        Node::Sequence { .. } => PREC_SEQUENCE,
        Node::Assign { .. } | Node::Conditional { .. } | Node::Arrow { .. } => PREC_ASSIGN,
        Node::Binary { op, .. } => match op {
            BinaryOp::Or => PREC_OR,
            BinaryOp::And => PREC_AND,
            BinaryOp::BitOr => PREC_BIT_OR,
            BinaryOp::BitXor => PREC_BIT_XOR,
            BinaryOp::BitAnd => PREC_BIT_AND,
            BinaryOp::EqEq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => {
                PREC_EQUALITY
            }
            BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq
            | BinaryOp::In
            | BinaryOp::Instanceof => PREC_RELATIONAL,
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => PREC_SHIFT,
            BinaryOp::Add | BinaryOp::Sub => PREC_ADDITIVE,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => PREC_MULTIPLICATIVE,
            BinaryOp::Exp => PREC_EXP,
        },
        Node::Unary { .. } => PREC_UNARY,
        Node::Update { prefix, .. } => {
            if *prefix {
                PREC_UNARY
            } else {
                PREC_POSTFIX
            }
        }
        // A negative literal prints with a leading minus, which binds like
        // a unary expression (but must still be parenthesized under `**`)
        Node::Number { value } if value.is_sign_negative() => PREC_EXP,
        Node::Call { .. }
        | Node::New { .. }
        | Node::StaticMember { .. }
        | Node::ComputedMember { .. } => PREC_CALL,
        _ => PREC_PRIMARY,
    }
}

/// Unary minus/plus followed by a same-sign operand needs a space so the
/// output does not fuse into `--`/`++`.
fn adjacent_sign_clash(op: UnaryOp, operand: &Node) -> bool {
    match (op, operand) {
        (
            UnaryOp::Neg,
            Node::Unary {
                op: UnaryOp::Neg, ..
            },
        ) => true,
        (
            UnaryOp::Neg,
            Node::Update {
                op: UpdateOp::Decr,
                prefix: true,
                ..
            },
        ) => true,
        (UnaryOp::Neg, Node::Number { value }) => value.is_sign_negative(),
        (
            UnaryOp::Plus,
            Node::Unary {
                op: UnaryOp::Plus, ..
            },
        ) => true,
        (
            UnaryOp::Plus,
            Node::Update {
                op: UpdateOp::Incr,
                prefix: true,
                ..
            },
        ) => true,
        _ => false,
    }
}

/// Format a number the way JavaScript does: integral values without a
/// decimal point, non-finite values spelled out.
pub fn js_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 9.007_199_254_740_992e15 {
        return format!("{}", value as i64);
    }
    format!("{}", value)
}

/// Escape a cooked string value for a double-quoted literal.
pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Escape a cooked string value for the raw text of a template literal.
pub fn escape_template_raw(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '`' => out.push_str("\\`"),
            '\\' => out.push_str("\\\\"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source_silent;

    fn roundtrip(source: &str) -> String {
        let tree = parse_source_silent(source).expect("parse errors");
        print_script(&tree)
    }

    #[test]
    fn test_simple_statements() {
        let out = roundtrip("var a = 1; f(a);");
        assert_eq!(out, "var a = 1;\nf(a);\n");
    }

    #[test]
    fn test_precedence_parens_reinserted() {
        let out = roundtrip("x = (a + b) * c;");
        assert_eq!(out, "x = (a + b) * c;\n");
    }

    #[test]
    fn test_no_redundant_parens() {
        let out = roundtrip("x = a + b * c;");
        assert_eq!(out, "x = a + b * c;\n");
    }

    #[test]
    fn test_if_else_blocks() {
        let out = roundtrip("if (a) { b(); } else { c(); }");
        assert_eq!(out, "if (a) {\n    b();\n} else {\n    c();\n}\n");
    }

    #[test]
    fn test_for_loop() {
        let out = roundtrip("for (let i = 0; i < 3; i++) { log(i); }");
        assert_eq!(out, "for (let i = 0; i < 3; i++) {\n    log(i);\n}\n");
    }

    #[test]
    fn test_do_while() {
        let out = roundtrip("do { a(); } while (b);");
        assert_eq!(out, "do {\n    a();\n} while (b);\n");
    }

    #[test]
    fn test_switch() {
        let out = roundtrip("switch (x) { case 1: a(); break; default: b(); }");
        assert_eq!(
            out,
            "switch (x) {\n    case 1:\n        a();\n        break;\n    default:\n        b();\n}\n"
        );
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(js_number(42.0), "42");
        assert_eq!(js_number(-1.0), "-1");
        assert_eq!(js_number(1.5), "1.5");
        assert_eq!(js_number(f64::NAN), "NaN");
        assert_eq!(js_number(f64::INFINITY), "Infinity");
        assert_eq!(js_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(js_number(-0.0), "0");
    }

    #[test]
    fn test_string_escaping() {
        let out = roundtrip("x = 'a\"b\\n';");
        assert_eq!(out, "x = \"a\\\"b\\n\";\n");
    }

    #[test]
    fn test_template_output() {
        let out = roundtrip("x = `a${b}c`;");
        assert_eq!(out, "x = `a${b}c`;\n");
    }

    #[test]
    fn test_iife_parenthesized() {
        let out = roundtrip("(function () { run(); })();");
        assert_eq!(out, "(function () {\n    run();\n}());\n");
        // The parenthesized form re-parses to the same tree
        assert_eq!(roundtrip(&out), out);
    }

    #[test]
    fn test_negative_literal_under_exponent() {
        use crate::ast::{BinaryOp, Node};
        let expr = Node::Binary {
            op: BinaryOp::Exp,
            left: Box::new(Node::number(-5.0)),
            right: Box::new(Node::number(2.0)),
        };
        let script = Node::Script {
            body: vec![Node::ExprStmt {
                expr: Box::new(expr),
            }],
        };
        assert_eq!(print_script(&script), "(-5) ** 2;\n");
    }

    #[test]
    fn test_conditional_and_sequence() {
        let out = roundtrip("s = c ? 1 : 2; a = 1, b = 2;");
        assert_eq!(out, "s = c ? 1 : 2;\na = 1, b = 2;\n");
    }
}

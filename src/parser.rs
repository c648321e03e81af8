use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

const MAX_NESTING_DEPTH: u32 = 512;

pub(crate) struct Parser {
    tokens: Vec<Spanned<Lexeme>>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    depth: u32,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Spanned<Lexeme>>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            depth: 0,
        }
    }

    pub(crate) fn parse_script(mut self) -> Result<Node, Vec<Diagnostic>> {
        let mut body = Vec::new();
        while !self.at(&Lexeme::Eof) {
            let before = self.pos;
            body.push(self.parse_statement());
            if self.pos == before {
                // Never loop in place on an unexpected token
                self.advance();
            }
        }

        if !self.diagnostics.is_empty() {
            return Err(self.diagnostics);
        }
        Ok(Node::Script { body })
    }

    // --- Statements ---

    fn parse_statement(&mut self) -> Node {
        if !self.enter_nesting() {
            return Node::Empty;
        }
        let stmt = self.parse_statement_inner();
        self.exit_nesting();
        stmt
    }

    fn parse_statement_inner(&mut self) -> Node {
        match self.peek() {
            Lexeme::Var | Lexeme::Let | Lexeme::Const => {
                let decl = self.parse_var_decl();
                self.eat(&Lexeme::Semicolon);
                decl
            }
            Lexeme::Function => self.parse_func_decl(),
            Lexeme::LBrace => self.parse_block(),
            Lexeme::If => self.parse_if(),
            Lexeme::While => self.parse_while(),
            Lexeme::Do => self.parse_do_while(),
            Lexeme::For => self.parse_for(),
            Lexeme::Switch => self.parse_switch(),
            Lexeme::Return => self.parse_return(),
            Lexeme::Break => {
                self.advance();
                self.eat(&Lexeme::Semicolon);
                Node::Break
            }
            Lexeme::Continue => {
                self.advance();
                self.eat(&Lexeme::Semicolon);
                Node::Continue
            }
            Lexeme::Throw => {
                self.advance();
                let argument = Box::new(self.parse_expr());
                self.eat(&Lexeme::Semicolon);
                Node::Throw { argument }
            }
            Lexeme::Semicolon => {
                self.advance();
                Node::Empty
            }
            _ => {
                let expr = Box::new(self.parse_expr());
                self.eat(&Lexeme::Semicolon);
                Node::ExprStmt { expr }
            }
        }
    }

    /// Parse `var/let/const name [= init], ...` without the trailing
    /// semicolon (the `for` initializer reuses this).
    fn parse_var_decl(&mut self) -> Node {
        let kind = match self.advance().node {
            Lexeme::Let => DeclKind::Let,
            Lexeme::Const => DeclKind::Const,
            _ => DeclKind::Var,
        };

        let mut declarators = Vec::new();
        loop {
            let name = self.expect_ident();
            let init = if self.eat(&Lexeme::Eq) {
                Some(Box::new(self.parse_assign()))
            } else {
                None
            };
            declarators.push(Node::Declarator { name, init });
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }

        Node::VarDecl { kind, declarators }
    }

    fn parse_func_decl(&mut self) -> Node {
        self.expect(&Lexeme::Function);
        let name = self.expect_ident();
        let params = self.parse_params();
        let body = self.parse_function_body();
        Node::FuncDecl { name, params, body }
    }

    fn parse_params(&mut self) -> Vec<String> {
        let mut params = Vec::new();
        self.expect(&Lexeme::LParen);
        while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
            params.push(self.expect_ident());
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        self.expect(&Lexeme::RParen);
        params
    }

    fn parse_function_body(&mut self) -> Vec<Node> {
        let mut body = Vec::new();
        self.expect(&Lexeme::LBrace);
        while !self.at(&Lexeme::RBrace) && !self.at(&Lexeme::Eof) {
            let before = self.pos;
            body.push(self.parse_statement());
            if self.pos == before {
                self.advance();
            }
        }
        self.expect(&Lexeme::RBrace);
        body
    }

    fn parse_block(&mut self) -> Node {
        let body = self.parse_function_body();
        Node::Block { body }
    }

    fn parse_if(&mut self) -> Node {
        self.expect(&Lexeme::If);
        self.expect(&Lexeme::LParen);
        let test = Box::new(self.parse_expr());
        self.expect(&Lexeme::RParen);
        let consequent = Box::new(self.parse_statement());
        let alternate = if self.eat(&Lexeme::Else) {
            Some(Box::new(self.parse_statement()))
        } else {
            None
        };
        Node::If {
            test,
            consequent,
            alternate,
        }
    }

    fn parse_while(&mut self) -> Node {
        self.expect(&Lexeme::While);
        self.expect(&Lexeme::LParen);
        let test = Box::new(self.parse_expr());
        self.expect(&Lexeme::RParen);
        let body = Box::new(self.parse_statement());
        Node::While { test, body }
    }

    fn parse_do_while(&mut self) -> Node {
        self.expect(&Lexeme::Do);
        let body = Box::new(self.parse_statement());
        self.expect(&Lexeme::While);
        self.expect(&Lexeme::LParen);
        let test = Box::new(self.parse_expr());
        self.expect(&Lexeme::RParen);
        self.eat(&Lexeme::Semicolon);
        Node::DoWhile { body, test }
    }

    fn parse_for(&mut self) -> Node {
        self.expect(&Lexeme::For);
        self.expect(&Lexeme::LParen);

        // for-in / for-of with a declaration: `for (var x in obj)`
        if matches!(self.peek(), Lexeme::Var | Lexeme::Let | Lexeme::Const)
            && matches!(self.peek_n(1), Lexeme::Ident(_))
            && matches!(self.peek_n(2), Lexeme::In | Lexeme::Of)
        {
            let decl = match self.advance().node {
                Lexeme::Let => DeclKind::Let,
                Lexeme::Const => DeclKind::Const,
                _ => DeclKind::Var,
            };
            return self.parse_for_in(Some(decl));
        }
        // Bare binding: `for (x in obj)`
        if matches!(self.peek(), Lexeme::Ident(_))
            && matches!(self.peek_n(1), Lexeme::In | Lexeme::Of)
        {
            return self.parse_for_in(None);
        }

        let init = if self.at(&Lexeme::Semicolon) {
            None
        } else if matches!(self.peek(), Lexeme::Var | Lexeme::Let | Lexeme::Const) {
            Some(Box::new(self.parse_var_decl()))
        } else {
            Some(Box::new(self.parse_expr()))
        };
        self.expect(&Lexeme::Semicolon);

        let test = if self.at(&Lexeme::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_expr()))
        };
        self.expect(&Lexeme::Semicolon);

        let update = if self.at(&Lexeme::RParen) {
            None
        } else {
            Some(Box::new(self.parse_expr()))
        };
        self.expect(&Lexeme::RParen);

        let body = Box::new(self.parse_statement());
        Node::For {
            init,
            test,
            update,
            body,
        }
    }

    fn parse_for_in(&mut self, decl: Option<DeclKind>) -> Node {
        let name = self.expect_ident();
        let of = match self.advance().node {
            Lexeme::Of => true,
            _ => false,
        };
        let object = Box::new(self.parse_assign());
        self.expect(&Lexeme::RParen);
        let body = Box::new(self.parse_statement());
        Node::ForIn {
            decl,
            name,
            of,
            object,
            body,
        }
    }

    fn parse_switch(&mut self) -> Node {
        self.expect(&Lexeme::Switch);
        self.expect(&Lexeme::LParen);
        let discriminant = Box::new(self.parse_expr());
        self.expect(&Lexeme::RParen);
        self.expect(&Lexeme::LBrace);

        let mut cases = Vec::new();
        while !self.at(&Lexeme::RBrace) && !self.at(&Lexeme::Eof) {
            let test = if self.eat(&Lexeme::Case) {
                let test = self.parse_expr();
                Some(Box::new(test))
            } else if self.eat(&Lexeme::Default) {
                None
            } else {
                self.error("expected 'case' or 'default' inside switch");
                break;
            };
            self.expect(&Lexeme::Colon);

            let mut body = Vec::new();
            while !matches!(
                self.peek(),
                Lexeme::Case | Lexeme::Default | Lexeme::RBrace | Lexeme::Eof
            ) {
                let before = self.pos;
                body.push(self.parse_statement());
                if self.pos == before {
                    self.advance();
                }
            }
            cases.push(Node::SwitchCase { test, body });
        }
        self.expect(&Lexeme::RBrace);

        Node::Switch {
            discriminant,
            cases,
        }
    }

    fn parse_return(&mut self) -> Node {
        self.expect(&Lexeme::Return);
        let argument = if matches!(
            self.peek(),
            Lexeme::Semicolon | Lexeme::RBrace | Lexeme::Case | Lexeme::Default | Lexeme::Eof
        ) {
            None
        } else {
            Some(Box::new(self.parse_expr()))
        };
        self.eat(&Lexeme::Semicolon);
        Node::Return { argument }
    }

    // --- Expression parsing (Pratt / precedence climbing) ---

    /// Full expression, including the comma (sequence) operator.
    fn parse_expr(&mut self) -> Node {
        let first = self.parse_assign();
        if !self.at(&Lexeme::Comma) {
            return first;
        }
        let mut expressions = vec![first];
        while self.eat(&Lexeme::Comma) {
            expressions.push(self.parse_assign());
        }
        Node::Sequence { expressions }
    }

    fn parse_assign(&mut self) -> Node {
        if !self.enter_nesting() {
            return Node::Empty;
        }
        let expr = self.parse_assign_inner();
        self.exit_nesting();
        expr
    }

    fn parse_assign_inner(&mut self) -> Node {
        if self.at_arrow_function() {
            return self.parse_arrow();
        }

        let expr = self.parse_conditional();

        let op = match self.peek() {
            Lexeme::Eq => AssignOp::Assign,
            Lexeme::PlusEq => AssignOp::Add,
            Lexeme::MinusEq => AssignOp::Sub,
            Lexeme::StarEq => AssignOp::Mul,
            Lexeme::SlashEq => AssignOp::Div,
            Lexeme::PercentEq => AssignOp::Mod,
            Lexeme::StarStarEq => AssignOp::Exp,
            Lexeme::AmpEq => AssignOp::BitAnd,
            Lexeme::PipeEq => AssignOp::BitOr,
            Lexeme::CaretEq => AssignOp::BitXor,
            Lexeme::ShlEq => AssignOp::Shl,
            Lexeme::ShrEq => AssignOp::Shr,
            Lexeme::UShrEq => AssignOp::UShr,
            _ => return expr,
        };

        if !matches!(
            expr.kind(),
            NodeKind::Ident | NodeKind::StaticMember | NodeKind::ComputedMember
        ) {
            self.error("invalid assignment target");
        }
        self.advance(); // consume operator
        let value = Box::new(self.parse_assign());
        Node::Assign {
            op,
            target: Box::new(expr),
            value,
        }
    }

    fn parse_conditional(&mut self) -> Node {
        let test = self.parse_binary_bp(0);
        if !self.eat(&Lexeme::Question) {
            return test;
        }
        let consequent = Box::new(self.parse_assign());
        self.expect(&Lexeme::Colon);
        let alternate = Box::new(self.parse_assign());
        Node::Conditional {
            test: Box::new(test),
            consequent,
            alternate,
        }
    }

    fn parse_binary_bp(&mut self, min_bp: u8) -> Node {
        let mut lhs = self.parse_unary();

        loop {
            let op = match self.peek() {
                Lexeme::PipePipe => BinaryOp::Or,
                Lexeme::AmpAmp => BinaryOp::And,
                Lexeme::Pipe => BinaryOp::BitOr,
                Lexeme::Caret => BinaryOp::BitXor,
                Lexeme::Amp => BinaryOp::BitAnd,
                Lexeme::EqEq => BinaryOp::EqEq,
                Lexeme::NotEq => BinaryOp::NotEq,
                Lexeme::EqEqEq => BinaryOp::StrictEq,
                Lexeme::NotEqEq => BinaryOp::StrictNotEq,
                Lexeme::Lt => BinaryOp::Lt,
                Lexeme::LtEq => BinaryOp::LtEq,
                Lexeme::Gt => BinaryOp::Gt,
                Lexeme::GtEq => BinaryOp::GtEq,
                Lexeme::In => BinaryOp::In,
                Lexeme::Instanceof => BinaryOp::Instanceof,
                Lexeme::Shl => BinaryOp::Shl,
                Lexeme::Shr => BinaryOp::Shr,
                Lexeme::UShr => BinaryOp::UShr,
                Lexeme::Plus => BinaryOp::Add,
                Lexeme::Minus => BinaryOp::Sub,
                Lexeme::Star => BinaryOp::Mul,
                Lexeme::Slash => BinaryOp::Div,
                Lexeme::Percent => BinaryOp::Mod,
                Lexeme::StarStar => BinaryOp::Exp,
                _ => break,
            };

            let (l_bp, r_bp) = op_binding_power(op);
            if l_bp < min_bp {
                break;
            }

            self.advance(); // consume operator
            let rhs = self.parse_binary_bp(r_bp);
            lhs = Node::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }

        lhs
    }

    fn parse_unary(&mut self) -> Node {
        let op = match self.peek() {
            Lexeme::Bang => Some(UnaryOp::Not),
            Lexeme::Minus => Some(UnaryOp::Neg),
            Lexeme::Plus => Some(UnaryOp::Plus),
            Lexeme::Tilde => Some(UnaryOp::BitNot),
            Lexeme::Typeof => Some(UnaryOp::Typeof),
            Lexeme::Void => Some(UnaryOp::Void),
            Lexeme::Delete => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = Box::new(self.parse_unary());
            return Node::Unary { op, operand };
        }

        if matches!(self.peek(), Lexeme::PlusPlus | Lexeme::MinusMinus) {
            let op = match self.advance().node {
                Lexeme::MinusMinus => UpdateOp::Decr,
                _ => UpdateOp::Incr,
            };
            let operand = Box::new(self.parse_unary());
            return Node::Update {
                op,
                prefix: true,
                operand,
            };
        }

        if self.at(&Lexeme::New) {
            return self.parse_new();
        }

        let primary = self.parse_primary();
        let expr = self.parse_postfix(primary, true);
        self.parse_postfix_update(expr)
    }

    fn parse_new(&mut self) -> Node {
        self.expect(&Lexeme::New);
        let primary = self.parse_primary();
        // Member accesses bind to the callee, calls terminate it
        let callee = Box::new(self.parse_postfix(primary, false));
        let arguments = if self.at(&Lexeme::LParen) {
            self.parse_arguments()
        } else {
            Vec::new()
        };
        let expr = self.parse_postfix(Node::New { callee, arguments }, true);
        self.parse_postfix_update(expr)
    }

    /// Parse postfix operations: `.name`, `[index]`, and (when `allow_call`)
    /// `(arguments)` chains.
    fn parse_postfix(&mut self, mut expr: Node, allow_call: bool) -> Node {
        loop {
            if self.eat(&Lexeme::Dot) {
                let property = self.expect_ident();
                expr = Node::StaticMember {
                    object: Box::new(expr),
                    property,
                };
            } else if self.at(&Lexeme::LBracket) {
                self.advance();
                let property = Box::new(self.parse_expr());
                self.expect(&Lexeme::RBracket);
                expr = Node::ComputedMember {
                    object: Box::new(expr),
                    property,
                };
            } else if allow_call && self.at(&Lexeme::LParen) {
                let arguments = self.parse_arguments();
                expr = Node::Call {
                    callee: Box::new(expr),
                    arguments,
                };
            } else {
                break;
            }
        }
        expr
    }

    fn parse_postfix_update(&mut self, expr: Node) -> Node {
        if matches!(self.peek(), Lexeme::PlusPlus | Lexeme::MinusMinus) {
            let op = match self.advance().node {
                Lexeme::MinusMinus => UpdateOp::Decr,
                _ => UpdateOp::Incr,
            };
            return Node::Update {
                op,
                prefix: false,
                operand: Box::new(expr),
            };
        }
        expr
    }

    fn parse_arguments(&mut self) -> Vec<Node> {
        let mut arguments = Vec::new();
        self.expect(&Lexeme::LParen);
        while !self.at(&Lexeme::RParen) && !self.at(&Lexeme::Eof) {
            arguments.push(self.parse_assign());
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        self.expect(&Lexeme::RParen);
        arguments
    }

    fn parse_primary(&mut self) -> Node {
        match self.peek().clone() {
            Lexeme::Number(value) => {
                self.advance();
                Node::Number { value }
            }
            Lexeme::Str(value) => {
                self.advance();
                Node::Str { value }
            }
            Lexeme::Regex(raw) => {
                self.advance();
                Node::Regex { raw }
            }
            Lexeme::Ident(name) => {
                self.advance();
                Node::Ident { name }
            }
            Lexeme::True => {
                self.advance();
                Node::Bool { value: true }
            }
            Lexeme::False => {
                self.advance();
                Node::Bool { value: false }
            }
            Lexeme::Null => {
                self.advance();
                Node::Null
            }
            Lexeme::LParen => {
                self.advance();
                let expr = self.parse_expr();
                self.expect(&Lexeme::RParen);
                expr
            }
            Lexeme::LBracket => self.parse_array(),
            Lexeme::LBrace => self.parse_object(),
            Lexeme::Function => self.parse_func_expr(),
            Lexeme::TemplateFull(_)
            | Lexeme::TemplateHead(_) => self.parse_template(),
            other => {
                self.error(&format!("expected expression, found {}", other.description()));
                Node::Empty
            }
        }
    }

    fn parse_array(&mut self) -> Node {
        self.expect(&Lexeme::LBracket);
        let mut elements = Vec::new();
        while !self.at(&Lexeme::RBracket) && !self.at(&Lexeme::Eof) {
            if self.at(&Lexeme::Comma) {
                // Elision hole
                self.advance();
                elements.push(Node::Empty);
                continue;
            }
            elements.push(self.parse_assign());
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        self.expect(&Lexeme::RBracket);
        Node::Array { elements }
    }

    fn parse_object(&mut self) -> Node {
        self.expect(&Lexeme::LBrace);
        let mut properties = Vec::new();
        while !self.at(&Lexeme::RBrace) && !self.at(&Lexeme::Eof) {
            let key = match self.peek().clone() {
                Lexeme::Ident(name) => {
                    self.advance();
                    Node::Ident { name }
                }
                Lexeme::Str(value) => {
                    self.advance();
                    Node::Str { value }
                }
                Lexeme::Number(value) => {
                    self.advance();
                    Node::Number { value }
                }
                other => {
                    self.error(&format!(
                        "expected property key, found {}",
                        other.description()
                    ));
                    break;
                }
            };

            let value = if self.eat(&Lexeme::Colon) {
                self.parse_assign()
            } else {
                // Shorthand `{ name }`
                key.clone()
            };
            properties.push(Node::Property {
                key: Box::new(key),
                value: Box::new(value),
            });

            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        self.expect(&Lexeme::RBrace);
        Node::Object { properties }
    }

    fn parse_func_expr(&mut self) -> Node {
        self.expect(&Lexeme::Function);
        let name = match self.peek() {
            Lexeme::Ident(_) => Some(self.expect_ident()),
            _ => None,
        };
        let params = self.parse_params();
        let body = self.parse_function_body();
        Node::FuncExpr { name, params, body }
    }

    fn parse_template(&mut self) -> Node {
        let mut elements = Vec::new();
        match self.advance().node {
            Lexeme::TemplateFull(raw) => {
                elements.push(Node::TemplateElement { raw });
                return Node::Template { elements };
            }
            Lexeme::TemplateHead(raw) => {
                elements.push(Node::TemplateElement { raw });
            }
            _ => unreachable!("parse_template called off a template token"),
        }

        loop {
            elements.push(self.parse_expr());
            match self.advance().node {
                Lexeme::TemplateMiddle(raw) => {
                    elements.push(Node::TemplateElement { raw });
                }
                Lexeme::TemplateTail(raw) => {
                    elements.push(Node::TemplateElement { raw });
                    break;
                }
                other => {
                    self.error(&format!(
                        "expected template continuation, found {}",
                        other.description()
                    ));
                    elements.push(Node::TemplateElement { raw: String::new() });
                    break;
                }
            }
        }

        Node::Template { elements }
    }

    /// Whether the upcoming tokens form an arrow function: `x =>` or
    /// `(a, b) =>`. Decided by scanning ahead to the matching paren.
    fn at_arrow_function(&self) -> bool {
        match self.peek() {
            Lexeme::Ident(_) => *self.peek_n(1) == Lexeme::FatArrow,
            Lexeme::LParen => {
                let mut depth = 0usize;
                let mut i = self.pos;
                while i < self.tokens.len() {
                    match self.tokens[i].node {
                        Lexeme::LParen => depth += 1,
                        Lexeme::RParen => {
                            depth -= 1;
                            if depth == 0 {
                                return self
                                    .tokens
                                    .get(i + 1)
                                    .map(|t| t.node == Lexeme::FatArrow)
                                    .unwrap_or(false);
                            }
                        }
                        Lexeme::Eof => return false,
                        _ => {}
                    }
                    i += 1;
                }
                false
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> Node {
        let mut params = Vec::new();
        if self.at(&Lexeme::LParen) {
            params = self.parse_params();
        } else {
            params.push(self.expect_ident());
        }
        self.expect(&Lexeme::FatArrow);

        let body = if self.at(&Lexeme::LBrace) {
            self.parse_block()
        } else {
            self.parse_assign()
        };
        Node::Arrow {
            params,
            body: Box::new(body),
        }
    }

    // --- Token helpers ---

    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos].node
    }

    fn peek_n(&self, offset: usize) -> &Lexeme {
        static EOF: Lexeme = Lexeme::Eof;
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.node)
            .unwrap_or(&EOF)
    }

    fn at(&self, lexeme: &Lexeme) -> bool {
        self.peek() == lexeme
    }

    fn advance(&mut self) -> Spanned<Lexeme> {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, lexeme: &Lexeme) -> bool {
        if self.at(lexeme) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, lexeme: &Lexeme) {
        if !self.eat(lexeme) {
            let found = self.peek().description();
            self.error(&format!("expected {}, found {}", lexeme.description(), found));
        }
    }

    fn expect_ident(&mut self) -> String {
        if let Lexeme::Ident(name) = self.peek().clone() {
            self.advance();
            name
        } else {
            let found = self.peek().description();
            self.error(&format!("expected identifier, found {}", found));
            String::from("<error>")
        }
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn error(&mut self, message: &str) {
        self.diagnostics
            .push(Diagnostic::error(message.to_string(), self.current_span()));
    }

    fn enter_nesting(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.error("nesting depth exceeded (maximum 512 levels)");
            return false;
        }
        true
    }

    fn exit_nesting(&mut self) {
        self.depth -= 1;
    }
}

/// Higher binding power = higher precedence; left/right pair encodes
/// associativity (`**` is right-associative).
fn op_binding_power(op: BinaryOp) -> (u8, u8) {
    match op {
        BinaryOp::Or => (1, 2),
        BinaryOp::And => (3, 4),
        BinaryOp::BitOr => (5, 6),
        BinaryOp::BitXor => (7, 8),
        BinaryOp::BitAnd => (9, 10),
        BinaryOp::EqEq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => (11, 12),
        BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq
        | BinaryOp::In
        | BinaryOp::Instanceof => (13, 14),
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => (15, 16),
        BinaryOp::Add | BinaryOp::Sub => (17, 18),
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => (19, 20),
        BinaryOp::Exp => (22, 21),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> Node {
        let (tokens, lex_errors) = Lexer::new(source).tokenize();
        assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);
        Parser::new(tokens).parse_script().expect("parse errors")
    }

    fn script_body(node: Node) -> Vec<Node> {
        match node {
            Node::Script { body } => body,
            other => panic!("expected script, got {:?}", other),
        }
    }

    #[test]
    fn test_var_decl_without_init() {
        let body = script_body(parse("var decoders;"));
        if let Node::VarDecl { kind, declarators } = &body[0] {
            assert_eq!(*kind, DeclKind::Var);
            assert_eq!(
                declarators[0],
                Node::Declarator {
                    name: "decoders".to_string(),
                    init: None,
                }
            );
        } else {
            panic!("expected var declaration");
        }
    }

    #[test]
    fn test_precedence() {
        let body = script_body(parse("x = a + b * c;"));
        if let Node::ExprStmt { expr } = &body[0] {
            if let Node::Assign { value, .. } = expr.as_ref() {
                // Should be Add(a, Mul(b, c))
                if let Node::Binary { op, right, .. } = value.as_ref() {
                    assert_eq!(*op, BinaryOp::Add);
                    assert!(matches!(
                        right.as_ref(),
                        Node::Binary {
                            op: BinaryOp::Mul,
                            ..
                        }
                    ));
                    return;
                }
            }
        }
        panic!("unexpected shape");
    }

    #[test]
    fn test_member_call_chain() {
        let body = script_body(parse("decoders.dup(21);"));
        if let Node::ExprStmt { expr } = &body[0] {
            if let Node::Call { callee, arguments } = expr.as_ref() {
                assert_eq!(arguments.len(), 1);
                assert!(matches!(callee.as_ref(), Node::StaticMember { property, .. } if property == "dup"));
                return;
            }
        }
        panic!("expected call");
    }

    #[test]
    fn test_computed_member() {
        let body = script_body(parse("decoders[\"k\"]();"));
        if let Node::ExprStmt { expr } = &body[0] {
            if let Node::Call { callee, arguments } = expr.as_ref() {
                assert!(arguments.is_empty());
                assert!(matches!(callee.as_ref(), Node::ComputedMember { .. }));
                return;
            }
        }
        panic!("expected call");
    }

    #[test]
    fn test_while_switch_shape() {
        let source = "var s = 0; while (s != 65535) switch (s) { case 0: s = 1; break; }";
        let body = script_body(parse(source));
        assert_eq!(body.len(), 2);
        if let Node::While { body: loop_body, .. } = &body[1] {
            assert!(matches!(loop_body.as_ref(), Node::Switch { .. }));
        } else {
            panic!("expected while");
        }
    }

    #[test]
    fn test_conditional_assignment() {
        let body = script_body(parse("s = c ? 1 : 2;"));
        if let Node::ExprStmt { expr } = &body[0] {
            if let Node::Assign { value, .. } = expr.as_ref() {
                assert!(matches!(value.as_ref(), Node::Conditional { .. }));
                return;
            }
        }
        panic!("expected conditional assignment");
    }

    #[test]
    fn test_for_loop() {
        let body = script_body(parse("for (let i = 0; i < 3; i++) log(i);"));
        if let Node::For {
            init,
            test,
            update,
            ..
        } = &body[0]
        {
            assert!(matches!(init.as_deref(), Some(Node::VarDecl { .. })));
            assert!(matches!(test.as_deref(), Some(Node::Binary { .. })));
            assert!(matches!(update.as_deref(), Some(Node::Update { .. })));
        } else {
            panic!("expected for loop");
        }
    }

    #[test]
    fn test_for_in_and_of() {
        let body = script_body(parse("for (const k in obj) {} for (const v of list) {}"));
        assert!(matches!(&body[0], Node::ForIn { of: false, .. }));
        assert!(matches!(&body[1], Node::ForIn { of: true, .. }));
    }

    #[test]
    fn test_template_expression() {
        let body = script_body(parse("x = `a${b}c`;"));
        if let Node::ExprStmt { expr } = &body[0] {
            if let Node::Assign { value, .. } = expr.as_ref() {
                if let Node::Template { elements } = value.as_ref() {
                    assert_eq!(elements.len(), 3);
                    assert_eq!(
                        elements[0],
                        Node::TemplateElement {
                            raw: "a".to_string()
                        }
                    );
                    assert!(matches!(&elements[1], Node::Ident { .. }));
                    return;
                }
            }
        }
        panic!("expected template");
    }

    #[test]
    fn test_object_and_array_literals() {
        let body = script_body(parse("x = { a: 1, \"b\": [2, 3] };"));
        if let Node::ExprStmt { expr } = &body[0] {
            if let Node::Assign { value, .. } = expr.as_ref() {
                if let Node::Object { properties } = value.as_ref() {
                    assert_eq!(properties.len(), 2);
                    return;
                }
            }
        }
        panic!("expected object literal");
    }

    #[test]
    fn test_function_decl_and_expr() {
        let body = script_body(parse(
            "function f(a, b) { return a + b; } var g = function (x) { return x; };",
        ));
        assert!(matches!(&body[0], Node::FuncDecl { name, params, .. }
            if name == "f" && params.len() == 2));
        if let Node::VarDecl { declarators, .. } = &body[1] {
            if let Node::Declarator {
                init: Some(init), ..
            } = &declarators[0]
            {
                assert!(matches!(init.as_ref(), Node::FuncExpr { name: None, .. }));
                return;
            }
        }
        panic!("expected function expression initializer");
    }

    #[test]
    fn test_arrow_function() {
        let body = script_body(parse("var add = (a, b) => a + b; var id = x => x;"));
        for stmt in &body {
            if let Node::VarDecl { declarators, .. } = stmt {
                if let Node::Declarator {
                    init: Some(init), ..
                } = &declarators[0]
                {
                    assert!(matches!(init.as_ref(), Node::Arrow { .. }));
                    continue;
                }
            }
            panic!("expected arrow initializer");
        }
    }

    #[test]
    fn test_do_while() {
        let body = script_body(parse("do { work(); } while (more());"));
        assert!(matches!(&body[0], Node::DoWhile { .. }));
    }

    #[test]
    fn test_new_expression() {
        let body = script_body(parse("var d = new Decoder(1).init();"));
        if let Node::VarDecl { declarators, .. } = &body[0] {
            if let Node::Declarator {
                init: Some(init), ..
            } = &declarators[0]
            {
                // new Decoder(1) is the callee object of .init()
                if let Node::Call { callee, .. } = init.as_ref() {
                    assert!(matches!(
                        callee.as_ref(),
                        Node::StaticMember { object, .. } if matches!(object.as_ref(), Node::New { .. })
                    ));
                    return;
                }
            }
        }
        panic!("expected new expression chain");
    }

    #[test]
    fn test_sequence_expression() {
        let body = script_body(parse("a = 1, b = 2;"));
        if let Node::ExprStmt { expr } = &body[0] {
            assert!(matches!(expr.as_ref(), Node::Sequence { expressions } if expressions.len() == 2));
        } else {
            panic!("expected sequence statement");
        }
    }

    #[test]
    fn test_unary_and_update() {
        let body = script_body(parse("x = !!y; i++; --j;"));
        assert_eq!(body.len(), 3);
        if let Node::ExprStmt { expr } = &body[1] {
            assert!(matches!(expr.as_ref(), Node::Update { prefix: false, .. }));
        }
        if let Node::ExprStmt { expr } = &body[2] {
            assert!(matches!(expr.as_ref(), Node::Update { prefix: true, .. }));
        }
    }

    #[test]
    fn test_switch_default() {
        let body = script_body(parse(
            "switch (x) { case 1: a(); break; default: b(); }",
        ));
        if let Node::Switch { cases, .. } = &body[0] {
            assert_eq!(cases.len(), 2);
            assert!(matches!(&cases[0], Node::SwitchCase { test: Some(_), .. }));
            assert!(matches!(&cases[1], Node::SwitchCase { test: None, .. }));
        } else {
            panic!("expected switch");
        }
    }

    #[test]
    fn test_exponent_right_assoc() {
        let body = script_body(parse("x = 2 ** 3 ** 2;"));
        if let Node::ExprStmt { expr } = &body[0] {
            if let Node::Assign { value, .. } = expr.as_ref() {
                // 2 ** (3 ** 2)
                if let Node::Binary { op, right, .. } = value.as_ref() {
                    assert_eq!(*op, BinaryOp::Exp);
                    assert!(matches!(
                        right.as_ref(),
                        Node::Binary {
                            op: BinaryOp::Exp,
                            ..
                        }
                    ));
                    return;
                }
            }
        }
        panic!("unexpected shape");
    }
}

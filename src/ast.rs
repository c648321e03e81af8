pub mod attr;
pub mod navigate;

/// One node of the program tree. Statements and expressions share a single
/// node universe so selectors and passes can treat the tree uniformly.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    // Statements
    Script {
        body: Vec<Node>,
    },
    Block {
        body: Vec<Node>,
    },
    VarDecl {
        kind: DeclKind,
        declarators: Vec<Node>,
    },
    /// One `name = init` binding inside a VarDecl. `init` is absent for
    /// bare declarations like `var decoders;`.
    Declarator {
        name: String,
        init: Option<Box<Node>>,
    },
    FuncDecl {
        name: String,
        params: Vec<String>,
        body: Vec<Node>,
    },
    ExprStmt {
        expr: Box<Node>,
    },
    If {
        test: Box<Node>,
        consequent: Box<Node>,
        alternate: Option<Box<Node>>,
    },
    While {
        test: Box<Node>,
        body: Box<Node>,
    },
    DoWhile {
        body: Box<Node>,
        test: Box<Node>,
    },
    For {
        init: Option<Box<Node>>,
        test: Option<Box<Node>>,
        update: Option<Box<Node>>,
        body: Box<Node>,
    },
    ForIn {
        decl: Option<DeclKind>,
        name: String,
        of: bool,
        object: Box<Node>,
        body: Box<Node>,
    },
    Switch {
        discriminant: Box<Node>,
        cases: Vec<Node>,
    },
    /// `case test:` or, with an absent test, `default:`.
    SwitchCase {
        test: Option<Box<Node>>,
        body: Vec<Node>,
    },
    Return {
        argument: Option<Box<Node>>,
    },
    Break,
    Continue,
    Throw {
        argument: Box<Node>,
    },
    Empty,

    // Expressions
    Ident {
        name: String,
    },
    Number {
        value: f64,
    },
    Str {
        value: String,
    },
    Bool {
        value: bool,
    },
    Null,
    Regex {
        raw: String,
    },
    Array {
        elements: Vec<Node>,
    },
    Object {
        properties: Vec<Node>,
    },
    Property {
        key: Box<Node>,
        value: Box<Node>,
    },
    /// Template literal: alternating TemplateElement and expression nodes,
    /// always starting and ending with a TemplateElement.
    Template {
        elements: Vec<Node>,
    },
    /// Raw (unexpanded) text between interpolations.
    TemplateElement {
        raw: String,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        operand: Box<Node>,
    },
    Assign {
        op: AssignOp,
        target: Box<Node>,
        value: Box<Node>,
    },
    Conditional {
        test: Box<Node>,
        consequent: Box<Node>,
        alternate: Box<Node>,
    },
    Call {
        callee: Box<Node>,
        arguments: Vec<Node>,
    },
    New {
        callee: Box<Node>,
        arguments: Vec<Node>,
    },
    StaticMember {
        object: Box<Node>,
        property: String,
    },
    ComputedMember {
        object: Box<Node>,
        property: Box<Node>,
    },
    Sequence {
        expressions: Vec<Node>,
    },
    FuncExpr {
        name: Option<String>,
        params: Vec<String>,
        body: Vec<Node>,
    },
    /// Arrow function; `body` is a Block node or a bare expression node.
    Arrow {
        params: Vec<String>,
        body: Box<Node>,
    },
}

impl Default for Node {
    fn default() -> Self {
        Node::Empty
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Script { .. } => NodeKind::Script,
            Node::Block { .. } => NodeKind::Block,
            Node::VarDecl { .. } => NodeKind::VarDecl,
            Node::Declarator { .. } => NodeKind::Declarator,
            Node::FuncDecl { .. } => NodeKind::FuncDecl,
            Node::ExprStmt { .. } => NodeKind::ExprStmt,
            Node::If { .. } => NodeKind::If,
            Node::While { .. } => NodeKind::While,
            Node::DoWhile { .. } => NodeKind::DoWhile,
            Node::For { .. } => NodeKind::For,
            Node::ForIn { .. } => NodeKind::ForIn,
            Node::Switch { .. } => NodeKind::Switch,
            Node::SwitchCase { .. } => NodeKind::SwitchCase,
            Node::Return { .. } => NodeKind::Return,
            Node::Break => NodeKind::Break,
            Node::Continue => NodeKind::Continue,
            Node::Throw { .. } => NodeKind::Throw,
            Node::Empty => NodeKind::Empty,
            Node::Ident { .. } => NodeKind::Ident,
            Node::Number { .. } => NodeKind::Number,
            Node::Str { .. } => NodeKind::Str,
            Node::Bool { .. } => NodeKind::Bool,
            Node::Null => NodeKind::Null,
            Node::Regex { .. } => NodeKind::Regex,
            Node::Array { .. } => NodeKind::Array,
            Node::Object { .. } => NodeKind::Object,
            Node::Property { .. } => NodeKind::Property,
            Node::Template { .. } => NodeKind::Template,
            Node::TemplateElement { .. } => NodeKind::TemplateElement,
            Node::Binary { .. } => NodeKind::Binary,
            Node::Unary { .. } => NodeKind::Unary,
            Node::Update { .. } => NodeKind::Update,
            Node::Assign { .. } => NodeKind::Assign,
            Node::Conditional { .. } => NodeKind::Conditional,
            Node::Call { .. } => NodeKind::Call,
            Node::New { .. } => NodeKind::New,
            Node::StaticMember { .. } => NodeKind::StaticMember,
            Node::ComputedMember { .. } => NodeKind::ComputedMember,
            Node::Sequence { .. } => NodeKind::Sequence,
            Node::FuncExpr { .. } => NodeKind::FuncExpr,
            Node::Arrow { .. } => NodeKind::Arrow,
        }
    }

    pub fn number(value: f64) -> Node {
        Node::Number { value }
    }

    pub fn string(value: impl Into<String>) -> Node {
        Node::Str {
            value: value.into(),
        }
    }

    pub fn ident(name: impl Into<String>) -> Node {
        Node::Ident { name: name.into() }
    }

    pub fn boolean(value: bool) -> Node {
        Node::Bool { value }
    }
}

/// Fieldless mirror of `Node` used by selector queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Script,
    Block,
    VarDecl,
    Declarator,
    FuncDecl,
    ExprStmt,
    If,
    While,
    DoWhile,
    For,
    ForIn,
    Switch,
    SwitchCase,
    Return,
    Break,
    Continue,
    Throw,
    Empty,
    Ident,
    Number,
    Str,
    Bool,
    Null,
    Regex,
    Array,
    Object,
    Property,
    Template,
    TemplateElement,
    Binary,
    Unary,
    Update,
    Assign,
    Conditional,
    Call,
    New,
    StaticMember,
    ComputedMember,
    Sequence,
    FuncExpr,
    Arrow,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Script => "Script",
            NodeKind::Block => "Block",
            NodeKind::VarDecl => "VarDecl",
            NodeKind::Declarator => "Declarator",
            NodeKind::FuncDecl => "FuncDecl",
            NodeKind::ExprStmt => "ExprStmt",
            NodeKind::If => "If",
            NodeKind::While => "While",
            NodeKind::DoWhile => "DoWhile",
            NodeKind::For => "For",
            NodeKind::ForIn => "ForIn",
            NodeKind::Switch => "Switch",
            NodeKind::SwitchCase => "SwitchCase",
            NodeKind::Return => "Return",
            NodeKind::Break => "Break",
            NodeKind::Continue => "Continue",
            NodeKind::Throw => "Throw",
            NodeKind::Empty => "Empty",
            NodeKind::Ident => "Ident",
            NodeKind::Number => "Number",
            NodeKind::Str => "Str",
            NodeKind::Bool => "Bool",
            NodeKind::Null => "Null",
            NodeKind::Regex => "Regex",
            NodeKind::Array => "Array",
            NodeKind::Object => "Object",
            NodeKind::Property => "Property",
            NodeKind::Template => "Template",
            NodeKind::TemplateElement => "TemplateElement",
            NodeKind::Binary => "Binary",
            NodeKind::Unary => "Unary",
            NodeKind::Update => "Update",
            NodeKind::Assign => "Assign",
            NodeKind::Conditional => "Conditional",
            NodeKind::Call => "Call",
            NodeKind::New => "New",
            NodeKind::StaticMember => "StaticMember",
            NodeKind::ComputedMember => "ComputedMember",
            NodeKind::Sequence => "Sequence",
            NodeKind::FuncExpr => "FuncExpr",
            NodeKind::Arrow => "Arrow",
        }
    }

    pub fn from_name(name: &str) -> Option<NodeKind> {
        let kind = match name {
            "Script" => NodeKind::Script,
            "Block" => NodeKind::Block,
            "VarDecl" => NodeKind::VarDecl,
            "Declarator" => NodeKind::Declarator,
            "FuncDecl" => NodeKind::FuncDecl,
            "ExprStmt" => NodeKind::ExprStmt,
            "If" => NodeKind::If,
            "While" => NodeKind::While,
            "DoWhile" => NodeKind::DoWhile,
            "For" => NodeKind::For,
            "ForIn" => NodeKind::ForIn,
            "Switch" => NodeKind::Switch,
            "SwitchCase" => NodeKind::SwitchCase,
            "Return" => NodeKind::Return,
            "Break" => NodeKind::Break,
            "Continue" => NodeKind::Continue,
            "Throw" => NodeKind::Throw,
            "Empty" => NodeKind::Empty,
            "Ident" => NodeKind::Ident,
            "Number" => NodeKind::Number,
            "Str" => NodeKind::Str,
            "Bool" => NodeKind::Bool,
            "Null" => NodeKind::Null,
            "Regex" => NodeKind::Regex,
            "Array" => NodeKind::Array,
            "Object" => NodeKind::Object,
            "Property" => NodeKind::Property,
            "Template" => NodeKind::Template,
            "TemplateElement" => NodeKind::TemplateElement,
            "Binary" => NodeKind::Binary,
            "Unary" => NodeKind::Unary,
            "Update" => NodeKind::Update,
            "Assign" => NodeKind::Assign,
            "Conditional" => NodeKind::Conditional,
            "Call" => NodeKind::Call,
            "New" => NodeKind::New,
            "StaticMember" => NodeKind::StaticMember,
            "ComputedMember" => NodeKind::ComputedMember,
            "Sequence" => NodeKind::Sequence,
            "FuncExpr" => NodeKind::FuncExpr,
            "Arrow" => NodeKind::Arrow,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

impl DeclKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclKind::Var => "var",
            DeclKind::Let => "let",
            DeclKind::Const => "const",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,         // +
    Sub,         // -
    Mul,         // *
    Div,         // /
    Mod,         // %
    Exp,         // **
    EqEq,        // ==
    NotEq,       // !=
    StrictEq,    // ===
    StrictNotEq, // !==
    Lt,          // <
    LtEq,        // <=
    Gt,          // >
    GtEq,        // >=
    Shl,         // <<
    Shr,         // >>
    UShr,        // >>>
    BitAnd,      // &
    BitOr,       // |
    BitXor,      // ^
    And,         // &&
    Or,          // ||
    In,          // in
    Instanceof,  // instanceof
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Exp => "**",
            BinaryOp::EqEq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::In => "in",
            BinaryOp::Instanceof => "instanceof",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,    // !
    Neg,    // -
    Plus,   // +
    BitNot, // ~
    Typeof,
    Void,
    Delete,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::BitNot => "~",
            UnaryOp::Typeof => "typeof",
            UnaryOp::Void => "void",
            UnaryOp::Delete => "delete",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOp {
    Incr, // ++
    Decr, // --
}

impl UpdateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOp::Incr => "++",
            UpdateOp::Decr => "--",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,     // =
    Add,        // +=
    Sub,        // -=
    Mul,        // *=
    Div,        // /=
    Mod,        // %=
    Exp,        // **=
    BitAnd,     // &=
    BitOr,      // |=
    BitXor,     // ^=
    Shl,        // <<=
    Shr,        // >>=
    UShr,       // >>>=
}

impl AssignOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
            AssignOp::Exp => "**=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
            AssignOp::UShr => ">>>=",
        }
    }
}

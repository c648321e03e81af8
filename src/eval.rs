//! The evaluator capability: executes decoder setup code extracted from the
//! obfuscated program and exposes the resulting namespace of callables.
//!
//! This is a purpose-built tree-walking interpreter, not an embedded
//! JavaScript engine. It covers the surface JSDefender's helper routines
//! actually use — arithmetic and string table construction — and fails
//! closed on anything outside that surface.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::ast::{AssignOp, BinaryOp, Node, UnaryOp, UpdateOp};
use crate::format::js_number;

const MAX_STEPS: u64 = 10_000_000;

/// Failure while running extracted helper code.
#[derive(Clone, Debug)]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// A runtime value of the mini-interpreter.
#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<BTreeMap<String, Value>>>),
    Func(Rc<Function>),
}

impl Value {
    pub fn array(elements: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    pub fn object() -> Value {
        Value::Object(Rc::new(RefCell::new(BTreeMap::new())))
    }
}

#[derive(Debug)]
pub struct Function {
    params: Vec<String>,
    body: Vec<Node>,
    env: ScopeRef,
}

type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Debug, Default)]
struct Scope {
    vars: HashMap<String, Value>,
    parent: Option<ScopeRef>,
}

fn child_scope(parent: &ScopeRef) -> ScopeRef {
    Rc::new(RefCell::new(Scope {
        vars: HashMap::new(),
        parent: Some(parent.clone()),
    }))
}

fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
    let s = scope.borrow();
    if let Some(value) = s.vars.get(name) {
        return Some(value.clone());
    }
    let parent = s.parent.clone()?;
    drop(s);
    lookup(&parent, name)
}

fn declare(scope: &ScopeRef, name: &str, value: Value) {
    scope.borrow_mut().vars.insert(name.to_string(), value);
}

/// Assign to an existing binding, walking outward. Undeclared names land in
/// the outermost scope, matching sloppy-mode JavaScript.
fn assign_var(scope: &ScopeRef, name: &str, value: Value) {
    let mut current = scope.clone();
    loop {
        let next = {
            let mut s = current.borrow_mut();
            if s.vars.contains_key(name) {
                s.vars.insert(name.to_string(), value);
                return;
            }
            match &s.parent {
                Some(parent) => parent.clone(),
                None => {
                    s.vars.insert(name.to_string(), value);
                    return;
                }
            }
        };
        current = next;
    }
}

/// Control flow out of a statement.
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// The namespace of callables left behind by executed helper code.
pub struct Namespace {
    interp: Interp,
    entries: BTreeMap<String, Rc<Function>>,
}

impl Namespace {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        let func = self
            .entries
            .get(name)
            .ok_or_else(|| EvalError::new(format!("no decoder named '{}'", name)))?;
        self.interp.call_function(func, args)
    }
}

/// The one dynamic-execution operation the pipeline is allowed to perform.
pub struct Evaluator;

impl Evaluator {
    /// Parse and run `code` once, with `table_name` pre-bound to a fresh
    /// object and `args_name` to an empty array, then materialize the
    /// callables assigned to the table binding.
    pub fn execute(code: &str, table_name: &str, args_name: &str) -> Result<Namespace, EvalError> {
        let tree = crate::parse_source_silent(code).map_err(|errors| {
            let detail = errors
                .first()
                .map(|d| d.message.clone())
                .unwrap_or_else(|| "unknown error".to_string());
            EvalError::new(format!("helper code failed to parse: {}", detail))
        })?;

        let global: ScopeRef = Rc::new(RefCell::new(Scope::default()));
        declare(&global, table_name, Value::object());
        declare(&global, args_name, Value::array(Vec::new()));

        let interp = Interp::new();
        if let Node::Script { body } = &tree {
            interp.exec_hoisted(body, &global)?;
        }

        let table = lookup(&global, table_name)
            .ok_or_else(|| EvalError::new("table binding disappeared during execution"))?;
        let map = match table {
            Value::Object(map) => map,
            other => {
                return Err(EvalError::new(format!(
                    "table binding holds {}, not an object",
                    type_name(&other)
                )))
            }
        };

        let mut entries = BTreeMap::new();
        for (name, value) in map.borrow().iter() {
            if let Value::Func(func) = value {
                entries.insert(name.clone(), func.clone());
            }
        }
        Ok(Namespace { interp, entries })
    }
}

struct Interp {
    steps: Cell<u64>,
}

impl Interp {
    fn new() -> Self {
        Self { steps: Cell::new(0) }
    }

    fn step(&self) -> Result<(), EvalError> {
        let steps = self.steps.get() + 1;
        self.steps.set(steps);
        if steps > MAX_STEPS {
            return Err(EvalError::new("helper code exceeded its execution budget"));
        }
        Ok(())
    }

    /// Execute a statement list with function declarations hoisted first.
    fn exec_hoisted(&self, body: &[Node], scope: &ScopeRef) -> Result<Flow, EvalError> {
        for stmt in body {
            if let Node::FuncDecl {
                name,
                params,
                body: fn_body,
            } = stmt
            {
                let func = Function {
                    params: params.clone(),
                    body: fn_body.clone(),
                    env: scope.clone(),
                };
                declare(scope, name, Value::Func(Rc::new(func)));
            }
        }
        for stmt in body {
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&self, stmt: &Node, scope: &ScopeRef) -> Result<Flow, EvalError> {
        self.step()?;
        match stmt {
            Node::Empty | Node::FuncDecl { .. } => Ok(Flow::Normal),
            Node::VarDecl { declarators, .. } => {
                for declarator in declarators {
                    if let Node::Declarator { name, init } = declarator {
                        let value = match init {
                            Some(init) => self.eval_expr(init, scope)?,
                            None => Value::Undefined,
                        };
                        declare(scope, name, value);
                    }
                }
                Ok(Flow::Normal)
            }
            Node::ExprStmt { expr } => {
                self.eval_expr(expr, scope)?;
                Ok(Flow::Normal)
            }
            Node::Block { body } => self.exec_hoisted(body, &child_scope(scope)),
            Node::If {
                test,
                consequent,
                alternate,
            } => {
                if truthy(&self.eval_expr(test, scope)?) {
                    self.exec_stmt(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec_stmt(alternate, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Node::While { test, body } => {
                while truthy(&self.eval_expr(test, scope)?) {
                    self.step()?;
                    match self.exec_stmt(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Node::DoWhile { body, test } => {
                loop {
                    self.step()?;
                    match self.exec_stmt(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                    if !truthy(&self.eval_expr(test, scope)?) {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Node::For {
                init,
                test,
                update,
                body,
            } => {
                let scope = child_scope(scope);
                if let Some(init) = init {
                    match init.as_ref() {
                        decl @ Node::VarDecl { .. } => {
                            self.exec_stmt(decl, &scope)?;
                        }
                        expr => {
                            self.eval_expr(expr, &scope)?;
                        }
                    }
                }
                loop {
                    if let Some(test) = test {
                        if !truthy(&self.eval_expr(test, &scope)?) {
                            break;
                        }
                    }
                    self.step()?;
                    match self.exec_stmt(body, &scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                    if let Some(update) = update {
                        self.eval_expr(update, &scope)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Node::Switch {
                discriminant,
                cases,
            } => {
                let value = self.eval_expr(discriminant, scope)?;
                let mut matched = cases.len();
                for (i, case) in cases.iter().enumerate() {
                    if let Node::SwitchCase {
                        test: Some(test), ..
                    } = case
                    {
                        let case_value = self.eval_expr(test, scope)?;
                        if strict_eq(&value, &case_value) {
                            matched = i;
                            break;
                        }
                    }
                }
                if matched == cases.len() {
                    // Fall back to `default:` when nothing matched
                    matched = cases
                        .iter()
                        .position(|c| matches!(c, Node::SwitchCase { test: None, .. }))
                        .unwrap_or(cases.len());
                }
                for case in cases.iter().skip(matched) {
                    if let Node::SwitchCase { body, .. } = case {
                        match self.exec_hoisted(body, scope)? {
                            Flow::Break => return Ok(Flow::Normal),
                            Flow::Normal => {}
                            flow => return Ok(flow),
                        }
                    }
                }
                Ok(Flow::Normal)
            }
            Node::Return { argument } => {
                let value = match argument {
                    Some(argument) => self.eval_expr(argument, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Node::Break => Ok(Flow::Break),
            Node::Continue => Ok(Flow::Continue),
            Node::Throw { argument } => {
                let value = self.eval_expr(argument, scope)?;
                Err(EvalError::new(format!(
                    "helper code threw: {}",
                    to_js_string(&value)
                )))
            }
            other => Err(EvalError::new(format!(
                "unsupported statement in helper code: {}",
                other.kind().name()
            ))),
        }
    }

    fn eval_expr(&self, expr: &Node, scope: &ScopeRef) -> Result<Value, EvalError> {
        self.step()?;
        match expr {
            Node::Number { value } => Ok(Value::Num(*value)),
            Node::Str { value } => Ok(Value::Str(value.clone())),
            Node::Bool { value } => Ok(Value::Bool(*value)),
            Node::Null => Ok(Value::Null),
            Node::Ident { name } => match name.as_str() {
                "undefined" => Ok(Value::Undefined),
                "NaN" => Ok(Value::Num(f64::NAN)),
                "Infinity" => Ok(Value::Num(f64::INFINITY)),
                _ => lookup(scope, name)
                    .ok_or_else(|| EvalError::new(format!("undefined variable '{}'", name))),
            },
            Node::Array { elements } => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(match element {
                        Node::Empty => Value::Undefined,
                        other => self.eval_expr(other, scope)?,
                    });
                }
                Ok(Value::array(values))
            }
            Node::Object { properties } => {
                let map = Rc::new(RefCell::new(BTreeMap::new()));
                for property in properties {
                    if let Node::Property { key, value } = property {
                        let name = property_name(key)?;
                        let value = self.eval_expr(value, scope)?;
                        map.borrow_mut().insert(name, value);
                    }
                }
                Ok(Value::Object(map))
            }
            Node::Template { elements } => {
                let mut out = String::new();
                for element in elements {
                    match element {
                        Node::TemplateElement { raw } => out.push_str(&cook_raw(raw)),
                        interpolated => {
                            let value = self.eval_expr(interpolated, scope)?;
                            out.push_str(&to_js_string(&value));
                        }
                    }
                }
                Ok(Value::Str(out))
            }
            Node::FuncExpr { params, body, .. } => Ok(Value::Func(Rc::new(Function {
                params: params.clone(),
                body: body.clone(),
                env: scope.clone(),
            }))),
            Node::Arrow { params, body } => {
                let body = match body.as_ref() {
                    Node::Block { body } => body.clone(),
                    expr => vec![Node::Return {
                        argument: Some(Box::new(expr.clone())),
                    }],
                };
                Ok(Value::Func(Rc::new(Function {
                    params: params.clone(),
                    body,
                    env: scope.clone(),
                })))
            }
            Node::Sequence { expressions } => {
                let mut last = Value::Undefined;
                for inner in expressions {
                    last = self.eval_expr(inner, scope)?;
                }
                Ok(last)
            }
            Node::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if truthy(&self.eval_expr(test, scope)?) {
                    self.eval_expr(consequent, scope)
                } else {
                    self.eval_expr(alternate, scope)
                }
            }
            Node::Unary { op, operand } => self.eval_unary(*op, operand, scope),
            Node::Binary { op, left, right } => self.eval_binary(*op, left, right, scope),
            Node::Update {
                op,
                prefix,
                operand,
            } => self.eval_update(*op, *prefix, operand, scope),
            Node::Assign { op, target, value } => self.eval_assign(*op, target, value, scope),
            Node::StaticMember { object, property } => {
                let object = self.eval_expr(object, scope)?;
                get_member(&object, property)
            }
            Node::ComputedMember { object, property } => {
                let object = self.eval_expr(object, scope)?;
                let key = self.eval_expr(property, scope)?;
                get_member(&object, &member_key(&key))
            }
            Node::Call { callee, arguments } => self.eval_call(callee, arguments, scope),
            other => Err(EvalError::new(format!(
                "unsupported expression in helper code: {}",
                other.kind().name()
            ))),
        }
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Node, scope: &ScopeRef) -> Result<Value, EvalError> {
        if op == UnaryOp::Typeof {
            // typeof tolerates undefined variables
            if let Node::Ident { name } = operand {
                if lookup(scope, name).is_none() {
                    return Ok(Value::Str("undefined".to_string()));
                }
            }
        }
        let value = self.eval_expr(operand, scope)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!truthy(&value)),
            UnaryOp::Neg => Value::Num(-to_number(&value)),
            UnaryOp::Plus => Value::Num(to_number(&value)),
            UnaryOp::BitNot => Value::Num(!(to_int32(&value)) as f64),
            UnaryOp::Typeof => Value::Str(type_name(&value).to_string()),
            UnaryOp::Void => Value::Undefined,
            UnaryOp::Delete => {
                return Err(EvalError::new("unsupported operator in helper code: delete"))
            }
        })
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Node,
        right: &Node,
        scope: &ScopeRef,
    ) -> Result<Value, EvalError> {
        // Short-circuit forms evaluate the right side lazily
        if op == BinaryOp::And {
            let lhs = self.eval_expr(left, scope)?;
            return if truthy(&lhs) {
                self.eval_expr(right, scope)
            } else {
                Ok(lhs)
            };
        }
        if op == BinaryOp::Or {
            let lhs = self.eval_expr(left, scope)?;
            return if truthy(&lhs) {
                Ok(lhs)
            } else {
                self.eval_expr(right, scope)
            };
        }

        let lhs = self.eval_expr(left, scope)?;
        let rhs = self.eval_expr(right, scope)?;
        apply_binary(op, &lhs, &rhs)
    }

    fn eval_update(
        &self,
        op: UpdateOp,
        prefix: bool,
        operand: &Node,
        scope: &ScopeRef,
    ) -> Result<Value, EvalError> {
        let old = to_number(&self.eval_expr(operand, scope)?);
        let new = match op {
            UpdateOp::Incr => old + 1.0,
            UpdateOp::Decr => old - 1.0,
        };
        self.store(operand, Value::Num(new), scope)?;
        Ok(Value::Num(if prefix { new } else { old }))
    }

    fn eval_assign(
        &self,
        op: AssignOp,
        target: &Node,
        value: &Node,
        scope: &ScopeRef,
    ) -> Result<Value, EvalError> {
        let rhs = self.eval_expr(value, scope)?;
        let result = match op {
            AssignOp::Assign => rhs,
            compound => {
                let current = self.eval_expr(target, scope)?;
                let binary = match compound {
                    AssignOp::Add => BinaryOp::Add,
                    AssignOp::Sub => BinaryOp::Sub,
                    AssignOp::Mul => BinaryOp::Mul,
                    AssignOp::Div => BinaryOp::Div,
                    AssignOp::Mod => BinaryOp::Mod,
                    AssignOp::Exp => BinaryOp::Exp,
                    AssignOp::BitAnd => BinaryOp::BitAnd,
                    AssignOp::BitOr => BinaryOp::BitOr,
                    AssignOp::BitXor => BinaryOp::BitXor,
                    AssignOp::Shl => BinaryOp::Shl,
                    AssignOp::Shr => BinaryOp::Shr,
                    AssignOp::UShr => BinaryOp::UShr,
                    AssignOp::Assign => unreachable!(),
                };
                apply_binary(binary, &current, &rhs)?
            }
        };
        self.store(target, result.clone(), scope)?;
        Ok(result)
    }

    fn store(&self, target: &Node, value: Value, scope: &ScopeRef) -> Result<(), EvalError> {
        match target {
            Node::Ident { name } => {
                assign_var(scope, name, value);
                Ok(())
            }
            Node::StaticMember { object, property } => {
                let object = self.eval_expr(object, scope)?;
                set_member(&object, property, value)
            }
            Node::ComputedMember { object, property } => {
                let object = self.eval_expr(object, scope)?;
                let key = self.eval_expr(property, scope)?;
                set_member(&object, &member_key(&key), value)
            }
            other => Err(EvalError::new(format!(
                "unsupported assignment target in helper code: {}",
                other.kind().name()
            ))),
        }
    }

    fn eval_call(
        &self,
        callee: &Node,
        arguments: &[Node],
        scope: &ScopeRef,
    ) -> Result<Value, EvalError> {
        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(self.eval_expr(argument, scope)?);
        }

        match callee {
            // Global builtins
            Node::Ident { name } if name == "parseInt" => return builtin_parse_int(&args),
            Node::Ident { name } if name == "parseFloat" => {
                let text = args.first().map(to_js_string).unwrap_or_default();
                return Ok(Value::Num(text.trim().parse::<f64>().unwrap_or(f64::NAN)));
            }
            Node::Ident { name } if name == "Number" => {
                return Ok(Value::Num(
                    args.first().map(to_number).unwrap_or(0.0),
                ));
            }
            Node::Ident { name } if name == "String" => {
                return Ok(Value::Str(
                    args.first().map(to_js_string).unwrap_or_default(),
                ));
            }
            Node::StaticMember { object, property } => {
                // Namespace builtins: String.fromCharCode, Math.*
                if let Node::Ident { name } = object.as_ref() {
                    if name == "String" && property == "fromCharCode" {
                        return builtin_from_char_code(&args);
                    }
                    if name == "Math" {
                        return builtin_math(property, &args);
                    }
                }
                let receiver = self.eval_expr(object, scope)?;
                return self.call_method(&receiver, property, args);
            }
            Node::ComputedMember { object, property } => {
                let receiver = self.eval_expr(object, scope)?;
                let key = self.eval_expr(property, scope)?;
                return self.call_method(&receiver, &member_key(&key), args);
            }
            _ => {}
        }

        let value = self.eval_expr(callee, scope)?;
        match value {
            Value::Func(func) => self.call_function(&func, args),
            other => Err(EvalError::new(format!(
                "helper code called a non-function ({})",
                type_name(&other)
            ))),
        }
    }

    fn call_method(
        &self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        match receiver {
            Value::Str(s) => builtin_string_method(s, name, &args),
            Value::Array(items) => self.builtin_array_method(items, name, args),
            Value::Object(map) => {
                let method = map.borrow().get(name).cloned();
                match method {
                    Some(Value::Func(func)) => self.call_function(&func, args),
                    Some(other) => Err(EvalError::new(format!(
                        "property '{}' is {}, not a function",
                        name,
                        type_name(&other)
                    ))),
                    None => Err(EvalError::new(format!("no method '{}' on object", name))),
                }
            }
            other => Err(EvalError::new(format!(
                "no method '{}' on {}",
                name,
                type_name(other)
            ))),
        }
    }

    fn builtin_array_method(
        &self,
        items: &Rc<RefCell<Vec<Value>>>,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        match name {
            "push" => {
                let mut items = items.borrow_mut();
                for arg in args {
                    items.push(arg);
                }
                Ok(Value::Num(items.len() as f64))
            }
            "pop" => Ok(items.borrow_mut().pop().unwrap_or(Value::Undefined)),
            "join" => {
                let sep = args.first().map(to_js_string).unwrap_or_else(|| ",".to_string());
                let joined = items
                    .borrow()
                    .iter()
                    .map(to_js_string)
                    .collect::<Vec<_>>()
                    .join(&sep);
                Ok(Value::Str(joined))
            }
            "slice" => {
                let items = items.borrow();
                let (start, end) = slice_bounds(&args, items.len());
                Ok(Value::array(items[start..end].to_vec()))
            }
            "indexOf" => {
                let needle = args.first().cloned().unwrap_or(Value::Undefined);
                let index = items
                    .borrow()
                    .iter()
                    .position(|v| strict_eq(v, &needle))
                    .map(|i| i as f64)
                    .unwrap_or(-1.0);
                Ok(Value::Num(index))
            }
            "reverse" => {
                items.borrow_mut().reverse();
                Ok(Value::Array(items.clone()))
            }
            _ => Err(EvalError::new(format!("no method '{}' on array", name))),
        }
    }

    fn call_function(&self, func: &Function, args: Vec<Value>) -> Result<Value, EvalError> {
        self.step()?;
        let scope = child_scope(&func.env);
        for (i, param) in func.params.iter().enumerate() {
            let value = args.get(i).cloned().unwrap_or(Value::Undefined);
            declare(&scope, param, value);
        }
        match self.exec_hoisted(&func.body, &scope)? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }
}

// --- Value semantics ---

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null => false,
        Value::Bool(b) => *b,
        Value::Num(n) => *n != 0.0 && !n.is_nan(),
        Value::Str(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) | Value::Func(_) => true,
    }
}

pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Num(n) => *n,
        Value::Bool(true) => 1.0,
        Value::Bool(false) => 0.0,
        Value::Null => 0.0,
        Value::Undefined => f64::NAN,
        Value::Str(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
                u64::from_str_radix(hex, 16)
                    .map(|n| n as f64)
                    .unwrap_or(f64::NAN)
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Value::Array(items) => {
            let items = items.borrow();
            match items.len() {
                0 => 0.0,
                1 => to_number(&items[0]),
                _ => f64::NAN,
            }
        }
        Value::Object(_) | Value::Func(_) => f64::NAN,
    }
}

pub fn to_js_string(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Num(n) => js_number(*n),
        Value::Str(s) => s.clone(),
        Value::Array(items) => items
            .borrow()
            .iter()
            .map(to_js_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
        Value::Func(_) => "function".to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Undefined => "undefined",
        Value::Null => "object",
        Value::Bool(_) => "boolean",
        Value::Num(_) => "number",
        Value::Str(_) => "string",
        Value::Array(_) | Value::Object(_) => "object",
        Value::Func(_) => "function",
    }
}

fn to_int32(value: &Value) -> i32 {
    let n = to_number(value);
    if !n.is_finite() {
        return 0;
    }
    n as i64 as u32 as i32
}

fn to_uint32(value: &Value) -> u32 {
    let n = to_number(value);
    if !n.is_finite() {
        return 0;
    }
    n as i64 as u32
}

pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Num(x), Value::Num(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => Rc::ptr_eq(x, y),
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        (Value::Func(x), Value::Func(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Undefined) | (Value::Undefined, Value::Null) => true,
        (Value::Num(_), Value::Str(_))
        | (Value::Str(_), Value::Num(_))
        | (Value::Bool(_), _)
        | (_, Value::Bool(_)) => to_number(a) == to_number(b),
        _ => strict_eq(a, b),
    }
}

fn apply_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    Ok(match op {
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Value::Str(format!("{}{}", to_js_string(lhs), to_js_string(rhs)))
            }
            _ => Value::Num(to_number(lhs) + to_number(rhs)),
        },
        BinaryOp::Sub => Value::Num(to_number(lhs) - to_number(rhs)),
        BinaryOp::Mul => Value::Num(to_number(lhs) * to_number(rhs)),
        BinaryOp::Div => Value::Num(to_number(lhs) / to_number(rhs)),
        BinaryOp::Mod => Value::Num(to_number(lhs) % to_number(rhs)),
        BinaryOp::Exp => Value::Num(to_number(lhs).powf(to_number(rhs))),
        BinaryOp::EqEq => Value::Bool(loose_eq(lhs, rhs)),
        BinaryOp::NotEq => Value::Bool(!loose_eq(lhs, rhs)),
        BinaryOp::StrictEq => Value::Bool(strict_eq(lhs, rhs)),
        BinaryOp::StrictNotEq => Value::Bool(!strict_eq(lhs, rhs)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let result = match (lhs, rhs) {
                (Value::Str(a), Value::Str(b)) => match op {
                    BinaryOp::Lt => a < b,
                    BinaryOp::LtEq => a <= b,
                    BinaryOp::Gt => a > b,
                    _ => a >= b,
                },
                _ => {
                    let (a, b) = (to_number(lhs), to_number(rhs));
                    match op {
                        BinaryOp::Lt => a < b,
                        BinaryOp::LtEq => a <= b,
                        BinaryOp::Gt => a > b,
                        _ => a >= b,
                    }
                }
            };
            Value::Bool(result)
        }
        BinaryOp::Shl => Value::Num((to_int32(lhs) << (to_uint32(rhs) & 31)) as f64),
        BinaryOp::Shr => Value::Num((to_int32(lhs) >> (to_uint32(rhs) & 31)) as f64),
        BinaryOp::UShr => Value::Num((to_uint32(lhs) >> (to_uint32(rhs) & 31)) as f64),
        BinaryOp::BitAnd => Value::Num((to_int32(lhs) & to_int32(rhs)) as f64),
        BinaryOp::BitOr => Value::Num((to_int32(lhs) | to_int32(rhs)) as f64),
        BinaryOp::BitXor => Value::Num((to_int32(lhs) ^ to_int32(rhs)) as f64),
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit ops handled by caller"),
        BinaryOp::In | BinaryOp::Instanceof => {
            return Err(EvalError::new(format!(
                "unsupported operator in helper code: {}",
                op.as_str()
            )))
        }
    })
}

fn get_member(object: &Value, name: &str) -> Result<Value, EvalError> {
    match object {
        Value::Str(s) => {
            if name == "length" {
                return Ok(Value::Num(s.chars().count() as f64));
            }
            if let Ok(index) = name.parse::<usize>() {
                return Ok(s
                    .chars()
                    .nth(index)
                    .map(|c| Value::Str(c.to_string()))
                    .unwrap_or(Value::Undefined));
            }
            Ok(Value::Undefined)
        }
        Value::Array(items) => {
            if name == "length" {
                return Ok(Value::Num(items.borrow().len() as f64));
            }
            if let Ok(index) = name.parse::<usize>() {
                return Ok(items.borrow().get(index).cloned().unwrap_or(Value::Undefined));
            }
            Ok(Value::Undefined)
        }
        Value::Object(map) => Ok(map.borrow().get(name).cloned().unwrap_or(Value::Undefined)),
        other => Err(EvalError::new(format!(
            "cannot read property '{}' of {}",
            name,
            type_name(other)
        ))),
    }
}

fn set_member(object: &Value, name: &str, value: Value) -> Result<(), EvalError> {
    match object {
        Value::Object(map) => {
            map.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            if let Ok(index) = name.parse::<usize>() {
                let mut items = items.borrow_mut();
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                Ok(())
            } else {
                Err(EvalError::new(format!(
                    "cannot set property '{}' on array",
                    name
                )))
            }
        }
        other => Err(EvalError::new(format!(
            "cannot set property '{}' on {}",
            name,
            type_name(other)
        ))),
    }
}

fn member_key(key: &Value) -> String {
    to_js_string(key)
}

fn property_name(key: &Node) -> Result<String, EvalError> {
    match key {
        Node::Ident { name } => Ok(name.clone()),
        Node::Str { value } => Ok(value.clone()),
        Node::Number { value } => Ok(js_number(*value)),
        other => Err(EvalError::new(format!(
            "unsupported property key: {}",
            other.kind().name()
        ))),
    }
}

/// Expand the escape sequences of raw template text.
fn cook_raw(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('`') => out.push('`'),
            Some('$') => out.push('$'),
            Some('\\') => out.push('\\'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

// --- Builtins ---

fn builtin_parse_int(args: &[Value]) -> Result<Value, EvalError> {
    let text = args.first().map(to_js_string).unwrap_or_default();
    let text = text.trim();
    let radix = args
        .get(1)
        .map(|v| to_number(v) as u32)
        .filter(|r| (2..=36).contains(r))
        .unwrap_or(10);

    let (digits, sign) = match text.strip_prefix('-') {
        Some(rest) => (rest, -1.0),
        None => (text.strip_prefix('+').unwrap_or(text), 1.0),
    };
    let digits = if radix == 16 {
        digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits)
    } else {
        digits
    };

    // Consume the longest valid digit prefix
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        return Ok(Value::Num(f64::NAN));
    }
    match i64::from_str_radix(&digits[..end], radix) {
        Ok(n) => Ok(Value::Num(sign * n as f64)),
        Err(_) => Ok(Value::Num(f64::NAN)),
    }
}

fn builtin_from_char_code(args: &[Value]) -> Result<Value, EvalError> {
    let mut out = String::new();
    for arg in args {
        let code = to_number(arg) as u32;
        out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
    }
    Ok(Value::Str(out))
}

fn builtin_math(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    let arg = |i: usize| args.get(i).map(to_number).unwrap_or(f64::NAN);
    let result = match name {
        "floor" => arg(0).floor(),
        "ceil" => arg(0).ceil(),
        "round" => arg(0).round(),
        "trunc" => arg(0).trunc(),
        "abs" => arg(0).abs(),
        "sqrt" => arg(0).sqrt(),
        "pow" => arg(0).powf(arg(1)),
        "max" => args.iter().map(to_number).fold(f64::NEG_INFINITY, f64::max),
        "min" => args.iter().map(to_number).fold(f64::INFINITY, f64::min),
        _ => {
            return Err(EvalError::new(format!(
                "unsupported builtin Math.{}",
                name
            )))
        }
    };
    Ok(Value::Num(result))
}

fn builtin_string_method(s: &str, name: &str, args: &[Value]) -> Result<Value, EvalError> {
    let chars: Vec<char> = s.chars().collect();
    match name {
        "charCodeAt" => {
            let index = args.first().map(to_number).unwrap_or(0.0) as usize;
            Ok(chars
                .get(index)
                .map(|c| Value::Num(*c as u32 as f64))
                .unwrap_or(Value::Num(f64::NAN)))
        }
        "charAt" => {
            let index = args.first().map(to_number).unwrap_or(0.0) as usize;
            Ok(Value::Str(
                chars.get(index).map(|c| c.to_string()).unwrap_or_default(),
            ))
        }
        "indexOf" => {
            let needle = args.first().map(to_js_string).unwrap_or_default();
            let index = s
                .find(&needle)
                .map(|byte| s[..byte].chars().count() as f64)
                .unwrap_or(-1.0);
            Ok(Value::Num(index))
        }
        "slice" | "substring" => {
            let (start, end) = slice_bounds(args, chars.len());
            Ok(Value::Str(chars[start..end].iter().collect()))
        }
        "split" => {
            let sep = args.first().map(to_js_string).unwrap_or_default();
            let parts: Vec<Value> = if sep.is_empty() {
                chars.iter().map(|c| Value::Str(c.to_string())).collect()
            } else {
                s.split(sep.as_str())
                    .map(|p| Value::Str(p.to_string()))
                    .collect()
            };
            Ok(Value::array(parts))
        }
        "toUpperCase" => Ok(Value::Str(s.to_uppercase())),
        "toLowerCase" => Ok(Value::Str(s.to_lowercase())),
        "trim" => Ok(Value::Str(s.trim().to_string())),
        "replace" => {
            let from = args.first().map(to_js_string).unwrap_or_default();
            let to = args.get(1).map(to_js_string).unwrap_or_default();
            Ok(Value::Str(s.replacen(from.as_str(), &to, 1)))
        }
        _ => Err(EvalError::new(format!("no method '{}' on string", name))),
    }
}

/// Resolve optional (start, end) arguments against a length, clamping and
/// wrapping negatives the way JS slice does.
fn slice_bounds(args: &[Value], len: usize) -> (usize, usize) {
    let resolve = |v: f64| -> usize {
        if v.is_nan() {
            return 0;
        }
        if v < 0.0 {
            len.saturating_sub((-v) as usize)
        } else {
            (v as usize).min(len)
        }
    };
    let start = args.first().map(|v| resolve(to_number(v))).unwrap_or(0);
    let end = args
        .get(1)
        .filter(|v| !matches!(v, Value::Undefined))
        .map(|v| resolve(to_number(v)))
        .unwrap_or(len);
    (start, end.max(start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> Namespace {
        Evaluator::execute(code, "decoders", "args").expect("execution failed")
    }

    #[test]
    fn test_table_from_object_literal() {
        let ns = run("decoders = { dup: function (x) { return x * 2; } };");
        assert_eq!(ns.len(), 1);
        let result = ns.call("dup", vec![Value::Num(21.0)]).unwrap();
        assert!(matches!(result, Value::Num(n) if n == 42.0));
    }

    #[test]
    fn test_table_from_property_assignment() {
        let ns = run("decoders.greet = function (n) { return \"hi \" + n; };");
        let result = ns.call("greet", vec![Value::Num(3.0)]).unwrap();
        assert!(matches!(result, Value::Str(s) if s == "hi 3"));
    }

    #[test]
    fn test_closure_over_table_state() {
        let code = "var table = [\"a\", \"b\", \"c\"];\n\
                    decoders.pick = function (i) { return table[i]; };";
        let ns = run(code);
        let result = ns.call("pick", vec![Value::Num(1.0)]).unwrap();
        assert!(matches!(result, Value::Str(s) if s == "b"));
    }

    #[test]
    fn test_string_decoding_helpers() {
        let code = "decoders.rot = function (s) {\n\
                    var out = \"\";\n\
                    for (var i = 0; i < s.length; i++) {\n\
                        out += String.fromCharCode(s.charCodeAt(i) + 1);\n\
                    }\n\
                    return out;\n\
                    };";
        let ns = run(code);
        let result = ns.call("rot", vec![Value::Str("HAL".to_string())]).unwrap();
        assert!(matches!(result, Value::Str(s) if s == "IBM"));
    }

    #[test]
    fn test_args_binding_visible() {
        let ns = run("args.push(7); decoders.first = function () { return args[0]; };");
        let result = ns.call("first", vec![]).unwrap();
        assert!(matches!(result, Value::Num(n) if n == 7.0));
    }

    #[test]
    fn test_iife_setup() {
        let code = "(function () { decoders.k = function () { return 1337; }; })();";
        let ns = run(code);
        let result = ns.call("k", vec![]).unwrap();
        assert!(matches!(result, Value::Num(n) if n == 1337.0));
    }

    #[test]
    fn test_missing_decoder_is_error() {
        let ns = run("decoders.a = function () { return 0; };");
        assert!(ns.call("missing", vec![]).is_err());
    }

    #[test]
    fn test_throw_aborts_execution() {
        let result = Evaluator::execute("throw \"boom\";", "decoders", "args");
        assert!(result.is_err());
    }

    #[test]
    fn test_runaway_loop_hits_budget() {
        let result = Evaluator::execute("while (true) {}", "decoders", "args");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_int_builtin() {
        let ns = run("decoders.h = function (s) { return parseInt(s, 16); };");
        let result = ns.call("h", vec![Value::Str("ff".to_string())]).unwrap();
        assert!(matches!(result, Value::Num(n) if n == 255.0));
    }

    #[test]
    fn test_loose_and_strict_equality() {
        assert!(loose_eq(&Value::Num(1.0), &Value::Str("1".to_string())));
        assert!(!strict_eq(&Value::Num(1.0), &Value::Str("1".to_string())));
        assert!(loose_eq(&Value::Null, &Value::Undefined));
    }
}

//! Decoder resolution: finds the obfuscator's bootstrap (a bare table
//! declaration, a setup-arguments binding, and an `eval` call carrying the
//! helper source as a string literal), executes the helper exactly once,
//! and replaces every indirect decoder call site with its literal result.

use crate::ast::{navigate, Node, UnaryOp};
use crate::eval::{Evaluator, Namespace, Value};
use crate::select::{compiled, QueryError};

/// Fatal resolution failure: the pipeline must abort rather than emit a
/// partially resolved program.
#[derive(Clone, Debug)]
pub struct ResolveError {
    pub message: String,
}

impl ResolveError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ResolveError {}

impl From<QueryError> for ResolveError {
    fn from(err: QueryError) -> Self {
        ResolveError::new(err.to_string())
    }
}

/// The immutable name-to-callable table, built once and threaded read-only
/// into the passes that need call-site resolution.
pub struct DecoderTable {
    binding: String,
    args_binding: String,
    namespace: Namespace,
}

impl DecoderTable {
    /// The identifier the obfuscated program binds the table to.
    pub fn binding(&self) -> &str {
        &self.binding
    }

    pub fn args_binding(&self) -> &str {
        &self.args_binding
    }

    pub fn len(&self) -> usize {
        self.namespace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespace.is_empty()
    }

    fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, ResolveError> {
        self.namespace
            .call(name, args)
            .map_err(|e| ResolveError::new(format!("decoder '{}' failed: {}", name, e)))
    }
}

/// Locate the bootstrap and execute the helper source.
///
/// Returns `Ok(None)` when the program carries no dynamic-execution call
/// site at all (already-deobfuscated input is valid input). Any partially
/// present or failing bootstrap is an error.
pub fn build_table(tree: &Node) -> Result<Option<DecoderTable>, ResolveError> {
    let eval_call = compiled("Call[callee.name=\"eval\"][arguments.0.kind=Str]")?;
    let helper_source = match eval_call.find_first(tree) {
        Some(Node::Call { arguments, .. }) => match arguments.first() {
            Some(Node::Str { value }) => value.clone(),
            _ => unreachable!("selector guarantees a string argument"),
        },
        _ => return Ok(None),
    };

    let table_decl = compiled("Declarator[init=null]")?;
    let binding = match table_decl.find_first(tree) {
        Some(Node::Declarator { name, .. }) => name.clone(),
        _ => {
            return Err(ResolveError::new(
                "found helper code but no bare table declaration",
            ))
        }
    };

    let args_decl = compiled("Declarator[init.callee.property=\"call\"]")?;
    let args_binding = match args_decl.find_first(tree) {
        Some(Node::Declarator { name, .. }) => name.clone(),
        _ => {
            return Err(ResolveError::new(
                "found helper code but no setup-arguments declaration",
            ))
        }
    };

    let namespace = Evaluator::execute(&helper_source, &binding, &args_binding)
        .map_err(|e| ResolveError::new(format!("helper execution failed: {}", e)))?;

    Ok(Some(DecoderTable {
        binding,
        args_binding,
        namespace,
    }))
}

/// Replace `table.name(literal)` and `table["name"]()` call sites across the
/// whole tree with the literal each decoder returns. Returns how many sites
/// were resolved.
pub fn resolve_call_sites(tree: &mut Node, table: &DecoderTable) -> Result<usize, ResolveError> {
    let mut resolved = 0;
    resolve_node(tree, table, &mut resolved)?;
    Ok(resolved)
}

fn resolve_node(
    node: &mut Node,
    table: &DecoderTable,
    resolved: &mut usize,
) -> Result<(), ResolveError> {
    if let Some(replacement) = resolve_call(node, table)? {
        *node = replacement;
        *resolved += 1;
        // Replacements are literals; nothing below them to resolve
        return Ok(());
    }
    for child in navigate::children_mut(node) {
        resolve_node(child, table, resolved)?;
    }
    Ok(())
}

fn resolve_call(node: &Node, table: &DecoderTable) -> Result<Option<Node>, ResolveError> {
    let Node::Call { callee, arguments } = node else {
        return Ok(None);
    };

    match callee.as_ref() {
        // table.name(literal)
        Node::StaticMember { object, property } => {
            if !is_table_ident(object, table) {
                return Ok(None);
            }
            let args = literal_arguments(property, arguments)?;
            let value = table.invoke(property, args)?;
            Ok(Some(value_to_literal(property, value)?))
        }
        // table["name"]()
        Node::ComputedMember { object, property } => {
            if !is_table_ident(object, table) {
                return Ok(None);
            }
            let Node::Str { value: name } = property.as_ref() else {
                return Err(ResolveError::new(
                    "computed decoder call site with a non-literal key",
                ));
            };
            let args = literal_arguments(name, arguments)?;
            let value = table.invoke(name, args)?;
            Ok(Some(value_to_literal(name, value)?))
        }
        _ => Ok(None),
    }
}

fn is_table_ident(object: &Node, table: &DecoderTable) -> bool {
    matches!(object, Node::Ident { name } if name == table.binding())
}

fn literal_arguments(name: &str, arguments: &[Node]) -> Result<Vec<Value>, ResolveError> {
    arguments
        .iter()
        .map(|argument| {
            literal_value(argument).ok_or_else(|| {
                ResolveError::new(format!(
                    "decoder call site '{}' has a non-literal argument",
                    name
                ))
            })
        })
        .collect()
}

/// The runtime value of a literal argument node, if it is one.
fn literal_value(node: &Node) -> Option<Value> {
    match node {
        Node::Number { value } => Some(Value::Num(*value)),
        Node::Str { value } => Some(Value::Str(value.clone())),
        Node::Bool { value } => Some(Value::Bool(*value)),
        Node::Null => Some(Value::Null),
        Node::Unary {
            op: UnaryOp::Neg,
            operand,
        } => match operand.as_ref() {
            Node::Number { value } => Some(Value::Num(-*value)),
            _ => None,
        },
        _ => None,
    }
}

fn value_to_literal(name: &str, value: Value) -> Result<Node, ResolveError> {
    match value {
        Value::Num(value) => Ok(Node::Number { value }),
        Value::Str(value) => Ok(Node::Str { value }),
        Value::Bool(value) => Ok(Node::Bool { value }),
        Value::Null => Ok(Node::Null),
        _ => Err(ResolveError::new(format!(
            "decoder '{}' returned a non-literal value",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::print_script;
    use crate::parse_source_silent;

    const BOOTSTRAP: &str = "var decoders;\n\
        var setup = [].slice.call([]);\n\
        eval(\"decoders.dup = function (x) { return x * 2; };\\n\\\n\
        decoders.text = function (i) { return [\\\"alpha\\\", \\\"beta\\\"][i]; };\\n\\\n\
        decoders.fixed = function () { return 1337; };\");\n";

    fn parse(source: &str) -> Node {
        parse_source_silent(source).expect("parse errors")
    }

    #[test]
    fn test_build_table_from_bootstrap() {
        let tree = parse(&format!("{}log(decoders.dup(21));", BOOTSTRAP));
        let table = build_table(&tree).unwrap().expect("table expected");
        assert_eq!(table.binding(), "decoders");
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_no_bootstrap_is_not_an_error() {
        let tree = parse("var x = 1; log(x);");
        assert!(build_table(&tree).unwrap().is_none());
    }

    #[test]
    fn test_partial_bootstrap_is_an_error() {
        // eval call present, table declaration missing
        let tree = parse("var setup = [].slice.call([]); eval(\"1\");");
        assert!(build_table(&tree).is_err());
    }

    #[test]
    fn test_resolve_method_call_site() {
        let mut tree = parse(&format!("{}log(decoders.dup(21));", BOOTSTRAP));
        let table = build_table(&tree).unwrap().unwrap();
        let resolved = resolve_call_sites(&mut tree, &table).unwrap();
        assert_eq!(resolved, 1);
        assert!(print_script(&tree).contains("log(42);"));
    }

    #[test]
    fn test_resolve_computed_call_site() {
        let mut tree = parse(&format!("{}log(decoders[\"fixed\"]());", BOOTSTRAP));
        let table = build_table(&tree).unwrap().unwrap();
        resolve_call_sites(&mut tree, &table).unwrap();
        assert!(print_script(&tree).contains("log(1337);"));
    }

    #[test]
    fn test_string_result_becomes_string_literal() {
        let mut tree = parse(&format!("{}log(decoders.text(1));", BOOTSTRAP));
        let table = build_table(&tree).unwrap().unwrap();
        resolve_call_sites(&mut tree, &table).unwrap();
        assert!(print_script(&tree).contains("log(\"beta\");"));
    }

    #[test]
    fn test_absent_entry_aborts() {
        let mut tree = parse(&format!("{}log(decoders.missing(0));", BOOTSTRAP));
        let table = build_table(&tree).unwrap().unwrap();
        assert!(resolve_call_sites(&mut tree, &table).is_err());
    }

    #[test]
    fn test_unrelated_member_calls_untouched() {
        let mut tree = parse(&format!("{}console.log(1);", BOOTSTRAP));
        let table = build_table(&tree).unwrap().unwrap();
        let resolved = resolve_call_sites(&mut tree, &table).unwrap();
        assert_eq!(resolved, 0);
        assert!(print_script(&tree).contains("console.log(1);"));
    }
}

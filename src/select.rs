//! The selector engine: compiled structural predicates over tree nodes.
//!
//! A query names a node kind and constrains nested attribute paths, e.g.
//! `Declarator[init=null]`, `Call[callee.name="eval"][arguments.0.kind=Str]`,
//! `Block[body.length=1][body.0.kind=For]`. Paths walk named fields, numeric
//! list indices, and the pseudo-fields `kind` and `length`. Probing a field
//! a node does not have is "no match", never an error.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::ast::attr::AttrValue;
use crate::ast::{navigate, Node, NodeKind};

/// A malformed query. Selectors are compiled from string constants inside
/// the passes, so this surfacing at runtime is an engine defect.
#[derive(Clone, Debug)]
pub struct QueryError {
    pub query: String,
    pub message: String,
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bad selector '{}': {}", self.query, self.message)
    }
}

impl std::error::Error for QueryError {}

/// A compiled, reusable, stateless predicate over nodes.
#[derive(Clone, Debug)]
pub struct Selector {
    kind: Option<NodeKind>,
    predicates: Vec<Predicate>,
}

#[derive(Clone, Debug)]
struct Predicate {
    path: Vec<PathSegment>,
    test: PredTest,
}

#[derive(Clone, Debug)]
enum PathSegment {
    Field(String),
    Index(usize),
    /// The kind name of the node at this point in the path.
    Kind,
    /// The length of the list at this point in the path.
    Length,
}

#[derive(Clone, Debug)]
enum PredTest {
    /// `[path=null]` — the field must be absent.
    Absent,
    /// `[path]` — the field must be present.
    Present,
    Num(f64),
    Str(String),
    Bool(bool),
}

impl Selector {
    /// Compile a query string into a selector.
    pub fn compile(query: &str) -> Result<Selector, QueryError> {
        QueryParser::new(query).parse()
    }

    /// Whether this selector matches a single node. Matching is local: the
    /// node's children are only inspected through explicit attribute paths.
    pub fn matches(&self, node: &Node) -> bool {
        if let Some(kind) = self.kind {
            if node.kind() != kind {
                return false;
            }
        }
        self.predicates.iter().all(|p| p.matches(node))
    }

    /// All matching nodes under `root`, in document (preorder) order.
    pub fn find_all<'a>(&self, root: &'a Node) -> Vec<&'a Node> {
        let mut out = Vec::new();
        navigate::walk(root, &mut |node| {
            if self.matches(node) {
                out.push(node);
            }
        });
        out
    }

    /// The first matching node in document order.
    pub fn find_first<'a>(&self, root: &'a Node) -> Option<&'a Node> {
        self.find_all(root).into_iter().next()
    }
}

impl Predicate {
    fn matches(&self, node: &Node) -> bool {
        let mut current = AttrValue::Node(node);
        for segment in &self.path {
            current = match (current, segment) {
                (AttrValue::Node(n), PathSegment::Kind) => AttrValue::Str(n.kind().name()),
                (AttrValue::Node(n), PathSegment::Field(field)) => n.attr(field),
                (AttrValue::List(list), PathSegment::Index(i)) => match list.get(*i) {
                    Some(n) => AttrValue::Node(n),
                    None => AttrValue::Absent,
                },
                (AttrValue::List(list), PathSegment::Length) => AttrValue::Num(list.len() as f64),
                _ => AttrValue::Absent,
            };
        }

        match (&self.test, current) {
            (PredTest::Absent, AttrValue::Absent) => true,
            (PredTest::Absent, _) => false,
            (PredTest::Present, AttrValue::Absent) => false,
            (PredTest::Present, _) => true,
            (PredTest::Num(expected), AttrValue::Num(actual)) => *expected == actual,
            (PredTest::Str(expected), AttrValue::Str(actual)) => expected == actual,
            (PredTest::Bool(expected), AttrValue::Bool(actual)) => *expected == actual,
            _ => false,
        }
    }
}

/// Compile with a process-wide cache keyed by query text. Selectors are
/// stateless, so sharing compiled clones is sound.
pub fn compiled(query: &str) -> Result<Selector, QueryError> {
    static CACHE: OnceLock<Mutex<HashMap<String, Selector>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));

    let mut cache = cache.lock().unwrap();
    if let Some(selector) = cache.get(query) {
        return Ok(selector.clone());
    }
    let selector = Selector::compile(query)?;
    cache.insert(query.to_string(), selector.clone());
    Ok(selector)
}

struct QueryParser<'q> {
    query: &'q str,
    bytes: &'q [u8],
    pos: usize,
}

impl<'q> QueryParser<'q> {
    fn new(query: &'q str) -> Self {
        Self {
            query,
            bytes: query.as_bytes(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<Selector, QueryError> {
        let kind = if self.peek().is_ascii_alphabetic() {
            let name = self.scan_word();
            match NodeKind::from_name(&name) {
                Some(kind) => Some(kind),
                None => return Err(self.error(&format!("unknown node kind '{}'", name))),
            }
        } else {
            None
        };

        let mut predicates = Vec::new();
        while self.pos < self.bytes.len() {
            if self.peek() != b'[' {
                return Err(self.error("expected '['"));
            }
            self.pos += 1;
            predicates.push(self.parse_predicate()?);
            if self.peek() != b']' {
                return Err(self.error("expected ']'"));
            }
            self.pos += 1;
        }

        if kind.is_none() && predicates.is_empty() {
            return Err(self.error("empty query"));
        }
        Ok(Selector { kind, predicates })
    }

    fn parse_predicate(&mut self) -> Result<Predicate, QueryError> {
        let mut path = Vec::new();
        loop {
            let segment = if self.peek().is_ascii_digit() {
                let digits = self.scan_digits();
                PathSegment::Index(
                    digits
                        .parse()
                        .map_err(|_| self.error("list index out of range"))?,
                )
            } else {
                let word = self.scan_word();
                if word.is_empty() {
                    return Err(self.error("expected attribute name"));
                }
                match word.as_str() {
                    "kind" => PathSegment::Kind,
                    "length" => PathSegment::Length,
                    _ => PathSegment::Field(word),
                }
            };
            path.push(segment);
            if self.peek() == b'.' {
                self.pos += 1;
            } else {
                break;
            }
        }

        let test = if self.peek() == b'=' {
            self.pos += 1;
            self.parse_value()?
        } else {
            PredTest::Present
        };

        Ok(Predicate { path, test })
    }

    fn parse_value(&mut self) -> Result<PredTest, QueryError> {
        match self.peek() {
            b'"' | b'\'' => {
                let quote = self.peek();
                self.pos += 1;
                let mut value = String::new();
                while self.pos < self.bytes.len() && self.bytes[self.pos] != quote {
                    if self.bytes[self.pos] == b'\\' && self.pos + 1 < self.bytes.len() {
                        self.pos += 1;
                    }
                    value.push(self.bytes[self.pos] as char);
                    self.pos += 1;
                }
                if self.pos >= self.bytes.len() {
                    return Err(self.error("unterminated string value"));
                }
                self.pos += 1; // closing quote
                Ok(PredTest::Str(value))
            }
            b'-' | b'0'..=b'9' => {
                let start = self.pos;
                if self.peek() == b'-' {
                    self.pos += 1;
                }
                while self
                    .bytes
                    .get(self.pos)
                    .map(|b| b.is_ascii_digit() || *b == b'.')
                    .unwrap_or(false)
                {
                    self.pos += 1;
                }
                let text = &self.query[start..self.pos];
                text.parse::<f64>()
                    .map(PredTest::Num)
                    .map_err(|_| self.error(&format!("bad number '{}'", text)))
            }
            _ => {
                let word = self.scan_word();
                match word.as_str() {
                    "" => Err(self.error("expected value")),
                    "null" => Ok(PredTest::Absent),
                    "true" => Ok(PredTest::Bool(true)),
                    "false" => Ok(PredTest::Bool(false)),
                    // Bare word: string or kind-name comparison
                    _ => Ok(PredTest::Str(word)),
                }
            }
        }
    }

    fn scan_word(&mut self) -> String {
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .map(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'$')
            .unwrap_or(false)
        {
            self.pos += 1;
        }
        self.query[start..self.pos].to_string()
    }

    fn scan_digits(&mut self) -> String {
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .map(|b| b.is_ascii_digit())
            .unwrap_or(false)
        {
            self.pos += 1;
        }
        self.query[start..self.pos].to_string()
    }

    fn peek(&self) -> u8 {
        self.bytes.get(self.pos).copied().unwrap_or(0)
    }

    fn error(&self, message: &str) -> QueryError {
        QueryError {
            query: self.query.to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source_silent;

    fn parse(source: &str) -> Node {
        parse_source_silent(source).expect("parse errors")
    }

    #[test]
    fn test_kind_only() {
        let tree = parse("while (a) b(); while (c) d();");
        let selector = Selector::compile("While").unwrap();
        assert_eq!(selector.find_all(&tree).len(), 2);
    }

    #[test]
    fn test_absent_field() {
        let tree = parse("var decoders; var x = null; var y = 1;");
        let selector = Selector::compile("Declarator[init=null]").unwrap();
        let matches = selector.find_all(&tree);
        // `var x = null` has a Null initializer, which is present
        assert_eq!(matches.len(), 1);
        assert!(matches!(matches[0], Node::Declarator { name, .. } if name == "decoders"));
    }

    #[test]
    fn test_nested_path_string() {
        let tree = parse("eval(\"code\"); other(\"x\");");
        let selector =
            Selector::compile("Call[callee.name=\"eval\"][arguments.0.kind=Str]").unwrap();
        assert_eq!(selector.find_all(&tree).len(), 1);
    }

    #[test]
    fn test_numeric_value_and_index() {
        let tree = parse("var s = 0; switch (s) { case 0: s = 65535; break; }");
        let selector = Selector::compile("Assign[value.value=65535]").unwrap();
        assert_eq!(selector.find_all(&tree).len(), 1);
    }

    #[test]
    fn test_length_pseudo_field() {
        let tree = parse("{ for (;;) x(); } { a(); b(); }");
        let selector = Selector::compile("Block[body.length=1][body.0.kind=For]").unwrap();
        assert_eq!(selector.find_all(&tree).len(), 1);
    }

    #[test]
    fn test_name_by_interpolated_query() {
        let tree = parse("var step1 = 0; var other = 1;");
        let query = format!("VarDecl[declarators.0.name=\"{}\"]", "step1");
        let selector = Selector::compile(&query).unwrap();
        assert_eq!(selector.find_all(&tree).len(), 1);
    }

    #[test]
    fn test_document_order() {
        let tree = parse("first(); { second(); } third();");
        let selector = Selector::compile("Call").unwrap();
        let names: Vec<_> = selector
            .find_all(&tree)
            .iter()
            .map(|n| match n {
                Node::Call { callee, .. } => match callee.as_ref() {
                    Node::Ident { name } => name.clone(),
                    _ => unreachable!(),
                },
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_probing_missing_field_is_no_match() {
        let tree = parse("a + b;");
        let selector = Selector::compile("Binary[callee.name=\"eval\"]").unwrap();
        assert!(selector.find_all(&tree).is_empty());
    }

    #[test]
    fn test_unknown_kind_is_compile_error() {
        assert!(Selector::compile("WhileStatement").is_err());
    }

    #[test]
    fn test_malformed_query_is_compile_error() {
        assert!(Selector::compile("While[").is_err());
        assert!(Selector::compile("While[init=").is_err());
        assert!(Selector::compile("").is_err());
    }

    #[test]
    fn test_cache_returns_equivalent_selector() {
        let first = compiled("While").unwrap();
        let second = compiled("While").unwrap();
        let tree = parse("while (a) b();");
        assert_eq!(first.find_all(&tree).len(), second.find_all(&tree).len());
    }
}

pub mod ast;
pub mod decode;
pub mod diagnostic;
pub mod eval;
pub mod format;
pub mod lexeme;
pub mod lexer;
pub mod parser;
pub mod passes;
pub mod select;
pub mod span;

use ast::Node;
use decode::ResolveError;
use diagnostic::{render_diagnostics, Diagnostic};
use lexer::Lexer;
use parser::Parser;
use passes::PassOutcome;
use select::QueryError;

pub use format::print_script;

/// A fatal pipeline condition. The run aborts with no partial output;
/// shape-guard mismatches are not errors and never surface here.
#[derive(Debug)]
pub enum Error {
    /// The input could not be parsed.
    Parse(Vec<Diagnostic>),
    /// An internal selector failed to compile — an engine defect, not
    /// something input can trigger.
    Query(QueryError),
    /// Decoder discovery, helper execution, or call-site resolution failed.
    Resolution(ResolveError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Parse(diagnostics) => {
                write!(f, "input could not be parsed ({} errors)", diagnostics.len())
            }
            Error::Query(err) => write!(f, "{}", err),
            Error::Resolution(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<ResolveError> for Error {
    fn from(err: ResolveError) -> Self {
        Error::Resolution(err)
    }
}

pub fn parse_source(source: &str, filename: &str) -> Result<Node, Vec<Diagnostic>> {
    match parse_source_silent(source) {
        Ok(tree) => Ok(tree),
        Err(errors) => {
            render_diagnostics(&errors, filename, source);
            Err(errors)
        }
    }
}

pub fn parse_source_silent(source: &str) -> Result<Node, Vec<Diagnostic>> {
    let (tokens, lex_errors) = Lexer::new(source).tokenize();
    if !lex_errors.is_empty() {
        return Err(lex_errors);
    }
    Parser::new(tokens).parse_script()
}

/// Deobfuscate a complete program: parse, run the pass pipeline, print.
pub fn deobfuscate(source: &str) -> Result<String, Error> {
    let mut tree = parse_source_silent(source).map_err(Error::Parse)?;
    deobfuscate_tree(&mut tree)?;
    Ok(print_script(&tree))
}

/// Run the full pass pipeline over a parsed tree, in fixed order. Progress
/// and flagged invariant violations go to stderr; the tree is the only
/// other output.
pub fn deobfuscate_tree(tree: &mut Node) -> Result<(), Error> {
    // Decoder resolution first: every later pass assumes indirect values
    // are already literal.
    let table = decode::build_table(tree)?;
    match &table {
        Some(table) => {
            eprintln!("Decoders name: {}", table.binding());
            eprintln!("Setup args name: {}", table.args_binding());
            eprintln!("Found {} decoders", table.len());
            let resolved = decode::resolve_call_sites(tree, table)?;
            eprintln!("Resolved {} decoder call sites", resolved);
        }
        None => eprintln!("No decoder bootstrap found, skipping resolution"),
    }

    let folds = passes::fold::fold_constants(tree)?;
    if folds > 0 {
        eprintln!("Folded {} constant expressions", folds);
    }

    report(passes::unflatten::rebuild_ifs(tree)?);
    report(passes::unflatten::rebuild_fors(tree)?);
    report(passes::unflatten::rebuild_do_whiles(tree)?);

    passes::idiom::strip_dead_wrappers(tree)?;
    passes::idiom::squish_templates(tree)?;
    passes::idiom::squish_boolean_literals(tree)?;
    passes::idiom::fold_nan_compares(tree)?;

    // Cleanup strictly after every pass that could still read the table
    if let Some(table) = &table {
        report(passes::cleanup::remove_bootstrap(tree, table.binding())?);
    }

    passes::idiom::computed_to_static(tree)?;
    Ok(())
}

fn report(outcome: PassOutcome) {
    for note in &outcome.notes {
        eprintln!("{}", note);
    }
    for warning in &outcome.warnings {
        eprintln!("warning: {}", warning);
    }
}

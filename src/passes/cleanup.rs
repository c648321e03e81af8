//! Bootstrap cleanup: the final pass. The table declaration and the
//! dynamic-execution statement are fully inlined into literals by now and
//! have no remaining referents.

use super::PassOutcome;
use crate::ast::{navigate, Node};
use crate::select::{compiled, QueryError};

/// Remove the bare declaration of the decoder-table binding and the
/// top-level statement that performed the dynamic execution. Must run
/// after every pass that reads the table.
pub fn remove_bootstrap(tree: &mut Node, table_binding: &str) -> Result<PassOutcome, QueryError> {
    let mut outcome = PassOutcome::default();

    let declaration = compiled(&format!(
        "VarDecl[declarators.0.name=\"{}\"][declarators.0.init=null]",
        table_binding
    ))?;
    if navigate::remove_first(tree, &|n| declaration.matches(n)) {
        outcome.rewrites += 1;
    } else {
        outcome.warn(format!(
            "table declaration '{}' was already gone",
            table_binding
        ));
    }

    let eval_stmt = compiled("ExprStmt[expr.callee.name=\"eval\"]")?;
    if navigate::remove_first(tree, &|n| eval_stmt.matches(n)) {
        outcome.rewrites += 1;
    } else {
        outcome.warn("dynamic-execution statement was already gone".to_string());
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::print_script;
    use crate::parse_source_silent;

    #[test]
    fn test_bootstrap_removed() {
        let source = "var decoders;\nvar setup = [].slice.call([]);\neval(\"x\");\nrest();\n";
        let mut tree = parse_source_silent(source).unwrap();
        let outcome = remove_bootstrap(&mut tree, "decoders").unwrap();
        assert_eq!(outcome.rewrites, 2);
        assert!(outcome.warnings.is_empty());
        assert_eq!(
            print_script(&tree),
            "var setup = [].slice.call([]);\nrest();\n"
        );
    }

    #[test]
    fn test_initialized_declaration_of_same_name_kept() {
        let source = "var decoders = 1;\neval(\"x\");\n";
        let mut tree = parse_source_silent(source).unwrap();
        let outcome = remove_bootstrap(&mut tree, "decoders").unwrap();
        // The initialized declaration is a different binding shape
        assert_eq!(outcome.warnings.len(), 1);
        assert!(print_script(&tree).contains("var decoders = 1;"));
    }

    #[test]
    fn test_absence_is_flagged_not_fatal() {
        let source = "plain();\n";
        let mut tree = parse_source_silent(source).unwrap();
        let outcome = remove_bootstrap(&mut tree, "decoders").unwrap();
        assert_eq!(outcome.rewrites, 0);
        assert_eq!(outcome.warnings.len(), 2);
        assert_eq!(print_script(&tree), "plain();\n");
    }
}

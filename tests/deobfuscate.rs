//! End-to-end pipeline tests over synthetic obfuscated programs.

use undefender::deobfuscate;

const OBFUSCATED: &str = r#"var _d;
var _a = [].slice.call([]);
eval("_d.s0 = function (i) { return [\"Hello\", \"world\"][i]; };\n_d.n0 = function () { return 1337; };");
var msg = `${_d.s0(0)}, ${_d.s0(1)}!`;
var t = !![];
var f = NaN === NaN;
var s = 0;
while (s != 65535) switch (s) {
    case 0:
        s = flag ? 1 : 2;
        break;
    case 1:
        s = 65535;
        { log(msg); }
        break;
    case 2:
        s = 65535;
        { log(12345678 - 12345677); }
        break;
}
log(_d["n0"]());
"#;

const EXPECTED: &str = "var _a = [].slice.call([]);\n\
var msg = `Hello, world!`;\n\
var t = true;\n\
var f = false;\n\
if (flag) {\n    log(msg);\n} else {\n    log(1);\n}\n\
log(1337);\n";

#[test]
fn test_full_pipeline_reconstruction() {
    let output = deobfuscate(OBFUSCATED).expect("pipeline failed");
    assert_eq!(output, EXPECTED);
}

#[test]
fn test_pipeline_is_idempotent() {
    let once = deobfuscate(OBFUSCATED).unwrap();
    let twice = deobfuscate(&once).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_pipeline_is_deterministic() {
    let first = deobfuscate(OBFUSCATED).unwrap();
    let second = deobfuscate(OBFUSCATED).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_decoder_round_trip() {
    let source = "var tbl;\n\
        var setup = [].slice.call([]);\n\
        eval(\"tbl.dup = function (x) { return x * 2; };\");\n\
        use_(tbl.dup(21));\n";
    let output = deobfuscate(source).unwrap();
    assert_eq!(
        output,
        "var setup = [].slice.call([]);\nuse_(42);\n"
    );
}

#[test]
fn test_for_shape_end_to_end() {
    let source = "\
var s = 0;
var i;
while (s != 65535) {
    switch (s) {
        case 0:
            s = 1;
            i = 0;
            break;
        case 1:
            s = i < 3 ? 2 : 65535;
            break;
        case 2:
            s = 3;
            { log(i); }
            break;
        case 3:
            s = 1;
            i++;
            break;
    }
}
";
    let output = deobfuscate(source).unwrap();
    assert_eq!(output, "for (let i = 0; i < 3; i++) {\n    log(i);\n}\n");
}

#[test]
fn test_failing_helper_aborts_with_no_output() {
    let source = "var tbl;\n\
        var setup = [].slice.call([]);\n\
        eval(\"throw 'broken';\");\n\
        use_(tbl.dup(21));\n";
    let result = deobfuscate(source);
    assert!(matches!(result, Err(undefender::Error::Resolution(_))));
}

#[test]
fn test_absent_table_entry_aborts() {
    let source = "var tbl;\n\
        var setup = [].slice.call([]);\n\
        eval(\"tbl.a = function () { return 1; };\");\n\
        use_(tbl.other(2));\n";
    let result = deobfuscate(source);
    assert!(matches!(result, Err(undefender::Error::Resolution(_))));
}

#[test]
fn test_unparsable_input_is_rejected() {
    let result = deobfuscate("var = = ;");
    assert!(matches!(result, Err(undefender::Error::Parse(_))));
}

#[test]
fn test_input_read_from_file() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(OBFUSCATED.as_bytes()).unwrap();

    let source = std::fs::read_to_string(file.path()).unwrap();
    let output = deobfuscate(&source).unwrap();
    assert_eq!(output, EXPECTED);
}

use clap::Parser;
use std::io::Read;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "undefender",
    version,
    about = "Deobfuscate JavaScript protected by PreEmptive's JSDefender demo",
    after_help = "WARNING: Only deobfuscate scripts you trust. Decoder helper code \
extracted from the input is executed to rebuild its string table."
)]
struct Cli {
    /// Obfuscated JavaScript file ('-' reads standard input)
    file: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    let (source, display_name) = read_input(&cli.file);

    let mut tree = match undefender::parse_source(&source, &display_name) {
        Ok(tree) => tree,
        Err(_) => {
            eprintln!("error: '{}' could not be parsed", display_name);
            process::exit(1);
        }
    };

    if let Err(e) = undefender::deobfuscate_tree(&mut tree) {
        eprintln!("error: {}", e);
        process::exit(1);
    }

    eprintln!("=== Done deobfuscating, writing result! ===");
    print!("{}", undefender::print_script(&tree));
}

fn read_input(path: &PathBuf) -> (String, String) {
    if path.as_os_str() == "-" {
        let mut source = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut source) {
            eprintln!("error: cannot read standard input: {}", e);
            process::exit(1);
        }
        return (source, "<stdin>".to_string());
    }

    match std::fs::read_to_string(path) {
        Ok(source) => (source, path.display().to_string()),
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

use anyhow::{Context, Result};
use std::{fs, path::Path};

pub fn read_file_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

pub fn display_name(path: &Path) -> &str {
    path.to_str().unwrap_or("<unknown>")
}

pub fn print_help() {
    println!("Usage: f90check [OPTIONS] <COMMAND> <input>");
    println!("\nCommands:");
    println!("  lex <input>          Lex the input file and print tokens");
    println!("  parse <input>        Parse the input file and print the AST");
    println!("  check <input>        Check every procedure reference in the input file");
    println!("  dump <input>         Print the characteristics of every procedure");
    println!("\nOptions:");
    println!("  --Wall               Enable all warnings");
    println!("  --Werror             Treat warnings as errors");
    println!("  --implicit-external  Check calls to external procedures against their definitions");
    println!("  --quiet              Suppress all output except errors");
    println!("  --help               Show this help message");
    println!("  --version            Show version information");
    println!("\nSource directives:");
    println!("  !#allow(<group>)     Silence a warning group");
    println!("  !#deny(<group>)      Report a warning group as errors");
    println!("  !#error(<group>)     Same as deny");
}

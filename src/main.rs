use anyhow::Result;
use std::path::Path;
use structopt::StructOpt;

use f90check::errors::CompileErrorKind;
use f90check::{lexer, parser, resolve, sema};

mod cli;
mod utils;

fn main() -> Result<()> {
    env_logger::init();
    let args = cli::Cli::from_args();

    if args.help {
        utils::print_help();
        return Ok(());
    }

    if args.version {
        let version = env!("CARGO_PKG_VERSION");
        println!("f90check version: {}", version);
        return Ok(());
    }

    match args.cmd.clone().unwrap_or(cli::Command::Help) {
        cli::Command::Lex { input } => {
            let src = utils::read_file_to_string(&input)?;
            let tokens = lexer::lex(&src);
            for t in tokens {
                println!("{:?}", t);
            }
        }
        cli::Command::Parse { input } => {
            let src = utils::read_file_to_string(&input)?;
            let tokens = lexer::lex(&src);
            match parser::parse_with_src(&src, &tokens, utils::display_name(&input)) {
                Ok(p) => println!("{:#?}", p),
                Err(_) => std::process::exit(1),
            }
        }
        cli::Command::Check { input } => {
            if !check(&input, &args)? {
                std::process::exit(1);
            }
        }
        cli::Command::Dump { input } => {
            let src = utils::read_file_to_string(&input)?;
            let tokens = lexer::lex(&src);
            let program = match parser::parse_with_src(&src, &tokens, utils::display_name(&input)) {
                Ok(p) => p,
                Err(_) => std::process::exit(1),
            };
            let resolved = resolve::resolve(&program);
            for e in &resolved.errors {
                eprintln!("{}", e);
            }
            println!("{}", sema::dump(&resolved));
        }
        cli::Command::Help => utils::print_help(),
    }
    Ok(())
}

/// Returns whether the file passed.
fn check(input: &Path, args: &cli::Cli) -> Result<bool> {
    let src = utils::read_file_to_string(input)?;
    let tokens = lexer::lex(&src);
    let mut settings = sema::parse_directives(&src);
    settings.wall |= args.wall;
    settings.werror |= args.werror;
    settings.implicit_external |= args.implicit_external;

    let program = match parser::parse_with_src(&src, &tokens, utils::display_name(input)) {
        Ok(p) => p,
        Err(_) => return Ok(false),
    };
    let resolved = resolve::resolve(&program);
    let sema_errs = if args.quiet {
        let errs = sema::analyze(&resolved, &settings);
        for e in errs.iter().filter(|e| e.is_error()) {
            eprintln!("{}", e);
        }
        errs
    } else {
        sema::analyze_with_src(&resolved, &src, utils::display_name(input), &settings)
    };

    let has_error = sema_errs
        .iter()
        .any(|e| !matches!(e.kind, CompileErrorKind::Warning));
    if has_error || (settings.werror && !sema_errs.is_empty()) {
        return Ok(false);
    }
    if sema_errs.is_empty() && !args.quiet {
        println!("No problems found.");
    }
    Ok(true)
}

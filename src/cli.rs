use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "f90check",
    about = "Checks Fortran procedure references against their interfaces"
)]
pub struct Cli {
    /// Enable all warnings
    #[structopt(long = "Wall", help = "Enable all warnings")]
    pub wall: bool,
    /// Treat warnings as errors
    #[structopt(long = "Werror", help = "Treat warnings as errors")]
    pub werror: bool,

    #[structopt(
        long = "implicit-external",
        help = "Check calls to external procedures against their definitions in the same file"
    )]
    pub implicit_external: bool,

    #[structopt(
        long = "quiet",
        short = "q",
        help = "Suppress all output except errors"
    )]
    pub quiet: bool,

    #[structopt(long = "help", short = "h", help = "Show this help message")]
    pub help: bool,

    #[structopt(subcommand)]
    pub cmd: Option<Command>,

    #[structopt(long = "version", short = "v", help = "Show version information")]
    pub version: bool,
}

#[derive(Debug, StructOpt, Clone)]
pub enum Command {
    /// Lex only: dump tokens
    Lex {
        /// Input .f90 file
        input: PathBuf,
    },
    /// Parse only: dump AST
    Parse {
        /// Input .f90 file
        input: PathBuf,
    },
    /// Resolve names and check every procedure reference
    Check {
        /// Input .f90 file
        input: PathBuf,
    },
    /// Print the characteristics of every procedure
    Dump {
        /// Input .f90 file
        input: PathBuf,
    },
    Help,
}

//! Procedure characteristics for Fortran 90 and later: how procedures are
//! described, whether a call site's actual arguments fit a procedure's
//! interface, and whether the specifics of a generic can be told apart.
//!
//! [`characteristics`] builds the descriptions, [`check_call`] checks
//! references against them and [`distinguish`] compares them pairwise.
//! The front end ([`lexer`], [`parser`], [`resolve`]) and [`sema`] drive
//! them over source files.

pub mod ast;
pub mod characteristics;
pub mod check_call;
pub mod distinguish;
pub mod errors;
pub mod expr;
pub mod fold;
pub mod intrinsics;
pub mod lexer;
pub mod messages;
pub mod parser;
pub mod resolve;
pub mod sema;
pub mod symbol;
pub mod types;

//! Semantic core of a C99 to Go source-to-source translator.
//!
//! The crate consumes an already-parsed, already-analyzed syntax tree and
//! emits Go source text plus the static memory-layout metadata the runtime
//! initializer needs. Lexing, parsing, constant folding and escape analysis
//! are external collaborators.

/// Contains the consumed syntax tree.
pub mod ast;
/// Contains the code generation components.
pub mod codegen;
/// Contains the error types for the translation core.
pub mod error;
pub mod options;
/// Contains the semantic type algebra and scope resolution.
pub mod semantic;
pub mod source;
/// Contains the per-unit translation driver.
pub mod translator;

pub use symbol_table::GlobalSymbol as Name;

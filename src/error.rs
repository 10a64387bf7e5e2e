//! The fatal error tier.
//!
//! Expected negative outcomes (a failed equality or compatibility check) are
//! ordinary boolean results and never appear here. A `TranslationError` is an
//! internal modeling gap: a type pair, statement shape or assignment
//! combination the rule set does not cover. It aborts translation of the
//! current unit; there is no retry and no silent default.

use thiserror::Error;

use crate::source::Position;

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("{pos}: unsupported construct: {construct}")]
    UnsupportedConstruct { construct: String, pos: Position },

    #[error("{pos}: invalid assignment: {target} <- {from}")]
    InvalidAssignment {
        target: String,
        from: String,
        pos: Position,
    },

    #[error("{pos}: incomplete type: {ty}")]
    IncompleteType { ty: String, pos: Position },
}

pub type Result<T> = std::result::Result<T, TranslationError>;

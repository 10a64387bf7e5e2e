//! Options affecting translation behavior.

/// Per-unit translation options.
#[derive(Copy, Clone, Debug)]
pub struct Options {
    /// Permit assignment between arbitrary pointer types, for sources that
    /// rely on non-conforming implicit pointer conversions.
    pub enable_pointer_compatibility: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            enable_pointer_compatibility: false,
        }
    }
}

//! Rich diagnostic error types for the rekh engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.
//!
//! Recoverable conditions (restriction violations, redundant assertions,
//! depth-limit hits during search) are logged through `tracing` and never reach
//! these types; only conditions the caller must handle become errors.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the rekh engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum RekhError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Symbol(#[from] SymbolError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Taxonomy(#[from] TaxonomyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Temporal(#[from] TemporalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Symbol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SymbolError {
    #[error("unknown symbol: {name}")]
    #[diagnostic(
        code(rekh::symbol::unknown),
        help(
            "No symbol with this name is interned and the lookup used the \
             no-create policy. Intern it first with a create policy, or load \
             a knowledge file that declares it."
        )
    )]
    Unknown { name: String },

    #[error("empty symbol name")]
    #[diagnostic(
        code(rekh::symbol::empty_name),
        help("Symbol names must contain at least one character.")
    )]
    EmptyName,

    #[error("symbol allocator exhausted: cannot allocate more than u32::MAX symbols")]
    #[diagnostic(
        code(rekh::symbol::exhausted),
        help(
            "The symbol ID space is exhausted. This is extremely unlikely \
             in practice (requires 2^32 allocations). If you see this error, \
             check for intern loops generating fresh names."
        )
    )]
    AllocatorExhausted,
}

// ---------------------------------------------------------------------------
// Taxonomy errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TaxonomyError {
    #[error("redundant isa edge: {parent} is already an ancestor of {child}")]
    #[diagnostic(
        code(rekh::taxonomy::redundant_isa),
        help(
            "The parent is already reachable from the child, so the edge adds \
             nothing. Loaders may safely ignore this and continue."
        )
    )]
    RedundantIsa { child: String, parent: String },

    #[error("isa edge would create a cycle: {child} is an ancestor of {parent}")]
    #[diagnostic(
        code(rekh::taxonomy::isa_cycle),
        help(
            "The parent/child relation must stay acyclic. Check the knowledge \
             source for a reversed isa declaration."
        )
    )]
    IsaCycle { child: String, parent: String },
}

// ---------------------------------------------------------------------------
// Temporal errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TemporalError {
    #[error("invalid timestamp: {text}")]
    #[diagnostic(
        code(rekh::temporal::invalid_timestamp),
        help(
            "Timestamps parse from YYYYMMDD or YYYYMMDDTHHMMSS forms, the \
             sentinels `na`, `-inf`, `inf`, or the word `now`."
        )
    )]
    InvalidTimestamp { text: String },

    #[error("invalid time range: {text}")]
    #[diagnostic(
        code(rekh::temporal::invalid_range),
        help("A range is written `start:stop` or as a single point timestamp.")
    )]
    InvalidRange { text: String },
}

// ---------------------------------------------------------------------------
// Context errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ContextError {
    #[error("unknown context: {id}")]
    #[diagnostic(
        code(rekh::context::unknown),
        help(
            "The context id does not name a node in the context tree. \
             Contexts are created by `sprout`; use the id it returned."
        )
    )]
    Unknown { id: u64 },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("cannot assert a non-proposition term: {text}")]
    #[diagnostic(
        code(rekh::store::not_a_proposition),
        help(
            "Only compound terms `[relation arg1 arg2 ...]` can be asserted. \
             Atomic symbols, numbers, and strings are values, not facts."
        )
    )]
    NotAProposition { text: String },

    #[error("fact table full: cannot hold more than u32::MAX facts")]
    #[diagnostic(
        code(rekh::store::table_full),
        help("The fact id space is exhausted. Split the knowledge base across engines.")
    )]
    TableFull,
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("unbalanced bracket in term: {text}")]
    #[diagnostic(
        code(rekh::parse::unbalanced),
        help("Every `[` must have a matching `]`. Check the term for a missing bracket.")
    )]
    Unbalanced { text: String },

    #[error("unterminated string literal: {text}")]
    #[diagnostic(
        code(rekh::parse::unterminated_string),
        help("String literals are delimited by double quotes; escape embedded ones as \\\".")
    )]
    UnterminatedString { text: String },

    #[error("empty term")]
    #[diagnostic(
        code(rekh::parse::empty_term),
        help("Expected a term but found nothing. Comments start with `;`.")
    )]
    EmptyTerm,

    #[error("trailing input after term: {text}")]
    #[diagnostic(
        code(rekh::parse::trailing_input),
        help("Each line holds at most one term. Split the extra input onto its own line.")
    )]
    TrailingInput { text: String },

    #[error("malformed range prefix: {text}")]
    #[diagnostic(
        code(rekh::parse::bad_range),
        help("A range prefix is written `@start:stop|` before the term, e.g. `@19940101:inf|`.")
    )]
    BadRange { text: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Temporal(#[from] TemporalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Symbol(#[from] SymbolError),
}

// ---------------------------------------------------------------------------
// Load errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum LoadError {
    #[error("failed to read knowledge file {path}: {source}")]
    #[diagnostic(
        code(rekh::load::io),
        help(
            "Check that the file exists and is readable. Files ending in .gz \
             are decompressed transparently; anything else is read as text."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(rekh::engine::invalid_config),
        help("Check the EngineConfig fields. {message}")
    )]
    InvalidConfig { message: String },

    #[error("failed to read config file {path}")]
    #[diagnostic(
        code(rekh::engine::config_file),
        help("Ensure the path exists and contains valid TOML for EngineConfig.")
    )]
    ConfigFile { path: String },
}

/// Convenience alias for functions returning rekh results.
pub type RekhResult<T> = std::result::Result<T, RekhError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_error_converts_to_rekh_error() {
        let err = SymbolError::Unknown {
            name: "ball1".into(),
        };
        let rekh: RekhError = err.into();
        assert!(matches!(rekh, RekhError::Symbol(SymbolError::Unknown { .. })));
    }

    #[test]
    fn taxonomy_error_converts_to_rekh_error() {
        let err = TaxonomyError::IsaCycle {
            child: "animal".into(),
            parent: "dog".into(),
        };
        let rekh: RekhError = err.into();
        assert!(matches!(
            rekh,
            RekhError::Taxonomy(TaxonomyError::IsaCycle { .. })
        ));
    }

    #[test]
    fn parse_error_wraps_temporal_error() {
        let temporal = TemporalError::InvalidTimestamp {
            text: "1994-01-01".into(),
        };
        let parse: ParseError = temporal.into();
        assert!(matches!(parse, ParseError::Temporal(_)));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = TaxonomyError::RedundantIsa {
            child: "dog".into(),
            parent: "animal".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("dog"));
        assert!(msg.contains("animal"));
    }
}

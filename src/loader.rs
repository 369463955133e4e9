//! Line-oriented knowledge file loading.
//!
//! Knowledge files hold one term per line, `;` comments, and optional
//! `@range|` prefixes. Files ending in `.gz` are decompressed
//! transparently. Parsing is spread across threads with `rayon`; assertion
//! stays serial so fact ids and taxonomy edges land in file order.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::context::ContextId;
use crate::engine::Engine;
use crate::error::{LoadError, RekhResult};
use crate::parse::{self, ParsedLine};
use crate::temporal::TimeRange;

/// Counters from one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    /// Lines scanned, including blanks and comments.
    pub lines: usize,
    /// Facts that made it into the store.
    pub facts: usize,
    /// Of those, `isa`/`ako` lines that also feed the taxonomy.
    pub isa_edges: usize,
    /// Of those, `ifthen` lines registered as rules.
    pub rules: usize,
    /// Lines that failed to parse or assert.
    pub errors: usize,
}

/// Load a knowledge file into the engine's root context.
pub fn load_path(engine: &Engine, path: &Path) -> RekhResult<LoadStats> {
    let mut text = String::new();
    let mut file = File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let gzipped = path.extension().is_some_and(|ext| ext == "gz");
    let read = if gzipped {
        flate2::read::GzDecoder::new(file).read_to_string(&mut text)
    } else {
        file.read_to_string(&mut text)
    };
    read.map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let stats = load_str(engine, &text, engine.contexts().root());
    info!(
        path = %path.display(),
        facts = stats.facts,
        errors = stats.errors,
        "loaded knowledge file"
    );
    Ok(stats)
}

/// Load knowledge-file text into context `cx`.
///
/// Lines without a range prefix hold always. Bad lines are logged and
/// counted; they never abort the load.
pub fn load_str(engine: &Engine, text: &str, cx: ContextId) -> LoadStats {
    let symbols = engine.symbols();
    let lines: Vec<&str> = text.lines().collect();
    let parsed: Vec<_> = lines
        .par_iter()
        .map(|line| parse::parse_line(symbols, line, cx))
        .collect();

    let core = *engine.core();
    let mut stats = LoadStats {
        lines: lines.len(),
        ..LoadStats::default()
    };
    for (lineno, result) in parsed.into_iter().enumerate() {
        let ParsedLine { range, term } = match result {
            Ok(Some(parsed)) => parsed,
            Ok(None) => continue,
            Err(err) => {
                warn!(line = lineno + 1, "unparseable line: {err}");
                stats.errors += 1;
                continue;
            }
        };
        let head = term.rel();
        let range = range.unwrap_or(TimeRange::always(cx));
        match engine.assert_term(range, term) {
            Ok(_) => {
                stats.facts += 1;
                if head == Some(core.isa) || head == Some(core.ako) {
                    stats.isa_edges += 1;
                } else if head == Some(core.ifthen) {
                    stats.rules += 1;
                }
            }
            Err(err) => {
                warn!(line = lineno + 1, "assertion failed: {err}");
                stats.errors += 1;
            }
        }
    }
    stats
}

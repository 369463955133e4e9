//! rekh CLI: temporal, context-aware commonsense knowledge engine.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use rekh::context::ContextId;
use rekh::engine::{Engine, EngineConfig};
use rekh::symbol::SymbolId;
use rekh::taxonomy::traverse::{self, TraversalConfig};
use rekh::temporal::{TimeRange, Timestamp};

#[derive(Parser)]
#[command(name = "rekh", version, about = "Temporal commonsense knowledge engine")]
struct Cli {
    /// Engine configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Knowledge files loaded before the command runs. Repeatable.
    #[arg(long, global = true)]
    load: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load knowledge files and report what was ingested.
    Load {
        /// Paths to knowledge files (.gz transparently decompressed).
        files: Vec<PathBuf>,
    },

    /// Assert a term, e.g. '[likes jim pizza]' or '@19940101:inf|[alive elvis]'.
    Assert {
        /// The term, optionally with a leading @range| prefix.
        term: String,
    },

    /// Retrieve facts matching a pattern.
    Query {
        /// Pattern with ? wildcards, optionally prefixed @range|.
        pattern: String,

        /// Timestamp or start:stop range to query at.
        #[arg(long, default_value = "now")]
        at: String,

        /// Emit matching facts as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Prove a goal and print the proof trees.
    Prove {
        /// The goal term.
        goal: String,

        /// Timestamp or start:stop range to prove at.
        #[arg(long, default_value = "now")]
        at: String,

        /// Emit proofs as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check whether one symbol is an ancestor of another.
    Isa {
        /// The candidate ancestor.
        ancestor: String,
        /// The candidate descendant.
        descendant: String,
    },

    /// Inspect the taxonomy.
    Tax {
        #[command(subcommand)]
        action: TaxAction,
    },

    /// Show engine statistics.
    Info,
}

#[derive(Subcommand)]
enum TaxAction {
    /// List ancestors of a symbol, nearest first.
    Ancestors { symbol: String },
    /// List descendants of a symbol.
    Descendants { symbol: String },
    /// Shortest undirected path between two symbols.
    Path { from: String, to: String },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_toml_path(path)?,
        None => EngineConfig::default(),
    };
    let engine = Engine::new(config)?;
    for file in &cli.load {
        engine.load(file)?;
    }

    match cli.command {
        Commands::Load { files } => {
            for file in &files {
                let stats = engine.load(file)?;
                println!(
                    "{}: {} facts ({} isa, {} rules), {} errors",
                    file.display(),
                    stats.facts,
                    stats.isa_edges,
                    stats.rules,
                    stats.errors
                );
            }
            println!("{}", engine.info());
        }

        Commands::Assert { term } => {
            let root = engine.contexts().root();
            let id = engine
                .assert_line(&term, root, Timestamp::now())?
                .ok_or_else(|| miette::miette!("nothing to assert in {term:?}"))?;
            let fact = engine
                .store()
                .fact(id)
                .ok_or_else(|| miette::miette!("fact vanished after assert"))?;
            println!(
                "{} {} {}",
                fact.id,
                fact.weighted_term().display(engine.symbols()),
                fact.range
            );
        }

        Commands::Query { pattern, at, json } => {
            let root = engine.contexts().root();
            let (prefix, term) = parse_pattern(&engine, &pattern, root)?;
            let (ts, at_range) = parse_when(&at, root)?;
            let facts = match prefix.or(at_range) {
                Some(range) => engine.retrieve_overlapping(&range, &term),
                None => engine.retrieve(ts, root, &term),
            };
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&facts).into_diagnostic()?
                );
            } else if facts.is_empty() {
                println!("no matching facts");
            } else {
                for fact in &facts {
                    println!(
                        "{} {}",
                        fact.weighted_term().display(engine.symbols()),
                        fact.range
                    );
                }
            }
        }

        Commands::Prove { goal, at, json } => {
            let root = engine.contexts().root();
            let (prefix, term) = parse_pattern(&engine, &goal, root)?;
            let (ts, range) = match prefix {
                Some(range) => (Timestamp::Na, Some(range)),
                None => parse_when(&at, root)?,
            };
            let proofs = engine.prove(ts, range.as_ref(), root, &term, &[]);
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&proofs).into_diagnostic()?
                );
            } else if proofs.is_empty() {
                println!("unprovable");
            } else {
                for (i, proof) in proofs.iter().enumerate() {
                    println!("proof {}:", i + 1);
                    print!("{}", proof.render(engine.symbols()));
                }
            }
        }

        Commands::Isa {
            ancestor,
            descendant,
        } => {
            let anc = resolve(&engine, &ancestor)?;
            let des = resolve(&engine, &descendant)?;
            println!("{}", engine.taxonomy().isa(anc, des));
        }

        Commands::Tax { action } => {
            let traversal = TraversalConfig::default();
            match action {
                TaxAction::Ancestors { symbol } => {
                    let seed = resolve(&engine, &symbol)?;
                    for id in
                        traverse::ancestors(engine.taxonomy(), engine.symbols(), seed, &traversal)
                    {
                        println!("{}", engine.symbols().name(id));
                    }
                }
                TaxAction::Descendants { symbol } => {
                    let seed = resolve(&engine, &symbol)?;
                    for id in
                        traverse::descendants(engine.taxonomy(), engine.symbols(), seed, &traversal)
                    {
                        println!("{}", engine.symbols().name(id));
                    }
                }
                TaxAction::Path { from, to } => {
                    let from = resolve(&engine, &from)?;
                    let to = resolve(&engine, &to)?;
                    match traverse::shortest_path(
                        engine.taxonomy(),
                        engine.symbols(),
                        from,
                        to,
                        traversal.max_depth,
                    ) {
                        Some(path) => {
                            let names: Vec<String> =
                                path.iter().map(|id| engine.symbols().name(*id)).collect();
                            println!("{}", names.join(" -> "));
                        }
                        None => println!("no path"),
                    }
                }
            }
        }

        Commands::Info => {
            println!("{}", engine.info());
        }
    }

    Ok(())
}

/// Resolve a symbol name already present in the engine.
fn resolve(engine: &Engine, name: &str) -> Result<SymbolId> {
    engine
        .symbols()
        .lookup(name)
        .ok_or_else(|| miette::miette!("unknown symbol: {name}"))
}

/// Split an optional `@range|` prefix off a pattern and parse the rest.
fn parse_pattern(
    engine: &Engine,
    input: &str,
    cx: ContextId,
) -> Result<(Option<TimeRange>, rekh::term::Term)> {
    let parsed = rekh::parse::parse_line(engine.symbols(), input, cx)?
        .ok_or_else(|| miette::miette!("no term in {input:?}"))?;
    Ok((parsed.range, parsed.term))
}

/// Parse `--at`: a bare timestamp, `now`, or a `start:stop` range.
fn parse_when(text: &str, cx: ContextId) -> Result<(Timestamp, Option<TimeRange>)> {
    if text.contains(':') {
        let range = TimeRange::parse(text, cx)?;
        Ok((Timestamp::Na, Some(range)))
    } else {
        let ts = Timestamp::parse(text)?;
        Ok((ts, None))
    }
}

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tsedit::config::{self, EditorConfig};
use tsedit::document::wire::RawChunk;
use tsedit::ids::{IdGenerator, SequentialIdGen, UuidIdGen};
use tsedit::ingest::{self, Format};
use tsedit::output::style::StyleMap;
use tsedit::output::{json as json_out, table};
use tsedit::playhead::{self, PlayheadState};
use tsedit::{preview, ChunkKey, DocumentStore, Editor, Event};

#[derive(Parser)]
#[command(name = "tsedit", version, about = "Chunked editing of time-coded transcripts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to config file (default: ~/.tsedit/config.toml)
    #[arg(long, global = true, env = "TSEDIT_CONFIG")]
    config: Option<PathBuf>,

    /// Segments per chunk (overrides config)
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Maximum undo entries (overrides config)
    #[arg(long, global = true)]
    history_depth: Option<usize>,

    /// Force input format: transcript, words
    #[arg(long, global = true)]
    format: Option<String>,

    /// Use sequential ids (n0, n1, ...) instead of UUIDs for new tokens
    #[arg(long, global = true)]
    sequential_ids: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a transcript and print its chunk layout
    Load {
        /// Transcript file, or - for stdin
        path: String,
    },

    /// Print chunks in wire format
    Chunks {
        /// Transcript file, or - for stdin
        path: String,

        /// Only this chunk (e.g. ed2)
        #[arg(long)]
        key: Option<String>,
    },

    /// Print the document, styled against the play-head
    Show {
        /// Transcript file, or - for stdin
        path: String,

        /// Play-head position in milliseconds
        #[arg(long)]
        at: Option<f64>,
    },

    /// Resolve a time to the segment and token under it
    Locate {
        /// Transcript file, or - for stdin
        path: String,

        /// Time in milliseconds
        ms: f64,
    },

    /// Print the read-only preview of a chunk
    Preview {
        /// Transcript file, or - for stdin
        path: String,

        /// Chunk key (e.g. ed0)
        key: String,
    },

    /// Feed a JSON-lines event stream through the editor
    Replay {
        /// Transcript file
        path: String,

        /// One event per line, e.g. {"type": "time", "ms": 1200}
        events: PathBuf,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Create default config file
    Init,
    /// Show effective configuration
    Show,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json_output = cli.json;

    let format = match cli.format.as_deref() {
        Some(f) => Some(Format::from_str(f).with_context(|| format!("Unknown format: {f}"))?),
        None => None,
    };

    let config = EditorConfig::load(cli.config.as_deref())?
        .with_overrides(cli.chunk_size, cli.history_depth)?;
    let mut ids: Box<dyn IdGenerator> = if cli.sequential_ids {
        Box::new(SequentialIdGen::default())
    } else {
        Box::new(UuidIdGen)
    };

    match cli.command {
        Commands::Load { path } => {
            let store = open(&path, format, ids.as_mut(), &config)?;
            if json_output {
                let chunks: Vec<_> = store
                    .chunks()
                    .map(|c| {
                        serde_json::json!({
                            "key": c.key,
                            "version": c.version,
                            "segments": c.segment_ids().collect::<Vec<_>>(),
                            "tokens": c.token_count(),
                            "start": c.start(),
                            "end": c.end(),
                        })
                    })
                    .collect();
                json_out::print_json(&serde_json::json!({
                    "id": store.meta().id,
                    "title": store.meta().title,
                    "language": store.meta().language,
                    "chunk_size": store.chunk_size(),
                    "chunks": chunks,
                }))?;
            } else {
                table::print_chunk_summary(&store);
            }
        }

        Commands::Chunks { path, key } => {
            let store = open(&path, format, ids.as_mut(), &config)?;
            match key {
                Some(key) => {
                    let chunk = store.get_chunk(parse_key(&key)?)?;
                    json_out::print_json(&RawChunk::from_chunk(chunk))?;
                }
                None => {
                    let chunks: Vec<_> = store
                        .chunks()
                        .map(|c| {
                            serde_json::json!({
                                "key": c.key,
                                "version": c.version,
                                "content": RawChunk::from_chunk(c),
                            })
                        })
                        .collect();
                    json_out::print_json(&chunks)?;
                }
            }
        }

        Commands::Show { path, at } => {
            let store = open(&path, format, ids.as_mut(), &config)?;
            let mut state = PlayheadState::default();
            if let Some(ms) = at {
                state.observe(ms, store.chunks());
            }
            if json_output {
                let chunks: Vec<RawChunk> = store.chunks().map(RawChunk::from_chunk).collect();
                json_out::print_json(&serde_json::json!({
                    "playhead": state,
                    "chunks": chunks,
                }))?;
            } else {
                let styles = StyleMap::from_config(&config.styles)?;
                table::print_document(&store, &state, &styles);
            }
        }

        Commands::Locate { path, ms } => {
            let store = open(&path, format, ids.as_mut(), &config)?;
            let position = playhead::locate(ms, store.chunks());
            if json_output {
                json_out::print_json(&position)?;
            } else {
                table::print_playhead(&PlayheadState {
                    time: Some(ms),
                    position,
                });
            }
        }

        Commands::Preview { path, key } => {
            let store = open(&path, format, ids.as_mut(), &config)?;
            let chunk = store.get_chunk(parse_key(&key)?)?;
            let projection = preview::project(chunk);
            if json_output {
                json_out::print_json(&projection.to_raw())?;
            } else {
                table::print_preview(&projection);
            }
        }

        Commands::Replay { path, events } => {
            let transcript = ingest::load_path(&path, format, ids.as_mut())?;
            let mut editor = Editor::new(&transcript, &config, ids)?;
            replay(&mut editor, &events, &config, json_output)?;
        }

        Commands::Config { action } => {
            run_config(&action, cli.config.as_deref(), json_output)?;
        }
    }

    Ok(())
}

fn open(
    path: &str,
    format: Option<Format>,
    ids: &mut dyn IdGenerator,
    config: &EditorConfig,
) -> Result<DocumentStore> {
    let transcript = ingest::load_path(path, format, ids)?;
    Ok(DocumentStore::load(&transcript, config.chunk_size)?)
}

fn parse_key(key: &str) -> Result<ChunkKey> {
    key.parse::<ChunkKey>().map_err(|e| anyhow!(e))
}

fn replay(
    editor: &mut Editor,
    events: &Path,
    config: &EditorConfig,
    json_output: bool,
) -> Result<()> {
    let content = std::fs::read_to_string(events)
        .with_context(|| format!("Failed to read events: {}", events.display()))?;

    let mut results = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: Event = serde_json::from_str(line)
            .with_context(|| format!("Invalid event on line {}", i + 1))?;
        let result = editor.dispatch(event);
        if json_output {
            results.push(match &result {
                Ok(outcome) => serde_json::json!({ "line": i + 1, "result": outcome }),
                Err(err) => serde_json::json!({ "line": i + 1, "error": err.to_string() }),
            });
        } else {
            table::print_outcome(i + 1, &result);
        }
    }

    if json_output {
        let chunks: Vec<RawChunk> = editor.store().chunks().map(RawChunk::from_chunk).collect();
        json_out::print_json(&serde_json::json!({
            "events": results,
            "playhead": editor.playhead(),
            "undo_depth": editor.history().undo_depth(),
            "redo_depth": editor.history().redo_depth(),
            "chunks": chunks,
        }))?;
    } else {
        println!();
        let styles = StyleMap::from_config(&config.styles)?;
        table::print_document(editor.store(), editor.playhead(), &styles);
    }
    Ok(())
}

fn run_config(action: &ConfigAction, path: Option<&Path>, json_output: bool) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let target = match path {
                Some(p) => p.to_path_buf(),
                None => config::config_path()?,
            };
            if config::init_config(Some(&target))? {
                println!("Created config at {}", target.display());
            } else {
                println!("Config already exists at {}", target.display());
            }
        }
        ConfigAction::Show => {
            let cfg = EditorConfig::load(path)?;
            if json_output {
                json_out::print_json(&cfg)?;
            } else {
                println!("{}", cfg.display());
            }
        }
    }
    Ok(())
}

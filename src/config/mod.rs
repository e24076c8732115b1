use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CHUNK_SIZE: usize = 5;
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

/// Top-level tsedit config file structure.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    /// Segments per chunk when a transcript is loaded.
    pub chunk_size: usize,
    /// Maximum undo entries kept.
    pub history_depth: usize,
    /// Style name → visual effect, handed to the renderer.
    pub styles: BTreeMap<String, String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            history_depth: DEFAULT_HISTORY_DEPTH,
            styles: default_styles(),
        }
    }
}

fn default_styles() -> BTreeMap<String, String> {
    [("active", "bold"), ("unplayed", "dim"), ("played", "plain")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl EditorConfig {
    /// Load config from `path`, or ~/.tsedit/config.toml when `None`.
    /// Returns defaults if the file doesn't exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };
        if !path.exists() {
            return Ok(EditorConfig::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut config: EditorConfig = toml::from_str(content)?;
        // Styles not mentioned in the file keep their defaults.
        for (name, effect) in default_styles() {
            config.styles.entry(name).or_insert(effect);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be at least 1");
        }
        if self.history_depth == 0 {
            bail!("history_depth must be at least 1");
        }
        Ok(())
    }

    /// Apply CLI overrides on top of the file values.
    pub fn with_overrides(
        mut self,
        chunk_size: Option<usize>,
        history_depth: Option<usize>,
    ) -> Result<Self> {
        if let Some(n) = chunk_size {
            self.chunk_size = n;
        }
        if let Some(n) = history_depth {
            self.history_depth = n;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn display(&self) -> String {
        let mut lines = vec![
            format!("chunk_size = {}", self.chunk_size),
            format!("history_depth = {}", self.history_depth),
            String::new(),
            "[styles]".to_string(),
        ];
        for (name, effect) in &self.styles {
            lines.push(format!("{name} = \"{effect}\""));
        }
        lines.join("\n")
    }
}

/// Path to the config file: ~/.tsedit/config.toml
pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".tsedit").join("config.toml"))
}

/// Default config template content.
pub fn default_config_template() -> &'static str {
    r#"# ~/.tsedit/config.toml

# Segments per independently editable chunk.
chunk_size = 5

# Undo entries kept before the oldest is dropped.
history_depth = 100

# Play-head styling: style name -> effect (bold, dim, underline, inverse, plain).
[styles]
active = "bold"
unplayed = "dim"
played = "plain"
"#
}

/// Create the config file if it doesn't already exist. Returns whether it
/// was written.
pub fn init_config(path: Option<&Path>) -> Result<bool> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(&path, default_config_template())?;
    Ok(true)
}

//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/nodetree/nodetree.toml`
//! 3. Explicit config file passed to [`Settings::load`]
//! 4. Environment variables: `NODETREE_*` prefix

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{IdGenerator, RandomIdGenerator, SequentialIdGenerator};
use crate::errors::{TreeError, TreeResult};

/// How node ids are minted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    #[default]
    Random,
    Sequential,
}

/// Identifier generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct IdSettings {
    pub strategy: IdStrategy,
    /// Only used by the sequential strategy
    pub seed: u64,
}

/// Text rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RenderSettings {
    /// Levels shown below the rendered node; deeper levels collapse to `...`.
    /// `None` means [`RenderSettings::DEFAULT_MAX_DEPTH`].
    pub max_depth: Option<usize>,
    /// Append `[id]` to every label
    pub show_ids: bool,
}

impl RenderSettings {
    /// Depth used when `max_depth` is unset. `termtree` formats and drops its
    /// trees recursively, so rendered output must stay shallow.
    pub const DEFAULT_MAX_DEPTH: usize = 256;

    pub fn effective_max_depth(&self) -> usize {
        self.max_depth.unwrap_or(Self::DEFAULT_MAX_DEPTH)
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_depth: None,
            show_ids: true,
        }
    }
}

/// Shared id generator, built on first use and handed to every caller.
pub type SharedIdGenerator = Arc<dyn IdGenerator + Send + Sync>;

#[derive(Clone, Default)]
struct GeneratorCell(OnceLock<SharedIdGenerator>);

impl fmt::Debug for GeneratorCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.0.get().is_some() { "initialized" } else { "empty" };
        write!(f, "GeneratorCell({state})")
    }
}

// Runtime state, not configuration: never part of equality.
impl PartialEq for GeneratorCell {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for GeneratorCell {}

/// Unified configuration for nodetree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Settings {
    pub ids: IdSettings,
    pub render: RenderSettings,
    #[serde(skip)]
    generator: GeneratorCell,
}

/// Get the XDG config directory for nodetree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "nodetree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("nodetree.toml"))
}

/// Expand `~`, `$VAR` and `${VAR}` in a path.
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    shellexpand::full(raw.as_ref())
        .map(|s| PathBuf::from(s.into_owned()))
        .unwrap_or_else(|_| path.to_path_buf())
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `path` - Optional config file, applied on top of the global one.
    ///   Must exist when given.
    pub fn load(path: Option<&Path>) -> TreeResult<Self> {
        Self::load_with_global(global_config_path().as_deref(), path)
    }

    /// Like [`Settings::load`], with the global layer read from `global`
    /// instead of the XDG location. `None` skips the global layer.
    #[instrument(level = "debug")]
    pub fn load_with_global(global: Option<&Path>, path: Option<&Path>) -> TreeResult<Self> {
        let mut builder = Config::builder();

        if let Some(global_path) = global {
            if global_path.exists() {
                debug!("Loading global config: {}", global_path.display());
                builder = builder.add_source(File::from(global_path).required(false));
            }
        }

        if let Some(local) = path {
            let local = expand_path(local);
            debug!("Loading config: {}", local.display());
            builder = builder.add_source(File::from(local).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("NODETREE")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = builder.build().map_err(config_err)?;
        config.try_deserialize().map_err(config_err)
    }

    /// Id generator for the configured strategy.
    ///
    /// Built from `ids` on the first call. Later calls, and clones taken after
    /// it, share the same generator, so a sequential counter never restarts.
    pub fn id_generator(&self) -> SharedIdGenerator {
        let gen = self.generator.0.get_or_init(|| {
            debug!("Creating {:?} id generator", self.ids.strategy);
            let gen: SharedIdGenerator = match self.ids.strategy {
                IdStrategy::Random => Arc::new(RandomIdGenerator),
                IdStrategy::Sequential => Arc::new(SequentialIdGenerator::new(self.ids.seed)),
            };
            gen
        });
        Arc::clone(gen)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> TreeResult<String> {
        toml::to_string_pretty(self).map_err(|e| TreeError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# nodetree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/nodetree/nodetree.toml
#   File:   path passed to Settings::load
#   Env:    NODETREE_* environment variables, e.g. NODETREE_IDS__STRATEGY=sequential

[ids]
# "random" (uuid v4) or "sequential" (deterministic, seeded)
# strategy = "random"
# seed = 0

[render]
# Collapse levels below this depth into "..." (unset: 256)
# max_depth = 3

# Append [id] to rendered labels
# show_ids = true
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> TreeError {
    TreeError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_then_random_ids_and_ids_shown() {
        let settings = Settings::default();
        assert_eq!(settings.ids.strategy, IdStrategy::Random);
        assert_eq!(settings.ids.seed, 0);
        assert!(settings.render.show_ids);
        assert!(settings.render.max_depth.is_none());
    }

    #[test]
    fn given_template_when_parsed_then_yields_defaults() {
        let parsed: Settings = toml::from_str(&Settings::template()).unwrap();
        assert_eq!(parsed, Settings::default());
    }

    fn sequential(seed: u64) -> Settings {
        Settings {
            ids: IdSettings {
                strategy: IdStrategy::Sequential,
                seed,
            },
            ..Settings::default()
        }
    }

    #[test]
    fn given_sequential_strategy_then_equal_settings_give_equal_sequences() {
        let a = sequential(3).id_generator();
        let b = sequential(3).id_generator();
        for _ in 0..5 {
            assert_eq!(a.generate(), b.generate());
        }
    }

    #[test]
    fn given_repeated_calls_then_generator_is_shared() {
        let settings = sequential(3);
        let first = settings.id_generator().generate();
        let second = settings.id_generator().generate();
        let from_clone = settings.clone().id_generator().generate();
        assert_ne!(first, second);
        assert_ne!(second, from_clone);
        assert_ne!(first, from_clone);
    }

    #[test]
    fn given_settings_when_to_toml_then_round_trips() {
        let settings = Settings {
            render: RenderSettings {
                max_depth: Some(2),
                show_ids: false,
            },
            ..Settings::default()
        };
        let text = settings.to_toml().unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }
}

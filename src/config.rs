//! Run configuration for gherkin-ui
//!
//! Handles the skip mode and filter tags, read once per process from invocation
//! arguments, `GHERKIN_UI_*` environment variables, or a TOML file.

use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use clap::Parser;
use eyre::{Result, WrapErr};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::tags::TagSet;

/// Configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid skip mode '{0}': expected original, absolute or moderate")]
    InvalidSkipMode(String),

    #[error("run configuration was already installed")]
    AlreadyInstalled,
}

/// How a failing step affects the steps declared after it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipMode {
    /// No cascading; later steps run regardless of the failure
    Original,
    /// Every later step in the scenario becomes pending
    Absolute,
    /// Later complement steps still run; pending starts at the next main step
    #[default]
    Moderate,
}

impl SkipMode {
    /// Parse a skip mode, falling back to [`SkipMode::Moderate`] on anything unrecognised
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|err: ConfigError| {
            warn!(error = %err, "falling back to moderate skip mode");
            SkipMode::Moderate
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SkipMode::Original => "original",
            SkipMode::Absolute => "absolute",
            SkipMode::Moderate => "moderate",
        }
    }
}

impl FromStr for SkipMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "original" => Ok(SkipMode::Original),
            "absolute" => Ok(SkipMode::Absolute),
            "moderate" => Ok(SkipMode::Moderate),
            other => Err(ConfigError::InvalidSkipMode(other.to_string())),
        }
    }
}

impl fmt::Display for SkipMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SkipMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(SkipMode::parse_lenient(&raw))
    }
}

/// Filter tags as written in a config file: a list or a comma-separated string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TagSpec {
    List(Vec<String>),
    Csv(String),
}

impl From<TagSpec> for TagSet {
    fn from(spec: TagSpec) -> Self {
        match spec {
            TagSpec::List(list) => list
                .iter()
                .map(|tag| tag.trim())
                .filter(|tag| !tag.is_empty())
                .collect(),
            TagSpec::Csv(csv) => TagSet::parse_list(&csv),
        }
    }
}

fn deserialize_filter_tags<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<TagSet>, D::Error> {
    let spec = Option::<TagSpec>::deserialize(deserializer)?;
    Ok(spec.map(TagSet::from).filter(|set| !set.is_empty()))
}

/// Settings that govern a whole run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// How failures cascade to later steps
    pub skip_mode: SkipMode,
    /// Tags a group must declare to run; `None` disables filtering
    #[serde(deserialize_with = "deserialize_filter_tags")]
    pub filter_tags: Option<TagSet>,
    /// Upper bound for future and callback steps in milliseconds (0 disables it)
    pub timeout_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            skip_mode: SkipMode::Moderate,
            filter_tags: None,
            timeout_ms: 2000,
        }
    }
}

/// Config file layout
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    run: RunConfig,
}

/// Invocation arguments recognised by gherkin-ui
///
/// Anything else on the command line belongs to the host runner and is ignored.
#[derive(Parser, Debug, Default)]
#[command(name = "gherkin-ui", ignore_errors = true, disable_help_flag = true)]
#[command(disable_version_flag = true)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long, env = "GHERKIN_UI_CONFIG")]
    config: Option<String>,

    /// Skip mode: original, absolute or moderate
    #[arg(long, env = "GHERKIN_UI_SKIP_MODE")]
    skip_mode: Option<String>,

    /// Comma-separated tags a scenario or feature must carry to run
    #[arg(long, env = "GHERKIN_UI_FILTER_TAGS")]
    filter_tags: Option<String>,

    /// Async step timeout in milliseconds
    #[arg(long, env = "GHERKIN_UI_TIMEOUT_MS")]
    timeout_ms: Option<u64>,
}

impl RunConfig {
    /// Load configuration from a file path
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read {path}"))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(s: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(s).wrap_err("failed to parse TOML configuration")?;
        Ok(file.run)
    }

    /// Build configuration from invocation arguments (the first item is the program name)
    pub fn from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = Args::try_parse_from(own_args(args))
            .wrap_err("failed to read invocation arguments")?;

        let mut config = match args.config.as_deref() {
            Some(path) => Self::load(path).wrap_err("invalid gherkin-ui configuration file")?,
            None => Self::default(),
        };

        if let Some(mode) = args.skip_mode.as_deref() {
            config.skip_mode = SkipMode::parse_lenient(mode);
        }

        if let Some(tags) = args.filter_tags.as_deref() {
            let tags = TagSet::parse_list(tags);
            config.filter_tags = (!tags.is_empty()).then_some(tags);
        }

        if let Some(timeout_ms) = args.timeout_ms {
            config.timeout_ms = timeout_ms;
        }

        Ok(config)
    }

    /// Build configuration from the current process arguments and environment
    pub fn from_env() -> Result<Self> {
        Self::from_args(std::env::args_os())
    }

    /// Builder-style override of the skip mode
    pub fn with_skip_mode(mut self, skip_mode: SkipMode) -> Self {
        self.skip_mode = skip_mode;
        self
    }

    /// Builder-style override of the filter tags; an empty set disables filtering
    pub fn with_filter_tags(mut self, tags: TagSet) -> Self {
        self.filter_tags = (!tags.is_empty()).then_some(tags);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// The active filter, if any
    pub fn filter(&self) -> Option<&TagSet> {
        self.filter_tags.as_ref()
    }
}

const OWN_FLAGS: [&str; 4] = ["--config", "--skip-mode", "--filter-tags", "--timeout-ms"];

/// Keep the program name and the flags gherkin-ui reads, with their values
fn own_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut args = args.into_iter().map(Into::<OsString>::into);
    let mut kept: Vec<OsString> = args.next().into_iter().collect();

    while let Some(arg) = args.next() {
        let (flag, inline) = {
            let text = arg.to_string_lossy();
            let flag = OWN_FLAGS.contains(&text.as_ref());
            let inline = OWN_FLAGS
                .iter()
                .any(|own| text.strip_prefix(*own).is_some_and(|rest| rest.starts_with('=')));
            (flag, inline)
        };
        if flag {
            kept.push(arg);
            kept.extend(args.next());
        } else if inline {
            kept.push(arg);
        }
    }

    kept
}

static GLOBAL: OnceLock<RunConfig> = OnceLock::new();

/// Install the process-wide configuration. Must happen before any group is built.
pub fn install(config: RunConfig) -> std::result::Result<&'static RunConfig, ConfigError> {
    GLOBAL.set(config).map_err(|_| ConfigError::AlreadyInstalled)?;
    GLOBAL.get().ok_or(ConfigError::AlreadyInstalled)
}

/// The process-wide configuration, read from the invocation on first access
pub fn global() -> &'static RunConfig {
    GLOBAL.get_or_init(|| match RunConfig::from_env() {
        Ok(config) => {
            debug!(
                skip_mode = %config.skip_mode,
                filter_tags = ?config.filter_tags,
                "Run configuration loaded"
            );
            config
        }
        Err(err) => {
            warn!(error = %err, "using default run configuration");
            RunConfig::default()
        }
    })
}

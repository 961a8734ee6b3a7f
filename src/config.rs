use anyhow::{Context, Result, bail};
use configsync::{Comparison, DefaultRule, DefaultRules, Pattern};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings file looked up beside the bundle's root file.
pub const SETTINGS_FILE: &str = "bundlesync.toml";

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Target used when none is given on the command line
    #[serde(default)]
    pub target: Option<String>,

    /// Extra default-value rules, checked before the builtin ones
    #[serde(default)]
    pub defaults: Vec<RuleConfig>,

    /// Extra values written instead of clearing a field
    #[serde(default)]
    pub resets: Vec<ResetConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleMode {
    Always,
    ZeroOrAbsent,
    EmptyOrDefault,
    Equals,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub pattern: String,
    pub mode: RuleMode,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetConfig {
    pub pattern: String,
    pub value: Value,
}

impl ResetConfig {
    pub fn to_reset(&self) -> Result<(Pattern, Value)> {
        let pattern = Pattern::parse(&self.pattern)
            .with_context(|| format!("Invalid reset pattern '{}'", self.pattern))?;
        Ok((pattern, self.value.clone()))
    }
}

impl RuleConfig {
    pub fn to_rule(&self) -> Result<DefaultRule> {
        let pattern = Pattern::parse(&self.pattern)
            .with_context(|| format!("Invalid default pattern '{}'", self.pattern))?;
        let comparison = match (self.mode, &self.value) {
            (RuleMode::Always, _) => Comparison::Always,
            (RuleMode::ZeroOrAbsent, _) => Comparison::ZeroOrAbsent,
            (RuleMode::EmptyOrDefault, value) => {
                Comparison::EmptyOrDefault(value.clone().unwrap_or(Value::Null))
            }
            (RuleMode::Equals, Some(value)) => Comparison::Equals(value.clone()),
            (RuleMode::Equals, None) => {
                bail!("Default rule '{}' uses mode 'equals' without a value", self.pattern)
            }
        };
        Ok(DefaultRule {
            pattern,
            comparison,
        })
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Load `explicit` if given, else the settings file beside `root` when it exists.
    pub fn discover(explicit: Option<&Path>, root: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let path = default_path(root);
        if path.is_file() {
            log::debug!("Using settings from {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Builtin default and reset rules extended with the configured ones.
    pub fn rules(&self) -> Result<DefaultRules> {
        let overrides = self
            .defaults
            .iter()
            .map(RuleConfig::to_rule)
            .collect::<Result<Vec<_>>>()?;
        let resets = self
            .resets
            .iter()
            .map(ResetConfig::to_reset)
            .collect::<Result<Vec<_>>>()?;
        Ok(DefaultRules::builtin()
            .with_overrides(overrides)
            .with_resets(resets))
    }
}

fn default_path(root: &Path) -> PathBuf {
    root.parent()
        .map_or_else(|| PathBuf::from(SETTINGS_FILE), |dir| dir.join(SETTINGS_FILE))
}

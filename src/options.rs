//! Configuration surface for the stylesheet adapter.
//!
//! Mirrors the config object the JS pipeline hands to the addon. Everything
//! except the project root is optional and defaults to disabled/empty.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Session-wide compiler configuration, fixed at adapter construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Project root; always the first entry of every include-path list.
    pub root: String,
    /// Compressed output, no comment annotations, no inline maps.
    #[serde(default)]
    pub optimize: bool,
    /// Extra include paths searched after the root and the file's directory.
    #[serde(default)]
    pub include_paths: Vec<String>,
    /// Embed the source map as an inline footer (only honored when not optimizing).
    #[serde(default)]
    pub source_map_embed: bool,
    #[serde(default)]
    pub debug: Option<DebugMode>,
    #[serde(default)]
    pub modules: ModulesSetting,
}

/// Debug annotation modes understood by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugMode {
    /// Emit per-rule source comments in expanded output.
    Comments,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CSS MODULES SETTING
// ═══════════════════════════════════════════════════════════════════════════════

/// The `modules` config key accepts either a bare toggle or a full options
/// object; `true` means "scoping with default options".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModulesSetting {
    Toggle(bool),
    Config(ModulesConfig),
}

impl Default for ModulesSetting {
    fn default() -> Self {
        ModulesSetting::Toggle(false)
    }
}

impl ModulesSetting {
    /// Effective scoping options, with the `true` sentinel substituted by
    /// defaults. `None` means scoping is disabled entirely.
    pub fn as_config(&self) -> Option<ModulesConfig> {
        match self {
            ModulesSetting::Toggle(false) => None,
            ModulesSetting::Toggle(true) => Some(ModulesConfig::default()),
            ModulesSetting::Config(config) => Some(config.clone()),
        }
    }
}

/// Scoping options forwarded to the CSS Modules transform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulesConfig {
    /// Files whose class names are left untouched.
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Naming pattern for generated class names, e.g. `"[hash]-[local]"`.
    #[serde(default)]
    pub generate_scoped_name: Option<String>,
    /// Also scope `--custom-property` names.
    #[serde(default)]
    pub dashed_idents: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// IGNORE MATCHER
// ═══════════════════════════════════════════════════════════════════════════════

/// Glob-backed path predicate for the `modules.ignore` list.
///
/// Pattern semantics belong to the glob crate; this only holds the compiled
/// set and answers `matches`.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    patterns: Vec<Pattern>,
}

impl IgnoreMatcher {
    pub fn new(globs: &[String]) -> Result<Self, ConfigError> {
        let mut patterns = Vec::with_capacity(globs.len());
        for raw in globs {
            let pattern = Pattern::new(raw).map_err(|source| ConfigError::IgnorePattern {
                pattern: raw.clone(),
                source,
            })?;
            patterns.push(pattern);
        }
        Ok(Self { patterns })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(path))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Rejected configuration, reported at adapter construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid ignore pattern `{pattern}`: {source}")]
    IgnorePattern {
        pattern: String,
        source: glob::PatternError,
    },
    #[error("invalid scoped-name pattern `{pattern}`: {reason}")]
    NamePattern { pattern: String, reason: String },
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

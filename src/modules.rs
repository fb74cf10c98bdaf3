//! CSS Modules scoping post-process.
//!
//! Rewrites locally-authored class names in compiled CSS into globally
//! unique ones and emits the local-to-global mapping the pipeline injects
//! into JS importers.

use std::collections::BTreeMap;

use lightningcss::css_modules;
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use parcel_sourcemap::SourceMap;

use crate::error::CompileError;
use crate::options::{ConfigError, ModulesConfig};

/// Output of the scoping transform.
#[derive(Debug, Clone)]
pub struct ScopedOutput {
    pub css: String,
    /// JSON-serialized source map for the rewritten CSS.
    pub map: Option<String>,
    /// CommonJS-style serialization of the name mapping, with deterministic
    /// key order.
    pub exports: String,
}

/// Checks a `generateScopedName` pattern without running a transform, so bad
/// configuration is rejected at adapter construction.
pub(crate) fn validate_name_pattern(pattern: &str) -> Result<(), ConfigError> {
    css_modules::Pattern::parse(pattern)
        .map(|_| ())
        .map_err(|err| ConfigError::NamePattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })
}

/// Runs the CSS Modules transform over already-compiled CSS.
pub fn scope_stylesheet(
    path: &str,
    css: &str,
    config: &ModulesConfig,
    minify: bool,
) -> Result<ScopedOutput, CompileError> {
    let pattern = match &config.generate_scoped_name {
        Some(raw) => css_modules::Pattern::parse(raw).map_err(|err| scoping_error(path, err))?,
        None => css_modules::Pattern::default(),
    };

    let stylesheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: path.to_string(),
            css_modules: Some(css_modules::Config {
                pattern,
                dashed_idents: config.dashed_idents,
                ..Default::default()
            }),
            ..Default::default()
        },
    )
    .map_err(|err| scoping_error(path, err))?;

    let mut map = SourceMap::new("/");
    let result = stylesheet
        .to_css(PrinterOptions {
            minify,
            source_map: Some(&mut map),
            ..Default::default()
        })
        .map_err(|err| scoping_error(path, err))?;

    Ok(ScopedOutput {
        css: result.code,
        map: map.to_json(None).ok(),
        exports: serialize_exports(result.exports.as_ref()),
    })
}

fn scoping_error(path: &str, err: impl std::fmt::Display) -> CompileError {
    CompileError::Scoping {
        file: path.to_string(),
        message: err.to_string(),
    }
}

fn serialize_exports(exports: Option<&css_modules::CssModuleExports>) -> String {
    let mapping: BTreeMap<&str, &str> = exports
        .map(|exports| {
            exports
                .iter()
                .map(|(local, export)| (local.as_str(), export.name.as_str()))
                .collect()
        })
        .unwrap_or_default();
    let json = serde_json::to_string(&mapping).unwrap_or_else(|_| "{}".to_string());
    format!("module.exports = {};", json)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

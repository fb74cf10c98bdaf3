//! Stylesheet compilation adapter.
//!
//! One `SassCompiler` is built per pipeline session and reused for every
//! file. Each `compile` call is fully isolated: configuration is read-only,
//! so concurrent calls need no locking.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::delegate::{GrassCompiler, NativeStylesheetCompiler, OutputStyle, RenderRequest};
use crate::error::{strip_map_footer, translate_delegate_error, CompileError};
use crate::modules;
use crate::options::{CompilerConfig, ConfigError, DebugMode, IgnoreMatcher, ModulesConfig};

lazy_static! {
    /// The indentation-sensitive dialect.
    static ref INDENTED_SYNTAX_RE: Regex = Regex::new(r"\.sass$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// REQUEST / RESULT
// ═══════════════════════════════════════════════════════════════════════════════

/// One file handed to [`SassCompiler::compile`]. `data` is the full source
/// text and may differ from what is on disk (an earlier pipeline stage may
/// already have rewritten it).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileRequest {
    pub path: String,
    pub data: String,
}

/// Compiled output returned to the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<serde_json::Value>,
    /// Serialized local-to-global name mapping; present only when scoping
    /// ran for this file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exports: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADAPTER
// ═══════════════════════════════════════════════════════════════════════════════

/// The stylesheet compilation adapter.
pub struct SassCompiler {
    root: PathBuf,
    optimize: bool,
    include_paths: Vec<PathBuf>,
    source_map_embed: bool,
    debug_comments: bool,
    modules: Option<ModulesConfig>,
    ignored: IgnoreMatcher,
    delegate: Box<dyn NativeStylesheetCompiler>,
}

impl SassCompiler {
    /// Builds an adapter from the pipeline configuration, backed by the
    /// production [`GrassCompiler`] delegate. Never touches the filesystem.
    pub fn new(config: CompilerConfig) -> Result<Self, ConfigError> {
        Self::with_delegate(config, Box::new(GrassCompiler))
    }

    /// Same as [`SassCompiler::new`] with an explicit native compiler.
    pub fn with_delegate(
        config: CompilerConfig,
        delegate: Box<dyn NativeStylesheetCompiler>,
    ) -> Result<Self, ConfigError> {
        let modules = config.modules.as_config();
        let ignored = match &modules {
            Some(modules) => IgnoreMatcher::new(&modules.ignore)?,
            None => IgnoreMatcher::default(),
        };
        if let Some(pattern) = modules
            .as_ref()
            .and_then(|modules| modules.generate_scoped_name.as_deref())
        {
            modules::validate_name_pattern(pattern)?;
        }

        Ok(Self {
            root: PathBuf::from(&config.root),
            optimize: config.optimize,
            include_paths: config.include_paths.iter().map(PathBuf::from).collect(),
            source_map_embed: config.source_map_embed,
            debug_comments: config.debug == Some(DebugMode::Comments),
            modules,
            ignored,
            delegate,
        })
    }

    /// Include-path search order for one file: project root, the file's own
    /// directory, then every configured extra path. First match wins inside
    /// the delegate.
    pub fn include_paths_for(&self, path: &str) -> Vec<PathBuf> {
        let dir = Path::new(path)
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut paths = Vec::with_capacity(self.include_paths.len() + 2);
        paths.push(self.root.clone());
        paths.push(dir);
        paths.extend(self.include_paths.iter().cloned());
        paths
    }

    /// Compiles one file. Whitespace-only input short-circuits to an empty
    /// result without touching the delegate: mid-edit saves must never error.
    pub fn compile(&self, request: &CompileRequest) -> Result<CompileResult, CompileError> {
        if request.data.trim().is_empty() {
            return Ok(CompileResult::default());
        }

        let render = RenderRequest {
            file: request.path.clone(),
            data: request.data.clone(),
            include_paths: self.include_paths_for(&request.path),
            output_style: if self.optimize {
                OutputStyle::Compressed
            } else {
                OutputStyle::Expanded
            },
            indented_syntax: INDENTED_SYNTAX_RE.is_match(&request.path),
            // compressed output never carries comment annotations
            source_comments: self.debug_comments && !self.optimize,
            source_map: true,
            source_map_embed: !self.optimize && self.source_map_embed,
        };

        let output = self
            .delegate
            .render(&render)
            .map_err(|err| translate_delegate_error(&request.path, &err))?;

        let mut data = strip_map_footer(&output.css);
        let mut map = output.map;
        let mut exports = None;

        if let Some(modules) = self.scoping_for(&request.path) {
            let scoped = modules::scope_stylesheet(&request.path, &data, modules, self.optimize)?;
            data = scoped.css;
            map = scoped.map.or(map);
            exports = Some(scoped.exports);
        }

        if render.source_map_embed {
            if let Some(map) = &map {
                data = embed_source_map(&data, map);
            }
        }

        Ok(CompileResult {
            data,
            map: map.as_deref().and_then(|map| serde_json::from_str(map).ok()),
            exports,
        })
    }

    /// Scoping options for one file, or `None` when scoping is disabled or
    /// the path matches an ignore glob.
    fn scoping_for(&self, path: &str) -> Option<&ModulesConfig> {
        match &self.modules {
            Some(modules) if !self.ignored.matches(path) => Some(modules),
            _ => None,
        }
    }
}

/// Inlines a JSON source map as a base64 `sourceMappingURL` footer.
fn embed_source_map(css: &str, map: &str) -> String {
    format!(
        "{}\n/*# sourceMappingURL=data:application/json;base64,{} */\n",
        css.trim_end(),
        BASE64.encode(map.as_bytes())
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
mod bindings {
    use napi_derive::napi;

    use super::{CompileRequest, SassCompiler as Adapter};
    use crate::options::CompilerConfig;

    /// Session-scoped compiler handle exposed to the JS pipeline. The shim
    /// constructs it once and calls `compile` for every claimed file.
    #[napi(js_name = "SassCompiler")]
    pub struct NativeSassCompiler {
        inner: Adapter,
    }

    #[napi]
    impl NativeSassCompiler {
        #[napi(constructor)]
        pub fn new(config: serde_json::Value) -> napi::Result<Self> {
            let config: CompilerConfig = serde_json::from_value(config)
                .map_err(|err| napi::Error::from_reason(err.to_string()))?;
            let inner =
                Adapter::new(config).map_err(|err| napi::Error::from_reason(err.to_string()))?;
            Ok(Self { inner })
        }

        #[napi]
        pub fn compile(&self, path: String, data: String) -> napi::Result<serde_json::Value> {
            let result = self
                .inner
                .compile(&CompileRequest { path, data })
                .map_err(|err| napi::Error::from_reason(err.to_string()))?;
            serde_json::to_value(result).map_err(|err| napi::Error::from_reason(err.to_string()))
        }
    }
}

#[cfg(feature = "napi")]
pub use bindings::NativeSassCompiler;

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::delegate::{DelegateCompileError, RenderOutput};

    type RequestLog = Arc<Mutex<Vec<RenderRequest>>>;

    /// Records every render request and replays a canned response.
    struct StubDelegate {
        requests: RequestLog,
        response: Result<RenderOutput, DelegateCompileError>,
    }

    impl NativeStylesheetCompiler for StubDelegate {
        fn render(&self, request: &RenderRequest) -> Result<RenderOutput, DelegateCompileError> {
            self.requests.lock().unwrap().push(request.clone());
            self.response.clone()
        }
    }

    fn stub(
        response: Result<RenderOutput, DelegateCompileError>,
    ) -> (Box<StubDelegate>, RequestLog) {
        let requests: RequestLog = Arc::new(Mutex::new(Vec::new()));
        let delegate = Box::new(StubDelegate {
            requests: Arc::clone(&requests),
            response,
        });
        (delegate, requests)
    }

    fn stub_css(css: &str) -> (Box<StubDelegate>, RequestLog) {
        stub(Ok(RenderOutput {
            css: css.to_string(),
            map: None,
        }))
    }

    fn config(value: serde_json::Value) -> CompilerConfig {
        serde_json::from_value(value).unwrap()
    }

    fn request(path: &str, data: &str) -> CompileRequest {
        CompileRequest {
            path: path.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_empty_input_skips_the_delegate() {
        let (delegate, requests) = stub(Err(DelegateCompileError {
            message: "must not be called".to_string(),
            line: 0,
            column: 0,
            formatted: String::new(),
        }));
        let compiler =
            SassCompiler::with_delegate(config(serde_json::json!({ "root": "." })), delegate)
                .unwrap();

        let result = compiler.compile(&request("a.scss", "  \n\t ")).unwrap();
        assert_eq!(result.data, "");
        assert!(result.map.is_none());
        assert!(result.exports.is_none());
        assert!(requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_include_path_order() {
        let (delegate, requests) = stub_css("a { color: red; }");
        let compiler = SassCompiler::with_delegate(
            config(serde_json::json!({
                "root": "app/styles",
                "includePaths": ["node_modules", "shared"],
            })),
            delegate,
        )
        .unwrap();

        compiler
            .compile(&request("app/styles/pages/home.scss", "a { color: red; }"))
            .unwrap();

        let seen = requests.lock().unwrap();
        let paths: Vec<_> = seen[0]
            .include_paths
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            paths,
            vec!["app/styles", "app/styles/pages", "node_modules", "shared"]
        );
    }

    #[test]
    fn test_bare_filename_gets_dot_directory() {
        let (delegate, requests) = stub_css("a { color: red; }");
        let compiler =
            SassCompiler::with_delegate(config(serde_json::json!({ "root": "." })), delegate)
                .unwrap();

        compiler.compile(&request("a.scss", "a { color: red; }")).unwrap();

        let seen = requests.lock().unwrap();
        assert_eq!(seen[0].include_paths[1], PathBuf::from("."));
    }

    #[test]
    fn test_optimize_drives_style_and_suppresses_comments() {
        let (delegate, requests) = stub_css("a{color:red}");
        let compiler = SassCompiler::with_delegate(
            config(serde_json::json!({
                "root": ".",
                "optimize": true,
                "debug": "comments",
                "sourceMapEmbed": true,
            })),
            delegate,
        )
        .unwrap();

        compiler.compile(&request("a.scss", "a { color: red; }")).unwrap();

        let seen = requests.lock().unwrap();
        assert_eq!(seen[0].output_style, OutputStyle::Compressed);
        assert!(!seen[0].source_comments);
        assert!(!seen[0].source_map_embed);
        assert!(seen[0].source_map);
    }

    #[test]
    fn test_debug_comments_without_optimize() {
        let (delegate, requests) = stub_css("a { color: red; }");
        let compiler = SassCompiler::with_delegate(
            config(serde_json::json!({ "root": ".", "debug": "comments" })),
            delegate,
        )
        .unwrap();

        compiler.compile(&request("a.scss", "a { color: red; }")).unwrap();

        let seen = requests.lock().unwrap();
        assert_eq!(seen[0].output_style, OutputStyle::Expanded);
        assert!(seen[0].source_comments);
    }

    #[test]
    fn test_indented_syntax_flag_follows_extension() {
        let (delegate, requests) = stub_css("a { color: red; }");
        let compiler =
            SassCompiler::with_delegate(config(serde_json::json!({ "root": "." })), delegate)
                .unwrap();

        compiler.compile(&request("a.sass", "a\n  color: red\n")).unwrap();
        compiler.compile(&request("b.scss", "a { color: red; }")).unwrap();

        let seen = requests.lock().unwrap();
        assert!(seen[0].indented_syntax);
        assert!(!seen[1].indented_syntax);
    }

    #[test]
    fn test_delegate_map_footer_is_stripped() {
        let (delegate, _) =
            stub_css("a {\n  color: red;\n}\n/*# sourceMappingURL=a.css.map */");
        let compiler =
            SassCompiler::with_delegate(config(serde_json::json!({ "root": "." })), delegate)
                .unwrap();

        let result = compiler.compile(&request("a.scss", "a { color: red; }")).unwrap();
        assert!(!result.data.contains("sourceMappingURL"));
        assert!(result.data.contains("color: red"));
    }

    #[test]
    fn test_map_embedding_when_not_optimizing() {
        let (delegate, _) = stub(Ok(RenderOutput {
            css: "a {\n  color: red;\n}\n".to_string(),
            map: Some(r#"{"version":3,"mappings":""}"#.to_string()),
        }));
        let compiler = SassCompiler::with_delegate(
            config(serde_json::json!({ "root": ".", "sourceMapEmbed": true })),
            delegate,
        )
        .unwrap();

        let result = compiler.compile(&request("a.scss", "a { color: red; }")).unwrap();
        assert!(result
            .data
            .contains("sourceMappingURL=data:application/json;base64,"));
        assert!(result.map.is_some());
    }

    #[test]
    fn test_no_embedding_when_optimizing() {
        let (delegate, _) = stub(Ok(RenderOutput {
            css: "a{color:red}".to_string(),
            map: Some(r#"{"version":3,"mappings":""}"#.to_string()),
        }));
        let compiler = SassCompiler::with_delegate(
            config(serde_json::json!({
                "root": ".",
                "optimize": true,
                "sourceMapEmbed": true,
            })),
            delegate,
        )
        .unwrap();

        let result = compiler.compile(&request("a.scss", "a { color: red; }")).unwrap();
        assert!(!result.data.contains("sourceMappingURL"));
        assert!(result.map.is_some());
    }

    #[test]
    fn test_scoping_attaches_exports() {
        let (delegate, _) = stub_css(".title {\n  color: red;\n}\n");
        let compiler = SassCompiler::with_delegate(
            config(serde_json::json!({ "root": ".", "modules": true })),
            delegate,
        )
        .unwrap();

        let result = compiler
            .compile(&request("card.scss", ".title { color: red; }"))
            .unwrap();
        let exports = result.exports.unwrap();
        assert!(exports.starts_with("module.exports = {"));
        assert!(exports.contains("title"));
        assert!(result.map.is_some());
    }

    #[test]
    fn test_ignored_path_passes_through_unscoped() {
        let raw = ".title {\n  color: red;\n}\n";
        let (delegate, _) = stub_css(raw);
        let compiler = SassCompiler::with_delegate(
            config(serde_json::json!({
                "root": ".",
                "modules": { "ignore": ["vendor/**"] },
            })),
            delegate,
        )
        .unwrap();

        let result = compiler
            .compile(&request("vendor/lib/card.scss", ".title { color: red; }"))
            .unwrap();
        assert!(result.exports.is_none());
        assert_eq!(result.data, raw);
    }

    #[test]
    fn test_scoping_disabled_passes_through() {
        let raw = ".title {\n  color: red;\n}\n";
        let (delegate, _) = stub_css(raw);
        let compiler =
            SassCompiler::with_delegate(config(serde_json::json!({ "root": "." })), delegate)
                .unwrap();

        let result = compiler
            .compile(&request("card.scss", ".title { color: red; }"))
            .unwrap();
        assert!(result.exports.is_none());
        assert_eq!(result.data, raw);
    }

    #[test]
    fn test_delegate_error_is_translated() {
        let (delegate, _) = stub(Err(DelegateCompileError {
            message: "unexpected token".to_string(),
            line: 3,
            column: 5,
            formatted: "Error: unexpected token\n        on line 3 of a.scss\n>> ...".to_string(),
        }));
        let compiler =
            SassCompiler::with_delegate(config(serde_json::json!({ "root": "." })), delegate)
                .unwrap();

        let err = compiler
            .compile(&request("a.scss", "a { color: }"))
            .unwrap_err();
        let CompileError::Compilation(err) = err else {
            panic!("expected a compilation error");
        };
        assert!(err.message.starts_with("L3:5: \nunexpected token "));
    }

    #[test]
    fn test_invalid_ignore_glob_rejected_at_construction() {
        let result = SassCompiler::new(config(serde_json::json!({
            "root": ".",
            "modules": { "ignore": ["a["] },
        })));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_name_pattern_rejected_at_construction() {
        let result = SassCompiler::new(config(serde_json::json!({
            "root": ".",
            "modules": { "generateScopedName": "[bogus-field]" },
        })));
        assert!(result.is_err());
    }
}

//! # Native Stylesheet Compilation Core
//!
//! Native addon backing the build pipeline's `.scss`/`.sass` transform.
//! Parsing the stylesheet language and rewriting class names belong to the
//! delegated compiler and the scoping transform; this crate configures and
//! drives them, and keeps results and diagnostics in the shape the pipeline
//! expects.
//!
//! ## Pipeline Contract
//!
//! 1. **Empty input**: whitespace-only sources compile to an empty
//!    stylesheet. The native compiler is never invoked for them, so a
//!    mid-edit save can never fail the build.
//! 2. **Include-path order**: `[root, dirname(file), ...extra]`, in that
//!    order, first match wins. The adapter constructs the list; the delegate
//!    honors it.
//! 3. **Single error channel**: a failed compile yields one file-attributed,
//!    line/column-attributed error and no partial CSS. The error display is
//!    the composed message itself, with no extra name prefix.
//! 4. **Stateless adapter**: one adapter per pipeline session, reused for
//!    every file; it holds configuration and the delegate handle, nothing
//!    mutable, so concurrent compiles need no locking.
//! 5. **Scoped naming**: with CSS Modules scoping enabled, non-ignored files
//!    come back with rewritten class names and a serialized local-to-global
//!    exports mapping; ignored files pass through byte-identical.

#[cfg(feature = "napi")]
use napi_derive::napi;

use lazy_static::lazy_static;
use regex::Regex;

mod compile;
mod delegate;
mod dependencies;
mod error;
mod modules;
mod options;


pub use compile::{CompileRequest, CompileResult, SassCompiler};
pub use delegate::{
    DelegateCompileError, GrassCompiler, NativeStylesheetCompiler, OutputStyle, RenderOutput,
    RenderRequest,
};
pub use dependencies::resolve_dependencies;
pub use error::{CompilationError, CompileError};
pub use modules::{scope_stylesheet, ScopedOutput};
pub use options::{
    CompilerConfig, ConfigError, DebugMode, IgnoreMatcher, ModulesConfig, ModulesSetting,
};

#[cfg(feature = "napi")]
pub use compile::NativeSassCompiler;
#[cfg(feature = "napi")]
pub use dependencies::resolve_dependencies_native;

// ═══════════════════════════════════════════════════════════════════════════════
// PLUGIN DESCRIPTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Capability tag the pipeline uses to route files to this plugin.
pub const PLUGIN_TYPE: &str = "stylesheet";

/// Filename pattern for the files this plugin claims.
pub const PLUGIN_PATTERN: &str = r"\.s[ac]ss$";

lazy_static! {
    static ref CLAIMED_RE: Regex = Regex::new(PLUGIN_PATTERN).unwrap();
}

/// Whether this plugin claims `path`.
pub fn claims_path(path: &str) -> bool {
    CLAIMED_RE.is_match(path)
}

#[cfg(feature = "napi")]
#[napi]
pub fn plugin_descriptor() -> serde_json::Value {
    serde_json::json!({
        "type": PLUGIN_TYPE,
        "pattern": PLUGIN_PATTERN,
    })
}

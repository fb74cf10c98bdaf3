//! Diagnostic translation.
//!
//! Native compiler failures are rewritten into one pipeline-facing shape:
//! a message prefixed with `L<line>:<column>`, attributed to the file the
//! fault actually lives in (which may be an imported partial rather than the
//! file the pipeline asked about).

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::delegate::DelegateCompileError;

lazy_static! {
    /// libsass-style locator inside a formatted diagnostic:
    /// `on line 3 of src/_partial.scss`.
    static ref LINE_OF_RE: Regex = Regex::new(r"on line (\d+) of ([/.\w-]+)").unwrap();
    /// dart-style locator: a trailing `src/_partial.scss:3:5` line.
    static ref PATH_LINE_COL_RE: Regex =
        Regex::new(r"(?m)^\s*([^\s:][^:\n]*):(\d+):(\d+)\s*$").unwrap();
    /// Sourcemap footer a compiler appends to its own output.
    static ref MAP_FOOTER_RE: Regex =
        Regex::new(r"\n?/\*#\s*sourceMappingURL=[^*]*\*/[ \t]*").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Terminal failure of one compile call.
///
/// The display output is the composed message alone, with no `Error:` name
/// in front of it, so the host pipeline can render it without
/// double-prefixing.
#[derive(Debug, Clone, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct CompilationError {
    pub message: String,
    /// The faulting file: the requested path, or the imported file the
    /// delegate attributed the fault to.
    pub file: String,
    /// 1-based.
    pub line: u32,
    /// 1-based.
    pub column: u32,
}

/// Everything `compile` can fail with.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Compilation(#[from] CompilationError),
    /// The delegate failed but its diagnostic carried no recognizable
    /// file locator, so no attributed message could be composed.
    #[error("unrecognized compiler diagnostic for {file}: {message}")]
    MalformedDelegate { file: String, message: String },
    /// The scoping transform rejected the compiled CSS.
    #[error("scoping failed for {file}: {message}")]
    Scoping { file: String, message: String },
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSLATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Strips a compiler-appended sourcemap footer comment.
pub(crate) fn strip_map_footer(css: &str) -> String {
    MAP_FOOTER_RE.replace_all(css, "").to_string()
}

/// Faulting path named by the formatted diagnostic, plus the locator text
/// itself so it can be removed from the user-facing detail.
fn faulting_path(detail: &str) -> Option<(String, String)> {
    if let Some(caps) = LINE_OF_RE.captures(detail) {
        return Some((caps[2].to_string(), caps[0].to_string()));
    }
    if let Some(caps) = PATH_LINE_COL_RE.captures_iter(detail).last() {
        return Some((caps[1].trim().to_string(), caps[0].to_string()));
    }
    None
}

/// Rewrites a delegate failure into the pipeline-facing error.
///
/// The composed message starts with `L<line>:<column>` and ends with the
/// diagnostic detail minus the redundant `Error: <message>` echo, the
/// locator, and any sourcemap footer.
pub(crate) fn translate_delegate_error(path: &str, err: &DelegateCompileError) -> CompileError {
    let stripped = strip_map_footer(&err.formatted);
    let detail = stripped.replace(&format!("Error: {}", err.message), "");

    let Some((errored_path, locator)) = faulting_path(&detail) else {
        return CompileError::MalformedDelegate {
            file: path.to_string(),
            message: err.message.clone(),
        };
    };
    let detail = detail.replacen(&locator, "", 1);

    let mut loc = format!("L{}:{}", err.line, err.column);
    if errored_path == path {
        loc.push_str(": ");
    } else {
        loc.push_str(&format!(" of {}. ", errored_path));
    }

    CompilationError {
        message: format!("{}\n{} {}", loc, err.message, detail),
        file: errored_path,
        line: err.line,
        column: err.column,
    }
    .into()
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

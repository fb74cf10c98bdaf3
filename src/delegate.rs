//! Native compiler delegation.
//!
//! The adapter never parses Sass itself; it hands a fully-described render
//! request to a [`NativeStylesheetCompiler`] and normalizes whatever comes
//! back. The production delegate is [`GrassCompiler`].

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// RENDER REQUEST / OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output style requested from the native compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    Expanded,
    Compressed,
}

/// One render call handed to the native compiler.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Path of the file being compiled; used for error attribution.
    pub file: String,
    /// Full source text. May differ from what is on disk.
    pub data: String,
    /// Reference search order; first match wins.
    pub include_paths: Vec<PathBuf>,
    pub output_style: OutputStyle,
    /// The indentation-sensitive dialect (`.sass`).
    pub indented_syntax: bool,
    /// Per-rule source comments in the output.
    pub source_comments: bool,
    pub source_map: bool,
    pub source_map_embed: bool,
}

/// Successful render result.
#[derive(Debug, Clone, Default)]
pub struct RenderOutput {
    pub css: String,
    /// JSON-serialized source map, when the delegate can produce one.
    pub map: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// DELEGATE ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Error reported by the native compiler, normalized into a typed record.
///
/// `formatted` is the compiler's full diagnostic block, including the code
/// frame and the locator naming the file the fault actually lives in (which
/// may be an imported file rather than the one handed to `render`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateCompileError {
    pub message: String,
    /// 1-based; 0 when the delegate reported no usable location.
    pub line: u32,
    pub column: u32,
    pub formatted: String,
}

/// The seam between the adapter and the native Sass compiler.
pub trait NativeStylesheetCompiler: Send + Sync {
    fn render(&self, request: &RenderRequest) -> Result<RenderOutput, DelegateCompileError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// GRASS DELEGATE
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    /// In-memory input shows up as `stdin` in grass spans; rewritten to the
    /// requested path so attribution survives translation.
    static ref STDIN_SPAN_RE: Regex =
        Regex::new(r"(?m)^(\s*)(?:\./)?stdin:(\d+):(\d+)\s*$").unwrap();
    /// Trailing locator line of a grass diagnostic: `src/_grid.scss:3:5`.
    static ref LOCATION_RE: Regex =
        Regex::new(r"(?m)^\s*(?:\./)?([^\s:][^:\n]*):(\d+):(\d+)\s*$").unwrap();
}

/// [`grass`]-backed native compiler.
///
/// grass emits no source maps and no libsass-style source comments, so
/// `map` is always `None` and the corresponding request flags are accepted
/// but not acted on.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrassCompiler;

impl NativeStylesheetCompiler for GrassCompiler {
    fn render(&self, request: &RenderRequest) -> Result<RenderOutput, DelegateCompileError> {
        let mut options = grass::Options::default()
            .style(match request.output_style {
                OutputStyle::Expanded => grass::OutputStyle::Expanded,
                OutputStyle::Compressed => grass::OutputStyle::Compressed,
            })
            .input_syntax(if request.indented_syntax {
                grass::InputSyntax::Sass
            } else {
                grass::InputSyntax::Scss
            })
            .quiet(true);
        for path in &request.include_paths {
            options = options.load_path(path);
        }

        let css = grass::from_string(request.data.clone(), &options)
            .map_err(|err| describe_grass_error(&request.file, &err))?;

        Ok(RenderOutput { css, map: None })
    }
}

/// Flattens a grass diagnostic into the typed delegate error record.
fn describe_grass_error(file: &str, err: &grass::Error) -> DelegateCompileError {
    let rendered = err.to_string();
    let message = rendered
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("Error: ")
        .trim()
        .to_string();

    let formatted = STDIN_SPAN_RE
        .replace_all(&rendered, |caps: &regex::Captures| {
            format!("{}{}:{}:{}", &caps[1], file, &caps[2], &caps[3])
        })
        .to_string();

    let (line, column) = LOCATION_RE
        .captures_iter(&formatted)
        .last()
        .map(|caps| {
            (
                caps[2].parse::<u32>().unwrap_or_default(),
                caps[3].parse::<u32>().unwrap_or_default(),
            )
        })
        .unwrap_or((0, 0));

    DelegateCompileError {
        message,
        line,
        column,
        formatted,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn request(data: &str) -> RenderRequest {
        RenderRequest {
            file: "widget.scss".to_string(),
            data: data.to_string(),
            include_paths: vec![],
            output_style: OutputStyle::Expanded,
            indented_syntax: false,
            source_comments: false,
            source_map: true,
            source_map_embed: false,
        }
    }

    #[test]
    fn test_render_nested_rules() {
        let output = GrassCompiler
            .render(&request("a { b { color: red; } }"))
            .unwrap();
        assert!(output.css.contains("a b"));
        assert!(output.css.contains("color: red"));
        assert!(output.map.is_none());
    }

    #[test]
    fn test_render_compressed() {
        let mut req = request(".card { margin: 0; padding: 0; }");
        req.output_style = OutputStyle::Compressed;
        let output = GrassCompiler.render(&req).unwrap();
        assert!(!output.css.contains("\n  "));
        assert!(output.css.contains(".card{"));
    }

    #[test]
    fn test_render_indented_syntax() {
        let mut req = request("$accent: teal\na\n  color: $accent\n");
        req.file = "widget.sass".to_string();
        req.indented_syntax = true;
        let output = GrassCompiler.render(&req).unwrap();
        assert!(output.css.contains("teal"));
    }

    #[test]
    fn test_render_error_is_typed() {
        let err = GrassCompiler
            .render(&request("a { color: }"))
            .unwrap_err();
        assert!(!err.message.is_empty());
        assert!(!err.formatted.is_empty());
    }

    #[test]
    fn test_stdin_span_rewrite() {
        let rendered = "Error: expected expression.\n  |\n1 | a { color: }\n  |\nstdin:1:12\n";
        let formatted = STDIN_SPAN_RE
            .replace_all(rendered, |caps: &regex::Captures| {
                format!("{}widget.scss:{}:{}", &caps[1], &caps[2], &caps[3])
            })
            .to_string();
        assert!(formatted.contains("widget.scss:1:12"));
        assert!(!formatted.contains("stdin:"));
    }

    #[test]
    fn test_location_extraction_takes_last_locator() {
        let formatted = "Error: undefined variable.\n  |\n3 | color: $missing\n  |\nsrc/_vars.scss:3:9\n";
        let caps = LOCATION_RE.captures_iter(formatted).last().unwrap();
        assert_eq!(&caps[1], "src/_vars.scss");
        assert_eq!(&caps[2], "3");
        assert_eq!(&caps[3], "9");
    }
}

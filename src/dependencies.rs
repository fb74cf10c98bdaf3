//! Import extraction for incremental recompilation.
//!
//! The host pipeline owns the watcher and the recompile policy; this module
//! answers "which files does this stylesheet pull in", so a change in any of
//! them can be mapped back to the root file. Resolution follows the same
//! search order the compiler uses, plus the partial (`_name`) and
//! `_index`/`index` conventions, and expands glob references.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "napi")]
use napi_derive::napi;

lazy_static! {
    /// `@import "a", "b";` / `@use "a" as x;` / `@forward "a";`. One
    /// statement per line, with or without the trailing semicolon (the
    /// indented dialect has none).
    static ref IMPORT_RE: Regex =
        Regex::new(r"(?m)^[ \t]*@(?:import|use|forward)[ \t]+([^;\n]+)").unwrap();
    /// Quoted references inside one import statement.
    static ref REFERENCE_RE: Regex = Regex::new(r#""([^"]+)"|'([^']+)'"#).unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════════

/// Direct and transitive stylesheet dependencies of one file.
///
/// `search_paths` is the configured include-path list; the importing file's
/// own directory is always consulted first, per file.
pub fn resolve_dependencies(path: &str, data: &str, search_paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut dependencies = Vec::new();
    collect(path, data, search_paths, &mut seen, &mut dependencies);
    dependencies
}

fn collect(
    path: &str,
    data: &str,
    search_paths: &[PathBuf],
    seen: &mut HashSet<PathBuf>,
    dependencies: &mut Vec<PathBuf>,
) {
    for reference in references(data) {
        let resolved = resolve_reference(path, &reference, search_paths);
        if resolved.is_empty() {
            log::debug!("unresolved stylesheet reference {:?} in {}", reference, path);
            continue;
        }
        for file in resolved {
            if !seen.insert(file.clone()) {
                continue;
            }
            dependencies.push(file.clone());
            if let Ok(nested) = fs::read_to_string(&file) {
                let nested_path = file.to_string_lossy().to_string();
                collect(&nested_path, &nested, search_paths, seen, dependencies);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REFERENCE SCANNING
// ═══════════════════════════════════════════════════════════════════════════════

/// References named by the import statements of one source text. Plain-CSS
/// imports and `sass:` builtin modules stay with the compiler and are not
/// dependencies of the build.
fn references(data: &str) -> Vec<String> {
    let mut references = Vec::new();
    for statement in IMPORT_RE.captures_iter(data) {
        let body = statement[1].trim();
        let mut quoted = false;
        for caps in REFERENCE_RE.captures_iter(body) {
            quoted = true;
            let reference = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            if is_watchable(reference) {
                references.push(reference.to_string());
            }
        }
        // the indented dialect allows bare references: `@import reset`
        if !quoted {
            if let Some(reference) = body.split_whitespace().next() {
                if is_watchable(reference) && !reference.contains('(') {
                    references.push(reference.to_string());
                }
            }
        }
    }
    references
}

fn is_watchable(reference: &str) -> bool {
    !(reference.ends_with(".css")
        || reference.starts_with("sass:")
        || reference.starts_with("http://")
        || reference.starts_with("https://")
        || reference.starts_with("//")
        || reference.starts_with("url("))
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESOLUTION
// ═══════════════════════════════════════════════════════════════════════════════

fn candidate_dirs(from: &str, search_paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs = Vec::with_capacity(search_paths.len() + 1);
    if let Some(parent) = Path::new(from).parent() {
        if !parent.as_os_str().is_empty() {
            dirs.push(parent.to_path_buf());
        } else {
            dirs.push(PathBuf::from("."));
        }
    }
    dirs.extend(search_paths.iter().cloned());
    dirs
}

fn resolve_reference(from: &str, reference: &str, search_paths: &[PathBuf]) -> Vec<PathBuf> {
    if reference.contains('*') || reference.contains('?') || reference.contains('[') {
        return expand_glob(from, reference, search_paths);
    }

    for dir in candidate_dirs(from, search_paths) {
        for candidate in candidate_files(&dir, reference) {
            if candidate.is_file() {
                return vec![candidate];
            }
        }
    }
    Vec::new()
}

/// Disk-name candidates for one reference under one directory, in priority
/// order: the literal name, its partial form, then the index conventions.
fn candidate_files(dir: &Path, reference: &str) -> Vec<PathBuf> {
    let reference = Path::new(reference);
    let parent = reference.parent().unwrap_or_else(|| Path::new(""));
    let name = reference
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let base = dir.join(parent);

    let mut candidates = Vec::new();
    if name.ends_with(".scss") || name.ends_with(".sass") {
        candidates.push(base.join(name));
        candidates.push(base.join(format!("_{name}")));
        return candidates;
    }
    for ext in ["scss", "sass"] {
        candidates.push(base.join(format!("{name}.{ext}")));
        candidates.push(base.join(format!("_{name}.{ext}")));
    }
    for ext in ["scss", "sass"] {
        candidates.push(base.join(name).join(format!("_index.{ext}")));
        candidates.push(base.join(name).join(format!("index.{ext}")));
    }
    candidates
}

/// Glob references pull in every matching stylesheet from the first
/// directory that yields any match, mirroring first-match-wins resolution.
fn expand_glob(from: &str, reference: &str, search_paths: &[PathBuf]) -> Vec<PathBuf> {
    for dir in candidate_dirs(from, search_paths) {
        let Some(pattern) = dir.join(reference).to_str().map(str::to_string) else {
            continue;
        };
        let Ok(paths) = glob::glob(&pattern) else {
            continue;
        };
        let mut matches: Vec<PathBuf> = paths.flatten().filter(|path| is_stylesheet(path)).collect();
        if !matches.is_empty() {
            matches.sort();
            return matches;
        }
    }
    Vec::new()
}

fn is_stylesheet(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("scss") | Some("sass")
    ) && path.is_file()
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn resolve_dependencies_native(
    path: String,
    data: String,
    search_paths: Vec<String>,
) -> Vec<String> {
    let search_paths: Vec<PathBuf> = search_paths.iter().map(PathBuf::from).collect();
    resolve_dependencies(&path, &data, &search_paths)
        .iter()
        .map(|path| path.to_string_lossy().to_string())
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

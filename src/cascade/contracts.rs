use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

const INTERFACE_HASH_LENGTH: usize = 16;

fn function_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?m)^[ \t]*(?:async[ \t]+)?def[ \t]+([A-Za-z_]\w*)[ \t]*\(([^)]*)\)[ \t]*(?:->[ \t]*([^:\n]+?))?[ \t]*:",
            )
            .ok()
        })
        .as_ref()
}

fn class_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^([ \t]*)class[ \t]+([A-Za-z_]\w*)").ok())
        .as_ref()
}

fn method_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(?:async[ \t]+)?def[ \t]+([A-Za-z_]\w*)").ok())
        .as_ref()
}

fn exports_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?ms)^__all__[ \t]*=[ \t]*\[(.*?)\]").ok())
        .as_ref()
}

fn string_literal_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"["']([^"']*)["']"#).ok())
        .as_ref()
}

/// Public surface of one produced source file at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContract {
    pub artifact_id: String,
    pub file_path: PathBuf,
    /// `def name(args) -> ret`, methods included.
    pub functions: Vec<String>,
    /// `class Name: method, method`.
    pub classes: Vec<String>,
    pub exports: Vec<String>,
    /// Empty when the file did not exist.
    pub interface_hash: String,
}

impl ExtractedContract {
    fn empty(artifact_id: &str, file_path: &Path) -> Self {
        Self {
            artifact_id: artifact_id.to_string(),
            file_path: file_path.to_path_buf(),
            ..Self::default()
        }
    }

    /// True when `current` still offers everything `self` did. Classes may
    /// gain methods; nothing may disappear.
    #[must_use]
    pub fn is_compatible_with(&self, current: &Self) -> bool {
        if self.interface_hash == current.interface_hash {
            return true;
        }

        let functions: HashSet<&str> = current.functions.iter().map(String::as_str).collect();
        let exports: HashSet<&str> = current.exports.iter().map(String::as_str).collect();

        self.functions.iter().all(|f| functions.contains(f.as_str()))
            && self.exports.iter().all(|e| exports.contains(e.as_str()))
            && self.classes.iter().all(|original| {
                let (name, methods) = split_class_entry(original);
                current
                    .classes
                    .iter()
                    .map(String::as_str)
                    .map(split_class_entry)
                    .find(|(candidate, _)| *candidate == name)
                    .is_some_and(|(_, now)| methods.iter().all(|m| now.contains(m)))
            })
    }
}

fn split_class_entry(entry: &str) -> (&str, Vec<&str>) {
    let body = entry.strip_prefix("class ").unwrap_or(entry);
    let (name, methods) = body.split_once(':').unwrap_or((body, ""));
    let methods = methods
        .split(',')
        .map(str::trim)
        .filter(|method| !method.is_empty())
        .collect();
    (name.trim(), methods)
}

fn is_public(name: &str) -> bool {
    !name.starts_with('_')
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn extract_functions(source: &str) -> Vec<String> {
    let Some(pattern) = function_pattern() else {
        return Vec::new();
    };
    pattern
        .captures_iter(source)
        .filter(|caps| caps.get(1).is_some_and(|name| is_public(name.as_str())))
        .map(|caps| {
            let name = caps.get(1).map_or("", |m| m.as_str());
            let args = caps
                .get(2)
                .map_or(String::new(), |m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "));
            let args = args.trim_end_matches(',').trim();
            match caps.get(3) {
                Some(ret) => format!("def {name}({args}) -> {}", ret.as_str().trim()),
                None => format!("def {name}({args})"),
            }
        })
        .collect()
}

fn extract_classes(source: &str) -> Vec<String> {
    let (Some(class_re), Some(method_re)) = (class_pattern(), method_pattern()) else {
        return Vec::new();
    };
    let lines: Vec<&str> = source.lines().collect();
    let mut classes = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let Some(caps) = class_re.captures(line) else {
            continue;
        };
        let name = caps.get(2).map_or("", |m| m.as_str());
        if !is_public(name) {
            continue;
        }
        let class_indent = caps.get(1).map_or(0, |m| m.as_str().len());

        let mut body_indent = None;
        let mut methods = Vec::new();
        for body_line in lines.iter().skip(index + 1) {
            let trimmed = body_line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let indent = indentation(body_line);
            if indent <= class_indent {
                break;
            }
            if *body_indent.get_or_insert(indent) != indent {
                continue;
            }
            if let Some(method) = method_re.captures(trimmed).and_then(|c| c.get(1)) {
                if is_public(method.as_str()) {
                    methods.push(method.as_str());
                }
            }
        }
        classes.push(format!("class {name}: {}", methods.join(", ")));
    }
    classes
}

fn extract_exports(source: &str) -> Vec<String> {
    let (Some(exports_re), Some(literal_re)) = (exports_pattern(), string_literal_pattern()) else {
        return Vec::new();
    };
    exports_re
        .captures_iter(source)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|list| {
            literal_re
                .captures_iter(list.as_str())
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn interface_hash(functions: &[String], classes: &[String], exports: &[String]) -> String {
    let mut items: Vec<&str> = functions
        .iter()
        .chain(classes)
        .chain(exports)
        .map(String::as_str)
        .collect();
    items.sort_unstable();
    let hex = format!("{:x}", Sha256::digest(items.join("\n").as_bytes()));
    hex.chars().take(INTERFACE_HASH_LENGTH).collect()
}

/// Extracts the public interface from Python-style source text.
#[must_use]
pub fn parse_contract(artifact_id: &str, file_path: &Path, source: &str) -> ExtractedContract {
    let functions = extract_functions(source);
    let classes = extract_classes(source);
    let exports = extract_exports(source);
    let interface_hash = interface_hash(&functions, &classes, &exports);

    ExtractedContract {
        artifact_id: artifact_id.to_string(),
        file_path: file_path.to_path_buf(),
        functions,
        classes,
        exports,
        interface_hash,
    }
}

/// Reads `file_path` and extracts its contract. A missing file yields an
/// empty contract with an empty hash.
///
/// # Errors
///
/// Returns `ForgeError::IoError` if the file exists but cannot be read.
pub async fn extract_contract(artifact_id: &str, file_path: &Path) -> Result<ExtractedContract> {
    if !tokio::fs::try_exists(file_path).await? {
        return Ok(ExtractedContract::empty(artifact_id, file_path));
    }
    let source = tokio::fs::read_to_string(file_path).await?;
    Ok(parse_contract(artifact_id, file_path, &source))
}

//! Change validator: syntax and security sanity checks on applied content.
//!
//! Two independent checks per file: a pluggable syntax hook (fatal for that
//! file's fix) and a fixed set of security anti-pattern scans (warnings
//! only). A batch-level pass re-scans every changed file for syntax
//! regressions as the final cross-check before the build gate.

use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::error::Result;

/// Transient validation outcome for one applied fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub syntax_errors: Vec<String>,
    pub security_warnings: Vec<String>,
    pub confidence_score: f64,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        !self.syntax_errors.is_empty()
    }
}

/// Outcome of the batch-level cross-check over all changed files.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchValidation {
    pub passed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Pluggable language syntax hook.
///
/// Returns parse errors for the given content; an empty vector means the
/// content is acceptable. Implementations must not touch the filesystem.
pub trait SyntaxCheck: Send + Sync {
    fn check(&self, path: &Path, content: &str) -> Vec<String>;
}

/// Default syntax hook: balanced-delimiter scan for known source
/// extensions, skipping string literals and comments. A parse-ability
/// proxy, not a full parser; unknown extensions are not checked.
#[derive(Debug, Default)]
pub struct DelimiterSyntaxCheck;

const CHECKED_EXTENSIONS: &[&str] = &[
    "py", "java", "js", "ts", "jsx", "tsx", "rs", "go", "c", "h", "cpp", "json",
];

impl SyntaxCheck for DelimiterSyntaxCheck {
    fn check(&self, path: &Path, content: &str) -> Vec<String> {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(e) if CHECKED_EXTENSIONS.contains(&e) => e,
            _ => return Vec::new(),
        };
        scan_delimiters(content, ext)
    }
}

fn scan_delimiters(content: &str, ext: &str) -> Vec<String> {
    let hash_comments = matches!(ext, "py");
    let slash_comments = !hash_comments && ext != "json";
    let lifetimes = ext == "rs";

    let mut errors = Vec::new();
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut in_string: Option<char> = None;
    // Python triple-quoted strings span lines and may hold anything.
    let mut in_triple: Option<char> = None;
    let mut in_block_comment = false;

    for (line_no, line) in content.lines().enumerate() {
        let line_no = line_no + 1;
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if let Some(quote) = in_triple {
                if c == quote
                    && chars.get(i + 1) == Some(&quote)
                    && chars.get(i + 2) == Some(&quote)
                {
                    in_triple = None;
                    i += 3;
                    continue;
                }
                i += 1;
                continue;
            }

            if in_block_comment {
                if c == '*' && chars.get(i + 1) == Some(&'/') {
                    in_block_comment = false;
                    i += 1;
                }
                i += 1;
                continue;
            }

            if let Some(quote) = in_string {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if c == quote {
                    in_string = None;
                }
                i += 1;
                continue;
            }

            match c {
                '"' | '\''
                    if hash_comments
                        && chars.get(i + 1) == Some(&c)
                        && chars.get(i + 2) == Some(&c) =>
                {
                    in_triple = Some(c);
                    i += 2;
                }
                // A lone ' in Rust is a lifetime, not a string opener.
                '\'' if lifetimes && !is_char_literal(&chars, i) => {}
                '"' | '\'' | '`' => in_string = Some(c),
                '#' if hash_comments => break,
                '/' if slash_comments && chars.get(i + 1) == Some(&'/') => break,
                '/' if slash_comments && chars.get(i + 1) == Some(&'*') => {
                    in_block_comment = true;
                    i += 1;
                }
                '(' | '[' | '{' => stack.push((c, line_no)),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        Some((open, open_line)) => errors.push(format!(
                            "line {line_no}: '{c}' closes '{open}' opened at line {open_line}"
                        )),
                        None => errors.push(format!("line {line_no}: unmatched '{c}'")),
                    }
                }
                _ => {}
            }
            i += 1;
        }

        // Single-quoted strings do not span lines in the checked languages.
        if in_string == Some('\'') || in_string == Some('"') {
            in_string = None;
        }
    }

    for (open, line_no) in stack {
        errors.push(format!("line {line_no}: unclosed '{open}'"));
    }
    errors
}

fn is_char_literal(chars: &[char], i: usize) -> bool {
    match chars.get(i + 1) {
        Some('\\') => true,
        Some(_) => chars.get(i + 2) == Some(&'\''),
        None => false,
    }
}

/// Per-file and batch change validation.
pub struct ChangeValidator {
    syntax: Arc<dyn SyntaxCheck>,
    security_patterns: Vec<(String, Regex)>,
}

impl ChangeValidator {
    pub fn new(syntax: Arc<dyn SyntaxCheck>) -> Self {
        Self {
            syntax,
            security_patterns: security_patterns(),
        }
    }

    pub fn with_default_syntax() -> Self {
        Self::new(Arc::new(DelimiterSyntaxCheck))
    }

    /// Validate one applied file's content.
    ///
    /// Syntax errors make the result invalid; security findings are
    /// warnings and never fail the fix on their own.
    pub fn validate_content(&self, path: &Path, content: &str) -> ValidationResult {
        let syntax_errors = self.syntax.check(path, content);

        let mut security_warnings = Vec::new();
        for (name, pattern) in &self.security_patterns {
            if pattern.is_match(content) {
                security_warnings.push(format!("{}: {name}", path.display()));
            }
        }

        let is_valid = syntax_errors.is_empty();
        let confidence_score = if !is_valid {
            0.0
        } else {
            (1.0 - 0.1 * security_warnings.len() as f64).max(0.5)
        };

        ValidationResult {
            is_valid,
            syntax_errors,
            security_warnings,
            confidence_score,
        }
    }

    /// Re-scan every changed file for syntax regressions. Run once per
    /// batch, after all fixes are applied and before the build gate.
    pub fn validate_changes(&self, root: &Path, changed_files: &[String]) -> Result<BatchValidation> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for file in changed_files {
            let path = root.join(file);
            let content = std::fs::read_to_string(&path)?;
            let result = self.validate_content(Path::new(file), &content);
            for err in result.syntax_errors {
                errors.push(format!("{file}: {err}"));
            }
            warnings.extend(result.security_warnings);
        }

        if !warnings.is_empty() {
            warn!(count = warnings.len(), "security anti-patterns detected in changed files");
        }

        Ok(BatchValidation {
            passed: errors.is_empty(),
            errors,
            warnings,
        })
    }
}

/// Fixed security anti-pattern set. Findings are advisory.
fn security_patterns() -> Vec<(String, Regex)> {
    [
        ("dynamic eval call", r"\beval\s*\("),
        ("dynamic exec call", r"\bexec\s*\("),
        ("shell command execution", r"os\.system\s*\("),
        (
            "subprocess with shell=True",
            r"subprocess\.(?:call|run|Popen)\s*\([^)]*shell\s*=\s*True",
        ),
        (
            "runtime exec call",
            r"Runtime\.getRuntime\(\)\.exec",
        ),
        (
            "possible hardcoded credential",
            r#"(?i)\b(?:password|passwd|secret|api_key|apikey|auth_token)\s*=\s*["'][^"']{4,}["']"#,
        ),
    ]
    .iter()
    .map(|(name, pattern)| {
        (
            name.to_string(),
            Regex::new(pattern).expect("security pattern must compile"),
        )
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> ChangeValidator {
        ChangeValidator::with_default_syntax()
    }

    #[test]
    fn test_balanced_python_passes() {
        let result = validator().validate_content(
            Path::new("app.py"),
            "def f(x):\n    return [x, (x + 1)]\n",
        );
        assert!(result.is_valid);
        assert!(result.syntax_errors.is_empty());
    }

    #[test]
    fn test_unclosed_paren_is_fatal() {
        let result = validator().validate_content(Path::new("app.py"), "print(x\n");
        assert!(!result.is_valid);
        assert!(result.syntax_errors[0].contains("unclosed"));
        assert_eq!(result.confidence_score, 0.0);
    }

    #[test]
    fn test_mismatched_brackets_reported_with_lines() {
        let result = validator().validate_content(Path::new("a.js"), "f(]\n");
        assert!(!result.is_valid);
        assert!(result.syntax_errors[0].contains("line 1"));
    }

    #[test]
    fn test_brackets_inside_strings_and_comments_ignored() {
        let py = "x = \"unbalanced ( in string\"  # and ( in comment\n";
        assert!(validator().validate_content(Path::new("a.py"), py).is_valid);

        let js = "let s = 'also ( fine'; // trailing ( comment\n/* block ( too */\n";
        assert!(validator().validate_content(Path::new("a.js"), js).is_valid);
    }

    #[test]
    fn test_python_docstring_brackets_ignored() {
        let py = "def f():\n    \"\"\"\n    1) first step\n    2) second step\n    \"\"\"\n    return [1]\n";
        let result = validator().validate_content(Path::new("a.py"), py);
        assert!(result.is_valid, "{:?}", result.syntax_errors);
    }

    #[test]
    fn test_python_single_quote_docstring_spans_lines() {
        let py = "'''\nnotes ) and ] here\n'''\nx = (1)\n";
        assert!(validator().validate_content(Path::new("a.py"), py).is_valid);
    }

    #[test]
    fn test_rust_lifetimes_are_not_strings() {
        let rs = "fn first<'a>(items: &'a [(u32, u32)]) -> &'a (u32, u32) {\n    &items[0]\n}\n";
        assert!(validator().validate_content(Path::new("lib.rs"), rs).is_valid);
    }

    #[test]
    fn test_rust_char_literal_still_skipped() {
        let rs = "let open = '(';\nlet escaped = '\\'';\n";
        assert!(validator().validate_content(Path::new("lib.rs"), rs).is_valid);
    }

    #[test]
    fn test_unknown_extension_is_not_checked() {
        let result = validator().validate_content(Path::new("notes.txt"), "(((\n");
        assert!(result.is_valid);
    }

    #[test]
    fn test_security_findings_are_warnings_not_errors() {
        let content = "import os\nos.system(\"rm -rf /tmp/x\")\npassword = \"hunter22\"\n";
        let result = validator().validate_content(Path::new("a.py"), content);
        assert!(result.is_valid);
        assert_eq!(result.security_warnings.len(), 2);
        assert!(result.confidence_score < 1.0);
    }

    #[test]
    fn test_shell_true_detected() {
        let content = "subprocess.run(cmd, shell=True)\n";
        let result = validator().validate_content(Path::new("a.py"), content);
        assert!(result
            .security_warnings
            .iter()
            .any(|w| w.contains("shell=True")));
    }

    #[test]
    fn test_batch_validation_reads_files_from_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.py"), "x = (1)\n").unwrap();
        std::fs::write(dir.path().join("bad.py"), "x = (1\n").unwrap();

        let batch = validator()
            .validate_changes(
                dir.path(),
                &["good.py".to_string(), "bad.py".to_string()],
            )
            .unwrap();
        assert!(!batch.passed);
        assert_eq!(batch.errors.len(), 1);
        assert!(batch.errors[0].starts_with("bad.py"));
    }
}

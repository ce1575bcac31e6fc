//! Language-aware line counting for the code-to-test ratio.
//!
//! Every physical line is classified as code, comment or blank, so that
//! `code + comment + blank == lines().count()` always holds. Block comments
//! are tracked across lines. Comment markers inside string literals are
//! not detected.

use std::path::Path;

use serde::Serialize;

/// Comment syntax family, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocLanguage {
    /// `//`, nestable `/* */`; `#[...]` attributes are code.
    Rust,
    /// `//`, `/* */`
    Go,
    /// C, C++, Java, Kotlin, JavaScript, TypeScript, Swift, C#, Scala.
    CLike,
    /// `#`
    Python,
    /// `#`, `=begin` / `=end`
    Ruby,
    /// `#`
    Shell,
    /// Only blank lines are excluded.
    #[default]
    Unknown,
}

impl LocLanguage {
    pub fn from_path(path: &Path) -> Self {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "rs" => Self::Rust,
            "go" => Self::Go,
            "c" | "h" | "cc" | "cpp" | "hpp" | "java" | "kt" | "kts" | "js" | "jsx" | "mjs"
            | "cjs" | "ts" | "tsx" | "swift" | "cs" | "scala" => Self::CLike,
            "py" | "pyi" => Self::Python,
            "rb" | "rake" => Self::Ruby,
            "sh" | "bash" | "zsh" => Self::Shell,
            _ => Self::Unknown,
        }
    }

    fn line_comment(&self) -> Option<&'static str> {
        match self {
            Self::Rust | Self::Go | Self::CLike => Some("//"),
            Self::Python | Self::Ruby | Self::Shell => Some("#"),
            Self::Unknown => None,
        }
    }

    fn block_comment(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Rust | Self::Go | Self::CLike => Some(("/*", "*/")),
            Self::Ruby => Some(("=begin", "=end")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LocCount {
    pub code: u64,
    pub comment: u64,
    pub blank: u64,
}

impl LocCount {
    pub fn lines(&self) -> u64 {
        self.code + self.comment + self.blank
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineType {
    Code,
    Comment,
    Blank,
}

#[derive(Debug, Default)]
struct CommentState {
    /// Nesting depth; only Rust nests, other languages stay at 0 or 1.
    depth: usize,
}

/// Classify every line of `content`.
pub fn count(content: &str, language: LocLanguage) -> LocCount {
    let mut result = LocCount::default();
    let mut state = CommentState::default();

    for line in content.lines() {
        match classify_line(line.trim(), &mut state, language) {
            LineType::Code => result.code += 1,
            LineType::Comment => result.comment += 1,
            LineType::Blank => result.blank += 1,
        }
    }
    result
}

fn classify_line(trimmed: &str, state: &mut CommentState, language: LocLanguage) -> LineType {
    if trimmed.is_empty() {
        return if state.depth > 0 {
            LineType::Comment
        } else {
            LineType::Blank
        };
    }

    let Some((open, close)) = language.block_comment() else {
        return if is_line_comment(trimmed, language) {
            LineType::Comment
        } else {
            LineType::Code
        };
    };

    // Ruby's =begin/=end only count at the start of a line.
    if language == LocLanguage::Ruby {
        if state.depth > 0 {
            if trimmed.starts_with(close) {
                state.depth = 0;
            }
            return LineType::Comment;
        }
        if trimmed.starts_with(open) {
            state.depth = 1;
            return LineType::Comment;
        }
        return if is_line_comment(trimmed, language) {
            LineType::Comment
        } else {
            LineType::Code
        };
    }

    let mut has_code = false;
    let mut rest = trimmed;
    while !rest.is_empty() {
        if state.depth > 0 {
            let next_open = if language == LocLanguage::Rust {
                rest.find(open)
            } else {
                None
            };
            match (next_open, rest.find(close)) {
                (Some(o), Some(c)) if o < c => {
                    state.depth += 1;
                    rest = &rest[o + open.len()..];
                }
                (_, Some(c)) => {
                    state.depth -= 1;
                    rest = &rest[c + close.len()..];
                }
                (Some(o), None) => {
                    state.depth += 1;
                    rest = &rest[o + open.len()..];
                }
                (None, None) => break,
            }
        } else {
            let segment = rest.trim_start();
            if segment.is_empty() || is_line_comment(segment, language) {
                break;
            }
            match segment.find(open) {
                Some(0) => {
                    state.depth = 1;
                    rest = &segment[open.len()..];
                }
                Some(o) => {
                    has_code = true;
                    state.depth = 1;
                    rest = &segment[o + open.len()..];
                }
                None => {
                    has_code = true;
                    break;
                }
            }
        }
    }

    if has_code {
        LineType::Code
    } else {
        LineType::Comment
    }
}

fn is_line_comment(trimmed: &str, language: LocLanguage) -> bool {
    language
        .line_comment()
        .is_some_and(|prefix| trimmed.starts_with(prefix))
}

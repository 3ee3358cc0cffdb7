//! Symbol Tokenizers
//!
//! Best-effort, line-oriented symbol extraction. Each language gets a
//! `LanguageTokenizer` that returns `(name, kind, line)` tuples; the built-in
//! implementations are regex rule sets, and a parser-backed tokenizer can be
//! registered in their place without changing callers.
//!
//! Multi-line declarations (a signature split across lines, decorators on their
//! own line, etc.) may be missed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    Type,
    Variable,
    Enum,
    Struct,
    Module,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Type => "type",
            SymbolKind::Variable => "variable",
            SymbolKind::Enum => "enum",
            SymbolKind::Struct => "struct",
            SymbolKind::Module => "module",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(SymbolKind::Function),
            "class" => Some(SymbolKind::Class),
            "interface" => Some(SymbolKind::Interface),
            "type" => Some(SymbolKind::Type),
            "variable" => Some(SymbolKind::Variable),
            "enum" => Some(SymbolKind::Enum),
            "struct" => Some(SymbolKind::Struct),
            "module" => Some(SymbolKind::Module),
            _ => None,
        }
    }
}

/// A symbol found by a tokenizer, before it is attributed to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolToken {
    pub name: String,
    pub kind: SymbolKind,
    /// 1-based line number
    pub line: usize,
}

/// A symbol attributed to a workspace file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub file: String,
    pub line: usize,
}

impl Symbol {
    pub fn from_token(token: SymbolToken, file: impl Into<String>) -> Self {
        Self {
            name: token.name,
            kind: token.kind,
            file: file.into(),
            line: token.line,
        }
    }
}

/// Extracts symbols from the source text of one language.
pub trait LanguageTokenizer: Send + Sync {
    /// Language identifier, e.g. `"typescript"`.
    fn language(&self) -> &str;

    /// Return every symbol found in `content`, in line order.
    fn tokenize(&self, content: &str) -> Vec<SymbolToken>;
}

/// Tokenizer driven by an ordered list of line regexes.
///
/// Capture group 1 of each rule is the symbol name. The first rule matching a
/// line wins, so more specific rules must come first.
pub struct RegexTokenizer {
    language: String,
    rules: Vec<(Regex, SymbolKind)>,
}

impl RegexTokenizer {
    pub fn new(language: impl Into<String>, rules: &[(&str, SymbolKind)]) -> CoreResult<Self> {
        let rules = rules
            .iter()
            .map(|(pattern, kind)| Ok((Regex::new(pattern)?, *kind)))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Self {
            language: language.into(),
            rules,
        })
    }
}

impl LanguageTokenizer for RegexTokenizer {
    fn language(&self) -> &str {
        &self.language
    }

    fn tokenize(&self, content: &str) -> Vec<SymbolToken> {
        let mut symbols = Vec::new();

        for (line_number, line) in content.lines().enumerate() {
            for (re, kind) in &self.rules {
                if let Some(name) = re.captures(line).and_then(|caps| caps.get(1)) {
                    symbols.push(SymbolToken {
                        name: name.as_str().to_string(),
                        kind: *kind,
                        line: line_number + 1,
                    });
                    break;
                }
            }
        }

        symbols
    }
}

// ---------------------------------------------------------------------------
// Built-in rule sets
// ---------------------------------------------------------------------------

const C_FAMILY_RULES: &[(&str, SymbolKind)] = &[
    (
        r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)",
        SymbolKind::Function,
    ),
    (
        r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=>",
        SymbolKind::Function,
    ),
    (
        r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)",
        SymbolKind::Class,
    ),
    (
        r"^\s*(?:export\s+)?interface\s+([A-Za-z_$][\w$]*)",
        SymbolKind::Interface,
    ),
    (
        r"^\s*(?:export\s+)?type\s+([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*=",
        SymbolKind::Type,
    ),
    (
        r"^\s*(?:export\s+)?(?:declare\s+)?(?:const\s+)?enum\s+([A-Za-z_$][\w$]*)",
        SymbolKind::Enum,
    ),
    (
        r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)",
        SymbolKind::Variable,
    ),
];

const PYTHON_RULES: &[(&str, SymbolKind)] = &[
    (r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(", SymbolKind::Function),
    (r"^\s*class\s+([A-Za-z_]\w*)\s*[:(]", SymbolKind::Class),
];

const GO_RULES: &[(&str, SymbolKind)] = &[
    (
        r"^func\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)\s*[\[(]",
        SymbolKind::Function,
    ),
    (r"^type\s+([A-Za-z_]\w*)\s+struct\b", SymbolKind::Struct),
    (r"^type\s+([A-Za-z_]\w*)\s+interface\b", SymbolKind::Interface),
    (r"^type\s+([A-Za-z_]\w*)\s", SymbolKind::Type),
];

const RUST_RULES: &[(&str, SymbolKind)] = &[
    (
        r"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+([A-Za-z_]\w*)\s*[<(]",
        SymbolKind::Function,
    ),
    (
        r"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?struct\s+([A-Za-z_]\w*)",
        SymbolKind::Struct,
    ),
    (
        r"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?enum\s+([A-Za-z_]\w*)",
        SymbolKind::Enum,
    ),
    (
        r"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?(?:unsafe\s+)?trait\s+([A-Za-z_]\w*)",
        SymbolKind::Interface,
    ),
    (
        r"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?type\s+([A-Za-z_]\w*)",
        SymbolKind::Type,
    ),
    (
        r"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?mod\s+([A-Za-z_]\w*)",
        SymbolKind::Module,
    ),
    (
        r"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?(?:const|static)\s+([A-Z_][A-Z0-9_]*)\s*:",
        SymbolKind::Variable,
    ),
];

const JAVA_RULES: &[(&str, SymbolKind)] = &[
    (
        r"^\s*(?:(?:public|private|protected|static|final|abstract)\s+)*class\s+([A-Za-z_]\w*)",
        SymbolKind::Class,
    ),
    (
        r"^\s*(?:(?:public|private|protected|static)\s+)*interface\s+([A-Za-z_]\w*)",
        SymbolKind::Interface,
    ),
    (
        r"^\s*(?:(?:public|private|protected|static)\s+)*enum\s+([A-Za-z_]\w*)",
        SymbolKind::Enum,
    ),
    (
        r"^\s*(?:public|private|protected)\s+(?:static\s+)?(?:final\s+)?[\w<>\[\],\s]+\s+([a-z_]\w*)\s*\(",
        SymbolKind::Function,
    ),
];

/// Map a file path to a language identifier by its extension.
pub fn detect_language(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext)?;
    let language = match ext.to_ascii_lowercase().as_str() {
        "ts" | "tsx" | "mts" | "cts" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "py" | "pyi" => "python",
        "go" => "go",
        "rs" => "rust",
        "java" => "java",
        _ => return None,
    };
    Some(language)
}

/// Static table of tokenizers keyed by language.
#[derive(Clone, Default)]
pub struct TokenizerRegistry {
    tokenizers: HashMap<String, Arc<dyn LanguageTokenizer>>,
}

impl TokenizerRegistry {
    /// Empty registry; every language is unsupported until registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the regex tokenizers for all built-in languages.
    pub fn builtin() -> CoreResult<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(RegexTokenizer::new("typescript", C_FAMILY_RULES)?));
        registry.register(Arc::new(RegexTokenizer::new("javascript", C_FAMILY_RULES)?));
        registry.register(Arc::new(RegexTokenizer::new("python", PYTHON_RULES)?));
        registry.register(Arc::new(RegexTokenizer::new("go", GO_RULES)?));
        registry.register(Arc::new(RegexTokenizer::new("rust", RUST_RULES)?));
        registry.register(Arc::new(RegexTokenizer::new("java", JAVA_RULES)?));
        Ok(registry)
    }

    /// Register (or replace) the tokenizer for its language.
    pub fn register(&mut self, tokenizer: Arc<dyn LanguageTokenizer>) {
        self.tokenizers
            .insert(tokenizer.language().to_string(), tokenizer);
    }

    pub fn get(&self, language: &str) -> Option<&Arc<dyn LanguageTokenizer>> {
        self.tokenizers.get(language)
    }

    /// Tokenize `content` as the language detected from `path`.
    ///
    /// Unknown languages yield no symbols.
    pub fn extract(&self, path: &str, content: &str) -> Vec<Symbol> {
        let Some(tokenizer) = detect_language(path).and_then(|lang| self.get(lang)) else {
            return Vec::new();
        };
        tokenizer
            .tokenize(content)
            .into_iter()
            .map(|token| Symbol::from_token(token, path))
            .collect()
    }
}

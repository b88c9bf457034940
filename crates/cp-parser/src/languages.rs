//! Source languages recognized in patch file headers.
//!
//! Only files with a known extension contribute modified methods; build files,
//! resources and docs touched by a patch are skipped.

/// A language with a method-signature heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Java,
    Kotlin,
    JavaScript,
    Python,
    Rust,
    Go,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Java,
        Language::Kotlin,
        Language::JavaScript,
        Language::Python,
        Language::Rust,
        Language::Go,
    ];

    /// Detect from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "java" => Some(Self::Java),
            "kt" | "kts" => Some(Self::Kotlin),
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" => Some(Self::JavaScript),
            "py" => Some(Self::Python),
            "rs" => Some(Self::Rust),
            "go" => Some(Self::Go),
            _ => None,
        }
    }

    /// Detect from a slash-separated path.
    pub fn from_path(path: &str) -> Option<Self> {
        let file = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = file.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Java => "java",
            Self::Kotlin => "kotlin",
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Go => "go",
        }
    }

    /// Whether method bodies are delimited by braces, so scope can be closed
    /// by brace counting. Python bodies run until the next `def`.
    pub fn uses_braces(self) -> bool {
        !matches!(self, Self::Python)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(
            Language::from_path("src/main/java/org/Foo.java"),
            Some(Language::Java)
        );
        assert_eq!(Language::from_path("lib/util.PY"), Some(Language::Python));
        assert_eq!(Language::from_path("pom.xml"), None);
        assert_eq!(Language::from_path("Makefile"), None);
    }

    #[test]
    fn test_braces() {
        assert!(Language::Java.uses_braces());
        assert!(!Language::Python.uses_braces());
    }
}

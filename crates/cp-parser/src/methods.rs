//! Enclosing-method detection for diff hunks.
//!
//! Regex heuristics, not a grammar: a line "opens" a method when it looks like
//! a signature (modifiers, return type, identifier, parameter list) for the
//! file's language. Each changed line is attributed to the nearest opener seen
//! before it on the same side of the hunk, starting from the hunk header's
//! function-context trailer. Changes with no such opener (fields, imports,
//! class bodies) are not attributed to any method.

use crate::diff::{FileDiff, Hunk, HunkLine};
use crate::languages::Language;
use cp_core::model::ModifiedMethod;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Identifiers that look like a type or name in a signature position but
/// belong to statements or type declarations.
const NON_METHOD_WORDS: &[&str] = &[
    "if",
    "for",
    "while",
    "switch",
    "catch",
    "try",
    "else",
    "return",
    "new",
    "class",
    "interface",
    "enum",
    "record",
    "throw",
    "throws",
    "case",
    "do",
    "assert",
    "yield",
    "await",
    "import",
    "package",
    "synchronized",
    "super",
    "this",
];

fn java_method_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"^(?:@[\w.]+(?:\([^)]*\))?\s+)*",
            r"(?:(?:public|protected|private|static|final|abstract|synchronized|native|strictfp|default)\s+)*",
            r"(?:<[^>]*>\s+)?",
            r"([\w$.]+(?:\s*<[^()]*?>)?(?:\s*\[\])*)\s+",
            r"([A-Za-z_$][\w$]*)\s*\(",
        ))
        .unwrap()
    })
}

fn java_constructor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:@[\w.]+(?:\([^)]*\))?\s+)*(?:public|protected|private)\s+([A-Z][\w$]*)\s*\(")
            .unwrap()
    })
}

fn kotlin_fun_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"^(?:@[\w.]+(?:\([^)]*\))?\s+)*",
            r"(?:(?:public|private|protected|internal|override|open|abstract|suspend|inline|operator|infix|tailrec|external|final)\s+)*",
            r"fun\s+(?:<[^>]*>\s*)?(?:[\w.]+\.)?([A-Za-z_]\w*)\s*\(",
        ))
        .unwrap()
    })
}

fn js_function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"^(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*\(",
            r"|^(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*=>|[A-Za-z_$][\w$]*\s*=>)",
            r"|^(?:(?:static|async|get|set|public|private|protected)\s+)*([A-Za-z_$][\w$]*)\s*\([^;]*\)\s*(?::\s*[^{;]+)?\{\s*$",
        ))
        .unwrap()
    })
}

fn python_def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").unwrap())
}

fn rust_fn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^(?:pub(?:\([^)]*\))?\s+)?(?:(?:default|const|async|unsafe|extern(?:\s+"[^"]*")?)\s+)*fn\s+([A-Za-z_]\w*)"#,
        )
        .unwrap()
    })
}

fn go_func_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^func\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)\s*[\[(]").unwrap())
}

fn is_non_method_word(word: &str) -> bool {
    NON_METHOD_WORDS.contains(&word)
}

/// Name of the method whose signature starts on `line`, if any.
pub fn method_opened_by(lang: Language, line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Declarations without a body and plain statements.
    if matches!(lang, Language::Java | Language::Rust | Language::JavaScript)
        && trimmed.ends_with(';')
    {
        return None;
    }

    match lang {
        Language::Java => {
            if let Some(caps) = java_method_re().captures(trimmed) {
                let ty = caps.get(1).map_or("", |m| m.as_str());
                let name = caps.get(2).map_or("", |m| m.as_str());
                if !is_non_method_word(ty) && !is_non_method_word(name) {
                    return Some(name.to_string());
                }
            }
            java_constructor_re()
                .captures(trimmed)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        }
        Language::JavaScript => {
            let caps = js_function_re().captures(trimmed)?;
            let name = (1..=3).find_map(|i| caps.get(i))?.as_str();
            (!is_non_method_word(name)).then(|| name.to_string())
        }
        Language::Kotlin => first_capture(kotlin_fun_re(), trimmed),
        Language::Python => first_capture(python_def_re(), trimmed),
        Language::Rust => first_capture(rust_fn_re(), trimmed),
        Language::Go => first_capture(go_func_re(), trimmed),
    }
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Net `{` minus `}` on a line, ignoring string/char literals and `//` comments.
fn brace_delta(line: &str, lang: Language) -> i32 {
    let mut delta = 0;
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == '\\' {
                chars.next();
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '`' => quote = Some(c),
            // Rust lifetimes use a lone quote.
            '\'' if lang != Language::Rust => quote = Some(c),
            '/' if chars.peek() == Some(&'/') => break,
            '{' => delta += 1,
            '}' => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// The method currently enclosing one side (old or new) of a hunk.
#[derive(Debug, Default)]
struct Scope {
    method: Option<String>,
    /// Brace depth since the opener; only meaningful when `tracked`.
    depth: i32,
    opened: bool,
    /// The opener was seen inside the hunk, so its closing brace can be found.
    tracked: bool,
}

impl Scope {
    fn enter(&mut self, name: String, tracked: bool) {
        self.method = Some(name);
        self.depth = 0;
        self.opened = false;
        self.tracked = tracked;
    }

    /// Feed one line of this side and return the method that owns it.
    fn feed(&mut self, text: &str, lang: Language) -> Option<String> {
        if let Some(name) = method_opened_by(lang, text) {
            self.enter(name, true);
        }
        let owner = self.method.clone();

        if self.tracked && self.method.is_some() && lang.uses_braces() {
            self.depth += brace_delta(text, lang);
            if self.depth > 0 {
                self.opened = true;
            } else if self.opened {
                self.method = None;
                self.tracked = false;
            }
        }
        owner
    }
}

/// Method names touched by the changed lines of one hunk.
pub fn hunk_methods(hunk: &Hunk, lang: Language) -> BTreeSet<String> {
    let mut old_side = Scope::default();
    let mut new_side = Scope::default();
    if let Some(name) = method_opened_by(lang, &hunk.section) {
        old_side.enter(name.clone(), false);
        new_side.enter(name, false);
    }

    let mut touched = BTreeSet::new();
    for line in &hunk.lines {
        match line {
            HunkLine::Context(text) => {
                old_side.feed(text, lang);
                new_side.feed(text, lang);
            }
            HunkLine::Removed(text) => {
                if let Some(name) = old_side.feed(text, lang) {
                    touched.insert(name);
                }
            }
            HunkLine::Added(text) => {
                if let Some(name) = new_side.feed(text, lang) {
                    touched.insert(name);
                }
            }
        }
    }
    touched
}

/// All methods modified in one file section. Files in languages without a
/// signature heuristic yield nothing.
pub fn file_methods(file: &FileDiff) -> BTreeSet<ModifiedMethod> {
    let Some(path) = file.path() else {
        return BTreeSet::new();
    };
    let Some(lang) = Language::from_path(path) else {
        return BTreeSet::new();
    };

    file.hunks
        .iter()
        .flat_map(|hunk| hunk_methods(hunk, lang))
        .map(|name| ModifiedMethod::new(path, name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn java(line: &str) -> Option<String> {
        method_opened_by(Language::Java, line)
    }

    #[test]
    fn test_java_signatures() {
        assert_eq!(java("public int calculate(int x) {"), Some("calculate".into()));
        assert_eq!(java("    private static void main(String[] args)"), Some("main".into()));
        assert_eq!(
            java("@Override public boolean equals(Object other) {"),
            Some("equals".into())
        );
        assert_eq!(
            java("protected <T> List<T> collect(Iterable<T> items) {"),
            Some("collect".into())
        );
        assert_eq!(
            java("Map<String, List<Integer>> index(String key) {"),
            Some("index".into())
        );
        assert_eq!(java("double[] values() {"), Some("values".into()));
        assert_eq!(java("public Fraction(int num, int den) {"), Some("Fraction".into()));
    }

    #[test]
    fn test_java_statements_are_not_signatures() {
        assert_eq!(java("if (x > 0) {"), None);
        assert_eq!(java("} else if (y) {"), None);
        assert_eq!(java("return compute(x);"), None);
        assert_eq!(java("return compute(x,"), None);
        assert_eq!(java("new Comparator<Foo>() {"), None);
        assert_eq!(java("synchronized (lock) {"), None);
        assert_eq!(java("for (int i = 0; i < n; i++) {"), None);
        assert_eq!(java("abstract void run();"), None);
        assert_eq!(java("String s = String.valueOf(x);"), None);
        assert_eq!(java("Foo result = build("), None);
        assert_eq!(java("public class Foo extends Bar {"), None);
        assert_eq!(java("throw new IllegalStateException("), None);
    }

    #[test]
    fn test_other_languages() {
        assert_eq!(
            method_opened_by(Language::Python, "    async def fetch(self, url):"),
            Some("fetch".into())
        );
        assert_eq!(
            method_opened_by(Language::Rust, "pub(crate) async fn load(path: &Path) -> Result<()> {"),
            Some("load".into())
        );
        assert_eq!(method_opened_by(Language::Rust, "fn decl(&self);"), None);
        assert_eq!(
            method_opened_by(Language::Go, "func (s *Server) Serve(l net.Listener) error {"),
            Some("Serve".into())
        );
        assert_eq!(
            method_opened_by(Language::Kotlin, "override fun onCreate(state: Bundle?) {"),
            Some("onCreate".into())
        );
        assert_eq!(
            method_opened_by(Language::JavaScript, "export async function handler(event) {"),
            Some("handler".into())
        );
        assert_eq!(
            method_opened_by(Language::JavaScript, "const add = (a, b) => a + b;"),
            None
        );
        assert_eq!(
            method_opened_by(Language::JavaScript, "const add = (a, b) => {"),
            Some("add".into())
        );
        assert_eq!(method_opened_by(Language::JavaScript, "if (ready) {"), None);
    }

    #[test]
    fn test_brace_delta_ignores_literals_and_comments() {
        assert_eq!(brace_delta("if (x) { y(); }", Language::Java), 0);
        assert_eq!(brace_delta("s = \"{{\"; {", Language::Java), 1);
        assert_eq!(brace_delta("c = '}'; // }}}", Language::Java), 0);
        assert_eq!(brace_delta("fn f<'a>(x: &'a str) {", Language::Rust), 1);
    }

    fn hunk(section: &str, lines: Vec<HunkLine>) -> Hunk {
        Hunk {
            old_start: 1,
            old_count: 0,
            new_start: 1,
            new_count: 0,
            section: section.to_string(),
            lines,
        }
    }

    fn ctx(s: &str) -> HunkLine {
        HunkLine::Context(s.to_string())
    }
    fn del(s: &str) -> HunkLine {
        HunkLine::Removed(s.to_string())
    }
    fn add(s: &str) -> HunkLine {
        HunkLine::Added(s.to_string())
    }

    #[test]
    fn test_trailer_attributes_changes() {
        let h = hunk(
            "public int calculate(int x) {",
            vec![ctx("        x++;"), ctx("    }"), add("    x--;"), ctx("    return x;")],
        );
        // Trailer scope is never closed by braces: its nesting is unknown.
        let methods = hunk_methods(&h, Language::Java);
        assert_eq!(methods.into_iter().collect::<Vec<_>>(), vec!["calculate"]);
    }

    #[test]
    fn test_opener_in_context_wins_over_trailer() {
        let h = hunk(
            "public int first() {",
            vec![
                ctx("    }"),
                ctx(""),
                ctx("    public int second() {"),
                del("        return 1;"),
                add("        return 2;"),
                ctx("    }"),
            ],
        );
        let methods = hunk_methods(&h, Language::Java);
        assert_eq!(methods.into_iter().collect::<Vec<_>>(), vec!["second"]);
    }

    #[test]
    fn test_change_after_method_closes_is_unattributed() {
        let h = hunk(
            "public class Foo {",
            vec![
                ctx("    void a() {"),
                ctx("        run();"),
                ctx("    }"),
                add("    private int counter;"),
            ],
        );
        assert!(hunk_methods(&h, Language::Java).is_empty());
    }

    #[test]
    fn test_field_change_without_method_is_ignored() {
        let h = hunk(
            "",
            vec![ctx("import java.util.List;"), del("private int a = 1;"), add("private int a = 2;")],
        );
        assert!(hunk_methods(&h, Language::Java).is_empty());
    }

    #[test]
    fn test_added_method_is_attributed_to_itself() {
        let h = hunk(
            "public class Foo {",
            vec![
                add("    public void bar() {"),
                add("        baz();"),
                add("    }"),
                ctx("}"),
            ],
        );
        let methods = hunk_methods(&h, Language::Java);
        assert_eq!(methods.into_iter().collect::<Vec<_>>(), vec!["bar"]);
    }

    #[test]
    fn test_signature_change_on_both_sides() {
        let h = hunk(
            "",
            vec![
                del("    public int foo(int a) {"),
                add("    public long foo(long a) {"),
                ctx("        return a;"),
                ctx("    }"),
            ],
        );
        let methods = hunk_methods(&h, Language::Java);
        assert_eq!(methods.into_iter().collect::<Vec<_>>(), vec!["foo"]);
    }

    #[test]
    fn test_file_methods_skips_non_source_files() {
        let file = FileDiff {
            old_path: Some("pom.xml".to_string()),
            new_path: Some("pom.xml".to_string()),
            hunks: vec![hunk("", vec![add("<version>2</version>")])],
        };
        assert!(file_methods(&file).is_empty());
    }
}

//! Static pre-filter applied to submissions before any worker exists.
//!
//! This is a textual denylist, not a capability sandbox. It catches the
//! obvious ways of reaching outside the runtime; a determined user can get
//! around it, which is an accepted weakness of the design. Anything it
//! misses still lands inside a stripped-down V8 isolate with no host
//! bindings.

/// Substrings that must not appear anywhere in a submission. They name the
/// engine's own escape hatches and the host-side bindings the bootstrap
/// script installs.
const FORBIDDEN_WORDS: &[&str] = &[
    "Deno",
    "globalThis",
    "__host",
    "eval(",
    "Function(",
    "constructor",
    "import(",
    "require(",
];

/// Module names that must not appear in an `import`/`require` position.
const FORBIDDEN_MODULES: &[&str] = &[
    "fs",
    "net",
    "http",
    "child_process",
    "worker_threads",
    "os",
    "process",
    "vm",
    "v8",
];

pub const DEFAULT_MAX_LINES: usize = 300;

/// Why a submission was refused. Each variant carries enough to tell the
/// user what to fix.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("you can't eval over {limit} lines (got {lines})")]
    TooLong { lines: usize, limit: usize },

    #[error("your code has a word that would be risky to eval: `{0}`")]
    ForbiddenWord(String),

    #[error("your code has an import that would be risky to eval: `{0}`")]
    ForbiddenImport(String),
}

/// The filter tables as data. Lists are plain fields so a deployment can
/// swap in its own; the checks themselves never change.
#[derive(Debug, Clone)]
pub struct Policy {
    pub max_lines: usize,
    pub forbidden_words: Vec<String>,
    pub forbidden_modules: Vec<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
            forbidden_words: FORBIDDEN_WORDS.iter().map(|w| w.to_string()).collect(),
            forbidden_modules: FORBIDDEN_MODULES.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl Policy {
    /// Run the checks in order: line cap, forbidden words, forbidden
    /// imports. The first failure wins.
    pub fn check(&self, source: &str) -> Result<(), Rejection> {
        let lines = source.lines().count();
        if lines > self.max_lines {
            return Err(Rejection::TooLong {
                lines,
                limit: self.max_lines,
            });
        }

        for word in &self.forbidden_words {
            if source.contains(word.as_str()) {
                return Err(Rejection::ForbiddenWord(word.clone()));
            }
        }

        for module in &self.forbidden_modules {
            if names_module(source, module) {
                return Err(Rejection::ForbiddenImport(module.clone()));
            }
        }

        Ok(())
    }
}

/// Whether `source` mentions `module` in an import-like position: quoted
/// after `import`/`require`, or as `from "module"`. Substring matching on
/// the quoted name keeps false positives down ("fs" alone appears in plenty
/// of innocent identifiers).
fn names_module(source: &str, module: &str) -> bool {
    for quote in ['"', '\'', '`'] {
        let quoted = format!("{quote}{module}{quote}");
        if let Some(at) = source.find(&quoted) {
            let before = &source[..at];
            if before.trim_end().ends_with("from")
                || before.rfind("import").is_some_and(|i| at - i < 40)
                || before.rfind("require").is_some_and(|i| at - i < 40)
            {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_code() {
        let policy = Policy::default();
        assert!(policy.check("let x = 1 + 2;\nprint(x);").is_ok());
    }

    #[test]
    fn rejects_over_line_limit() {
        let policy = Policy::default();
        let source = "print(1);\n".repeat(DEFAULT_MAX_LINES + 1);
        match policy.check(&source) {
            Err(Rejection::TooLong { lines, limit }) => {
                assert_eq!(lines, DEFAULT_MAX_LINES + 1);
                assert_eq!(limit, DEFAULT_MAX_LINES);
            }
            other => panic!("expected TooLong, got {other:?}"),
        }
    }

    #[test]
    fn rejects_forbidden_words() {
        let policy = Policy::default();
        for source in [
            "Deno.core.ops.op_host_print('hi')",
            "globalThis.print = null",
            "eval('1 + 1')",
            "new Function('return 1')()",
            "print.constructor('return 1')",
        ] {
            assert!(
                matches!(policy.check(source), Err(Rejection::ForbiddenWord(_))),
                "should reject: {source}"
            );
        }
    }

    #[test]
    fn rejects_forbidden_imports() {
        let policy = Policy::default();
        let source = "const fs = await import \"fs\";";
        // "import(" is caught as a word; the bare form is caught as a module
        assert!(policy.check(source).is_err());
        assert!(matches!(
            policy.check("from \"child_process\""),
            Err(Rejection::ForbiddenImport(_))
        ));
    }

    #[test]
    fn module_names_inside_strings_are_fine() {
        let policy = Policy::default();
        assert!(policy.check("print(\"the os is down\")").is_ok());
    }

    #[test]
    fn custom_tables_replace_defaults() {
        let policy = Policy {
            max_lines: 2,
            forbidden_words: vec!["banana".into()],
            forbidden_modules: vec![],
        };
        assert!(policy.check("print('Deno')").is_ok());
        assert!(matches!(
            policy.check("let banana = 1;"),
            Err(Rejection::ForbiddenWord(_))
        ));
        assert!(matches!(
            policy.check("a\nb\nc"),
            Err(Rejection::TooLong { .. })
        ));
    }
}

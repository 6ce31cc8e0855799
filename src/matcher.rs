//! Named pattern matchers for Ivy-style pattern excludes.
//!
//! A [`PatternMatcher`] compiles an expression once; the resulting
//! [`CompiledPattern`] is stored inside the interned exclude and evaluated
//! on every query. Matchers are looked up by name through a
//! [`MatcherRegistry`].
//!
//! ## Built-in matchers
//!
//! | Name | Semantics |
//! |------|-----------|
//! | `exact` | String equality |
//! | `regexp` | Full-string regular expression match |
//! | `glob` | `*` any run, `?` one character, `[...]` character class |
//! | `exactOrRegexp` | Equality, or full-string regular expression match |
//!
//! For every built-in, the expression `*` matches any input.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use regex_lite::Regex;

use crate::error::ExcludeError;

/// Expression that matches any input, whatever the matcher.
pub const ANY_EXPRESSION: &str = "*";

/// Name of the exact matcher.
pub const EXACT: &str = "exact";
/// Name of the regular expression matcher.
pub const REGEXP: &str = "regexp";
/// Name of the glob matcher.
pub const GLOB: &str = "glob";
/// Name of the exact-or-regular-expression matcher.
pub const EXACT_OR_REGEXP: &str = "exactOrRegexp";

/// A compiled expression, ready to test candidates.
pub trait CompiledPattern: fmt::Debug + Send + Sync {
    /// Whether `input` matches this pattern.
    fn matches(&self, input: &str) -> bool;
}

/// A named pattern-matching capability.
pub trait PatternMatcher: Send + Sync {
    /// Name under which this matcher is registered.
    fn name(&self) -> &str;

    /// Compile an expression.
    fn compile(&self, expression: &str) -> Result<Box<dyn CompiledPattern>, ExcludeError>;
}

#[derive(Debug)]
struct AnyPattern;

impl CompiledPattern for AnyPattern {
    fn matches(&self, _input: &str) -> bool {
        true
    }
}

#[derive(Debug)]
struct ExactPattern(String);

impl CompiledPattern for ExactPattern {
    fn matches(&self, input: &str) -> bool {
        self.0 == input
    }
}

#[derive(Debug)]
struct RegexPattern(Regex);

impl CompiledPattern for RegexPattern {
    fn matches(&self, input: &str) -> bool {
        self.0.is_match(input)
    }
}

#[derive(Debug)]
struct ExactOrRegexPattern {
    exact: String,
    regex: Regex,
}

impl CompiledPattern for ExactOrRegexPattern {
    fn matches(&self, input: &str) -> bool {
        self.exact == input || self.regex.is_match(input)
    }
}

fn full_match_regex(matcher: &str, expression: &str, source: &str) -> Result<Regex, ExcludeError> {
    Regex::new(&format!("^(?:{})$", source)).map_err(|e| ExcludeError::InvalidPattern {
        matcher: matcher.to_string(),
        pattern: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Translate a glob into an equivalent regular expression body.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2);
    // Length of `out` where the open class's members begin.
    let mut class_start: Option<usize> = None;
    for c in glob.chars() {
        match c {
            '*' if class_start.is_none() => out.push_str(".*"),
            '?' if class_start.is_none() => out.push('.'),
            '[' if class_start.is_none() => {
                out.push('[');
                class_start = Some(out.len());
            }
            '!' if class_start == Some(out.len()) && out.ends_with('[') => {
                out.push('^');
                class_start = Some(out.len());
            }
            // A leading `]` is a member, not the end of the class.
            ']' if class_start == Some(out.len()) => out.push_str("\\]"),
            ']' if class_start.is_some() => {
                class_start = None;
                out.push(']');
            }
            c if class_start.is_some() => {
                if "\\[&~".contains(c) {
                    out.push('\\');
                }
                out.push(c);
            }
            c => {
                if "\\.+()|{}^$".contains(c) {
                    out.push('\\');
                }
                out.push(c);
            }
        }
    }
    if class_start.is_some() {
        // Unterminated class: treat the bracket literally.
        return glob
            .chars()
            .map(|c| match c {
                '*' => ".*".to_string(),
                '?' => ".".to_string(),
                c if "\\.+()|{}[]^$".contains(c) => format!("\\{}", c),
                c => c.to_string(),
            })
            .collect();
    }
    out
}

/// Matcher using string equality.
#[derive(Debug, Default)]
pub struct ExactMatcher;

impl PatternMatcher for ExactMatcher {
    fn name(&self) -> &str {
        EXACT
    }

    fn compile(&self, expression: &str) -> Result<Box<dyn CompiledPattern>, ExcludeError> {
        if expression == ANY_EXPRESSION {
            return Ok(Box::new(AnyPattern));
        }
        Ok(Box::new(ExactPattern(expression.to_string())))
    }
}

/// Matcher using full-string regular expressions.
#[derive(Debug, Default)]
pub struct RegexpMatcher;

impl PatternMatcher for RegexpMatcher {
    fn name(&self) -> &str {
        REGEXP
    }

    fn compile(&self, expression: &str) -> Result<Box<dyn CompiledPattern>, ExcludeError> {
        if expression == ANY_EXPRESSION {
            return Ok(Box::new(AnyPattern));
        }
        Ok(Box::new(RegexPattern(full_match_regex(REGEXP, expression, expression)?)))
    }
}

/// Matcher using shell-style globs.
#[derive(Debug, Default)]
pub struct GlobMatcher;

impl PatternMatcher for GlobMatcher {
    fn name(&self) -> &str {
        GLOB
    }

    fn compile(&self, expression: &str) -> Result<Box<dyn CompiledPattern>, ExcludeError> {
        if expression == ANY_EXPRESSION {
            return Ok(Box::new(AnyPattern));
        }
        let source = glob_to_regex(expression);
        Ok(Box::new(RegexPattern(full_match_regex(GLOB, expression, &source)?)))
    }
}

/// Matcher accepting exact matches or full-string regular expression matches.
#[derive(Debug, Default)]
pub struct ExactOrRegexpMatcher;

impl PatternMatcher for ExactOrRegexpMatcher {
    fn name(&self) -> &str {
        EXACT_OR_REGEXP
    }

    fn compile(&self, expression: &str) -> Result<Box<dyn CompiledPattern>, ExcludeError> {
        if expression == ANY_EXPRESSION {
            return Ok(Box::new(AnyPattern));
        }
        Ok(Box::new(ExactOrRegexPattern {
            exact: expression.to_string(),
            regex: full_match_regex(EXACT_OR_REGEXP, expression, expression)?,
        }))
    }
}

/// Matchers available to pattern excludes, keyed by name.
#[derive(Clone)]
pub struct MatcherRegistry {
    matchers: BTreeMap<String, Arc<dyn PatternMatcher>>,
}

impl MatcherRegistry {
    /// Registry with no matchers at all.
    pub fn empty() -> Self {
        Self {
            matchers: BTreeMap::new(),
        }
    }

    /// Registry with the built-in Ivy matchers.
    pub fn with_builtins() -> Self {
        Self::empty()
            .with(Arc::new(ExactMatcher))
            .with(Arc::new(RegexpMatcher))
            .with(Arc::new(GlobMatcher))
            .with(Arc::new(ExactOrRegexpMatcher))
    }

    /// Add (or replace) a matcher, keyed by its name.
    pub fn with(mut self, matcher: Arc<dyn PatternMatcher>) -> Self {
        self.register(matcher);
        self
    }

    /// Add (or replace) a matcher, keyed by its name.
    pub fn register(&mut self, matcher: Arc<dyn PatternMatcher>) {
        self.matchers.insert(matcher.name().to_string(), matcher);
    }

    /// Look up a matcher by name.
    pub fn get(&self, name: &str) -> Result<&Arc<dyn PatternMatcher>, ExcludeError> {
        self.matchers
            .get(name)
            .ok_or_else(|| ExcludeError::UnknownMatcher(name.to_string()))
    }

    /// Registered matcher names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.matchers.keys().map(String::as_str)
    }
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for MatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.matchers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(matcher: &str, expression: &str) -> Box<dyn CompiledPattern> {
        MatcherRegistry::with_builtins()
            .get(matcher)
            .unwrap()
            .compile(expression)
            .unwrap()
    }

    #[test]
    fn test_any_expression_matches_everything() {
        for name in [EXACT, REGEXP, GLOB, EXACT_OR_REGEXP] {
            let pattern = compile(name, "*");
            assert!(pattern.matches("anything"), "{} should treat * as any", name);
            assert!(pattern.matches(""));
        }
    }

    #[test]
    fn test_exact_matcher() {
        let pattern = compile(EXACT, "org.foo");
        assert!(pattern.matches("org.foo"));
        assert!(!pattern.matches("org.foo.bar"));
        assert!(!compile(EXACT, "org.*").matches("org.foo"));
    }

    #[test]
    fn test_regexp_matcher_is_anchored() {
        let pattern = compile(REGEXP, "org\\.foo.*");
        assert!(pattern.matches("org.foo"));
        assert!(pattern.matches("org.foo.bar"));
        assert!(!pattern.matches("com.org.foo"));
    }

    #[test]
    fn test_glob_matcher() {
        let pattern = compile(GLOB, "org.foo*");
        assert!(pattern.matches("org.foo"));
        assert!(pattern.matches("org.foobar"));
        assert!(!pattern.matches("orgXfoo"));

        let single = compile(GLOB, "lib-?.jar");
        assert!(single.matches("lib-1.jar"));
        assert!(!single.matches("lib-10.jar"));

        let class = compile(GLOB, "lib-[ab]");
        assert!(class.matches("lib-a"));
        assert!(!class.matches("lib-c"));

        let bracket = compile(GLOB, "lib-[]a]");
        assert!(bracket.matches("lib-]"));
        assert!(bracket.matches("lib-a"));
        assert!(!bracket.matches("lib-b"));

        let negated_bracket = compile(GLOB, "lib-[!]a]");
        assert!(negated_bracket.matches("lib-b"));
        assert!(!negated_bracket.matches("lib-]"));
        assert!(!negated_bracket.matches("lib-a"));

        let negated = compile(GLOB, "lib-[!ab]");
        assert!(negated.matches("lib-c"));
        assert!(!negated.matches("lib-a"));
    }

    #[test]
    fn test_exact_or_regexp_matcher() {
        let pattern = compile(EXACT_OR_REGEXP, "core|api");
        assert!(pattern.matches("core"));
        assert!(pattern.matches("api"));
        assert!(pattern.matches("core|api"));
        assert!(!pattern.matches("impl"));
    }

    #[test]
    fn test_unknown_matcher() {
        let registry = MatcherRegistry::with_builtins();
        assert_eq!(
            registry.get("fuzzy").err(),
            Some(ExcludeError::UnknownMatcher("fuzzy".to_string()))
        );
    }

    #[test]
    fn test_invalid_regexp_reports_pattern() {
        let registry = MatcherRegistry::with_builtins();
        let err = registry.get(REGEXP).unwrap().compile("(unclosed").unwrap_err();
        match err {
            ExcludeError::InvalidPattern { matcher, pattern, .. } => {
                assert_eq!(matcher, REGEXP);
                assert_eq!(pattern, "(unclosed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_custom_matcher_registration() {
        #[derive(Debug)]
        struct Prefix(String);
        impl CompiledPattern for Prefix {
            fn matches(&self, input: &str) -> bool {
                input.starts_with(&self.0)
            }
        }
        struct PrefixMatcher;
        impl PatternMatcher for PrefixMatcher {
            fn name(&self) -> &str {
                "prefix"
            }
            fn compile(&self, expression: &str) -> Result<Box<dyn CompiledPattern>, ExcludeError> {
                Ok(Box::new(Prefix(expression.to_string())))
            }
        }

        let registry = MatcherRegistry::empty().with(Arc::new(PrefixMatcher));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["prefix"]);
        let pattern = registry.get("prefix").unwrap().compile("org.").unwrap();
        assert!(pattern.matches("org.foo"));
    }
}

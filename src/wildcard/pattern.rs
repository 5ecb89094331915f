//! Splitting of wildcard strings and translation of shell style globs into
//! regular expressions

use crate::{url::DELIMITER, Error, Result};
use regex::Regex;
use std::borrow::Cow;

const WILDCARD_CHARS: &[char] = &['*', '?', '[', ']'];

/// Checks whether the string contains any of `*?[]`
#[inline]
pub fn contains_wildcard(s: &str) -> bool {
    s.contains(WILDCARD_CHARS)
}

/// Runs of 3 or more `*` are treated as a single `*`, mimicking shell globs
pub fn compress_wildcards(s: &str) -> Cow<'_, str> {
    if !s.contains("***") {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut run = 0;

    let flush = |out: &mut String, run: usize| {
        let n = if run >= 3 { 1 } else { run };
        out.extend(std::iter::repeat('*').take(n));
    };

    for c in s.chars() {
        if c == '*' {
            run += 1;
        } else {
            flush(&mut out, run);
            run = 0;
            out.push(c);
        }
    }

    flush(&mut out, run);
    Cow::Owned(out)
}

/// Splits the string in two such that the first part contains no wildcard.
/// The second part is empty if there is no wildcard.
///
/// `a/b/c/d*e/f/*.txt` => (`a/b/c/d`, `*e/f/*.txt`)
#[inline]
pub fn split_on_wildcard(s: &str) -> (&str, &str) {
    match s.find(WILDCARD_CHARS) {
        Some(ind) => s.split_at(ind),
        None => (s, ""),
    }
}

/// The parts of a wildcard string used for querying and filtering a single
/// level of a listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudWildcardParts {
    /// The literal text before the first wildcard, passed as the list prefix
    pub prefix: String,
    /// The pattern used to filter listed names, from the first wildcard up to
    /// the next delimiter
    pub filter_pattern: String,
    /// The delimiter passed to the list call, `None` when a `**` requires a
    /// flat listing
    pub delimiter: Option<char>,
    /// Everything after the delimiter following the filter pattern, which
    /// still needs expansion
    pub suffix: Option<String>,
}

impl CloudWildcardParts {
    pub fn from_str(name: &str, delimiter: char) -> Self {
        let (prefix, wildcard) = split_on_wildcard(name);

        if let Some((filter, suffix)) = wildcard.split_once(delimiter) {
            if !filter.contains("**") {
                return Self {
                    prefix: prefix.to_owned(),
                    filter_pattern: filter.to_owned(),
                    delimiter: Some(delimiter),
                    suffix: Some(suffix.to_owned()).filter(|s| !s.is_empty()),
                };
            }
        } else if !wildcard.contains("**") {
            return Self {
                prefix: prefix.to_owned(),
                filter_pattern: wildcard.to_owned(),
                delimiter: Some(delimiter),
                suffix: None,
            };
        }

        // A `**` means everything below the prefix is fetched in a single flat
        // listing, so there is nothing left to expand afterwards
        Self {
            prefix: prefix.to_owned(),
            filter_pattern: wildcard.to_owned(),
            delimiter: None,
            suffix: None,
        }
    }
}

/// Translates a shell style glob into an anchored regular expression, with the
/// same semantics as python's `fnmatch.translate`, ie. `*` also matches the
/// delimiter
pub fn translate(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let n = chars.len();
    let mut out = String::with_capacity(glob.len() + 16);
    out.push_str("(?s:");

    let mut i = 0;
    while i < n {
        let c = chars[i];
        i += 1;

        match c {
            '*' => {
                while i < n && chars[i] == '*' {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => {
                let mut j = i;
                if j < n && chars[j] == '!' {
                    j += 1;
                }
                if j < n && chars[j] == ']' {
                    j += 1;
                }
                while j < n && chars[j] != ']' {
                    j += 1;
                }

                if j >= n {
                    out.push_str(r"\[");
                    continue;
                }

                let stuff = &chars[i..j];
                i = j + 1;

                // A `]` directly after `[` or `[!` is a member, so the class
                // is never empty as written
                let (negated, rest) = match stuff.split_first() {
                    Some(('!', rest)) => (true, rest),
                    _ => (false, stuff),
                };

                let members = class_members(rest);
                if members.is_empty() {
                    // Every range was reversed
                    out.push_str(if negated { "." } else { r"[^\x00-\x{10FFFF}]" });
                    continue;
                }

                out.push('[');
                if negated {
                    out.push('^');
                }
                for (lo, hi) in members {
                    push_class_char(&mut out, lo);
                    if lo != hi {
                        out.push('-');
                        push_class_char(&mut out, hi);
                    }
                }
                out.push(']');
            }
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }

    out.push_str(r")\z");
    out
}

/// Splits the inside of a class into inclusive ranges, a single character
/// being a range of one. Reversed ranges match nothing and are dropped.
fn class_members(chars: &[char]) -> Vec<(char, char)> {
    let mut members = Vec::new();
    let mut k = 0;

    while k < chars.len() {
        if k + 2 < chars.len() && chars[k + 1] == '-' {
            let (lo, hi) = (chars[k], chars[k + 2]);
            if lo <= hi {
                members.push((lo, hi));
            }
            k += 3;
        } else {
            members.push((chars[k], chars[k]));
            k += 1;
        }
    }

    members
}

#[inline]
fn push_class_char(out: &mut String, c: char) {
    if matches!(c, '\\' | '[' | ']' | '&' | '~' | '^' | '-') {
        out.push('\\');
    }
    out.push(c);
}

/// Compiles a glob into a regex that must match from the start of the subject
pub fn compile(glob: &str) -> Result<Regex> {
    Regex::new(&format!("^{}", translate(glob))).map_err(|source| Error::InvalidPattern {
        pattern: glob.to_owned(),
        source,
    })
}

/// Returns the regexes used to filter listed names against `wildcard_pattern`.
///
/// In addition to the pattern itself, this adds patterns so that `**` in
/// `a/b/c/**/d.txt` matches zero or more folders, meaning `a/b/c/d.txt` is
/// matched along with `a/b/c/e/f/d.txt`
pub fn regex_patterns_for(wildcard_pattern: &str) -> Result<Vec<Regex>> {
    let mut patterns = vec![Cow::Borrowed(wildcard_pattern)];

    // Match both objects and prefixes with the same name
    if !wildcard_pattern.ends_with(DELIMITER) {
        patterns.push(Cow::Owned(format!("{wildcard_pattern}{DELIMITER}")));
    }

    let updated = if wildcard_pattern.contains("/**/") {
        let updated = wildcard_pattern.replace("/**/", "/");
        patterns.push(Cow::Owned(updated.clone()));
        Cow::Owned(updated)
    } else {
        Cow::Borrowed(wildcard_pattern)
    };

    // `**/a.txt` matches a top level `a.txt`, and `**/dir1/**/a.txt` matches
    // `dir1/a.txt`
    for pattern in [wildcard_pattern, updated.as_ref()] {
        if let Some(stripped) = pattern.strip_prefix("**/") {
            patterns.push(Cow::Owned(stripped.to_owned()));
        }
    }

    patterns.iter().map(|p| compile(p)).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn matches(glob: &str, subject: &str) -> bool {
        compile(glob).unwrap().is_match(subject)
    }

    #[test]
    fn detects_wildcards() {
        assert!(contains_wildcard("a/b*"));
        assert!(contains_wildcard("a?"));
        assert!(contains_wildcard("[ab]"));
        assert!(!contains_wildcard("a/b/c.txt"));
    }

    #[test]
    fn compresses_long_runs_only() {
        assert_eq!(compress_wildcards("a/***/b"), "a/*/b");
        assert_eq!(compress_wildcards("a/*****"), "a/*");
        assert_eq!(compress_wildcards("a/**/b*"), "a/**/b*");
        assert!(matches!(compress_wildcards("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn splits_on_first_wildcard() {
        assert_eq!(split_on_wildcard("a/b/c/d*e/f/*.txt"), ("a/b/c/d", "*e/f/*.txt"));
        assert_eq!(split_on_wildcard("*e/f/*.txt"), ("", "*e/f/*.txt"));
        assert_eq!(split_on_wildcard("a/b/c/d"), ("a/b/c/d", ""));
    }

    #[test]
    fn splits_into_parts() {
        let parts = CloudWildcardParts::from_str("a/b*c/d/e*f/g.txt", '/');
        assert_eq!(
            parts,
            CloudWildcardParts {
                prefix: "a/b".into(),
                filter_pattern: "*c".into(),
                delimiter: Some('/'),
                suffix: Some("d/e*f/g.txt".into()),
            }
        );

        let parts = CloudWildcardParts::from_str("a/b/c/d*e/f/g*.txt", '/');
        assert_eq!(parts.prefix, "a/b/c/d");
        assert_eq!(parts.filter_pattern, "*e");
        assert_eq!(parts.suffix.as_deref(), Some("f/g*.txt"));

        let last = CloudWildcardParts::from_str("dir/*.txt", '/');
        assert_eq!(last.filter_pattern, "*.txt");
        assert_eq!(last.delimiter, Some('/'));
        assert_eq!(last.suffix, None);
    }

    #[test]
    fn double_star_disables_delimiter() {
        let parts = CloudWildcardParts::from_str("a/**/b/*.txt", '/');
        assert_eq!(
            parts,
            CloudWildcardParts {
                prefix: "a/".into(),
                filter_pattern: "**/b/*.txt".into(),
                delimiter: None,
                suffix: None,
            }
        );

        let trailing = CloudWildcardParts::from_str("a/**", '/');
        assert_eq!(trailing.filter_pattern, "**");
        assert_eq!(trailing.delimiter, None);
    }

    #[test]
    fn translates_like_fnmatch() {
        assert_eq!(translate("*.txt"), r"(?s:.*\.txt)\z");
        assert_eq!(translate("a?c"), r"(?s:a.c)\z");
        assert_eq!(translate("[!ab]x"), r"(?s:[^ab]x)\z");

        assert!(matches("*.txt", "dir/file.txt"));
        assert!(!matches("*.txt", "file.txt.bak"));
        assert!(matches("f[0-9]", "f7"));
        assert!(!matches("f[!0-9]", "f7"));
        assert!(matches("f[]]", "f]"));
        assert!(matches("f[", "f["));
        // unterminated classes are literal
        assert!(matches("f[!]", "f[!]"));
        assert!(!matches("f[]", "f"));
        assert!(matches("a+b(c)", "a+b(c)"));
        assert!(matches("[&~]", "~"));
    }

    #[test]
    fn reversed_ranges_match_nothing() {
        assert!(compile("[z-a]x").is_ok());
        assert!(!matches("[z-a]x", "ax"));
        assert!(!matches("[z-a]x", "zx"));
        assert!(!matches("[z-a]x", "x"));

        assert!(matches("a[!z-a]", "ab"));
        assert!(!matches("a[!z-a]", "a"));

        assert!(matches("[z-ab]", "b"));
        assert!(!matches("[z-ab]", "z"));
        assert!(!matches("[z-ab]", "-"));

        // Hyphens at either end are members
        assert!(matches("[-a]", "-"));
        assert!(matches("[a-]", "-"));
    }

    #[test]
    fn double_star_matches_zero_or_more_folders() {
        let patterns = regex_patterns_for("dir1/**/a.txt").unwrap();
        let any = |s: &str| patterns.iter().any(|r| r.is_match(s));

        assert!(any("dir1/a.txt"));
        assert!(any("dir1/x/y/a.txt"));
        assert!(!any("dir2/a.txt"));

        let patterns = regex_patterns_for("**/dir1/**/a.txt").unwrap();
        let any = |s: &str| patterns.iter().any(|r| r.is_match(s));
        assert!(any("dir1/a.txt"));
        assert!(any("x/dir1/y/a.txt"));

        let patterns = regex_patterns_for("**/a.txt").unwrap();
        assert!(patterns.iter().any(|r| r.is_match("a.txt")));
    }

    #[test]
    fn matches_prefix_of_same_name() {
        let patterns = regex_patterns_for("dir/b?").unwrap();
        assert!(patterns.iter().any(|r| r.is_match("dir/b1/")));
        assert!(patterns.iter().any(|r| r.is_match("dir/b1")));
        assert!(!patterns.iter().any(|r| r.is_match("dir/b12")));
    }
}

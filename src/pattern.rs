use crate::error::{Result, ScanError};
use globset::{GlobBuilder, GlobMatcher};

/// Shell-style wildcard matched against a file's base name
///
/// `*` matches any run of characters and `?` exactly one; neither crosses a
/// path separator. Matching is case-sensitive. Braces are plain characters,
/// not `{a,b}` alternation.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    matcher: GlobMatcher,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let glob = GlobBuilder::new(&escape_braces(pattern))
            .literal_separator(true)
            .case_insensitive(false)
            .backslash_escape(true)
            .build()
            .map_err(|e| ScanError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.kind().to_string(),
            })?;

        Ok(Self {
            source: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    /// Match a base name (not a full path)
    pub fn matches(&self, name: &str) -> bool {
        self.matcher.is_match(name)
    }

    /// Match the last component of a `/`-separated path
    pub fn matches_path(&self, path: &str) -> bool {
        self.matches(base_name(path))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Escape `{` and `}` outside character classes so globset reads them literally
fn escape_braces(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                escaped.push(c);
                if let Some(next) = chars.next() {
                    escaped.push(next);
                }
            }
            '{' | '}' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '[' => {
                escaped.push(c);
                // `]` right after the opening bracket (or its negation) is a member
                if let Some(&neg) = chars.peek() {
                    if neg == '!' || neg == '^' {
                        escaped.push(neg);
                        chars.next();
                    }
                }
                if let Some(&first) = chars.peek() {
                    if first == ']' {
                        escaped.push(first);
                        chars.next();
                    }
                }
                for member in chars.by_ref() {
                    escaped.push(member);
                    if member == ']' {
                        break;
                    }
                }
            }
            _ => escaped.push(c),
        }
    }

    escaped
}

/// Last component of a `/`-separated remote path
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

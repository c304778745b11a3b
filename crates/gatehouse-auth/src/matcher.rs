//! Request matching
//!
//! Ant-style path patterns decide which security chain and which
//! authorization rule apply to a request path. Matching works on path
//! segments: `?` matches one character and `*` any run of characters
//! inside a segment, `**` matches zero or more whole segments.

use crate::error::ConfigError;

/// Maximum iterations allowed for pattern matching to prevent ReDoS
const MAX_MATCH_ITERATIONS: usize = 10000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Segment text that must match exactly
    Literal(String),
    /// Segment containing `*` or `?`
    Glob(String),
    /// Zero or more segments (`**`)
    MultiWildcard,
}

/// A compiled Ant-style path pattern such as `/api/**`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    pattern: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a pattern. Patterns must be absolute and `**` must occupy a
    /// whole segment.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        if !pattern.starts_with('/') {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern must start with '/'",
            });
        }

        let mut segments = Vec::new();
        for part in pattern.split('/').filter(|s| !s.is_empty()) {
            let segment = if part == "**" {
                Segment::MultiWildcard
            } else if part.contains("**") {
                return Err(ConfigError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: "'**' must be a whole path segment",
                });
            } else if part.contains(['*', '?']) {
                Segment::Glob(part.to_string())
            } else {
                Segment::Literal(part.to_string())
            };

            // Consecutive `**` collapse into one
            if segment == Segment::MultiWildcard && segments.last() == Some(&Segment::MultiWildcard) {
                continue;
            }
            segments.push(segment);
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Check if the pattern matches a request path. Empty segments
    /// (`//`, trailing `/`) are ignored.
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut iterations = 0;
        match_recursive(&self.segments, &parts, &mut iterations)
    }
}

fn match_recursive(segments: &[Segment], parts: &[&str], iterations: &mut usize) -> bool {
    *iterations += 1;
    if *iterations > MAX_MATCH_ITERATIONS {
        tracing::warn!(
            "Pattern matching exceeded {} iterations, aborting",
            MAX_MATCH_ITERATIONS
        );
        return false;
    }

    let Some((segment, rest)) = segments.split_first() else {
        return parts.is_empty();
    };

    match segment {
        Segment::MultiWildcard => {
            if rest.is_empty() {
                return true;
            }
            (0..=parts.len()).any(|skip| match_recursive(rest, &parts[skip..], iterations))
        }
        Segment::Literal(literal) => match parts.split_first() {
            Some((part, remaining)) => {
                *part == literal.as_str() && match_recursive(rest, remaining, iterations)
            }
            None => false,
        },
        Segment::Glob(glob) => match parts.split_first() {
            Some((part, remaining)) => {
                glob_matches(glob, part) && match_recursive(rest, remaining, iterations)
            }
            None => false,
        },
    }
}

/// Wildcard match of a single segment, `*` and `?` only
fn glob_matches(glob: &str, text: &str) -> bool {
    let glob: Vec<char> = glob.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut g, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if g < glob.len() && (glob[g] == '?' || glob[g] == text[t]) {
            g += 1;
            t += 1;
        } else if g < glob.len() && glob[g] == '*' {
            star = Some((g, t));
            g += 1;
        } else if let Some((star_g, star_t)) = star {
            g = star_g + 1;
            t = star_t + 1;
            star = Some((star_g, star_t + 1));
        } else {
            return false;
        }
    }

    glob[g..].iter().all(|c| *c == '*')
}

/// Selects the requests a chain or rule applies to
#[derive(Debug, Clone)]
pub enum RequestMatcher {
    /// Every request
    AnyRequest,
    /// Requests whose path matches at least one pattern
    Patterns(Vec<PathPattern>),
}

impl RequestMatcher {
    pub fn any_request() -> Self {
        RequestMatcher::AnyRequest
    }

    /// Matcher for a single Ant-style pattern
    pub fn ant(pattern: &str) -> Result<Self, ConfigError> {
        Ok(RequestMatcher::Patterns(vec![PathPattern::new(pattern)?]))
    }

    /// Matcher for several Ant-style patterns
    pub fn ant_any<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<Self, ConfigError> {
        let compiled = patterns
            .into_iter()
            .map(PathPattern::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RequestMatcher::Patterns(compiled))
    }

    /// Every management endpoint below `base_path`, including the
    /// links page at `base_path` itself
    pub fn any_endpoint(base_path: &str) -> Result<Self, ConfigError> {
        Self::ant(&format!("{}/**", base_path.trim_end_matches('/')))
    }

    /// One management endpoint and its sub-paths, e.g. `/actuator/health`
    /// and `/actuator/health/db`
    pub fn endpoint(base_path: &str, id: &str) -> Result<Self, ConfigError> {
        Self::ant(&format!(
            "{}/{}/**",
            base_path.trim_end_matches('/'),
            id.trim_matches('/')
        ))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            RequestMatcher::AnyRequest => true,
            RequestMatcher::Patterns(patterns) => patterns.iter().any(|p| p.matches(path)),
        }
    }
}

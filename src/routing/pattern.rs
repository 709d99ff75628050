use regex::{Regex, RegexBuilder};

/// A compiled tool-name pattern.
///
/// Patterns ending in `.` are namespace prefixes (`jira.` matches `jira.search`)
/// and compare verbatim. Anything else is an anchored, case-insensitive glob
/// where `*` matches any run of characters and `?` exactly one.
#[derive(Debug, Clone)]
pub enum Pattern {
    Prefix(String),
    /// `None` when the glob could not be compiled; such a pattern matches nothing
    Glob(Option<Regex>),
}

impl Pattern {
    pub fn new(pattern: &str) -> Self {
        if pattern.ends_with('.') {
            return Pattern::Prefix(pattern.to_string());
        }

        let regex = RegexBuilder::new(&glob_to_regex(pattern))
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .ok();
        Pattern::Glob(regex)
    }

    pub fn is_match(&self, tool_name: &str) -> bool {
        match self {
            Pattern::Prefix(prefix) => tool_name.starts_with(prefix.as_str()),
            Pattern::Glob(Some(regex)) => regex.is_match(tool_name),
            Pattern::Glob(None) => false,
        }
    }
}

/// Check a single tool name against a single pattern
pub fn matches(tool_name: &str, pattern: &str) -> bool {
    Pattern::new(pattern).is_match(tool_name)
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');

    let mut literal = String::new();
    for c in glob.chars() {
        match c {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    out.push_str(&regex::escape(&literal));

    out.push('$');
    out
}

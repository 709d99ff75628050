use super::pattern::Pattern;
use crate::config::ToolFilter;
use serde_json::Value;

/// A `ToolFilter` with its patterns compiled once
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    source: ToolFilter,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl CompiledFilter {
    pub fn new(source: ToolFilter) -> Self {
        let compile = |patterns: &Option<Vec<String>>| -> Vec<Pattern> {
            patterns
                .iter()
                .flatten()
                .map(|p| Pattern::new(p))
                .collect()
        };

        Self {
            include: compile(&source.include),
            exclude: compile(&source.exclude),
            source,
        }
    }

    pub fn source(&self) -> &ToolFilter {
        &self.source
    }

    /// Include step then exclude step for one tool name.
    ///
    /// A missing name fails every include check but can never match an exclude.
    pub(crate) fn allows(&self, tool_name: Option<&str>) -> bool {
        if !self.include.is_empty() {
            let Some(name) = tool_name else {
                return false;
            };
            if !self.include.iter().any(|p| p.is_match(name)) {
                return false;
            }
        }

        match tool_name {
            Some(name) => !self.exclude.iter().any(|p| p.is_match(name)),
            None => true,
        }
    }
}

impl From<ToolFilter> for CompiledFilter {
    fn from(source: ToolFilter) -> Self {
        Self::new(source)
    }
}

fn tool_name(tool: &Value) -> Option<&str> {
    tool.get("name").and_then(Value::as_str)
}

/// Run the per-connection stage, then the global stage, over a slice of tool descriptors
pub fn filter_tools(
    tools: &[Value],
    per_connection: Option<&CompiledFilter>,
    global: Option<&CompiledFilter>,
) -> Vec<Value> {
    let stage_one: Vec<&Value> = match per_connection {
        None => tools.iter().collect(),
        Some(filter) => tools
            .iter()
            .filter(|tool| filter.allows(tool_name(tool)))
            .collect(),
    };

    let stage_two: Vec<&Value> = match global {
        None => stage_one,
        Some(filter) => stage_one
            .into_iter()
            .filter(|tool| filter.allows(tool_name(tool)))
            .collect(),
    };

    stage_two.into_iter().cloned().collect()
}

/// Apply both filter stages to a `{"tools": [...]}` listing.
///
/// Anything not shaped like an object with a `tools` array is returned as-is.
pub fn apply_filters(
    listing: &Value,
    per_connection: Option<&CompiledFilter>,
    global: Option<&CompiledFilter>,
) -> Value {
    let Some(tools) = listing.get("tools").and_then(Value::as_array) else {
        return listing.clone();
    };

    let filtered = filter_tools(tools, per_connection, global);

    let mut out = listing.clone();
    out["tools"] = Value::Array(filtered);
    out
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::render::Rgba;

/// Resolves theme variables (such as `--color-secondary`) to colour strings.
/// Unknown variables resolve to an empty string.
pub trait ThemeLookup {
    fn color(&self, variable: &str) -> String;
}

impl<F> ThemeLookup for F
where
    F: Fn(&str) -> String,
{
    fn color(&self, variable: &str) -> String {
        self(variable)
    }
}

/// Map-backed theme.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticTheme {
    variables: HashMap<String, String>,
}

impl StaticTheme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, variable: impl Into<String>, color: impl Into<String>) -> Self {
        self.set(variable, color);
        self
    }

    pub fn set(&mut self, variable: impl Into<String>, color: impl Into<String>) {
        self.variables.insert(variable.into(), color.into());
    }

    pub fn remove(&mut self, variable: &str) {
        self.variables.remove(variable);
    }
}

impl ThemeLookup for StaticTheme {
    fn color(&self, variable: &str) -> String {
        self.variables.get(variable).cloned().unwrap_or_default()
    }
}

/// Looks up `variable` and falls back when the theme has no usable value.
/// Only colours [`Rgba::parse`] understands count as usable.
pub fn resolve_color(theme: &dyn ThemeLookup, variable: &str, fallback: &str) -> String {
    let color = theme.color(variable);
    let trimmed = color.trim();
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    if Rgba::parse(trimmed).is_none() {
        tracing::debug!(variable, color = trimmed, "unsupported theme colour, using fallback");
        return fallback.to_string();
    }
    trimmed.to_string()
}

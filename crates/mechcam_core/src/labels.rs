//! Class label sets.

use serde::{Deserialize, Serialize};

/// Default categories of the mechanical components classifier.
pub const MECHANICAL_COMPONENTS: [&str; 4] = ["bolt", "locatingpin", "nut", "washer"];

/// Ordered class names, index `i` naming model output `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassLabels(Vec<String>);

impl ClassLabels {
    /// Create from any list of names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// The four mechanical component classes.
    #[must_use]
    pub fn mechanical_components() -> Self {
        Self::new(MECHANICAL_COMPONENTS)
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Name of class `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Name of class `index`, or `class_<index>` when unnamed.
    #[must_use]
    pub fn label(&self, index: usize) -> String {
        self.get(index)
            .map_or_else(|| format!("class_{}", index), str::to_string)
    }

    /// Iterate over the names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for ClassLabels {
    fn default() -> Self {
        Self::mechanical_components()
    }
}

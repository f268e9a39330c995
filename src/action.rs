//! # Action
//!
//! An `Action` is the string verb a node's Post step returns to select its
//! successor. Unlike the richer conditional/parameterized action systems
//! some workflow engines build, Pocket's routing decision is made entirely
//! inside Post against the writer view of the store — so `Action` stays a
//! plain verb rather than a tree of conditions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The verb returned by a node's Post step. Compares and hashes like a
/// string; `Action::default()` is `"default"`, matching the synthesized
/// Post step's default routing verdict.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action(String);

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Action(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Action {
    fn default() -> Self {
        Action("default".to_string())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        Action::new(s)
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        Action::new(s)
    }
}

impl From<Action> for String {
    fn from(a: Action) -> Self {
        a.0
    }
}

impl std::borrow::Borrow<str> for Action {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_action_is_default_verb() {
        assert_eq!(Action::default().name(), "default");
    }

    #[test]
    fn actions_compare_by_value() {
        assert_eq!(Action::new("greeting"), Action::from("greeting"));
        assert_ne!(Action::new("greeting"), Action::new("general"));
    }

    #[test]
    fn action_displays_its_name() {
        assert_eq!(Action::new("continue").to_string(), "continue");
    }
}

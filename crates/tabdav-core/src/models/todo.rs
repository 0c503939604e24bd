//! Todo model

use serde::{Deserialize, Serialize};

use crate::util::unix_timestamp_millis;

/// A single to-do entry; `id` is the creation timestamp in milliseconds
/// and serves as the merge key during conflict resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

impl Todo {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: unix_timestamp_millis(),
            text: text.into(),
            completed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_todo_is_incomplete() {
        let todo = Todo::new("water the plants");
        assert!(!todo.completed);
        assert!(todo.id > 0);
    }

    #[test]
    fn completed_defaults_to_false_when_absent() {
        let todo: Todo = serde_json::from_str(r#"{"id":1700000000000,"text":"x"}"#).unwrap();
        assert!(!todo.completed);
    }
}

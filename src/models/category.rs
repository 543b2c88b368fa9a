//! Component category model

use serde::{Deserialize, Serialize};

/// Category of drone components, e.g. "Hélice" or "Batterie".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentCategory {
    pub id: i64,
    /// Category name, unique
    pub name: String,
    /// True for parts that fly, false for ground equipment
    pub on_board: bool,
}

impl ComponentCategory {
    /// Create a new category. The ID is assigned by the database.
    pub fn new(name: impl Into<String>, on_board: bool) -> Self {
        Self {
            id: 0,
            name: name.into(),
            on_board,
        }
    }
}

impl std::fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

pub mod error;
pub mod ids;
pub mod schema;
pub mod selector;

pub use error::{ModelError, Result};
pub use ids::ColumnName;
pub use schema::{Schema, VariableKind};
pub use selector::ColumnSelector;

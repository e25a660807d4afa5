use serde_json::{Map, Value};

/// Free-form JSON object stored in a generic metadata column.
pub type Metadata = Map<String, Value>;

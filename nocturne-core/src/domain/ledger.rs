//! Ledger value types
//!
//! Small wrappers around how the node encodes contract values in JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A Move `Option<T>` as rendered by the node's JSON API: `{"vec": []}` or `{"vec": [value]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOption<T> {
    pub vec: Vec<T>,
}

impl<T> MoveOption<T> {
    pub fn none() -> Self {
        Self { vec: Vec::new() }
    }

    pub fn some(value: T) -> Self {
        Self { vec: vec![value] }
    }

    /// Borrows the contained value, if any
    pub fn as_option(&self) -> Option<&T> {
        self.vec.first()
    }

    pub fn into_option(self) -> Option<T> {
        self.vec.into_iter().next()
    }

    pub fn is_none(&self) -> bool {
        self.vec.is_empty()
    }
}

impl<T> Default for MoveOption<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> From<Option<T>> for MoveOption<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::some(v),
            None => Self::none(),
        }
    }
}

/// Fully-qualified entry or view function: `address::module::function`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionId {
    pub address: String,
    pub module: String,
    pub function: String,
}

impl FunctionId {
    pub fn new(
        address: impl Into<String>,
        module: impl Into<String>,
        function: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            module: module.into(),
            function: function.into(),
        }
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.address, self.module, self.function)
    }
}

/// Outcome of a submitted write, as reported once the transaction is executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub hash: String,
    pub success: bool,
    pub vm_status: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Reads an unsigned integer that the node may render either as a JSON number
/// or as a decimal string (u64 and wider are always strings).
pub fn parse_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_move_option_decodes_node_shape() {
        let some: MoveOption<String> = serde_json::from_value(json!({ "vec": ["42"] })).unwrap();
        assert_eq!(some.as_option().map(String::as_str), Some("42"));

        let none: MoveOption<String> = serde_json::from_value(json!({ "vec": [] })).unwrap();
        assert!(none.is_none());
        assert_eq!(none.into_option(), None);
    }

    #[test]
    fn test_function_id_display() {
        let id = FunctionId::new("0xabc", "job", "get_jobs");
        assert_eq!(id.to_string(), "0xabc::job::get_jobs");
    }

    #[test]
    fn test_parse_u64_accepts_numbers_and_strings() {
        assert_eq!(parse_u64(&json!(12)), Some(12));
        assert_eq!(parse_u64(&json!("18446744073709551615")), Some(u64::MAX));
        assert_eq!(parse_u64(&json!("abc")), None);
        assert_eq!(parse_u64(&json!(-1)), None);
        assert_eq!(parse_u64(&json!(null)), None);
    }
}

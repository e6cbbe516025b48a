//! Node, tree and blackboard key identifiers

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::{Result, WorkcellError};

/// Identifier of a node, unique within its containing tree.
pub type NodeId = u32;

static TREE_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]*$").expect("valid regex"));

/// Fold a random v4 UUID into 32 bits by XOR-ing its four words.
pub fn generate_node_id() -> NodeId {
    let bits = Uuid::new_v4().as_u128();
    (bits as u32) ^ ((bits >> 32) as u32) ^ ((bits >> 64) as u32) ^ ((bits >> 96) as u32)
}

pub fn generate_tree_id() -> String {
    Uuid::new_v4().to_string()
}

/// Fresh blackboard key usable as a CEL identifier.
pub fn generate_blackboard_key(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

pub fn validate_tree_id(tree_id: &str) -> Result<()> {
    if TREE_ID_PATTERN.is_match(tree_id) {
        Ok(())
    } else {
        Err(WorkcellError::InvalidArgument(format!(
            "tree id '{}' must match [a-zA-Z0-9][a-zA-Z0-9_-]*",
            tree_id
        )))
    }
}

/// Status codes travel as `uint32` on the wire.
pub fn validate_status_code(code: i64) -> Result<u32> {
    u32::try_from(code).map_err(|_| {
        WorkcellError::InvalidArgument(format!(
            "extended status code {} must be in [0, {}]",
            code,
            u32::MAX
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_id_validation() {
        assert!(validate_tree_id("abc_1-2").is_ok());
        assert!(validate_tree_id(&generate_tree_id()).is_ok());
        assert!(validate_tree_id("_abc").is_err());
        assert!(validate_tree_id("a b").is_err());
        assert!(validate_tree_id("").is_err());
    }

    #[test]
    fn test_status_code_range() {
        assert_eq!(validate_status_code(0).unwrap(), 0);
        assert_eq!(validate_status_code(4_294_967_295).unwrap(), u32::MAX);
        assert!(validate_status_code(-1).is_err());
        assert!(validate_status_code(4_294_967_296).is_err());
    }

    #[test]
    fn test_blackboard_key_is_identifier() {
        let key = generate_blackboard_key("retry_counter");
        assert!(key.starts_with("retry_counter_"));
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }
}

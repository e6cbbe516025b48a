//! Wire messages exchanged with the solution services
//!
//! Every message is declared by hand with `prost` derives so the crate needs
//! no protoc step. Protobuf package names live under `workcell_proto`.

pub mod assets;
pub mod behavior_call;
pub mod behavior_tree;
pub mod blackboard;
pub mod data_logger;
pub mod extended_status;
pub mod operations;
pub mod resources;
pub mod skills;
pub mod solution;
pub mod world;

use prost::Message;

use crate::{Result, WorkcellError};

/// Prefix used for type URLs of messages without a skill-qualified namespace.
pub const DEFAULT_TYPE_URL_PREFIX: &str = "type.googleapis.com/";

/// Pack a message into an `Any` using the default type URL prefix.
pub fn pack_any<M: Message>(full_name: &str, message: &M) -> prost_types::Any {
    prost_types::Any {
        type_url: format!("{}{}", DEFAULT_TYPE_URL_PREFIX, full_name),
        value: message.encode_to_vec(),
    }
}

/// Returns the full message name encoded in a type URL (the part after the last `/`).
pub fn type_name_of_url(type_url: &str) -> &str {
    match type_url.rfind('/') {
        Some(pos) => &type_url[pos + 1..],
        None => type_url,
    }
}

/// Unpack an `Any` holding `full_name`, failing with a type mismatch otherwise.
pub fn unpack_any<M: Message + Default>(any: &prost_types::Any, full_name: &str) -> Result<M> {
    let actual = type_name_of_url(&any.type_url);
    if actual != full_name {
        return Err(WorkcellError::TypeMismatch(format!(
            "expected Any holding '{}', got '{}'",
            full_name, any.type_url
        )));
    }
    Ok(M::decode(any.value.as_slice())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_of_url() {
        assert_eq!(type_name_of_url("type.googleapis.com/a.b.C"), "a.b.C");
        assert_eq!(
            type_name_of_url("type.workcell.dev/skills/a.b/1.0.0/a.b.C"),
            "a.b.C"
        );
        assert_eq!(type_name_of_url("a.b.C"), "a.b.C");
    }

    #[test]
    fn test_unpack_any_rejects_other_type() {
        let status = extended_status::StatusCode {
            component: "ai.test".to_string(),
            code: 7,
        };
        let any = pack_any(extended_status::STATUS_CODE_NAME, &status);
        let back: extended_status::StatusCode =
            unpack_any(&any, extended_status::STATUS_CODE_NAME).unwrap();
        assert_eq!(back, status);

        let err = unpack_any::<extended_status::StatusCode>(&any, "other.Type").unwrap_err();
        assert!(matches!(err, WorkcellError::TypeMismatch(_)));
    }
}

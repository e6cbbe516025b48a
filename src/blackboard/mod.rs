//! Blackboard references and the blackboard service client

pub mod client;
pub mod value;

pub use client::BlackboardClient;
pub use value::{BlackboardValue, CelExpression, Segment, ValueType};

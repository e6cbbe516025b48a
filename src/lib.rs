//! Workcell - transport-agnostic client SDK for skill-based robot solutions
//!
//! This library turns skill descriptions published by a solution into typed
//! call builders, composes those calls into behavior trees, and manages the
//! trees stored in the solution. It has no networking dependencies: every
//! remote service is consumed through the traits in [`services`], which
//! `workcell-grpc` implements over tonic.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workcell::bt::{BehaviorTree, Node};
//! use workcell::services::{ResourceRegistry, SkillRegistry};
//! use workcell::skills::{Pose3, SkillProvider};
//!
//! async fn build(
//!     skills: Arc<dyn SkillRegistry>,
//!     resources: Arc<dyn ResourceRegistry>,
//! ) -> workcell::Result<BehaviorTree> {
//!     let provider = SkillProvider::new(skills, resources, None).await?;
//!     let detect = provider.get("demo.vision.detect")?.call();
//!     let pick = provider
//!         .package("demo.pick")?
//!         .skill("pick")?
//!         .call()
//!         .with("target", detect.result()?.field("poses")?.index(0)?)?
//!         .with("speed", 0.5)?;
//!     let root = Node::sequence(vec![detect.to_node()?, pick.to_node()?]);
//!     Ok(BehaviorTree::new("pick_first", root))
//! }
//! ```
//!
//! # Architecture
//!
//! - **bt**: Behavior tree nodes, conditions and their wire form
//! - **reflect**: Per-skill type registries and dynamic messages
//! - **skills**: Skill classes, calls and the package tree provider
//! - **blackboard**: Symbolic blackboard references and the blackboard client
//! - **process**: Behavior trees stored as Process assets or legacy trees
//! - **logs**: Structured data-logger queries
//! - **retry** / **operations**: Transient-error retry and long-running operations

pub mod blackboard;
pub mod bt;
pub mod diagnostics;
pub mod error;
pub mod logs;
pub mod operations;
pub mod process;
pub mod proto;
pub mod reflect;
pub mod retry;
pub mod services;
pub mod skills;

pub use error::{Result, RpcCode, WorkcellError};

// High-level exports
pub use blackboard::{BlackboardClient, BlackboardValue, CelExpression};
pub use bt::{BehaviorTree, Condition, Node};
pub use logs::DataLoggerClient;
pub use process::ProcessProvider;
pub use retry::{run_with_retry, RetryPolicy};
pub use skills::{SkillCall, SkillClass, SkillProvider};

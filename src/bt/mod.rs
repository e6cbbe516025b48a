//! Behavior tree model
//!
//! Nodes and conditions are closed enums that convert losslessly to and from
//! the `workcell_proto.executive` wire form. Ids are assigned lazily and
//! validated per tree scope: every [`BehaviorTree`] instance, including the
//! ones nested in sub-tree nodes and conditions, has its own node id space.

pub mod condition;
pub mod decorators;
pub mod ids;
pub mod node;
pub mod tree;

pub use condition::Condition;
pub use decorators::{
    BreakpointType, Decorators, DisabledResultState, ExecutionMode, FailureSettings,
};
pub use ids::{generate_blackboard_key, generate_node_id, generate_tree_id, NodeId};
pub use node::{
    Branch, CodeExecution, Data, DataInputs, DataOperation, DataSource, DebugNode, Fail, Loop,
    Node, NodeKind, NodeState, Retry, Selector, SelectorBranch, SubTree, Task, WorldQuery,
};
pub use tree::{BehaviorTree, Visit};

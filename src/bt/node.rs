//! Behavior tree nodes
//!
//! [`Node`] carries the fields every node has; [`NodeKind`] is the closed set
//! of variants. Each variant converts to and from the wire form in
//! [`Node::to_wire`] / [`Node::from_wire`].

use std::collections::BTreeMap;

use prost_types::Any;

use crate::blackboard::{BlackboardValue, CelExpression, ValueType};
use crate::diagnostics::{self, DiagnosticKind};
use crate::proto::behavior_call::BehaviorCall;
use crate::proto::behavior_tree::{
    self as wire, create_or_update, data_node, for_each, loop_node, node::NodeType, task_node,
};
use crate::reflect::ScalarKind;
use crate::{Result, WorkcellError};

pub use crate::proto::behavior_tree::{CodeExecution, NodeState, WorldQuery};

use super::condition::Condition;
use super::decorators::{BreakpointType, Decorators, DisabledResultState, FailureSettings};
use super::ids::{generate_blackboard_key, generate_node_id, NodeId};
use super::tree::{BehaviorTree, Visit};

/// Leaf that runs a skill or inline code.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    Call(BehaviorCall),
    Code(CodeExecution),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubTree {
    pub tree: Option<BehaviorTree>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fail {
    /// Stored as the title of the extended status emitted on failure.
    pub failure_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorBranch {
    pub condition: Option<Condition>,
    pub node: Node,
}

impl SelectorBranch {
    pub fn new(condition: Option<Condition>, node: Node) -> Self {
        Self { condition, node }
    }
}

/// Runs the first branch whose condition holds. `children` is the deprecated
/// flat form and must not be combined with `branches`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    pub children: Vec<Node>,
    pub branches: Vec<SelectorBranch>,
}

impl Selector {
    pub fn with_branches(branches: Vec<SelectorBranch>) -> Self {
        Self {
            children: Vec::new(),
            branches,
        }
    }

    pub fn from_children(children: Vec<Node>) -> Self {
        diagnostics::report(
            DiagnosticKind::Deprecated,
            "Selector children are deprecated, use branches with conditions instead",
        );
        Self {
            children,
            branches: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Retry {
    pub max_tries: u32,
    pub child: Option<Box<Node>>,
    pub recovery: Option<Box<Node>>,
    pub retry_counter_key: String,
}

impl Retry {
    pub fn new(max_tries: u32, child: Node) -> Self {
        Self {
            max_tries,
            child: Some(Box::new(child)),
            recovery: None,
            retry_counter_key: generate_blackboard_key("retry_counter"),
        }
    }

    pub fn with_recovery(mut self, recovery: Node) -> Self {
        self.recovery = Some(Box::new(recovery));
        self
    }

    /// Current try, as written by the executive.
    pub fn retry_counter(&self) -> BlackboardValue {
        BlackboardValue::new(
            self.retry_counter_key.clone(),
            ValueType::scalar(ScalarKind::UInt32),
        )
    }
}

/// Count, while, or for-each loop. While and for-each settings are mutually
/// exclusive, which the setters enforce.
#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub max_times: u32,
    pub do_child: Option<Box<Node>>,
    while_condition: Option<Condition>,
    for_each_value_key: Option<String>,
    for_each_protos: Option<Vec<Any>>,
    for_each_generator_cel: Option<String>,
    loop_counter_key: String,
}

impl Loop {
    pub fn new(do_child: Node) -> Self {
        Self {
            max_times: 0,
            do_child: Some(Box::new(do_child)),
            while_condition: None,
            for_each_value_key: None,
            for_each_protos: None,
            for_each_generator_cel: None,
            loop_counter_key: generate_blackboard_key("loop_counter"),
        }
    }

    pub fn with_max_times(mut self, max_times: u32) -> Self {
        self.max_times = max_times;
        self
    }

    fn is_for_each(&self) -> bool {
        self.for_each_value_key.is_some()
            || self.for_each_protos.is_some()
            || self.for_each_generator_cel.is_some()
    }

    pub fn set_while_condition(&mut self, condition: Condition) -> Result<&mut Self> {
        if self.is_for_each() {
            return Err(WorkcellError::InvalidArgument(
                "a loop cannot have both a while condition and for-each settings".to_string(),
            ));
        }
        self.while_condition = Some(condition);
        Ok(self)
    }

    fn check_for_each_allowed(&self) -> Result<()> {
        if self.while_condition.is_some() {
            return Err(WorkcellError::InvalidArgument(
                "a loop cannot have both a while condition and for-each settings".to_string(),
            ));
        }
        Ok(())
    }

    pub fn set_for_each_value_key(&mut self, key: impl Into<String>) -> Result<&mut Self> {
        self.check_for_each_allowed()?;
        self.for_each_value_key = Some(key.into());
        Ok(self)
    }

    pub fn set_for_each_protos(&mut self, protos: Vec<Any>) -> Result<&mut Self> {
        self.check_for_each_allowed()?;
        if self.for_each_generator_cel.is_some() {
            return Err(WorkcellError::InvalidArgument(
                "for-each takes either protos or a generator expression, not both".to_string(),
            ));
        }
        self.for_each_protos = Some(protos);
        self.for_each_value_key
            .get_or_insert_with(|| generate_blackboard_key("for_each_value"));
        Ok(self)
    }

    pub fn set_for_each_generator_cel_expression(
        &mut self,
        expression: impl Into<CelExpression>,
    ) -> Result<&mut Self> {
        self.check_for_each_allowed()?;
        if self.for_each_protos.is_some() {
            return Err(WorkcellError::InvalidArgument(
                "for-each takes either protos or a generator expression, not both".to_string(),
            ));
        }
        self.for_each_generator_cel = Some(expression.into().0);
        self.for_each_value_key
            .get_or_insert_with(|| generate_blackboard_key("for_each_value"));
        Ok(self)
    }

    pub fn while_condition(&self) -> Option<&Condition> {
        self.while_condition.as_ref()
    }

    pub fn for_each_protos(&self) -> Option<&[Any]> {
        self.for_each_protos.as_deref()
    }

    pub fn for_each_generator_cel_expression(&self) -> Option<&str> {
        self.for_each_generator_cel.as_deref()
    }

    pub fn loop_counter(&self) -> BlackboardValue {
        BlackboardValue::new(
            self.loop_counter_key.clone(),
            ValueType::scalar(ScalarKind::UInt32),
        )
    }

    /// Current element of a for-each loop.
    pub fn for_each_value(&self) -> Option<BlackboardValue> {
        self.for_each_value_key
            .as_ref()
            .map(|key| BlackboardValue::new(key.clone(), ValueType::unknown()))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Branch {
    pub if_condition: Option<Condition>,
    pub then_child: Option<Box<Node>>,
    pub else_child: Option<Box<Node>>,
}

impl Branch {
    pub fn new(if_condition: Condition) -> Self {
        Self {
            if_condition: Some(if_condition),
            ..Default::default()
        }
    }

    pub fn with_then(mut self, node: Node) -> Self {
        self.then_child = Some(Box::new(node));
        self
    }

    pub fn with_else(mut self, node: Node) -> Self {
        self.else_child = Some(Box::new(node));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    CelExpression(String),
    WorldQuery(WorldQuery),
    Proto(Any),
    Protos(Vec<Any>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataOperation {
    CreateOrUpdate(DataSource),
    Remove,
}

/// Loose inputs for a create-or-update Data node; exactly one must be set.
#[derive(Debug, Clone, Default)]
pub struct DataInputs {
    pub cel_expression: Option<CelExpression>,
    pub world_query: Option<WorldQuery>,
    pub proto: Option<Any>,
    pub protos: Option<Vec<Any>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub blackboard_key: String,
    pub operation: DataOperation,
}

impl Data {
    pub fn create_or_update(blackboard_key: impl Into<String>, inputs: DataInputs) -> Result<Self> {
        let mut sources = Vec::new();
        if let Some(cel) = inputs.cel_expression {
            sources.push(DataSource::CelExpression(cel.0));
        }
        if let Some(query) = inputs.world_query {
            sources.push(DataSource::WorldQuery(query));
        }
        if let Some(proto) = inputs.proto {
            sources.push(DataSource::Proto(proto));
        }
        if let Some(protos) = inputs.protos {
            sources.push(DataSource::Protos(protos));
        }
        let blackboard_key = blackboard_key.into();
        if sources.len() != 1 {
            return Err(WorkcellError::InvalidArgument(format!(
                "Data node '{}' needs exactly one of cel_expression, world_query, proto or protos, got {}",
                blackboard_key,
                sources.len()
            )));
        }
        Ok(Self {
            blackboard_key,
            operation: DataOperation::CreateOrUpdate(sources.remove(0)),
        })
    }

    pub fn from_cel(blackboard_key: impl Into<String>, expression: impl Into<CelExpression>) -> Self {
        Self {
            blackboard_key: blackboard_key.into(),
            operation: DataOperation::CreateOrUpdate(DataSource::CelExpression(
                expression.into().0,
            )),
        }
    }

    pub fn remove(blackboard_key: impl Into<String>) -> Self {
        Self {
            blackboard_key: blackboard_key.into(),
            operation: DataOperation::Remove,
        }
    }

    /// The value this node writes.
    pub fn value(&self) -> BlackboardValue {
        BlackboardValue::new(self.blackboard_key.clone(), ValueType::unknown())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugNode {
    pub fail_on_resume: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Task(Task),
    SubTree(SubTree),
    Fail(Fail),
    Sequence(Vec<Node>),
    Parallel(Vec<Node>),
    Selector(Selector),
    Retry(Retry),
    Fallback(Vec<Node>),
    Loop(Loop),
    Branch(Branch),
    Data(Data),
    Debug(DebugNode),
}

macro_rules! node_kind_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for NodeKind {
            fn from(value: $ty) -> Self {
                NodeKind::$variant(value)
            }
        })*
    };
}

node_kind_from! {
    Task => Task,
    SubTree => SubTree,
    Fail => Fail,
    Selector => Selector,
    Retry => Retry,
    Loop => Loop,
    Branch => Branch,
    Data => Data,
    DebugNode => Debug,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: Option<String>,
    pub node_id: Option<NodeId>,
    state: Option<NodeState>,
    pub decorators: Decorators,
    pub user_data: BTreeMap<String, Any>,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: impl Into<NodeKind>) -> Self {
        Self {
            name: None,
            node_id: None,
            state: None,
            decorators: Decorators::default(),
            user_data: BTreeMap::new(),
            kind: kind.into(),
        }
    }

    pub fn task(call: BehaviorCall) -> Self {
        Node::new(Task::Call(call))
    }

    pub fn sequence(children: Vec<Node>) -> Self {
        Node::new(NodeKind::Sequence(children))
    }

    pub fn parallel(children: Vec<Node>) -> Self {
        Node::new(NodeKind::Parallel(children))
    }

    pub fn fallback(children: Vec<Node>) -> Self {
        Node::new(NodeKind::Fallback(children))
    }

    pub fn fail(failure_message: Option<&str>) -> Self {
        Node::new(Fail {
            failure_message: failure_message.map(str::to_string),
        })
    }

    pub fn sub_tree(tree: BehaviorTree) -> Self {
        Node::new(SubTree { tree: Some(tree) })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_id(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.decorators.condition = Some(condition);
        self
    }

    /// Execution state, only populated on nodes read back from the executive.
    pub fn state(&self) -> Option<NodeState> {
        self.state
    }

    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Task(_) => "Task",
            NodeKind::SubTree(_) => "SubTree",
            NodeKind::Fail(_) => "Fail",
            NodeKind::Sequence(_) => "Sequence",
            NodeKind::Parallel(_) => "Parallel",
            NodeKind::Selector(_) => "Selector",
            NodeKind::Retry(_) => "Retry",
            NodeKind::Fallback(_) => "Fallback",
            NodeKind::Loop(_) => "Loop",
            NodeKind::Branch(_) => "Branch",
            NodeKind::Data(_) => "Data",
            NodeKind::Debug(_) => "Debug",
        }
    }

    /// Label used when rendering the tree: type name plus node name.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", self.type_name(), name),
            None => self.type_name().to_string(),
        }
    }

    pub fn generate_and_set_unique_id(&mut self) -> NodeId {
        *self.node_id.get_or_insert_with(generate_node_id)
    }

    pub fn set_breakpoint(&mut self, breakpoint: Option<BreakpointType>) -> &mut Self {
        self.decorators.set_breakpoint(breakpoint);
        self
    }

    pub fn disable_execution(&mut self, result_state: Option<DisabledResultState>) -> &mut Self {
        self.decorators.disable_execution(result_state);
        self
    }

    pub fn enable_execution(&mut self) -> &mut Self {
        self.decorators.enable_execution();
        self
    }

    pub fn on_failure(&self) -> &FailureSettings {
        &self.decorators.on_failure
    }

    pub fn on_failure_mut(&mut self) -> &mut FailureSettings {
        &mut self.decorators.on_failure
    }

    /// Direct child nodes in visit order. Sub-tree contents are not children.
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::Sequence(children)
            | NodeKind::Parallel(children)
            | NodeKind::Fallback(children) => children.iter().collect(),
            NodeKind::Selector(selector) => selector
                .children
                .iter()
                .chain(selector.branches.iter().map(|b| &b.node))
                .collect(),
            NodeKind::Retry(retry) => retry
                .child
                .iter()
                .chain(retry.recovery.iter())
                .map(|n| &**n)
                .collect(),
            NodeKind::Loop(l) => l.do_child.iter().map(|n| &**n).collect(),
            NodeKind::Branch(branch) => branch
                .then_child
                .iter()
                .chain(branch.else_child.iter())
                .map(|n| &**n)
                .collect(),
            NodeKind::Task(_)
            | NodeKind::SubTree(_)
            | NodeKind::Fail(_)
            | NodeKind::Data(_)
            | NodeKind::Debug(_) => Vec::new(),
        }
    }

    pub(crate) fn children_mut(&mut self) -> Vec<&mut Node> {
        self.split_mut().0
    }

    /// Direct children and the trees owned by this node (its sub-tree and
    /// sub-tree conditions), borrowed together.
    pub(crate) fn split_mut(&mut self) -> (Vec<&mut Node>, Vec<&mut BehaviorTree>) {
        let mut children: Vec<&mut Node> = Vec::new();
        let mut trees: Vec<&mut BehaviorTree> = Vec::new();
        if let Some(condition) = self.decorators.condition.as_mut() {
            trees.extend(condition.nested_trees_mut());
        }
        match &mut self.kind {
            NodeKind::Sequence(nodes) | NodeKind::Parallel(nodes) | NodeKind::Fallback(nodes) => {
                children.extend(nodes.iter_mut())
            }
            NodeKind::SubTree(sub) => trees.extend(sub.tree.as_mut()),
            NodeKind::Selector(selector) => {
                children.extend(selector.children.iter_mut());
                for branch in selector.branches.iter_mut() {
                    if let Some(condition) = branch.condition.as_mut() {
                        trees.extend(condition.nested_trees_mut());
                    }
                    children.push(&mut branch.node);
                }
            }
            NodeKind::Retry(retry) => children.extend(
                retry
                    .child
                    .iter_mut()
                    .chain(retry.recovery.iter_mut())
                    .map(|n| &mut **n),
            ),
            NodeKind::Loop(l) => {
                if let Some(condition) = l.while_condition.as_mut() {
                    trees.extend(condition.nested_trees_mut());
                }
                children.extend(l.do_child.iter_mut().map(|n| &mut **n));
            }
            NodeKind::Branch(branch) => {
                if let Some(condition) = branch.if_condition.as_mut() {
                    trees.extend(condition.nested_trees_mut());
                }
                children.extend(
                    branch
                        .then_child
                        .iter_mut()
                        .chain(branch.else_child.iter_mut())
                        .map(|n| &mut **n),
                );
            }
            NodeKind::Task(_) | NodeKind::Fail(_) | NodeKind::Data(_) | NodeKind::Debug(_) => {}
        }
        (children, trees)
    }

    pub fn has_child(&self, node_id: NodeId) -> bool {
        self.children().iter().any(|c| c.node_id == Some(node_id))
    }

    /// Remove the direct child with `node_id`. Returns whether a child was removed.
    pub fn remove_child(&mut self, node_id: NodeId) -> bool {
        let matches = |node: &Node| node.node_id == Some(node_id);
        let matches_boxed = |slot: &mut Option<Box<Node>>| {
            if slot.as_deref().map(matches).unwrap_or(false) {
                *slot = None;
                true
            } else {
                false
            }
        };
        match &mut self.kind {
            NodeKind::Sequence(children)
            | NodeKind::Parallel(children)
            | NodeKind::Fallback(children) => {
                let before = children.len();
                children.retain(|c| !matches(c));
                children.len() != before
            }
            NodeKind::Selector(selector) => {
                let before = selector.children.len() + selector.branches.len();
                selector.children.retain(|c| !matches(c));
                selector.branches.retain(|b| !matches(&b.node));
                selector.children.len() + selector.branches.len() != before
            }
            NodeKind::Retry(retry) => {
                let child = matches_boxed(&mut retry.child);
                let recovery = matches_boxed(&mut retry.recovery);
                child || recovery
            }
            NodeKind::Loop(l) => matches_boxed(&mut l.do_child),
            NodeKind::Branch(branch) => {
                let then = matches_boxed(&mut branch.then_child);
                let otherwise = matches_boxed(&mut branch.else_child);
                then || otherwise
            }
            _ => false,
        }
    }

    /// Pre-order traversal: this node, its decorator condition, then the
    /// variant's conditions and children. A sub-tree is visited with itself
    /// as the tree context.
    pub fn visit<'a>(
        &'a self,
        tree: Option<&'a BehaviorTree>,
        callback: &mut dyn FnMut(Option<&'a BehaviorTree>, Visit<'a>),
    ) {
        callback(tree, Visit::Node(self));
        if let Some(condition) = &self.decorators.condition {
            condition.visit(tree, callback);
        }
        match &self.kind {
            NodeKind::SubTree(sub) => {
                if let Some(sub_tree) = &sub.tree {
                    sub_tree.visit(callback);
                }
            }
            NodeKind::Selector(selector) => {
                for child in &selector.children {
                    child.visit(tree, callback);
                }
                for branch in &selector.branches {
                    if let Some(condition) = &branch.condition {
                        condition.visit(tree, callback);
                    }
                    branch.node.visit(tree, callback);
                }
            }
            NodeKind::Loop(l) => {
                if let Some(condition) = &l.while_condition {
                    condition.visit(tree, callback);
                }
                if let Some(child) = &l.do_child {
                    child.visit(tree, callback);
                }
            }
            NodeKind::Branch(branch) => {
                if let Some(condition) = &branch.if_condition {
                    condition.visit(tree, callback);
                }
                for child in branch.then_child.iter().chain(branch.else_child.iter()) {
                    child.visit(tree, callback);
                }
            }
            _ => {
                for child in self.children() {
                    child.visit(tree, callback);
                }
            }
        }
    }

    fn required_child(slot: &Option<Box<Node>>, what: &str) -> Result<Box<wire::Node>> {
        match slot {
            Some(node) => Ok(Box::new(node.to_wire()?)),
            None => Err(WorkcellError::MissingRequired(what.to_string())),
        }
    }

    fn optional_child(slot: &Option<Box<Node>>) -> Result<Option<Box<wire::Node>>> {
        slot.as_ref()
            .map(|node| node.to_wire().map(Box::new))
            .transpose()
    }

    fn children_to_wire(children: &[Node]) -> Result<Vec<wire::Node>> {
        children.iter().map(Node::to_wire).collect()
    }

    pub fn to_wire(&self) -> Result<wire::Node> {
        let mut decorators = self.decorators.clone();
        let node_type = match &self.kind {
            NodeKind::Task(Task::Call(call)) => NodeType::Task(wire::TaskNode {
                task_type: Some(task_node::TaskType::CallBehavior(call.clone())),
            }),
            NodeKind::Task(Task::Code(code)) => NodeType::Task(wire::TaskNode {
                task_type: Some(task_node::TaskType::ExecuteCode(code.clone())),
            }),
            NodeKind::SubTree(sub) => {
                let tree = sub.tree.as_ref().ok_or_else(|| {
                    WorkcellError::MissingRequired("SubTree node has no tree".to_string())
                })?;
                NodeType::SubTree(wire::SubtreeNode {
                    tree: Some(tree.to_wire()?),
                })
            }
            NodeKind::Fail(fail) => {
                if let Some(message) = &fail.failure_message {
                    let status = decorators
                        .on_failure
                        .extended_status
                        .get_or_insert_with(Default::default);
                    if !status.title.is_empty() {
                        return Err(WorkcellError::InvalidArgument(format!(
                            "Fail node has both a failure message '{}' and an extended status title '{}'",
                            message, status.title
                        )));
                    }
                    status.title = message.clone();
                }
                NodeType::Fail(wire::FailNode {})
            }
            NodeKind::Sequence(children) => NodeType::Sequence(wire::SequenceNode {
                children: Self::children_to_wire(children)?,
            }),
            NodeKind::Parallel(children) => NodeType::Parallel(wire::ParallelNode {
                children: Self::children_to_wire(children)?,
            }),
            NodeKind::Fallback(children) => NodeType::Fallback(wire::FallbackNode {
                children: Self::children_to_wire(children)?,
            }),
            NodeKind::Selector(selector) => {
                if !selector.children.is_empty() && !selector.branches.is_empty() {
                    return Err(WorkcellError::InvalidArgument(
                        "Selector cannot have both children and branches".to_string(),
                    ));
                }
                let branches = selector
                    .branches
                    .iter()
                    .map(|branch| {
                        Ok(wire::SelectorBranch {
                            condition: branch.condition.as_ref().map(Condition::to_wire).transpose()?,
                            node: Some(branch.node.to_wire()?),
                        })
                    })
                    .collect::<Result<_>>()?;
                NodeType::Selector(wire::SelectorNode {
                    children: Self::children_to_wire(&selector.children)?,
                    branches,
                })
            }
            NodeKind::Retry(retry) => NodeType::Retry(wire::RetryNode {
                max_tries: retry.max_tries,
                child: Some(Self::required_child(&retry.child, "Retry node has no child")?),
                recovery: Self::optional_child(&retry.recovery)?,
                retry_counter_blackboard_key: retry.retry_counter_key.clone(),
            }),
            NodeKind::Loop(l) => {
                let loop_type = match (&l.while_condition, l.is_for_each()) {
                    (Some(_), true) => {
                        return Err(WorkcellError::InvalidArgument(
                            "a loop cannot have both a while condition and for-each settings"
                                .to_string(),
                        ))
                    }
                    (Some(condition), false) => Some(loop_node::LoopType::While(condition.to_wire()?)),
                    (None, true) => {
                        let generator = match (&l.for_each_protos, &l.for_each_generator_cel) {
                            (Some(protos), None) => for_each::Generator::Protos(wire::ProtoList {
                                items: protos.clone(),
                            }),
                            (None, Some(cel)) => for_each::Generator::GeneratorCelExpression(cel.clone()),
                            _ => {
                                return Err(WorkcellError::InvalidArgument(
                                    "for-each loop needs exactly one of protos or a generator expression"
                                        .to_string(),
                                ))
                            }
                        };
                        Some(loop_node::LoopType::ForEach(wire::ForEach {
                            value_blackboard_key: l.for_each_value_key.clone().unwrap_or_default(),
                            generator: Some(generator),
                        }))
                    }
                    (None, false) => None,
                };
                NodeType::Loop(wire::LoopNode {
                    max_times: l.max_times,
                    do_child: Some(Self::required_child(&l.do_child, "Loop node has no do child")?),
                    loop_counter_blackboard_key: l.loop_counter_key.clone(),
                    loop_type,
                })
            }
            NodeKind::Branch(branch) => {
                let if_condition = branch.if_condition.as_ref().ok_or_else(|| {
                    WorkcellError::MissingRequired("Branch node has no if condition".to_string())
                })?;
                if branch.then_child.is_none() && branch.else_child.is_none() {
                    return Err(WorkcellError::MissingRequired(
                        "Branch node needs a then child or an else child".to_string(),
                    ));
                }
                NodeType::Branch(wire::BranchNode {
                    if_condition: Some(if_condition.to_wire()?),
                    then_child: Self::optional_child(&branch.then_child)?,
                    else_child: Self::optional_child(&branch.else_child)?,
                })
            }
            NodeKind::Data(data) => {
                let data_type = match &data.operation {
                    DataOperation::Remove => data_node::DataType::Remove(wire::RemoveData {}),
                    DataOperation::CreateOrUpdate(source) => {
                        let value = match source {
                            DataSource::CelExpression(cel) => {
                                create_or_update::Value::CelExpression(cel.clone())
                            }
                            DataSource::WorldQuery(query) => {
                                create_or_update::Value::WorldQuery(query.clone())
                            }
                            DataSource::Proto(any) => create_or_update::Value::Proto(any.clone()),
                            DataSource::Protos(items) => {
                                create_or_update::Value::Protos(wire::ProtoList {
                                    items: items.clone(),
                                })
                            }
                        };
                        data_node::DataType::CreateOrUpdate(wire::CreateOrUpdate {
                            value: Some(value),
                        })
                    }
                };
                NodeType::Data(wire::DataNode {
                    blackboard_key: data.blackboard_key.clone(),
                    data_type: Some(data_type),
                })
            }
            NodeKind::Debug(debug) => NodeType::Debug(wire::DebugNode {
                fail_on_resume: debug.fail_on_resume,
            }),
        };

        Ok(wire::Node {
            name: self.name.clone(),
            id: self.node_id,
            state: self.state.map(|s| s as i32).unwrap_or_default(),
            decorators: decorators.to_wire()?,
            user_data: self.user_data.clone(),
            node_type: Some(node_type),
        })
    }

    fn boxed_from_wire(node: Option<Box<wire::Node>>) -> Result<Option<Box<Node>>> {
        node.map(|n| Node::from_wire(*n).map(Box::new)).transpose()
    }

    fn children_from_wire(children: Vec<wire::Node>) -> Result<Vec<Node>> {
        children.into_iter().map(Node::from_wire).collect()
    }

    pub fn from_wire(node: wire::Node) -> Result<Self> {
        let mut decorators = Decorators::from_wire(node.decorators)?;
        let node_type = node.node_type.ok_or_else(|| {
            WorkcellError::InvalidArgument(format!(
                "node {:?} has no node type set",
                node.name.as_deref().unwrap_or("<unnamed>")
            ))
        })?;

        let kind = match node_type {
            NodeType::Task(task) => match task.task_type {
                Some(task_node::TaskType::CallBehavior(call)) => NodeKind::Task(Task::Call(call)),
                Some(task_node::TaskType::ExecuteCode(code)) => NodeKind::Task(Task::Code(code)),
                None => {
                    return Err(WorkcellError::InvalidArgument(
                        "Task node has neither a behavior call nor code".to_string(),
                    ))
                }
            },
            NodeType::SubTree(sub) => NodeKind::SubTree(SubTree {
                tree: sub.tree.map(BehaviorTree::from_wire).transpose()?,
            }),
            NodeType::Fail(_) => {
                let mut failure_message = None;
                if let Some(status) = decorators.on_failure.extended_status.as_mut() {
                    if !status.title.is_empty() {
                        failure_message = Some(std::mem::take(&mut status.title));
                    }
                    if *status == Default::default() {
                        decorators.on_failure.extended_status = None;
                    }
                }
                NodeKind::Fail(Fail { failure_message })
            }
            NodeType::Sequence(seq) => NodeKind::Sequence(Self::children_from_wire(seq.children)?),
            NodeType::Parallel(par) => NodeKind::Parallel(Self::children_from_wire(par.children)?),
            NodeType::Fallback(fb) => NodeKind::Fallback(Self::children_from_wire(fb.children)?),
            NodeType::Selector(selector) => {
                if !selector.children.is_empty() && !selector.branches.is_empty() {
                    return Err(WorkcellError::InvalidArgument(
                        "Selector cannot have both children and branches".to_string(),
                    ));
                }
                let branches = selector
                    .branches
                    .into_iter()
                    .map(|branch| {
                        let node = branch.node.ok_or_else(|| {
                            WorkcellError::InvalidArgument("Selector branch has no node".to_string())
                        })?;
                        Ok(SelectorBranch {
                            condition: branch.condition.map(Condition::from_wire).transpose()?,
                            node: Node::from_wire(node)?,
                        })
                    })
                    .collect::<Result<_>>()?;
                NodeKind::Selector(Selector {
                    children: Self::children_from_wire(selector.children)?,
                    branches,
                })
            }
            NodeType::Retry(retry) => NodeKind::Retry(Retry {
                max_tries: retry.max_tries,
                child: Self::boxed_from_wire(retry.child)?,
                recovery: Self::boxed_from_wire(retry.recovery)?,
                retry_counter_key: retry.retry_counter_blackboard_key,
            }),
            NodeType::Loop(l) => {
                let mut result = Loop {
                    max_times: l.max_times,
                    do_child: Self::boxed_from_wire(l.do_child)?,
                    while_condition: None,
                    for_each_value_key: None,
                    for_each_protos: None,
                    for_each_generator_cel: None,
                    loop_counter_key: l.loop_counter_blackboard_key,
                };
                match l.loop_type {
                    Some(loop_node::LoopType::While(condition)) => {
                        result.while_condition = Some(Condition::from_wire(condition)?);
                    }
                    Some(loop_node::LoopType::ForEach(for_each)) => {
                        result.for_each_value_key = Some(for_each.value_blackboard_key);
                        match for_each.generator {
                            Some(for_each::Generator::Protos(list)) => {
                                result.for_each_protos = Some(list.items)
                            }
                            Some(for_each::Generator::GeneratorCelExpression(cel)) => {
                                result.for_each_generator_cel = Some(cel)
                            }
                            None => {
                                return Err(WorkcellError::InvalidArgument(
                                    "for-each loop has no generator".to_string(),
                                ))
                            }
                        }
                    }
                    None => {}
                }
                NodeKind::Loop(result)
            }
            NodeType::Branch(branch) => {
                let if_condition = branch.if_condition.ok_or_else(|| {
                    WorkcellError::MissingRequired("Branch node has no if condition".to_string())
                })?;
                if branch.then_child.is_none() && branch.else_child.is_none() {
                    return Err(WorkcellError::MissingRequired(
                        "Branch node needs a then child or an else child".to_string(),
                    ));
                }
                NodeKind::Branch(Branch {
                    if_condition: Some(Condition::from_wire(if_condition)?),
                    then_child: Self::boxed_from_wire(branch.then_child)?,
                    else_child: Self::boxed_from_wire(branch.else_child)?,
                })
            }
            NodeType::Data(data) => {
                let operation = match data.data_type {
                    Some(data_node::DataType::Remove(_)) => DataOperation::Remove,
                    Some(data_node::DataType::CreateOrUpdate(update)) => {
                        let source = match update.value {
                            Some(create_or_update::Value::CelExpression(cel)) => {
                                DataSource::CelExpression(cel)
                            }
                            Some(create_or_update::Value::WorldQuery(query)) => {
                                DataSource::WorldQuery(query)
                            }
                            Some(create_or_update::Value::Proto(any)) => DataSource::Proto(any),
                            Some(create_or_update::Value::Protos(list)) => {
                                DataSource::Protos(list.items)
                            }
                            None => {
                                return Err(WorkcellError::InvalidArgument(format!(
                                    "Data node '{}' has no value to create or update",
                                    data.blackboard_key
                                )))
                            }
                        };
                        DataOperation::CreateOrUpdate(source)
                    }
                    None => {
                        return Err(WorkcellError::InvalidArgument(format!(
                            "Data node '{}' has no operation",
                            data.blackboard_key
                        )))
                    }
                };
                NodeKind::Data(Data {
                    blackboard_key: data.blackboard_key,
                    operation,
                })
            }
            NodeType::Debug(debug) => NodeKind::Debug(DebugNode {
                fail_on_resume: debug.fail_on_resume,
            }),
        };

        Ok(Self {
            name: node.name,
            node_id: node.id,
            state: NodeState::try_from(node.state)
                .ok()
                .filter(|s| *s != NodeState::Unspecified),
            decorators,
            user_data: node.user_data,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(node: &Node) -> Node {
        Node::from_wire(node.to_wire().unwrap()).unwrap()
    }

    fn task(skill_id: &str) -> Node {
        Node::task(BehaviorCall::new(skill_id))
    }

    #[test]
    fn test_fail_message_stored_in_extended_status_title() {
        let node = Node::fail(Some("boom"));
        let wire = node.to_wire().unwrap();
        let title = wire
            .decorators
            .as_ref()
            .and_then(|d| d.failure_settings.as_ref())
            .and_then(|f| f.emit_extended_status.as_ref())
            .and_then(|e| e.extended_status.as_ref())
            .map(|s| s.title.clone());
        assert_eq!(title.as_deref(), Some("boom"));
        assert_eq!(Node::from_wire(wire).unwrap(), node);
    }

    #[test]
    fn test_fail_message_and_title_conflict() {
        let mut node = Node::fail(Some("boom"));
        node.on_failure_mut()
            .emit_extended_status("ai.workcell", 3, "other title")
            .unwrap();
        assert!(matches!(
            node.to_wire(),
            Err(WorkcellError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_fail_keeps_remaining_status() {
        let mut node = Node::fail(Some("boom"));
        node.on_failure_mut()
            .emit_extended_status("ai.workcell", 3, "")
            .unwrap();
        assert_eq!(round_trip(&node), node);
    }

    #[test]
    fn test_loop_while_and_for_each_exclusive() {
        let mut l = Loop::new(Node::fail(None));
        l.set_while_condition(Condition::blackboard("x")).unwrap();
        assert!(matches!(
            l.set_for_each_generator_cel_expression("y"),
            Err(WorkcellError::InvalidArgument(_))
        ));

        let mut l = Loop::new(Node::fail(None));
        l.set_for_each_generator_cel_expression("items").unwrap();
        assert!(l.set_for_each_protos(Vec::new()).is_err());
        assert!(l.for_each_value().is_some());
        let node = Node::new(l);
        assert_eq!(round_trip(&node), node);
    }

    #[test]
    fn test_loop_requires_do_child() {
        let mut l = Loop::new(Node::fail(None));
        l.do_child = None;
        assert!(matches!(
            Node::new(l).to_wire(),
            Err(WorkcellError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_data_needs_exactly_one_input() {
        let err = Data::create_or_update(
            "k",
            DataInputs {
                cel_expression: Some("1".into()),
                proto: Some(Any::default()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, WorkcellError::InvalidArgument(_)));
        assert!(Data::create_or_update("k", DataInputs::default()).is_err());

        let data = Data::create_or_update(
            "k",
            DataInputs {
                world_query: Some(WorldQuery {
                    root_object_name: "table".to_string(),
                    recursive: true,
                    name_regex: "cube_.*".to_string(),
                }),
                ..Default::default()
            },
        )
        .unwrap();
        let node = Node::new(data);
        assert_eq!(round_trip(&node), node);
        assert_eq!(round_trip(&Node::new(Data::remove("k"))), Node::new(Data::remove("k")));
    }

    #[test]
    fn test_data_without_value_is_rejected_on_import() {
        let wire = wire::Node {
            node_type: Some(NodeType::Data(wire::DataNode {
                blackboard_key: "k".to_string(),
                data_type: Some(data_node::DataType::CreateOrUpdate(wire::CreateOrUpdate {
                    value: None,
                })),
            })),
            ..Default::default()
        };
        assert!(matches!(
            Node::from_wire(wire),
            Err(WorkcellError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_selector_children_and_branches_exclusive() {
        let ((), reported) = diagnostics::capture(|| {
            let mut selector = Selector::from_children(vec![task("a")]);
            selector
                .branches
                .push(SelectorBranch::new(None, task("b")));
            assert!(matches!(
                Node::new(selector).to_wire(),
                Err(WorkcellError::InvalidArgument(_))
            ));
        });
        assert_eq!(reported[0].kind, DiagnosticKind::Deprecated);
    }

    #[test]
    fn test_selector_children_and_branches_rejected_on_import() {
        let fail = || wire::Node {
            node_type: Some(NodeType::Fail(Default::default())),
            ..Default::default()
        };
        let wire = wire::Node {
            node_type: Some(NodeType::Selector(wire::SelectorNode {
                children: vec![fail()],
                branches: vec![wire::SelectorBranch {
                    condition: None,
                    node: Some(fail()),
                }],
            })),
            ..Default::default()
        };
        assert!(matches!(
            Node::from_wire(wire),
            Err(WorkcellError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_incomplete_branch_rejected_on_import() {
        let condition = Condition::blackboard("x").to_wire().unwrap();
        let childless = wire::Node {
            node_type: Some(NodeType::Branch(wire::BranchNode {
                if_condition: Some(condition),
                then_child: None,
                else_child: None,
            })),
            ..Default::default()
        };
        assert!(matches!(
            Node::from_wire(childless),
            Err(WorkcellError::MissingRequired(_))
        ));

        let unconditioned = wire::Node {
            node_type: Some(NodeType::Branch(wire::BranchNode {
                if_condition: None,
                then_child: Some(Box::new(task("a").to_wire().unwrap())),
                else_child: None,
            })),
            ..Default::default()
        };
        assert!(matches!(
            Node::from_wire(unconditioned),
            Err(WorkcellError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_branch_requires_condition_and_child() {
        let empty = Node::new(Branch::new(Condition::blackboard("x")));
        assert!(matches!(
            empty.to_wire(),
            Err(WorkcellError::MissingRequired(_))
        ));
        let no_condition = Node::new(Branch::default().with_then(task("a")));
        assert!(no_condition.to_wire().is_err());
        let ok = Node::new(Branch::new(Condition::blackboard("x")).with_else(task("b")));
        assert_eq!(round_trip(&ok), ok);
    }

    #[test]
    fn test_remove_child_is_local() {
        let mut node = Node::sequence(vec![
            task("a").with_id(1),
            Node::sequence(vec![task("b").with_id(2)]).with_id(3),
        ]);
        assert!(node.has_child(1));
        assert!(!node.has_child(2));
        assert!(!node.remove_child(2));
        assert!(node.remove_child(1));
        assert_eq!(node.children().len(), 1);

        let mut retry = Node::new(Retry::new(2, task("c").with_id(4)).with_recovery(task("d").with_id(5)));
        assert!(retry.remove_child(5));
        assert!(retry.has_child(4));
    }

    #[test]
    fn test_decorated_task_round_trip() {
        let mut node = task("skill.a")
            .with_name("pick")
            .with_id(42)
            .with_condition(Condition::blackboard("ready"));
        node.set_breakpoint(Some(BreakpointType::AfterExecution))
            .disable_execution(Some(DisabledResultState::Succeeded));
        node.user_data
            .insert("note".to_string(), Any { type_url: "t/x".to_string(), value: vec![1] });
        assert_eq!(round_trip(&node), node);
    }

    #[test]
    fn test_generate_id_keeps_existing() {
        let mut node = task("a").with_id(9);
        assert_eq!(node.generate_and_set_unique_id(), 9);
        let mut fresh = task("a");
        let id = fresh.generate_and_set_unique_id();
        assert_eq!(fresh.node_id, Some(id));
    }
}

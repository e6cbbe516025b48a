use std::collections::HashSet;

use workcell::bt::{
    BehaviorTree, Condition, Data, Loop, Node, Retry, Selector, SelectorBranch, Visit,
};
use workcell::proto::behavior_call::BehaviorCall;
use workcell::proto::behavior_tree::node::NodeType;
use workcell::proto::behavior_tree::task_node::TaskType;
use workcell::WorkcellError;

fn task(skill_id: &str) -> Node {
    Node::task(BehaviorCall::new(skill_id)).with_name(skill_id)
}

#[test]
fn test_minimal_tree() {
    let tree = BehaviorTree::new("t", Node::sequence(vec![task("s0"), task("s1")]));
    let wire = tree.to_wire().unwrap();
    assert_eq!(wire.name, "t");
    let Some(NodeType::Sequence(sequence)) = wire.root.and_then(|r| r.node_type) else {
        panic!("root is not a sequence");
    };
    let skill_ids: Vec<String> = sequence
        .children
        .into_iter()
        .filter_map(|child| match child.node_type {
            Some(NodeType::Task(task)) => match task.task_type {
                Some(TaskType::CallBehavior(call)) => Some(call.skill_id),
                _ => None,
            },
            _ => None,
        })
        .collect();
    assert_eq!(skill_ids, vec!["s0", "s1"]);
}

#[test]
fn test_retry_with_recovery() {
    let retry = Node::new(Retry::new(2, Node::fail(Some("boom"))).with_recovery(Node::sequence(Vec::new())));
    let Some(NodeType::Retry(wire)) = retry.to_wire().unwrap().node_type else {
        panic!("not a retry node");
    };
    assert_eq!(wire.max_tries, 2);
    assert!(!wire.retry_counter_blackboard_key.is_empty());

    let child = wire.child.unwrap();
    assert!(matches!(child.node_type, Some(NodeType::Fail(_))));
    let title = child
        .decorators
        .and_then(|d| d.failure_settings)
        .and_then(|f| f.emit_extended_status)
        .and_then(|e| e.extended_status)
        .map(|s| s.title);
    assert_eq!(title.as_deref(), Some("boom"));
    assert!(matches!(
        wire.recovery.and_then(|r| r.node_type),
        Some(NodeType::Sequence(s)) if s.children.is_empty()
    ));
}

#[test]
fn test_loop_rejects_while_and_for_each() {
    let mut l = Loop::new(Node::fail(None));
    l.set_while_condition(Condition::blackboard("x")).unwrap();
    let err = l.set_for_each_generator_cel_expression("y").unwrap_err();
    assert!(matches!(err, WorkcellError::InvalidArgument(_)));
}

fn labels(tree: &BehaviorTree) -> Vec<String> {
    let mut labels = Vec::new();
    tree.visit(&mut |_, item| match item {
        Visit::Tree(_) => {}
        Visit::Node(node) => labels.push(node.name.clone().unwrap_or_else(|| node.type_name().to_string())),
        Visit::Condition(Condition::Blackboard(cel)) => labels.push(cel.clone()),
        Visit::Condition(condition) => labels.push(condition.type_name().to_string()),
    });
    labels
}

#[test]
fn test_selector_branches() {
    let selector = Node::new(Selector::with_branches(vec![
        SelectorBranch::new(None, task("n0")),
        SelectorBranch::new(Some(Condition::blackboard("cond")), task("n1")),
    ]))
    .with_name("Sel");
    let tree = BehaviorTree::new("t", selector);

    let Some(NodeType::Selector(wire)) = tree.to_wire().unwrap().root.and_then(|r| r.node_type) else {
        panic!("root is not a selector");
    };
    assert_eq!(wire.branches.len(), 2);
    assert!(wire.branches[0].condition.is_none());
    assert!(wire.children.is_empty());

    let decoded = BehaviorTree::from_wire(tree.to_wire().unwrap()).unwrap();
    assert_eq!(decoded, tree);
    assert_eq!(labels(&tree), vec!["Sel", "n0", "cond", "n1"]);
}

#[test]
fn test_visit_order_of_decorated_sequence() {
    let tree = BehaviorTree::new(
        "t",
        Node::sequence(vec![task("A"), task("B"), task("C")])
            .with_name("Seq")
            .with_condition(Condition::blackboard("D")),
    );
    assert_eq!(labels(&tree), vec!["Seq", "D", "A", "B", "C"]);
}

#[test]
fn test_compound_tree_survives_bytes() {
    let mut looped = Loop::new(task("inspect")).with_max_times(3);
    looped.set_while_condition(Condition::not(Condition::blackboard("done"))).unwrap();
    let inner = BehaviorTree::new("recover", Node::fallback(vec![task("reset"), Node::fail(Some("stuck"))]));
    let root = Node::sequence(vec![
        Node::new(Data::from_cel("target", "detections.poses[0]")),
        Node::new(looped),
        Node::parallel(vec![task("left"), task("right")]),
        Node::new(Retry::new(2, task("place")).with_recovery(Node::sub_tree(inner))),
    ]);
    let mut tree = BehaviorTree::new("cell", root);
    tree.ensure_all_unique_ids();

    let decoded = BehaviorTree::from_bytes(&tree.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded, tree);
    assert_eq!(decoded.node_count(), tree.node_count());
}

#[test]
fn test_ids_are_unique_per_tree_scope() {
    let inner = BehaviorTree::new("inner", Node::sequence(vec![task("a").with_id(1), task("b").with_id(1)]));
    let mut tree = BehaviorTree::new(
        "outer",
        Node::sequence(vec![task("a").with_id(1), task("b").with_id(1), Node::sub_tree(inner)]),
    );
    assert!(tree.validate_id_uniqueness().is_err());
    tree.ensure_all_unique_ids();
    tree.validate_id_uniqueness().unwrap();

    let mut tree_ids = HashSet::new();
    tree.visit(&mut |_, item| {
        if let Visit::Tree(t) = item {
            assert!(tree_ids.insert(t.tree_id().map(str::to_string)));
        }
    });
    assert_eq!(tree_ids.len(), 2);
}

//! Behavior tree container: identity, traversal, id management and wire
//! conversion

use std::collections::{BTreeMap, HashMap, HashSet};

use prost::Message;

use crate::proto::assets::Metadata;
use crate::proto::behavior_tree as wire;
use crate::proto::skills::Skill;
use crate::{Result, WorkcellError};

use super::condition::Condition;
use super::ids::{generate_node_id, generate_tree_id, validate_tree_id, NodeId};
use super::node::Node;

/// Item passed to a visit callback.
#[derive(Debug, Clone, Copy)]
pub enum Visit<'a> {
    Tree(&'a BehaviorTree),
    Node(&'a Node),
    Condition(&'a Condition),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorTree {
    pub name: String,
    tree_id: Option<String>,
    pub root: Option<Box<Node>>,
    /// Present when the tree is stored as an installed Process asset.
    pub metadata: Option<Metadata>,
    /// Skill description when the tree is exposed as a skill.
    pub description: Option<Skill>,
    pub return_value_expression: Option<String>,
}

impl BehaviorTree {
    pub fn new(name: impl Into<String>, root: Node) -> Self {
        Self {
            name: name.into(),
            root: Some(Box::new(root)),
            ..Default::default()
        }
    }

    pub fn tree_id(&self) -> Option<&str> {
        self.tree_id.as_deref()
    }

    pub fn set_tree_id(&mut self, tree_id: impl Into<String>) -> Result<&mut Self> {
        let tree_id = tree_id.into();
        validate_tree_id(&tree_id)?;
        self.tree_id = Some(tree_id);
        Ok(self)
    }

    pub fn clear_tree_id(&mut self) {
        self.tree_id = None;
    }

    /// Assign a random tree id if none is set.
    pub fn generate_and_set_unique_id(&mut self) -> &str {
        self.tree_id.get_or_insert_with(generate_tree_id)
    }

    pub fn set_root(&mut self, root: Node) -> &mut Self {
        self.root = Some(Box::new(root));
        self
    }

    /// Pre-order traversal of this tree and every tree nested in it. The
    /// callback first sees the tree itself, then its root.
    pub fn visit<'a>(&'a self, callback: &mut dyn FnMut(Option<&'a BehaviorTree>, Visit<'a>)) {
        callback(Some(self), Visit::Tree(self));
        if let Some(root) = &self.root {
            root.visit(Some(self), callback);
        }
    }

    /// Number of nodes in this tree, nested trees included.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |_, item| {
            if matches!(item, Visit::Node(_)) {
                count += 1;
            }
        });
        count
    }

    /// Check that node ids are unique per tree and tree ids are unique overall.
    pub fn validate_id_uniqueness(&self) -> Result<()> {
        let mut nodes: HashMap<(usize, NodeId), Vec<String>> = HashMap::new();
        let mut trees: BTreeMap<String, usize> = BTreeMap::new();
        self.visit(&mut |tree, item| match item {
            Visit::Node(node) => {
                if let Some(id) = node.node_id {
                    let scope = tree.map(|t| t as *const BehaviorTree as usize).unwrap_or(0);
                    nodes.entry((scope, id)).or_default().push(node.label());
                }
            }
            Visit::Tree(tree) => {
                if let Some(tree_id) = tree.tree_id() {
                    *trees.entry(tree_id.to_string()).or_default() += 1;
                }
            }
            Visit::Condition(_) => {}
        });

        let mut violations: Vec<String> = nodes
            .into_iter()
            .filter(|(_, labels)| labels.len() > 1)
            .map(|((_, id), labels)| format!("node id {} used by [{}]", id, labels.join(", ")))
            .collect();
        violations.sort();
        violations.extend(
            trees
                .into_iter()
                .filter(|(_, count)| *count > 1)
                .map(|(tree_id, count)| format!("tree id '{}' used by {} trees", tree_id, count)),
        );
        if violations.is_empty() {
            Ok(())
        } else {
            Err(WorkcellError::InvalidArgument(format!(
                "behavior tree '{}' has duplicate ids: {}",
                self.name,
                violations.join("; ")
            )))
        }
    }

    /// Give every node an id unique within its tree and every tree (this
    /// one and nested ones) a unique tree id. Existing unique ids are kept.
    pub fn ensure_all_unique_ids(&mut self) {
        let mut tree_ids = HashSet::new();
        self.ensure_ids_in(&mut tree_ids);
    }

    fn ensure_ids_in(&mut self, tree_ids: &mut HashSet<String>) {
        let keep = matches!(&self.tree_id, Some(id) if !tree_ids.contains(id));
        if !keep {
            let mut fresh = generate_tree_id();
            while tree_ids.contains(&fresh) {
                fresh = generate_tree_id();
            }
            self.tree_id = Some(fresh);
        }
        tree_ids.extend(self.tree_id.clone());

        let Some(root) = self.root.as_deref_mut() else {
            return;
        };
        let mut node_ids = HashSet::new();
        let mut nested = Vec::new();
        ensure_node_ids(root, &mut node_ids, &mut nested);
        for tree in nested {
            tree.ensure_ids_in(tree_ids);
        }
    }

    /// `(tree_id, node_id)` of every node named `name`, nested trees included.
    pub fn find_tree_and_node_ids(&self, name: &str) -> Vec<(Option<String>, Option<NodeId>)> {
        let mut found = Vec::new();
        self.visit(&mut |tree, item| {
            if let Visit::Node(node) = item {
                if node.name.as_deref() == Some(name) {
                    found.push((
                        tree.and_then(|t| t.tree_id().map(str::to_string)),
                        node.node_id,
                    ));
                }
            }
        });
        found
    }

    /// `(tree_id, node_id)` of the single node named `name`. Fails when no or
    /// several nodes match, or when the match lacks a tree or node id.
    pub fn find_tree_and_node_id(&self, name: &str) -> Result<(String, NodeId)> {
        let mut found = self.find_tree_and_node_ids(name);
        match found.len() {
            0 => Err(WorkcellError::NotFound(format!(
                "no node named '{}' in tree '{}'",
                name, self.name
            ))),
            1 => match found.remove(0) {
                (Some(tree_id), Some(node_id)) => Ok((tree_id, node_id)),
                _ => Err(WorkcellError::InvalidArgument(format!(
                    "node '{}' is missing a tree id or node id; call ensure_all_unique_ids first",
                    name
                ))),
            },
            n => Err(WorkcellError::InvalidArgument(format!(
                "{} nodes are named '{}'",
                n, name
            ))),
        }
    }

    /// Node with `node_id` in this tree. Nested trees are not searched.
    pub fn find_node_by_id(&self, node_id: NodeId) -> Option<&Node> {
        fn search(node: &Node, node_id: NodeId) -> Option<&Node> {
            if node.node_id == Some(node_id) {
                return Some(node);
            }
            node.children().into_iter().find_map(|c| search(c, node_id))
        }
        self.root.as_deref().and_then(|root| search(root, node_id))
    }

    /// Remove the node with `node_id` from this tree. Requires a tree id.
    pub fn remove_node_by_id(&mut self, node_id: NodeId) -> Result<()> {
        if self.tree_id.is_none() {
            return Err(WorkcellError::InvalidArgument(format!(
                "tree '{}' needs a tree id before nodes can be removed by id",
                self.name
            )));
        }
        fn remove(node: &mut Node, node_id: NodeId) -> bool {
            if node.has_child(node_id) {
                return node.remove_child(node_id);
            }
            node.children_mut().into_iter().any(|c| remove(c, node_id))
        }
        let root_matches = self
            .root
            .as_ref()
            .map(|root| root.node_id == Some(node_id))
            .unwrap_or(false);
        let removed = if root_matches {
            self.root = None;
            true
        } else {
            self.root
                .as_deref_mut()
                .map(|root| remove(root, node_id))
                .unwrap_or(false)
        };
        if removed {
            Ok(())
        } else {
            Err(WorkcellError::NotFound(format!(
                "no node with id {} in tree '{}'",
                node_id, self.name
            )))
        }
    }

    pub fn to_wire(&self) -> Result<wire::BehaviorTree> {
        let root = self.root.as_ref().ok_or_else(|| {
            WorkcellError::MissingRequired(format!("behavior tree '{}' has no root", self.name))
        })?;
        Ok(wire::BehaviorTree {
            name: self.name.clone(),
            root: Some(Box::new(root.to_wire()?)),
            description: self.description.clone(),
            tree_id: self.tree_id.clone().unwrap_or_default(),
            metadata: self.metadata.clone(),
            return_value_expression: self.return_value_expression.clone(),
        })
    }

    pub fn from_wire(tree: wire::BehaviorTree) -> Result<Self> {
        Ok(Self {
            name: tree.name,
            tree_id: Some(tree.tree_id).filter(|id| !id.is_empty()),
            root: tree
                .root
                .map(|root| Node::from_wire(*root).map(Box::new))
                .transpose()?,
            metadata: tree.metadata,
            description: tree.description,
            return_value_expression: tree.return_value_expression,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.to_wire()?.encode_to_vec())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_wire(wire::BehaviorTree::decode(bytes)?)
    }
}

fn ensure_node_ids<'a>(
    node: &'a mut Node,
    seen: &mut HashSet<NodeId>,
    nested: &mut Vec<&'a mut BehaviorTree>,
) {
    let keep = matches!(node.node_id, Some(id) if !seen.contains(&id));
    if !keep {
        let mut fresh = generate_node_id();
        while seen.contains(&fresh) {
            fresh = generate_node_id();
        }
        node.node_id = Some(fresh);
    }
    seen.extend(node.node_id);

    let (children, trees) = node.split_mut();
    nested.extend(trees);
    for child in children {
        ensure_node_ids(child, seen, nested);
    }
}

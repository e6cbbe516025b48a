//! Message and enum shortcuts attached to a generated skill
//!
//! Every message and enum reachable from a skill's parameter or return
//! value message is reachable under its full proto name, e.g.
//! `demo.pick.Options` or `demo.pick.Mode.FAST`. Enum values are also
//! inlined into the enum's parent (`demo.pick.FAST`), and enums declared
//! inside the parameter message are inlined onto the skill itself.

use std::collections::{BTreeMap, BTreeSet};

use crate::diagnostics::{self, DiagnosticKind};
use crate::reflect::{FieldKind, MessageType, TypeRegistry};

use super::info::SkillInfo;
use super::message::EnumConst;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    /// Intermediate proto package segment.
    Package,
    Message(String),
    Enum(String),
    EnumValue(EnumConst),
}

#[derive(Debug, Clone)]
pub struct Namespace {
    member: Member,
    children: BTreeMap<String, Namespace>,
}

impl Namespace {
    fn new(member: Member) -> Self {
        Self {
            member,
            children: BTreeMap::new(),
        }
    }

    pub fn member(&self) -> &Member {
        &self.member
    }

    pub fn get(&self, name: &str) -> Option<&Namespace> {
        self.children.get(name)
    }

    /// Follows a dotted path, e.g. `demo.pick.Mode.FAST`.
    pub fn resolve(&self, path: &str) -> Option<&Namespace> {
        path.split('.')
            .try_fold(self, |namespace, segment| namespace.children.get(segment))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    fn resolve_mut(&mut self, path: &str) -> Option<&mut Namespace> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.')
            .try_fold(self, |namespace, segment| namespace.children.get_mut(segment))
    }

    /// Inserts `member` at `path`, creating package nodes on the way.
    fn insert_path(&mut self, path: &str, member: Member) -> &mut Namespace {
        let node = path.split('.').fold(self, |namespace, segment| {
            namespace
                .children
                .entry(segment.to_string())
                .or_insert_with(|| Namespace::new(Member::Package))
        });
        node.member = member;
        node
    }

    /// Adds `node` as `name` unless that name is taken; the existing member
    /// wins and a diagnostic is reported.
    fn add_shortcut(&mut self, scope: &str, name: &str, node: Namespace, origin: &str) {
        if self.children.contains_key(name) {
            let scope = if scope.is_empty() { "<skill>" } else { scope };
            diagnostics::report(
                DiagnosticKind::Shadowed,
                format!(
                    "'{}' from '{}' is not added to '{}': the name is already defined there",
                    name, origin, scope
                ),
            );
            return;
        }
        self.children.insert(name.to_string(), node);
    }
}

/// Builds the namespace tree of `info`.
pub fn build(info: &SkillInfo) -> Namespace {
    let registry = info.registry();
    let (messages, enums) = reachable_types(info);

    let mut root = Namespace::new(Member::Package);
    for name in &messages {
        root.insert_path(name, Member::Message(name.clone()));
    }
    let mut enum_nodes = BTreeMap::new();
    for name in &enums {
        let Some(ty) = registry.enum_type(name) else {
            continue;
        };
        let node = root.insert_path(name, Member::Enum(name.clone()));
        for value in &ty.values {
            node.children.insert(
                value.name.clone(),
                Namespace::new(Member::EnumValue(EnumConst {
                    enum_name: name.clone(),
                    name: value.name.clone(),
                    number: value.number,
                })),
            );
        }
        enum_nodes.insert(name.clone(), node.clone());
    }

    for (name, node) in &enum_nodes {
        let parent = name.rsplit_once('.').map(|(p, _)| p).unwrap_or("");
        if let Some(scope) = root.resolve_mut(parent) {
            for (value_name, value) in &node.children {
                scope.add_shortcut(parent, value_name, value.clone(), name);
            }
        }
    }

    if let Some(parameters) = info.parameter_type() {
        for name in &parameters.nested_enums {
            let Some(node) = enum_nodes.get(name) else {
                continue;
            };
            let local = name.rsplit('.').next().unwrap_or_default();
            root.add_shortcut("", local, node.clone(), name);
            for (value_name, value) in &node.children {
                root.add_shortcut("", value_name, value.clone(), name);
            }
        }
    }
    root
}

/// Messages and enums reachable from the parameter and return value
/// messages. Map entries are skipped in favor of their value type.
fn reachable_types(info: &SkillInfo) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut messages = BTreeSet::new();
    let mut enums = BTreeSet::new();
    let mut pending: Vec<String> = info
        .parameter_type()
        .into_iter()
        .chain(info.return_type())
        .map(|ty| ty.full_name.clone())
        .collect();
    while let Some(name) = pending.pop() {
        let Some(ty) = info.registry().message(&name) else {
            continue;
        };
        if ty.is_map_entry || !messages.insert(name) {
            continue;
        }
        visit_fields(&ty, info.registry(), &mut pending, &mut enums);
    }
    (messages, enums)
}

fn visit_fields(
    ty: &MessageType,
    registry: &TypeRegistry,
    pending: &mut Vec<String>,
    enums: &mut BTreeSet<String>,
) {
    for field in &ty.fields {
        match field.element_kind() {
            FieldKind::Message(name) => pending.push(name.clone()),
            FieldKind::Enum(name) => {
                if registry.enum_type(name).is_some() {
                    enums.insert(name.clone());
                }
            }
            FieldKind::Scalar(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::fixtures::pick_skill;

    fn pick_namespace() -> (Namespace, Vec<diagnostics::Diagnostic>) {
        let info = SkillInfo::from_skill(pick_skill()).unwrap();
        diagnostics::capture(|| build(&info))
    }

    #[test]
    fn test_types_are_reachable_by_full_name() {
        let (namespace, _) = pick_namespace();
        assert_eq!(
            namespace.resolve("demo.pick.Options").unwrap().member(),
            &Member::Message("demo.pick.Options".to_string())
        );
        assert_eq!(
            namespace.resolve("workcell_proto.world.ObjectReferenceByName").unwrap().member(),
            &Member::Message("workcell_proto.world.ObjectReferenceByName".to_string())
        );
        match namespace.resolve("demo.pick.Mode.SAFE").unwrap().member() {
            Member::EnumValue(value) => assert_eq!(value.number, 2),
            other => panic!("unexpected member {:?}", other),
        }
        assert!(namespace.resolve("demo.pick.PickParams.LabelsEntry").is_none());
    }

    #[test]
    fn test_enum_values_are_inlined_into_parent() {
        let (namespace, _) = pick_namespace();
        match namespace.resolve("demo.pick.SAFE").unwrap().member() {
            Member::EnumValue(value) => assert_eq!(value.enum_name, "demo.pick.Mode"),
            other => panic!("unexpected member {:?}", other),
        }
        match namespace.resolve("demo.pick.PickParams.SIDE").unwrap().member() {
            Member::EnumValue(value) => assert_eq!(value.enum_name, "demo.pick.PickParams.Grasp"),
            other => panic!("unexpected member {:?}", other),
        }
    }

    #[test]
    fn test_shadowed_value_keeps_existing_member() {
        let (namespace, reported) = pick_namespace();
        match namespace.resolve("demo.pick.FAST").unwrap().member() {
            Member::EnumValue(value) => assert_eq!(value.enum_name, "demo.pick.Mode"),
            other => panic!("unexpected member {:?}", other),
        }
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].kind, DiagnosticKind::Shadowed);
        assert!(reported[0].message.contains("demo.pick.Speed"));
    }

    #[test]
    fn test_parameter_enums_are_inlined_onto_skill() {
        let (namespace, _) = pick_namespace();
        assert_eq!(
            namespace.get("Grasp").unwrap().member(),
            &Member::Enum("demo.pick.PickParams.Grasp".to_string())
        );
        assert!(matches!(
            namespace.get("TOP").unwrap().member(),
            Member::EnumValue(_)
        ));
        assert!(namespace.get("Mode").is_none());
    }
}

//! Generated skill classes and the calls built from them

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use crate::blackboard::{BlackboardValue, ValueType};
use crate::bt::{generate_blackboard_key, Node};
use crate::proto::behavior_call::{BehaviorCall, ResourceSpecification, SkillExecutionOptions};
use crate::proto::resources::ResourceHandle;
use crate::{Result, WorkcellError};

use super::info::SkillInfo;
use super::message::{param_specs, Arg, EnumConst, MessageWrapper, ParamSpec};
use super::namespace::{self, Member, Namespace};

/// Appended to a resource slot's keyword when a parameter has the same name.
pub const RESOURCE_SLOT_SUFFIX: &str = "_resource";

/// Keyword that names the blackboard key of the skill's return value.
pub const RETURN_VALUE_KEY: &str = "return_value_key";

/// Everything needed to build calls of one skill.
#[derive(Debug)]
pub struct SkillClass {
    info: Arc<SkillInfo>,
    resources: BTreeMap<String, Vec<ResourceHandle>>,
    /// Constructor keyword → resource slot.
    slot_keywords: BTreeMap<String, String>,
    parameter_specs: Vec<ParamSpec>,
    namespace: Namespace,
}

impl SkillClass {
    /// `resources` lists the compatible handles per slot.
    pub fn new(
        info: Arc<SkillInfo>,
        resources: BTreeMap<String, Vec<ResourceHandle>>,
    ) -> Result<Self> {
        let parameter_names: BTreeSet<String> = info
            .parameter_type()
            .map(|ty| ty.fields.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default();
        if parameter_names.contains(RETURN_VALUE_KEY) {
            return Err(WorkcellError::NameCollision(format!(
                "skill '{}' declares a parameter named '{}'",
                info.id(),
                RETURN_VALUE_KEY
            )));
        }

        let mut slot_keywords = BTreeMap::new();
        for slot in info.resource_selectors().keys() {
            let keyword = if parameter_names.contains(slot) {
                let renamed = format!("{}{}", slot, RESOURCE_SLOT_SUFFIX);
                if parameter_names.contains(&renamed) {
                    return Err(WorkcellError::NameCollision(format!(
                        "skill '{}': resource slot '{}' collides with parameters '{}' and '{}'",
                        info.id(),
                        slot,
                        slot,
                        renamed
                    )));
                }
                renamed
            } else {
                slot.clone()
            };
            slot_keywords.insert(keyword, slot.clone());
        }

        let parameter_specs = match info.parameter_type() {
            Some(ty) => param_specs(ty, info.registry(), info.default_parameters(), |field| {
                info.field_comment(&field.full_name)
            }),
            None => Vec::new(),
        };
        let namespace = namespace::build(&info);

        Ok(Self {
            info,
            resources,
            slot_keywords,
            parameter_specs,
            namespace,
        })
    }

    pub fn info(&self) -> &Arc<SkillInfo> {
        &self.info
    }

    pub fn id(&self) -> &str {
        self.info.id()
    }

    pub fn name(&self) -> &str {
        self.info.skill_name()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// `(keyword, slot)` pairs of the resource slots.
    pub fn resource_keywords(&self) -> impl Iterator<Item = (&str, &str)> {
        self.slot_keywords
            .iter()
            .map(|(keyword, slot)| (keyword.as_str(), slot.as_str()))
    }

    pub fn compatible_resources(&self, slot: &str) -> &[ResourceHandle] {
        self.resources.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Constructor keywords: parameters (required first), resource slots,
    /// then `return_value_key`.
    pub fn signature(&self) -> Vec<ParamSpec> {
        let mut specs = self.parameter_specs.clone();
        for (keyword, slot) in &self.slot_keywords {
            let candidates = self.compatible_resources(slot);
            let capabilities: Vec<&str> = self
                .info
                .resource_selectors()
                .get(slot)
                .map(|c| c.iter().map(String::as_str).collect())
                .unwrap_or_default();
            specs.push(ParamSpec {
                name: keyword.clone(),
                type_hint: "ResourceHandle | String".to_string(),
                required: candidates.len() != 1,
                default: match candidates {
                    [only] => Some(format!("{:?}", only.name)),
                    _ => None,
                },
                comment: Some(format!(
                    "Resource for slot '{}' with capabilities [{}].",
                    slot,
                    capabilities.join(", ")
                )),
            });
        }
        specs.push(ParamSpec {
            name: RETURN_VALUE_KEY.to_string(),
            type_hint: "String".to_string(),
            required: false,
            default: Some("<generated>".to_string()),
            comment: Some("Blackboard key the return value is written to.".to_string()),
        });
        specs
    }

    /// Human-readable description of the skill and its keywords.
    pub fn doc(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} ({})", self.info.display_name(), self.id());
        if let Some(version) = self.info.version() {
            let _ = writeln!(out, "Version: {}", version);
        }
        if !self.info.description().is_empty() {
            let _ = writeln!(out, "\n{}", self.info.description().trim());
        }

        if !self.parameter_specs.is_empty() {
            let _ = writeln!(out, "\nArgs:");
            for spec in &self.parameter_specs {
                write_spec(&mut out, spec);
            }
        }
        if !self.slot_keywords.is_empty() {
            let _ = writeln!(out, "\nResources:");
            for spec in self
                .signature()
                .iter()
                .filter(|s| self.slot_keywords.contains_key(&s.name))
            {
                write_spec(&mut out, spec);
            }
        }
        if let Some(ty) = self.info.return_type() {
            let _ = writeln!(out, "\nReturns:\n    {}", ty.full_name);
            for field in &ty.fields {
                let _ = writeln!(out, "    {}: {}", field.name, field.kind);
                if let Some(comment) = self.info.field_comment(&field.full_name) {
                    let _ = writeln!(out, "        {}", comment);
                }
            }
        }
        out
    }

    /// Empty builder for a message reachable from this skill, by full name
    /// or by a shortcut such as `Options` when one exists.
    pub fn message(&self, path: &str) -> Result<MessageWrapper> {
        match self.namespace.resolve(path).map(Namespace::member) {
            Some(Member::Message(full_name)) => {
                let ty = self.info.registry().message(full_name).ok_or_else(|| {
                    WorkcellError::Descriptor(format!("unknown message type '{}'", full_name))
                })?;
                Ok(MessageWrapper::new(ty, self.info.registry().clone()))
            }
            _ => Err(WorkcellError::NotFound(format!(
                "skill '{}' has no message '{}'",
                self.id(),
                path
            ))),
        }
    }

    /// Enum value by path, e.g. `demo.pick.Mode.FAST`, `demo.pick.FAST` or
    /// `TOP` for enums declared in the parameter message.
    pub fn enum_value(&self, path: &str) -> Result<EnumConst> {
        match self.namespace.resolve(path).map(Namespace::member) {
            Some(Member::EnumValue(value)) => Ok(value.clone()),
            _ => Err(WorkcellError::NotFound(format!(
                "skill '{}' has no enum value '{}'",
                self.id(),
                path
            ))),
        }
    }

    /// Starts a call with the skill's default parameters.
    pub fn call(self: &Arc<Self>) -> SkillCall {
        let params = self.info.parameter_type().map(|ty| {
            let registry = self.info.registry().clone();
            match self.info.default_parameters() {
                Some(defaults) => MessageWrapper::from_message(defaults.clone(), registry),
                None => MessageWrapper::new(ty.clone(), registry),
            }
        });
        SkillCall {
            class: self.clone(),
            params,
            resources: BTreeMap::new(),
            return_value_key: generate_blackboard_key(self.name()),
            name: None,
            execute_timeout: None,
            project_timeout: None,
        }
    }
}

fn write_spec(out: &mut String, spec: &ParamSpec) {
    let _ = writeln!(out, "    {}", spec);
    if let Some(comment) = &spec.comment {
        for line in comment.lines() {
            let _ = writeln!(out, "        {}", line.trim());
        }
    }
}

/// One invocation of a skill; becomes a `Task` node.
#[derive(Debug, Clone)]
pub struct SkillCall {
    class: Arc<SkillClass>,
    params: Option<MessageWrapper>,
    /// Slot → handle name.
    resources: BTreeMap<String, String>,
    return_value_key: String,
    name: Option<String>,
    execute_timeout: Option<Duration>,
    project_timeout: Option<Duration>,
}

impl SkillCall {
    pub fn class(&self) -> &Arc<SkillClass> {
        &self.class
    }

    /// Sets a constructor keyword: a parameter, a resource slot keyword or
    /// `return_value_key`.
    pub fn set(&mut self, keyword: &str, arg: impl Into<Arg>) -> Result<&mut Self> {
        let arg = arg.into();
        if let Some(slot) = self.class.slot_keywords.get(keyword).cloned() {
            return match arg {
                Arg::String(handle) => {
                    self.resources.insert(slot, handle);
                    Ok(self)
                }
                other => Err(WorkcellError::TypeMismatch(format!(
                    "resource keyword '{}' expects a handle name, got {:?}",
                    keyword, other
                ))),
            };
        }
        if keyword == RETURN_VALUE_KEY {
            return match arg {
                Arg::String(key) => {
                    self.return_value_key = key;
                    Ok(self)
                }
                other => Err(WorkcellError::TypeMismatch(format!(
                    "'{}' expects a string, got {:?}",
                    RETURN_VALUE_KEY, other
                ))),
            };
        }

        let id = self.class.id().to_string();
        let params = self
            .params
            .as_mut()
            .filter(|p| p.descriptor().field(keyword).is_some())
            .ok_or_else(|| {
                WorkcellError::InvalidArgument(format!(
                    "skill '{}' has no parameter '{}'",
                    id, keyword
                ))
            })?;
        params.set(keyword, arg)?;
        Ok(self)
    }

    pub fn with(mut self, keyword: &str, arg: impl Into<Arg>) -> Result<Self> {
        self.set(keyword, arg)?;
        Ok(self)
    }

    /// Binds `handle` to a resource slot, named by slot or by keyword.
    pub fn with_resource(mut self, slot: &str, handle: impl Into<String>) -> Result<Self> {
        let slot = if self.class.info.resource_selectors().contains_key(slot) {
            slot.to_string()
        } else {
            self.class.slot_keywords.get(slot).cloned().ok_or_else(|| {
                WorkcellError::InvalidArgument(format!(
                    "skill '{}' has no resource slot '{}'",
                    self.class.id(),
                    slot
                ))
            })?
        };
        self.resources.insert(slot, handle.into());
        Ok(self)
    }

    pub fn with_return_value_key(mut self, key: impl Into<String>) -> Self {
        self.return_value_key = key.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_execute_timeout(mut self, timeout: Duration) -> Self {
        self.execute_timeout = Some(timeout);
        self
    }

    pub fn with_project_timeout(mut self, timeout: Duration) -> Self {
        self.project_timeout = Some(timeout);
        self
    }

    pub fn return_value_key(&self) -> &str {
        &self.return_value_key
    }

    pub fn parameters(&self) -> Option<&MessageWrapper> {
        self.params.as_ref()
    }

    /// The skill's return value on the blackboard, typed by its return
    /// message.
    pub fn result(&self) -> Result<BlackboardValue> {
        let info = &self.class.info;
        let name = info.return_value_message_name().ok_or_else(|| {
            WorkcellError::InvalidArgument(format!(
                "skill '{}' has no return value",
                info.id()
            ))
        })?;
        Ok(BlackboardValue::new(
            self.return_value_key.clone(),
            ValueType::message(name, info.registry().clone()),
        ))
    }

    /// Wire form of the call.
    pub fn build(&self) -> Result<BehaviorCall> {
        let info = &self.class.info;
        if let Some(params) = &self.params {
            if let Some(missing) = self
                .class
                .parameter_specs
                .iter()
                .find(|spec| spec.required && !params.is_provided(&spec.name))
            {
                return Err(WorkcellError::MissingRequired(format!(
                    "skill '{}' is missing required parameter '{}'",
                    info.id(),
                    missing.name
                )));
            }
        }

        let mut resources = BTreeMap::new();
        for slot in info.resource_selectors().keys() {
            let handle = match self.resources.get(slot) {
                Some(handle) => handle.clone(),
                None => self.select_resource(slot)?,
            };
            resources.insert(slot.clone(), ResourceSpecification { handle });
        }

        let skill_execution_options = if self.execute_timeout.is_some() || self.project_timeout.is_some() {
            Some(SkillExecutionOptions {
                project_timeout: self.project_timeout.map(proto_duration).transpose()?,
                execute_timeout: self.execute_timeout.map(proto_duration).transpose()?,
            })
        } else {
            None
        };

        let mut call = BehaviorCall::new(info.id());
        call.name = self.name.clone().unwrap_or_default();
        call.parameters = self
            .params
            .as_ref()
            .map(|p| p.to_any(&info.type_url_prefix()));
        call.assignments = self
            .params
            .as_ref()
            .map(|p| p.assignments().to_vec())
            .unwrap_or_default();
        call.resources = resources;
        call.return_value_name = self.return_value_key.clone();
        call.skill_execution_options = skill_execution_options;
        Ok(call)
    }

    /// Task node invoking this call.
    pub fn to_node(&self) -> Result<Node> {
        let node = Node::task(self.build()?);
        Ok(match &self.name {
            Some(name) => node.with_name(name.clone()),
            None => node,
        })
    }

    fn select_resource(&self, slot: &str) -> Result<String> {
        match self.class.compatible_resources(slot) {
            [only] => Ok(only.name.clone()),
            [] => Err(WorkcellError::MissingRequired(format!(
                "skill '{}': no compatible resource for slot '{}'",
                self.class.id(),
                slot
            ))),
            many => Err(WorkcellError::MissingRequired(format!(
                "skill '{}': slot '{}' has {} compatible resources ({}); bind one explicitly",
                self.class.id(),
                slot,
                many.len(),
                many.iter().map(|h| h.name.as_str()).collect::<Vec<_>>().join(", ")
            ))),
        }
    }
}

fn proto_duration(duration: Duration) -> Result<prost_types::Duration> {
    prost_types::Duration::try_from(duration).map_err(|e| {
        WorkcellError::InvalidArgument(format!("timeout {:?} is out of range: {}", duration, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::skills::ResourceSelector;
    use crate::reflect::DynamicMessage;
    use crate::skills::convert::Pose3;
    use crate::skills::fixtures::{pick_skill, simple_skill};
    use prost_types::field_descriptor_proto::Type;

    fn handle(name: &str) -> ResourceHandle {
        ResourceHandle {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn pick_class(robots: &[&str]) -> Arc<SkillClass> {
        let info = Arc::new(SkillInfo::from_skill(pick_skill()).unwrap());
        let resources: BTreeMap<String, Vec<ResourceHandle>> =
            BTreeMap::from([("robot".to_string(), robots.iter().map(|r| handle(r)).collect())]);
        Arc::new(diagnostics_free(|| SkillClass::new(info, resources)).unwrap())
    }

    fn diagnostics_free<T>(f: impl FnOnce() -> T) -> T {
        crate::diagnostics::capture(f).0
    }

    fn complete_call(class: &Arc<SkillClass>) -> SkillCall {
        class
            .call()
            .with("target", Pose3::IDENTITY)
            .unwrap()
            .with("grasp", "TOP")
            .unwrap()
            .with("tool", "suction")
            .unwrap()
            .with("timeout", 5)
            .unwrap()
            .with("object", crate::skills::convert::WorldObject::new("box"))
            .unwrap()
            .with("options", class.message("demo.pick.Options").unwrap())
            .unwrap()
            .with("count", 1)
            .unwrap()
    }

    #[test]
    fn test_build_packs_parameters_with_skill_type_url() {
        let class = pick_class(&["arm_1"]);
        let call = complete_call(&class)
            .with_execute_timeout(Duration::from_secs(30))
            .build()
            .unwrap();
        assert_eq!(call.skill_id, "demo.pick.pick");
        let parameters = call.parameters.unwrap();
        assert_eq!(
            parameters.type_url,
            "type.workcell.dev/skills/demo.pick.pick/1.2.0/demo.pick.PickParams"
        );
        let decoded = DynamicMessage::decode(
            class.info().parameter_type().unwrap().clone(),
            class.info().registry(),
            &parameters.value,
        )
        .unwrap();
        // The default survives.
        assert_eq!(decoded.get("speed").unwrap().as_f64(), Some(0.5));
        assert_eq!(call.resources["robot"].handle, "arm_1");
        let options = call.skill_execution_options.unwrap();
        assert_eq!(options.execute_timeout.unwrap().seconds, 30);
        assert!(options.project_timeout.is_none());
    }

    #[test]
    fn test_missing_required_parameter() {
        let class = pick_class(&["arm_1"]);
        let err = class.call().with("tool", "x").unwrap().build().unwrap_err();
        assert!(matches!(err, WorkcellError::MissingRequired(_)));
        assert!(err.to_string().contains("'target'"));
    }

    #[test]
    fn test_unknown_keyword_is_rejected() {
        let class = pick_class(&["arm_1"]);
        let err = class.call().with("nope", 1).unwrap_err();
        assert!(matches!(err, WorkcellError::InvalidArgument(_)));
    }

    #[test]
    fn test_resource_selection() {
        let none = pick_class(&[]);
        let err = complete_call(&none).build().unwrap_err();
        assert!(err.to_string().contains("no compatible resource"));

        let many = pick_class(&["arm_1", "arm_2"]);
        let err = complete_call(&many).build().unwrap_err();
        assert!(matches!(err, WorkcellError::MissingRequired(_)));
        let call = complete_call(&many)
            .with("robot", "arm_2")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(call.resources["robot"].handle, "arm_2");
    }

    #[test]
    fn test_resource_slot_is_deconflicted() {
        let mut skill = simple_skill("demo.tools.grip", "demo.tools", &[("tool", Type::String)]);
        skill.resource_selectors.insert(
            "tool".to_string(),
            ResourceSelector {
                capability_names: vec!["gripper".to_string()],
            },
        );
        let info = Arc::new(SkillInfo::from_skill(skill).unwrap());
        let class = Arc::new(
            SkillClass::new(
                info,
                BTreeMap::from([("tool".to_string(), vec![handle("gripper_a")])]),
            )
            .unwrap(),
        );
        let keywords: Vec<(&str, &str)> = class.resource_keywords().collect();
        assert_eq!(keywords, vec![("tool_resource", "tool")]);

        let call = class
            .call()
            .with("tool", "two_finger")
            .unwrap()
            .with("tool_resource", "gripper_b")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(call.resources["tool"].handle, "gripper_b");
    }

    #[test]
    fn test_second_collision_is_fatal() {
        let mut skill = simple_skill(
            "demo.tools.grip",
            "demo.tools",
            &[("tool", Type::String), ("tool_resource", Type::String)],
        );
        skill
            .resource_selectors
            .insert("tool".to_string(), ResourceSelector::default());
        let info = Arc::new(SkillInfo::from_skill(skill).unwrap());
        let err = SkillClass::new(info, BTreeMap::new()).unwrap_err();
        assert!(matches!(err, WorkcellError::NameCollision(_)));
    }

    #[test]
    fn test_result_is_typed_by_return_message() {
        let class = pick_class(&["arm_1"]);
        let call = class.call().with_return_value_key("pick_out");
        let pose = call.result().unwrap().field("poses").unwrap().index(2).unwrap();
        assert_eq!(pose.value_access_path(), "pick_out.poses[2]");
        assert!(call.result().unwrap().field("missing").is_err());

        let no_result = Arc::new(
            SkillClass::new(
                Arc::new(SkillInfo::from_skill(simple_skill("a.b.c", "a.b", &[])).unwrap()),
                BTreeMap::new(),
            )
            .unwrap(),
        );
        assert!(no_result.call().result().is_err());
    }

    #[test]
    fn test_signature_and_doc() {
        let class = pick_class(&["arm_1"]);
        let signature = class.signature();
        let names: Vec<&str> = signature.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"target"));
        assert_eq!(&names[names.len() - 2..], &["robot", RETURN_VALUE_KEY]);
        let robot = &signature[signature.len() - 2];
        assert!(!robot.required);
        assert_eq!(robot.default.as_deref(), Some("\"arm_1\""));

        let doc = class.doc();
        assert!(doc.starts_with("pick (demo.pick.pick)"));
        assert!(doc.contains("Fraction of the maximum speed."));
        assert!(doc.contains("Resources:"));
        assert!(doc.contains("Returns:\n    demo.pick.PickResult"));
    }

    #[test]
    fn test_enum_shortcuts_resolve() {
        let class = pick_class(&["arm_1"]);
        let top = class.enum_value("TOP").unwrap();
        let call = complete_call(&class).with("grasp", top).unwrap();
        let grasp = call.parameters().unwrap().get("grasp").cloned();
        assert_eq!(grasp, Some(crate::reflect::Value::EnumNumber(1)));
        assert!(class.enum_value("demo.pick.Options").is_err());
    }

    #[test]
    fn test_task_node_carries_name() {
        let class = pick_class(&["arm_1"]);
        let node = complete_call(&class).with_name("pick box").to_node().unwrap();
        assert_eq!(node.label(), "Task (pick box)");
    }
}

//! Skill descriptions with their hermetic type registry

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::proto::skills::Skill;
use crate::proto::{type_name_of_url, DEFAULT_TYPE_URL_PREFIX};
use crate::reflect::{DynamicMessage, MessageType, TypeRegistry};
use crate::{Result, WorkcellError};

/// Root of the skill-qualified type URLs the executive uses to pick the
/// right descriptor pool for a parameter message.
pub const SKILL_TYPE_URL_ROOT: &str = "type.workcell.dev/skills";

/// A skill description together with the types it declares.
///
/// The registry is built only from the skill's own parameter and return
/// value descriptor sets, so two skills declaring the same message name with
/// different definitions never share a type.
#[derive(Debug, Clone)]
pub struct SkillInfo {
    skill: Skill,
    registry: Arc<TypeRegistry>,
    parameter_type: Option<Arc<MessageType>>,
    return_type: Option<Arc<MessageType>>,
    default_parameters: Option<DynamicMessage>,
    resource_selectors: BTreeMap<String, BTreeSet<String>>,
}

impl SkillInfo {
    pub fn from_skill(skill: Skill) -> Result<Self> {
        if skill.id.is_empty() {
            return Err(WorkcellError::InvalidArgument(
                "skill description has an empty id".to_string(),
            ));
        }

        let sets = skill
            .parameter_description
            .iter()
            .filter_map(|p| p.parameter_descriptor_fileset.as_ref())
            .chain(
                skill
                    .return_value_description
                    .iter()
                    .filter_map(|r| r.descriptor_fileset.as_ref()),
            );
        let registry = TypeRegistry::from_file_descriptor_sets(sets).map_err(|e| match e {
            WorkcellError::Descriptor(msg) => {
                WorkcellError::Descriptor(format!("skill '{}': {}", skill.id, msg))
            }
            other => other,
        })?;

        let parameter_type = match skill
            .parameter_description
            .as_ref()
            .map(|p| p.parameter_message_full_name.as_str())
            .filter(|name| !name.is_empty())
        {
            Some(name) => Some(lookup(&registry, &skill.id, name)?),
            None => None,
        };
        let return_type = match skill
            .return_value_description
            .as_ref()
            .map(|r| r.return_value_message_full_name.as_str())
            .filter(|name| !name.is_empty())
        {
            Some(name) => Some(lookup(&registry, &skill.id, name)?),
            None => None,
        };

        let default_parameters = match (
            &parameter_type,
            skill
                .parameter_description
                .as_ref()
                .and_then(|p| p.default_value.as_ref()),
        ) {
            (Some(ty), Some(any)) => {
                let actual = type_name_of_url(&any.type_url);
                if actual != ty.full_name {
                    return Err(WorkcellError::TypeMismatch(format!(
                        "skill '{}': default parameters hold '{}', expected '{}'",
                        skill.id, actual, ty.full_name
                    )));
                }
                Some(DynamicMessage::decode(ty.clone(), &registry, &any.value)?)
            }
            _ => None,
        };

        let resource_selectors = skill
            .resource_selectors
            .iter()
            .map(|(slot, selector)| {
                (
                    slot.clone(),
                    selector.capability_names.iter().cloned().collect(),
                )
            })
            .collect();

        Ok(Self {
            skill,
            registry,
            parameter_type,
            return_type,
            default_parameters,
            resource_selectors,
        })
    }

    pub fn id(&self) -> &str {
        &self.skill.id
    }

    pub fn id_version(&self) -> Option<&str> {
        Some(self.skill.id_version.as_str()).filter(|v| !v.is_empty())
    }

    /// Version part of `id_version` (`<id>.<version>`), if any.
    pub fn version(&self) -> Option<&str> {
        let id_version = self.id_version()?;
        id_version
            .strip_prefix(self.id())
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|v| !v.is_empty())
    }

    /// Package of the skill; derived from the id when the description
    /// leaves it empty.
    pub fn package_name(&self) -> &str {
        if !self.skill.package_name.is_empty() {
            return &self.skill.package_name;
        }
        self.id().rsplit_once('.').map(|(p, _)| p).unwrap_or("")
    }

    /// Last dot-separated segment of the id.
    pub fn skill_name(&self) -> &str {
        self.id().rsplit('.').next().unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        &self.skill.description
    }

    pub fn display_name(&self) -> &str {
        if self.skill.display_name.is_empty() {
            self.skill_name()
        } else {
            &self.skill.display_name
        }
    }

    pub fn parameter_type(&self) -> Option<&Arc<MessageType>> {
        self.parameter_type.as_ref()
    }

    pub fn return_type(&self) -> Option<&Arc<MessageType>> {
        self.return_type.as_ref()
    }

    pub fn parameter_message_name(&self) -> Option<&str> {
        self.parameter_type.as_ref().map(|t| t.full_name.as_str())
    }

    pub fn return_value_message_name(&self) -> Option<&str> {
        self.return_type.as_ref().map(|t| t.full_name.as_str())
    }

    pub fn default_parameters(&self) -> Option<&DynamicMessage> {
        self.default_parameters.as_ref()
    }

    /// Comment of a parameter or return value field, keyed by the field's
    /// full name. Falls back to the comment recorded in the descriptor.
    pub fn field_comment(&self, field_full_name: &str) -> Option<String> {
        let from_description = self
            .skill
            .parameter_description
            .as_ref()
            .and_then(|p| p.parameter_field_comments.get(field_full_name))
            .or_else(|| {
                self.skill
                    .return_value_description
                    .as_ref()
                    .and_then(|r| r.return_value_field_comments.get(field_full_name))
            })
            .filter(|c| !c.is_empty())
            .cloned();
        from_description.or_else(|| {
            let (message, field) = field_full_name.rsplit_once('.')?;
            self.registry.message(message)?.field(field)?.comment.clone()
        })
    }

    /// Required capability names per resource slot.
    pub fn resource_selectors(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.resource_selectors
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Type URL prefix for messages of this skill:
    /// `type.workcell.dev/skills/<id>/<version>/` when a version is known.
    pub fn type_url_prefix(&self) -> String {
        match self.version() {
            Some(version) => format!("{}/{}/{}/", SKILL_TYPE_URL_ROOT, self.id(), version),
            None => DEFAULT_TYPE_URL_PREFIX.to_string(),
        }
    }

    pub fn proto(&self) -> &Skill {
        &self.skill
    }
}

fn lookup(registry: &TypeRegistry, skill_id: &str, name: &str) -> Result<Arc<MessageType>> {
    registry.message(name).ok_or_else(|| {
        WorkcellError::Descriptor(format!(
            "skill '{}': message '{}' is not declared in its descriptor set",
            skill_id, name
        ))
    })
}

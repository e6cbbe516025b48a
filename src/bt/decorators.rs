//! Node decorators: start condition, breakpoints, execution mode and failure
//! reporting

use crate::proto::behavior_tree as wire;
use crate::proto::extended_status::{DebugReport, ExtendedStatus, StatusCode, UserReport};
use crate::Result;

use super::condition::Condition;
use super::ids::validate_status_code;

pub use crate::proto::behavior_tree::{BreakpointType, DisabledResultState, ExecutionMode};

/// What a node emits when it fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureSettings {
    pub extended_status: Option<ExtendedStatus>,
    /// Blackboard key the emitted status is written to.
    pub to_blackboard_key: Option<String>,
}

impl FailureSettings {
    pub fn is_empty(&self) -> bool {
        self.extended_status.is_none() && self.to_blackboard_key.is_none()
    }

    /// Emit an extended status with the given component, code and title.
    /// Codes outside `[0, 2^32 - 1]` are rejected.
    pub fn emit_extended_status(
        &mut self,
        component: impl Into<String>,
        code: i64,
        title: impl Into<String>,
    ) -> Result<&mut Self> {
        let code = validate_status_code(code)?;
        let status = self.extended_status.get_or_insert_with(ExtendedStatus::default);
        status.status_code = Some(StatusCode {
            component: component.into(),
            code,
        });
        status.title = title.into();
        Ok(self)
    }

    pub fn emit_extended_status_proto(&mut self, status: ExtendedStatus) -> &mut Self {
        self.extended_status = Some(status);
        self
    }

    pub fn emit_extended_status_to(&mut self, blackboard_key: impl Into<String>) -> &mut Self {
        self.to_blackboard_key = Some(blackboard_key.into());
        self
    }

    pub fn with_user_message(&mut self, message: impl Into<String>) -> &mut Self {
        let status = self.extended_status.get_or_insert_with(ExtendedStatus::default);
        status.user_report = Some(UserReport {
            message: message.into(),
            ..Default::default()
        });
        self
    }

    pub fn with_debug_message(&mut self, message: impl Into<String>) -> &mut Self {
        let status = self.extended_status.get_or_insert_with(ExtendedStatus::default);
        status.debug_report = Some(DebugReport {
            message: message.into(),
            ..Default::default()
        });
        self
    }

    pub(crate) fn to_wire(&self) -> Option<wire::FailureSettings> {
        if self.is_empty() {
            return None;
        }
        Some(wire::FailureSettings {
            emit_extended_status: Some(wire::ExtendedStatusEmit {
                extended_status: self.extended_status.clone(),
                to_blackboard_key: self.to_blackboard_key.clone().unwrap_or_default(),
            }),
        })
    }

    pub(crate) fn from_wire(settings: Option<wire::FailureSettings>) -> Self {
        match settings.and_then(|s| s.emit_extended_status) {
            Some(emit) => Self {
                extended_status: emit.extended_status,
                to_blackboard_key: Some(emit.to_blackboard_key).filter(|k| !k.is_empty()),
            },
            None => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decorators {
    pub condition: Option<Condition>,
    pub breakpoint: Option<BreakpointType>,
    pub execution_mode: Option<ExecutionMode>,
    /// Only honored when `execution_mode` is `Disabled`.
    pub disabled_result_state: Option<DisabledResultState>,
    pub on_failure: FailureSettings,
}

impl Decorators {
    pub fn is_empty(&self) -> bool {
        self.condition.is_none()
            && self.breakpoint.is_none()
            && self.execution_mode.is_none()
            && self.disabled_result_state.is_none()
            && self.on_failure.is_empty()
    }

    pub fn set_breakpoint(&mut self, breakpoint: Option<BreakpointType>) {
        self.breakpoint = breakpoint;
    }

    pub fn disable_execution(&mut self, result_state: Option<DisabledResultState>) {
        self.execution_mode = Some(ExecutionMode::Disabled);
        self.disabled_result_state = result_state;
    }

    pub fn enable_execution(&mut self) {
        self.execution_mode = Some(ExecutionMode::Normal);
        self.disabled_result_state = None;
    }

    pub(crate) fn to_wire(&self) -> Result<Option<wire::Decorators>> {
        if self.is_empty() {
            return Ok(None);
        }
        let execution_settings = match self.execution_mode {
            None => None,
            Some(mode) => Some(wire::ExecutionSettings {
                mode: mode as i32,
                disabled_result_state: match (mode, self.disabled_result_state) {
                    (ExecutionMode::Disabled, Some(state)) => state as i32,
                    _ => DisabledResultState::Unspecified as i32,
                },
            }),
        };
        Ok(Some(wire::Decorators {
            condition: self.condition.as_ref().map(Condition::to_wire).transpose()?,
            breakpoint: self.breakpoint.map(|b| b as i32).unwrap_or_default(),
            execution_settings,
            failure_settings: self.on_failure.to_wire(),
        }))
    }

    pub(crate) fn from_wire(decorators: Option<wire::Decorators>) -> Result<Self> {
        let Some(decorators) = decorators else {
            return Ok(Self::default());
        };
        let breakpoint = BreakpointType::try_from(decorators.breakpoint)
            .ok()
            .filter(|b| *b != BreakpointType::Unspecified);
        let (execution_mode, disabled_result_state) = match decorators.execution_settings {
            None => (None, None),
            Some(settings) => (
                ExecutionMode::try_from(settings.mode)
                    .ok()
                    .filter(|m| *m != ExecutionMode::Unspecified),
                DisabledResultState::try_from(settings.disabled_result_state)
                    .ok()
                    .filter(|s| *s != DisabledResultState::Unspecified),
            ),
        };
        Ok(Self {
            condition: decorators.condition.map(Condition::from_wire).transpose()?,
            breakpoint,
            execution_mode,
            disabled_result_state,
            on_failure: FailureSettings::from_wire(decorators.failure_settings),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_extended_status_rejects_out_of_range() {
        let mut settings = FailureSettings::default();
        assert!(settings.emit_extended_status("ai.workcell", -1, "bad").is_err());
        assert!(settings.is_empty());
        settings
            .emit_extended_status("ai.workcell", 12, "gripper failed")
            .unwrap()
            .with_user_message("check the gripper")
            .emit_extended_status_to("gripper_status");
        let status = settings.extended_status.as_ref().unwrap();
        assert_eq!(status.status_code.as_ref().unwrap().code, 12);
        assert_eq!(status.title, "gripper failed");
        assert_eq!(settings.to_blackboard_key.as_deref(), Some("gripper_status"));
    }

    #[test]
    fn test_decorators_round_trip() {
        let mut decorators = Decorators::default();
        decorators.set_breakpoint(Some(BreakpointType::BeforeExecution));
        decorators.disable_execution(Some(DisabledResultState::Failed));
        decorators.condition = Some(Condition::blackboard("x > 1"));
        let wire = decorators.to_wire().unwrap();
        assert_eq!(Decorators::from_wire(wire).unwrap(), decorators);
        assert!(Decorators::default().to_wire().unwrap().is_none());
    }

    #[test]
    fn test_disabled_state_dropped_when_enabled() {
        let mut decorators = Decorators {
            execution_mode: Some(ExecutionMode::Normal),
            disabled_result_state: Some(DisabledResultState::Succeeded),
            ..Default::default()
        };
        let wire = decorators.to_wire().unwrap().unwrap();
        assert_eq!(
            wire.execution_settings.unwrap().disabled_result_state,
            DisabledResultState::Unspecified as i32
        );
        decorators.enable_execution();
        assert!(decorators.disabled_result_state.is_none());
    }
}

//! Condition algebra used by decorators, selector branches, branch nodes and
//! while loops

use crate::blackboard::CelExpression;
use crate::diagnostics::{self, DiagnosticKind};
use crate::proto::behavior_tree::{self as wire, condition::ConditionType};
use crate::proto::extended_status::StatusCode;
use crate::{Result, WorkcellError};

use super::ids::validate_status_code;
use super::tree::{BehaviorTree, Visit};

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Succeeds when the owned tree succeeds.
    SubTree(Box<BehaviorTree>),
    /// CEL expression over the blackboard.
    Blackboard(String),
    AllOf(Vec<Condition>),
    AnyOf(Vec<Condition>),
    Not(Box<Condition>),
    /// Matches an extended status stored on the blackboard.
    ExtendedStatusMatch {
        blackboard_key: String,
        component: String,
        code: u32,
    },
}

impl Condition {
    pub fn blackboard(expression: impl Into<CelExpression>) -> Self {
        Condition::Blackboard(expression.into().0)
    }

    pub fn sub_tree(tree: BehaviorTree) -> Self {
        Condition::SubTree(Box::new(tree))
    }

    pub fn not(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }

    /// Status match on `component`/`code`; codes outside `[0, 2^32 - 1]` are rejected.
    pub fn extended_status_match(
        blackboard_key: impl Into<String>,
        component: impl Into<String>,
        code: i64,
    ) -> Result<Self> {
        Ok(Condition::ExtendedStatusMatch {
            blackboard_key: blackboard_key.into(),
            component: component.into(),
            code: validate_status_code(code)?,
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Condition::SubTree(_) => "SubTreeCondition",
            Condition::Blackboard(_) => "Blackboard",
            Condition::AllOf(_) => "AllOf",
            Condition::AnyOf(_) => "AnyOf",
            Condition::Not(_) => "Not",
            Condition::ExtendedStatusMatch { .. } => "ExtendedStatusMatch",
        }
    }

    /// Pre-order traversal: this condition, then nested conditions or trees.
    pub fn visit<'a>(
        &'a self,
        tree: Option<&'a BehaviorTree>,
        callback: &mut dyn FnMut(Option<&'a BehaviorTree>, Visit<'a>),
    ) {
        callback(tree, Visit::Condition(self));
        match self {
            Condition::SubTree(sub) => sub.visit(callback),
            Condition::AllOf(conditions) | Condition::AnyOf(conditions) => {
                for condition in conditions {
                    condition.visit(tree, callback);
                }
            }
            Condition::Not(inner) => inner.visit(tree, callback),
            Condition::Blackboard(_) | Condition::ExtendedStatusMatch { .. } => {}
        }
    }

    pub(crate) fn nested_trees_mut(&mut self) -> Vec<&mut BehaviorTree> {
        match self {
            Condition::SubTree(sub) => vec![sub.as_mut()],
            Condition::AllOf(conditions) | Condition::AnyOf(conditions) => conditions
                .iter_mut()
                .flat_map(Condition::nested_trees_mut)
                .collect(),
            Condition::Not(inner) => inner.nested_trees_mut(),
            Condition::Blackboard(_) | Condition::ExtendedStatusMatch { .. } => Vec::new(),
        }
    }

    pub fn to_wire(&self) -> Result<wire::Condition> {
        let condition_type = match self {
            Condition::SubTree(tree) => ConditionType::BehaviorTree(wire::SubtreeCondition {
                tree: Some(tree.to_wire()?),
            }),
            Condition::Blackboard(expression) => {
                ConditionType::Blackboard(wire::BlackboardExpression {
                    cel_expression: Some(expression.clone()),
                    checked_expression: Vec::new(),
                })
            }
            Condition::AllOf(conditions) => ConditionType::AllOf(wire::LogicalCompound {
                conditions: conditions.iter().map(Condition::to_wire).collect::<Result<_>>()?,
            }),
            Condition::AnyOf(conditions) => ConditionType::AnyOf(wire::LogicalCompound {
                conditions: conditions.iter().map(Condition::to_wire).collect::<Result<_>>()?,
            }),
            Condition::Not(inner) => ConditionType::Not(wire::NegatedCondition {
                condition: Some(Box::new(inner.to_wire()?)),
            }),
            Condition::ExtendedStatusMatch {
                blackboard_key,
                component,
                code,
            } => ConditionType::StatusMatch(wire::ExtendedStatusMatch {
                blackboard_key: blackboard_key.clone(),
                match_type: Some(wire::extended_status_match::MatchType::StatusCode(
                    StatusCode {
                        component: component.clone(),
                        code: *code,
                    },
                )),
            }),
        };
        Ok(wire::Condition {
            condition_type: Some(condition_type),
        })
    }

    pub fn from_wire(condition: wire::Condition) -> Result<Self> {
        let condition_type = condition.condition_type.ok_or_else(|| {
            WorkcellError::InvalidArgument("condition has no condition type set".to_string())
        })?;
        Ok(match condition_type {
            ConditionType::BehaviorTree(sub) => {
                let tree = sub.tree.ok_or_else(|| {
                    WorkcellError::InvalidArgument("sub-tree condition without tree".to_string())
                })?;
                Condition::SubTree(Box::new(BehaviorTree::from_wire(tree)?))
            }
            ConditionType::Blackboard(expression) => match expression.cel_expression {
                Some(cel) => Condition::Blackboard(cel),
                None => {
                    if prost::Message::encoded_len(&expression) > 0 {
                        diagnostics::report(
                            DiagnosticKind::LossyIntake,
                            "blackboard condition carries no CEL expression; using an empty expression",
                        );
                    }
                    Condition::Blackboard(String::new())
                }
            },
            ConditionType::AllOf(compound) => Condition::AllOf(
                compound
                    .conditions
                    .into_iter()
                    .map(Condition::from_wire)
                    .collect::<Result<_>>()?,
            ),
            ConditionType::AnyOf(compound) => Condition::AnyOf(
                compound
                    .conditions
                    .into_iter()
                    .map(Condition::from_wire)
                    .collect::<Result<_>>()?,
            ),
            ConditionType::Not(negated) => {
                let inner = negated.condition.ok_or_else(|| {
                    WorkcellError::InvalidArgument("negated condition is empty".to_string())
                })?;
                Condition::Not(Box::new(Condition::from_wire(*inner)?))
            }
            ConditionType::StatusMatch(matcher) => match matcher.match_type {
                Some(wire::extended_status_match::MatchType::StatusCode(code)) => {
                    Condition::ExtendedStatusMatch {
                        blackboard_key: matcher.blackboard_key,
                        component: code.component,
                        code: code.code,
                    }
                }
                None => {
                    return Err(WorkcellError::InvalidArgument(format!(
                        "extended status match on '{}' has no match type",
                        matcher.blackboard_key
                    )))
                }
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics;

    fn round_trip(condition: &Condition) -> Condition {
        Condition::from_wire(condition.to_wire().unwrap()).unwrap()
    }

    #[test]
    fn test_compound_round_trip_preserves_order() {
        let condition = Condition::AllOf(vec![
            Condition::blackboard("a"),
            Condition::AnyOf(vec![Condition::blackboard("b"), Condition::blackboard("c")]),
            Condition::not(Condition::blackboard("d")),
            Condition::extended_status_match("status", "ai.workcell", 7).unwrap(),
        ]);
        assert_eq!(round_trip(&condition), condition);
    }

    #[test]
    fn test_lossy_blackboard_intake_reports_diagnostic() {
        let wire = wire::Condition {
            condition_type: Some(ConditionType::Blackboard(wire::BlackboardExpression {
                cel_expression: None,
                checked_expression: vec![1, 2, 3],
            })),
        };
        let (condition, reported) = diagnostics::capture(|| Condition::from_wire(wire).unwrap());
        assert_eq!(condition, Condition::Blackboard(String::new()));
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].kind, DiagnosticKind::LossyIntake);
    }

    #[test]
    fn test_status_match_without_matcher_is_rejected() {
        let wire = wire::Condition {
            condition_type: Some(ConditionType::StatusMatch(wire::ExtendedStatusMatch {
                blackboard_key: "k".to_string(),
                match_type: None,
            })),
        };
        assert!(matches!(
            Condition::from_wire(wire),
            Err(WorkcellError::InvalidArgument(_))
        ));
        assert!(Condition::extended_status_match("k", "c", 1 << 32).is_err());
    }
}

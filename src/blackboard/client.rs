//! Direct access to blackboard values of a running operation

use std::sync::Arc;

use prost_types::Any;

use crate::proto::blackboard::{
    BlackboardEntry, DeleteBlackboardValueRequest, GetBlackboardValueRequest,
    ListBlackboardValuesRequest, UpdateBlackboardValueRequest,
};
use crate::services::BlackboardService;
use crate::{Result, WorkcellError};

use super::value::BlackboardValue;

/// Blackboard client scoped to one executive operation.
#[derive(Clone)]
pub struct BlackboardClient {
    service: Arc<dyn BlackboardService>,
    operation_name: String,
    default_scope: String,
}

impl BlackboardClient {
    pub fn new(service: Arc<dyn BlackboardService>, operation_name: impl Into<String>) -> Self {
        Self {
            service,
            operation_name: operation_name.into(),
            default_scope: String::new(),
        }
    }

    /// Scope used for values that do not carry one.
    pub fn with_default_scope(mut self, scope: impl Into<String>) -> Self {
        self.default_scope = scope.into();
        self
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    fn target<'a>(&'a self, value: &'a BlackboardValue) -> Result<(&'a str, &'a str)> {
        if !value.is_toplevel() {
            return Err(WorkcellError::InvalidArgument(format!(
                "'{}' is not a top-level blackboard value; only whole values can be accessed directly",
                value.value_access_path()
            )));
        }
        Ok((
            value.root_name(),
            value.scope().unwrap_or(self.default_scope.as_str()),
        ))
    }

    pub async fn get(&self, value: &BlackboardValue) -> Result<Any> {
        let (key, scope) = self.target(value)?;
        self.get_key(key, scope).await
    }

    pub async fn get_key(&self, key: &str, scope: &str) -> Result<Any> {
        let entry = self
            .service
            .get_value(GetBlackboardValueRequest {
                key: key.to_string(),
                scope: scope.to_string(),
                operation_name: self.operation_name.clone(),
            })
            .await?;
        entry.value.ok_or_else(|| {
            WorkcellError::NotFound(format!("blackboard key '{}' holds no value", key))
        })
    }

    /// All entries in `scope`, or in the default scope.
    pub async fn list(&self, scope: Option<&str>) -> Result<Vec<BlackboardEntry>> {
        self.service
            .list_values(ListBlackboardValuesRequest {
                scope: scope.unwrap_or(&self.default_scope).to_string(),
                operation_name: self.operation_name.clone(),
            })
            .await
    }

    /// Replace a top-level value. The new value must have the same type URL
    /// as the value currently stored.
    pub async fn update(&self, value: &BlackboardValue, new_value: Any) -> Result<BlackboardEntry> {
        let (key, scope) = self.target(value)?;
        let current = self.get_key(key, scope).await?;
        if current.type_url != new_value.type_url {
            return Err(WorkcellError::TypeMismatch(format!(
                "blackboard key '{}' holds '{}', cannot update with '{}'",
                key, current.type_url, new_value.type_url
            )));
        }
        tracing::debug!(key, scope, operation = %self.operation_name, "Updating blackboard value");
        self.service
            .update_value(UpdateBlackboardValueRequest {
                value: Some(BlackboardEntry {
                    key: key.to_string(),
                    value: Some(new_value),
                    scope: scope.to_string(),
                    operation_name: self.operation_name.clone(),
                }),
            })
            .await
    }

    pub async fn delete(&self, value: &BlackboardValue) -> Result<()> {
        let (key, scope) = self.target(value)?;
        self.service
            .delete_value(DeleteBlackboardValueRequest {
                key: key.to_string(),
                scope: scope.to_string(),
                operation_name: self.operation_name.clone(),
            })
            .await
    }
}

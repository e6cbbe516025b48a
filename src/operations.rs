//! Long-running operation polling

use std::time::Duration;

use crate::error::{Result, RpcCode, WorkcellError};
use crate::proto::operations::{operation, Operation, WaitOperationRequest};
use crate::services::Operations;

/// Server-side wait per poll.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll `operation` until it is done. A terminal error becomes
/// [`WorkcellError::Operation`] carrying the status code and message.
pub async fn wait_for_operation(
    operations: &dyn Operations,
    mut operation: Operation,
    poll_timeout: Duration,
) -> Result<Operation> {
    while !operation.done {
        tracing::info!(operation = %operation.name, "Waiting for operation to finish");
        operation = operations
            .wait_operation(WaitOperationRequest {
                name: operation.name.clone(),
                timeout: Some(prost_types::Duration {
                    seconds: poll_timeout.as_secs() as i64,
                    nanos: poll_timeout.subsec_nanos() as i32,
                }),
            })
            .await?;
    }
    match &operation.result {
        Some(operation::Result::Error(status)) => Err(WorkcellError::Operation {
            code: RpcCode::from_i32(status.code),
            message: status.message.clone(),
        }),
        _ => Ok(operation),
    }
}

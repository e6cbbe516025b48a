//! Unary gRPC calls with retry

use http::uri::PathAndQuery;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::transport::{Channel, Endpoint};
use workcell::retry::{run_with_retry, RetryPolicy};
use workcell::{Result, RpcCode, WorkcellError};

use crate::config::ClientConfig;

/// Converts a gRPC status into the SDK's remote error.
pub fn status_error(status: tonic::Status) -> WorkcellError {
    let details = status.details();
    WorkcellError::Remote {
        code: RpcCode::from_i32(status.code() as i32),
        message: status.message().to_string(),
        details: (!details.is_empty()).then(|| details.to_vec()),
    }
}

/// Lazily connected channel to one service address.
#[derive(Clone)]
pub struct RpcChannel {
    grpc: Grpc<Channel>,
    retry: RetryPolicy,
}

impl RpcChannel {
    /// The connection is established on first use.
    pub fn connect(address: &str, config: &ClientConfig) -> Result<Self> {
        let endpoint = Endpoint::from_shared(address.to_string())
            .map_err(|e| WorkcellError::Config(format!("Invalid address '{}': {}", address, e)))?
            .connect_timeout(config.connect_timeout());
        Ok(Self {
            grpc: Grpc::new(endpoint.connect_lazy()),
            retry: config.retry_policy(),
        })
    }

    /// Channel for `service`, honoring endpoint overrides.
    pub fn for_service(service: &str, config: &ClientConfig) -> Result<Self> {
        Self::connect(config.endpoint(service), config)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Calls `path` (e.g. `/workcell_proto.skills.SkillRegistry/GetSkills`)
    /// and retries transient failures.
    pub async fn unary<Req, Resp>(&self, path: &'static str, request: Req) -> Result<Resp>
    where
        Req: prost::Message + Clone + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        run_with_retry(&self.retry, path, || {
            let mut grpc = self.grpc.clone();
            let request = request.clone();
            async move {
                grpc.ready().await.map_err(|e| {
                    WorkcellError::remote(RpcCode::Unavailable, format!("{}: {}", path, e))
                })?;
                let codec: ProstCodec<Req, Resp> = ProstCodec::default();
                let response = grpc
                    .unary(
                        tonic::Request::new(request),
                        PathAndQuery::from_static(path),
                        codec,
                    )
                    .await
                    .map_err(status_error)?;
                Ok(response.into_inner())
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_conversion() {
        let err = status_error(tonic::Status::not_found("no such skill"));
        assert!(err.is_not_found());
        match err {
            WorkcellError::Remote {
                code,
                message,
                details,
            } => {
                assert_eq!(code, RpcCode::NotFound);
                assert_eq!(message, "no such skill");
                assert!(details.is_none());
            }
            other => panic!("unexpected error {:?}", other),
        }

        let with_details = tonic::Status::with_details(
            tonic::Code::Unavailable,
            "down",
            vec![1, 2, 3].into(),
        );
        match status_error(with_details) {
            WorkcellError::Remote { code, details, .. } => {
                assert_eq!(code, RpcCode::Unavailable);
                assert_eq!(details, Some(vec![1, 2, 3]));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_rejects_invalid_address() {
        let err = RpcChannel::connect("not a uri", &ClientConfig::default()).err().unwrap();
        assert!(matches!(err, WorkcellError::Config(_)));
    }
}

//! gRPC coordinator gateway
//!
//! Speaks the `dtx.TransactionService` defined in `proto/dtx.proto`. One lazily
//! connected channel is kept per endpoint; calls rotate across them through
//! the shared [`EndpointSelector`]. Transaction snapshots arrive as JSON
//! documents and decode into the same model the HTTP gateway returns.

pub mod proto {
    include!("generated/dtx.rs");
}

use async_trait::async_trait;
use chrono::DateTime;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::Endpoint;
use tonic::{Code, Request, Status};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use self::proto::transaction_service_client::TransactionServiceClient;
use super::{cancellable, CoordinatorGateway, EndpointSelector};
use crate::config::ClientConfig;
use crate::error::{ErrorCode, Result, TransactionError};
use crate::model::{HealthStatus, TransactionInfo, TransactionMode, TransactionStatus};

/// Coordinator gateway over gRPC
#[derive(Debug)]
pub struct GrpcGateway {
    clients: Vec<TransactionServiceClient>,
    selector: EndpointSelector,
    auth: Option<MetadataValue<Ascii>>,
}

impl GrpcGateway {
    /// Build a gateway from `config.grpc_endpoints`. Channels connect on first
    /// use, so this must run inside a Tokio runtime but needs no reachable
    /// coordinator.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let selector = EndpointSelector::new(
            config
                .grpc_endpoints
                .iter()
                .map(|e| normalize_endpoint(e))
                .collect(),
        )?;

        let mut clients = Vec::with_capacity(selector.len());
        for endpoint in selector.endpoints() {
            let channel = Endpoint::from_shared(endpoint.clone())
                .map_err(|e| {
                    TransactionError::Config(format!("invalid gRPC endpoint {}: {}", endpoint, e))
                })?
                .connect_timeout(config.connect_timeout)
                .timeout(config.request_timeout)
                .connect_lazy();
            clients.push(TransactionServiceClient::new(channel));
        }

        let auth = match &config.auth_token {
            Some(token) => Some(
                format!("Bearer {}", token)
                    .parse::<MetadataValue<Ascii>>()
                    .map_err(|e| TransactionError::Config(format!("invalid auth token: {}", e)))?,
            ),
            None => None,
        };

        Ok(GrpcGateway {
            clients,
            selector,
            auth,
        })
    }

    pub fn selector(&self) -> &EndpointSelector {
        &self.selector
    }

    fn client(&self) -> TransactionServiceClient {
        self.clients[self.selector.next_index()].clone()
    }

    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(auth) = &self.auth {
            request.metadata_mut().insert("authorization", auth.clone());
        }
        request
    }
}

/// Turn a configured address into a URI tonic can dial. Bare `host:port`
/// and `grpc://` addresses are served over plaintext HTTP/2.
pub(crate) fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if let Some(rest) = endpoint.strip_prefix("grpc://") {
        format!("http://{}", rest)
    } else if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else if endpoint.is_empty() {
        String::new()
    } else {
        format!("http://{}", endpoint)
    }
}

/// Map a gRPC status onto the client's error taxonomy. Unavailable means the
/// call never reached a coordinator that could answer it.
pub(crate) fn error_from_status(status: Status) -> TransactionError {
    let code = match status.code() {
        Code::Unavailable | Code::Cancelled => return TransactionError::Rpc(status),
        Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange | Code::AlreadyExists => {
            ErrorCode::InvalidRequest
        }
        Code::NotFound => ErrorCode::TransactionNotFound,
        Code::DeadlineExceeded => ErrorCode::Timeout,
        Code::Internal | Code::Unknown | Code::DataLoss | Code::ResourceExhausted | Code::Aborted => {
            ErrorCode::ServerError
        }
        other => ErrorCode::Unknown(format!("GRPC_{:?}", other).to_uppercase()),
    };
    TransactionError::application(code, status.message())
}

fn decode_info(json: &[u8]) -> Result<TransactionInfo> {
    Ok(serde_json::from_slice(json)?)
}

#[async_trait]
impl CoordinatorGateway for GrpcGateway {
    async fn start_global(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        mode: TransactionMode,
        payload: &[u8],
    ) -> Result<String> {
        debug!(gid, mode = %mode, "gRPC start global");
        let request = self.request(proto::StartGlobalRequest {
            gid: gid.to_string(),
            mode: mode.as_str().to_string(),
            payload: payload.to_vec(),
        });
        let mut client = self.client();
        cancellable(cancel, async move {
            let reply = client.start_global(request).await.map_err(error_from_status)?;
            Ok(reply.into_inner().gid)
        })
        .await
    }

    async fn add_branch(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
        action: &str,
    ) -> Result<()> {
        let request = self.request(proto::AddBranchRequest {
            gid: gid.to_string(),
            branch_id: branch_id.to_string(),
            action: action.to_string(),
        });
        let mut client = self.client();
        cancellable(cancel, async move {
            client.add_branch(request).await.map_err(error_from_status)?;
            Ok(())
        })
        .await
    }

    async fn submit(&self, cancel: &CancellationToken, gid: &str) -> Result<()> {
        let request = self.request(proto::SubmitRequest {
            gid: gid.to_string(),
        });
        let mut client = self.client();
        cancellable(cancel, async move {
            client.submit(request).await.map_err(error_from_status)?;
            Ok(())
        })
        .await
    }

    async fn abort(&self, cancel: &CancellationToken, gid: &str) -> Result<()> {
        let request = self.request(proto::AbortRequest {
            gid: gid.to_string(),
        });
        let mut client = self.client();
        cancellable(cancel, async move {
            client.abort(request).await.map_err(error_from_status)?;
            Ok(())
        })
        .await
    }

    async fn try_branch(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
        action: &str,
        payload: &[u8],
    ) -> Result<()> {
        let request = self.request(proto::BranchTryRequest {
            gid: gid.to_string(),
            branch_id: branch_id.to_string(),
            action: action.to_string(),
            payload: payload.to_vec(),
        });
        let mut client = self.client();
        cancellable(cancel, async move {
            client.branch_try(request).await.map_err(error_from_status)?;
            Ok(())
        })
        .await
    }

    async fn confirm_branch(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
    ) -> Result<()> {
        let request = self.request(branch_state(gid, branch_id));
        let mut client = self.client();
        cancellable(cancel, async move {
            client.branch_confirm(request).await.map_err(error_from_status)?;
            Ok(())
        })
        .await
    }

    async fn cancel_branch(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
    ) -> Result<()> {
        let request = self.request(branch_state(gid, branch_id));
        let mut client = self.client();
        cancellable(cancel, async move {
            client.branch_cancel(request).await.map_err(error_from_status)?;
            Ok(())
        })
        .await
    }

    async fn branch_succeed(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
    ) -> Result<()> {
        let request = self.request(branch_state(gid, branch_id));
        let mut client = self.client();
        cancellable(cancel, async move {
            client.branch_succeed(request).await.map_err(error_from_status)?;
            Ok(())
        })
        .await
    }

    async fn branch_fail(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
    ) -> Result<()> {
        let request = self.request(branch_state(gid, branch_id));
        let mut client = self.client();
        cancellable(cancel, async move {
            client.branch_fail(request).await.map_err(error_from_status)?;
            Ok(())
        })
        .await
    }

    async fn get_transaction(
        &self,
        cancel: &CancellationToken,
        gid: &str,
    ) -> Result<TransactionInfo> {
        let request = self.request(proto::GetRequest {
            gid: gid.to_string(),
        });
        let mut client = self.client();
        cancellable(cancel, async move {
            let reply = client.get(request).await.map_err(error_from_status)?;
            decode_info(&reply.into_inner().txn_json)
        })
        .await
    }

    async fn list_transactions(
        &self,
        cancel: &CancellationToken,
        limit: u32,
        offset: u32,
        status: Option<&TransactionStatus>,
    ) -> Result<Vec<TransactionInfo>> {
        let request = self.request(proto::ListRequest {
            limit,
            offset,
            status: status.map(|s| s.as_str().to_string()).unwrap_or_default(),
        });
        let mut client = self.client();
        cancellable(cancel, async move {
            let reply = client.list(request).await.map_err(error_from_status)?;
            reply
                .into_inner()
                .txn_json
                .iter()
                .map(|json| decode_info(json))
                .collect()
        })
        .await
    }

    async fn health(&self, cancel: &CancellationToken) -> Result<HealthStatus> {
        let request = self.request(proto::HealthRequest {});
        let mut client = self.client();
        cancellable(cancel, async move {
            let reply = client.health(request).await.map_err(error_from_status)?;
            let reply = reply.into_inner();
            Ok(HealthStatus {
                status: reply.status,
                timestamp: (reply.timestamp_unix > 0)
                    .then(|| DateTime::from_timestamp(reply.timestamp_unix, 0))
                    .flatten(),
            })
        })
        .await
    }

    async fn metrics(&self, cancel: &CancellationToken) -> Result<String> {
        let request = self.request(proto::MetricsRequest {});
        let mut client = self.client();
        cancellable(cancel, async move {
            let reply = client.metrics(request).await.map_err(error_from_status)?;
            Ok(reply.into_inner().text)
        })
        .await
    }
}

fn branch_state(gid: &str, branch_id: &str) -> proto::BranchStateRequest {
    proto::BranchStateRequest {
        gid: gid.to_string(),
        branch_id: branch_id.to_string(),
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{cancellable, CoordinatorGateway, EndpointSelector};
use crate::config::ClientConfig;
use crate::error::{ErrorCode, Result, TransactionError};
use crate::model::{HealthStatus, TransactionInfo, TransactionMode, TransactionStatus};
use crate::utils::serialization::encode_payload;

#[derive(Serialize)]
struct StartRequest<'a> {
    gid: &'a str,
    mode: TransactionMode,
    payload: String,
}

#[derive(Deserialize)]
struct StartReply {
    gid: String,
}

#[derive(Serialize)]
struct GidRequest<'a> {
    gid: &'a str,
}

#[derive(Serialize)]
struct BranchRequest<'a> {
    gid: &'a str,
    branch_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
}

/// Structured failure body sent by the coordinator with non-2xx replies.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    error: String,
    #[serde(default)]
    details: Option<String>,
}

/// Gateway speaking the coordinator's JSON-over-HTTP API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    selector: Arc<EndpointSelector>,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let selector = Arc::new(EndpointSelector::new(config.http_endpoints.clone())?);
        Self::with_selector(config, selector)
    }

    /// Build a gateway that draws endpoints from an existing selector.
    pub fn with_selector(config: &ClientConfig, selector: Arc<EndpointSelector>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| TransactionError::Config(format!("invalid auth token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .default_headers(headers)
            .build()
            .map_err(|e| TransactionError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(HttpGateway { client, selector })
    }

    pub fn selector(&self) -> &EndpointSelector {
        &self.selector
    }

    /// Join path segments onto the next endpoint; segments are percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let base = self.selector.next();
        let mut url = Url::parse(base)
            .map_err(|e| TransactionError::Config(format!("invalid endpoint {}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| TransactionError::Config(format!("endpoint {} cannot be a base URL", base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.url(segments)?;
        debug!(%method, %url, "coordinator request");
        Ok(self.client.request(method, url))
    }

    async fn send(&self, cancel: &CancellationToken, builder: RequestBuilder) -> Result<Response> {
        cancellable(cancel, async {
            let response = builder.send().await?;
            check_status(response).await
        })
        .await
    }

    async fn post(&self, cancel: &CancellationToken, segments: &[&str], body: &impl Serialize) -> Result<()> {
        let builder = self.request(Method::POST, segments)?.json(body);
        self.send(cancel, builder).await.map(|_| ())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        builder: RequestBuilder,
    ) -> Result<T> {
        cancellable(cancel, async {
            let response = builder.send().await?;
            let response = check_status(response).await?;
            let bytes = response.bytes().await?;
            Ok(serde_json::from_slice(&bytes)?)
        })
        .await
    }
}

/// Turn a non-2xx reply into an application error.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(error_from_reply(status.as_u16(), &body))
}

fn error_from_reply(status: u16, body: &str) -> TransactionError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.code.is_empty() => TransactionError::Application {
            code: ErrorCode::parse(&parsed.code),
            message: parsed.error,
            details: parsed.details,
        },
        _ => {
            let message = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body.trim().to_string()
            };
            TransactionError::application(ErrorCode::from_http_status(status), message)
        }
    }
}

#[async_trait]
impl CoordinatorGateway for HttpGateway {
    async fn start_global(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        mode: TransactionMode,
        payload: &[u8],
    ) -> Result<String> {
        let body = StartRequest {
            gid,
            mode,
            payload: encode_payload(payload),
        };
        let builder = self.request(Method::POST, &["api", "start"])?.json(&body);
        let reply: StartReply = self.get_json(cancel, builder).await?;
        Ok(reply.gid)
    }

    async fn add_branch(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
        action: &str,
    ) -> Result<()> {
        let body = BranchRequest {
            gid,
            branch_id,
            action: Some(action),
            payload: None,
        };
        self.post(cancel, &["api", "branch", "add"], &body).await
    }

    async fn submit(&self, cancel: &CancellationToken, gid: &str) -> Result<()> {
        self.post(cancel, &["api", "submit"], &GidRequest { gid }).await
    }

    async fn abort(&self, cancel: &CancellationToken, gid: &str) -> Result<()> {
        self.post(cancel, &["api", "abort"], &GidRequest { gid }).await
    }

    async fn try_branch(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
        action: &str,
        payload: &[u8],
    ) -> Result<()> {
        let body = BranchRequest {
            gid,
            branch_id,
            action: Some(action),
            payload: Some(encode_payload(payload)),
        };
        self.post(cancel, &["api", "branch", "try"], &body).await
    }

    async fn confirm_branch(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
    ) -> Result<()> {
        let body = BranchRequest {
            gid,
            branch_id,
            action: None,
            payload: None,
        };
        self.post(cancel, &["api", "branch", "confirm"], &body).await
    }

    async fn cancel_branch(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
    ) -> Result<()> {
        let body = BranchRequest {
            gid,
            branch_id,
            action: None,
            payload: None,
        };
        self.post(cancel, &["api", "branch", "cancel"], &body).await
    }

    async fn branch_succeed(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
    ) -> Result<()> {
        let body = BranchRequest {
            gid,
            branch_id,
            action: None,
            payload: None,
        };
        self.post(cancel, &["api", "branch", "succeed"], &body).await
    }

    async fn branch_fail(
        &self,
        cancel: &CancellationToken,
        gid: &str,
        branch_id: &str,
    ) -> Result<()> {
        let body = BranchRequest {
            gid,
            branch_id,
            action: None,
            payload: None,
        };
        self.post(cancel, &["api", "branch", "fail"], &body).await
    }

    async fn get_transaction(
        &self,
        cancel: &CancellationToken,
        gid: &str,
    ) -> Result<TransactionInfo> {
        let builder = self.request(Method::GET, &["api", "tx", gid])?;
        self.get_json(cancel, builder).await
    }

    async fn list_transactions(
        &self,
        cancel: &CancellationToken,
        limit: u32,
        offset: u32,
        status: Option<&TransactionStatus>,
    ) -> Result<Vec<TransactionInfo>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if limit > 0 {
            query.push(("limit", limit.to_string()));
        }
        if offset > 0 {
            query.push(("offset", offset.to_string()));
        }
        if let Some(status) = status {
            query.push(("status", status.as_str().to_string()));
        }

        let builder = self.request(Method::GET, &["api", "tx"])?.query(&query);
        self.get_json(cancel, builder).await
    }

    async fn health(&self, cancel: &CancellationToken) -> Result<HealthStatus> {
        let builder = self.request(Method::GET, &["health"])?;
        self.get_json(cancel, builder).await
    }

    async fn metrics(&self, cancel: &CancellationToken) -> Result<String> {
        let builder = self.request(Method::GET, &["metrics"])?;
        cancellable(cancel, async {
            let response = builder.send().await?;
            let response = check_status(response).await?;
            Ok(response.text().await?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned HTTP reply and hand back the raw request text.
    async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let reply = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });

        (format!("http://{}", addr), handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        request.len() >= header_end + 4 + content_length
    }

    fn gateway(endpoint: String, token: Option<&str>) -> HttpGateway {
        let config = ClientConfig {
            http_endpoints: vec![endpoint],
            auth_token: token.map(str::to_string),
            ..ClientConfig::default()
        };
        HttpGateway::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_start_global_sends_base64_payload_and_auth() {
        let (endpoint, server) = serve_once("200 OK", r#"{"gid":"server-gid"}"#).await;
        let gateway = gateway(endpoint, Some("secret"));
        let cancel = CancellationToken::new();

        let gid = gateway
            .start_global(&cancel, "client-gid", TransactionMode::Saga, b"{\"order_id\":\"1\"}")
            .await
            .unwrap();
        assert_eq!(gid, "server-gid");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/start "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer secret"));
        assert!(request.contains(r#""mode":"saga""#));
        assert!(request.contains(r#""payload":"eyJvcmRlcl9pZCI6IjEifQ==""#));
    }

    #[tokio::test]
    async fn test_structured_error_body_is_decoded() {
        let (endpoint, _server) = serve_once(
            "404 Not Found",
            r#"{"code":"TRANSACTION_NOT_FOUND","error":"no such transaction","details":"gid=x"}"#,
        )
        .await;
        let gateway = gateway(endpoint, None);

        let err = gateway
            .get_transaction(&CancellationToken::new(), "x")
            .await
            .unwrap_err();
        match err {
            TransactionError::Application { code, message, details } => {
                assert_eq!(code, ErrorCode::TransactionNotFound);
                assert_eq!(message, "no such transaction");
                assert_eq!(details.as_deref(), Some("gid=x"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unstructured_error_uses_http_status() {
        let (endpoint, _server) = serve_once("503 Service Unavailable", "overloaded").await;
        let gateway = gateway(endpoint, None);

        let err = gateway
            .submit(&CancellationToken::new(), "g1")
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(&ErrorCode::Unavailable));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_gid_is_escaped_in_path() {
        let body = r#"{"gid":"a/b","mode":"tcc","status":"SUBMITTED","payload":"","branches":[]}"#;
        let (endpoint, server) = serve_once("200 OK", body).await;
        let gateway = gateway(endpoint, None);

        let info = gateway
            .get_transaction(&CancellationToken::new(), "a/b")
            .await
            .unwrap();
        assert_eq!(info.gid, "a/b");
        assert_eq!(info.mode, TransactionMode::Tcc);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/tx/a%2Fb "));
    }

    #[tokio::test]
    async fn test_list_query_omits_defaults() {
        let (endpoint, server) = serve_once("200 OK", "[]").await;
        let gateway = gateway(endpoint, None);

        let list = gateway
            .list_transactions(
                &CancellationToken::new(),
                10,
                0,
                Some(&TransactionStatus::Committed),
            )
            .await
            .unwrap();
        assert!(list.is_empty());

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/tx?limit=10&status=COMMITTED "));
    }

    #[tokio::test]
    async fn test_cancelled_call_is_not_a_transport_error() {
        // The listener never accepts, so only cancellation can end the call.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let gateway = gateway(endpoint, None);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = gateway.health(&cancel).await.unwrap_err();
        assert!(matches!(err, TransactionError::Cancelled));
        drop(listener);
    }

    #[tokio::test]
    async fn test_refused_connection_keeps_http_source() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let gateway = gateway(endpoint, None);

        let err = gateway
            .submit(&CancellationToken::new(), "g1")
            .await
            .unwrap_err();

        assert!(matches!(err, TransactionError::Http(_)));
        assert!(err.is_retryable());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_error_from_reply_without_body() {
        let err = error_from_reply(500, "");
        assert_eq!(err.code(), Some(&ErrorCode::ServerError));
        assert!(err.to_string().contains("HTTP 500"));
    }
}

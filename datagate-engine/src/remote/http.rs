//! HTTP transport to the remote data service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use datagate_core::{
    RemoteError, RemoteResult, SourceId, SpecificDataRequest, SpecificDataResponse,
};

use super::RemoteTransport;

/// Header carrying the caller identity to the remote service.
pub const SOURCE_ID_HEADER: &str = "X-Source-Id";

/// POSTs the request JSON to `{base_url}/{operation}`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport whose client-side deadline matches `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unknown {
                reason: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/{}", self.base_url, operation.trim_start_matches('/'))
    }

    fn classify(&self, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout {
                after: self.timeout,
            }
        } else if let Some(status) = err.status().and_then(|s| RemoteError::from_status(s.as_u16())) {
            status
        } else {
            RemoteError::Unknown {
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl RemoteTransport for HttpTransport {
    async fn send(
        &self,
        request: &SpecificDataRequest,
        source_id: &SourceId,
        operation: &str,
    ) -> RemoteResult<SpecificDataResponse> {
        let response = self
            .client
            .post(self.endpoint(operation))
            .header(SOURCE_ID_HEADER, source_id.as_str())
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                RemoteError::from_status(status.as_u16()).unwrap_or_else(|| RemoteError::Unknown {
                    reason: format!("Unexpected status {}", status),
                }),
            );
        }

        response
            .json::<SpecificDataResponse>()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteError::Timeout {
                        after: self.timeout,
                    }
                } else {
                    RemoteError::Unknown {
                        reason: format!("Invalid response body: {}", e),
                    }
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn spawn_remote() -> String {
        async fn ok(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
            let source = headers
                .get(SOURCE_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            Json(json!({ "data": { "source": source, "echo": body } }))
        }
        async fn unavailable() -> StatusCode {
            StatusCode::SERVICE_UNAVAILABLE
        }
        async fn not_found() -> StatusCode {
            StatusCode::NOT_FOUND
        }
        async fn slow() -> Json<Value> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Json(json!({ "data": null }))
        }
        async fn garbage() -> &'static str {
            "not json"
        }

        let app = Router::new()
            .route("/specific-data", post(ok))
            .route("/down", post(unavailable))
            .route("/missing", post(not_found))
            .route("/slow", post(slow))
            .route("/garbage", post(garbage));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn send(transport: &HttpTransport, operation: &str) -> RemoteResult<SpecificDataResponse> {
        transport
            .send(
                &SpecificDataRequest::new("quote").with_param("id", json!(1)),
                &SourceId::new("billing"),
                operation,
            )
            .await
    }

    #[tokio::test]
    async fn test_success_carries_source_and_body() {
        let base = spawn_remote().await;
        let transport = HttpTransport::new(format!("{}/", base), Duration::from_secs(2)).unwrap();

        let response = send(&transport, "specific-data").await.unwrap();
        assert_eq!(response.data["source"], json!("billing"));
        assert_eq!(response.data["echo"]["dataType"], json!("quote"));
        assert_eq!(response.data["echo"]["params"]["id"], json!(1));
    }

    #[tokio::test]
    async fn test_status_classification() {
        let base = spawn_remote().await;
        let transport = HttpTransport::new(base, Duration::from_secs(2)).unwrap();

        assert_eq!(
            send(&transport, "down").await,
            Err(RemoteError::Server { status: 503 })
        );
        assert_eq!(
            send(&transport, "missing").await,
            Err(RemoteError::Client { status: 404 })
        );
        assert!(matches!(
            send(&transport, "garbage").await,
            Err(RemoteError::Unknown { .. })
        ));
    }

    #[tokio::test]
    async fn test_client_timeout_classified() {
        let base = spawn_remote().await;
        let transport = HttpTransport::new(base, Duration::from_millis(50)).unwrap();
        assert!(matches!(
            send(&transport, "slow").await,
            Err(RemoteError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unknown() {
        let transport = HttpTransport::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        assert!(matches!(
            send(&transport, "specific-data").await,
            Err(RemoteError::Unknown { .. })
        ));
    }
}

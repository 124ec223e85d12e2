//! `HttpTransport` speaking HTTP/1.1 over a unix domain socket
//!
//! Used for the Docker Engine API, which listens on `/var/run/docker.sock`.
//! Request URLs keep their usual `http://localhost/...` form; only the path
//! and query are sent, the host is ignored.

use atk_core::{HttpRequest, HttpResponse, HttpTransport, RequestBody, TransportError};
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;
use tracing::debug;

/// One connection per request over a unix socket
#[derive(Debug, Clone)]
pub struct UnixSocketTransport {
    socket_path: PathBuf,
    timeout: Duration,
}

impl UnixSocketTransport {
    pub fn new(socket_path: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let target = request_target(&request)?;
        let has_content_type = request.header_value("content-type").is_some();

        let (content_type, body) = match request.body {
            RequestBody::Empty => (None, Vec::new()),
            RequestBody::Json(value) => (
                Some("application/json".to_string()),
                value.to_string().into_bytes(),
            ),
            RequestBody::Form(fields) => (
                Some("application/x-www-form-urlencoded".to_string()),
                form_encode(&fields)?.into_bytes(),
            ),
            RequestBody::Raw {
                content_type,
                bytes,
            } => (content_type, bytes),
        };

        let mut builder = hyper::Request::builder()
            .method(request.method.as_str())
            .uri(target.as_str())
            .header(hyper::header::HOST, "localhost");

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(ct) = content_type.filter(|_| !has_content_type) {
            builder = builder.header(hyper::header::CONTENT_TYPE, ct);
        }

        if let Some(auth) = &request.basic_auth {
            let credentials = format!(
                "{}:{}",
                auth.username,
                auth.password.as_deref().unwrap_or("")
            );
            let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
            builder = builder.header(hyper::header::AUTHORIZATION, format!("Basic {}", encoded));
        }

        let http_request = builder
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        debug!(
            socket = %self.socket_path.display(),
            method = %request.method,
            target = %target,
            "Sending request over unix socket"
        );

        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            TransportError::Connect(format!("{}: {}", self.socket_path.display(), e))
        })?;

        let (mut sender, connection) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "Unix socket connection closed with error");
            }
        });

        let response = sender
            .send_request(http_request)
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_ascii_lowercase(), v.to_str().unwrap_or("").to_string()))
            .collect();

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?
            .to_bytes();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for UnixSocketTransport {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        tokio::time::timeout(self.timeout, self.send(request))
            .await
            .map_err(|_| {
                TransportError::Timeout(format!("no response within {}s", self.timeout.as_secs()))
            })?
    }
}

/// Path plus query (existing and appended parameters) of the request URL
fn request_target(request: &HttpRequest) -> Result<String, TransportError> {
    let mut url = reqwest::Url::parse(&request.url)
        .map_err(|e| TransportError::InvalidRequest(format!("{}: {}", request.url, e)))?;

    if !request.query.is_empty() {
        url.query_pairs_mut().extend_pairs(request.query.iter());
    }

    Ok(match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    })
}

fn form_encode(fields: &[(String, String)]) -> Result<String, TransportError> {
    let mut url = reqwest::Url::parse("http://localhost/")
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
    url.query_pairs_mut().extend_pairs(fields.iter());
    Ok(url.query().unwrap_or_default().to_string())
}

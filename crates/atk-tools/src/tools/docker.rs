//! Docker Tools
//!
//! Manage containers and images through the Docker Engine API. In
//! production the adapter is wired to a `UnixSocketTransport` on the daemon
//! socket; URLs use the placeholder host `localhost`.
//!
//! ## Available Tools
//!
//! - `docker_list_containers` - List containers
//! - `docker_run_container` - Create and start a container
//! - `docker_stop_container` - Stop a running container
//! - `docker_remove_container` - Remove a container
//! - `docker_container_logs` - Tail container logs
//! - `docker_list_images` - List local images
//! - `docker_pull_image` - Pull an image from a registry
//!
//! Every operation returns a structured result (`success`, fields, `error`).

use atk_core::{
    AtkResult, Envelope, FailureContract, HttpMethod, HttpRequest, HttpResponse, HttpTransport,
    Outcome, ToolConfig, ToolInput, ToolResult, ToolType,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::common::{
    clamp, create_schema, decode, describe, failure, fetch_json, flag, null_default,
    path_segment, status_reason, tool_config,
};
use crate::adapter::{unknown_operation, Adapter};
use crate::registry::ToolCategory;

pub const DEFAULT_SOCKET_PATH: &str = "/var/run/docker.sock";
pub const DEFAULT_API_VERSION: &str = "v1.43";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_socket_path() -> String {
    DEFAULT_SOCKET_PATH.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            api_version: default_api_version(),
        }
    }
}

pub struct Docker {
    config: DockerConfig,
    transport: Arc<dyn HttpTransport>,
}

// ============================================================================
// Parameters
// ============================================================================

fn default_false() -> String {
    "false".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListContainersParams {
    #[serde(default = "default_false")]
    pub all: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunContainerParams {
    pub image: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Host port -> container port (`"8080": "80"`, `"5353": "53/udp"`)
    #[serde(default)]
    pub ports: BTreeMap<String, String>,
    /// Host path -> container path
    #[serde(default)]
    pub volumes: BTreeMap<String, String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopContainerParams {
    pub container: String,
    #[serde(default = "default_stop_timeout")]
    pub timeout: i64,
}

fn default_stop_timeout() -> i64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveContainerParams {
    pub container: String,
    #[serde(default = "default_false")]
    pub force: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerLogsParams {
    pub container: String,
    #[serde(default = "default_tail")]
    pub tail: i64,
}

fn default_tail() -> i64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullImageParams {
    pub image: String,
    #[serde(default = "default_tag")]
    pub tag: String,
}

fn default_tag() -> String {
    "latest".to_string()
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct WirePort {
    #[serde(rename = "IP", deserialize_with = "null_default")]
    ip: String,
    private_port: u64,
    public_port: u64,
    #[serde(deserialize_with = "null_default")]
    r#type: String,
}

impl WirePort {
    fn render(&self) -> String {
        let proto = if self.r#type.is_empty() { "tcp" } else { &self.r#type };
        if self.public_port == 0 {
            format!("{}/{}", self.private_port, proto)
        } else if self.ip.is_empty() {
            format!("{}->{}/{}", self.public_port, self.private_port, proto)
        } else {
            format!(
                "{}:{}->{}/{}",
                self.ip, self.public_port, self.private_port, proto
            )
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct WireContainer {
    #[serde(deserialize_with = "null_default")]
    id: String,
    #[serde(deserialize_with = "null_default")]
    names: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    image: String,
    #[serde(deserialize_with = "null_default")]
    state: String,
    #[serde(deserialize_with = "null_default")]
    status: String,
    #[serde(deserialize_with = "null_default")]
    ports: Vec<WirePort>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    pub state: String,
    pub status: String,
    pub ports: Vec<String>,
}

impl From<WireContainer> for ContainerSummary {
    fn from(container: WireContainer) -> Self {
        Self {
            id: short_id(&container.id),
            names: container
                .names
                .iter()
                .map(|n| n.trim_start_matches('/').to_string())
                .collect(),
            image: container.image,
            state: container.state,
            status: container.status,
            ports: container.ports.iter().map(WirePort::render).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContainerList {
    pub containers: Vec<ContainerSummary>,
    pub count: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct CreateResponse {
    #[serde(deserialize_with = "null_default")]
    id: String,
    #[serde(deserialize_with = "null_default")]
    warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunResult {
    pub id: String,
    pub name: String,
    pub image: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StopResult {
    pub container: String,
    pub stopped: bool,
    /// The container was not running
    pub already_stopped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemoveResult {
    pub container: String,
    pub removed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContainerLogs {
    pub container: String,
    pub logs: String,
    pub line_count: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct WireImage {
    #[serde(deserialize_with = "null_default")]
    id: String,
    #[serde(deserialize_with = "null_default")]
    repo_tags: Vec<String>,
    size: u64,
    created: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageSummary {
    pub id: String,
    pub tags: Vec<String>,
    pub size: u64,
    /// Unix timestamp
    pub created: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageList {
    pub images: Vec<ImageSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PullResult {
    pub image: String,
    /// Last status line reported by the daemon
    pub status: String,
}

fn upstream_error(body: &Value) -> Option<String> {
    body.get("message").and_then(describe)
}

fn short_id(id: &str) -> String {
    id.trim_start_matches("sha256:").chars().take(12).collect()
}

/// `80` means `80/tcp`
fn container_port(port: &str) -> String {
    if port.contains('/') {
        port.to_string()
    } else {
        format!("{}/tcp", port)
    }
}

/// Body of `POST /containers/create`; empty sections are omitted
pub fn create_payload(params: &RunContainerParams) -> Value {
    let mut payload = json!({ "Image": params.image });

    if !params.env.is_empty() {
        let env: Vec<String> = params
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        payload["Env"] = json!(env);
    }

    if !params.command.is_empty() {
        payload["Cmd"] = json!(params.command);
    }

    let mut host_config = Map::new();

    if !params.ports.is_empty() {
        let mut exposed = Map::new();
        let mut bindings = Map::new();
        for (host_port, port) in &params.ports {
            let port = container_port(port);
            exposed.insert(port.clone(), json!({}));
            bindings.insert(port, json!([{ "HostPort": host_port }]));
        }
        payload["ExposedPorts"] = Value::Object(exposed);
        host_config.insert("PortBindings".to_string(), Value::Object(bindings));
    }

    if !params.volumes.is_empty() {
        let binds: Vec<String> = params
            .volumes
            .iter()
            .map(|(host, container)| format!("{}:{}", host, container))
            .collect();
        host_config.insert("Binds".to_string(), json!(binds));
    }

    if !host_config.is_empty() {
        payload["HostConfig"] = Value::Object(host_config);
    }

    payload
}

/// Split a multiplexed log stream (8-byte frame headers) into text.
///
/// TTY containers stream raw text without headers; that is passed through.
pub fn demux_logs(bytes: &[u8]) -> String {
    let is_multiplexed =
        bytes.len() >= 8 && bytes[0] <= 2 && bytes[1] == 0 && bytes[2] == 0 && bytes[3] == 0;
    if !is_multiplexed {
        return String::from_utf8_lossy(bytes).into_owned();
    }

    let mut out = Vec::with_capacity(bytes.len());
    let mut rest = bytes;
    while rest.len() >= 8 {
        let size = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let end = (8 + size).min(rest.len());
        out.extend_from_slice(&rest[8..end]);
        rest = &rest[end..];
    }
    String::from_utf8_lossy(&out).into_owned()
}

impl Docker {
    pub fn new(config: DockerConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &DockerConfig {
        &self.config
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(
            method,
            format!(
                "http://localhost/{}/{}",
                self.config.api_version,
                path.trim_start_matches('/')
            ),
        )
    }

    async fn call<T: DeserializeOwned + Default>(
        &self,
        action: &str,
        request: HttpRequest,
    ) -> Outcome<T> {
        let body = fetch_json(self.transport.as_ref(), request, upstream_error)
            .await
            .map_err(|e| failure(action, &e))?;
        decode(body).map_err(|e| failure(action, &e))
    }

    /// For endpoints answering 204/304 with an empty body
    async fn send(&self, action: &str, request: HttpRequest) -> Outcome<HttpResponse> {
        let response = self
            .transport
            .request(request)
            .await
            .map_err(|e| failure(action, &e.to_string()))?;

        if response.is_success() || response.status_code() == 304 {
            return Ok(response);
        }

        let body = response.to_json().unwrap_or(Value::Null);
        let reason = upstream_error(&body).unwrap_or_else(|| status_reason(&response));
        Err(failure(action, &reason))
    }

    pub async fn list_containers(&self, params: ListContainersParams) -> Envelope<ContainerList> {
        let request = self
            .request(HttpMethod::Get, "containers/json")
            .query("all", flag(&params.all));

        self.call::<Vec<WireContainer>>("listing containers", request)
            .await
            .map(|containers| {
                let containers: Vec<ContainerSummary> =
                    containers.into_iter().map(ContainerSummary::from).collect();
                ContainerList {
                    count: containers.len(),
                    containers,
                }
            })
            .into()
    }

    /// Create then start; the only operation that makes two calls
    pub async fn run_container(&self, params: RunContainerParams) -> Envelope<RunResult> {
        const ACTION: &str = "running container";

        let payload = create_payload(&params);
        let name = params.name.filter(|n| !n.is_empty());

        debug!(image = %params.image, name = ?name, "Creating container");

        let request = self
            .request(HttpMethod::Post, "containers/create")
            .query_opt("name", name.as_deref())
            .json(payload);

        let created: CreateResponse = match self.call(ACTION, request).await {
            Ok(created) => created,
            Err(e) => return Envelope::failed(e),
        };
        if created.id.is_empty() {
            return Envelope::failed(failure(ACTION, "daemon returned no container ID"));
        }

        debug!(id = %created.id, "Starting container");

        let start = self.request(
            HttpMethod::Post,
            &format!("containers/{}/start", path_segment(&created.id)),
        );
        if let Err(e) = self.send(ACTION, start).await {
            return Envelope::failed(e);
        }

        Envelope::ok(RunResult {
            id: short_id(&created.id),
            name: name.unwrap_or_default(),
            image: params.image,
            warnings: created.warnings,
        })
    }

    pub async fn stop_container(&self, params: StopContainerParams) -> Envelope<StopResult> {
        let timeout = clamp(params.timeout, 0, 300);

        debug!(container = %params.container, timeout = timeout, "Stopping container");

        let request = self
            .request(
                HttpMethod::Post,
                &format!("containers/{}/stop", path_segment(&params.container)),
            )
            .query("t", timeout);

        self.send("stopping container", request)
            .await
            .map(|response| StopResult {
                already_stopped: response.status_code() == 304,
                container: params.container,
                stopped: true,
            })
            .into()
    }

    pub async fn remove_container(&self, params: RemoveContainerParams) -> Envelope<RemoveResult> {
        let mut request = self.request(
            HttpMethod::Delete,
            &format!("containers/{}", path_segment(&params.container)),
        );
        if flag(&params.force) {
            request = request.query("force", "true");
        }

        self.send("removing container", request)
            .await
            .map(|_| RemoveResult {
                container: params.container,
                removed: true,
            })
            .into()
    }

    pub async fn container_logs(&self, params: ContainerLogsParams) -> Envelope<ContainerLogs> {
        let tail = clamp(params.tail, 1, 10_000);

        let request = self
            .request(
                HttpMethod::Get,
                &format!("containers/{}/logs", path_segment(&params.container)),
            )
            .query("stdout", "true")
            .query("stderr", "true")
            .query("tail", tail);

        self.send("getting container logs", request)
            .await
            .map(|response| {
                let logs = demux_logs(response.bytes());
                ContainerLogs {
                    container: params.container,
                    line_count: logs.lines().count(),
                    logs,
                }
            })
            .into()
    }

    pub async fn list_images(&self) -> Envelope<ImageList> {
        let request = self.request(HttpMethod::Get, "images/json");

        self.call::<Vec<WireImage>>("listing images", request)
            .await
            .map(|images| {
                let images: Vec<ImageSummary> = images
                    .into_iter()
                    .map(|image| ImageSummary {
                        id: short_id(&image.id),
                        tags: image.repo_tags,
                        size: image.size,
                        created: image.created,
                    })
                    .collect();
                ImageList {
                    count: images.len(),
                    images,
                }
            })
            .into()
    }

    /// The daemon streams JSON progress lines; errors arrive in-band as `{"error": ...}`
    pub async fn pull_image(&self, params: PullImageParams) -> Envelope<PullResult> {
        const ACTION: &str = "pulling image";

        let tag = if params.tag.is_empty() {
            default_tag()
        } else {
            params.tag
        };

        debug!(image = %params.image, tag = %tag, "Pulling image");

        let request = self
            .request(HttpMethod::Post, "images/create")
            .query("fromImage", &params.image)
            .query("tag", &tag);

        let response = match self.send(ACTION, request).await {
            Ok(response) => response,
            Err(e) => return Envelope::failed(e),
        };

        let mut status = String::new();
        for line in response.content().lines().filter(|l| !l.trim().is_empty()) {
            let Ok(event) = serde_json::from_str::<Value>(line) else {
                continue;
            };
            if let Some(error) = event.get("error").and_then(describe) {
                return Envelope::failed(failure(ACTION, &error));
            }
            if let Some(s) = event.get("status").and_then(Value::as_str) {
                status = s.to_string();
            }
        }

        Envelope::ok(PullResult {
            image: format!("{}:{}", params.image, tag),
            status,
        })
    }
}

fn docker_tool(name: &str, description: &str, parameters: Value) -> ToolConfig {
    tool_config(
        name,
        description,
        parameters,
        ToolType::Http,
        FailureContract::Structured,
    )
}

#[async_trait]
impl Adapter for Docker {
    fn category(&self) -> ToolCategory {
        ToolCategory::Containers
    }

    fn operations(&self) -> Vec<ToolConfig> {
        let container = json!({ "type": "string", "description": "Container ID or name" });

        vec![
            docker_tool(
                "docker_list_containers",
                "List containers with image, state, status and published ports.",
                create_schema(
                    json!({
                        "all": {
                            "type": "string",
                            "description": "Include stopped containers ('true'/'false')",
                            "enum": ["true", "false"],
                            "default": "false"
                        }
                    }),
                    vec![],
                ),
            ),
            docker_tool(
                "docker_run_container",
                "Create and start a container.",
                create_schema(
                    json!({
                        "image": { "type": "string", "description": "Image reference (e.g., 'nginx:1.25')" },
                        "name": { "type": "string", "description": "Container name" },
                        "ports": {
                            "type": "object",
                            "description": "Host port to container port (e.g., {\"8080\": \"80\"})",
                            "additionalProperties": { "type": "string" }
                        },
                        "volumes": {
                            "type": "object",
                            "description": "Host path to container path",
                            "additionalProperties": { "type": "string" }
                        },
                        "env": {
                            "type": "object",
                            "description": "Environment variables",
                            "additionalProperties": { "type": "string" }
                        },
                        "command": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Command overriding the image default"
                        }
                    }),
                    vec!["image"],
                ),
            ),
            docker_tool(
                "docker_stop_container",
                "Stop a running container.",
                create_schema(
                    json!({
                        "container": container.clone(),
                        "timeout": {
                            "type": "integer",
                            "description": "Seconds to wait before killing (0-300)",
                            "default": 10,
                            "minimum": 0,
                            "maximum": 300
                        }
                    }),
                    vec!["container"],
                ),
            ),
            docker_tool(
                "docker_remove_container",
                "Remove a container.",
                create_schema(
                    json!({
                        "container": container.clone(),
                        "force": {
                            "type": "string",
                            "description": "Kill a running container first ('true'/'false')",
                            "enum": ["true", "false"],
                            "default": "false"
                        }
                    }),
                    vec!["container"],
                ),
            ),
            docker_tool(
                "docker_container_logs",
                "Get the last lines of a container's stdout and stderr.",
                create_schema(
                    json!({
                        "container": container,
                        "tail": {
                            "type": "integer",
                            "description": "Number of lines from the end (1-10000)",
                            "default": 100,
                            "minimum": 1,
                            "maximum": 10000
                        }
                    }),
                    vec!["container"],
                ),
            ),
            docker_tool(
                "docker_list_images",
                "List local images.",
                create_schema(json!({}), vec![]),
            ),
            docker_tool(
                "docker_pull_image",
                "Pull an image from its registry.",
                create_schema(
                    json!({
                        "image": { "type": "string", "description": "Image name (e.g., 'nginx')" },
                        "tag": { "type": "string", "description": "Tag", "default": "latest" }
                    }),
                    vec!["image"],
                ),
            ),
        ]
    }

    async fn dispatch(&self, operation: &str, input: ToolInput) -> AtkResult<ToolResult> {
        Ok(match operation {
            "docker_list_containers" => {
                ToolResult::from_envelope(self.list_containers(input.parse()?).await)
            }
            "docker_run_container" => {
                ToolResult::from_envelope(self.run_container(input.parse()?).await)
            }
            "docker_stop_container" => {
                ToolResult::from_envelope(self.stop_container(input.parse()?).await)
            }
            "docker_remove_container" => {
                ToolResult::from_envelope(self.remove_container(input.parse()?).await)
            }
            "docker_container_logs" => {
                ToolResult::from_envelope(self.container_logs(input.parse()?).await)
            }
            "docker_list_images" => ToolResult::from_envelope(self.list_images().await),
            "docker_pull_image" => ToolResult::from_envelope(self.pull_image(input.parse()?).await),
            other => return Err(unknown_operation(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use bytes::Bytes;

    fn adapter(mock: &Arc<MockTransport>) -> Docker {
        Docker::new(DockerConfig::default(), mock.clone())
    }

    fn run_params(value: Value) -> RunContainerParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_create_payload_port_bindings() {
        let payload = create_payload(&run_params(json!({
            "image": "nginx",
            "ports": {"8080": "80"}
        })));

        assert_eq!(
            payload["HostConfig"]["PortBindings"]["80/tcp"],
            json!([{"HostPort": "8080"}])
        );
        assert_eq!(payload["ExposedPorts"]["80/tcp"], json!({}));
        assert!(payload.get("Env").is_none());
        assert!(payload.get("Cmd").is_none());
        assert!(payload["HostConfig"].get("Binds").is_none());
    }

    #[test]
    fn test_create_payload_minimal_and_full() {
        let minimal = create_payload(&run_params(json!({"image": "alpine"})));
        assert_eq!(minimal, json!({"Image": "alpine"}));

        let full = create_payload(&run_params(json!({
            "image": "postgres:16",
            "ports": {"5353": "53/udp"},
            "volumes": {"/srv/data": "/var/lib/postgresql/data"},
            "env": {"POSTGRES_PASSWORD": "secret", "A": "1"},
            "command": ["postgres", "-c", "fsync=off"]
        })));
        assert_eq!(full["Env"], json!(["A=1", "POSTGRES_PASSWORD=secret"]));
        assert_eq!(full["Cmd"], json!(["postgres", "-c", "fsync=off"]));
        assert_eq!(full["ExposedPorts"]["53/udp"], json!({}));
        assert_eq!(
            full["HostConfig"]["Binds"],
            json!(["/srv/data:/var/lib/postgresql/data"])
        );
    }

    #[tokio::test]
    async fn test_run_container_creates_then_starts() {
        let mock = MockTransport::new();
        mock.push_json(
            201,
            json!({"Id": "4f66ad7e9a2b1c3d5e7f", "Warnings": []}),
        )
        .push_raw(204, Bytes::new());

        let envelope = adapter(&mock)
            .run_container(run_params(json!({
                "image": "nginx",
                "name": "web",
                "ports": {"8080": "80"}
            })))
            .await;

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url, "http://localhost/v1.43/containers/create");
        assert_eq!(requests[0].query_value("name"), Some("web"));
        assert_eq!(
            requests[1].url,
            "http://localhost/v1.43/containers/4f66ad7e9a2b1c3d5e7f/start"
        );

        assert!(envelope.success);
        assert_eq!(envelope.data.id, "4f66ad7e9a2b");
        assert_eq!(envelope.data.name, "web");
    }

    #[tokio::test]
    async fn test_run_container_create_failure_skips_start() {
        let mock = MockTransport::new();
        mock.push_json(404, json!({"message": "No such image: nginx:nope"}));

        let envelope = adapter(&mock)
            .run_container(run_params(json!({"image": "nginx:nope"})))
            .await;

        assert_eq!(mock.request_count(), 1);
        assert!(mock.requests()[0].query_value("name").is_none());
        assert!(!envelope.success);
        assert_eq!(
            envelope.error,
            "Error running container: No such image: nginx:nope"
        );
        assert_eq!(envelope.data, RunResult::default());
    }

    #[tokio::test]
    async fn test_list_containers_shapes() {
        let mock = MockTransport::new();
        mock.push_json(
            200,
            json!([{
                "Id": "0123456789abcdef0123",
                "Names": ["/web"],
                "Image": "nginx",
                "State": "running",
                "Status": "Up 2 hours",
                "Ports": [
                    {"IP": "0.0.0.0", "PrivatePort": 80, "PublicPort": 8080, "Type": "tcp"},
                    {"PrivatePort": 443, "Type": "tcp"}
                ]
            }]),
        );

        let envelope = adapter(&mock)
            .list_containers(ListContainersParams { all: "true".into() })
            .await;

        assert_eq!(mock.last_request().query_value("all"), Some("true"));
        let container = &envelope.data.containers[0];
        assert_eq!(container.id, "0123456789ab");
        assert_eq!(container.names, vec!["web"]);
        assert_eq!(container.ports, vec!["0.0.0.0:8080->80/tcp", "443/tcp"]);
    }

    #[tokio::test]
    async fn test_stop_container_already_stopped() {
        let mock = MockTransport::new();
        mock.push_raw(304, Bytes::new());

        let envelope = adapter(&mock)
            .stop_container(StopContainerParams {
                container: "web".into(),
                timeout: 1000,
            })
            .await;

        assert_eq!(mock.last_request().query_value("t"), Some("300"));
        assert!(envelope.success);
        assert!(envelope.data.already_stopped);
    }

    #[tokio::test]
    async fn test_container_reference_cannot_change_endpoint() {
        let mock = MockTransport::new();
        mock.push_raw(204, Bytes::new());

        adapter(&mock)
            .stop_container(StopContainerParams {
                container: "web/../json?all=1".into(),
                timeout: 10,
            })
            .await;

        assert_eq!(
            mock.last_request().url,
            "http://localhost/v1.43/containers/web%2F..%2Fjson%3Fall=1/stop"
        );
    }

    #[tokio::test]
    async fn test_remove_missing_container() {
        let mock = MockTransport::new();
        mock.push_json(404, json!({"message": "No such container: ghost"}));

        let envelope = adapter(&mock)
            .remove_container(RemoveContainerParams {
                container: "ghost".into(),
                force: "false".into(),
            })
            .await;

        assert!(mock.last_request().query_value("force").is_none());
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "success": false,
                "container": "",
                "removed": false,
                "error": "Error removing container: No such container: ghost"
            })
        );
    }

    #[test]
    fn test_demux_logs() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&[1, 0, 0, 0, 0, 0, 0, 6]);
        stream.extend_from_slice(b"hello\n");
        stream.extend_from_slice(&[2, 0, 0, 0, 0, 0, 0, 5]);
        stream.extend_from_slice(b"oops\n");
        assert_eq!(demux_logs(&stream), "hello\noops\n");

        assert_eq!(demux_logs(b"plain tty output\n"), "plain tty output\n");
    }

    #[tokio::test]
    async fn test_container_logs() {
        let mock = MockTransport::new();
        let mut stream = vec![1, 0, 0, 0, 0, 0, 0, 4];
        stream.extend_from_slice(b"a\nb\n");
        mock.push_raw(200, stream);

        let envelope = adapter(&mock)
            .container_logs(ContainerLogsParams {
                container: "web".into(),
                tail: 0,
            })
            .await;

        assert_eq!(mock.last_request().query_value("tail"), Some("1"));
        assert_eq!(envelope.data.logs, "a\nb\n");
        assert_eq!(envelope.data.line_count, 2);
    }

    #[tokio::test]
    async fn test_list_images_null_tags() {
        let mock = MockTransport::new();
        mock.push_json(
            200,
            json!([{"Id": "sha256:abcdef0123456789", "RepoTags": null, "Size": 1024, "Created": 1700000000}]),
        );

        let envelope = adapter(&mock).list_images().await;
        assert_eq!(envelope.data.images[0].id, "abcdef012345");
        assert!(envelope.data.images[0].tags.is_empty());
    }

    #[tokio::test]
    async fn test_pull_image_stream() {
        let mock = MockTransport::new();
        mock.push_raw(
            200,
            "{\"status\":\"Pulling from library/nginx\"}\n{\"status\":\"Digest: sha256:1\"}\n{\"status\":\"Status: Downloaded newer image for nginx:latest\"}\n",
        );

        let envelope = adapter(&mock)
            .pull_image(PullImageParams {
                image: "nginx".into(),
                tag: "latest".into(),
            })
            .await;

        let request = mock.last_request();
        assert_eq!(request.query_value("fromImage"), Some("nginx"));
        assert_eq!(request.query_value("tag"), Some("latest"));
        assert!(envelope.success);
        assert_eq!(envelope.data.image, "nginx:latest");
        assert_eq!(
            envelope.data.status,
            "Status: Downloaded newer image for nginx:latest"
        );
    }

    #[tokio::test]
    async fn test_pull_image_in_band_error() {
        let mock = MockTransport::new();
        mock.push_raw(
            200,
            "{\"status\":\"Pulling from library/nope\"}\n{\"error\":\"manifest unknown\"}\n",
        );

        let envelope = adapter(&mock)
            .pull_image(PullImageParams {
                image: "nope".into(),
                tag: "latest".into(),
            })
            .await;
        assert!(!envelope.success);
        assert_eq!(envelope.error, "Error pulling image: manifest unknown");
    }

    #[tokio::test]
    async fn test_daemon_unreachable() {
        let mock = MockTransport::new();
        let envelope = adapter(&mock).list_images().await;
        assert!(!envelope.success);
        assert!(envelope.error.starts_with("Error listing images: connection failed"));
        assert!(envelope.data.images.is_empty());
    }
}

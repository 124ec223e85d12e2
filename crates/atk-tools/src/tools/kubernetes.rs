//! Kubernetes Tools
//!
//! Read pods, deployments and namespaces and scale deployments through the
//! Kubernetes API server.
//!
//! ## Available Tools
//!
//! - `kubernetes_list_pods` - List pods with phase, readiness and restarts
//! - `kubernetes_get_pod` - Pod detail including container states
//! - `kubernetes_pod_logs` - Tail the logs of a pod container
//! - `kubernetes_list_deployments` - List deployments with replica counts
//! - `kubernetes_scale_deployment` - Set the replica count of a deployment
//! - `kubernetes_list_namespaces` - List namespaces
//!
//! ## Authentication
//!
//! Bearer token (service account or user token).

use atk_core::{
    AtkResult, FailureContract, HttpMethod, HttpRequest, HttpTransport, Outcome, ToolConfig,
    ToolInput, ToolResult, ToolType,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::common::{
    clamp, create_schema, decode, describe, failure, fetch_json, flag, join_url, null_default,
    path_segment, status_reason, tool_config,
};
use crate::adapter::{unknown_operation, Adapter};
use crate::registry::ToolCategory;

/// API server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesConfig {
    /// e.g. https://kubernetes.default.svc
    pub api_server: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Namespace used when an operation does not name one
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl KubernetesConfig {
    pub fn new(api_server: impl Into<String>) -> Self {
        Self {
            api_server: api_server.into(),
            token: None,
            namespace: default_namespace(),
        }
    }
}

pub struct Kubernetes {
    config: KubernetesConfig,
    transport: Arc<dyn HttpTransport>,
}

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ListPodsParams {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub label_selector: Option<String>,
    #[serde(default = "default_pod_limit")]
    pub limit: i64,
}

fn default_pod_limit() -> i64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct PodParams {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PodLogsParams {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default = "default_tail_lines")]
    pub tail_lines: i64,
    #[serde(default = "default_false")]
    pub previous: String,
}

fn default_tail_lines() -> i64 {
    100
}

fn default_false() -> String {
    "false".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListDeploymentsParams {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub label_selector: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScaleParams {
    pub name: String,
    pub replicas: i64,
    #[serde(default)]
    pub namespace: Option<String>,
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
struct List<T> {
    items: Vec<T>,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ObjectMeta {
    name: String,
    namespace: String,
    creation_timestamp: String,
    #[serde(deserialize_with = "null_default")]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Pod {
    metadata: ObjectMeta,
    spec: PodSpec,
    status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PodSpec {
    node_name: String,
    containers: Vec<ContainerSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContainerSpec {
    name: String,
    image: String,
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PodStatus {
    phase: String,
    #[serde(rename = "podIP")]
    pod_ip: String,
    #[serde(rename = "hostIP")]
    host_ip: String,
    start_time: String,
    container_statuses: Vec<WireContainerStatus>,
}

impl Default for PodStatus {
    fn default() -> Self {
        Self {
            phase: "Unknown".to_string(),
            pod_ip: String::new(),
            host_ip: String::new(),
            start_time: String::new(),
            container_statuses: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireContainerStatus {
    name: String,
    image: String,
    ready: bool,
    restart_count: u64,
    state: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Deployment {
    metadata: ObjectMeta,
    spec: ReplicaSpec,
    status: DeploymentStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReplicaSpec {
    replicas: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DeploymentStatus {
    replicas: u64,
    ready_replicas: u64,
    updated_replicas: u64,
    available_replicas: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Scale {
    metadata: ObjectMeta,
    spec: ReplicaSpec,
    status: ReplicaSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Namespace {
    metadata: ObjectMeta,
    status: NamespaceStatus,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct NamespaceStatus {
    phase: String,
}

impl Default for NamespaceStatus {
    fn default() -> Self {
        Self {
            phase: "unknown".to_string(),
        }
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PodSummary {
    pub name: String,
    pub namespace: String,
    pub phase: String,
    pub node: String,
    pub pod_ip: String,
    /// `ready/total` containers
    pub ready: String,
    pub restarts: u64,
    pub created: String,
}

impl From<Pod> for PodSummary {
    fn from(pod: Pod) -> Self {
        let statuses = &pod.status.container_statuses;
        let ready = statuses.iter().filter(|c| c.ready).count();
        let total = statuses.len().max(pod.spec.containers.len());

        Self {
            ready: format!("{}/{}", ready, total),
            restarts: statuses.iter().map(|c| c.restart_count).sum(),
            name: pod.metadata.name,
            namespace: pod.metadata.namespace,
            phase: pod.status.phase,
            node: pod.spec.node_name,
            pod_ip: pod.status.pod_ip,
            created: pod.metadata.creation_timestamp,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PodList {
    pub namespace: String,
    pub pods: Vec<PodSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContainerState {
    pub name: String,
    pub image: String,
    pub ready: bool,
    pub restart_count: u64,
    /// `running`, `waiting`, `terminated` or `unknown`
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PodDetail {
    pub name: String,
    pub namespace: String,
    pub phase: String,
    pub node: String,
    pub pod_ip: String,
    pub host_ip: String,
    pub start_time: String,
    pub labels: BTreeMap<String, String>,
    pub containers: Vec<ContainerState>,
}

impl From<Pod> for PodDetail {
    fn from(pod: Pod) -> Self {
        let images: BTreeMap<String, String> = pod
            .spec
            .containers
            .into_iter()
            .map(|c| (c.name, c.image))
            .collect();

        let containers = pod
            .status
            .container_statuses
            .into_iter()
            .map(|c| {
                let state = c
                    .state
                    .as_object()
                    .and_then(|m| m.keys().next().cloned())
                    .unwrap_or_else(|| "unknown".to_string());
                let image = if c.image.is_empty() {
                    images.get(&c.name).cloned().unwrap_or_default()
                } else {
                    c.image
                };
                ContainerState {
                    name: c.name,
                    image,
                    ready: c.ready,
                    restart_count: c.restart_count,
                    state,
                }
            })
            .collect();

        Self {
            name: pod.metadata.name,
            namespace: pod.metadata.namespace,
            phase: pod.status.phase,
            node: pod.spec.node_name,
            pod_ip: pod.status.pod_ip,
            host_ip: pod.status.host_ip,
            start_time: pod.status.start_time,
            labels: pod.metadata.labels,
            containers,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PodLogs {
    pub name: String,
    pub namespace: String,
    pub container: String,
    pub line_count: usize,
    pub logs: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeploymentSummary {
    pub name: String,
    pub namespace: String,
    pub replicas: u64,
    pub ready_replicas: u64,
    pub updated_replicas: u64,
    pub available_replicas: u64,
    pub created: String,
}

impl From<Deployment> for DeploymentSummary {
    fn from(deployment: Deployment) -> Self {
        Self {
            name: deployment.metadata.name,
            namespace: deployment.metadata.namespace,
            replicas: deployment.spec.replicas,
            ready_replicas: deployment.status.ready_replicas,
            updated_replicas: deployment.status.updated_replicas,
            available_replicas: deployment.status.available_replicas,
            created: deployment.metadata.creation_timestamp,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeploymentList {
    pub namespace: String,
    pub deployments: Vec<DeploymentSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScaleResult {
    pub name: String,
    pub namespace: String,
    /// Desired replicas after the patch
    pub replicas: u64,
    /// Replicas currently running
    pub current_replicas: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NamespaceSummary {
    pub name: String,
    pub status: String,
    pub created: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NamespaceList {
    pub namespaces: Vec<NamespaceSummary>,
    pub count: usize,
}

/// Failures come back as `Status` objects
fn upstream_error(body: &Value) -> Option<String> {
    let is_failure = body.get("kind").and_then(Value::as_str) == Some("Status")
        && body.get("status").and_then(Value::as_str) == Some("Failure");
    if !is_failure {
        return None;
    }
    Some(
        body.get("message")
            .and_then(describe)
            .or_else(|| body.get("reason").and_then(describe))
            .unwrap_or_else(|| "Unknown error".to_string()),
    )
}

impl Kubernetes {
    pub fn new(config: KubernetesConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let request = HttpRequest::new(method, join_url(&self.config.api_server, path))
            .header("Accept", "application/json");
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn namespace(&self, namespace: Option<String>) -> String {
        namespace
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| self.config.namespace.clone())
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

    pub async fn list_pods(&self, params: ListPodsParams) -> Outcome<PodList> {
        let namespace = self.namespace(params.namespace);
        let limit = clamp(params.limit, 1, 1000);

        debug!(namespace = %namespace, selector = ?params.label_selector, limit = limit, "Listing pods");

        let request = self
            .request(
                HttpMethod::Get,
                &format!("api/v1/namespaces/{}/pods", path_segment(&namespace)),
            )
            .query("limit", limit)
            .query_opt("labelSelector", params.label_selector.filter(|s| !s.is_empty()));

        let list: List<Pod> = self.call("listing pods", request).await?;
        let pods: Vec<PodSummary> = list.items.into_iter().map(PodSummary::from).collect();

        Ok(PodList {
            namespace,
            count: pods.len(),
            pods,
        })
    }

    pub async fn get_pod(&self, params: PodParams) -> Outcome<PodDetail> {
        let namespace = self.namespace(params.namespace);

        debug!(namespace = %namespace, pod = %params.name, "Getting pod");

        let request = self.request(
            HttpMethod::Get,
            &format!(
                "api/v1/namespaces/{}/pods/{}",
                path_segment(&namespace),
                path_segment(&params.name)
            ),
        );
        let pod: Pod = self.call("getting pod", request).await?;
        Ok(PodDetail::from(pod))
    }

    /// Logs are returned as plain text; errors still arrive as `Status` JSON
    pub async fn pod_logs(&self, params: PodLogsParams) -> Outcome<PodLogs> {
        const ACTION: &str = "getting pod logs";

        let namespace = self.namespace(params.namespace);
        let tail_lines = clamp(params.tail_lines, 1, 5000);
        let container = params.container.filter(|c| !c.is_empty());

        debug!(namespace = %namespace, pod = %params.name, tail_lines = tail_lines, "Fetching pod logs");

        let mut request = self
            .request(
                HttpMethod::Get,
                &format!(
                    "api/v1/namespaces/{}/pods/{}/log",
                    path_segment(&namespace),
                    path_segment(&params.name)
                ),
            )
            .query("tailLines", tail_lines)
            .query_opt("container", container.as_deref());
        if flag(&params.previous) {
            request = request.query("previous", "true");
        }

        let response = self
            .transport
            .request(request)
            .await
            .map_err(|e| failure(ACTION, &e.to_string()))?;

        if !response.is_success() {
            let body = response.to_json().unwrap_or(Value::Null);
            let reason = upstream_error(&body).unwrap_or_else(|| status_reason(&response));
            return Err(failure(ACTION, &reason));
        }

        let logs = response.content();
        Ok(PodLogs {
            name: params.name,
            namespace,
            container: container.unwrap_or_default(),
            line_count: logs.lines().count(),
            logs,
        })
    }

    pub async fn list_deployments(&self, params: ListDeploymentsParams) -> Outcome<DeploymentList> {
        let namespace = self.namespace(params.namespace);

        let request = self
            .request(
                HttpMethod::Get,
                &format!("apis/apps/v1/namespaces/{}/deployments", path_segment(&namespace)),
            )
            .query_opt("labelSelector", params.label_selector.filter(|s| !s.is_empty()));

        let list: List<Deployment> = self.call("listing deployments", request).await?;
        let deployments: Vec<DeploymentSummary> = list
            .items
            .into_iter()
            .map(DeploymentSummary::from)
            .collect();

        Ok(DeploymentList {
            namespace,
            count: deployments.len(),
            deployments,
        })
    }

    /// Merge-patch the `scale` subresource
    pub async fn scale_deployment(&self, params: ScaleParams) -> Outcome<ScaleResult> {
        let namespace = self.namespace(params.namespace);
        let replicas = clamp(params.replicas, 0, 100);

        debug!(namespace = %namespace, deployment = %params.name, replicas = replicas, "Scaling deployment");

        let request = self
            .request(
                HttpMethod::Patch,
                &format!(
                    "apis/apps/v1/namespaces/{}/deployments/{}/scale",
                    path_segment(&namespace),
                    path_segment(&params.name)
                ),
            )
            .header("Content-Type", "application/merge-patch+json")
            .json(json!({ "spec": { "replicas": replicas } }));

        let scale: Scale = self.call("scaling deployment", request).await?;
        Ok(ScaleResult {
            name: if scale.metadata.name.is_empty() {
                params.name
            } else {
                scale.metadata.name
            },
            namespace,
            replicas: scale.spec.replicas,
            current_replicas: scale.status.replicas,
        })
    }

    pub async fn list_namespaces(&self) -> Outcome<NamespaceList> {
        let request = self.request(HttpMethod::Get, "api/v1/namespaces");
        let list: List<Namespace> = self.call("listing namespaces", request).await?;

        let namespaces: Vec<NamespaceSummary> = list
            .items
            .into_iter()
            .map(|ns| NamespaceSummary {
                name: ns.metadata.name,
                status: ns.status.phase,
                created: ns.metadata.creation_timestamp,
            })
            .collect();

        Ok(NamespaceList {
            count: namespaces.len(),
            namespaces,
        })
    }
}

fn http_tool(name: &str, description: &str, parameters: Value) -> ToolConfig {
    tool_config(
        name,
        description,
        parameters,
        ToolType::Http,
        FailureContract::Message,
    )
}

#[async_trait]
impl Adapter for Kubernetes {
    fn category(&self) -> ToolCategory {
        ToolCategory::Kubernetes
    }

    fn operations(&self) -> Vec<ToolConfig> {
        let namespace = json!({
            "type": "string",
            "description": format!("Namespace (default: {})", self.config.namespace)
        });

        vec![
            http_tool(
                "kubernetes_list_pods",
                "List pods in a namespace with phase, ready containers and restart counts.",
                create_schema(
                    json!({
                        "namespace": namespace.clone(),
                        "label_selector": {
                            "type": "string",
                            "description": "Label selector (e.g., 'app=nginx,tier=frontend')"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum pods to return (1-1000)",
                            "default": 100,
                            "minimum": 1,
                            "maximum": 1000
                        }
                    }),
                    vec![],
                ),
            ),
            http_tool(
                "kubernetes_get_pod",
                "Get pod details: node, IPs, labels and per-container state.",
                create_schema(
                    json!({
                        "name": { "type": "string", "description": "Pod name" },
                        "namespace": namespace.clone()
                    }),
                    vec!["name"],
                ),
            ),
            http_tool(
                "kubernetes_pod_logs",
                "Get the last lines of a pod's logs.",
                create_schema(
                    json!({
                        "name": { "type": "string", "description": "Pod name" },
                        "namespace": namespace.clone(),
                        "container": {
                            "type": "string",
                            "description": "Container name (required for multi-container pods)"
                        },
                        "tail_lines": {
                            "type": "integer",
                            "description": "Number of lines from the end (1-5000)",
                            "default": 100,
                            "minimum": 1,
                            "maximum": 5000
                        },
                        "previous": {
                            "type": "string",
                            "description": "Logs of the previous terminated container ('true'/'false')",
                            "enum": ["true", "false"],
                            "default": "false"
                        }
                    }),
                    vec!["name"],
                ),
            ),
            http_tool(
                "kubernetes_list_deployments",
                "List deployments with desired, ready, updated and available replicas.",
                create_schema(
                    json!({
                        "namespace": namespace.clone(),
                        "label_selector": {
                            "type": "string",
                            "description": "Label selector"
                        }
                    }),
                    vec![],
                ),
            ),
            http_tool(
                "kubernetes_scale_deployment",
                "Scale a deployment to the given number of replicas.",
                create_schema(
                    json!({
                        "name": { "type": "string", "description": "Deployment name" },
                        "replicas": {
                            "type": "integer",
                            "description": "Desired replicas (0-100)",
                            "minimum": 0,
                            "maximum": 100
                        },
                        "namespace": namespace.clone()
                    }),
                    vec!["name", "replicas"],
                ),
            ),
            http_tool(
                "kubernetes_list_namespaces",
                "List namespaces and their status.",
                create_schema(json!({}), vec![]),
            ),
        ]
    }

    async fn dispatch(&self, operation: &str, input: ToolInput) -> AtkResult<ToolResult> {
        Ok(match operation {
            "kubernetes_list_pods" => ToolResult::from_outcome(self.list_pods(input.parse()?).await),
            "kubernetes_get_pod" => ToolResult::from_outcome(self.get_pod(input.parse()?).await),
            "kubernetes_pod_logs" => ToolResult::from_outcome(self.pod_logs(input.parse()?).await),
            "kubernetes_list_deployments" => {
                ToolResult::from_outcome(self.list_deployments(input.parse()?).await)
            }
            "kubernetes_scale_deployment" => {
                ToolResult::from_outcome(self.scale_deployment(input.parse()?).await)
            }
            "kubernetes_list_namespaces" => ToolResult::from_outcome(self.list_namespaces().await),
            other => return Err(unknown_operation(other)),
        })
    }
}

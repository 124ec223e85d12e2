//! GitLab Tools
//!
//! Tools for working with GitLab projects through the REST API (v4).
//!
//! ## Available Tools
//!
//! - `gitlab_list_projects` - List or search projects
//! - `gitlab_get_project` - Get project details
//! - `gitlab_list_issues` - List issues of a project
//! - `gitlab_create_issue` - Open a new issue
//! - `gitlab_list_merge_requests` - List merge requests of a project
//! - `gitlab_list_pipelines` - List CI/CD pipelines of a project
//!
//! ## Authentication
//!
//! `PRIVATE-TOKEN` header with a personal, project or group access token.
//! Projects are addressed by numeric ID or full path (`group/project`).

use atk_core::{
    AtkResult, FailureContract, HttpMethod, HttpRequest, HttpTransport, Outcome, ToolConfig,
    ToolInput, ToolResult, ToolType,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::common::{
    clamp, create_schema, decode, describe, failure, fetch_json, flag, join_url, lenient_string,
    null_default, tool_config,
};
use crate::adapter::{unknown_operation, Adapter};
use crate::registry::ToolCategory;

pub const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitLabConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_GITLAB_URL.to_string()
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
        }
    }
}

pub struct GitLab {
    config: GitLabConfig,
    transport: Arc<dyn HttpTransport>,
}

// ============================================================================
// Parameters
// ============================================================================

fn default_per_page() -> i64 {
    20
}

fn default_page() -> i64 {
    1
}

fn default_false() -> String {
    "false".to_string()
}

fn default_state() -> String {
    "opened".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListProjectsParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_false")]
    pub owned: String,
    #[serde(default = "default_false")]
    pub membership: String,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    #[serde(default = "default_page")]
    pub page: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectParams {
    /// Numeric ID or `group/project` path
    pub project: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListIssuesParams {
    pub project: String,
    #[serde(default = "default_state")]
    pub state: String,
    /// Comma-separated label names
    #[serde(default)]
    pub labels: Option<String>,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateIssueParams {
    pub project: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Option<String>,
    #[serde(default)]
    pub assignee_ids: Vec<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListMergeRequestsParams {
    pub project: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListPipelinesParams {
    pub project: String,
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub id: u64,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub path_with_namespace: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub default_branch: String,
    #[serde(deserialize_with = "null_default")]
    pub visibility: String,
    #[serde(deserialize_with = "null_default")]
    pub web_url: String,
    #[serde(deserialize_with = "null_default")]
    pub http_url_to_repo: String,
    pub star_count: u64,
    pub forks_count: u64,
    pub open_issues_count: u64,
    #[serde(deserialize_with = "null_default")]
    pub last_activity_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectList {
    pub projects: Vec<Project>,
    pub count: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserRef {
    #[serde(deserialize_with = "null_default")]
    username: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireIssue {
    id: u64,
    iid: u64,
    #[serde(deserialize_with = "null_default")]
    title: String,
    #[serde(deserialize_with = "null_default")]
    state: String,
    #[serde(deserialize_with = "null_default")]
    description: String,
    #[serde(deserialize_with = "null_default")]
    labels: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    author: UserRef,
    #[serde(deserialize_with = "null_default")]
    assignees: Vec<UserRef>,
    #[serde(deserialize_with = "null_default")]
    web_url: String,
    #[serde(deserialize_with = "null_default")]
    created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Issue {
    pub id: u64,
    pub iid: u64,
    pub title: String,
    pub state: String,
    pub description: String,
    pub labels: Vec<String>,
    pub author: String,
    pub assignees: Vec<String>,
    pub web_url: String,
    pub created_at: String,
}

impl From<WireIssue> for Issue {
    fn from(issue: WireIssue) -> Self {
        Self {
            id: issue.id,
            iid: issue.iid,
            title: issue.title,
            state: issue.state,
            description: issue.description,
            labels: issue.labels,
            author: issue.author.username,
            assignees: issue.assignees.into_iter().map(|u| u.username).collect(),
            web_url: issue.web_url,
            created_at: issue.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IssueList {
    pub issues: Vec<Issue>,
    pub count: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireMergeRequest {
    id: u64,
    iid: u64,
    #[serde(deserialize_with = "null_default")]
    title: String,
    #[serde(deserialize_with = "null_default")]
    state: String,
    #[serde(deserialize_with = "null_default")]
    source_branch: String,
    #[serde(deserialize_with = "null_default")]
    target_branch: String,
    #[serde(deserialize_with = "null_default")]
    author: UserRef,
    #[serde(deserialize_with = "null_default")]
    merge_status: String,
    draft: bool,
    #[serde(deserialize_with = "null_default")]
    web_url: String,
    #[serde(deserialize_with = "null_default")]
    created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeRequest {
    pub id: u64,
    pub iid: u64,
    pub title: String,
    pub state: String,
    pub source_branch: String,
    pub target_branch: String,
    pub author: String,
    pub merge_status: String,
    pub draft: bool,
    pub web_url: String,
    pub created_at: String,
}

impl From<WireMergeRequest> for MergeRequest {
    fn from(mr: WireMergeRequest) -> Self {
        Self {
            id: mr.id,
            iid: mr.iid,
            title: mr.title,
            state: mr.state,
            source_branch: mr.source_branch,
            target_branch: mr.target_branch,
            author: mr.author.username,
            merge_status: mr.merge_status,
            draft: mr.draft,
            web_url: mr.web_url,
            created_at: mr.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeRequestList {
    pub merge_requests: Vec<MergeRequest>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pipeline {
    pub id: u64,
    #[serde(deserialize_with = "null_default")]
    pub status: String,
    #[serde(rename = "ref", deserialize_with = "lenient_string")]
    pub git_ref: String,
    #[serde(deserialize_with = "null_default")]
    pub sha: String,
    #[serde(deserialize_with = "null_default")]
    pub source: String,
    #[serde(deserialize_with = "null_default")]
    pub web_url: String,
    #[serde(deserialize_with = "null_default")]
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineList {
    pub pipelines: Vec<Pipeline>,
    pub count: usize,
}

/// `message` is a string, or a map of field name to validation errors
fn upstream_error(body: &Value) -> Option<String> {
    match body.get("message") {
        Some(Value::Object(fields)) => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(field, errors)| match errors {
                    Value::Array(items) => {
                        let messages: Vec<String> = items.iter().filter_map(describe).collect();
                        format!("{} {}", field, messages.join(", "))
                    }
                    other => format!("{} {}", field, describe(other).unwrap_or_default()),
                })
                .collect();
            Some(parts.join("; "))
        }
        Some(Value::Array(items)) => {
            let messages: Vec<String> = items.iter().filter_map(describe).collect();
            Some(messages.join("; "))
        }
        Some(message) => describe(message),
        None => body.get("error").and_then(describe).map(|error| {
            match body.get("error_description").and_then(Value::as_str) {
                Some(detail) => format!("{}: {}", error, detail),
                None => error,
            }
        }),
    }
}

impl GitLab {
    pub fn new(config: GitLabConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let url = join_url(&self.config.base_url, &format!("api/v4/{}", path));
        let request = HttpRequest::new(method, url);
        match &self.config.token {
            Some(token) => request.header("PRIVATE-TOKEN", token.as_str()),
            None => request,
        }
    }

    /// `group/project` must be sent as `group%2Fproject`
    fn project_path(project: &str, resource: &str) -> String {
        let encoded = urlencoding::encode(project);
        if resource.is_empty() {
            format!("projects/{}", encoded)
        } else {
            format!("projects/{}/{}", encoded, resource)
        }
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

    pub async fn list_projects(&self, params: ListProjectsParams) -> Outcome<ProjectList> {
        let per_page = clamp(params.per_page, 1, 100);
        let page = params.page.max(1);

        debug!(search = ?params.search, per_page = per_page, page = page, "Listing GitLab projects");

        let mut request = self
            .request(HttpMethod::Get, "projects")
            .query("per_page", per_page)
            .query("page", page)
            .query_opt("search", params.search.filter(|s| !s.is_empty()));
        if flag(&params.owned) {
            request = request.query("owned", "true");
        }
        if flag(&params.membership) {
            request = request.query("membership", "true");
        }

        let projects: Vec<Project> = self.call("listing projects", request).await?;
        Ok(ProjectList {
            count: projects.len(),
            projects,
        })
    }

    pub async fn get_project(&self, params: ProjectParams) -> Outcome<Project> {
        let request = self.request(HttpMethod::Get, &Self::project_path(&params.project, ""));
        self.call("getting project", request).await
    }

    pub async fn list_issues(&self, params: ListIssuesParams) -> Outcome<IssueList> {
        let per_page = clamp(params.per_page, 1, 100);

        debug!(project = %params.project, state = %params.state, "Listing GitLab issues");

        let request = self
            .request(HttpMethod::Get, &Self::project_path(&params.project, "issues"))
            .query("state", &params.state)
            .query("per_page", per_page)
            .query_opt("labels", params.labels.filter(|l| !l.is_empty()));

        let issues: Vec<WireIssue> = self.call("listing issues", request).await?;
        let issues: Vec<Issue> = issues.into_iter().map(Issue::from).collect();
        Ok(IssueList {
            count: issues.len(),
            issues,
        })
    }

    pub async fn create_issue(&self, params: CreateIssueParams) -> Outcome<Issue> {
        const ACTION: &str = "creating issue";

        if params.title.trim().is_empty() {
            return Err(failure(ACTION, "title must not be empty"));
        }

        let mut body = json!({ "title": params.title });
        if let Some(description) = params.description.filter(|d| !d.is_empty()) {
            body["description"] = json!(description);
        }
        if let Some(labels) = params.labels.filter(|l| !l.is_empty()) {
            body["labels"] = json!(labels);
        }
        if !params.assignee_ids.is_empty() {
            body["assignee_ids"] = json!(params.assignee_ids);
        }

        debug!(project = %params.project, "Creating GitLab issue");

        let request = self
            .request(HttpMethod::Post, &Self::project_path(&params.project, "issues"))
            .json(body);

        let issue: WireIssue = self.call(ACTION, request).await?;
        Ok(Issue::from(issue))
    }

    pub async fn list_merge_requests(
        &self,
        params: ListMergeRequestsParams,
    ) -> Outcome<MergeRequestList> {
        let request = self
            .request(
                HttpMethod::Get,
                &Self::project_path(&params.project, "merge_requests"),
            )
            .query("state", &params.state)
            .query("per_page", clamp(params.per_page, 1, 100));

        let merge_requests: Vec<WireMergeRequest> =
            self.call("listing merge requests", request).await?;
        let merge_requests: Vec<MergeRequest> =
            merge_requests.into_iter().map(MergeRequest::from).collect();
        Ok(MergeRequestList {
            count: merge_requests.len(),
            merge_requests,
        })
    }

    pub async fn list_pipelines(&self, params: ListPipelinesParams) -> Outcome<PipelineList> {
        let request = self
            .request(
                HttpMethod::Get,
                &Self::project_path(&params.project, "pipelines"),
            )
            .query("per_page", clamp(params.per_page, 1, 100))
            .query_opt("ref", params.git_ref.filter(|r| !r.is_empty()))
            .query_opt("status", params.status.filter(|s| !s.is_empty()));

        let pipelines: Vec<Pipeline> = self.call("listing pipelines", request).await?;
        Ok(PipelineList {
            count: pipelines.len(),
            pipelines,
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
impl Adapter for GitLab {
    fn category(&self) -> ToolCategory {
        ToolCategory::Git
    }

    fn operations(&self) -> Vec<ToolConfig> {
        let project = json!({
            "type": "string",
            "description": "Project ID or full path (e.g., '123' or 'group/project')"
        });
        let per_page = json!({
            "type": "integer",
            "description": "Results per page (1-100)",
            "default": 20,
            "minimum": 1,
            "maximum": 100
        });

        vec![
            http_tool(
                "gitlab_list_projects",
                "List GitLab projects visible to the token, optionally filtered by a search term.",
                create_schema(
                    json!({
                        "search": { "type": "string", "description": "Search term" },
                        "owned": {
                            "type": "string",
                            "description": "Only projects owned by the user ('true'/'false')",
                            "enum": ["true", "false"],
                            "default": "false"
                        },
                        "membership": {
                            "type": "string",
                            "description": "Only projects the user is a member of ('true'/'false')",
                            "enum": ["true", "false"],
                            "default": "false"
                        },
                        "per_page": per_page.clone(),
                        "page": { "type": "integer", "description": "Page number", "default": 1 }
                    }),
                    vec![],
                ),
            ),
            http_tool(
                "gitlab_get_project",
                "Get details of a GitLab project.",
                create_schema(json!({ "project": project.clone() }), vec!["project"]),
            ),
            http_tool(
                "gitlab_list_issues",
                "List issues of a project.",
                create_schema(
                    json!({
                        "project": project.clone(),
                        "state": {
                            "type": "string",
                            "description": "Issue state",
                            "enum": ["opened", "closed", "all"],
                            "default": "opened"
                        },
                        "labels": {
                            "type": "string",
                            "description": "Comma-separated label names"
                        },
                        "per_page": per_page.clone()
                    }),
                    vec!["project"],
                ),
            ),
            http_tool(
                "gitlab_create_issue",
                "Create an issue in a project.",
                create_schema(
                    json!({
                        "project": project.clone(),
                        "title": { "type": "string", "description": "Issue title" },
                        "description": { "type": "string", "description": "Issue description (Markdown)" },
                        "labels": { "type": "string", "description": "Comma-separated label names" },
                        "assignee_ids": {
                            "type": "array",
                            "items": { "type": "integer" },
                            "description": "User IDs to assign"
                        }
                    }),
                    vec!["project", "title"],
                ),
            ),
            http_tool(
                "gitlab_list_merge_requests",
                "List merge requests of a project.",
                create_schema(
                    json!({
                        "project": project.clone(),
                        "state": {
                            "type": "string",
                            "description": "Merge request state",
                            "enum": ["opened", "closed", "locked", "merged", "all"],
                            "default": "opened"
                        },
                        "per_page": per_page.clone()
                    }),
                    vec!["project"],
                ),
            ),
            http_tool(
                "gitlab_list_pipelines",
                "List CI/CD pipelines of a project, newest first.",
                create_schema(
                    json!({
                        "project": project,
                        "ref": { "type": "string", "description": "Branch or tag name" },
                        "status": {
                            "type": "string",
                            "description": "Pipeline status",
                            "enum": ["created", "pending", "running", "success", "failed", "canceled", "skipped", "manual", "scheduled"]
                        },
                        "per_page": per_page
                    }),
                    vec!["project"],
                ),
            ),
        ]
    }

    async fn dispatch(&self, operation: &str, input: ToolInput) -> AtkResult<ToolResult> {
        Ok(match operation {
            "gitlab_list_projects" => {
                ToolResult::from_outcome(self.list_projects(input.parse()?).await)
            }
            "gitlab_get_project" => ToolResult::from_outcome(self.get_project(input.parse()?).await),
            "gitlab_list_issues" => ToolResult::from_outcome(self.list_issues(input.parse()?).await),
            "gitlab_create_issue" => {
                ToolResult::from_outcome(self.create_issue(input.parse()?).await)
            }
            "gitlab_list_merge_requests" => {
                ToolResult::from_outcome(self.list_merge_requests(input.parse()?).await)
            }
            "gitlab_list_pipelines" => {
                ToolResult::from_outcome(self.list_pipelines(input.parse()?).await)
            }
            other => return Err(unknown_operation(other)),
        })
    }
}

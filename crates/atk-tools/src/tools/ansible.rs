//! Ansible Tools
//!
//! Run playbooks and ad-hoc commands through the Ansible CLI.
//!
//! ## Available Tools
//!
//! - `ansible_playbook_run` - Run a playbook (optionally in check mode)
//! - `ansible_adhoc` - Run a single module against a host pattern
//! - `ansible_inventory_list` - Dump the inventory as JSON
//! - `ansible_playbook_syntax_check` - Validate playbook syntax without running it
//!
//! ## Prerequisites
//!
//! - Requires `automation` feature flag
//! - `ansible`, `ansible-playbook` and `ansible-inventory` on `PATH`
//!
//! Arguments are shell-escaped individually and stderr is merged into
//! stdout. A zero exit status returns the merged output; any other status
//! fails with the merged output as the error.

use atk_core::{
    AtkResult, CommandRunner, Envelope, FailureContract, ToolConfig, ToolInput, ToolResult,
    ToolType,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::common::{create_schema, failure, flag, tool_config_with_timeout};
use crate::adapter::{unknown_operation, Adapter};
use crate::registry::ToolCategory;

/// Playbook runs routinely take minutes
pub const DEFAULT_ANSIBLE_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnsibleConfig {
    /// Inventory used when an operation does not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_inventory: Option<String>,

    /// Directory commands run in (playbook and inventory paths are relative to it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_ANSIBLE_TIMEOUT_SECS
}

impl Default for AnsibleConfig {
    fn default() -> Self {
        Self {
            default_inventory: None,
            working_dir: None,
            timeout_secs: DEFAULT_ANSIBLE_TIMEOUT_SECS,
        }
    }
}

pub struct Ansible {
    config: AnsibleConfig,
    runner: Arc<dyn CommandRunner>,
}

fn default_false() -> String {
    "false".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybookRunParams {
    pub playbook: String,
    #[serde(default)]
    pub inventory: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    /// `key=value` string, or a JSON object
    #[serde(default)]
    pub extra_vars: Option<Value>,
    #[serde(default = "default_false")]
    pub check: String,
    #[serde(default = "default_false")]
    pub verbose: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdhocParams {
    pub hosts: String,
    #[serde(default = "default_module")]
    pub module: String,
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub inventory: Option<String>,
    #[serde(default = "default_false", rename = "become")]
    pub become_root: String,
}

fn default_module() -> String {
    "ping".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryParams {
    #[serde(default)]
    pub inventory: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyntaxCheckParams {
    pub playbook: String,
    #[serde(default)]
    pub inventory: Option<String>,
}

/// Merged stdout/stderr of a successful run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommandRun {
    pub output: String,
}

/// Positional values starting with `-` would be parsed as options
fn reject_option_like(name: &str, value: &str) -> Result<(), String> {
    if value.trim_start().starts_with('-') {
        Err(format!("Error: {} must not start with '-': {}", name, value))
    } else {
        Ok(())
    }
}

/// Render `extra_vars` the way `--extra-vars` accepts it
fn extra_vars_arg(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}

impl Ansible {
    pub fn new(config: AnsibleConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// Whether the Ansible CLI is installed
    pub fn is_available() -> bool {
        which::which("ansible-playbook").is_ok()
    }

    fn inventory(&self, inventory: Option<String>) -> Option<String> {
        inventory
            .filter(|i| !i.is_empty())
            .or_else(|| self.config.default_inventory.clone())
            .filter(|i| !i.is_empty())
    }

    async fn execute(&self, args: Vec<String>) -> Envelope<CommandRun> {
        let program = args.first().cloned().unwrap_or_default();

        match self.runner.run(&args).await {
            Ok(output) if output.success() => Envelope::ok(CommandRun {
                output: output.output,
            }),
            Ok(output) => {
                debug!(program = %program, exit_code = output.exit_code, "Ansible command failed");
                if output.output.trim().is_empty() {
                    Envelope::failed(format!(
                        "{} exited with status {}",
                        program, output.exit_code
                    ))
                } else {
                    Envelope::failed(output.output)
                }
            }
            Err(e) => Envelope::failed(failure(&format!("running {}", program), &e.to_string())),
        }
    }

    /// Argument vector for `ansible-playbook`
    pub fn playbook_args(&self, params: PlaybookRunParams) -> Vec<String> {
        let mut args = vec!["ansible-playbook".to_string(), params.playbook];

        if let Some(inventory) = self.inventory(params.inventory) {
            args.push("-i".to_string());
            args.push(inventory);
        }
        if let Some(limit) = params.limit.filter(|l| !l.is_empty()) {
            args.push("--limit".to_string());
            args.push(limit);
        }
        if let Some(tags) = params.tags.filter(|t| !t.is_empty()) {
            args.push("--tags".to_string());
            args.push(tags);
        }
        if let Some(extra_vars) = params.extra_vars.and_then(extra_vars_arg) {
            args.push("--extra-vars".to_string());
            args.push(extra_vars);
        }
        if flag(&params.check) {
            args.push("--check".to_string());
        }
        if flag(&params.verbose) {
            args.push("-v".to_string());
        }

        args
    }

    pub async fn playbook_run(&self, params: PlaybookRunParams) -> Envelope<CommandRun> {
        if let Err(e) = reject_option_like("playbook", &params.playbook) {
            return Envelope::failed(e);
        }
        debug!(playbook = %params.playbook, check = %params.check, "Running playbook");
        let args = self.playbook_args(params);
        self.execute(args).await
    }

    pub async fn adhoc(&self, params: AdhocParams) -> Envelope<CommandRun> {
        if let Err(e) = reject_option_like("hosts", &params.hosts) {
            return Envelope::failed(e);
        }
        let mut args = vec!["ansible".to_string(), params.hosts];

        if let Some(inventory) = self.inventory(params.inventory) {
            args.push("-i".to_string());
            args.push(inventory);
        }
        args.push("-m".to_string());
        args.push(if params.module.is_empty() {
            default_module()
        } else {
            params.module
        });
        if let Some(module_args) = params.args.filter(|a| !a.is_empty()) {
            args.push("-a".to_string());
            args.push(module_args);
        }
        if flag(&params.become_root) {
            args.push("--become".to_string());
        }

        debug!(command = ?args, "Running ad-hoc command");
        self.execute(args).await
    }

    pub async fn inventory_list(&self, params: InventoryParams) -> Envelope<CommandRun> {
        let mut args = vec!["ansible-inventory".to_string(), "--list".to_string()];
        if let Some(inventory) = self.inventory(params.inventory) {
            args.push("-i".to_string());
            args.push(inventory);
        }
        self.execute(args).await
    }

    pub async fn playbook_syntax_check(&self, params: SyntaxCheckParams) -> Envelope<CommandRun> {
        if let Err(e) = reject_option_like("playbook", &params.playbook) {
            return Envelope::failed(e);
        }
        let mut args = vec!["ansible-playbook".to_string(), params.playbook];
        if let Some(inventory) = self.inventory(params.inventory) {
            args.push("-i".to_string());
            args.push(inventory);
        }
        args.push("--syntax-check".to_string());
        self.execute(args).await
    }

    fn process_tool(&self, name: &str, description: &str, parameters: Value) -> ToolConfig {
        tool_config_with_timeout(
            name,
            description,
            parameters,
            ToolType::Process,
            FailureContract::Structured,
            self.config.timeout_secs,
        )
    }
}

#[async_trait]
impl Adapter for Ansible {
    fn category(&self) -> ToolCategory {
        ToolCategory::Automation
    }

    fn operations(&self) -> Vec<ToolConfig> {
        let inventory = json!({
            "type": "string",
            "description": "Inventory file, directory or comma-separated host list"
        });
        let bool_flag = |description: &str| {
            json!({
                "type": "string",
                "description": description,
                "enum": ["true", "false"],
                "default": "false"
            })
        };

        vec![
            self.process_tool(
                "ansible_playbook_run",
                "Run an Ansible playbook. Use check='true' for a dry run.",
                create_schema(
                    json!({
                        "playbook": { "type": "string", "description": "Playbook path (e.g., 'site.yml')" },
                        "inventory": inventory.clone(),
                        "limit": { "type": "string", "description": "Limit to a host pattern" },
                        "tags": { "type": "string", "description": "Only run tasks with these comma-separated tags" },
                        "extra_vars": {
                            "type": ["string", "object"],
                            "description": "Extra variables as 'key=value ...' or a JSON object"
                        },
                        "check": bool_flag("Dry run without making changes ('true'/'false')"),
                        "verbose": bool_flag("Verbose output ('true'/'false')")
                    }),
                    vec!["playbook"],
                ),
            ),
            self.process_tool(
                "ansible_adhoc",
                "Run a single Ansible module against hosts (e.g., ping, shell, service).",
                create_schema(
                    json!({
                        "hosts": { "type": "string", "description": "Host pattern (e.g., 'web', 'all')" },
                        "module": { "type": "string", "description": "Module name", "default": "ping" },
                        "args": { "type": "string", "description": "Module arguments (e.g., 'name=nginx state=restarted')" },
                        "inventory": inventory.clone(),
                        "become": bool_flag("Run with privilege escalation ('true'/'false')")
                    }),
                    vec!["hosts"],
                ),
            ),
            self.process_tool(
                "ansible_inventory_list",
                "Show the resolved inventory (groups, hosts, variables) as JSON.",
                create_schema(json!({ "inventory": inventory.clone() }), vec![]),
            ),
            self.process_tool(
                "ansible_playbook_syntax_check",
                "Check a playbook's syntax without executing it.",
                create_schema(
                    json!({
                        "playbook": { "type": "string", "description": "Playbook path" },
                        "inventory": inventory
                    }),
                    vec!["playbook"],
                ),
            ),
        ]
    }

    async fn dispatch(&self, operation: &str, input: ToolInput) -> AtkResult<ToolResult> {
        Ok(match operation {
            "ansible_playbook_run" => {
                ToolResult::from_envelope(self.playbook_run(input.parse()?).await)
            }
            "ansible_adhoc" => ToolResult::from_envelope(self.adhoc(input.parse()?).await),
            "ansible_inventory_list" => {
                ToolResult::from_envelope(self.inventory_list(input.parse()?).await)
            }
            "ansible_playbook_syntax_check" => {
                ToolResult::from_envelope(self.playbook_syntax_check(input.parse()?).await)
            }
            other => return Err(unknown_operation(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRunner;
    use atk_core::TransportError;

    fn playbook(value: Value) -> PlaybookRunParams {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_playbook_check_mode_command_line() {
        let runner = MockRunner::new();
        runner.push_output(0, "PLAY RECAP ok=3");
        let ansible = Ansible::new(AnsibleConfig::default(), runner.clone());

        let envelope = ansible
            .playbook_run(playbook(json!({
                "playbook": "site.yml",
                "inventory": "hosts.ini",
                "check": "true"
            })))
            .await;

        assert_eq!(
            runner.last_command_line(),
            "ansible-playbook site.yml -i hosts.ini --check"
        );
        assert!(envelope.success);
        assert_eq!(envelope.data.output, "PLAY RECAP ok=3");
        assert_eq!(envelope.error, "");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_structured_failure() {
        let runner = MockRunner::new();
        runner.push_output(2, "ERROR! the playbook: missing.yml could not be found");
        let ansible = Ansible::new(AnsibleConfig::default(), runner.clone());

        let envelope = ansible
            .playbook_run(playbook(json!({"playbook": "missing.yml"})))
            .await;

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "success": false,
                "output": "",
                "error": "ERROR! the playbook: missing.yml could not be found"
            })
        );
    }

    #[tokio::test]
    async fn test_full_argument_order() {
        let runner = MockRunner::new();
        runner.push_output(0, "");
        let config = AnsibleConfig {
            default_inventory: Some("inventory/prod".into()),
            ..AnsibleConfig::default()
        };
        let ansible = Ansible::new(config, runner.clone());

        ansible
            .playbook_run(playbook(json!({
                "playbook": "deploy.yml",
                "limit": "web*",
                "tags": "app,config",
                "extra_vars": {"version": "1.2.3"},
                "verbose": "true"
            })))
            .await;

        let args = &runner.calls()[0];
        assert_eq!(
            args,
            &vec![
                "ansible-playbook",
                "deploy.yml",
                "-i",
                "inventory/prod",
                "--limit",
                "web*",
                "--tags",
                "app,config",
                "--extra-vars",
                r#"{"version":"1.2.3"}"#,
                "-v",
            ]
        );
        assert_eq!(
            runner.last_command_line(),
            r#"ansible-playbook deploy.yml -i inventory/prod --limit 'web*' --tags app,config --extra-vars '{"version":"1.2.3"}' -v"#
        );
    }

    #[tokio::test]
    async fn test_flags_require_exact_true() {
        let runner = MockRunner::new();
        runner.push_output(0, "");
        let ansible = Ansible::new(AnsibleConfig::default(), runner.clone());

        ansible
            .playbook_run(playbook(json!({
                "playbook": "site.yml",
                "check": "yes",
                "verbose": "TRUE"
            })))
            .await;
        assert_eq!(runner.last_command_line(), "ansible-playbook site.yml");
    }

    #[tokio::test]
    async fn test_adhoc_defaults_to_ping() {
        let runner = MockRunner::new();
        runner.push_output(0, "web1 | SUCCESS => {\"ping\": \"pong\"}");
        let ansible = Ansible::new(AnsibleConfig::default(), runner.clone());

        let envelope = ansible
            .adhoc(serde_json::from_value(json!({"hosts": "all"})).unwrap())
            .await;
        assert_eq!(runner.last_command_line(), "ansible all -m ping");
        assert!(envelope.success);
    }

    #[tokio::test]
    async fn test_adhoc_args_are_escaped() {
        let runner = MockRunner::new();
        runner.push_output(0, "");
        let ansible = Ansible::new(AnsibleConfig::default(), runner.clone());

        ansible
            .adhoc(
                serde_json::from_value(json!({
                    "hosts": "web",
                    "module": "shell",
                    "args": "uptime; rm -rf /",
                    "become": "true"
                }))
                .unwrap(),
            )
            .await;
        assert_eq!(
            runner.calls()[0],
            vec!["ansible", "web", "-m", "shell", "-a", "uptime; rm -rf /", "--become"]
        );
        assert_eq!(
            runner.last_command_line(),
            "ansible web -m shell -a 'uptime; rm -rf /' --become"
        );
    }

    #[tokio::test]
    async fn test_option_like_positionals_are_rejected() {
        let runner = MockRunner::new();
        let ansible = Ansible::new(AnsibleConfig::default(), runner.clone());

        let envelope = ansible
            .playbook_run(playbook(json!({"playbook": "--version"})))
            .await;
        assert!(!envelope.success);
        assert_eq!(envelope.error, "Error: playbook must not start with '-': --version");

        let envelope = ansible
            .adhoc(serde_json::from_value(json!({"hosts": "-i/etc/passwd"})).unwrap())
            .await;
        assert!(!envelope.success);
        assert!(envelope.error.starts_with("Error: hosts must not start with '-'"));

        let envelope = ansible
            .playbook_syntax_check(SyntaxCheckParams {
                playbook: "-e".into(),
                inventory: None,
            })
            .await;
        assert!(!envelope.success);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_inventory_and_syntax_check() {
        let runner = MockRunner::new();
        runner.push_output(0, "{}").push_output(0, "playbook: site.yml");
        let config = AnsibleConfig {
            default_inventory: Some("hosts.ini".into()),
            ..AnsibleConfig::default()
        };
        let ansible = Ansible::new(config, runner.clone());

        ansible.inventory_list(InventoryParams { inventory: None }).await;
        assert_eq!(
            runner.last_command_line(),
            "ansible-inventory --list -i hosts.ini"
        );

        ansible
            .playbook_syntax_check(SyntaxCheckParams {
                playbook: "site.yml".into(),
                inventory: Some("staging.ini".into()),
            })
            .await;
        assert_eq!(
            runner.last_command_line(),
            "ansible-playbook site.yml -i staging.ini --syntax-check"
        );
    }

    #[tokio::test]
    async fn test_runner_failure() {
        let runner = MockRunner::new();
        runner.push_error(TransportError::Timeout("Command timed out after 600s".into()));
        let ansible = Ansible::new(AnsibleConfig::default(), runner.clone());

        let envelope = ansible
            .playbook_run(playbook(json!({"playbook": "site.yml"})))
            .await;
        assert!(!envelope.success);
        assert!(envelope
            .error
            .starts_with("Error running ansible-playbook: request timed out"));
    }

    #[tokio::test]
    async fn test_silent_failure_reports_status() {
        let runner = MockRunner::new();
        runner.push_output(4, "");
        let ansible = Ansible::new(AnsibleConfig::default(), runner.clone());

        let envelope = ansible.inventory_list(InventoryParams { inventory: None }).await;
        assert_eq!(envelope.error, "ansible-inventory exited with status 4");
    }

    #[test]
    fn test_operations_use_configured_timeout() {
        let config = AnsibleConfig {
            timeout_secs: 1200,
            ..AnsibleConfig::default()
        };
        let ansible = Ansible::new(config, MockRunner::new());
        let operations = ansible.operations();
        assert_eq!(operations.len(), 4);
        assert!(operations.iter().all(|op| op.timeout_secs == 1200));
        assert!(operations
            .iter()
            .all(|op| op.failure_contract == FailureContract::Structured));
    }
}

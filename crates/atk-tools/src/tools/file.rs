//! File Management Tools
//!
//! Read, write and organise files on the local filesystem. When a base
//! directory is configured every path is resolved against it and paths that
//! would escape it (through `..` or a symlink) are refused.
//!
//! ## Available Tools
//!
//! - `file_read` - Read a text file (capped at `max_read_bytes`)
//! - `file_write` - Write or append to a file, creating parent directories
//! - `file_copy` - Copy a file
//! - `file_move` - Move or rename a file or directory
//! - `file_delete` - Delete a file or directory
//! - `file_mkdir` - Create a directory and its parents
//! - `file_list` - List a directory, optionally filtered by a glob pattern
//! - `file_info` - Size, type and modification time of a path

use atk_core::{AtkResult, Envelope, FailureContract, ToolConfig, ToolInput, ToolResult, ToolType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use super::common::{create_schema, failure, flag, tool_config};
use crate::adapter::{unknown_operation, Adapter};
use crate::registry::ToolCategory;

pub const DEFAULT_MAX_READ_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileManagerConfig {
    /// Root every path is confined to
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    #[serde(default = "default_max_read_bytes")]
    pub max_read_bytes: u64,
}

fn default_max_read_bytes() -> u64 {
    DEFAULT_MAX_READ_BYTES
}

impl Default for FileManagerConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
        }
    }
}

pub struct FileManager {
    config: FileManagerConfig,
}

// ============================================================================
// Parameters
// ============================================================================

fn default_false() -> String {
    "false".to_string()
}

fn default_dot() -> String {
    ".".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathParams {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriteParams {
    pub path: String,
    pub content: String,
    #[serde(default = "default_false")]
    pub append: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferParams {
    pub source: String,
    pub destination: String,
    #[serde(default = "default_false")]
    pub overwrite: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteParams {
    pub path: String,
    #[serde(default = "default_false")]
    pub recursive: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_dot")]
    pub path: String,
    #[serde(default)]
    pub pattern: Option<String>,
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileContent {
    pub path: String,
    pub content: String,
    pub size: u64,
    pub bytes_read: u64,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteResult {
    pub path: String,
    pub bytes_written: u64,
    pub appended: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferResult {
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeleteResult {
    pub path: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MkdirResult {
    pub path: String,
    /// False when the directory already existed
    pub created: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DirectoryListing {
    pub path: String,
    pub entries: Vec<DirEntry>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileInfo {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub size: u64,
    /// RFC 3339, empty when the platform does not report it
    pub modified: String,
    pub readonly: bool,
}

fn entry_type(file_type: &std::fs::FileType) -> &'static str {
    if file_type.is_symlink() {
        "symlink"
    } else if file_type.is_dir() {
        "directory"
    } else {
        "file"
    }
}

/// Resolve `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize the deepest existing ancestor and re-append the rest,
/// so symlinks are followed even for paths that do not exist yet
fn canonicalize_existing(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut rest: Vec<OsString> = Vec::new();
    loop {
        if let Ok(mut real) = std::fs::canonicalize(existing) {
            for name in rest.iter().rev() {
                real.push(name);
            }
            return real;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

async fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}

impl FileManager {
    pub fn new(config: FileManagerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FileManagerConfig {
        &self.config
    }

    /// Map a caller path to a filesystem path inside the base directory
    pub fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        if path.trim().is_empty() {
            return Err("path is empty".to_string());
        }

        let Some(base_dir) = &self.config.base_dir else {
            return Ok(PathBuf::from(path));
        };

        let base = std::fs::canonicalize(base_dir).map_err(|e| {
            format!("base directory {} is not accessible: {}", base_dir.display(), e)
        })?;

        let candidate = normalize(&base.join(path));
        if !candidate.starts_with(&base) || !canonicalize_existing(&candidate).starts_with(&base) {
            return Err(format!("Path {} is outside the base directory", path));
        }

        Ok(candidate)
    }

    pub async fn read(&self, params: PathParams) -> Envelope<FileContent> {
        const ACTION: &str = "reading file";

        let path = match self.resolve(&params.path) {
            Ok(path) => path,
            Err(e) => return Envelope::failed(failure(ACTION, &e)),
        };

        debug!(path = %path.display(), "Reading file");

        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(_) => {
                return Envelope::failed(failure(
                    ACTION,
                    &format!("File not found: {}", params.path),
                ))
            }
        };
        if !metadata.is_file() {
            return Envelope::failed(failure(ACTION, &format!("Not a file: {}", params.path)));
        }

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) => return Envelope::failed(failure(ACTION, &e.to_string())),
        };

        let mut buffer = Vec::new();
        if let Err(e) = file
            .take(self.config.max_read_bytes)
            .read_to_end(&mut buffer)
            .await
        {
            return Envelope::failed(failure(ACTION, &e.to_string()));
        }

        let bytes_read = buffer.len() as u64;
        Envelope::ok(FileContent {
            path: path.display().to_string(),
            content: String::from_utf8_lossy(&buffer).into_owned(),
            size: metadata.len(),
            bytes_read,
            truncated: bytes_read < metadata.len(),
        })
    }

    pub async fn write(&self, params: WriteParams) -> Envelope<WriteResult> {
        const ACTION: &str = "writing file";

        let path = match self.resolve(&params.path) {
            Ok(path) => path,
            Err(e) => return Envelope::failed(failure(ACTION, &e)),
        };
        let append = flag(&params.append);

        debug!(path = %path.display(), append = append, "Writing file");

        if let Err(e) = ensure_parent(&path).await {
            return Envelope::failed(failure(ACTION, &format!("Failed to create directories: {}", e)));
        }

        let result = if append {
            match fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
            {
                Ok(mut file) => match file.write_all(params.content.as_bytes()).await {
                    Ok(()) => file.flush().await,
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            }
        } else {
            fs::write(&path, &params.content).await
        };

        match result {
            Ok(()) => Envelope::ok(WriteResult {
                path: path.display().to_string(),
                bytes_written: params.content.len() as u64,
                appended: append,
            }),
            Err(e) => Envelope::failed(failure(ACTION, &e.to_string())),
        }
    }

    /// Validate both ends of a copy or move
    async fn transfer_paths(&self, params: &TransferParams) -> Result<(PathBuf, PathBuf), String> {
        let source = self.resolve(&params.source)?;
        let destination = self.resolve(&params.destination)?;

        if fs::symlink_metadata(&source).await.is_err() {
            return Err(format!("Source not found: {}", params.source));
        }
        if !flag(&params.overwrite) && fs::symlink_metadata(&destination).await.is_ok() {
            return Err(format!("Destination already exists: {}", params.destination));
        }

        ensure_parent(&destination)
            .await
            .map_err(|e| format!("Failed to create directories: {}", e))?;

        Ok((source, destination))
    }

    pub async fn copy(&self, params: TransferParams) -> Envelope<TransferResult> {
        const ACTION: &str = "copying file";

        let (source, destination) = match self.transfer_paths(&params).await {
            Ok(paths) => paths,
            Err(e) => return Envelope::failed(failure(ACTION, &e)),
        };

        debug!(source = %source.display(), destination = %destination.display(), "Copying file");

        if fs::metadata(&source).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Envelope::failed(failure(
                ACTION,
                &format!("Source is a directory: {}", params.source),
            ));
        }

        match fs::copy(&source, &destination).await {
            Ok(_) => Envelope::ok(TransferResult {
                source: source.display().to_string(),
                destination: destination.display().to_string(),
            }),
            Err(e) => Envelope::failed(failure(ACTION, &e.to_string())),
        }
    }

    pub async fn rename(&self, params: TransferParams) -> Envelope<TransferResult> {
        const ACTION: &str = "moving file";

        let (source, destination) = match self.transfer_paths(&params).await {
            Ok(paths) => paths,
            Err(e) => return Envelope::failed(failure(ACTION, &e)),
        };

        debug!(source = %source.display(), destination = %destination.display(), "Moving file");

        let mut result = fs::rename(&source, &destination).await;

        // Across filesystems a rename fails; regular files fall back to copy + remove
        if result.is_err() && fs::metadata(&source).await.map(|m| m.is_file()).unwrap_or(false) {
            result = match fs::copy(&source, &destination).await {
                Ok(_) => fs::remove_file(&source).await,
                Err(e) => Err(e),
            };
        }

        match result {
            Ok(()) => Envelope::ok(TransferResult {
                source: source.display().to_string(),
                destination: destination.display().to_string(),
            }),
            Err(e) => Envelope::failed(failure(ACTION, &e.to_string())),
        }
    }

    pub async fn delete(&self, params: DeleteParams) -> Envelope<DeleteResult> {
        const ACTION: &str = "deleting file";

        let path = match self.resolve(&params.path) {
            Ok(path) => path,
            Err(e) => return Envelope::failed(failure(ACTION, &e)),
        };

        if self.config.base_dir.is_some() && self.resolve(".").ok().as_ref() == Some(&path) {
            return Envelope::failed(failure(ACTION, "Refusing to delete the base directory"));
        }

        let metadata = match fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(_) => {
                return Envelope::failed(failure(
                    ACTION,
                    &format!("Path not found: {}", params.path),
                ))
            }
        };

        debug!(path = %path.display(), recursive = %params.recursive, "Deleting path");

        let result = if metadata.is_dir() {
            if flag(&params.recursive) {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_dir(&path).await
            }
        } else {
            fs::remove_file(&path).await
        };

        match result {
            Ok(()) => Envelope::ok(DeleteResult {
                path: path.display().to_string(),
                deleted: true,
            }),
            Err(e) => Envelope::failed(failure(ACTION, &e.to_string())),
        }
    }

    pub async fn mkdir(&self, params: PathParams) -> Envelope<MkdirResult> {
        const ACTION: &str = "creating directory";

        let path = match self.resolve(&params.path) {
            Ok(path) => path,
            Err(e) => return Envelope::failed(failure(ACTION, &e)),
        };

        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => {
                return Envelope::ok(MkdirResult {
                    path: path.display().to_string(),
                    created: false,
                })
            }
            Ok(_) => {
                return Envelope::failed(failure(
                    ACTION,
                    &format!("A file already exists at {}", params.path),
                ))
            }
            Err(_) => {}
        }

        match fs::create_dir_all(&path).await {
            Ok(()) => Envelope::ok(MkdirResult {
                path: path.display().to_string(),
                created: true,
            }),
            Err(e) => Envelope::failed(failure(ACTION, &e.to_string())),
        }
    }

    pub async fn list(&self, params: ListParams) -> Envelope<DirectoryListing> {
        const ACTION: &str = "listing directory";

        let path = match self.resolve(&params.path) {
            Ok(path) => path,
            Err(e) => return Envelope::failed(failure(ACTION, &e)),
        };

        let pattern = match params.pattern.as_deref().filter(|p| !p.is_empty()) {
            Some(p) => match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => return Envelope::failed(failure(ACTION, &format!("Invalid pattern: {}", e))),
            },
            None => None,
        };

        debug!(path = %path.display(), pattern = ?params.pattern, "Listing directory");

        let mut dir = match fs::read_dir(&path).await {
            Ok(dir) => dir,
            Err(_) => {
                return Envelope::failed(failure(
                    ACTION,
                    &format!("Directory not found: {}", params.path),
                ))
            }
        };

        let mut entries = Vec::new();
        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Envelope::failed(failure(ACTION, &e.to_string())),
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(pattern) = &pattern {
                if !pattern.matches(&name) {
                    continue;
                }
            }

            let (kind, size) = match entry.file_type().await {
                Ok(file_type) => {
                    let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                    (entry_type(&file_type), size)
                }
                Err(_) => ("file", 0),
            };

            entries.push(DirEntry {
                name,
                path: entry.path().display().to_string(),
                entry_type: kind.to_string(),
                size,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Envelope::ok(DirectoryListing {
            path: path.display().to_string(),
            count: entries.len(),
            entries,
        })
    }

    pub async fn info(&self, params: PathParams) -> Envelope<FileInfo> {
        const ACTION: &str = "getting file info";

        let path = match self.resolve(&params.path) {
            Ok(path) => path,
            Err(e) => return Envelope::failed(failure(ACTION, &e)),
        };

        let metadata = match fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(_) => {
                return Envelope::failed(failure(
                    ACTION,
                    &format!("Path not found: {}", params.path),
                ))
            }
        };

        let modified = metadata
            .modified()
            .map(|time| DateTime::<Utc>::from(time).to_rfc3339())
            .unwrap_or_default();

        Envelope::ok(FileInfo {
            path: path.display().to_string(),
            entry_type: entry_type(&metadata.file_type()).to_string(),
            size: metadata.len(),
            modified,
            readonly: metadata.permissions().readonly(),
        })
    }
}

fn file_tool(name: &str, description: &str, parameters: Value) -> ToolConfig {
    tool_config(
        name,
        description,
        parameters,
        ToolType::Filesystem,
        FailureContract::Structured,
    )
}

#[async_trait]
impl Adapter for FileManager {
    fn category(&self) -> ToolCategory {
        ToolCategory::Files
    }

    fn operations(&self) -> Vec<ToolConfig> {
        let path = json!({ "type": "string", "description": "File path (relative to the base directory when one is configured)" });
        let overwrite = json!({
            "type": "string",
            "description": "Replace an existing destination ('true'/'false')",
            "enum": ["true", "false"],
            "default": "false"
        });
        let transfer = json!({
            "source": { "type": "string", "description": "Source path" },
            "destination": { "type": "string", "description": "Destination path" },
            "overwrite": overwrite
        });

        vec![
            file_tool(
                "file_read",
                "Read the contents of a text file.",
                create_schema(json!({ "path": path.clone() }), vec!["path"]),
            ),
            file_tool(
                "file_write",
                "Write content to a file, creating parent directories as needed.",
                create_schema(
                    json!({
                        "path": path.clone(),
                        "content": { "type": "string", "description": "Content to write" },
                        "append": {
                            "type": "string",
                            "description": "Append instead of overwriting ('true'/'false')",
                            "enum": ["true", "false"],
                            "default": "false"
                        }
                    }),
                    vec!["path", "content"],
                ),
            ),
            file_tool(
                "file_copy",
                "Copy a file.",
                create_schema(transfer.clone(), vec!["source", "destination"]),
            ),
            file_tool(
                "file_move",
                "Move or rename a file or directory.",
                create_schema(transfer, vec!["source", "destination"]),
            ),
            file_tool(
                "file_delete",
                "Delete a file or directory.",
                create_schema(
                    json!({
                        "path": path.clone(),
                        "recursive": {
                            "type": "string",
                            "description": "Delete non-empty directories ('true'/'false')",
                            "enum": ["true", "false"],
                            "default": "false"
                        }
                    }),
                    vec!["path"],
                ),
            ),
            file_tool(
                "file_mkdir",
                "Create a directory and any missing parents.",
                create_schema(json!({ "path": path.clone() }), vec!["path"]),
            ),
            file_tool(
                "file_list",
                "List a directory's entries with type and size.",
                create_schema(
                    json!({
                        "path": {
                            "type": "string",
                            "description": "Directory to list",
                            "default": "."
                        },
                        "pattern": {
                            "type": "string",
                            "description": "Glob matched against entry names (e.g., '*.log')"
                        }
                    }),
                    vec![],
                ),
            ),
            file_tool(
                "file_info",
                "Get the type, size and modification time of a path.",
                create_schema(json!({ "path": path }), vec!["path"]),
            ),
        ]
    }

    async fn dispatch(&self, operation: &str, input: ToolInput) -> AtkResult<ToolResult> {
        Ok(match operation {
            "file_read" => ToolResult::from_envelope(self.read(input.parse()?).await),
            "file_write" => ToolResult::from_envelope(self.write(input.parse()?).await),
            "file_copy" => ToolResult::from_envelope(self.copy(input.parse()?).await),
            "file_move" => ToolResult::from_envelope(self.rename(input.parse()?).await),
            "file_delete" => ToolResult::from_envelope(self.delete(input.parse()?).await),
            "file_mkdir" => ToolResult::from_envelope(self.mkdir(input.parse()?).await),
            "file_list" => ToolResult::from_envelope(self.list(input.parse()?).await),
            "file_info" => ToolResult::from_envelope(self.info(input.parse()?).await),
            other => return Err(unknown_operation(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn confined(dir: &TempDir) -> FileManager {
        FileManager::new(FileManagerConfig {
            base_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        })
    }

    fn path_params(path: &str) -> PathParams {
        PathParams {
            path: path.to_string(),
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize(Path::new("/a/../../b")), PathBuf::from("/b"));
    }

    #[test]
    fn test_resolve_confines_to_base() {
        let dir = TempDir::new().unwrap();
        let files = confined(&dir);
        let base = std::fs::canonicalize(dir.path()).unwrap();

        assert_eq!(files.resolve("notes/a.txt").unwrap(), base.join("notes/a.txt"));
        assert_eq!(files.resolve("notes/../b.txt").unwrap(), base.join("b.txt"));
        assert!(files.resolve("../outside.txt").is_err());
        assert!(files.resolve("/etc/passwd").is_err());
        assert!(files.resolve("").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_refuses_symlink_escape() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let err = confined(&dir).resolve("link/secret.txt").unwrap_err();
        assert!(err.contains("outside the base directory"));
    }

    #[test]
    fn test_unconfined_paths_pass_through() {
        let files = FileManager::new(FileManagerConfig::default());
        assert_eq!(files.resolve("/tmp/x").unwrap(), PathBuf::from("/tmp/x"));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let files = confined(&dir);

        let written = files
            .write(WriteParams {
                path: "logs/app.log".into(),
                content: "line one\n".into(),
                append: "false".into(),
            })
            .await;
        assert!(written.success);
        assert_eq!(written.data.bytes_written, 9);

        let appended = files
            .write(WriteParams {
                path: "logs/app.log".into(),
                content: "line two\n".into(),
                append: "true".into(),
            })
            .await;
        assert!(appended.data.appended);

        let read = files.read(path_params("logs/app.log")).await;
        assert!(read.success);
        assert_eq!(read.data.content, "line one\nline two\n");
        assert!(!read.data.truncated);
    }

    #[tokio::test]
    async fn test_read_truncates_at_limit() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("big.txt"), "0123456789").unwrap();
        let files = FileManager::new(FileManagerConfig {
            base_dir: Some(dir.path().to_path_buf()),
            max_read_bytes: 4,
        });

        let read = files.read(path_params("big.txt")).await;
        assert_eq!(read.data.content, "0123");
        assert_eq!(read.data.size, 10);
        assert!(read.data.truncated);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let read = confined(&dir).read(path_params("missing.txt")).await;

        let value = serde_json::to_value(&read).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["content"], "");
        assert_eq!(value["error"], "Error reading file: File not found: missing.txt");
    }

    #[tokio::test]
    async fn test_read_outside_base_is_refused() {
        let dir = TempDir::new().unwrap();
        let read = confined(&dir).read(path_params("../../etc/passwd")).await;
        assert!(!read.success);
        assert!(read.error.starts_with("Error reading file: Path ../../etc/passwd is outside"));
    }

    #[tokio::test]
    async fn test_copy_respects_overwrite() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(dir.path().join("b.txt"), "beta").unwrap();
        let files = confined(&dir);

        let refused = files
            .copy(TransferParams {
                source: "a.txt".into(),
                destination: "b.txt".into(),
                overwrite: "false".into(),
            })
            .await;
        assert!(!refused.success);
        assert_eq!(
            refused.error,
            "Error copying file: Destination already exists: b.txt"
        );
        assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "beta");

        let copied = files
            .copy(TransferParams {
                source: "a.txt".into(),
                destination: "nested/c.txt".into(),
                overwrite: "false".into(),
            })
            .await;
        assert!(copied.success);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("nested/c.txt")).unwrap(),
            "alpha"
        );
    }

    #[tokio::test]
    async fn test_move_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("old.txt"), "data").unwrap();

        let moved = confined(&dir)
            .rename(TransferParams {
                source: "old.txt".into(),
                destination: "archive/new.txt".into(),
                overwrite: "false".into(),
            })
            .await;
        assert!(moved.success);
        assert!(!dir.path().join("old.txt").exists());
        assert!(dir.path().join("archive/new.txt").exists());
    }

    #[tokio::test]
    async fn test_move_missing_source() {
        let dir = TempDir::new().unwrap();
        let moved = confined(&dir)
            .rename(TransferParams {
                source: "ghost.txt".into(),
                destination: "x.txt".into(),
                overwrite: "true".into(),
            })
            .await;
        assert_eq!(moved.error, "Error moving file: Source not found: ghost.txt");
        assert_eq!(moved.data, TransferResult::default());
    }

    #[tokio::test]
    async fn test_delete_directory_needs_recursive() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("build/out")).unwrap();
        std::fs::write(dir.path().join("build/out/a.o"), "x").unwrap();
        let files = confined(&dir);

        let refused = files
            .delete(DeleteParams {
                path: "build".into(),
                recursive: "false".into(),
            })
            .await;
        assert!(!refused.success);
        assert!(dir.path().join("build").exists());

        let deleted = files
            .delete(DeleteParams {
                path: "build".into(),
                recursive: "true".into(),
            })
            .await;
        assert!(deleted.data.deleted);
        assert!(!dir.path().join("build").exists());
    }

    #[tokio::test]
    async fn test_delete_base_dir_is_refused() {
        let dir = TempDir::new().unwrap();
        let deleted = confined(&dir)
            .delete(DeleteParams {
                path: ".".into(),
                recursive: "true".into(),
            })
            .await;
        assert!(!deleted.success);
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn test_mkdir_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let files = confined(&dir);

        let first = files.mkdir(path_params("a/b/c")).await;
        assert!(first.success);
        assert!(first.data.created);

        let second = files.mkdir(path_params("a/b/c")).await;
        assert!(second.success);
        assert!(!second.data.created);
    }

    #[tokio::test]
    async fn test_list_with_pattern() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.log"), "12").unwrap();
        std::fs::write(dir.path().join("a.log"), "1").unwrap();
        std::fs::write(dir.path().join("readme.md"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let files = confined(&dir);

        let all = files
            .list(ListParams {
                path: ".".into(),
                pattern: None,
            })
            .await;
        assert_eq!(all.data.count, 4);
        let sub = all.data.entries.iter().find(|e| e.name == "sub").unwrap();
        assert_eq!(sub.entry_type, "directory");

        let logs = files
            .list(ListParams {
                path: ".".into(),
                pattern: Some("*.log".into()),
            })
            .await;
        let names: Vec<_> = logs.data.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.log", "b.log"]);
        assert_eq!(logs.data.entries[1].size, 2);
    }

    #[tokio::test]
    async fn test_list_missing_directory() {
        let dir = TempDir::new().unwrap();
        let listing = confined(&dir)
            .list(ListParams {
                path: "nope".into(),
                pattern: None,
            })
            .await;
        assert_eq!(listing.error, "Error listing directory: Directory not found: nope");
        assert!(listing.data.entries.is_empty());
    }

    #[tokio::test]
    async fn test_info() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let info = confined(&dir).info(path_params("a.txt")).await;
        assert!(info.success);
        assert_eq!(info.data.entry_type, "file");
        assert_eq!(info.data.size, 5);
        assert!(DateTime::parse_from_rfc3339(&info.data.modified).is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_requires_path() {
        let dir = TempDir::new().unwrap();
        let result = confined(&dir)
            .dispatch("file_read", ToolInput::new(json!({})))
            .await;
        assert!(result.is_err());
    }
}

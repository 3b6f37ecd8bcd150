//! Workspace-confined filesystem tools.
//!
//! Every path argument is resolved against the tool's `init_path` and refused if
//! it normalizes to somewhere outside it. Results are JSON documents rendered to
//! a string.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::core::tool::ToolCategory;
use crate::tools::types::{
    bind_params, str_arg, ConstructorParam, NativeTool, NullObserver, ProcessType, ToolClass,
    ToolError, ToolObserver,
};

const LARGE_FILE_BYTES: u64 = 10 * 1024 * 1024;
const LARGE_DIRECTORY_ITEMS: u64 = 100;
const MAX_LIST_DEPTH: u64 = 10;

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// Directory every file tool operation is confined to.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(init_path: &str) -> Result<Self, ToolError> {
        let absolute = std::path::absolute(init_path).map_err(|e| {
            ToolError::InvalidInput(format!("invalid init_path '{}': {}", init_path, e))
        })?;
        Ok(Self {
            root: normalize(&absolute),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a user path (relative to the root, or absolute) inside the workspace.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let trimmed = path.trim();
        let candidate = if trimmed.is_empty() || trimmed == "." {
            self.root.clone()
        } else if Path::new(trimmed).is_absolute() {
            PathBuf::from(trimmed)
        } else {
            self.root.join(trimmed)
        };

        let resolved = normalize(&candidate);
        if !resolved.starts_with(&self.root) {
            return Err(ToolError::PermissionDenied(format!(
                "operations are restricted to the workspace directory '{}'; '{}' is outside it",
                self.root.display(),
                resolved.display()
            )));
        }
        Ok(resolved)
    }

    /// Path relative to the root, `.` for the root itself.
    pub fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => path.display().to_string(),
        }
    }
}

/// Lexically collapse `.` and `..` components.
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

fn require_path<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str, ToolError> {
    let value = str_arg(args, key, None)?;
    if value.trim().is_empty() {
        return Err(ToolError::InvalidInput(format!("{} cannot be empty", key)));
    }
    Ok(value)
}

fn check_encoding(encoding: &str) -> Result<(), ToolError> {
    match encoding.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Ok(()),
        other => Err(ToolError::InvalidInput(format!(
            "unsupported encoding '{}'; only utf-8 is available",
            other
        ))),
    }
}

fn io_error(action: &str, path: &str, err: std::io::Error) -> ToolError {
    match err.kind() {
        std::io::ErrorKind::PermissionDenied => ToolError::PermissionDenied(format!(
            "cannot {} {}: check permissions",
            action, path
        )),
        std::io::ErrorKind::NotFound => {
            ToolError::Execution(format!("cannot {} {}: not found", action, path))
        }
        _ => ToolError::Execution(format!("cannot {} {}: {}", action, path, err)),
    }
}

/// Count entries and total file bytes below `dir`. Unreadable entries are skipped.
fn tally(dir: &Path) -> (u64, u64) {
    let mut items = 0;
    let mut bytes = 0;
    let Ok(entries) = fs::read_dir(dir) else {
        return (0, 0);
    };
    for entry in entries.flatten() {
        items += 1;
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if meta.is_dir() {
            let (sub_items, sub_bytes) = tally(&entry.path());
            items += sub_items;
            bytes += sub_bytes;
        } else {
            bytes += meta.len();
        }
    }
    (items, bytes)
}

fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{}B", bytes)
    } else if b < KB * KB {
        format!("{:.1}KB", b / KB)
    } else if b < KB * KB * KB {
        format!("{:.1}MB", b / (KB * KB))
    } else {
        format!("{:.1}GB", b / (KB * KB * KB))
    }
}

// ---------------------------------------------------------------------------
// Shared construction
// ---------------------------------------------------------------------------

fn file_tool_params(default_root: &str) -> Vec<ConstructorParam> {
    vec![
        ConstructorParam {
            name: "init_path",
            annotation: Some("str"),
            description: "Initial workspace path",
            default: Some(Value::String(default_root.to_string())),
            exclude: false,
        },
        ConstructorParam {
            name: "observer",
            annotation: Some("MessageObserver"),
            description: "Message observer",
            default: Some(Value::Null),
            exclude: true,
        },
    ]
}

/// State every constructed file tool carries.
struct FileToolContext {
    workspace: Workspace,
    observer: Arc<dyn ToolObserver>,
}

impl FileToolContext {
    fn build(
        default_root: &str,
        params: &Map<String, Value>,
        observer: Option<Arc<dyn ToolObserver>>,
    ) -> Result<Self, ToolError> {
        let bound = bind_params(&file_tool_params(default_root), params)?;
        let init_path = str_arg(&bound, "init_path", Some(default_root))?;
        Ok(Self {
            workspace: Workspace::new(init_path)?,
            observer: observer.unwrap_or_else(|| Arc::new(NullObserver)),
        })
    }

    fn announce(&self, running: &str, icon: &str, text: String) {
        self.observer.add_message(ProcessType::Tool, running);
        let card = json!([{ "icon": icon, "text": text }]);
        self.observer.add_message(ProcessType::Card, &card.to_string());
    }
}

macro_rules! file_tool_class {
    ($class:ident, $instance:ident, $name:literal, $description:expr, $inputs:expr) => {
        pub struct $class {
            default_root: String,
        }

        impl $class {
            pub fn new(default_root: impl Into<String>) -> Self {
                Self {
                    default_root: default_root.into(),
                }
            }
        }

        impl ToolClass for $class {
            fn name(&self) -> &'static str {
                $name
            }

            fn class_name(&self) -> &'static str {
                stringify!($class)
            }

            fn description(&self) -> &'static str {
                $description
            }

            fn inputs(&self) -> Value {
                $inputs
            }

            fn category(&self) -> Option<ToolCategory> {
                Some(ToolCategory::File)
            }

            fn constructor_params(&self) -> Vec<ConstructorParam> {
                file_tool_params(&self.default_root)
            }

            fn instantiate(
                &self,
                params: &Map<String, Value>,
                observer: Option<Arc<dyn ToolObserver>>,
            ) -> Result<Box<dyn NativeTool>, ToolError> {
                let ctx = FileToolContext::build(&self.default_root, params, observer)?;
                Ok(Box::new($instance { ctx }))
            }
        }

        struct $instance {
            ctx: FileToolContext,
        }
    };
}

// ---------------------------------------------------------------------------
// create_file
// ---------------------------------------------------------------------------

file_tool_class!(
    CreateFileTool,
    CreateFile,
    "create_file",
    "Create a file at the specified path and write content to it. Path should be relative to the workspace (e.g., 'documents/file.txt'). If content is empty, creates an empty file. Parent directories are created when missing.",
    json!({
        "file_path": {"type": "string", "description": "Relative path where the file should be created (e.g., 'documents/file.txt')"},
        "content": {"type": "string", "description": "Content to write to the file. If empty, creates an empty file", "nullable": true},
        "encoding": {"type": "string", "description": "File encoding, defaults to utf-8", "default": "utf-8", "nullable": true}
    })
);

impl NativeTool for CreateFile {
    fn forward(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let file_path = str_arg(args, "file_path", Some(""))?;
        self.ctx
            .announce("Creating file...", "file-plus", format!("Creating {}", file_path));

        let file_path = require_path(args, "file_path")?;
        let content = str_arg(args, "content", Some(""))?;
        let encoding = str_arg(args, "encoding", Some("utf-8"))?;
        check_encoding(encoding)?;

        let abs_path = self.ctx.workspace.resolve(file_path)?;
        if let Some(parent) = abs_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| io_error("create parent directories for", file_path, e))?;
                info!("Created parent directories: {}", parent.display());
            }
        }

        if abs_path.exists() {
            warn!("File already exists: {}", abs_path.display());
            self.ctx.observer.add_message(
                ProcessType::Other,
                &format!("File already exists, will overwrite: {}", abs_path.display()),
            );
        }

        fs::write(&abs_path, content).map_err(|e| io_error("create file", file_path, e))?;
        let file_size = fs::metadata(&abs_path).map(|m| m.len()).unwrap_or(0);
        info!("Created file: {}", abs_path.display());

        let relative = self.ctx.workspace.relative(&abs_path);
        Ok(json!({
            "status": "success",
            "file_path": relative,
            "absolute_path": abs_path.display().to_string(),
            "content_length": content.chars().count(),
            "file_size_bytes": file_size,
            "encoding": encoding,
            "message": format!("File created successfully at {}", relative),
        })
        .to_string())
    }
}

// ---------------------------------------------------------------------------
// read_file
// ---------------------------------------------------------------------------

file_tool_class!(
    ReadFileTool,
    ReadFile,
    "read_file",
    "Read the content of a file at the specified path. Path should be relative to the workspace (e.g., 'documents/file.txt'). Returns the file content together with basic metadata.",
    json!({
        "file_path": {"type": "string", "description": "Relative path of the file to read (e.g., 'documents/file.txt')"},
        "encoding": {"type": "string", "description": "File encoding, defaults to utf-8", "default": "utf-8", "nullable": true}
    })
);

impl NativeTool for ReadFile {
    fn forward(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let file_path = str_arg(args, "file_path", Some(""))?;
        self.ctx
            .announce("Reading file...", "file-text", format!("Reading {}", file_path));

        let file_path = require_path(args, "file_path")?;
        let encoding = str_arg(args, "encoding", Some("utf-8"))?;
        check_encoding(encoding)?;

        let abs_path = self.ctx.workspace.resolve(file_path)?;
        if !abs_path.exists() {
            return Err(ToolError::Execution(format!(
                "File does not exist: {}",
                file_path
            )));
        }
        if !abs_path.is_file() {
            return Err(ToolError::InvalidInput(format!(
                "Path is not a file: {}",
                file_path
            )));
        }

        let file_size = fs::metadata(&abs_path)
            .map_err(|e| io_error("read", file_path, e))?
            .len();
        if file_size > LARGE_FILE_BYTES {
            warn!("Large file detected: {} bytes", file_size);
            self.ctx.observer.add_message(
                ProcessType::Other,
                &format!("Large file warning: {} bytes", file_size),
            );
        }

        let bytes = fs::read(&abs_path).map_err(|e| io_error("read", file_path, e))?;
        let content = String::from_utf8(bytes).map_err(|_| {
            ToolError::Execution(format!(
                "Encoding error: {} is not valid {}",
                file_path, encoding
            ))
        })?;
        info!("Read file: {}", abs_path.display());

        let relative = self.ctx.workspace.relative(&abs_path);
        let lines_count = if content.is_empty() {
            0
        } else {
            content.matches('\n').count() + 1
        };
        Ok(json!({
            "status": "success",
            "file_path": relative,
            "absolute_path": abs_path.display().to_string(),
            "content_length": content.chars().count(),
            "file_size_bytes": file_size,
            "encoding": encoding,
            "lines_count": lines_count,
            "message": format!("File read successfully from {}", relative),
            "content": content,
        })
        .to_string())
    }
}

// ---------------------------------------------------------------------------
// list_directory
// ---------------------------------------------------------------------------

file_tool_class!(
    ListDirectoryTool,
    ListDirectory,
    "list_directory",
    "List contents of a directory in tree structure format. Path should be relative to the workspace (e.g., 'documents' or '.' for the workspace root). Returns a hierarchical tree view of files and directories.",
    json!({
        "directory_path": {"type": "string", "description": "Relative path of the directory to list (e.g., 'documents' or '.' for workspace root)", "default": ".", "nullable": true},
        "max_depth": {"type": "integer", "description": "Maximum depth to traverse (default: 3, max: 10)", "default": 3, "nullable": true},
        "show_hidden": {"type": "boolean", "description": "Whether to show hidden files/directories (starting with .)", "default": false, "nullable": true},
        "show_size": {"type": "boolean", "description": "Whether to show file sizes", "default": true, "nullable": true}
    })
);

struct TreeOptions {
    max_depth: u64,
    show_hidden: bool,
    show_size: bool,
}

#[derive(Default)]
struct TreeTotals {
    files: u64,
    directories: u64,
    bytes: u64,
}

impl ListDirectory {
    fn render(
        &self,
        dir: &Path,
        depth: u64,
        opts: &TreeOptions,
        prefix: &str,
        lines: &mut Vec<String>,
        totals: &mut TreeTotals,
    ) -> Result<(), std::io::Error> {
        let mut entries: Vec<_> = fs::read_dir(dir)?
            .flatten()
            .filter(|e| opts.show_hidden || !e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        entries.sort_by_key(|e| e.file_name());

        let count = entries.len();
        for (i, entry) in entries.into_iter().enumerate() {
            let last = i + 1 == count;
            let branch = if last { "└── " } else { "├── " };
            let next_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            let name = entry.file_name().to_string_lossy().to_string();

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    lines.push(format!("{}{}{} [ERROR: {}]", prefix, branch, name, e));
                    continue;
                }
            };

            if meta.is_dir() {
                totals.directories += 1;
                let item_count = fs::read_dir(entry.path())
                    .map(|rd| {
                        rd.flatten()
                            .filter(|e| {
                                opts.show_hidden
                                    || !e.file_name().to_string_lossy().starts_with('.')
                            })
                            .count()
                    })
                    .unwrap_or(0);
                let truncated = depth + 1 >= opts.max_depth;
                lines.push(format!(
                    "{}{}{}/ ({} items){}",
                    prefix,
                    branch,
                    name,
                    item_count,
                    if truncated { " [...]" } else { "" }
                ));
                if !truncated {
                    // Unreadable subdirectories show as empty.
                    let _ = self.render(
                        &entry.path(),
                        depth + 1,
                        opts,
                        &next_prefix,
                        lines,
                        totals,
                    );
                }
            } else {
                totals.files += 1;
                totals.bytes += meta.len();
                if opts.show_size {
                    lines.push(format!(
                        "{}{}{} ({})",
                        prefix,
                        branch,
                        name,
                        format_size(meta.len())
                    ));
                } else {
                    lines.push(format!("{}{}{}", prefix, branch, name));
                }
            }
        }
        Ok(())
    }
}

impl NativeTool for ListDirectory {
    fn forward(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let directory_path = str_arg(args, "directory_path", Some("."))?;
        self.ctx.announce(
            "Listing directory contents...",
            "folder-tree",
            format!("Listing directory {}", directory_path),
        );

        let max_depth = args
            .get("max_depth")
            .and_then(|v| v.as_i64())
            .unwrap_or(3)
            .clamp(1, MAX_LIST_DEPTH as i64) as u64;
        let show_hidden = args
            .get("show_hidden")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let show_size = args
            .get("show_size")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        let abs_path = self.ctx.workspace.resolve(directory_path)?;
        if !abs_path.exists() {
            return Err(ToolError::Execution(format!(
                "Directory does not exist: {}",
                directory_path
            )));
        }
        if !abs_path.is_dir() {
            return Err(ToolError::InvalidInput(format!(
                "Path is not a directory: {}",
                directory_path
            )));
        }
        info!(
            "Listing directory: {} with max_depth={}",
            abs_path.display(),
            max_depth
        );

        let relative = self.ctx.workspace.relative(&abs_path);
        let mut lines = vec![if relative == "." {
            "workspace".to_string()
        } else {
            relative.clone()
        }];
        let mut totals = TreeTotals::default();
        let opts = TreeOptions {
            max_depth,
            show_hidden,
            show_size,
        };
        self.render(
            &abs_path,
            0,
            &opts,
            "",
            &mut lines,
            &mut totals,
        )
        .map_err(|e| io_error("list", directory_path, e))?;

        Ok(json!({
            "status": "success",
            "directory_path": relative,
            "absolute_path": abs_path.display().to_string(),
            "tree": lines.join("\n"),
            "total_files": totals.files,
            "total_directories": totals.directories,
            "total_size_bytes": totals.bytes,
            "max_depth": max_depth,
            "message": format!(
                "Listed {} files and {} directories in {}",
                totals.files, totals.directories, relative
            ),
        })
        .to_string())
    }
}

// ---------------------------------------------------------------------------
// delete_file
// ---------------------------------------------------------------------------

file_tool_class!(
    DeleteFileTool,
    DeleteFile,
    "delete_file",
    "Delete a single file at the specified path. Path should be relative to the workspace (e.g., 'documents/file.txt'). Directories are refused; use delete_directory for those.",
    json!({
        "file_path": {"type": "string", "description": "Relative path of the file to delete (e.g., 'documents/file.txt')"}
    })
);

impl NativeTool for DeleteFile {
    fn forward(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let file_path = str_arg(args, "file_path", Some(""))?;
        self.ctx
            .announce("Deleting file...", "file-minus", format!("Deleting {}", file_path));

        let file_path = require_path(args, "file_path")?;
        let abs_path = self.ctx.workspace.resolve(file_path)?;
        if !abs_path.exists() {
            return Err(ToolError::Execution(format!(
                "File does not exist: {}",
                file_path
            )));
        }
        if !abs_path.is_file() {
            return Err(ToolError::InvalidInput(format!(
                "Path is not a file: {}. Use delete_directory for directories.",
                file_path
            )));
        }

        let file_size = fs::metadata(&abs_path).map(|m| m.len()).unwrap_or(0);
        fs::remove_file(&abs_path).map_err(|e| io_error("delete file", file_path, e))?;
        info!("Deleted file: {}", abs_path.display());

        let relative = self.ctx.workspace.relative(&abs_path);
        let file_name = abs_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(json!({
            "status": "success",
            "file_path": relative,
            "absolute_path": abs_path.display().to_string(),
            "file_name": file_name,
            "file_size_bytes": file_size,
            "message": format!("File deleted successfully: {}", relative),
        })
        .to_string())
    }
}

// ---------------------------------------------------------------------------
// create_directory
// ---------------------------------------------------------------------------

file_tool_class!(
    CreateDirectoryTool,
    CreateDirectory,
    "create_directory",
    "Create a directory at the specified path, including missing parents. Path should be relative to the workspace (e.g., 'documents/subfolder'). Succeeds if the directory already exists.",
    json!({
        "directory_path": {"type": "string", "description": "Relative path where the directory should be created (e.g., 'documents/subfolder')"},
        "permissions": {"type": "string", "description": "Directory permissions in octal format (e.g., '755')", "default": "755", "nullable": true}
    })
);

#[cfg(unix)]
fn apply_permissions(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn apply_permissions(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

impl NativeTool for CreateDirectory {
    fn forward(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let directory_path = str_arg(args, "directory_path", Some(""))?;
        self.ctx.announce(
            "Creating directory...",
            "folder-plus",
            format!("Creating directory {}", directory_path),
        );

        let directory_path = require_path(args, "directory_path")?;
        let permissions = str_arg(args, "permissions", Some("755"))?;
        let mode = u32::from_str_radix(permissions, 8).map_err(|_| {
            ToolError::InvalidInput(format!(
                "Invalid permissions format: {}. Use octal like '755'",
                permissions
            ))
        })?;

        let abs_path = self.ctx.workspace.resolve(directory_path)?;
        let existed = abs_path.exists();
        if existed && !abs_path.is_dir() {
            return Err(ToolError::InvalidInput(format!(
                "Path exists but is not a directory: {}",
                directory_path
            )));
        }

        if existed {
            warn!("Directory already exists: {}", abs_path.display());
        } else {
            fs::create_dir_all(&abs_path)
                .map_err(|e| io_error("create directory", directory_path, e))?;
            apply_permissions(&abs_path, mode)
                .map_err(|e| io_error("set permissions on", directory_path, e))?;
            info!("Created directory: {}", abs_path.display());
        }

        let relative = self.ctx.workspace.relative(&abs_path);
        Ok(json!({
            "status": "success",
            "directory_path": relative,
            "absolute_path": abs_path.display().to_string(),
            "permissions": permissions,
            "already_existed": existed,
            "message": if existed {
                format!("Directory already exists: {}", relative)
            } else {
                format!("Directory created successfully at {}", relative)
            },
        })
        .to_string())
    }
}

// ---------------------------------------------------------------------------
// delete_directory
// ---------------------------------------------------------------------------

file_tool_class!(
    DeleteDirectoryTool,
    DeleteDirectory,
    "delete_directory",
    "Delete a directory and all of its contents. Path should be relative to the workspace (e.g., 'documents/subfolder'). The workspace root itself cannot be deleted.",
    json!({
        "directory_path": {"type": "string", "description": "Relative path of the directory to delete (e.g., 'documents/subfolder')"}
    })
);

impl NativeTool for DeleteDirectory {
    fn forward(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let directory_path = str_arg(args, "directory_path", Some(""))?;
        self.ctx.announce(
            "Deleting directory...",
            "folder-minus",
            format!("Deleting directory {}", directory_path),
        );

        let directory_path = require_path(args, "directory_path")?;
        let abs_path = self.ctx.workspace.resolve(directory_path)?;
        if abs_path == self.ctx.workspace.root() {
            return Err(ToolError::PermissionDenied(format!(
                "cannot delete the workspace root directory '{}'",
                abs_path.display()
            )));
        }
        if !abs_path.exists() {
            return Err(ToolError::Execution(format!(
                "Directory does not exist: {}",
                directory_path
            )));
        }
        if !abs_path.is_dir() {
            return Err(ToolError::InvalidInput(format!(
                "Path is not a directory: {}. Use delete_file for files.",
                directory_path
            )));
        }

        let (items, bytes) = tally(&abs_path);
        if items > LARGE_DIRECTORY_ITEMS {
            warn!(
                "Deleting large directory with {} items: {}",
                items,
                abs_path.display()
            );
            self.ctx.observer.add_message(
                ProcessType::Other,
                &format!("Warning: Deleting large directory with {} items", items),
            );
        }

        fs::remove_dir_all(&abs_path)
            .map_err(|e| io_error("delete directory", directory_path, e))?;
        info!("Deleted directory: {}", abs_path.display());

        let relative = self.ctx.workspace.relative(&abs_path);
        let dir_name = abs_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(json!({
            "status": "success",
            "directory_path": relative,
            "absolute_path": abs_path.display().to_string(),
            "directory_name": dir_name,
            "items_deleted": items,
            "size_deleted_bytes": bytes,
            "message": format!("Directory deleted successfully: {}", relative),
        })
        .to_string())
    }
}

// ---------------------------------------------------------------------------
// move_item
// ---------------------------------------------------------------------------

file_tool_class!(
    MoveItemTool,
    MoveItem,
    "move_item",
    "Move or rename a file or directory within the workspace. Both paths should be relative to the workspace. The destination must not already exist; missing destination parents are created.",
    json!({
        "source_path": {"type": "string", "description": "Relative path of the source file or directory to move (e.g., 'documents/file.txt')"},
        "destination_path": {"type": "string", "description": "Relative path of the destination (e.g., 'backup/file.txt')"}
    })
);

impl NativeTool for MoveItem {
    fn forward(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let source_path = str_arg(args, "source_path", Some(""))?;
        let destination_path = str_arg(args, "destination_path", Some(""))?;
        self.ctx.announce(
            "Moving item...",
            "move",
            format!("Moving {} to {}", source_path, destination_path),
        );

        let source_path = require_path(args, "source_path")?;
        let destination_path = require_path(args, "destination_path")?;
        let abs_source = self.ctx.workspace.resolve(source_path)?;
        let abs_destination = self.ctx.workspace.resolve(destination_path)?;

        if abs_source == self.ctx.workspace.root() {
            return Err(ToolError::PermissionDenied(
                "cannot move the workspace root directory".to_string(),
            ));
        }
        if !abs_source.exists() {
            return Err(ToolError::Execution(format!(
                "Source does not exist: {}",
                source_path
            )));
        }
        if abs_destination.exists() {
            return Err(ToolError::InvalidInput(format!(
                "Destination already exists: {}",
                destination_path
            )));
        }
        if abs_destination.starts_with(&abs_source) {
            return Err(ToolError::InvalidInput(format!(
                "Cannot move {} into itself",
                source_path
            )));
        }

        let is_directory = abs_source.is_dir();
        let (items, bytes) = if is_directory {
            tally(&abs_source)
        } else {
            (1, fs::metadata(&abs_source).map(|m| m.len()).unwrap_or(0))
        };

        if let Some(parent) = abs_destination.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| io_error("create parent directories for", destination_path, e))?;
            }
        }
        fs::rename(&abs_source, &abs_destination)
            .map_err(|e| io_error("move", source_path, e))?;
        info!(
            "Moved {} to {}",
            abs_source.display(),
            abs_destination.display()
        );

        let relative_source = self.ctx.workspace.relative(&abs_source);
        let relative_destination = self.ctx.workspace.relative(&abs_destination);
        let item_name = abs_source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(json!({
            "status": "success",
            "source_path": relative_source,
            "destination_path": relative_destination,
            "absolute_source_path": abs_source.display().to_string(),
            "absolute_destination_path": abs_destination.display().to_string(),
            "item_name": item_name,
            "is_directory": is_directory,
            "size_bytes": bytes,
            "items_moved": items,
            "message": format!(
                "{} moved successfully from {} to {}",
                if is_directory { "Directory" } else { "File" },
                relative_source,
                relative_destination
            ),
        })
        .to_string())
    }
}

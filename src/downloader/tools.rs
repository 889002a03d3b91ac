// Locating the external executables the pipeline shells out to

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Install locations outside a service manager's usual PATH
const EXTRA_DIRS: [&str; 3] = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Curl,
    Ffmpeg,
}

impl ToolType {
    pub const ALL: [ToolType; 3] = [ToolType::YtDlp, ToolType::Curl, ToolType::Ffmpeg];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Curl => "curl",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    /// What the pipeline needs it for
    pub fn role(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "extraction",
            ToolType::Curl => "streaming upload",
            ToolType::Ffmpeg => "transcode / remux / thumbnail embedding",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::Ffmpeg => "-version",
            ToolType::YtDlp | ToolType::Curl => "--version",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub role: String,
    pub path: Option<String>,
    pub version: Option<String>,
    pub is_available: bool,
}

#[derive(Debug, Default)]
pub struct ToolManager;

impl ToolManager {
    pub fn new() -> Self {
        Self
    }

    pub fn get_tool_info(&self, tool: ToolType) -> ToolInfo {
        let path = self.find_path(tool);
        let version = path.as_deref().and_then(|p| self.get_version(p, tool));

        ToolInfo {
            name: tool.as_str().to_string(),
            role: tool.role().to_string(),
            is_available: path.is_some(),
            path: path.map(|p| p.to_string_lossy().to_string()),
            version,
        }
    }

    pub fn get_all_tools(&self) -> Vec<ToolInfo> {
        ToolType::ALL.iter().map(|t| self.get_tool_info(*t)).collect()
    }

    /// Detected path, or the bare name so PATH lookup happens at spawn time
    pub fn resolve_path(&self, tool: ToolType) -> String {
        self.find_path(tool)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| tool.as_str().to_string())
    }

    /// PATH first, then the fixed install dirs
    fn find_path(&self, tool: ToolType) -> Option<PathBuf> {
        let path_dirs = env::var_os("PATH")
            .map(|p| env::split_paths(&p).collect::<Vec<_>>())
            .unwrap_or_default();

        path_dirs
            .into_iter()
            .chain(EXTRA_DIRS.iter().map(PathBuf::from))
            .map(|dir| dir.join(tool.as_str()))
            .find(|candidate| is_executable(candidate))
    }

    fn get_version(&self, path: &Path, tool: ToolType) -> Option<String> {
        let output = Command::new(path).arg(tool.version_arg()).output().ok()?;
        if !output.status.success() {
            return None;
        }
        // curl and ffmpeg print a banner; the first line carries the version
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

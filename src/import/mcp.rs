//! Detection of a configured Rovo MCP server for the Jira integration.

use std::path::{Path, PathBuf};

use crate::ports::FileSystem;

const ROVO_SERVER_KEYS: [&str; 2] = ["atlassian-rovo-mcp", "rovo"];
const CURSOR_DIR: &str = ".cursor";
const MCP_FILE: &str = "mcp.json";

/// Where the server entry was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpSource {
    /// The user-pointed TOML file.
    ConfigToml,
    /// `.cursor/mcp.json` in the workspace.
    Workspace,
    /// `.cursor/mcp.json` in the home directory.
    Global,
}

/// Result of [`probe`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct McpProbe {
    /// Whether a Rovo server entry exists.
    pub configured: bool,
    /// Which file it came from.
    pub source: Option<McpSource>,
    /// Path of that file.
    pub path: Option<PathBuf>,
}

impl McpProbe {
    fn found(source: McpSource, path: PathBuf) -> Self {
        Self { configured: true, source: Some(source), path: Some(path) }
    }
}

fn is_rovo_key(key: &str) -> bool {
    ROVO_SERVER_KEYS.contains(&key) || key.to_lowercase().contains("rovo")
}

/// Looks for a Rovo MCP server.
///
/// `config_path` (relative paths resolve against `workspace_root`) is read as
/// TOML first; without a match there, `.cursor/mcp.json` is tried in the
/// workspace and then in `home`. Unreadable or malformed files count as not
/// configured.
pub fn probe(
    fs: &dyn FileSystem,
    workspace_root: Option<&Path>,
    home: Option<&Path>,
    config_path: Option<&Path>,
) -> McpProbe {
    if let Some(path) = config_path.filter(|p| !p.as_os_str().is_empty()) {
        let resolved = if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            workspace_root.map(|root| root.join(path))
        };
        if let Some(resolved) = resolved {
            if toml_has_rovo(fs, &resolved) {
                return McpProbe::found(McpSource::ConfigToml, resolved);
            }
        }
    }

    let candidates = [(workspace_root, McpSource::Workspace), (home, McpSource::Global)];
    for (dir, source) in candidates {
        let Some(dir) = dir else { continue };
        let path = dir.join(CURSOR_DIR).join(MCP_FILE);
        if json_has_rovo(fs, &path) {
            return McpProbe::found(source, path);
        }
    }
    McpProbe::default()
}

fn toml_has_rovo(fs: &dyn FileSystem, path: &Path) -> bool {
    let Ok(raw) = fs.read_to_string(path) else {
        return false;
    };
    match raw.parse::<toml::Table>() {
        Ok(table) => table
            .get("mcpServers")
            .and_then(toml::Value::as_table)
            .is_some_and(|servers| servers.keys().any(|k| is_rovo_key(k))),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "ignoring malformed MCP config");
            false
        }
    }
}

fn json_has_rovo(fs: &dyn FileSystem, path: &Path) -> bool {
    if !fs.exists(path) {
        return false;
    }
    let Ok(raw) = fs.read_to_string(path) else {
        return false;
    };
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(value) => value
            .get("mcpServers")
            .and_then(serde_json::Value::as_object)
            .is_some_and(|servers| servers.keys().any(|k| is_rovo_key(k))),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "ignoring malformed mcp.json");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemFs;

    #[test]
    fn toml_config_wins_when_it_names_a_rovo_server() {
        let fs = MemFs::default();
        fs.write(Path::new("/ws/agent.toml"), "[mcpServers.my-rovo]\ncommand = \"npx\"\n").unwrap();
        fs.write(Path::new("/ws/.cursor/mcp.json"), r#"{"mcpServers":{"rovo":{}}}"#).unwrap();

        let probe = probe(&fs, Some(Path::new("/ws")), None, Some(Path::new("agent.toml")));
        assert_eq!(probe, McpProbe::found(McpSource::ConfigToml, "/ws/agent.toml".into()));
    }

    #[test]
    fn falls_back_to_workspace_then_global_mcp_json() {
        let fs = MemFs::default();
        fs.write(Path::new("/ws/agent.toml"), "[mcpServers.github]\n").unwrap();
        fs.write(Path::new("/ws/.cursor/mcp.json"), r#"{"mcpServers":{"github":{}}}"#).unwrap();
        fs.write(Path::new("/home/u/.cursor/mcp.json"), r#"{"mcpServers":{"atlassian-rovo-mcp":{}}}"#)
            .unwrap();

        let probe = probe(
            &fs,
            Some(Path::new("/ws")),
            Some(Path::new("/home/u")),
            Some(Path::new("/ws/agent.toml")),
        );
        assert_eq!(probe.source, Some(McpSource::Global));
        assert_eq!(probe.path.as_deref(), Some(Path::new("/home/u/.cursor/mcp.json")));
    }

    #[test]
    fn malformed_or_missing_files_mean_not_configured() {
        let fs = MemFs::default();
        fs.write(Path::new("/ws/.cursor/mcp.json"), "{ not json").unwrap();
        let probe = probe(&fs, Some(Path::new("/ws")), Some(Path::new("/nowhere")), None);
        assert_eq!(probe, McpProbe::default());
        assert!(!probe.configured);
    }

    #[test]
    fn server_keys_match_case_insensitively() {
        assert!(is_rovo_key("Atlassian-ROVO"));
        assert!(is_rovo_key("rovo"));
        assert!(!is_rovo_key("jira"));
    }
}

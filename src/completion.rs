//! Completion Data Export
//!
//! A plain serializable snapshot of the registered commands and flags,
//! consumed by external bash/zsh/fish/powershell script generators. The core
//! does not render scripts itself.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, Default)]
pub struct CompletionData {
    pub commands: Vec<CompletionCommand>,
    pub flags: Vec<CompletionFlag>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionCommand {
    pub name: String,
    pub path: String,
    pub description: String,
    /// Name in the active language, when a translation exists.
    pub translated: Option<String>,
    pub subcommands: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionFlag {
    pub long: String,
    pub short: Option<String>,
    pub description: String,
    /// Owning command path; `None` for global flags.
    pub command_path: Option<String>,
    pub takes_value: bool,
    pub accepted_values: Vec<String>,
    pub default_value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_to_json() {
        let data = CompletionData {
            commands: vec![CompletionCommand {
                name: "serve".to_string(),
                path: "serve".to_string(),
                description: "start the server".to_string(),
                translated: None,
                subcommands: vec!["users".to_string()],
            }],
            flags: vec![CompletionFlag {
                long: "port".to_string(),
                short: Some("p".to_string()),
                description: String::new(),
                command_path: Some("serve".to_string()),
                takes_value: true,
                accepted_values: vec![],
                default_value: Some("8080".to_string()),
            }],
        };
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"serve\""));
        assert!(json.contains("\"port\""));
    }
}

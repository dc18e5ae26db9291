//! Tool catalogue and typed arguments.

use crate::mcp::protocol::Tool;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;

pub const CREATE_ENVIRONMENT: &str = "create_container_environment";
pub const CREATE_FILE: &str = "create_file_in_container";
pub const EXECUTE_COMMAND: &str = "execute_command_in_container";
pub const SAVE_STATE: &str = "save_container_state";
pub const EXPORT_DOCKERFILE: &str = "export_dockerfile";
pub const EXIT_CONTAINER: &str = "exit_container";
pub const LIST_ENVIRONMENTS: &str = "list_container_environments";

#[derive(Debug, Deserialize)]
pub struct CreateEnvironmentArgs {
    pub image: String,
    pub persist: bool,
    #[serde(default)]
    pub host_workspace_path: Option<PathBuf>,
    #[serde(default)]
    pub download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFileArgs {
    pub container_id: String,
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteCommandArgs {
    pub container_id: String,
    pub command: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveStateArgs {
    pub container_id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ContainerArgs {
    pub container_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ExitContainerArgs {
    pub container_id: String,
    #[serde(default)]
    pub force: bool,
}

fn container_id_schema() -> serde_json::Value {
    json!({
        "type": "string",
        "description": "Container ID returned by create_container_environment"
    })
}

/// Every tool the server exposes, in listing order.
pub fn definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: CREATE_ENVIRONMENT,
            description: "Create a new container with the specified base image. Files and \
                          commands resolve against /workspace inside the container.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "image": {
                        "type": "string",
                        "description": "Docker image to use (e.g., python:3.12-slim, ubuntu:latest)"
                    },
                    "persist": {
                        "type": "boolean",
                        "description": "Keep the container after it stops; false lets the runtime remove it once stopped"
                    },
                    "host_workspace_path": {
                        "type": "string",
                        "description": "Existing host directory to mount at /workspace instead of a fresh staging directory"
                    },
                    "download_url": {
                        "type": "string",
                        "description": "HTTP(S) resource downloaded into /workspace before the container starts"
                    }
                },
                "required": ["image", "persist"]
            }),
        },
        Tool {
            name: CREATE_FILE,
            description: "Create or overwrite a file below /workspace in a container",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "container_id": container_id_schema(),
                    "filename": {
                        "type": "string",
                        "description": "Path relative to /workspace"
                    },
                    "content": {
                        "type": "string",
                        "description": "File content"
                    }
                },
                "required": ["container_id", "filename", "content"]
            }),
        },
        Tool {
            name: EXECUTE_COMMAND,
            description: "Run a shell command in /workspace of a container and return stdout, \
                          stderr and the exit code",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "container_id": container_id_schema(),
                    "command": {
                        "type": "string",
                        "description": "Command passed to sh -c"
                    }
                },
                "required": ["container_id", "command"]
            }),
        },
        Tool {
            name: SAVE_STATE,
            description: "Commit the container's current filesystem to a new image",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "container_id": container_id_schema(),
                    "name": {
                        "type": "string",
                        "description": "Image name as repository[:tag]; the tag defaults to latest"
                    }
                },
                "required": ["container_id", "name"]
            }),
        },
        Tool {
            name: EXPORT_DOCKERFILE,
            description: "Generate a best-effort Dockerfile from the base image and the files \
                          created through this server",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "container_id": container_id_schema()
                },
                "required": ["container_id"]
            }),
        },
        Tool {
            name: EXIT_CONTAINER,
            description: "Stop and remove a container and clean up its staging directory",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "container_id": container_id_schema(),
                    "force": {
                        "type": "boolean",
                        "description": "Skip the graceful stop and remove immediately (default: false)"
                    }
                },
                "required": ["container_id"]
            }),
        },
        Tool {
            name: LIST_ENVIRONMENTS,
            description: "List the containers currently tracked by this server",
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}

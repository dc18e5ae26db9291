use crate::env;
use crate::mcp::protocol::{
    CallToolResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION,
};
use crate::mcp::tools::{self, *};
use crate::session::{CreateOptions, Persistence, SessionError, SessionHandle, SessionManager};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

type ToolOutcome = crate::session::Result<String>;

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// MCP tool surface over a [`SessionManager`].
pub struct McpServer {
    manager: Arc<SessionManager>,
}

impl McpServer {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Parse one line of input and produce the serialized response, if any.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<Value>(line) {
            Err(e) => {
                warn!("Failed to parse request: {}", e);
                Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::parse_error(e.to_string()),
                ))
            }
            Ok(value) => {
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                match serde_json::from_value::<JsonRpcRequest>(value) {
                    Ok(request) => self.handle_request(request).await,
                    Err(e) => Some(JsonRpcResponse::failure(
                        id,
                        JsonRpcError::invalid_request(e.to_string()),
                    )),
                }
            }
        }?;

        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                None
            }
        }
    }

    /// Dispatch a request. Notifications are processed but get no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Request {}", request.method);

        let result = match request.method.as_str() {
            "initialize" => Ok(self.initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tools::definitions() })),
            "tools/call" => self
                .call_tool(&request.params)
                .await
                .and_then(|result| {
                    serde_json::to_value(result).map_err(|e| JsonRpcError::internal(e.to_string()))
                }),
            method if method.starts_with("notifications/") => Ok(Value::Null),
            method => Err(JsonRpcError::method_not_found(method)),
        };

        let id = request.id?;
        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": env::SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    async fn call_tool(&self, params: &Value) -> Result<CallToolResult, JsonRpcError> {
        let call: CallParams = serde_json::from_value(params.clone())
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid tools/call params: {e}")))?;
        let arguments = match call.arguments {
            Value::Null => json!({}),
            arguments => arguments,
        };

        info!("Tool call: {}", call.name);

        let outcome = match call.name.as_str() {
            CREATE_ENVIRONMENT => self.create_environment(decode(&call.name, arguments)?).await,
            CREATE_FILE => self.create_file(decode(&call.name, arguments)?).await,
            EXECUTE_COMMAND => self.execute_command(decode(&call.name, arguments)?).await,
            SAVE_STATE => self.save_state(decode(&call.name, arguments)?).await,
            EXPORT_DOCKERFILE => self.export_dockerfile(decode(&call.name, arguments)?).await,
            EXIT_CONTAINER => self.exit_container(decode(&call.name, arguments)?).await,
            LIST_ENVIRONMENTS => self.list_environments().await,
            other => {
                return Err(JsonRpcError::invalid_params(format!("Unknown tool: {other}")));
            }
        };

        Ok(match outcome {
            Ok(text) => CallToolResult::text(text),
            Err(e) => {
                warn!("Tool {} failed: {}", call.name, e);
                CallToolResult::error(render_error(&e))
            }
        })
    }

    async fn create_environment(&self, args: CreateEnvironmentArgs) -> ToolOutcome {
        let mut options = CreateOptions::new(args.image, Persistence::from(args.persist));
        options.host_workspace_path = args.host_workspace_path;
        options.download_url = args.download_url;

        let handle = self.manager.create(options).await?;

        let mut text = format!(
            "Container created with ID: {handle}\nWorking directory is {}\n",
            env::container::WORKSPACE_ROOT
        );
        if let Ok(session) = self.manager.registry().get(&handle).await {
            text.push_str(&format!("Workspace: {}\n", session.workspace));
            if let Some(download) = &session.download {
                text.push_str(&format!(
                    "Downloaded {} to {} ({} bytes)\n",
                    download.url,
                    env::workspace_path(&download.file_name),
                    download.bytes
                ));
            }
        }
        text.push_str("Container is ready for commands");
        Ok(text)
    }

    async fn create_file(&self, args: CreateFileArgs) -> ToolOutcome {
        let handle = SessionHandle::from(args.container_id);
        let path = self
            .manager
            .write_file(&handle, &args.filename, &args.content)
            .await?;
        Ok(format!(
            "File {path} has been created in {}",
            env::container::WORKSPACE_ROOT
        ))
    }

    async fn execute_command(&self, args: ExecuteCommandArgs) -> ToolOutcome {
        let handle = SessionHandle::from(args.container_id);
        let output = self.manager.execute(&handle, &args.command).await?;
        serde_json::to_string_pretty(&output)
            .map_err(|e| SessionError::RuntimeUnavailable(e.to_string()))
    }

    async fn save_state(&self, args: SaveStateArgs) -> ToolOutcome {
        let handle = SessionHandle::from(args.container_id);
        let reference = self.manager.save_state(&handle, &args.name).await?;
        Ok(format!(
            "Environment saved as image: {reference}\n\n\
             To use this environment later:\n\
             1. Create new container: docker run -it {reference}\n\
             2. Or use with this MCP server: {CREATE_ENVIRONMENT}(image=\"{reference}\")\n\n\
             The image contains all installed packages and configurations."
        ))
    }

    async fn export_dockerfile(&self, args: ContainerArgs) -> ToolOutcome {
        let handle = SessionHandle::from(args.container_id);
        let dockerfile = self.manager.export_dockerfile(&handle).await?;
        Ok(format!(
            "Here's a Dockerfile to recreate this environment:\n\n\
             {dockerfile}\n\
             To use this Dockerfile:\n\
             1. Save it to a file named 'Dockerfile'\n\
             2. Build: docker build -t your-image-name .\n\
             3. Run: docker run -it your-image-name"
        ))
    }

    async fn exit_container(&self, args: ExitContainerArgs) -> ToolOutcome {
        let handle = SessionHandle::from(args.container_id);
        self.manager.exit(&handle, args.force).await?;
        Ok(format!("Container {handle} has been stopped and removed."))
    }

    async fn list_environments(&self) -> ToolOutcome {
        let sessions = self.manager.list().await;
        if sessions.is_empty() {
            return Ok("No container environments are active.".to_string());
        }

        let summary: Vec<Value> = sessions
            .iter()
            .map(|session| {
                json!({
                    "container_id": session.handle,
                    "image": session.image,
                    "persistence": session.persistence,
                    "workspace": session.workspace,
                    "created_files": session.created_files,
                    "created_at": session.created_at.to_rfc3339(),
                })
            })
            .collect();

        serde_json::to_string_pretty(&summary)
            .map_err(|e| SessionError::RuntimeUnavailable(e.to_string()))
    }
}

fn decode<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(arguments)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid arguments for {tool}: {e}")))
}

/// Text of a failed tool call: `Error [<Kind>]: <cause>`.
pub fn render_error(err: &SessionError) -> String {
    format!("Error [{}]: {}", err.kind(), err)
}

/// Serve newline-delimited JSON-RPC from `reader` to `writer` until input ends.
///
/// Requests are handled one at a time in arrival order.
pub async fn serve<R, W>(server: &McpServer, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(response) = server.handle_line(line).await {
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    info!("Input closed, stopping server");
    Ok(())
}

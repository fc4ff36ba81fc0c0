//! MCP request dispatch and the stdio serving loop.
//!
//! Requests arrive as newline-delimited JSON-RPC. `tools/call` requests are
//! spawned so a long `quick_research` never holds up other calls; every
//! response goes through a single writer task to keep lines intact.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::protocol::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Outgoing, PromptDefinition,
    ToolDefinition, ToolResult, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::processor::Processor;
use crate::tools::{Progress, ToolRegistry};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "parallel-research";

const SESSION_PROMPT: &str = "research_session_start";

pub struct McpServer {
    tools: ToolRegistry,
}

impl McpServer {
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .list()
            .into_iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.parameters_schema(),
            })
            .collect()
    }

    async fn call_tool(&self, name: &str, args: Value, progress: Progress) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            return ToolResult::error(format!("Unknown tool: {}", name));
        };

        tracing::debug!(tool = name, "Tool call started");
        match tool.execute_with_progress(args, progress).await {
            Ok(text) => ToolResult::text(text),
            Err(e) => {
                let disposition = e.disposition();
                tracing::warn!(
                    tool = name,
                    task_id = e.task_id().unwrap_or("-"),
                    disposition = disposition.as_str(),
                    error = %e,
                    "Tool call failed"
                );
                ToolResult::error(format!("{} failed [{}]: {}", name, disposition.as_str(), e))
            }
        }
    }

    /// Handle one request. Returns `None` for notifications.
    pub async fn handle_request(&self, request: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        self.dispatch(request, Progress::default()).await
    }

    async fn dispatch(
        &self,
        request: &JsonRpcRequest,
        progress: Progress,
    ) -> Option<JsonRpcResponse> {
        let id = request.id.clone();
        match request.method.as_str() {
            "initialize" => Some(JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "capabilities": {
                        "tools": { "listChanged": false },
                        "prompts": { "listChanged": false }
                    }
                }),
            )),
            "notifications/initialized" | "initialized" => None,
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            "tools/list" => Some(JsonRpcResponse::success(
                id,
                json!({ "tools": self.tool_definitions() }),
            )),
            "tools/call" => {
                let Some(name) = request.params.get("name").and_then(|v| v.as_str()) else {
                    return Some(JsonRpcResponse::error(id, INVALID_PARAMS, "Missing tool name"));
                };
                let args = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or_else(|| json!({}));
                let result = self.call_tool(name, args, progress).await;
                Some(JsonRpcResponse::success(id, json!(result)))
            }
            "prompts/list" => Some(JsonRpcResponse::success(
                id,
                json!({ "prompts": [session_prompt_definition()] }),
            )),
            "prompts/get" => {
                let name = request.params.get("name").and_then(|v| v.as_str());
                if name != Some(SESSION_PROMPT) {
                    return Some(JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        format!("Unknown prompt: {}", name.unwrap_or("")),
                    ));
                }
                Some(JsonRpcResponse::success(
                    id,
                    json!({
                        "description": session_prompt_definition().description,
                        "messages": [{
                            "role": "user",
                            "content": { "type": "text", "text": session_prompt_text() }
                        }]
                    }),
                ))
            }
            _ if request.is_notification() => None,
            _ => Some(JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            )),
        }
    }

    /// Serve newline-delimited JSON-RPC until `reader` hits EOF. In-flight
    /// tool calls are finished before returning the writer.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> std::io::Result<W>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Outgoing>();

        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(message) = rx.recv().await {
                let line = match serde_json::to_string(&message) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize response");
                        continue;
                    }
                };
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<W, std::io::Error>(writer)
        });

        let mut in_flight = JoinSet::new();
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let message: Value = match serde_json::from_str(&line) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(error = %e, "Malformed JSON-RPC message");
                    let response = JsonRpcResponse::error(Value::Null, PARSE_ERROR, e.to_string());
                    let _ = tx.send(Outgoing::Response(response));
                    continue;
                }
            };
            let id = message.get("id").cloned().unwrap_or(Value::Null);
            let request: JsonRpcRequest = match serde_json::from_value(message) {
                Ok(req) => req,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid JSON-RPC request");
                    let response = JsonRpcResponse::error(id, INVALID_REQUEST, e.to_string());
                    let _ = tx.send(Outgoing::Response(response));
                    continue;
                }
            };

            if request.method == "tools/call" {
                let server = Arc::clone(&self);
                let progress = progress_reporter(&request, &tx);
                let tx = tx.clone();
                in_flight.spawn(async move {
                    if let Some(response) = server.dispatch(&request, progress).await {
                        let _ = tx.send(Outgoing::Response(response));
                    }
                });
            } else if let Some(response) = self.handle_request(&request).await {
                let _ = tx.send(Outgoing::Response(response));
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Tool call task panicked");
            }
        }
        drop(tx);

        writer_task
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
    }
}

/// Forward tool progress as `notifications/progress` when the request
/// carries a progress token.
fn progress_reporter(request: &JsonRpcRequest, tx: &mpsc::UnboundedSender<Outgoing>) -> Progress {
    let Some(token) = request.progress_token().cloned() else {
        return Progress::default();
    };
    let tx = tx.clone();
    Progress::new(move |progress, message| {
        let notification = JsonRpcNotification::progress(token.clone(), progress, message);
        let _ = tx.send(Outgoing::Notification(notification));
    })
}

fn session_prompt_definition() -> PromptDefinition {
    PromptDefinition {
        name: SESSION_PROMPT.to_string(),
        title: "Start Parallel Research Session".to_string(),
        description: "Usage notes, timings and costs for Parallel research tools".to_string(),
    }
}

fn session_prompt_text() -> String {
    let mut text = String::from(
        "You are about to use Parallel's deep research API.\n\nIMPORTANT NOTICES:\n",
    );
    text.push_str("- quick_research uses the lite tier and returns the answer directly\n");
    text.push_str("- deep_research returns a task_id at once; poll it with task_status\n");
    text.push_str("- Large results are split into chunks; fetch them with get_research_chunk\n");
    text.push_str("- Always ask the user for approval before starting research on pro or higher tiers\n");
    text.push_str("- Citations are provided for verification\n\nProcessor tiers:\n");
    for p in Processor::ALL {
        text.push_str(&format!(
            "- {}: {} expected, {} per 1,000 queries\n",
            p,
            p.expected_duration(),
            p.cost_display()
        ));
    }
    text.push_str("\nWhat would you like me to research? (I'll ask for approval before starting)");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::mock::{completed, running, ScriptedClient};
    use crate::task::{RegistryConfig, TaskRegistry};
    use crate::tools::ToolSettings;
    use tokio::io::BufReader;

    fn server() -> (Arc<ScriptedClient>, Arc<McpServer>) {
        let client = Arc::new(ScriptedClient::new());
        let registry = Arc::new(TaskRegistry::new(client.clone(), RegistryConfig::default()));
        let tools = ToolRegistry::new(registry, ToolSettings::default());
        (client, Arc::new(McpServer::new(tools)))
    }

    fn request(value: Value) -> JsonRpcRequest {
        serde_json::from_value(value).unwrap()
    }

    async fn call(server: &McpServer, value: Value) -> Value {
        let response = server.handle_request(&request(value)).await.unwrap();
        serde_json::to_value(&response).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_and_list_tools() {
        let (_, server) = server();
        let init = call(&server, json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}})).await;
        assert_eq!(init["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(init["result"]["serverInfo"]["name"], SERVER_NAME);

        let list = call(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;
        let names: Vec<&str> = list["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec!["deep_research", "get_research_chunk", "quick_research", "task_status"]
        );
        assert!(list["result"]["tools"][0]["inputSchema"]["properties"]["processor"].is_object());
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let (_, server) = server();
        let req = request(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));
        assert!(server.handle_request(&req).await.is_none());
        let req = request(json!({"jsonrpc": "2.0", "method": "notifications/cancelled"}));
        assert!(server.handle_request(&req).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (_, server) = server();
        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"})).await;
        assert_eq!(resp["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tool_errors_are_labeled() {
        let (_, server) = server();
        let resp = call(
            &server,
            json!({
                "jsonrpc": "2.0", "id": 4, "method": "tools/call",
                "params": {"name": "task_status", "arguments": {"task_id": "nonexistent-id"}}
            }),
        )
        .await;
        assert_eq!(resp["result"]["isError"], true);
        let text = resp["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("task_status failed [invalid request]"));
        assert!(text.contains("nonexistent-id"));

        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {"name": "bash"}}),
        )
        .await;
        assert_eq!(resp["result"]["isError"], true);

        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call", "params": {}}),
        )
        .await;
        assert_eq!(resp["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_prompts() {
        let (_, server) = server();
        let list = call(&server, json!({"jsonrpc": "2.0", "id": 7, "method": "prompts/list"})).await;
        assert_eq!(list["result"]["prompts"][0]["name"], SESSION_PROMPT);

        let prompt = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 8, "method": "prompts/get", "params": {"name": SESSION_PROMPT}}),
        )
        .await;
        let text = prompt["result"]["messages"][0]["content"]["text"].as_str().unwrap();
        assert!(text.contains("ultra8x: 8-30min expected, $2,400 per 1,000 queries"));

        let missing = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 9, "method": "prompts/get", "params": {"name": "other"}}),
        )
        .await;
        assert_eq!(missing["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_serve_over_lines() {
        let (client, server) = server();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
            "\n",
            "not json\n",
            r#"{"jsonrpc":"2.0","id":9,"params":{}}"#, "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"deep_research","arguments":{"query":"q","processor":"core"}}}"#, "\n",
        );

        let output = server
            .serve(BufReader::new(input.as_bytes()), Vec::new())
            .await
            .unwrap();
        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(responses.len(), 4);
        assert!(responses.iter().any(|r| r["id"] == 1));
        assert!(responses
            .iter()
            .any(|r| r["id"].is_null() && r["error"]["code"] == PARSE_ERROR));
        assert!(responses
            .iter()
            .any(|r| r["id"] == 9 && r["error"]["code"] == INVALID_REQUEST));
        let call = responses.iter().find(|r| r["id"] == 2).unwrap();
        assert_eq!(call["result"]["isError"], false);
        assert_eq!(client.submitted()[0].1, Processor::Core);
    }

    #[tokio::test(start_paused = true)]
    async fn test_serve_sends_progress_for_quick_research() {
        let (client, server) = server();
        for run in ["run_1", "run_2"] {
            client.script(
                run,
                vec![Ok(running()), Ok(running()), Ok(completed("answer"))],
            );
        }
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"quick_research","arguments":{"query":"q"},"_meta":{"progressToken":"tok-1"}}}"#, "\n",
            r#"{"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"name":"quick_research","arguments":{"query":"q2"}}}"#, "\n",
        );

        let output = server
            .serve(BufReader::new(input.as_bytes()), Vec::new())
            .await
            .unwrap();
        let messages: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        let progress: Vec<&Value> = messages
            .iter()
            .filter(|m| m["method"] == "notifications/progress")
            .collect();
        assert!(progress.iter().all(|m| m["params"]["progressToken"] == "tok-1"));
        let values: Vec<f64> = progress
            .iter()
            .map(|m| m["params"]["progress"].as_f64().unwrap())
            .collect();
        assert_eq!(values, vec![0.1, 0.5, 0.5, 1.0]);
        assert_eq!(progress[1]["params"]["message"], "Researching... (running)");

        let last_progress = messages
            .iter()
            .rposition(|m| m["method"] == "notifications/progress")
            .unwrap();
        let response = messages.iter().position(|m| m["id"] == 7).unwrap();
        assert!(response > last_progress);
        assert_eq!(messages[response]["result"]["isError"], false);
        assert!(messages.iter().any(|m| m["id"] == 8));
    }
}

//! A single stage: one prompt, optionally with the web-search tool, run to
//! a final text answer.

use std::collections::BTreeMap;

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use scribe_llm::{
    ChatRequest, ChatTurn, CohereClient, ParameterDefinition, ToolCall, ToolDefinition, ToolResult,
};
use scribe_search::{SerperClient, format_hits};
use scribe_shared::{Result, ScribeError};

use crate::agent::StagePrompt;

/// Name the search tool is exposed under.
pub const SEARCH_TOOL_NAME: &str = "internet_search";

/// Parameter carrying the query.
const SEARCH_QUERY_PARAM: &str = "search_query";

/// Tool definition for web search.
pub fn search_tool_definition() -> ToolDefinition {
    let mut params = BTreeMap::new();
    params.insert(
        SEARCH_QUERY_PARAM.to_string(),
        ParameterDefinition {
            description: "Mandatory search query you want to use to search the internet".into(),
            kind: "str".into(),
            required: true,
        },
    );
    ToolDefinition {
        name: SEARCH_TOOL_NAME.into(),
        description: "A tool that can be used to search the internet with a search_query."
            .into(),
        parameter_definitions: params,
    }
}

/// Run `prompt` to completion.
///
/// With `search`, the model may request searches; each round of requested
/// calls is executed in order and fed back until the model answers in
/// plain text, or `max_tool_rounds` rounds have run.
#[instrument(skip_all, fields(stage = stage, search = search.is_some()))]
pub async fn run_stage(
    stage: &'static str,
    llm: &CohereClient,
    prompt: &StagePrompt,
    search: Option<&SerperClient>,
    max_tool_rounds: u32,
) -> Result<String> {
    debug!(preamble = %prompt.preamble, message = %prompt.message, "stage prompt");

    let mut request = ChatRequest {
        message: prompt.message.clone(),
        preamble: Some(prompt.preamble.clone()),
        tools: search.map(|_| vec![search_tool_definition()]).unwrap_or_default(),
        ..Default::default()
    };
    let mut rounds = 0;

    loop {
        let response = llm.chat(&request).await?;

        let search = match search {
            Some(s) if !response.tool_calls.is_empty() => s,
            _ => {
                info!(rounds, chars = response.text.len(), "stage finished");
                return Ok(response.text);
            }
        };

        if rounds >= max_tool_rounds {
            warn!(rounds, "tool round limit reached");
            if response.text.trim().is_empty() {
                return Err(ScribeError::Llm(format!(
                    "model still requesting tools after {rounds} rounds"
                )));
            }
            return Ok(response.text);
        }
        rounds += 1;

        let mut results = Vec::with_capacity(response.tool_calls.len());
        for call in &response.tool_calls {
            results.push(execute_tool(search, call).await?);
        }

        // Roll the previous request into history before sending results.
        if !request.message.is_empty() {
            request.chat_history.push(ChatTurn::User {
                message: std::mem::take(&mut request.message),
            });
        } else if !request.tool_results.is_empty() {
            request.chat_history.push(ChatTurn::Tool {
                tool_results: std::mem::take(&mut request.tool_results),
            });
        }
        request.chat_history.push(ChatTurn::Chatbot {
            message: response.text,
            tool_calls: response.tool_calls,
        });
        request.tool_results = results;
    }
}

/// Execute one requested tool call. Search failures propagate; malformed
/// calls are reported back to the model as tool output.
async fn execute_tool(search: &SerperClient, call: &ToolCall) -> Result<ToolResult> {
    if call.name != SEARCH_TOOL_NAME {
        warn!(tool = %call.name, "model requested unknown tool");
        return Ok(ToolResult {
            call: call.clone(),
            outputs: vec![json!({ "error": format!("unknown tool '{}'", call.name) })],
        });
    }

    let Some(query) = call.str_param(SEARCH_QUERY_PARAM) else {
        warn!("search call without a query");
        return Ok(ToolResult {
            call: call.clone(),
            outputs: vec![json!({ "error": format!("missing parameter '{SEARCH_QUERY_PARAM}'") })],
        });
    };

    let hits = search.search(query).await?;
    debug!(results = %format_hits(&hits), "search results");
    let outputs = if hits.is_empty() {
        vec![json!({ "result": "No results found." })]
    } else {
        hits.iter().map(|h| json!(h)).collect()
    };

    Ok(ToolResult {
        call: call.clone(),
        outputs,
    })
}

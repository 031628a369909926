//! End-to-end generation: session → history → research brief → document.

use std::time::Instant;

use tracing::{debug, info, instrument};

use scribe_llm::CohereClient;
use scribe_search::SerperClient;
use scribe_shared::{Result, RuntimeConfig, ScribeError, Session};

use crate::agent::{self, RESEARCHER, WRITER};
use crate::history::format_history;
use crate::stage::run_stage;

/// Message of the error returned for a session without messages.
pub const EMPTY_SESSION: &str = "session has no messages";

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
}

/// Run the two-stage pipeline and return the final markdown.
pub async fn generate_content(session: &Session, config: &RuntimeConfig) -> Result<String> {
    generate_content_with_progress(session, config, &SilentProgress).await
}

/// Run the two-stage pipeline, reporting phases to `progress`.
///
/// 1. Validate: the session needs at least one message
/// 2. Split the current request from the history and render the history
/// 3. Research stage: brief, with optional web search
/// 4. Writing stage: final document from the brief
#[instrument(skip_all, fields(messages = session.messages.len()))]
pub async fn generate_content_with_progress(
    session: &Session,
    config: &RuntimeConfig,
    progress: &dyn ProgressReporter,
) -> Result<String> {
    let (history, current) = session
        .split_current()
        .ok_or_else(|| ScribeError::validation(EMPTY_SESSION))?;

    let start = Instant::now();
    info!(history = history.len(), "starting generation pipeline");

    let transcript = format_history(history);
    let llm = CohereClient::new(&config.llm)?;
    let search = config.search.as_ref().map(SerperClient::new).transpose()?;
    debug!(model = llm.model(), search = search.is_some(), "clients ready");

    // --- Stage 1: research / contextualize ---
    progress.phase("Researching");
    let research_prompt = agent::build_prompt(
        &RESEARCHER,
        &agent::research_task(&transcript, &current.content),
        None,
    );
    let brief = run_stage(
        "research",
        &llm,
        &research_prompt,
        search.as_ref(),
        config.llm.max_tool_rounds,
    )
    .await?;
    debug!(chars = brief.len(), brief = %brief, "research brief ready");

    // --- Stage 2: write / edit ---
    progress.phase("Writing");
    let context = format!(
        "{brief}\n\n{}",
        agent::request_context(&transcript, &current.content)
    );
    let writing_prompt = agent::build_prompt(&WRITER, &agent::writing_task(), Some(&context));
    let content = run_stage("write", &llm, &writing_prompt, None, 0).await?;

    info!(
        chars = content.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "generation pipeline complete"
    );

    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_shared::{LlmSettings, Message, SearchSettings};
    use url::Url;
    use wiremock::matchers::{any, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn runtime(server: &MockServer, with_search: bool) -> RuntimeConfig {
        let base = Url::parse(&format!("{}/", server.uri())).unwrap();
        RuntimeConfig {
            llm: LlmSettings {
                api_key: "co-key".into(),
                base_url: base.clone(),
                model: "command-r".into(),
                temperature: 0.7,
                max_tokens: 4096,
                max_tool_rounds: 3,
                timeout: None,
            },
            search: with_search.then(|| SearchSettings {
                api_key: "sp-key".into(),
                base_url: base,
                n_results: 5,
            }),
        }
    }

    fn text(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "text": body }))
    }

    async fn mount_stages(server: &MockServer, brief: &str, article: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .and(body_string_contains("Senior Research Analyst"))
            .respond_with(text(brief))
            .expect(1)
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .and(body_string_contains("Content Writer and Editor"))
            .respond_with(text(article))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn chat_bodies(server: &MockServer) -> Vec<serde_json::Value> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/v1/chat")
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn empty_session_fails_before_any_call() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = generate_content(&Session::default(), &runtime(&server, true))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(err.to_string().contains(EMPTY_SESSION));
    }

    #[tokio::test]
    async fn single_message_runs_both_stages() {
        let server = MockServer::start().await;
        mount_stages(
            &server,
            "Executive summary: solar panels convert sunlight.",
            "# Solar Panels\n\nSolar panels turn light into power.",
        )
        .await;

        let session = Session::new(vec![Message::user("Write a short article about solar panels")]);
        let content = generate_content(&session, &runtime(&server, false))
            .await
            .unwrap();

        assert!(!content.is_empty());
        assert!(content.starts_with("# Solar Panels"));

        let bodies = chat_bodies(&server).await;
        assert_eq!(bodies.len(), 2);

        let research = bodies[0]["message"].as_str().unwrap();
        assert!(research.contains("'Write a short article about solar panels'"));
        assert!(bodies[0].get("tools").is_none());

        let writing = bodies[1]["message"].as_str().unwrap();
        assert!(writing.contains("Executive summary: solar panels convert sunlight."));
        assert!(writing.contains("Write a short article about solar panels"));
    }

    #[tokio::test]
    async fn follow_up_prompt_carries_prior_answer() {
        let server = MockServer::start().await;
        mount_stages(&server, "Original text plus: summarize it", "Two sentences.").await;

        let session = Session::new(vec![
            Message::user("Write about tides"),
            Message::assistant("# Tides\n\nTides are caused by the moon."),
            Message::user("Summarize that in two sentences"),
        ]);
        generate_content(&session, &runtime(&server, false))
            .await
            .unwrap();

        let bodies = chat_bodies(&server).await;
        let research = bodies[0]["message"].as_str().unwrap();
        assert!(research.contains("- Assistant: # Tides\n\nTides are caused by the moon."));
        assert!(research.contains("- User: Write about tides"));
        assert!(research.contains("'Summarize that in two sentences'"));
        assert!(research.contains("modify, summarize, or expand"));
        assert!(research.contains("No new research is needed."));
        // The current request is not repeated as history.
        assert!(!research.contains("- User: Summarize that"));
    }

    #[tokio::test]
    async fn summarize_after_assistant_message_skips_research() {
        let server = MockServer::start().await;
        mount_stages(&server, "Summarize the solar article", "Solar works. It is cheap.").await;

        let session = Session::new(vec![
            Message::assistant("# Solar Panels\n\nSolar panels turn light into power."),
            Message::user("Summarize that in two sentences"),
        ]);
        let content = generate_content(&session, &runtime(&server, false))
            .await
            .unwrap();
        assert_eq!(content, "Solar works. It is cheap.");

        let bodies = chat_bodies(&server).await;
        assert_eq!(bodies.len(), 2);

        let research = bodies[0]["message"].as_str().unwrap();
        assert!(research.contains("Here is the conversation history:"));
        assert!(
            research.contains("- Assistant: # Solar Panels\n\nSolar panels turn light into power.")
        );
        assert!(research.contains("'Summarize that in two sentences'"));
        assert!(research.contains("modify, summarize, or expand"));
        assert!(research.contains("No new research is needed."));
    }

    #[tokio::test]
    async fn research_stage_can_search() {
        let server = MockServer::start().await;

        // Second research call, carrying search results.
        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .and(body_string_contains("tool_results"))
            .respond_with(text("Brief with sources: https://example.com/pv"))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;

        // First research call asks for a search.
        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .and(body_string_contains("Senior Research Analyst"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "",
                "tool_calls": [{"name": "internet_search", "parameters": {"search_query": "solar panels 2024"}}]
            })))
            .with_priority(2)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .and(body_string_contains("Content Writer and Editor"))
            .respond_with(text("# Solar"))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_string_contains("solar panels 2024"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "organic": [{"title": "PV basics", "link": "https://example.com/pv", "snippet": "Photovoltaics"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = Session::new(vec![Message::user("Write a short article about solar panels")]);
        let content = generate_content(&session, &runtime(&server, true))
            .await
            .unwrap();
        assert_eq!(content, "# Solar");

        let bodies = chat_bodies(&server).await;
        assert_eq!(bodies.len(), 3);
        assert_eq!(bodies[0]["tools"][0]["name"], "internet_search");

        let follow = &bodies[1];
        assert_eq!(follow["message"], "");
        assert_eq!(follow["chat_history"][0]["role"], "USER");
        assert_eq!(follow["chat_history"][1]["role"], "CHATBOT");
        assert_eq!(follow["tool_results"][0]["outputs"][0]["title"], "PV basics");

        // The writing stage never gets the tool.
        assert!(bodies[2].get("tools").is_none());
    }

    #[tokio::test]
    async fn search_failure_propagates() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .and(body_string_contains("Senior Research Analyst"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "",
                "tool_calls": [{"name": "internet_search", "parameters": {"search_query": "q"}}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .and(body_string_contains("Content Writer and Editor"))
            .respond_with(text("unused"))
            .expect(0)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500).set_body_string("quota exhausted"))
            .mount(&server)
            .await;

        let session = Session::new(vec![Message::user("Anything new on fusion?")]);
        let err = generate_content(&session, &runtime(&server, true))
            .await
            .unwrap_err();

        assert!(matches!(err, ScribeError::Search(_)));
        assert!(err.to_string().contains("quota exhausted"));
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"message": "internal model failure"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let session = Session::new(vec![Message::user("Write about owls")]);
        let err = generate_content(&session, &runtime(&server, false))
            .await
            .unwrap_err();

        assert!(matches!(err, ScribeError::Llm(_)));
        assert!(err.to_string().contains("internal model failure"));
    }

    #[tokio::test]
    async fn endless_tool_calls_hit_round_limit() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "",
                "tool_calls": [{"name": "internet_search", "parameters": {"search_query": "again"}}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"organic": []})))
            .expect(3)
            .mount(&server)
            .await;

        let session = Session::new(vec![Message::user("Loop forever")]);
        let err = generate_content(&session, &runtime(&server, true))
            .await
            .unwrap_err();

        assert!(matches!(err, ScribeError::Llm(_)));
        assert!(err.to_string().contains("after 3 rounds"));
    }
}

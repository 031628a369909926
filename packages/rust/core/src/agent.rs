//! Agent and task prompt templates.
//!
//! An "agent" here is nothing more than a persona (role, goal, backstory)
//! and a "task" is an instruction plus the shape of the expected answer.
//! [`build_prompt`] interpolates them into the preamble and message of one
//! model call.

/// Persona the model is asked to adopt for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentProfile {
    pub role: &'static str,
    pub goal: &'static str,
    pub backstory: &'static str,
}

/// What a stage must produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub description: String,
    pub expected_output: String,
}

/// Rendered prompt for one model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePrompt {
    /// System-level persona text.
    pub preamble: String,
    /// The task message.
    pub message: String,
}

pub const RESEARCHER: AgentProfile = AgentProfile {
    role: "Senior Research Analyst",
    goal: "Analyze the user's request, and if new information is needed, research it. \
           Synthesize findings from reliable web sources.",
    backstory: "You are an expert research analyst. Your strength is understanding a user's intent. \
                If the user is asking a new question, you perform deep web research. \
                If the user is asking to modify or summarize previous content, you recognize that \
                and prepare the context for the writer. \
                You are skilled at distinguishing reliable sources and fact-checking.",
};

pub const WRITER: AgentProfile = AgentProfile {
    role: "Content Writer and Editor",
    goal: "Generate a complete, engaging, and well-formatted response that directly addresses \
           the user's latest prompt, using the provided context and research.",
    backstory: "You are a skilled content writer and editor. You can create a new blog post from \
                a research brief, or you can modify, summarize, or expand on a previously written \
                article based on the user's instructions. \
                You always maintain a professional and engaging tone, ensuring the final output \
                is a complete piece, not a draft.",
};

/// Block naming the history and the current request, shared by both stages.
pub fn request_context(history: &str, latest_request: &str) -> String {
    format!("**Conversation History:**\n{history}\n**User's Latest Request:** '{latest_request}'")
}

/// Stage 1: decide between fresh research and reuse of prior text.
pub fn research_task(history: &str, latest_request: &str) -> TaskSpec {
    TaskSpec {
        description: format!(
            "{}\n\
             Analyze the user's latest request in the context of the conversation history. \
             1. If the user is asking a **new question** or for a new article, conduct comprehensive \
             research on the topic. \
             2. If the user is asking to **modify, summarize, or expand** on the previous response, \
             identify the relevant text from the history. No new research is needed. \
             3. Synthesize your findings (either from research or from the history) into a \
             structured brief for the writer.",
            request_context(history, latest_request)
        ),
        expected_output: "A structured brief containing either:\n\
             - For new topics: An executive summary, key facts, and source links.\n\
             - For follow-ups: The original text to be modified and a clear instruction \
             (e.g., 'Summarize this text', 'Expand this into bullet points')."
            .to_string(),
    }
}

/// Stage 2: produce the final markdown document.
pub fn writing_task() -> TaskSpec {
    TaskSpec {
        description: "Using the provided brief and the full conversation context, generate the \
             final response. \
             If the request was for a new article, write a complete blog post with H1, H3 \
             sub-headings, and citations. \
             If the request was a follow-up (e.g., 'make it longer', 'summarize'), perform that \
             action on the previous response. \
             Your final output must be a complete, polished piece of content in markdown, ready \
             for the user."
            .to_string(),
        expected_output: "A complete and polished response in markdown format. This could be a \
             full article, a summarized version of a previous article, a list of bullet points, \
             or any other format that fulfills the user's latest request."
            .to_string(),
    }
}

/// Interpolate persona, task and optional context into a prompt.
pub fn build_prompt(agent: &AgentProfile, task: &TaskSpec, context: Option<&str>) -> StagePrompt {
    let preamble = format!(
        "You are {}. {}\nYour personal goal is: {}",
        agent.role, agent.backstory, agent.goal
    );

    let mut message = format!(
        "Current Task: {}\n\nThis is the expected criteria for your final answer: {}\n\
         you MUST return the actual complete content as the final answer, not a summary.",
        task.description, task.expected_output
    );

    if let Some(ctx) = context.filter(|c| !c.trim().is_empty()) {
        message.push_str("\n\nThis is the context you're working with:\n");
        message.push_str(ctx);
    }

    StagePrompt { preamble, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_carries_persona() {
        let prompt = build_prompt(&RESEARCHER, &research_task("", "hi"), None);
        assert!(prompt.preamble.starts_with("You are Senior Research Analyst."));
        assert!(prompt.preamble.contains("Your personal goal is: Analyze the user's request"));
    }

    #[test]
    fn research_task_embeds_history_and_request() {
        let task = research_task("Here is the conversation history:\n- User: a\n", "b");
        assert!(task.description.starts_with("**Conversation History:**\nHere is the conversation history:\n- User: a\n"));
        assert!(task.description.contains("**User's Latest Request:** 'b'"));
        assert!(task.description.contains("No new research is needed."));
    }

    #[test]
    fn context_is_appended_only_when_present() {
        let task = writing_task();
        let without = build_prompt(&WRITER, &task, None);
        assert!(!without.message.contains("context you're working with"));

        let blank = build_prompt(&WRITER, &task, Some("  \n"));
        assert_eq!(blank, without);

        let with = build_prompt(&WRITER, &task, Some("BRIEF TEXT"));
        assert!(with.message.starts_with("Current Task: Using the provided brief"));
        assert!(with.message.ends_with("This is the context you're working with:\nBRIEF TEXT"));
    }

    #[test]
    fn writer_and_researcher_are_distinct() {
        assert_ne!(RESEARCHER.role, WRITER.role);
        let w = build_prompt(&WRITER, &writing_task(), None);
        assert!(!w.preamble.contains(RESEARCHER.role));
    }
}

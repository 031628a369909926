//! Conversation transcript rendering.

use scribe_shared::Message;

/// Header line preceding a non-empty transcript.
pub const HISTORY_HEADER: &str = "Here is the conversation history:";

/// Render messages as a readable transcript, one `- Role: content` line per
/// message in order. Returns an empty string for no messages.
pub fn format_history(messages: &[Message]) -> String {
    if messages.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(
        HISTORY_HEADER.len() + messages.iter().map(|m| m.content.len() + 16).sum::<usize>(),
    );
    out.push_str(HISTORY_HEADER);
    out.push('\n');
    for msg in messages {
        out.push_str("- ");
        out.push_str(msg.role.label());
        out.push_str(": ");
        out.push_str(&msg.content);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_is_empty_string() {
        assert_eq!(format_history(&[]), "");
    }

    #[test]
    fn one_line_per_message_in_order() {
        let messages = vec![
            Message::user("Write about bees"),
            Message::assistant("# Bees\nBees are insects."),
            Message::user("Add a section on honey"),
        ];
        let out = format_history(&messages);

        assert_eq!(
            out,
            "Here is the conversation history:\n\
             - User: Write about bees\n\
             - Assistant: # Bees\nBees are insects.\n\
             - User: Add a section on honey\n"
        );
    }

    #[test]
    fn roles_map_to_labels() {
        let out = format_history(&[Message::assistant("a"), Message::user("b")]);
        let lines: Vec<&str> = out.lines().skip(1).collect();
        assert_eq!(lines, vec!["- Assistant: a", "- User: b"]);
    }
}

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::db::models::{ChatRole, Message, User};

/// A role/content pair ready to send to the chat model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ContextMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Only the most recent stored messages are sent upstream, keeping requests
/// bounded and replies focused. Older messages stay persisted and readable.
pub const HISTORY_WINDOW: usize = 20;

/// Fixed persona and safety instructions for the companion.
pub const PERSONA_INSTRUCTIONS: &str = "\
You are Wren, a calm, grounded companion for people dealing with anxiety, \
stress, and low mood. You are not a doctor, a therapist, or a crisis service, \
and you never claim to be.

Style:
- Sound like a steady friend who knows anxiety well. Short answers, usually \
3-6 sentences, in plain language.
- No lectures, no clinical jargon, no fake positivity.
- Usually end with one gentle, specific follow-up question.

When the user is anxious or panicky:
- Stay with the current wave of anxiety rather than their whole life story.
- Help them face the sensations instead of fighting them, soften resistance, \
let the wave pass on its own time.
- Remind them the sensations are uncomfortable but not dangerous, without \
making medical guarantees.
- Offer one small concrete step at a time: slow exhale, noticing contact \
points, naming what they see and hear.

When the user sounds flat or hopeless:
- Validate the heaviness without dramatizing it. Suggest one tiny realistic \
step and check in.

Safety:
- If the user mentions wanting to die, self-harm, or harming others: respond \
with empathy, say clearly that you cannot provide crisis support, and urge \
them to contact a local crisis line or emergency number, or a trusted person, \
right now. Keep that response short and steady, with no casual follow-up \
questions.
- Never diagnose, never promise cures, never give medication or treatment \
instructions. Encourage professional help when things are severe or \
persistent.";

/// One-block summary of who the model is talking to, injected as a second
/// system entry.
pub fn profile_summary(user: &User) -> String {
    let mut parts = vec![
        format!("Name: {}", user.display_name),
        format!("Email: {}", user.email),
    ];
    match user.profile_notes.as_deref().map(str::trim) {
        Some(notes) if !notes.is_empty() => parts.push(format!("Profile notes: {notes}")),
        _ => parts.push("No profile notes provided.".into()),
    }
    parts.join("\n")
}

/// Assemble the ordered message list for the chat model.
///
/// Fixed construction order: persona/safety instructions, then the user
/// profile summary, then the most recent `HISTORY_WINDOW` stored messages in
/// insertion order. Pure function — no I/O, no truncation of individual
/// messages.
pub fn build_context(
    persona_instructions: &str,
    profile_text: &str,
    history: &[Message],
) -> Vec<ContextMessage> {
    let windowed = if history.len() > HISTORY_WINDOW {
        &history[history.len() - HISTORY_WINDOW..]
    } else {
        history
    };

    let mut out = Vec::with_capacity(windowed.len() + 2);
    out.push(ContextMessage {
        role: ChatRole::System,
        content: persona_instructions.into(),
    });
    out.push(ContextMessage {
        role: ChatRole::System,
        content: format!(
            "Here is context about the person you are helping. \
             Use it to personalize your responses:\n{profile_text}"
        ),
    });
    for m in windowed {
        out.push(ContextMessage {
            role: m.role,
            content: m.content.clone(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: ChatRole, content: &str, ordinal: i64) -> Message {
        Message {
            id: format!("m{ordinal}"),
            conversation_id: "c1".into(),
            role,
            content: content.into(),
            ordinal,
            created_at: "2026-01-01T00:00:00+00:00".into(),
        }
    }

    fn test_user(notes: Option<&str>) -> User {
        User {
            id: "u1".into(),
            email: "a@x.com".into(),
            display_name: "Ada".into(),
            profile_notes: notes.map(String::from),
            created_at: "2026-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn test_construction_order() {
        let history = vec![
            msg(ChatRole::User, "I feel anxious", 0),
            msg(ChatRole::Assistant, "Let's breathe together", 1),
        ];
        let ctx = build_context(PERSONA_INSTRUCTIONS, "Name: Ada", &history);

        assert_eq!(ctx.len(), 4);
        assert_eq!(ctx[0].role, ChatRole::System);
        assert_eq!(ctx[0].content, PERSONA_INSTRUCTIONS);
        assert_eq!(ctx[1].role, ChatRole::System);
        assert!(ctx[1].content.contains("Name: Ada"));
        assert_eq!(ctx[2].role, ChatRole::User);
        assert_eq!(ctx[2].content, "I feel anxious");
        assert_eq!(ctx[3].role, ChatRole::Assistant);
        assert_eq!(ctx[3].content, "Let's breathe together");
    }

    #[test]
    fn test_history_is_windowed_to_most_recent() {
        let history: Vec<_> = (0..30)
            .map(|i| msg(ChatRole::User, &format!("msg {i}"), i))
            .collect();
        let ctx = build_context(PERSONA_INSTRUCTIONS, "", &history);

        assert_eq!(ctx.len(), 2 + HISTORY_WINDOW);
        assert_eq!(ctx[2].content, "msg 10");
        assert_eq!(ctx.last().unwrap().content, "msg 29");
    }

    #[test]
    fn test_profile_summary_with_and_without_notes() {
        let with = profile_summary(&test_user(Some("Prefers breathing exercises")));
        assert!(with.contains("Name: Ada"));
        assert!(with.contains("Profile notes: Prefers breathing exercises"));

        let without = profile_summary(&test_user(None));
        assert!(without.contains("No profile notes provided."));

        let blank = profile_summary(&test_user(Some("   ")));
        assert!(blank.contains("No profile notes provided."));
    }
}

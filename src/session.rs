use std::sync::Arc;

use crate::context;
use crate::db::models::{Conversation, CreateUserInput, Message, User};
use crate::db::repos::{conversations, messages, users};
use crate::db::DbPool;
use crate::engine::ModelProvider;
use crate::error::AppError;

/// Handle for one authenticated session.
///
/// Deliberately an explicit value passed into every controller call — there is
/// no process-wide "current user", so any number of sessions (tabs, users) can
/// run against one controller. Dropping the handle is a logout; persisted data
/// is never touched by it.
#[derive(Debug, Clone)]
pub struct Session {
    user_id: String,
    conversation_id: String,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The active conversation receiving new messages.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
}

/// Orchestrates signup/login, conversation selection, message submission, and
/// reply persistence. The only component that talks to the model provider,
/// and the only state surface the presentation layer sees.
pub struct SessionController {
    pool: DbPool,
    provider: Arc<dyn ModelProvider>,
}

impl SessionController {
    pub fn new(pool: DbPool, provider: Arc<dyn ModelProvider>) -> Self {
        Self { pool, provider }
    }

    // --------------------------------------------------------------------
    // LoggedOut -> Active
    // --------------------------------------------------------------------

    /// Create an account and open its first session.
    pub fn register(&self, input: CreateUserInput) -> Result<Session, AppError> {
        let user = users::create(&self.pool, input)?;
        self.open_session(&user.id)
    }

    /// Authenticate and resume the user's active conversation (creating one
    /// on first login).
    pub fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let user = users::authenticate(&self.pool, email, password)?;
        self.open_session(&user.id)
    }

    fn open_session(&self, user_id: &str) -> Result<Session, AppError> {
        let conversation = conversations::get_active(&self.pool, user_id)?;
        Ok(Session {
            user_id: user_id.into(),
            conversation_id: conversation.id,
        })
    }

    // --------------------------------------------------------------------
    // Active -> Active
    // --------------------------------------------------------------------

    /// Submit a user message and return the assistant's reply.
    ///
    /// The user message is persisted before the model call and stays persisted
    /// if the call fails — the `Upstream` error propagates to the caller, who
    /// may retry by submitting again. No automatic retry here.
    pub async fn submit_message(
        &self,
        session: &Session,
        text: &str,
    ) -> Result<Message, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::InvalidInput("Message text is required".into()));
        }

        messages::append(
            &self.pool,
            &session.conversation_id,
            crate::db::models::ChatRole::User,
            text,
        )?;

        let user = users::get_by_id(&self.pool, &session.user_id)?;
        // History already includes the message appended above, so it arrives
        // at the model as the final entry of the assembled context.
        let history = messages::list(&self.pool, &session.conversation_id)?;
        let ctx = context::build_context(
            context::PERSONA_INSTRUCTIONS,
            &context::profile_summary(&user),
            &history,
        );

        let reply = match self.provider.generate_reply(&ctx).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(
                    conversation_id = %session.conversation_id,
                    error = %e,
                    "Model call failed; user message retained"
                );
                return Err(e);
            }
        };

        let assistant_msg = messages::append(
            &self.pool,
            &session.conversation_id,
            crate::db::models::ChatRole::Assistant,
            &reply,
        )?;

        Ok(assistant_msg)
    }

    /// Rotate to a fresh conversation; the prior one stays readable.
    pub fn start_new_session(&self, session: &mut Session) -> Result<Conversation, AppError> {
        let conversation = conversations::start_new(&self.pool, &session.user_id)?;
        session.conversation_id = conversation.id.clone();
        Ok(conversation)
    }

    /// Full history of the session's active conversation, in insertion order.
    pub fn history(&self, session: &Session) -> Result<Vec<Message>, AppError> {
        messages::list(&self.pool, &session.conversation_id)
    }

    /// All of the user's conversations, newest first.
    pub fn conversations(&self, session: &Session) -> Result<Vec<Conversation>, AppError> {
        conversations::list_for_user(&self.pool, &session.user_id)
    }

    pub fn current_user(&self, session: &Session) -> Result<User, AppError> {
        users::get_by_id(&self.pool, &session.user_id)
    }

    pub fn profile(&self, session: &Session) -> Result<String, AppError> {
        users::get_profile(&self.pool, &session.user_id)
    }

    pub fn update_profile(&self, session: &Session, text: &str) -> Result<(), AppError> {
        users::set_profile(&self.pool, &session.user_id, text)
    }

    // --------------------------------------------------------------------
    // Active -> LoggedOut
    // --------------------------------------------------------------------

    /// End the session. Consumes the handle; nothing persisted changes.
    pub fn logout(&self, session: Session) {
        tracing::info!(user_id = %session.user_id, "Session ended");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::context::ContextMessage;
    use crate::db::init_test_db;
    use crate::db::models::ChatRole;

    /// Returns a fixed reply and records the last context it was sent.
    struct ScriptedProvider {
        reply: String,
        last_context: Mutex<Vec<ContextMessage>>,
    }

    impl ScriptedProvider {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.into(),
                last_context: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn generate_reply(
            &self,
            context: &[ContextMessage],
        ) -> Result<String, AppError> {
            *self.last_context.lock().unwrap() = context.to_vec();
            Ok(self.reply.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ModelProvider for FailingProvider {
        async fn generate_reply(&self, _: &[ContextMessage]) -> Result<String, AppError> {
            Err(AppError::Upstream("connection refused".into()))
        }
    }

    fn signup() -> CreateUserInput {
        CreateUserInput {
            email: "a@x.com".into(),
            display_name: "Ada".into(),
            password: "pw12345".into(),
            profile_notes: None,
        }
    }

    fn controller(provider: Arc<dyn ModelProvider>) -> SessionController {
        SessionController::new(init_test_db().unwrap(), provider)
    }

    #[tokio::test]
    async fn test_signup_chat_and_replay() {
        let provider = Arc::new(ScriptedProvider::new("Let's breathe together"));
        let ctl = controller(provider.clone());

        let session = ctl.register(signup()).unwrap();
        let reply = ctl.submit_message(&session, "I feel anxious").await.unwrap();
        assert_eq!(reply.role, ChatRole::Assistant);
        assert_eq!(reply.content, "Let's breathe together");

        let history = ctl.history(&session).unwrap();
        let pairs: Vec<_> = history
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            pairs,
            [
                (ChatRole::User, "I feel anxious"),
                (ChatRole::Assistant, "Let's breathe together"),
            ]
        );
    }

    #[tokio::test]
    async fn test_context_sent_to_model() {
        let provider = Arc::new(ScriptedProvider::new("ok"));
        let ctl = controller(provider.clone());

        let session = ctl.register(signup()).unwrap();
        ctl.update_profile(&session, "Walks by the water help.").unwrap();
        ctl.submit_message(&session, "hello").await.unwrap();

        let ctx = provider.last_context.lock().unwrap().clone();
        assert_eq!(ctx[0].role, ChatRole::System);
        assert_eq!(ctx[0].content, context::PERSONA_INSTRUCTIONS);
        assert_eq!(ctx[1].role, ChatRole::System);
        assert!(ctx[1].content.contains("Walks by the water help."));
        // The just-submitted message is the final entry.
        let last = ctx.last().unwrap();
        assert_eq!(last.role, ChatRole::User);
        assert_eq!(last.content, "hello");
    }

    #[tokio::test]
    async fn test_upstream_failure_keeps_user_message() {
        let ctl = controller(Arc::new(FailingProvider));

        let session = ctl.register(signup()).unwrap();
        let err = ctl.submit_message(&session, "hello").await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));

        let history = ctl.history(&session).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[0].content, "hello");
    }

    #[tokio::test]
    async fn test_login_resumes_active_conversation() {
        let ctl = controller(Arc::new(ScriptedProvider::new("ok")));

        let first = ctl.register(signup()).unwrap();
        ctl.submit_message(&first, "remember this").await.unwrap();
        ctl.logout(first.clone());

        let resumed = ctl.login("a@x.com", "pw12345").unwrap();
        assert_eq!(resumed.conversation_id(), first.conversation_id());

        let history = ctl.history(&resumed).unwrap();
        assert_eq!(history[0].content, "remember this");
    }

    #[tokio::test]
    async fn test_new_session_rotates_conversation() {
        let ctl = controller(Arc::new(ScriptedProvider::new("ok")));

        let mut session = ctl.register(signup()).unwrap();
        let old_id = session.conversation_id().to_string();
        ctl.submit_message(&session, "first session").await.unwrap();

        let fresh = ctl.start_new_session(&mut session).unwrap();
        assert_ne!(fresh.id, old_id);
        assert_eq!(session.conversation_id(), fresh.id);
        assert!(ctl.history(&session).unwrap().is_empty());

        // The prior conversation's messages remain retrievable.
        let listed = ctl.conversations(&session).unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_blank_submission_rejected() {
        let ctl = controller(Arc::new(ScriptedProvider::new("ok")));
        let session = ctl.register(signup()).unwrap();

        let err = ctl.submit_message(&session, "   ").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(ctl.history(&session).unwrap().is_empty());
    }
}

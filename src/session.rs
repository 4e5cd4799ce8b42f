//! End-to-end generation flows, one per front-end request.
//!
//! Each flow builds a conversation, drives the retry orchestrator, and
//! persists history under the session's user id. Sessions are independent;
//! concurrent sessions touch disjoint store keys.

use crate::chat::ModelInvoker;
use crate::config::AppConfig;
use crate::conversation::{Conversation, Role};
use crate::error::EngineError;
use crate::extract;
use crate::probe::ReachabilityProbe;
use crate::retry::{RetryBudget, RetryOrchestrator};
use crate::store::HistoryStore;
use crate::util;
use tracing::info;

const SYSTEM_PROMPT: &str = "Write complete JavaScript code using `Three.js`.";

const FIRST_MESSAGE_RULES: &str = "However, follow these coding rules:\n\
- Start with the import statements.\n\
- Assume the html body contains no tags.\n\
- Append the generated canvas to document.body.";

const RESUME_RULES_REMINDER: &str = "However, keep following the coding rules stated earlier.";

/// What a generation flow hands back to the front end.
#[derive(Debug)]
pub struct SessionOutput {
    pub user_id: String,
    /// Script as written by the model, shown to the user.
    pub content: String,
    /// Normalized script, for callers that embed it directly.
    pub source_code: String,
}

/// Collaborators injected into each flow.
pub struct SessionDeps<'a, M: ModelInvoker, P: ReachabilityProbe, S: HistoryStore> {
    pub invoker: &'a M,
    pub probe: &'a P,
    pub store: &'a S,
}

/// Start a new session: fresh conversation, fresh user id.
///
/// The whole conversation, system prompt included, is persisted once the
/// run completes.
pub async fn start<M, P, S>(
    config: &AppConfig,
    deps: &SessionDeps<'_, M, P, S>,
    prompt: &str,
) -> Result<SessionOutput, EngineError>
where
    M: ModelInvoker,
    P: ReachabilityProbe,
    S: HistoryStore,
{
    let user_id = util::session_id();
    info!(%user_id, "starting session");

    let mut conversation = Conversation::initialize(SYSTEM_PROMPT);
    let first_message = format!("Draw `{prompt}`.\n{FIRST_MESSAGE_RULES}");
    conversation.append_user(&first_message, Some(config.generation.max_content_length))?;

    let orchestrator = RetryOrchestrator::new(
        deps.invoker,
        &config.policy,
        deps.probe,
        config.generation.temperature,
    );
    let report = orchestrator
        .run(
            &mut conversation,
            None,
            RetryBudget::new(config.generation.max_attempts),
        )
        .await?;
    info!(%user_id, attempts = report.attempts_used, outcome = ?report.outcome, "session finished");

    deps.store.append_many(&user_id, conversation.messages())?;

    Ok(SessionOutput {
        user_id,
        content: report.with_comments,
        source_code: report.source_code,
    })
}

/// Continue an existing session with a follow-up request.
///
/// The stored history is compressed to its three-message summary before the
/// new user turn is appended; every exchange of the run is persisted as it
/// happens.
pub async fn resume<M, P, S>(
    config: &AppConfig,
    deps: &SessionDeps<'_, M, P, S>,
    user_id: &str,
    prompt: &str,
) -> Result<SessionOutput, EngineError>
where
    M: ModelInvoker,
    P: ReachabilityProbe,
    S: HistoryStore,
{
    let records = deps.store.query(user_id)?;
    if records.is_empty() {
        return Err(EngineError::UnknownSession(user_id.to_string()));
    }

    let max_turns = config.generation.max_user_turns;
    let stored_user_turns = records
        .iter()
        .filter(|record| record.role == Role::User.as_str())
        .count();
    if stored_user_turns >= max_turns as usize {
        return Err(EngineError::TooManyUserTurns { max: max_turns });
    }

    let mut conversation = Conversation::load_from_records(&records)?;
    conversation.compress()?;
    let follow_up = format!("{prompt}\n{RESUME_RULES_REMINDER}");
    conversation.append_user(&follow_up, Some(config.generation.max_content_length))?;
    info!(%user_id, stored_user_turns, "resuming session");

    let orchestrator = RetryOrchestrator::new(
        deps.invoker,
        &config.policy,
        deps.probe,
        config.generation.temperature,
    )
    .with_persistence(deps.store, user_id);
    let report = orchestrator
        .run(
            &mut conversation,
            Some(max_turns),
            RetryBudget::new(config.generation.max_attempts),
        )
        .await?;
    info!(%user_id, attempts = report.attempts_used, outcome = ?report.outcome, "session finished");

    Ok(SessionOutput {
        user_id: user_id.to_string(),
        content: report.with_comments,
        source_code: report.source_code,
    })
}

/// Re-extract the last generated script without calling the model.
pub fn last_source<S: HistoryStore>(
    store: &S,
    user_id: &str,
) -> Result<SessionOutput, EngineError> {
    let records = store.query(user_id)?;
    if records.is_empty() {
        return Err(EngineError::UnknownSession(user_id.to_string()));
    }
    let conversation = Conversation::load_from_records(&records)?;
    let with_comments = extract::with_comments(conversation.last_assistant_content()?)?;
    let source_code = extract::normalized(&with_comments);
    Ok(SessionOutput {
        user_id: user_id.to_string(),
        content: with_comments,
        source_code,
    })
}

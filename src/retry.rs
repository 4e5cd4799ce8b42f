//! Correction loop state machine for the generate-validate-retry process.
//!
//! Tracks progress through: send -> extract -> validate -> compose -> send,
//! bounded by a retry budget. A clean validation or an exhausted budget both
//! end the loop; only collaborator failures and an unextractable reply are
//! errors.

use crate::chat::ModelInvoker;
use crate::conversation::Conversation;
use crate::correction;
use crate::error::EngineError;
use crate::extract;
use crate::policy::{Policy, PolicyChecker, ValidationResult};
use crate::probe::ReachabilityProbe;
use crate::store::HistoryStore;
use crate::util;
use tracing::{debug, info};

/// Correction attempts allowed for one run. Never persisted.
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    max_attempts: u32,
    attempts_used: u32,
}

impl RetryBudget {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts_used: 0,
        }
    }

    /// Take one attempt if any remain.
    fn try_consume(&mut self) -> bool {
        if self.attempts_used < self.max_attempts {
            self.attempts_used += 1;
            true
        } else {
            false
        }
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }
}

/// How a run ended. Budget exhaustion is a normal completion, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The final reply passed every policy check.
    Clean,
    /// Attempts ran out while violations remained; the last reply stands.
    Exhausted,
}

/// The current step of the correction loop.
#[derive(Debug)]
enum State {
    /// Waiting on the model for the next assistant reply.
    Sending,
    /// Pulling the fenced code block out of the newest reply.
    Extracting,
    /// Running the policy passes over the normalized source.
    Validating,
    /// Turning violations into one corrective user message.
    Composing(ValidationResult),
    /// Loop finished.
    Done(RunOutcome),
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub attempts_used: u32,
    /// Extracted script as written by the model, comments and all.
    pub with_comments: String,
    /// Comment- and newline-free form used by the policy scans.
    pub source_code: String,
}

/// Drives one conversation to a policy-clean script within a retry budget.
pub struct RetryOrchestrator<'a, M: ModelInvoker, P: ReachabilityProbe> {
    invoker: &'a M,
    policy: &'a Policy,
    probe: &'a P,
    temperature: f64,
    persist: Option<(&'a dyn HistoryStore, &'a str)>,
}

impl<'a, M: ModelInvoker, P: ReachabilityProbe> RetryOrchestrator<'a, M, P> {
    pub fn new(invoker: &'a M, policy: &'a Policy, probe: &'a P, temperature: f64) -> Self {
        Self {
            invoker,
            policy,
            probe,
            temperature,
            persist: None,
        }
    }

    /// Append each exchange's newest user/assistant pair to the store while
    /// the loop runs.
    pub fn with_persistence(mut self, store: &'a dyn HistoryStore, user_id: &'a str) -> Self {
        self.persist = Some((store, user_id));
        self
    }

    /// Run the loop to completion.
    ///
    /// `max_user_turns` is enforced by the invoker on the first send only;
    /// correction turns are engine-authored and exempt, as is the first
    /// message of a brand-new session.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        max_user_turns: Option<u32>,
        mut budget: RetryBudget,
    ) -> Result<RunReport, EngineError> {
        let mut turn_cap = max_user_turns;
        let mut with_comments = String::new();
        let mut source_code = String::new();
        let mut state = State::Sending;

        let outcome = loop {
            state = match state {
                State::Sending => {
                    let reply = self
                        .invoker
                        .invoke(conversation, self.temperature, turn_cap)
                        .await?;
                    turn_cap = None;
                    debug!(reply = %util::truncate(&reply, 120), "model replied");
                    conversation.append_assistant(&reply);
                    self.record_exchange(conversation)?;
                    State::Extracting
                }
                State::Extracting => {
                    with_comments = extract::with_comments(conversation.last_assistant_content()?)?;
                    source_code = extract::normalized(&with_comments);
                    State::Validating
                }
                State::Validating => {
                    let checker = PolicyChecker::new(self.policy, self.probe);
                    let result = checker.check(&source_code).await;
                    if result.is_clean() {
                        State::Done(RunOutcome::Clean)
                    } else {
                        debug!(
                            imports = result.disallowed_imports.len(),
                            words = result.forbidden_hits.len(),
                            urls = result.unreachable_resources.len(),
                            "policy violations detected"
                        );
                        State::Composing(result)
                    }
                }
                State::Composing(result) => {
                    if budget.try_consume() {
                        info!(attempt = budget.attempts_used(), "requesting correction");
                        let instruction = correction::compose(&result, self.policy);
                        conversation.append_user(&instruction, None)?;
                        State::Sending
                    } else {
                        info!("retry budget exhausted, keeping last reply");
                        State::Done(RunOutcome::Exhausted)
                    }
                }
                State::Done(outcome) => break outcome,
            };
        };

        Ok(RunReport {
            outcome,
            attempts_used: budget.attempts_used(),
            with_comments,
            source_code,
        })
    }

    fn record_exchange(&self, conversation: &Conversation) -> Result<(), EngineError> {
        if let Some((store, user_id)) = self.persist {
            for message in conversation.tail(2) {
                store.append(user_id, message.role.as_str(), &message.content)?;
            }
        }
        Ok(())
    }
}

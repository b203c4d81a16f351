//! Agent loop controller - drives one model/browser session to a terminal status
//!
//! Control flow lives in [`crate::state_machine`]; this module performs the
//! I/O each directive asks for and feeds the outcome back as an event:
//! - `Infer` builds a bounded prompt and calls the [`ModelGateway`]
//! - `Execute` dispatches the action to the [`ActionExecutor`] and records the
//!   observation in the shared [`CaptureStore`]
//! - `Finish` seals the session
//!
//! Every suspension point is bounded by the step timeout, the optional session
//! budget and the cancellation token. Nothing is retried.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use scout_agent::ModelGateway;
use scout_browser::{ActionExecutor, CaptureStore};
use scout_core::config::LoopDefaults;
use scout_core::{
    ActionError, ActionRequest, AgentSession, ContentHash, ModelError, ModelReply, Observation,
    SessionStatus, StepPhase, TerminationReason, Turn,
};

use crate::activity_logger::ActivityLogger;
use crate::prompt::{build_prompt_context, PromptOptions};
use crate::state_machine::{transition, Directive, LoopEvent, LoopPolicy, LoopState};

/// Tunables for the loop beyond `max_steps` and `step_timeout`
#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub prompt: PromptOptions,
    pub max_consecutive_stalls: usize,
    /// Wall-clock cap for the whole session
    pub session_budget: Option<Duration>,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            prompt: PromptOptions::default(),
            max_consecutive_stalls: 2,
            session_budget: None,
        }
    }
}

impl LoopOptions {
    pub fn from_defaults(defaults: &LoopDefaults) -> Self {
        Self {
            prompt: PromptOptions {
                html_char_budget: defaults.html_char_budget,
                history_window: defaults.history_window,
                ..PromptOptions::default()
            },
            max_consecutive_stalls: defaults.max_consecutive_stalls,
            session_budget: defaults.session_budget(),
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.prompt.goal = goal.into();
        self
    }
}

/// Outcome of a bounded suspension point
enum Bounded<T> {
    Done(T),
    TimedOut,
    Cancelled,
    BudgetExhausted,
}

/// Per-run bookkeeping owned by a single `run` call
struct RunState {
    session: AgentSession,
    max_steps: usize,
    deadline: Option<Instant>,
    /// Content hashes observed in this session, initial capture included
    seen: HashSet<ContentHash>,
    /// Latest observation and its hash, the input to the next prompt
    current: Option<(Observation, ContentHash)>,
    /// Turn whose action is in flight
    pending: Option<Turn>,
}

/// Drives one session at a time; share it across tasks with `Arc`
pub struct AgentLoopController {
    gateway: Arc<dyn ModelGateway>,
    executor: Arc<dyn ActionExecutor>,
    captures: Arc<CaptureStore>,
    options: LoopOptions,
    cancel: CancellationToken,
    activity: Option<ActivityLogger>,
}

impl AgentLoopController {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        executor: Arc<dyn ActionExecutor>,
        captures: Arc<CaptureStore>,
    ) -> Self {
        Self {
            gateway,
            executor,
            captures,
            options: LoopOptions::default(),
            cancel: CancellationToken::new(),
            activity: None,
        }
    }

    pub fn with_options(mut self, options: LoopOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a caller-owned token; cancelling it aborts the current step
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Enable activity logging to `.scout/activity.md`
    pub fn with_activity_logging(mut self, scout_dir: std::path::PathBuf) -> Self {
        self.activity = Some(ActivityLogger::new(scout_dir));
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run a session against `target_url`
    ///
    /// The returned session is always terminal: COMPLETED, FAILED or ABORTED,
    /// with its [`scout_core::Termination`] recorded.
    ///
    /// # Arguments
    /// * `target_url` - Page the session starts from
    /// * `max_steps` - Structural cap on inferences
    /// * `step_timeout` - Bound on each model call and each action
    pub async fn run(
        &self,
        target_url: &str,
        max_steps: usize,
        step_timeout: Duration,
    ) -> AgentSession {
        let session = AgentSession::new(
            target_url,
            self.options.prompt.goal.clone(),
            self.gateway.model_name(),
        );
        info!(
            "Starting session {} for {} (max {} steps)",
            session.session_id, target_url, max_steps
        );
        if let Some(logger) = &self.activity {
            logger.log_session_start(&session, max_steps).await;
        }

        let mut run = RunState {
            session,
            max_steps,
            deadline: self.options.session_budget.map(|b| Instant::now() + b),
            seen: HashSet::new(),
            current: None,
            pending: None,
        };

        let policy = LoopPolicy {
            max_steps,
            max_consecutive_stalls: self.options.max_consecutive_stalls.max(1),
        };

        let mut state = LoopState::Initializing;
        let mut event = self.initialize(&mut run, step_timeout).await;

        loop {
            let (next, directives) = transition(state, event, &policy);
            state = next;

            let Some(directive) = directives.into_iter().next() else {
                break;
            };
            event = match directive {
                Directive::Infer { step } => self.infer(&mut run, step, step_timeout).await,
                Directive::Execute { action } => {
                    self.execute(&mut run, action, step_timeout).await
                }
                Directive::Finish { reason } => {
                    run.session.terminate(reason);
                    break;
                }
            };
        }

        if !run.session.is_finished() {
            run.session.terminate(TerminationReason::Internal {
                message: format!("loop stopped in state {:?}", state),
            });
        }

        let session = run.session;
        match session.status {
            SessionStatus::Failed => error!("{}", session.outcome_line()),
            _ => info!("{}", session.outcome_line()),
        }
        if let Some(logger) = &self.activity {
            logger.log_session_end(&session).await;
        }
        session
    }

    /// Bound a future by cancellation, session budget and step timeout
    async fn bounded<F: Future>(
        &self,
        deadline: Option<Instant>,
        step_timeout: Duration,
        fut: F,
    ) -> Bounded<F::Output> {
        let budget = async {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Bounded::Cancelled,
            _ = budget => Bounded::BudgetExhausted,
            result = tokio::time::timeout(step_timeout, fut) => match result {
                Ok(value) => Bounded::Done(value),
                Err(_) => Bounded::TimedOut,
            },
        }
    }

    /// Record an observation in the capture store and return its hash
    ///
    /// Persistence failures fall back to hashing locally; the loop keeps going.
    fn record(&self, observation: &Observation) -> ContentHash {
        match self.captures.insert_observation(observation) {
            Ok((capture, inserted)) => {
                debug!(
                    "Capture {} ({}; {} html chars, {} screenshot bytes)",
                    capture.content_hash.short(),
                    if inserted { "new" } else { "reused" },
                    observation.html.len(),
                    observation.screenshot.len()
                );
                capture.content_hash.clone()
            }
            Err(e) => {
                warn!("Capture store failed (continuing without persistence): {}", e);
                ContentHash::compute(&observation.html, &observation.screenshot)
            }
        }
    }

    /// NAVIGATE to the target, then SCREENSHOT for the initial capture
    async fn initialize(&self, run: &mut RunState, step_timeout: Duration) -> LoopEvent {
        let navigate = ActionRequest::Navigate {
            url: run.session.target_url.clone(),
        };
        let executor = Arc::clone(&self.executor);
        let capture = async move {
            executor.apply(&navigate).await?;
            executor.apply(&ActionRequest::Screenshot).await
        };

        match self.bounded(run.deadline, step_timeout, capture).await {
            Bounded::Done(Ok(observation)) => {
                let hash = self.record(&observation);
                info!(
                    "Initial capture {} for {}",
                    hash.short(),
                    observation.url
                );
                run.seen.insert(hash.clone());
                run.session.initial_capture = Some(hash.clone());
                run.current = Some((observation, hash));
                LoopEvent::Initialized
            }
            Bounded::Done(Err(error)) => {
                error!("Initial capture failed: {}", error);
                LoopEvent::InitFailed { error }
            }
            Bounded::TimedOut => LoopEvent::StepTimedOut {
                phase: StepPhase::Initialization,
            },
            Bounded::Cancelled => LoopEvent::Cancelled,
            Bounded::BudgetExhausted => LoopEvent::BudgetExhausted,
        }
    }

    async fn infer(&self, run: &mut RunState, step: usize, step_timeout: Duration) -> LoopEvent {
        run.session.step_count = step;
        info!(
            "[{}] Step {} of {}",
            run.session.session_id, step, run.max_steps
        );

        let Some((observation, hash)) = run.current.as_ref() else {
            return LoopEvent::ModelFailed {
                error: ModelError::malformed("no observation to prompt from"),
            };
        };
        let context = build_prompt_context(
            &run.session,
            observation,
            hash,
            step,
            run.max_steps,
            &self.options.prompt,
        );
        let prompt_ref = hash.clone();
        let started_at = Utc::now();

        match self
            .bounded(run.deadline, step_timeout, self.gateway.infer(&context))
            .await
        {
            Bounded::Done(Ok(reply)) => {
                let action = reply.action.clone();
                debug!("Model chose {}", action);
                let turn = Turn {
                    turn_index: run.session.turns.len(),
                    prompt_context_ref: Some(prompt_ref),
                    model_response: reply,
                    action_taken: None,
                    observation_ref: None,
                    page_url: None,
                    resolved_selector: None,
                    stalled: false,
                    error: None,
                    started_at,
                };
                if action.is_terminal() {
                    self.push_turn(run, turn).await;
                } else {
                    run.pending = Some(turn);
                }
                LoopEvent::ModelReplied { action }
            }
            Bounded::Done(Err(error)) => {
                error!(
                    "[{}] Model call failed at step {}: {}",
                    run.session.session_id, step, error
                );
                LoopEvent::ModelFailed { error }
            }
            Bounded::TimedOut => LoopEvent::StepTimedOut {
                phase: StepPhase::Inference,
            },
            Bounded::Cancelled => LoopEvent::Cancelled,
            Bounded::BudgetExhausted => LoopEvent::BudgetExhausted,
        }
    }

    async fn execute(
        &self,
        run: &mut RunState,
        action: ActionRequest,
        step_timeout: Duration,
    ) -> LoopEvent {
        let mut turn = run.pending.take().unwrap_or_else(|| Turn {
            turn_index: run.session.turns.len(),
            prompt_context_ref: None,
            model_response: ModelReply::action(action.clone()),
            action_taken: None,
            observation_ref: None,
            page_url: None,
            resolved_selector: None,
            stalled: false,
            error: None,
            started_at: Utc::now(),
        });
        turn.action_taken = Some(action.clone());

        let outcome = self
            .bounded(run.deadline, step_timeout, self.executor.apply(&action))
            .await;

        let event = match outcome {
            Bounded::Done(Ok(observation)) => {
                let hash = self.record(&observation);
                let stalled = !run.seen.insert(hash.clone());
                if stalled {
                    warn!(
                        "[{}] {} left the page unchanged ({})",
                        run.session.session_id,
                        action,
                        hash.short()
                    );
                }
                if let Some(resolved) = &observation.resolved {
                    debug!(
                        "Resolved via {} tier: {}",
                        resolved.tier, resolved.selector_text
                    );
                }
                turn.observation_ref = Some(hash.clone());
                turn.page_url = Some(observation.url.clone());
                turn.resolved_selector = observation.resolved.clone();
                turn.stalled = stalled;
                run.current = Some((observation, hash.clone()));
                LoopEvent::Observed {
                    stalled,
                    content_hash: hash,
                }
            }
            Bounded::Done(Err(error)) => {
                error!(
                    "[{}] Action {} failed: {}",
                    run.session.session_id, action, error
                );
                turn.error = Some(error.to_string());
                LoopEvent::ActionFailed { error }
            }
            Bounded::TimedOut => {
                turn.error = Some(
                    ActionError::timeout(format!("{} exceeded {:?}", action, step_timeout))
                        .to_string(),
                );
                LoopEvent::StepTimedOut {
                    phase: StepPhase::Action,
                }
            }
            Bounded::Cancelled => {
                turn.error = Some("cancelled".to_string());
                LoopEvent::Cancelled
            }
            Bounded::BudgetExhausted => {
                turn.error = Some("session budget exhausted".to_string());
                LoopEvent::BudgetExhausted
            }
        };

        self.push_turn(run, turn).await;
        event
    }

    async fn push_turn(&self, run: &mut RunState, turn: Turn) {
        if let Some(logger) = &self.activity {
            logger
                .log_turn(&run.session.session_id, run.session.step_count, &turn)
                .await;
        }
        run.session.turns.push(turn);
    }
}

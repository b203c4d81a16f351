//! Pure state machine for the agent loop
//!
//! This module implements the loop's control flow with NO I/O.
//!
//! Key design principles:
//! - Pure function: transition(state, event, policy) -> (state, directives)
//! - Step accounting happens here: a step begins when its inference is issued
//! - Invalid transitions finish the loop with an internal reason (never panic)

use scout_core::{
    ActionError, ActionRequest, ContentHash, ModelError, StepPhase, TerminationReason,
};

/// Loop limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPolicy {
    pub max_steps: usize,
    pub max_consecutive_stalls: usize,
}

/// Where the loop is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    /// Taking the initial capture
    Initializing,
    /// Waiting on the model for `step`
    Inferring { step: usize, stalls: usize },
    /// Waiting on the browser for the action chosen at `step`
    Acting { step: usize, stalls: usize },
    /// Terminal
    Finished { reason: TerminationReason },
}

impl LoopState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}

/// What happened at a suspension point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    Initialized,
    InitFailed { error: ActionError },
    ModelReplied { action: ActionRequest },
    ModelFailed { error: ModelError },
    Observed { stalled: bool, content_hash: ContentHash },
    ActionFailed { error: ActionError },
    StepTimedOut { phase: StepPhase },
    Cancelled,
    BudgetExhausted,
}

/// Side effects for the controller to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Begin step `step` by asking the model
    Infer { step: usize },
    /// Dispatch an action to the executor
    Execute { action: ActionRequest },
    /// Seal the session
    Finish { reason: TerminationReason },
}

fn finish(reason: TerminationReason) -> (LoopState, Vec<Directive>) {
    (
        LoopState::Finished {
            reason: reason.clone(),
        },
        vec![Directive::Finish { reason }],
    )
}

fn begin_step(step: usize, stalls: usize, policy: &LoopPolicy) -> (LoopState, Vec<Directive>) {
    if step > policy.max_steps {
        return finish(TerminationReason::MaxStepsReached {
            max_steps: policy.max_steps,
        });
    }
    (
        LoopState::Inferring { step, stalls },
        vec![Directive::Infer { step }],
    )
}

/// Pure state transition function
///
/// # Invalid Transitions
/// Any event the current state cannot handle finishes the loop with
/// [`TerminationReason::Internal`]. This function never panics.
pub fn transition(
    state: LoopState,
    event: LoopEvent,
    policy: &LoopPolicy,
) -> (LoopState, Vec<Directive>) {
    match (state, event) {
        // Cancellation and budget apply to every live state
        (LoopState::Finished { reason }, event) => (
            LoopState::Finished {
                reason: TerminationReason::Internal {
                    message: format!(
                        "event {:?} after loop finished ({})",
                        event,
                        reason.kind_label()
                    ),
                },
            },
            vec![],
        ),
        (_, LoopEvent::Cancelled) => finish(TerminationReason::Cancelled),
        (_, LoopEvent::BudgetExhausted) => finish(TerminationReason::BudgetExhausted),

        // From Initializing
        (LoopState::Initializing, LoopEvent::Initialized) => begin_step(1, 0, policy),
        (LoopState::Initializing, LoopEvent::InitFailed { error }) => {
            finish(TerminationReason::ActionFailure {
                kind: error.kind,
                message: error.message,
            })
        }
        (LoopState::Initializing, LoopEvent::StepTimedOut { phase }) => {
            finish(TerminationReason::StepTimeout { phase })
        }

        // From Inferring
        (LoopState::Inferring { .. }, LoopEvent::ModelReplied { action }) if action.is_terminal() => {
            let summary = match action {
                ActionRequest::Complete { summary } => summary,
                _ => String::new(),
            };
            finish(TerminationReason::Completed { summary })
        }
        (LoopState::Inferring { step, stalls }, LoopEvent::ModelReplied { action }) => (
            LoopState::Acting { step, stalls },
            vec![Directive::Execute { action }],
        ),
        (LoopState::Inferring { .. }, LoopEvent::ModelFailed { error }) => {
            finish(TerminationReason::ModelFailure {
                kind: error.kind,
                status: error.status,
                message: error.message,
            })
        }
        (LoopState::Inferring { .. }, LoopEvent::StepTimedOut { phase }) => {
            finish(TerminationReason::StepTimeout { phase })
        }

        // From Acting
        (
            LoopState::Acting { step, stalls },
            LoopEvent::Observed {
                stalled,
                content_hash,
            },
        ) => {
            let stalls = if stalled { stalls + 1 } else { 0 };
            if stalls >= policy.max_consecutive_stalls {
                return finish(TerminationReason::Stalled { content_hash });
            }
            begin_step(step + 1, stalls, policy)
        }
        (LoopState::Acting { .. }, LoopEvent::ActionFailed { error }) => {
            finish(TerminationReason::ActionFailure {
                kind: error.kind,
                message: error.message,
            })
        }
        (LoopState::Acting { .. }, LoopEvent::StepTimedOut { phase }) => {
            finish(TerminationReason::StepTimeout { phase })
        }

        // All other invalid transitions
        (state, event) => finish(TerminationReason::Internal {
            message: format!("state {:?} cannot handle event {:?}", state, event),
        }),
    }
}

//! The unlock state machine.
//!
//! ```text
//! Loading -> Error | Expired | PasswordGate | ActionGate | HumanCheck | Revealed
//! PasswordGate -> ActionGate | HumanCheck | Revealed
//! ActionGate -> Revealed
//! HumanCheck -> Revealed
//! ```
//!
//! [`Unlock`] performs no IO of its own. Callers issue the network requests
//! and delays, then feed the outcome back in. Completing the action gate goes
//! straight to `Revealed` without a human check; this mirrors how the site
//! behaves today.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::gate::{evaluate, Gate, GateInput, Progress};
use crate::paste::{Action, Paste};
use crate::store::{ProgressStore, Store, StoreError, VerificationSession};

/// How long an action stays "processing" after its link was opened.
pub const ACTION_DELAY: Duration = Duration::from_secs(3);
/// How long the "I am not a robot" confirmation takes.
pub const HUMAN_CHECK_DELAY: Duration = Duration::from_millis(800);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum State {
    Loading,
    /// Terminal. The message is shown above a link back home.
    Error(String),
    /// Terminal.
    Expired,
    PasswordGate {
        error: Option<String>,
    },
    ActionGate {
        completed: BTreeSet<usize>,
        processing: Option<usize>,
    },
    HumanCheck {
        verifying: bool,
    },
    Revealed,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("The paste is not waiting for that step.")]
    WrongState,
    #[error("Another action is still being processed.")]
    Busy,
    #[error("That action was already completed.")]
    AlreadyCompleted,
    #[error("The paste has no action #{0}.")]
    NoSuchAction(usize),
    #[error("Complete every action to unlock the paste.")]
    ActionsOutstanding,
}

/// Returned whenever the paste is revealed by a reader's confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct Reveal {
    /// No view has been counted for this code yet, so `POST /visit` is owed.
    pub record_visit: bool,
}

pub const NOT_FOUND_MESSAGE: &str = "Paste not found.";
pub const LOAD_FAILED_MESSAGE: &str = "An error occurred while loading.";
pub const EXPIRED_MESSAGE: &str =
    "This paste has reached its time limit or view limit and has been automatically removed.";
const EMPTY_PASSWORD_MESSAGE: &str = "Please enter a password";
const WRONG_PASSWORD_MESSAGE: &str = "Incorrect password. Please try again.";
const NETWORK_MESSAGE: &str = "Network error. Please check your connection.";
const GENERIC_MESSAGE: &str = "An error occurred. Please try again.";

/// Records that the reader opened `code`: remembers it and starts a fresh
/// verification session.
///
/// # Errors
///
/// Returns an error if either store failed to persist the change.
pub fn navigate<D: Store, S: Store>(
    code: &str,
    progress: &mut ProgressStore<D>,
    session: &mut VerificationSession<S>,
) -> Result<(), StoreError> {
    progress.remember_code(code)?;
    session.clear()
}

pub struct Unlock<D, S> {
    code: String,
    progress: ProgressStore<D>,
    session: VerificationSession<S>,
    paste: Option<Paste>,
    state: State,
}

impl<D: Store, S: Store> Unlock<D, S> {
    pub fn new(
        code: impl Into<String>,
        progress: ProgressStore<D>,
        session: VerificationSession<S>,
    ) -> Self {
        Self {
            code: code.into(),
            progress,
            session,
            paste: None,
            state: State::Loading,
        }
    }

    /// Picks up the code the reader last navigated to, if any.
    pub fn resume(progress: ProgressStore<D>, session: VerificationSession<S>) -> Option<Self> {
        let code = progress.last_code()?;
        Some(Self::new(code, progress, session))
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub const fn state(&self) -> &State {
        &self.state
    }

    pub const fn paste(&self) -> Option<&Paste> {
        self.paste.as_ref()
    }

    pub const fn progress_store(&self) -> &ProgressStore<D> {
        &self.progress
    }

    pub const fn session(&self) -> &VerificationSession<S> {
        &self.session
    }

    pub fn into_stores(self) -> (ProgressStore<D>, VerificationSession<S>) {
        (self.progress, self.session)
    }

    /// Progress through the action gate, while it is shown.
    pub fn action_progress(&self) -> Option<Progress> {
        match (&self.state, &self.paste) {
            (State::ActionGate { completed, .. }, Some(paste)) => {
                Some(Progress::of(paste, completed))
            }
            _ => None,
        }
    }

    /// Whether the reader may continue past the action gate.
    pub fn can_continue(&self) -> bool {
        self.action_progress()
            .map_or(false, |progress| progress.is_complete())
    }

    pub fn on_resolved(&mut self, result: Result<Paste, ApiError>) -> &State {
        if self.state != State::Loading {
            warn!(code = %self.code, "Ignoring a resolve result outside of loading");
            return &self.state;
        }

        match result {
            Ok(paste) => {
                let verified = self.session.verified_for(&self.code);
                self.advance(paste, false, verified);
            }
            Err(ApiError::NotFound) => self.state = State::Error(NOT_FOUND_MESSAGE.to_string()),
            Err(ApiError::Expired) => self.state = State::Expired,
            Err(e) => {
                warn!(code = %self.code, "Failed to resolve paste: {e}");
                self.state = State::Error(LOAD_FAILED_MESSAGE.to_string());
            }
        }

        debug!(code = %self.code, state = ?self.state, "Resolved");
        &self.state
    }

    /// Checks a password before it is sent. Blank input is refused inline.
    pub fn prepare_password(&mut self, password: &str) -> bool {
        match &mut self.state {
            State::PasswordGate { error } => {
                if password.trim().is_empty() {
                    *error = Some(EMPTY_PASSWORD_MESSAGE.to_string());
                    false
                } else {
                    *error = None;
                    true
                }
            }
            _ => false,
        }
    }

    pub fn on_password_verified(&mut self, result: Result<Paste, ApiError>) -> &State {
        if !matches!(self.state, State::PasswordGate { .. }) {
            warn!(code = %self.code, "Ignoring a password result outside of the password gate");
            return &self.state;
        }

        match result {
            Ok(paste) => {
                info!(code = %self.code, "Password accepted");
                let verified = self.session.verified_for(&self.code);
                self.advance(paste, true, verified);
            }
            Err(e) => {
                let message = match &e {
                    ApiError::IncorrectPassword => WRONG_PASSWORD_MESSAGE.to_string(),
                    ApiError::Network(_) => NETWORK_MESSAGE.to_string(),
                    ApiError::Rejected {
                        message: Some(message),
                        ..
                    } if !message.trim().is_empty() => message.clone(),
                    ApiError::NotFound => NOT_FOUND_MESSAGE.to_string(),
                    ApiError::Expired => EXPIRED_MESSAGE.to_string(),
                    ApiError::Rejected { .. }
                    | ApiError::Malformed(_)
                    | ApiError::InvalidBase(_) => {
                        warn!(code = %self.code, "Password verification failed: {e}");
                        GENERIC_MESSAGE.to_string()
                    }
                };
                self.state = State::PasswordGate {
                    error: Some(message),
                };
            }
        }

        &self.state
    }

    /// Starts an action, returning the link the reader should be sent to.
    ///
    /// # Errors
    ///
    /// Refuses while another action is processing, for completed actions and
    /// for indices the paste doesn't have.
    pub fn begin_action(&mut self, index: usize) -> Result<&Action, FlowError> {
        let (completed, processing) = match &mut self.state {
            State::ActionGate {
                completed,
                processing,
            } => (completed, processing),
            _ => return Err(FlowError::WrongState),
        };
        let action = self
            .paste
            .as_ref()
            .and_then(|paste| paste.actions.get(index))
            .ok_or(FlowError::NoSuchAction(index))?;

        if processing.is_some() {
            return Err(FlowError::Busy);
        }
        if completed.contains(&index) {
            return Err(FlowError::AlreadyCompleted);
        }

        *processing = Some(index);
        debug!(code = %self.code, index, "Processing action");
        Ok(action)
    }

    /// Marks the processing action as done and adds it to the stored set.
    /// Stored indices are never dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` isn't the action being processed.
    pub fn finish_action(&mut self, index: usize) -> Result<Progress, FlowError> {
        match &mut self.state {
            State::ActionGate {
                completed,
                processing,
            } if *processing == Some(index) => {
                *processing = None;
                completed.insert(index);
            }
            _ => return Err(FlowError::WrongState),
        }

        let mut stored = self.progress.load(&self.code);
        stored.insert(index);
        if let Err(e) = self.progress.save(&self.code, &stored) {
            warn!(code = %self.code, "Failed to persist action progress: {e}");
        }

        self.action_progress().ok_or(FlowError::WrongState)
    }

    /// Leaves a completed action gate. The human check is skipped.
    ///
    /// # Errors
    ///
    /// Returns an error unless every action has been completed.
    pub fn continue_from_actions(&mut self) -> Result<Reveal, FlowError> {
        if !matches!(self.state, State::ActionGate { .. }) {
            return Err(FlowError::WrongState);
        }
        if !self.can_continue() {
            return Err(FlowError::ActionsOutstanding);
        }
        Ok(self.reveal())
    }

    /// # Errors
    ///
    /// Returns an error unless an idle human check is showing.
    pub fn begin_human_check(&mut self) -> Result<(), FlowError> {
        match &mut self.state {
            State::HumanCheck { verifying } if !*verifying => {
                *verifying = true;
                Ok(())
            }
            State::HumanCheck { .. } => Err(FlowError::Busy),
            _ => Err(FlowError::WrongState),
        }
    }

    /// # Errors
    ///
    /// Returns an error unless the human check was started.
    pub fn finish_human_check(&mut self) -> Result<Reveal, FlowError> {
        match self.state {
            State::HumanCheck { verifying: true } => Ok(self.reveal()),
            _ => Err(FlowError::WrongState),
        }
    }

    /// Marks the view as counted. Failures are logged and otherwise ignored.
    pub fn on_visit_recorded(&mut self, result: Result<(), ApiError>, now: DateTime<Utc>) {
        match result {
            Ok(()) => {
                if let Err(e) = self.progress.mark_viewed(&self.code, now) {
                    warn!(code = %self.code, "Failed to remember the recorded view: {e}");
                }
            }
            Err(e) => warn!(code = %self.code, "Visit recording failed: {e}"),
        }
    }

    fn advance(&mut self, paste: Paste, password_satisfied: bool, verified: bool) {
        // Indices past the action list stay stored; counting ignores them.
        let completed = self.progress.load(&self.code);
        let gate = evaluate(&GateInput {
            paste: &paste,
            completed: &completed,
            password_satisfied,
            verified_this_session: verified,
        });
        self.paste = Some(paste);

        match gate {
            Gate::Password => self.state = State::PasswordGate { error: None },
            Gate::Actions => {
                self.state = State::ActionGate {
                    completed,
                    processing: None,
                }
            }
            Gate::HumanCheck => self.state = State::HumanCheck { verifying: false },
            // A view was already counted when this session was verified.
            Gate::Reveal => {
                let _ = self.reveal();
            }
        }
    }

    fn reveal(&mut self) -> Reveal {
        if let Some(paste) = &self.paste {
            if let Err(e) = self.session.mark_verified(paste) {
                warn!(code = %self.code, "Failed to store the verification session: {e}");
            }
        }
        self.state = State::Revealed;
        info!(code = %self.code, "Paste revealed");

        Reveal {
            record_visit: !self.progress.has_viewed(&self.code),
        }
    }
}

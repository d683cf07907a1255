//! Runs the unlock flow against a [`PasteApi`].
//!
//! [`Viewer`] is the sequential driver used where one step runs at a time,
//! like a terminal. Front ends that can receive events while a delay is
//! pending should drive [`Unlock`] directly instead.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::api::PasteApi;
use crate::flow::{FlowError, Reveal, State, Unlock, ACTION_DELAY, HUMAN_CHECK_DELAY};
use crate::gate::Progress;
use crate::store::Store;

/// Platform hooks the flow needs besides the API.
#[async_trait(?Send)]
pub trait Host {
    /// Sends the reader to an external link. Nothing is reported back.
    fn open_url(&self, url: &str);

    async fn sleep(&self, duration: Duration);

    fn now(&self) -> DateTime<Utc>;
}

pub struct Viewer<A, H, D, S> {
    api: A,
    host: H,
    unlock: Unlock<D, S>,
}

impl<A, H, D, S> Viewer<A, H, D, S>
where
    A: PasteApi,
    H: Host,
    D: Store,
    S: Store,
{
    pub const fn new(api: A, host: H, unlock: Unlock<D, S>) -> Self {
        Self { api, host, unlock }
    }

    pub const fn unlock(&self) -> &Unlock<D, S> {
        &self.unlock
    }

    pub const fn state(&self) -> &State {
        self.unlock.state()
    }

    pub const fn host(&self) -> &H {
        &self.host
    }

    pub fn into_parts(self) -> (A, H, Unlock<D, S>) {
        (self.api, self.host, self.unlock)
    }

    /// Resolves the paste and lands on its first gate.
    pub async fn load(&mut self) -> &State {
        if self.unlock.state() != &State::Loading {
            return self.unlock.state();
        }
        let result = self.api.resolve(self.unlock.code()).await;
        self.unlock.on_resolved(result)
    }

    pub async fn submit_password(&mut self, password: &str) -> &State {
        if self.unlock.prepare_password(password) {
            let result = self.api.verify(self.unlock.code(), password).await;
            self.unlock.on_password_verified(result);
        }
        self.unlock.state()
    }

    /// Opens the action's link, waits out the processing delay and records
    /// the action as completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the action can't be started; no link is opened.
    pub async fn complete_action(&mut self, index: usize) -> Result<Progress, FlowError> {
        let url = self.unlock.begin_action(index)?.action_url.clone();
        self.host.open_url(&url);
        self.host.sleep(ACTION_DELAY).await;
        self.unlock.finish_action(index)
    }

    /// # Errors
    ///
    /// Returns an error unless every action has been completed.
    pub async fn continue_from_actions(&mut self) -> Result<(), FlowError> {
        let reveal = self.unlock.continue_from_actions()?;
        self.record_visit(reveal).await;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error unless the human check is showing.
    pub async fn confirm_human(&mut self) -> Result<(), FlowError> {
        self.unlock.begin_human_check()?;
        self.host.sleep(HUMAN_CHECK_DELAY).await;
        let reveal = self.unlock.finish_human_check()?;
        self.record_visit(reveal).await;
        Ok(())
    }

    async fn record_visit(&mut self, reveal: Reveal) {
        if reveal.record_visit {
            let result = self.api.visit(self.unlock.code()).await;
            self.unlock.on_visit_recorded(result, self.host.now());
        }
    }
}

//! The conversation driver.
//!
//! Orchestrates one inbound event end to end: serialize on the identity,
//! open a unit of work, load or create the user, step the machine, record
//! history, persist the new code and commit. Nothing is visible to other
//! events until the commit succeeds.

use std::sync::Arc;
use std::time::Duration;

use questline_core::clock::Clock;
use questline_core::error::DomainError;
use questline_core::progress::{ProgressCode, StateId};
use questline_core::repository::{NewHistoryEntry, ProgressStore, UserIdentity, UserRecord};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::application::locks::IdentityLocks;
use crate::domain::event::InboundEvent;
use crate::domain::machine::{ActStateMachine, StepContext};
use crate::domain::output::{self, Output};

/// Everything produced by handling one event.
#[derive(Debug, Clone, Serialize)]
pub struct OutputSequence {
    /// Identifier of this event in logs.
    pub correlation_id: Uuid,
    /// State after the event; `None` when the user could not be loaded.
    pub state: Option<StateId>,
    pub progress_code: Option<ProgressCode>,
    /// Whether the unit of work was committed.
    pub committed: bool,
    pub outputs: Vec<Output>,
}

impl OutputSequence {
    /// Cumulative delivery offsets of [`Self::outputs`].
    #[must_use]
    pub fn delivery_schedule(&self) -> Vec<Duration> {
        output::delivery_schedule(&self.outputs)
    }
}

/// Drives conversations against a [`ProgressStore`].
pub struct ConversationDriver {
    machine: ActStateMachine,
    store: Arc<dyn ProgressStore>,
    clock: Arc<dyn Clock>,
    locks: IdentityLocks,
}

impl ConversationDriver {
    #[must_use]
    pub fn new(
        machine: ActStateMachine,
        store: Arc<dyn ProgressStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            machine,
            store,
            clock,
            locks: IdentityLocks::new(),
        }
    }

    #[must_use]
    pub fn machine(&self) -> &ActStateMachine {
        &self.machine
    }

    #[must_use]
    pub fn store(&self) -> &dyn ProgressStore {
        self.store.as_ref()
    }

    /// Number of identities with an event in flight or queued.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.locks.active()
    }

    /// The message to send when [`Self::handle`] fails.
    #[must_use]
    pub fn failure_reply(&self) -> Output {
        self.machine.generic_failure()
    }

    /// Handles one inbound event.
    ///
    /// A user who cannot be loaded mid-flow gets the data-error message and
    /// nothing is committed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the identity is blank.
    /// Returns `DomainError::Persistence` or `DomainError::Connection` if the
    /// store fails; no partial state is committed in that case.
    #[instrument(
        target = "questline::bot",
        skip(self, event),
        fields(identity = %event.identity, correlation_id = tracing::field::Empty)
    )]
    pub async fn handle(&self, event: &InboundEvent) -> Result<OutputSequence, DomainError> {
        let correlation_id = Uuid::new_v4();
        tracing::Span::current().record("correlation_id", tracing::field::display(correlation_id));

        let identity = UserIdentity::parse(event.identity.as_str()).inspect_err(|e| {
            warn!(target: "questline::bot", error = %e, "rejected inbound event");
        })?;

        let _guard = self.locks.acquire(&identity).await;

        match self.process(&identity, event, correlation_id).await {
            Err(DomainError::NotFound(missing)) => {
                warn!(
                    target: "questline::bot",
                    missing = %missing,
                    "user vanished mid-flow; nothing committed"
                );
                Ok(OutputSequence {
                    correlation_id,
                    state: None,
                    progress_code: None,
                    committed: false,
                    outputs: vec![self.machine.data_error()],
                })
            }
            Err(e) => {
                log_failure(&e);
                Err(e)
            }
            ok => ok,
        }
    }

    async fn process(
        &self,
        identity: &UserIdentity,
        event: &InboundEvent,
        correlation_id: Uuid,
    ) -> Result<OutputSequence, DomainError> {
        let now = self.clock.now();
        let mut unit = self.store.begin().await?;
        let user = unit.get_or_create(identity, now).await?;

        let route = event.route(self.machine.script());
        let ctx = StepContext {
            code: user.progress_code,
            display_name: event.display_name.as_deref(),
        };
        let step = self.machine.step(&route, &ctx);
        debug!(
            target: "questline::bot",
            ?route,
            handled_by = %step.handled_by,
            current = %step.current,
            "stepped"
        );

        unit.append_history(NewHistoryEntry {
            identity: identity.clone(),
            channel_id: event.channel_id,
            message_id: event.message_id,
            content: event.payload.clone(),
            state_label: step.handled_by.label().to_owned(),
            recorded_at: now,
        })
        .await?;

        let progress_code = match step.next_code {
            Some(code) if code != user.progress_code => {
                unit.set_progress(identity, code).await?;
                info!(
                    target: "questline::bot",
                    from = %user.progress_code,
                    to = %code,
                    "progress changed"
                );
                code
            }
            Some(code) => code,
            None => user.progress_code,
        };

        unit.commit().await?;

        Ok(OutputSequence {
            correlation_id,
            state: Some(step.current),
            progress_code: Some(progress_code),
            committed: true,
            outputs: step.outputs,
        })
    }

    /// Forces `identity` back to [`ProgressCode::Default`], creating the user
    /// if needed. Writes no history.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the identity is blank or the store fails.
    #[instrument(target = "questline::bot", skip(self))]
    pub async fn reset(&self, identity: &UserIdentity) -> Result<UserRecord, DomainError> {
        let _guard = self.locks.acquire(identity).await;
        let result: Result<UserRecord, DomainError> = async {
            let mut unit = self.store.begin().await?;
            let mut user = unit.get_or_create(identity, self.clock.now()).await?;
            unit.set_progress(identity, ProgressCode::Default).await?;
            unit.commit().await?;
            user.progress_code = ProgressCode::Default;
            Ok(user)
        }
        .await;
        match &result {
            Ok(_) => info!(target: "questline::bot", "progress reset"),
            Err(e) => log_failure(e),
        }
        result
    }

    /// Deletes `identity` and its history. Returns whether the user existed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the store fails.
    #[instrument(target = "questline::bot", skip(self))]
    pub async fn delete(&self, identity: &UserIdentity) -> Result<bool, DomainError> {
        let _guard = self.locks.acquire(identity).await;
        self.store.delete_user(identity).await.inspect_err(log_failure)
    }
}

fn log_failure(e: &DomainError) {
    match e {
        DomainError::Connection(_) => {
            error!(target: "questline::bot", severity = "critical", error = %e, "store unreachable");
        }
        DomainError::Persistence(_) => {
            error!(target: "questline::bot", error = %e, "unit of work failed");
        }
        DomainError::Validation(_) | DomainError::NotFound(_) => {
            warn!(target: "questline::bot", error = %e, "event rejected");
        }
    }
}

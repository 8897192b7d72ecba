//! Debounced background sync of the wizard state to the lead API.
//!
//! Edits are coalesced: every [`AutosaveController::schedule_sync`] call
//! replaces the pending request and restarts the timer, so only the last
//! state of a burst is sent. A fired sync creates the lead when the session
//! has none yet, and otherwise sends a progress update for the fields
//! gathered so far.
//!
//! Every fired sync gets a sequence number. A result that arrives after the
//! result of a newer sync is dropped, and a result is only shown as saved
//! when no newer sync or edit is outstanding, so the reported [`SaveStatus`]
//! always reflects the latest edit.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::api::{ApiError, LeadRepository, SessionStore, SessionStoreError};
use crate::models::{LeadFields, LeadId, WizardState};
use crate::session::SessionToken;
use crate::stepper::Step;

/// Outcome of the most recent sync, as shown next to the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    /// An edit is waiting for the debounce timer.
    Pending,
    Saved { at: DateTime<Utc>, seq: u64 },
    Failed { at: DateTime<Utc>, message: String },
}

/// What a single sync did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created(LeadId),
    Updated(LeadId),
    /// No lead yet and the contact fields are incomplete.
    Skipped,
}

/// The session's lead after [`LeadSync::ensure_lead`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsuredLead {
    Existing(LeadId),
    Created(LeadId),
}

impl EnsuredLead {
    pub fn id(&self) -> &LeadId {
        match self {
            Self::Existing(id) | Self::Created(id) => id,
        }
    }
}

/// Sequence bookkeeping, read and published under one lock.
#[derive(Debug, Default)]
struct Sequence {
    /// Newest sequence number handed out.
    reserved: u64,
    /// Newest sequence number whose result was recorded.
    applied: u64,
    /// Edits scheduled so far.
    edits: u64,
    /// Newest edit carried by a reserved sync.
    covered: u64,
}

/// Shared access to the session's lead, used by both the autosave task and
/// the explicit step submits.
///
/// Lead creation holds the session lock for the whole remote call, so two
/// syncs racing on a fresh session create a single lead.
pub struct LeadSync {
    repository: Arc<dyn LeadRepository>,
    sessions: Arc<dyn SessionStore>,
    session: Arc<Mutex<Option<SessionToken>>>,
    status: watch::Sender<SaveStatus>,
    sequence: std::sync::Mutex<Sequence>,
}

impl LeadSync {
    pub fn new(
        repository: Arc<dyn LeadRepository>,
        sessions: Arc<dyn SessionStore>,
        session: Option<SessionToken>,
    ) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        Self {
            repository,
            sessions,
            session: Arc::new(Mutex::new(session)),
            status,
            sequence: std::sync::Mutex::new(Sequence::default()),
        }
    }

    pub fn repository(&self) -> &Arc<dyn LeadRepository> {
        &self.repository
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    pub async fn session(&self) -> Option<SessionToken> {
        self.session.lock().await.clone()
    }

    pub async fn lead_id(&self) -> Option<LeadId> {
        self.session.lock().await.as_ref().map(|t| t.lead_id.clone())
    }

    /// Forgets the current session, locally and in the session store.
    pub async fn forget(&self) -> Result<(), SessionStoreError> {
        self.session.lock().await.take();
        self.sessions.clear().await
    }

    fn sequence(&self) -> std::sync::MutexGuard<'_, Sequence> {
        self.sequence.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserves the sequence number of a sync of the current state, which
    /// carries every edit scheduled so far.
    pub fn next_seq(&self) -> u64 {
        let mut seq = self.sequence();
        let edits = seq.edits;
        reserve(&mut seq, edits)
    }

    /// Reserves the sequence number of a sync carrying edit `edit`.
    fn reserve_for(
        &self,
        edit: u64,
    ) -> u64 {
        reserve(&mut self.sequence(), edit)
    }

    /// Counts a new edit and shows it as pending. Returns the edit number.
    fn mark_edit(&self) -> u64 {
        let mut seq = self.sequence();
        seq.edits += 1;
        self.status.send_replace(SaveStatus::Pending);
        seq.edits
    }

    /// Creates the lead if the session has none.
    ///
    /// Returns `Ok(None)` when there is no lead and the contact fields needed
    /// to open one are incomplete.
    pub async fn ensure_lead(
        &self,
        state: &WizardState,
    ) -> Result<Option<EnsuredLead>, ApiError> {
        let mut slot = self.session.lock().await;
        if let Some(token) = slot.as_ref() {
            return Ok(Some(EnsuredLead::Existing(token.lead_id.clone())));
        }

        let Some(fields) = LeadFields::minimal(state) else {
            debug!("contact fields incomplete; lead not created");
            return Ok(None);
        };

        let id = self.repository.create_lead(fields).await?.into_lead_id()?;
        info!(lead_id = %id, "lead created");

        let token = SessionToken::new(id.clone(), Utc::now());
        if let Err(err) = self.sessions.save(&token).await {
            warn!(lead_id = %id, error = %err, "failed to persist session");
        }
        *slot = Some(token);

        Ok(Some(EnsuredLead::Created(id)))
    }

    /// Creates the lead when needed, otherwise sends the fields gathered up
    /// to `step` as a progress update.
    pub async fn sync(
        &self,
        state: &WizardState,
        step: Step,
    ) -> Result<SyncOutcome, ApiError> {
        match self.ensure_lead(state).await? {
            None => Ok(SyncOutcome::Skipped),
            Some(EnsuredLead::Created(id)) => Ok(SyncOutcome::Created(id)),
            Some(EnsuredLead::Existing(id)) => self.update_progress(&id, state, step).await,
        }
    }

    /// Sends the fields gathered up to `step` for an existing lead.
    pub async fn update_progress(
        &self,
        id: &LeadId,
        state: &WizardState,
        step: Step,
    ) -> Result<SyncOutcome, ApiError> {
        let fields = LeadFields::through_step(state, step);
        let response = self
            .repository
            .update_lead_progress(id, fields, step.wire_name())
            .await?;
        if !response.success {
            return Err(ApiError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| "no reason given".to_string()),
            ));
        }
        debug!(lead_id = %id, step = step.wire_name(), "progress saved");
        Ok(SyncOutcome::Updated(id.clone()))
    }

    /// Publishes the result of sync `seq`.
    ///
    /// A result older than one already recorded is dropped. While a newer
    /// sync is still running, or an edit is waiting for its sync, the status
    /// stays [`SaveStatus::Pending`]. Returns `true` when the result was
    /// published.
    pub fn record(
        &self,
        seq: u64,
        result: &Result<SyncOutcome, ApiError>,
    ) -> bool {
        let mut sequence = self.sequence();
        if sequence.applied > seq {
            debug!(seq, newest = sequence.applied, "discarding stale sync result");
            return false;
        }
        sequence.applied = seq;

        if seq < sequence.reserved || sequence.covered < sequence.edits {
            debug!(seq, newest = sequence.reserved, "newer save outstanding; status stays pending");
            self.status.send_if_modified(|status| {
                if *status == SaveStatus::Pending {
                    return false;
                }
                *status = SaveStatus::Pending;
                true
            });
            return false;
        }

        let status = match result {
            Ok(SyncOutcome::Skipped) => SaveStatus::Idle,
            Ok(_) => SaveStatus::Saved {
                at: Utc::now(),
                seq,
            },
            Err(err) => SaveStatus::Failed {
                at: Utc::now(),
                message: err.to_string(),
            },
        };
        self.status.send_replace(status);
        true
    }

    /// Runs one sync and publishes its result. Errors are logged, not returned.
    async fn run_once(
        &self,
        seq: u64,
        state: WizardState,
        step: Step,
    ) {
        let result = self.sync(&state, step).await;
        if let Err(err) = &result {
            warn!(seq, step = step.wire_name(), error = %err, "autosave failed");
        }
        self.record(seq, &result);
    }
}

fn reserve(
    seq: &mut Sequence,
    edit: u64,
) -> u64 {
    seq.reserved += 1;
    seq.covered = seq.covered.max(edit);
    seq.reserved
}

struct SyncRequest {
    state: WizardState,
    step: Step,
    edit: u64,
}

enum Command {
    Schedule(SyncRequest),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Trailing-debounce autosave running on a background tokio task.
pub struct AutosaveController {
    commands: mpsc::UnboundedSender<Command>,
    sync: Arc<LeadSync>,
    task: JoinHandle<()>,
}

impl AutosaveController {
    /// Spawns the autosave task. Must be called inside a tokio runtime.
    pub fn spawn(
        sync: Arc<LeadSync>,
        debounce: Duration,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(rx, sync.clone(), debounce));
        Self {
            commands,
            sync,
            task,
        }
    }

    /// Queues `state` for saving once edits pause for the debounce delay.
    /// Replaces any request still waiting.
    pub fn schedule_sync(
        &self,
        state: WizardState,
        step: Step,
    ) {
        if self.commands.is_closed() {
            debug!("autosave stopped; edit not scheduled");
            return;
        }
        let edit = self.sync.mark_edit();
        let request = SyncRequest { state, step, edit };
        if self.commands.send(Command::Schedule(request)).is_err() {
            debug!("autosave stopped; edit not scheduled");
        }
    }

    /// Fires the waiting request now and waits for every sync in flight.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(Command::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.sync.subscribe()
    }

    pub fn status(&self) -> SaveStatus {
        self.sync.status()
    }

    /// Stops the task. A request still waiting for its timer is dropped;
    /// call [`Self::flush`] first to keep it.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(err) = self.task.await {
            warn!(error = %err, "autosave task ended abnormally");
        }
    }
}

async fn run(
    mut commands: mpsc::UnboundedReceiver<Command>,
    sync: Arc<LeadSync>,
    debounce: Duration,
) {
    let mut pending: Option<SyncRequest> = None;
    let mut deadline: Option<Instant> = None;
    let mut in_flight = JoinSet::new();

    loop {
        let timer = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Schedule(request)) => {
                    debug!(step = request.step.wire_name(), "autosave scheduled");
                    pending = Some(request);
                    deadline = Some(Instant::now() + debounce);
                }
                Some(Command::Flush(done)) => {
                    deadline = None;
                    if let Some(request) = pending.take() {
                        fire(&mut in_flight, &sync, request);
                    }
                    while in_flight.join_next().await.is_some() {}
                    let _ = done.send(());
                }
                Some(Command::Shutdown) | None => break,
            },
            () = timer => {
                deadline = None;
                if let Some(request) = pending.take() {
                    fire(&mut in_flight, &sync, request);
                }
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    }

    while in_flight.join_next().await.is_some() {}
}

fn fire(
    in_flight: &mut JoinSet<()>,
    sync: &Arc<LeadSync>,
    request: SyncRequest,
) {
    let seq = sync.reserve_for(request.edit);
    debug!(seq, step = request.step.wire_name(), "autosave fired");
    let sync = sync.clone();
    in_flight.spawn(async move { sync.run_once(seq, request.state, request.step).await });
}

//! Auto-save engine
//!
//! A single worker task owns the `WorkSession` and serializes every trigger
//! through one command channel: edits, blur, navigation, visibility changes,
//! date switches and explicit saves. Network writes run on their own task so
//! the worker keeps accepting edits while a save is in flight.
//!
//! Ordering guarantees:
//! - at most one save runs at a time; later requests queue behind it and
//!   re-read the latest items when they start
//! - navigation and date-change saves cancel the save in flight and go first
//! - auto-save fires only after the edit timer's quiet period has passed

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use report_client::ReportStore;
use shared::{DailyReport, EmployeeProfile};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::AutoSaveConfig;
use crate::editor::{DateTarget, Edit};
use crate::error::{SaveError, SaveResult};
use crate::events::{EngineEvent, Notice, NoticeLevel};
use crate::loader::ReconcileOutcome;
use crate::saver::{JobReport, JobResult, RetryPolicy, SaveJob, flush_once};
use crate::state::{SaveActivity, SaveOrigin, SaveStatus, SessionSnapshot, WorkSession};
use crate::timer::EditTimer;
use crate::validate::invalid_links;

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;

type SaveReply = oneshot::Sender<SaveResult<Option<DailyReport>>>;

/// How to treat unsaved edits when switching dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSwitch {
    /// Drop them
    Discard,
    /// Persist them first; stay on the current date if that fails
    SaveFirst,
}

enum Command {
    Edit(Edit),
    Blur,
    NavigateAway,
    Hidden,
    Refresh,
    SelectDate {
        target: DateTarget,
        mode: DateSwitch,
        reply: oneshot::Sender<SaveResult<NaiveDate>>,
    },
    SaveNow(SaveReply),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle to a running engine
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<EngineEvent>,
}

impl EngineHandle {
    async fn send(&self, command: Command) -> SaveResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SaveError::Closed)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> SaveResult<T> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| SaveError::Closed)
    }

    pub async fn edit(&self, edit: Edit) -> SaveResult<()> {
        self.send(Command::Edit(edit)).await
    }

    /// An input lost focus
    pub async fn blur(&self) -> SaveResult<()> {
        self.send(Command::Blur).await
    }

    /// The user is leaving the editor
    pub async fn navigate_away(&self) -> SaveResult<()> {
        self.send(Command::NavigateAway).await
    }

    /// The editor became hidden
    pub async fn hidden(&self) -> SaveResult<()> {
        self.send(Command::Hidden).await
    }

    /// Re-fetch the selected date; skipped while the user has unsaved edits
    pub async fn refresh(&self) -> SaveResult<()> {
        self.send(Command::Refresh).await
    }

    /// Switch dates, returning the date now selected
    pub async fn select_date(&self, date: NaiveDate, mode: DateSwitch) -> SaveResult<NaiveDate> {
        self.switch(DateTarget::Exact(date), mode).await
    }

    pub async fn previous_day(&self, mode: DateSwitch) -> SaveResult<NaiveDate> {
        self.switch(DateTarget::Previous, mode).await
    }

    pub async fn next_day(&self, mode: DateSwitch) -> SaveResult<NaiveDate> {
        self.switch(DateTarget::Next, mode).await
    }

    pub async fn today(&self, mode: DateSwitch) -> SaveResult<NaiveDate> {
        self.switch(DateTarget::Today, mode).await
    }

    async fn switch(&self, target: DateTarget, mode: DateSwitch) -> SaveResult<NaiveDate> {
        self.request(|reply| Command::SelectDate {
            target,
            mode,
            reply,
        })
        .await?
    }

    /// Save now and wait for the outcome
    pub async fn save_now(&self) -> SaveResult<Option<DailyReport>> {
        self.request(Command::SaveNow).await?
    }

    pub async fn snapshot(&self) -> SaveResult<SessionSnapshot> {
        self.request(Command::Snapshot).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Flush pending edits and stop the worker
    pub async fn shutdown(&self) -> SaveResult<()> {
        self.request(Command::Shutdown).await
    }
}

struct InFlight {
    origin: SaveOrigin,
    date: NaiveDate,
    payload: String,
    cancel: CancellationToken,
    handle: JoinHandle<JobReport>,
    replies: Vec<SaveReply>,
}

struct QueuedSave {
    origin: SaveOrigin,
    replies: Vec<SaveReply>,
}

/// Resolves when the save in flight finishes; pending when there is none
async fn wait_in_flight(
    slot: &mut Option<InFlight>,
) -> Option<(InFlight, Result<JobReport, JoinError>)> {
    let joined = match slot.as_mut() {
        Some(flight) => (&mut flight.handle).await,
        None => return std::future::pending().await,
    };
    slot.take().map(|flight| (flight, joined))
}

pub struct AutoSaveEngine;

impl AutoSaveEngine {
    /// Start a worker for `employee` on `date`. The first load runs immediately.
    pub fn spawn(
        store: Arc<dyn ReportStore>,
        employee: EmployeeProfile,
        date: NaiveDate,
        config: AutoSaveConfig,
    ) -> (EngineHandle, JoinHandle<()>) {
        let (worker, handle) = AutoSaveWorker::new(store, employee, date, config);
        (handle, tokio::spawn(worker.run()))
    }
}

pub struct AutoSaveWorker {
    session: WorkSession,
    store: Arc<dyn ReportStore>,
    config: AutoSaveConfig,
    timer: EditTimer,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<EngineEvent>,
    in_flight: Option<InFlight>,
    queued: Option<QueuedSave>,
    status_reset_at: Option<Instant>,
    announced_dirty: bool,
}

impl AutoSaveWorker {
    pub fn new(
        store: Arc<dyn ReportStore>,
        employee: EmployeeProfile,
        date: NaiveDate,
        config: AutoSaveConfig,
    ) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let worker = Self {
            session: WorkSession::new(employee, date),
            store,
            timer: EditTimer::new(config.flush_delay, config.typing_grace),
            config,
            commands: command_rx,
            events: event_tx.clone(),
            in_flight: None,
            queued: None,
            status_reset_at: None,
            announced_dirty: false,
        };
        let handle = EngineHandle {
            commands: command_tx,
            events: event_tx,
        };
        (worker, handle)
    }

    /// Run until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        tracing::info!(
            employee_id = self.session.employee().employee_id,
            date = %self.session.selected_date(),
            "Auto-save worker started"
        );

        self.load().await;

        loop {
            let flush_at = self.timer.deadline();
            let status_at = self.status_reset_at;

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle(command).await {
                            break;
                        }
                    }
                    None => {
                        tracing::info!("All engine handles dropped, flushing");
                        self.flush_on_exit().await;
                        break;
                    }
                },

                _ = tokio::time::sleep_until(flush_at.unwrap_or_else(Instant::now)), if flush_at.is_some() => {
                    self.on_quiet_period();
                }

                _ = tokio::time::sleep_until(status_at.unwrap_or_else(Instant::now)), if status_at.is_some() => {
                    self.on_status_timeout();
                }

                finished = wait_in_flight(&mut self.in_flight) => {
                    if let Some((flight, joined)) = finished {
                        self.on_save_finished(flight, joined);
                    }
                }
            }
        }

        tracing::info!("Auto-save worker stopped");
    }

    /// Returns `false` once the worker should stop
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Edit(edit) => self.on_edit(edit),
            Command::Blur => self.on_blur(),
            Command::NavigateAway => self.on_navigate_away(),
            Command::Hidden => self.on_hidden(),
            Command::Refresh => self.load().await,
            Command::SelectDate {
                target,
                mode,
                reply,
            } => {
                let result = self.on_select_date(target, mode).await;
                let _ = reply.send(result);
            }
            Command::SaveNow(reply) => self.on_explicit_save(reply),
            Command::Snapshot(reply) => {
                self.sync_typing();
                let _ = reply.send(self.session.snapshot());
            }
            Command::Shutdown(reply) => {
                tracing::info!("Auto-save worker shutting down");
                self.flush_on_exit().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    // ========== Triggers ==========

    fn on_edit(&mut self, edit: Edit) {
        if !self.session.apply_edit(edit) {
            return;
        }
        self.timer.touch(Instant::now());
        self.session.set_typing(true);
        self.sync_dirty();
    }

    fn on_quiet_period(&mut self) {
        self.timer.cancel();
        self.session.set_typing(false);
        self.request_save(SaveOrigin::Auto, Vec::new());
    }

    fn on_blur(&mut self) {
        if matches!(
            self.session.activity(),
            SaveActivity::Saving {
                origin: SaveOrigin::Blur,
                ..
            }
        ) {
            return;
        }
        if !self.session.is_loaded() || !self.session.refresh_dirty() {
            return;
        }

        self.timer.cancel();
        self.session.set_typing(false);
        self.session.reset_error_count();
        self.request_save(SaveOrigin::Blur, Vec::new());
    }

    fn on_navigate_away(&mut self) {
        self.timer.cancel();
        self.session.set_typing(false);
        if self.session.is_loaded() && self.session.has_data_to_save() {
            self.request_save(SaveOrigin::Navigation, Vec::new());
        }
    }

    /// Fire-and-forget write of unsaved edits; never awaited
    fn on_hidden(&mut self) {
        if !self.session.is_loaded() || !self.session.has_data_to_save() {
            return;
        }
        if !invalid_links(self.session.items()).is_empty() {
            tracing::debug!("Skipping background save: invalid links");
            return;
        }

        let store = Arc::clone(&self.store);
        let employee = self.session.employee().clone();
        let date = self.session.selected_date();
        let items = self.session.payload();
        tokio::spawn(async move {
            match flush_once(store.as_ref(), employee, date, items).await {
                Ok(_) => tracing::debug!(%date, "Background save completed"),
                Err(e) => tracing::warn!(%date, "Background save failed: {e}"),
            }
        });
    }

    fn on_explicit_save(&mut self, reply: SaveReply) {
        self.timer.cancel();
        self.session.set_typing(false);
        self.session.reset_error_count();
        self.request_save(SaveOrigin::Explicit, vec![reply]);
    }

    async fn on_select_date(&mut self, target: DateTarget, mode: DateSwitch) -> SaveResult<NaiveDate> {
        let current = self.session.selected_date();
        let date = target.resolve(current);
        if date == current {
            return Ok(current);
        }

        self.timer.cancel();
        self.session.set_typing(false);

        if mode == DateSwitch::SaveFirst
            && self.session.is_loaded()
            && self.session.has_data_to_save()
        {
            let (tx, rx) = oneshot::channel();
            self.request_save(SaveOrigin::DateChange, vec![tx]);
            self.drain_in_flight().await;
            match rx.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::warn!(from = %current, to = %date, "Date switch cancelled: {e}");
                    return Err(e);
                }
                Err(_) => return Err(SaveError::Aborted),
            }
        } else if self.session.is_dirty() {
            tracing::debug!(from = %current, to = %date, "Discarding unsaved edits");
        }

        if let Some(queued) = self.queued.take() {
            reply_all(queued.replies, Err(SaveError::Aborted));
        }
        self.session.select_date(date);
        self.load().await;
        Ok(date)
    }

    // ========== Loading ==========

    async fn load(&mut self) {
        self.sync_typing();
        if self.session.refresh_blocked() {
            tracing::debug!("Refresh skipped: unsaved edits in progress");
            return;
        }

        let date = self.session.selected_date();
        let employee_id = self.session.employee().employee_id;
        match self.store.find_by_employee_and_date(employee_id, date).await {
            Ok(fetched) => {
                match self.session.reconcile(fetched) {
                    ReconcileOutcome::Skipped => {
                        tracing::debug!(%date, "Refresh skipped: unsaved edits in progress");
                    }
                    outcome => {
                        tracing::debug!(%date, ?outcome, "Report loaded");
                        self.status_reset_at = None;
                        self.emit(EngineEvent::Status {
                            status: SaveStatus::Idle,
                        });
                        self.emit(EngineEvent::Loaded {
                            date,
                            record_id: self.session.record_id_for_selected_date(),
                        });
                        self.sync_dirty();
                    }
                }
            }
            Err(e) => {
                tracing::warn!(%date, "Failed to load report: {e}");
                self.session.mark_load_failed();
                self.notice(
                    NoticeLevel::Warning,
                    format!("Could not load the report for {date}: {e}"),
                );
                self.sync_dirty();
            }
        }
    }

    // ========== Saving ==========

    fn request_save(&mut self, origin: SaveOrigin, replies: Vec<SaveReply>) {
        if !self.session.is_loaded() {
            tracing::debug!(?origin, "Save skipped: report not loaded");
            reply_all(replies, Err(SaveError::NotLoaded));
            return;
        }

        let payload = self.session.payload_json();
        if origin == SaveOrigin::Auto {
            if self.session.consecutive_errors() >= self.config.max_consecutive_errors {
                tracing::debug!("Auto-save paused after repeated failures");
                return;
            }
            if payload == self.session.baseline() {
                self.session.refresh_dirty();
                self.sync_dirty();
                return;
            }
        }

        if let Some(flight) = self.in_flight.as_mut() {
            if !origin.is_forced() {
                let same_write =
                    flight.payload == payload && flight.date == self.session.selected_date();
                let repeated_blur = origin == SaveOrigin::Blur && flight.origin == SaveOrigin::Blur;
                if same_write || repeated_blur {
                    flight.replies.extend(replies);
                    return;
                }

                let queued = self.queued.get_or_insert_with(|| QueuedSave {
                    origin,
                    replies: Vec::new(),
                });
                if !origin.is_silent() {
                    queued.origin = origin;
                }
                queued.replies.extend(replies);
                return;
            }
        }

        if let Some(superseded) = self.in_flight.take() {
            tracing::debug!(
                superseded = ?superseded.origin,
                by = ?origin,
                "Cancelling save in flight"
            );
            superseded.cancel.cancel();
            superseded.handle.abort();
            reply_all(superseded.replies, Err(SaveError::Aborted));
            self.session.abort_save();
        }

        self.start_save(origin, replies);
    }

    fn start_save(&mut self, origin: SaveOrigin, replies: Vec<SaveReply>) {
        if let Err(first) = self.session.validate_links() {
            tracing::debug!(?origin, invalid = self.session.link_errors().len(), "Save blocked by invalid links");
            self.emit(EngineEvent::FocusLink { key: first });
            if !origin.is_silent() {
                self.notice(
                    NoticeLevel::Error,
                    "Please fix the invalid links. Links must start with http:// or https://",
                );
            }
            let keys = self.session.link_errors().iter().copied().collect();
            reply_all(replies, Err(SaveError::InvalidLinks(keys)));
            return;
        }

        let items = self.session.payload();
        let payload = self.session.payload_json();
        let record_id = self.session.record_id_for_selected_date();
        if record_id.is_none() && items.is_empty() {
            // Nothing stored and nothing to store
            self.session.refresh_dirty();
            self.sync_dirty();
            reply_all(replies, Ok(None));
            return;
        }

        let date = self.session.selected_date();
        let job = SaveJob {
            employee: self.session.employee().clone(),
            date,
            record_id,
            items: items.clone(),
            errors_before: self.session.consecutive_errors(),
            policy: RetryPolicy::from(&self.config),
        };

        tracing::debug!(?origin, %date, ?record_id, items = items.len(), "Starting save");
        self.session.begin_save(origin, items, payload.clone());
        self.set_status(SaveStatus::Saving);

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let store = Arc::clone(&self.store);
        let handle = tokio::spawn(async move { job.run(store.as_ref(), &token).await });

        self.in_flight = Some(InFlight {
            origin,
            date,
            payload,
            cancel,
            handle,
            replies,
        });
    }

    fn on_save_finished(&mut self, flight: InFlight, joined: Result<JobReport, JoinError>) {
        let report = joined.unwrap_or_else(|e| JobReport {
            result: JobResult::Failed {
                message: format!("save task failed: {e}"),
                gave_up: false,
            },
            failures: 1,
            retries: 0,
        });
        self.session.record_retries(report.retries);
        let stale = flight.date != self.session.selected_date();

        match report.result {
            JobResult::Saved(record) => {
                if stale {
                    tracing::debug!(date = %flight.date, "Save for a previous date completed");
                    self.session.finish_stale_save();
                } else {
                    let at = Utc::now();
                    let record_id = record.as_ref().map(|r| r.id);
                    self.session.finish_save(record.clone(), flight.payload, at);
                    self.set_status(SaveStatus::Saved);
                    self.emit(EngineEvent::Saved { record_id, at });
                    if !flight.origin.is_silent() {
                        self.notice(NoticeLevel::Success, "Daily report saved");
                    }
                    tracing::debug!(?record_id, origin = ?flight.origin, "Save completed");
                }
                reply_all(flight.replies, Ok(record));
            }
            JobResult::Aborted => {
                self.session.abort_save();
                reply_all(flight.replies, Err(SaveError::Aborted));
            }
            JobResult::Failed { message, .. } if stale => {
                tracing::debug!(date = %flight.date, "Save for a previous date failed: {message}");
                self.session.finish_stale_save();
                reply_all(flight.replies, Err(SaveError::Store(message)));
            }
            JobResult::Failed { message, gave_up } => {
                self.session.fail_save(report.failures);
                // Silent saves only surface an error once auto-save gives up
                if gave_up || !flight.origin.is_silent() {
                    self.set_status(SaveStatus::Error);
                } else {
                    self.set_status(SaveStatus::Idle);
                }
                let error = if gave_up {
                    let count = self.session.consecutive_errors();
                    self.notice(
                        NoticeLevel::Error,
                        format!(
                            "Saving failed {count} times in a row. Check your connection or access rights."
                        ),
                    );
                    SaveError::GaveUp(count)
                } else {
                    if !flight.origin.is_silent() {
                        self.notice(NoticeLevel::Error, message.clone());
                    }
                    SaveError::Store(message)
                };
                reply_all(flight.replies, Err(error));
            }
        }

        self.sync_dirty();

        if let Some(queued) = self.queued.take() {
            self.request_save(queued.origin, queued.replies);
        }
    }

    /// Wait out the save in flight and anything queued behind it
    async fn drain_in_flight(&mut self) {
        while self.in_flight.is_some() {
            if let Some((flight, joined)) = wait_in_flight(&mut self.in_flight).await {
                self.on_save_finished(flight, joined);
            }
        }
    }

    /// Persist whatever is still unsaved before the worker stops
    async fn flush_on_exit(&mut self) {
        self.timer.cancel();
        self.session.set_typing(false);
        self.drain_in_flight().await;

        if !self.session.is_loaded() || !self.session.has_data_to_save() {
            return;
        }
        if !invalid_links(self.session.items()).is_empty() {
            tracing::warn!("Unsaved edits with invalid links were not flushed");
            return;
        }

        let date = self.session.selected_date();
        let items = self.session.payload();
        let payload = self.session.payload_json();
        match flush_once(self.store.as_ref(), self.session.employee().clone(), date, items).await {
            Ok(record) => {
                tracing::info!(%date, "Flushed unsaved edits before exit");
                self.session.finish_save(record, payload, Utc::now());
            }
            Err(e) => tracing::error!(%date, "Failed to flush unsaved edits before exit: {e}"),
        }
    }

    // ========== Status and events ==========

    fn set_status(&mut self, status: SaveStatus) {
        self.session.set_status(status);
        self.status_reset_at = match status {
            SaveStatus::Saved => Some(Instant::now() + self.config.saved_status),
            SaveStatus::Error => Some(Instant::now() + self.config.error_status),
            SaveStatus::Idle | SaveStatus::Saving => None,
        };
        self.emit(EngineEvent::Status { status });
    }

    fn on_status_timeout(&mut self) {
        self.status_reset_at = None;
        if matches!(self.session.status(), SaveStatus::Saved | SaveStatus::Error) {
            self.set_status(SaveStatus::Idle);
        }
    }

    /// The typing window can end before the flush fires
    fn sync_typing(&mut self) {
        let typing = self.timer.is_typing(Instant::now());
        self.session.set_typing(typing);
    }

    fn sync_dirty(&mut self) {
        let dirty = self.session.is_dirty();
        if dirty != self.announced_dirty {
            self.announced_dirty = dirty;
            self.emit(EngineEvent::Dirty { dirty });
        }
    }

    fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Error => tracing::error!("{message}"),
            NoticeLevel::Warning => tracing::warn!("{message}"),
            NoticeLevel::Info | NoticeLevel::Success => tracing::info!("{message}"),
        }
        self.emit(EngineEvent::Notice(Notice { level, message }));
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

fn reply_all(replies: Vec<SaveReply>, result: SaveResult<Option<DailyReport>>) {
    for reply in replies {
        let _ = reply.send(result.clone());
    }
}

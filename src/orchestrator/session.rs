//! Session lifecycle and the phase execution loop.
//!
//! [`SessionOrchestrator`] owns every mutation of a [`Session`]: it persists
//! the whole aggregate after each status change, runs phases strictly in
//! order through the [`PhaseCoordinator`], writes one content file per
//! completed phase and publishes progress on the [`ProgressBus`].
//!
//! Failure handling:
//! - unknown pattern, session or phase: returned before anything is mutated
//! - fatal phase failure: phase record and session marked Failed, remaining
//!   phases left Pending
//! - cancellation: the interrupted phase gets back the status it had before
//!   the run and nothing else about it is persisted
//! - output directory removal during delete: logged and ignored

use scribe_common::{
    PhaseDefinition, PhaseProgress, PhaseStatus, ProgressEvent, Session, SessionConfig,
    SessionProgress, SessionStatus, SessionSummary, new_session_id,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::context::{CompletedPhase, GenerationContext};
use super::coordinator::{GeneratedPhase, PhaseCoordinator};
use super::store::{SessionStore, validate_session_id};
use crate::errors::{OrchestratorError, PhaseError};
use crate::events::{ProgressBus, global_progress_bus};
use crate::pattern::PatternSource;

pub const CONTENT_FILE_EXTENSION: &str = "txt";

type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Location of a phase's content file: `<output_dir>/<order:02>-<id>.txt`.
pub fn content_path(output_dir: &Path, phase: &PhaseDefinition) -> PathBuf {
    output_dir.join(format!("{}.{}", phase.file_stem(), CONTENT_FILE_EXTENSION))
}

pub struct SessionOrchestrator {
    patterns: Arc<dyn PatternSource>,
    store: Arc<dyn SessionStore>,
    coordinator: PhaseCoordinator,
    bus: Arc<ProgressBus>,
    output_root: PathBuf,
    max_retries: u32,
}

impl SessionOrchestrator {
    /// Sessions get their output directory under `output_root`. Progress goes
    /// to the process-wide bus unless [`with_bus`](Self::with_bus) says otherwise.
    pub fn new(
        patterns: Arc<dyn PatternSource>,
        store: Arc<dyn SessionStore>,
        coordinator: PhaseCoordinator,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        let max_retries = coordinator.settings().max_retries;
        Self {
            patterns,
            store,
            coordinator,
            bus: global_progress_bus(),
            output_root: output_root.into(),
            max_retries,
        }
    }

    pub fn with_bus(mut self, bus: Arc<ProgressBus>) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn bus(&self) -> &Arc<ProgressBus> {
        &self.bus
    }

    pub fn patterns(&self) -> &Arc<dyn PatternSource> {
        &self.patterns
    }

    /// Create and persist a Pending session with one record per phase.
    ///
    /// No content is generated.
    pub async fn initialize_session(
        &self,
        config: SessionConfig,
        pattern_id: &str,
        session_id: Option<&str>,
    ) -> OrchestratorResult<(Session, GenerationContext)> {
        let pattern = self.pattern(pattern_id)?;
        pattern
            .validate()
            .map_err(|e| OrchestratorError::Other(e.into()))?;

        let id = match session_id {
            Some(id) => {
                validate_session_id(id)?;
                if self.load_session(id).await?.is_some() {
                    return Err(OrchestratorError::SessionExists { id: id.to_string() });
                }
                id.to_string()
            }
            None => new_session_id(),
        };

        let output_dir = self.output_root.join(&id);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| OrchestratorError::ContentWriteFailed {
                path: output_dir.clone(),
                source,
            })?;

        let context = GenerationContext::new(&id, config.clone(), &pattern, output_dir.clone());
        let session = Session::new(&id, pattern_id, config, output_dir, &context.phases);
        self.save_session(&session).await?;

        info!(
            session_id = %id,
            pattern_id,
            phases = session.total_phases(),
            "session initialized"
        );
        Ok((session, context))
    }

    /// `Ok(None)` when no session has this id.
    pub async fn load_session(&self, session_id: &str) -> OrchestratorResult<Option<Session>> {
        self.store
            .load(session_id)
            .await
            .map_err(OrchestratorError::Store)
    }

    pub async fn save_session(&self, session: &Session) -> OrchestratorResult<()> {
        self.store
            .save(session)
            .await
            .map_err(OrchestratorError::Store)
    }

    /// Summaries of every stored session, oldest first.
    pub async fn list_sessions(&self) -> OrchestratorResult<Vec<SessionSummary>> {
        let sessions = self.store.list().await.map_err(OrchestratorError::Store)?;
        Ok(sessions.iter().map(Session::summary).collect())
    }

    /// Run every phase from the first one that isn't Completed.
    ///
    /// The context starts empty: completed phases ahead of the starting point
    /// are not loaded back.
    pub async fn generate_all(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Session> {
        let mut session = self.require_session(session_id).await?;
        let mut context = self.build_context(&session)?;

        let first_open = context
            .phases
            .iter()
            .position(|def| !session.phase(&def.id).is_some_and(|r| r.is_completed()))
            .unwrap_or(context.phases.len());
        let skip: HashSet<String> = context.phases[..first_open]
            .iter()
            .map(|def| def.id.clone())
            .collect();

        info!(session_id, start = first_open, "generating session");
        self.run_phases(&mut session, &mut context, &skip, cancel)
            .await?;
        Ok(session)
    }

    /// Like [`generate_all`](Self::generate_all), but completed phases are
    /// loaded back from their content files into the context first, and only
    /// the phases not in it run.
    pub async fn resume(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Session> {
        let mut session = self.require_session(session_id).await?;
        let mut context = self.build_context(&session)?;
        self.load_completed(&session, &mut context, None).await;

        info!(
            session_id,
            restored = context.completed.len(),
            total = context.phases.len(),
            "resuming session"
        );
        self.run_phases(&mut session, &mut context, &HashSet::new(), cancel)
            .await?;
        Ok(session)
    }

    /// Re-run one phase with every other completed phase as context.
    ///
    /// Overwrites that phase's record and content on success. Session status
    /// is left alone; totals are refreshed if the session already completed.
    pub async fn regenerate_phase(
        &self,
        session_id: &str,
        phase_id: &str,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Session> {
        let mut session = self.require_session(session_id).await?;
        let mut context = self.build_context(&session)?;
        let definition = context
            .phase(phase_id)
            .cloned()
            .filter(|_| session.phase(phase_id).is_some())
            .ok_or_else(|| OrchestratorError::PhaseNotFound {
                session_id: session_id.to_string(),
                phase_id: phase_id.to_string(),
            })?;

        self.load_completed(&session, &mut context, Some(phase_id))
            .await;
        info!(
            session_id,
            phase_id,
            context_phases = context.completed.len(),
            "regenerating phase"
        );

        let outcome = self
            .execute_one(&mut session, &mut context, &definition, cancel)
            .await;
        match outcome {
            Ok(()) => {
                if session.status == SessionStatus::Completed {
                    session.recompute_totals();
                }
                self.persist(&mut session).await?;
                Ok(session)
            }
            Err(PhaseFailure::Cancelled) => Err(OrchestratorError::Cancelled),
            Err(PhaseFailure::Fatal(err)) => {
                error!(session_id, phase_id, error = %err, "phase regeneration failed");
                if let Some(record) = session.phase_mut(phase_id) {
                    record.mark_failed();
                }
                self.persist(&mut session).await?;
                self.publish_phase(&session, &definition, PhaseStatus::Failed, err.to_string());
                Err(err)
            }
        }
    }

    /// Remove the session record and its output directory.
    ///
    /// Returns `false` when there was no such session.
    pub async fn delete_session(&self, session_id: &str) -> OrchestratorResult<bool> {
        let Some(session) = self.load_session(session_id).await? else {
            return Ok(false);
        };

        if let Err(e) = tokio::fs::remove_dir_all(&session.output_dir).await {
            warn!(
                session_id,
                dir = %session.output_dir.display(),
                error = %e,
                "failed to remove session output directory"
            );
        }
        let removed = self
            .store
            .delete(session_id)
            .await
            .map_err(OrchestratorError::Store)?;
        info!(session_id, "session deleted");
        Ok(removed)
    }

    fn pattern(&self, pattern_id: &str) -> OrchestratorResult<scribe_common::Pattern> {
        self.patterns
            .get_pattern(pattern_id)
            .ok_or_else(|| OrchestratorError::PatternNotFound {
                id: pattern_id.to_string(),
            })
    }

    async fn require_session(&self, session_id: &str) -> OrchestratorResult<Session> {
        self.load_session(session_id)
            .await?
            .ok_or_else(|| OrchestratorError::SessionNotFound {
                id: session_id.to_string(),
            })
    }

    fn build_context(&self, session: &Session) -> OrchestratorResult<GenerationContext> {
        let pattern = self.pattern(&session.pattern_id)?;
        Ok(GenerationContext::new(
            &session.id,
            session.config.clone(),
            &pattern,
            session.output_dir.clone(),
        ))
    }

    /// Read the content of every completed phase (except `exclude`) back into
    /// the context, in phase order. A missing file leaves that phase out, so
    /// the execution loop will run it again.
    async fn load_completed(
        &self,
        session: &Session,
        context: &mut GenerationContext,
        exclude: Option<&str>,
    ) {
        let mut records: Vec<_> = session
            .phases
            .iter()
            .filter(|r| r.is_completed() && Some(r.phase_id.as_str()) != exclude)
            .collect();
        records.sort_by_key(|r| r.order);

        for record in records {
            let Some(path) = &record.content_path else {
                warn!(session_id = %session.id, phase_id = %record.phase_id, "completed phase has no content path");
                continue;
            };
            match tokio::fs::read_to_string(path).await {
                Ok(content) => context.push_completed(CompletedPhase {
                    phase_id: record.phase_id.clone(),
                    name: record.name.clone(),
                    order: record.order,
                    content,
                    word_count: record.word_count,
                    duration_secs: record.duration_secs,
                }),
                Err(e) => warn!(
                    session_id = %session.id,
                    phase_id = %record.phase_id,
                    path = %path.display(),
                    error = %e,
                    "could not read completed phase content"
                ),
            }
        }
    }

    /// The execution loop shared by `generate_all` and `resume`.
    async fn run_phases(
        &self,
        session: &mut Session,
        context: &mut GenerationContext,
        skip: &HashSet<String>,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        for definition in &context.phases {
            if session.phase(&definition.id).is_none() {
                return Err(OrchestratorError::PhaseNotFound {
                    session_id: session.id.clone(),
                    phase_id: definition.id.clone(),
                });
            }
        }

        session.mark_running();
        self.persist(session).await?;
        self.publish_session(session, SessionStatus::Running, "generation started");

        let phases = context.phases.clone();
        for definition in &phases {
            if skip.contains(&definition.id) || context.is_completed(&definition.id) {
                debug!(session_id = %session.id, phase_id = %definition.id, "skipping completed phase");
                continue;
            }

            match self.execute_one(session, context, definition, cancel).await {
                Ok(()) => {
                    self.persist(session).await?;
                    let done = session.completed_count();
                    let total = session.total_phases();
                    let status = if done == total {
                        SessionStatus::Completed
                    } else {
                        SessionStatus::Running
                    };
                    self.publish_session(
                        session,
                        status,
                        format!("{} completed ({}/{})", definition.name, done, total),
                    );
                }
                Err(PhaseFailure::Cancelled) => {
                    info!(session_id = %session.id, phase_id = %definition.id, "generation cancelled");
                    return Err(OrchestratorError::Cancelled);
                }
                Err(PhaseFailure::Fatal(err)) => {
                    let message = err.to_string();
                    error!(session_id = %session.id, phase_id = %definition.id, error = %message, "phase failed, stopping session");
                    if let Some(record) = session.phase_mut(&definition.id) {
                        record.mark_failed();
                    }
                    session.mark_failed(message.clone());
                    self.persist(session).await?;
                    self.publish_phase(session, definition, PhaseStatus::Failed, message.clone());
                    self.publish_session(session, SessionStatus::Failed, message);
                    return Err(err);
                }
            }
        }

        session.mark_completed();
        self.persist(session).await?;
        info!(
            session_id = %session.id,
            words = session.total_word_count,
            seconds = session.total_duration_secs,
            "session completed"
        );
        self.publish_session(session, SessionStatus::Completed, "generation completed");
        Ok(())
    }

    /// Mark one phase InProgress, run it and record the result on success.
    ///
    /// The caller persists after a success and handles both failure kinds.
    async fn execute_one(
        &self,
        session: &mut Session,
        context: &mut GenerationContext,
        definition: &PhaseDefinition,
        cancel: &CancellationToken,
    ) -> Result<(), PhaseFailure> {
        let previous_status = session.phase(&definition.id).map(|r| r.status);
        if let Some(record) = session.phase_mut(&definition.id) {
            record.mark_in_progress();
        }
        self.persist(session).await.map_err(PhaseFailure::Fatal)?;
        self.publish_phase(
            session,
            definition,
            PhaseStatus::InProgress,
            format!("Generating {}", definition.name),
        );

        context.enter_phase(&definition.id);
        let outcome = self
            .coordinator
            .execute_phase(definition, context, self.max_retries, cancel)
            .await;
        context.leave_phase();

        let generated = match outcome {
            Ok(generated) => generated,
            Err(PhaseError::Cancelled) => {
                if let Some(status) = previous_status {
                    self.restore_phase_status(session, &definition.id, status).await;
                }
                return Err(PhaseFailure::Cancelled);
            }
            Err(source) => {
                return Err(PhaseFailure::Fatal(OrchestratorError::PhaseFailed {
                    phase: definition.name.clone(),
                    source,
                }));
            }
        };

        let path = self
            .write_content(&session.output_dir, definition, &generated)
            .await
            .map_err(PhaseFailure::Fatal)?;

        if let Some(record) = session.phase_mut(&definition.id) {
            record.mark_completed(
                path,
                generated.word_count,
                generated.duration_secs,
                generated.validated,
                generated.warnings.clone(),
            );
        }
        context.push_completed(generated.to_completed());

        let message = if generated.validated {
            format!("{} completed ({} words)", definition.name, generated.word_count)
        } else {
            format!(
                "{} completed unvalidated ({} words, {} warnings)",
                definition.name,
                generated.word_count,
                generated.warnings.len()
            )
        };
        self.publish_phase(session, definition, PhaseStatus::Completed, message);
        Ok(())
    }

    /// Undo the InProgress mark of a phase whose run was cancelled.
    async fn restore_phase_status(
        &self,
        session: &mut Session,
        phase_id: &str,
        status: PhaseStatus,
    ) {
        if let Some(record) = session.phase_mut(phase_id) {
            record.status = status;
        }
        if let Err(e) = self.persist(session).await {
            warn!(
                session_id = %session.id,
                phase_id,
                error = %e,
                "could not restore phase status after cancellation"
            );
        }
    }

    async fn write_content(
        &self,
        output_dir: &Path,
        definition: &PhaseDefinition,
        generated: &GeneratedPhase,
    ) -> OrchestratorResult<PathBuf> {
        let path = content_path(output_dir, definition);
        let write = async {
            tokio::fs::create_dir_all(output_dir).await?;
            tokio::fs::write(&path, &generated.content).await
        };
        write
            .await
            .map_err(|source| OrchestratorError::ContentWriteFailed {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    async fn persist(&self, session: &mut Session) -> OrchestratorResult<()> {
        session.touch();
        self.save_session(session).await
    }

    fn publish_phase(
        &self,
        session: &Session,
        definition: &PhaseDefinition,
        status: PhaseStatus,
        message: impl Into<String>,
    ) {
        let event = ProgressEvent::Phase(PhaseProgress {
            session_id: session.id.clone(),
            phase_id: definition.id.clone(),
            phase_name: definition.name.clone(),
            phase_order: definition.order,
            total_phases: session.total_phases(),
            status,
            message: message.into(),
        });
        self.bus.publish(&session.id, &event);
    }

    fn publish_session(&self, session: &Session, status: SessionStatus, message: impl Into<String>) {
        let event = ProgressEvent::Session(SessionProgress::new(
            &session.id,
            status,
            session.completed_count(),
            session.total_phases(),
            message,
        ));
        self.bus.publish(&session.id, &event);
    }
}

enum PhaseFailure {
    Cancelled,
    Fatal(OrchestratorError),
}

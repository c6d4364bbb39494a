use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AppError, ValidationError};
use crate::identity::{Identity, IdentityProvider};
use crate::models::{
    Course, CoursePatch, NewCourseRequest, NewStudyProgramRequest, Preferences, PreferencesUpdate,
    StudyProgram, StudyProgramPatch, normalize_tags,
};
use crate::services::sync_controller::SyncController;
use crate::stats::{FinishSignal, finish_signals};
use crate::store::{RemoteStore, repository};

/// Write path used by the HTTP layer.
///
/// Every operation validates its input before touching the network, writes
/// through the store, then refreshes the affected collection so the snapshot
/// reflects the write without waiting for a change notification.
pub struct MutationService {
    store: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
    controller: Arc<SyncController>,
}

impl MutationService {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        identity: Arc<dyn IdentityProvider>,
        controller: Arc<SyncController>,
    ) -> Self {
        Self {
            store,
            identity,
            controller,
        }
    }

    async fn owner(&self) -> Result<Identity, AppError> {
        self.identity
            .resolve_current_identity()
            .await
            .ok_or(AppError::Unauthenticated)
    }

    async fn known_program(&self, id: &str) -> Result<StudyProgram, AppError> {
        if let Some(program) = self.controller.program(id).await {
            return Ok(program);
        }
        self.controller.refresh_study_programs().await;
        self.controller.program(id).await.ok_or(AppError::NotFound)
    }

    async fn known_course(&self, id: &str) -> Result<Course, AppError> {
        if let Some(course) = self.controller.course(id).await {
            return Ok(course);
        }
        self.controller.refresh_courses().await;
        self.controller.course(id).await.ok_or(AppError::NotFound)
    }

    pub async fn create_program(&self, req: NewStudyProgramRequest) -> Result<StudyProgram, AppError> {
        req.validate()?;
        let owner = self.owner().await?;
        let program = repository::insert_study_program(self.store.as_ref(), owner.as_str(), &req).await?;
        info!(program = %program.id, "created study program");
        self.controller.refresh_study_programs().await;
        Ok(program)
    }

    pub async fn update_program(
        &self,
        id: &str,
        patch: StudyProgramPatch,
    ) -> Result<StudyProgram, AppError> {
        let current = self.known_program(id).await?;
        current.apply_patch(&patch).validate()?;

        let owner = self.owner().await?;
        let program =
            repository::update_study_program(self.store.as_ref(), owner.as_str(), id, &patch).await?;
        self.controller.refresh_study_programs().await;
        self.reconcile_program_status().await;
        Ok(program)
    }

    pub async fn delete_program(&self, id: &str) -> Result<(), AppError> {
        let owner = self.owner().await?;
        repository::delete_study_program(self.store.as_ref(), owner.as_str(), id).await?;
        info!(program = %id, "deleted study program");
        // The store removes the program's courses as well.
        tokio::join!(
            self.controller.refresh_study_programs(),
            self.controller.refresh_courses()
        );
        Ok(())
    }

    pub async fn advance_semester(&self, id: &str) -> Result<StudyProgram, AppError> {
        let program = self.known_program(id).await?;
        if program.current_semester >= program.semesters {
            return Err(ValidationError::Rule("already in the final semester".to_string()).into());
        }
        self.set_current_semester(id, program.current_semester + 1).await
    }

    pub async fn retreat_semester(&self, id: &str) -> Result<StudyProgram, AppError> {
        let program = self.known_program(id).await?;
        if program.current_semester <= 1 {
            return Err(ValidationError::Rule("already in the first semester".to_string()).into());
        }
        self.set_current_semester(id, program.current_semester - 1).await
    }

    async fn set_current_semester(&self, id: &str, semester: i32) -> Result<StudyProgram, AppError> {
        let patch = StudyProgramPatch {
            current_semester: Some(semester),
            ..Default::default()
        };
        let owner = self.owner().await?;
        let program =
            repository::update_study_program(self.store.as_ref(), owner.as_str(), id, &patch).await?;
        self.controller.refresh_study_programs().await;
        Ok(program)
    }

    pub async fn create_course(&self, mut req: NewCourseRequest) -> Result<Course, AppError> {
        req.tags = req.tags.as_deref().map(normalize_tags);
        let scale = self.controller.snapshot().await.grade_scale();
        req.validate(&scale)?;

        let owner = self.owner().await?;
        let course = repository::insert_course(self.store.as_ref(), owner.as_str(), &req).await?;
        info!(course = %course.id, program = %course.program_id, "created course");
        self.controller.refresh_courses().await;
        self.reconcile_program_status().await;
        Ok(course)
    }

    pub async fn update_course(&self, id: &str, mut patch: CoursePatch) -> Result<Course, AppError> {
        patch.tags = patch.tags.as_deref().map(normalize_tags);
        let current = self.known_course(id).await?;
        let scale = self.controller.snapshot().await.grade_scale();
        current.apply_patch(&patch).validate(&scale)?;

        let owner = self.owner().await?;
        let course = repository::update_course(self.store.as_ref(), owner.as_str(), id, &patch).await?;
        self.controller.refresh_courses().await;
        self.reconcile_program_status().await;
        Ok(course)
    }

    pub async fn delete_course(&self, id: &str) -> Result<(), AppError> {
        let owner = self.owner().await?;
        repository::delete_course(self.store.as_ref(), owner.as_str(), id).await?;
        info!(course = %id, "deleted course");
        self.controller.refresh_courses().await;
        self.reconcile_program_status().await;
        Ok(())
    }

    /// Stores the editor's serialized state as-is.
    pub async fn save_course_notes(
        &self,
        id: &str,
        editor_state: serde_json::Value,
    ) -> Result<Course, AppError> {
        let patch = CoursePatch {
            editor_state: Some(editor_state),
            ..Default::default()
        };
        let owner = self.owner().await?;
        let course = repository::update_course(self.store.as_ref(), owner.as_str(), id, &patch).await?;
        self.controller.refresh_courses().await;
        Ok(course)
    }

    pub async fn update_preferences(&self, update: PreferencesUpdate) -> Result<Preferences, AppError> {
        update.scale().validate()?;
        let owner = self.owner().await?;
        let preferences =
            repository::save_preferences(self.store.as_ref(), owner.as_str(), &update).await?;
        self.controller.refresh_preferences().await;
        Ok(preferences)
    }

    /// Writes the finish flags the current snapshot calls for.
    ///
    /// Failures are logged and skipped; the next pass retries them. Returns
    /// the signals that were written.
    pub async fn reconcile_program_status(&self) -> Vec<FinishSignal> {
        let signals = finish_signals(&self.controller.snapshot().await);
        if signals.is_empty() {
            return signals;
        }

        let Some(owner) = self.identity.resolve_current_identity().await else {
            return Vec::new();
        };

        let mut applied = Vec::new();
        for signal in signals {
            let patch = StudyProgramPatch {
                finished: Some(signal.finished),
                ..Default::default()
            };
            match repository::update_study_program(
                self.store.as_ref(),
                owner.as_str(),
                &signal.program_id,
                &patch,
            )
            .await
            {
                Ok(_) => {
                    info!(
                        program = %signal.program_id,
                        finished = signal.finished,
                        "program finish status reconciled"
                    );
                    applied.push(signal);
                }
                Err(e) => warn!(program = %signal.program_id, "failed to reconcile finish status: {}", e),
            }
        }

        if !applied.is_empty() {
            self.controller.refresh_study_programs().await;
        }
        applied
    }
}

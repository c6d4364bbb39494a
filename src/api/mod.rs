use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{post, put};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::*;
use crate::services::{RefreshOutcome, SyncStatus};
use crate::state::AppState;
use crate::stats::{
    self, CourseListingRow, DashboardStats, FinishSignal, GradeComparison, ProgramStats,
    SortDirection, SortKey,
};

#[derive(Deserialize)]
struct CourseQueryParams {
    #[serde(default)]
    search: String,
    #[serde(default)]
    sort: SortKey,
    #[serde(default)]
    dir: SortDirection,
}

#[derive(Serialize)]
struct SnapshotResponse {
    #[serde(flatten)]
    snapshot: Snapshot,
    #[serde(flatten)]
    status: SyncStatus,
}

#[derive(Serialize)]
struct ProgramDetail {
    program: StudyProgram,
    stats: ProgramStats,
    courses: Vec<Course>,
}

#[derive(Serialize)]
struct CourseComparison {
    course_id: String,
    grade: Option<f64>,
    program_average: Option<f64>,
    comparison: GradeComparison,
}

#[derive(Serialize)]
struct RefreshResponse {
    courses: String,
    study_programs: String,
    preferences: String,
    reconciled: Vec<FinishSignal>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/snapshot", get(snapshot))
        .route("/stats", get(dashboard_stats))
        .route("/refresh", post(refresh))
        .route("/tags", get(list_tags))
        .route("/courses", get(list_courses).post(create_course))
        .route(
            "/courses/{id}",
            get(get_course).patch(update_course).delete(delete_course),
        )
        .route("/courses/{id}/notes", put(save_notes))
        .route("/courses/{id}/comparison", get(course_comparison))
        .route("/programs", get(list_programs).post(create_program))
        .route(
            "/programs/{id}",
            get(get_program).patch(update_program).delete(delete_program),
        )
        .route("/programs/{id}/advance", post(advance_semester))
        .route("/programs/{id}/retreat", post(retreat_semester))
        .route("/preferences", get(get_preferences).put(update_preferences))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> StatusCode {
    if state.controller.is_loading().await {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

async fn snapshot(State(state): State<AppState>) -> Json<SnapshotResponse> {
    Json(SnapshotResponse {
        snapshot: state.controller.snapshot().await,
        status: state.controller.status().await,
    })
}

async fn dashboard_stats(State(state): State<AppState>) -> Json<DashboardStats> {
    Json(stats::dashboard(&state.controller.snapshot().await))
}

async fn refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    let [courses, study_programs, preferences] = state.controller.refresh_all().await;
    let reconciled = state.mutations.reconcile_program_status().await;
    Json(RefreshResponse {
        courses: describe(courses),
        study_programs: describe(study_programs),
        preferences: describe(preferences),
        reconciled,
    })
}

fn describe(outcome: RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Applied => "applied".to_string(),
        RefreshOutcome::Stale => "stale".to_string(),
        RefreshOutcome::Discarded => "discarded".to_string(),
        RefreshOutcome::Failed(message) => format!("failed: {}", message),
    }
}

async fn list_tags(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(stats::tag_suggestions(&state.controller.courses().await))
}

async fn list_courses(
    State(state): State<AppState>,
    Query(params): Query<CourseQueryParams>,
) -> Json<Vec<CourseListingRow>> {
    let snapshot = state.controller.snapshot().await;
    Json(stats::course_listing(&snapshot, &params.search, params.sort, params.dir))
}

async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Course>, AppError> {
    let course = state.controller.course(&id).await.ok_or(AppError::NotFound)?;
    Ok(Json(course))
}

async fn create_course(
    State(state): State<AppState>,
    Json(req): Json<NewCourseRequest>,
) -> Result<(StatusCode, Json<Course>), AppError> {
    let course = state.mutations.create_course(req).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn update_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<CoursePatch>,
) -> Result<Json<Course>, AppError> {
    let course = state.mutations.update_course(&id, patch).await?;
    Ok(Json(course))
}

async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.mutations.delete_course(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn save_notes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(editor_state): Json<serde_json::Value>,
) -> Result<Json<Course>, AppError> {
    let course = state.mutations.save_course_notes(&id, editor_state).await?;
    Ok(Json(course))
}

async fn course_comparison(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourseComparison>, AppError> {
    let snapshot = state.controller.snapshot().await;
    let course = snapshot.course(&id).ok_or(AppError::NotFound)?;
    let program_average =
        stats::weighted_gpa(snapshot.courses_of(&course.program_id), &snapshot.grade_scale());

    Ok(Json(CourseComparison {
        course_id: course.id.clone(),
        grade: course.grade,
        program_average,
        comparison: stats::course_comparison(course, &snapshot),
    }))
}

async fn list_programs(State(state): State<AppState>) -> Json<Vec<StudyProgram>> {
    Json(state.controller.study_programs().await)
}

async fn get_program(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProgramDetail>, AppError> {
    let snapshot = state.controller.snapshot().await;
    let program = snapshot.program(&id).ok_or(AppError::NotFound)?;

    Ok(Json(ProgramDetail {
        program: program.clone(),
        stats: stats::program_stats(program, &snapshot),
        courses: snapshot.courses_of(&id).cloned().collect(),
    }))
}

async fn create_program(
    State(state): State<AppState>,
    Json(req): Json<NewStudyProgramRequest>,
) -> Result<(StatusCode, Json<StudyProgram>), AppError> {
    let program = state.mutations.create_program(req).await?;
    Ok((StatusCode::CREATED, Json(program)))
}

async fn update_program(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<StudyProgramPatch>,
) -> Result<Json<StudyProgram>, AppError> {
    let program = state.mutations.update_program(&id, patch).await?;
    Ok(Json(program))
}

async fn delete_program(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.mutations.delete_program(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn advance_semester(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StudyProgram>, AppError> {
    Ok(Json(state.mutations.advance_semester(&id).await?))
}

async fn retreat_semester(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StudyProgram>, AppError> {
    Ok(Json(state.mutations.retreat_semester(&id).await?))
}

async fn get_preferences(State(state): State<AppState>) -> Json<GradeScalePreferences> {
    let preferences = state.controller.preferences().await;
    Json(GradeScalePreferences {
        scale: preferences.as_ref().map(Preferences::scale).unwrap_or_default(),
        preferences,
    })
}

#[derive(Serialize)]
struct GradeScalePreferences {
    preferences: Option<Preferences>,
    scale: GradeScale,
}

async fn update_preferences(
    State(state): State<AppState>,
    Json(update): Json<PreferencesUpdate>,
) -> Result<Json<Preferences>, AppError> {
    Ok(Json(state.mutations.update_preferences(update).await?))
}

//! Teacher roster and teaching schedule endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use super::{current_revision, error, require_text, saved, success, ApiResult, AtRevision};
use crate::auth::{Permission, Session};
use crate::errors::AppError;
use crate::models::{
    is_valid_school_year, school_year_for, CreateAssignmentRequest, CreateTeacherRequest, Teacher,
    TeacherAssignment, TeachingGrid, TeachingSchedule, UpdateAssignmentRequest,
};
use crate::AppState;

/// `current` resolves to the school year containing today.
fn school_year(label: &str) -> Result<String, AppError> {
    if label == "current" {
        return Ok(school_year_for(Utc::now().date_naive()));
    }
    if is_valid_school_year(label) {
        Ok(label.to_string())
    } else {
        Err(AppError::Validation(format!(
            "Invalid school year '{}', expected e.g. 2024-2025",
            label
        )))
    }
}

/// GET /api/teachers
pub async fn list_teachers(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Vec<Teacher>> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    match state.repo.list_teachers().await {
        Ok(teachers) => success(teachers, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/teachers
pub async fn create_teacher(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateTeacherRequest>,
) -> ApiResult<Teacher> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageTeachers).at(revision_id)?;
    require_text(&request.name, "Name").at(revision_id)?;

    match state.repo.create_teacher(&request).await {
        Ok(teacher) => saved(&state, teacher, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/teachers/:id - Also drops the teacher's placements.
pub async fn delete_teacher(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageTeachers).at(revision_id)?;

    match state.repo.delete_teacher(&id).await {
        Ok(()) => saved(&state, true, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/teaching/:year
pub async fn get_teaching_schedule(
    State(state): State<AppState>,
    session: Session,
    Path(year): Path<String>,
) -> ApiResult<TeachingSchedule> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;
    let year = school_year(&year).at(revision_id)?;

    match state.repo.get_teaching_schedule(&year).await {
        Ok(schedule) => success(schedule, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/teaching/:year/grid - Class by quarter lookup.
pub async fn get_teaching_grid(
    State(state): State<AppState>,
    session: Session,
    Path(year): Path<String>,
) -> ApiResult<TeachingGrid> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;
    let year = school_year(&year).at(revision_id)?;

    match state.repo.get_teaching_schedule(&year).await {
        Ok(schedule) => success(
            TeachingGrid::build(&schedule.school_year, &schedule.assignments),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/teaching/:year/assignments
pub async fn create_teacher_assignment(
    State(state): State<AppState>,
    session: Session,
    Path(year): Path<String>,
    Json(request): Json<CreateAssignmentRequest>,
) -> ApiResult<TeacherAssignment> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageTeachers).at(revision_id)?;
    let year = school_year(&year).at(revision_id)?;

    require_text(&request.class_name, "Class name").at(revision_id)?;
    require_text(&request.age_group, "Age group").at(revision_id)?;
    require_text(&request.teacher_id, "Teacher").at(revision_id)?;

    match state.repo.create_teacher_assignment(&year, &request).await {
        Ok(assignment) => saved(&state, assignment, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/teaching/:year/assignments/:id
pub async fn update_teacher_assignment(
    State(state): State<AppState>,
    session: Session,
    Path((year, id)): Path<(String, String)>,
    Json(request): Json<UpdateAssignmentRequest>,
) -> ApiResult<TeacherAssignment> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageTeachers).at(revision_id)?;
    let year = school_year(&year).at(revision_id)?;

    match state
        .repo
        .update_teacher_assignment(&year, &id, &request)
        .await
    {
        Ok(assignment) => saved(&state, assignment, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/teaching/:year/assignments/:id
pub async fn delete_teacher_assignment(
    State(state): State<AppState>,
    session: Session,
    Path((year, id)): Path<(String, String)>,
) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageTeachers).at(revision_id)?;
    let year = school_year(&year).at(revision_id)?;

    match state.repo.delete_teacher_assignment(&year, &id).await {
        Ok(()) => saved(&state, true, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

//! Life group, roster and family endpoints.
//!
//! Group edits and roster changes are open to life group organizers and to
//! the group's own leader.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{current_revision, error, require_text, saved, success, ApiResult, AtRevision};
use crate::auth::{Permission, Session};
use crate::errors::AppError;
use crate::models::{
    AddGroupMemberRequest, CreateFamilyRequest, CreateLifeGroupRequest, FamilyUnit, LifeGroup,
    LifeGroupDetail, LifeGroupMember, RemoveGroupMemberQuery, UpdateFamilyRequest,
    UpdateGroupMemberRequest, UpdateLifeGroupRequest,
};
use crate::ports::destroy_url;
use crate::AppState;

/// Organizers may edit any group; leaders only the group they lead.
async fn require_group_editor(
    state: &AppState,
    session: &Session,
    group_id: &str,
) -> Result<(), AppError> {
    session.require_any(&[Permission::ManageLifeGroups, Permission::LeadLifeGroup])?;
    if session.can(Permission::ManageLifeGroups) {
        return Ok(());
    }

    let group = state.repo.require_life_group(group_id).await?;
    if group.leader_id.as_deref() == Some(session.user_id()) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only this group's leader can change it".to_string(),
        ))
    }
}

/// GET /api/life-groups
pub async fn list_life_groups(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Vec<LifeGroup>> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    match state.repo.list_life_groups().await {
        Ok(groups) => success(groups, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/life-groups/:id - The group with its roster.
pub async fn get_life_group(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<LifeGroupDetail> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    match state.repo.get_life_group_detail(&id).await {
        Ok(detail) => success(detail, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/life-groups
pub async fn create_life_group(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateLifeGroupRequest>,
) -> ApiResult<LifeGroup> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageLifeGroups).at(revision_id)?;
    require_text(&request.name, "Name").at(revision_id)?;

    match state.repo.create_life_group(&request).await {
        Ok(group) => saved(&state, group, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/life-groups/:id
pub async fn update_life_group(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(request): Json<UpdateLifeGroupRequest>,
) -> ApiResult<LifeGroup> {
    let revision_id = current_revision(&state).await;
    require_group_editor(&state, &session, &id)
        .await
        .at(revision_id)?;

    if let Some(name) = &request.name {
        require_text(name, "Name").at(revision_id)?;
    }
    // Reassigning the group is an organizer decision.
    if request.leader_id.is_some() && !session.can(Permission::ManageLifeGroups) {
        return error(
            AppError::Forbidden("Only organizers can change a group's leader".to_string()),
            revision_id,
        );
    }

    match state.repo.update_life_group(&id, &request).await {
        Ok(group) => saved(&state, group, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/life-groups/:id
pub async fn delete_life_group(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageLifeGroups).at(revision_id)?;

    match state.repo.delete_life_group(&id).await {
        Ok(()) => saved(&state, true, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/life-groups/:id/members
pub async fn list_group_members(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Vec<LifeGroupMember>> {
    let revision_id = current_revision(&state).await;
    session.require_approved().at(revision_id)?;

    if let Err(e) = state.repo.require_life_group(&id).await {
        return error(e, revision_id);
    }
    match state.repo.list_group_members(&id).await {
        Ok(members) => success(members, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/life-groups/:id/members
pub async fn add_group_member(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(request): Json<AddGroupMemberRequest>,
) -> ApiResult<LifeGroupMember> {
    let revision_id = current_revision(&state).await;
    require_group_editor(&state, &session, &id)
        .await
        .at(revision_id)?;
    require_text(&request.name, "Name").at(revision_id)?;

    match state.repo.add_group_member(&id, &request).await {
        Ok(member) => saved(&state, member, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/life-groups/:id/members/:member_id
pub async fn update_group_member(
    State(state): State<AppState>,
    session: Session,
    Path((id, member_id)): Path<(String, String)>,
    Json(request): Json<UpdateGroupMemberRequest>,
) -> ApiResult<LifeGroupMember> {
    let revision_id = current_revision(&state).await;
    require_group_editor(&state, &session, &id)
        .await
        .at(revision_id)?;

    if let Some(name) = &request.name {
        require_text(name, "Name").at(revision_id)?;
    }

    match state.repo.update_group_member(&id, &member_id, &request).await {
        Ok(member) => saved(&state, member, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/life-groups/:id/members/:member_id?expectedVersion=n
pub async fn remove_group_member(
    State(state): State<AppState>,
    session: Session,
    Path((id, member_id)): Path<(String, String)>,
    Query(query): Query<RemoveGroupMemberQuery>,
) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;
    require_group_editor(&state, &session, &id)
        .await
        .at(revision_id)?;

    match state
        .repo
        .remove_group_member(&id, &member_id, query.expected_version)
        .await
    {
        Ok(()) => saved(&state, true, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/life-groups/:id/families/:family_id
pub async fn attach_family(
    State(state): State<AppState>,
    session: Session,
    Path((id, family_id)): Path<(String, String)>,
) -> ApiResult<LifeGroup> {
    let revision_id = current_revision(&state).await;
    require_group_editor(&state, &session, &id)
        .await
        .at(revision_id)?;

    match state.repo.attach_family(&id, &family_id).await {
        Ok(group) => saved(&state, group, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/life-groups/:id/families/:family_id
pub async fn detach_family(
    State(state): State<AppState>,
    session: Session,
    Path((id, family_id)): Path<(String, String)>,
) -> ApiResult<LifeGroup> {
    let revision_id = current_revision(&state).await;
    require_group_editor(&state, &session, &id)
        .await
        .at(revision_id)?;

    match state.repo.detach_family(&id, &family_id).await {
        Ok(group) => saved(&state, group, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/families
pub async fn list_families(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Vec<FamilyUnit>> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ViewDirectory).at(revision_id)?;

    match state.repo.list_families().await {
        Ok(families) => success(families, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/families/:id
pub async fn get_family(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<FamilyUnit> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ViewDirectory).at(revision_id)?;

    match state.repo.require_family(&id).await {
        Ok(family) => success(family, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/families
pub async fn create_family(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateFamilyRequest>,
) -> ApiResult<FamilyUnit> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageLifeGroups).at(revision_id)?;
    require_text(&request.family_name, "Family name").at(revision_id)?;

    match state.repo.create_family(&request).await {
        Ok(family) => saved(&state, family, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/families/:id
pub async fn update_family(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(request): Json<UpdateFamilyRequest>,
) -> ApiResult<FamilyUnit> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageLifeGroups).at(revision_id)?;

    if let Some(name) = &request.family_name {
        require_text(name, "Family name").at(revision_id)?;
    }

    match state.repo.update_family(&id, &request).await {
        Ok(family) => saved(&state, family, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/families/:id - Removes the family photo first.
pub async fn delete_family(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let revision_id = current_revision(&state).await;
    session.require(Permission::ManageLifeGroups).at(revision_id)?;

    let family = state.repo.require_family(&id).await.at(revision_id)?;
    if let Some(photo_url) = family.photo_url.as_deref().filter(|url| !url.is_empty()) {
        let store = state.media_store().at(revision_id)?;
        if let Err(e) = destroy_url(store.as_ref(), photo_url).await {
            tracing::warn!(family_id = %id, error = %e, "Family photo removal failed; family kept");
            return error(e, revision_id);
        }
    }

    match state.repo.delete_family(&id).await {
        Ok(()) => saved(&state, true, revision_id).await,
        Err(e) => error(e, revision_id),
    }
}

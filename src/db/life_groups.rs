//! Life groups, their rosters, and family units.
//!
//! Roster entries live in their own table so a single member can be edited
//! without rewriting the group; each carries its own version.

use std::collections::HashMap;

use sqlx::Row;

use super::repository::{
    blank_to_none, check_version, concurrent_modification, new_id, now, patch_optional, Repository,
    Touched,
};
use crate::errors::AppError;
use crate::models::{
    collections, AddGroupMemberRequest, ChangeKind, CreateFamilyRequest, CreateLifeGroupRequest,
    FamilyMember, FamilyUnit, LifeGroup, LifeGroupDetail, LifeGroupMember, UpdateFamilyRequest,
    UpdateGroupMemberRequest, UpdateLifeGroupRequest,
};

const GROUP_SELECT: &str = "SELECT g.id, g.name, g.description, g.leader_id, g.meeting_day, \
     g.meeting_time, g.location, g.created_at, g.updated_at, g.version, \
     (SELECT COUNT(*) FROM life_group_members m WHERE m.group_id = g.id) AS member_count \
     FROM life_groups g";

const MEMBER_COLUMNS: &str = "id, group_id, user_id, name, email, phone, joined_at, version";

const FAMILY_COLUMNS: &str = "id, family_name, members, photo_url, created_at, updated_at, version";

impl Repository {
    pub async fn list_life_groups(&self) -> Result<Vec<LifeGroup>, AppError> {
        let rows = sqlx::query(&format!("{} ORDER BY g.name", GROUP_SELECT))
            .fetch_all(&self.pool)
            .await?;

        let links = sqlx::query("SELECT group_id, family_id FROM life_group_families ORDER BY family_id")
            .fetch_all(&self.pool)
            .await?;
        let mut families: HashMap<String, Vec<String>> = HashMap::new();
        for link in &links {
            families
                .entry(link.get("group_id"))
                .or_default()
                .push(link.get("family_id"));
        }

        Ok(rows
            .iter()
            .map(|row| {
                let mut group = group_from_row(row);
                group.family_ids = families.remove(&group.id).unwrap_or_default();
                group
            })
            .collect())
    }

    pub async fn get_life_group(&self, id: &str) -> Result<Option<LifeGroup>, AppError> {
        let row = sqlx::query(&format!("{} WHERE g.id = ?", GROUP_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut group = group_from_row(&row);
        group.family_ids = sqlx::query_scalar::<_, String>(
            "SELECT family_id FROM life_group_families WHERE group_id = ? ORDER BY family_id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(group))
    }

    /// A group with its roster inlined.
    pub async fn get_life_group_detail(&self, id: &str) -> Result<LifeGroupDetail, AppError> {
        let group = self.require_life_group(id).await?;
        let members = self.list_group_members(id).await?;
        Ok(LifeGroupDetail { group, members })
    }

    pub async fn create_life_group(
        &self,
        request: &CreateLifeGroupRequest,
    ) -> Result<LifeGroup, AppError> {
        let leader_id = blank_to_none(request.leader_id.clone());
        if let Some(leader_id) = &leader_id {
            self.require_user(leader_id).await?;
        }

        let id = new_id();
        let now = now();
        let group = LifeGroup {
            id: id.clone(),
            name: request.name.trim().to_string(),
            description: blank_to_none(request.description.clone()),
            leader_id,
            meeting_day: blank_to_none(request.meeting_day.clone()),
            meeting_time: blank_to_none(request.meeting_time.clone()),
            location: blank_to_none(request.location.clone()),
            member_count: 0,
            family_ids: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        };

        let mut tx = self.begin().await?;
        sqlx::query(
            "INSERT INTO life_groups (id, name, description, leader_id, meeting_day, meeting_time, location, \
             created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(&group.leader_id)
        .bind(&group.meeting_day)
        .bind(&group.meeting_time)
        .bind(&group.location)
        .bind(&group.created_at)
        .bind(&group.updated_at)
        .execute(&mut *tx)
        .await?;
        self.commit_one(tx, collections::LIFE_GROUPS, &id, ChangeKind::Created)
            .await?;

        Ok(group)
    }

    pub async fn update_life_group(
        &self,
        id: &str,
        request: &UpdateLifeGroupRequest,
    ) -> Result<LifeGroup, AppError> {
        let existing = self.require_life_group(id).await?;
        check_version(request.expected_version, existing.version)?;

        let leader_id = patch_optional(&request.leader_id, &existing.leader_id);
        if leader_id != existing.leader_id {
            if let Some(leader_id) = &leader_id {
                self.require_user(leader_id).await?;
            }
        }

        let updated = LifeGroup {
            name: request
                .name
                .as_ref()
                .map(|n| n.trim().to_string())
                .unwrap_or_else(|| existing.name.clone()),
            description: patch_optional(&request.description, &existing.description),
            leader_id,
            meeting_day: patch_optional(&request.meeting_day, &existing.meeting_day),
            meeting_time: patch_optional(&request.meeting_time, &existing.meeting_time),
            location: patch_optional(&request.location, &existing.location),
            updated_at: now(),
            version: existing.version + 1,
            ..existing.clone()
        };

        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "UPDATE life_groups SET name = ?, description = ?, leader_id = ?, meeting_day = ?, meeting_time = ?, \
             location = ?, updated_at = ?, version = version + 1 WHERE id = ? AND version = ?",
        )
        .bind(&updated.name)
        .bind(&updated.description)
        .bind(&updated.leader_id)
        .bind(&updated.meeting_day)
        .bind(&updated.meeting_time)
        .bind(&updated.location)
        .bind(&updated.updated_at)
        .bind(id)
        .bind(existing.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(concurrent_modification(existing.version));
        }
        self.commit_one(tx, collections::LIFE_GROUPS, id, ChangeKind::Updated)
            .await?;

        Ok(updated)
    }

    /// Delete a group; roster rows and family links cascade.
    pub async fn delete_life_group(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM life_groups WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Life group {} not found", id)));
        }

        self.commit_one(tx, collections::LIFE_GROUPS, id, ChangeKind::Deleted)
            .await?;
        Ok(())
    }

    pub async fn require_life_group(&self, id: &str) -> Result<LifeGroup, AppError> {
        self.get_life_group(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Life group {} not found", id)))
    }

    // ==================== ROSTER ====================

    pub async fn list_group_members(&self, group_id: &str) -> Result<Vec<LifeGroupMember>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM life_group_members WHERE group_id = ? ORDER BY name",
            MEMBER_COLUMNS
        ))
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(member_from_row).collect())
    }

    async fn get_group_member(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<LifeGroupMember, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM life_group_members WHERE id = ? AND group_id = ?",
            MEMBER_COLUMNS
        ))
        .bind(member_id)
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(member_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Group member {} not found", member_id)))
    }

    /// Add a roster entry. A linked account may appear in a group only once.
    pub async fn add_group_member(
        &self,
        group_id: &str,
        request: &AddGroupMemberRequest,
    ) -> Result<LifeGroupMember, AppError> {
        self.require_life_group(group_id).await?;

        let user_id = blank_to_none(request.user_id.clone());
        if let Some(user_id) = &user_id {
            self.require_user(user_id).await?;
            let existing = sqlx::query(
                "SELECT id FROM life_group_members WHERE group_id = ? AND user_id = ?",
            )
            .bind(group_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
            if existing.is_some() {
                return Err(AppError::Rejected(
                    "User is already a member of this group".to_string(),
                ));
            }
        }

        let member = LifeGroupMember {
            id: new_id(),
            group_id: group_id.to_string(),
            user_id,
            name: request.name.trim().to_string(),
            email: blank_to_none(request.email.clone()),
            phone: blank_to_none(request.phone.clone()),
            joined_at: now(),
            version: 1,
        };

        let mut tx = self.begin().await?;
        sqlx::query(
            "INSERT INTO life_group_members (id, group_id, user_id, name, email, phone, joined_at, version) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&member.id)
        .bind(&member.group_id)
        .bind(&member.user_id)
        .bind(&member.name)
        .bind(&member.email)
        .bind(&member.phone)
        .bind(&member.joined_at)
        .execute(&mut *tx)
        .await?;
        self.commit_one(tx, collections::LIFE_GROUPS, group_id, ChangeKind::Updated)
            .await?;

        Ok(member)
    }

    pub async fn update_group_member(
        &self,
        group_id: &str,
        member_id: &str,
        request: &UpdateGroupMemberRequest,
    ) -> Result<LifeGroupMember, AppError> {
        let existing = self.get_group_member(group_id, member_id).await?;
        check_version(request.expected_version, existing.version)?;

        let updated = LifeGroupMember {
            name: request
                .name
                .as_ref()
                .map(|n| n.trim().to_string())
                .unwrap_or_else(|| existing.name.clone()),
            email: patch_optional(&request.email, &existing.email),
            phone: patch_optional(&request.phone, &existing.phone),
            version: existing.version + 1,
            ..existing.clone()
        };

        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "UPDATE life_group_members SET name = ?, email = ?, phone = ?, version = version + 1 \
             WHERE id = ? AND group_id = ? AND version = ?",
        )
        .bind(&updated.name)
        .bind(&updated.email)
        .bind(&updated.phone)
        .bind(member_id)
        .bind(group_id)
        .bind(existing.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(concurrent_modification(existing.version));
        }
        self.commit_one(tx, collections::LIFE_GROUPS, group_id, ChangeKind::Updated)
            .await?;

        Ok(updated)
    }

    pub async fn remove_group_member(
        &self,
        group_id: &str,
        member_id: &str,
        expected_version: Option<i64>,
    ) -> Result<(), AppError> {
        let existing = self.get_group_member(group_id, member_id).await?;
        check_version(expected_version, existing.version)?;

        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "DELETE FROM life_group_members WHERE id = ? AND group_id = ? AND version = ?",
        )
        .bind(member_id)
        .bind(group_id)
        .bind(existing.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(concurrent_modification(existing.version));
        }

        self.commit_one(tx, collections::LIFE_GROUPS, group_id, ChangeKind::Updated)
            .await?;
        Ok(())
    }

    /// Link a family to a group. Linking twice is a no-op.
    pub async fn attach_family(&self, group_id: &str, family_id: &str) -> Result<LifeGroup, AppError> {
        self.require_life_group(group_id).await?;
        self.require_family(family_id).await?;

        let mut tx = self.begin().await?;
        sqlx::query("INSERT OR IGNORE INTO life_group_families (group_id, family_id) VALUES (?, ?)")
            .bind(group_id)
            .bind(family_id)
            .execute(&mut *tx)
            .await?;
        self.commit_one(tx, collections::LIFE_GROUPS, group_id, ChangeKind::Updated)
            .await?;

        self.require_life_group(group_id).await
    }

    pub async fn detach_family(&self, group_id: &str, family_id: &str) -> Result<LifeGroup, AppError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM life_group_families WHERE group_id = ? AND family_id = ?")
            .bind(group_id)
            .bind(family_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Family {} is not linked to group {}",
                family_id, group_id
            )));
        }

        self.commit_one(tx, collections::LIFE_GROUPS, group_id, ChangeKind::Updated)
            .await?;

        self.require_life_group(group_id).await
    }

    // ==================== FAMILIES ====================

    pub async fn list_families(&self) -> Result<Vec<FamilyUnit>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM families ORDER BY family_name",
            FAMILY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(family_from_row).collect())
    }

    pub async fn get_family(&self, id: &str) -> Result<Option<FamilyUnit>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM families WHERE id = ?", FAMILY_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(family_from_row))
    }

    pub async fn require_family(&self, id: &str) -> Result<FamilyUnit, AppError> {
        self.get_family(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Family {} not found", id)))
    }

    pub async fn create_family(&self, request: &CreateFamilyRequest) -> Result<FamilyUnit, AppError> {
        let now = now();
        let family = FamilyUnit {
            id: new_id(),
            family_name: request.family_name.trim().to_string(),
            total_count: request.members.len() as i64,
            members: request.members.clone(),
            photo_url: blank_to_none(request.photo_url.clone()),
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        };

        let mut tx = self.begin().await?;
        sqlx::query(
            "INSERT INTO families (id, family_name, members, photo_url, created_at, updated_at, version) \
             VALUES (?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&family.id)
        .bind(&family.family_name)
        .bind(serde_json::to_string(&family.members)?)
        .bind(&family.photo_url)
        .bind(&family.created_at)
        .bind(&family.updated_at)
        .execute(&mut *tx)
        .await?;
        self.commit_one(tx, collections::FAMILIES, &family.id, ChangeKind::Created)
            .await?;

        Ok(family)
    }

    pub async fn update_family(
        &self,
        id: &str,
        request: &UpdateFamilyRequest,
    ) -> Result<FamilyUnit, AppError> {
        let existing = self.require_family(id).await?;
        check_version(request.expected_version, existing.version)?;

        let members = request
            .members
            .clone()
            .unwrap_or_else(|| existing.members.clone());
        let updated = FamilyUnit {
            family_name: request
                .family_name
                .as_ref()
                .map(|n| n.trim().to_string())
                .unwrap_or_else(|| existing.family_name.clone()),
            total_count: members.len() as i64,
            members,
            photo_url: patch_optional(&request.photo_url, &existing.photo_url),
            updated_at: now(),
            version: existing.version + 1,
            ..existing.clone()
        };

        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "UPDATE families SET family_name = ?, members = ?, photo_url = ?, updated_at = ?, \
             version = version + 1 WHERE id = ? AND version = ?",
        )
        .bind(&updated.family_name)
        .bind(serde_json::to_string(&updated.members)?)
        .bind(&updated.photo_url)
        .bind(&updated.updated_at)
        .bind(id)
        .bind(existing.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(concurrent_modification(existing.version));
        }
        self.commit_one(tx, collections::FAMILIES, id, ChangeKind::Updated)
            .await?;

        Ok(updated)
    }

    /// Delete a family and its group links.
    pub async fn delete_family(&self, id: &str) -> Result<(), AppError> {
        let linked_groups = sqlx::query_scalar::<_, String>(
            "SELECT group_id FROM life_group_families WHERE family_id = ?",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM families WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Family {} not found", id)));
        }

        let mut touched = vec![Touched::new(collections::FAMILIES, id, ChangeKind::Deleted)];
        touched.extend(
            linked_groups
                .into_iter()
                .map(|group_id| Touched::new(collections::LIFE_GROUPS, group_id, ChangeKind::Updated)),
        );
        self.commit(tx, touched).await?;
        Ok(())
    }
}

fn group_from_row(row: &sqlx::sqlite::SqliteRow) -> LifeGroup {
    LifeGroup {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        leader_id: row.get("leader_id"),
        meeting_day: row.get("meeting_day"),
        meeting_time: row.get("meeting_time"),
        location: row.get("location"),
        member_count: row.get("member_count"),
        family_ids: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}

fn member_from_row(row: &sqlx::sqlite::SqliteRow) -> LifeGroupMember {
    LifeGroupMember {
        id: row.get("id"),
        group_id: row.get("group_id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        joined_at: row.get("joined_at"),
        version: row.get("version"),
    }
}

fn family_from_row(row: &sqlx::sqlite::SqliteRow) -> FamilyUnit {
    let members_json: String = row.get("members");
    let members: Vec<FamilyMember> = serde_json::from_str(&members_json).unwrap_or_default();
    FamilyUnit {
        id: row.get("id"),
        family_name: row.get("family_name"),
        total_count: members.len() as i64,
        members,
        photo_url: row.get("photo_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}

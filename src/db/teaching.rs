use sqlx::Row;

use super::repository::{
    blank_to_none, check_version, concurrent_modification, flag, new_id, now, Repository, Touched,
};
use crate::errors::AppError;
use crate::models::{
    collections, ChangeKind, CreateAssignmentRequest, CreateTeacherRequest, Quarter, Teacher,
    TeacherAssignment, TeachingSchedule, UpdateAssignmentRequest,
};

const ASSIGNMENT_SELECT: &str = "SELECT a.id, a.school_year, a.class_name, a.age_group, a.quarter, \
     a.teacher_id, t.name AS teacher_name, a.is_lead, a.is_substitute, a.updated_at, a.version \
     FROM teacher_assignments a JOIN teachers t ON t.id = a.teacher_id";

impl Repository {
    pub async fn list_teachers(&self) -> Result<Vec<Teacher>, AppError> {
        let rows = sqlx::query("SELECT id, name, email, phone, created_at FROM teachers ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(teacher_from_row).collect())
    }

    pub async fn create_teacher(&self, request: &CreateTeacherRequest) -> Result<Teacher, AppError> {
        let teacher = Teacher {
            id: new_id(),
            name: request.name.trim().to_string(),
            email: blank_to_none(request.email.clone()),
            phone: blank_to_none(request.phone.clone()),
            created_at: now(),
        };

        let mut tx = self.begin().await?;
        sqlx::query("INSERT INTO teachers (id, name, email, phone, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(&teacher.id)
            .bind(&teacher.name)
            .bind(&teacher.email)
            .bind(&teacher.phone)
            .bind(&teacher.created_at)
            .execute(&mut *tx)
            .await?;
        self.commit_one(tx, collections::TEACHERS, &teacher.id, ChangeKind::Created)
            .await?;

        Ok(teacher)
    }

    /// Delete a teacher together with their placements.
    pub async fn delete_teacher(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        let removed = sqlx::query("DELETE FROM teacher_assignments WHERE teacher_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let result = sqlx::query("DELETE FROM teachers WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Teacher {} not found", id)));
        }

        let mut touched = vec![Touched::new(collections::TEACHERS, id, ChangeKind::Deleted)];
        if removed > 0 {
            touched.push(Touched::collection(collections::TEACHING, ChangeKind::Updated));
        }
        self.commit(tx, touched).await?;
        Ok(())
    }

    /// All placements for a school year. A year with no schedule yet is empty.
    pub async fn get_teaching_schedule(&self, school_year: &str) -> Result<TeachingSchedule, AppError> {
        let rows = sqlx::query(&format!(
            "{} WHERE a.school_year = ? ORDER BY a.class_name, a.quarter, a.is_lead DESC, t.name",
            ASSIGNMENT_SELECT
        ))
        .bind(school_year)
        .fetch_all(&self.pool)
        .await?;

        Ok(TeachingSchedule {
            school_year: school_year.to_string(),
            assignments: rows.iter().map(assignment_from_row).collect(),
        })
    }

    async fn get_teacher_assignment(
        &self,
        school_year: &str,
        id: &str,
    ) -> Result<TeacherAssignment, AppError> {
        let row = sqlx::query(&format!(
            "{} WHERE a.id = ? AND a.school_year = ?",
            ASSIGNMENT_SELECT
        ))
        .bind(id)
        .bind(school_year)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(assignment_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Assignment {} not found", id)))
    }

    async fn require_teacher_name(&self, teacher_id: &str) -> Result<String, AppError> {
        sqlx::query_scalar::<_, String>("SELECT name FROM teachers WHERE id = ?")
            .bind(teacher_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::Validation(format!("Unknown teacher {}", teacher_id)))
    }

    /// Place a teacher; the year's schedule is created on first use.
    pub async fn create_teacher_assignment(
        &self,
        school_year: &str,
        request: &CreateAssignmentRequest,
    ) -> Result<TeacherAssignment, AppError> {
        let teacher_name = self.require_teacher_name(&request.teacher_id).await?;
        let now = now();
        let assignment = TeacherAssignment {
            id: new_id(),
            school_year: school_year.to_string(),
            class_name: request.class_name.trim().to_string(),
            age_group: request.age_group.trim().to_string(),
            quarter: request.quarter.unwrap_or_else(Quarter::current),
            teacher_id: request.teacher_id.clone(),
            teacher_name,
            is_lead: request.is_lead,
            is_substitute: request.is_substitute,
            updated_at: now.clone(),
            version: 1,
        };

        let mut tx = self.begin().await?;
        sqlx::query(
            "INSERT INTO teaching_schedules (school_year, created_at, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(school_year) DO UPDATE SET updated_at = excluded.updated_at",
        )
        .bind(school_year)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO teacher_assignments (id, school_year, class_name, age_group, quarter, teacher_id, \
             is_lead, is_substitute, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&assignment.id)
        .bind(&assignment.school_year)
        .bind(&assignment.class_name)
        .bind(&assignment.age_group)
        .bind(assignment.quarter.as_str())
        .bind(&assignment.teacher_id)
        .bind(assignment.is_lead as i32)
        .bind(assignment.is_substitute as i32)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        self.commit_one(tx, collections::TEACHING, school_year, ChangeKind::Updated)
            .await?;

        Ok(assignment)
    }

    pub async fn update_teacher_assignment(
        &self,
        school_year: &str,
        id: &str,
        request: &UpdateAssignmentRequest,
    ) -> Result<TeacherAssignment, AppError> {
        let existing = self.get_teacher_assignment(school_year, id).await?;
        check_version(request.expected_version, existing.version)?;

        let (teacher_id, teacher_name) = match &request.teacher_id {
            Some(teacher_id) if *teacher_id != existing.teacher_id => {
                let name = self.require_teacher_name(teacher_id).await?;
                (teacher_id.clone(), name)
            }
            _ => (existing.teacher_id.clone(), existing.teacher_name.clone()),
        };

        let updated = TeacherAssignment {
            teacher_id,
            teacher_name,
            is_lead: request.is_lead.unwrap_or(existing.is_lead),
            is_substitute: request.is_substitute.unwrap_or(existing.is_substitute),
            updated_at: now(),
            version: existing.version + 1,
            ..existing.clone()
        };

        let mut tx = self.begin().await?;
        let result = sqlx::query(
            "UPDATE teacher_assignments SET teacher_id = ?, is_lead = ?, is_substitute = ?, updated_at = ?, \
             version = version + 1 WHERE id = ? AND version = ?",
        )
        .bind(&updated.teacher_id)
        .bind(updated.is_lead as i32)
        .bind(updated.is_substitute as i32)
        .bind(&updated.updated_at)
        .bind(id)
        .bind(existing.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(concurrent_modification(existing.version));
        }
        self.commit_one(tx, collections::TEACHING, school_year, ChangeKind::Updated)
            .await?;

        Ok(updated)
    }

    pub async fn delete_teacher_assignment(&self, school_year: &str, id: &str) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query("DELETE FROM teacher_assignments WHERE id = ? AND school_year = ?")
            .bind(id)
            .bind(school_year)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Assignment {} not found", id)));
        }

        self.commit_one(tx, collections::TEACHING, school_year, ChangeKind::Updated)
            .await?;
        Ok(())
    }
}

fn teacher_from_row(row: &sqlx::sqlite::SqliteRow) -> Teacher {
    Teacher {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        created_at: row.get("created_at"),
    }
}

fn assignment_from_row(row: &sqlx::sqlite::SqliteRow) -> TeacherAssignment {
    let quarter: String = row.get("quarter");
    TeacherAssignment {
        id: row.get("id"),
        school_year: row.get("school_year"),
        class_name: row.get("class_name"),
        age_group: row.get("age_group"),
        quarter: Quarter::parse(&quarter).unwrap_or(Quarter::Q1),
        teacher_id: row.get("teacher_id"),
        teacher_name: row.get("teacher_name"),
        is_lead: flag(row, "is_lead"),
        is_substitute: flag(row, "is_substitute"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}

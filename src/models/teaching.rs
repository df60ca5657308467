//! Teaching schedule model: teachers, per-year assignments and the quarter grid.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// School-year quarter. The school year starts on September 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quarter::Q1 => "Q1",
            Quarter::Q2 => "Q2",
            Quarter::Q3 => "Q3",
            Quarter::Q4 => "Q4",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Q1" => Some(Quarter::Q1),
            "Q2" => Some(Quarter::Q2),
            "Q3" => Some(Quarter::Q3),
            "Q4" => Some(Quarter::Q4),
            _ => None,
        }
    }

    /// Q1 Sep-Nov, Q2 Dec-Feb, Q3 Mar-May, Q4 Jun-Aug.
    pub fn for_date(date: NaiveDate) -> Self {
        match date.month() {
            9..=11 => Quarter::Q1,
            12 | 1 | 2 => Quarter::Q2,
            3..=5 => Quarter::Q3,
            _ => Quarter::Q4,
        }
    }

    pub fn current() -> Self {
        Self::for_date(Utc::now().date_naive())
    }
}

/// Label of the school year containing `date`, e.g. `2024-2025`.
pub fn school_year_for(date: NaiveDate) -> String {
    let start = if date.month() >= 9 {
        date.year()
    } else {
        date.year() - 1
    };
    format!("{}-{}", start, start + 1)
}

/// A label is valid when it names two consecutive years.
pub fn is_valid_school_year(label: &str) -> bool {
    let Some((start, end)) = label.split_once('-') else {
        return false;
    };
    match (start.parse::<i32>(), end.parse::<i32>()) {
        (Ok(start), Ok(end)) => start.to_string().len() == 4 && end == start + 1,
        _ => false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTeacherRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// One teacher placed on one class for one quarter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherAssignment {
    pub id: String,
    pub school_year: String,
    pub class_name: String,
    pub age_group: String,
    pub quarter: Quarter,
    pub teacher_id: String,
    pub teacher_name: String,
    pub is_lead: bool,
    pub is_substitute: bool,
    pub updated_at: String,
    #[serde(default)]
    pub version: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachingSchedule {
    pub school_year: String,
    pub assignments: Vec<TeacherAssignment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentRequest {
    pub class_name: String,
    pub age_group: String,
    /// Defaults to the quarter containing today
    #[serde(default)]
    pub quarter: Option<Quarter>,
    pub teacher_id: String,
    #[serde(default)]
    pub is_lead: bool,
    #[serde(default)]
    pub is_substitute: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssignmentRequest {
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub is_lead: Option<bool>,
    #[serde(default)]
    pub is_substitute: Option<bool>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Class-by-quarter lookup rendered by the admin teachers page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachingGrid {
    pub school_year: String,
    pub rows: Vec<GridRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRow {
    pub class_name: String,
    pub age_group: String,
    pub quarters: BTreeMap<Quarter, Vec<GridCell>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    pub assignment_id: String,
    pub teacher_id: String,
    pub teacher_name: String,
    pub is_lead: bool,
    pub is_substitute: bool,
}

impl TeachingGrid {
    /// Group assignments by class, then quarter. Rows are sorted by class name;
    /// every row carries all four quarters, leads first within a cell.
    pub fn build(school_year: &str, assignments: &[TeacherAssignment]) -> Self {
        let mut rows: BTreeMap<String, GridRow> = BTreeMap::new();

        for assignment in assignments {
            let row = rows
                .entry(assignment.class_name.clone())
                .or_insert_with(|| GridRow {
                    class_name: assignment.class_name.clone(),
                    age_group: assignment.age_group.clone(),
                    quarters: [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4]
                        .into_iter()
                        .map(|q| (q, Vec::new()))
                        .collect(),
                });

            row.quarters
                .entry(assignment.quarter)
                .or_default()
                .push(GridCell {
                    assignment_id: assignment.id.clone(),
                    teacher_id: assignment.teacher_id.clone(),
                    teacher_name: assignment.teacher_name.clone(),
                    is_lead: assignment.is_lead,
                    is_substitute: assignment.is_substitute,
                });
        }

        let mut rows: Vec<GridRow> = rows.into_values().collect();
        for row in &mut rows {
            for cells in row.quarters.values_mut() {
                cells.sort_by(|a, b| {
                    b.is_lead
                        .cmp(&a.is_lead)
                        .then_with(|| a.teacher_name.cmp(&b.teacher_name))
                });
            }
        }

        Self {
            school_year: school_year.to_string(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(id: &str, class: &str, quarter: Quarter, teacher: &str, lead: bool) -> TeacherAssignment {
        TeacherAssignment {
            id: id.to_string(),
            school_year: "2024-2025".to_string(),
            class_name: class.to_string(),
            age_group: "K-2".to_string(),
            quarter,
            teacher_id: format!("t-{}", teacher),
            teacher_name: teacher.to_string(),
            is_lead: lead,
            is_substitute: false,
            updated_at: String::new(),
            version: 1,
        }
    }

    #[test]
    fn test_quarter_boundaries() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(Quarter::for_date(d(2024, 9, 1)), Quarter::Q1);
        assert_eq!(Quarter::for_date(d(2024, 11, 30)), Quarter::Q1);
        assert_eq!(Quarter::for_date(d(2024, 12, 1)), Quarter::Q2);
        assert_eq!(Quarter::for_date(d(2025, 2, 28)), Quarter::Q2);
        assert_eq!(Quarter::for_date(d(2025, 3, 1)), Quarter::Q3);
        assert_eq!(Quarter::for_date(d(2025, 8, 31)), Quarter::Q4);
    }

    #[test]
    fn test_school_year_label() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(school_year_for(d(2024, 9, 1)), "2024-2025");
        assert_eq!(school_year_for(d(2025, 8, 31)), "2024-2025");
        assert!(is_valid_school_year("2024-2025"));
        assert!(!is_valid_school_year("2024-2026"));
        assert!(!is_valid_school_year("24-25"));
        assert!(!is_valid_school_year("fall"));
    }

    #[test]
    fn test_grid_groups_by_class_and_quarter() {
        let assignments = vec![
            assignment("a1", "Tigers", Quarter::Q1, "Zoe", false),
            assignment("a2", "Tigers", Quarter::Q1, "Adam", true),
            assignment("a3", "Lambs", Quarter::Q3, "Beth", false),
        ];

        let grid = TeachingGrid::build("2024-2025", &assignments);

        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.rows[0].class_name, "Lambs");
        let tigers = &grid.rows[1];
        assert_eq!(tigers.quarters.len(), 4);
        let q1 = &tigers.quarters[&Quarter::Q1];
        assert_eq!(q1.len(), 2);
        assert_eq!(q1[0].teacher_name, "Adam");
        assert!(tigers.quarters[&Quarter::Q2].is_empty());
    }

    #[test]
    fn test_grid_empty() {
        let grid = TeachingGrid::build("2024-2025", &[]);
        assert!(grid.rows.is_empty());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::{GradeScale, double_option, non_negative, required};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub user_id: String,
    pub program_id: String,
    pub course_code: String,
    pub name: String,
    pub credits: f64,
    #[serde(default)]
    pub grade: Option<f64>,
    pub semesters: i32,
    pub finished: bool,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Serialized rich-text notes, stored and returned untouched.
    #[serde(default)]
    pub editor_state: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Course {
    /// Rejects rows the store should never have produced.
    pub fn check_row(&self) -> Result<(), String> {
        if !self.credits.is_finite() || self.credits < 0.0 {
            return Err(format!("course {} has invalid credits {}", self.id, self.credits));
        }
        if let Some(grade) = self.grade {
            if !grade.is_finite() {
                return Err(format!("course {} has a non-finite grade", self.id));
            }
        }
        Ok(())
    }

    pub fn apply_patch(&self, patch: &CoursePatch) -> Course {
        let mut next = self.clone();
        if let Some(program_id) = &patch.program_id {
            next.program_id = program_id.clone();
        }
        if let Some(course_code) = &patch.course_code {
            next.course_code = course_code.clone();
        }
        if let Some(name) = &patch.name {
            next.name = name.clone();
        }
        if let Some(credits) = patch.credits {
            next.credits = credits;
        }
        if let Some(grade) = patch.grade {
            next.grade = grade;
        }
        if let Some(semesters) = patch.semesters {
            next.semesters = semesters;
        }
        if let Some(finished) = patch.finished {
            next.finished = finished;
        }
        if let Some(tags) = &patch.tags {
            next.tags = Some(tags.clone());
        }
        if let Some(editor_state) = &patch.editor_state {
            next.editor_state = Some(editor_state.clone());
        }
        next
    }

    pub fn validate(&self, scale: &GradeScale) -> Result<(), ValidationError> {
        validate_fields(
            &self.program_id,
            &self.name,
            self.credits,
            self.grade,
            self.semesters,
            scale,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourseRequest {
    pub program_id: String,
    #[serde(default)]
    pub course_code: String,
    pub name: String,
    pub credits: f64,
    #[serde(default)]
    pub grade: Option<f64>,
    pub semesters: i32,
    #[serde(default)]
    pub finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl NewCourseRequest {
    pub fn validate(&self, scale: &GradeScale) -> Result<(), ValidationError> {
        validate_fields(
            &self.program_id,
            &self.name,
            self.credits,
            self.grade,
            self.semesters,
            scale,
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoursePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<f64>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub grade: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semesters: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_state: Option<serde_json::Value>,
}

fn validate_fields(
    program_id: &str,
    name: &str,
    credits: f64,
    grade: Option<f64>,
    semesters: i32,
    scale: &GradeScale,
) -> Result<(), ValidationError> {
    required("program_id", program_id)?;
    required("name", name)?;
    non_negative("credits", credits)?;
    if semesters < 1 {
        return Err(ValidationError::OutOfRange {
            field: "semesters",
            rule: "a positive number".to_string(),
        });
    }
    if let Some(grade) = grade {
        if !grade.is_finite() || grade < scale.min || grade > scale.max {
            return Err(ValidationError::OutOfRange {
                field: "grade",
                rule: format!("between {} and {}", scale.min, scale.max),
            });
        }
    }
    Ok(())
}

/// Trims tags, drops empty ones and removes case-insensitive duplicates,
/// keeping the first spelling seen.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        if out.iter().any(|t| t.to_lowercase() == tag.to_lowercase()) {
            continue;
        }
        out.push(tag.to_string());
    }
    out
}

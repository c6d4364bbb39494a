use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::{double_option, non_negative, required};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Degree {
    Bachelor,
    Master,
    Phd,
    Associate,
    Diploma,
    Certificate,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyProgram {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub degree: Degree,
    pub institution: String,
    pub semesters: i32,
    pub current_semester: i32,
    pub finished: bool,
    /// Target credits.
    pub credits: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StudyProgram {
    pub fn check_row(&self) -> Result<(), String> {
        if self.semesters < 1 {
            return Err(format!("program {} has {} semesters", self.id, self.semesters));
        }
        if self.current_semester < 1 || self.current_semester > self.semesters {
            return Err(format!(
                "program {} current semester {} outside 1..={}",
                self.id, self.current_semester, self.semesters
            ));
        }
        if !self.credits.is_finite() || self.credits < 0.0 {
            return Err(format!("program {} has invalid credits {}", self.id, self.credits));
        }
        Ok(())
    }

    pub fn apply_patch(&self, patch: &StudyProgramPatch) -> StudyProgram {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name = name.clone();
        }
        if let Some(degree) = patch.degree {
            next.degree = degree;
        }
        if let Some(institution) = &patch.institution {
            next.institution = institution.clone();
        }
        if let Some(semesters) = patch.semesters {
            next.semesters = semesters;
        }
        if let Some(current_semester) = patch.current_semester {
            next.current_semester = current_semester;
        }
        if let Some(finished) = patch.finished {
            next.finished = finished;
        }
        if let Some(credits) = patch.credits {
            next.credits = credits;
        }
        if let Some(description) = &patch.description {
            next.description = description.clone();
        }
        next
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, self.semesters, self.current_semester, self.credits)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudyProgramRequest {
    pub name: String,
    pub degree: Degree,
    #[serde(default)]
    pub institution: String,
    pub semesters: i32,
    #[serde(default = "first_semester")]
    pub current_semester: i32,
    pub credits: f64,
    #[serde(default)]
    pub finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn first_semester() -> i32 {
    1
}

impl NewStudyProgramRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, self.semesters, self.current_semester, self.credits)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyProgramPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<Degree>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semesters: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_semester: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<f64>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
}

fn validate_fields(
    name: &str,
    semesters: i32,
    current_semester: i32,
    credits: f64,
) -> Result<(), ValidationError> {
    required("name", name)?;
    if semesters < 1 {
        return Err(ValidationError::OutOfRange {
            field: "semesters",
            rule: "a positive number".to_string(),
        });
    }
    if current_semester < 1 || current_semester > semesters {
        return Err(ValidationError::OutOfRange {
            field: "current_semester",
            rule: format!("between 1 and {}", semesters),
        });
    }
    non_negative("credits", credits)
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub id: String,
    pub user_id: String,
    pub grade_min: f64,
    pub grade_max: f64,
    pub grade_passed: f64,
    pub grade_include_failed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Preferences {
    pub fn check_row(&self) -> Result<(), String> {
        self.scale().validate().map_err(|e| format!("preferences {}: {}", self.id, e))
    }

    pub fn scale(&self) -> GradeScale {
        GradeScale {
            min: self.grade_min,
            max: self.grade_max,
            passed: self.grade_passed,
            include_failed: self.grade_include_failed,
        }
    }
}

/// The grading rules a user works with. Lower grades are better; a grade at
/// or below `passed` is a pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeScale {
    pub min: f64,
    pub max: f64,
    pub passed: f64,
    pub include_failed: bool,
}

impl Default for GradeScale {
    fn default() -> Self {
        Self {
            min: 1.0,
            max: 5.0,
            passed: 4.0,
            include_failed: false,
        }
    }
}

impl GradeScale {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min >= self.max {
            return Err(ValidationError::Rule(
                "grade_min must be lower than grade_max".to_string(),
            ));
        }
        if !self.passed.is_finite() || self.passed < self.min || self.passed > self.max {
            return Err(ValidationError::OutOfRange {
                field: "grade_passed",
                rule: format!("between {} and {}", self.min, self.max),
            });
        }
        Ok(())
    }

    pub fn is_passing(&self, grade: f64) -> bool {
        grade <= self.passed
    }
}

/// Body of a preferences write; every field is required so the stored row is
/// always a complete scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PreferencesUpdate {
    pub grade_min: f64,
    pub grade_max: f64,
    pub grade_passed: f64,
    pub grade_include_failed: bool,
}

impl PreferencesUpdate {
    pub fn scale(&self) -> GradeScale {
        GradeScale {
            min: self.grade_min,
            max: self.grade_max,
            passed: self.grade_passed,
            include_failed: self.grade_include_failed,
        }
    }
}

impl From<GradeScale> for PreferencesUpdate {
    fn from(scale: GradeScale) -> Self {
        Self {
            grade_min: scale.min,
            grade_max: scale.max,
            grade_passed: scale.passed,
            grade_include_failed: scale.include_failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scale() {
        let scale = GradeScale::default();
        assert_eq!((scale.min, scale.max, scale.passed), (1.0, 5.0, 4.0));
        assert!(!scale.include_failed);
        assert!(scale.validate().is_ok());
    }

    #[test]
    fn test_scale_rejects_inverted_range() {
        let scale = GradeScale { min: 5.0, max: 1.0, passed: 4.0, include_failed: false };
        assert!(matches!(scale.validate(), Err(ValidationError::Rule(_))));

        let equal = GradeScale { min: 3.0, max: 3.0, passed: 3.0, include_failed: false };
        assert!(equal.validate().is_err());
    }

    #[test]
    fn test_scale_rejects_passed_outside_range() {
        let scale = GradeScale { min: 1.0, max: 5.0, passed: 5.5, include_failed: false };
        assert!(matches!(
            scale.validate(),
            Err(ValidationError::OutOfRange { field: "grade_passed", .. })
        ));
    }
}

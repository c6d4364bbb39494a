pub mod course;
pub mod preferences;
pub mod study_program;

use serde::{Deserialize, Deserializer};

pub use course::{Course, CoursePatch, NewCourseRequest, normalize_tags};
pub use preferences::{GradeScale, Preferences, PreferencesUpdate};
pub use study_program::{Degree, NewStudyProgramRequest, StudyProgram, StudyProgramPatch};

/// Keeps "field absent" (`None`) apart from "field set to null" (`Some(None)`)
/// in patch payloads.
pub(crate) fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<(), crate::error::ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(crate::error::ValidationError::OutOfRange {
            field,
            rule: "zero or greater".to_string(),
        });
    }
    Ok(())
}

pub(crate) fn required(field: &'static str, value: &str) -> Result<(), crate::error::ValidationError> {
    if value.trim().is_empty() {
        return Err(crate::error::ValidationError::Required(field));
    }
    Ok(())
}

/// In-memory copy of everything the current identity owns.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Snapshot {
    pub courses: Vec<Course>,
    pub study_programs: Vec<StudyProgram>,
    pub preferences: Option<Preferences>,
}

impl Snapshot {
    /// The user's grading rules, or the defaults before preferences load.
    pub fn grade_scale(&self) -> GradeScale {
        self.preferences
            .as_ref()
            .map(Preferences::scale)
            .unwrap_or_default()
    }

    pub fn program(&self, id: &str) -> Option<&StudyProgram> {
        self.study_programs.iter().find(|p| p.id == id)
    }

    pub fn course(&self, id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == id)
    }

    pub fn courses_of<'a>(&'a self, program_id: &'a str) -> impl Iterator<Item = &'a Course> + 'a {
        self.courses.iter().filter(move |c| c.program_id == program_id)
    }
}

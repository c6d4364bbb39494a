use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::StoreError;
use crate::models::{
    Course, CoursePatch, GradeScale, NewCourseRequest, NewStudyProgramRequest, Preferences,
    PreferencesUpdate, StudyProgram, StudyProgramPatch,
};
use crate::store::{Collection, OrderBy, RemoteStore, Row};

/// Implemented by every row type so malformed rows are rejected where they
/// enter the process.
pub trait StoreRow: DeserializeOwned {
    fn check_row(&self) -> Result<(), String>;
}

impl StoreRow for Course {
    fn check_row(&self) -> Result<(), String> {
        Course::check_row(self)
    }
}

impl StoreRow for StudyProgram {
    fn check_row(&self) -> Result<(), String> {
        StudyProgram::check_row(self)
    }
}

impl StoreRow for Preferences {
    fn check_row(&self) -> Result<(), String> {
        Preferences::check_row(self)
    }
}

pub fn decode_row<T: StoreRow>(collection: Collection, row: Row) -> Result<T, StoreError> {
    let id = row
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();
    let parsed: T = serde_json::from_value(Value::Object(row))
        .map_err(|e| StoreError::Decode(format!("{} row {}: {}", collection, id, e)))?;
    parsed.check_row().map_err(StoreError::Decode)?;
    Ok(parsed)
}

pub fn decode_rows<T: StoreRow>(collection: Collection, rows: Vec<Row>) -> Result<Vec<T>, StoreError> {
    rows.into_iter().map(|row| decode_row(collection, row)).collect()
}

pub fn to_row<T: Serialize>(value: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Decode(format!("expected an object, got {}", other))),
    }
}

fn owned_row<T: Serialize>(value: &T, owner: &str) -> Result<Row, StoreError> {
    let mut row = to_row(value)?;
    row.insert("user_id".to_string(), Value::String(owner.to_string()));
    Ok(row)
}

pub async fn fetch_courses(store: &dyn RemoteStore, owner: &str) -> Result<Vec<Course>, StoreError> {
    let rows = store
        .fetch_all(Collection::Courses, owner, &OrderBy::newest_first())
        .await?;
    decode_rows(Collection::Courses, rows)
}

pub async fn fetch_study_programs(
    store: &dyn RemoteStore,
    owner: &str,
) -> Result<Vec<StudyProgram>, StoreError> {
    let rows = store
        .fetch_all(Collection::StudyPrograms, owner, &OrderBy::newest_first())
        .await?;
    decode_rows(Collection::StudyPrograms, rows)
}

/// Reads the owner's preferences, creating the default row on first access.
pub async fn fetch_or_create_preferences(
    store: &dyn RemoteStore,
    owner: &str,
) -> Result<Preferences, StoreError> {
    if let Some(row) = store
        .fetch_one(Collection::Preferences, owner, &Vec::new())
        .await?
    {
        return decode_row(Collection::Preferences, row);
    }

    let defaults = PreferencesUpdate::from(GradeScale::default());
    match store
        .insert(Collection::Preferences, owned_row(&defaults, owner)?)
        .await
    {
        Ok(row) => decode_row(Collection::Preferences, row),
        // Another client created the row between our read and insert.
        Err(StoreError::Conflict(_)) => {
            let row = store
                .fetch_one(Collection::Preferences, owner, &Vec::new())
                .await?
                .ok_or(StoreError::NotFound)?;
            decode_row(Collection::Preferences, row)
        }
        Err(e) => Err(e),
    }
}

pub async fn save_preferences(
    store: &dyn RemoteStore,
    owner: &str,
    update: &PreferencesUpdate,
) -> Result<Preferences, StoreError> {
    let current = fetch_or_create_preferences(store, owner).await?;
    let row = store
        .update(Collection::Preferences, &current.id, owner, to_row(update)?)
        .await?;
    decode_row(Collection::Preferences, row)
}

pub async fn insert_course(
    store: &dyn RemoteStore,
    owner: &str,
    req: &NewCourseRequest,
) -> Result<Course, StoreError> {
    let row = store
        .insert(Collection::Courses, owned_row(req, owner)?)
        .await?;
    decode_row(Collection::Courses, row)
}

pub async fn update_course(
    store: &dyn RemoteStore,
    owner: &str,
    id: &str,
    patch: &CoursePatch,
) -> Result<Course, StoreError> {
    let row = store
        .update(Collection::Courses, id, owner, to_row(patch)?)
        .await?;
    decode_row(Collection::Courses, row)
}

pub async fn delete_course(store: &dyn RemoteStore, owner: &str, id: &str) -> Result<(), StoreError> {
    store.delete(Collection::Courses, id, owner).await
}

pub async fn insert_study_program(
    store: &dyn RemoteStore,
    owner: &str,
    req: &NewStudyProgramRequest,
) -> Result<StudyProgram, StoreError> {
    let row = store
        .insert(Collection::StudyPrograms, owned_row(req, owner)?)
        .await?;
    decode_row(Collection::StudyPrograms, row)
}

pub async fn update_study_program(
    store: &dyn RemoteStore,
    owner: &str,
    id: &str,
    patch: &StudyProgramPatch,
) -> Result<StudyProgram, StoreError> {
    let row = store
        .update(Collection::StudyPrograms, id, owner, to_row(patch)?)
        .await?;
    decode_row(Collection::StudyPrograms, row)
}

pub async fn delete_study_program(
    store: &dyn RemoteStore,
    owner: &str,
    id: &str,
) -> Result<(), StoreError> {
    store.delete(Collection::StudyPrograms, id, owner).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn course_row(credits: Value) -> Row {
        match json!({
            "id": "c1",
            "user_id": "u1",
            "program_id": "p1",
            "course_code": "CS101",
            "name": "Algorithms",
            "credits": credits,
            "grade": null,
            "semesters": 1,
            "finished": false,
            "created_at": "2024-03-01T10:00:00.000000+00:00"
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_decode_accepts_postgrest_timestamps() {
        let course: Course = decode_row(Collection::Courses, course_row(json!(6))).unwrap();
        assert_eq!(course.credits, 6.0);
        assert_eq!(course.tags, None);
        assert_eq!(course.updated_at, None);
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        let err = decode_row::<Course>(Collection::Courses, course_row(json!("six"))).unwrap_err();
        match err {
            StoreError::Decode(msg) => assert!(msg.contains("courses row c1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_negative_credits() {
        let err = decode_row::<Course>(Collection::Courses, course_row(json!(-3))).unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }
}

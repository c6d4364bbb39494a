use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{Course, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Name,
    CourseCode,
    Credits,
    Grade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseListingRow {
    #[serde(flatten)]
    pub course: Course,
    pub program_name: Option<String>,
}

/// Courses joined with their program name, filtered by a case-insensitive
/// search over name, code and program name, then sorted. Ungraded courses
/// sort as if their grade were infinitely bad.
pub fn course_listing(
    snapshot: &Snapshot,
    search: &str,
    key: SortKey,
    direction: SortDirection,
) -> Vec<CourseListingRow> {
    let term = search.trim().to_lowercase();

    let mut rows: Vec<CourseListingRow> = snapshot
        .courses
        .iter()
        .map(|course| CourseListingRow {
            program_name: snapshot.program(&course.program_id).map(|p| p.name.clone()),
            course: course.clone(),
        })
        .filter(|row| {
            term.is_empty()
                || [
                    Some(row.course.name.as_str()),
                    Some(row.course.course_code.as_str()),
                    row.program_name.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|value| value.to_lowercase().contains(&term))
        })
        .collect();

    rows.sort_by(|a, b| {
        let ord = compare(&a.course, &b.course, key);
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
    rows
}

fn compare(a: &Course, b: &Course, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::CourseCode => a.course_code.to_lowercase().cmp(&b.course_code.to_lowercase()),
        SortKey::Credits => a.credits.partial_cmp(&b.credits).unwrap_or(Ordering::Equal),
        SortKey::Grade => {
            let a = a.grade.unwrap_or(f64::INFINITY);
            let b = b.grade.unwrap_or(f64::INFINITY);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
    }
}

/// Every tag in use, deduplicated case-insensitively and sorted, for
/// suggesting tags while editing a course.
pub fn tag_suggestions<'a>(courses: impl IntoIterator<Item = &'a Course>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in courses
        .into_iter()
        .filter_map(|c| c.tags.as_ref())
        .flatten()
    {
        let tag = tag.trim();
        if tag.is_empty() || tags.iter().any(|t| t.to_lowercase() == tag.to_lowercase()) {
            continue;
        }
        tags.push(tag.to_string());
    }
    tags.sort_by_key(|t| t.to_lowercase());
    tags
}

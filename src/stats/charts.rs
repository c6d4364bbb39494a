use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use crate::models::{Course, GradeScale};

const BAND_WIDTH: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeBand {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemesterAverage {
    pub semester: i32,
    pub average: f64,
    pub credits: f64,
    pub courses: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyCredits {
    pub year: i32,
    pub month: u32,
    /// `YYYY-MM`.
    pub label: String,
    pub credits: f64,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Counts graded courses per unit-wide band over `[scale.min, scale.max]`.
///
/// Bands are half-open `[lower, upper)`; the top band is closed so that
/// `scale.max` has a home. Grades outside the scale are clamped first, so
/// every graded course lands in exactly one band.
pub fn grade_distribution<'a>(
    courses: impl IntoIterator<Item = &'a Course>,
    scale: &GradeScale,
) -> Vec<GradeBand> {
    if !(scale.min.is_finite() && scale.max.is_finite() && scale.max > scale.min) {
        return Vec::new();
    }

    let band_count = (((scale.max - scale.min) / BAND_WIDTH).ceil() as usize).max(1);
    let mut bands: Vec<GradeBand> = (0..band_count)
        .map(|i| {
            let lower = scale.min + i as f64 * BAND_WIDTH;
            GradeBand {
                lower,
                upper: (lower + BAND_WIDTH).min(scale.max),
                count: 0,
            }
        })
        .collect();

    for grade in courses.into_iter().filter_map(|c| c.grade) {
        let clamped = grade.clamp(scale.min, scale.max);
        let index = (((clamped - scale.min) / BAND_WIDTH).floor() as usize).min(band_count - 1);
        bands[index].count += 1;
    }

    bands
}

/// Credit-weighted average grade per semester number, ascending. Semesters
/// without graded, credited courses are omitted.
pub fn semester_averages<'a>(courses: impl IntoIterator<Item = &'a Course>) -> Vec<SemesterAverage> {
    let mut groups: BTreeMap<i32, (f64, f64, usize)> = BTreeMap::new();

    for course in courses {
        let Some(grade) = course.grade else { continue };
        if course.credits <= 0.0 {
            continue;
        }
        let entry = groups.entry(course.semesters).or_insert((0.0, 0.0, 0));
        entry.0 += grade * course.credits;
        entry.1 += course.credits;
        entry.2 += 1;
    }

    groups
        .into_iter()
        .map(|(semester, (weighted, credits, count))| SemesterAverage {
            semester,
            average: round2(weighted / credits),
            credits,
            courses: count,
        })
        .collect()
}

/// Credits per calendar month of creation, oldest month first.
pub fn credits_over_time<'a>(courses: impl IntoIterator<Item = &'a Course>) -> Vec<MonthlyCredits> {
    let mut months: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for course in courses {
        let key = (course.created_at.year(), course.created_at.month());
        *months.entry(key).or_insert(0.0) += course.credits;
    }

    months
        .into_iter()
        .map(|((year, month), credits)| MonthlyCredits {
            year,
            month,
            label: format!("{:04}-{:02}", year, month),
            credits,
        })
        .collect()
}

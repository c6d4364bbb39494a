use serde::Serialize;

use crate::models::{Course, GradeScale, StudyProgram};

const EPSILON: f64 = 1e-9;

pub fn credits_planned<'a>(courses: impl IntoIterator<Item = &'a Course>) -> f64 {
    courses.into_iter().map(|c| c.credits).sum()
}

pub fn credits_earned<'a>(courses: impl IntoIterator<Item = &'a Course>) -> f64 {
    courses
        .into_iter()
        .filter(|c| c.finished)
        .map(|c| c.credits)
        .sum()
}

/// Credit-weighted mean grade.
///
/// Only graded courses with positive credits count. Unless the scale
/// includes failed grades, grades above the passing boundary are left out.
/// `None` when nothing qualifies.
pub fn weighted_gpa<'a>(
    courses: impl IntoIterator<Item = &'a Course>,
    scale: &GradeScale,
) -> Option<f64> {
    let (weighted, credits) = courses
        .into_iter()
        .filter(|c| c.credits > 0.0)
        .filter_map(|c| c.grade.map(|g| (g, c.credits)))
        .filter(|(grade, _)| scale.include_failed || scale.is_passing(*grade))
        .fold((0.0, 0.0), |(sum, total), (grade, credits)| {
            (sum + grade * credits, total + credits)
        });

    if credits <= 0.0 {
        return None;
    }
    Some(weighted / credits)
}

/// Credits a program has actually earned: finished, graded courses with
/// positive credits.
pub fn program_earned_credits(program_id: &str, courses: &[Course]) -> f64 {
    courses
        .iter()
        .filter(|c| c.program_id == program_id)
        .filter(|c| c.finished && c.grade.is_some() && c.credits > 0.0)
        .map(|c| c.credits)
        .sum()
}

/// Completion in whole percent, 0..=100.
///
/// Measured against the program's target credits, or against the credits of
/// its courses when no target is set.
pub fn program_completion(program: &StudyProgram, courses: &[Course]) -> u8 {
    let earned = program_earned_credits(&program.id, courses);
    let denominator = if program.credits > 0.0 {
        program.credits
    } else {
        credits_planned(courses.iter().filter(|c| c.program_id == program.id))
    };
    if denominator <= 0.0 {
        return 0;
    }

    let percent = (earned / denominator * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeComparison {
    Better,
    Worse,
    Equal,
    NotApplicable,
}

/// Compares a grade with an average. Lower grades are better.
pub fn compare_to_average(grade: Option<f64>, average: Option<f64>) -> GradeComparison {
    match (grade, average) {
        (Some(grade), Some(average)) => {
            if (grade - average).abs() < EPSILON {
                GradeComparison::Equal
            } else if grade < average {
                GradeComparison::Better
            } else {
                GradeComparison::Worse
            }
        }
        _ => GradeComparison::NotApplicable,
    }
}

//! Statistics derived from a [`Snapshot`].
//!
//! Everything here is pure and synchronous: no store access, no writes.
//! Empty inputs produce zeros, empty series or `None`, never NaN.

pub mod charts;
pub mod gpa;
pub mod listing;
pub mod reconcile;

use serde::Serialize;

use crate::models::{Course, Snapshot, StudyProgram};

pub use charts::{
    GradeBand, MonthlyCredits, SemesterAverage, credits_over_time, grade_distribution, round2,
    semester_averages,
};
pub use gpa::{
    GradeComparison, compare_to_average, credits_earned, credits_planned, program_completion,
    program_earned_credits, weighted_gpa,
};
pub use listing::{CourseListingRow, SortDirection, SortKey, course_listing, tag_suggestions};
pub use reconcile::{FinishSignal, finish_signal, finish_signals};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramStats {
    pub program_id: String,
    pub name: String,
    pub current_semester: i32,
    pub semesters: i32,
    pub finished: bool,
    pub credits_target: f64,
    pub credits_planned: f64,
    pub credits_earned: f64,
    pub completion_percent: u8,
    pub gpa: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub course_count: usize,
    pub finished_course_count: usize,
    pub credits_planned: f64,
    pub credits_earned: f64,
    pub gpa: Option<f64>,
    pub grade_distribution: Vec<GradeBand>,
    pub semester_averages: Vec<SemesterAverage>,
    pub credits_over_time: Vec<MonthlyCredits>,
    pub programs: Vec<ProgramStats>,
    pub finish_signals: Vec<FinishSignal>,
}

pub fn program_stats(program: &StudyProgram, snapshot: &Snapshot) -> ProgramStats {
    let scale = snapshot.grade_scale();
    let courses: Vec<&Course> = snapshot.courses_of(&program.id).collect();

    ProgramStats {
        program_id: program.id.clone(),
        name: program.name.clone(),
        current_semester: program.current_semester,
        semesters: program.semesters,
        finished: program.finished,
        credits_target: program.credits,
        credits_planned: credits_planned(courses.iter().copied()),
        credits_earned: program_earned_credits(&program.id, &snapshot.courses),
        completion_percent: program_completion(program, &snapshot.courses),
        gpa: weighted_gpa(courses.iter().copied(), &scale),
    }
}

pub fn dashboard(snapshot: &Snapshot) -> DashboardStats {
    let scale = snapshot.grade_scale();
    let courses = &snapshot.courses;

    DashboardStats {
        course_count: courses.len(),
        finished_course_count: courses.iter().filter(|c| c.finished).count(),
        credits_planned: credits_planned(courses),
        credits_earned: credits_earned(courses),
        gpa: weighted_gpa(courses, &scale),
        grade_distribution: grade_distribution(courses, &scale),
        semester_averages: semester_averages(courses),
        credits_over_time: credits_over_time(courses),
        programs: snapshot
            .study_programs
            .iter()
            .map(|p| program_stats(p, snapshot))
            .collect(),
        finish_signals: finish_signals(snapshot),
    }
}

/// How a course's grade sits against its program's weighted average.
pub fn course_comparison(course: &Course, snapshot: &Snapshot) -> GradeComparison {
    let average = weighted_gpa(snapshot.courses_of(&course.program_id), &snapshot.grade_scale());
    compare_to_average(course.grade, average)
}

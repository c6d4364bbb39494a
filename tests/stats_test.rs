mod common;

use chrono::{TimeZone, Utc};
use common::{course, program};
use studydash::models::{GradeScale, Preferences, Snapshot};
use studydash::stats::{
    self, FinishSignal, GradeComparison, MonthlyCredits, SemesterAverage, SortDirection, SortKey,
    credits_earned, credits_over_time, credits_planned, grade_distribution, program_completion,
    semester_averages, weighted_gpa,
};

fn preferences(min: f64, max: f64, passed: f64, include_failed: bool) -> Preferences {
    Preferences {
        id: "prefs".to_string(),
        user_id: common::USER.to_string(),
        grade_min: min,
        grade_max: max,
        grade_passed: passed,
        grade_include_failed: include_failed,
        created_at: Utc::now(),
        updated_at: None,
    }
}

#[test]
fn test_full_program_completes_and_signals_finish() {
    let snapshot = Snapshot {
        courses: vec![course("c1", "p1", 180.0, Some(1.3), true)],
        study_programs: vec![program("p1", 180.0, false)],
        preferences: None,
    };

    let program_stats = stats::program_stats(&snapshot.study_programs[0], &snapshot);
    assert_eq!(program_stats.completion_percent, 100);
    assert_eq!(program_stats.gpa, Some(1.3));
    assert_eq!(
        stats::finish_signals(&snapshot),
        vec![FinishSignal {
            program_id: "p1".to_string(),
            finished: true,
        }]
    );
}

#[test]
fn test_failed_grades_are_left_out_of_gpa() {
    let snapshot = Snapshot {
        courses: vec![
            course("c1", "p1", 5.0, Some(1.0), true),
            course("c2", "p1", 5.0, Some(4.0), true),
            course("c3", "p1", 5.0, Some(4.7), true),
        ],
        study_programs: vec![program("p1", 180.0, false)],
        preferences: Some(preferences(1.0, 5.0, 4.0, false)),
    };

    let gpa = weighted_gpa(&snapshot.courses, &snapshot.grade_scale()).unwrap();
    assert!((gpa - 2.5).abs() < 1e-9);

    let mut scale = snapshot.grade_scale();
    scale.include_failed = true;
    let gpa = weighted_gpa(&snapshot.courses, &scale).unwrap();
    assert!((gpa - 3.2333333333).abs() < 1e-6);
}

#[test]
fn test_removing_last_course_signals_unfinish() {
    let mut snapshot = Snapshot {
        courses: vec![course("c1", "p1", 30.0, Some(2.0), true)],
        study_programs: vec![program("p1", 30.0, true)],
        preferences: None,
    };
    assert!(stats::finish_signals(&snapshot).is_empty());

    snapshot.courses.clear();
    assert_eq!(
        stats::finish_signals(&snapshot),
        vec![FinishSignal {
            program_id: "p1".to_string(),
            finished: false,
        }]
    );
}

#[test]
fn test_empty_snapshot_yields_zero_values() {
    let snapshot = Snapshot::default();
    let dashboard = stats::dashboard(&snapshot);

    assert_eq!(dashboard.course_count, 0);
    assert_eq!(dashboard.credits_planned, 0.0);
    assert_eq!(dashboard.credits_earned, 0.0);
    assert_eq!(dashboard.gpa, None);
    assert!(dashboard.semester_averages.is_empty());
    assert!(dashboard.credits_over_time.is_empty());
    assert!(dashboard.programs.is_empty());
    assert!(dashboard.finish_signals.is_empty());
    // The bands exist; they are just empty.
    assert_eq!(dashboard.grade_distribution.len(), 4);
    assert!(dashboard.grade_distribution.iter().all(|b| b.count == 0));
}

#[test]
fn test_earned_never_exceeds_planned() {
    let grades = [None, Some(1.0), Some(2.7), Some(4.0), Some(5.0)];
    for seed in 0..64u32 {
        let courses: Vec<_> = (0..8u32)
            .map(|i| {
                let pick = (seed.wrapping_mul(31) + i * 7) as usize;
                course(
                    &format!("c{}", i),
                    "p1",
                    ((pick % 4) * 5) as f64,
                    grades[pick % grades.len()],
                    (seed >> (i % 6)) & 1 == 1,
                )
            })
            .collect();
        assert!(credits_earned(&courses) <= credits_planned(&courses));
    }
}

#[test]
fn test_gpa_stays_within_observed_grades() {
    let scale = GradeScale::default();
    for seed in 1..50u32 {
        let courses: Vec<_> = (0..5u32)
            .map(|i| {
                let grade = 1.0 + f64::from((seed * (i + 3)) % 31) / 10.0;
                course(&format!("c{}", i), "p1", f64::from(1 + (seed + i) % 9), Some(grade), true)
            })
            .collect();

        let counted: Vec<f64> = courses
            .iter()
            .filter_map(|c| c.grade)
            .filter(|g| *g <= 4.0)
            .collect();
        match weighted_gpa(&courses, &scale) {
            Some(gpa) => {
                let lo = counted.iter().cloned().fold(f64::INFINITY, f64::min);
                let hi = counted.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                assert!(gpa >= lo - 1e-9 && gpa <= hi + 1e-9, "gpa {} outside [{}, {}]", gpa, lo, hi);
            }
            None => assert!(counted.is_empty()),
        }
    }
}

#[test]
fn test_grade_bands_partition_the_scale() {
    let scale = GradeScale::default();
    let courses: Vec<_> = [1.0, 1.7, 2.0, 2.3, 3.0, 3.99, 4.0, 4.5, 5.0, 6.0, 0.5]
        .iter()
        .enumerate()
        .map(|(i, g)| course(&format!("c{}", i), "p1", 5.0, Some(*g), true))
        .collect();
    let ungraded = course("u", "p1", 5.0, None, false);

    let bands = grade_distribution(courses.iter().chain([&ungraded]), &scale);
    assert_eq!(bands.first().map(|b| b.lower), Some(1.0));
    assert_eq!(bands.last().map(|b| b.upper), Some(5.0));
    for pair in bands.windows(2) {
        assert_eq!(pair[0].upper, pair[1].lower);
    }
    assert_eq!(bands.iter().map(|b| b.count).sum::<usize>(), courses.len());
    assert_eq!(
        bands.iter().map(|b| b.count).collect::<Vec<_>>(),
        vec![3, 2, 2, 4]
    );
}

#[test]
fn test_completion_is_clamped() {
    let over = program("p1", 60.0, false);
    let courses = vec![
        course("c1", "p1", 50.0, Some(2.0), true),
        course("c2", "p1", 50.0, Some(2.0), true),
    ];
    assert_eq!(program_completion(&over, &courses), 100);

    let untouched = program("p2", 60.0, false);
    assert_eq!(program_completion(&untouched, &courses), 0);
}

#[test]
fn test_course_comparison_against_program_average() {
    let snapshot = Snapshot {
        courses: vec![
            course("c1", "p1", 10.0, Some(1.0), true),
            course("c2", "p1", 10.0, Some(3.0), true),
            course("c3", "p1", 5.0, None, false),
        ],
        study_programs: vec![program("p1", 180.0, false)],
        preferences: None,
    };

    assert_eq!(stats::course_comparison(&snapshot.courses[0], &snapshot), GradeComparison::Better);
    assert_eq!(stats::course_comparison(&snapshot.courses[1], &snapshot), GradeComparison::Worse);
    assert_eq!(
        stats::course_comparison(&snapshot.courses[2], &snapshot),
        GradeComparison::NotApplicable
    );
}

#[test]
fn test_course_listing_searches_program_names() {
    let mut algebra = course("c1", "p1", 5.0, Some(2.0), true);
    algebra.name = "Linear Algebra".to_string();
    let mut compilers = course("c2", "p2", 8.0, None, false);
    compilers.name = "Compilers".to_string();
    let mut networks = course("c3", "p2", 6.0, Some(1.3), true);
    networks.name = "Networks".to_string();

    let mut informatics = program("p2", 180.0, false);
    informatics.name = "Informatics".to_string();
    let snapshot = Snapshot {
        courses: vec![algebra, compilers, networks],
        study_programs: vec![program("p1", 180.0, false), informatics],
        preferences: None,
    };

    let rows = stats::course_listing(&snapshot, "inform", SortKey::Grade, SortDirection::Asc);
    let ids: Vec<_> = rows.iter().map(|r| r.course.id.as_str()).collect();
    assert_eq!(ids, vec!["c3", "c2"]);
    assert_eq!(rows[0].program_name.as_deref(), Some("Informatics"));

    let rows = stats::course_listing(&snapshot, "", SortKey::Credits, SortDirection::Desc);
    let ids: Vec<_> = rows.iter().map(|r| r.course.id.as_str()).collect();
    assert_eq!(ids, vec!["c2", "c3", "c1"]);
}

#[test]
fn test_semester_averages_are_weighted_and_rounded() {
    let mut courses = vec![
        course("c1", "p1", 6.0, Some(2.0), true),
        course("c2", "p1", 5.0, Some(1.3), true),
        course("c3", "p1", 4.0, Some(2.0), true),
        course("c4", "p1", 5.0, None, false),
        course("c5", "p1", 0.0, Some(1.0), true),
    ];
    courses[0].semesters = 3;
    courses[3].semesters = 2;
    courses[4].semesters = 2;

    let averages = semester_averages(&courses);
    assert_eq!(
        averages,
        vec![
            SemesterAverage {
                semester: 1,
                average: 1.61,
                credits: 9.0,
                courses: 2,
            },
            SemesterAverage {
                semester: 3,
                average: 2.0,
                credits: 6.0,
                courses: 1,
            },
        ]
    );
}

#[test]
fn test_credits_over_time_groups_by_month_across_years() {
    let mut courses = vec![
        course("c1", "p1", 5.0, None, false),
        course("c2", "p1", 4.0, Some(2.0), true),
        course("c3", "p1", 6.0, None, false),
    ];
    courses[0].created_at = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
    courses[1].created_at = Utc.with_ymd_and_hms(2023, 12, 3, 9, 0, 0).unwrap();
    courses[2].created_at = Utc.with_ymd_and_hms(2023, 12, 20, 9, 0, 0).unwrap();

    let months = credits_over_time(&courses);
    assert_eq!(
        months,
        vec![
            MonthlyCredits {
                year: 2023,
                month: 12,
                label: "2023-12".to_string(),
                credits: 10.0,
            },
            MonthlyCredits {
                year: 2024,
                month: 1,
                label: "2024-01".to_string(),
                credits: 5.0,
            },
        ]
    );
}

use serde::Serialize;

use crate::models::{Course, Snapshot, StudyProgram};
use crate::stats::gpa::program_earned_credits;

/// A write the caller should perform to bring a program's `finished` flag in
/// line with its earned credits. The engine never performs it itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinishSignal {
    pub program_id: String,
    pub finished: bool,
}

/// Programs without a credit target are left as the user set them.
pub fn finish_signal(program: &StudyProgram, courses: &[Course]) -> Option<FinishSignal> {
    if program.credits <= 0.0 {
        return None;
    }

    let earned = program_earned_credits(&program.id, courses);
    let complete = earned >= program.credits;
    if complete == program.finished {
        return None;
    }

    Some(FinishSignal {
        program_id: program.id.clone(),
        finished: complete,
    })
}

pub fn finish_signals(snapshot: &Snapshot) -> Vec<FinishSignal> {
    snapshot
        .study_programs
        .iter()
        .filter_map(|program| finish_signal(program, &snapshot.courses))
        .collect()
}

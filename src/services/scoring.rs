use std::collections::HashMap;

use crate::db::models::Question;
use crate::services::answer_key::{self, AnswerKey, SubmittedAnswer};

/// The part of a question scoring needs.
#[derive(Debug, Clone)]
pub(crate) struct ScoredQuestion {
    pub(crate) id: String,
    pub(crate) key: Option<AnswerKey>,
    pub(crate) marks: i32,
}

impl ScoredQuestion {
    pub(crate) fn from_question(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            key: answer_key::key_for(question),
            marks: question.marks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QuestionOutcome {
    pub(crate) question_id: String,
    pub(crate) submitted: Option<SubmittedAnswer>,
    pub(crate) is_correct: bool,
    pub(crate) marks_obtained: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Score {
    pub(crate) score: i32,
    pub(crate) total: i32,
    pub(crate) obtained_marks: i32,
    pub(crate) total_marks: i32,
    pub(crate) per_question: Vec<QuestionOutcome>,
}

impl Score {
    pub(crate) fn has_questions(&self) -> bool {
        self.total > 0
    }
}

/// Scores `answers` against the assessment's active question set.
///
/// `total` is the size of `questions`, not the number of answers; answers for
/// ids outside the set are ignored.
pub(crate) fn score(
    questions: &[ScoredQuestion],
    answers: &HashMap<String, SubmittedAnswer>,
) -> Score {
    let mut score = 0;
    let mut obtained_marks = 0;
    let mut total_marks = 0;
    let mut per_question = Vec::with_capacity(questions.len());

    for question in questions {
        total_marks += question.marks;
        let submitted = answers.get(&question.id).copied();
        let is_correct =
            submitted.map(|answer| answer_key::is_correct(question.key, answer)).unwrap_or(false);

        let marks_obtained = if is_correct { question.marks } else { 0 };
        if is_correct {
            score += 1;
            obtained_marks += marks_obtained;
        }

        per_question.push(QuestionOutcome {
            question_id: question.id.clone(),
            submitted,
            is_correct,
            marks_obtained,
        });
    }

    Score {
        score,
        total: questions.len() as i32,
        obtained_marks,
        total_marks,
        per_question,
    }
}

/// Letters to persist in a result's answer map. Unknown ids and invalid
/// answers are dropped.
pub(crate) fn stored_answers(outcome: &Score) -> HashMap<String, String> {
    outcome
        .per_question
        .iter()
        .filter_map(|item| {
            item.submitted
                .and_then(SubmittedAnswer::stored_letter)
                .map(|letter| (item.question_id.clone(), letter))
        })
        .collect()
}

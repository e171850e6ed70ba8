use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Question;
use crate::db::types::DifficultyLevel;
use crate::services::answer_key::{self, AnswerKey, OPTION_COUNT};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, message = "question_text must not be empty"))]
    pub(crate) question_text: String,
    #[serde(default)]
    pub(crate) options: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) option_a: Option<String>,
    #[serde(default)]
    pub(crate) option_b: Option<String>,
    #[serde(default)]
    pub(crate) option_c: Option<String>,
    #[serde(default)]
    pub(crate) option_d: Option<String>,
    #[serde(default)]
    pub(crate) correct_answer: Option<String>,
    #[serde(default)]
    pub(crate) correct_option: Option<i32>,
    #[validate(length(min = 1, message = "category must not be empty"))]
    pub(crate) category: String,
    #[serde(default = "default_difficulty")]
    pub(crate) difficulty: DifficultyLevel,
    #[serde(default = "default_marks")]
    #[validate(range(min = 1, message = "marks must be positive"))]
    pub(crate) marks: i32,
    #[serde(default = "default_time_per_question")]
    #[validate(range(min = 1, message = "time_per_question must be positive"))]
    pub(crate) time_per_question: i32,
    #[serde(default = "default_true")]
    pub(crate) is_active: bool,
}

impl QuestionCreate {
    /// The four option texts, taken from `options` or the discrete fields.
    pub(crate) fn option_list(&self) -> Result<Vec<String>, String> {
        let list = answer_key::option_texts(
            self.options.as_deref(),
            [
                self.option_a.as_deref(),
                self.option_b.as_deref(),
                self.option_c.as_deref(),
                self.option_d.as_deref(),
            ],
        );
        complete_options(list, self.options.as_ref().map(Vec::len))
    }

    pub(crate) fn answer_key(&self) -> Result<AnswerKey, String> {
        resolve_key(self.correct_answer.as_deref(), self.correct_option)?
            .ok_or_else(|| "correct_answer or correct_option is required".to_string())
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct QuestionUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "question_text must not be empty"))]
    pub(crate) question_text: Option<String>,
    #[serde(default)]
    pub(crate) options: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) option_a: Option<String>,
    #[serde(default)]
    pub(crate) option_b: Option<String>,
    #[serde(default)]
    pub(crate) option_c: Option<String>,
    #[serde(default)]
    pub(crate) option_d: Option<String>,
    #[serde(default)]
    pub(crate) correct_answer: Option<String>,
    #[serde(default)]
    pub(crate) correct_option: Option<i32>,
    #[serde(default)]
    #[validate(length(min = 1, message = "category must not be empty"))]
    pub(crate) category: Option<String>,
    #[serde(default)]
    pub(crate) difficulty: Option<DifficultyLevel>,
    #[serde(default)]
    #[validate(range(min = 1, message = "marks must be positive"))]
    pub(crate) marks: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 1, message = "time_per_question must be positive"))]
    pub(crate) time_per_question: Option<i32>,
    #[serde(default)]
    pub(crate) is_active: Option<bool>,
}

impl QuestionUpdate {
    /// New option texts when the payload touches any option, merged over
    /// `current`.
    pub(crate) fn merged_options(&self, current: Vec<String>) -> Result<Option<Vec<String>>, String> {
        if let Some(list) = &self.options {
            return complete_options(list.clone(), Some(list.len())).map(Some);
        }

        let discrete = [&self.option_a, &self.option_b, &self.option_c, &self.option_d];
        if discrete.iter().all(|value| value.is_none()) {
            return Ok(None);
        }

        let merged = current
            .into_iter()
            .zip(discrete)
            .map(|(existing, replacement)| replacement.clone().unwrap_or(existing))
            .collect();
        complete_options(merged, None).map(Some)
    }

    pub(crate) fn answer_key(&self) -> Result<Option<AnswerKey>, String> {
        resolve_key(self.correct_answer.as_deref(), self.correct_option)
    }
}

fn complete_options(list: Vec<String>, given: Option<usize>) -> Result<Vec<String>, String> {
    if given.is_some_and(|len| len != OPTION_COUNT as usize) {
        return Err("options must contain exactly 4 entries".to_string());
    }
    let list: Vec<String> = list.into_iter().map(|text| text.trim().to_string()).collect();
    if list.len() != OPTION_COUNT as usize || list.iter().any(String::is_empty) {
        return Err("All four options (A-D) are required".to_string());
    }
    Ok(list)
}

/// Both forms may be sent; they must then name the same option.
fn resolve_key(letter: Option<&str>, index: Option<i32>) -> Result<Option<AnswerKey>, String> {
    let from_letter = match letter.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => Some(
            AnswerKey::resolve(Some(value), None)
                .ok_or_else(|| "correct_answer must be one of A, B, C, D".to_string())?,
        ),
        None => None,
    };
    let from_index = match index {
        Some(value) => Some(
            AnswerKey::from_index(i64::from(value))
                .ok_or_else(|| "correct_option must be between 0 and 3".to_string())?,
        ),
        None => None,
    };

    match (from_letter, from_index) {
        (Some(a), Some(b)) if a != b => {
            Err("correct_answer and correct_option name different options".to_string())
        }
        (Some(key), _) | (None, Some(key)) => Ok(Some(key)),
        (None, None) => Ok(None),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) question_text: String,
    pub(crate) options: Vec<String>,
    pub(crate) correct_answer: Option<char>,
    pub(crate) correct_option: Option<u8>,
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) marks: i32,
    pub(crate) time_per_question: i32,
    pub(crate) is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) order_index: Option<i32>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl QuestionResponse {
    pub(crate) fn from_db(question: Question, order_index: Option<i32>) -> Self {
        let key = answer_key::key_for(&question);
        let options = answer_key::options_for(&question);
        Self {
            id: question.id,
            question_text: question.question_text,
            options,
            correct_answer: key.map(AnswerKey::letter),
            correct_option: key.map(AnswerKey::index),
            category: question.category,
            difficulty: question.difficulty,
            marks: question.marks,
            time_per_question: question.time_per_question,
            is_active: question.is_active,
            order_index,
            created_at: format_primitive(question.created_at),
            updated_at: format_primitive(question.updated_at),
        }
    }
}

/// A question as shown to a student during an attempt; never carries the key.
#[derive(Debug, Serialize)]
pub(crate) struct StudentQuestion {
    pub(crate) id: String,
    pub(crate) question_text: String,
    pub(crate) options: Vec<String>,
    pub(crate) marks: i32,
    pub(crate) time_per_question: i32,
}

impl StudentQuestion {
    pub(crate) fn from_db(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            question_text: question.question_text.clone(),
            options: answer_key::options_for(question),
            marks: question.marks,
            time_per_question: question.time_per_question,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuestionsQuery {
    #[serde(default)]
    pub(crate) category: Option<String>,
    #[serde(default)]
    pub(crate) difficulty: Option<DifficultyLevel>,
    #[serde(default)]
    pub(crate) is_active: Option<bool>,
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

fn default_difficulty() -> DifficultyLevel {
    DifficultyLevel::Medium
}

fn default_marks() -> i32 {
    1
}

fn default_time_per_question() -> i32 {
    60
}

fn default_true() -> bool {
    true
}

//! Canonical answer representation for multiple-choice questions.
//!
//! Questions may store the correct answer as a letter, a zero-based index or
//! both, and options as a JSON array or four discrete columns. Everything is
//! normalized here on read so scoring only ever compares `AnswerKey` values.

use serde_json::Value;

use crate::db::models::Question;

pub(crate) const OPTION_COUNT: u8 = 4;
const LETTERS: [char; OPTION_COUNT as usize] = ['A', 'B', 'C', 'D'];

/// One of the four options of an MCQ, stored as its zero-based position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct AnswerKey(u8);

impl AnswerKey {
    pub(crate) fn from_letter(letter: char) -> Option<Self> {
        let upper = letter.to_ascii_uppercase();
        LETTERS.iter().position(|candidate| *candidate == upper).map(|idx| Self(idx as u8))
    }

    pub(crate) fn from_index(index: i64) -> Option<Self> {
        u8::try_from(index).ok().filter(|value| *value < OPTION_COUNT).map(Self)
    }

    /// Resolves the stored key of a question. A valid letter wins over the
    /// index column; neither yields `None`.
    pub(crate) fn resolve(letter: Option<&str>, index: Option<i32>) -> Option<Self> {
        letter
            .and_then(single_char)
            .and_then(Self::from_letter)
            .or_else(|| index.and_then(|value| Self::from_index(i64::from(value))))
    }

    pub(crate) fn letter(self) -> char {
        LETTERS[self.0 as usize]
    }

    pub(crate) fn index(self) -> u8 {
        self.0
    }
}

/// A student's raw answer after normalization. `Invalid` covers anything that
/// is not one of the four options and always scores as incorrect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmittedAnswer {
    Option(AnswerKey),
    Invalid,
}

impl SubmittedAnswer {
    pub(crate) fn parse(value: &Value) -> Self {
        let key = match value {
            Value::String(text) => parse_text(text),
            Value::Number(number) => number.as_i64().and_then(AnswerKey::from_index),
            _ => None,
        };
        key.map_or(Self::Invalid, Self::Option)
    }

    pub(crate) fn parse_str(text: &str) -> Self {
        parse_text(text).map_or(Self::Invalid, Self::Option)
    }

    pub(crate) fn key(self) -> Option<AnswerKey> {
        match self {
            Self::Option(key) => Some(key),
            Self::Invalid => None,
        }
    }

    /// Letter stored in result records; invalid answers keep no letter.
    pub(crate) fn stored_letter(self) -> Option<String> {
        self.key().map(|key| key.letter().to_string())
    }
}

fn parse_text(text: &str) -> Option<AnswerKey> {
    let trimmed = text.trim();
    if let Some(letter) = single_char(trimmed) {
        if letter.is_ascii_alphabetic() {
            return AnswerKey::from_letter(letter);
        }
    }
    trimmed.parse::<i64>().ok().and_then(AnswerKey::from_index)
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.trim().chars();
    let first = chars.next()?;
    chars.next().is_none().then_some(first)
}

pub(crate) fn is_correct(key: Option<AnswerKey>, submitted: SubmittedAnswer) -> bool {
    match (key, submitted.key()) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => false,
    }
}

pub(crate) fn letter_for_index(index: i64) -> Option<char> {
    AnswerKey::from_index(index).map(AnswerKey::letter)
}

/// Option texts in A..D order. A JSON array with entries wins; the discrete
/// columns fill in otherwise. Missing options become empty strings.
pub(crate) fn option_texts(
    options: Option<&[String]>,
    discrete: [Option<&str>; OPTION_COUNT as usize],
) -> Vec<String> {
    if let Some(list) = options.filter(|list| !list.is_empty()) {
        return (0..OPTION_COUNT as usize)
            .map(|idx| list.get(idx).cloned().unwrap_or_default())
            .collect();
    }

    discrete.iter().map(|value| value.unwrap_or_default().to_string()).collect()
}

pub(crate) fn key_for(question: &Question) -> Option<AnswerKey> {
    AnswerKey::resolve(question.correct_answer.as_deref(), question.correct_option)
}

pub(crate) fn options_for(question: &Question) -> Vec<String> {
    option_texts(
        question.options.as_ref().map(|json| json.0.as_slice()),
        [
            question.option_a.as_deref(),
            question.option_b.as_deref(),
            question.option_c.as_deref(),
            question.option_d.as_deref(),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn letter_wins_over_index_and_index_fills_gaps() {
        assert_eq!(AnswerKey::resolve(Some("B"), None).map(AnswerKey::letter), Some('B'));
        assert_eq!(AnswerKey::resolve(None, Some(2)).map(AnswerKey::letter), Some('C'));
        assert_eq!(AnswerKey::resolve(Some("d"), Some(0)).map(AnswerKey::letter), Some('D'));
        assert_eq!(AnswerKey::resolve(Some("Z"), Some(0)).map(AnswerKey::letter), Some('A'));
        assert_eq!(AnswerKey::resolve(Some(""), Some(7)), None);
        assert_eq!(AnswerKey::resolve(None, None), None);
    }

    #[test]
    fn submitted_answers_normalize_letters_indices_and_numeric_strings() {
        let b = AnswerKey::from_letter('B');
        assert_eq!(SubmittedAnswer::parse(&json!("B")).key(), b);
        assert_eq!(SubmittedAnswer::parse(&json!(" b ")).key(), b);
        assert_eq!(SubmittedAnswer::parse(&json!(1)).key(), b);
        assert_eq!(SubmittedAnswer::parse(&json!("1")).key(), b);
    }

    #[test]
    fn out_of_range_answers_are_invalid_not_errors() {
        for value in [json!("E"), json!(4), json!(-1), json!("10"), json!(null), json!(1.5)] {
            assert_eq!(SubmittedAnswer::parse(&value), SubmittedAnswer::Invalid, "{value}");
        }
    }

    #[test]
    fn correct_letter_matches_for_every_storage_form() {
        for expected in 0..OPTION_COUNT {
            let letter = LETTERS[expected as usize];
            let forms = [
                AnswerKey::resolve(Some(letter.to_string().as_str()), None),
                AnswerKey::resolve(None, Some(i32::from(expected))),
                AnswerKey::resolve(Some(letter.to_string().as_str()), Some(i32::from(expected))),
            ];

            for key in forms {
                for candidate in LETTERS {
                    let submitted = SubmittedAnswer::parse_str(&candidate.to_string());
                    assert_eq!(is_correct(key, submitted), candidate == letter);
                }
            }
        }
    }

    #[test]
    fn letter_only_question_accepts_letter_and_index() {
        let key = AnswerKey::resolve(Some("B"), None);
        assert!(is_correct(key, SubmittedAnswer::parse(&json!("B"))));
        assert!(is_correct(key, SubmittedAnswer::parse(&json!(1))));
        assert!(!is_correct(key, SubmittedAnswer::parse(&json!("A"))));
    }

    #[test]
    fn missing_key_is_never_correct() {
        assert!(!is_correct(None, SubmittedAnswer::parse_str("A")));
    }

    #[test]
    fn option_texts_prefer_json_array() {
        let list = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let texts = option_texts(Some(list.as_slice()), [Some("a"), Some("b"), Some("c"), Some("d")]);
        assert_eq!(texts, vec!["one", "two", "three", ""]);

        let texts = option_texts(Some(&[][..]), [Some("a"), Some("b"), None, Some("d")]);
        assert_eq!(texts, vec!["a", "b", "", "d"]);
    }

    #[test]
    fn letter_for_index_bounds() {
        assert_eq!(letter_for_index(3), Some('D'));
        assert_eq!(letter_for_index(4), None);
    }
}

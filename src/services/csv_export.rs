use time::PrimitiveDateTime;

use crate::core::time::format_export;
use crate::services::reporting::{percentage, Grade};

pub(crate) const HEADER: [&str; 10] = [
    "Student Name",
    "Student Email",
    "Assessment Title",
    "Category",
    "Score",
    "Total Questions",
    "Percentage",
    "Grade",
    "Time Taken",
    "Submitted At",
];

#[derive(Debug, Clone)]
pub(crate) struct ExportRow {
    pub(crate) student_name: String,
    pub(crate) student_email: String,
    pub(crate) assessment_title: String,
    pub(crate) category: String,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) time_taken: i32,
    pub(crate) submitted_at: PrimitiveDateTime,
}

/// Renders one header line plus one line per result, CRLF terminated.
pub(crate) fn render(rows: &[ExportRow]) -> String {
    let mut out = String::with_capacity(128 * (rows.len() + 1));
    push_line(&mut out, HEADER.iter().map(|label| label.to_string()));

    for row in rows {
        let pct = percentage(row.score, row.total_questions);
        push_line(
            &mut out,
            [
                row.student_name.clone(),
                row.student_email.clone(),
                row.assessment_title.clone(),
                row.category.clone(),
                row.score.to_string(),
                row.total_questions.to_string(),
                format!("{pct:.2}%"),
                Grade::from_percentage(pct).as_str().to_string(),
                format!("{:.2}", f64::from(row.time_taken) / 60.0),
                format_export(row.submitted_at),
            ],
        );
    }

    out
}

pub(crate) fn filename(assessment_title: Option<&str>, date: PrimitiveDateTime) -> String {
    let stem: String = assessment_title
        .map(|title| {
            title
                .chars()
                .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_lowercase() } else { '-' })
                .collect()
        })
        .unwrap_or_else(|| "all-assessments".to_string());
    format!("results-{}-{}.csv", stem.trim_matches('-'), date.date())
}

fn push_line(out: &mut String, fields: impl IntoIterator<Item = String>) {
    for (idx, field) in fields.into_iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(&escape(&field));
    }
    out.push_str("\r\n");
}

fn escape(field: &str) -> String {
    if !field.contains([',', '"', '\n', '\r']) {
        return field.to_string();
    }

    let mut quoted = String::with_capacity(field.len() + 2);
    quoted.push('"');
    for ch in field.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

//! Limited-mode chat: keyword intent dispatch over scoped database lookups,
//! used whenever the retrieval service cannot answer.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use time::PrimitiveDateTime;

use crate::core::security::AuthContext;
use crate::core::time::format_short_date;
use crate::db::types::DifficultyLevel;
use crate::services::reporting::{is_pass, percentage, round2};

const HEADER: &str = "LIMITED MODE";
const AVAILABLE_LIMIT: i64 = 5;
const RECENT_LIMIT: i64 = 5;

const RELEVANT_KEYWORDS: &[&str] = &[
    "assessment", "test", "exam", "quiz", "available", "take", "start", "result", "score",
    "performance", "grade", "mark", "pass", "fail", "stat", "progress", "how am i", "how many",
    "doing", "technical", "aptitude", "category", "subject", "topic", "recent", "last", "latest",
    "history", "completed", "finished", "best", "worst", "highest", "lowest", "top", "improve",
    "weak", "strong", "profile", "my name", "who am i", "account", "email", "help", "guide",
    "what", "show", "tell", "how", "when", "where", "can", "study", "learn", "prepare",
    "practice", "ready",
];

const SKIP_WORDS: &[&str] =
    &["the", "is", "are", "was", "were", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ChatMode {
    RagActive,
    DatabaseOnly,
    Offline,
}

impl ChatMode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::RagActive => "rag_active",
            Self::DatabaseOnly => "database_only",
            Self::Offline => "offline",
        }
    }

    pub(crate) fn display_name(self) -> &'static str {
        match self {
            Self::RagActive => "Mode 1: AI ACTIVE",
            Self::DatabaseOnly => "Mode 2: LIMITED MODE",
            Self::Offline => "Mode 3: OFFLINE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Intent {
    OffTopic { topic: String },
    AvailableAssessments,
    Results,
    Statistics,
    Category(&'static str),
    RecentActivity,
    BestScore,
    ImprovementArea,
    Profile,
    Help,
    Greeting,
}

impl Intent {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::OffTopic { .. } => "off_topic",
            Self::AvailableAssessments => "available_assessments",
            Self::Results => "results",
            Self::Statistics => "statistics",
            Self::Category(_) => "category",
            Self::RecentActivity => "recent_activity",
            Self::BestScore => "best_score",
            Self::ImprovementArea => "improvement_area",
            Self::Profile => "profile",
            Self::Help => "help",
            Self::Greeting => "greeting",
        }
    }
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.contains(needle))
}

fn is_relevant(query: &str) -> bool {
    if contains_any(query, RELEVANT_KEYWORDS) {
        return true;
    }
    query.chars().count() <= 10 && contains_any(query, &["hi", "hello", "hey"])
}

fn topic_word(query: &str) -> String {
    query
        .split(' ')
        .find(|word| !SKIP_WORDS.contains(word) && word.chars().count() > 2)
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .unwrap_or_else(|| "That".to_string())
}

/// Maps a free-text message to the first matching keyword group.
pub(crate) fn classify(message: &str) -> Intent {
    let query = message.trim().to_lowercase();

    if !is_relevant(&query) && query.chars().count() > 2 {
        return Intent::OffTopic { topic: topic_word(&query) };
    }

    if contains_any(&query, &["assessment", "test", "exam", "available"]) {
        Intent::AvailableAssessments
    } else if contains_any(&query, &["result", "score", "performance"]) {
        Intent::Results
    } else if contains_any(&query, &["stat", "progress", "how am i", "how many"]) {
        Intent::Statistics
    } else if contains_any(&query, &["technical", "aptitude", "category"]) {
        Intent::Category(if query.contains("technical") { "Technical" } else { "Aptitude" })
    } else if contains_any(&query, &["recent", "last", "latest"]) {
        Intent::RecentActivity
    } else if contains_any(&query, &["best", "highest", "top"]) {
        Intent::BestScore
    } else if contains_any(&query, &["worst", "lowest", "improve"]) {
        Intent::ImprovementArea
    } else if contains_any(&query, &["profile", "my name", "who am i"]) {
        Intent::Profile
    } else if contains_any(&query, &["help", "how", "guide"]) {
        Intent::Help
    } else {
        Intent::Greeting
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AvailableAssessment {
    pub(crate) title: String,
    pub(crate) category: String,
    pub(crate) duration_minutes: i32,
    pub(crate) difficulty: DifficultyLevel,
}

#[derive(Debug, Clone)]
pub(crate) struct ResultSummary {
    pub(crate) assessment_title: String,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) time_taken: i32,
    pub(crate) pass_percentage: i32,
    pub(crate) submitted_at: PrimitiveDateTime,
}

impl ResultSummary {
    fn percentage(&self) -> f64 {
        percentage(self.score, self.total_questions)
    }

    fn passed(&self) -> bool {
        is_pass(self.percentage(), self.pass_percentage)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StudentProfile {
    pub(crate) full_name: String,
    pub(crate) email: String,
    pub(crate) joined_at: PrimitiveDateTime,
}

/// Scoped lookups the fallback may run. Every method is filtered by the
/// student id it is given.
#[async_trait]
pub(crate) trait StudentFacts: Send + Sync {
    async fn available_assessments(
        &self,
        student_id: &str,
        category: Option<&str>,
        limit: i64,
    ) -> Result<Vec<AvailableAssessment>, sqlx::Error>;

    async fn count_available(&self, student_id: &str) -> Result<i64, sqlx::Error>;

    async fn count_active(&self) -> Result<i64, sqlx::Error>;

    /// Newest first; `None` means every result.
    async fn results(
        &self,
        student_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ResultSummary>, sqlx::Error>;

    async fn profile(&self, student_id: &str) -> Result<Option<StudentProfile>, sqlx::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ChatAction {
    #[serde(rename = "type")]
    pub(crate) kind: &'static str,
    pub(crate) label: &'static str,
    pub(crate) url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct FallbackReply {
    pub(crate) message: String,
    pub(crate) query_type: &'static str,
    pub(crate) intent: &'static str,
    pub(crate) data: Value,
    pub(crate) actions: Vec<ChatAction>,
    pub(crate) follow_up_questions: Vec<String>,
}

/// Renders limited-mode replies. `portal_url` prefixes action links.
pub(crate) struct FallbackResponder<'a, F: StudentFacts + ?Sized> {
    facts: &'a F,
    portal_url: &'a str,
}

impl<'a, F: StudentFacts + ?Sized> FallbackResponder<'a, F> {
    pub(crate) fn new(facts: &'a F, portal_url: &'a str) -> Self {
        Self { facts, portal_url }
    }

    pub(crate) async fn respond(&self, auth: &AuthContext, message: &str) -> FallbackReply {
        let intent = classify(message);
        tracing::info!(student_id = %auth.actor_id, intent = intent.name(), "Limited-mode chat");

        if let Intent::OffTopic { topic } = &intent {
            return self.off_topic(topic);
        }

        let (text, data) = match self.answer(&intent, &auth.actor_id).await {
            Ok(rendered) => rendered,
            Err(err) => {
                tracing::error!(
                    student_id = %auth.actor_id,
                    intent = intent.name(),
                    error = %err,
                    "Limited-mode lookup failed"
                );
                (
                    format!(
                        "{HEADER}:\n\nI'm currently in limited mode and having trouble accessing \
                         the database. Please try using the portal navigation to access your \
                         assessments and results."
                    ),
                    json!({}),
                )
            }
        };

        FallbackReply {
            message: text,
            query_type: "database_fallback",
            intent: intent.name(),
            data,
            actions: vec![self.assessments_link(), self.history_link()],
            follow_up_questions: strings(&[
                "Show available assessments",
                "Show my statistics",
                "What's my highest?",
                "Show technical",
                "What's my recent activity?",
            ]),
        }
    }

    fn assessments_link(&self) -> ChatAction {
        ChatAction {
            kind: "link",
            label: "View Assessments",
            url: format!("{}/student/assessments", self.portal_url),
        }
    }

    fn history_link(&self) -> ChatAction {
        ChatAction {
            kind: "link",
            label: "View History",
            url: format!("{}/student/history", self.portal_url),
        }
    }

    fn off_topic(&self, topic: &str) -> FallbackReply {
        let message = format!(
            "Hmm, {topic} sounds interesting! But let's stay focused on your studies.\n\n\
             I'm your study assistant and can help you with:\n\n\
             - Available assessments\n\
             - Your test results\n\
             - Performance statistics\n\
             - Study progress tracking\n\n\
             Try asking:\n\
             - 'Show available assessments'\n\
             - 'What are my results?'\n\
             - 'How am I doing?'"
        );

        FallbackReply {
            message,
            query_type: "off_topic",
            intent: "off_topic",
            data: json!({}),
            actions: vec![self.assessments_link()],
            follow_up_questions: strings(&[
                "Show available assessments",
                "What are my results?",
                "How am I doing?",
                "Show my statistics",
                "What should I study next?",
            ]),
        }
    }

    async fn answer(&self, intent: &Intent, student_id: &str) -> Result<(String, Value), sqlx::Error> {
        let facts = self.facts;
        match intent {
            Intent::OffTopic { .. } => Ok((String::new(), json!({}))),
            Intent::AvailableAssessments => {
                let list = facts.available_assessments(student_id, None, AVAILABLE_LIMIT).await?;
                Ok((render_available(&list), json!({ "count": list.len() })))
            }
            Intent::Results => {
                let results = facts.results(student_id, Some(RECENT_LIMIT)).await?;
                Ok((render_results(&results), json!({ "count": results.len() })))
            }
            Intent::Statistics => {
                let results = facts.results(student_id, None).await?;
                let available = facts.count_active().await?;
                Ok(render_statistics(&results, available))
            }
            Intent::Category(category) => {
                let list =
                    facts.available_assessments(student_id, Some(*category), AVAILABLE_LIMIT).await?;
                Ok((
                    render_category(category, &list),
                    json!({ "category": category, "count": list.len() }),
                ))
            }
            Intent::RecentActivity => {
                let latest = facts.results(student_id, Some(1)).await?;
                Ok((render_recent(latest.first()), json!({})))
            }
            Intent::BestScore => {
                let results = facts.results(student_id, None).await?;
                Ok((render_best(&results), json!({})))
            }
            Intent::ImprovementArea => {
                let results = facts.results(student_id, None).await?;
                Ok((render_worst(&results), json!({})))
            }
            Intent::Profile => {
                let profile = facts.profile(student_id).await?;
                let completed = facts.results(student_id, None).await?.len();
                Ok((render_profile(profile.as_ref(), completed), json!({})))
            }
            Intent::Help => Ok((render_help(), json!({}))),
            Intent::Greeting => {
                let profile = facts.profile(student_id).await?;
                let available = facts.count_available(student_id).await?;
                let completed = facts.results(student_id, None).await?.len();
                let name = profile.map(|p| p.full_name).unwrap_or_else(|| "there".to_string());
                Ok((
                    render_greeting(&name, available, completed),
                    json!({ "available": available, "completed": completed }),
                ))
            }
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn verdict(result: &ResultSummary) -> &'static str {
    if result.passed() {
        "Pass"
    } else {
        "Fail"
    }
}

fn render_available(list: &[AvailableAssessment]) -> String {
    if list.is_empty() {
        return format!(
            "{HEADER}:\n\nNo assessments are currently available. Please check back later!"
        );
    }

    let mut text = format!(
        "{HEADER} - Database Query Results:\n\nYou have {} assessment(s) available:\n\n",
        list.len()
    );
    for item in list {
        text.push_str(&format!(
            "{}\n   Category: {} | Duration: {} min | {}\n\n",
            item.title,
            item.category,
            item.duration_minutes,
            item.difficulty.as_str()
        ));
    }
    text.push_str("Click 'View Assessments' to start!");
    text
}

fn render_results(results: &[ResultSummary]) -> String {
    if results.is_empty() {
        return format!(
            "{HEADER}:\n\nYou haven't completed any assessments yet. Take an assessment to see \
             your results!"
        );
    }

    let mut text = format!("{HEADER} - Your Recent Results:\n\n");
    let mut score_sum = 0;
    let mut question_sum = 0;
    for result in results {
        text.push_str(&format!(
            "{}\n   Score: {}/{} ({}%) {}\n   Date: {}\n\n",
            result.assessment_title,
            result.score,
            result.total_questions,
            result.percentage(),
            verdict(result),
            format_short_date(result.submitted_at)
        ));
        score_sum += result.score;
        question_sum += result.total_questions;
    }
    text.push_str(&format!("Overall Average: {}%", percentage(score_sum, question_sum)));
    text
}

fn render_statistics(results: &[ResultSummary], available: i64) -> (String, Value) {
    let completed = results.len();
    let passed = results.iter().filter(|result| result.passed()).count();
    let failed = completed - passed;
    let average = percentage(
        results.iter().map(|result| result.score).sum(),
        results.iter().map(|result| result.total_questions).sum(),
    );
    let pass_rate =
        if completed == 0 { 0.0 } else { round2(passed as f64 / completed as f64 * 100.0) };

    let encouragement = if average >= 80.0 {
        "Excellent performance! Keep it up!"
    } else if average >= 60.0 {
        "Good work! You're on the right track!"
    } else {
        "Keep practicing! You can improve!"
    };

    let text = format!(
        "{HEADER} - Your Statistics:\n\n\
         Tests Completed: {completed}\n\
         Tests Available: {available}\n\
         Passed: {passed}\n\
         Failed: {failed}\n\
         Average Score: {average}%\n\
         Pass Rate: {pass_rate}%\n\n\
         {encouragement}"
    );
    let data = json!({
        "completed": completed,
        "available": available,
        "passed": passed,
        "failed": failed,
        "average_percentage": average,
        "pass_rate": pass_rate,
    });
    (text, data)
}

fn render_category(category: &str, list: &[AvailableAssessment]) -> String {
    if list.is_empty() {
        return format!("{HEADER}:\n\nNo {category} assessments are currently available.");
    }

    let mut text = format!(
        "{HEADER} - {category} Assessments:\n\nFound {} {category} assessment(s):\n\n",
        list.len()
    );
    for item in list {
        text.push_str(&format!(
            "{} ({} min, {})\n",
            item.title,
            item.duration_minutes,
            item.difficulty.as_str()
        ));
    }
    text
}

fn render_recent(latest: Option<&ResultSummary>) -> String {
    let Some(result) = latest else {
        return format!(
            "{HEADER}:\n\nNo recent activity found. Start an assessment to track your progress!"
        );
    };

    format!(
        "{HEADER} - Your Latest Activity:\n\n\
         Assessment: {}\n\
         Score: {}/{} ({}%)\n\
         Status: {}\n\
         Date: {}\n\
         Time Taken: {} minutes\n",
        result.assessment_title,
        result.score,
        result.total_questions,
        result.percentage(),
        if result.passed() { "Passed" } else { "Failed" },
        format_short_date(result.submitted_at),
        round2(f64::from(result.time_taken) / 60.0)
    )
}

fn by_percentage(a: &&ResultSummary, b: &&ResultSummary) -> std::cmp::Ordering {
    a.percentage().total_cmp(&b.percentage())
}

fn render_best(results: &[ResultSummary]) -> String {
    let Some(best) = results.iter().max_by(by_percentage) else {
        return format!("{HEADER}:\n\nNo results yet. Take an assessment to set your best score!");
    };

    format!(
        "{HEADER} - Your Best Performance:\n\n\
         Assessment: {}\n\
         Score: {}/{} ({}%)\n\
         Date: {}\n\n\
         Great job! Keep up the excellent work!",
        best.assessment_title,
        best.score,
        best.total_questions,
        best.percentage(),
        format_short_date(best.submitted_at)
    )
}

fn render_worst(results: &[ResultSummary]) -> String {
    let Some(worst) = results.iter().min_by(by_percentage) else {
        return format!(
            "{HEADER}:\n\nNo results yet. Take assessments to identify areas for improvement!"
        );
    };

    format!(
        "{HEADER} - Area for Improvement:\n\n\
         Assessment: {}\n\
         Score: {}/{} ({}%)\n\
         Date: {}\n\n\
         Focus on this area to improve your overall performance!",
        worst.assessment_title,
        worst.score,
        worst.total_questions,
        worst.percentage(),
        format_short_date(worst.submitted_at)
    )
}

fn render_profile(profile: Option<&StudentProfile>, completed: usize) -> String {
    let (name, email, joined) = match profile {
        Some(profile) => (
            profile.full_name.as_str(),
            profile.email.as_str(),
            format_short_date(profile.joined_at),
        ),
        None => ("Unknown", "Unknown", "Unknown".to_string()),
    };

    format!(
        "{HEADER} - Your Profile:\n\n\
         Name: {name}\n\
         Email: {email}\n\
         Role: Student\n\
         Joined: {joined}\n\
         Tests Completed: {completed}\n"
    )
}

fn render_help() -> String {
    format!(
        "{HEADER} - I can help you with:\n\n\
         Assessments:\n\
         \x20  - 'Show available assessments'\n\
         \x20  - 'Show technical'\n\
         \x20  - 'Show aptitude'\n\n\
         Results:\n\
         \x20  - 'Show my results'\n\
         \x20  - 'What's my highest?'\n\
         \x20  - 'Show my statistics'\n\n\
         Progress:\n\
         \x20  - 'How am I doing?'\n\
         \x20  - 'Show my progress'\n\
         \x20  - 'What's my recent activity?'\n\n\
         What would you like to know?"
    )
}

fn render_greeting(name: &str, available: i64, completed: usize) -> String {
    format!(
        "{HEADER}\n\n\
         Hello {name}!\n\n\
         Quick Stats:\n\
         - {available} assessments available\n\
         - {completed} tests completed\n\n\
         I can help you with:\n\
         - Available assessments\n\
         - Your test results\n\
         - Performance statistics\n\
         - Study guidance\n\n\
         What would you like to know?"
    )
}

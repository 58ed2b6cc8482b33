//! Context Analyzer
//!
//! Pure transformation of (situational context, query text) into a feature
//! bag consumed by strategy selection and the learning hook. No state, no
//! side effects: identical inputs produce identical features, with the
//! reference instant passed in explicitly.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::memory::MemoryContext;

// ============================================================================
// KEYWORD SETS
// ============================================================================

const QUESTION_WORDS: [&str; 5] = ["how", "what", "where", "when", "why"];
const RETRIEVAL_WORDS: [&str; 4] = ["find", "search", "get", "show"];
const CREATION_WORDS: [&str; 4] = ["create", "make", "build", "generate"];

const PROGRAMMING_WORDS: [&str; 5] = ["code", "function", "class", "method", "programming"];
const COMMUNICATION_WORDS: [&str; 4] = ["meeting", "call", "discussion", "decision"];
const PLANNING_WORDS: [&str; 4] = ["task", "todo", "project", "deadline"];

const TECHNICAL_TERMS: [&str; 20] = [
    "api",
    "function",
    "class",
    "method",
    "variable",
    "database",
    "server",
    "client",
    "request",
    "response",
    "endpoint",
    "authentication",
    "authorization",
    "algorithm",
    "data",
    "model",
    "pipeline",
    "configuration",
    "deployment",
    "cache",
];

const URGENT_WORDS: [&str; 6] = ["urgent", "asap", "immediately", "quick", "fast", "emergency"];
const NEGATIVE_WORDS: [&str; 6] = ["bad", "terrible", "awful", "worst", "horrible", "broken"];
const POSITIVE_WORDS: [&str; 6] = ["good", "great", "excellent", "best", "awesome", "perfect"];

// ============================================================================
// FEATURE TYPES
// ============================================================================

/// Coarse classification of what the query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// Interrogative phrasing
    Question,
    /// Explicit lookup verbs
    Retrieval,
    /// Construction verbs
    Creation,
    /// Anything else
    #[default]
    General,
}

/// Coarse domain classification of the query text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryDomain {
    /// Code and software terms
    Programming,
    /// Meetings, calls, decisions
    Communication,
    /// Tasks and deadlines
    Planning,
    /// Anything else
    #[default]
    General,
}

/// Sentiment label, checked in priority order urgent > negative > positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    /// Urgency keywords present
    Urgent,
    /// Negative keywords present
    Negative,
    /// Positive keywords present
    Positive,
    /// No sentiment keywords
    #[default]
    Neutral,
}

/// Discretized time-of-day label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    /// 06:00 - 11:59
    Morning,
    /// 12:00 - 16:59
    Afternoon,
    /// 17:00 - 20:59
    Evening,
    /// 21:00 - 05:59
    Night,
}

impl TimeOfDay {
    /// Label for a given hour of day
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }
}

/// Temporal features of the reference instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalFeatures {
    /// Hour of day (0-23)
    pub hour: u32,
    /// Day of week (0 = Monday)
    pub weekday: u32,
    /// Saturday or Sunday
    pub is_weekend: bool,
    /// 09:00 - 17:59
    pub is_business_hours: bool,
    /// Discretized label
    pub time_of_day: TimeOfDay,
}

/// Semantic features of the query text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFeatures {
    /// What the query asks for
    pub kind: QueryKind,
    /// Coarse domain
    pub domain: QueryDomain,
    /// Number of whitespace-separated words
    pub word_count: usize,
    /// Contains technical vocabulary
    pub has_technical_terms: bool,
    /// Sentiment label
    pub sentiment: Sentiment,
}

/// Full feature bag produced by [`analyze`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextFeatures {
    /// Features of the reference instant
    pub temporal: TemporalFeatures,
    /// Features of the query text
    pub query: QueryFeatures,
    /// Context has a project
    pub has_project: bool,
    /// Context has a user
    pub has_user: bool,
    /// Context has a session
    pub has_session: bool,
    /// Context has an environment
    pub has_environment: bool,
    /// Context metadata suggests collaborative work
    pub is_collaborative: bool,
}

// ============================================================================
// ANALYSIS
// ============================================================================

/// Analyze a context and query text as of the given instant
pub fn analyze(
    context: &MemoryContext,
    query_text: &str,
    now: DateTime<Utc>,
) -> ContextFeatures {
    ContextFeatures {
        temporal: temporal_features(now),
        query: query_features(query_text),
        has_project: context.project.is_some(),
        has_user: context.user.is_some(),
        has_session: context.session.is_some(),
        has_environment: context.environment.is_some(),
        is_collaborative: context.is_collaborative(),
    }
}

fn temporal_features(now: DateTime<Utc>) -> TemporalFeatures {
    let hour = now.hour();
    let weekday = now.weekday();

    TemporalFeatures {
        hour,
        weekday: weekday.num_days_from_monday(),
        is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
        is_business_hours: (9..=17).contains(&hour),
        time_of_day: TimeOfDay::from_hour(hour),
    }
}

fn query_features(query_text: &str) -> QueryFeatures {
    let lowered = query_text.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    QueryFeatures {
        kind: classify_kind(&words),
        domain: classify_domain(&words),
        word_count: words.len(),
        has_technical_terms: words.iter().any(|w| TECHNICAL_TERMS.contains(w)),
        sentiment: classify_sentiment(&words),
    }
}

fn classify_kind(words: &[&str]) -> QueryKind {
    if words.iter().any(|w| QUESTION_WORDS.contains(w)) {
        QueryKind::Question
    } else if words.iter().any(|w| RETRIEVAL_WORDS.contains(w)) {
        QueryKind::Retrieval
    } else if words.iter().any(|w| CREATION_WORDS.contains(w)) {
        QueryKind::Creation
    } else {
        QueryKind::General
    }
}

fn classify_domain(words: &[&str]) -> QueryDomain {
    if words.iter().any(|w| PROGRAMMING_WORDS.contains(w)) {
        QueryDomain::Programming
    } else if words.iter().any(|w| COMMUNICATION_WORDS.contains(w)) {
        QueryDomain::Communication
    } else if words.iter().any(|w| PLANNING_WORDS.contains(w)) {
        QueryDomain::Planning
    } else {
        QueryDomain::General
    }
}

fn classify_sentiment(words: &[&str]) -> Sentiment {
    if words.iter().any(|w| URGENT_WORDS.contains(w)) {
        Sentiment::Urgent
    } else if words.iter().any(|w| NEGATIVE_WORDS.contains(w)) {
        Sentiment::Negative
    } else if words.iter().any(|w| POSITIVE_WORDS.contains(w)) {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        // 2026-03-04 is a Wednesday
        Utc.with_ymd_and_hms(2026, 3, 4, hour, 30, 0).unwrap()
    }

    #[test]
    fn test_deterministic() {
        let context = MemoryContext::for_project_user("atlas", "alice");
        let a = analyze(&context, "how does the cache work", at(10));
        let b = analyze(&context, "how does the cache work", at(10));
        assert_eq!(a, b);
    }

    #[test]
    fn test_temporal_features() {
        let features = temporal_features(at(10));
        assert_eq!(features.hour, 10);
        assert_eq!(features.weekday, 2);
        assert!(!features.is_weekend);
        assert!(features.is_business_hours);
        assert_eq!(features.time_of_day, TimeOfDay::Morning);

        let night = temporal_features(at(23));
        assert!(!night.is_business_hours);
        assert_eq!(night.time_of_day, TimeOfDay::Night);
    }

    #[test]
    fn test_weekend_detection() {
        // 2026-03-07 is a Saturday
        let saturday = Utc.with_ymd_and_hms(2026, 3, 7, 10, 0, 0).unwrap();
        assert!(temporal_features(saturday).is_weekend);
    }

    #[test]
    fn test_query_kind_classification() {
        assert_eq!(query_features("how does this work").kind, QueryKind::Question);
        assert_eq!(query_features("find the deploy notes").kind, QueryKind::Retrieval);
        assert_eq!(query_features("create a summary").kind, QueryKind::Creation);
        assert_eq!(query_features("fibonacci numbers").kind, QueryKind::General);
    }

    #[test]
    fn test_question_beats_retrieval() {
        // Both keyword sets present: question wins by priority order
        let features = query_features("how to find the config");
        assert_eq!(features.kind, QueryKind::Question);
    }

    #[test]
    fn test_domain_classification() {
        assert_eq!(
            query_features("refactor this function").domain,
            QueryDomain::Programming
        );
        assert_eq!(
            query_features("notes from the meeting").domain,
            QueryDomain::Communication
        );
        assert_eq!(
            query_features("deadline for the release").domain,
            QueryDomain::Planning
        );
        assert_eq!(query_features("lunch options").domain, QueryDomain::General);
    }

    #[test]
    fn test_sentiment_priority_order() {
        assert_eq!(
            query_features("urgent broken deploy").sentiment,
            Sentiment::Urgent
        );
        assert_eq!(
            query_features("broken but great test").sentiment,
            Sentiment::Negative
        );
        assert_eq!(query_features("great results").sentiment, Sentiment::Positive);
        assert_eq!(query_features("plain words").sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_technical_terms() {
        assert!(query_features("database migration plan").has_technical_terms);
        assert!(!query_features("grocery list").has_technical_terms);
    }

    #[test]
    fn test_presence_flags() {
        let mut context = MemoryContext::for_project_user("atlas", "alice");
        context
            .metadata
            .insert("shared".to_string(), serde_json::json!(true));

        let features = analyze(&context, "q", at(10));
        assert!(features.has_project);
        assert!(features.has_user);
        assert!(!features.has_session);
        assert!(features.is_collaborative);
    }
}

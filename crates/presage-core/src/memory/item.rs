//! Memory Item - The fundamental unit of storage
//!
//! Each item carries content, a deterministic content fingerprint, situational
//! context, tags, importance/confidence scores, access tracking, an optional
//! embedding vector, and relationship links to other items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// MEMORY TYPES
// ============================================================================

/// Types of memory content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    /// Free-form text
    #[default]
    Text,
    /// Code or technical snippet
    Code,
    /// Conversation or meeting transcript
    Conversation,
    /// A document or article
    Document,
    /// A task or todo
    Task,
    /// A reference to an external resource
    Reference,
    /// User insight or reflection
    Insight,
    /// A recurring pattern worth remembering
    Pattern,
}

impl MemoryType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Text => "text",
            MemoryType::Code => "code",
            MemoryType::Conversation => "conversation",
            MemoryType::Document => "document",
            MemoryType::Task => "task",
            MemoryType::Reference => "reference",
            MemoryType::Insight => "insight",
            MemoryType::Pattern => "pattern",
        }
    }

    /// Parse from string name, defaulting to `Text`
    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "code" => MemoryType::Code,
            "conversation" => MemoryType::Conversation,
            "document" => MemoryType::Document,
            "task" => MemoryType::Task,
            "reference" => MemoryType::Reference,
            "insight" => MemoryType::Insight,
            "pattern" => MemoryType::Pattern,
            _ => MemoryType::Text,
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// ACCESS LEVELS
// ============================================================================

/// Access levels controlling item visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Visible to everyone
    #[default]
    Public,
    /// Visible to the owning user only
    Private,
    /// Visible to an explicit share group
    Shared,
    /// Retained but excluded from normal retrieval surfaces
    Archived,
}

impl AccessLevel {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Private => "private",
            AccessLevel::Shared => "shared",
            AccessLevel::Archived => "archived",
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// CONTEXT
// ============================================================================

/// Situational metadata attached to stored items and incoming queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryContext {
    /// Project the item/query belongs to
    pub project: Option<String>,
    /// Session identifier
    pub session: Option<String>,
    /// User identifier
    pub user: Option<String>,
    /// Application name
    pub application: Option<String>,
    /// Deployment environment (dev, staging, prod, ...)
    pub environment: Option<String>,
    /// Free-form location
    pub location: Option<String>,
    /// When this context was captured
    pub timestamp: DateTime<Utc>,
    /// Open metadata map
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Default for MemoryContext {
    fn default() -> Self {
        Self::at(Utc::now())
    }
}

impl MemoryContext {
    /// Create an empty context captured at the given time
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            project: None,
            session: None,
            user: None,
            application: None,
            environment: None,
            location: None,
            timestamp,
            metadata: HashMap::new(),
        }
    }

    /// Create a context with project and user set
    pub fn for_project_user(
        project: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            project: Some(project.into()),
            user: Some(user.into()),
            ..Self::default()
        }
    }

    /// Stable key identifying this context for association tables
    ///
    /// Joins the present fields as `project:X|user:Y|app:Z|env:W`, or
    /// `"default"` when none are set.
    pub fn context_key(&self) -> String {
        let mut parts = Vec::new();

        if let Some(project) = &self.project {
            parts.push(format!("project:{project}"));
        }
        if let Some(user) = &self.user {
            parts.push(format!("user:{user}"));
        }
        if let Some(application) = &self.application {
            parts.push(format!("app:{application}"));
        }
        if let Some(environment) = &self.environment {
            parts.push(format!("env:{environment}"));
        }

        if parts.is_empty() {
            "default".to_string()
        } else {
            parts.join("|")
        }
    }

    /// Whether the metadata suggests collaborative work
    pub fn is_collaborative(&self) -> bool {
        const COLLAB_KEYS: [&str; 3] = ["team", "shared", "collaboration"];
        COLLAB_KEYS.iter().any(|k| self.metadata.contains_key(*k))
    }
}

// ============================================================================
// CONTENT FINGERPRINT
// ============================================================================

/// Deterministic fingerprint of item content (SHA-256, hex-encoded)
///
/// Used for deduplication during diversity filtering. Must be recomputed
/// whenever content changes.
pub fn content_fingerprint(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

// ============================================================================
// MEMORY ITEM
// ============================================================================

/// A stored memory item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryItem {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Raw content
    pub content: String,
    /// Deterministic hash of the current content
    pub fingerprint: String,
    /// Type of memory content
    pub kind: MemoryType,
    /// Situational context captured at ingestion
    pub context: MemoryContext,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Importance score in [0, 1]
    pub importance: f64,
    /// Confidence score in [0, 1]
    pub confidence: f64,
    /// Visibility level
    pub access_level: AccessLevel,

    // ========== Temporal tracking ==========
    /// When the item was created
    pub created_at: DateTime<Utc>,
    /// When the item was last modified
    pub updated_at: DateTime<Utc>,
    /// When the item expires (None = never)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// When the item was last accessed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
    /// Number of accesses since creation
    pub access_count: u32,

    // ========== Embedding ==========
    /// Embedding vector produced by the embedding collaborator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Transient similarity score, set during candidate generation only
    #[serde(skip)]
    pub similarity: f64,

    // ========== Relationships ==========
    /// Ids of related items
    #[serde(default)]
    pub related: Vec<String>,
    /// Parent item id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Child item ids
    #[serde(default)]
    pub children: Vec<String>,
}

impl MemoryItem {
    /// Create a new item with a generated id and the current time
    pub fn new(content: impl Into<String>, kind: MemoryType) -> Self {
        Self::with_id_at(Uuid::new_v4().to_string(), content, kind, Utc::now())
    }

    /// Create an item with an explicit id and creation time
    ///
    /// The explicit form exists so tests and importers can construct items
    /// deterministically.
    pub fn with_id_at(
        id: impl Into<String>,
        content: impl Into<String>,
        kind: MemoryType,
        created_at: DateTime<Utc>,
    ) -> Self {
        let content = content.into();
        let fingerprint = content_fingerprint(&content);
        Self {
            id: id.into(),
            content,
            fingerprint,
            kind,
            context: MemoryContext::at(created_at),
            tags: Vec::new(),
            importance: 0.5,
            confidence: 1.0,
            access_level: AccessLevel::Public,
            created_at,
            updated_at: created_at,
            expires_at: None,
            last_accessed: None,
            access_count: 0,
            embedding: None,
            similarity: 0.0,
            related: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Builder-style context assignment
    pub fn with_context(mut self, context: MemoryContext) -> Self {
        self.context = context;
        self
    }

    /// Builder-style tag assignment
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style importance assignment (clamped to [0, 1])
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// Recompute the fingerprint from the current content
    pub fn refresh_fingerprint(&mut self) {
        self.fingerprint = content_fingerprint(&self.content);
    }

    /// Record an access at the given time
    pub fn mark_accessed(&mut self, now: DateTime<Utc>) {
        self.last_accessed = Some(now);
        self.access_count += 1;
    }

    /// Whether the item has expired as of `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| now > t).unwrap_or(false)
    }

    /// Age in hours as of `now`
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds() as f64 / 3600.0
    }

    /// Age in whole days as of `now`, at least 1
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days().max(1)
    }

    /// Hours since the last access, if any
    pub fn hours_since_access(&self, now: DateTime<Utc>) -> Option<f64> {
        self.last_accessed
            .map(|t| (now - t).num_seconds() as f64 / 3600.0)
    }

    /// Hours since the last update
    pub fn hours_since_update(&self, now: DateTime<Utc>) -> f64 {
        (now - self.updated_at).num_seconds() as f64 / 3600.0
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Scope kinds and their caching behavior
//!
//! A scope decides how long an instance lives before it is destroyed. Every
//! scope except `Dependent` is backed by exactly one instance store; dependent
//! instances are created fresh per use and never cached.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Declared scope of a bean definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScopeKind {
    /// One instance for the lifetime of the application
    Application,
    /// One instance per user session (passivating)
    Session,
    /// One instance per request
    Request,
    /// Fresh instance per use, never cached
    Dependent,
    /// One instance per long-running conversation (passivating)
    Conversation,
    /// Scope contributed by an extension, identified by name
    Custom(String),
}

/// Fieldless discriminant of [`ScopeKind`], used as a table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeTag {
    /// `ScopeKind::Application`
    Application,
    /// `ScopeKind::Session`
    Session,
    /// `ScopeKind::Request`
    Request,
    /// `ScopeKind::Dependent`
    Dependent,
    /// `ScopeKind::Conversation`
    Conversation,
    /// `ScopeKind::Custom`
    Custom,
}

/// Whether instances of a scope are held in a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Instances are cached in the scope's store until it is destroyed
    Cached,
    /// Instances are created per use and never stored
    Transient,
}

/// Scope-to-behavior mapping: (tag, cache policy, passivating)
const SCOPE_TABLE: [(ScopeTag, CachePolicy, bool); 6] = [
    (ScopeTag::Application, CachePolicy::Cached, false),
    (ScopeTag::Session, CachePolicy::Cached, true),
    (ScopeTag::Request, CachePolicy::Cached, false),
    (ScopeTag::Dependent, CachePolicy::Transient, false),
    (ScopeTag::Conversation, CachePolicy::Cached, true),
    (ScopeTag::Custom, CachePolicy::Cached, false),
];

impl ScopeKind {
    /// Get the fieldless tag of this scope
    pub fn tag(&self) -> ScopeTag {
        match self {
            ScopeKind::Application => ScopeTag::Application,
            ScopeKind::Session => ScopeTag::Session,
            ScopeKind::Request => ScopeTag::Request,
            ScopeKind::Dependent => ScopeTag::Dependent,
            ScopeKind::Conversation => ScopeTag::Conversation,
            ScopeKind::Custom(_) => ScopeTag::Custom,
        }
    }

    fn row(&self) -> (ScopeTag, CachePolicy, bool) {
        let tag = self.tag();
        SCOPE_TABLE
            .iter()
            .copied()
            .find(|(t, _, _)| *t == tag)
            .unwrap_or((tag, CachePolicy::Cached, false))
    }

    /// How instances of this scope are cached
    pub fn cache_policy(&self) -> CachePolicy {
        self.row().1
    }

    /// Check if this is the dependent (never cached) scope
    pub fn is_dependent(&self) -> bool {
        self.cache_policy() == CachePolicy::Transient
    }

    /// Check if instances of this scope may be passivated (serialized)
    pub fn is_passivating(&self) -> bool {
        self.row().2
    }

    /// Lower-case name used in configuration and diagnostics
    pub fn name(&self) -> String {
        match self {
            ScopeKind::Application => "application".to_string(),
            ScopeKind::Session => "session".to_string(),
            ScopeKind::Request => "request".to_string(),
            ScopeKind::Dependent => "dependent".to_string(),
            ScopeKind::Conversation => "conversation".to_string(),
            ScopeKind::Custom(name) => format!("custom:{}", name),
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Error parsing a scope name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown scope '{0}' (expected application, session, request, dependent, conversation or custom:<name>)")]
pub struct ScopeParseError(pub String);

impl FromStr for ScopeKind {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let prefix = "custom:";
        let custom = trimmed
            .get(..prefix.len())
            .filter(|head| head.eq_ignore_ascii_case(prefix))
            .map(|_| &trimmed[prefix.len()..]);
        if let Some(name) = custom {
            if name.is_empty() {
                return Err(ScopeParseError(s.to_string()));
            }
            return Ok(ScopeKind::Custom(name.to_string()));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "application" => Ok(ScopeKind::Application),
            "session" => Ok(ScopeKind::Session),
            "request" => Ok(ScopeKind::Request),
            "dependent" => Ok(ScopeKind::Dependent),
            "conversation" => Ok(ScopeKind::Conversation),
            _ => Err(ScopeParseError(s.to_string())),
        }
    }
}

impl TryFrom<String> for ScopeKind {
    type Error = ScopeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScopeKind> for String {
    fn from(scope: ScopeKind) -> Self {
        scope.name()
    }
}

//! Analysed repository domain model

use crate::error::{CoreError, Result};
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a tracked repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryId(Uuid);

impl RepositoryId {
    /// Creates a new random RepositoryId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a RepositoryId from a UUID string
    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s).map(Self).map_err(|e| CoreError::InvalidId {
            value: s.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn as_string(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RepositoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A GitHub repository tracked for pattern analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub owner: String,
    pub name: String,
    pub default_branch: Option<String>,
    pub primary_language: Option<String>,
    pub description: Option<String>,
    pub stars: u32,
    pub added_date: Timestamp,
    pub analyzed_at: Option<Timestamp>,
}

impl Repository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: RepositoryId::new(),
            owner: owner.into(),
            name: name.into(),
            default_branch: None,
            primary_language: None,
            description: None,
            stars: 0,
            added_date: Timestamp::now(),
            analyzed_at: None,
        }
    }

    /// Parses `owner/name`, ignoring surrounding whitespace
    pub fn parse_full_name(full_name: &str) -> Result<Self> {
        let trimmed = full_name.trim();
        match trimmed.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(CoreError::InvalidRepositoryName(full_name.to_string())),
        }
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn mark_analyzed(&mut self) {
        self.analyzed_at = Some(Timestamp::now());
    }
}

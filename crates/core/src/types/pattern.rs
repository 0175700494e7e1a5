//! Code pattern domain model
//!
//! A pattern is one occurrence of a recognisable construct in a source file.
//! Occurrences that share a [`CodePattern::pattern_hash`] are the same
//! pattern and are stored once per repository with a usage count.

use crate::error::{CoreError, Result};
use crate::types::Validator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Broad grouping for a code pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternCategory {
    Performance,
    TypeSafety,
    Architecture,
    ErrorHandling,
    AsyncPatterns,
    ReactPatterns,
    FileOperations,
    CodeQuality,
}

impl PatternCategory {
    pub const ALL: [PatternCategory; 8] = [
        Self::Performance,
        Self::TypeSafety,
        Self::Architecture,
        Self::ErrorHandling,
        Self::AsyncPatterns,
        Self::ReactPatterns,
        Self::FileOperations,
        Self::CodeQuality,
    ];

    /// Stored and hashed form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::TypeSafety => "type-safety",
            Self::Architecture => "architecture",
            Self::ErrorHandling => "error-handling",
            Self::AsyncPatterns => "async-patterns",
            Self::ReactPatterns => "react-patterns",
            Self::FileOperations => "file-operations",
            Self::CodeQuality => "code-quality",
        }
    }
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::UnknownCategory(s.to_string()))
    }
}

/// How strongly a pattern should weigh in recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PatternSeverity {
    /// Confidence score attached to patterns of this severity
    pub fn score(&self) -> f64 {
        match self {
            Self::Low => 0.3,
            Self::Medium => 0.6,
            Self::High => 0.9,
            Self::Critical => 1.0,
        }
    }
}

/// One discovered occurrence of a code pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodePattern {
    pub pattern_type: String,
    pub pattern_content: String,
    pub description: String,
    pub category: PatternCategory,
    pub subcategory: Option<String>,
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub language: String,
    pub framework: Option<String>,
    pub confidence_score: f64,
    pub context_before: String,
    pub context_after: String,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl CodePattern {
    /// Creates a pattern occurrence spanning a single line
    pub fn new(
        pattern_type: impl Into<String>,
        pattern_content: impl Into<String>,
        category: PatternCategory,
        file_path: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            pattern_type: pattern_type.into(),
            pattern_content: pattern_content.into(),
            description: String::new(),
            category,
            subcategory: None,
            file_path: file_path.into(),
            line_start: line,
            line_end: line,
            language: String::new(),
            framework: None,
            confidence_score: PatternSeverity::Low.score(),
            context_before: String::new(),
            context_after: String::new(),
            tags: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_severity(mut self, severity: PatternSeverity) -> Self {
        self.confidence_score = severity.score();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Stable identity of the pattern, independent of where it was found
    ///
    /// Hex md5 of `type:content:category`.
    pub fn pattern_hash(&self) -> String {
        let key = format!(
            "{}:{}:{}",
            self.pattern_type,
            self.pattern_content,
            self.category.as_str()
        );
        format!("{:x}", md5::compute(key.as_bytes()))
    }

    /// Validates and converts problems into a [`CoreError`]
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate().map_err(CoreError::InvalidPattern)
    }
}

impl Validator for CodePattern {
    fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.pattern_type.trim().is_empty() {
            errors.push("pattern_type must not be empty".to_string());
        }
        if self.file_path.trim().is_empty() {
            errors.push("file_path must not be empty".to_string());
        }
        if self.line_end < self.line_start {
            errors.push(format!(
                "line_end ({}) is before line_start ({})",
                self.line_end, self.line_start
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            errors.push(format!(
                "confidence_score {} is outside 0..=1",
                self.confidence_score
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

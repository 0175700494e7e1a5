//! Code pattern database operations
//!
//! Patterns are stored once per repository and pattern hash. Saving a scan
//! replaces every pattern the repository had before, in one transaction.

use crate::connection::DbPool;
use crate::datastore::SqliteStore;
use crate::error::DbResult;
use crate::transaction::{TransactionGuard, TransactionOutcome};
use repolens_core::{CodePattern, PatternCategory, RepositoryId, Timestamp};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// A pattern row as stored for one repository
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredPattern {
    pub id: String,
    pub repository_id: RepositoryId,
    pub pattern_hash: String,
    pub usage_count: u32,
    pub pattern: CodePattern,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl StoredPattern {
    /// Number of distinct files the pattern was found in
    pub fn file_count(&self) -> u64 {
        self.pattern
            .metadata
            .get("file_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(1)
    }
}

struct PatternGroup<'a> {
    first: &'a CodePattern,
    count: u32,
    files: BTreeSet<&'a str>,
}

/// Groups occurrences by pattern hash, keeping the first occurrence of each
fn group_by_hash(patterns: &[CodePattern]) -> BTreeMap<String, PatternGroup<'_>> {
    let mut groups: BTreeMap<String, PatternGroup<'_>> = BTreeMap::new();
    for pattern in patterns {
        let group = groups
            .entry(pattern.pattern_hash())
            .or_insert_with(|| PatternGroup {
                first: pattern,
                count: 0,
                files: BTreeSet::new(),
            });
        group.count += 1;
        group.files.insert(pattern.file_path.as_str());
    }
    groups
}

/// Replaces all patterns for a repository using an open connection
///
/// Returns the number of distinct patterns written. Must run inside a
/// transaction for the delete and inserts to apply together.
pub async fn replace_patterns(
    conn: &mut SqliteConnection,
    repository_id: RepositoryId,
    patterns: &[CodePattern],
) -> DbResult<usize> {
    sqlx::query("DELETE FROM repository_patterns WHERE repository_id = ?")
        .bind(repository_id.as_string())
        .execute(&mut *conn)
        .await?;

    let groups = group_by_hash(patterns);
    let now = Timestamp::now().as_millis();

    for (hash, group) in &groups {
        let pattern = group.first;

        let mut metadata = pattern.metadata.clone();
        metadata.insert("file_count".to_string(), group.files.len().into());
        metadata.insert(
            "files".to_string(),
            serde_json::to_value(&group.files)?,
        );

        sqlx::query(
            r#"
            INSERT INTO repository_patterns (
                id, repository_id, pattern_type, pattern_content, pattern_hash,
                description, category, subcategory, tags, file_path, line_start,
                line_end, language, framework, confidence_score, usage_count,
                context_before, context_after, metadata, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(repository_id.as_string())
        .bind(&pattern.pattern_type)
        .bind(&pattern.pattern_content)
        .bind(hash)
        .bind(&pattern.description)
        .bind(pattern.category.as_str())
        .bind(&pattern.subcategory)
        .bind(serde_json::to_string(&pattern.tags)?)
        .bind(&pattern.file_path)
        .bind(pattern.line_start as i64)
        .bind(pattern.line_end as i64)
        .bind(&pattern.language)
        .bind(&pattern.framework)
        .bind(pattern.confidence_score)
        .bind(group.count as i64)
        .bind(&pattern.context_before)
        .bind(&pattern.context_after)
        .bind(serde_json::to_string(&metadata)?)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    Ok(groups.len())
}

/// Atomically replaces a repository's patterns with a new scan
///
/// On failure the previous patterns are left untouched. An empty scan
/// writes nothing and keeps the stored patterns.
pub async fn save_patterns(
    guard: &TransactionGuard<SqliteStore>,
    repository_id: RepositoryId,
    patterns: Vec<CodePattern>,
) -> TransactionOutcome<usize> {
    if patterns.is_empty() {
        log::warn!("No patterns to save for repository {}", repository_id);
        return TransactionOutcome::Committed(0);
    }

    let outcome = guard
        .with_transaction(move |tx| {
            Box::pin(async move { replace_patterns(&mut **tx, repository_id, &patterns).await })
        })
        .await;

    match &outcome {
        TransactionOutcome::Committed(count) => {
            log::info!(
                "Saved {} unique patterns for repository {}",
                count,
                repository_id
            );
        }
        TransactionOutcome::Failed { error, .. } => {
            log::error!(
                "Failed to save patterns for repository {}: {}",
                repository_id,
                error
            );
        }
    }

    outcome
}

/// Lists a repository's patterns, most used first
pub async fn list_patterns(
    pool: &DbPool,
    repository_id: RepositoryId,
) -> DbResult<Vec<StoredPattern>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM repository_patterns
        WHERE repository_id = ?
        ORDER BY usage_count DESC, pattern_type
        "#,
    )
    .bind(repository_id.as_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_pattern).collect()
}

/// Lists a repository's patterns in one category
pub async fn list_patterns_by_category(
    pool: &DbPool,
    repository_id: RepositoryId,
    category: PatternCategory,
) -> DbResult<Vec<StoredPattern>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM repository_patterns
        WHERE repository_id = ? AND category = ?
        ORDER BY usage_count DESC, pattern_type
        "#,
    )
    .bind(repository_id.as_string())
    .bind(category.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_pattern).collect()
}

/// Number of distinct patterns stored for a repository
pub async fn count_patterns(pool: &DbPool, repository_id: RepositoryId) -> DbResult<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM repository_patterns WHERE repository_id = ?")
        .bind(repository_id.as_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn row_to_pattern(row: &SqliteRow) -> DbResult<StoredPattern> {
    let repository_id: String = row.try_get("repository_id")?;
    let category: String = row.try_get("category")?;
    let tags: String = row.try_get("tags")?;
    let metadata: String = row.try_get("metadata")?;
    let line_start: i64 = row.try_get("line_start")?;
    let line_end: i64 = row.try_get("line_end")?;
    let usage_count: i64 = row.try_get("usage_count")?;

    let pattern = CodePattern {
        pattern_type: row.try_get("pattern_type")?,
        pattern_content: row.try_get("pattern_content")?,
        description: row.try_get("description")?,
        category: category.parse()?,
        subcategory: row.try_get("subcategory")?,
        file_path: row.try_get("file_path")?,
        line_start: u32::try_from(line_start).unwrap_or(0),
        line_end: u32::try_from(line_end).unwrap_or(0),
        language: row.try_get("language")?,
        framework: row.try_get("framework")?,
        confidence_score: row.try_get("confidence_score")?,
        context_before: row.try_get("context_before")?,
        context_after: row.try_get("context_after")?,
        tags: serde_json::from_str(&tags)?,
        metadata: serde_json::from_str(&metadata)?,
    };

    Ok(StoredPattern {
        id: row.try_get("id")?,
        repository_id: RepositoryId::from_string(&repository_id)?,
        pattern_hash: row.try_get("pattern_hash")?,
        usage_count: u32::try_from(usage_count).unwrap_or(u32::MAX),
        pattern,
        created_at: Timestamp::from_millis(row.try_get("created_at")?),
        updated_at: Timestamp::from_millis(row.try_get("updated_at")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrence(pattern_type: &str, file: &str, line: u32) -> CodePattern {
        CodePattern::new(
            pattern_type,
            format!("{}(", pattern_type),
            PatternCategory::CodeQuality,
            file,
            line,
        )
    }

    #[test]
    fn test_group_by_hash_counts_usage_and_files() {
        let patterns = vec![
            occurrence("console-log", "a.ts", 1),
            occurrence("console-log", "a.ts", 9),
            occurrence("console-log", "b.ts", 3),
            occurrence("todo-comment", "a.ts", 4),
        ];

        let groups = group_by_hash(&patterns);
        assert_eq!(groups.len(), 2);

        let console = &groups[&patterns[0].pattern_hash()];
        assert_eq!(console.count, 3);
        assert_eq!(console.files.len(), 2);
        assert_eq!(console.first.line_start, 1);

        let todo = &groups[&patterns[3].pattern_hash()];
        assert_eq!(todo.count, 1);
    }

    #[test]
    fn test_group_by_hash_empty() {
        assert!(group_by_hash(&[]).is_empty());
    }
}

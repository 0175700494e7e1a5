//! Repository database operations

use crate::connection::DbPool;
use crate::error::{DbError, DbResult};
use repolens_core::{Repository, RepositoryId, Timestamp};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Inserts a repository, or refreshes its metadata if `owner/name` exists
///
/// Returns the stored id, which is the existing row's id on conflict.
pub async fn upsert_repository(pool: &DbPool, repo: &Repository) -> DbResult<RepositoryId> {
    let id: String = sqlx::query_scalar(
        r#"
        INSERT INTO repositories (
            id, owner, name, default_branch, primary_language, description,
            stars, added_date, analyzed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (owner, name) DO UPDATE SET
            default_branch = excluded.default_branch,
            primary_language = excluded.primary_language,
            description = excluded.description,
            stars = excluded.stars,
            analyzed_at = COALESCE(excluded.analyzed_at, repositories.analyzed_at)
        RETURNING id
        "#,
    )
    .bind(repo.id.as_string())
    .bind(&repo.owner)
    .bind(&repo.name)
    .bind(&repo.default_branch)
    .bind(&repo.primary_language)
    .bind(&repo.description)
    .bind(repo.stars as i64)
    .bind(repo.added_date.as_millis())
    .bind(repo.analyzed_at.map(|t| t.as_millis()))
    .fetch_one(pool)
    .await?;

    Ok(RepositoryId::from_string(&id)?)
}

/// Gets a repository by ID
pub async fn get_repository(pool: &DbPool, id: RepositoryId) -> DbResult<Repository> {
    let row = sqlx::query(
        r#"
        SELECT id, owner, name, default_branch, primary_language, description,
               stars, added_date, analyzed_at
        FROM repositories WHERE id = ?
        "#,
    )
    .bind(id.as_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::not_found("Repository", id))?;

    row_to_repository(&row)
}

/// Gets a repository by `owner/name`
pub async fn find_repository(pool: &DbPool, owner: &str, name: &str) -> DbResult<Repository> {
    let row = sqlx::query(
        r#"
        SELECT id, owner, name, default_branch, primary_language, description,
               stars, added_date, analyzed_at
        FROM repositories WHERE owner = ? AND name = ?
        "#,
    )
    .bind(owner)
    .bind(name)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::not_found("Repository", format!("{}/{}", owner, name)))?;

    row_to_repository(&row)
}

/// Lists all repositories by full name
pub async fn list_repositories(pool: &DbPool) -> DbResult<Vec<Repository>> {
    let rows = sqlx::query(
        r#"
        SELECT id, owner, name, default_branch, primary_language, description,
               stars, added_date, analyzed_at
        FROM repositories ORDER BY owner, name
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_repository).collect()
}

/// Records when a repository was last analysed
pub async fn mark_analyzed(pool: &DbPool, id: RepositoryId, at: Timestamp) -> DbResult<()> {
    let result = sqlx::query("UPDATE repositories SET analyzed_at = ? WHERE id = ?")
        .bind(at.as_millis())
        .bind(id.as_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Repository", id));
    }
    Ok(())
}

/// Deletes a repository and, through the foreign key, its patterns
pub async fn delete_repository(pool: &DbPool, id: RepositoryId) -> DbResult<()> {
    sqlx::query("DELETE FROM repositories WHERE id = ?")
        .bind(id.as_string())
        .execute(pool)
        .await?;
    Ok(())
}

fn row_to_repository(row: &SqliteRow) -> DbResult<Repository> {
    let id: String = row.try_get("id")?;
    let stars: i64 = row.try_get("stars")?;

    Ok(Repository {
        id: RepositoryId::from_string(&id)?,
        owner: row.try_get("owner")?,
        name: row.try_get("name")?,
        default_branch: row.try_get("default_branch")?,
        primary_language: row.try_get("primary_language")?,
        description: row.try_get("description")?,
        stars: u32::try_from(stars).unwrap_or(0),
        added_date: Timestamp::from_millis(row.try_get("added_date")?),
        analyzed_at: row
            .try_get::<Option<i64>, _>("analyzed_at")?
            .map(Timestamp::from_millis),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_in_memory;
    use crate::error::DbErrorKind;
    use crate::migrations::run_migrations;

    async fn setup() -> DbPool {
        let pool = connect_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let pool = setup().await;
        let mut repo = Repository::new("rust-lang", "cargo");
        repo.stars = 12_000;
        repo.primary_language = Some("Rust".to_string());

        let id = upsert_repository(&pool, &repo).await.unwrap();
        assert_eq!(id, repo.id);

        let stored = get_repository(&pool, id).await.unwrap();
        assert_eq!(stored.full_name(), "rust-lang/cargo");
        assert_eq!(stored.stars, 12_000);
        assert_eq!(stored.primary_language.as_deref(), Some("Rust"));
    }

    #[tokio::test]
    async fn test_upsert_keeps_original_id() {
        let pool = setup().await;
        let first = Repository::new("rust-lang", "cargo");
        let first_id = upsert_repository(&pool, &first).await.unwrap();

        let mut second = Repository::new("rust-lang", "cargo");
        second.stars = 5;
        let second_id = upsert_repository(&pool, &second).await.unwrap();

        assert_eq!(first_id, second_id);
        assert_eq!(list_repositories(&pool).await.unwrap().len(), 1);
        assert_eq!(get_repository(&pool, first_id).await.unwrap().stars, 5);
    }

    #[tokio::test]
    async fn test_find_and_not_found() {
        let pool = setup().await;
        upsert_repository(&pool, &Repository::new("a", "b"))
            .await
            .unwrap();

        assert!(find_repository(&pool, "a", "b").await.is_ok());
        let err = find_repository(&pool, "a", "missing").await.unwrap_err();
        assert_eq!(err.kind, DbErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_mark_analyzed() {
        let pool = setup().await;
        let repo = Repository::new("a", "b");
        let id = upsert_repository(&pool, &repo).await.unwrap();

        mark_analyzed(&pool, id, Timestamp::from_millis(42))
            .await
            .unwrap();
        let stored = get_repository(&pool, id).await.unwrap();
        assert_eq!(stored.analyzed_at, Some(Timestamp::from_millis(42)));

        let err = mark_analyzed(&pool, RepositoryId::new(), Timestamp::now())
            .await
            .unwrap_err();
        assert_eq!(err.kind, DbErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_repository() {
        let pool = setup().await;
        let id = upsert_repository(&pool, &Repository::new("a", "b"))
            .await
            .unwrap();

        delete_repository(&pool, id).await.unwrap();
        assert!(get_repository(&pool, id).await.is_err());
    }
}

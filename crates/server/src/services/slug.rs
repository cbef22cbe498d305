use sqlx::SqlitePool;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::error::Result;

const FALLBACK_SLUG: &str = "item";

/// Tables whose rows are addressed by a unique slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugTable {
    Articles,
    Projects,
}

impl SlugTable {
    fn name(self) -> &'static str {
        match self {
            SlugTable::Articles => "articles",
            SlugTable::Projects => "projects",
        }
    }
}

/// Lowercases, strips diacritics and anything outside `[a-z0-9]`, and joins
/// the remaining words with single hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
    {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }

    slug
}

/// Slugifies `source` and appends `-1`, `-2`, ... until no other row in
/// `table` uses it. The row `exclude_id` does not count as a collision.
pub async fn unique_slug(
    pool: &SqlitePool,
    table: SlugTable,
    source: &str,
    exclude_id: Option<&str>,
) -> Result<String> {
    let mut base = slugify(source);
    if base.is_empty() {
        base = FALLBACK_SLUG.to_string();
    }

    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE slug = ? AND id != ?",
        table.name()
    );

    let mut candidate = base.clone();
    let mut suffix = 1;
    loop {
        let taken = sqlx::query_scalar::<_, i64>(&sql)
            .bind(&candidate)
            .bind(exclude_id.unwrap_or(""))
            .fetch_one(pool)
            .await?;

        if taken == 0 {
            return Ok(candidate);
        }

        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_is_dropped() {
        assert_eq!(slugify("Hello World!"), "hello-world");
        assert_eq!(slugify("Rust, Axum & SQLite"), "rust-axum-sqlite");
        assert_eq!(slugify("it's-done"), "its-done");
    }

    #[test]
    fn diacritics_are_stripped() {
        assert_eq!(slugify("Café Crème Brûlée"), "cafe-creme-brulee");
        assert_eq!(slugify("Ärger über Öl"), "arger-uber-ol");
    }

    #[test]
    fn separators_collapse_and_edges_are_trimmed() {
        assert_eq!(slugify("  --Hello -- World--  "), "hello-world");
        assert_eq!(slugify("a\t\nb"), "a-b");
        assert_eq!(slugify("Version 2 0"), "version-2-0");
    }

    #[test]
    fn text_without_latin_characters_is_empty() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("日本語"), "");
    }

    async fn pool_with_articles(slugs: &[(&str, &str)]) -> SqlitePool {
        let db = crate::db::Database::in_memory().await.unwrap();
        db.run_migrations().await.unwrap();
        for (id, slug) in slugs {
            sqlx::query(
                "INSERT INTO articles (id, title, slug, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(slug)
            .bind(slug)
            .bind(crate::db::now())
            .bind(crate::db::now())
            .execute(&db.pool)
            .await
            .unwrap();
        }
        db.pool
    }

    #[tokio::test]
    async fn collisions_get_numeric_suffixes() {
        let pool = pool_with_articles(&[("a", "hello-world"), ("b", "hello-world-1")]).await;
        let slug = unique_slug(&pool, SlugTable::Articles, "Hello World!", None)
            .await
            .unwrap();
        assert_eq!(slug, "hello-world-2");

        // Projects are a separate namespace.
        let slug = unique_slug(&pool, SlugTable::Projects, "Hello World!", None)
            .await
            .unwrap();
        assert_eq!(slug, "hello-world");
    }

    #[tokio::test]
    async fn own_row_is_not_a_collision() {
        let pool = pool_with_articles(&[("a", "hello-world")]).await;
        let slug = unique_slug(&pool, SlugTable::Articles, "Hello, World", Some("a"))
            .await
            .unwrap();
        assert_eq!(slug, "hello-world");
    }

    #[tokio::test]
    async fn empty_slug_falls_back() {
        let pool = pool_with_articles(&[]).await;
        let slug = unique_slug(&pool, SlugTable::Articles, "???", None)
            .await
            .unwrap();
        assert_eq!(slug, "item");
    }
}

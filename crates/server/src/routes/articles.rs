use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{non_empty, required_title, store_image, MessageResponse};
use crate::{
    db::{self, models::Article},
    error::{AppError, Result},
    middleware::{auth::AuthUser, content::ContentForm},
    services::{
        slug::{unique_slug, SlugTable},
        storage::public_url,
    },
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_articles).post(create_article))
        // GET takes a slug, PUT and DELETE take an id.
        .route(
            "/:key",
            get(get_article).put(update_article).delete(delete_article),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct ArticleFields {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub content: Option<String>,
    pub author: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArticleResponse {
    fn new(article: Article, base_url: &str) -> Self {
        Self {
            image: article.image.as_deref().map(|i| public_url(base_url, i)),
            id: article.id,
            title: article.title,
            slug: article.slug,
            content: article.content,
            author: article.author,
            created_at: article.created_at,
            updated_at: article.updated_at,
        }
    }
}

/// Newest first.
pub(crate) async fn fetch_all(pool: &SqlitePool) -> Result<Vec<Article>> {
    let articles = sqlx::query_as::<_, Article>(
        r#"
        SELECT id, title, slug, content, author, image, created_at, updated_at
        FROM articles
        ORDER BY created_at DESC, rowid DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(articles)
}

pub(crate) async fn fetch_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Article>> {
    let article = sqlx::query_as::<_, Article>(
        "SELECT id, title, slug, content, author, image, created_at, updated_at FROM articles WHERE slug = ?",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(article)
}

async fn fetch_by_id(pool: &SqlitePool, id: &str) -> Result<Article> {
    sqlx::query_as::<_, Article>(
        "SELECT id, title, slug, content, author, image, created_at, updated_at FROM articles WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Article not found".to_string()))
}

async fn list_articles(State(state): State<AppState>) -> Result<Json<Vec<ArticleResponse>>> {
    let base_url = &state.config.public_base_url;
    let articles = fetch_all(&state.db.pool)
        .await?
        .into_iter()
        .map(|a| ArticleResponse::new(a, base_url))
        .collect();
    Ok(Json(articles))
}

async fn get_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>> {
    let article = fetch_by_slug(&state.db.pool, &slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Article not found".to_string()))?;
    Ok(Json(ArticleResponse::new(
        article,
        &state.config.public_base_url,
    )))
}

async fn create_article(
    State(state): State<AppState>,
    user: AuthUser,
    ContentForm { fields, image }: ContentForm<ArticleFields>,
) -> Result<Json<ArticleResponse>> {
    let title = required_title(fields.title)?;
    let slug_source = non_empty(fields.slug).unwrap_or_else(|| title.clone());
    let slug = unique_slug(&state.db.pool, SlugTable::Articles, &slug_source, None).await?;

    let (image, written) = match image {
        Some(input) => store_image(&state, input, None).await?,
        None => (None, None),
    };

    let article_id = Uuid::new_v4().to_string();
    let now = db::now();

    let inserted = sqlx::query(
        "INSERT INTO articles (id, title, slug, content, author, image, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&article_id)
    .bind(&title)
    .bind(&slug)
    .bind(&fields.content)
    .bind(&fields.author)
    .bind(&image)
    .bind(&now)
    .bind(&now)
    .execute(&state.db.pool)
    .await;

    if let Err(e) = inserted {
        if let Some(file) = written {
            state.images.discard(&file).await;
        }
        return Err(e.into());
    }

    tracing::info!(article_id = %article_id, slug = %slug, user = %user.username, "Article created");

    let article = fetch_by_id(&state.db.pool, &article_id).await?;
    Ok(Json(ArticleResponse::new(
        article,
        &state.config.public_base_url,
    )))
}

async fn update_article(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ContentForm { fields, image }: ContentForm<ArticleFields>,
) -> Result<Json<ArticleResponse>> {
    let existing = fetch_by_id(&state.db.pool, &id).await?;

    let title = match fields.title {
        Some(title) => required_title(Some(title))?,
        None => existing.title.clone(),
    };

    let slug = match non_empty(fields.slug) {
        Some(slug) => unique_slug(&state.db.pool, SlugTable::Articles, &slug, Some(&id)).await?,
        None if title != existing.title => {
            unique_slug(&state.db.pool, SlugTable::Articles, &title, Some(&id)).await?
        }
        None => existing.slug.clone(),
    };

    let content = fields.content.or_else(|| existing.content.clone());
    let author = fields.author.or_else(|| existing.author.clone());

    let (image, written) = match image {
        Some(input) => store_image(&state, input, existing.image.as_deref()).await?,
        None => (existing.image.clone(), None),
    };

    let updated = sqlx::query(
        "UPDATE articles SET title = ?, slug = ?, content = ?, author = ?, image = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&title)
    .bind(&slug)
    .bind(&content)
    .bind(&author)
    .bind(&image)
    .bind(db::now())
    .bind(&id)
    .execute(&state.db.pool)
    .await;

    if let Err(e) = updated {
        if let Some(file) = written {
            state.images.discard(&file).await;
        }
        return Err(e.into());
    }

    if existing.image != image {
        if let Some(old) = &existing.image {
            state.images.discard(old).await;
        }
    }

    tracing::info!(article_id = %id, slug = %slug, user = %user.username, "Article updated");

    let article = fetch_by_id(&state.db.pool, &id).await?;
    Ok(Json(ArticleResponse::new(
        article,
        &state.config.public_base_url,
    )))
}

async fn delete_article(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let existing = fetch_by_id(&state.db.pool, &id).await?;

    sqlx::query("DELETE FROM articles WHERE id = ?")
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    if let Some(image) = &existing.image {
        state.images.discard(image).await;
    }

    tracing::info!(article_id = %id, user = %user.username, "Article deleted");

    Ok(Json(MessageResponse::new("Deleted")))
}

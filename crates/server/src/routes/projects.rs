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
    db::{self, models::Project},
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
        .route("/", get(list_projects).post(create_project))
        // GET takes a slug, PUT and DELETE take an id.
        .route(
            "/:key",
            get(get_project).put(update_project).delete(delete_project),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectFields {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectResponse {
    fn new(project: Project, base_url: &str) -> Self {
        Self {
            image: project.image.as_deref().map(|i| public_url(base_url, i)),
            id: project.id,
            title: project.title,
            slug: project.slug,
            description: project.description,
            url: project.url,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

/// Newest first.
pub(crate) async fn fetch_all(pool: &SqlitePool) -> Result<Vec<Project>> {
    let projects = sqlx::query_as::<_, Project>(
        r#"
        SELECT id, title, slug, description, url, image, created_at, updated_at
        FROM projects
        ORDER BY created_at DESC, rowid DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(projects)
}

pub(crate) async fn fetch_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Project>> {
    let project = sqlx::query_as::<_, Project>(
        "SELECT id, title, slug, description, url, image, created_at, updated_at FROM projects WHERE slug = ?",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(project)
}

async fn fetch_by_id(pool: &SqlitePool, id: &str) -> Result<Project> {
    sqlx::query_as::<_, Project>(
        "SELECT id, title, slug, description, url, image, created_at, updated_at FROM projects WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
}

async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<ProjectResponse>>> {
    let base_url = &state.config.public_base_url;
    let projects = fetch_all(&state.db.pool)
        .await?
        .into_iter()
        .map(|p| ProjectResponse::new(p, base_url))
        .collect();
    Ok(Json(projects))
}

async fn get_project(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProjectResponse>> {
    let project = fetch_by_slug(&state.db.pool, &slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
    Ok(Json(ProjectResponse::new(
        project,
        &state.config.public_base_url,
    )))
}

async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    ContentForm { fields, image }: ContentForm<ProjectFields>,
) -> Result<Json<ProjectResponse>> {
    let title = required_title(fields.title)?;
    let slug_source = non_empty(fields.slug).unwrap_or_else(|| title.clone());
    let slug = unique_slug(&state.db.pool, SlugTable::Projects, &slug_source, None).await?;

    let (image, written) = match image {
        Some(input) => store_image(&state, input, None).await?,
        None => (None, None),
    };

    let project_id = Uuid::new_v4().to_string();
    let now = db::now();

    let inserted = sqlx::query(
        "INSERT INTO projects (id, title, slug, description, url, image, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&project_id)
    .bind(&title)
    .bind(&slug)
    .bind(&fields.description)
    .bind(&fields.url)
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

    tracing::info!(project_id = %project_id, slug = %slug, user = %user.username, "Project created");

    let project = fetch_by_id(&state.db.pool, &project_id).await?;
    Ok(Json(ProjectResponse::new(
        project,
        &state.config.public_base_url,
    )))
}

async fn update_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ContentForm { fields, image }: ContentForm<ProjectFields>,
) -> Result<Json<ProjectResponse>> {
    let existing = fetch_by_id(&state.db.pool, &id).await?;

    let title = match fields.title {
        Some(title) => required_title(Some(title))?,
        None => existing.title.clone(),
    };

    let slug = match non_empty(fields.slug) {
        Some(slug) => unique_slug(&state.db.pool, SlugTable::Projects, &slug, Some(&id)).await?,
        None if title != existing.title => {
            unique_slug(&state.db.pool, SlugTable::Projects, &title, Some(&id)).await?
        }
        None => existing.slug.clone(),
    };

    let description = fields.description.or_else(|| existing.description.clone());
    let url = fields.url.or_else(|| existing.url.clone());

    let (image, written) = match image {
        Some(input) => store_image(&state, input, existing.image.as_deref()).await?,
        None => (existing.image.clone(), None),
    };

    let updated = sqlx::query(
        "UPDATE projects SET title = ?, slug = ?, description = ?, url = ?, image = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&title)
    .bind(&slug)
    .bind(&description)
    .bind(&url)
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

    tracing::info!(project_id = %id, slug = %slug, user = %user.username, "Project updated");

    let project = fetch_by_id(&state.db.pool, &id).await?;
    Ok(Json(ProjectResponse::new(
        project,
        &state.config.public_base_url,
    )))
}

async fn delete_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let existing = fetch_by_id(&state.db.pool, &id).await?;

    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    if let Some(image) = &existing.image {
        state.images.discard(image).await;
    }

    tracing::info!(project_id = %id, user = %user.username, "Project deleted");

    Ok(Json(MessageResponse::new("Deleted")))
}

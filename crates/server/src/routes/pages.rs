// Read-only public pages rendered on the server

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

use super::{articles, projects};
use crate::{error::Result, services::storage::public_url, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/articles/:slug", get(article_page))
        .route("/projects/:slug", get(project_page))
}

pub(super) fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
</head>
<body>
<nav><a href="/">Home</a> | <a href="/#articles">Articles</a> | <a href="/#projects">Projects</a></nav>
<main>
{body}
</main>
<footer><p>&copy; Company Profile. All rights reserved.</p></footer>
</body>
</html>
"#,
        title = text(title),
    )
}

fn not_found(what: &str) -> Response {
    let body = format!("<h1>{} not found</h1>", text(what));
    (StatusCode::NOT_FOUND, Html(layout("Not found", &body))).into_response()
}

fn image_tag(base_url: &str, image: Option<&str>, alt: &str) -> String {
    image
        .map(|i| {
            format!(
                r#"<img src="{}" alt="{}">"#,
                attr(&public_url(base_url, i)),
                attr(alt)
            )
        })
        .unwrap_or_default()
}

/// First `max` characters, with an ellipsis when cut.
fn excerpt(value: &str, max: usize) -> String {
    let mut chars = value.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}…", head.trim_end())
    } else {
        head
    }
}

async fn home(State(state): State<AppState>) -> Result<Html<String>> {
    let base_url = &state.config.public_base_url;
    let articles = articles::fetch_all(&state.db.pool).await?;
    let projects = projects::fetch_all(&state.db.pool).await?;

    let mut body = String::from("<h1>Company Profile</h1>\n<section id=\"articles\">\n<h2>Latest Articles</h2>\n");
    if articles.is_empty() {
        body.push_str("<p>No articles available yet.</p>\n");
    }
    for a in &articles {
        body.push_str(&format!(
            "<article>{}<h3>{}</h3><p>{}</p><p>{}</p><a href=\"/articles/{}\">Read more</a></article>\n",
            image_tag(base_url, a.image.as_deref(), &a.title),
            text(&a.title),
            a.author
                .as_deref()
                .map(|author| format!("by {}", text(author)))
                .unwrap_or_else(|| "Anonymous".to_string()),
            text(&excerpt(a.content.as_deref().unwrap_or_default(), 200)),
            attr(&a.slug),
        ));
    }

    body.push_str("</section>\n<section id=\"projects\">\n<h2>Featured Projects</h2>\n");
    if projects.is_empty() {
        body.push_str("<p>No projects available yet.</p>\n");
    }
    for p in &projects {
        body.push_str(&format!(
            "<article>{}<h3>{}</h3><p>{}</p><a href=\"/projects/{}\">View project</a></article>\n",
            image_tag(base_url, p.image.as_deref(), &p.title),
            text(&p.title),
            text(&excerpt(p.description.as_deref().unwrap_or_default(), 160)),
            attr(&p.slug),
        ));
    }
    body.push_str("</section>");

    Ok(Html(layout("Company Profile", &body)))
}

async fn article_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response> {
    let Some(article) = articles::fetch_by_slug(&state.db.pool, &slug).await? else {
        return Ok(not_found("Article"));
    };

    let body = format!(
        "<article>{}<h1>{}</h1><p>{}</p><p>Author: {}</p></article>",
        image_tag(
            &state.config.public_base_url,
            article.image.as_deref(),
            &article.title
        ),
        text(&article.title),
        text(article.content.as_deref().unwrap_or_default()),
        text(article.author.as_deref().unwrap_or("Anonymous")),
    );

    Ok(Html(layout(&article.title, &body)).into_response())
}

async fn project_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response> {
    let Some(project) = projects::fetch_by_slug(&state.db.pool, &slug).await? else {
        return Ok(not_found("Project"));
    };

    // Only http(s) links become anchors.
    let link = project
        .url
        .as_deref()
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .map(|u| format!("<p><a href=\"{}\">Visit project</a></p>", attr(u)))
        .unwrap_or_default();

    let body = format!(
        "<article>{}<h1>{}</h1><p>{}</p>{}</article>",
        image_tag(
            &state.config.public_base_url,
            project.image.as_deref(),
            &project.title
        ),
        text(&project.title),
        text(project.description.as_deref().unwrap_or_default()),
        link,
    );

    Ok(Html(layout(&project.title, &body)).into_response())
}

// Admin pages. They are plain HTML forms; the shared script submits them
// to the JSON API and keeps the session token in localStorage.

use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Router,
};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use serde::Deserialize;

use super::{articles, pages::layout, projects};
use crate::{error::Result, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin", get(dashboard))
        .route("/admin/login", get(login_page))
        .route("/admin/register", get(register_page))
        .route("/admin/request-reset", get(request_reset_page))
        .route("/admin/reset", get(reset_page))
        .route("/admin/articles", get(articles_page))
        .route("/admin/projects", get(projects_page))
}

/// Handles `form[data-api]` submissions and `button[data-delete]` clicks.
///
/// Forms marked `data-session` are sent as multipart with the bearer token,
/// the others as JSON. Pages containing a `data-session` element send
/// visitors without a token to the login page.
const ADMIN_SCRIPT: &str = r#"
const token = () => localStorage.getItem('token');
const report = (message, ok) => {
  const el = document.getElementById('status');
  el.textContent = message;
  el.className = ok ? 'ok' : 'error';
};
if (document.querySelector('[data-session]') && !token()) {
  location.href = '/admin/login';
}
document.querySelectorAll('form[data-api]').forEach((form) => {
  form.addEventListener('submit', async (event) => {
    event.preventDefault();
    const data = new FormData(form);
    const headers = {};
    let body;
    if (form.dataset.session !== undefined) {
      headers['Authorization'] = 'Bearer ' + token();
      body = data;
    } else {
      headers['Content-Type'] = 'application/json';
      body = JSON.stringify(Object.fromEntries(data));
    }
    try {
      const res = await fetch(form.dataset.api, { method: 'POST', headers, body });
      const json = await res.json().catch(() => ({}));
      if (!res.ok) {
        report(json.message || 'Request failed', false);
        return;
      }
      if (form.dataset.api === '/api/auth/login') {
        localStorage.setItem('token', json.token);
        location.href = '/admin';
        return;
      }
      if (form.dataset.session !== undefined) {
        location.reload();
        return;
      }
      report(json.token ? json.message + ' Token: ' + json.token : json.message, true);
    } catch (err) {
      report('Network error', false);
    }
  });
});
document.querySelectorAll('button[data-delete]').forEach((button) => {
  button.addEventListener('click', async () => {
    if (!confirm('Delete this item?')) return;
    const res = await fetch(button.dataset.delete, {
      method: 'DELETE',
      headers: { Authorization: 'Bearer ' + token() },
    });
    if (res.ok) {
      location.reload();
    } else {
      const json = await res.json().catch(() => ({}));
      report(json.message || 'Delete failed', false);
    }
  });
});
document.querySelectorAll('[data-logout]').forEach((link) => {
  link.addEventListener('click', () => localStorage.removeItem('token'));
});
"#;

fn admin_page(title: &str, content: &str, session: bool) -> Html<String> {
    let mut body = String::new();
    body.push_str(if session {
        "<section class=\"admin\" data-session>\n"
    } else {
        "<section class=\"admin\">\n"
    });
    body.push_str(&format!("<h1>{}</h1>\n", text(title)));
    body.push_str("<p id=\"status\" role=\"status\"></p>\n");
    body.push_str(content);
    body.push_str("\n</section>\n<script>");
    body.push_str(ADMIN_SCRIPT);
    body.push_str("</script>");
    Html(layout(title, &body))
}

async fn dashboard() -> Html<String> {
    admin_page(
        "Admin",
        r#"<ul>
<li><a href="/admin/articles">Manage articles</a></li>
<li><a href="/admin/projects">Manage projects</a></li>
<li><a href="/admin/login" data-logout>Log out</a></li>
</ul>"#,
        true,
    )
}

async fn login_page() -> Html<String> {
    admin_page(
        "Admin Login",
        r#"<form data-api="/api/auth/login">
<label>Username <input name="username" required></label>
<label>Password <input name="password" type="password" required></label>
<button type="submit">Log in</button>
</form>
<p><a href="/admin/register">Register</a> | <a href="/admin/request-reset">Forgot password?</a></p>"#,
        false,
    )
}

async fn register_page() -> Html<String> {
    admin_page(
        "Register",
        r#"<form data-api="/api/auth/register">
<label>Username <input name="username" required></label>
<label>Password <input name="password" type="password" minlength="12" required></label>
<p>At least 12 characters with a lowercase letter, an uppercase letter, a digit and a symbol.</p>
<button type="submit">Register</button>
</form>
<p><a href="/admin/login">Back to login</a></p>"#,
        false,
    )
}

async fn request_reset_page() -> Html<String> {
    admin_page(
        "Request Password Reset",
        r#"<form data-api="/api/auth/reset-request">
<label>Username <input name="username" required></label>
<label>Email <input name="email" type="email"></label>
<button type="submit">Send reset link</button>
</form>
<p><a href="/admin/reset">I already have a token</a></p>"#,
        false,
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetQuery {
    pub token: Option<String>,
}

async fn reset_page(Query(query): Query<ResetQuery>) -> Html<String> {
    let token = query.token.unwrap_or_default();
    let form = format!(
        r#"<form data-api="/api/auth/reset">
<label>Token <input name="token" value="{}" required></label>
<label>New password <input name="newPassword" type="password" minlength="12" required></label>
<button type="submit">Reset password</button>
</form>
<p><a href="/admin/login">Back to login</a></p>"#,
        attr(&token)
    );
    admin_page("Reset Password", &form, false)
}

fn delete_button(endpoint: &str) -> String {
    format!(
        r#"<button type="button" data-delete="{}">Delete</button>"#,
        attr(endpoint)
    )
}

async fn articles_page(State(state): State<AppState>) -> Result<Html<String>> {
    let articles = articles::fetch_all(&state.db.pool).await?;

    let mut content = String::from(
        r#"<p><a href="/admin">Back to admin</a></p>
<form data-api="/api/articles" data-session enctype="multipart/form-data">
<label>Title <input name="title" required></label>
<label>Slug <input name="slug"></label>
<label>Author <input name="author"></label>
<label>Content <textarea name="content" rows="6"></textarea></label>
<label>Image <input name="image" type="file" accept="image/png,image/jpeg,image/gif,image/webp"></label>
<button type="submit">Create article</button>
</form>
<h2>Existing Articles</h2>
<table>
<thead><tr><th>Title</th><th>Slug</th><th>Author</th><th></th></tr></thead>
<tbody>
"#,
    );
    for a in &articles {
        content.push_str(&format!(
            "<tr><td><a href=\"/articles/{}\">{}</a></td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            attr(&a.slug),
            text(&a.title),
            text(&a.slug),
            text(a.author.as_deref().unwrap_or("-")),
            delete_button(&format!("/api/articles/{}", a.id)),
        ));
    }
    content.push_str("</tbody>\n</table>");

    Ok(admin_page("Manage Articles", &content, true))
}

async fn projects_page(State(state): State<AppState>) -> Result<Html<String>> {
    let projects = projects::fetch_all(&state.db.pool).await?;

    let mut content = String::from(
        r#"<p><a href="/admin">Back to admin</a></p>
<form data-api="/api/projects" data-session enctype="multipart/form-data">
<label>Title <input name="title" required></label>
<label>Slug <input name="slug"></label>
<label>URL <input name="url" type="url"></label>
<label>Description <textarea name="description" rows="4"></textarea></label>
<label>Image <input name="image" type="file" accept="image/png,image/jpeg,image/gif,image/webp"></label>
<button type="submit">Create project</button>
</form>
<h2>Existing Projects</h2>
<table>
<thead><tr><th>Title</th><th>Slug</th><th>URL</th><th></th></tr></thead>
<tbody>
"#,
    );
    for p in &projects {
        content.push_str(&format!(
            "<tr><td><a href=\"/projects/{}\">{}</a></td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            attr(&p.slug),
            text(&p.title),
            text(&p.slug),
            text(p.url.as_deref().unwrap_or("-")),
            delete_button(&format!("/api/projects/{}", p.id)),
        ));
    }
    content.push_str("</tbody>\n</table>");

    Ok(admin_page("Manage Projects", &content, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_button_escapes_endpoint() {
        assert_eq!(
            delete_button("/api/articles/a\"b"),
            r#"<button type="button" data-delete="/api/articles/a&quot;b">Delete</button>"#
        );
    }

    #[test]
    fn session_pages_are_marked() {
        let Html(html) = admin_page("Admin", "", true);
        assert!(html.contains("data-session>"));
        let Html(html) = admin_page("Login", "", false);
        assert!(!html.contains("<section class=\"admin\" data-session"));
    }
}

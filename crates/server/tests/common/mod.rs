//! Shared helpers for the HTTP integration tests.
//!
//! Every test gets its own in-memory SQLite database and temporary upload
//! directory, and drives the real router through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use profile_site_server::{
    build_router,
    config::Config,
    db::Database,
    services::{
        mailer::{MailError, Mailer},
        storage::ImageStore,
    },
    AppState,
};

pub const BASE_URL: &str = "http://localhost:4000";
pub const ADMIN_PASSWORD: &str = "Admin@123456";

/// A 1x1 transparent PNG.
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
    0x42, 0x60, 0x82,
];

/// Records reset mails instead of sending them; optionally fails every send.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMail>>,
    pub fail: bool,
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub token: String,
    pub link: String,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_password_reset(
        &self,
        to: &str,
        token: &str,
        reset_link: &str,
    ) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Build("simulated failure".to_string()));
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            token: token.to_string(),
            link: reset_link.to_string(),
        });
        Ok(())
    }
}

pub fn test_config(upload_dir: &std::path::Path) -> Config {
    Config {
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        database_connect_attempts: 1,
        database_connect_delay: Duration::ZERO,
        upload_dir: upload_dir.display().to_string(),
        public_base_url: BASE_URL.to_string(),
        frontend_url: "http://localhost:3000".to_string(),
        cors_origin: "*".to_string(),
        jwt_secret: "test-secret".to_string(),
        jwt_expires_in: chrono::Duration::hours(1),
        password_hash_cost: 1,
        reset_token_expires_min: 30,
        expose_reset_token: true,
        max_body_bytes: 10 * 1024 * 1024,
        smtp: None,
    }
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub uploads: TempDir,
}

impl TestApp {
    /// No mailer, reset tokens exposed.
    pub async fn new() -> Self {
        Self::build(|_| {}, None).await
    }

    pub async fn build(
        configure: impl FnOnce(&mut Config),
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Self {
        let uploads = tempfile::tempdir().expect("temp upload dir");
        let mut config = test_config(uploads.path());
        configure(&mut config);

        let db = Database::in_memory().await.expect("in-memory database");
        db.run_migrations().await.expect("migrations");

        let images = ImageStore::new(uploads.path());
        images.init().await.expect("upload dir");

        let state = AppState {
            db: db.clone(),
            config,
            images,
            mailer,
        };

        Self {
            app: build_router(state),
            db,
            uploads,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        body: Value,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response {
        self.json(Method::POST, uri, body, None).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Response {
        self.send(
            Request::delete(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        form: Multipart,
        token: &str,
    ) -> Response {
        let (content_type, body) = form.finish();
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Registers `username` with [`ADMIN_PASSWORD`] and logs in.
    pub async fn login_as(&self, username: &str) -> String {
        let credentials = serde_json::json!({ "username": username, "password": ADMIN_PASSWORD });
        let response = self.post_json("/api/auth/register", credentials.clone()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = self.post_json("/api/auth/login", credentials).await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["token"]
            .as_str()
            .expect("token in login response")
            .to_string()
    }

    /// Path on disk of an image URL returned by the API.
    pub fn upload_path(&self, image_url: &str) -> PathBuf {
        let name = image_url
            .strip_prefix(&format!("{BASE_URL}/uploads/"))
            .expect("image should be a managed upload");
        self.uploads.path().join(name)
    }

    pub fn upload_count(&self) -> usize {
        std::fs::read_dir(self.uploads.path())
            .expect("upload dir")
            .count()
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.db.pool)
            .await
            .expect("count query")
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("JSON body")
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).expect("UTF-8 body")
}

const BOUNDARY: &str = "----profile-site-test-boundary";

/// Minimal multipart/form-data body builder.
#[derive(Default)]
pub struct Multipart {
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        (
            format!("multipart/form-data; boundary={BOUNDARY}"),
            self.body,
        )
    }
}

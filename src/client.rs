//! Hosted backend REST client.
//!
//! Talks to a PostgREST-style table API (`/rest/v1/<table>`) and a password
//! auth endpoint (`/auth/v1/token`). Every data call takes an explicit
//! [`AuthSession`]; nothing is cached on the client.

use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::error::{AppError, Result};
use crate::models::{AttendanceSessionSummary, Class, RosterEntry};
use crate::roster::RosterSource;

/// Signed-in user context passed to every backend call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user_id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

impl AuthSession {
    /// First word of the user's full name, or "Teacher".
    pub fn greeting_name(&self) -> &str {
        self.full_name
            .as_deref()
            .and_then(|n| n.split_whitespace().next())
            .unwrap_or("Teacher")
    }
}

/// Headline counts for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_classes: u64,
    pub total_students: u64,
    pub today_sessions: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<UserMetadata>,
}

#[derive(Deserialize)]
struct UserMetadata {
    #[serde(default)]
    full_name: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

/// Backend HTTP client.
pub struct BackendClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl BackendClient {
    /// Create a new client instance.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(AppError::config("Backend URL is not configured"));
        }

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.anon_key)
            .map_err(|_| AppError::config("Backend anon key contains invalid characters"))?;
        headers.insert("apikey", key);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{base}/rest/v1/{table}", base = self.base_url)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{base}/auth/v1/{path}", base = self.base_url)
    }

    fn authed(&self, builder: RequestBuilder, session: &AuthSession) -> RequestBuilder {
        builder.bearer_auth(&session.access_token)
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let url = self.auth_url("token");

        let response = self
            .client
            .post(&url)
            .query(&[("grant_type", "password")])
            .bearer_auth(&self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST
            || response.status() == reqwest::StatusCode::UNAUTHORIZED
        {
            let body = response.text().await?;
            return Err(AppError::auth(error_message(&body)));
        }

        let body = check_status(response).await?.text().await?;
        let session = parse_token_response(&body)?;
        info!("Signed in as {}", session.email.as_deref().unwrap_or(&session.user_id));
        Ok(session)
    }

    /// End the session on the server side.
    pub async fn sign_out(&self, session: AuthSession) -> Result<()> {
        let url = self.auth_url("logout");
        let response = self.authed(self.client.post(&url), &session).send().await?;
        check_status(response).await?;
        info!("Signed out");
        Ok(())
    }

    /// Sign out, then hand back `result` unchanged.
    ///
    /// A failed sign-out is logged; it never replaces the outcome of the
    /// work done with the session.
    pub async fn sign_out_after<T, E>(
        &self,
        session: AuthSession,
        result: std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        if let Err(e) = self.sign_out(session).await {
            warn!("Sign-out failed: {e}");
        }
        result
    }

    async fn select<T: DeserializeOwned>(
        &self,
        session: &AuthSession,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = self.rest_url(table);
        debug!("GET {url} {query:?}");

        let response = self.authed(self.client.get(&url), session).query(query).send().await?;
        let body = check_status(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// All classes visible to the user, ordered by name.
    pub async fn list_classes(&self, session: &AuthSession) -> Result<Vec<Class>> {
        self.select(session, "classes", &classes_query()).await
    }

    /// Roster of one class, ordered by roll number.
    pub async fn list_students(&self, session: &AuthSession, class_id: &str) -> Result<Vec<RosterEntry>> {
        self.select(session, "students", &students_query(class_id)).await
    }

    /// Past attendance sessions, newest date first.
    pub async fn list_sessions(&self, session: &AuthSession) -> Result<Vec<AttendanceSessionSummary>> {
        self.select(session, "attendance_sessions", &sessions_query("date.desc", None))
            .await
    }

    /// Most recently created sessions, at most `limit`.
    pub async fn recent_sessions(&self, session: &AuthSession, limit: usize) -> Result<Vec<AttendanceSessionSummary>> {
        self.select(session, "attendance_sessions", &sessions_query("created_at.desc", Some(limit)))
            .await
    }

    /// Exact row count of a table, optionally filtered by `column = value`.
    pub async fn count(&self, session: &AuthSession, table: &str, filter: Option<(&str, &str)>) -> Result<u64> {
        let url = self.rest_url(table);
        let mut query = vec![("select", "id".to_string())];
        if let Some((column, value)) = filter {
            query.push((column, format!("eq.{value}")));
        }

        let response = self
            .authed(self.client.head(&url), session)
            .header("Prefer", "count=exact")
            .query(&query)
            .send()
            .await?;
        let response = check_status(response).await?;

        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| AppError::Backend {
                status: response.status().as_u16(),
                message: format!("missing row count for {table}"),
            })
    }

    /// Counts shown on the dashboard for the given day.
    pub async fn dashboard_stats(&self, session: &AuthSession, today: NaiveDate) -> Result<DashboardStats> {
        let today = today.format("%Y-%m-%d").to_string();

        let total_classes = self.count(session, "classes", None).await?;
        let total_students = self.count(session, "students", None).await?;
        let today_sessions = self
            .count(session, "attendance_sessions", Some(("date", today.as_str())))
            .await?;

        Ok(DashboardStats {
            total_classes,
            total_students,
            today_sessions,
        })
    }

    /// Roster source bound to a session.
    pub fn roster<'a>(&'a self, session: &'a AuthSession) -> BackendRoster<'a> {
        BackendRoster { client: self, session }
    }
}

/// [`RosterSource`] backed by the `students` table.
pub struct BackendRoster<'a> {
    client: &'a BackendClient,
    session: &'a AuthSession,
}

impl RosterSource for BackendRoster<'_> {
    async fn list_students(&self, class_id: &str) -> Result<Vec<RosterEntry>> {
        self.client.list_students(self.session, class_id).await
    }
}

fn classes_query() -> Vec<(&'static str, String)> {
    vec![
        ("select", "id,name,section,subject,academic_year".to_string()),
        ("order", "name.asc".to_string()),
    ]
}

fn students_query(class_id: &str) -> Vec<(&'static str, String)> {
    vec![
        ("select", "id,full_name,roll_number".to_string()),
        ("class_id", format!("eq.{class_id}")),
        ("order", "roll_number.asc".to_string()),
    ]
}

fn sessions_query(order: &str, limit: Option<usize>) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("select", "*,classes(name,section)".to_string()),
        ("order", order.to_string()),
    ];
    if let Some(limit) = limit {
        query.push(("limit", limit.to_string()));
    }
    query
}

/// Turn a non-success response into [`AppError::Backend`].
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Backend {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Best-effort message from an error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|e| e.error_description.or(e.message).or(e.msg))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Parse the token endpoint response into a session.
fn parse_token_response(body: &str) -> Result<AuthSession> {
    let token: TokenResponse = serde_json::from_str(body)?;
    if token.access_token.is_empty() {
        return Err(AppError::auth("empty access token"));
    }

    Ok(AuthSession {
        access_token: token.access_token,
        user_id: token.user.id,
        email: token.user.email,
        full_name: token.user.user_metadata.and_then(|m| m.full_name),
    })
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/').and_then(|(_, total)| total.trim().parse().ok())
}

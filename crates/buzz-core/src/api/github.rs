//! `reqwest` implementation of the request executor for api.github.com.

use chrono::SecondsFormat;
use reqwest::header::{
    HeaderMap, ACCEPT, IF_MODIFIED_SINCE, LAST_MODIFIED, LINK, USER_AGENT,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

use super::{ApiRequest, ApiResponse, RequestExecutor, ResponseMeta};
use crate::session::Credential;
use crate::util::{
    compact_text, format_http_date, is_http_url, normalize_text_option, parse_http_date,
};
use crate::{Error, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";
const POLL_INTERVAL_HEADER: &str = "x-poll-interval";
const CLIENT_USER_AGENT: &str = concat!("buzz/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct GithubExecutor {
    base_url: String,
    client: Client,
}

impl GithubExecutor {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            client: Client::builder().build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, credential: &Credential, request: &ApiRequest) -> RequestBuilder {
        let builder = match request {
            ApiRequest::FetchNotifications(params) => {
                let since = params.since.to_rfc3339_opts(SecondsFormat::Secs, true);
                let mut builder = self
                    .client
                    .get(format!("{}/notifications", self.base_url))
                    .query(&[
                        ("all", params.all.to_string()),
                        ("since", since),
                        ("per_page", params.per_page.to_string()),
                        ("page", params.page.to_string()),
                    ]);
                if let Some(modified) = params.if_modified_since {
                    builder = builder.header(IF_MODIFIED_SINCE, format_http_date(modified));
                }
                builder
            }
            ApiRequest::MarkAllNotificationsAsRead { last_read_at } => self
                .client
                .put(format!("{}/notifications", self.base_url))
                .json(&serde_json::json!({
                    "last_read_at": last_read_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                })),
            ApiRequest::MarkAllNotificationsAsReadForRepo {
                owner,
                repo,
                last_read_at,
            } => self
                .client
                .put(format!(
                    "{}/repos/{}/{}/notifications",
                    self.base_url,
                    urlencoding::encode(owner),
                    urlencoding::encode(repo)
                ))
                .json(&serde_json::json!({
                    "last_read_at": last_read_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                })),
            ApiRequest::MarkNotificationThreadAsRead { thread_id } => self.client.patch(format!(
                "{}/notifications/threads/{}",
                self.base_url,
                urlencoding::encode(thread_id.as_str())
            )),
        };

        builder
            .bearer_auth(credential.token())
            .header(ACCEPT, GITHUB_MEDIA_TYPE)
            .header(USER_AGENT, CLIENT_USER_AGENT)
    }
}

impl RequestExecutor for GithubExecutor {
    async fn execute(&self, credential: &Credential, request: ApiRequest) -> Result<ApiResponse> {
        let operation = request.operation();
        tracing::debug!("GitHub request {}", operation);

        let response = self.build_request(credential, &request).send().await?;
        let status = response.status();
        let meta = response_meta(status, response.headers());

        if status == StatusCode::NOT_MODIFIED {
            return Ok(ApiResponse {
                data: serde_json::Value::Null,
                meta,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(parse_api_error(status, &body)));
        }

        let body = response.text().await?;
        let data = if body.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&body)?
        };
        Ok(ApiResponse { data, meta })
    }
}

fn response_meta(status: StatusCode, headers: &HeaderMap) -> ResponseMeta {
    ResponseMeta {
        status: status.as_u16(),
        last_modified: header_str(headers, LAST_MODIFIED.as_str()).and_then(parse_http_date),
        poll_interval_secs: header_str(headers, POLL_INTERVAL_HEADER)
            .and_then(|value| value.trim().parse().ok()),
        not_modified: status == StatusCode::NOT_MODIFIED,
        has_next_page: header_str(headers, LINK.as_str()).is_some_and(links_to_next_page),
    }
}

/// Whether a `Link` header value has a `rel="next"` entry.
fn links_to_next_page(link: &str) -> bool {
    link.split(',').any(|entry| {
        entry.split(';').skip(1).any(|param| {
            param
                .trim()
                .strip_prefix("rel=")
                .is_some_and(|rels| {
                    rels.trim_matches('"')
                        .split_whitespace()
                        .any(|rel| rel == "next")
                })
        })
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[derive(Debug, Deserialize)]
struct GithubErrorBody {
    message: Option<String>,
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<GithubErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config("API base URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}

//! Scripted request executor for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::api::{ApiRequest, ApiResponse, RequestExecutor, ResponseMeta};
use crate::session::{Credential, SessionHandle, SessionSignal};
use crate::{Error, Result};

pub enum Reply {
    Ok(ApiResponse),
    Fail(String),
    /// Answer only after the delay (used to trip timeouts)
    Hang(Duration),
    /// Answer with the response after the delay
    Late(Duration, ApiResponse),
}

#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: Reply) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl RequestExecutor for ScriptedExecutor {
    async fn execute(&self, _credential: &Credential, request: ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Ok(response)) => Ok(response),
            Some(Reply::Fail(message)) => Err(Error::Transport(message)),
            Some(Reply::Hang(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(empty_list())
            }
            Some(Reply::Late(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            None => Ok(empty_list()),
        }
    }
}

pub fn empty_list() -> ApiResponse {
    ApiResponse {
        data: json!([]),
        meta: ResponseMeta {
            status: 200,
            ..ResponseMeta::default()
        },
    }
}

pub fn no_content() -> ApiResponse {
    ApiResponse {
        data: serde_json::Value::Null,
        meta: ResponseMeta {
            status: 205,
            ..ResponseMeta::default()
        },
    }
}

/// Raw GitHub payload for one thread.
pub fn raw_notification(id: &str, unread: bool, updated_at: DateTime<Utc>) -> serde_json::Value {
    json!({
        "id": id,
        "unread": unread,
        "reason": "subscribed",
        "updated_at": updated_at.to_rfc3339(),
        "last_read_at": null,
        "subject": { "title": format!("Issue {id}"), "type": "Issue", "url": null, "latest_comment_url": null },
        "repository": {
            "id": 1,
            "name": "hello",
            "full_name": "octo/hello",
            "owner": { "login": "octo" },
            "private": false,
            "html_url": "https://github.com/octo/hello"
        },
        "url": null
    })
}

pub fn list_response(items: Vec<serde_json::Value>) -> ApiResponse {
    ApiResponse {
        data: serde_json::Value::Array(items),
        ..empty_list()
    }
}

pub fn logged_in_session() -> SessionHandle {
    let session = SessionHandle::new();
    session.signal(SessionSignal::Rehydrated);
    session.signal(SessionSignal::LoginSucceeded(
        Credential::new("ghp_test").unwrap(),
    ));
    session
}

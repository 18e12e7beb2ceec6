//! Comment class for the site's API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    client::Client,
    error::Error,
    listing::{Listing, PageStream},
    models::macros::str_opt_ref,
    result::Result,
};

/// Returns a stream of the most recent comments made site-wide.
pub fn recent(client: &Client, limit: usize) -> Listing<'_, Comment> {
    let url = client.url("comment/index.json");
    Listing::new(PageStream::new(client, url, limit))
}

/// Represents a comment made on a post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Comment {
    /// The numeric comment ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,

    /// Username of the comment author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    creator: Option<String>,

    /// User ID of the comment author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    creator_id: Option<u64>,

    /// ID of the post the comment was made on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post_id: Option<u64>,

    /// Formatted string of the comment's post time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,

    /// The comment body as entered by the author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<String>,

    /// The comment's score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    score: Option<i64>,

    /// Payload fields outside the known set, preserved verbatim.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Comment {
    /// Constructs a comment from a raw JSON payload. No network access.
    ///
    /// # Errors
    ///
    /// A payload that is not an object, or that carries wrongly typed
    /// known fields, is [`Error::MalformedResponse`].
    pub fn from_data(data: Value) -> Result<Self> {
        serde_json::from_value(data).map_err(|_| Error::MalformedResponse {
            url: String::from("<payload>"),
        })
    }

    /// Fetches a comment from the site by its ID number.
    ///
    /// Stored credentials are included with the request when present; the
    /// site withholds some comments from anonymous callers.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no comment carries that ID; fetch and decode
    /// failures propagate.
    pub async fn new(client: &Client, id: u64) -> Result<Self> {
        let (login, password_hash) = match client.credentials() {
            Some(credentials) => (credentials.name, credentials.password_hash),
            None => (String::new(), String::new()),
        };
        let url = client.url("comment/show.json");
        let data: Value = client
            .post_form(
                &url,
                &[
                    ("id", id.to_string()),
                    ("login", login),
                    ("password_hash", password_hash),
                ],
            )
            .await?;
        match data.get("id") {
            Some(found) if !found.is_null() => Self::from_data(data),
            _ => Err(Error::NotFound {
                kind: "comment",
                ident: id.to_string(),
            }),
        }
    }

    /// Returns the comment ID.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Returns the username of the comment author.
    pub fn creator(&self) -> Option<&str> {
        str_opt_ref!(self.creator)
    }

    /// Returns the user ID of the comment author.
    pub fn creator_id(&self) -> Option<u64> {
        self.creator_id
    }

    /// Returns the ID of the post the comment was made on.
    pub fn post_id(&self) -> Option<u64> {
        self.post_id
    }

    /// Returns a formatted string of the comment's post time.
    pub fn created_at(&self) -> Option<&str> {
        str_opt_ref!(self.created_at)
    }

    /// Returns the comment body as entered by the author.
    pub fn body(&self) -> Option<&str> {
        str_opt_ref!(self.body)
    }

    /// Returns the comment's score.
    pub fn score(&self) -> Option<i64> {
        self.score
    }

    /// Returns the payload fields outside the known set.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Returns every locally stored field of the comment as a JSON object.
    pub fn dump_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Posts this comment to the site. Requires stored credentials.
    ///
    /// The comment's `post_id` and `body` fields form the submission.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] before any network call when no credentials
    /// are stored; [`Error::NotFound`] when the comment has no `post_id`;
    /// fetch and decode failures propagate.
    pub async fn submit(&self, client: &Client) -> Result<Value> {
        let credentials = client.require_login()?;
        let post_id = self.post_id.ok_or(Error::NotFound {
            kind: "post",
            ident: String::from("(unset id)"),
        })?;
        let url = client.url("comment/create.json");
        client
            .post_form(
                &url,
                &[
                    ("post_id", post_id.to_string()),
                    ("comment", self.body.clone().unwrap_or_default()),
                    ("login", credentials.name),
                    ("password_hash", credentials.password_hash),
                ],
            )
            .await
    }
}

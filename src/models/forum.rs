//! Forum post and thread classes for the site's API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    client::Client,
    error::Error,
    listing::{Listing, PageStream},
    models::macros::str_opt_ref,
    result::Result,
};

/// Returns a stream of recently active forum posts.
pub fn recent(client: &Client, limit: usize) -> Listing<'_, ForumPost> {
    let url = client.url("forum/index.json");
    Listing::new(PageStream::new(client, url, limit))
}

/// Represents a single post on the site's forum.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForumPost {
    /// The numeric forum post ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,

    /// Username of the poster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    creator: Option<String>,

    /// User ID of the poster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    creator_id: Option<u64>,

    /// ID of the parent thread's head post; absent on the head itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<u64>,

    /// Title of the post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,

    /// The post's body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<String>,

    /// Payload fields outside the known set, preserved verbatim.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl ForumPost {
    /// Constructs a forum post from a raw JSON payload. No network access.
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

    /// Fetches a forum post from the site by its ID number.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no forum post carries that ID; fetch and
    /// decode failures propagate.
    pub async fn new(client: &Client, id: u64) -> Result<Self> {
        let url = client.url(&format!("forum/show.json?id={id}"));
        let data: Value = client.fetch_json(&url).await?;
        match data.get("id") {
            Some(found) if !found.is_null() => Self::from_data(data),
            _ => Err(Error::NotFound {
                kind: "forum post",
                ident: id.to_string(),
            }),
        }
    }

    /// Returns the ID number of the post.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Returns the username of the poster.
    pub fn creator(&self) -> Option<&str> {
        str_opt_ref!(self.creator)
    }

    /// Returns the user ID of the poster.
    pub fn creator_id(&self) -> Option<u64> {
        self.creator_id
    }

    /// Returns the ID of the parent thread's head post.
    pub fn parent_id(&self) -> Option<u64> {
        self.parent_id
    }

    /// Returns the title of the post.
    pub fn title(&self) -> Option<&str> {
        str_opt_ref!(self.title)
    }

    /// Returns the post's body.
    pub fn body(&self) -> Option<&str> {
        str_opt_ref!(self.body)
    }

    /// Returns the payload fields outside the known set.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Returns every locally stored field of the post as a JSON object.
    pub fn dump_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Fetches the thread this post belongs to: its parent thread, or the
    /// thread it heads when it has no parent.
    ///
    /// # Errors
    ///
    /// Fails if the post has no ID, or if any of the thread fetches fail.
    pub async fn thread(&self, client: &Client) -> Result<Thread> {
        let head = self.parent_id.or(self.id).ok_or(Error::NotFound {
            kind: "forum post",
            ident: String::from("(unset id)"),
        })?;
        Thread::new(client, head).await
    }
}

/// A forum thread: one head post plus its replies.
///
/// Replies are stored oldest-first. The site serves them newest-first; the
/// paginated arrival order is reversed once, after the walk completes, so
/// iteration reads chronologically.
#[derive(Debug, Clone)]
pub struct Thread {
    op: ForumPost,
    replies: Vec<ForumPost>,
}

impl Thread {
    /// Constructs a `Thread` from the head post's ID, walking every page
    /// of its replies.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the head post does not exist; any failed
    /// reply-page fetch aborts construction.
    pub async fn new(client: &Client, id: u64) -> Result<Self> {
        let op = ForumPost::new(client, id).await?;
        let url = client.url(&format!("forum/index.json?parent_id={id}"));
        let mut pages = PageStream::new(client, url, 0);
        let mut replies = Vec::new();
        while let Some(items) = pages.next_page().await? {
            for item in items {
                replies.push(ForumPost::from_data(item)?);
            }
        }
        replies.reverse();
        Ok(Thread { op, replies })
    }

    /// Returns the thread's head post.
    pub fn op(&self) -> &ForumPost {
        &self.op
    }

    /// Returns the thread's replies, oldest first.
    pub fn replies(&self) -> &[ForumPost] {
        &self.replies
    }
}

impl std::ops::Deref for Thread {
    type Target = Vec<ForumPost>;

    fn deref(&self) -> &Self::Target {
        &self.replies
    }
}

//! Post class for the site's API: searching, fetching, voting and
//! downloading image posts.

use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    client::Client,
    error::Error,
    listing::{Listing, PageStream},
    models::{comment::Comment, macros::str_opt_ref},
    result::Result,
};

/// Runs a tag search and returns a lazy stream of matching posts.
///
/// The query string is passed through to the site verbatim (only
/// percent-encoded); `limit` caps the total number of posts fetched across
/// all pages, with zero meaning unlimited. The page that crosses the cap is
/// still yielded in full.
pub fn search<'c>(client: &'c Client, query: &str, limit: usize) -> Listing<'c, Post> {
    let per_page = if limit > 0 { limit } else { 100 };
    let url = client.url(&format!(
        "post/index.json?tags={}&limit={per_page}",
        urlencoding::encode(query)
    ));
    Listing::new(PageStream::new(client, url, limit))
}

/// Returns a stream of the most recent posts on the site.
pub fn recent(client: &Client, limit: usize) -> Listing<'_, Post> {
    let per_page = if limit > 0 { limit } else { 75 };
    let url = client.url(&format!("post/index.json?limit={per_page}"));
    Listing::new(PageStream::new(client, url, limit))
}

/// Fetches the popular posts for a single day, today if `date` is `None`.
///
/// # Errors
///
/// Fails if the listing cannot be fetched or decoded.
pub async fn popular_by_day(client: &Client, date: Option<NaiveDate>) -> Result<Vec<Post>> {
    popular(client, "post/popular_by_day.json", date, false).await
}

/// Fetches the popular posts for the week starting at `date`, the current
/// week if `None`.
///
/// # Errors
///
/// Fails if the listing cannot be fetched or decoded.
pub async fn popular_by_week(client: &Client, date: Option<NaiveDate>) -> Result<Vec<Post>> {
    popular(client, "post/popular_by_week.json", date, false).await
}

/// Fetches the popular posts for a single month; the day component of
/// `date` is ignored.
///
/// # Errors
///
/// Fails if the listing cannot be fetched or decoded.
pub async fn popular_by_month(client: &Client, date: Option<NaiveDate>) -> Result<Vec<Post>> {
    popular(client, "post/popular_by_month.json", date, true).await
}

async fn popular(
    client: &Client,
    endpoint: &str,
    date: Option<NaiveDate>,
    month_only: bool,
) -> Result<Vec<Post>> {
    let url = match date {
        Some(date) if month_only => client.url(&format!(
            "{endpoint}?month={}&year={}",
            date.month(),
            date.year()
        )),
        Some(date) => client.url(&format!(
            "{endpoint}?day={}&month={}&year={}",
            date.day(),
            date.month(),
            date.year()
        )),
        None => client.url(endpoint),
    };
    let items: Vec<Value> = client.fetch_json(&url).await?;
    items.into_iter().map(Post::from_data).collect()
}

/// The up- or downvote sent with [`Post::vote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    /// Score the post up.
    Up,
    /// Score the post down.
    Down,
}

impl Vote {
    fn score(self) -> &'static str {
        match self {
            Vote::Up => "1",
            Vote::Down => "-1",
        }
    }
}

/// Represents a single image post on the site.
///
/// Every known field is optional; fields absent from the source payload
/// read as `None`. Payload fields outside the known set are preserved
/// verbatim and reachable through [`Post::extra`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Post {
    /// The numeric post ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,

    /// Username of the uploader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author: Option<String>,

    /// User ID of the uploader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    creator_id: Option<u64>,

    /// Upload time, in the site's structured time shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<Value>,

    /// Status of the post: active, flagged, pending, deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,

    /// The post's first source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,

    /// All of the post's sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sources: Option<Vec<String>>,

    /// Space-separated tag string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tags: Option<String>,

    /// The post's description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    /// The post's score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    score: Option<i64>,

    /// The post's rating: `e`, `q` or `s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rating: Option<String>,

    /// ID of the post's parent, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<u64>,

    /// Whether the post has child posts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    has_children: Option<bool>,

    /// Comma-separated IDs of the post's children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    children: Option<String>,

    /// Whether the post has translation notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    has_notes: Option<bool>,

    /// Whether the post has comments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    has_comments: Option<bool>,

    /// MD5 checksum of the file, as a hex digest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    md5: Option<String>,

    /// URL of the image file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_url: Option<String>,

    /// The file's extension: png, gif, jpg, swf, webm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_ext: Option<String>,

    /// Size of the file in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_size: Option<u64>,

    /// Width of the image in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    width: Option<u32>,

    /// Height of the image in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    height: Option<u32>,

    /// URL of the scaled sample image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sample_url: Option<String>,

    /// Width of the sample image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sample_width: Option<u32>,

    /// Height of the sample image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sample_height: Option<u32>,

    /// URL of the preview thumbnail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preview_url: Option<String>,

    /// Width of the preview thumbnail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preview_width: Option<u32>,

    /// Height of the preview thumbnail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preview_height: Option<u32>,

    /// Change sequence number of the post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    change: Option<u64>,

    /// Payload fields outside the known set, preserved verbatim.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Post {
    /// Constructs a post from a raw JSON payload. No network access.
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

    /// Fetches a post from the site by its ID number.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no post carries that ID; fetch and decode
    /// failures propagate.
    pub async fn new(client: &Client, id: u64) -> Result<Self> {
        let url = client.url(&format!("post/show.json?id={id}"));
        let data: Value = client.fetch_json(&url).await?;
        match data.get("id") {
            Some(found) if !found.is_null() => Self::from_data(data),
            _ => Err(Error::NotFound {
                kind: "post",
                ident: id.to_string(),
            }),
        }
    }

    /// Returns the ID number of the post.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Returns the username of the uploader.
    pub fn author(&self) -> Option<&str> {
        str_opt_ref!(self.author)
    }

    /// Returns the user ID of the uploader.
    pub fn creator_id(&self) -> Option<u64> {
        self.creator_id
    }

    /// Returns the site's structured representation of the upload time.
    pub fn created_at(&self) -> Option<&Value> {
        self.created_at.as_ref()
    }

    /// Returns the status of the post: active, flagged, pending, deleted.
    pub fn status(&self) -> Option<&str> {
        str_opt_ref!(self.status)
    }

    /// Returns the post's first source.
    pub fn source(&self) -> Option<&str> {
        str_opt_ref!(self.source)
    }

    /// Returns all of the post's sources.
    pub fn sources(&self) -> Option<&[String]> {
        self.sources.as_deref()
    }

    /// Returns the post's tags.
    pub fn tags(&self) -> Vec<&str> {
        self.tags
            .as_deref()
            .map(|tags| tags.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Returns the post's description.
    pub fn description(&self) -> Option<&str> {
        str_opt_ref!(self.description)
    }

    /// Returns the post's score.
    pub fn score(&self) -> Option<i64> {
        self.score
    }

    /// Returns the post's rating: `e`, `q` or `s`.
    pub fn rating(&self) -> Option<&str> {
        str_opt_ref!(self.rating)
    }

    /// Returns the post's parent post ID.
    pub fn parent_id(&self) -> Option<u64> {
        self.parent_id
    }

    /// Returns whether the post has children.
    pub fn has_children(&self) -> Option<bool> {
        self.has_children
    }

    /// Returns the IDs of the post's children.
    pub fn children(&self) -> Vec<&str> {
        self.children
            .as_deref()
            .map(|ids| ids.split(',').filter(|id| !id.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Returns whether the post has any notes.
    pub fn has_notes(&self) -> Option<bool> {
        self.has_notes
    }

    /// Returns whether the post has any comments.
    pub fn has_comments(&self) -> Option<bool> {
        self.has_comments
    }

    /// Returns the post's MD5 checksum as a hex digest.
    pub fn md5(&self) -> Option<&str> {
        str_opt_ref!(self.md5)
    }

    /// Returns the URL of the image file.
    pub fn file_url(&self) -> Option<&str> {
        str_opt_ref!(self.file_url)
    }

    /// Returns the file's extension: png, gif, jpg, swf, webm.
    pub fn file_ext(&self) -> Option<&str> {
        str_opt_ref!(self.file_ext)
    }

    /// Returns the size in bytes of the file.
    pub fn file_size(&self) -> Option<u64> {
        self.file_size
    }

    /// Returns the dimensions of the image in a tuple: (WIDTH, HEIGHT).
    pub fn dimensions(&self) -> (Option<u32>, Option<u32>) {
        (self.width, self.height)
    }

    /// Returns the URL of the scaled sample image.
    pub fn sample_url(&self) -> Option<&str> {
        str_opt_ref!(self.sample_url)
    }

    /// Returns the dimensions of the sample image.
    pub fn sample_dimensions(&self) -> (Option<u32>, Option<u32>) {
        (self.sample_width, self.sample_height)
    }

    /// Returns the URL of the preview thumbnail.
    pub fn preview_url(&self) -> Option<&str> {
        str_opt_ref!(self.preview_url)
    }

    /// Returns the dimensions of the preview thumbnail.
    pub fn preview_dimensions(&self) -> (Option<u32>, Option<u32>) {
        (self.preview_width, self.preview_height)
    }

    /// Returns the change sequence number of the post.
    pub fn change(&self) -> Option<u64> {
        self.change
    }

    /// Returns the payload fields outside the known set.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Returns every locally stored field of the post as a JSON object,
    /// pass-through fields included.
    pub fn dump_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub(crate) fn field_map(&self) -> Map<String, Value> {
        match self.dump_data() {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Fetches the comments made on this post, oldest first.
    ///
    /// The site serves comments newest-first; they are reversed here so
    /// iteration reads chronologically.
    ///
    /// # Errors
    ///
    /// Fails if the post has no ID, or if the fetch or decode fails.
    pub async fn comments(&self, client: &Client) -> Result<Vec<Comment>> {
        let id = self.known_id()?;
        let url = client.url(&format!("comment/index.json?post_id={id}"));
        let mut data: Vec<Value> = client.fetch_json(&url).await?;
        data.reverse();
        data.into_iter().map(Comment::from_data).collect()
    }

    /// Fetches the usernames of everyone who favorited this post.
    ///
    /// # Errors
    ///
    /// Fails if the post has no ID, or if the fetch or decode fails.
    pub async fn favorited_users(&self, client: &Client) -> Result<Vec<String>> {
        let id = self.known_id()?;
        let url = client.url(&format!("favorite/list_users.json?id={id}"));
        let data: Value = client.fetch_json(&url).await?;
        let names = data
            .get("favorited_users")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(names
            .split(',')
            .filter(|name| !name.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    /// Fetches the tag changes made to this post, as raw records.
    ///
    /// # Errors
    ///
    /// Fails if the post has no ID, or if the fetch or decode fails.
    pub async fn tag_history(&self, client: &Client) -> Result<Vec<Value>> {
        let id = self.known_id()?;
        let url = client.url(&format!("post_tag_history/index.json?post_id={id}"));
        client.fetch_json(&url).await
    }

    /// Fetches the flags raised on this post, as raw records.
    ///
    /// # Errors
    ///
    /// Fails if the post has no ID, or if the fetch or decode fails.
    pub async fn flag_history(&self, client: &Client) -> Result<Vec<Value>> {
        let id = self.known_id()?;
        let url = client.url(&format!("post_flag_history/index.json?post_id={id}"));
        client.fetch_json(&url).await
    }

    /// Downloads the post's file into `dest` under `file_name`.
    ///
    /// # Errors
    ///
    /// Fails if the post carries no file URL, if the server answers with an
    /// HTML page in place of file content, or on any transport or
    /// filesystem failure. [`Error::SiteOverloaded`] is surfaced distinctly
    /// so callers can retry the identical download.
    pub async fn download(&self, client: &Client, dest: &Path, file_name: &str) -> Result<()> {
        let file_url = match self.file_url.as_deref() {
            Some(url) => url,
            None => {
                return Err(Error::NotFound {
                    kind: "file",
                    ident: self.ident(),
                })
            }
        };
        let (bytes, content_type) = client.fetch_bytes(file_url).await?;
        if content_type.map_or(false, |kind| kind.contains("text/html")) {
            return Err(Error::MalformedResponse {
                url: file_url.to_string(),
            });
        }
        tokio::fs::create_dir_all(dest).await?;
        tokio::fs::write(dest.join(file_name), bytes).await?;
        Ok(())
    }

    /// Casts an up- or downvote on the post. Requires stored credentials.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] before any network call when no credentials
    /// are stored; otherwise fetch and decode failures propagate.
    pub async fn vote(&self, client: &Client, vote: Vote) -> Result<Value> {
        let id = self.known_id()?;
        let credentials = client.require_login()?;
        let url = client.url("post/vote.json");
        client
            .post_form(
                &url,
                &[
                    ("id", id.to_string()),
                    ("score", vote.score().to_string()),
                    ("login", credentials.name),
                    ("password_hash", credentials.password_hash),
                ],
            )
            .await
    }

    fn known_id(&self) -> Result<u64> {
        self.id.ok_or(Error::NotFound {
            kind: "post",
            ident: String::from("(unset id)"),
        })
    }

    fn ident(&self) -> String {
        self.id
            .map_or_else(|| String::from("(unset id)"), |id| id.to_string())
    }
}

//! Takedown class for the site's API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    client::Client,
    error::Error,
    models::{macros::str_opt_ref, user::User},
    result::Result,
};

/// Represents a takedown request filed against posts on the site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Takedown {
    /// The numeric takedown ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,

    /// The source posted by the submitter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,

    /// Space-separated IDs of posts that were not removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    posts: Option<String>,

    /// The current status of the takedown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,

    /// The submitter's email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,

    /// Submission time, in the site's structured time shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<Value>,

    /// Last edit time, in the site's structured time shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<Value>,

    /// The specified reason for the takedown request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,

    /// Moderator notes on the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,

    /// Identifier of the request's approver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    approver: Option<Value>,

    /// Unique code used to verify the takedown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vericode: Option<String>,

    /// The submitter's IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ip_addr: Option<String>,

    /// Whether the submitter hid the reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hidereason: Option<bool>,

    /// Space-separated IDs of posts deleted by the takedown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delposts: Option<String>,

    /// Payload fields outside the known set, preserved verbatim.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Takedown {
    /// Constructs a takedown from a raw JSON payload. No network access.
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

    /// Fetches a takedown from the site by its ID number.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no takedown carries that ID; fetch and
    /// decode failures propagate.
    pub async fn new(client: &Client, id: u64) -> Result<Self> {
        let url = client.url(&format!("takedown/show.json?id={id}"));
        let data: Value = client.fetch_json(&url).await?;
        match data.get("id") {
            Some(found) if !found.is_null() => Self::from_data(data),
            _ => Err(Error::NotFound {
                kind: "takedown",
                ident: id.to_string(),
            }),
        }
    }

    /// Returns the ID number of the takedown.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Returns the source posted by the submitter.
    pub fn source(&self) -> Option<&str> {
        str_opt_ref!(self.source)
    }

    /// Returns the current status of the takedown.
    pub fn status(&self) -> Option<&str> {
        str_opt_ref!(self.status)
    }

    /// Returns the submitter's email address.
    pub fn email(&self) -> Option<&str> {
        str_opt_ref!(self.email)
    }

    /// Returns the site's structured representation of the submission time.
    pub fn created_at(&self) -> Option<&Value> {
        self.created_at.as_ref()
    }

    /// Returns the site's structured representation of the last edit.
    pub fn updated_at(&self) -> Option<&Value> {
        self.updated_at.as_ref()
    }

    /// Returns the specified reason for the takedown request.
    pub fn reason(&self) -> Option<&str> {
        str_opt_ref!(self.reason)
    }

    /// Returns any moderator notes on the request.
    pub fn notes(&self) -> Option<&str> {
        str_opt_ref!(self.notes)
    }

    /// Fetches the user account of the request's approver, if one is set.
    ///
    /// # Errors
    ///
    /// Lookup failures for the approver's account propagate.
    pub async fn approver(&self, client: &Client) -> Result<Option<User>> {
        let ident = match &self.approver {
            Some(Value::String(name)) => name.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Ok(None),
        };
        User::new(client, &ident).await.map(Some)
    }

    /// Returns the unique code used to verify the takedown.
    pub fn vericode(&self) -> Option<&str> {
        str_opt_ref!(self.vericode)
    }

    /// Returns the submitter's IP address.
    pub fn ip_addr(&self) -> Option<&str> {
        str_opt_ref!(self.ip_addr)
    }

    /// Returns whether the submitter hid the reason.
    pub fn hidereason(&self) -> Option<bool> {
        self.hidereason
    }

    /// Returns the IDs of posts deleted by the takedown.
    pub fn delposts(&self) -> Vec<&str> {
        self.delposts
            .as_deref()
            .map(|ids| ids.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Returns the IDs of posts that were not removed.
    pub fn posts(&self) -> Vec<&str> {
        self.posts
            .as_deref()
            .map(|ids| ids.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Returns the payload fields outside the known set.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Returns every locally stored field of the takedown as a JSON
    /// object.
    pub fn dump_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

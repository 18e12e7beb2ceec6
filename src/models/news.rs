//! News class for the site's API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{error::Error, models::macros::str_opt_ref, result::Result};

/// Represents a site news item.
///
/// News items only ever arrive embedded in other payloads, so there is no
/// fetch-by-identifier constructor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct News {
    /// The numeric news post ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,

    /// ID of the user who submitted the post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<u64>,

    /// Creation time, in the site's structured time shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<Value>,

    /// Last update time, in the site's structured time shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<Value>,

    /// The body of the post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post: Option<String>,

    /// Payload fields outside the known set, preserved verbatim.
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl News {
    /// Constructs a news item from a raw JSON payload. No network access.
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

    /// Returns the ID number of the news post.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Returns the ID of the user who submitted the post.
    pub fn user_id(&self) -> Option<u64> {
        self.user_id
    }

    /// Returns the site's structured representation of the creation time.
    pub fn created_at(&self) -> Option<&Value> {
        self.created_at.as_ref()
    }

    /// Returns the site's structured representation of the last update.
    pub fn updated_at(&self) -> Option<&Value> {
        self.updated_at.as_ref()
    }

    /// Returns the body of the post.
    pub fn post(&self) -> Option<&str> {
        str_opt_ref!(self.post)
    }

    /// Returns the payload fields outside the known set.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Returns every locally stored field of the news item as a JSON
    /// object.
    pub fn dump_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

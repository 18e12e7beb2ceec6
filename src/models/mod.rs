//! Entity model modules, plus the shared lookup and template helpers.

pub mod comment;
pub mod forum;
pub mod news;
pub mod pool;
pub mod post;
pub mod tag;
pub mod takedown;
pub mod ticket;
pub mod user;

use serde_json::{Map, Value};

use crate::{client::Client, error::Error, result::Result};

/// Picks the lookup parameter for an ambiguous identifier: identifiers
/// that parse as integers resolve by `id`, anything else by `name`.
pub(crate) fn lookup_param(ident: &str) -> &'static str {
    if ident.parse::<i64>().is_ok() {
        "id"
    } else {
        "name"
    }
}

/// Runs a single-item search and returns the first result.
///
/// An empty result set is [`Error::NotFound`], never an empty collection.
pub(crate) async fn lookup_first(
    client: &Client,
    url: &str,
    kind: &'static str,
    ident: &str,
) -> Result<Value> {
    let mut results: Vec<Value> = client.fetch_json(url).await?;
    if results.is_empty() {
        return Err(Error::NotFound {
            kind,
            ident: ident.to_string(),
        });
    }
    Ok(results.remove(0))
}

/// Renders a `{field}`-style filename template against an entity's
/// serialized field map. Unknown placeholders are left untouched; null
/// fields render as the empty string.
pub(crate) fn bind_template(template: &str, fields: &Map<String, Value>) -> String {
    let mut name = String::from(template);
    for (key, value) in fields {
        let placeholder = format!("{{{key}}}");
        if !name.contains(&placeholder) {
            continue;
        }
        let rendered = match value {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        name = name.replace(&placeholder, &rendered);
    }
    name
}

pub(crate) mod macros {
    macro_rules! str_opt_ref {
        ($x:expr) => {
            $x.as_ref().map(|x| x.as_ref())
        };
    }

    pub(crate) use str_opt_ref;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    #[test]
    fn numeric_identifiers_resolve_by_id() {
        assert_eq!(super::lookup_param("123"), "id");
        assert_eq!(super::lookup_param("-4"), "id");
        assert_eq!(super::lookup_param("scalie"), "name");
        assert_eq!(super::lookup_param("12monkeys"), "name");
    }

    #[test]
    fn template_binding_renders_fields() {
        let fields = json!({
            "md5": "0abc",
            "file_ext": "png",
            "id": 77,
            "source": null,
        });
        let fields = fields.as_object().unwrap();
        assert_eq!(super::bind_template("{md5}.{file_ext}", fields), "0abc.png");
        assert_eq!(super::bind_template("{id} - {md5}", fields), "77 - 0abc");
        assert_eq!(super::bind_template("{source}x", fields), "x");
        assert_eq!(super::bind_template("{unknown}", fields), "{unknown}");
    }
}

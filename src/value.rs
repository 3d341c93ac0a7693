//! Conversions from book types into template [`Value`]s.

use crate::document::{DocId, Document};
use crate::loader::Library;
use crate::navigation::Navigation;
use crate::url::Sitemap;
use gtmpl::Value;
use std::collections::HashMap;
use url::Url;

/// A document paired with its output URL: what templates see for `prev`,
/// `next`, and table-of-contents entries.
pub(crate) struct DocLink<'a> {
    pub document: &'a Document,
    pub url: &'a Url,
}

impl<'a> DocLink<'a> {
    pub fn find(
        library: &'a Library,
        sitemap: &'a Sitemap,
        id: &DocId,
    ) -> Option<DocLink<'a>> {
        Some(DocLink {
            document: library.get(id)?,
            url: sitemap.url(id)?,
        })
    }

    fn to_map(&self) -> HashMap<String, Value> {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("id".to_owned(), Value::String(self.document.id.to_string()));
        m.insert(
            "title".to_owned(),
            Value::String(self.document.title.clone()),
        );
        m.insert("url".to_owned(), Value::String(self.url.to_string()));
        m
    }
}

impl From<&DocLink<'_>> for Value {
    /// Converts a [`DocLink`] into a [`Value::Object`] with fields `id`,
    /// `title`, and `url`.
    fn from(link: &DocLink<'_>) -> Value {
        Value::Object(link.to_map())
    }
}

/// Converts an optional link into a value; `None` becomes `nil` so templates
/// can test it with `{{ if .prev }}`.
pub(crate) fn optional(link: Option<DocLink<'_>>) -> Value {
    match link {
        Some(link) => Value::from(&link),
        None => Value::Nil,
    }
}

/// Builds the table of contents: one array per navigation sequence, each
/// entry a link object with an extra `current` flag marking `current`.
pub(crate) fn table_of_contents(
    navigation: &Navigation,
    library: &Library,
    sitemap: &Sitemap,
    current: &DocId,
) -> Value {
    Value::Array(
        navigation
            .sequences()
            .iter()
            .map(|sequence| {
                Value::Array(
                    sequence
                        .iter()
                        .filter_map(|id| DocLink::find(library, sitemap, id))
                        .map(|link| {
                            let mut m = link.to_map();
                            m.insert(
                                "current".to_owned(),
                                Value::Bool(&link.document.id == current),
                            );
                            Value::Object(m)
                        })
                        .collect(),
                )
            })
            .collect(),
    )
}

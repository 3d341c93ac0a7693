//! Link destinations and output URLs. [`classify`] decides whether a link
//! destination in a document body is a cross-reference and, if so, which
//! identifier it names. [`Sitemap`] maps identifiers to absolute output URLs.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use percent_encoding::percent_decode_str;
use url::{ParseError, Url};

use crate::document::{DocId, MARKDOWN_EXTENSION};
use crate::loader::Library;

/// The scheme prefix for identifier references, e.g. `ref:io/console/IO`.
pub const REF_SCHEME: &str = "ref:";

/// The target of a cross-reference, as parsed from a link destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    /// The normalized identifier, or `None` if the destination can't name a
    /// document (e.g. a relative path climbing above the content root).
    pub id: Option<DocId>,

    /// The target as written, less any fragment.
    pub written: String,

    /// The fragment (without `#`), if any.
    pub fragment: Option<String>,
}

/// Classifies a link destination found in the document at `source_path`
/// (relative to the content directory). Returns `None` for destinations that
/// aren't cross-references: absolute URLs, root-relative paths, bare
/// fragments, and relative links to anything other than markdown files.
///
/// Two forms are cross-references:
///
/// * `ref:{identifier}[#{fragment}]`, naming an identifier relative to the
///   content root.
/// * a relative path ending in `.md` (e.g. `../io.md#read`), resolved
///   against the directory containing the source file. Any query string is
///   ignored.
///
/// Percent-escapes in either form are decoded, so `my%20page.md` names the
/// file `my page.md`.
pub fn classify(source_path: &Path, destination: &str) -> Option<Target> {
    if let Some(rest) = destination.strip_prefix(REF_SCHEME) {
        let (path, fragment) = split_fragment(rest);
        let path = percent_decode_str(path).decode_utf8().ok()?;
        return Some(Target {
            id: DocId::normalize(&path),
            written: path.into_owned(),
            fragment,
        });
    }

    if destination.starts_with('/') || destination.starts_with('#') {
        return None;
    }
    match Url::parse(destination) {
        Err(ParseError::RelativeUrlWithoutBase) => {}
        // Absolute URLs (and anything unparseable) are left alone.
        _ => return None,
    }

    // A query means nothing to a static page; the path is what's linked.
    let (path, fragment) = split_fragment(destination);
    let path = path.split_once('?').map_or(path, |(path, _)| path);
    let path = percent_decode_str(path).decode_utf8().ok()?;
    if !path.ends_with(MARKDOWN_EXTENSION) {
        return None;
    }
    Some(Target {
        id: join_relative(source_path.parent(), &path)
            .and_then(|p| DocId::normalize(&p)),
        written: path.into_owned(),
        fragment,
    })
}

fn split_fragment(destination: &str) -> (&str, Option<String>) {
    match destination.split_once('#') {
        Some((path, fragment)) if !fragment.is_empty() => {
            (path, Some(fragment.to_owned()))
        }
        Some((path, _)) => (path, None),
        None => (destination, None),
    }
}

// Joins a `/`-separated relative path onto a base directory, collapsing `.`
// and `..` segments. Returns `None` if the result would climb above the root.
fn join_relative(base: Option<&Path>, relative: &str) -> Option<String> {
    let mut segments: Vec<String> = Vec::new();
    if let Some(base) = base {
        for component in base.components() {
            if let Component::Normal(segment) = component {
                segments.push(segment.to_str()?.to_owned());
            }
        }
    }
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            _ => segments.push(segment.to_owned()),
        }
    }
    Some(segments.join("/"))
}

/// Maps every document of a [`Library`] to its absolute output URL.
#[derive(Clone, Debug)]
pub struct Sitemap {
    root: Url,
    urls: BTreeMap<DocId, Url>,
}

impl Sitemap {
    /// Builds the sitemap. Each segment of an output path is
    /// percent-encoded, so a page named `defined?` is served from
    /// `defined%3F.html` rather than growing a query string.
    pub fn new(
        library: &Library,
        site_root: &Url,
    ) -> Result<Sitemap, ParseError> {
        let mut urls = BTreeMap::new();
        for document in library.iter() {
            urls.insert(
                document.id.clone(),
                output_url(site_root, &document.output_path)?,
            );
        }
        Ok(Sitemap {
            root: site_root.clone(),
            urls,
        })
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    pub fn url(&self, id: &DocId) -> Option<&Url> {
        self.urls.get(id)
    }
}

// Appends the segments of `output_path` to the directory `site_root`. A
// site root that can't be a base fails the same way [`Url::join`] would.
fn output_url(site_root: &Url, output_path: &str) -> Result<Url, ParseError> {
    let mut url = site_root.clone();
    url.path_segments_mut()
        .map_err(|()| ParseError::RelativeUrlWithoutBase)?
        .pop_if_empty()
        .extend(output_path.split('/'));
    Ok(url)
}

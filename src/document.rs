//! Defines the [`DocId`] and [`Document`] types along with the front-matter
//! grammar used to parse a [`Document`] out of a content file.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::navigation::Direction;

pub(crate) const MARKDOWN_EXTENSION: &str = ".md";
pub(crate) const HTML_EXTENSION: &str = ".html";
const INDEX_STEM: &str = "index";
const FENCE: &str = "---";

/// Identifies a [`Document`]. The identifier is the source path relative to
/// the content directory, `/`-separated, less the `.md` extension. A bundle
/// file (`{dir}/index.md`) is identified by its directory, so `io/index.md`
/// and `io.md` would both be `io`. The root `index.md` is `index`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId(String);

impl DocId {
    /// Derives the identifier for a source file. Returns `None` if the path
    /// isn't a relative, UTF-8 path to a markdown file.
    pub fn from_source_path(path: &Path) -> Option<DocId> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_str()?),
                Component::CurDir => {}
                _ => return None,
            }
        }

        let file_name = segments.pop()?;
        let stem = file_name.strip_suffix(MARKDOWN_EXTENSION)?;
        if stem.is_empty() {
            return None;
        }
        if stem != INDEX_STEM || segments.is_empty() {
            segments.push(stem);
        }
        Some(DocId(segments.join("/")))
    }

    /// Normalizes an identifier as written by an author (in a `prev`/`next`
    /// field or a `ref:` link). Leading `./` and `/`, trailing `/`, a
    /// trailing `.md` or `.html` extension, and a trailing `/index` are all
    /// removed, so `./io/console/index.md` and `io/console` are the same
    /// identifier. Returns `None` when nothing is left.
    pub fn normalize(raw: &str) -> Option<DocId> {
        let s = raw.trim();
        let s = s.strip_prefix("./").unwrap_or(s);
        let s = s.trim_start_matches('/');
        let s = s.strip_suffix('/').unwrap_or(s);
        let s = s
            .strip_suffix(MARKDOWN_EXTENSION)
            .or_else(|| s.strip_suffix(HTML_EXTENSION))
            .unwrap_or(s);
        let s = s.strip_suffix("/index").unwrap_or(s);
        match s.is_empty() {
            true => None,
            false => Some(DocId(s.to_owned())),
        }
    }

    /// Wraps a string verbatim. Used for diagnostics about files that have
    /// no proper identifier.
    pub(crate) fn verbatim(s: impl Into<String>) -> DocId {
        DocId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The default output path for the document: `{id}.html`.
    pub fn default_output_path(&self) -> String {
        format!("{}{}", self.0, HTML_EXTENSION)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single page of the book, parsed from one content file. Documents are
/// created by [`crate::loader::load`] and not modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    /// The document's identifier. See [`DocId`].
    pub id: DocId,

    /// The path of the source file relative to the content directory.
    pub source_path: PathBuf,

    /// The title from the front-matter. Never empty.
    pub title: String,

    /// The document preceding this one in reading order, if declared.
    pub prev: Option<DocId>,

    /// The document following this one in reading order, if declared.
    pub next: Option<DocId>,

    /// The permalink exactly as written in the front-matter.
    pub permalink: Option<String>,

    /// The `/`-separated path of the rendered file relative to the output
    /// directory (and of its URL relative to the site root).
    pub output_path: String,

    /// The markdown body following the front-matter.
    pub body: String,
}

impl Document {
    /// Parses a document from a content file. `source_path` is relative to
    /// the content directory. Each file must be structured as follows:
    ///
    /// 1. Initial front-matter fence (`---`) on the first line
    /// 2. YAML front-matter with a required `title` and optional `prev`,
    ///    `next`, and `permalink` fields
    /// 3. Terminal front-matter fence (`---`) on its own line
    /// 4. Markdown body
    ///
    /// For example:
    ///
    /// ```md
    /// ---
    /// title: Console IO
    /// prev: io/file
    /// next: io/pipes
    /// ---
    /// # Console IO
    ///
    /// See [IO](ref:io/IO).
    /// ```
    ///
    /// The returned document's `output_path` is always the default one; the
    /// loader applies the permalink once it has been validated.
    pub fn parse(
        source_path: &Path,
        input: &str,
    ) -> Result<Document, FrontMatterError> {
        let id = DocId::from_source_path(source_path).ok_or_else(|| {
            FrontMatterError::InvalidPath(source_path.to_owned())
        })?;

        let (yaml, body) = split_front_matter(input)?;
        let front_matter: FrontMatter = serde_yaml::from_str(yaml)?;

        let title = match front_matter.title {
            Some(title) if !title.trim().is_empty() => title.trim().to_owned(),
            Some(_) => return Err(FrontMatterError::EmptyTitle),
            None => return Err(FrontMatterError::MissingTitle),
        };

        Ok(Document {
            output_path: id.default_output_path(),
            id,
            source_path: source_path.to_owned(),
            title,
            prev: front_matter.prev.as_deref().and_then(DocId::normalize),
            next: front_matter.next.as_deref().and_then(DocId::normalize),
            permalink: front_matter.permalink,
            body: body.to_owned(),
        })
    }

    /// Returns the document's `prev` or `next` pointer.
    pub fn pointer(&self, direction: Direction) -> Option<&DocId> {
        match direction {
            Direction::Prev => self.prev.as_ref(),
            Direction::Next => self.next.as_ref(),
        }
    }
}

/// Converts a permalink into an output path relative to the site root.
/// Empty and `.` segments are dropped, so `/a//./b.html` is `a/b.html`. A
/// directory-style permalink (empty or ending in `/`) gets `index.html`.
/// Returns `None` for permalinks with `..` segments, which would land
/// outside the output directory.
pub fn permalink_output_path(permalink: &str) -> Option<String> {
    let path = permalink.trim();
    let index = format!("{}{}", INDEX_STEM, HTML_EXTENSION);
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            segment => segments.push(segment),
        }
    }
    if matches!(path.rsplit('/').next(), Some("" | ".")) {
        segments.push(&index);
    }
    Some(segments.join("/"))
}

// Splits the input into its YAML and body parts. Fences are matched by
// whole lines so a `---` inside a YAML string doesn't end the front-matter.
fn split_front_matter(input: &str) -> Result<(&str, &str), FrontMatterError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut lines = input.split_inclusive('\n');
    match lines.next() {
        Some(first) if first.trim_end() == FENCE => {
            let yaml_start = first.len();
            let mut offset = yaml_start;
            for line in lines {
                if line.trim_end() == FENCE {
                    let body = &input[offset + line.len()..];
                    return Ok((&input[yaml_start..offset], body));
                }
                offset += line.len();
            }
            Err(FrontMatterError::MissingEndFence)
        }
        _ => Err(FrontMatterError::MissingStartFence),
    }
}

#[derive(Deserialize)]
struct FrontMatter {
    #[serde(default)]
    title: Option<String>,

    #[serde(default)]
    prev: Option<String>,

    #[serde(default)]
    next: Option<String>,

    #[serde(default)]
    permalink: Option<String>,
}

/// Represents a problem parsing a document's front-matter.
#[derive(Debug, thiserror::Error)]
pub enum FrontMatterError {
    /// The file doesn't begin with `---`.
    #[error("document must begin with `---`")]
    MissingStartFence,

    /// The starting fence was found but the terminal one wasn't.
    #[error("missing closing `---`")]
    MissingEndFence,

    /// The front-matter isn't a valid YAML mapping.
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The front-matter has no `title`.
    #[error("missing required field `title`")]
    MissingTitle,

    /// The `title` is blank.
    #[error("`title` is empty")]
    EmptyTitle,

    /// No identifier can be derived from the source path.
    #[error("`{}` is not a relative UTF-8 markdown path", .0.display())]
    InvalidPath(PathBuf),
}

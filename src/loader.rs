//! The document loader: turns a [`Manifest`] into a [`Library`] of
//! [`Document`]s. Bad entries are isolated. Each one produces a
//! [`Diagnostic`](crate::diagnostics::Diagnostic) and is skipped (or, for
//! output-path problems, falls back to the default path), and the rest of
//! the book loads normally.

use std::collections::{BTreeMap, HashMap};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::document::{
    permalink_output_path, DocId, Document, HTML_EXTENSION,
};
use crate::manifest::Manifest;

/// The loaded documents, keyed and iterated by [`DocId`].
#[derive(Clone, Debug, Default)]
pub struct Library {
    documents: BTreeMap<DocId, Document>,
}

impl Library {
    pub fn get(&self, id: &DocId) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn contains(&self, id: &DocId) -> bool {
        self.documents.contains_key(id)
    }

    /// Iterates over the documents in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &DocId> {
        self.documents.keys()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Loads every entry of `manifest`. Entries are processed in manifest order,
/// which decides who wins when two entries claim the same identifier or
/// output path.
pub fn load(manifest: &Manifest) -> (Library, Diagnostics) {
    let mut documents: BTreeMap<DocId, Document> = BTreeMap::new();
    let mut outputs = Outputs::default();
    let mut diagnostics = Diagnostics::default();

    for entry in manifest.entries() {
        let mut document = match Document::parse(&entry.path, &entry.contents) {
            Ok(document) => document,
            Err(err) => {
                let subject = DocId::from_source_path(&entry.path)
                    .unwrap_or_else(|| {
                        DocId::verbatim(entry.path.to_string_lossy())
                    });
                tracing::warn!(
                    path = %entry.path.display(),
                    "skipping document: {}",
                    err
                );
                diagnostics.push(
                    subject,
                    DiagnosticKind::MissingFrontMatter {
                        reason: err.to_string(),
                    },
                );
                continue;
            }
        };

        if let Some(existing) = documents.get(&document.id) {
            tracing::warn!(
                path = %entry.path.display(),
                "skipping duplicate document"
            );
            diagnostics.push(
                document.id.clone(),
                DiagnosticKind::DuplicateDocument {
                    first: existing.source_path.clone(),
                },
            );
            continue;
        }

        if let Some(permalink) = &document.permalink {
            match permalink_output_path(permalink) {
                Some(path) => document.output_path = path,
                None => diagnostics.push(
                    document.id.clone(),
                    DiagnosticKind::InvalidPermalink {
                        permalink: permalink.clone(),
                    },
                ),
            }
        }

        if let Some(other) = outputs.conflict(&document.output_path) {
            diagnostics.push(
                document.id.clone(),
                DiagnosticKind::DuplicateOutput {
                    path: document.output_path.clone(),
                    other: other.clone(),
                },
            );
            document.output_path = document.id.default_output_path();
        }
        // The default path can still collide with a permalink (or another
        // fallback); suffix the identifier until it's unique. If a parent
        // directory of the default path is taken by a file, no suffix can
        // help, so the identifier is flattened into a single file name.
        let stem = match outputs.file_above(&document.output_path) {
            true => document.id.as_str().replace('/', "-"),
            false => document.id.to_string(),
        };
        let mut attempt = 1;
        while outputs.conflict(&document.output_path).is_some() {
            document.output_path =
                format!("{}-{}{}", stem, attempt, HTML_EXTENSION);
            attempt += 1;
        }

        tracing::debug!(
            id = %document.id,
            output = %document.output_path,
            "loaded document"
        );
        outputs.insert(&document.output_path, &document.id);
        documents.insert(document.id.clone(), document);
    }

    tracing::info!(
        loaded = documents.len(),
        skipped = manifest.len() - documents.len(),
        "loaded documents"
    );
    (Library { documents }, diagnostics)
}

// The output paths claimed so far. A path conflicts with another when they
// are equal, or when one would need the other as a directory.
#[derive(Default)]
struct Outputs {
    files: HashMap<String, DocId>,
    dirs: HashMap<String, DocId>,
}

impl Outputs {
    fn conflict(&self, path: &str) -> Option<&DocId> {
        self.files
            .get(path)
            .or_else(|| self.dirs.get(path))
            .or_else(|| parent_dirs(path).find_map(|dir| self.files.get(dir)))
    }

    fn file_above(&self, path: &str) -> bool {
        parent_dirs(path).any(|dir| self.files.contains_key(dir))
    }

    fn insert(&mut self, path: &str, id: &DocId) {
        for dir in parent_dirs(path) {
            self.dirs
                .entry(dir.to_owned())
                .or_insert_with(|| id.clone());
        }
        self.files.insert(path.to_owned(), id.clone());
    }
}

// `a/b/c.html` yields `a` and `a/b`.
fn parent_dirs(path: &str) -> impl Iterator<Item = &str> + '_ {
    path.match_indices('/').map(move |(i, _)| &path[..i])
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::diagnostics::Severity;

    fn id(s: &str) -> DocId {
        DocId::normalize(s).unwrap()
    }

    #[test]
    fn test_load_skips_malformed() {
        let manifest = Manifest::from_entries(vec![
            ("intro.md", "---\ntitle: Intro\n---\nhello"),
            ("broken.md", "no front-matter here"),
            ("untitled.md", "---\nnext: intro\n---\n"),
            ("language.md", "---\ntitle: Language\n---\n"),
            ("unclosed.md", "---\ntitle: Unclosed\n"),
        ]);
        let (library, diagnostics) = load(&manifest);

        assert_eq!(2, library.len());
        assert!(library.contains(&id("intro")));
        assert!(library.contains(&id("language")));
        assert_eq!(3, diagnostics.len());
        let skipped: Vec<&str> =
            diagnostics.iter().map(|d| d.document.as_str()).collect();
        assert_eq!(vec!["broken", "untitled", "unclosed"], skipped);
        assert!(diagnostics.iter().all(|d| matches!(
            d.kind,
            DiagnosticKind::MissingFrontMatter { .. }
        )));
    }

    #[test]
    fn test_load_duplicate_identifier() {
        let manifest = Manifest::from_entries(vec![
            ("io.md", "---\ntitle: IO one\n---\n"),
            ("io/index.md", "---\ntitle: IO two\n---\n"),
        ]);
        let (library, diagnostics) = load(&manifest);

        assert_eq!(1, library.len());
        assert_eq!("IO one", library.get(&id("io")).unwrap().title);
        assert_eq!(
            vec![DiagnosticKind::DuplicateDocument {
                first: "io.md".into()
            }],
            diagnostics.iter().map(|d| d.kind.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_load_permalinks() {
        let manifest = Manifest::from_entries(vec![
            ("a.md", "---\ntitle: A\npermalink: /docs/a/\n---\n"),
            ("b.md", "---\ntitle: B\npermalink: ../../etc/b.html\n---\n"),
            ("c.md", "---\ntitle: C\npermalink: docs/a/index.html\n---\n"),
        ]);
        let (library, diagnostics) = load(&manifest);

        assert_eq!(
            "docs/a/index.html",
            library.get(&id("a")).unwrap().output_path
        );
        assert_eq!("b.html", library.get(&id("b")).unwrap().output_path);
        assert_eq!("c.html", library.get(&id("c")).unwrap().output_path);

        let kinds: Vec<DiagnosticKind> =
            diagnostics.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(
            vec![
                DiagnosticKind::InvalidPermalink {
                    permalink: "../../etc/b.html".to_owned()
                },
                DiagnosticKind::DuplicateOutput {
                    path: "docs/a/index.html".to_owned(),
                    other: id("a"),
                },
            ],
            kinds
        );
        let first = diagnostics.iter().next().unwrap();
        assert_eq!(Severity::Warning, first.severity());
    }

    #[test]
    fn test_load_default_path_taken_by_permalink() {
        let manifest = Manifest::from_entries(vec![
            ("a.md", "---\ntitle: A\npermalink: b.html\n---\n"),
            ("b.md", "---\ntitle: B\n---\n"),
        ]);
        let (library, _) = load(&manifest);
        assert_eq!("b.html", library.get(&id("a")).unwrap().output_path);
        assert_eq!("b-1.html", library.get(&id("b")).unwrap().output_path);
    }

    #[test]
    fn test_load_output_file_used_as_directory() {
        let manifest = Manifest::from_entries(vec![
            ("a.md", "---\ntitle: A\n---\n"),
            ("b.md", "---\ntitle: B\npermalink: /a.html/\n---\n"),
            ("c.md", "---\ntitle: C\npermalink: guide/c.html\n---\n"),
            ("d.md", "---\ntitle: D\npermalink: guide\n---\n"),
        ]);
        let (library, diagnostics) = load(&manifest);

        assert_eq!("b.html", library.get(&id("b")).unwrap().output_path);
        assert_eq!(
            "guide/c.html",
            library.get(&id("c")).unwrap().output_path
        );
        assert_eq!("d.html", library.get(&id("d")).unwrap().output_path);

        let kinds: Vec<DiagnosticKind> =
            diagnostics.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(
            vec![
                DiagnosticKind::DuplicateOutput {
                    path: "a.html/index.html".to_owned(),
                    other: id("a"),
                },
                DiagnosticKind::DuplicateOutput {
                    path: "guide".to_owned(),
                    other: id("c"),
                },
            ],
            kinds
        );
    }

    #[test]
    fn test_load_default_path_below_a_file() {
        let manifest = Manifest::from_entries(vec![
            ("a.md", "---\ntitle: A\npermalink: io\n---\n"),
            ("io/console.md", "---\ntitle: Console\n---\n"),
        ]);
        let (library, diagnostics) = load(&manifest);

        assert_eq!("io", library.get(&id("a")).unwrap().output_path);
        assert_eq!(
            "io-console-1.html",
            library.get(&id("io/console")).unwrap().output_path
        );
        assert_eq!(
            vec![DiagnosticKind::DuplicateOutput {
                path: "io/console.html".to_owned(),
                other: id("a"),
            }],
            diagnostics.iter().map(|d| d.kind.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_load_iterates_in_id_order() {
        let manifest = Manifest::from_entries(vec![
            ("zeta.md", "---\ntitle: Z\n---\n"),
            ("alpha.md", "---\ntitle: A\n---\n"),
        ]);
        let (library, diagnostics) = load(&manifest);
        assert!(diagnostics.is_empty());
        let ids: Vec<&str> = library.ids().map(DocId::as_str).collect();
        assert_eq!(vec!["alpha", "zeta"], ids);
    }
}

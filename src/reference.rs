//! The cross-reference resolver. Every link in every document body is
//! classified (see [`crate::url::classify`]); cross-references are looked up
//! among the loaded documents and turned into output URLs. Unresolved
//! references don't stop anything: they're recorded as diagnostics and the
//! renderer marks them up as such.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::document::{DocId, Document};
use crate::loader::Library;
use crate::markdown;
use crate::url::{classify, Sitemap, Target};

/// A cross-reference found in a document body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    /// The document containing the link.
    pub source: DocId,

    /// The link destination exactly as written.
    pub destination: String,

    /// What the destination points at.
    pub target: Target,
}

/// Extracts the cross-references from a document's body in document order.
/// Links that aren't cross-references (external URLs, assets, anchors) are
/// not included.
pub fn references(document: &Document) -> Vec<Reference> {
    markdown::link_destinations(&document.body)
        .into_iter()
        .filter_map(|destination| {
            let target = classify(&document.source_path, &destination)?;
            Some(Reference {
                source: document.id.clone(),
                destination,
                target,
            })
        })
        .collect()
}

/// The outcome of resolving one [`Reference`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The target exists. `href` is its absolute URL, including the
    /// fragment if one was given.
    Resolved { target: DocId, href: String },

    /// No such document. `target` is the identifier that was looked up, or
    /// the destination as written if it couldn't form an identifier.
    Unresolved { target: String },
}

/// Resolutions for one document, keyed by link destination as written.
pub type LinkMap = HashMap<String, Resolution>;

/// The resolutions for every document with at least one cross-reference.
#[derive(Clone, Debug, Default)]
pub struct Links(BTreeMap<DocId, LinkMap>);

impl Links {
    pub fn for_document(&self, id: &DocId) -> Option<&LinkMap> {
        self.0.get(id)
    }

    /// Iterates over `(source, target)` for every unresolved reference.
    pub fn unresolved(&self) -> impl Iterator<Item = (&DocId, &str)> {
        self.0.iter().flat_map(|(source, map)| {
            map.values().filter_map(move |resolution| match resolution {
                Resolution::Unresolved { target } => {
                    Some((source, target.as_str()))
                }
                Resolution::Resolved { .. } => None,
            })
        })
    }
}

/// Looks up [`Reference`]s against a [`Library`].
pub struct Resolver<'a> {
    library: &'a Library,
    sitemap: &'a Sitemap,

    /// Heading anchors per document, for validating fragments.
    anchors: HashMap<&'a DocId, HashSet<String>>,
}

impl<'a> Resolver<'a> {
    pub fn new(library: &'a Library, sitemap: &'a Sitemap) -> Resolver<'a> {
        Resolver {
            library,
            sitemap,
            anchors: library
                .iter()
                .map(|document| {
                    let anchors = markdown::heading_anchors(&document.body);
                    (&document.id, anchors.into_iter().collect())
                })
                .collect(),
        }
    }

    /// Resolves a single reference. Problems are pushed onto `diagnostics`
    /// under the reference's source document.
    pub fn resolve(
        &self,
        reference: &Reference,
        diagnostics: &mut Diagnostics,
    ) -> Resolution {
        let target = &reference.target;
        let found = target
            .id
            .as_ref()
            .filter(|id| self.library.contains(id))
            .and_then(|id| Some((id, self.sitemap.url(id)?)));

        let (id, url) = match found {
            Some(found) => found,
            None => {
                let unresolved = target
                    .id
                    .as_ref()
                    .map_or_else(|| target.written.clone(), DocId::to_string);
                diagnostics.push(
                    reference.source.clone(),
                    DiagnosticKind::UnresolvedReference {
                        target: unresolved.clone(),
                    },
                );
                return Resolution::Unresolved { target: unresolved };
            }
        };

        if let Some(fragment) = &target.fragment {
            let known = self
                .anchors
                .get(id)
                .map_or(false, |anchors| anchors.contains(fragment));
            if !known {
                diagnostics.push(
                    reference.source.clone(),
                    DiagnosticKind::UnresolvedAnchor {
                        target: id.clone(),
                        fragment: fragment.clone(),
                    },
                );
            }
        }

        let mut url = url.clone();
        url.set_fragment(target.fragment.as_deref());
        Resolution::Resolved {
            target: id.clone(),
            href: url.into(),
        }
    }
}

/// Resolves every cross-reference in the library. A destination repeated
/// within one document is resolved (and reported) once.
pub fn resolve(library: &Library, sitemap: &Sitemap) -> (Links, Diagnostics) {
    let resolver = Resolver::new(library, sitemap);
    let mut links = Links::default();
    let mut diagnostics = Diagnostics::default();
    let mut total = 0;

    for document in library.iter() {
        let mut map = LinkMap::new();
        for reference in references(document) {
            total += 1;
            if map.contains_key(&reference.destination) {
                continue;
            }
            let resolution = resolver.resolve(&reference, &mut diagnostics);
            map.insert(reference.destination, resolution);
        }
        if !map.is_empty() {
            links.0.insert(document.id.clone(), map);
        }
    }

    tracing::info!(
        references = total,
        unresolved = links.unresolved().count(),
        "resolved cross-references"
    );
    (links, diagnostics)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::loader::load;
    use crate::manifest::Manifest;
    use url::Url;

    fn id(s: &str) -> DocId {
        DocId::normalize(s).unwrap()
    }

    fn fixture(entries: Vec<(&str, &str)>) -> (Library, Sitemap) {
        let (library, diagnostics) = load(&Manifest::from_entries(entries));
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        let root = Url::parse("https://example.org/ref/").unwrap();
        let sitemap = Sitemap::new(&library, &root).unwrap();
        (library, sitemap)
    }

    #[test]
    fn test_references() {
        let (library, _) = fixture(vec![(
            "io/console.md",
            "---\ntitle: Console\n---\n\
             See [IO](ref:io/IO), [files](file.md#open), \
             [Ruby](https://ruby-lang.org), [top](#top) and \
             ![diagram](diagram.md).\n\n\
             [pipes]: ../io/pipes.md\n\nAlso [pipes].\n",
        )]);
        let refs = references(library.get(&id("io/console")).unwrap());
        let destinations: Vec<&str> =
            refs.iter().map(|r| r.destination.as_str()).collect();
        assert_eq!(
            vec!["ref:io/IO", "file.md#open", "../io/pipes.md"],
            destinations
        );
        let targets: Vec<Option<&str>> = refs
            .iter()
            .map(|r| r.target.id.as_ref().map(DocId::as_str))
            .collect();
        assert_eq!(
            vec![Some("io/IO"), Some("io/file"), Some("io/pipes")],
            targets
        );
    }

    #[test]
    fn test_resolve_existing() {
        let (library, sitemap) = fixture(vec![
            (
                "intro.md",
                "---\ntitle: Intro\n---\nRead [the language](ref:language).\n",
            ),
            ("language.md", "---\ntitle: Language\n---\n# Syntax\n"),
        ]);
        let (links, diagnostics) = resolve(&library, &sitemap);

        assert!(diagnostics.is_empty());
        assert_eq!(
            Some(&Resolution::Resolved {
                target: id("language"),
                href: "https://example.org/ref/language.html".to_owned(),
            }),
            links.for_document(&id("intro")).unwrap().get("ref:language")
        );
        assert!(links.for_document(&id("language")).is_none());
    }

    #[test]
    fn test_resolve_unresolved_continues() {
        let (library, sitemap) = fixture(vec![(
            "intro.md",
            "---\ntitle: Intro\n---\n\
             [IO](ref:io/console/IO) then [me](ref:intro).\n",
        )]);
        let (links, diagnostics) = resolve(&library, &sitemap);

        assert_eq!(1, diagnostics.len());
        let diagnostic = diagnostics.iter().next().unwrap();
        assert_eq!(id("intro"), diagnostic.document);
        assert_eq!(Severity::Error, diagnostic.severity());
        assert_eq!(
            DiagnosticKind::UnresolvedReference {
                target: "io/console/IO".to_owned()
            },
            diagnostic.kind
        );

        let map = links.for_document(&id("intro")).unwrap();
        assert!(matches!(
            map.get("ref:intro"),
            Some(Resolution::Resolved { .. })
        ));
        assert_eq!(
            vec![(&id("intro"), "io/console/IO")],
            links.unresolved().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_resolve_repeated_destination_reported_once() {
        let (library, sitemap) = fixture(vec![(
            "intro.md",
            "---\ntitle: Intro\n---\n[a](ref:missing) and [b](ref:missing)\n",
        )]);
        let (_, diagnostics) = resolve(&library, &sitemap);
        assert_eq!(1, diagnostics.len());
    }

    #[test]
    fn test_resolve_relative_markdown_links() {
        let (library, sitemap) = fixture(vec![
            (
                "io/index.md",
                "---\ntitle: IO\n---\n\
                 [console](console.md) [intro](../intro.md)\n",
            ),
            (
                "io/console.md",
                "---\ntitle: Console\n---\n[up](index.md)\n",
            ),
            ("intro.md", "---\ntitle: Intro\n---\n[out](../outside.md)\n"),
        ]);
        let (links, diagnostics) = resolve(&library, &sitemap);

        let io = links.for_document(&id("io")).unwrap();
        assert_eq!(
            Some(&Resolution::Resolved {
                target: id("io/console"),
                href: "https://example.org/ref/io/console.html".to_owned(),
            }),
            io.get("console.md")
        );
        assert!(matches!(
            io.get("../intro.md"),
            Some(Resolution::Resolved { .. })
        ));
        assert_eq!(
            Some(&Resolution::Resolved {
                target: id("io"),
                href: "https://example.org/ref/io.html".to_owned(),
            }),
            links.for_document(&id("io/console")).unwrap().get("index.md")
        );
        assert_eq!(
            vec![DiagnosticKind::UnresolvedReference {
                target: "../outside.md".to_owned()
            }],
            diagnostics.iter().map(|d| d.kind.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_resolve_fragment() {
        let (library, sitemap) = fixture(vec![
            (
                "intro.md",
                "---\ntitle: Intro\n---\n\
                 [ok](ref:io#read-lines) [bad](ref:io#nope)\n",
            ),
            ("io.md", "---\ntitle: IO\n---\n## Read lines\n"),
        ]);
        let (links, diagnostics) = resolve(&library, &sitemap);

        let map = links.for_document(&id("intro")).unwrap();
        assert_eq!(
            Some(&Resolution::Resolved {
                target: id("io"),
                href: "https://example.org/ref/io.html#read-lines".to_owned(),
            }),
            map.get("ref:io#read-lines")
        );
        assert!(matches!(
            map.get("ref:io#nope"),
            Some(Resolution::Resolved { .. })
        ));
        assert_eq!(
            vec![DiagnosticKind::UnresolvedAnchor {
                target: id("io"),
                fragment: "nope".to_owned(),
            }],
            diagnostics.iter().map(|d| d.kind.clone()).collect::<Vec<_>>()
        );
        let first = diagnostics.iter().next().unwrap();
        assert_eq!(Severity::Warning, first.severity());
    }
}

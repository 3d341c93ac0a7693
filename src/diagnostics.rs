//! Defines [`Diagnostic`] and [`Diagnostics`], the recoverable findings
//! collected while assembling a book. Nothing in here aborts a build; the
//! findings are reported once every phase has run.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::document::DocId;
use crate::navigation::Direction;

/// How serious a [`Diagnostic`] is. Only errors can fail a `--strict` run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// What went wrong. The [`fmt::Display`] output is the human-readable
/// message used in the report.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DiagnosticKind {
    /// The document has no usable front-matter (missing fences, invalid
    /// YAML, or no title). The document was skipped.
    #[error("missing or malformed front-matter: {reason}")]
    MissingFrontMatter { reason: String },

    /// Another source file already claimed this identifier. The document was
    /// skipped.
    #[error(
        "duplicate document; identifier already loaded from `{}`",
        .first.display()
    )]
    DuplicateDocument { first: PathBuf },

    /// Another document already renders to this output path. The default
    /// output path was used instead.
    #[error(
        "output path `{path}` is already used by `{other}`; \
         using the default path"
    )]
    DuplicateOutput { path: String, other: DocId },

    /// The permalink would escape the output directory. The default output
    /// path was used instead.
    #[error("invalid permalink `{permalink}`; using the default path")]
    InvalidPermalink { permalink: String },

    /// A reference names a document that doesn't exist.
    #[error("unresolved reference `{target}`")]
    UnresolvedReference { target: String },

    /// A reference's fragment names no heading in the target document. The
    /// link itself still resolves.
    #[error("reference `{target}#{fragment}` names no heading in `{target}`")]
    UnresolvedAnchor { target: DocId, fragment: String },

    /// A `prev` or `next` pointer names a document that doesn't exist.
    #[error("`{direction}` points to nonexistent document `{target}`")]
    BrokenNavigationLink { direction: Direction, target: String },

    /// A `prev` or `next` pointer isn't mirrored by its target.
    #[error(
        "`{direction}` points to `{target}`, but its `{}` is {}",
        .direction.opposite(),
        describe_pointer(.found)
    )]
    AsymmetricNavigation {
        direction: Direction,
        target: DocId,
        found: Option<DocId>,
    },

    /// A pointer would give a document a second predecessor or successor.
    /// The pointer was ignored.
    #[error(
        "`{direction}` link to `{target}` conflicts with the existing link \
         from `{existing}`; ignored"
    )]
    ConflictingNavigation {
        direction: Direction,
        target: DocId,
        existing: DocId,
    },

    /// The members form a closed prev/next loop. They were left out of the
    /// reading order.
    #[error("navigation cycle: {}", describe_cycle(.members))]
    NavigationCycle { members: Vec<DocId> },
}

fn describe_pointer(found: &Option<DocId>) -> String {
    match found {
        Some(id) => format!("`{}`", id),
        None => String::from("unset"),
    }
}

fn describe_cycle(members: &[DocId]) -> String {
    let mut out = String::new();
    for id in members.iter().chain(members.first()) {
        if !out.is_empty() {
            out.push_str(" -> ");
        }
        out.push_str(id.as_str());
    }
    out
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::InvalidPermalink { .. }
            | DiagnosticKind::UnresolvedAnchor { .. }
            | DiagnosticKind::AsymmetricNavigation { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// A finding about a single document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// The document the finding is about. For cycles this is the first
    /// member.
    pub document: DocId,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity(), self.document, self.kind)
    }
}

/// An ordered collection of [`Diagnostic`]s. Each phase returns its own
/// collection and the build concatenates them, so the report lists findings
/// in phase order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn push(&mut self, document: DocId, kind: DiagnosticKind) {
        tracing::debug!(%document, severity = %kind.severity(), "{}", kind);
        self.0.push(Diagnostic { document, kind });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.0.iter().filter(|d| d.severity() == severity).count()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity() == Severity::Error)
    }

    /// Writes one line per diagnostic followed by a summary line.
    pub fn write_report<W: io::Write>(&self, mut w: W) -> io::Result<()> {
        for diagnostic in &self.0 {
            writeln!(w, "{}", diagnostic)?;
        }
        let errors = self.count(Severity::Error);
        let warnings = self.count(Severity::Warning);
        match errors + warnings {
            0 => writeln!(w, "no problems found"),
            _ => writeln!(
                w,
                "{} error{}, {} warning{}",
                errors,
                if errors == 1 { "" } else { "s" },
                warnings,
                if warnings == 1 { "" } else { "s" },
            ),
        }
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn id(s: &str) -> DocId {
        DocId::normalize(s).unwrap()
    }

    #[test]
    fn test_display() {
        let d = Diagnostic {
            document: id("io/console"),
            kind: DiagnosticKind::UnresolvedReference {
                target: "io/console/IO".to_owned(),
            },
        };
        assert_eq!(
            "error: io/console: unresolved reference `io/console/IO`",
            d.to_string()
        );
    }

    #[test]
    fn test_display_cycle() {
        let kind = DiagnosticKind::NavigationCycle {
            members: vec![id("a"), id("b")],
        };
        assert_eq!("navigation cycle: a -> b -> a", kind.to_string());
    }

    #[test]
    fn test_display_asymmetric() {
        let kind = DiagnosticKind::AsymmetricNavigation {
            direction: Direction::Next,
            target: id("b"),
            found: None,
        };
        assert_eq!(
            "`next` points to `b`, but its `prev` is unset",
            kind.to_string()
        );
    }

    #[test]
    fn test_report() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.push(
            id("a"),
            DiagnosticKind::InvalidPermalink {
                permalink: "../x".to_owned(),
            },
        );
        diagnostics.push(
            id("b"),
            DiagnosticKind::UnresolvedReference {
                target: "c".to_owned(),
            },
        );
        assert!(diagnostics.has_errors());
        assert_eq!(1, diagnostics.count(Severity::Warning));

        let mut out = Vec::new();
        diagnostics.write_report(&mut out).unwrap();
        assert_eq!(
            "warning: a: invalid permalink `../x`; using the default path\n\
             error: b: unresolved reference `c`\n\
             1 error, 1 warning\n",
            String::from_utf8(out).unwrap()
        );
    }

    #[test]
    fn test_report_clean() {
        let mut out = Vec::new();
        Diagnostics::default().write_report(&mut out).unwrap();
        assert_eq!("no problems found\n", String::from_utf8(out).unwrap());
    }
}

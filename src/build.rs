//! Exports [`build_book`] and [`check_book`], which stitch together the
//! high-level phases: discovering the content files ([`crate::manifest`]),
//! loading documents ([`crate::loader`]), resolving cross-references
//! ([`crate::reference`]), sequencing navigation ([`crate::navigation`]) and,
//! for a build, rendering pages to disk ([`crate::write`]) and copying the
//! static source directory into the output directory.

use crate::config::{Config, Error as ConfigError};
use crate::diagnostics::Diagnostics;
use crate::loader::{load, Library};
use crate::manifest::{Error as ManifestError, Manifest};
use crate::navigation::{sequence, Navigation};
use crate::reference::{resolve, Links};
use crate::url::Sitemap;
use crate::write::{Error as WriteError, Writer};
use gtmpl::Template;
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Everything the analysis phases produce for a project.
#[derive(Debug)]
pub struct Assembly {
    pub library: Library,
    pub sitemap: Sitemap,
    pub links: Links,
    pub navigation: Navigation,

    /// The findings of every phase, in phase order.
    pub diagnostics: Diagnostics,
}

/// The outcome of a successful [`build_book`] or [`check_book`] run. Content
/// problems don't fail a run; they land in `diagnostics`.
#[derive(Debug)]
pub struct Report {
    pub diagnostics: Diagnostics,

    /// The number of documents that loaded.
    pub documents: usize,

    /// The number of HTML pages written. Always zero for a check.
    pub pages: usize,
}

/// Runs discovery, loading, resolution, and sequencing.
pub fn assemble(config: &Config) -> Result<Assembly> {
    let manifest = Manifest::scan(&config.content_directory)?;
    tracing::info!(files = manifest.len(), "discovered content files");

    let (library, mut diagnostics) = load(&manifest);
    let sitemap = Sitemap::new(&library, &config.site_root)?;

    let (links, found) = resolve(&library, &sitemap);
    diagnostics.extend(found);

    let (navigation, found) = sequence(&library);
    diagnostics.extend(found);

    Ok(Assembly {
        library,
        sitemap,
        links,
        navigation,
        diagnostics,
    })
}

/// Analyzes the project without rendering anything. The theme isn't loaded.
pub fn check_book(config: &Config) -> Result<Report> {
    let assembly = assemble(config)?;
    Ok(Report {
        documents: assembly.library.len(),
        diagnostics: assembly.diagnostics,
        pages: 0,
    })
}

/// Builds the book from a [`Config`] into `output_directory`. This calls
/// into [`assemble`] and [`Writer::write_book`], which do the
/// heavy-lifting, and copies the static assets into
/// `{output_directory}/static`.
pub fn build_book(config: &Config, output_directory: &Path) -> Result<Report> {
    // Parse the templates first so a broken theme fails before the old
    // output is deleted.
    let template = parse_template(config.page_templates()?.iter())?;

    let assembly = assemble(config)?;

    check_output(config, output_directory)?;
    rmdir(output_directory)?;

    let writer = Writer {
        template: &template,
        book_title: &config.title,
        output_directory,
        library: &assembly.library,
        sitemap: &assembly.sitemap,
        links: &assembly.links,
        navigation: &assembly.navigation,
    };
    let pages = writer.write_book()?;

    // copy static directory
    if config.static_directory.is_dir() {
        copy_dir(&config.static_directory, &output_directory.join("static"))?;
    } else {
        tracing::debug!(
            path = %config.static_directory.display(),
            "no static directory; skipping"
        );
    }

    tracing::info!(output = %output_directory.display(), "built book");
    Ok(Report {
        documents: assembly.library.len(),
        diagnostics: assembly.diagnostics,
        pages,
    })
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    let walker =
        WalkDir::new(src).sort_by(|a, b| a.file_name().cmp(b.file_name()));
    for entry in walker {
        let entry = entry.map_err(|err| Error::Static {
            path: src.to_owned(),
            err: err.into(),
        })?;
        let relative = match entry.path().strip_prefix(src) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let target = dst.join(relative);
        let result = if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
        } else {
            std::fs::copy(entry.path(), &target).map(|_| ())
        };
        result.map_err(|err| Error::Static { path: target, err })?;
    }
    Ok(())
}

// Loads the template file contents, concatenates them, and parses the result
// into a single template.
fn parse_template<P: AsRef<Path>>(
    template_files: impl Iterator<Item = P>,
) -> Result<Template> {
    let mut contents = String::new();
    for template_file in template_files {
        use std::io::Read;
        let template_file = template_file.as_ref();
        File::open(template_file)
            .and_then(|mut file| file.read_to_string(&mut contents))
            .map_err(|err| Error::OpenTemplateFile {
                path: template_file.to_owned(),
                err,
            })?;
        contents.push(' ');
    }

    let mut template = Template::default();
    template
        .parse(&contents)
        .map_err(|err| Error::ParseTemplate(err.to_string()))?;
    Ok(template)
}

// The output directory is blown away before writing, so it must not overlap
// the sources: it may neither contain a source directory nor lie inside the
// content, static or theme directory. Lying inside the project root is fine;
// that's where `_site` goes.
fn check_output(config: &Config, output_directory: &Path) -> Result<()> {
    let sources = [
        &config.content_directory,
        &config.static_directory,
        &config.theme_directory,
    ];
    let contained = std::iter::once(&config.project_root)
        .chain(sources)
        .find(|source| is_within(source, output_directory));
    let containing = sources
        .into_iter()
        .find(|source| is_within(output_directory, source));
    match contained.or(containing) {
        Some(source) => Err(Error::UnsafeOutput {
            output: output_directory.to_owned(),
            source_dir: source.clone(),
        }),
        None => Ok(()),
    }
}

// Whether `inner` is `outer` or lies beneath it.
fn is_within(inner: &Path, outer: &Path) -> bool {
    canonical(inner).starts_with(canonical(outer))
}

// Canonicalizes the longest existing prefix of `path` and appends the rest,
// so paths that don't exist yet still compare against ones that do.
fn canonical(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        if let Ok(found) = std::fs::canonicalize(current) {
            return missing
                .iter()
                .rev()
                .fold(found, |acc: PathBuf, name| acc.join(name));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_owned());
                current = match parent.as_os_str().is_empty() {
                    true => Path::new("."),
                    false => parent,
                };
            }
            _ => return path.to_owned(),
        }
    }
}

fn rmdir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

/// The result of a build or check.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a book. These are environment problems
/// (configuration, I/O, templates); content problems are diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned for problems loading the project or theme configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Returned for problems reading the content directory.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Returned when an output path can't be joined onto the site root.
    #[error("building output URLs")]
    Url(#[from] url::ParseError),

    /// Returned for errors writing pages to disk as HTML files.
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Returned for I/O problems while cleaning the output directory.
    #[error("cleaning directory `{}`", .path.display())]
    Clean {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// Returned for I/O problems while opening template files.
    #[error("opening template file `{}`", .path.display())]
    OpenTemplateFile {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// Returned for errors parsing template files.
    #[error("parsing templates: {0}")]
    ParseTemplate(String),

    /// Returned for I/O problems while copying the static directory.
    #[error("copying static file `{}`", .path.display())]
    Static {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// Returned when the output directory overlaps the project sources.
    #[error(
        "refusing to clean output directory `{}`: it overlaps `{}`",
        .output.display(),
        .source_dir.display()
    )]
    UnsafeOutput { output: PathBuf, source_dir: PathBuf },
}

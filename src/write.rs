use crate::document::{DocId, Document};
use crate::loader::Library;
use crate::markdown;
use crate::navigation::Navigation;
use crate::reference::Links;
use crate::url::Sitemap;
use crate::value::{optional, table_of_contents, DocLink};
use gtmpl::{Template, Value};
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Responsible for rendering, templating, and writing the HTML pages of a
/// book to disk.
pub struct Writer<'a> {
    /// The template applied to every page.
    pub template: &'a Template,

    /// The book's title. Made available to the template as `book.title`.
    pub book_title: &'a str,

    /// The directory in which the HTML files will be written. Each document
    /// lands at `{output_directory}/{document.output_path}`.
    pub output_directory: &'a Path,

    /// The documents to write.
    pub library: &'a Library,

    /// Output URLs, for the page itself and its navigation links.
    pub sitemap: &'a Sitemap,

    /// Cross-reference resolutions, used to rewrite links in page bodies.
    pub links: &'a Links,

    /// The reading order. Pages get their `prev`/`next` from here, not from
    /// their raw front-matter, so broken or conflicting pointers never reach
    /// the output.
    pub navigation: &'a Navigation,
}

impl Writer<'_> {
    /// Renders, templates, and writes every document in the library. Returns
    /// the number of pages written.
    pub fn write_book(&self) -> Result<usize> {
        let mut seen_dirs: HashSet<PathBuf> = HashSet::new();
        let mut written = 0;
        for document in self.library.iter() {
            let page = self.page(document)?;
            if let Some(dir) = page.file_path.parent() {
                if seen_dirs.insert(dir.to_owned()) {
                    std::fs::create_dir_all(dir).map_err(|err| Error::Io {
                        path: dir.to_owned(),
                        err,
                    })?;
                }
            }
            self.write_page(&page)?;
            tracing::debug!(
                id = %document.id,
                path = %page.file_path.display(),
                "wrote page"
            );
            written += 1;
        }
        tracing::info!(pages = written, "wrote book");
        Ok(written)
    }

    /// Converts a document's markdown body to HTML and bundles it with the
    /// output location.
    fn page<'d>(&self, document: &'d Document) -> Result<Page<'d>> {
        let mut body = String::new();
        markdown::to_html(
            &mut body,
            &document.body,
            self.links.for_document(&document.id),
        )
        .map_err(|err| Error::Render {
            id: document.id.clone(),
            err,
        })?;
        Ok(Page {
            document,
            body,
            file_path: self.output_directory.join(&document.output_path),
        })
    }

    /// Takes a single [`Page`], templates it, and writes it to disk.
    fn write_page(&self, page: &Page) -> Result<()> {
        let context =
            gtmpl::Context::from(self.to_value(page)).map_err(|err| {
                Error::Template {
                    id: page.document.id.clone(),
                    message: err.to_string(),
                }
            })?;

        let file =
            std::fs::File::create(&page.file_path).map_err(|err| Error::Io {
                path: page.file_path.clone(),
                err,
            })?;
        let mut w = io::BufWriter::new(file);
        self.template
            .execute(&mut w, &context)
            .map_err(|err| Error::Template {
                id: page.document.id.clone(),
                message: err.to_string(),
            })?;
        w.flush().map_err(|err| Error::Io {
            path: page.file_path.clone(),
            err,
        })
    }

    /// Converts a [`Page`] into a [`Value`]. The result is a
    /// [`Value::Object`] with fields `book`, `page`, `prev`, `next`, and
    /// `toc`.
    fn to_value(&self, page: &Page) -> Value {
        let id: &DocId = &page.document.id;
        let (prev, next) = self.navigation.neighbors(id);
        let find = |id: Option<&DocId>| {
            id.and_then(|id| DocLink::find(self.library, self.sitemap, id))
        };

        let mut book: HashMap<String, Value> = HashMap::new();
        book.insert(
            "title".to_owned(),
            Value::String(self.book_title.to_owned()),
        );
        book.insert(
            "home".to_owned(),
            Value::String(self.sitemap.root().to_string()),
        );

        let mut item: HashMap<String, Value> = HashMap::new();
        item.insert("id".to_owned(), Value::String(id.to_string()));
        item.insert(
            "title".to_owned(),
            Value::String(page.document.title.clone()),
        );
        item.insert(
            "url".to_owned(),
            match self.sitemap.url(id) {
                Some(url) => Value::String(url.to_string()),
                None => Value::Nil,
            },
        );
        item.insert("body".to_owned(), Value::String(page.body.clone()));

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("book".to_owned(), Value::Object(book));
        m.insert("page".to_owned(), Value::Object(item));
        m.insert("prev".to_owned(), optional(find(prev)));
        m.insert("next".to_owned(), optional(find(next)));
        m.insert(
            "toc".to_owned(),
            table_of_contents(self.navigation, self.library, self.sitemap, id),
        );
        Value::Object(m)
    }
}

/// An output HTML file: a document plus its rendered body and destination.
struct Page<'a> {
    document: &'a Document,

    /// The document body rendered to HTML.
    body: String,

    /// The target location on disk for the output file.
    file_path: PathBuf,
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error converting a document body to HTML.
    #[error("rendering `{id}`")]
    Render {
        id: DocId,
        #[source]
        err: io::Error,
    },

    /// An error during templating.
    #[error("templating `{id}`: {message}")]
    Template { id: DocId, message: String },

    /// An error writing the output files.
    #[error("writing `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        err: io::Error,
    },
}

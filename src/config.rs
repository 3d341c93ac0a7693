//! Loads the project configuration (`book.yaml`) and the theme
//! (`theme/theme.yaml`).

use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file, which marks the project root.
pub const PROJECT_FILE: &str = "book.yaml";

const THEME_FILE: &str = "theme.yaml";

fn default_content_directory() -> PathBuf {
    PathBuf::from("content")
}

fn default_static_directory() -> PathBuf {
    PathBuf::from("static")
}

fn default_theme_directory() -> PathBuf {
    PathBuf::from("theme")
}

#[derive(Deserialize)]
struct Project {
    title: String,
    site_root: Url,

    #[serde(default = "default_content_directory")]
    content_directory: PathBuf,

    #[serde(default = "default_static_directory")]
    static_directory: PathBuf,

    #[serde(default = "default_theme_directory")]
    theme_directory: PathBuf,
}

#[derive(Deserialize)]
struct Theme {
    page_template: Vec<PathBuf>,
}

/// The resolved project configuration. All directories are absolute or
/// relative to the working directory (i.e., already joined onto the project
/// root).
#[derive(Clone, Debug)]
pub struct Config {
    /// The book's title, available to templates as `book.title`.
    pub title: String,

    /// The URL under which the book is published. Always ends in a slash so
    /// it can be joined with relative output paths.
    pub site_root: Url,

    /// The directory containing `book.yaml`.
    pub project_root: PathBuf,

    /// The directory scanned for markdown pages.
    pub content_directory: PathBuf,

    /// Copied verbatim into the output directory, if it exists.
    pub static_directory: PathBuf,

    /// Holds `theme.yaml` and the template files it lists.
    pub theme_directory: PathBuf,
}

impl Config {
    /// Searches `dir` and its ancestors for `book.yaml` and loads the first
    /// one found.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        for ancestor in dir.ancestors() {
            let path = ancestor.join(PROJECT_FILE);
            if path.is_file() {
                tracing::debug!(path = %path.display(), "found project file");
                return Config::from_project_file(&path);
            }
        }
        Err(Error::NotFound(dir.to_owned()))
    }

    /// Loads the project file at `path`. Relative directories in the file
    /// are resolved against the file's parent directory.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        let project: Project =
            serde_yaml::from_reader(open(path)?).map_err(|err| Error::Yaml {
                path: path.to_owned(),
                err,
            })?;
        let project_root = path
            .parent()
            .ok_or_else(|| Error::NoParent(path.to_owned()))?
            .to_owned();

        Ok(Config {
            title: project.title,
            site_root: with_trailing_slash(project.site_root),
            content_directory: project_root.join(project.content_directory),
            static_directory: project_root.join(project.static_directory),
            theme_directory: project_root.join(project.theme_directory),
            project_root,
        })
    }

    /// Loads `theme.yaml` from the theme directory and returns the full paths
    /// of the page template files, in the order they should be concatenated.
    pub fn page_templates(&self) -> Result<Vec<PathBuf>> {
        let path = self.theme_directory.join(THEME_FILE);
        let theme: Theme = serde_yaml::from_reader(open(&path)?).map_err(
            |err| Error::Yaml {
                path: path.clone(),
                err,
            },
        )?;
        if theme.page_template.is_empty() {
            return Err(Error::NoTemplates(path));
        }
        Ok(theme
            .page_template
            .iter()
            .map(|relpath| self.theme_directory.join(relpath))
            .collect())
    }
}

// NOTE: a trailing slash is significant for [`Url::join`]. Without it, the
// last path component is considered to be a file name and is replaced.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|err| Error::Open {
        path: path.to_owned(),
        err,
    })
}

/// The result of loading configuration.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading the project or theme configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when no `book.yaml` exists in the directory or any parent.
    #[error(
        "could not find `{}` in `{}` or any parent directory",
        PROJECT_FILE,
        .0.display()
    )]
    NotFound(PathBuf),

    /// Returned when a configuration file can't be opened.
    #[error("opening `{}`", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    /// Returned when a configuration file isn't valid YAML or is missing
    /// required fields.
    #[error("parsing `{}`", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        err: serde_yaml::Error,
    },

    /// Returned when the project file path has no parent directory.
    #[error("can't get parent directory for project file `{}`", .0.display())]
    NoParent(PathBuf),

    /// Returned when `theme.yaml` lists no page templates.
    #[error("`{}` lists no page templates", .0.display())]
    NoTemplates(PathBuf),
}

//! Loads the build configuration. Settings come from an optional
//! `sitegen.yaml` project file (given explicitly, or found in the current
//! directory or one of its parents) overlaid with command-line flags.
//!
//! ```yaml
//! src: content
//! dst: public
//! base_url: https://example.org/
//! ga_id: UA-12345
//! ignore_ext: [.ico, .svg]
//! tmpl_ext: .gohtml
//! front_matter: yaml
//! posts_sections: [blog]
//! page_template: layout-main
//! templates:
//!   blog-post: layout-blogpost
//!   blog-index: layout-blogindex
//! feed:
//!   title: My stream of consciousness
//!   author:
//!     name: Me
//!     email: me@example.org
//! ```

use crate::frontmatter::Format;
use crate::page::Site;
use crate::template::TemplateRules;
use crate::urls::SiteUrls;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file searched for by [`Config::load`].
pub const PROJECT_FILE: &str = "sitegen.yaml";

const DEFAULT_SRC: &str = "src";
const DEFAULT_DST: &str = "dst";
const DEFAULT_TMPL_EXT: &str = "gohtml";
const DEFAULT_POSTS_SECTION: &str = "blog";
const DEFAULT_PAGE_TEMPLATE: &str = "page";

/// The author of the site, as credited in the feed.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

/// Feed metadata. `id` defaults to the base URL.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct FeedSettings {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
}

/// The contents of a project file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Project {
    src: Option<PathBuf>,
    dst: Option<PathBuf>,
    base_url: Option<String>,
    ga_id: Option<String>,
    ignore_ext: Option<Vec<String>>,
    tmpl_ext: Option<String>,
    front_matter: Option<Format>,
    posts_sections: Option<Vec<String>>,
    page_template: Option<String>,
    templates: BTreeMap<String, String>,
    amp: Option<bool>,
    feed: FeedSettings,
    threads: Option<usize>,
}

/// Settings given on the command line. They win over the project file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub src: Option<PathBuf>,
    pub dst: Option<PathBuf>,
    pub base_url: Option<String>,
    pub ga_id: Option<String>,
    pub ignore_ext: Option<Vec<String>>,
    pub tmpl_ext: Option<String>,
    pub front_matter: Option<Format>,
    pub amp: Option<bool>,
    pub threads: Option<usize>,
}

/// The resolved build configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// The source root.
    pub src: PathBuf,

    /// The destination root.
    pub dst: PathBuf,

    /// The absolute URL prefix for canonical and AMP links.
    pub base_url: Url,

    /// The site-wide analytics ID.
    pub ga_id: String,

    /// Extensions (without the leading dot) of files that are neither
    /// processed nor copied.
    pub ignore_ext: BTreeSet<String>,

    /// The extension (without the leading dot) of template files.
    pub tmpl_ext: String,
    pub front_matter: Format,
    pub rules: TemplateRules,

    /// Whether AMP variants are written.
    pub amp: bool,
    pub feed: FeedSettings,

    /// Worker threads; `None` uses one per available CPU.
    pub threads: Option<usize>,
}

impl Config {
    /// Resolves the configuration. `project_file` is read when given;
    /// otherwise [`PROJECT_FILE`] is searched for from the current directory
    /// upwards, and if there is none, only defaults and `overrides` apply.
    pub fn load(project_file: Option<&Path>, overrides: Overrides) -> Result<Config> {
        let found = match project_file {
            Some(path) => Some(path.to_owned()),
            None => find_project_file(&std::env::current_dir()?),
        };
        match found {
            Some(path) => {
                let project = read_project(&path)?;
                let root = path.parent().unwrap_or_else(|| Path::new(""));
                Config::resolve(project, root, overrides)
            }
            None => Config::resolve(Project::default(), Path::new(""), overrides),
        }
    }

    /// Resolves a configuration from `overrides` alone.
    pub fn from_overrides(overrides: Overrides) -> Result<Config> {
        Config::resolve(Project::default(), Path::new(""), overrides)
    }

    /// Reads a project file and overlays `overrides`. Relative directories in
    /// the project file are resolved against the file's directory.
    pub fn from_project_file(path: &Path, overrides: Overrides) -> Result<Config> {
        let project = read_project(path)?;
        let root = path.parent().unwrap_or_else(|| Path::new(""));
        Config::resolve(project, root, overrides)
    }

    fn resolve(project: Project, root: &Path, overrides: Overrides) -> Result<Config> {
        let base_url = overrides
            .base_url
            .or(project.base_url)
            .ok_or(Error::MissingBaseUrl)?;
        let base_url = parse_base_url(&base_url)?;

        let posts_sections = project
            .posts_sections
            .unwrap_or_else(|| vec![DEFAULT_POSTS_SECTION.to_owned()]);

        Ok(Config {
            src: overrides
                .src
                .unwrap_or_else(|| root.join(project.src.unwrap_or_else(|| DEFAULT_SRC.into()))),
            dst: overrides
                .dst
                .unwrap_or_else(|| root.join(project.dst.unwrap_or_else(|| DEFAULT_DST.into()))),
            feed: FeedSettings {
                id: project.feed.id.or_else(|| Some(base_url.to_string())),
                ..project.feed
            },
            base_url,
            ga_id: overrides.ga_id.or(project.ga_id).unwrap_or_default(),
            ignore_ext: overrides
                .ignore_ext
                .or(project.ignore_ext)
                .unwrap_or_default()
                .iter()
                .map(|ext| normalize_extension(ext))
                .filter(|ext| !ext.is_empty())
                .collect(),
            tmpl_ext: normalize_extension(
                &overrides
                    .tmpl_ext
                    .or(project.tmpl_ext)
                    .unwrap_or_else(|| DEFAULT_TMPL_EXT.to_owned()),
            ),
            front_matter: overrides
                .front_matter
                .or(project.front_matter)
                .unwrap_or_default(),
            rules: TemplateRules {
                posts_sections: posts_sections.into_iter().collect(),
                page_template: project
                    .page_template
                    .unwrap_or_else(|| DEFAULT_PAGE_TEMPLATE.to_owned()),
                overrides: project.templates,
            },
            amp: overrides.amp.or(project.amp).unwrap_or(true),
            threads: overrides.threads.or(project.threads),
        })
    }

    /// Checks the parts of the configuration that depend on the file system
    /// and returns the resolved source and destination roots.
    pub fn validate(&self) -> Result<Roots> {
        if !self.src.is_dir() {
            return Err(Error::MissingSource(self.src.clone()));
        }
        let roots = Roots {
            src: self.src.canonicalize()?,
            dst: resolve_path(&self.dst)?,
        };
        if roots.src.starts_with(&roots.dst) {
            return Err(Error::DestinationContainsSource {
                src: self.src.clone(),
                dst: self.dst.clone(),
            });
        }
        Ok(roots)
    }

    /// The context pages are derived against.
    pub fn site(&self) -> Result<Site> {
        Ok(Site {
            urls: SiteUrls::new(&self.base_url).map_err(|err| Error::BaseUrl {
                url: self.base_url.to_string(),
                err,
            })?,
            rules: self.rules.clone(),
            ga_id: self.ga_id.clone(),
            amp: self.amp,
        })
    }
}

/// The source and destination roots as absolute paths with `.`, `..`, and
/// symlinks resolved, so they can be compared with [`Path::starts_with`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Roots {
    pub src: PathBuf,
    pub dst: PathBuf,
}

/// Canonicalizes `path`, which may not exist yet: its deepest existing
/// ancestor is canonicalized and the remaining components are appended.
fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let path = std::env::current_dir()?.join(path);
    let mut missing = Vec::new();
    let mut existing = path.as_path();
    loop {
        if existing.exists() {
            let mut resolved = existing.canonicalize()?;
            for component in missing.iter().rev() {
                resolved.push(component);
            }
            return Ok(resolved);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_owned());
                existing = parent;
            }
            // `..` as the last component of a missing path
            _ => return path.canonicalize(),
        }
    }
}

fn read_project(path: &Path) -> Result<Project> {
    let file = File::open(path).map_err(|err| Error::Open {
        path: path.to_owned(),
        err,
    })?;
    serde_yaml::from_reader(file).map_err(|err| Error::Yaml {
        path: path.to_owned(),
        err,
    })
}

/// Looks for [`PROJECT_FILE`] in `dir` and each of its parents.
fn find_project_file(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .map(|dir| dir.join(PROJECT_FILE))
        .find(|path| path.is_file())
}

fn parse_base_url(input: &str) -> Result<Url> {
    let url = Url::parse(input).map_err(|err| Error::BaseUrl {
        url: input.to_owned(),
        err,
    })?;
    if url.cannot_be_a_base() {
        return Err(Error::BaseUrl {
            url: input.to_owned(),
            err: url::ParseError::RelativeUrlWithoutBase,
        });
    }
    Ok(url)
}

/// `.png` and `png` name the same extension.
fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_owned()
}

/// Splits a comma separated list of extensions (`.ico,.svg`).
pub fn split_extensions(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .map(str::to_owned)
        .collect()
}

/// The result of a configuration operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an invalid or unreadable configuration. These are fatal: the
/// build doesn't start.
#[derive(Debug)]
pub enum Error {
    /// Returned when the project file can't be opened.
    Open { path: PathBuf, err: io::Error },

    /// Returned when the project file isn't valid.
    Yaml {
        path: PathBuf,
        err: serde_yaml::Error,
    },

    /// Returned when no base URL was configured.
    MissingBaseUrl,

    /// Returned when the base URL isn't an absolute URL.
    BaseUrl { url: String, err: url::ParseError },

    /// Returned when the source root isn't a directory.
    MissingSource(PathBuf),

    /// Returned when the destination root is the source root or one of its
    /// ancestors.
    DestinationContainsSource { src: PathBuf, dst: PathBuf },

    /// Returned for other I/O errors.
    Io(io::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Open { path, err } => {
                write!(f, "opening project file '{}': {}", path.display(), err)
            }
            Error::Yaml { path, err } => {
                write!(f, "loading project file '{}': {}", path.display(), err)
            }
            Error::MissingBaseUrl => write!(f, "no base URL configured"),
            Error::BaseUrl { url, err } => write!(f, "invalid base URL `{}`: {}", url, err),
            Error::MissingSource(path) => {
                write!(f, "source directory '{}' does not exist", path.display())
            }
            Error::DestinationContainsSource { src, dst } => write!(
                f,
                "destination '{}' contains the source directory '{}'",
                dst.display(),
                src.display()
            ),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { err, .. } => Some(err),
            Error::Yaml { err, .. } => Some(err),
            Error::MissingBaseUrl => None,
            Error::BaseUrl { err, .. } => Some(err),
            Error::MissingSource(_) => None,
            Error::DestinationContainsSource { .. } => None,
            Error::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] into an [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site:
//!
//! 1. Walking the source tree and sorting files into documents, templates,
//!    and static files.
//! 2. Loading every template. Nothing is processed until this succeeds.
//! 3. Processing every document (front matter, Markdown, page derivation,
//!    templating) and copying every static file, in parallel. Each unit of
//!    work returns its own outcome; a failed document never stops the others.
//! 4. Once all units are done: rendering the index of every posts section, the
//!    Atom feed, and the sitemap from the collected summaries and URLs.

use crate::config::{self, Config, Roots};
use crate::feed::{self, write_feed, FeedConfig};
use crate::frontmatter;
use crate::markdown;
use crate::page::{self, BlogPostSummary, Page, Role, Site};
use crate::sitemap::{Sitemap, SITEMAP_FILE};
use crate::template::{self, Dispatcher, Templates};
use crate::urls::FEED_FILE;
use crate::write::Output;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use url::Url;
use walkdir::WalkDir;

const MARKDOWN_EXTENSION: &str = "md";
const INDEX_FILE: &str = "index.md";

/// Builds the site described by `config`. Per-file failures are collected in
/// the returned [`Report`]; only configuration, template loading, and the
/// aggregate outputs (feed and sitemap) fail the whole build.
pub fn build_site(config: &Config) -> Result<Report> {
    let roots = config.validate()?;
    let site = config.site()?;
    let output = Output::new(&config.dst);

    let tree = SourceTree::walk(config, &roots);
    info!(
        "found {} documents, {} templates, {} static files in '{}'",
        tree.documents.len(),
        tree.templates.len(),
        tree.copies.len(),
        config.src.display()
    );

    let templates = Templates::load(&tree.templates).map_err(Error::Templates)?;
    debug!("loaded {} templates", templates.len());
    let dispatcher = Dispatcher {
        templates: &templates,
        output: &output,
        site_url: site.urls.base(),
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.unwrap_or(0))
        .build()?;
    let (documents, copies) = pool.install(|| {
        rayon::join(
            || {
                tree.documents
                    .par_iter()
                    .map(|source| process_document(config, &site, &dispatcher, source))
                    .collect::<Vec<_>>()
            },
            || {
                tree.copies
                    .par_iter()
                    .map(|relative| copy_file(config, &output, relative))
                    .collect::<Vec<_>>()
            },
        )
    });

    let mut report = Report::default();
    let mut sitemap = Sitemap::default();
    let mut sections: BTreeMap<String, Section> = BTreeMap::new();
    let mut failures = tree.failures;

    for outcome in documents {
        match outcome {
            Ok(Processed::Page { urls, summary }) => {
                report.pages += 1;
                sitemap.extend(urls.iter().map(Url::as_str));
                if let Some(summary) = summary {
                    sections
                        .entry(summary.section.clone())
                        .or_default()
                        .posts
                        .push(summary);
                }
            }
            Ok(Processed::SectionIndex(page)) => {
                let section = page.section.clone().unwrap_or_default();
                sections.entry(section).or_default().index = Some(page);
            }
            Err(failure) => failures.push(failure),
        }
    }
    for outcome in copies {
        match outcome {
            Ok(()) => report.copied += 1,
            Err(failure) => failures.push(failure),
        }
    }

    // Concurrent processing finishes in no particular order, so everything
    // below works on explicitly sorted collections.
    let mut posts = Vec::new();
    for (name, section) in sections {
        let mut section_posts = section.posts;
        BlogPostSummary::sort(&mut section_posts);
        match render_section_index(&site, &dispatcher, &name, section.index, &section_posts) {
            Ok(urls) => {
                report.pages += 1;
                sitemap.extend(urls.iter().map(Url::as_str));
            }
            Err(failure) => failures.push(failure),
        }
        posts.extend(section_posts);
    }
    BlogPostSummary::sort(&mut posts);
    report.posts = posts.len();

    let feed_path = config.dst.join(FEED_FILE);
    write_feed(
        &FeedConfig {
            title: config.feed.title.clone(),
            id: config
                .feed
                .id
                .clone()
                .unwrap_or_else(|| site.urls.base().to_string()),
            author: config.feed.author.clone(),
            home_page: site.urls.base().clone(),
            self_url: site.urls.feed().clone(),
        },
        &posts,
        BufWriter::new(create(&feed_path)?),
    )
    .map_err(|err| Error::Feed {
        path: feed_path.clone(),
        err,
    })?;
    sitemap.insert(site.urls.feed().as_str());

    let sitemap_path = config.dst.join(SITEMAP_FILE);
    sitemap
        .write_to(BufWriter::new(create(&sitemap_path)?))
        .map_err(|err| Error::Write {
            path: sitemap_path.clone(),
            err,
        })?;
    report.urls = sitemap.len();

    failures.sort_by(|a, b| a.path.cmp(&b.path));
    for failure in &failures {
        error!("{}", failure);
    }
    report.failures = failures;
    Ok(report)
}

fn create(path: &Path) -> Result<File> {
    let open = || -> io::Result<File> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        File::create(path)
    };
    open().map_err(|err| Error::Write {
        path: path.to_owned(),
        err,
    })
}

/// The files of the source tree, sorted by kind. Document and static file
/// paths are relative to the source root; template paths are not.
#[derive(Debug, Default)]
pub struct SourceTree {
    pub documents: Vec<PathBuf>,
    pub templates: Vec<PathBuf>,
    pub copies: Vec<PathBuf>,

    /// Entries that couldn't be read while walking.
    pub failures: Vec<Failure>,
}

impl SourceTree {
    /// Walks the source root in file-name order. The destination directory
    /// is skipped when it lives inside the source tree.
    pub fn walk(config: &Config, roots: &Roots) -> SourceTree {
        let mut tree = SourceTree::default();
        let walker = WalkDir::new(&roots.src)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !entry.path().starts_with(&roots.dst)
            });

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    tree.failures.push(Failure {
                        path: err.path().map(Path::to_owned).unwrap_or_default(),
                        error: DocumentError::Walk(err),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            // strip_prefix() can't fail: every entry is under `roots.src`
            let relative = match entry.path().strip_prefix(&roots.src) {
                Ok(relative) => relative.to_owned(),
                Err(_) => continue,
            };
            match entry.path().extension().and_then(OsStr::to_str) {
                Some(MARKDOWN_EXTENSION) => tree.documents.push(relative),
                Some(ext) if ext == config.tmpl_ext => tree.templates.push(entry.into_path()),
                Some(ext) if config.ignore_ext.contains(ext) => {
                    debug!("ignoring '{}'", relative.display())
                }
                _ => tree.copies.push(relative),
            }
        }
        tree
    }
}

/// What a successfully processed document leaves behind.
enum Processed {
    /// A page that was written, the URLs it was written under, and, for
    /// posts, its summary.
    Page {
        urls: Vec<Url>,
        summary: Option<BlogPostSummary>,
    },

    /// A section index. It's written once the section's posts are known.
    SectionIndex(Page),
}

#[derive(Default)]
struct Section {
    index: Option<Page>,
    posts: Vec<BlogPostSummary>,
}

fn process_document(
    config: &Config,
    site: &Site,
    dispatcher: &Dispatcher,
    source: &Path,
) -> std::result::Result<Processed, Failure> {
    let fail = |error: DocumentError| Failure {
        path: source.to_owned(),
        error,
    };

    let input = fs::read_to_string(config.src.join(source))
        .map_err(|err| fail(DocumentError::Read(err)))?;
    let (front_matter, body) = frontmatter::parse(config.front_matter, &input)
        .map_err(|err| fail(DocumentError::FrontMatter(err)))?;
    for key in &front_matter.unknown {
        warn!(
            "'{}': ignoring unknown front matter key `{}`",
            source.display(),
            key
        );
    }

    let page = Page::build(site, source, front_matter, markdown::to_html(body))
        .map_err(|err| fail(DocumentError::Page(err)))?;
    if page.role == Role::SectionIndex {
        return Ok(Processed::SectionIndex(page));
    }

    let urls = dispatcher
        .dispatch(&page)
        .map_err(|err| fail(DocumentError::Template(err)))?;
    debug!("'{}' -> {} ({})", source.display(), page.canonical_url, page.template);
    Ok(Processed::Page {
        urls,
        summary: page.summary(),
    })
}

fn copy_file(config: &Config, output: &Output, relative: &Path) -> std::result::Result<(), Failure> {
    output
        .copy(&config.src.join(relative), relative)
        .map(|_| ())
        .map_err(|err| Failure {
            path: relative.to_owned(),
            error: DocumentError::Copy(err),
        })
}

/// Writes the index of the posts section `section`, using its `index.md` when
/// there is one.
fn render_section_index(
    site: &Site,
    dispatcher: &Dispatcher,
    section: &str,
    index: Option<Page>,
    posts: &[BlogPostSummary],
) -> std::result::Result<Vec<Url>, Failure> {
    let mut page = match index {
        Some(page) => page,
        None => Page::section_index(site, section).map_err(|err| Failure {
            path: Path::new(section).join(INDEX_FILE),
            error: DocumentError::Page(err),
        })?,
    };
    page.posts = posts.to_vec();
    dispatcher.dispatch(&page).map_err(|err| Failure {
        path: page.source.clone(),
        error: DocumentError::Template(err),
    })
}

/// The outcome of a build that ran to completion.
#[derive(Debug, Default)]
pub struct Report {
    /// Pages written, section indexes included (AMP variants aren't counted
    /// separately).
    pub pages: usize,

    /// Posts listed in the section indexes and the feed.
    pub posts: usize,

    /// Static files copied.
    pub copied: usize,

    /// Lines in the sitemap.
    pub urls: usize,

    /// Files that couldn't be processed, sorted by path.
    pub failures: Vec<Failure>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The step of the build at which a file failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Walk,
    Read,
    FrontMatter,
    Page,
    Template,
    Write,
    Copy,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Stage::Walk => "walk",
            Stage::Read => "read",
            Stage::FrontMatter => "front matter",
            Stage::Page => "page",
            Stage::Template => "template",
            Stage::Write => "write",
            Stage::Copy => "copy",
        })
    }
}

/// A file that couldn't be processed. The rest of the build carries on.
#[derive(Debug)]
pub struct Failure {
    /// The path of the file, relative to the source root where possible.
    pub path: PathBuf,
    pub error: DocumentError,
}

impl Failure {
    pub fn stage(&self) -> Stage {
        self.error.stage()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "'{}' ({}): {}", self.path.display(), self.stage(), self.error)
    }
}

/// Represents an error processing a single file.
#[derive(Debug)]
pub enum DocumentError {
    /// Returned when walking the source tree fails for an entry.
    Walk(walkdir::Error),

    /// Returned when a document can't be read (or isn't UTF-8).
    Read(io::Error),

    /// Returned when a document's front matter is malformed.
    FrontMatter(frontmatter::Error),

    /// Returned when a page can't be derived from a document.
    Page(page::Error),

    /// Returned when templating or writing a page fails.
    Template(template::Error),

    /// Returned when a static file can't be copied.
    Copy(io::Error),
}

impl DocumentError {
    pub fn stage(&self) -> Stage {
        match self {
            DocumentError::Walk(_) => Stage::Walk,
            DocumentError::Read(_) => Stage::Read,
            DocumentError::FrontMatter(_) => Stage::FrontMatter,
            DocumentError::Page(_) => Stage::Page,
            DocumentError::Template(template::Error::Write { .. }) => Stage::Write,
            DocumentError::Template(_) => Stage::Template,
            DocumentError::Copy(_) => Stage::Copy,
        }
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DocumentError::Walk(err) => err.fmt(f),
            DocumentError::Read(err) => err.fmt(f),
            DocumentError::FrontMatter(err) => err.fmt(f),
            DocumentError::Page(err) => err.fmt(f),
            DocumentError::Template(err) => err.fmt(f),
            DocumentError::Copy(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for DocumentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DocumentError::Walk(err) => Some(err),
            DocumentError::Read(err) => Some(err),
            DocumentError::FrontMatter(err) => Some(err),
            DocumentError::Page(err) => Some(err),
            DocumentError::Template(err) => Some(err),
            DocumentError::Copy(err) => Some(err),
        }
    }
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for a build that couldn't run to completion.
#[derive(Debug)]
pub enum Error {
    /// Returned for invalid configuration.
    Config(config::Error),

    /// Returned when the templates can't be loaded.
    Templates(template::Error),

    /// Returned when the worker pool can't be created.
    ThreadPool(rayon::ThreadPoolBuildError),

    /// Returned for errors writing the feed.
    Feed { path: PathBuf, err: feed::Error },

    /// Returned for I/O errors writing aggregate outputs.
    Write { path: PathBuf, err: io::Error },
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(err) => err.fmt(f),
            Error::Templates(err) => write!(f, "loading templates: {}", err),
            Error::ThreadPool(err) => err.fmt(f),
            Error::Feed { path, err } => {
                write!(f, "writing feed '{}': {}", path.display(), err)
            }
            Error::Write { path, err } => {
                write!(f, "writing '{}': {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(err) => Some(err),
            Error::Templates(err) => Some(err),
            Error::ThreadPool(err) => Some(err),
            Error::Feed { err, .. } => Some(err),
            Error::Write { err, .. } => Some(err),
        }
    }
}

impl From<config::Error> for Error {
    /// Converts [`config::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: config::Error) -> Error {
        Error::Config(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    /// Converts [`rayon::ThreadPoolBuildError`]s into [`Error`]. This allows
    /// us to use the `?` operator.
    fn from(err: rayon::ThreadPoolBuildError) -> Error {
        Error::ThreadPool(err)
    }
}

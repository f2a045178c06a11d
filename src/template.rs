//! Template selection, loading, and dispatch.
//!
//! Templates use Go template syntax (via [`gtmpl`]). Each template file is
//! registered under its file stem (`blog-post.gohtml` is `blog-post`); files
//! whose stem starts with `_` are partials whose text is appended to every
//! template, so `{{define}}` blocks in them are available everywhere.
//!
//! Which template a page uses is decided by [`TemplateRules`]: posts use
//! `{dir}-post`, section indexes `{dir}-index`, and every other page the
//! generic page template. Any derived name can be remapped in the override
//! table.

use crate::page::{Page, Role};
use crate::value::page_value;
use crate::write::{write_file, Output};
use gtmpl::{Context, Template, Value};
use log::warn;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

const PARTIAL_PREFIX: char = '_';
const POST_SUFFIX: &str = "-post";
const INDEX_SUFFIX: &str = "-index";

/// The table mapping a page's location to a template name.
#[derive(Clone, Debug)]
pub struct TemplateRules {
    /// Names of the directories holding dated posts (e.g., `blog`).
    pub posts_sections: BTreeSet<String>,

    /// The template for pages outside of posts sections.
    pub page_template: String,

    /// Maps derived names (`blog-post`, `page`, ...) to the names of the
    /// templates actually used.
    pub overrides: BTreeMap<String, String>,
}

impl Default for TemplateRules {
    fn default() -> Self {
        TemplateRules {
            posts_sections: std::iter::once(String::from("blog")).collect(),
            page_template: String::from("page"),
            overrides: BTreeMap::new(),
        }
    }
}

impl TemplateRules {
    /// Whether documents in a directory called `dir_name` are dated posts.
    pub fn is_posts_section(&self, dir_name: &str) -> bool {
        self.posts_sections.contains(dir_name)
    }

    /// The template name for a page with `role` whose enclosing directory is
    /// called `dir_name`.
    pub fn name(&self, role: Role, dir_name: &str) -> String {
        let derived = match role {
            Role::Post => format!("{}{}", dir_name, POST_SUFFIX),
            Role::SectionIndex => format!("{}{}", dir_name, INDEX_SUFFIX),
            Role::Page => self.page_template.clone(),
        };
        match self.overrides.get(&derived) {
            Some(name) => name.clone(),
            None => derived,
        }
    }
}

/// The registry of parsed templates. Loaded once before any document is
/// processed, then only read.
pub struct Templates {
    templates: HashMap<String, Template>,
}

impl Templates {
    /// Reads and parses every template file in `paths`.
    pub fn load(paths: &[PathBuf]) -> Result<Templates> {
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| Error::InvalidName(path.clone()))?;
            let text = std::fs::read_to_string(path).map_err(|err| Error::Open {
                path: path.clone(),
                err,
            })?;
            sources.push((name.to_owned(), path.clone(), text));
        }
        Templates::parse(sources)
    }

    /// Parses templates from `(name, origin, text)` triples. Names starting
    /// with `_` are partials.
    pub fn parse(sources: Vec<(String, PathBuf, String)>) -> Result<Templates> {
        let mut partials = String::new();
        let mut origins: HashMap<&str, &Path> = HashMap::new();
        for (name, origin, text) in &sources {
            if let Some(first) = origins.insert(name.as_str(), origin.as_path()) {
                return Err(Error::Duplicate {
                    name: name.clone(),
                    first: first.to_owned(),
                    second: origin.clone(),
                });
            }
            if name.starts_with(PARTIAL_PREFIX) {
                partials.push_str(text);
                partials.push(' ');
            }
        }

        let mut templates = HashMap::new();
        for (name, _, text) in &sources {
            if name.starts_with(PARTIAL_PREFIX) {
                continue;
            }
            let mut contents = String::with_capacity(text.len() + partials.len() + 1);
            contents.push_str(text);
            if !partials.is_empty() {
                contents.push(' ');
                contents.push_str(&partials);
            }

            let mut template = Template::default();
            template.parse(&contents).map_err(|message| Error::Parse {
                name: name.clone(),
                message,
            })?;
            templates.insert(name.clone(), template);
        }
        Ok(Templates { templates })
    }

    /// The number of registered (non-partial) templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Executes the template called `name` against `value`.
    pub fn render(&self, name: &str, value: Value) -> Result<Vec<u8>> {
        let template = self.templates.get(name).ok_or_else(|| Error::Missing {
            name: name.to_owned(),
        })?;
        let execute = |value: Value| -> std::result::Result<Vec<u8>, String> {
            let mut out = Vec::new();
            template.execute(&mut out, &Context::from(value)?)?;
            Ok(out)
        };
        execute(value).map_err(|message| Error::Execute {
            name: name.to_owned(),
            message,
        })
    }
}

/// Renders [`Page`]s through their templates and writes them to disk.
pub struct Dispatcher<'a> {
    pub templates: &'a Templates,
    pub output: &'a Output,

    /// The site's base URL, made available to every template as `site`.
    pub site_url: &'a Url,
}

impl Dispatcher<'_> {
    /// Renders `page` with its template and writes it under the output root.
    /// When the page emits an AMP variant it is rendered a second time with
    /// `amp` set and written under `amp/`. Returns the URLs that were
    /// written.
    ///
    /// A page is written completely or not at all: both variants are
    /// rendered before anything is written, and the canonical file is
    /// removed again if the AMP variant can't be written.
    pub fn dispatch(&self, page: &Page) -> Result<Vec<Url>> {
        let canonical = self.render(page, false)?;
        let amp = match page.emit_amp {
            true => Some(self.render(page, true)?),
            false => None,
        };

        let canonical_path = self.output.page_path(&page.source, false);
        write(&canonical_path, &canonical)?;
        let mut urls = vec![page.canonical_url.clone()];

        if let Some(amp) = amp {
            if let Err(err) = write(&self.output.page_path(&page.source, true), &amp) {
                if let Err(remove_err) = fs::remove_file(&canonical_path) {
                    warn!(
                        "removing '{}' after a failed write: {}",
                        canonical_path.display(),
                        remove_err
                    );
                }
                return Err(err);
            }
            urls.push(page.amp_url.clone());
        }
        Ok(urls)
    }

    fn render(&self, page: &Page, amp: bool) -> Result<Vec<u8>> {
        self.templates
            .render(&page.template, page_value(page, self.site_url, amp))
    }
}

fn write(path: &Path, contents: &[u8]) -> Result<()> {
    write_file(path, contents).map_err(|err| Error::Write {
        path: path.to_owned(),
        err,
    })
}

/// The result of a template operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading, executing, or writing a template.
#[derive(Debug)]
pub enum Error {
    /// Returned when a template file can't be read.
    Open { path: PathBuf, err: io::Error },

    /// Returned when a template file name isn't valid UTF-8.
    InvalidName(PathBuf),

    /// Returned when two template files share a name.
    Duplicate {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// Returned when a template fails to parse.
    Parse { name: String, message: String },

    /// Returned when a page asks for a template that was never registered.
    Missing { name: String },

    /// Returned when executing a template fails.
    Execute { name: String, message: String },

    /// Returned when the rendered page can't be written.
    Write { path: PathBuf, err: io::Error },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Open { path, err } => {
                write!(f, "opening template file '{}': {}", path.display(), err)
            }
            Error::InvalidName(path) => {
                write!(f, "invalid template file name: {:?}", path)
            }
            Error::Duplicate {
                name,
                first,
                second,
            } => write!(
                f,
                "template `{}` defined twice: '{}' and '{}'",
                name,
                first.display(),
                second.display()
            ),
            Error::Parse { name, message } => {
                write!(f, "parsing template `{}`: {}", name, message)
            }
            Error::Missing { name } => write!(f, "no template named `{}`", name),
            Error::Execute { name, message } => {
                write!(f, "executing template `{}`: {}", name, message)
            }
            Error::Write { path, err } => {
                write!(f, "writing '{}': {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { err, .. } => Some(err),
            Error::Write { err, .. } => Some(err),
            _ => None,
        }
    }
}

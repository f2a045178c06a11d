//! Defines the [`Page`] record built for every document, the
//! [`BlogPostSummary`] kept for posts after their page is written, and the
//! [`Site`] context both are derived against.

use crate::frontmatter::FrontMatter;
use crate::template::TemplateRules;
use crate::urls::SiteUrls;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use url::Url;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_LEN: usize = 10;
const INDEX_STEM: &str = "index";
const MARKDOWN_EXTENSION: &str = "md";

/// Everything about the site that page derivation depends on.
#[derive(Clone, Debug)]
pub struct Site {
    pub urls: SiteUrls,
    pub rules: TemplateRules,

    /// The analytics ID used unless a page overrides it.
    pub ga_id: String,

    /// Whether AMP variants are emitted unless a page opts out.
    pub amp: bool,
}

/// The part a document plays in the site, decided by its location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// A dated document inside a posts section (e.g., `blog/2021-01-01-a.md`).
    Post,

    /// The `index.md` of a posts section. Rendered once all posts are known.
    SectionIndex,

    /// Any other document.
    Page,
}

/// A fully-derived page, ready for templating.
#[derive(Clone, Debug)]
pub struct Page {
    /// The source path relative to the source root (e.g., `blog/a.md`).
    pub source: PathBuf,
    pub role: Role,

    /// The relative directory of the posts section, for posts and section
    /// indexes.
    pub section: Option<String>,
    pub template: String,

    pub canonical_url: Url,
    pub amp_url: Url,

    /// Whether an AMP variant of this page is written.
    pub emit_amp: bool,
    pub ga_id: String,

    pub title: String,
    pub description: String,
    pub style: String,
    pub header: String,

    /// `YYYY-MM-DD`, or empty for pages without a date.
    pub date: String,

    /// The rendered body, not wrapped in any layout.
    pub main: String,

    /// The section's posts, newest first. Only filled in for section indexes.
    pub posts: Vec<BlogPostSummary>,
}

impl Page {
    /// Builds a [`Page`] from a document's relative `source` path, its parsed
    /// front matter, and its rendered body.
    pub fn build(
        site: &Site,
        source: &Path,
        front_matter: FrontMatter,
        main: String,
    ) -> Result<Page> {
        let components = components(source)?;
        let (stem, dirs) = match components.split_last() {
            Some((stem, dirs)) => (stem.as_str(), dirs),
            None => return Err(Error::InvalidPath(source.to_owned())),
        };

        let dir_name = dirs.last().map(String::as_str);
        let role = match dir_name {
            Some(dir) if site.rules.is_posts_section(dir) => match stem {
                INDEX_STEM => Role::SectionIndex,
                _ => Role::Post,
            },
            _ => Role::Page,
        };

        // Post dates are re-formatted so `2023-5-1` and `2023-05-01` sort and
        // syndicate the same.
        let date = match (front_matter.date, role) {
            (Some(date), Role::Post) => NaiveDate::parse_from_str(&date, DATE_FORMAT)
                .map_err(|err| Error::InvalidDate(date.clone(), err))?
                .format(DATE_FORMAT)
                .to_string(),
            (Some(date), _) => date,
            (None, Role::Post) => date_prefix(stem)
                .ok_or(Error::MissingDate)?
                .format(DATE_FORMAT)
                .to_string(),
            (None, _) => String::new(),
        };

        let relative = components.join("/");
        Ok(Page {
            source: source.to_owned(),
            role,
            section: match role {
                Role::Page => None,
                _ => Some(dirs.join("/")),
            },
            template: site.rules.name(role, dir_name.unwrap_or_default()),
            canonical_url: site.urls.canonical(&relative)?,
            amp_url: site.urls.amp(&relative)?,
            emit_amp: front_matter.amp.unwrap_or(site.amp),
            ga_id: front_matter.ga_id.unwrap_or_else(|| site.ga_id.clone()),
            title: front_matter.title.unwrap_or_default(),
            description: front_matter.description.unwrap_or_default(),
            style: front_matter.style.unwrap_or_default(),
            header: front_matter.header.unwrap_or_default(),
            date,
            main,
            posts: Vec::new(),
        })
    }

    /// Synthesizes the index page of a posts section that has no `index.md`
    /// of its own. The title is the section's directory name.
    pub fn section_index(site: &Site, section: &str) -> Result<Page> {
        let source = Path::new(section).join(INDEX_STEM).with_extension(MARKDOWN_EXTENSION);
        let mut page = Page::build(site, &source, FrontMatter::default(), String::new())?;
        page.title = section.rsplit('/').next().unwrap_or(section).to_owned();
        Ok(page)
    }

    /// The summary that outlives a post's page. `None` for anything that
    /// isn't a [`Role::Post`].
    pub fn summary(&self) -> Option<BlogPostSummary> {
        match (self.role, &self.section) {
            (Role::Post, Some(section)) => Some(BlogPostSummary {
                title: self.title.clone(),
                date: self.date.clone(),
                slug: self
                    .source
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                section: section.clone(),
                canonical_url: self.canonical_url.clone(),
                amp_url: self.amp_url.clone(),
                emit_amp: self.emit_amp,
            }),
            _ => None,
        }
    }
}

/// Splits a relative source path into UTF-8 components, dropping the
/// extension of the last one.
fn components(source: &Path) -> Result<Vec<String>> {
    source
        .with_extension("")
        .components()
        .map(|component| match component {
            Component::Normal(s) => s
                .to_str()
                .map(str::to_owned)
                .ok_or_else(|| Error::InvalidPath(source.to_owned())),
            _ => Err(Error::InvalidPath(source.to_owned())),
        })
        .collect()
}

/// Returns the date in the `YYYY-MM-DD` prefix of a file stem, if it has one.
fn date_prefix(stem: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(stem.get(..DATE_LEN)?, DATE_FORMAT).ok()
}

/// A reduced view of a post, kept for the section indexes and the feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlogPostSummary {
    pub title: String,
    pub date: String,

    /// The post's URL relative to its section (the file stem).
    pub slug: String,

    /// The relative directory of the section containing the post.
    pub section: String,
    pub canonical_url: Url,
    pub amp_url: Url,
    pub emit_amp: bool,
}

impl BlogPostSummary {
    /// The post's URL path relative to the site root (e.g.,
    /// `blog/2021-01-01-hello`).
    pub fn relative_url(&self) -> String {
        format!("{}/{}", self.section, self.slug)
    }

    /// Newest first; posts on the same date are ordered by relative URL,
    /// descending.
    pub fn newest_first(a: &BlogPostSummary, b: &BlogPostSummary) -> Ordering {
        b.date
            .cmp(&a.date)
            .then_with(|| b.relative_url().cmp(&a.relative_url()))
    }

    /// Sorts `summaries` with [`BlogPostSummary::newest_first`].
    pub fn sort(summaries: &mut [BlogPostSummary]) {
        summaries.sort_by(BlogPostSummary::newest_first);
    }
}

/// The result of building a [`Page`].
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error deriving a [`Page`] from a document.
#[derive(Debug)]
pub enum Error {
    /// Returned when the source path isn't a plain relative UTF-8 path.
    InvalidPath(PathBuf),

    /// Returned when a post has no date in its front matter and its file name
    /// doesn't start with one.
    MissingDate,

    /// Returned when a post's front-matter date isn't `YYYY-MM-DD`.
    InvalidDate(String, chrono::ParseError),

    /// Returned when the page's URLs can't be derived.
    UrlParse(url::ParseError),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidPath(path) => write!(f, "invalid source path: {:?}", path),
            Error::MissingDate => write!(
                f,
                "post has no `date` and its file name doesn't start with YYYY-MM-DD"
            ),
            Error::InvalidDate(date, err) => {
                write!(f, "invalid date `{}` (expected YYYY-MM-DD): {}", date, err)
            }
            Error::UrlParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidPath(_) => None,
            Error::MissingDate => None,
            Error::InvalidDate(_, err) => Some(err),
            Error::UrlParse(err) => Some(err),
        }
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL joining functions.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::frontmatter::{self, Format};
    use crate::markdown;

    pub(crate) fn site() -> Site {
        Site {
            urls: SiteUrls::new(&Url::parse("https://example.org/").unwrap()).unwrap(),
            rules: TemplateRules::default(),
            ga_id: String::from("UA-SITE"),
            amp: true,
        }
    }

    fn build(source: &str, input: &str) -> Result<Page> {
        let (front_matter, body) = frontmatter::parse(Format::KeyValue, input).unwrap();
        Page::build(&site(), Path::new(source), front_matter, markdown::to_html(body))
    }

    #[test]
    fn test_blog_post() -> Result<()> {
        let page = build("blog/2023-05-01-hello.md", "title = Hello\n---\n# Hi\n")?;
        assert_eq!(Role::Post, page.role);
        assert_eq!("Hello", page.title);
        assert_eq!("2023-05-01", page.date);
        assert!(page.main.contains("<h1>Hi</h1>"));
        assert_eq!("blog-post", page.template);
        assert_eq!(Some("blog"), page.section.as_deref());
        assert_eq!(
            "https://example.org/blog/2023-05-01-hello",
            page.canonical_url.as_str()
        );
        assert_eq!(
            "https://example.org/amp/blog/2023-05-01-hello",
            page.amp_url.as_str()
        );
        assert_eq!("UA-SITE", page.ga_id);
        Ok(())
    }

    #[test]
    fn test_front_matter_date_wins() -> Result<()> {
        let page = build("blog/2023-05-01-hello.md", "date = 2022-01-01\n---\n")?;
        assert_eq!("2022-01-01", page.date);
        Ok(())
    }

    #[test]
    fn test_unpadded_date_is_reformatted() -> Result<()> {
        let page = build("blog/hello.md", "date = 2023-5-1\n---\n")?;
        assert_eq!("2023-05-01", page.date);
        Ok(())
    }

    #[test]
    fn test_post_without_date() {
        assert!(matches!(
            build("blog/hello.md", "title = x\n---\n"),
            Err(Error::MissingDate)
        ));
    }

    #[test]
    fn test_post_with_invalid_date() {
        assert!(matches!(
            build("blog/2023-05-01-x.md", "date = yesterday\n---\n"),
            Err(Error::InvalidDate(..))
        ));
    }

    #[test]
    fn test_section_index() -> Result<()> {
        let page = build("blog/index.md", "title = Blog\n---\n")?;
        assert_eq!(Role::SectionIndex, page.role);
        assert_eq!("blog-index", page.template);
        assert_eq!("", page.date);
        assert_eq!("https://example.org/blog/", page.canonical_url.as_str());
        assert_eq!("https://example.org/amp/blog/", page.amp_url.as_str());
        assert!(page.summary().is_none());
        Ok(())
    }

    #[test]
    fn test_synthesized_section_index() -> Result<()> {
        let page = Page::section_index(&site(), "blog")?;
        assert_eq!(Role::SectionIndex, page.role);
        assert_eq!("blog", page.title);
        assert_eq!(Path::new("blog/index.md"), page.source);
        Ok(())
    }

    #[test]
    fn test_generic_page() -> Result<()> {
        let page = build("about/me.md", "title = Me\ngaid = UA-PAGE\namp = false\n---\nhi")?;
        assert_eq!(Role::Page, page.role);
        assert_eq!("page", page.template);
        assert_eq!(None, page.section);
        assert_eq!("UA-PAGE", page.ga_id);
        assert!(!page.emit_amp);
        assert!(page.summary().is_none());
        Ok(())
    }

    #[test]
    fn test_nested_posts_section() -> Result<()> {
        let page = build("en/blog/2020-02-02-x.md", "")?;
        assert_eq!(Role::Post, page.role);
        assert_eq!(Some("en/blog"), page.section.as_deref());
        let summary = page.summary().unwrap();
        assert_eq!("en/blog/2020-02-02-x", summary.relative_url());
        Ok(())
    }

    #[test]
    fn test_empty_front_matter() -> Result<()> {
        let input = "# Title\n\nSome *text*.\n";
        let page = build("notes.md", input)?;
        assert_eq!("", page.title);
        assert_eq!("", page.description);
        assert_eq!("", page.date);
        assert_eq!("", page.style);
        assert_eq!("", page.header);
        assert_eq!(markdown::to_html(input), page.main);
        Ok(())
    }

    #[test]
    fn test_root_index() -> Result<()> {
        let page = build("index.md", "")?;
        assert_eq!(Role::Page, page.role);
        assert_eq!("https://example.org/", page.canonical_url.as_str());
        assert_eq!("https://example.org/amp/", page.amp_url.as_str());
        Ok(())
    }

    #[test]
    fn test_invalid_path() {
        assert!(matches!(
            Page::build(&site(), Path::new("../x.md"), FrontMatter::default(), String::new()),
            Err(Error::InvalidPath(_))
        ));
    }

    fn summary(date: &str, slug: &str) -> BlogPostSummary {
        BlogPostSummary {
            title: slug.to_owned(),
            date: date.to_owned(),
            slug: slug.to_owned(),
            section: String::from("blog"),
            canonical_url: Url::parse("https://example.org/").unwrap(),
            amp_url: Url::parse("https://example.org/amp/").unwrap(),
            emit_amp: true,
        }
    }

    #[test]
    fn test_sort_newest_first() {
        let mut summaries = vec![
            summary("2023-05-01", "a"),
            summary("2023-05-02", "b"),
            summary("2023-05-01", "c"),
        ];
        BlogPostSummary::sort(&mut summaries);
        let slugs: Vec<&str> = summaries.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(vec!["b", "c", "a"], slugs);
    }

    #[test]
    fn test_sort_is_deterministic() {
        let mut forward = vec![
            summary("2023-05-01", "x"),
            summary("2023-05-01", "y"),
            summary("2023-05-01", "z"),
        ];
        let mut backward: Vec<BlogPostSummary> = forward.iter().rev().cloned().collect();
        BlogPostSummary::sort(&mut forward);
        BlogPostSummary::sort(&mut backward);
        assert_eq!(forward, backward);
        assert_eq!("z", forward[0].slug);
    }

    #[test]
    fn test_sort_ties_across_sections() {
        let mut notes = summary("2023-05-01", "a");
        notes.section = String::from("notes");
        let mut summaries = vec![summary("2023-05-01", "z"), notes];
        BlogPostSummary::sort(&mut summaries);
        let urls: Vec<String> = summaries.iter().map(BlogPostSummary::relative_url).collect();
        assert_eq!(vec!["notes/a", "blog/z"], urls);
    }
}

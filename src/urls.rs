//! URL normalization and the derivation of canonical and AMP URLs from
//! source-relative paths.
//!
//! Every URL the site emits (page links, sitemap lines, feed links) passes
//! through [`normalize`], so two spellings of the same page (`blog/index` and
//! `blog/`) always produce the same string.

use url::{ParseError, Url};

/// The path segment under which AMP variants of every page live.
pub const AMP_PREFIX: &str = "amp";

/// The name of the Atom feed file, relative to the site root.
pub const FEED_FILE: &str = "feed.atom";

// Checked in order; `index.html` must come first so `a/index.html` isn't
// treated as a file named `index.html` under a directory called `index`.
const INDEX_SEGMENTS: [&str; 2] = ["index.html", "index"];

/// Normalizes a URL path. Runs of `/` are collapsed, and a final `index` (or
/// `index.html`) segment is dropped so the path refers to its directory with a
/// trailing slash. An empty path becomes `/`. Any other path is returned as is.
/// The function is idempotent.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    let mut last_was_slash = false;
    for c in path.chars() {
        if c == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        out.push(c);
    }

    for index in INDEX_SEGMENTS.iter() {
        if out == *index {
            out.clear();
            break;
        }
        if out.ends_with(index) && out[..out.len() - index.len()].ends_with('/') {
            out.truncate(out.len() - index.len());
            break;
        }
    }

    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Normalizes the path of an absolute URL (see [`normalize_path`]). Query and
/// fragment are left untouched, as are URLs that can't have a path (e.g.,
/// `mailto:`).
pub fn normalize(url: &Url) -> Url {
    let mut out = url.clone();
    if !out.cannot_be_a_base() {
        let path = normalize_path(url.path());
        out.set_path(&path);
    }
    out
}

/// Normalizes a URL given as a string. Absolute URLs are parsed and passed to
/// [`normalize`]; anything else is treated as a bare path.
pub fn normalize_str(input: &str) -> String {
    match Url::parse(input) {
        Ok(url) => normalize(&url).to_string(),
        Err(_) => normalize_path(input),
    }
}

/// Derives absolute site URLs from paths relative to the source root.
#[derive(Clone, Debug)]
pub struct SiteUrls {
    base: Url,
    feed: Url,
}

impl SiteUrls {
    /// Wraps the site's base URL. A trailing slash is appended to the base
    /// path when missing; otherwise [`Url::join`] would treat the last segment
    /// as a file name and drop it.
    pub fn new(base: &Url) -> Result<SiteUrls, ParseError> {
        if base.cannot_be_a_base() {
            return Err(ParseError::RelativeUrlWithoutBase);
        }
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let feed = base.join(FEED_FILE)?;
        Ok(SiteUrls { base, feed })
    }

    /// The base URL (always ends in `/`).
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// The canonical URL for a page, given its source path relative to the
    /// source root with the extension removed (e.g., `blog/2021-01-01-hello`).
    pub fn canonical(&self, relative: &str) -> Result<Url, ParseError> {
        // The `./` keeps a first segment containing `:` from being read as a
        // scheme.
        let relative = relative.trim_start_matches('/');
        Ok(normalize(&self.base.join(&format!("./{}", relative))?))
    }

    /// The AMP URL for a page. Same path as [`SiteUrls::canonical`] under the
    /// `amp/` prefix.
    pub fn amp(&self, relative: &str) -> Result<Url, ParseError> {
        self.canonical(&format!(
            "{}/{}",
            AMP_PREFIX,
            relative.trim_start_matches('/')
        ))
    }

    /// The URL of the Atom feed.
    pub fn feed(&self) -> &Url {
        &self.feed
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn site() -> Result<SiteUrls, ParseError> {
        SiteUrls::new(&Url::parse("https://example.org")?)
    }

    #[test]
    fn test_normalize_path_index() {
        assert_eq!("/blog/", normalize_path("/blog/index"));
        assert_eq!("/blog/", normalize_path("/blog/index.html"));
        assert_eq!("/", normalize_path("/index"));
        assert_eq!("/", normalize_path(""));
        assert_eq!("blog/", normalize_path("blog/index"));
    }

    #[test]
    fn test_normalize_path_leaves_other_paths_alone() {
        assert_eq!("/blog/hello", normalize_path("/blog/hello"));
        assert_eq!("/blog/", normalize_path("/blog/"));
        assert_eq!("/blog/reindex", normalize_path("/blog/reindex"));
        assert_eq!("/index/a", normalize_path("/index/a"));
    }

    #[test]
    fn test_normalize_path_collapses_slashes() {
        assert_eq!("/a/b/", normalize_path("//a///b//index"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in &[
            "https://example.org/blog/index",
            "https://example.org//a//index.html",
            "https://example.org/index/index",
            "https://example.org/a/b?x=1#frag",
            "https://example.org",
            "/amp/blog/index",
            "relative/index",
            "mailto:me@example.org",
        ] {
            let once = normalize_str(input);
            assert_eq!(once, normalize_str(&once), "input: {}", input);
        }
    }

    #[test]
    fn test_normalize_keeps_query() -> Result<(), ParseError> {
        let url = Url::parse("https://example.org/a/index?x=1#top")?;
        assert_eq!("https://example.org/a/?x=1#top", normalize(&url).as_str());
        Ok(())
    }

    #[test]
    fn test_site_urls_base_gets_trailing_slash() -> Result<(), ParseError> {
        let site = SiteUrls::new(&Url::parse("https://example.org/site")?)?;
        assert_eq!("https://example.org/site/", site.base().as_str());
        assert_eq!(
            "https://example.org/site/blog/hello",
            site.canonical("blog/hello")?.as_str()
        );
        Ok(())
    }

    #[test]
    fn test_canonical_and_amp_share_suffix() -> Result<(), ParseError> {
        let site = site()?;
        for relative in &["blog/2023-05-01-hello", "blog/index", "about", "index"] {
            let canonical = site.canonical(relative)?;
            let amp = site.amp(relative)?;
            assert_eq!(canonical.host_str(), amp.host_str());
            assert_eq!(canonical.scheme(), amp.scheme());
            assert_eq!(format!("/amp{}", canonical.path()), amp.path());
        }
        Ok(())
    }

    #[test]
    fn test_canonical_index() -> Result<(), ParseError> {
        let site = site()?;
        assert_eq!("https://example.org/", site.canonical("index")?.as_str());
        assert_eq!("https://example.org/amp/", site.amp("index")?.as_str());
        assert_eq!("https://example.org/blog/", site.canonical("blog/index")?.as_str());
        Ok(())
    }

    #[test]
    fn test_colon_in_first_segment() -> Result<(), ParseError> {
        let site = site()?;
        assert_eq!(
            "https://example.org/notes:today",
            site.canonical("notes:today")?.as_str()
        );
        Ok(())
    }

    #[test]
    fn test_feed() -> Result<(), ParseError> {
        assert_eq!("https://example.org/feed.atom", site()?.feed().as_str());
        Ok(())
    }
}

//! The plain-text sitemap: every URL the build emitted, one per line.

use crate::urls::normalize_str;
use std::collections::BTreeSet;
use std::io::{self, Write};

/// File name of the sitemap, relative to the output root.
pub const SITEMAP_FILE: &str = "sitemap.txt";

/// A sorted, deduplicated set of URLs. Every URL is normalized on the way in,
/// so `blog/index` and `blog/` are one entry.
#[derive(Clone, Debug, Default)]
pub struct Sitemap {
    urls: BTreeSet<String>,
}

impl Sitemap {
    pub fn insert<S: AsRef<str>>(&mut self, url: S) {
        self.urls.insert(normalize_str(url.as_ref()));
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Writes the URLs in lexical order, each followed by a newline.
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        for url in &self.urls {
            w.write_all(url.as_bytes())?;
            w.write_all(b"\n")?;
        }
        w.flush()
    }
}

impl<S: AsRef<str>> Extend<S> for Sitemap {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for url in iter {
            self.insert(url);
        }
    }
}

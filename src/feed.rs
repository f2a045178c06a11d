//! Support for creating Atom feeds from a list of post summaries.

use crate::config::Author;
use crate::page::BlogPostSummary;
use atom_syndication::{
    Entry, Error as AtomError, Feed, FixedDateTime, Link, Person, Text, WriteConfig,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, ParseError, TimeZone, Utc};
use std::fmt;
use std::io::Write;
use url::Url;

const INDENT_SIZE: usize = 4;
const DATE_FORMAT: &str = "%Y-%m-%d";
const HTML_MIME_TYPE: &str = "text/html";
const ATOM_MIME_TYPE: &str = "application/atom+xml";

/// Bundled configuration for creating a feed.
pub struct FeedConfig {
    pub title: String,
    pub id: String,
    pub author: Option<Author>,

    /// The page the feed is the feed of (the `alternate` link).
    pub home_page: Url,

    /// Where the feed itself is published (the `self` link).
    pub self_url: Url,
}

/// Creates a feed from some configuration ([`FeedConfig`]) and a list of
/// [`BlogPostSummary`]s and writes the result to a [`std::io::Write`]. The
/// summaries must already be sorted; entries keep their order.
pub fn write_feed<W: Write>(config: &FeedConfig, posts: &[BlogPostSummary], w: W) -> Result<()> {
    feed(config, posts)?.write_with_config(
        w,
        WriteConfig {
            write_document_declaration: true,
            indent_size: Some(INDENT_SIZE),
        },
    )?;
    Ok(())
}

fn feed(config: &FeedConfig, posts: &[BlogPostSummary]) -> Result<Feed> {
    let entries = feed_entries(config, posts)?;

    // The newest entry keeps the output stable between runs over the same
    // posts.
    let updated = match entries.first() {
        Some(entry) => entry.updated,
        None => Utc::now().into(),
    };

    Ok(Feed {
        title: Text::plain(config.title.clone()),
        id: config.id.clone(),
        updated,
        authors: author_to_people(config.author.as_ref()),
        links: vec![
            Link {
                href: config.self_url.to_string(),
                rel: "self".to_owned(),
                mime_type: Some(ATOM_MIME_TYPE.to_owned()),
                ..Link::default()
            },
            Link {
                href: config.home_page.to_string(),
                rel: "alternate".to_owned(),
                mime_type: Some(HTML_MIME_TYPE.to_owned()),
                ..Link::default()
            },
        ],
        entries,
        ..Feed::default()
    })
}

fn feed_entries(config: &FeedConfig, posts: &[BlogPostSummary]) -> Result<Vec<Entry>> {
    let mut entries: Vec<Entry> = Vec::with_capacity(posts.len());

    for post in posts {
        // Post dates have no time or zone; they're published at midnight UTC.
        let date = midnight_utc(&post.date)?;

        let mut links = vec![Link {
            href: post.canonical_url.to_string(),
            rel: "alternate".to_owned(),
            mime_type: Some(HTML_MIME_TYPE.to_owned()),
            ..Link::default()
        }];
        if post.emit_amp {
            links.push(Link {
                href: post.amp_url.to_string(),
                rel: "amphtml".to_owned(),
                mime_type: Some(HTML_MIME_TYPE.to_owned()),
                ..Link::default()
            });
        }

        entries.push(Entry {
            id: post.canonical_url.to_string(),
            title: Text::plain(post.title.clone()),
            updated: date,
            published: Some(date),
            authors: author_to_people(config.author.as_ref()),
            links,
            summary: Some(Text::plain(post.title.clone())),
            ..Entry::default()
        })
    }
    Ok(entries)
}

fn midnight_utc(date: &str) -> Result<FixedDateTime> {
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT)?;
    Ok(Utc
        .from_utc_datetime(&NaiveDateTime::new(date, NaiveTime::MIN))
        .into())
}

fn author_to_people(author: Option<&Author>) -> Vec<Person> {
    match author {
        Some(author) => vec![Person {
            name: author.name.clone(),
            email: author.email.clone(),
            uri: author.uri.clone(),
            ..Person::default()
        }],
        None => Vec::new(),
    }
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed. Variants inlude Atom and date-time
/// parsing issues.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is an Atom-related error, including I/O errors
    /// writing the feed.
    Atom(AtomError),

    /// Returned when there is an issue parsing a post's date.
    DateTimeParse(ParseError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Atom(err) => err.fmt(f),
            Error::DateTimeParse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Atom(err) => Some(err),
            Error::DateTimeParse(err) => Some(err),
        }
    }
}

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}

impl From<ParseError> for Error {
    /// Converts [`ParseError`]s into [`Error`]. This allows us to use the `?`
    /// operator in fallible feed operations.
    fn from(err: ParseError) -> Error {
        Error::DateTimeParse(err)
    }
}

//! The library code for the `sitegen` static site generator. A build can be
//! broken down into two distinct steps:
//!
//! 1. Processing every source document on its own ([`crate::build`]): its
//!    front matter is parsed ([`crate::frontmatter`]), its body rendered to
//!    HTML ([`crate::markdown`]), a [`crate::page::Page`] derived with its
//!    canonical and AMP URLs ([`crate::urls`]), and the page templated and
//!    written to disk ([`crate::template`], [`crate::write`]).
//! 2. Aggregating what the first step left behind: the index page of every
//!    posts section, the Atom feed ([`crate::feed`]), and the sitemap
//!    ([`crate::sitemap`]).
//!
//! The first step runs on a worker pool. Each document reports its own
//! failure, so one broken document doesn't stop the rest of the site from
//! being built. The second step only starts once every document is done.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod feed;
pub mod frontmatter;
pub mod markdown;
pub mod page;
pub mod sitemap;
pub mod template;
pub mod urls;
pub mod value;
pub mod write;

//! Conversions from pages and summaries into template [`Value`]s.

use crate::page::{BlogPostSummary, Page};
use gtmpl::Value;
use std::collections::HashMap;
use url::Url;

fn string(s: &str) -> Value {
    Value::String(s.to_owned())
}

fn url(url: &Url) -> Value {
    Value::String(url.to_string())
}

impl From<&BlogPostSummary> for Value {
    /// Converts a [`BlogPostSummary`] into an object with fields `title`,
    /// `date`, `url` (the slug, relative to the section index),
    /// `canonical_url`, and `amp_url`.
    fn from(summary: &BlogPostSummary) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), string(&summary.title));
        m.insert("date".to_owned(), string(&summary.date));
        m.insert("url".to_owned(), string(&summary.slug));
        m.insert("canonical_url".to_owned(), url(&summary.canonical_url));
        m.insert("amp_url".to_owned(), url(&summary.amp_url));
        Value::Object(m)
    }
}

/// Converts a [`Page`] into the object its template is executed against. `amp`
/// is true while the AMP variant is rendered; `site` is the site's base URL.
pub fn page_value(page: &Page, site: &Url, amp: bool) -> Value {
    let mut m: HashMap<String, Value> = HashMap::new();
    m.insert("canonical_url".to_owned(), url(&page.canonical_url));
    m.insert("amp_url".to_owned(), url(&page.amp_url));
    m.insert("amp".to_owned(), Value::Bool(amp));
    m.insert("ga_id".to_owned(), string(&page.ga_id));
    m.insert("title".to_owned(), string(&page.title));
    m.insert("description".to_owned(), string(&page.description));
    m.insert("style".to_owned(), string(&page.style));
    m.insert("header".to_owned(), string(&page.header));
    m.insert("main".to_owned(), string(&page.main));
    m.insert("date".to_owned(), string(&page.date));
    m.insert(
        "posts".to_owned(),
        Value::Array(page.posts.iter().map(Value::from).collect()),
    );
    m.insert("site".to_owned(), url(site));
    Value::Object(m)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frontmatter::FrontMatter;
    use crate::page::test::site;
    use std::path::Path;

    #[test]
    fn test_page_value() {
        let mut page = Page::build(
            &site(),
            Path::new("blog/index.md"),
            FrontMatter::default(),
            String::from("<p>hi</p>"),
        )
        .unwrap();
        page.posts.push(
            Page::build(
                &site(),
                Path::new("blog/2021-01-01-a.md"),
                FrontMatter::default(),
                String::new(),
            )
            .unwrap()
            .summary()
            .unwrap(),
        );

        let base = Url::parse("https://example.org/").unwrap();
        let m = match page_value(&page, &base, true) {
            Value::Object(m) => m,
            _ => panic!("expected an object"),
        };
        assert!(matches!(m.get("amp"), Some(Value::Bool(true))));
        assert!(matches!(m.get("main"), Some(Value::String(s)) if s == "<p>hi</p>"));
        match m.get("posts") {
            Some(Value::Array(posts)) => match &posts[0] {
                Value::Object(post) => assert!(matches!(
                    post.get("url"),
                    Some(Value::String(s)) if s == "2021-01-01-a"
                )),
                _ => panic!("expected an object"),
            },
            _ => panic!("expected an array"),
        }
    }
}

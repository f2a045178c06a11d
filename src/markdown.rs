//! Converts document bodies from Markdown to HTML.
//!
//! The flavor is fixed: CommonMark plus tables, strikethrough, footnotes, task
//! lists, and autolinking of bare `http://`, `https://`, and `mailto:` URLs.
//! Raw HTML is passed through untouched.

use pulldown_cmark::{html, CowStr, Event, LinkType, Options, Parser, Tag};

const URL_SCHEMES: [&str; 3] = ["https://", "http://", "mailto:"];

// Characters that end a sentence more often than they end a URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', '\'', '"'];

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Converts `markdown` to an HTML fragment. The same input always yields the
/// same output.
pub fn to_html(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    let mut autolinker = Autolinker::default();
    html::push_html(
        &mut out,
        merge_text(Parser::new_ext(markdown, options()))
            .into_iter()
            .flat_map(|ev| autolinker.convert(ev)),
    );
    out
}

/// Joins runs of adjacent text events. The parser splits text at delimiter
/// runs that don't turn into emphasis (the `_` in `Rust_(language)`), which
/// would otherwise cut URLs in two.
fn merge_text<'a, I: Iterator<Item = Event<'a>>>(events: I) -> Vec<Event<'a>> {
    let mut out: Vec<Event<'a>> = Vec::new();
    for ev in events {
        if let Event::Text(text) = &ev {
            if let Some(Event::Text(prev)) = out.last_mut() {
                let mut joined = String::with_capacity(prev.len() + text.len());
                joined.push_str(prev);
                joined.push_str(text);
                *prev = CowStr::from(joined);
                continue;
            }
        }
        out.push(ev);
    }
    out
}

/// Rewrites text events so bare URLs become links. Text inside code blocks and
/// inside existing links is left alone.
#[derive(Default)]
struct Autolinker {
    code_depth: usize,
    link_depth: usize,
}

impl Autolinker {
    fn convert<'a>(&mut self, ev: Event<'a>) -> Vec<Event<'a>> {
        match &ev {
            Event::Start(Tag::CodeBlock(_)) => self.code_depth += 1,
            Event::End(Tag::CodeBlock(_)) => self.code_depth -= 1,
            Event::Start(Tag::Link(..)) | Event::Start(Tag::Image(..)) => {
                self.link_depth += 1
            }
            Event::End(Tag::Link(..)) | Event::End(Tag::Image(..)) => self.link_depth -= 1,
            Event::Text(text) if self.code_depth == 0 && self.link_depth == 0 => {
                if find_url(text).is_some() {
                    return linkify(text);
                }
            }
            _ => {}
        }
        vec![ev]
    }
}

/// Returns the byte range of the first bare URL in `text`.
fn find_url(text: &str) -> Option<(usize, usize)> {
    let start = URL_SCHEMES
        .iter()
        .filter_map(|scheme| {
            text.match_indices(scheme)
                .map(|(i, _)| i)
                .find(|&i| at_word_start(text, i))
        })
        .min()?;

    let rest = &text[start..];
    let len = rest
        .find(|c: char| c.is_whitespace() || c == '<' || c == '>')
        .unwrap_or_else(|| rest.len());
    let url = trim_url(&rest[..len]);

    // A scheme with nothing after it isn't a link.
    let scheme = URL_SCHEMES.iter().find(|scheme| url.starts_with(*scheme))?;
    if url.len() == scheme.len() {
        return None;
    }
    Some((start, start + url.len()))
}

/// Drops trailing punctuation, except a `)` closing a `(` inside the URL.
fn trim_url(mut url: &str) -> &str {
    while let Some(c) = url.chars().next_back() {
        if !TRAILING_PUNCTUATION.contains(&c) {
            break;
        }
        if c == ')' && url.matches('(').count() >= url.matches(')').count() {
            break;
        }
        url = &url[..url.len() - c.len_utf8()];
    }
    url
}

fn at_word_start(text: &str, i: usize) -> bool {
    match text[..i].chars().next_back() {
        None => true,
        Some(c) => !c.is_alphanumeric(),
    }
}

fn linkify<'a>(text: &str) -> Vec<Event<'a>> {
    let mut events = Vec::new();
    let mut rest = text;
    while let Some((start, end)) = find_url(rest) {
        if start > 0 {
            events.push(Event::Text(CowStr::from(rest[..start].to_owned())));
        }
        let url = CowStr::from(rest[start..end].to_owned());
        let tag = Tag::Link(LinkType::Autolink, url.clone(), CowStr::Borrowed(""));
        events.push(Event::Start(tag.clone()));
        events.push(Event::Text(url));
        events.push(Event::End(tag));
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        events.push(Event::Text(CowStr::from(rest.to_owned())));
    }
    events
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_heading() {
        assert_eq!("<h1>Hi</h1>\n", to_html("# Hi"));
    }

    #[test]
    fn test_tables() {
        let html = to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"), "{}", html);
        assert!(html.contains("<td>1</td>"), "{}", html);
    }

    #[test]
    fn test_strikethrough() {
        assert_eq!("<p><del>gone</del></p>\n", to_html("~~gone~~"));
    }

    #[test]
    fn test_fenced_code() {
        let html = to_html("```rust\nfn main() {}\n```\n");
        assert!(html.contains(r#"<code class="language-rust">"#), "{}", html);
    }

    #[test]
    fn test_autolink() {
        assert_eq!(
            "<p>see <a href=\"https://example.org/a\">https://example.org/a</a>.</p>\n",
            to_html("see https://example.org/a.")
        );
    }

    #[test]
    fn test_autolink_many() {
        let html = to_html("http://a.org and https://b.org");
        assert!(html.contains(r#"<a href="http://a.org">http://a.org</a>"#), "{}", html);
        assert!(html.contains(r#"<a href="https://b.org">https://b.org</a>"#), "{}", html);
    }

    #[test]
    fn test_no_autolink_in_code_or_links() {
        let html = to_html("```\nhttps://example.org\n```\n");
        assert!(!html.contains("<a "), "{}", html);

        let html = to_html("`https://example.org`");
        assert!(!html.contains("<a "), "{}", html);

        let html = to_html("[https://example.org](https://other.org)");
        assert_eq!(1, html.matches("<a ").count(), "{}", html);
    }

    #[test]
    fn test_autolink_across_underscores() {
        assert_eq!(
            "<p>see <a href=\"https://en.wikipedia.org/wiki/Rust_(programming_language)\">\
             https://en.wikipedia.org/wiki/Rust_(programming_language)</a>.</p>\n",
            to_html("see https://en.wikipedia.org/wiki/Rust_(programming_language).")
        );
    }

    #[test]
    fn test_autolink_in_parentheses() {
        let html = to_html("(see https://example.org/a)");
        assert!(
            html.contains(r#"(see <a href="https://example.org/a">https://example.org/a</a>)"#),
            "{}",
            html
        );
    }

    #[test]
    fn test_autolink_mailto() {
        assert_eq!(
            "<p>write <a href=\"mailto:me@example.org\">mailto:me@example.org</a></p>\n",
            to_html("write mailto:me@example.org")
        );
        assert_eq!("<p>mailto:</p>\n", to_html("mailto:"));
    }

    #[test]
    fn test_no_autolink_mid_word() {
        assert_eq!("<p>xhttps://a.org</p>\n", to_html("xhttps://a.org"));
    }

    #[test]
    fn test_raw_html_passes_through() {
        let html = to_html("<div class=\"x\">hi</div>\n");
        assert!(html.contains("<div class=\"x\">hi</div>"), "{}", html);
    }

    #[test]
    fn test_deterministic() {
        let input = "# T\n\nsome *text* https://example.org\n\n| a |\n|---|\n| b |\n";
        assert_eq!(to_html(input), to_html(input));
    }
}

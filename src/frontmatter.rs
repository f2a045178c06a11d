//! Splits a source document into its front matter and its Markdown body.
//!
//! Two header syntaxes are supported, selected by [`Format`]:
//!
//! * [`Format::Yaml`] (the default) expects a YAML mapping fenced by `---`
//!   lines at the very start of the document:
//!
//!   ```md
//!   ---
//!   title: Hello, world!
//!   date: 2021-04-16
//!   ---
//!   # Hello
//!   ```
//!
//! * [`Format::KeyValue`] expects `key = value` lines terminated by a line
//!   containing only `---`:
//!
//!   ```md
//!   title = Hello, world!
//!   date = 2021-04-16
//!   ---
//!   # Hello
//!   ```
//!
//! In both cases a document without a header is valid: its front matter is
//! empty and the whole input is the body.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

const FENCE: &str = "---";

/// The header syntax of source documents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    /// A `---`-fenced YAML mapping at the top of the document.
    Yaml,

    /// `key = value` lines terminated by a `---` line.
    KeyValue,
}

impl Default for Format {
    fn default() -> Self {
        Format::Yaml
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "yaml" => Ok(Format::Yaml),
            "key-value" | "kv" => Ok(Format::KeyValue),
            _ => Err(format!(
                "unknown front matter format `{}` (expected `yaml` or `key-value`)",
                s
            )),
        }
    }
}

/// The recognized metadata of a document. Every field is optional; a document
/// with no header at all yields `FrontMatter::default()`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub style: Option<String>,
    pub header: Option<String>,

    /// The analytics ID, overriding the site-wide one.
    pub ga_id: Option<String>,

    /// Whether an AMP variant of the page is emitted.
    pub amp: Option<bool>,

    /// Keys that were present but not recognized. The caller decides how to
    /// report them; they never fail the parse.
    pub unknown: Vec<String>,
}

impl FrontMatter {
    /// Records `value` under `key`. Keys are matched case-insensitively.
    fn set(&mut self, key: &str, value: String) -> Result<()> {
        let slot = match key.to_ascii_lowercase().as_str() {
            "title" => &mut self.title,
            "date" => &mut self.date,
            "description" | "desc" => &mut self.description,
            "style" => &mut self.style,
            "header" => &mut self.header,
            "gaid" | "ga_id" | "ga" => &mut self.ga_id,
            "amp" => {
                self.amp = Some(parse_bool(key, &value)?);
                return Ok(());
            }
            _ => {
                self.unknown.push(key.to_owned());
                return Ok(());
            }
        };
        *slot = Some(value);
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(Error::InvalidValue {
            key: key.to_owned(),
            reason: format!("expected a boolean, found `{}`", value),
        }),
    }
}

/// Parses the front matter of `input` according to `format` and returns it
/// along with the remaining body.
pub fn parse(format: Format, input: &str) -> Result<(FrontMatter, &str)> {
    match format {
        Format::Yaml => parse_yaml(input),
        Format::KeyValue => parse_key_value(input),
    }
}

/// Finds the next line consisting only of `---` at or after `from`. Returns
/// the byte offsets of the start of that line and of the line after it.
fn find_fence(input: &str, from: usize) -> Option<(usize, usize)> {
    let mut start = from;
    while start <= input.len() {
        let end = match input[start..].find('\n') {
            Some(offset) => start + offset + 1,
            None => input.len(),
        };
        if input[start..end].trim_end_matches(&['\r', '\n'][..]) == FENCE {
            return Some((start, end));
        }
        if end == input.len() {
            return None;
        }
        start = end;
    }
    None
}

fn parse_yaml(input: &str) -> Result<(FrontMatter, &str)> {
    let header_start = match find_fence(input, 0) {
        Some((0, end)) => end,
        _ => return Ok((FrontMatter::default(), input)),
    };
    let (header_stop, body_start) =
        find_fence(input, header_start).ok_or(Error::MissingEndFence)?;

    let mut front_matter = FrontMatter::default();
    let header = &input[header_start..header_stop];
    if header.trim().is_empty() {
        return Ok((front_matter, &input[body_start..]));
    }

    let mapping: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(header)?;
    for (key, value) in mapping {
        let value = match value {
            serde_yaml::Value::Null => continue,
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Sequence(_) | serde_yaml::Value::Mapping(_) => {
                return Err(Error::InvalidValue {
                    key,
                    reason: String::from("expected a scalar value"),
                })
            }
        };
        front_matter.set(&key, value)?;
    }
    Ok((front_matter, &input[body_start..]))
}

fn parse_key_value(input: &str) -> Result<(FrontMatter, &str)> {
    let (header_stop, body_start) = match find_fence(input, 0) {
        Some(indices) => indices,
        None => return Ok((FrontMatter::default(), input)),
    };

    let mut front_matter = FrontMatter::default();
    for (i, line) in input[..header_stop].lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match line.find('=') {
            None => return Err(Error::MalformedLine { line: i + 1 }),
            Some(offset) => front_matter.set(
                line[..offset].trim(),
                line[offset + 1..].trim().to_owned(),
            )?,
        }
    }
    Ok((front_matter, &input[body_start..]))
}

/// The result of a front-matter parse.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a document's front matter.
#[derive(Debug)]
pub enum Error {
    /// Returned when the opening `---` fence of a YAML header was found but
    /// the closing one was not.
    MissingEndFence,

    /// Returned when a `key = value` header line has no `=`. `line` is
    /// 1-based.
    MalformedLine { line: usize },

    /// Returned when the YAML header isn't a mapping with string keys.
    Yaml(serde_yaml::Error),

    /// Returned when a recognized key holds a value of the wrong shape.
    InvalidValue { key: String, reason: String },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingEndFence => write!(f, "missing closing `---`"),
            Error::MalformedLine { line } => {
                write!(f, "header line {}: expected `key = value`", line)
            }
            Error::Yaml(err) => err.fmt(f),
            Error::InvalidValue { key, reason } => {
                write!(f, "front matter key `{}`: {}", key, reason)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Yaml(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::Yaml(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_yaml() -> Result<()> {
        let (fm, body) = parse(
            Format::Yaml,
            "---\ntitle: Hello\ndate: 2023-05-01\ndescription: greeting\namp: false\n---\n# Hi\n",
        )?;
        assert_eq!(Some("Hello"), fm.title.as_deref());
        assert_eq!(Some("2023-05-01"), fm.date.as_deref());
        assert_eq!(Some("greeting"), fm.description.as_deref());
        assert_eq!(Some(false), fm.amp);
        assert!(fm.unknown.is_empty());
        assert_eq!("# Hi\n", body);
        Ok(())
    }

    #[test]
    fn test_key_value() -> Result<()> {
        let (fm, body) = parse(
            Format::KeyValue,
            "title = Hello\ndate = 2023-05-01\ndesc = a = b\n---\n# Hi\n",
        )?;
        assert_eq!(Some("Hello"), fm.title.as_deref());
        assert_eq!(Some("2023-05-01"), fm.date.as_deref());
        assert_eq!(Some("a = b"), fm.description.as_deref());
        assert_eq!("# Hi\n", body);
        Ok(())
    }

    #[test]
    fn test_formats_agree() -> Result<()> {
        let (yaml, _) = parse(
            Format::Yaml,
            "---\nTitle: T\nDate: 2020-01-02\nstyle: s\ngaid: UA-1\namp: yes\n---\n",
        )?;
        let (kv, _) = parse(
            Format::KeyValue,
            "Title = T\nDate = 2020-01-02\nstyle = s\ngaid = UA-1\namp = yes\n---\n",
        )?;
        assert_eq!(yaml, kv);
        assert_eq!(Some(true), yaml.amp);
        Ok(())
    }

    #[test]
    fn test_no_header() -> Result<()> {
        for format in &[Format::Yaml, Format::KeyValue] {
            let (fm, body) = parse(*format, "# Just a body\n\ntext\n")?;
            assert_eq!(FrontMatter::default(), fm);
            assert_eq!("# Just a body\n\ntext\n", body);
        }
        Ok(())
    }

    #[test]
    fn test_empty_yaml_header() -> Result<()> {
        let (fm, body) = parse(Format::Yaml, "---\n---\nbody")?;
        assert_eq!(FrontMatter::default(), fm);
        assert_eq!("body", body);
        Ok(())
    }

    #[test]
    fn test_yaml_body_may_contain_rules() -> Result<()> {
        let (fm, body) = parse(Format::Yaml, "---\ntitle: x\n---\na\n\n---\n\nb\n")?;
        assert_eq!(Some("x"), fm.title.as_deref());
        assert_eq!("a\n\n---\n\nb\n", body);
        Ok(())
    }

    #[test]
    fn test_yaml_missing_end_fence() {
        match parse(Format::Yaml, "---\ntitle: x\n") {
            Err(Error::MissingEndFence) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_yaml_not_a_mapping() {
        assert!(matches!(
            parse(Format::Yaml, "---\n- a\n- b\n---\n"),
            Err(Error::Yaml(_))
        ));
    }

    #[test]
    fn test_yaml_non_scalar_value() {
        match parse(Format::Yaml, "---\ntitle: [a, b]\n---\n") {
            Err(Error::InvalidValue { key, .. }) => assert_eq!("title", key),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_line() {
        match parse(Format::KeyValue, "title = ok\nno separator here\n---\nbody") {
            Err(Error::MalformedLine { line }) => assert_eq!(2, line),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_bool() {
        assert!(matches!(
            parse(Format::KeyValue, "amp = maybe\n---\n"),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_unknown_keys_are_collected() -> Result<()> {
        let (fm, _) = parse(Format::KeyValue, "title = x\nauthor = me\ntags = a\n---\n")?;
        assert_eq!(Some("x"), fm.title.as_deref());
        assert_eq!(vec!["author".to_owned(), "tags".to_owned()], fm.unknown);
        Ok(())
    }

    #[test]
    fn test_crlf_fences() -> Result<()> {
        let (fm, body) = parse(Format::Yaml, "---\r\ntitle: x\r\n---\r\nbody")?;
        assert_eq!(Some("x"), fm.title.as_deref());
        assert_eq!("body", body);
        Ok(())
    }
}

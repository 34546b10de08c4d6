//! Minimal element lookup over raw HTML.
//!
//! Finds elements by tag name and class token and extracts their visible text.
//! Nesting of the same tag is tracked so an element's inner HTML ends at its
//! own closing tag.

use regex::Regex;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9-]*)((?:\s[^>]*)?)>").expect("Invalid regex")
});

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)class\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("Invalid regex")
});

static MARKUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<[^>]*>").expect("Invalid regex"));

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").expect("Invalid regex")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element<'a> {
    attributes: &'a str,
    pub inner: &'a str,
    // byte range of the whole element, tags included
    start: usize,
    end: usize,
}

impl<'a> Element<'a> {
    pub fn has_class(&self, class: &str) -> bool {
        has_class(self.attributes, class)
    }

    /// Visible text with entities decoded and whitespace collapsed.
    pub fn text(&self) -> String {
        text_content(self.inner)
    }
}

struct Tag<'a> {
    closing: bool,
    name: String,
    attributes: &'a str,
    start: usize,
    end: usize,
}

fn scan_tags(html: &str) -> Vec<Tag<'_>> {
    TAG_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Tag {
                closing: !caps[1].is_empty(),
                name: caps[2].to_ascii_lowercase(),
                attributes: caps.get(3).map_or("", |m| m.as_str()),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

fn has_class(attributes: &str, class: &str) -> bool {
    CLASS_RE.captures(attributes).is_some_and(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .is_some_and(|value| value.as_str().split_whitespace().any(|token| token == class))
    })
}

/// Every `tag` element in document order, optionally restricted to those whose
/// class list contains `class`. Nested matches are included.
pub fn find_all<'a>(html: &'a str, tag: &str, class: Option<&str>) -> Vec<Element<'a>> {
    let tag = tag.to_ascii_lowercase();
    let tags = scan_tags(html);
    let mut elements = Vec::new();

    for (position, open) in tags.iter().enumerate() {
        if open.closing || open.name != tag {
            continue;
        }
        if class.is_some_and(|class| !has_class(open.attributes, class)) {
            continue;
        }
        if open.attributes.trim_end().ends_with('/') {
            elements.push(Element {
                attributes: open.attributes,
                inner: "",
                start: open.start,
                end: open.end,
            });
            continue;
        }

        let mut depth = 0usize;
        let mut close = None;
        for candidate in &tags[position + 1..] {
            if candidate.name != tag {
                continue;
            }
            if !candidate.closing {
                depth += 1;
            } else if depth == 0 {
                close = Some(candidate);
                break;
            } else {
                depth -= 1;
            }
        }

        let (inner_end, end) = close.map_or((html.len(), html.len()), |c| (c.start, c.end));
        elements.push(Element {
            attributes: open.attributes,
            inner: &html[open.end..inner_end],
            start: open.start,
            end,
        });
    }

    elements
}

pub fn find_first<'a>(html: &'a str, tag: &str, class: Option<&str>) -> Option<Element<'a>> {
    find_all(html, tag, class).into_iter().next()
}

/// Removes every `tag` element carrying `class`, contents included.
pub fn remove_elements(html: &str, tag: &str, class: &str) -> String {
    let mut output = String::with_capacity(html.len());
    let mut cursor = 0;
    for element in find_all(html, tag, Some(class)) {
        // nested matches were removed with their parent
        if element.start < cursor {
            continue;
        }
        output.push_str(&html[cursor..element.start]);
        cursor = element.end;
    }
    output.push_str(&html[cursor..]);
    output
}

/// Text of an HTML fragment: markup dropped, entities decoded, whitespace
/// collapsed and trimmed.
pub fn text_content(fragment: &str) -> String {
    let without_markup = MARKUP_RE.replace_all(fragment, " ");
    let decoded = decode_entities(&without_markup);
    WHITESPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

pub fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(decimal) = entity.strip_prefix('#') {
                decimal.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    "ndash" => Some('–'),
                    "rsquo" => Some('’'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

//! A small owned element tree for addon-style XML responses.
//!
//! Addon scrapers return loosely structured XML with arbitrary nesting and
//! HTML entities, so the parsers need `getElementsByTagName`-style lookups
//! rather than a fixed serde schema.

use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// XML parsing failures.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("XML syntax error: {0}")]
    Syntax(#[from] quick_xml::Error),

    #[error("XML document has no root element")]
    Empty,

    #[error("XML document has unclosed elements")]
    Unbalanced,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    /// Concatenated direct text and CDATA content, trimmed.
    pub text: String,
}

impl XmlElement {
    /// Parse a document and return its root element.
    ///
    /// HTML named entities (`&eacute;`, `&nbsp;`, ...) are accepted in text
    /// and attribute values. A bare `&` or an unknown entity is kept as
    /// literal text.
    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(Self::from_start(&e)?),
                Event::Empty(e) => {
                    let element = Self::from_start(&e)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or(XmlError::Unbalanced)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::Text(t) => {
                    if let Some(top) = stack.last_mut() {
                        match t.unescape_with(resolve_entity) {
                            Ok(text) => top.text.push_str(&text),
                            Err(_) => {
                                let raw = String::from_utf8_lossy(&t);
                                top.text.push_str(&unescape_lenient(&raw));
                            }
                        }
                    }
                }
                Event::CData(c) => {
                    if let Some(top) = stack.last_mut() {
                        top.text
                            .push_str(String::from_utf8_lossy(&c.into_inner()).trim());
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(XmlError::Unbalanced);
        }
        root.ok_or(XmlError::Empty)
    }

    fn from_start(e: &BytesStart<'_>) -> Result<Self, XmlError> {
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = match attr.unescape_value_with(resolve_entity) {
                Ok(value) => value.into_owned(),
                Err(_) => unescape_lenient(&String::from_utf8_lossy(&attr.value)),
            };
            attributes.push((key, value));
        }
        Ok(Self {
            name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            attributes,
            ..Default::default()
        })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All descendants with the given name, in document order, excluding
    /// `self`.
    pub fn descendants(&self, name: &str) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        self.collect(name, &mut out);
        out
    }

    fn collect<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlElement>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.collect(name, out);
        }
    }

    /// Descendants named `name` paired with their parent element.
    pub fn descendants_with_parent(&self, name: &str) -> Vec<(&XmlElement, &XmlElement)> {
        let mut out = Vec::new();
        self.collect_with_parent(name, &mut out);
        out
    }

    fn collect_with_parent<'a>(
        &'a self,
        name: &str,
        out: &mut Vec<(&'a XmlElement, &'a XmlElement)>,
    ) {
        for child in &self.children {
            if child.name == name {
                out.push((self, child));
            }
            child.collect_with_parent(name, out);
        }
    }

    /// Text of this element and all its descendants.
    pub fn text_content(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            let inner = child.text_content();
            if !inner.is_empty() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&inner);
            }
        }
        out
    }

    /// Text content of the first descendant named `name`.
    pub fn value_of(&self, name: &str) -> Option<String> {
        self.descendants(name)
            .first()
            .map(|el| el.text_content().trim().to_string())
    }
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        // Only the first top-level element is kept.
        None if root.is_none() => *root = Some(element),
        None => {}
    }
}

fn resolve_entity(entity: &str) -> Option<&'static str> {
    match entity {
        "nbsp" => Some(" "),
        other => resolve_html5_entity(other),
    }
}

/// Longest entity name worth looking for a `;` after.
const MAX_ENTITY_LEN: usize = 32;

/// Resolve entity references one by one, keeping any `&` that does not
/// start a known entity.
fn unescape_lenient(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let resolved = tail
            .find(';')
            .filter(|end| *end > 0 && *end <= MAX_ENTITY_LEN)
            .and_then(|end| entity_value(&tail[..end]).map(|value| (value, end)));
        match resolved {
            Some((value, end)) => {
                out.push_str(&value);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity_value(name: &str) -> Option<String> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(|c| c == 'x' || c == 'X') {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let value = match name {
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "quot" => Some("\""),
        "apos" => Some("'"),
        other => resolve_entity(other),
    };
    value.map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAILS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<details>
  <title>Am&eacute;lie</title>
  <details>
    <plot><![CDATA[A <shy> waitress]]></plot>
  </details>
  <fanart url="http://img.example/">
    <thumb>a.jpg</thumb>
    <thumb>b.jpg</thumb>
  </fanart>
  <thumb>poster.jpg</thumb>
  <actor><name>Audrey&nbsp;Tautou</name><role>Am&eacute;lie</role></actor>
  <empty/>
</details>"#;

    #[test]
    fn parses_nested_elements_and_entities() {
        let root = XmlElement::parse(DETAILS).unwrap();
        assert_eq!(root.name, "details");
        assert_eq!(root.child("title").unwrap().text, "Amélie");
        assert_eq!(root.value_of("plot").as_deref(), Some("A <shy> waitress"));
        assert_eq!(root.value_of("name").as_deref(), Some("Audrey Tautou"));
        assert!(root.child("empty").is_some());
    }

    #[test]
    fn descendants_are_in_document_order() {
        let root = XmlElement::parse(DETAILS).unwrap();
        let thumbs: Vec<&str> = root
            .descendants("thumb")
            .iter()
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(thumbs, vec!["a.jpg", "b.jpg", "poster.jpg"]);

        let direct: Vec<&str> = root
            .descendants_with_parent("thumb")
            .into_iter()
            .filter(|(parent, _)| parent.name == "details")
            .map(|(_, t)| t.text.as_str())
            .collect();
        assert_eq!(direct, vec!["poster.jpg"]);
    }

    #[test]
    fn attributes_are_unescaped() {
        let root = XmlElement::parse(r#"<url cache="a&amp;b">x</url>"#).unwrap();
        assert_eq!(root.attr("cache"), Some("a&b"));
        assert_eq!(root.attr("missing"), None);
    }

    #[test]
    fn bare_ampersands_are_kept_literally() {
        let root = XmlElement::parse(
            r#"<details><title>Tom & Jerry</title><plot>Cat &bogus; mouse &amp; friends &#233;</plot><url cache="a&b">x</url></details>"#,
        )
        .unwrap();
        assert_eq!(root.value_of("title").as_deref(), Some("Tom & Jerry"));
        assert_eq!(
            root.value_of("plot").as_deref(),
            Some("Cat &bogus; mouse & friends é")
        );
        assert_eq!(root.child("url").unwrap().attr("cache"), Some("a&b"));
    }

    #[test]
    fn lenient_unescape() {
        assert_eq!(unescape_lenient("R&D &eacute;t&eacute;"), "R&D été");
        assert_eq!(unescape_lenient("&#x41;&#66;&"), "AB&");
        assert_eq!(unescape_lenient("&;"), "&;");
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(XmlElement::parse("<details><title>x</details>").is_err());
        assert!(XmlElement::parse("<details>").is_err());
        assert!(matches!(XmlElement::parse("   "), Err(XmlError::Empty)));
    }
}

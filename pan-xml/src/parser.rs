use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use thiserror::Error;

use crate::tree::XmlNode;

/// Errors that can occur while parsing XML into an [`XmlNode`] tree.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Input XML could not be decoded or tokenized.
    #[error("failed to parse XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Input bytes were not valid UTF-8 for tag/attribute/text extraction.
    #[error("invalid UTF-8 while parsing XML: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// Failed to decode text entity or bytes.
    #[error("failed to decode XML text: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),
    /// Structural issue in XML document.
    #[error("malformed XML: {0}")]
    Malformed(String),
}

/// Parse a document with exactly one root element.
pub fn parse(xml: &[u8]) -> Result<XmlNode, ParseError> {
    let mut roots = parse_roots(xml)?;
    match roots.len() {
        0 => Err(ParseError::Malformed("no root element found".to_string())),
        1 => Ok(roots.remove(0)),
        _ => Err(ParseError::Malformed(
            "multiple top-level elements found".to_string(),
        )),
    }
}

/// Parse a fragment that may hold any number of sibling elements.
///
/// API `set` payloads are often bare sibling lists such as
/// `<member>a</member><member>b</member>`.
pub fn parse_fragment(xml: &[u8]) -> Result<Vec<XmlNode>, ParseError> {
    parse_roots(xml)
}

fn parse_roots(xml: &[u8]) -> Result<Vec<XmlNode>, ParseError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut roots: Vec<XmlNode> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let node = build_node_start(&e, &reader)?;
                stack.push(node);
            }
            Event::Empty(e) => {
                let node = build_node_start(&e, &reader)?;
                attach(&mut stack, &mut roots, node);
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    let text = e.unescape()?.into_owned();
                    append_text(current, text);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    let text = std::str::from_utf8(e.as_ref())?.to_string();
                    append_text(current, text);
                }
            }
            Event::End(_) => {
                let node = stack.pop().ok_or_else(|| {
                    ParseError::Malformed("encountered closing tag without open tag".to_string())
                })?;
                attach(&mut stack, &mut roots, node);
            }
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) | Event::Comment(_) => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(ParseError::Malformed(
            "unclosed element(s) at end of document".to_string(),
        ));
    }

    Ok(roots)
}

fn attach(stack: &mut [XmlNode], roots: &mut Vec<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

// Whitespace-only runs are indentation, not content.
fn append_text(node: &mut XmlNode, text: String) {
    if text.trim().is_empty() {
        return;
    }
    match &mut node.text {
        Some(existing) => existing.push_str(&text),
        None => node.text = Some(text),
    }
}

fn build_node_start(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<XmlNode, ParseError> {
    let tag = qname_to_string(e.name())?;
    let mut node = XmlNode::new(tag);

    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = qname_to_string(attr.key)?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())?
            .into_owned();
        node.attributes.insert(key, value);
    }

    Ok(node)
}

fn qname_to_string(name: QName<'_>) -> Result<String, ParseError> {
    Ok(std::str::from_utf8(name.as_ref())?.to_string())
}

#[cfg(test)]
mod tests {
    use super::{parse, parse_fragment, ParseError};

    #[test]
    fn fragment_accepts_sibling_roots() {
        let nodes = parse_fragment(b"<member>a</member><member>b</member>").expect("parse");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].text.as_deref(), Some("b"));
    }

    #[test]
    fn document_rejects_sibling_roots() {
        let err = parse(b"<a/><b/>").expect_err("should fail");
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn empty_input_has_no_root() {
        assert!(parse(b"").is_err());
        assert!(parse_fragment(b"").expect("parse").is_empty());
    }
}

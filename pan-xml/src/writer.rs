use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use crate::tree::XmlNode;

/// Errors that can occur while writing XML from an [`XmlNode`] tree.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to serialize XML bytes.
    #[error("failed to write XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Serialized output was not valid UTF-8.
    #[error("written XML is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Serialize an [`XmlNode`] tree into indented XML bytes.
pub fn write(node: &XmlNode) -> Result<Vec<u8>, WriteError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_node(&mut writer, node)?;
    Ok(writer.into_inner())
}

/// Serialize into the compact single-line form sent as an API `element`.
pub fn to_string(node: &XmlNode) -> Result<String, WriteError> {
    let mut writer = Writer::new(Vec::new());
    write_node(&mut writer, node)?;
    Ok(String::from_utf8(writer.into_inner())?)
}

/// Serialize into indented text for logs and diagnostics.
pub fn to_pretty_string(node: &XmlNode) -> Result<String, WriteError> {
    Ok(String::from_utf8(write(node)?)?)
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<(), quick_xml::Error> {
    let mut start = BytesStart::new(node.tag.as_str());

    for (key, value) in &node.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.children.is_empty() && node.text.is_none() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;

    if let Some(text) = &node.text {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }

    for child in &node.children {
        write_node(writer, child)?;
    }

    writer.write_event(Event::End(BytesEnd::new(node.tag.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{to_pretty_string, to_string};
    use crate::tree::XmlNode;

    #[test]
    fn compact_form_has_no_whitespace_between_elements() {
        let mut entry = XmlNode::entry("r1");
        entry.children.push(XmlNode::with_text("destination", "10.0.0.0/8"));
        entry.children.push(XmlNode::new("discard"));

        assert_eq!(
            to_string(&entry).expect("write"),
            r#"<entry name="r1"><destination>10.0.0.0/8</destination><discard/></entry>"#
        );
    }

    #[test]
    fn pretty_form_indents_nested_elements() {
        let mut units = XmlNode::new("units");
        units.children.push(XmlNode::entry("ethernet1/1.5"));
        let mut layer3 = XmlNode::new("layer3");
        layer3.children.push(units);

        assert_eq!(
            to_pretty_string(&layer3).expect("write"),
            "<layer3>\n  <units>\n    <entry name=\"ethernet1/1.5\"/>\n  </units>\n</layer3>"
        );
    }
}

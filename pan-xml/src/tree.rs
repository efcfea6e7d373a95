use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use quick_xml::escape::escape;

/// A generic XML element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlNode {
    /// Element tag name.
    pub tag: String,
    /// XML attributes keyed by name.
    pub attributes: BTreeMap<String, String>,
    /// Child elements, in document order.
    pub children: Vec<XmlNode>,
    /// Optional text content.
    pub text: Option<String>,
}

impl XmlNode {
    /// Create a new element with no attributes, children, or text.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Create a leaf element carrying `text`.
    pub fn with_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        let mut node = Self::new(tag);
        node.text = Some(text.into());
        node
    }

    /// Create an `<entry name="...">` element.
    pub fn entry(name: impl Into<String>) -> Self {
        let mut node = Self::new("entry");
        node.attributes.insert("name".to_string(), name.into());
        node
    }

    /// Create a `<member>` element.
    pub fn member(value: impl Into<String>) -> Self {
        Self::with_text("member", value)
    }

    /// Value of the `name` attribute, if any.
    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").map(String::as_str)
    }

    /// Return the first child with the provided tag.
    pub fn get_child(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// Return all children with the provided tag.
    pub fn get_children(&self, tag: &str) -> Vec<&XmlNode> {
        self.children
            .iter()
            .filter(|child| child.tag == tag)
            .collect()
    }

    /// Return the first child with `tag`, appending an empty one if missing.
    pub fn child_or_insert(&mut self, tag: &str) -> &mut XmlNode {
        let idx = match self.children.iter().position(|c| c.tag == tag) {
            Some(idx) => idx,
            None => {
                self.children.push(XmlNode::new(tag));
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }

    /// Replace the first child sharing `child`'s tag, or append it.
    pub fn upsert_child(&mut self, child: XmlNode) {
        if let Some(idx) = self.children.iter().position(|c| c.tag == child.tag) {
            self.children[idx] = child;
            return;
        }
        self.children.push(child);
    }

    /// Walk a nested child path and return the node found there.
    pub fn find_path(&self, path: &[&str]) -> Option<&XmlNode> {
        let mut current = self;
        for segment in path {
            current = current.get_child(segment)?;
        }
        Some(current)
    }

    /// Walk a nested child path and return terminal node text if found.
    pub fn get_text<'a>(&'a self, path: &[&str]) -> Option<&'a str> {
        self.find_path(path)?.text.as_deref()
    }

    /// Iterate over `<entry>` children.
    pub fn entries(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter(|child| child.tag == "entry")
    }

    /// Return the `<entry name="...">` child matching `name`.
    pub fn find_entry(&self, name: &str) -> Option<&XmlNode> {
        self.entries().find(|entry| entry.name() == Some(name))
    }

    /// Collect the trimmed text of every `<member>` child.
    pub fn member_texts(&self) -> Vec<String> {
        self.children
            .iter()
            .filter(|child| child.tag == "member")
            .filter_map(|child| child.text.as_deref())
            .map(|text| text.trim().to_string())
            .collect()
    }

    /// Fold `other`'s children into this node.
    ///
    /// Children are matched by tag and, when present, the `name` attribute.
    /// Unmatched children are appended; matched children with their own
    /// children are combined recursively. A matched leaf keeps the value
    /// already present in `self`.
    pub fn combine(&mut self, other: &XmlNode) {
        for incoming in &other.children {
            let existing = self.children.iter_mut().find(|child| {
                child.tag == incoming.tag && child.name() == incoming.name()
            });
            match existing {
                None => self.children.push(incoming.clone()),
                Some(found) if !incoming.children.is_empty() => found.combine(incoming),
                Some(_) => {}
            }
        }
    }
}

impl Display for XmlNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (key, value) in &self.attributes {
            write!(f, " {}=\"{}\"", key, escape(value.as_str()))?;
        }

        if self.children.is_empty() && self.text.is_none() {
            return write!(f, "/>");
        }

        write!(f, ">")?;
        if let Some(text) = &self.text {
            write!(f, "{}", escape(text.as_str()))?;
        }
        for child in &self.children {
            write!(f, "{}", child)?;
        }
        write!(f, "</{}>", self.tag)
    }
}

//! XML primitives shared by the configuration tree layers.
//!
//! PAN-OS configuration travels as small XML fragments addressed by xpath.
//! This crate only knows about elements, attributes and text; everything
//! firewall-specific lives in `pan-config`.

pub mod parser;
pub mod tree;
pub mod writer;

pub use parser::{parse, parse_fragment, ParseError};
pub use tree::XmlNode;
pub use writer::{to_pretty_string, to_string, write, WriteError};

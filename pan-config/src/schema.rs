//! Declarative field descriptions shared by the projector and the tree.
//!
//! Every entity kind lists its fields once, in canonical order. The same
//! name may appear more than once with disjoint version ranges; resolving
//! against a schema version picks exactly one of them.

use std::fmt::{self, Display, Formatter};

use semver::Version;

use crate::kind::EntityKind;

/// Wire representation of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Free text.
    Text,
    /// Signed integer text.
    Int,
    /// `yes` / `no` text.
    YesNo,
    /// Text restricted to the listed values.
    Enum(&'static [&'static str]),
    /// The value names which child element exists under the path.
    Selector(&'static [&'static str]),
    /// List rendered as repeated `<member>` children.
    Member,
    /// List rendered as repeated `<entry name="..."/>` children.
    Entry,
}

/// Where a field lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Slash separated path under the entity element. An empty path is the
    /// element itself; a trailing `@attr` segment addresses an attribute;
    /// `{field}` segments are replaced by another field's value.
    Wire(&'static str),
    /// Not serialized. The value names a `target` entity whose member list
    /// at `member_path` must reference this node.
    Reference {
        target: EntityKind,
        member_path: &'static str,
    },
    /// Held on the node only; never read from or written to XML.
    Local,
}

/// One field of an entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub placement: Placement,
    pub ty: ParamType,
    pub default: Option<&'static str>,
    pub always_emit: bool,
    pub read_only: bool,
    pub since: Option<(u64, u64, u64)>,
    pub until: Option<(u64, u64, u64)>,
}

impl ParamSpec {
    pub const fn wire(name: &'static str, path: &'static str, ty: ParamType) -> Self {
        Self {
            name,
            placement: Placement::Wire(path),
            ty,
            default: None,
            always_emit: false,
            read_only: false,
            since: None,
            until: None,
        }
    }

    pub const fn reference(
        name: &'static str,
        target: EntityKind,
        member_path: &'static str,
    ) -> Self {
        Self {
            name,
            placement: Placement::Reference {
                target,
                member_path,
            },
            ty: ParamType::Text,
            default: None,
            always_emit: false,
            read_only: false,
            since: None,
            until: None,
        }
    }

    pub const fn local(name: &'static str) -> Self {
        Self {
            name,
            placement: Placement::Local,
            ty: ParamType::Text,
            default: None,
            always_emit: false,
            read_only: false,
            since: None,
            until: None,
        }
    }

    pub const fn with_default(self, default: &'static str) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }

    pub const fn emitted(self) -> Self {
        Self {
            always_emit: true,
            ..self
        }
    }

    /// Parsed from device output but never written back.
    pub const fn status(self) -> Self {
        Self {
            read_only: true,
            ..self
        }
    }

    pub const fn since(self, major: u64, minor: u64, patch: u64) -> Self {
        Self {
            since: Some((major, minor, patch)),
            ..self
        }
    }

    pub const fn until(self, major: u64, minor: u64, patch: u64) -> Self {
        Self {
            until: Some((major, minor, patch)),
            ..self
        }
    }

    /// Whether this declaration applies to `version` (`since` inclusive,
    /// `until` exclusive).
    pub fn applies_to(&self, version: &Version) -> bool {
        let at_least = self
            .since
            .map(|(a, b, c)| *version >= Version::new(a, b, c))
            .unwrap_or(true);
        let below = self
            .until
            .map(|(a, b, c)| *version < Version::new(a, b, c))
            .unwrap_or(true);
        at_least && below
    }

    /// Fields that are written to the device.
    pub fn is_serialized(&self) -> bool {
        matches!(self.placement, Placement::Wire(_)) && !self.read_only
    }

    pub fn wire_path(&self) -> Option<&'static str> {
        match self.placement {
            Placement::Wire(path) => Some(path),
            Placement::Reference { .. } | Placement::Local => None,
        }
    }

    pub fn default_value(&self) -> Option<Value> {
        self.default.and_then(|raw| self.ty.parse(raw).ok())
    }
}

/// A field value held by a tree node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Text(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => write!(f, "{text}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{}", if *b { "yes" } else { "no" }),
            Value::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<&str>> for Value {
    fn from(value: Vec<&str>) -> Self {
        Value::List(value.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::List(value)
    }
}

impl ParamType {
    /// Parse scalar wire text. List types parse a single item.
    pub fn parse(&self, raw: &str) -> Result<Value, String> {
        let raw = raw.trim();
        match self {
            ParamType::Text => Ok(Value::Text(raw.to_string())),
            ParamType::Int => raw
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| format!("{raw:?} is not an integer: {e}")),
            ParamType::YesNo => match raw {
                "yes" => Ok(Value::Bool(true)),
                "no" => Ok(Value::Bool(false)),
                other => Err(format!("{other:?} is not yes/no")),
            },
            ParamType::Enum(choices) | ParamType::Selector(choices) => {
                if choices.contains(&raw) {
                    Ok(Value::Text(raw.to_string()))
                } else {
                    Err(format!("{raw:?} is not one of {}", choices.join("|")))
                }
            }
            ParamType::Member | ParamType::Entry => Ok(Value::List(vec![raw.to_string()])),
        }
    }

    /// Check that `value` has the shape this type expects.
    ///
    /// Text must survive a trip through the device unchanged, so empty
    /// strings and strings with surrounding whitespace are refused.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (ParamType::Text, Value::Text(text)) => check_text(text),
            (ParamType::Int, Value::Int(_)) | (ParamType::YesNo, Value::Bool(_)) => Ok(()),
            (ParamType::Member | ParamType::Entry, Value::List(items)) => {
                items.iter().try_for_each(|item| check_text(item))
            }
            (ParamType::Enum(choices) | ParamType::Selector(choices), Value::Text(text)) => {
                if choices.contains(&text.as_str()) {
                    Ok(())
                } else {
                    Err(format!("{text:?} is not one of {}", choices.join("|")))
                }
            }
            (ty, value) => Err(format!("{value} does not fit a {ty:?} field")),
        }
    }
}

fn check_text(text: &str) -> Result<(), String> {
    if text.is_empty() {
        return Err("empty text is not kept by the device".to_string());
    }
    if text.trim() != text {
        return Err(format!("{text:?} has leading or trailing whitespace"));
    }
    Ok(())
}

/// Fields of `params` that apply to `version`, in declaration order.
pub fn resolve(params: &'static [ParamSpec], version: &Version) -> Vec<&'static ParamSpec> {
    params.iter().filter(|p| p.applies_to(version)).collect()
}

/// The single declaration of `name` applying to `version`.
pub fn find(params: &'static [ParamSpec], name: &str, version: &Version) -> Option<&'static ParamSpec> {
    params
        .iter()
        .find(|p| p.name == name && p.applies_to(version))
}

/// Report declarations of the same field whose version ranges overlap.
pub fn overlapping_declarations(params: &[ParamSpec]) -> Vec<&'static str> {
    let mut overlaps = Vec::new();
    for (i, a) in params.iter().enumerate() {
        for b in &params[i + 1..] {
            if a.name == b.name && ranges_overlap(a, b) && !overlaps.contains(&a.name) {
                overlaps.push(a.name);
            }
        }
    }
    overlaps
}

fn ranges_overlap(a: &ParamSpec, b: &ParamSpec) -> bool {
    // [since, until) intervals; None is unbounded.
    let a_before_b = matches!((a.until, b.since), (Some(end), Some(start)) if end <= start);
    let b_before_a = matches!((b.until, a.since), (Some(end), Some(start)) if end <= start);
    !(a_before_b || b_before_a)
}

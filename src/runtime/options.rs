//! Actor configuration surface
//!
//! Each actor declares a static table of [`OptionDescriptor`]s. Values are
//! applied through [`crate::runtime::actor::configure`], and any property may
//! be bound to a flow variable instead of a literal value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::variables;

/// Kind of value a property holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// `true` / `false`
    Boolean,
    /// Signed integer
    Integer,
    /// Floating point
    Double,
    /// Free text (names, paths, lists)
    Text,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionKind::Boolean => "boolean",
            OptionKind::Integer => "integer",
            OptionKind::Double => "double",
            OptionKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Value of a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Double(f64),
    /// Text value
    Text(String),
}

impl OptionValue {
    /// Kind of this value
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Boolean(_) => OptionKind::Boolean,
            OptionValue::Integer(_) => OptionKind::Integer,
            OptionValue::Double(_) => OptionKind::Double,
            OptionValue::Text(_) => OptionKind::Text,
        }
    }

    /// Parse a variable's string value into the given kind
    pub fn parse(kind: OptionKind, raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        match kind {
            OptionKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(OptionValue::Boolean(true)),
                "false" | "no" | "0" => Ok(OptionValue::Boolean(false)),
                _ => Err(format!("'{}' is not a boolean", raw)),
            },
            OptionKind::Integer => trimmed
                .parse()
                .map(OptionValue::Integer)
                .map_err(|_| format!("'{}' is not an integer", raw)),
            OptionKind::Double => trimmed
                .parse()
                .map(OptionValue::Double)
                .map_err(|_| format!("'{}' is not a number", raw)),
            OptionKind::Text => Ok(OptionValue::Text(raw.to_string())),
        }
    }

    /// Convert to the given kind where that is lossless
    pub fn coerce(self, kind: OptionKind) -> Result<Self, String> {
        match (self, kind) {
            (value, kind) if value.kind() == kind => Ok(value),
            (OptionValue::Integer(i), OptionKind::Double) => Ok(OptionValue::Double(i as f64)),
            (OptionValue::Text(s), kind) => OptionValue::parse(kind, &s),
            (value, kind) => Err(format!("expected {} value, got {}", kind, value)),
        }
    }

    /// Boolean content
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer content
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OptionValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric content
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Double(d) => Some(*d),
            OptionValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Text content
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Boolean(b) => write!(f, "{}", b),
            OptionValue::Integer(i) => write!(f, "{}", i),
            OptionValue::Double(d) => write!(f, "{}", d),
            OptionValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Boolean(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Integer(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Double(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

/// Compile-time default of a property
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionDefault {
    /// Boolean default
    Boolean(bool),
    /// Integer default
    Integer(i64),
    /// Floating point default
    Double(f64),
    /// Text default
    Text(&'static str),
}

impl OptionDefault {
    /// Materialize as an owned value
    pub fn value(self) -> OptionValue {
        match self {
            OptionDefault::Boolean(b) => OptionValue::Boolean(b),
            OptionDefault::Integer(i) => OptionValue::Integer(i),
            OptionDefault::Double(d) => OptionValue::Double(d),
            OptionDefault::Text(s) => OptionValue::Text(s.to_string()),
        }
    }
}

/// Static descriptor for one actor property
#[derive(Debug, Clone)]
pub struct OptionDescriptor {
    /// Property name (kebab-case)
    pub name: &'static str,
    /// Value kind
    pub kind: OptionKind,
    /// Default value
    pub default: OptionDefault,
    /// One-line description
    pub help: &'static str,
}

impl OptionDescriptor {
    /// Boolean property
    pub const fn flag(name: &'static str, default: bool, help: &'static str) -> Self {
        Self {
            name,
            kind: OptionKind::Boolean,
            default: OptionDefault::Boolean(default),
            help,
        }
    }

    /// Integer property
    pub const fn integer(name: &'static str, default: i64, help: &'static str) -> Self {
        Self {
            name,
            kind: OptionKind::Integer,
            default: OptionDefault::Integer(default),
            help,
        }
    }

    /// Floating point property
    pub const fn double(name: &'static str, default: f64, help: &'static str) -> Self {
        Self {
            name,
            kind: OptionKind::Double,
            default: OptionDefault::Double(default),
            help,
        }
    }

    /// Text property
    pub const fn text(name: &'static str, default: &'static str, help: &'static str) -> Self {
        Self {
            name,
            kind: OptionKind::Text,
            default: OptionDefault::Text(default),
            help,
        }
    }
}

/// Properties every actor has, handled by the actor core
pub static COMMON_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::text("name", "", "The name of the actor."),
    OptionDescriptor::flag(
        "skip",
        false,
        "If set, the actor is skipped and incoming tokens are dropped.",
    ),
    OptionDescriptor::flag(
        "silent",
        false,
        "If set, errors are returned to the driver but not reported on the console.",
    ),
    OptionDescriptor::flag(
        "stop-flow-on-error",
        false,
        "If set, the flow gets stopped in case this actor encounters an error.",
    ),
];

/// Find a descriptor by name
pub fn find_descriptor<'a>(
    table: &'a [OptionDescriptor],
    name: &str,
) -> Option<&'a OptionDescriptor> {
    table.iter().find(|d| d.name == name)
}

/// Variable bindings of one actor
///
/// Tracks which property is bound to which variable, and the value last
/// applied for each, so a reconfiguration only happens when a bound value
/// actually changed.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    variables: BTreeMap<String, String>,
    applied: BTreeMap<String, OptionValue>,
}

impl Bindings {
    /// Bind a property to a variable (name with or without `@{}`)
    pub fn bind(&mut self, property: impl Into<String>, variable: &str) {
        let property = property.into();
        self.applied.remove(&property);
        self.variables
            .insert(property, variables::extract_name(variable).to_string());
    }

    /// Drop the binding of a property
    pub fn unbind(&mut self, property: &str) -> Option<String> {
        self.applied.remove(property);
        self.variables.remove(property)
    }

    /// Variable a property is bound to
    pub fn variable_for(&self, property: &str) -> Option<&str> {
        self.variables.get(property).map(String::as_str)
    }

    /// Whether the property is variable-bound
    pub fn is_bound(&self, property: &str) -> bool {
        self.variables.contains_key(property)
    }

    /// Whether any property is bound
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Iterate over `(property, variable)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables
            .iter()
            .map(|(p, v)| (p.as_str(), v.as_str()))
    }

    /// Value last applied to a bound property
    pub fn applied(&self, property: &str) -> Option<&OptionValue> {
        self.applied.get(property)
    }

    /// Record the value applied to a bound property
    pub fn mark_applied(&mut self, property: &str, value: OptionValue) {
        self.applied.insert(property.to_string(), value);
    }

    /// Forget applied values so the next set-up re-applies all of them
    pub fn clear_applied(&mut self) {
        self.applied.clear();
    }
}

/// Builder for an actor's quick-info line
///
/// Only non-default or variable-bound settings show up; a bound property is
/// shown as its `@{variable}` placeholder.
pub struct QuickInfo<'a> {
    bindings: &'a Bindings,
    parts: Vec<String>,
}

impl<'a> QuickInfo<'a> {
    /// Start a quick-info line for an actor with the given bindings
    pub fn new(bindings: &'a Bindings) -> Self {
        Self {
            bindings,
            parts: Vec::new(),
        }
    }

    /// Add `label: value`, or `label: @{var}` when bound
    pub fn value(mut self, property: &str, label: &str, value: impl fmt::Display) -> Self {
        match self.bindings.variable_for(property) {
            Some(var) => self.parts.push(format!("{}: {}", label, variables::pad_name(var))),
            None => self.parts.push(format!("{}: {}", label, value)),
        }
        self
    }

    /// Add `label` if the flag is set, or `label: @{var}` when bound
    pub fn flag(mut self, property: &str, label: &str, enabled: bool) -> Self {
        match self.bindings.variable_for(property) {
            Some(var) => self.parts.push(format!("{}: {}", label, variables::pad_name(var))),
            None if enabled => self.parts.push(label.to_string()),
            None => {}
        }
        self
    }

    /// Finish; `None` when nothing is worth showing
    pub fn finish(self) -> Option<String> {
        if self.parts.is_empty() {
            None
        } else {
            Some(self.parts.join(", "))
        }
    }
}

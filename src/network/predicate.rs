/*!
Typed filters used by `Overlay::nodes` and `Overlay::edges`.

A `Predicate` is evaluated against one attribute map (a node's or an edge's).
An `EdgePredicate` is evaluated against an edge and additionally has access to both
endpoints, which is what `attr_equal` and `attr_both` need.
*/

use std::collections::BTreeMap;

use crate::network::node::{AttrValue, DeviceRole};

pub type Attributes = BTreeMap<String, AttrValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches everything.
    Any,
    /// Attribute is present and truthy.
    Truthy(String),
    /// Attribute is present and equal to the value.
    Equals(String, AttrValue),
    Not(Box<Predicate>),
    All(Vec<Predicate>),
    Either(Vec<Predicate>),
}

impl Predicate {
    pub fn matches(&self, attrs: &Attributes) -> bool {
        match self {
            Predicate::Any => true,
            Predicate::Truthy(name) => attrs.get(name).is_some_and(AttrValue::is_truthy),
            Predicate::Equals(name, value) => attrs.get(name) == Some(value),
            Predicate::Not(inner) => !inner.matches(attrs),
            Predicate::All(all) => all.iter().all(|p| p.matches(attrs)),
            Predicate::Either(any) => any.iter().any(|p| p.matches(attrs)),
        }
    }

    pub fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::Any => other,
            Predicate::All(mut all) => {
                all.push(other);
                Predicate::All(all)
            }
            this => Predicate::All(vec![this, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Predicate {
        match self {
            Predicate::Either(mut any) => {
                any.push(other);
                Predicate::Either(any)
            }
            this => Predicate::Either(vec![this, other]),
        }
    }

    pub fn negate(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }
}

/// Attribute-name shorthand: the attribute is truthy.
pub fn attr(name: &str) -> Predicate {
    Predicate::Truthy(name.to_string())
}

pub fn attr_eq(name: &str, value: impl Into<AttrValue>) -> Predicate {
    Predicate::Equals(name.to_string(), value.into())
}

pub fn role(role: DeviceRole) -> Predicate {
    attr_eq("device_type", role.as_str())
}

pub fn is_router() -> Predicate {
    role(DeviceRole::Router)
}

pub fn is_switch() -> Predicate {
    role(DeviceRole::Switch)
}

pub fn is_server() -> Predicate {
    role(DeviceRole::Server)
}

/// Devices that terminate IP: routers and servers.
pub fn is_l3device() -> Predicate {
    is_router().or(is_server())
}

#[derive(Debug, Clone, PartialEq)]
pub enum EdgePredicate {
    Any,
    /// Predicate over the edge's own attributes.
    Attr(Predicate),
    /// Both endpoints carry the same value for the attribute (both missing counts as equal).
    AttrEqual(String),
    /// Both endpoints satisfy the predicate.
    AttrBoth(Predicate),
    Not(Box<EdgePredicate>),
    All(Vec<EdgePredicate>),
}

impl EdgePredicate {
    pub fn matches(&self, edge: &Attributes, src: &Attributes, dst: &Attributes) -> bool {
        match self {
            EdgePredicate::Any => true,
            EdgePredicate::Attr(p) => p.matches(edge),
            EdgePredicate::AttrEqual(name) => src.get(name) == dst.get(name),
            EdgePredicate::AttrBoth(p) => p.matches(src) && p.matches(dst),
            EdgePredicate::Not(inner) => !inner.matches(edge, src, dst),
            EdgePredicate::All(all) => all.iter().all(|p| p.matches(edge, src, dst)),
        }
    }

    pub fn and(self, other: EdgePredicate) -> EdgePredicate {
        match self {
            EdgePredicate::Any => other,
            EdgePredicate::All(mut all) => {
                all.push(other);
                EdgePredicate::All(all)
            }
            this => EdgePredicate::All(vec![this, other]),
        }
    }

    pub fn negate(self) -> EdgePredicate {
        EdgePredicate::Not(Box::new(self))
    }
}

pub fn attr_equal(name: &str) -> EdgePredicate {
    EdgePredicate::AttrEqual(name.to_string())
}

pub fn attr_both(predicate: Predicate) -> EdgePredicate {
    EdgePredicate::AttrBoth(predicate)
}

pub fn edge_attr_eq(name: &str, value: impl Into<AttrValue>) -> EdgePredicate {
    EdgePredicate::Attr(attr_eq(name, value))
}

//! Module `node` implement the tagged node model for JSON and XML trees.
//!
//! The source of truth for a node is its encoded record inside a record
//! page. In memory a node is a [Node] value: a fixed [NodeHeader] plus a
//! variant payload composed out of small delegate structs. A `&Node` is
//! the immutable view handed out by read cursors; write cursors produce
//! new copies.

use std::fmt;

use crate::{
    util::{
        self,
        binary::{self, put_bytes, put_i32, put_i64, put_u32, put_u64, put_u8},
    },
    Result,
};

pub mod dewey;

pub use dewey::DeweyId;

/// Sentinel for "no node".
pub const NULL_NODE_KEY: i64 = -1;
/// Node key of the document root, the only node with no parent.
pub const DOCUMENT_ROOT: i64 = 0;

/// Kind tags for every node variant, stable on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeKind {
    XmlDocument = 1,
    Element = 2,
    Attribute = 3,
    Namespace = 4,
    Text = 5,
    Comment = 6,
    ProcessingInstruction = 7,

    JsonDocument = 16,
    Object = 17,
    ObjectKey = 18,
    Array = 19,
    StringValue = 20,
    BooleanValue = 21,
    NumberValue = 22,
    NullValue = 23,
    ObjectStringValue = 24,
    ObjectBooleanValue = 25,
    ObjectNumberValue = 26,
    ObjectNullValue = 27,
}

impl NodeKind {
    pub fn from_u8(tag: u8) -> Result<NodeKind> {
        use NodeKind::*;

        let kind = match tag {
            1 => XmlDocument,
            2 => Element,
            3 => Attribute,
            4 => Namespace,
            5 => Text,
            6 => Comment,
            7 => ProcessingInstruction,
            16 => JsonDocument,
            17 => Object,
            18 => ObjectKey,
            19 => Array,
            20 => StringValue,
            21 => BooleanValue,
            22 => NumberValue,
            23 => NullValue,
            24 => ObjectStringValue,
            25 => ObjectBooleanValue,
            26 => ObjectNumberValue,
            27 => ObjectNullValue,
            tag => return err_at!(Corrupt, msg: "unknown node kind {}", tag),
        };
        Ok(kind)
    }

    /// Whether nodes of this kind participate in the first-child /
    /// sibling structure.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            NodeKind::Attribute | NodeKind::Namespace
        )
    }

    /// Whether this kind is a JSON value leaf.
    pub fn is_json_value(&self) -> bool {
        use NodeKind::*;

        matches!(
            self,
            StringValue
                | BooleanValue
                | NumberValue
                | NullValue
                | ObjectStringValue
                | ObjectBooleanValue
                | ObjectNumberValue
                | ObjectNullValue
        )
    }
}

/// Common head of every node record.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct NodeHeader {
    pub node_key: i64,
    pub parent_key: i64,
    /// Rolling subtree hash, maintained by the write cursor.
    pub hash: u64,
    pub previous_revision: u32,
    pub last_modified_revision: u32,
}

/// Structural links and counts for container-like nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct StructDelegate {
    pub first_child: i64,
    pub last_child: i64,
    pub left_sibling: i64,
    pub right_sibling: i64,
    pub child_count: u64,
    pub descendant_count: u64,
}

impl Default for StructDelegate {
    fn default() -> StructDelegate {
        StructDelegate {
            first_child: NULL_NODE_KEY,
            last_child: NULL_NODE_KEY,
            left_sibling: NULL_NODE_KEY,
            right_sibling: NULL_NODE_KEY,
            child_count: 0,
            descendant_count: 0,
        }
    }
}

/// Name payload for name-bearing variants, three small integers into the
/// resource-wide name dictionary and one reference into the path summary.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct NameDelegate {
    pub uri_key: i32,
    pub prefix_key: i32,
    pub local_name_key: i32,
    pub path_node_key: i64,
}

/// Raw byte payload for value-bearing variants.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ValueDelegate {
    pub value: Vec<u8>,
}

/// JSON number payload, integral values keep exact 64-bit precision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Integer(i64),
    Double(f64),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Number::Integer(val) => write!(f, "{}", val),
            Number::Double(val) => write!(f, "{}", val),
        }
    }
}

/// Variant payloads; each combines the delegates its kind needs.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    XmlDocument {
        st: StructDelegate,
    },
    Element {
        st: StructDelegate,
        name: NameDelegate,
        attribute_keys: Vec<i64>,
        namespace_keys: Vec<i64>,
    },
    Attribute {
        name: NameDelegate,
        value: ValueDelegate,
    },
    Namespace {
        name: NameDelegate,
    },
    Text {
        st: StructDelegate,
        value: ValueDelegate,
    },
    Comment {
        st: StructDelegate,
        value: ValueDelegate,
    },
    ProcessingInstruction {
        st: StructDelegate,
        name: NameDelegate,
        value: ValueDelegate,
    },
    JsonDocument {
        st: StructDelegate,
    },
    Object {
        st: StructDelegate,
    },
    ObjectKey {
        st: StructDelegate,
        name_key: i32,
        path_node_key: i64,
    },
    Array {
        st: StructDelegate,
    },
    StringValue {
        st: StructDelegate,
        value: ValueDelegate,
        in_object: bool,
    },
    BooleanValue {
        st: StructDelegate,
        value: bool,
        in_object: bool,
    },
    NumberValue {
        st: StructDelegate,
        value: Number,
        in_object: bool,
    },
    NullValue {
        st: StructDelegate,
        in_object: bool,
    },
}

/// A single tree node: header + variant payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub header: NodeHeader,
    pub payload: Payload,
}

impl Node {
    pub fn new(header: NodeHeader, payload: Payload) -> Node {
        Node { header, payload }
    }

    pub fn kind(&self) -> NodeKind {
        use NodeKind as K;

        match &self.payload {
            Payload::XmlDocument { .. } => K::XmlDocument,
            Payload::Element { .. } => K::Element,
            Payload::Attribute { .. } => K::Attribute,
            Payload::Namespace { .. } => K::Namespace,
            Payload::Text { .. } => K::Text,
            Payload::Comment { .. } => K::Comment,
            Payload::ProcessingInstruction { .. } => K::ProcessingInstruction,
            Payload::JsonDocument { .. } => K::JsonDocument,
            Payload::Object { .. } => K::Object,
            Payload::ObjectKey { .. } => K::ObjectKey,
            Payload::Array { .. } => K::Array,
            Payload::StringValue { in_object, .. } => {
                if *in_object {
                    K::ObjectStringValue
                } else {
                    K::StringValue
                }
            }
            Payload::BooleanValue { in_object, .. } => {
                if *in_object {
                    K::ObjectBooleanValue
                } else {
                    K::BooleanValue
                }
            }
            Payload::NumberValue { in_object, .. } => {
                if *in_object {
                    K::ObjectNumberValue
                } else {
                    K::NumberValue
                }
            }
            Payload::NullValue { in_object, .. } => {
                if *in_object {
                    K::ObjectNullValue
                } else {
                    K::NullValue
                }
            }
        }
    }

    pub fn node_key(&self) -> i64 {
        self.header.node_key
    }

    pub fn parent_key(&self) -> i64 {
        self.header.parent_key
    }

    pub fn as_struct(&self) -> Option<&StructDelegate> {
        use Payload::*;

        match &self.payload {
            XmlDocument { st }
            | Element { st, .. }
            | Text { st, .. }
            | Comment { st, .. }
            | ProcessingInstruction { st, .. }
            | JsonDocument { st }
            | Object { st }
            | ObjectKey { st, .. }
            | Array { st }
            | StringValue { st, .. }
            | BooleanValue { st, .. }
            | NumberValue { st, .. }
            | NullValue { st, .. } => Some(st),
            Attribute { .. } | Namespace { .. } => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut StructDelegate> {
        use Payload::*;

        match &mut self.payload {
            XmlDocument { st }
            | Element { st, .. }
            | Text { st, .. }
            | Comment { st, .. }
            | ProcessingInstruction { st, .. }
            | JsonDocument { st }
            | Object { st }
            | ObjectKey { st, .. }
            | Array { st }
            | StringValue { st, .. }
            | BooleanValue { st, .. }
            | NumberValue { st, .. }
            | NullValue { st, .. } => Some(st),
            Attribute { .. } | Namespace { .. } => None,
        }
    }

    pub fn first_child_key(&self) -> i64 {
        self.as_struct().map(|st| st.first_child).unwrap_or(NULL_NODE_KEY)
    }

    pub fn last_child_key(&self) -> i64 {
        self.as_struct().map(|st| st.last_child).unwrap_or(NULL_NODE_KEY)
    }

    pub fn left_sibling_key(&self) -> i64 {
        self.as_struct().map(|st| st.left_sibling).unwrap_or(NULL_NODE_KEY)
    }

    pub fn right_sibling_key(&self) -> i64 {
        self.as_struct().map(|st| st.right_sibling).unwrap_or(NULL_NODE_KEY)
    }

    pub fn child_count(&self) -> u64 {
        self.as_struct().map(|st| st.child_count).unwrap_or(0)
    }

    pub fn descendant_count(&self) -> u64 {
        self.as_struct().map(|st| st.descendant_count).unwrap_or(0)
    }

    pub fn as_name(&self) -> Option<&NameDelegate> {
        use Payload::*;

        match &self.payload {
            Element { name, .. }
            | Attribute { name, .. }
            | Namespace { name }
            | ProcessingInstruction { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Path summary reference for name-bearing and object-key nodes.
    pub fn path_node_key(&self) -> i64 {
        match &self.payload {
            Payload::ObjectKey { path_node_key, .. } => *path_node_key,
            _ => self
                .as_name()
                .map(|name| name.path_node_key)
                .unwrap_or(NULL_NODE_KEY),
        }
    }

    /// Name dictionary key for the local name; object keys carry one too.
    pub fn local_name_key(&self) -> i32 {
        match &self.payload {
            Payload::ObjectKey { name_key, .. } => *name_key,
            _ => self.as_name().map(|name| name.local_name_key).unwrap_or(-1),
        }
    }

    pub fn value_bytes(&self) -> Option<&[u8]> {
        use Payload::*;

        match &self.payload {
            Attribute { value, .. }
            | Text { value, .. }
            | Comment { value, .. }
            | ProcessingInstruction { value, .. }
            | StringValue { value, .. } => Some(&value.value),
            _ => None,
        }
    }

    pub fn bool_value(&self) -> Option<bool> {
        match &self.payload {
            Payload::BooleanValue { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn number_value(&self) -> Option<Number> {
        match &self.payload {
            Payload::NumberValue { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Hash over this node's own identity, ignoring subtree state. The
    /// rolling subtree hash in the header combines these bottom up.
    pub fn local_hash(&self) -> u64 {
        let mut buf: Vec<u8> = vec![self.kind() as u8];
        if let Some(name) = self.as_name() {
            put_i32(&mut buf, name.uri_key);
            put_i32(&mut buf, name.prefix_key);
            put_i32(&mut buf, name.local_name_key);
        }
        if let Payload::ObjectKey { name_key, .. } = &self.payload {
            put_i32(&mut buf, *name_key);
        }
        if let Some(value) = self.value_bytes() {
            buf.extend_from_slice(value);
        }
        match &self.payload {
            Payload::BooleanValue { value, .. } => put_u8(&mut buf, *value as u8),
            Payload::NumberValue { value, .. } => match value {
                Number::Integer(val) => put_i64(&mut buf, *val),
                Number::Double(val) => binary::put_f64(&mut buf, *val),
            },
            _ => (),
        }
        util::fold_digest(cityhash_rs::cityhash_110_128(&buf))
    }
}

// Wire form of a node record:
//   u8 kind || header || payload-fields in declaration order.
// Dewey-ids are not part of the record, they live in the record page's
// side table.
impl Node {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        put_u8(buf, self.kind() as u8);
        put_i64(buf, self.header.node_key);
        put_i64(buf, self.header.parent_key);
        put_u64(buf, self.header.hash);
        put_u32(buf, self.header.previous_revision);
        put_u32(buf, self.header.last_modified_revision);

        if let Some(st) = self.as_struct() {
            put_i64(buf, st.first_child);
            put_i64(buf, st.last_child);
            put_i64(buf, st.left_sibling);
            put_i64(buf, st.right_sibling);
            put_u64(buf, st.child_count);
            put_u64(buf, st.descendant_count);
        }
        if let Some(name) = self.as_name() {
            put_i32(buf, name.uri_key);
            put_i32(buf, name.prefix_key);
            put_i32(buf, name.local_name_key);
            put_i64(buf, name.path_node_key);
        }

        match &self.payload {
            Payload::Element {
                attribute_keys,
                namespace_keys,
                ..
            } => {
                put_u32(buf, attribute_keys.len() as u32);
                for key in attribute_keys.iter() {
                    put_i64(buf, *key);
                }
                put_u32(buf, namespace_keys.len() as u32);
                for key in namespace_keys.iter() {
                    put_i64(buf, *key);
                }
            }
            Payload::ObjectKey {
                name_key,
                path_node_key,
                ..
            } => {
                put_i32(buf, *name_key);
                put_i64(buf, *path_node_key);
            }
            Payload::BooleanValue { value, .. } => put_u8(buf, *value as u8),
            Payload::NumberValue { value, .. } => match value {
                Number::Integer(val) => {
                    put_u8(buf, 0);
                    put_i64(buf, *val);
                }
                Number::Double(val) => {
                    put_u8(buf, 1);
                    binary::put_f64(buf, *val);
                }
            },
            _ => (),
        }

        if let Some(value) = self.value_bytes() {
            put_bytes(buf, value);
        }
    }

    pub fn decode(buf: &mut &[u8]) -> Result<Node> {
        use NodeKind as K;

        let kind = NodeKind::from_u8(binary::take_u8(buf)?)?;
        let header = NodeHeader {
            node_key: binary::take_i64(buf)?,
            parent_key: binary::take_i64(buf)?,
            hash: binary::take_u64(buf)?,
            previous_revision: binary::take_u32(buf)?,
            last_modified_revision: binary::take_u32(buf)?,
        };

        let st = if kind.is_structural() {
            Some(StructDelegate {
                first_child: binary::take_i64(buf)?,
                last_child: binary::take_i64(buf)?,
                left_sibling: binary::take_i64(buf)?,
                right_sibling: binary::take_i64(buf)?,
                child_count: binary::take_u64(buf)?,
                descendant_count: binary::take_u64(buf)?,
            })
        } else {
            None
        };

        let name_bearing = matches!(
            kind,
            K::Element | K::Attribute | K::Namespace | K::ProcessingInstruction
        );
        let name = if name_bearing {
            Some(NameDelegate {
                uri_key: binary::take_i32(buf)?,
                prefix_key: binary::take_i32(buf)?,
                local_name_key: binary::take_i32(buf)?,
                path_node_key: binary::take_i64(buf)?,
            })
        } else {
            None
        };

        let payload = match kind {
            K::XmlDocument => Payload::XmlDocument { st: st.unwrap() },
            K::Element => {
                let mut attribute_keys = vec![];
                for _ in 0..binary::take_u32(buf)? {
                    attribute_keys.push(binary::take_i64(buf)?);
                }
                let mut namespace_keys = vec![];
                for _ in 0..binary::take_u32(buf)? {
                    namespace_keys.push(binary::take_i64(buf)?);
                }
                Payload::Element {
                    st: st.unwrap(),
                    name: name.unwrap(),
                    attribute_keys,
                    namespace_keys,
                }
            }
            K::Attribute => Payload::Attribute {
                name: name.unwrap(),
                value: ValueDelegate {
                    value: binary::take_bytes(buf)?,
                },
            },
            K::Namespace => Payload::Namespace { name: name.unwrap() },
            K::Text => Payload::Text {
                st: st.unwrap(),
                value: ValueDelegate {
                    value: binary::take_bytes(buf)?,
                },
            },
            K::Comment => Payload::Comment {
                st: st.unwrap(),
                value: ValueDelegate {
                    value: binary::take_bytes(buf)?,
                },
            },
            K::ProcessingInstruction => Payload::ProcessingInstruction {
                st: st.unwrap(),
                name: name.unwrap(),
                value: ValueDelegate {
                    value: binary::take_bytes(buf)?,
                },
            },
            K::JsonDocument => Payload::JsonDocument { st: st.unwrap() },
            K::Object => Payload::Object { st: st.unwrap() },
            K::ObjectKey => Payload::ObjectKey {
                st: st.unwrap(),
                name_key: binary::take_i32(buf)?,
                path_node_key: binary::take_i64(buf)?,
            },
            K::Array => Payload::Array { st: st.unwrap() },
            K::StringValue | K::ObjectStringValue => Payload::StringValue {
                st: st.unwrap(),
                value: ValueDelegate {
                    value: binary::take_bytes(buf)?,
                },
                in_object: kind == K::ObjectStringValue,
            },
            K::BooleanValue | K::ObjectBooleanValue => Payload::BooleanValue {
                st: st.unwrap(),
                value: binary::take_u8(buf)? != 0,
                in_object: kind == K::ObjectBooleanValue,
            },
            K::NumberValue | K::ObjectNumberValue => {
                let value = match binary::take_u8(buf)? {
                    0 => Number::Integer(binary::take_i64(buf)?),
                    1 => Number::Double(binary::take_f64(buf)?),
                    tag => return err_at!(Corrupt, msg: "bad number tag {}", tag),
                };
                Payload::NumberValue {
                    st: st.unwrap(),
                    value,
                    in_object: kind == K::ObjectNumberValue,
                }
            }
            K::NullValue | K::ObjectNullValue => Payload::NullValue {
                st: st.unwrap(),
                in_object: kind == K::ObjectNullValue,
            },
        };

        Ok(Node { header, payload })
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;

//! Module `node` define the records persisted by the red-black index
//! tree, and the key types the secondary indexes order by.

use std::cmp::Ordering;

use crate::{
    index::refs::NodeReferences,
    util::binary::{self, put_bytes, put_i64, put_u8},
    Result,
};

/// Qualified name, the key of a NAME index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct QNm {
    pub uri: String,
    pub local: String,
}

impl QNm {
    pub fn new(uri: &str, local: &str) -> QNm {
        QNm {
            uri: uri.to_string(),
            local: local.to_string(),
        }
    }

    pub fn local(local: &str) -> QNm {
        QNm::new("", local)
    }
}

impl PartialOrd for QNm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QNm {
    fn cmp(&self, other: &Self) -> Ordering {
        self.local
            .cmp(&other.local)
            .then_with(|| self.uri.cmp(&other.uri))
    }
}

/// Typed atomic value, the content half of a CAS key.
#[derive(Clone, Debug, PartialEq)]
pub enum Atomic {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    Str(String),
}

impl Atomic {
    fn type_rank(&self) -> u8 {
        match self {
            Atomic::Null => 0,
            Atomic::Bool(_) => 1,
            Atomic::Integer(_) => 2,
            Atomic::Double(_) => 3,
            Atomic::Str(_) => 4,
        }
    }
}

impl Eq for Atomic {}

impl PartialOrd for Atomic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Atomic {
    fn cmp(&self, other: &Self) -> Ordering {
        use Atomic::*;

        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Double(a), Double(b)) => a.total_cmp(b),
            // numeric kinds compare across each other.
            (Integer(a), Double(b)) => (*a as f64).total_cmp(b),
            (Double(a), Integer(b)) => a.total_cmp(&(*b as f64)),
            (Str(a), Str(b)) => a.cmp(b),
            (a, b) => a.type_rank().cmp(&b.type_rank()),
        }
    }
}

/// CAS index key, `(path_node_key asc, typed atomic asc)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CasKey {
    pub path: i64,
    pub value: Atomic,
}

impl PartialOrd for CasKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CasKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path
            .cmp(&other.path)
            .then_with(|| self.value.cmp(&other.value))
    }
}

/// Runtime-tagged key over the three index kinds. Keys of one tree are
/// always the same variant; the tag keeps records self describing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexKey {
    Path(i64),
    Name(QNm),
    Cas(CasKey),
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        use IndexKey::*;

        match (self, other) {
            (Path(a), Path(b)) => a.cmp(b),
            (Name(a), Name(b)) => a.cmp(b),
            (Cas(a), Cas(b)) => a.cmp(b),
            _ => unreachable!("mixed key kinds in one index"),
        }
    }
}

impl IndexKey {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            IndexKey::Path(pcr) => {
                put_u8(buf, 0);
                put_i64(buf, *pcr);
            }
            IndexKey::Name(qnm) => {
                put_u8(buf, 1);
                put_bytes(buf, qnm.uri.as_bytes());
                put_bytes(buf, qnm.local.as_bytes());
            }
            IndexKey::Cas(cas) => {
                put_u8(buf, 2);
                put_i64(buf, cas.path);
                match &cas.value {
                    Atomic::Null => put_u8(buf, 0),
                    Atomic::Bool(val) => {
                        put_u8(buf, 1);
                        put_u8(buf, *val as u8);
                    }
                    Atomic::Integer(val) => {
                        put_u8(buf, 2);
                        put_i64(buf, *val);
                    }
                    Atomic::Double(val) => {
                        put_u8(buf, 3);
                        binary::put_f64(buf, *val);
                    }
                    Atomic::Str(val) => {
                        put_u8(buf, 4);
                        put_bytes(buf, val.as_bytes());
                    }
                }
            }
        }
    }

    pub fn decode(buf: &mut &[u8]) -> Result<IndexKey> {
        let key = match binary::take_u8(buf)? {
            0 => IndexKey::Path(binary::take_i64(buf)?),
            1 => {
                let uri = take_string(buf)?;
                let local = take_string(buf)?;
                IndexKey::Name(QNm { uri, local })
            }
            2 => {
                let path = binary::take_i64(buf)?;
                let value = match binary::take_u8(buf)? {
                    0 => Atomic::Null,
                    1 => Atomic::Bool(binary::take_u8(buf)? != 0),
                    2 => Atomic::Integer(binary::take_i64(buf)?),
                    3 => Atomic::Double(binary::take_f64(buf)?),
                    4 => Atomic::Str(take_string(buf)?),
                    tag => return err_at!(Corrupt, msg: "bad atomic tag {}", tag),
                };
                IndexKey::Cas(CasKey { path, value })
            }
            tag => return err_at!(Corrupt, msg: "bad index key tag {}", tag),
        };
        Ok(key)
    }

    /// Order preserving byte encoding, the trie backend walks these.
    pub fn to_ordered_bytes(&self) -> Vec<u8> {
        let mut buf = vec![];
        match self {
            IndexKey::Path(pcr) => {
                buf.extend_from_slice(&(*pcr as u64 ^ (1 << 63)).to_be_bytes());
            }
            IndexKey::Name(qnm) => {
                buf.extend_from_slice(qnm.local.as_bytes());
                buf.push(0);
                buf.extend_from_slice(qnm.uri.as_bytes());
            }
            IndexKey::Cas(cas) => {
                buf.extend_from_slice(&(cas.path as u64 ^ (1 << 63)).to_be_bytes());
                buf.push(cas.value.type_rank());
                match &cas.value {
                    Atomic::Null => (),
                    Atomic::Bool(val) => buf.push(*val as u8),
                    Atomic::Integer(val) => {
                        buf.extend_from_slice(&(*val as u64 ^ (1 << 63)).to_be_bytes())
                    }
                    Atomic::Double(val) => {
                        // flip sign bit, or all bits for negatives, so
                        // byte order equals numeric order.
                        let bits = val.to_bits();
                        let bits = if bits >> 63 == 0 {
                            bits ^ (1 << 63)
                        } else {
                            !bits
                        };
                        buf.extend_from_slice(&bits.to_be_bytes());
                    }
                    Atomic::Str(val) => buf.extend_from_slice(val.as_bytes()),
                }
            }
        }
        buf
    }
}

fn take_string(buf: &mut &[u8]) -> Result<String> {
    err_at!(FailConvert, String::from_utf8(binary::take_bytes(buf)?))
}

/// Key node of the red-black tree. Its paired value node lives at
/// `node_key + 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct RbNode {
    pub node_key: i64,
    pub parent: i64,
    pub key: IndexKey,
    pub value_node: i64,
    pub left: i64,
    pub right: i64,
    pub red: bool,
    /// Dirty marker, meaningful only inside a write transaction.
    pub changed: bool,
}

impl RbNode {
    pub fn new(node_key: i64, parent: i64, key: IndexKey) -> RbNode {
        RbNode {
            node_key,
            parent,
            key,
            value_node: node_key + 1,
            left: crate::node::NULL_NODE_KEY,
            right: crate::node::NULL_NODE_KEY,
            red: true,
            changed: true,
        }
    }
}

/// Value node carrying the [NodeReferences] payload.
#[derive(Clone, Debug, PartialEq)]
pub struct RbValue {
    pub node_key: i64,
    pub refs: NodeReferences,
}

impl RbNode {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        put_i64(buf, self.node_key);
        put_i64(buf, self.parent);
        self.key.encode(buf);
        put_i64(buf, self.value_node);
        put_i64(buf, self.left);
        put_i64(buf, self.right);
        put_u8(buf, self.red as u8);
    }

    pub fn decode(buf: &mut &[u8]) -> Result<RbNode> {
        Ok(RbNode {
            node_key: binary::take_i64(buf)?,
            parent: binary::take_i64(buf)?,
            key: IndexKey::decode(buf)?,
            value_node: binary::take_i64(buf)?,
            left: binary::take_i64(buf)?,
            right: binary::take_i64(buf)?,
            red: binary::take_u8(buf)? != 0,
            changed: false,
        })
    }
}

impl RbValue {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        put_i64(buf, self.node_key);
        self.refs.encode(buf);
    }

    pub fn decode(buf: &mut &[u8]) -> Result<RbValue> {
        Ok(RbValue {
            node_key: binary::take_i64(buf)?,
            refs: NodeReferences::decode(buf)?,
        })
    }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;

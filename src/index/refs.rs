//! Module `refs` implement the compressed node-key sets stored as index
//! values.

use croaring::{treemap::NativeSerializer, Treemap};

use crate::{
    util::binary::{self, put_u32},
    Result,
};

/// Compressed bitmap set of node keys, the value payload of every
/// secondary-index entry.
#[derive(Clone)]
pub struct NodeReferences {
    bitmap: Treemap,
}

impl Default for NodeReferences {
    fn default() -> NodeReferences {
        NodeReferences {
            bitmap: Treemap::create(),
        }
    }
}

impl NodeReferences {
    pub fn new() -> NodeReferences {
        NodeReferences::default()
    }

    pub fn add(&mut self, node_key: i64) {
        self.bitmap.add(node_key as u64);
    }

    /// Remove `node_key`, return whether it was present.
    pub fn remove(&mut self, node_key: i64) -> bool {
        let present = self.bitmap.contains(node_key as u64);
        if present {
            self.bitmap.remove(node_key as u64);
        }
        present
    }

    pub fn contains(&self, node_key: i64) -> bool {
        self.bitmap.contains(node_key as u64)
    }

    pub fn len(&self) -> u64 {
        self.bitmap.cardinality()
    }

    pub fn is_empty(&self) -> bool {
        self.bitmap.cardinality() == 0
    }

    /// Node keys in ascending order.
    pub fn to_keys(&self) -> Vec<i64> {
        self.bitmap.iter().map(|key| key as i64).collect()
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        let data = self.bitmap.serialize().expect("treemap serialize");
        put_u32(buf, data.len() as u32);
        buf.extend_from_slice(&data);
    }

    pub fn decode(buf: &mut &[u8]) -> Result<NodeReferences> {
        let n = binary::take_u32(buf)? as usize;
        let data = binary::take_slice(buf, n)?;
        Ok(NodeReferences {
            bitmap: Treemap::deserialize(data).expect("treemap deserialize"),
        })
    }
}

impl PartialEq for NodeReferences {
    fn eq(&self, other: &Self) -> bool {
        self.bitmap.cardinality() == other.bitmap.cardinality()
            && self.bitmap.iter().zip(other.bitmap.iter()).all(|(a, b)| a == b)
    }
}

impl std::fmt::Debug for NodeReferences {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "NodeReferences{:?}", self.to_keys())
    }
}

#[cfg(test)]
#[path = "refs_test.rs"]
mod refs_test;

//! Module `pathsummary` implement the path class record (PCR) tree.
//!
//! Every distinct path through the tree - object keys, array steps,
//! element names - gets one path node. Name-bearing nodes are stamped
//! with their path node key, and the PATH/CAS indexes use PCRs as keys
//! or key components. The summary is small, it is materialized whole
//! from its record subtree.

use std::collections::BTreeMap;

use crate::{
    names::{NameDictionary, NameSpace},
    util::binary::{self, put_i32, put_i64, put_u32, put_u64, put_u8},
    Result,
};

/// Path node key of the conceptual root, never materialized.
pub const PATH_ROOT: i64 = 0;

/// One step of a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathStep {
    /// An object key or element name, as name-dictionary keys.
    Name { uri_key: i32, local_key: i32 },
    /// An array member step, rendered as `[]`.
    Array,
}

/// One path class record.
#[derive(Clone, Debug, PartialEq)]
pub struct PathNode {
    pub key: i64,
    pub parent: i64,
    pub step: PathStep,
    pub level: u32,
    /// Number of tree nodes classified under this path.
    pub ref_count: u64,
    pub children: Vec<i64>,
}

impl PathNode {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        put_i64(buf, self.key);
        put_i64(buf, self.parent);
        match self.step {
            PathStep::Name { uri_key, local_key } => {
                put_u8(buf, 0);
                put_i32(buf, uri_key);
                put_i32(buf, local_key);
            }
            PathStep::Array => put_u8(buf, 1),
        }
        put_u32(buf, self.level);
        put_u64(buf, self.ref_count);
        put_u32(buf, self.children.len() as u32);
        for child in self.children.iter() {
            put_i64(buf, *child);
        }
    }

    pub fn decode(buf: &mut &[u8]) -> Result<PathNode> {
        let key = binary::take_i64(buf)?;
        let parent = binary::take_i64(buf)?;
        let step = match binary::take_u8(buf)? {
            0 => PathStep::Name {
                uri_key: binary::take_i32(buf)?,
                local_key: binary::take_i32(buf)?,
            },
            1 => PathStep::Array,
            tag => return err_at!(Corrupt, msg: "bad path step tag {}", tag),
        };
        let level = binary::take_u32(buf)?;
        let ref_count = binary::take_u64(buf)?;
        let mut children = vec![];
        for _ in 0..binary::take_u32(buf)? {
            children.push(binary::take_i64(buf)?);
        }
        Ok(PathNode {
            key,
            parent,
            step,
            level,
            ref_count,
            children,
        })
    }
}

/// Materialized summary over one revision.
#[derive(Clone, Default)]
pub struct PathSummary {
    nodes: BTreeMap<i64, PathNode>,
    root_children: Vec<i64>,
    max_key: i64,
}

impl PathSummary {
    pub fn new() -> PathSummary {
        PathSummary::default()
    }

    pub fn from_nodes(nodes: Vec<PathNode>) -> PathSummary {
        let mut summary = PathSummary::new();
        for node in nodes.into_iter() {
            summary.max_key = i64::max(summary.max_key, node.key);
            if node.parent == PATH_ROOT {
                summary.root_children.push(node.key);
            }
            summary.nodes.insert(node.key, node);
        }
        summary
    }

    pub fn get(&self, pcr: i64) -> Option<&PathNode> {
        self.nodes.get(&pcr)
    }

    pub fn max_key(&self) -> i64 {
        self.max_key
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PathNode> {
        self.nodes.values()
    }

    fn children_of(&self, pcr: i64) -> &[i64] {
        if pcr == PATH_ROOT {
            &self.root_children
        } else {
            self.nodes
                .get(&pcr)
                .map(|node| node.children.as_slice())
                .unwrap_or(&[])
        }
    }

    fn find_child(&self, parent: i64, step: PathStep) -> Option<i64> {
        self.children_of(parent)
            .iter()
            .find(|child| self.nodes[child].step == step)
            .copied()
    }

    /// Return the PCR for `step` under `parent`, creating it on demand.
    /// Newly created nodes are reported back to the caller through the
    /// returned `created` flag so they can be persisted.
    pub fn get_or_create(&mut self, parent: i64, step: PathStep) -> (i64, bool) {
        if let Some(pcr) = self.find_child(parent, step) {
            (pcr, false)
        } else {
            self.max_key += 1;
            let key = self.max_key;
            let level = match self.nodes.get(&parent) {
                Some(node) => node.level + 1,
                None => 1,
            };
            let node = PathNode {
                key,
                parent,
                step,
                level,
                ref_count: 0,
                children: vec![],
            };
            if parent == PATH_ROOT {
                self.root_children.push(key);
            } else if let Some(pnode) = self.nodes.get_mut(&parent) {
                pnode.children.push(key);
            }
            self.nodes.insert(key, node);
            (key, true)
        }
    }

    pub fn incr_ref(&mut self, pcr: i64) {
        if let Some(node) = self.nodes.get_mut(&pcr) {
            node.ref_count += 1;
        }
    }

    pub fn decr_ref(&mut self, pcr: i64) {
        if let Some(node) = self.nodes.get_mut(&pcr) {
            node.ref_count = node.ref_count.saturating_sub(1);
        }
    }

    /// Resolve a slash separated path expression into the set of
    /// matching PCRs. Steps are names, `[]` for array members, or the
    /// `*` wildcard matching any single step.
    pub fn resolve_expr(&self, expr: &str, names: &NameDictionary) -> Result<Vec<i64>> {
        let trimmed = match expr.strip_prefix('/') {
            Some(rest) => rest,
            None => return err_at!(IndexPath, msg: "expression {:?} must start with /", expr),
        };
        if trimmed.is_empty() {
            return err_at!(IndexPath, msg: "empty path expression");
        }

        let mut frontier = vec![PATH_ROOT];
        for step in trimmed.split('/') {
            if step.is_empty() {
                return err_at!(IndexPath, msg: "empty step in {:?}", expr);
            }
            let mut next = vec![];
            for pcr in frontier.into_iter() {
                for child in self.children_of(pcr).iter() {
                    let node = &self.nodes[child];
                    let matched = match (step, node.step) {
                        ("*", _) => true,
                        ("[]", PathStep::Array) => true,
                        (name, PathStep::Name { local_key, .. }) => {
                            names.get(NameSpace::LocalName, name) == local_key
                        }
                        _ => false,
                    };
                    if matched {
                        next.push(*child);
                    }
                }
            }
            frontier = next;
        }
        Ok(frontier)
    }

    /// Render the path of `pcr` back into an expression string.
    pub fn to_path(&self, pcr: i64, names: &NameDictionary) -> Result<String> {
        let mut steps = vec![];
        let mut cur = pcr;
        while cur != PATH_ROOT {
            let node = match self.nodes.get(&cur) {
                Some(node) => node,
                None => return err_at!(KeyNotFound, msg: "path node {}", cur),
            };
            match node.step {
                PathStep::Array => steps.push("[]".to_string()),
                PathStep::Name { local_key, .. } => {
                    let name = names
                        .resolve(NameSpace::LocalName, local_key)
                        .unwrap_or("?");
                    steps.push(name.to_string());
                }
            }
            cur = node.parent;
        }
        steps.reverse();
        Ok(format!("/{}", steps.join("/")))
    }
}

/// Read only view over the summary of one revision.
pub struct PathSummaryReader {
    summary: PathSummary,
    names: NameDictionary,
    revision: u32,
}

impl PathSummaryReader {
    pub fn new(summary: PathSummary, names: NameDictionary, revision: u32) -> Self {
        PathSummaryReader {
            summary,
            names,
            revision,
        }
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn summary(&self) -> &PathSummary {
        &self.summary
    }

    pub fn get(&self, pcr: i64) -> Option<&PathNode> {
        self.summary.get(pcr)
    }

    pub fn resolve_expr(&self, expr: &str) -> Result<Vec<i64>> {
        self.summary.resolve_expr(expr, &self.names)
    }

    pub fn to_path(&self, pcr: i64) -> Result<String> {
        self.summary.to_path(pcr, &self.names)
    }

    /// Name of the step at `pcr`, `[]` for array steps.
    pub fn step_name(&self, pcr: i64) -> Option<String> {
        self.summary.get(pcr).map(|node| match node.step {
            PathStep::Array => "[]".to_string(),
            PathStep::Name { local_key, .. } => self
                .names
                .resolve(NameSpace::LocalName, local_key)
                .unwrap_or("?")
                .to_string(),
        })
    }
}

#[cfg(test)]
#[path = "pathsummary_test.rs"]
mod pathsummary_test;

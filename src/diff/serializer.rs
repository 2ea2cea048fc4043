//! Module `serializer` turn diff tuples into a JSON change document.
//!
//! Unresolved array positions render as concrete indices by counting
//! left siblings at the cursor; object steps render by key name.

use serde_json::{json, Map, Value};

use crate::{
    diff::{diff_revisions, DiffKind, DiffTuple},
    json,
    node::{NodeKind, NULL_NODE_KEY},
    resource::ResourceSession,
    tree::NodeCursor,
    Result,
};

/// Serializer over a pair of revisions of one resource.
pub struct JsonDiffSerializer<'a> {
    session: &'a ResourceSession,
    old_revision: u32,
    new_revision: u32,
}

impl<'a> JsonDiffSerializer<'a> {
    pub fn new(
        session: &'a ResourceSession,
        old_revision: u32,
        new_revision: u32,
    ) -> JsonDiffSerializer<'a> {
        JsonDiffSerializer {
            session,
            old_revision,
            new_revision,
        }
    }

    /// Produce the change document. With `emit_from_diff_algorithm`
    /// the tuples are computed here; otherwise the unchanged-tuple
    /// kinds are included verbatim too.
    pub fn serialize(&self, emit_from_diff_algorithm: bool) -> Result<String> {
        let mut old = self.session.begin_node_read_only_trx(Some(self.old_revision))?;
        let mut new = self.session.begin_node_read_only_trx(Some(self.new_revision))?;
        let tuples = diff_revisions(&mut old, &mut new)?;

        let mut diffs = vec![];
        for tuple in tuples.iter() {
            match tuple.kind {
                DiffKind::Same | DiffKind::SameHash if emit_from_diff_algorithm => continue,
                _ => (),
            }
            diffs.push(self.render(&mut old, &mut new, tuple)?);
        }

        let doc = json!({
            "old-revision": self.old_revision,
            "new-revision": self.new_revision,
            "diffs": diffs,
        });
        err_at!(FailConvert, serde_json::to_string(&doc))
    }

    fn render(
        &self,
        old: &mut crate::tree::NodeReadTrx,
        new: &mut crate::tree::NodeReadTrx,
        tuple: &DiffTuple,
    ) -> Result<Value> {
        let mut body = Map::new();
        match tuple.kind {
            DiffKind::Inserted => {
                new.move_to(tuple.new_node_key);
                body.insert("nodeKey".into(), Value::from(tuple.new_node_key));
                body.insert("depth".into(), Value::from(tuple.depth));
                body.insert("path".into(), Value::from(path_of(new)));
                body.insert("data".into(), json::materialize(new)?);
                Ok(Value::Object(wrap("insert", body)))
            }
            DiffKind::Deleted => {
                old.move_to(tuple.old_node_key);
                body.insert("nodeKey".into(), Value::from(tuple.old_node_key));
                body.insert("depth".into(), Value::from(tuple.depth));
                body.insert("path".into(), Value::from(path_of(old)));
                Ok(Value::Object(wrap("delete", body)))
            }
            DiffKind::Updated => {
                new.move_to(tuple.new_node_key);
                body.insert("nodeKey".into(), Value::from(tuple.new_node_key));
                body.insert("depth".into(), Value::from(tuple.depth));
                body.insert("path".into(), Value::from(path_of(new)));
                body.insert("data".into(), json::materialize(new)?);
                Ok(Value::Object(wrap("update", body)))
            }
            DiffKind::ReplacedOld | DiffKind::ReplacedNew => {
                let (trx, key) = if tuple.kind == DiffKind::ReplacedNew {
                    (&mut *new, tuple.new_node_key)
                } else {
                    (&mut *old, tuple.old_node_key)
                };
                trx.move_to(key);
                body.insert("nodeKey".into(), Value::from(key));
                body.insert("depth".into(), Value::from(tuple.depth));
                body.insert("path".into(), Value::from(path_of(trx)));
                if tuple.kind == DiffKind::ReplacedNew {
                    body.insert("data".into(), json::materialize(trx)?);
                }
                Ok(Value::Object(wrap("replace", body)))
            }
            DiffKind::Same | DiffKind::SameHash => {
                body.insert("nodeKey".into(), Value::from(tuple.new_node_key));
                body.insert("depth".into(), Value::from(tuple.depth));
                Ok(Value::Object(wrap("same", body)))
            }
        }
    }
}

fn wrap(kind: &str, body: Map<String, Value>) -> Map<String, Value> {
    let mut outer = Map::new();
    outer.insert(kind.to_string(), Value::Object(body));
    outer
}

/// Path of the cursor's node from the root; array members render as
/// `[index]`, the index being the count of left siblings.
pub fn path_of(trx: &mut crate::tree::NodeReadTrx) -> String {
    let at = trx.node_key();
    let mut steps = vec![];

    loop {
        let parent_key = trx.parent_key();
        if parent_key == NULL_NODE_KEY {
            break;
        }
        let here = trx.node_key();
        let step = {
            // resolve "[]" into the concrete position.
            let parent_kind = {
                trx.move_to(parent_key);
                let kind = trx.kind();
                trx.move_to(here);
                kind
            };
            match parent_kind {
                NodeKind::Array => {
                    let mut index = 0;
                    while trx.move_to_left_sibling() {
                        index += 1;
                    }
                    trx.move_to(here);
                    Some(format!("[{}]", index))
                }
                _ => match trx.kind() {
                    NodeKind::ObjectKey => trx.name().map(|name| name.to_string()),
                    _ => None,
                },
            }
        };
        if let Some(step) = step {
            steps.push(step);
        }
        trx.move_to(parent_key);
    }

    trx.move_to(at);
    steps.reverse();
    format!("/{}", steps.join("/"))
}

#[cfg(test)]
#[path = "serializer_test.rs"]
mod serializer_test;

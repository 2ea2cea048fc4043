//! Module `json` bridge between `serde_json` values and the node tree.
//!
//! The shredder turns a JSON value into a subtree through the write
//! cursor's insert operations; the materializer walks a read cursor
//! back into a `serde_json::Value`.

use serde_json::{Map, Value};

use crate::{
    node::{NodeKind, Number},
    tree::{NodeCursor, NodeReadTrx, NodeWriteTrx},
    Result,
};

fn to_number(num: &serde_json::Number) -> Number {
    match num.as_i64() {
        Some(val) => Number::Integer(val),
        None => Number::Double(num.as_f64().unwrap_or(f64::NAN)),
    }
}

/// Insert `value` as the first child of the cursor's node. The cursor
/// ends on the root of the inserted subtree; its key is returned.
pub fn shred_as_first_child(wtx: &mut NodeWriteTrx, value: &Value) -> Result<i64> {
    match value {
        Value::Object(fields) => {
            let key = wtx.insert_object_as_first_child()?;
            shred_fields(wtx, key, fields)?;
            Ok(key)
        }
        Value::Array(items) => {
            let key = wtx.insert_array_as_first_child()?;
            shred_items(wtx, key, items)?;
            Ok(key)
        }
        Value::String(val) => wtx.insert_string_value_as_first_child(val),
        Value::Bool(val) => wtx.insert_boolean_value_as_first_child(*val),
        Value::Number(val) => wtx.insert_number_value_as_first_child(to_number(val)),
        Value::Null => wtx.insert_null_value_as_first_child(),
    }
}

/// Insert `value` as the right sibling of the cursor's node.
pub fn shred_as_right_sibling(wtx: &mut NodeWriteTrx, value: &Value) -> Result<i64> {
    match value {
        Value::Object(fields) => {
            let key = wtx.insert_object_as_right_sibling()?;
            shred_fields(wtx, key, fields)?;
            Ok(key)
        }
        Value::Array(items) => {
            let key = wtx.insert_array_as_right_sibling()?;
            shred_items(wtx, key, items)?;
            Ok(key)
        }
        Value::String(val) => wtx.insert_string_value_as_right_sibling(val),
        Value::Bool(val) => wtx.insert_boolean_value_as_right_sibling(*val),
        Value::Number(val) => wtx.insert_number_value_as_right_sibling(to_number(val)),
        Value::Null => wtx.insert_null_value_as_right_sibling(),
    }
}

fn shred_fields(wtx: &mut NodeWriteTrx, object_key: i64, fields: &Map<String, Value>) -> Result<()> {
    let mut prev = crate::node::NULL_NODE_KEY;
    for (name, value) in fields.iter() {
        let key_node = if prev == crate::node::NULL_NODE_KEY {
            wtx.move_to(object_key);
            wtx.insert_object_key_as_first_child(name)?
        } else {
            wtx.move_to(prev);
            wtx.insert_object_key_as_right_sibling(name)?
        };
        shred_as_first_child(wtx, value)?;
        prev = key_node;
    }
    wtx.move_to(object_key);
    Ok(())
}

fn shred_items(wtx: &mut NodeWriteTrx, array_key: i64, items: &[Value]) -> Result<()> {
    let mut prev = crate::node::NULL_NODE_KEY;
    for value in items.iter() {
        if prev == crate::node::NULL_NODE_KEY {
            wtx.move_to(array_key);
            prev = shred_as_first_child(wtx, value)?;
        } else {
            wtx.move_to(prev);
            prev = shred_as_right_sibling(wtx, value)?;
        }
    }
    wtx.move_to(array_key);
    Ok(())
}

/// Materialize the subtree under the cursor into a `serde_json::Value`.
/// The cursor is restored to where it started.
pub fn materialize(rtx: &mut NodeReadTrx) -> Result<Value> {
    let start = rtx.node_key();
    let value = materialize_node(rtx)?;
    rtx.move_to(start);
    Ok(value)
}

fn materialize_node(rtx: &mut NodeReadTrx) -> Result<Value> {
    match rtx.kind() {
        NodeKind::JsonDocument => {
            if rtx.move_to_first_child() {
                let value = materialize_node(rtx)?;
                rtx.move_to_parent();
                Ok(value)
            } else {
                Ok(Value::Null)
            }
        }
        NodeKind::Object => {
            let mut fields = Map::new();
            if rtx.move_to_first_child() {
                loop {
                    let name = match rtx.name() {
                        Some(name) => name.to_string(),
                        None => return err_at!(Corrupt, msg: "object key without name"),
                    };
                    if rtx.move_to_first_child() {
                        let value = materialize_node(rtx)?;
                        rtx.move_to_parent();
                        fields.insert(name, value);
                    } else {
                        fields.insert(name, Value::Null);
                    }
                    if !rtx.move_to_right_sibling() {
                        break;
                    }
                }
                rtx.move_to_parent();
            }
            Ok(Value::Object(fields))
        }
        NodeKind::ObjectKey => {
            let name = match rtx.name() {
                Some(name) => name.to_string(),
                None => return err_at!(Corrupt, msg: "object key without name"),
            };
            let mut fields = Map::new();
            if rtx.move_to_first_child() {
                let value = materialize_node(rtx)?;
                rtx.move_to_parent();
                fields.insert(name, value);
            } else {
                fields.insert(name, Value::Null);
            }
            Ok(Value::Object(fields))
        }
        NodeKind::Array => {
            let mut items = vec![];
            if rtx.move_to_first_child() {
                loop {
                    items.push(materialize_node(rtx)?);
                    if !rtx.move_to_right_sibling() {
                        break;
                    }
                }
                rtx.move_to_parent();
            }
            Ok(Value::Array(items))
        }
        NodeKind::StringValue | NodeKind::ObjectStringValue => Ok(Value::String(
            rtx.value_string().unwrap_or_default(),
        )),
        NodeKind::BooleanValue | NodeKind::ObjectBooleanValue => {
            Ok(Value::Bool(rtx.node().bool_value().unwrap_or(false)))
        }
        NodeKind::NumberValue | NodeKind::ObjectNumberValue => {
            match rtx.node().number_value() {
                Some(Number::Integer(val)) => Ok(Value::from(val)),
                Some(Number::Double(val)) => Ok(Value::from(val)),
                None => err_at!(Corrupt, msg: "number node without payload"),
            }
        }
        NodeKind::NullValue | NodeKind::ObjectNullValue => Ok(Value::Null),
        kind => err_at!(UnsupportedOp, msg: "materialize {:?}", kind),
    }
}

#[cfg(test)]
#[path = "json_test.rs"]
mod json_test;

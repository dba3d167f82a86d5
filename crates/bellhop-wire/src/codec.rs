//! The `{json, meta}` value codec.
//!
//! Values crossing the wire are split into a plain JSON body and a meta
//! sidecar mapping dotted paths to type tags, so richer coordinator-side
//! types survive the trip. Known tags: `date` (RFC 3339 string), `bigint`
//! (decimal string), `undefined` (null body).
//!
//! Law: `unpack(pack(v)) == v` for every [`Value`]. Host-side values carry
//! no rich leaves, so `pack` produces an empty sidecar; the real work is
//! canonicalizing inbound values so validators only ever see canonical JSON.

use chrono::DateTime;
use serde_json::{Map, Value};
use tracing::debug;

/// A value split for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Packed {
    pub json: Value,
    /// Path→tag map; [`Value::Null`] when nothing is tagged.
    pub meta: Value,
}

/// Split a host-side value into body and sidecar.
pub fn pack(value: &Value) -> Packed {
    Packed {
        json: value.clone(),
        meta: Value::Null,
    }
}

/// Rejoin a wire value with its sidecar, canonicalizing tagged leaves.
///
/// Unknown tags and unresolvable paths are left untouched; the sidecar is
/// advisory and must never make a response undeliverable.
pub fn unpack(json: Value, meta: &Value) -> Value {
    let Some(tags) = meta.as_object() else {
        return json;
    };
    let mut out = json;
    for (path, tag) in tags {
        let Some(tag) = tag.as_str() else {
            debug!(%path, "ignoring non-string codec tag");
            continue;
        };
        match node_mut(&mut out, path) {
            Some(node) => canonicalize(node, tag),
            None => debug!(%path, tag, "codec path does not resolve"),
        }
    }
    out
}

fn canonicalize(node: &mut Value, tag: &str) {
    match tag {
        "date" => {
            if let Some(raw) = node.as_str() {
                match DateTime::parse_from_rfc3339(raw) {
                    Ok(parsed) => *node = Value::String(parsed.to_rfc3339()),
                    Err(e) => debug!(error = %e, "ignoring malformed date tag"),
                }
            }
        }
        "bigint" => {
            if let Some(raw) = node.as_str() {
                if let Ok(n) = raw.parse::<i64>() {
                    *node = Value::from(n);
                } else if let Ok(n) = raw.parse::<u64>() {
                    *node = Value::from(n);
                }
                // Out-of-range bigints keep their canonical decimal string.
            }
        }
        "undefined" => *node = Value::Null,
        other => debug!(tag = other, "unknown codec tag"),
    }
}

/// Walk a dotted path (`a.b.0.c`) to a node. An empty path addresses the
/// root.
fn node_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    if path.is_empty() {
        return Some(root);
    }
    let mut node = root;
    for segment in path.split('.') {
        node = match node {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Drop `Null` entries from the top level of a props object, mirroring the
/// remote side's treatment of absent fields.
pub fn strip_null_entries(props: Value) -> Value {
    match props {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

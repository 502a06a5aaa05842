//! UI hierarchy dumps via `uiautomator`.
//!
//! The dump is a flat XML document of nested `<node>` elements. Only the
//! attributes perception needs are read, so a small regex tokenizer is enough.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::connection::{run_adb, AdbError};
use crate::agent::{Bounds, UiTreeNode};

const DUMP_PATH: &str = "/sdcard/ui_agent_dump.xml";

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<node\b((?:[^>"]|"[^"]*")*)>|</node\s*>"#).expect("valid tag regex")
});
static ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([\w:-]+)="([^"]*)""#).expect("valid attribute regex"));
static BOUNDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]").expect("valid bounds regex")
});
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#x[0-9a-fA-F]+|#\d+|amp|lt|gt|quot|apos);").expect("valid entity regex"));

/// Dump the current window hierarchy.
///
/// Returns `None` when the device reports no active window. The previous dump
/// is removed first so a failed dump can never be read back as current.
pub fn dump_hierarchy(device_id: Option<&str>) -> Result<Option<UiTreeNode>, AdbError> {
    run_adb(device_id, &["shell", "rm", "-f", DUMP_PATH])?;
    let status = run_adb(device_id, &["shell", "uiautomator", "dump", DUMP_PATH])?;
    if !dump_succeeded(&status)? {
        tracing::debug!("uiautomator reported no active window");
        return Ok(None);
    }

    let xml = run_adb(device_id, &["shell", "cat", DUMP_PATH])?;
    parse_hierarchy(&xml).map(Some)
}

/// Classify the status line printed by `uiautomator dump`.
///
/// `Ok(false)` means there is no active window. Anything other than a
/// confirmed dump is an error, even when adb exited cleanly.
fn dump_succeeded(status: &str) -> Result<bool, AdbError> {
    if status.contains("null root node") {
        Ok(false)
    } else if status.contains("dumped to") {
        Ok(true)
    } else {
        Err(AdbError::UnexpectedOutput(status.trim().to_string()))
    }
}

/// Parse a `uiautomator` XML dump.
///
/// The returned root is a synthetic container whose children are the
/// top-level window nodes.
pub fn parse_hierarchy(xml: &str) -> Result<UiTreeNode, AdbError> {
    let mut stack = vec![UiTreeNode::default()];

    for caps in TAG_RE.captures_iter(xml) {
        match caps.get(1) {
            Some(attrs) => {
                let attrs = attrs.as_str().trim_end();
                let self_closing = attrs.ends_with('/');
                let node = parse_node(attrs.trim_end_matches('/'));
                if self_closing {
                    append_child(&mut stack, node)?;
                } else {
                    stack.push(node);
                }
            }
            None => {
                if stack.len() < 2 {
                    return Err(AdbError::MalformedHierarchy(
                        "unexpected </node>".to_string(),
                    ));
                }
                let node = stack.pop().unwrap_or_default();
                append_child(&mut stack, node)?;
            }
        }
    }

    match stack.len() {
        1 => Ok(stack.pop().unwrap_or_default()),
        n => Err(AdbError::MalformedHierarchy(format!(
            "{} unclosed <node> elements",
            n - 1
        ))),
    }
}

fn append_child(stack: &mut [UiTreeNode], node: UiTreeNode) -> Result<(), AdbError> {
    stack
        .last_mut()
        .map(|parent| parent.children.push(node))
        .ok_or_else(|| AdbError::MalformedHierarchy("node without parent".to_string()))
}

fn parse_node(attrs: &str) -> UiTreeNode {
    let attrs: HashMap<&str, String> = ATTR_RE
        .captures_iter(attrs)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str();
            let value = caps.get(2)?.as_str();
            Some((key, unescape(value)))
        })
        .collect();

    let non_empty = |key: &str| attrs.get(key).filter(|v| !v.is_empty()).cloned();
    let flag = |key: &str| attrs.get(key).map(|v| v == "true").unwrap_or(false);

    let class_name = non_empty("class");
    let editable = class_name
        .as_deref()
        .map(|c| c.contains("EditText") || c.contains("AutoCompleteTextView"))
        .unwrap_or(false);

    UiTreeNode {
        resource_id: non_empty("resource-id"),
        text: non_empty("text"),
        bounds: attrs
            .get("bounds")
            .and_then(|b| parse_bounds(b))
            .unwrap_or_default(),
        clickable: flag("clickable") || flag("long-clickable"),
        editable,
        class_name,
        children: Vec::new(),
    }
}

/// Parse `[left,top][right,bottom]`.
fn parse_bounds(value: &str) -> Option<Bounds> {
    let caps = BOUNDS_RE.captures(value)?;
    let n = |i: usize| caps[i].parse::<i32>().ok();
    Some(Bounds::new(n(1)?, n(2)?, n(3)?, n(4)?))
}

fn unescape(value: &str) -> String {
    ENTITY_RE
        .replace_all(value, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => {
                    let code = match entity.strip_prefix("#x") {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => entity.trim_start_matches('#').parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

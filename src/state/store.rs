//! StateStore - stack of scope frames
//!
//! Reads resolve innermost to outermost. Writes go to the innermost frame,
//! except `shift` and `append`, which mutate the frame that owns the key.
//! Frame lifetime is tied to explicit `push`/`pop`, not to the interpreter's
//! call depth.

use serde_json::{Map, Value};
use tracing::debug;

use crate::util::jsonpath::{self, Segment};

use super::template;

/// One scope level
pub type Frame = Map<String, Value>;

/// Hierarchical key/value scope owned by a single session
#[derive(Debug, Clone)]
pub struct StateStore {
    frames: Vec<Frame>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Create a store with an empty root frame
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new()],
        }
    }

    /// Create a store whose root frame is seeded with values
    pub fn with_root(root: Frame) -> Self {
        Self { frames: vec![root] }
    }

    /// Number of frames (root counts as 1)
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::new());
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Pop the innermost frame; the root frame is never popped
    pub fn pop(&mut self) -> Option<Frame> {
        if self.frames.len() == 1 {
            return None;
        }
        self.frames.pop()
    }

    /// The root frame (published values are read from here)
    pub fn root(&self) -> &Frame {
        &self.frames[0]
    }

    /// Index of the innermost frame holding `key`
    fn owner(&self, key: &str) -> Option<usize> {
        self.frames.iter().rposition(|frame| frame.contains_key(key))
    }

    fn innermost(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn split(path: &str) -> Option<(String, Vec<Segment>)> {
        match jsonpath::split_root(path) {
            Ok(parts) => Some(parts),
            Err(e) => {
                debug!(path, error = %e, "ignoring malformed state path");
                None
            }
        }
    }

    /// Borrow the value at a path
    pub fn get_ref(&self, path: &str) -> Option<&Value> {
        let (root, rest) = Self::split(path)?;
        let frame = &self.frames[self.owner(&root)?];
        jsonpath::apply(frame.get(&root)?, &rest)
    }

    /// Read the value at a path (`key`, `key.field`, `key[0]`)
    pub fn get(&self, path: &str) -> Option<Value> {
        self.get_ref(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get_ref(path).is_some()
    }

    /// Write into the innermost frame
    ///
    /// For a nested path the root value is copied into the innermost frame
    /// first, so outer frames never see the write.
    pub fn put(&mut self, path: &str, value: Value) {
        let Some((root, rest)) = Self::split(path) else {
            return;
        };
        if rest.is_empty() {
            self.innermost().insert(root, value);
            return;
        }

        let mut base = self
            .get(&root)
            .filter(|v| v.is_object() || v.is_array())
            .unwrap_or_else(|| Value::Object(Map::new()));
        set_nested(&mut base, &rest, value);
        self.innermost().insert(root, base);
    }

    /// Remove and return the first element of a sequence
    ///
    /// Returns `None` when the entry is absent, empty or not a sequence.
    pub fn shift(&mut self, path: &str) -> Option<Value> {
        let (root, rest) = Self::split(path)?;
        let owner = self.owner(&root)?;
        let target = jsonpath::apply_mut(self.frames[owner].get_mut(&root)?, &rest)?;
        match target {
            Value::Array(items) if !items.is_empty() => Some(items.remove(0)),
            _ => None,
        }
    }

    /// Append to a sequence, creating it in the innermost frame if absent
    pub fn append(&mut self, path: &str, value: Value) {
        let Some((root, rest)) = Self::split(path) else {
            return;
        };
        if let Some(owner) = self.owner(&root) {
            if let Some(slot) = self.frames[owner]
                .get_mut(&root)
                .and_then(|v| jsonpath::apply_mut(v, &rest))
            {
                match slot {
                    Value::Array(items) => items.push(value),
                    Value::Null => *slot = Value::Array(vec![value]),
                    other => {
                        let previous = other.take();
                        *other = Value::Array(vec![previous, value]);
                    }
                }
                return;
            }
        }
        self.put(path, Value::Array(vec![value]));
    }

    /// Expand `${path}` / `$name` placeholders against the current scope
    pub fn expand(&self, value: &Value) -> Value {
        template::expand(value, &|path: &str| self.get(path))
    }

    /// Expand a text template, stringifying resolved values
    pub fn expand_text(&self, text: &str) -> String {
        template::expand_text(text, &|path: &str| self.get(path)).into_owned()
    }

    /// Merged view of every frame, inner values shadowing outer ones
    pub fn snapshot(&self) -> Frame {
        let mut merged = Frame::new();
        for frame in &self.frames {
            for (key, value) in frame {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

fn set_nested(base: &mut Value, segments: &[Segment], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        *base = value;
        return;
    };

    let mut current = base;
    for segment in parents {
        current = match segment {
            Segment::Field(name) => {
                if !current.is_object() {
                    *current = Value::Object(Map::new());
                }
                match current {
                    Value::Object(map) => map
                        .entry(name.clone())
                        .or_insert_with(|| Value::Object(Map::new())),
                    _ => return,
                }
            }
            Segment::Index(idx) => match current.get_mut(*idx) {
                Some(next) => next,
                None => return,
            },
        };
    }

    match (last, current) {
        (Segment::Field(name), Value::Object(map)) => {
            map.insert(name.clone(), value);
        }
        (Segment::Field(name), other) => {
            let mut map = Map::new();
            map.insert(name.clone(), value);
            *other = Value::Object(map);
        }
        (Segment::Index(idx), Value::Array(items)) => {
            if *idx < items.len() {
                items[*idx] = value;
            } else if *idx == items.len() {
                items.push(value);
            }
        }
        (Segment::Index(_), _) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn inner_frame_sees_outer_values() {
        let mut state = StateStore::new();
        state.put("a", json!(1));
        state.push();
        assert_eq!(state.get("a"), Some(json!(1)));
    }

    #[test]
    fn writes_target_innermost_and_shadow() {
        let mut state = StateStore::new();
        state.put("a", json!(1));
        state.push();
        state.put("a", json!(2));
        assert_eq!(state.get("a"), Some(json!(2)));
        let frame = state.pop().unwrap();
        assert_eq!(frame.get("a"), Some(&json!(2)));
        assert_eq!(state.get("a"), Some(json!(1)));
    }

    #[test]
    fn root_frame_is_never_popped() {
        let mut state = StateStore::new();
        assert!(state.pop().is_none());
        assert_eq!(state.depth(), 1);
    }

    #[test]
    fn nested_put_copies_into_inner_frame() {
        let mut state = StateStore::new();
        state.put("object", json!({"key1": 1}));
        state.push();
        state.put("object.shift", json!("200"));
        assert_eq!(state.get("object"), Some(json!({"key1": 1, "shift": "200"})));
        state.pop();
        assert_eq!(state.get("object"), Some(json!({"key1": 1})));
    }

    #[test]
    fn shift_drains_sequence_in_order() {
        let mut state = StateStore::new();
        state.put("users", json!(["a", "b", "c"]));
        state.push();
        assert_eq!(state.shift("users"), Some(json!("a")));
        assert_eq!(state.shift("users"), Some(json!("b")));
        assert_eq!(state.shift("users"), Some(json!("c")));
        assert_eq!(state.shift("users"), None);
        state.pop();
        // Shift mutates the owning frame
        assert_eq!(state.get("users"), Some(json!([])));
    }

    #[test]
    fn shift_on_non_sequence_is_none() {
        let mut state = StateStore::new();
        state.put("scalar", json!(5));
        assert_eq!(state.shift("scalar"), None);
        assert_eq!(state.shift("missing"), None);
        assert_eq!(state.get("scalar"), Some(json!(5)));
    }

    #[test]
    fn shift_nested_sequence() {
        let mut state = StateStore::new();
        state.put("dsunit", json!({"USER_ACCOUNT": [1, 2]}));
        assert_eq!(state.shift("dsunit.USER_ACCOUNT"), Some(json!(1)));
        assert_eq!(state.get("dsunit.USER_ACCOUNT"), Some(json!([2])));
    }

    #[test]
    fn append_targets_owner_or_creates() {
        let mut state = StateStore::new();
        state.put("list", json!([1]));
        state.push();
        state.append("list", json!(2));
        state.append("fresh", json!("x"));
        assert_eq!(state.get("fresh"), Some(json!(["x"])));
        state.pop();
        assert_eq!(state.get("list"), Some(json!([1, 2])));
        assert_eq!(state.get("fresh"), None);
    }

    #[test]
    fn expand_uses_scope() {
        let mut state = StateStore::new();
        state.put("host", json!("localhost"));
        state.push();
        state.put("port", json!(8080));
        assert_eq!(
            state.expand(&json!({"url": "http://$host:${port}/", "port": "$port"})),
            json!({"url": "http://localhost:8080/", "port": 8080})
        );
    }

    #[test]
    fn snapshot_merges_frames() {
        let mut state = StateStore::new();
        state.put("a", json!(1));
        state.put("b", json!(1));
        state.push();
        state.put("b", json!(2));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.get("a"), Some(&json!(1)));
        assert_eq!(snapshot.get("b"), Some(&json!(2)));
    }
}

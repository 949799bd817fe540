use serde_json::{Map, Value};

use super::{LoadError, Storage};

/// [`Storage`] over an in-memory JSON tree.
///
/// Nodes become nested objects, indexed nodes become arrays of objects. Floats are widened to `f64`
/// on write, so every written `f32` reads back bit-identical.
#[derive(Clone, Debug)]
pub struct JsonStorage {
    /// Always an object.
    root: Value,
    /// Nodes entered by `begin_*_node`, outermost first.
    path: Vec<(String, Option<usize>)>,
}
impl Default for JsonStorage {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
            path: Vec::new(),
        }
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just made an object"),
    }
}
fn ensure_array(value: &mut Value) -> &mut Vec<Value> {
    if !value.is_array() {
        *value = Value::Array(Vec::new());
    }
    match value {
        Value::Array(list) => list,
        _ => unreachable!("value was just made an array"),
    }
}

impl JsonStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Read from an existing tree. The top level must be an object.
    pub fn from_value(root: Value) -> Result<Self, LoadError> {
        if root.is_object() {
            Ok(Self {
                root,
                path: Vec::new(),
            })
        } else {
            Err(LoadError::Malformed("top level is not an object".to_owned()))
        }
    }
    /// Parse JSON text.
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        Self::from_value(serde_json::from_str(text)?)
    }
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.root
    }
    #[must_use]
    pub fn into_value(self) -> Value {
        if !self.path.is_empty() {
            log::warn!("storage taken with {} node(s) still open", self.path.len());
        }
        self.root
    }
    #[must_use]
    pub fn to_json_string(&self, pretty: bool) -> String {
        if pretty {
            format!("{:#}", self.root)
        } else {
            self.root.to_string()
        }
    }
    /// Current node for reading, or None if the path does not exist.
    fn node(&self) -> Option<&Map<String, Value>> {
        let mut cur = self.root.as_object()?;
        for (name, index) in &self.path {
            let child = cur.get(name)?;
            let child = match index {
                None => child,
                Some(index) => child.as_array()?.get(*index)?,
            };
            cur = child.as_object()?;
        }
        Some(cur)
    }
    /// Current node for writing, creating the path as needed.
    fn node_mut(&mut self) -> &mut Map<String, Value> {
        let mut cur = ensure_object(&mut self.root);
        for (name, index) in &self.path {
            let entry = cur.entry(name.clone()).or_insert(Value::Null);
            cur = match index {
                None => ensure_object(entry),
                Some(index) => {
                    let list = ensure_array(entry);
                    if list.len() <= *index {
                        list.resize(*index + 1, Value::Null);
                    }
                    ensure_object(&mut list[*index])
                }
            };
        }
        cur
    }
    fn field(&self, name: &str) -> Option<&Value> {
        self.node()?.get(name)
    }
}

impl Storage for JsonStorage {
    fn write_float_array(&mut self, name: &str, values: &[f32]) {
        let list = values.iter().map(|v| Value::from(f64::from(*v))).collect();
        self.node_mut().insert(name.to_owned(), Value::Array(list));
    }
    #[allow(clippy::cast_possible_truncation)]
    fn read_float_array(&mut self, name: &str, values: &mut [f32]) -> usize {
        let Some(list) = self.field(name).and_then(Value::as_array) else {
            return 0;
        };
        let mut count = 0;
        for (dst, src) in values.iter_mut().zip(list) {
            let Some(src) = src.as_f64() else {
                break;
            };
            *dst = src as f32;
            count += 1;
        }
        count
    }
    fn write_float(&mut self, name: &str, value: f32) {
        self.node_mut()
            .insert(name.to_owned(), Value::from(f64::from(value)));
    }
    #[allow(clippy::cast_possible_truncation)]
    fn read_float(&mut self, name: &str, default: f32) -> f32 {
        self.field(name)
            .and_then(Value::as_f64)
            .map_or(default, |v| v as f32)
    }
    fn write_int(&mut self, name: &str, value: i64) {
        self.node_mut().insert(name.to_owned(), Value::from(value));
    }
    fn read_int(&mut self, name: &str, default: i64) -> i64 {
        self.field(name).and_then(Value::as_i64).unwrap_or(default)
    }
    fn write_string(&mut self, name: &str, value: &str) {
        self.node_mut()
            .insert(name.to_owned(), Value::from(value.to_owned()));
    }
    fn read_string(&mut self, name: &str) -> Option<String> {
        self.field(name).and_then(Value::as_str).map(ToOwned::to_owned)
    }
    fn begin_write_node(&mut self, name: &str, index: Option<usize>) {
        self.path.push((name.to_owned(), index));
        // Materialize, so empty nodes still appear in the output.
        let _ = self.node_mut();
    }
    fn begin_read_node(&mut self, name: &str, index: Option<usize>) -> bool {
        self.path.push((name.to_owned(), index));
        if self.node().is_some() {
            true
        } else {
            self.path.pop();
            false
        }
    }
    fn end_node(&mut self) {
        if self.path.pop().is_none() {
            log::error!("end_node called with no open node");
        }
    }
    fn node_count(&mut self, name: &str) -> usize {
        self.field(name).and_then(Value::as_array).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nested_lists() {
        let mut s = JsonStorage::new();
        s.write_int("count", 2);
        for i in 0..2 {
            s.begin_write_node("items", Some(i));
            s.write_string("name", &format!("item{i}"));
            s.write_float_array("xy", &[0.1, i as f32]);
            s.end_node();
        }
        let text = s.to_json_string(false);

        let mut r = JsonStorage::parse(&text).unwrap();
        assert_eq!(r.read_int("count", 0), 2);
        assert!(r.begin_read_node("items", Some(1)));
        assert_eq!(r.read_string("name").as_deref(), Some("item1"));
        let mut xy = [0.0; 2];
        assert_eq!(r.read_float_array("xy", &mut xy), 2);
        assert_eq!(xy, [0.1, 1.0]);
        r.end_node();
        assert_eq!(r.node_count("items"), 2);
        assert_eq!(r.node_count("count"), 0);
        assert!(!r.begin_read_node("items", Some(2)));
        // Failed begin leaves us at the top.
        assert_eq!(r.read_int("count", 0), 2);
    }
    #[test]
    fn short_arrays_report_count() {
        let mut s = JsonStorage::new();
        s.write_float_array("points", &[1.0, 2.0, 3.0]);
        let mut buf = [0.0; 4];
        assert_eq!(s.read_float_array("points", &mut buf), 3);
        assert_eq!(s.read_float_array("missing", &mut buf), 0);
    }
    #[test]
    fn rejects_non_object() {
        assert!(JsonStorage::parse("[1, 2]").is_err());
        assert!(JsonStorage::parse("{ nope").is_err());
    }
}

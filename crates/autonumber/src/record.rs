use serde_json::{Map, Value};

/// A document on its way to the persistence layer.
///
/// The record carries its entity type name (used to derive default
/// numerators), its JSON body, and whether it has been persisted yet. Only
/// new records are numbered; see [`crate::Autonumber::before_create`].
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    entity: String,
    body: Value,
    is_new: bool,
}

impl Record {
    /// Creates a record that has never been persisted.
    pub fn new(entity: impl Into<String>, body: Value) -> Self {
        Self {
            entity: entity.into(),
            body,
            is_new: true,
        }
    }

    /// Wraps a record that already exists in the persistence layer.
    pub fn persisted(entity: impl Into<String>, body: Value) -> Self {
        Self {
            is_new: false,
            ..Self::new(entity, body)
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub const fn body(&self) -> &Value {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Value {
        &mut self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    pub const fn is_new(&self) -> bool {
        self.is_new
    }

    /// Flags the record as persisted. Call once the host has written it.
    pub fn mark_persisted(&mut self) {
        self.is_new = false;
    }

    /// Looks up a dotted path (`"customer.name"`) in the body.
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.body, path)
    }

    /// Writes `value` at a dotted path, creating intermediate objects.
    pub fn set(&mut self, path: &str, value: Value) {
        assign(&mut self.body, path, value);
    }
}

/// Resolves a dotted path against a JSON value.
///
/// Object members are matched by key and array elements by decimal index.
/// Returns `None` as soon as a segment is missing.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Assigns `new` at a dotted path, replacing any non-object along the way.
pub fn assign(value: &mut Value, path: &str, new: Value) {
    let mut current = value;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Some(map) = current.as_object_mut() else {
            return;
        };

        if segments.peek().is_none() {
            map.insert(segment.to_owned(), new);
            return;
        }
        current = map
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

use core::{fmt, future};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;

use crate::{BoxError, Error, Record, Result};

/// A function of a record that produces a value, possibly asynchronously.
///
/// Implement this directly for selectors that need their own state (a lookup
/// client, a cache, ...). Plain closures are wrapped by [`Selector::derive`]
/// and [`Selector::derive_async`].
pub trait Derive: Send + Sync {
    fn derive<'a>(&'a self, body: &'a Value) -> BoxFuture<'a, Result<Value, BoxError>>;
}

struct SyncFn<F>(F);

impl<F> Derive for SyncFn<F>
where
    F: Fn(&Value) -> Result<Value, BoxError> + Send + Sync,
{
    fn derive<'a>(&'a self, body: &'a Value) -> BoxFuture<'a, Result<Value, BoxError>> {
        Box::pin(future::ready((self.0)(body)))
    }
}

struct AsyncFn<F>(F);

impl<F> Derive for AsyncFn<F>
where
    F: for<'a> Fn(&'a Value) -> BoxFuture<'a, Result<Value, BoxError>> + Send + Sync,
{
    fn derive<'a>(&'a self, body: &'a Value) -> BoxFuture<'a, Result<Value, BoxError>> {
        (self.0)(body)
    }
}

/// A configuration value that is a literal, a dotted path into the record, or
/// a function of the record.
///
/// All three forms go through [`Selector::resolve`], so callers never inspect
/// which one they hold.
#[derive(Clone)]
pub enum Selector {
    Literal(Value),
    Path(String),
    Derive(Arc<dyn Derive>),
}

impl Selector {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    /// Wraps a synchronous function of the record body.
    pub fn derive<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self::Derive(Arc::new(SyncFn(f)))
    }

    /// Wraps an asynchronous function of the record body.
    ///
    /// ```
    /// use autonumber::Selector;
    ///
    /// let selector = Selector::derive_async(|body| {
    ///     Box::pin(async move { Ok(body["store"]["name"].clone()) })
    /// });
    /// # let _ = selector;
    /// ```
    pub fn derive_async<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a Value) -> BoxFuture<'a, Result<Value, BoxError>>
            + Send
            + Sync
            + 'static,
    {
        Self::Derive(Arc::new(AsyncFn(f)))
    }

    /// Resolves the selector against `record`.
    ///
    /// A path that does not exist in the record resolves to `null`.
    pub async fn resolve(&self, record: &Record) -> Result<Value> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Path(path) => Ok(record.get(path).cloned().unwrap_or(Value::Null)),
            Self::Derive(f) => f
                .derive(record.body())
                .await
                .map_err(|e| Error::selector(self.to_string(), e)),
        }
    }

    /// Resolves the selector and interprets the result as a local datetime.
    pub async fn resolve_datetime(&self, record: &Record) -> Result<NaiveDateTime> {
        let value = self.resolve(record).await?;
        to_local_datetime(&value).map_err(|e| Error::selector(self.to_string(), e))
    }

    /// Resolves the selector and renders the result as text. `null` renders as
    /// the empty string.
    pub async fn resolve_text(&self, record: &Record) -> Result<String> {
        Ok(match self.resolve(record).await? {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => other.to_string(),
        })
    }
}

/// Interprets a JSON value as local calendar fields.
///
/// Accepts RFC 3339 strings (converted into the local time zone), naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]` strings (taken as already local), and integer
/// milliseconds since the Unix epoch.
pub fn to_local_datetime(value: &Value) -> Result<NaiveDateTime, BoxError> {
    match value {
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.with_timezone(&Local).naive_local());
            }
            s.parse::<NaiveDateTime>()
                .map_err(|e| format!("`{s}` is not a datetime: {e}").into())
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.with_timezone(&Local).naive_local())
            .ok_or_else(|| format!("{n} is not a millisecond timestamp").into()),
        Value::Null => Err("date is missing".into()),
        other => Err(format!("{other} is not a datetime").into()),
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "literal {value}"),
            Self::Path(path) => f.write_str(path),
            Self::Derive(_) => f.write_str("derived selector"),
        }
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Derive(_) => f.write_str("Derive(..)"),
        }
    }
}

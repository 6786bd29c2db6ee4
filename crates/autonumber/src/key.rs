use core::{
    fmt,
    hash::{Hash, Hasher},
};

use chrono::NaiveDateTime;
use futures::future::try_join;
use serde_json::Value;

use crate::{Clock, FieldSpec, Record, Result};

/// The composite key identifying one logical sequence.
///
/// A sequence is addressed by its numerator plus an optional group value and
/// an optional period bucket. Numerators are trimmed and lowercased on
/// construction, so `"Order.number"` and `" order.NUMBER "` address the same
/// counter. A `null` group is the same as no group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceKey {
    numerator: String,
    group: Option<Value>,
    period: Option<NaiveDateTime>,
}

impl SequenceKey {
    /// Creates a key scoped to the numerator only.
    pub fn new(numerator: impl AsRef<str>) -> Self {
        Self {
            numerator: numerator.as_ref().trim().to_lowercase(),
            group: None,
            period: None,
        }
    }

    #[must_use]
    pub fn with_group(mut self, group: Value) -> Self {
        self.group = (!group.is_null()).then_some(group);
        self
    }

    #[must_use]
    pub const fn with_period(mut self, period: NaiveDateTime) -> Self {
        self.period = Some(period);
        self
    }

    pub fn numerator(&self) -> &str {
        &self.numerator
    }

    pub const fn group(&self) -> Option<&Value> {
        self.group.as_ref()
    }

    pub const fn period(&self) -> Option<NaiveDateTime> {
        self.period
    }
}

impl Hash for SequenceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.numerator.hash(state);
        match &self.group {
            Some(group) => {
                state.write_u8(1);
                hash_value(group, state);
            }
            None => state.write_u8(0),
        }
        self.period.hash(state);
    }
}

// `Value` has no `Hash`. Object entries are hashed in key order so equal
// objects hash alike whatever their insertion order.
fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => state.write_u8(0),
        Value::Bool(b) => {
            state.write_u8(1);
            b.hash(state);
        }
        Value::Number(n) => {
            state.write_u8(2);
            n.to_string().hash(state);
        }
        Value::String(s) => {
            state.write_u8(3);
            s.hash(state);
        }
        Value::Array(items) => {
            state.write_u8(4);
            state.write_usize(items.len());
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Object(map) => {
            state.write_u8(5);
            state.write_usize(map.len());
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            for (key, item) in entries {
                key.hash(state);
                hash_value(item, state);
            }
        }
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.numerator)?;
        if let Some(group) = &self.group {
            write!(f, " group={group}")?;
        }
        if let Some(period) = &self.period {
            write!(f, " period={period}")?;
        }
        Ok(())
    }
}

/// Derives the sequence key for `field` on `record`.
///
/// The numerator defaults to `"<entity>.<field path>"`. The group and date
/// selectors are resolved concurrently; the date defaults to `clock.now()`
/// and is only consulted when the field buckets by period.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all, fields(entity = record.entity(), path = field.path())))]
pub async fn resolve_key<C>(record: &Record, field: &FieldSpec, clock: &C) -> Result<SequenceKey>
where
    C: Clock + ?Sized,
{
    let numerator = match field.numerator_override() {
        Some(numerator) => SequenceKey::new(numerator),
        None => SequenceKey::new(format!("{}.{}", record.entity(), field.path())),
    };

    let (group, period) =
        try_join(resolve_group(record, field), resolve_period(record, field, clock)).await?;

    let mut key = numerator;
    if let Some(group) = group {
        key = key.with_group(group);
    }
    if let Some(period) = period {
        key = key.with_period(period);
    }
    Ok(key)
}

async fn resolve_group(record: &Record, field: &FieldSpec) -> Result<Option<Value>> {
    match field.group_selector() {
        Some(selector) => selector.resolve(record).await.map(Some),
        None => Ok(None),
    }
}

async fn resolve_period<C>(
    record: &Record,
    field: &FieldSpec,
    clock: &C,
) -> Result<Option<NaiveDateTime>>
where
    C: Clock + ?Sized,
{
    let Some(granularity) = field.granularity() else {
        return Ok(None);
    };
    let date = match field.date_selector() {
        Some(selector) => selector.resolve_datetime(record).await?,
        None => clock.now(),
    };
    Ok(Some(granularity.bucket_start(date)))
}

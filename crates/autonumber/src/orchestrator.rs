use std::{collections::HashMap, sync::Arc};

use futures::future::try_join_all;
use serde_json::Value;

use crate::{
    Clock, CounterBackend, CounterStore, EntitySchema, Error, FieldSpec, LocalClock, Record,
    Result, format_value, resolve_key,
};

/// Numbers new records before they are first persisted.
///
/// Holds the counter store it was given and, per entity type, the
/// precomputed list of autonumbered fields. The host calls
/// [`Self::before_create`] once per record creation; updates to persisted
/// records are left alone.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use autonumber::{Autonumber, CounterStore, FieldSpec, MemoryBackend, Record, Selector};
/// use serde_json::json;
///
/// # futures::executor::block_on(async {
/// let store = Arc::new(CounterStore::new(MemoryBackend::new()));
/// let mut numbering = Autonumber::new(store);
/// numbering.register(
///     "Order",
///     vec![FieldSpec::string("number").prefix(Selector::literal("SO-")).leading_zeros(8)],
/// )?;
///
/// let mut order = Record::new("Order", json!({ "customer": "acme" }));
/// numbering.before_create(&mut order).await?;
/// assert_eq!(order.get("number"), Some(&json!("SO-00001")));
/// # Ok::<_, autonumber::Error>(())
/// # }).unwrap();
/// ```
pub struct Autonumber<B, C = LocalClock> {
    store: Arc<CounterStore<B>>,
    clock: C,
    entities: HashMap<String, Arc<[FieldSpec]>>,
}

impl<B> Autonumber<B>
where
    B: CounterBackend,
{
    /// Creates an orchestrator over `store` that reads the local system clock.
    pub fn new(store: Arc<CounterStore<B>>) -> Self {
        Self::with_clock(store, LocalClock)
    }

    /// Creates an orchestrator and registers every schema.
    ///
    /// # Errors
    ///
    /// The first [`Error::Config`] raised by any schema.
    pub fn from_schemas(store: Arc<CounterStore<B>>, schemas: &[EntitySchema]) -> Result<Self> {
        let mut numbering = Self::new(store);
        for schema in schemas {
            numbering.register(&schema.entity, schema.autonumber_fields()?)?;
        }
        Ok(numbering)
    }
}

impl<B, C> Autonumber<B, C>
where
    B: CounterBackend,
    C: Clock,
{
    pub fn with_clock(store: Arc<CounterStore<B>>, clock: C) -> Self {
        Self {
            store,
            clock,
            entities: HashMap::new(),
        }
    }

    /// Registers the autonumbered fields of `entity`, replacing any previous
    /// registration.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if a field fails validation or two fields share a
    /// path.
    pub fn register(&mut self, entity: impl Into<String>, fields: Vec<FieldSpec>) -> Result<()> {
        let entity = entity.into();
        for (i, field) in fields.iter().enumerate() {
            field.validate()?;
            if fields[..i].iter().any(|other| other.path() == field.path()) {
                return Err(Error::Config {
                    reason: format!("entity `{entity}` numbers `{}` twice", field.path()),
                });
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(entity = %entity, fields = fields.len(), "Registered autonumber fields");
        self.entities.insert(entity, fields.into());
        Ok(())
    }

    /// The autonumbered fields registered for `entity`, if any.
    pub fn fields(&self, entity: &str) -> Option<&[FieldSpec]> {
        self.entities.get(entity).map(|fields| &**fields)
    }

    pub fn store(&self) -> &Arc<CounterStore<B>> {
        &self.store
    }

    /// The before-first-persist hook.
    ///
    /// For a new record, every registered field is keyed, allocated and
    /// formatted concurrently; values are written onto the record only once
    /// all fields succeed. Persisted records and entities without autonumbered
    /// fields return immediately without touching the store.
    ///
    /// # Errors
    ///
    /// The first error from any field. The record is left unchanged, and the
    /// caller must not persist it. Numbers already allocated for the other
    /// fields are not reclaimed.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(entity = record.entity())))]
    pub async fn before_create(&self, record: &mut Record) -> Result<()> {
        if !record.is_new() {
            return Ok(());
        }
        let Some(fields) = self.entities.get(record.entity()) else {
            return Ok(());
        };
        if fields.is_empty() {
            return Ok(());
        }

        let snapshot: &Record = record;
        let values = try_join_all(fields.iter().map(|field| self.number(snapshot, field))).await?;

        for (field, value) in fields.iter().zip(values) {
            record.set(field.path(), value);
        }
        Ok(())
    }

    async fn number(&self, record: &Record, field: &FieldSpec) -> Result<Value> {
        let key = resolve_key(record, field, &self.clock).await?;
        let count = self.store.allocate_next(&key).await?;
        #[cfg(feature = "tracing")]
        tracing::trace!(key = %key, count, path = field.path(), "Allocated");
        format_value(count, field, record).await
    }
}

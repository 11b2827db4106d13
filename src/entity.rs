//! Generic persistent records and their read/write protocol.
//!
//! An [`Entity`] is an id plus a string attribute map stored as one hash keyed by the id. Typed
//! wrappers ([`crate::Node`], [`crate::Relationship`], user models) implement [`Model`] to be
//! materialized from query results and [`Persist`] to be written through [`Graph::save`].

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    clock::format_timestamp,
    errors::KvGraphError,
    graph::Graph,
    store::{Command, KeyValueStore, Read, Reply},
    types::Attributes,
};

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

#[derive(Clone, Debug, Default)]
pub struct Entity {
    id: Option<String>,
    attributes: Attributes,
    persisted: bool,
    destroyed: bool,
}

impl Entity {
    pub fn new(attributes: Attributes) -> Self {
        Self {
            attributes,
            ..Self::default()
        }
    }

    /// Unsaved entity with a caller-chosen id; uniqueness is checked when it is created.
    pub fn with_id(id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id: Some(id.into()),
            attributes,
            ..Self::default()
        }
    }

    /// Entity as read back from the store.
    pub fn loaded(id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id: Some(id.into()),
            attributes,
            persisted: true,
            destroyed: false,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.attributes.get(field).map(String::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.attributes.remove(field)
    }

    pub fn is_new_record(&self) -> bool {
        !self.persisted
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Attributes plus `id`, the shape handed to data flows.
    pub fn to_json(&self) -> Value {
        let mut map: serde_json::Map<String, Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        map.insert(
            "id".to_string(),
            self.id.clone().map(Value::String).unwrap_or(Value::Null),
        );
        Value::Object(map)
    }
}

/// Entities are equal when they carry the same id.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attributes.len() + 1))?;
        for (field, value) in &self.attributes {
            if field != "id" {
                map.serialize_entry(field, value)?;
            }
        }
        map.serialize_entry("id", &self.id)?;
        map.end()
    }
}

/// A typed view over an [`Entity`].
pub trait Model: Sized {
    fn from_entity(entity: Entity) -> Self;
    fn entity(&self) -> &Entity;
    fn entity_mut(&mut self) -> &mut Entity;

    fn id(&self) -> Option<&str> {
        self.entity().id()
    }
}

impl Model for Entity {
    fn from_entity(entity: Entity) -> Self {
        entity
    }

    fn entity(&self) -> &Entity {
        self
    }

    fn entity_mut(&mut self) -> &mut Entity {
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Save,
    Create,
    Update,
    Destroy,
}

/// The write being performed, handed to [`Persist`] index hooks.
#[derive(Clone, Copy, Debug)]
pub struct WriteContext {
    pub event: Lifecycle,
    pub at: DateTime<Utc>,
}

/// Write-side behaviour of a model.
///
/// `validate` runs first; any reason aborts the write with [`KvGraphError::ValidationFailed`].
/// `before` hooks run as save then create/update (or destroy) and abort on error; `after`
/// hooks run in the reverse nesting once the batch has committed.
pub trait Persist: Model {
    fn validate(&self) -> Vec<String> {
        Vec::new()
    }

    fn before(&mut self, _event: Lifecycle) -> Result<(), KvGraphError> {
        Ok(())
    }

    fn after(&mut self, _event: Lifecycle) {}

    /// Extra writes committed in the same atomic batch as the attribute hash.
    fn index_commands<S: KeyValueStore>(
        &self,
        _graph: &Graph<S>,
        _write: &WriteContext,
    ) -> Result<Vec<Command>, KvGraphError> {
        Ok(Vec::new())
    }

    /// Runs after the batch and the `after` hooks.
    fn committed<S: KeyValueStore>(
        &self,
        _graph: &Graph<S>,
        _write: &WriteContext,
    ) -> Result<(), KvGraphError> {
        Ok(())
    }
}

impl Persist for Entity {}

/// Restricts which hash fields a find loads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub fields: Option<Vec<String>>,
}

impl FindOptions {
    pub fn fields<I, T>(fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            fields: Some(fields.into_iter().map(Into::into).collect()),
        }
    }

    fn read(&self, id: &str) -> Read {
        match &self.fields {
            Some(fields) => Read::HashGetFields {
                key: id.to_string(),
                fields: fields.clone(),
            },
            None => Read::HashGetAll {
                key: id.to_string(),
            },
        }
    }

    fn attributes(&self, reply: Reply) -> Attributes {
        match (reply, &self.fields) {
            (Reply::Hash(attributes), _) => attributes,
            (Reply::Fields(values), Some(fields)) => fields
                .iter()
                .zip(values)
                .filter_map(|(field, value)| value.map(|v| (field.clone(), v)))
                .collect(),
            (Reply::Fields(_), None) => Attributes::new(),
        }
    }
}

impl<S: KeyValueStore> Graph<S> {
    /// Saves a new model and returns it.
    pub fn create<M: Persist>(&self, mut model: M) -> Result<M, KvGraphError> {
        self.save(&mut model)?;
        Ok(model)
    }

    /// Creates the model when it has never been stored, updates it otherwise.
    pub fn save<M: Persist>(&self, model: &mut M) -> Result<(), KvGraphError> {
        if model.entity().is_destroyed() {
            return Err(KvGraphError::invalid_input(
                "destroyed entity cannot be saved",
            ));
        }
        let creating = model.entity().is_new_record();
        let event = if creating {
            Lifecycle::Create
        } else {
            Lifecycle::Update
        };

        let mut reasons = model.validate();
        if creating {
            if let Some(id) = model.entity().id() {
                // Ids are key segments of the edge pointer.
                if id.is_empty() || id.contains(':') {
                    reasons.push(format!("\"{id}\" must be non-empty and must not contain ':'."));
                } else if self.store().exists(id)? {
                    reasons.push(format!("\"{id}\" already exists."));
                }
            }
        }
        if !reasons.is_empty() {
            return Err(KvGraphError::validation(model.entity().clone(), reasons));
        }

        model.before(Lifecycle::Save)?;
        model.before(event)?;

        let at = self.clock().now();
        let stamp = format_timestamp(at);
        let assigned = creating && model.entity().id().is_none();
        {
            let entity = model.entity_mut();
            if assigned {
                entity.id = Some(self.id_generator().generate());
            }
            if creating {
                entity.set(CREATED_AT, stamp.clone());
            }
            entity.set(UPDATED_AT, stamp);
        }

        let write = WriteContext { event, at };
        if let Err(err) = self.commit(model, &write) {
            if assigned {
                model.entity_mut().id = None;
            }
            return Err(err);
        }
        model.entity_mut().persisted = true;
        debug!(
            target: "kvgraph::entity",
            id = model.id().unwrap_or_default(),
            ?event,
            "entity saved"
        );

        model.after(event);
        model.after(Lifecycle::Save);
        model.committed(self, &write)
    }

    fn commit<M: Persist>(&self, model: &M, write: &WriteContext) -> Result<(), KvGraphError> {
        let entity = model.entity();
        let id = entity
            .id()
            .ok_or_else(|| KvGraphError::invalid_input("entity has no id"))?;
        let mut commands = vec![Command::HashSet {
            key: id.to_string(),
            fields: entity.attributes().clone(),
        }];
        commands.extend(model.index_commands(self, write)?);
        self.store().multi(&commands)
    }

    /// Deletes the model's hash (and whatever its index hook removes) in one batch.
    pub fn destroy<M: Persist>(&self, model: &mut M) -> Result<(), KvGraphError> {
        let id = model
            .id()
            .map(str::to_string)
            .ok_or_else(|| KvGraphError::not_found("entity has no id"))?;
        if model.entity().is_new_record() {
            return Err(KvGraphError::not_found(id));
        }
        model.before(Lifecycle::Destroy)?;

        let write = WriteContext {
            event: Lifecycle::Destroy,
            at: self.clock().now(),
        };
        let mut commands = model.index_commands(self, &write)?;
        commands.push(Command::Delete { key: id.clone() });
        self.store().multi(&commands)?;
        model.entity_mut().destroyed = true;
        debug!(target: "kvgraph::entity", id = %id, "entity destroyed");

        model.after(Lifecycle::Destroy);
        model.committed(self, &write)
    }

    pub fn find<M: Model>(&self, id: &str) -> Result<M, KvGraphError> {
        self.find_with_options(id, &FindOptions::default())
    }

    /// Single read; a fields-only read when `options.fields` is set.
    pub fn find_with_options<M: Model>(
        &self,
        id: &str,
        options: &FindOptions,
    ) -> Result<M, KvGraphError> {
        let reply = self.store().read(&options.read(id))?;
        let attributes = options.attributes(reply);
        self.ensure_found(id, &attributes)?;
        Ok(M::from_entity(Entity::loaded(id, attributes)))
    }

    pub fn find_many<M: Model, I: AsRef<str>>(&self, ids: &[I]) -> Result<Vec<M>, KvGraphError> {
        self.find_many_with(ids, &FindOptions::default(), M::from_entity)
    }

    /// Batched lookup preserving input order. Each loaded entity is passed through `factory`,
    /// which may pick a different model per record.
    pub fn find_many_with<T, I, F>(
        &self,
        ids: &[I],
        options: &FindOptions,
        mut factory: F,
    ) -> Result<Vec<T>, KvGraphError>
    where
        I: AsRef<str>,
        F: FnMut(Entity) -> T,
    {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let reads: Vec<Read> = ids.iter().map(|id| options.read(id.as_ref())).collect();
        let replies = match self.store().pipelined(&reads) {
            Ok(replies) => replies,
            Err(err) if err.is_cannot_combine() => {
                warn!(
                    target: "kvgraph::entity",
                    count = reads.len(),
                    "pipelined find refused by store, reading sequentially"
                );
                reads
                    .iter()
                    .map(|read| self.store().read(read))
                    .collect::<Result<Vec<_>, _>>()?
            }
            Err(err) => return Err(err),
        };

        let mut found = Vec::with_capacity(ids.len());
        for (id, reply) in ids.iter().zip(replies) {
            let id = id.as_ref();
            let attributes = options.attributes(reply);
            self.ensure_found(id, &attributes)?;
            found.push(factory(Entity::loaded(id, attributes)));
        }
        Ok(found)
    }

    fn ensure_found(&self, id: &str, attributes: &Attributes) -> Result<(), KvGraphError> {
        if attributes.is_empty() && !self.store().exists(id)? {
            return Err(KvGraphError::not_found(id));
        }
        Ok(())
    }

    /// Atomically adds `by` to an integer attribute and returns the new value.
    pub fn increment<M: Model>(
        &self,
        model: &mut M,
        field: &str,
        by: i64,
    ) -> Result<i64, KvGraphError> {
        let id = model
            .id()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| KvGraphError::not_found("entity has no id"))?;
        let value = self.store().hash_increment(&id, field, by)?;
        model.entity_mut().set(field, value.to_string());
        Ok(value)
    }

    pub fn decrement<M: Model>(
        &self,
        model: &mut M,
        field: &str,
        by: i64,
    ) -> Result<i64, KvGraphError> {
        let by = by
            .checked_neg()
            .ok_or_else(|| KvGraphError::store("increment or decrement would overflow"))?;
        self.increment(model, field, by)
    }
}

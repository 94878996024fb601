//! Session-wide registry of published data definitions.
//!
//! The registry compiles each shape once per direction, publishes its fields
//! to the host in wire order, and hands out the compiled definition behind an
//! `Arc` for every later request.  Publication is serialised by a mutex so
//! two threads asking for the same shape never register it twice.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error};

use crate::channel::HostChannel;
use crate::definition::field::{Direction, FieldDescriptor};
use crate::definition::record::DynamicDefinition;
use crate::definition::schema::{DataShape, ObjectDefinition};
use crate::definition::DefinitionError;
use crate::protocol::IdAllocator;

type CompiledKey = (TypeId, Direction);

/// Compiles, publishes, and caches data definitions for one session.
pub struct DefinitionRegistry {
    channel: Arc<dyn HostChannel>,
    ids: IdAllocator,
    compiled: RwLock<HashMap<CompiledKey, Arc<dyn Any + Send + Sync>>>,
    dynamic: RwLock<HashMap<u32, Arc<DynamicDefinition>>>,
    /// IDs whose layout is complete on the host.
    known: RwLock<HashSet<u32>>,
    /// IDs whose fields are being published right now.
    open: RwLock<HashSet<u32>>,
    publish: Mutex<()>,
}

impl DefinitionRegistry {
    pub fn new(channel: Arc<dyn HostChannel>) -> Self {
        Self {
            channel,
            ids: IdAllocator::definitions(),
            compiled: RwLock::new(HashMap::new()),
            dynamic: RwLock::new(HashMap::new()),
            known: RwLock::new(HashSet::new()),
            open: RwLock::new(HashSet::new()),
            publish: Mutex::new(()),
        }
    }

    /// Returns the published definition of `S` for `direction`, compiling
    /// and publishing it on first use.
    ///
    /// # Errors
    ///
    /// Returns the compile error, or [`DefinitionError::Host`] if the host
    /// refused one of the fields.  A failed shape is not cached.
    pub fn define<S: DataShape>(
        &self,
        direction: Direction,
    ) -> Result<Arc<ObjectDefinition<S>>, DefinitionError> {
        let key = (TypeId::of::<S>(), direction);
        if let Some(def) = self.cached::<S>(&key) {
            return Ok(def);
        }

        let _publishing = self.publish.lock();
        // Another thread may have published it while we waited.
        if let Some(def) = self.cached::<S>(&key) {
            return Ok(def);
        }

        let def = Arc::new(ObjectDefinition::<S>::compile(direction, &self.ids)?);
        self.publish_fields(def.id(), def.name(), def.fields())?;
        self.compiled
            .write()
            .insert(key, Arc::clone(&def) as Arc<dyn Any + Send + Sync>);
        Ok(def)
    }

    /// Compiles `S` with a fresh ID without publishing or caching it.
    pub fn compile<S: DataShape>(
        &self,
        direction: Direction,
    ) -> Result<ObjectDefinition<S>, DefinitionError> {
        ObjectDefinition::compile(direction, &self.ids)
    }

    /// Builds and publishes a definition from a runtime field list.
    pub fn define_dynamic(
        &self,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Arc<DynamicDefinition>, DefinitionError> {
        DynamicDefinition::validate(&fields)?;

        let _publishing = self.publish.lock();
        let def = Arc::new(DynamicDefinition::new(self.ids.next()?, fields));
        self.publish_fields(def.id(), "DynamicDefinition", def.fields().iter())?;
        self.dynamic.write().insert(def.id(), Arc::clone(&def));
        Ok(def)
    }

    /// Looks up a dynamic definition by ID.
    pub fn dynamic(&self, definition_id: u32) -> Option<Arc<DynamicDefinition>> {
        self.dynamic.read().get(&definition_id).cloned()
    }

    /// Clears a dynamic definition on the host and forgets it.
    pub fn remove_dynamic(&self, definition_id: u32) -> Result<(), DefinitionError> {
        if self.dynamic.write().remove(&definition_id).is_none() {
            return Err(DefinitionError::UnknownDefinition(definition_id));
        }
        self.known.write().remove(&definition_id);
        self.channel
            .clear_data_definition(definition_id)
            .map_err(|source| DefinitionError::Host {
                definition: "DynamicDefinition".to_string(),
                source,
            })
    }

    /// Appends one field to a definition whose layout is being published.
    ///
    /// Fields reach the host in call order.  Once a definition is published
    /// its layout is fixed.
    ///
    /// # Errors
    ///
    /// [`DefinitionError::Sealed`] if `definition_id` is already published,
    /// [`DefinitionError::UnknownDefinition`] if it was never allocated for
    /// publication in this session.
    pub fn add_to_definition(
        &self,
        definition_id: u32,
        field: &FieldDescriptor,
        tag: u32,
    ) -> Result<(), DefinitionError> {
        if !self.open.read().contains(&definition_id) {
            return Err(if self.is_known(definition_id) {
                DefinitionError::Sealed(definition_id)
            } else {
                DefinitionError::UnknownDefinition(definition_id)
            });
        }
        debug!(
            "AddToDataDefinition({definition_id}, '{}', '{}', {}, {}, {tag})",
            field.name, field.units, field.data_type, field.epsilon
        );
        self.channel
            .add_to_data_definition(definition_id, field, tag)
            .map_err(|source| {
                error!(
                    "AddToDataDefinition() failed for definition {definition_id} var '{}': {source}",
                    field.name
                );
                DefinitionError::Host {
                    definition: definition_id.to_string(),
                    source,
                }
            })
    }

    pub fn is_known(&self, definition_id: u32) -> bool {
        self.known.read().contains(&definition_id)
    }

    /// Number of compiled (typed) definitions in the cache.
    pub fn len(&self) -> usize {
        self.compiled.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.read().is_empty()
    }

    /// Forgets every definition; used when the connection is lost.
    ///
    /// IDs are not reused after a reset.
    pub fn reset(&self) {
        let _publishing = self.publish.lock();
        self.compiled.write().clear();
        self.dynamic.write().clear();
        self.known.write().clear();
        self.open.write().clear();
        debug!("definition registry reset");
    }

    fn cached<S: DataShape>(&self, key: &CompiledKey) -> Option<Arc<ObjectDefinition<S>>> {
        let entry = self.compiled.read().get(key).cloned()?;
        entry.downcast::<ObjectDefinition<S>>().ok()
    }

    fn publish_fields<'a>(
        &self,
        definition_id: u32,
        name: &str,
        fields: impl Iterator<Item = &'a FieldDescriptor>,
    ) -> Result<(), DefinitionError> {
        self.open.write().insert(definition_id);
        for (tag, field) in fields.enumerate() {
            if let Err(err) = self.add_to_definition(definition_id, field, tag as u32) {
                self.open.write().remove(&definition_id);
                // Best effort: the host may hold a partial layout.
                if let Err(clear) = self.channel.clear_data_definition(definition_id) {
                    error!("ClearDataDefinition({definition_id}) failed: {clear}");
                }
                return Err(match err {
                    DefinitionError::Host { source, .. } => DefinitionError::Host {
                        definition: name.to_string(),
                        source,
                    },
                    other => other,
                });
            }
        }
        self.open.write().remove(&definition_id);
        self.known.write().insert(definition_id);
        debug!("published definition {definition_id} for {name}");
        Ok(())
    }
}

impl std::fmt::Debug for DefinitionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionRegistry")
            .field("last_id", &self.ids.last())
            .field("compiled", &self.compiled.read().len())
            .field("dynamic", &self.dynamic.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::{HostCall, RecordingChannel};
    use crate::channel::{HostError, MockHostChannel};
    use crate::definition::schema::SchemaBuilder;
    use crate::protocol::DataType;
    use mockall::Sequence;

    #[derive(Debug, Default)]
    struct Position {
        altitude: f64,
        heading: f64,
    }

    impl DataShape for Position {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema
                .value(
                    "altitude",
                    FieldDescriptor::new("PLANE ALTITUDE").units("feet"),
                    |p| &p.altitude,
                    |p| &mut p.altitude,
                )
                .value(
                    "heading",
                    FieldDescriptor::new("PLANE HEADING DEGREES TRUE").units("degrees"),
                    |p| &p.heading,
                    |p| &mut p.heading,
                );
        }
    }

    #[test]
    fn test_define_publishes_fields_in_order_once() {
        // Arrange
        let channel = Arc::new(RecordingChannel::new());
        let registry = DefinitionRegistry::new(channel.clone());

        // Act
        let first = registry.define::<Position>(Direction::Get).expect("define");
        let again = registry.define::<Position>(Direction::Get).expect("define");

        // Assert
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(
            channel.definition_layout(first.id()),
            vec!["PLANE ALTITUDE", "PLANE HEADING DEGREES TRUE"]
        );
        assert_eq!(channel.recorded().len(), 2);
    }

    #[test]
    fn test_get_and_set_definitions_are_distinct() {
        let channel = Arc::new(RecordingChannel::new());
        let registry = DefinitionRegistry::new(channel);

        let get = registry.define::<Position>(Direction::Get).expect("get");
        let set = registry.define::<Position>(Direction::Set).expect("set");

        assert_ne!(get.id(), set.id());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_tags_follow_field_positions() {
        // Arrange – the host must see the fields in declaration order with
        // tags 0 and 1.
        let mut mock = MockHostChannel::new();
        let mut seq = Sequence::new();
        mock.expect_add_to_data_definition()
            .withf(|id, field, tag| *id == 2 && field.name == "PLANE ALTITUDE" && *tag == 0)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        mock.expect_add_to_data_definition()
            .withf(|id, field, tag| {
                *id == 2 && field.name == "PLANE HEADING DEGREES TRUE" && *tag == 1
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        let registry = DefinitionRegistry::new(Arc::new(mock));

        // Act
        let def = registry.define::<Position>(Direction::Get).expect("define");

        // Assert
        assert_eq!(def.id(), 2);
    }

    #[test]
    fn test_add_to_unknown_definition_is_rejected() {
        let channel = Arc::new(RecordingChannel::new());
        let registry = DefinitionRegistry::new(channel.clone());

        let err = registry
            .add_to_definition(99, &FieldDescriptor::new("TITLE"), 0)
            .expect_err("unknown");

        assert_eq!(err, DefinitionError::UnknownDefinition(99));
        assert!(channel.recorded().is_empty());
    }

    #[test]
    fn test_published_layout_cannot_grow() {
        // Arrange
        let channel = Arc::new(RecordingChannel::new());
        let registry = DefinitionRegistry::new(channel.clone());
        let def = registry.define::<Position>(Direction::Get).expect("define");

        // Act
        let err = registry
            .add_to_definition(def.id(), &FieldDescriptor::new("TITLE"), 2)
            .expect_err("sealed");

        // Assert
        assert_eq!(err, DefinitionError::Sealed(def.id()));
        assert_eq!(
            channel.definition_layout(def.id()),
            vec!["PLANE ALTITUDE".to_string(), "PLANE HEADING DEGREES TRUE".to_string()]
        );
        assert!(registry.is_known(def.id()));
    }

    #[test]
    fn test_host_failure_is_not_cached() {
        let channel = Arc::new(RecordingChannel::failing_on("AddToDataDefinition"));
        let registry = DefinitionRegistry::new(channel.clone());

        let err = registry.define::<Position>(Direction::Get).expect_err("host");

        assert!(matches!(
            err,
            DefinitionError::Host { ref definition, source: HostError::CallFailed { .. } }
                if definition == "Position"
        ));
        assert!(registry.is_empty());
        assert!(matches!(
            channel.recorded().as_slice(),
            [HostCall::ClearDataDefinition { .. }]
        ));
    }

    #[test]
    fn test_dynamic_definition_round_trip() {
        let channel = Arc::new(RecordingChannel::new());
        let registry = DefinitionRegistry::new(channel.clone());

        let def = registry
            .define_dynamic(vec![
                FieldDescriptor::new("SIM ON GROUND").data_type(DataType::Int32),
                FieldDescriptor::new("TITLE").data_type(DataType::String256),
            ])
            .expect("dynamic");

        assert!(registry.is_known(def.id()));
        assert_eq!(
            channel.definition_layout(def.id()),
            vec!["SIM ON GROUND", "TITLE"]
        );
        registry.remove_dynamic(def.id()).expect("remove");
        assert!(registry.dynamic(def.id()).is_none());
        assert!(!registry.is_known(def.id()));
    }

    #[test]
    fn test_reset_forgets_but_never_reuses_ids() {
        let channel = Arc::new(RecordingChannel::new());
        let registry = DefinitionRegistry::new(channel);
        let before = registry.define::<Position>(Direction::Get).expect("define");

        registry.reset();
        let after = registry.define::<Position>(Direction::Get).expect("define");

        assert!(!registry.is_known(before.id()));
        assert!(after.id() > before.id());
    }
}

//! Change tracking
//!
//! Every entity staged through a repository or returned by a tracked read has
//! one entry here, keyed by entity type and primary key. Entries of different
//! entity types live side by side behind the [`TrackedEntry`] trait object.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::entity::{Entity, EntityKey, Value};
use crate::error::DataError;
use crate::statement;

/// Lifecycle state of a tracked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Staged for insert
    Added,
    /// Matches the store as of the last read or commit
    Unchanged,
    /// Staged for update of the modified columns
    Modified,
    /// Staged for delete
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteKind {
    Insert,
    Update,
    Delete,
}

/// One statement produced from a staged entry
#[derive(Debug, Clone)]
pub(crate) struct WriteCommand {
    pub(crate) entry: u64,
    pub(crate) entity: &'static str,
    pub(crate) kind: WriteKind,
    pub(crate) sql: String,
    pub(crate) values: Vec<Value>,
    pub(crate) key: String,
    pub(crate) returns_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Identity {
    entity: TypeId,
    key: String,
}

impl Identity {
    fn of<T: Entity>(key: &T::Key) -> Self {
        Self {
            entity: TypeId::of::<T>(),
            key: key.to_string(),
        }
    }
}

trait TrackedEntry: Send + Sync {
    fn state(&self) -> EntityState;

    fn staged_at(&self) -> Option<u64>;

    fn identity(&self) -> Option<Identity>;

    fn command(&self, entry: u64) -> Option<WriteCommand>;

    fn accept(&mut self, generated: Option<Value>);

    fn boxed_clone(&self) -> Box<dyn TrackedEntry>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Entry<T: Entity> {
    state: EntityState,
    staged_at: Option<u64>,
    current: T,
    modified: Vec<&'static str>,
}

impl<T: Entity> Entry<T> {
    fn stage(&mut self, sequence: u64) {
        self.staged_at.get_or_insert(sequence);
    }

    fn merge_modified(&mut self, columns: &[&'static str]) {
        for column in columns {
            if !self.modified.contains(column) {
                self.modified.push(column);
            }
        }
    }
}

impl<T: Entity> TrackedEntry for Entry<T> {
    fn state(&self) -> EntityState {
        self.state
    }

    fn staged_at(&self) -> Option<u64> {
        self.staged_at
    }

    fn identity(&self) -> Option<Identity> {
        self.current.key().map(|key| Identity::of::<T>(&key))
    }

    fn command(&self, entry: u64) -> Option<WriteCommand> {
        let key = self.current.key();
        let key_text = key.as_ref().map(ToString::to_string).unwrap_or_default();

        let (kind, sql, values, returns_key) = match self.state {
            EntityState::Unchanged => return None,
            EntityState::Added => {
                let mut columns = Vec::with_capacity(T::COLUMNS.len() + 1);
                let mut values = Vec::with_capacity(T::COLUMNS.len() + 1);
                if let Some(key) = &key {
                    columns.push(T::KEY_COLUMN);
                    values.push(key.to_value());
                }
                columns.extend_from_slice(T::COLUMNS);
                values.extend(T::COLUMNS.iter().map(|column| self.current.value(column)));

                let returning = key.is_none().then_some(T::KEY_COLUMN);
                let sql = statement::insert(T::TABLE, &columns, returning);
                (WriteKind::Insert, sql, values, returning.is_some())
            }
            EntityState::Modified => {
                let key = key?;
                let mut values: Vec<Value> = self
                    .modified
                    .iter()
                    .map(|column| self.current.value(column))
                    .collect();
                values.push(key.to_value());
                let sql = statement::update(T::TABLE, &self.modified, T::KEY_COLUMN);
                (WriteKind::Update, sql, values, false)
            }
            EntityState::Deleted => {
                let key = key?;
                let sql = statement::delete(T::TABLE, T::KEY_COLUMN);
                (WriteKind::Delete, sql, vec![key.to_value()], false)
            }
        };

        Some(WriteCommand {
            entry,
            entity: T::entity_name(),
            kind,
            sql,
            values,
            key: key_text,
            returns_key,
        })
    }

    fn accept(&mut self, generated: Option<Value>) {
        if let Some(key) = generated.and_then(<T::Key as EntityKey>::from_value) {
            self.current.set_key(key);
        }
        self.state = EntityState::Unchanged;
        self.staged_at = None;
        self.modified.clear();
    }

    fn boxed_clone(&self) -> Box<dyn TrackedEntry> {
        Box::new(Entry {
            state: self.state,
            staged_at: self.staged_at,
            current: self.current.clone(),
            modified: self.modified.clone(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Tracking state of one entity captured before a change, so the change can
/// be undone
pub(crate) struct Checkpoint {
    identity: Option<Identity>,
    previous: Option<(u64, Box<dyn TrackedEntry>)>,
}

/// State of every entity known to one store context
#[derive(Default)]
pub(crate) struct ChangeTracker {
    entries: HashMap<u64, Box<dyn TrackedEntry>>,
    index: HashMap<Identity, u64>,
    sequence: u64,
}

impl ChangeTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn lookup<T: Entity>(&self, key: &T::Key) -> Option<u64> {
        self.index.get(&Identity::of::<T>(key)).copied()
    }

    fn entry<T: Entity>(&self, id: u64) -> Option<&Entry<T>> {
        self.entries.get(&id)?.as_any().downcast_ref::<Entry<T>>()
    }

    fn entry_mut<T: Entity>(&mut self, id: u64) -> Option<&mut Entry<T>> {
        self.entries.get_mut(&id)?.as_any_mut().downcast_mut::<Entry<T>>()
    }

    fn insert<T: Entity>(&mut self, entity: T, state: EntityState, modified: Vec<&'static str>) -> u64 {
        let id = self.next_sequence();
        let staged_at = (state != EntityState::Unchanged).then_some(id);
        if let Some(key) = entity.key() {
            self.index.insert(Identity::of::<T>(&key), id);
        }
        self.entries.insert(
            id,
            Box::new(Entry {
                state,
                staged_at,
                current: entity,
                modified,
            }),
        );
        id
    }

    fn forget(&mut self, id: u64) {
        if let Some(entry) = self.entries.remove(&id) {
            if let Some(identity) = entry.identity() {
                self.index.remove(&identity);
            }
        }
    }

    fn require_key<T: Entity>(entity: &T, operation: &str) -> Result<T::Key, DataError> {
        entity.key().ok_or_else(|| {
            DataError::invalid_argument(format!(
                "cannot {operation} {} without a key",
                T::entity_name()
            ))
        })
    }

    /// Stages an insert and returns the entry id
    ///
    /// Re-adding an entity staged for delete turns the delete into an update
    /// of every column.
    pub(crate) fn add<T: Entity>(&mut self, entity: T) -> Result<u64, DataError> {
        let Some(key) = entity.key() else {
            if T::GENERATED_KEY {
                return Ok(self.insert(entity, EntityState::Added, Vec::new()));
            }
            return Err(DataError::invalid_argument(format!(
                "cannot add {} without a key",
                T::entity_name()
            )));
        };

        let Some(id) = self.lookup::<T>(&key) else {
            return Ok(self.insert(entity, EntityState::Added, Vec::new()));
        };
        let sequence = self.next_sequence();
        match self.entry_mut::<T>(id) {
            Some(entry) if entry.state == EntityState::Deleted => {
                entry.current = entity;
                entry.state = EntityState::Modified;
                entry.modified = T::COLUMNS.to_vec();
                entry.stage(sequence);
                Ok(id)
            }
            _ => Err(DataError::invalid_argument(format!(
                "{} with key '{key}' is already tracked",
                T::entity_name()
            ))),
        }
    }

    /// Stages a batch of inserts; nothing is staged if any entity is rejected
    pub(crate) fn add_range<T: Entity>(&mut self, entities: Vec<T>) -> Result<Vec<u64>, DataError> {
        let mut staged = Vec::with_capacity(entities.len());
        for entity in entities {
            match self.add(entity) {
                Ok(id) => staged.push(id),
                Err(err) => {
                    for id in staged {
                        self.forget(id);
                    }
                    return Err(err);
                }
            }
        }
        Ok(staged)
    }

    /// Stages updates of every column for a batch; nothing is staged if any
    /// entity is rejected
    pub(crate) fn update_range<T: Entity>(&mut self, entities: Vec<T>) -> Result<usize, DataError> {
        let mut checkpoints = Vec::with_capacity(entities.len());
        for entity in entities {
            checkpoints.push(self.checkpoint(&entity));
            if let Err(err) = self.update(entity) {
                self.roll_back(checkpoints);
                return Err(err);
            }
        }
        Ok(checkpoints.len())
    }

    /// Stages deletes for a batch; nothing is staged if any entity is rejected
    pub(crate) fn remove_range<'a, T: Entity>(
        &mut self,
        entities: impl IntoIterator<Item = &'a T>,
    ) -> Result<usize, DataError> {
        let mut checkpoints = Vec::new();
        for entity in entities {
            checkpoints.push(self.checkpoint(entity));
            if let Err(err) = self.remove(entity) {
                self.roll_back(checkpoints);
                return Err(err);
            }
        }
        Ok(checkpoints.len())
    }

    /// Captures how `entity` is tracked right now
    pub(crate) fn checkpoint<T: Entity>(&self, entity: &T) -> Checkpoint {
        let identity = entity.key().map(|key| Identity::of::<T>(&key));
        let previous = identity.as_ref().and_then(|identity| {
            let id = *self.index.get(identity)?;
            Some((id, self.entries.get(&id)?.boxed_clone()))
        });
        Checkpoint { identity, previous }
    }

    /// Puts the entity back the way `checkpoint` saw it
    ///
    /// `staged` is the entry created since the checkpoint, needed when the
    /// entity had no key to find it by.
    pub(crate) fn restore(&mut self, checkpoint: Checkpoint, staged: Option<u64>) {
        if let Some(id) = staged {
            self.forget(id);
        }
        if let Some(id) = checkpoint
            .identity
            .as_ref()
            .and_then(|identity| self.index.get(identity).copied())
        {
            self.forget(id);
        }
        if let Some((id, entry)) = checkpoint.previous {
            if let Some(identity) = entry.identity() {
                self.index.insert(identity, id);
            }
            self.entries.insert(id, entry);
        }
    }

    fn roll_back(&mut self, checkpoints: Vec<Checkpoint>) {
        for checkpoint in checkpoints.into_iter().rev() {
            self.restore(checkpoint, None);
        }
    }

    /// Stages an update of every column
    pub(crate) fn update<T: Entity>(&mut self, entity: T) -> Result<u64, DataError> {
        self.mark_columns(entity, T::COLUMNS, "update")
    }

    /// Stages an update of `columns` only, merged with any columns already
    /// marked for the entity
    pub(crate) fn mark_modified<T: Entity>(
        &mut self,
        entity: T,
        columns: &[&'static str],
    ) -> Result<u64, DataError> {
        if columns.is_empty() {
            return Err(DataError::invalid_argument("at least one column must be named"));
        }
        if let Some(unknown) = columns.iter().find(|column| !T::has_column(column)) {
            return Err(DataError::invalid_argument(format!(
                "{} has no persisted column '{unknown}'",
                T::entity_name()
            )));
        }
        self.mark_columns(entity, columns, "modify")
    }

    fn mark_columns<T: Entity>(
        &mut self,
        entity: T,
        columns: &[&'static str],
        operation: &str,
    ) -> Result<u64, DataError> {
        let key = Self::require_key(&entity, operation)?;
        let Some(id) = self.lookup::<T>(&key) else {
            return Ok(self.insert(entity, EntityState::Modified, columns.to_vec()));
        };

        let sequence = self.next_sequence();
        let Some(entry) = self.entry_mut::<T>(id) else {
            return Err(DataError::invalid_argument(format!(
                "{} with key '{key}' is tracked as a different type",
                T::entity_name()
            )));
        };
        match entry.state {
            EntityState::Deleted => Err(DataError::invalid_argument(format!(
                "cannot {operation} {} with key '{key}': it is staged for delete",
                T::entity_name()
            ))),
            EntityState::Added => {
                entry.current = entity;
                Ok(id)
            }
            EntityState::Unchanged | EntityState::Modified => {
                entry.current = entity;
                entry.state = EntityState::Modified;
                entry.merge_modified(columns);
                entry.stage(sequence);
                Ok(id)
            }
        }
    }

    /// Stages a delete; a pending insert is simply forgotten
    pub(crate) fn remove<T: Entity>(&mut self, entity: &T) -> Result<(), DataError> {
        let key = Self::require_key(entity, "remove")?;
        let Some(id) = self.lookup::<T>(&key) else {
            self.insert(entity.clone(), EntityState::Deleted, Vec::new());
            return Ok(());
        };

        let sequence = self.next_sequence();
        let state = self.entry::<T>(id).map(|entry| entry.state);
        match state {
            Some(EntityState::Added) => self.forget(id),
            Some(EntityState::Unchanged | EntityState::Modified) => {
                if let Some(entry) = self.entry_mut::<T>(id) {
                    entry.state = EntityState::Deleted;
                    entry.modified.clear();
                    entry.stage(sequence);
                }
            }
            Some(EntityState::Deleted) | None => {}
        }
        Ok(())
    }

    /// Stops tracking `entity`; returns false if it was not tracked
    pub(crate) fn detach<T: Entity>(&mut self, entity: &T) -> bool {
        let Some(id) = entity.key().and_then(|key| self.lookup::<T>(&key)) else {
            return false;
        };
        self.forget(id);
        true
    }

    /// Resolves a row read from the store against the tracked entities
    ///
    /// Unchanged entries are refreshed from `row`. Entries with staged
    /// changes win over the row. Unknown rows start being tracked.
    pub(crate) fn attach<T: Entity>(&mut self, row: T) -> T {
        let Some(key) = row.key() else {
            return row;
        };
        let Some(id) = self.lookup::<T>(&key) else {
            self.insert(row.clone(), EntityState::Unchanged, Vec::new());
            return row;
        };
        match self.entry_mut::<T>(id) {
            Some(entry) if entry.state == EntityState::Unchanged => {
                entry.current = row.clone();
                row
            }
            Some(entry) => entry.current.clone(),
            None => row,
        }
    }

    /// The tracked instance for `key`, whatever its state
    pub(crate) fn tracked<T: Entity>(&self, key: &T::Key) -> Option<T> {
        let id = self.lookup::<T>(key)?;
        self.entry::<T>(id).map(|entry| entry.current.clone())
    }

    pub(crate) fn state_of<T: Entity>(&self, entity: &T) -> Option<EntityState> {
        let id = self.lookup::<T>(&entity.key()?)?;
        self.entry::<T>(id).map(|entry| entry.state)
    }

    /// Key of an entry, including one assigned by the store on commit
    pub(crate) fn current_key<T: Entity>(&self, id: u64) -> Option<T::Key> {
        self.entry::<T>(id)?.current.key()
    }

    pub(crate) fn has_changes(&self) -> bool {
        self.entries
            .values()
            .any(|entry| entry.state() != EntityState::Unchanged)
    }

    /// Write commands for staged entries, in the order they were first staged
    ///
    /// With `only`, commands are limited to the listed entries.
    pub(crate) fn pending(&self, only: Option<&[u64]>) -> Vec<WriteCommand> {
        let mut staged: Vec<(u64, u64)> = self
            .entries
            .iter()
            .filter(|(id, _)| only.map_or(true, |only| only.contains(*id)))
            .filter_map(|(id, entry)| entry.staged_at().map(|at| (at, *id)))
            .collect();
        staged.sort_unstable();
        staged
            .into_iter()
            .filter_map(|(_, id)| self.entries.get(&id)?.command(id))
            .collect()
    }

    /// Marks the committed entries as matching the store
    pub(crate) fn accept(&mut self, committed: &[u64], mut generated: HashMap<u64, Value>) {
        for id in committed {
            let Some(entry) = self.entries.get_mut(id) else {
                continue;
            };
            if entry.state() == EntityState::Deleted {
                self.forget(*id);
                continue;
            }
            entry.accept(generated.remove(id));
            if let Some(identity) = entry.identity() {
                self.index.insert(identity, *id);
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

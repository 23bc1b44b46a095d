//! Records: typed attribute bags with lifecycle and dirty tracking.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::attribute::AttributeType;
use crate::connection::TabularRow;
use crate::error::{MapError, MapResult};
use crate::value::Value;

/// Persistence state of a [`Record`].
///
/// `New` → `Stored` after a successful insert; `Stored` stays `Stored`
/// across updates; `Stored` → `Deleted` after a successful delete.
/// `Deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    New,
    Stored,
    Deleted,
}

/// The shape of a record: ordered attribute descriptors plus the ordered
/// identifying attribute names (defaulting to `id`).
#[derive(Debug)]
pub struct RecordType {
    attributes: Vec<(String, AttributeType)>,
    identity: Vec<String>,
}

impl RecordType {
    pub fn new() -> Self {
        Self {
            attributes: Vec::new(),
            identity: vec!["id".to_string()],
        }
    }

    /// Declare an attribute, chainable. Declaration order is the emission
    /// order for column lists.
    pub fn attribute(mut self, name: &str, ty: AttributeType) -> Self {
        self.attributes.push((name.to_string(), ty));
        self
    }

    /// Replace the identifying attribute names.
    pub fn identity(mut self, names: &[&str]) -> Self {
        self.identity = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(name, _)| name.as_str())
    }

    pub fn identifying_attribute_names(&self) -> &[String] {
        &self.identity
    }

    pub fn attribute_type(&self, name: &str) -> Option<&AttributeType> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ty)| ty)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute_type(name).is_some()
    }
}

impl Default for RecordType {
    fn default() -> Self {
        Self::new()
    }
}

/// A typed bag of attribute values owned by the caller and mutated in place
/// by repository operations.
///
/// `values` holds only initialized attributes; `baseline` is the last known
/// persisted value per attribute, and `dirty` only ever contains names
/// whose current value differs from that baseline.
#[derive(Debug, Clone)]
pub struct Record {
    ty: Arc<RecordType>,
    values: BTreeMap<String, Value>,
    baseline: BTreeMap<String, Value>,
    dirty: BTreeSet<String>,
    lifecycle: Lifecycle,
}

impl Record {
    /// Create a new (unpersisted) record. Constructor-provided values are
    /// coerced through their attribute types and form the clean baseline:
    /// nothing starts dirty, since there is no prior persisted state to
    /// diverge from.
    pub fn new<'a, I>(ty: Arc<RecordType>, initial: I) -> MapResult<Self>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut record = Self {
            ty,
            values: BTreeMap::new(),
            baseline: BTreeMap::new(),
            dirty: BTreeSet::new(),
            lifecycle: Lifecycle::New,
        };
        for (name, value) in initial {
            let loaded = record.load(name, value)?;
            record.values.insert(name.to_string(), loaded.clone());
            record.baseline.insert(name.to_string(), loaded);
        }
        Ok(record)
    }

    /// Hydrate a record from a result row; lifecycle starts at `Stored`.
    pub fn hydrate(ty: Arc<RecordType>, row: &TabularRow) -> MapResult<Self> {
        let mut record = Self::new(ty, std::iter::empty())?;
        for (name, value) in row.iter() {
            if !record.ty.has_attribute(name) {
                continue;
            }
            let loaded = record.load(name, value.clone())?;
            record.values.insert(name.to_string(), loaded.clone());
            record.baseline.insert(name.to_string(), loaded);
        }
        record.lifecycle = Lifecycle::Stored;
        Ok(record)
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Set an attribute, coercing through its type. The name turns dirty
    /// only if the coerced value differs from the baseline; setting an
    /// unchanged value is a no-op, and setting back to the baseline value
    /// clears the dirty mark.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> MapResult<()> {
        let loaded = self.load(name, value.into())?;
        if self.baseline.get(name) == Some(&loaded) {
            self.dirty.remove(name);
        } else {
            self.dirty.insert(name.to_string());
        }
        self.values.insert(name.to_string(), loaded);
        Ok(())
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_new(&self) -> bool {
        self.lifecycle == Lifecycle::New
    }

    pub fn is_stored(&self) -> bool {
        self.lifecycle == Lifecycle::Stored
    }

    pub fn is_deleted(&self) -> bool {
        self.lifecycle == Lifecycle::Deleted
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Dirty attribute names in declaration order.
    pub fn dirty_names(&self) -> Vec<&str> {
        self.ty
            .attributes
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| self.dirty.contains(*name))
            .collect()
    }

    /// Initialized (name, value) pairs in declaration order.
    pub fn initialized(&self) -> Vec<(&str, &Value)> {
        self.ty
            .attributes
            .iter()
            .filter_map(|(name, _)| self.values.get(name).map(|v| (name.as_str(), v)))
            .collect()
    }

    /// Identifying (name, value) pairs; an uninitialized key attribute
    /// contributes a null.
    pub fn identity_values(&self) -> Vec<(&str, Value)> {
        self.ty
            .identity
            .iter()
            .map(|name| {
                (
                    name.as_str(),
                    self.values.get(name).cloned().unwrap_or(Value::Null),
                )
            })
            .collect()
    }

    /// Flip to `Stored`, adopt current values as the persisted baseline,
    /// and clear all dirty marks.
    pub fn mark_stored(&mut self) {
        self.lifecycle = Lifecycle::Stored;
        self.baseline = self.values.clone();
        self.dirty.clear();
    }

    /// Flip to `Deleted`. Terminal.
    pub fn mark_deleted(&mut self) {
        self.lifecycle = Lifecycle::Deleted;
    }

    /// Apply a server response row onto this record: every returned column
    /// that names a known attribute is loaded and overwrites both the value
    /// and the baseline, without marking anything dirty. Returns the names
    /// whose values actually changed.
    ///
    /// Loading happens for the whole row before anything is applied, so a
    /// row that fails to load leaves the record untouched.
    pub fn apply_returned(&mut self, row: &TabularRow) -> MapResult<Vec<String>> {
        let loaded = self.load_row(row)?;
        Ok(self.apply_loaded(loaded))
    }

    /// Load every applicable column of a row through this record's
    /// attribute types, without mutating the record.
    pub(crate) fn load_row(&self, row: &TabularRow) -> MapResult<Vec<(String, Value)>> {
        let mut loaded = Vec::new();
        for (name, value) in row.iter() {
            if !self.ty.has_attribute(name) {
                continue;
            }
            loaded.push((name.to_string(), self.load(name, value.clone())?));
        }
        Ok(loaded)
    }

    pub(crate) fn apply_loaded(&mut self, loaded: Vec<(String, Value)>) -> Vec<String> {
        let mut changed = Vec::new();
        for (name, value) in loaded {
            if self.values.get(&name) != Some(&value) {
                changed.push(name.clone());
            }
            self.dirty.remove(&name);
            self.baseline.insert(name.clone(), value.clone());
            self.values.insert(name, value);
        }
        changed
    }

    fn load(&self, name: &str, value: Value) -> MapResult<Value> {
        let ty = self
            .ty
            .attribute_type(name)
            .ok_or_else(|| MapError::UnknownAttribute(name.to_string()))?;
        ty.load(value)
    }
}

//! The namespace tree scripts resolve factories through.
//!
//! Dotted schema names become nested namespaces: `"fx.delay"` is a factory
//! named `delay` inside the namespace `fx`. A path segment can be a module
//! or a namespace, never both.

use std::collections::BTreeMap;

use crate::error::DslError;
use crate::factory::Factory;

/// One entry in a namespace: a callable factory or a nested namespace.
#[derive(Debug, Clone)]
pub enum NamespaceEntry {
    /// A module factory.
    Factory(Factory),
    /// A nested namespace.
    Namespace(Namespace),
}

/// A level of the factory name tree.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    entries: BTreeMap<String, NamespaceEntry>,
}

impl Namespace {
    /// Inserts a factory under its (possibly dotted) schema name.
    ///
    /// Fails when a path segment is already used the other way:
    /// [`DslError::ModuleNameCollision`] when a prefix segment is already a
    /// factory, [`DslError::NamespaceCollision`] when the leaf name is
    /// already a namespace.
    pub fn insert(&mut self, name: &str, factory: Factory) -> Result<(), DslError> {
        match name.split_once('.') {
            None => match self.entries.get(name) {
                Some(NamespaceEntry::Namespace(_)) => Err(DslError::NamespaceCollision {
                    path: name.to_string(),
                }),
                Some(NamespaceEntry::Factory(_)) => Err(DslError::ModuleNameCollision {
                    path: name.to_string(),
                }),
                None => {
                    self.entries
                        .insert(name.to_string(), NamespaceEntry::Factory(factory));
                    Ok(())
                }
            },
            Some((head, rest)) => {
                let entry = self
                    .entries
                    .entry(head.to_string())
                    .or_insert_with(|| NamespaceEntry::Namespace(Namespace::default()));
                match entry {
                    NamespaceEntry::Namespace(inner) => inner.insert(rest, factory),
                    NamespaceEntry::Factory(_) => Err(DslError::ModuleNameCollision {
                        path: head.to_string(),
                    }),
                }
            }
        }
    }

    /// Resolves one entry by name (single segment).
    pub fn get(&self, name: &str) -> Option<&NamespaceEntry> {
        self.entries.get(name)
    }

    /// Resolves a factory by dotted path.
    pub fn factory(&self, path: &str) -> Option<&Factory> {
        match path.split_once('.') {
            None => match self.entries.get(path) {
                Some(NamespaceEntry::Factory(f)) => Some(f),
                _ => None,
            },
            Some((head, rest)) => match self.entries.get(head) {
                Some(NamespaceEntry::Namespace(inner)) => inner.factory(rest),
                _ => None,
            },
        }
    }

    /// Iterates over this level's entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NamespaceEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries at this level.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when this level has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Entity type registry and dispatch-table cache
//!
//! [`EntityTypes`] owns every registered [`EntityTypeDecl`] and the
//! dispatch table resolved for each of them. A table is built the first time
//! a type is used: all methods (own and inherited) are run through every
//! resolver, every method must be claimed by exactly one of them, and the
//! result is cached for the lifetime of the registry.

use crate::decl::{EntityTypeDecl, MethodKey, MethodSig};
use crate::error::{ConfigError, MethodProblem, ProblemKind, Result};
use crate::functions::{resolvers, EntityMethod};
use crate::proxy::EntityProxy;
use dashmap::DashMap;
use indexmap::{IndexMap, IndexSet};
use jalse_entity::{Entity, EntityContainer, EntityId, EntityTypeId};
use log::debug;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Resolved methods of one entity type
pub struct DispatchTable {
    ty: EntityTypeId,
    ancestors: Vec<EntityTypeId>,
    methods: IndexMap<MethodKey, Arc<dyn EntityMethod>>,
}

impl DispatchTable {
    pub fn entity_type(&self) -> &EntityTypeId {
        &self.ty
    }

    /// Every type this one inherits from, directly or not
    pub fn ancestors(&self) -> &[EntityTypeId] {
        &self.ancestors
    }

    pub fn get(&self, key: &MethodKey) -> Option<&Arc<dyn EntityMethod>> {
        self.methods.get(key)
    }

    /// Methods in declaration order, inherited ones first
    pub fn methods(&self) -> impl Iterator<Item = (&MethodKey, &Arc<dyn EntityMethod>)> {
        self.methods.iter()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Entity types referenced by any method
    pub fn dependencies(&self) -> IndexSet<EntityTypeId> {
        self.methods
            .values()
            .flat_map(|m| m.dependencies())
            .collect()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("ty", &self.ty)
            .field("ancestors", &self.ancestors)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Default)]
struct Registry {
    decls: RwLock<IndexMap<EntityTypeId, Arc<EntityTypeDecl>>>,
    tables: DashMap<EntityTypeId, Arc<DispatchTable>>,
}

/// Registry of entity types and their resolved dispatch tables
///
/// Cloning is cheap; clones share the registry and the cache.
#[derive(Clone, Default)]
pub struct EntityTypes {
    inner: Arc<Registry>,
}

impl EntityTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration
    ///
    /// Parents need not be registered yet; they must be by the time the type
    /// is resolved.
    pub fn register(&self, decl: EntityTypeDecl) -> Result<()> {
        let mut decls = self.inner.decls.write();
        if decls.contains_key(decl.id()) {
            return Err(ConfigError::AlreadyRegistered(decl.id().clone()).into());
        }
        debug!("registered entity type {}", decl.id());
        decls.insert(decl.id().clone(), Arc::new(decl));
        Ok(())
    }

    pub fn is_registered(&self, ty: &EntityTypeId) -> bool {
        self.inner.decls.read().contains_key(ty)
    }

    pub fn declaration(&self, ty: &EntityTypeId) -> Option<Arc<EntityTypeDecl>> {
        self.inner.decls.read().get(ty).cloned()
    }

    /// Registered type ids, in registration order
    pub fn registered(&self) -> Vec<EntityTypeId> {
        self.inner.decls.read().keys().cloned().collect()
    }

    /// True once `ty` has a cached dispatch table
    pub fn is_resolved(&self, ty: &EntityTypeId) -> bool {
        self.inner.tables.contains_key(ty)
    }

    fn lookup(&self, ty: &EntityTypeId) -> Result<Arc<EntityTypeDecl>> {
        self.declaration(ty)
            .ok_or_else(|| ConfigError::UnknownType(ty.clone()).into())
    }

    /// Every ancestor of `ty`, depth-first in declaration order
    pub fn ancestors(&self, ty: &EntityTypeId) -> Result<Vec<EntityTypeId>> {
        let mut found = IndexSet::new();
        let mut path = vec![ty.clone()];
        self.visit_ancestors(ty, &mut path, &mut found)?;
        Ok(found.into_iter().collect())
    }

    fn visit_ancestors(
        &self,
        ty: &EntityTypeId,
        path: &mut Vec<EntityTypeId>,
        found: &mut IndexSet<EntityTypeId>,
    ) -> Result<()> {
        let decl = self.lookup(ty)?;
        for parent in decl.parents() {
            if path.contains(parent) {
                path.push(parent.clone());
                return Err(ConfigError::CyclicInheritance(path.clone()).into());
            }
            found.insert(parent.clone());
            path.push(parent.clone());
            self.visit_ancestors(parent, path, found)?;
            path.pop();
        }
        Ok(())
    }

    /// All methods of `ty`, inherited ones first; overrides replace in place
    fn collect_methods(
        &self,
        ty: &EntityTypeId,
        visited: &mut IndexSet<EntityTypeId>,
        methods: &mut IndexMap<MethodKey, MethodSig>,
    ) -> Result<()> {
        if !visited.insert(ty.clone()) {
            return Ok(());
        }
        let decl = self.lookup(ty)?;
        for parent in decl.parents() {
            self.collect_methods(parent, visited, methods)?;
        }
        for method in decl.methods() {
            methods.insert(method.key(), method.clone());
        }
        Ok(())
    }

    /// Resolve the dispatch table of `ty`, building it on first use
    pub fn resolve(&self, ty: &EntityTypeId) -> Result<Arc<DispatchTable>> {
        if let Some(table) = self.inner.tables.get(ty) {
            return Ok(table.value().clone());
        }
        let table = Arc::new(self.build(ty)?);
        // Concurrent builders produce equal tables; the first one is kept.
        let table = self
            .inner
            .tables
            .entry(ty.clone())
            .or_insert(table)
            .value()
            .clone();
        debug!("resolved entity type {} ({} methods)", ty, table.len());
        Ok(table)
    }

    fn build(&self, ty: &EntityTypeId) -> Result<DispatchTable> {
        let ancestors = self.ancestors(ty)?;
        let mut sigs = IndexMap::new();
        self.collect_methods(ty, &mut IndexSet::new(), &mut sigs)?;

        let mut methods = IndexMap::new();
        let mut problems = Vec::new();
        for (key, sig) in sigs {
            let mut claims = Vec::new();
            let mut invalid = None;
            for resolver in resolvers() {
                match resolver.apply(&sig) {
                    Ok(Some(method)) => claims.push((resolver.name(), method)),
                    Ok(None) => {}
                    Err(error) => {
                        invalid.get_or_insert((resolver.name(), error));
                    }
                }
            }
            let kind = match (invalid, claims.len()) {
                (Some((resolver, error)), _) => ProblemKind::Invalid { resolver, error },
                (None, 0) => ProblemKind::Unclaimed,
                (None, 1) => {
                    let Some((_, method)) = claims.pop() else {
                        continue;
                    };
                    match method
                        .dependencies()
                        .into_iter()
                        .find(|dep| !self.is_registered(dep))
                    {
                        Some(missing) => ProblemKind::UnknownType(missing),
                        None => {
                            methods.insert(key, method);
                            continue;
                        }
                    }
                }
                (None, _) => ProblemKind::Ambiguous(claims.iter().map(|(n, _)| *n).collect()),
            };
            problems.push(MethodProblem { method: key, kind });
        }

        if !problems.is_empty() {
            return Err(ConfigError::InvalidMethods {
                ty: ty.clone(),
                problems,
            }
            .into());
        }
        Ok(DispatchTable {
            ty: ty.clone(),
            ancestors,
            methods,
        })
    }

    /// Resolve `ty` and every type reachable through its methods
    ///
    /// Returns the validated types in the order they were resolved.
    pub fn validate_tree(&self, ty: &EntityTypeId) -> Result<Vec<EntityTypeId>> {
        let mut seen = IndexSet::new();
        let mut queue = VecDeque::from([ty.clone()]);
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next.clone()) {
                continue;
            }
            let table = self.resolve(&next)?;
            queue.extend(
                table
                    .dependencies()
                    .into_iter()
                    .filter(|dep| !seen.contains(dep)),
            );
        }
        Ok(seen.into_iter().collect())
    }

    /// View `entity` as `ty`
    ///
    /// The entity does not have to be marked as the type.
    pub fn as_type(&self, entity: &Entity, ty: &EntityTypeId) -> Result<EntityProxy> {
        let table = self.resolve(ty)?;
        Ok(EntityProxy::new(entity.clone(), table, self.clone()))
    }

    /// Look up a direct child of `container` and view it as `ty`
    pub fn get_entity_as_type<C>(
        &self,
        container: &C,
        id: EntityId,
        ty: &EntityTypeId,
    ) -> Result<Option<EntityProxy>>
    where
        C: EntityContainer + ?Sized,
    {
        container
            .get_entity(id)
            .map(|entity| self.as_type(&entity, ty))
            .transpose()
    }

    /// Direct children of `container` marked as `ty`, viewed as `ty`
    pub fn entities_as_type<C>(&self, container: &C, ty: &EntityTypeId) -> Result<Vec<EntityProxy>>
    where
        C: EntityContainer + ?Sized,
    {
        container
            .entities_of_type(ty)
            .iter()
            .map(|entity| self.as_type(entity, ty))
            .collect()
    }

    /// Mark `entity` as `ty` and every ancestor of `ty`
    ///
    /// Returns `true` if `ty` itself was not marked before.
    pub fn mark_as_type(&self, entity: &Entity, ty: &EntityTypeId) -> Result<bool> {
        let ancestors = self.ancestors(ty)?;
        let added = entity.add_mark(ty.clone());
        for ancestor in ancestors {
            entity.add_mark(ancestor);
        }
        Ok(added)
    }

    /// Remove the `ty` mark and the marks of every type descending from `ty`
    ///
    /// Marks of unregistered types are left alone. Returns `true` if `ty`
    /// was marked.
    pub fn unmark_as_type(&self, entity: &Entity, ty: &EntityTypeId) -> Result<bool> {
        self.lookup(ty)?;
        let removed = entity.remove_mark(ty);
        for mark in entity.marks() {
            let descends = self
                .ancestors(&mark)
                .map(|ancestors| ancestors.contains(ty))
                .unwrap_or(false);
            if descends {
                entity.remove_mark(&mark);
            }
        }
        Ok(removed)
    }

    /// True if `entity` is marked as `ty`
    pub fn is_marked_as_type(&self, entity: &Entity, ty: &EntityTypeId) -> bool {
        entity.is_marked_as(ty)
    }
}

impl fmt::Debug for EntityTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityTypes")
            .field("registered", &self.registered())
            .field("resolved", &self.inner.tables.len())
            .finish()
    }
}

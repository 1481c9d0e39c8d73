use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};

use crate::{any::TypeInfo, binding::Binding};

#[derive(Default)]
struct Tables {
    by_service: BTreeMap<TypeInfo, Vec<Arc<Binding>>>,
    /// Auto-bindable bindings in registration order
    auto_bindable: Vec<Arc<Binding>>,
}

/// Bindings by service, each list in registration order.
#[derive(Default)]
pub struct Registry {
    tables: RwLock<Tables>,
}

impl Registry {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, binding: Binding) -> Arc<Binding> {
        let binding = Arc::new(binding);
        let mut tables = self.tables.write();
        if binding.auto_bindable {
            tables.auto_bindable.push(binding.clone());
        }
        tables.by_service.entry(binding.service).or_default().push(binding.clone());
        binding
    }

    /// Registers implicit bindings for a service unless an implicit binding is already there.
    /// Racing callers end up sharing the bindings registered first.
    pub(crate) fn add_missing(&self, service: TypeInfo, bindings: Vec<Binding>) -> Vec<Arc<Binding>> {
        let mut tables = self.tables.write();
        let registered = tables.by_service.entry(service).or_default();

        let existing: Vec<Arc<Binding>> = registered.iter().filter(|binding| binding.implicit).cloned().collect();
        if !existing.is_empty() {
            return existing;
        }

        let bindings: Vec<Arc<Binding>> = bindings.into_iter().map(Arc::new).collect();
        registered.extend(bindings.iter().cloned());
        bindings
    }

    #[must_use]
    pub fn get(&self, service: &TypeInfo) -> Vec<Arc<Binding>> {
        self.tables.read().by_service.get(service).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn auto_bindable(&self) -> Vec<Arc<Binding>> {
        self.tables.read().auto_bindable.clone()
    }

    /// Removes every binding of a service, returning them.
    pub fn remove(&self, service: &TypeInfo) -> Vec<Arc<Binding>> {
        let mut tables = self.tables.write();
        let removed = tables.by_service.remove(service).unwrap_or_default();
        tables.auto_bindable.retain(|binding| binding.service != *service);
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.read().by_service.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

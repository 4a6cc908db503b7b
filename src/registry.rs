//! Process-wide service registry ("phonebook").
//!
//! Topics carry data; the registry carries capabilities (clocks, loggers,
//! the pose predictor, a GUID generator). Keeping them separate lets plugins
//! discover each other by interface rather than by name, and lets tests swap
//! in fakes without rewiring the bus.

use std::any::{Any, TypeId};
use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;

use crate::error::{CoreError, CoreResult};

/// Marker trait for anything that can be registered in a [`PhoneBook`].
///
/// Mirrors the source's `phonebook::service`: no required methods, just a
/// stable vtable the registry can store behind `Arc<dyn Any + Send + Sync>`
/// and later downcast back to its concrete type.
pub trait Service: Any + Send + Sync {}

/// A process-wide, type-indexed map from service interface to implementation.
///
/// Registration is exclusive and expected only during startup; lookup is
/// shared and is the steady-state path. Both are safe to call from any
/// thread.
#[derive(Default)]
pub struct PhoneBook {
    registry: RwLock<FxHashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl PhoneBook {
    /// Construct an empty registry.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(FxHashMap::default()),
        }
    }

    /// Register `impl_` as the implementation of service interface `T`.
    ///
    /// Fails with [`CoreError::RegistrationConflict`] if `T` is already
    /// registered; this is a startup-fatal condition, so most callers should
    /// use [`PhoneBook::register`] instead, which panics.
    pub fn try_register<T: Service>(&self, impl_: Arc<T>) -> CoreResult<()> {
        let mut registry = self.registry.write().expect("phonebook lock poisoned");
        let type_id = TypeId::of::<T>();
        if registry.contains_key(&type_id) {
            return Err(CoreError::RegistrationConflict(std::any::type_name::<T>()));
        }
        registry.insert(type_id, impl_);
        Ok(())
    }

    /// Register `impl_`, panicking on a duplicate registration.
    #[track_caller]
    pub fn register<T: Service>(&self, impl_: Arc<T>) {
        if let Err(e) = self.try_register(impl_) {
            e.panic();
        }
    }

    /// Look up the implementation of service interface `T`.
    ///
    /// Fails with [`CoreError::LookupMiss`] if nothing has registered `T`
    /// yet; callers are expected to look up services before their first use.
    pub fn try_lookup<T: Service>(&self) -> CoreResult<Arc<T>> {
        let registry = self.registry.read().expect("phonebook lock poisoned");
        let type_id = TypeId::of::<T>();
        registry
            .get(&type_id)
            .cloned()
            .and_then(|svc| svc.downcast::<T>().ok())
            .ok_or(CoreError::LookupMiss(std::any::type_name::<T>()))
    }

    /// Look up the implementation of service interface `T`, panicking if
    /// none is registered.
    #[track_caller]
    pub fn lookup<T: Service>(&self) -> Arc<T> {
        self.try_lookup().unwrap_or_else(|e| e.panic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha(u32);
    impl Service for Alpha {}

    struct Beta;
    impl Service for Beta {}

    #[test]
    fn lookup_returns_registered_service() {
        let pb = PhoneBook::new();
        pb.register(Arc::new(Alpha(42)));
        let alpha = pb.lookup::<Alpha>();
        assert_eq!(alpha.0, 42);
    }

    #[test]
    fn lookup_miss_is_reported_not_panicked() {
        let pb = PhoneBook::new();
        assert!(matches!(pb.try_lookup::<Beta>(), Err(CoreError::LookupMiss(_))));
    }

    #[test]
    fn duplicate_registration_conflicts() {
        let pb = PhoneBook::new();
        pb.register(Arc::new(Alpha(1)));
        let err = pb.try_register(Arc::new(Alpha(2))).unwrap_err();
        assert!(matches!(err, CoreError::RegistrationConflict(_)));
    }

    #[test]
    fn distinct_services_coexist() {
        let pb = PhoneBook::new();
        pb.register(Arc::new(Alpha(7)));
        pb.register(Arc::new(Beta));
        assert_eq!(pb.lookup::<Alpha>().0, 7);
        let _ = pb.lookup::<Beta>();
    }
}

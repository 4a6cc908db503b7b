//! The base every plugin builds on: a name, a GUID-drawn id, and
//! back-pointers to the registry it discovers its collaborators through.

use std::sync::Arc;

use crate::guid::GenGuid;
use crate::record::RecordLogger;
use crate::registry::PhoneBook;

/// Namespace used for plugin ids themselves, distinct from the namespace a
/// plugin might use to mint ids for its own subscriptions.
pub const PLUGIN_ID_NAMESPACE: u64 = 1;

/// Common state every plugin carries: a human-readable name, a
/// process-unique numeric id, and handles to the two services every plugin
/// needs regardless of what it otherwise does (§4.9).
///
/// `Plugin` itself builds only inert state; it does not start any thread.
/// Plugins that run their own loop wrap a [`crate::thread::threadloop::Threadloop`]
/// around one of these; plugins that only react to events call
/// `switchboard.schedule` in their own constructor, after constructing this
/// base, and never derive from threadloop at all.
pub struct Plugin {
    name: String,
    id: u64,
    phonebook: Arc<PhoneBook>,
}

impl Plugin {
    /// Build the base: mint an id, record the registry back-pointer, and
    /// emit the "plugin start" record. Services this plugin itself provides
    /// should be registered by the caller immediately after this returns,
    /// before the plugin is handed to anything else.
    pub fn new(name: impl Into<String>, phonebook: Arc<PhoneBook>) -> Self {
        let name = name.into();
        let guid = phonebook.lookup::<GenGuid>();
        let id = guid.get(PLUGIN_ID_NAMESPACE, 0);

        if let Ok(logger) = phonebook.try_lookup::<RecordLogger>() {
            logger.log_plugin_start(id, &name);
        }

        Self { name, id, phonebook }
    }

    /// This plugin's human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This plugin's process-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The registry this plugin was constructed against.
    pub fn phonebook(&self) -> &Arc<PhoneBook> {
        &self.phonebook
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::GenGuid;

    fn registry_with_guid() -> Arc<PhoneBook> {
        let pb = Arc::new(PhoneBook::new());
        pb.register(Arc::new(GenGuid::new()));
        pb
    }

    #[test]
    fn two_plugins_against_the_same_registry_get_distinct_ids() {
        let pb = registry_with_guid();
        let a = Plugin::new("a", Arc::clone(&pb));
        let b = Plugin::new("b", Arc::clone(&pb));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.name(), "a");
        assert_eq!(b.name(), "b");
    }

    #[test]
    fn plugin_start_without_a_record_logger_registered_does_not_panic() {
        let pb = registry_with_guid();
        let _plugin = Plugin::new("solo", pb);
    }

    #[test]
    fn plugin_start_with_a_record_logger_registered_does_not_panic() {
        let pb = registry_with_guid();
        pb.register(Arc::new(RecordLogger::new()));
        let _plugin = Plugin::new("logged", pb);
    }
}

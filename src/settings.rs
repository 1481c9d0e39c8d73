use core::time::Duration;

use crate::member::Marker;

/// Global settings read by the engine
/// ## Fields
/// - `inject_marker`:
///   Marker designating members to inject. On a constructor it marks the preferred one.
/// - `inject_non_public`:
///   If `true`, non-public constructors, properties and methods are injection candidates.
/// - `inject_parent_private_members`:
///   If `true`, private members inherited from a base are injection candidates.
/// - `property_injection`, `method_injection`:
///   Toggle the corresponding injection kinds. Constructor injection is always enabled.
/// - `activation_cache_disabled`:
///   If `true`, instances reached several times are activated (and deactivated) every time.
/// - `allow_null_injection`:
///   If `true`, a provider returning nothing yields an absent value instead of an error.
/// - `cache_pruning_interval`:
///   Tick of the background pruner. `None` disables it, pruning then only happens on demand.
/// - `serialize_scoped_construction`:
///   If `true`, a scoped instance is constructed at most once per scope even under concurrent first access.
#[derive(Clone, Debug)]
pub struct Settings {
    pub inject_marker: Marker,
    pub inject_non_public: bool,
    pub inject_parent_private_members: bool,
    pub property_injection: bool,
    pub method_injection: bool,
    pub activation_cache_disabled: bool,
    pub allow_null_injection: bool,
    pub cache_pruning_interval: Option<Duration>,
    pub serialize_scoped_construction: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inject_marker: Marker::INJECT,
            inject_non_public: false,
            inject_parent_private_members: false,
            property_injection: true,
            method_injection: true,
            activation_cache_disabled: false,
            allow_null_injection: false,
            cache_pruning_interval: Some(Duration::from_secs(30)),
            serialize_scoped_construction: true,
        }
    }
}

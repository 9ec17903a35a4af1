//! Resource version propagation into caller-visible values.
//!
//! Backends assign a version on every write. Adapters that know it call
//! [`Versioned::set_resource_version`] on each decoded value, so callers see
//! the version without inspecting raw responses. Propagation never fails:
//! types that cannot carry a version keep the default no-op.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Reserved key under which generic mappings receive the version.
pub const VERSION_KEY: &str = "_version";

pub trait Versioned {
    fn set_resource_version(&mut self, _version: i64) {}
}

impl Versioned for Value {
    fn set_resource_version(&mut self, version: i64) {
        if let Value::Object(map) = self {
            map.insert(VERSION_KEY.to_string(), Value::from(version));
        }
    }
}

impl Versioned for Map<String, Value> {
    fn set_resource_version(&mut self, version: i64) {
        self.insert(VERSION_KEY.to_string(), Value::from(version));
    }
}

impl Versioned for HashMap<String, Value> {
    fn set_resource_version(&mut self, version: i64) {
        self.insert(VERSION_KEY.to_string(), Value::from(version));
    }
}

impl Versioned for BTreeMap<String, Value> {
    fn set_resource_version(&mut self, version: i64) {
        self.insert(VERSION_KEY.to_string(), Value::from(version));
    }
}

// String maps carry the version in its decimal form.
impl Versioned for HashMap<String, String> {
    fn set_resource_version(&mut self, version: i64) {
        self.insert(VERSION_KEY.to_string(), version.to_string());
    }
}

impl<T: Versioned> Versioned for Box<T> {
    fn set_resource_version(&mut self, version: i64) {
        (**self).set_resource_version(version)
    }
}

/// A record field able to hold a resource version.
pub trait VersionField {
    fn assign_version(&mut self, version: i64);
}

impl VersionField for i64 {
    fn assign_version(&mut self, version: i64) {
        *self = version;
    }
}

impl VersionField for i32 {
    fn assign_version(&mut self, version: i64) {
        if let Ok(v) = i32::try_from(version) {
            *self = v;
        }
    }
}

impl VersionField for u64 {
    fn assign_version(&mut self, version: i64) {
        if let Ok(v) = u64::try_from(version) {
            *self = v;
        }
    }
}

impl VersionField for String {
    fn assign_version(&mut self, version: i64) {
        *self = version.to_string();
    }
}

impl<F: VersionField + Default> VersionField for Option<F> {
    fn assign_version(&mut self, version: i64) {
        self.get_or_insert_with(F::default).assign_version(version);
    }
}

/// Implements [`Versioned`] for a record.
///
/// `impl_versioned!(Task => resource_version)` writes the version into the
/// named field; `impl_versioned!(Blob)` declares a record without one.
#[macro_export]
macro_rules! impl_versioned {
    ($ty:ty => $field:ident) => {
        impl $crate::core::version::Versioned for $ty {
            fn set_resource_version(&mut self, version: i64) {
                $crate::core::version::VersionField::assign_version(&mut self.$field, version);
            }
        }
    };
    ($ty:ty) => {
        impl $crate::core::version::Versioned for $ty {}
    };
}

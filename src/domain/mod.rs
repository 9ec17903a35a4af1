// Domain layer: key scheme, data model and the storage port.

pub mod key;
pub mod model;
pub mod ports;

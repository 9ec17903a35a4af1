// Adapters layer: concrete backends behind the `Storage` port.

pub mod object;
pub mod search;

// Domain layer: identifiers, artifacts and the ports the runner talks through.

pub mod model;
pub mod ports;

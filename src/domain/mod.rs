// Domain layer: marker data model and the ports the relocation engine talks through.

pub mod model;
pub mod ports;

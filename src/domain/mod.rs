// Domain layer: the connector capability set every vendor client implements.

pub mod ports;

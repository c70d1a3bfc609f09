pub mod connections;
pub mod monitor;
pub mod observer;
pub mod random;
pub mod sequence_machine;
pub mod temporal_memory;
pub mod topology;

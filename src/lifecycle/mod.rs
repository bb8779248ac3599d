//! Process lifecycle helpers for the replay tool

mod shutdown;

pub use shutdown::ShutdownSignal;

pub mod aggregator_core;
pub mod config;
pub mod runtime;
pub mod sink_core;
pub mod streamer_core;

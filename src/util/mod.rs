//! Shared utilities: aligned IO buffers and fast monotonic timing

pub mod buffer;
pub mod fast_time;

//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of the server.
//!
//! # Tasks
//! - Memory pressure: sweeps loaded images whenever the host signals pressure

mod pressure;

pub use pressure::{spawn_pressure_task, MemoryPressure, MemoryPressureMonitor};

//! qirt Resource Estimation
//!
//! Drivers that run a compiled program without executing it, and report
//! what running it would cost.
//!
//! # Overview
//!
//! - **Layering**: the [`Tracer`] packs traced operations into time layers
//!   of a preferred duration, honoring global barriers and the fences of
//!   measurement-conditioned code ([`FenceScope`])
//! - **Metrics**: a per-layer operation count report
//!   ([`Tracer::print_layer_metrics`])
//! - **Intrinsics**: [`qis`] forwards trace calls made on runtime arrays
//! - **Width**: the [`WidthEstimator`] counts gates and estimates how many
//!   qubits the circuit needs
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//!
//! use qirt_hal::Driver;
//! use qirt_tracer::{Tracer, TracerConfig};
//!
//! let config = TracerConfig::load(Some(Path::new("tracer.yaml")))?;
//! let mut tracer = Tracer::with_config(&config);
//! let q = tracer.allocate_qubit()?;
//! tracer.trace_single_qubit_op(1, 1, q)?;
//! print!("{}", tracer.layer_metrics(&config));
//! ```

pub mod config;
pub mod error;
pub mod layer;
pub mod metrics;
pub mod qis;
pub mod tracer;
pub mod width;

pub use config::TracerConfig;
pub use error::{TracerError, TracerResult};
pub use layer::{Duration, Layer, LayerId, OpId, QubitState, Time};
pub use tracer::{FenceScope, Tracer};
pub use width::{OptimizeFor, ResourceStatistics, WidthEstimator};

use qirt_hal::DriverRegistry;

/// Register the resource-estimation drivers as `"tracer"` and `"width"`.
pub fn register_drivers(registry: &mut DriverRegistry) {
    registry.register::<Tracer>("tracer");
    registry.register::<WidthEstimator>("width");
}

//! `harvest-scoring` – Trainee performance metrics.
//!
//! Everything here is driven by the session controller; nothing in this
//! crate reads a clock or touches the transform graph directly.
//!
//! # Modules
//!
//! - [`metrics`] – [`MetricsAccumulator`][metrics::MetricsAccumulator]:
//!   O(1) running min/max of the vessel angle and tool-to-vessel distance plus
//!   the recorded tool-tip trajectory.
//! - [`sampler`] – [`DebounceSampler`][sampler::DebounceSampler]: decouples the
//!   metrics sample rate from the sensor update rate.
//! - [`trajectory`] – ordinary least-squares line fit over the sampled X/Y
//!   coordinates.
//! - [`branch`] – [`BranchSet`][branch::BranchSet]: per-branch `Open → Cut`
//!   state machine.
//! - [`export`] – flat `key,value` dump of a finished session.

pub mod branch;
pub mod config;
pub mod export;
pub mod metrics;
pub mod sampler;
pub mod trajectory;

pub use branch::{BranchCut, BranchSegment, BranchSet, BranchState};
pub use config::ScoringConfig;
pub use export::{export_metrics, metrics_rows};
pub use metrics::MetricsAccumulator;
pub use sampler::DebounceSampler;
pub use trajectory::{LineFit, fit_line};

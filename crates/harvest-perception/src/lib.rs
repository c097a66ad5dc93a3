//! `harvest-perception` – Instrument kinematics.
//!
//! Turns raw tracker poses into the spatial state of the cutting instrument.
//!
//! # Modules
//!
//! - [`transform`] – [`TransformGraph`][transform::TransformGraph]: arena of
//!   named rigid-body frames, each observed by at most one parent, with
//!   synchronous change notification to descendants.
//! - [`geometry`] – angle-between, nearest-vertex and polyline distances used
//!   by both the solver and the scoring layer.
//! - [`kinematics`] – [`JawSolver`][kinematics::JawSolver]: clamp-and-map
//!   from the sensed trigger angle to the hinged jaw transform.

pub mod geometry;
pub mod kinematics;
pub mod transform;

pub use kinematics::{JawSolver, JawSolverConfig, JawState};
pub use transform::{SubscriptionId, TransformGraph};

//! `harvest-runtime` – Session orchestration.
//!
//! Wires the transform graph, the jaw solver and the scoring layer into one
//! synchronous, event-driven pipeline.
//!
//! # Modules
//!
//! - [`assets`] – [`AssetProvider`][assets::AssetProvider]: the external
//!   collaborator that supplies named transforms, meshes and branch sets, plus
//!   [`InMemoryAssets`][assets::InMemoryAssets].
//! - [`scene`] – [`install_scene`][scene::install_scene]: idempotent creation
//!   and chaining of the instrument and anatomy frames.
//! - [`session`] – [`SessionController`][session::SessionController]: owns the
//!   graph and the metrics, gates them with start/stop/reset, and drains graph
//!   change events after every sensor update.
//! - [`config`] – [`TutorConfig`][config::TutorConfig]: every tunable in one
//!   serde bundle.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber setup.

pub mod assets;
pub mod config;
pub mod scene;
pub mod session;
pub mod telemetry;

pub use assets::{AssetProvider, InMemoryAssets, Mesh};
pub use config::TutorConfig;
pub use scene::{SceneConfig, SceneHandles, install_scene};
pub use session::{CycleReport, Metric, SessionController, SessionObserver};
pub use telemetry::{LogFormat, init_tracing};

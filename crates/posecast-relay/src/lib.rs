//! Body-pose broadcast relay server.
//!
//! A single process accepts TCP connections from motion-capture front-ends
//! and viewer clients, ingests per-joint pose updates for tracked bodies,
//! and rebroadcasts the aggregate world state to every connected viewer on
//! fixed timers.
//!
//! Module overview:
//! - `skeleton.rs`:   joint templates for the two skeleton variants.
//! - `registry.rs`:   the set of tracked bodies and their joint trees.
//! - `clients.rs`:    connected-viewer table with stable, reused slots.
//! - `connection.rs`: per-socket read loop and frame dispatch.
//! - `broadcast.rs`:  the pose tick, population tick, and population-event
//!   fan-out tasks.
//! - `server.rs`:     listener, task wiring, and shutdown.
//! - `telemetry.rs`:  tracing subscriber setup.
//!
//! Concurrency model: one tokio task per connection plus three broadcast
//! tasks, sharing the registry and client table behind coarse `RwLock`s.
//! The broadcasters snapshot under the lock and serialize after releasing
//! it; socket writes go through bounded per-client writer queues with a
//! write deadline, so one wedged viewer cannot stall a tick for the rest
//! or accumulate an unbounded backlog.

pub mod broadcast;
pub mod clients;
pub mod connection;
pub mod registry;
pub mod server;
pub mod skeleton;
pub mod telemetry;

pub use clients::{ClientTable, ClientTableError, SlotIndex};
pub use registry::{BodyId, BodyRegistry, BodySnapshot, PopulationEvent, RegistryError};
pub use server::RelayServer;
pub use skeleton::SkeletonVariant;

//! ShockOsc - avatar parameters in, device control out.
//!
//! The game client streams avatar parameters over OSC. Parameters under
//! `ShockOsc/` name a device group and an action; the engine turns them into
//! control commands for the group's devices while enforcing cooldown,
//! hold-time debounce, the kill switch and AFK suppression. Group state is
//! published back to the avatar as feedback parameters.
//!
//! ```text
//! GameConnection ──receive──▶ ingest ──▶ GroupStore ◀── check (20 ms) ──▶ dispatch ──▶ ControlBackend
//!        ▲                                   │
//!        └──────────── publish_feedback (300 ms) ◀─┘
//! ```

pub mod address;
pub mod backend;
pub mod chatbox;
pub mod check;
pub mod dispatch;
pub mod engine;
pub mod feedback;
pub mod group;
pub mod ingest;
pub mod policy;
pub mod registry;
pub mod remote;
pub mod session;
pub mod telemetry;
pub mod transport;
pub mod underscore;

pub use backend::{Control, ControlBackend, DryRunBackend, HttpControlBackend};
pub use check::{CheckOutcome, Suppression};
pub use engine::{Engine, ParamsChanged, SessionFlags};
pub use group::{GroupHandle, GroupStore, ProgramGroup, TriggerMethod};
pub use registry::{ParamValue, ParameterRegistry};
pub use remote::{RemoteControlEvent, RemoteOutcome};
pub use session::Session;
pub use transport::{GameConnection, UdpGameConnection};
pub use underscore::{ConfigCommandError, UnderscoreConfig};

//! Session managers: shell, log, and port-forward. Each owns its own
//! live-stream bookkeeping; `kview_core::Session` is the shared
//! state-machine shape they publish through the Event Fabric.

pub mod logs;
pub mod portforward;
pub mod shell;

pub use logs::LogSessionManager;
pub use portforward::PortForwardManager;
pub use shell::ShellSessionManager;

//! Cadence daemon: dispatch ticks, a socket server for registration and
//! intake requests, log rotation.

mod error;
pub mod external;
pub mod log_rotation;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod services;

pub use error::DaemonError;
pub use external::{CommandDocGenerator, CommandIndexEngine};
pub use protocol::{
    request, request_status, request_stop, send_request, DaemonRequest, DaemonResponse,
};
pub use runtime::{run, run_with, start_blocking};
pub use services::{Services, TickSummary};

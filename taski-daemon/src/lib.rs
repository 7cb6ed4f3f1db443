//! taski daemon: note-save watcher, config reload and the control socket in
//! front of the sync orchestrator.

mod error;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{
    request_log, request_shutdown, request_start, request_status, request_stop, request_sync,
    send_request, DaemonRequest, DaemonResponse,
};
pub use runtime::{run, run_with_vcs, start_blocking};

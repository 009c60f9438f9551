mod limits;
pub mod redirect;
mod server;
pub mod state;

pub use redirect::{REQUEST_DEADLINE, Resolution, ScopeEnd, download_release, resolve_within};
pub use server::{ApiServer, ServeError, router, shutdown_signal};
pub use state::AppState;

mod status;
mod verify;

// Status commands
pub use status::run_status;

// Verify commands
pub use verify::{run_verify, verify_with};

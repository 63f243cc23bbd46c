mod init;
mod spans;

pub use init::init_tracing;
pub use spans::{update_span, warn_if_slow};

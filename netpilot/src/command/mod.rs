//! Input handling for device commands.
//!
//! Everything a caller sends toward a device passes through here first:
//! show commands are validated, configuration payloads are normalized.

mod normalize;
mod validate;

pub use normalize::{ConfigPayload, normalize_config};
pub use validate::validate_show_command;

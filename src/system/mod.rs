//! # System Interaction Layer
//!
//! Boundary between the environment model and the machine it runs on.
//!
//! ## Modules
//!
//! - **`executor`**: Runs external programs. Hosts the sandbox shell that
//!   evaluates variable values with a cleared environment and a timeout.
//! - **`facts`**: Operating system, host and user names, and the values of
//!   the read-only `system` scope derived from them.
//! - **`settings`**: Loads `settings.toml` from the user's config directory.

pub mod executor;
pub mod facts;
pub mod settings;

//! Compile-time configuration.
//!
//! `hci-virt` has some configuration settings that are set at compile time.
//!
//! They can be set in two ways:
//!
//! - Via Cargo features: enable a feature like `<name>-<value>`. `name` must be in lowercase and
//!   use dashes instead of underscores. For example `max-connections-16`. Only a selection of values
//!   is available, check `Cargo.toml` for the list.
//! - Via environment variables at build time: set the variable named `HCI_VIRT_<value>`. For example
//!   `HCI_VIRT_MAX_CONNECTIONS=4 cargo build`. You can also set them in the `[env]` section of `.cargo/config.toml`.
//!   Any value can be set, unlike with Cargo features.
//!
//! Environment variables take precedence over Cargo features. If two Cargo features are enabled for the same setting
//! with different values, compilation fails.

mod raw {
    #![allow(unused)]
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

/// Maximum number of concurrent connections tracked by the translation table.
///
/// Every connection established through the real controller occupies one slot until its
/// disconnection completes. Connections serviced by fake devices never reach the table.
///
/// Default: 32.
pub const MAX_CONNECTIONS: usize = raw::MAX_CONNECTIONS;

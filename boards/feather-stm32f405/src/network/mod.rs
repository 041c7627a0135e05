#![deny(warnings)]
//! Network module
//!
//! - **`config`**: Configuration structs with `Default` implementations
//! - **`error`**: Simple error enum for network operations
//! - **`manager`**: DHCP bring-up and name resolution
//! - **`mqtt`**: Activity digest publisher (`hal_abstractions::Publisher`)
//! - **`sntp`**: SNTP client writing the internal RTC
//! - **`socket`**: Async TCP socket wrapper for embedded-io-async
//! - **`uplink`**: Sample collector stream (`hal_abstractions::Transport`)
//!
//! Everything here runs inside the network task: `Stack` is !Send and
//! never leaves it.

pub mod config;
pub mod error;
pub mod manager;
pub mod mqtt;
pub mod sntp;
pub mod socket;
pub mod uplink;

pub use config::{CollectorConfig, MqttConfig, NetworkConfig, SntpConfig};
pub use error::NetworkError;
pub use mqtt::MqttPublisher;
pub use sntp::SntpClient;
pub use uplink::CollectorUplink;

#![deny(unsafe_code)]
#![deny(warnings)]
//! Network configuration structures

/// SNTP client configuration
#[derive(Debug, Clone)]
pub struct SntpConfig {
    /// NTP servers to try (in order)
    pub servers: &'static [&'static str],
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Number of retry attempts per server
    pub retry_count: usize,
    /// Maximum accepted stratum level (1-15)
    pub max_stratum: u8,
    /// Re-synchronization period in seconds
    pub resync_secs: u64,
    /// Bound on one whole synchronization, across servers and retries
    pub sync_budget_ms: u64,
}

impl Default for SntpConfig {
    fn default() -> Self {
        Self {
            servers: &["pool.ntp.org", "time.google.com", "time.cloudflare.com"],
            timeout_ms: 5000,
            retry_count: 3,
            max_stratum: 3,
            resync_secs: 15 * 60,
            sync_budget_ms: 20_000,
        }
    }
}

/// Sample collector (raw TCP record stream)
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Hostname or dotted IPv4 address
    pub host: &'static str,
    pub port: u16,
    /// Bound on DNS lookup plus TCP handshake
    pub connect_timeout_ms: u64,
    /// Bound on a single record write and on the close-time flush
    pub write_timeout_ms: u64,
    /// Bound on all writes of one pass, counted from the connect
    pub session_timeout_ms: u64,
    /// How often the regular upload pass runs
    pub service_interval_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.1",
            port: 32768,
            connect_timeout_ms: 5000,
            write_timeout_ms: 5000,
            session_timeout_ms: 15_000,
            service_interval_ms: 1000,
        }
    }
}

impl CollectorConfig {
    /// Worst case for one upload pass: connect, the session, one final flush
    pub fn pass_bound_ms(&self) -> u64 {
        self.connect_timeout_ms + self.session_timeout_ms + self.write_timeout_ms
    }
}

/// MQTT broker for the activity digest
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: &'static str,
    pub broker_port: u16,
    pub keep_alive_secs: u16,
    pub clean_start: bool,
    /// Bound on one publish session (DNS, connect, publish)
    pub timeout_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "192.168.1.1",
            broker_port: 1883,
            keep_alive_secs: 60,
            clean_start: true,
            timeout_ms: 5000,
        }
    }
}

/// Network stack configuration
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// MAC address for Ethernet
    pub mac_addr: [u8; 6],
    /// Random seed for network stack
    pub seed: u64,
}

impl NetworkConfig {
    /// Locally administered MAC and stack seed derived from the chip UID
    pub fn from_uid(uid: &[u8; 12]) -> Self {
        let mut mac_addr = [0x02, 0, 0, 0, 0, 0];
        for (i, byte) in uid.iter().enumerate() {
            mac_addr[1 + i % 5] ^= byte;
        }

        let mut seed = 0xcbf2_9ce4_8422_2325_u64;
        for byte in uid {
            seed = (seed ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3);
        }
        Self { mac_addr, seed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_is_locally_administered_unicast() {
        let config = NetworkConfig::from_uid(&[0x5a; 12]);
        assert_eq!(config.mac_addr[0] & 0x03, 0x02);
        assert_ne!(config.seed, NetworkConfig::from_uid(&[0xa5; 12]).seed);
    }

    #[test]
    fn test_collector_pass_bound() {
        let config = CollectorConfig::default();
        assert_eq!(config.pass_bound_ms(), 25_000);
        assert!(SntpConfig::default().sync_budget_ms < 32_000);
    }
}

#![deny(unsafe_code)]
#![deny(warnings)]
//! SNTP client writing the internal RTC

use defmt::{error, info, warn, Debug2Format};
use embassy_futures::select::{select, Either};
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration, Instant, Timer};
use rtic_monotonics::fugit::ExtU64;
use rtic_monotonics::Monotonic;

use crate::time::{write_rtc, Timestamp};
use crate::Mono;

use super::config::SntpConfig;
use super::error::NetworkError;
use super::manager::resolve;

/// SNTP client for time synchronization
pub struct SntpClient {
    config: SntpConfig,
}

impl SntpClient {
    pub fn with_config(config: SntpConfig) -> Self {
        Self { config }
    }

    pub fn resync_period_secs(&self) -> u64 {
        self.config.resync_secs
    }

    /// Upper bound on one [`SntpClient::sync`]
    pub fn sync_bound_ms(&self) -> u64 {
        self.config.sync_budget_ms
    }

    /// Query the configured servers in order and write the first good
    /// answer to the RTC, giving up after the configured budget
    pub async fn sync(&self, stack: &Stack<'static>) -> Result<Timestamp, NetworkError> {
        let budget = Duration::from_millis(self.config.sync_budget_ms);
        match with_timeout(budget, self.query_servers(stack)).await {
            Ok(result) => result,
            Err(_) => {
                error!("SNTP sync exceeded {} ms", self.config.sync_budget_ms);
                Err(NetworkError::Timeout)
            }
        }
    }

    async fn query_servers(&self, stack: &Stack<'static>) -> Result<Timestamp, NetworkError> {
        info!("Starting SNTP synchronization");
        for server in self.config.servers {
            for attempt in 0..self.config.retry_count {
                info!(
                    "Attempting SNTP sync with {} (attempt {})",
                    server,
                    attempt + 1
                );
                match self.sntp_request(stack, server).await {
                    Ok(timestamp) => {
                        write_rtc(timestamp)?;
                        info!(
                            "SNTP sync successful: {}.{:06} UTC (written to internal RTC)",
                            timestamp.unix_secs, timestamp.micros
                        );
                        return Ok(timestamp);
                    }
                    Err(e) => {
                        warn!("SNTP sync failed: {:?}, retrying...", e);
                        Mono::delay(2000_u64.millis()).await;
                    }
                }
            }
        }
        error!("All SNTP sync attempts failed");
        Err(NetworkError::AllServersFailed)
    }

    async fn sntp_request(
        &self,
        stack: &Stack<'static>,
        server: &str,
    ) -> Result<Timestamp, NetworkError> {
        let server_endpoint = resolve(stack, server, 123).await?;

        let mut rx_meta = [PacketMetadata::EMPTY; 2];
        let mut rx_buffer = [0u8; 64];
        let mut tx_meta = [PacketMetadata::EMPTY; 2];
        let mut tx_buffer = [0u8; 64];
        let mut socket = UdpSocket::new(
            *stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        socket.bind(0).map_err(|_| NetworkError::SocketError)?;

        // NTP request: LI=0, VN=3, Mode=3 (Client)
        let mut ntp_packet = [0u8; 48];
        ntp_packet[0] = 0x1B;
        let transmit_time = Instant::now();
        socket
            .send_to(&ntp_packet, server_endpoint)
            .await
            .map_err(|_| NetworkError::SocketError)?;

        let mut response = [0u8; 48];
        let timeout = Timer::after(Duration::from_millis(self.config.timeout_ms));
        let (recv_len, from_addr) = match select(timeout, socket.recv_from(&mut response)).await {
            Either::First(_) => return Err(NetworkError::Timeout),
            Either::Second(result) => result.map_err(|_| NetworkError::SocketError)?,
        };
        let receive_time = Instant::now();

        if recv_len < 48 || from_addr.endpoint.addr != server_endpoint.addr {
            warn!(
                "Unexpected {} byte reply from {}",
                recv_len,
                Debug2Format(&from_addr)
            );
            return Err(NetworkError::InvalidResponse);
        }

        let stratum = response[1];
        if stratum == 0 || stratum > self.config.max_stratum {
            warn!(
                "Invalid stratum {} (max {})",
                stratum, self.config.max_stratum
            );
            return Err(NetworkError::ServerError);
        }

        let tx_timestamp_secs =
            u32::from_be_bytes([response[40], response[41], response[42], response[43]]) as u64;
        let tx_timestamp_frac =
            u32::from_be_bytes([response[44], response[45], response[46], response[47]]);

        let rtt = receive_time.duration_since(transmit_time);
        let rtt_correction_micros = rtt.as_micros() / 2;

        let mut timestamp = Timestamp::from_ntp(tx_timestamp_secs, tx_timestamp_frac);
        timestamp.micros = timestamp
            .micros
            .saturating_add(rtt_correction_micros as u32);
        if timestamp.micros >= 1_000_000 {
            timestamp.unix_secs = timestamp.unix_secs.saturating_add(1);
            timestamp.micros -= 1_000_000;
        }

        info!(
            "NTP timestamp from stratum {}: {}.{:06} UTC (RTT correction: {} µs)",
            stratum, timestamp.unix_secs, timestamp.micros, rtt_correction_micros
        );
        Ok(timestamp)
    }
}

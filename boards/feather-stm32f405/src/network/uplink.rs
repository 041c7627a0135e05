#![deny(unsafe_code)]
#![deny(warnings)]
//! Raw TCP uplink to the sample collector
//!
//! One connection per upload pass: the ring opens it, writes one record
//! per call and closes it again. Socket buffers are borrowed from the
//! owning task so the socket can be reused across passes.
//!
//! A pass is bounded by `connect_timeout_ms + session_timeout_ms +
//! write_timeout_ms` (connect, writes, close), 25 s with the defaults.
//! Writes past the session budget fail with [`NetworkError::Timeout`], which
//! ends the pass with the remaining records still queued.

use defmt::{debug, info, warn};
use embassy_net::tcp::{State, TcpSocket};
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration, Instant, Timer};
use embedded_io_async::ErrorType;
use hal_abstractions::Transport;

use super::config::CollectorConfig;
use super::error::NetworkError;
use super::manager::resolve;

pub struct CollectorUplink<'a> {
    stack: Stack<'static>,
    socket: TcpSocket<'a>,
    config: CollectorConfig,
    connected: bool,
    session_deadline: Instant,
}

impl<'a> CollectorUplink<'a> {
    pub fn new(
        stack: Stack<'static>,
        rx_buffer: &'a mut [u8],
        tx_buffer: &'a mut [u8],
        config: CollectorConfig,
    ) -> Self {
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
        socket.set_timeout(Some(Duration::from_millis(config.write_timeout_ms)));
        Self {
            stack,
            socket,
            config,
            connected: false,
            session_deadline: Instant::MIN,
        }
    }

    async fn open(&mut self) -> Result<(), NetworkError> {
        if !self.stack.is_config_up() {
            return Err(NetworkError::NotConnected);
        }
        // A previous pass may still be tearing down
        if self.socket.state() != State::Closed {
            self.socket.abort();
            while self.socket.state() != State::Closed {
                Timer::after_millis(10).await;
            }
        }

        let endpoint = resolve(&self.stack, self.config.host, self.config.port).await?;
        self.socket
            .connect(endpoint)
            .await
            .map_err(|_| NetworkError::SocketError)
    }
}

impl ErrorType for CollectorUplink<'_> {
    type Error = NetworkError;
}

impl Transport for CollectorUplink<'_> {
    fn is_connected(&self) -> bool {
        self.connected && self.socket.may_send()
    }

    async fn connect(&mut self) -> Result<(), Self::Error> {
        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let result = match with_timeout(timeout, self.open()).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout),
        };

        match result {
            Ok(()) => {
                debug!("Collector {}:{} connected", self.config.host, self.config.port);
                self.connected = true;
                self.session_deadline =
                    Instant::now() + Duration::from_millis(self.config.session_timeout_ms);
                Ok(())
            }
            Err(e) => {
                warn!("Collector connect failed: {}", e);
                self.socket.abort();
                self.connected = false;
                Err(e)
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if !self.connected {
            return Err(NetworkError::NotConnected);
        }
        let remaining = self.session_deadline.saturating_duration_since(Instant::now());
        if remaining.as_ticks() == 0 {
            warn!("Collector session budget used up");
            self.connected = false;
            return Err(NetworkError::Timeout);
        }

        // The socket timeout bounds a stalled peer, the session budget a slow one
        match with_timeout(remaining, self.socket.write(buf)).await {
            Ok(Ok(written)) => Ok(written),
            Ok(Err(_)) => {
                self.connected = false;
                Err(NetworkError::SocketError)
            }
            Err(_) => {
                warn!("Collector session budget used up");
                self.connected = false;
                Err(NetworkError::Timeout)
            }
        }
    }

    async fn close(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;

        let timeout = Duration::from_millis(self.config.write_timeout_ms);
        if with_timeout(timeout, self.socket.flush()).await.is_err() {
            info!("Collector did not acknowledge all data before close");
        }
        self.socket.close();
        // Skip FIN-WAIT/TIME-WAIT so the next pass can reconnect at once
        self.socket.abort();
    }
}

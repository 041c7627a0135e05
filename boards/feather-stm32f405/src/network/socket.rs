#![deny(unsafe_code)]
#![deny(warnings)]
//! Async TCP socket wrapper for the MQTT client
//!
//! `rust-mqtt` drives its transport through the `embedded-io-async`
//! traits; this wraps `embassy_net::tcp::TcpSocket` to provide them.

use embassy_net::tcp::TcpSocket;
use embassy_net::{IpEndpoint, Stack};
use embassy_time::{with_timeout, Duration};
use embedded_io_async::{ErrorType, Read, Write};

use super::error::NetworkError;

pub struct AsyncTcpSocket<'a> {
    socket: TcpSocket<'a>,
}

impl<'a> AsyncTcpSocket<'a> {
    /// Create a socket whose reads and writes give up after `timeout`
    pub fn new(
        stack: Stack<'a>,
        rx_buffer: &'a mut [u8],
        tx_buffer: &'a mut [u8],
        timeout: Duration,
    ) -> Self {
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
        socket.set_timeout(Some(timeout));
        Self { socket }
    }

    /// Connect to a remote endpoint, bounded by `timeout`
    pub async fn connect(
        &mut self,
        endpoint: IpEndpoint,
        timeout: Duration,
    ) -> Result<(), NetworkError> {
        match with_timeout(timeout, self.socket.connect(endpoint)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(NetworkError::SocketError),
            Err(_) => {
                self.socket.abort();
                Err(NetworkError::Timeout)
            }
        }
    }
}

impl ErrorType for AsyncTcpSocket<'_> {
    type Error = NetworkError;
}

impl Read for AsyncTcpSocket<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.socket
            .read(buf)
            .await
            .map_err(|_| NetworkError::SocketError)
    }
}

impl Write for AsyncTcpSocket<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.socket
            .write(buf)
            .await
            .map_err(|_| NetworkError::SocketError)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.socket
            .flush()
            .await
            .map_err(|_| NetworkError::SocketError)
    }
}

#![deny(unsafe_code)]
#![deny(warnings)]
//! Network client error types

use defmt::Format;

use crate::time::RtcError;

/// Network client operation errors
#[derive(Debug, Clone, Copy, Format)]
pub enum NetworkError {
    /// W5500 did not come up
    DeviceInit,
    /// DNS resolution failed
    DnsError,
    /// Socket bind/connect error
    SocketError,
    /// Operation on a socket that is not connected
    NotConnected,
    /// Request timeout
    Timeout,
    /// Invalid response from server
    InvalidResponse,
    /// Server error (e.g., invalid stratum for NTP)
    ServerError,
    /// All configured servers failed
    AllServersFailed,
    /// RTC not initialized
    RtcNotInitialized,
    /// RTC hardware error
    RtcHardwareError,
    /// MQTT connection failed
    MqttConnectionFailed,
    /// MQTT publish failed
    MqttPublishFailed,
    /// Channel or client id rejected by the MQTT encoder
    MqttProtocolError,
}

impl core::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DeviceInit => write!(f, "Ethernet device init failed"),
            Self::DnsError => write!(f, "DNS resolution failed"),
            Self::SocketError => write!(f, "Socket error"),
            Self::NotConnected => write!(f, "Not connected"),
            Self::Timeout => write!(f, "Request timeout"),
            Self::InvalidResponse => write!(f, "Invalid response"),
            Self::ServerError => write!(f, "Server error"),
            Self::AllServersFailed => write!(f, "All servers failed"),
            Self::RtcNotInitialized => write!(f, "RTC not initialized"),
            Self::RtcHardwareError => write!(f, "RTC hardware error"),
            Self::MqttConnectionFailed => write!(f, "MQTT connection failed"),
            Self::MqttPublishFailed => write!(f, "MQTT publish failed"),
            Self::MqttProtocolError => write!(f, "MQTT protocol error"),
        }
    }
}

impl core::error::Error for NetworkError {}

impl embedded_io_async::Error for NetworkError {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        match self {
            Self::SocketError => embedded_io_async::ErrorKind::BrokenPipe,
            Self::NotConnected => embedded_io_async::ErrorKind::NotConnected,
            Self::Timeout => embedded_io_async::ErrorKind::TimedOut,
            Self::InvalidResponse => embedded_io_async::ErrorKind::InvalidData,
            _ => embedded_io_async::ErrorKind::Other,
        }
    }
}

impl From<RtcError> for NetworkError {
    fn from(e: RtcError) -> Self {
        match e {
            RtcError::NotInitialized => NetworkError::RtcNotInitialized,
            RtcError::HardwareError | RtcError::OutOfRange => NetworkError::RtcHardwareError,
        }
    }
}

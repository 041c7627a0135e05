#![deny(unsafe_code)]
#![deny(warnings)]
//! MQTT v5.0 publisher for the activity digest
//!
//! Each message gets its own short session: resolve, TCP connect, CONNECT,
//! one QoS 0 PUBLISH, then the socket is dropped. Digest passes publish a
//! handful of chunks an hour, so holding a session open buys nothing and
//! keeps every buffer on the stack of the publishing task.
//!
//! Messages go to `device/{client_id}/{channel}`.

use defmt::{debug, error, info, Debug2Format};
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration};
use hal_abstractions::Publisher;
use heapless::String;
use rust_mqtt::{
    buffer::BumpBuffer,
    client::{
        options::{ConnectOptions, PublicationOptions, TopicReference},
        Client,
    },
    config::{KeepAlive, SessionExpiryInterval},
    types::{MqttString, QoS, TopicName},
    Bytes,
};

use crate::device_id::{self, CLIENT_ID_MAX_LEN};

use super::config::MqttConfig;
use super::error::NetworkError;
use super::manager::resolve;
use super::socket::AsyncTcpSocket;

/// MQTT packet buffer: one digest chunk plus headers
const MQTT_BUFFER_SIZE: usize = 1024;

const TCP_BUFFER_SIZE: usize = 1024;

/// "device/" + client id + "/" + channel
const MAX_TOPIC_LEN: usize = 64;

pub struct MqttPublisher {
    stack: Stack<'static>,
    config: MqttConfig,
    client_id: String<CLIENT_ID_MAX_LEN>,
}

impl MqttPublisher {
    pub fn new(stack: Stack<'static>, config: MqttConfig) -> Self {
        let client_id = device_id::mqtt_client_id();
        info!("MQTT client ID: {}", client_id);
        Self {
            stack,
            config,
            client_id,
        }
    }

    async fn session(&self, channel: &str, payload: &[u8]) -> Result<(), NetworkError> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let topic = format_mqtt_topic(&self.client_id, channel)?;

        let endpoint = resolve(&self.stack, self.config.broker_host, self.config.broker_port).await?;

        let mut rx_buffer = [0u8; TCP_BUFFER_SIZE];
        let mut tx_buffer = [0u8; TCP_BUFFER_SIZE];
        let mut socket = AsyncTcpSocket::new(self.stack, &mut rx_buffer, &mut tx_buffer, timeout);
        socket.connect(endpoint, timeout).await?;
        debug!("TCP connection established to {}", Debug2Format(&endpoint));

        let mut mqtt_buffer = [0u8; MQTT_BUFFER_SIZE];
        let mut buffer = BumpBuffer::new(&mut mqtt_buffer);
        let mut mqtt_client = Client::<'_, _, _, 1, 1, 1, 0>::new(&mut buffer);

        let connect_opts = ConnectOptions {
            session_expiry_interval: SessionExpiryInterval::EndOnDisconnect,
            clean_start: self.config.clean_start,
            keep_alive: if self.config.keep_alive_secs == 0 {
                KeepAlive::Infinite
            } else {
                KeepAlive::Seconds(self.config.keep_alive_secs)
            },
            will: None,
            user_name: None,
            password: None,
        };

        let mqtt_client_id = MqttString::new(self.client_id.as_str().into()).map_err(|e| {
            error!(
                "Failed to create MQTT client ID string: {:?}",
                Debug2Format(&e)
            );
            NetworkError::MqttProtocolError
        })?;

        mqtt_client
            .connect(socket, &connect_opts, Some(mqtt_client_id))
            .await
            .map_err(|e| {
                error!("MQTT connect failed: {:?}", Debug2Format(&e));
                NetworkError::MqttConnectionFailed
            })?;

        let pub_options = PublicationOptions {
            retain: false,
            message_expiry_interval: None,
            topic: TopicReference::Name(topic_name(&topic)?),
            qos: QoS::AtMostOnce,
        };

        mqtt_client
            .publish(&pub_options, Bytes::from(payload))
            .await
            .map_err(|e| {
                error!("MQTT publish failed: {:?}", Debug2Format(&e));
                NetworkError::MqttPublishFailed
            })?;

        debug!("Published {} bytes to '{}'", payload.len(), topic.as_str());
        Ok(())
    }
}

impl Publisher for MqttPublisher {
    type Error = NetworkError;

    fn is_connected(&self) -> bool {
        self.stack.is_config_up()
    }

    async fn publish(&mut self, channel: &str, payload: &[u8]) -> Result<(), Self::Error> {
        // Bounds DNS, connect and publish together
        let deadline = Duration::from_millis(self.config.timeout_ms);
        match with_timeout(deadline, self.session(channel, payload)).await {
            Ok(result) => result,
            Err(_) => {
                error!("MQTT session to {} timed out", self.config.broker_host);
                Err(NetworkError::Timeout)
            }
        }
    }
}

// SAFETY: only called with the output of format_mqtt_topic(), which rejects
// wildcard and null characters, so the string is a valid MQTT topic name.
#[allow(unsafe_code)]
fn topic_name(topic: &str) -> Result<TopicName<'_>, NetworkError> {
    let name = MqttString::new(topic.into()).map_err(|e| {
        error!("Failed to create MQTT topic string: {:?}", Debug2Format(&e));
        NetworkError::MqttProtocolError
    })?;
    Ok(unsafe { TopicName::new_unchecked(name) })
}

/// Build `device/{client_id}/{channel}`
fn format_mqtt_topic(client_id: &str, channel: &str) -> Result<String<MAX_TOPIC_LEN>, NetworkError> {
    let invalid = |s: &str| s.is_empty() || s.contains(['+', '#', '\0']);
    if invalid(client_id) || invalid(channel) {
        error!("Topic part contains invalid MQTT topic characters");
        return Err(NetworkError::MqttProtocolError);
    }

    let mut topic = String::<MAX_TOPIC_LEN>::new();
    for part in ["device/", client_id, "/", channel] {
        topic
            .push_str(part)
            .map_err(|_| NetworkError::MqttProtocolError)?;
    }
    Ok(topic)
}

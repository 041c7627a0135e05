#![deny(unsafe_code)]
#![deny(warnings)]
//! Device identifier utilities for STM32F405
//!
//! The factory-programmed 96-bit unique device ID is stable across reboots
//! and unique to each chip. It names the device to the MQTT broker and
//! seeds its Ethernet MAC address.

use heapless::String;

const CLIENT_ID_PREFIX: &str = "stm32f405-";

/// Prefix plus 24 hex characters
pub const CLIENT_ID_MAX_LEN: usize = 34;

const _: () = assert!(CLIENT_ID_PREFIX.len() + 24 == CLIENT_ID_MAX_LEN);

/// Raw 12-byte (96-bit) unique device ID
pub fn uid() -> &'static [u8; 12] {
    embassy_stm32::uid::uid()
}

/// Get the STM32F405 unique device ID as a 24-character hex string
pub fn uid_hex() -> &'static str {
    embassy_stm32::uid::uid_hex()
}

/// MQTT client ID in the format `stm32f405-{24_hex_chars}`
pub fn mqtt_client_id() -> String<CLIENT_ID_MAX_LEN> {
    let mut client_id = String::new();
    // Both pushes fit, see the assertion on CLIENT_ID_MAX_LEN
    client_id.push_str(CLIENT_ID_PREFIX).ok();
    client_id.push_str(uid_hex()).ok();
    client_id
}

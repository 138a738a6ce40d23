//! Session and room configuration

use std::time::Duration;

use courier_crypto::{DEFAULT_ROOM_LABEL, MAX_REPLAY_WINDOW};
use courier_proto::MAX_CIPHERTEXT_LEN;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default out-of-order window: strict ordering.
pub const DEFAULT_REPLAY_WINDOW: u32 = 0;

/// Messages sent under one key before a re-key is forced.
pub const DEFAULT_REKEY_AFTER_MESSAGES: u64 = 100_000;

/// Key age after which a re-key is forced.
pub const DEFAULT_REKEY_AFTER: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Oldest (and furthest in the future) handshake timestamp accepted.
pub const DEFAULT_MAX_HANDSHAKE_AGE: Duration = Duration::from_secs(5 * 60);

/// Largest plaintext accepted by `send`.
pub const DEFAULT_MAX_PLAINTEXT_LEN: usize = 1024 * 1024;

/// Configuration rejected by [`SessionConfig::validate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Window larger than the replay bitmap
    #[error("replay window {size} exceeds maximum {max}")]
    ReplayWindowTooLarge {
        /// Configured window
        size: u32,
        /// Largest supported window
        max: u32,
    },

    /// A re-key threshold of zero would block every send
    #[error("{0} must be greater than zero")]
    ZeroThreshold(&'static str),

    /// Plaintext limit does not fit an envelope
    #[error("max_plaintext_len {size} exceeds envelope limit {max}")]
    PlaintextLimitTooLarge {
        /// Configured limit
        size: usize,
        /// Envelope ciphertext limit
        max: usize,
    },
}

/// Session manager configuration.
///
/// Every field has a default, so a partial document deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Out-of-order window in messages (0..=64)
    pub replay_window: u32,
    /// Force a re-key after this many sends under one key
    pub rekey_after_messages: u64,
    /// Force a re-key once the key is this old (seconds on the wire)
    #[serde(with = "duration_secs")]
    pub rekey_after: Duration,
    /// Accept handshakes whose timestamp is within this bound of now
    #[serde(with = "duration_secs")]
    pub max_handshake_age: Duration,
    /// Pin unknown identities on their first Init instead of rejecting them
    pub trust_on_first_use: bool,
    /// Largest plaintext `send` accepts
    pub max_plaintext_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            replay_window: DEFAULT_REPLAY_WINDOW,
            rekey_after_messages: DEFAULT_REKEY_AFTER_MESSAGES,
            rekey_after: DEFAULT_REKEY_AFTER,
            max_handshake_age: DEFAULT_MAX_HANDSHAKE_AGE,
            trust_on_first_use: true,
            max_plaintext_len: DEFAULT_MAX_PLAINTEXT_LEN,
        }
    }
}

impl SessionConfig {
    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replay_window > MAX_REPLAY_WINDOW {
            return Err(ConfigError::ReplayWindowTooLarge {
                size: self.replay_window,
                max: MAX_REPLAY_WINDOW,
            });
        }
        if self.rekey_after_messages == 0 {
            return Err(ConfigError::ZeroThreshold("rekey_after_messages"));
        }
        if self.rekey_after.is_zero() {
            return Err(ConfigError::ZeroThreshold("rekey_after"));
        }
        if self.max_plaintext_len > MAX_CIPHERTEXT_LEN {
            return Err(ConfigError::PlaintextLimitTooLarge {
                size: self.max_plaintext_len,
                max: MAX_CIPHERTEXT_LEN,
            });
        }
        Ok(())
    }
}

/// Group room configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Associated data label bound into every room message
    pub label: String,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self { label: DEFAULT_ROOM_LABEL.to_owned() }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.replay_window, 0);
        assert_eq!(config.rekey_after_messages, 100_000);
        assert!(config.trust_on_first_use);
    }

    #[test]
    fn oversized_window_is_rejected() {
        let config = SessionConfig { replay_window: 65, ..SessionConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::ReplayWindowTooLarge { size: 65, max: 64 }));
    }

    #[test]
    fn zero_thresholds_are_rejected() {
        let config = SessionConfig { rekey_after_messages: 0, ..SessionConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroThreshold("rekey_after_messages")));

        let config = SessionConfig { rekey_after: Duration::ZERO, ..SessionConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroThreshold("rekey_after")));
    }

    #[test]
    fn plaintext_limit_must_fit_envelope() {
        let config = SessionConfig { max_plaintext_len: MAX_CIPHERTEXT_LEN + 1, ..SessionConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::PlaintextLimitTooLarge { .. })));
    }

    #[test]
    fn partial_cbor_document_fills_defaults() {
        #[derive(Serialize)]
        struct Partial {
            replay_window: u32,
            rekey_after: u64,
        }

        let mut bytes = Vec::new();
        ciborium::into_writer(&Partial { replay_window: 8, rekey_after: 3600 }, &mut bytes).unwrap();
        let config: SessionConfig = ciborium::from_reader(bytes.as_slice()).unwrap();

        assert_eq!(config.replay_window, 8);
        assert_eq!(config.rekey_after, Duration::from_secs(3600));
        assert_eq!(config.max_handshake_age, DEFAULT_MAX_HANDSHAKE_AGE);
    }

    #[test]
    fn cbor_roundtrip() {
        let config = SessionConfig { replay_window: 16, trust_on_first_use: false, ..SessionConfig::default() };

        let mut bytes = Vec::new();
        ciborium::into_writer(&config, &mut bytes).unwrap();
        let decoded: SessionConfig = ciborium::from_reader(bytes.as_slice()).unwrap();

        assert_eq!(decoded, config);
    }

    #[test]
    fn room_config_defaults_to_group_label() {
        assert_eq!(RoomConfig::default().label, "chat-group-e2e-v1");
    }
}

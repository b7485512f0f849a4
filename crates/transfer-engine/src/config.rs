//! Engine configuration

use serde::{Deserialize, Serialize};

/// Transfer engine configuration
///
/// # Examples
///
/// ```
/// use holdline_transfer_engine::EngineConfig;
///
/// let mut config = EngineConfig::default();
/// assert_eq!(config.max_attempts, 1);
/// assert!(config.validate().is_ok());
///
/// config.max_attempts = 0;
/// assert!(config.validate().is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Transfer attempts a call gets before a failed transfer is final.
    ///
    /// With the default of 1 a failed transfer terminates the call; higher
    /// values send the caller back to the tail of the queue.
    pub max_attempts: u32,

    /// Callback target handed to the provider with every transfer.
    ///
    /// The provider fetches connect instructions from here and reports the
    /// dial outcome back through it.
    pub status_callback_url: String,

    /// Destination normalization rules
    pub address: AddressPolicy,

    /// Caller ID presented to the destination, if any
    pub caller_id: Option<String>,

    /// How long the destination may ring (seconds)
    pub dial_timeout_secs: u32,

    /// Record the bridged leg from answer
    pub record_from_answer: bool,

    /// Abandon queued calls that have waited longer than this (seconds).
    /// `None` disables the sweeper.
    pub max_queue_wait_secs: Option<u64>,

    /// How often the sweeper looks for overdue calls (seconds)
    pub sweep_interval_secs: u64,

    /// Buffer size of the call event feed
    pub event_capacity: usize,
}

/// Rules for turning a user-supplied destination into E.164 form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressPolicy {
    /// Country code prepended to national numbers that arrive without `+`
    pub default_country_code: Option<String>,

    /// Digit count that identifies a national number
    pub national_number_length: usize,
}

impl EngineConfig {
    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }

        if self.dial_timeout_secs == 0 {
            return Err("dial_timeout_secs must be greater than 0".to_string());
        }

        if self.dial_timeout_secs > 600 {
            return Err("dial_timeout_secs cannot exceed 600 seconds".to_string());
        }

        if self.max_queue_wait_secs == Some(0) {
            return Err("max_queue_wait_secs must be greater than 0 when set".to_string());
        }

        if self.max_queue_wait_secs.is_some() && self.sweep_interval_secs == 0 {
            return Err("sweep_interval_secs must be greater than 0".to_string());
        }

        if self.event_capacity == 0 {
            return Err("event_capacity must be greater than 0".to_string());
        }

        self.address.validate()
    }
}

impl AddressPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(code) = &self.default_country_code {
            let valid = (1..=3).contains(&code.len())
                && code.bytes().all(|b| b.is_ascii_digit())
                && !code.starts_with('0');
            if !valid {
                return Err(format!("Invalid default_country_code: {}", code));
            }
        }

        if self.national_number_length == 0 {
            return Err("national_number_length must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            status_callback_url: String::new(),
            address: AddressPolicy::default(),
            caller_id: None,
            dial_timeout_secs: 30,
            record_from_answer: true,
            max_queue_wait_secs: None,
            sweep_interval_secs: 15,
            event_capacity: 256,
        }
    }
}

impl Default for AddressPolicy {
    fn default() -> Self {
        Self {
            default_country_code: Some("1".to_string()),
            national_number_length: 10,
        }
    }
}

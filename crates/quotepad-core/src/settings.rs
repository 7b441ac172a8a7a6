//! Boot-time device settings and operation mode decoding.

use log::warn;

/// Number of numeric fields in a settings record.
pub const SETTINGS_FIELD_COUNT: usize = 11;

const CACHE_ONLY_THRESHOLD: u32 = 4;
const MAX_OFFSET_HOURS: i64 = 24;

/// Which quote sources a session may use.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperationMode {
    /// Network first, then cache and removable storage.
    Standard,
    /// Removable storage, with the cache as a last resort.
    StorageOnly,
    /// Network, with the cache as a last resort.
    NetworkOnly,
    /// Only ever replay the cached quote.
    CacheOnly,
}

impl OperationMode {
    /// Decodes the raw settings value: odd values use the network, anything at
    /// or above the threshold is cache-only.
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            r if r >= CACHE_ONLY_THRESHOLD => Self::CacheOnly,
            1 => Self::Standard,
            3 => Self::NetworkOnly,
            _ => Self::StorageOnly,
        }
    }

    pub const fn as_raw(self) -> u32 {
        match self {
            Self::StorageOnly => 0,
            Self::Standard => 1,
            Self::NetworkOnly => 3,
            Self::CacheOnly => CACHE_ONLY_THRESHOLD,
        }
    }

    pub const fn uses_network(self) -> bool {
        matches!(self, Self::Standard | Self::NetworkOnly)
    }

    pub const fn is_cache_only(self) -> bool {
        matches!(self, Self::CacheOnly)
    }

    /// The mode a session falls back to once every join candidate failed.
    pub const fn without_network(self) -> Self {
        match self {
            Self::Standard => Self::StorageOnly,
            Self::NetworkOnly => Self::CacheOnly,
            other => other,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SettingsError {
    /// Fewer than [`SETTINGS_FIELD_COUNT`] values; carries how many were found.
    MissingField(u8),
    /// The field at this index is not a number or is out of range.
    InvalidField(u8),
    /// More values than the record holds.
    TrailingData,
}

/// Session configuration, loaded once at boot and read-only afterwards.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Settings {
    pub join_timeout_ms: u32,
    pub mode: OperationMode,
    pub cache_enabled: bool,
    pub idle_timeout_secs: u32,
    /// Inclusive lower bound of the quote file index range.
    pub quote_index_min: u16,
    /// Exclusive upper bound of the quote file index range.
    pub quote_index_max: u16,
    pub quote_scroll_ms: u16,
    pub message_scroll_ms: u16,
    pub utc_offset_hours: i8,
    pub dst_offset_hours: i8,
    pub long_press_ms: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            join_timeout_ms: 10_000,
            mode: OperationMode::Standard,
            cache_enabled: true,
            idle_timeout_secs: 30,
            quote_index_min: 1,
            quote_index_max: 50,
            quote_scroll_ms: 35,
            message_scroll_ms: 50,
            utc_offset_hours: 0,
            dst_offset_hours: 0,
            long_press_ms: 1_000,
        }
    }
}

impl Settings {
    /// Parses the 11 fields from whitespace- or comma-separated integers.
    /// `#` starts a comment that runs to the end of the line.
    pub fn parse(text: &str) -> Result<Self, SettingsError> {
        let mut fields = [0i64; SETTINGS_FIELD_COUNT];
        let mut count = 0usize;

        for line in text.lines() {
            let content = match line.split_once('#') {
                Some((before, _)) => before,
                None => line,
            };

            let tokens = content
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|token| !token.is_empty());

            for token in tokens {
                if count >= SETTINGS_FIELD_COUNT {
                    return Err(SettingsError::TrailingData);
                }
                fields[count] = token
                    .parse::<i64>()
                    .map_err(|_| SettingsError::InvalidField(count as u8))?;
                count += 1;
            }
        }

        if count < SETTINGS_FIELD_COUNT {
            return Err(SettingsError::MissingField(count as u8));
        }

        Self::from_fields(fields)
    }

    /// Builds settings from raw field values in record order.
    pub fn from_fields(fields: [i64; SETTINGS_FIELD_COUNT]) -> Result<Self, SettingsError> {
        let unsigned = |index: usize, max: u32| -> Result<u32, SettingsError> {
            let value = fields[index];
            if value < 0 || value > max as i64 {
                Err(SettingsError::InvalidField(index as u8))
            } else {
                Ok(value as u32)
            }
        };
        let offset = |index: usize| -> Result<i8, SettingsError> {
            let value = fields[index];
            if !(-MAX_OFFSET_HOURS..=MAX_OFFSET_HOURS).contains(&value) {
                Err(SettingsError::InvalidField(index as u8))
            } else {
                Ok(value as i8)
            }
        };

        let settings = Self {
            join_timeout_ms: unsigned(0, u32::MAX)?,
            mode: OperationMode::from_raw(unsigned(1, u32::MAX)?),
            cache_enabled: unsigned(2, u32::MAX)? != 0,
            idle_timeout_secs: unsigned(3, u32::MAX)?,
            quote_index_min: unsigned(4, u16::MAX as u32)? as u16,
            quote_index_max: unsigned(5, u16::MAX as u32)? as u16,
            quote_scroll_ms: unsigned(6, u16::MAX as u32)? as u16,
            message_scroll_ms: unsigned(7, u16::MAX as u32)? as u16,
            utc_offset_hours: offset(8)?,
            dst_offset_hours: offset(9)?,
            long_press_ms: unsigned(10, u32::MAX)?,
        };

        Ok(settings.normalized())
    }

    /// Parses `text` if present, otherwise (or on any error) falls back to defaults.
    pub fn load_or_default(text: Option<&str>) -> Self {
        let Some(text) = text else {
            warn!("settings: no settings source; using defaults");
            return Self::default();
        };

        match Self::parse(text) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("settings: invalid settings ({:?}); using defaults", err);
                Self::default()
            }
        }
    }

    fn normalized(mut self) -> Self {
        if self.quote_index_max < self.quote_index_min {
            core::mem::swap(&mut self.quote_index_min, &mut self.quote_index_max);
        }
        if self.long_press_ms == 0 {
            self.long_press_ms = Self::default().long_press_ms;
        }
        self
    }

    /// Combined UTC and daylight-saving offset.
    pub const fn local_offset_secs(&self) -> i32 {
        (self.utc_offset_hours as i32 + self.dst_offset_hours as i32) * 3_600
    }

    pub const fn idle_timeout_ms(&self) -> u64 {
        self.idle_timeout_secs as u64 * 1_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_decoding_follows_parity_and_threshold() {
        assert_eq!(OperationMode::from_raw(0), OperationMode::StorageOnly);
        assert_eq!(OperationMode::from_raw(1), OperationMode::Standard);
        assert_eq!(OperationMode::from_raw(2), OperationMode::StorageOnly);
        assert_eq!(OperationMode::from_raw(3), OperationMode::NetworkOnly);
        assert_eq!(OperationMode::from_raw(4), OperationMode::CacheOnly);
        assert_eq!(OperationMode::from_raw(9), OperationMode::CacheOnly);

        for mode in [
            OperationMode::Standard,
            OperationMode::StorageOnly,
            OperationMode::NetworkOnly,
            OperationMode::CacheOnly,
        ] {
            assert_eq!(OperationMode::from_raw(mode.as_raw()), mode);
            assert!(!mode.without_network().uses_network());
        }
    }

    #[test]
    fn parses_commented_multiline_record() {
        let text = "# join timeout, mode, cache\n\
                    8000 1 1\n\
                    60, 7, 8   # idle, range\n\
                    30 45\n\
                    -5 1 1500\n";
        let settings = Settings::parse(text).unwrap();

        assert_eq!(settings.join_timeout_ms, 8_000);
        assert_eq!(settings.mode, OperationMode::Standard);
        assert!(settings.cache_enabled);
        assert_eq!(settings.idle_timeout_secs, 60);
        assert_eq!((settings.quote_index_min, settings.quote_index_max), (7, 8));
        assert_eq!((settings.quote_scroll_ms, settings.message_scroll_ms), (30, 45));
        assert_eq!(settings.local_offset_secs(), -4 * 3_600);
        assert_eq!(settings.long_press_ms, 1_500);
    }

    #[test]
    fn rejects_short_long_and_negative_records() {
        assert_eq!(
            Settings::parse("1 2 3"),
            Err(SettingsError::MissingField(3))
        );
        assert_eq!(
            Settings::parse("1 1 1 1 1 2 1 1 0 0 1 99"),
            Err(SettingsError::TrailingData)
        );
        assert_eq!(
            Settings::parse("-1 1 1 30 1 2 10 10 0 0 1000"),
            Err(SettingsError::InvalidField(0))
        );
        assert_eq!(
            Settings::parse("1000 1 1 30 1 2 10 10 0 x 1000"),
            Err(SettingsError::InvalidField(9))
        );
    }

    #[test]
    fn normalizes_reversed_range_and_zero_threshold() {
        let settings = Settings::parse("1000 0 0 5 20 10 10 10 0 0 0").unwrap();
        assert_eq!((settings.quote_index_min, settings.quote_index_max), (10, 20));
        assert_eq!(settings.long_press_ms, Settings::default().long_press_ms);
        assert!(!settings.cache_enabled);
    }

    #[test]
    fn missing_or_malformed_source_uses_defaults() {
        assert_eq!(Settings::load_or_default(None), Settings::default());
        assert_eq!(
            Settings::load_or_default(Some("garbage")),
            Settings::default()
        );
    }
}

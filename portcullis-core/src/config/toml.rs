//! Minimal TOML parser for bridge configuration
//!
//! Supports the subset the bridge needs: `[bridge]` and
//! `[motion_triggers]` sections holding integer, boolean and string
//! values. Keys before the first section header belong to `[bridge]`.
//! Works without an allocator.

use super::{CoreConfig, LedIdle, MotionTrigger, SecurityType};

/// Parse errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Unknown or malformed section header
    InvalidSection,
    /// Key not valid in its section
    UnknownKey,
    /// Value has the wrong type or is out of range
    InvalidValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Bridge,
    MotionTriggers,
}

/// Parse TOML text into a [`CoreConfig`]
///
/// Keys that are not present keep their default values.
pub fn parse_config(input: &str) -> Result<CoreConfig, ParseError> {
    let mut config = CoreConfig::default();
    let mut section = Section::Bridge;

    for line in input.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            let header = line
                .strip_prefix('[')
                .and_then(|l| l.split('#').next())
                .map(str::trim)
                .and_then(|l| l.strip_suffix(']'))
                .ok_or(ParseError::InvalidSection)?;
            section = parse_section_header(header)?;
            continue;
        }

        let (key, value) = parse_key_value(line).ok_or(ParseError::InvalidValue)?;
        match section {
            Section::Bridge => apply_bridge(&mut config, key, value)?,
            Section::MotionTriggers => {
                let trigger = parse_trigger(key)?;
                config.motion_triggers.set(trigger, parse_bool(value)?);
            }
        }
    }

    Ok(config)
}

fn parse_section_header(header: &str) -> Result<Section, ParseError> {
    match header.trim() {
        "bridge" => Ok(Section::Bridge),
        "motion_triggers" => Ok(Section::MotionTriggers),
        _ => Err(ParseError::InvalidSection),
    }
}

fn apply_bridge(config: &mut CoreConfig, key: &str, value: &str) -> Result<(), ParseError> {
    match key {
        "security_type" => config.security_type = parse_security_type(value)?,
        "ttc_seconds" => config.ttc_seconds = parse_int(value)?,
        "sec1_door_debounce" => config.sec1_door_debounce = parse_bool(value)?,
        "force_recover_delay_ms" => config.force_recover_delay_ms = parse_int(value)?,
        "led_idle" => config.led_idle = parse_led_idle(value)?,
        _ => return Err(ParseError::UnknownKey),
    }
    Ok(())
}

/// Parse "key = value" line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    // Remove inline comments
    let value = match value.find('#') {
        Some(hash_pos) if value[..hash_pos].matches('"').count() % 2 == 0 => value[..hash_pos].trim(),
        _ => value,
    };

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse a string value (removes quotes)
fn parse_string(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue)
}

fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::InvalidValue),
    }
}

/// Accepts `1`, `2`, `"sec1"`, `"sec2"` and the `secplus` spellings
fn parse_security_type(value: &str) -> Result<SecurityType, ParseError> {
    match parse_string(value) {
        "1" | "sec1" | "secplus1" => Ok(SecurityType::Sec1),
        "2" | "sec2" | "secplus2" => Ok(SecurityType::Sec2),
        _ => Err(ParseError::InvalidValue),
    }
}

fn parse_led_idle(value: &str) -> Result<LedIdle, ParseError> {
    match parse_string(value) {
        "off" => Ok(LedIdle::Off),
        "on" => Ok(LedIdle::On),
        "disabled" => Ok(LedIdle::Disabled),
        _ => Err(ParseError::InvalidValue),
    }
}

fn parse_trigger(key: &str) -> Result<MotionTrigger, ParseError> {
    match key {
        "motion" => Ok(MotionTrigger::Motion),
        "obstruction" => Ok(MotionTrigger::Obstruction),
        "light_key" => Ok(MotionTrigger::LightKey),
        "door_key" => Ok(MotionTrigger::DoorKey),
        "lock_key" => Ok(MotionTrigger::LockKey),
        _ => Err(ParseError::UnknownKey),
    }
}

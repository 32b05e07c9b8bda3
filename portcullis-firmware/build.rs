//! Build script for portcullis-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates bridge.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}

/// Validate bridge.toml configuration at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=bridge.toml");

    let config_path = Path::new("bridge.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: bridge.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds bridge.toml as its default configuration.   ║\n\
            ║  Please create one in the portcullis-firmware directory.         ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read bridge.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in bridge.toml                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                {}\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    validate_sections(&config, &mut errors);
    validate_bridge(&config, &mut errors);
    validate_motion_triggers(&config, &mut errors);

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid bridge configuration                             ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=bridge.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Only `[bridge]` and `[motion_triggers]` are understood by the firmware parser
fn validate_sections(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(table) = config.as_table() else {
        return;
    };
    for (name, value) in table {
        match (name.as_str(), value) {
            ("bridge" | "motion_triggers", toml::Value::Table(_)) => {}
            ("bridge" | "motion_triggers", _) => errors.push(format!("[{}] must be a table", name)),
            _ => errors.push(format!("unknown section or key '{}'", name)),
        }
    }
}

fn validate_bridge(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(bridge) = config.get("bridge").and_then(|b| b.as_table()) else {
        return;
    };

    for (key, value) in bridge {
        match (key.as_str(), value) {
            ("security_type", toml::Value::Integer(1 | 2)) => {}
            ("security_type", toml::Value::String(s))
                if ["sec1", "sec2", "secplus1", "secplus2"].contains(&s.as_str()) => {}
            ("security_type", _) => errors.push("[bridge] security_type must be 1 or 2".to_string()),
            ("ttc_seconds", toml::Value::Integer(0..=255)) => {}
            ("ttc_seconds", _) => errors.push("[bridge] ttc_seconds must be 0-255".to_string()),
            ("sec1_door_debounce", toml::Value::Boolean(_)) => {}
            ("sec1_door_debounce", _) => {
                errors.push("[bridge] sec1_door_debounce must be true or false".to_string())
            }
            ("force_recover_delay_ms", toml::Value::Integer(ms)) if (0..=u32::MAX as i64).contains(ms) => {}
            ("force_recover_delay_ms", _) => {
                errors.push("[bridge] force_recover_delay_ms must be a positive integer".to_string())
            }
            ("led_idle", toml::Value::String(s)) if ["off", "on", "disabled"].contains(&s.as_str()) => {}
            ("led_idle", _) => errors.push("[bridge] led_idle must be 'off', 'on' or 'disabled'".to_string()),
            _ => errors.push(format!("[bridge] unknown key '{}'", key)),
        }
    }
}

fn validate_motion_triggers(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(triggers) = config.get("motion_triggers").and_then(|t| t.as_table()) else {
        return;
    };

    const TRIGGERS: [&str; 5] = ["motion", "obstruction", "light_key", "door_key", "lock_key"];
    for (key, value) in triggers {
        if !TRIGGERS.contains(&key.as_str()) {
            errors.push(format!("[motion_triggers] unknown trigger '{}'", key));
        } else if !value.is_bool() {
            errors.push(format!("[motion_triggers] {} must be true or false", key));
        }
    }
}

//! Host-side capability probes and their binding to configured sources
//!
//! Each probe reads one piece of ambient platform state (a declared
//! platform string, a filesystem landmark, a session environment variable)
//! and nothing else. Config binds rule tables to probes by source name;
//! an unrecognized name is a configuration error, not a runtime surprise.

use std::sync::Arc;

use osprobe_core::{
    CapabilitySource, DetectorConfig, Error, PatternRule, PatternSource, ProbeError, Result,
    SignalRule, SignalSource, SourceKind, SourceSpec,
};

/// Source names the composition root knows how to probe
pub const KNOWN_SOURCES: &[&str] = &[
    "platform-string",
    "os-release",
    "display-server",
    "windows-system-root",
    "macos-core-services",
    "linux-procfs",
    "android-runtime",
];

/// Build engine sources for every configured source descriptor
pub fn build_sources(config: &DetectorConfig) -> Result<Vec<Arc<dyn SignalSource>>> {
    config.sources.iter().map(build_source).collect()
}

fn build_source(spec: &SourceSpec) -> Result<Arc<dyn SignalSource>> {
    match spec.name.as_str() {
        "platform-string" => {
            let rules = pattern_rules(spec)?;
            Ok(Arc::new(PatternSource::new(&spec.name, rules, || async {
                Ok(read_platform_string())
            })))
        }
        "os-release" => {
            let rules = pattern_rules(spec)?;
            Ok(Arc::new(PatternSource::new(&spec.name, rules, || async {
                read_os_release().await
            })))
        }
        "display-server" => {
            let rules = pattern_rules(spec)?;
            Ok(Arc::new(PatternSource::new(&spec.name, rules, || async {
                Ok(read_display_server())
            })))
        }
        "windows-system-root" => {
            let rule = capability_rule(spec)?;
            Ok(Arc::new(CapabilitySource::new(&spec.name, rule, || async {
                let root = std::env::var("SystemRoot").unwrap_or_else(|_| "C:\\Windows".to_string());
                path_exists(&root).await
            })))
        }
        "macos-core-services" => {
            let rule = capability_rule(spec)?;
            Ok(Arc::new(CapabilitySource::new(&spec.name, rule, || async {
                path_exists("/System/Library/CoreServices").await
            })))
        }
        "linux-procfs" => {
            let rule = capability_rule(spec)?;
            Ok(Arc::new(CapabilitySource::new(&spec.name, rule, || async {
                path_exists("/proc/version").await
            })))
        }
        "android-runtime" => {
            let rule = capability_rule(spec)?;
            Ok(Arc::new(CapabilitySource::new(&spec.name, rule, || async {
                if std::env::var_os("ANDROID_ROOT").is_some() {
                    return Ok(true);
                }
                path_exists("/system/build.prop").await
            })))
        }
        other => Err(Error::Config(format!(
            "no probe registered for source '{}' (known sources: {})",
            other,
            KNOWN_SOURCES.join(", ")
        ))),
    }
}

fn capability_rule(spec: &SourceSpec) -> Result<SignalRule> {
    if spec.kind != SourceKind::Capability {
        return Err(Error::Config(format!(
            "source '{}' must be declared with kind = \"capability\"",
            spec.name
        )));
    }
    spec.rules
        .first()
        .map(|rule| rule.signal_rule())
        .ok_or_else(|| Error::Config(format!("capability source '{}' has no rule", spec.name)))
}

fn pattern_rules(spec: &SourceSpec) -> Result<Vec<PatternRule>> {
    if spec.kind != SourceKind::Pattern {
        return Err(Error::Config(format!(
            "source '{}' must be declared with kind = \"pattern\"",
            spec.name
        )));
    }
    spec.rules
        .iter()
        .map(|rule| {
            rule.pattern_rule().ok_or_else(|| {
                Error::Config(format!(
                    "pattern rule '{}' in source '{}' has no token",
                    rule.label, spec.name
                ))
            })
        })
        .collect()
}

/// Declared platform string from the session environment
fn read_platform_string() -> Option<String> {
    let mut parts = Vec::new();
    for key in ["OSTYPE", "OS", "MACHTYPE"] {
        if let Ok(value) = std::env::var(key) {
            if !value.trim().is_empty() {
                parts.push(value);
            }
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Contents of /etc/os-release, when the host has one
async fn read_os_release() -> std::result::Result<Option<String>, ProbeError> {
    match tokio::fs::read_to_string("/etc/os-release").await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ProbeError::Io(e)),
    }
}

/// Rendering/session identifiers from the environment
fn read_display_server() -> Option<String> {
    let mut parts = Vec::new();
    if let Ok(session) = std::env::var("XDG_SESSION_TYPE") {
        parts.push(session);
    }
    if std::env::var_os("WAYLAND_DISPLAY").is_some() {
        parts.push("wayland".to_string());
    }
    if std::env::var_os("DISPLAY").is_some() {
        parts.push("x11".to_string());
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

async fn path_exists(path: &str) -> std::result::Result<bool, ProbeError> {
    tokio::fs::try_exists(path).await.map_err(ProbeError::Io)
}

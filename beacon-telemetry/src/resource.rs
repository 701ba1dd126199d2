//! Host and operating system resource detection

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::resource::ResourceDetector;
use opentelemetry_semantic_conventions::resource::{HOST_ARCH, HOST_NAME, OS_NAME, OS_TYPE, OS_VERSION};
use serde::{Deserialize, Serialize};
use std::process::Command;

/// Map a raw machine architecture onto the semantic-convention spelling.
///
/// Unknown values pass through unchanged.
pub fn normalize_arch(raw: &str) -> &str {
    match raw {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "i386" | "i686" => "x86",
        other => other,
    }
}

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    Windows,
    Darwin,
    Other,
}

impl OsFamily {
    /// Classify an OS identifier such as `std::env::consts::OS`.
    pub fn classify(os: &str) -> Self {
        match os.to_lowercase().as_str() {
            "linux" => OsFamily::Linux,
            "windows" => OsFamily::Windows,
            "macos" | "darwin" => OsFamily::Darwin,
            _ => OsFamily::Other,
        }
    }
}

/// Static facts about the host, detected once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Normalized CPU architecture (`host.arch`)
    pub arch: String,
    /// Local host name (`host.name`)
    pub hostname: String,
    /// Lowercase OS identifier (`os.type`)
    pub os_type: String,
    /// Human-readable OS name (`os.name`)
    pub os_name: String,
    /// OS version (`os.version`)
    pub os_version: String,
}

impl HostInfo {
    /// Detect host facts. Never fails; lookups that are unavailable fall back
    /// to generic values.
    pub fn detect() -> Self {
        let os = std::env::consts::OS;
        let family = OsFamily::classify(os);
        let (os_name, os_version) = os_name_and_version(family, os);

        Self {
            arch: normalize_arch(std::env::consts::ARCH).to_string(),
            hostname: detect_hostname(),
            os_type: match family {
                OsFamily::Darwin => "darwin".to_string(),
                _ => os.to_lowercase(),
            },
            os_name,
            os_version,
        }
    }

    /// Resource attributes for these facts.
    pub fn attributes(&self) -> Vec<KeyValue> {
        vec![
            KeyValue::new(HOST_ARCH, self.arch.clone()),
            KeyValue::new(HOST_NAME, self.hostname.clone()),
            KeyValue::new(OS_TYPE, self.os_type.clone()),
            KeyValue::new(OS_NAME, self.os_name.clone()),
            KeyValue::new(OS_VERSION, self.os_version.clone()),
        ]
    }
}

fn detect_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "localhost".to_string())
}

fn os_name_and_version(family: OsFamily, os: &str) -> (String, String) {
    match family {
        OsFamily::Linux => {
            let release = std::fs::read_to_string("/etc/os-release")
                .map(|content| parse_os_release(&content))
                .unwrap_or_default();
            let kernel = || {
                std::fs::read_to_string("/proc/sys/kernel/osrelease")
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default()
            };
            (
                release.name.unwrap_or_else(|| "Linux".to_string()),
                release.version_id.unwrap_or_else(kernel),
            )
        }
        OsFamily::Windows => {
            let version = command_output("cmd", &["/C", "ver"])
                .and_then(|out| parse_windows_ver(&out))
                .unwrap_or_default();
            ("Windows".to_string(), version)
        }
        OsFamily::Darwin => {
            let version = command_output("sw_vers", &["-productVersion"]).unwrap_or_default();
            ("Mac OS X".to_string(), version)
        }
        OsFamily::Other => (capitalize(os), String::new()),
    }
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Fields of interest from an `os-release` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    pub name: Option<String>,
    pub version_id: Option<String>,
}

/// Parse `os-release` content (`KEY=value` lines, optional quoting).
pub fn parse_os_release(content: &str) -> OsRelease {
    let mut release = OsRelease::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'').to_string();
        match key.trim() {
            "NAME" => release.name = Some(value),
            "VERSION_ID" => release.version_id = Some(value),
            _ => {}
        }
    }

    release
}

/// Extract the version from `ver` output, e.g.
/// `Microsoft Windows [Version 10.0.19045.3803]`.
pub fn parse_windows_ver(output: &str) -> Option<String> {
    let start = output.find("Version ")? + "Version ".len();
    let rest = &output[start..];
    let end = rest.find(']').unwrap_or(rest.len());
    let version = rest[..end].trim();
    (!version.is_empty()).then(|| version.to_string())
}

/// Resource detector for host architecture, host name and operating system.
#[derive(Debug, Clone, Default)]
pub struct SystemResourceDetector {
    host: Option<HostInfo>,
}

impl SystemResourceDetector {
    /// Detector that reports already-known host facts.
    pub fn with_host(host: HostInfo) -> Self {
        Self { host: Some(host) }
    }
}

impl ResourceDetector for SystemResourceDetector {
    fn detect(&self) -> Resource {
        let host = self.host.clone().unwrap_or_else(HostInfo::detect);
        Resource::builder_empty()
            .with_attributes(host.attributes())
            .build()
    }
}

//! Local machine probes the update check depends on

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::process::Command;

/// Answers the update checker's questions about the local machine.
#[async_trait]
pub trait SystemProbe: Send + Sync {
    /// Installed editor version (`cursor --version`, first stdout line).
    async fn editor_version(&self) -> Option<String>;

    /// Machine architecture (`uname -m`).
    async fn machine_arch(&self) -> Option<String>;

    /// Stable per-device identifier (`/etc/machine-id`).
    async fn machine_id(&self) -> Option<String>;
}

/// Probe backed by the real host.
pub struct HostProbe;

#[async_trait]
impl SystemProbe for HostProbe {
    async fn editor_version(&self) -> Option<String> {
        let output = match Command::new("cursor").arg("--version").output().await {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!("cursor --version failed to spawn: {e}");
                return None;
            }
        };
        if !output.status.success() {
            tracing::debug!(
                "cursor --version exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout.lines().next().unwrap_or("").trim().to_string();
        if version.is_empty() {
            None
        } else {
            Some(version)
        }
    }

    async fn machine_arch(&self) -> Option<String> {
        let output = Command::new("uname").arg("-m").output().await.ok()?;
        if !output.status.success() {
            return None;
        }
        let arch = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if arch.is_empty() {
            None
        } else {
            Some(arch)
        }
    }

    async fn machine_id(&self) -> Option<String> {
        match tokio::fs::read_to_string("/etc/machine-id").await {
            Ok(content) => {
                let id = content.trim().to_string();
                if id.is_empty() {
                    None
                } else {
                    Some(id)
                }
            }
            Err(e) => {
                tracing::debug!("could not read machine id: {e}");
                None
            }
        }
    }
}

/// Map an architecture string to the update API's platform tag.
/// Unrecognized architectures fall back to the x64 baseline.
pub fn platform_tag(arch: &str) -> &'static str {
    match arch {
        "x86_64" => "linux-x64",
        "aarch64" | "arm64" => "linux-arm64",
        other => {
            tracing::debug!("unrecognized architecture {other:?}, defaulting to linux-x64");
            "linux-x64"
        }
    }
}

/// SHA-256 hex digest of the machine id, the per-device tag the update API
/// expects in its URL.
pub fn device_hash(machine_id: &str) -> String {
    let digest = Sha256::digest(machine_id.trim().as_bytes());
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_tag_mapping() {
        assert_eq!(platform_tag("x86_64"), "linux-x64");
        assert_eq!(platform_tag("aarch64"), "linux-arm64");
        assert_eq!(platform_tag("arm64"), "linux-arm64");
        assert_eq!(platform_tag("riscv64"), "linux-x64");
        assert_eq!(platform_tag(""), "linux-x64");
    }

    #[test]
    fn test_device_hash_is_stable_sha256() {
        // echo -n 'abc' | sha256sum
        assert_eq!(
            device_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        // Whitespace from the file read does not change the digest
        assert_eq!(device_hash("abc\n"), device_hash("abc"));
    }
}

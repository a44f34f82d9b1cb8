use std::fmt;

use tracing::warn;

const WINDOWS_DRIVER_URL: &str = "https://s3.amazonaws.com/static-files.lookingglassfactory.com/WebCalibrationBridge/LKG_ThreeJsDriver_Win.exe";
const MACOS_DRIVER_URL: &str = "https://s3.amazonaws.com/static-files.lookingglassfactory.com/WebCalibrationBridge/LKG_ThreeJsDriver_Mac.pkg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    MacOs,
    Unix,
    Linux,
    Unknown,
}

impl OsFamily {
    pub fn current() -> Self {
        Self::from_os_name(std::env::consts::OS)
    }

    pub fn from_os_name(os: &str) -> Self {
        match os {
            "windows" => Self::Windows,
            "macos" => Self::MacOs,
            "linux" | "android" => Self::Linux,
            "freebsd" | "openbsd" | "netbsd" | "dragonfly" | "solaris" | "illumos" => Self::Unix,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Unix => "unix",
            Self::Linux => "linux",
            Self::Unknown => "unknown",
        })
    }
}

/// Recovery action offered when the display bridge cannot be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeInstallHint {
    Download { os: OsFamily, url: &'static str },
    Unsupported { os: OsFamily },
}

impl BridgeInstallHint {
    pub fn for_os(os: OsFamily) -> Self {
        match os {
            OsFamily::Windows => Self::Download {
                os,
                url: WINDOWS_DRIVER_URL,
            },
            OsFamily::MacOs => Self::Download {
                os,
                url: MACOS_DRIVER_URL,
            },
            other => Self::Unsupported { os: other },
        }
    }
}

impl fmt::Display for BridgeInstallHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download { url, .. } => write!(
                f,
                "display bridge not detected; install it from {url} or make sure its port is open"
            ),
            Self::Unsupported { os } => write!(
                f,
                "display bridge not detected; no bridge build is published for {os} (windows and macos only)"
            ),
        }
    }
}

/// Where the operator is told about an unreachable bridge.
pub trait OperatorPrompt: Send + Sync {
    fn bridge_unreachable(&self, hint: &BridgeInstallHint);
}

/// Reports the install hint through the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPrompt;

impl OperatorPrompt for LogPrompt {
    fn bridge_unreachable(&self, hint: &BridgeInstallHint) {
        warn!("{hint}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_os_names() {
        assert_eq!(OsFamily::from_os_name("windows"), OsFamily::Windows);
        assert_eq!(OsFamily::from_os_name("macos"), OsFamily::MacOs);
        assert_eq!(OsFamily::from_os_name("linux"), OsFamily::Linux);
        assert_eq!(OsFamily::from_os_name("freebsd"), OsFamily::Unix);
        assert_eq!(OsFamily::from_os_name("haiku"), OsFamily::Unknown);
    }

    #[test]
    fn only_windows_and_macos_get_downloads() {
        assert!(matches!(
            BridgeInstallHint::for_os(OsFamily::Windows),
            BridgeInstallHint::Download { url, .. } if url.ends_with(".exe")
        ));
        assert!(matches!(
            BridgeInstallHint::for_os(OsFamily::MacOs),
            BridgeInstallHint::Download { url, .. } if url.ends_with(".pkg")
        ));
        assert_eq!(
            BridgeInstallHint::for_os(OsFamily::Linux),
            BridgeInstallHint::Unsupported {
                os: OsFamily::Linux
            }
        );
    }
}

use tracing::error;

/// Title used when the engine cannot be constructed.
pub const INIT_ERROR_TITLE: &str = "MPV Initialization Error";
/// Title used when a file could not be handed to the engine.
pub const LOAD_ERROR_TITLE: &str = "Error Loading Video";

/// User-facing error sink. Reports are fire-and-forget.
pub trait ErrorReporter: Send + Sync {
    fn report_error(&self, title: &str, message: &str);
}

/// Reporter that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report_error(&self, title: &str, message: &str) {
        error!(title, "{message}");
    }
}

/// Operating system families that get their own remediation advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFamily {
    MacOs,
    Linux,
    Windows,
    Other,
}

impl HostFamily {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Other
        }
    }
}

/// Advice shown when the engine cannot be constructed on this host.
pub fn remediation_message() -> String {
    remediation_for(HostFamily::current())
}

pub fn remediation_for(host: HostFamily) -> String {
    let advice = match host {
        HostFamily::MacOs => {
            "Make sure MPV is installed (e.g., via Homebrew) and that DYLD_LIBRARY_PATH includes its libraries.\n\n\
             You can test in Terminal:\n  echo $DYLD_LIBRARY_PATH\n  mpv --version"
        }
        HostFamily::Linux => {
            "Make sure MPV is installed and LD_LIBRARY_PATH (or PATH) includes its libraries.\n\n\
             Test in Terminal:\n  echo $LD_LIBRARY_PATH\n  mpv --version"
        }
        HostFamily::Windows => {
            "Make sure MPV is installed and the folder containing mpv.exe is in your PATH."
        }
        HostFamily::Other => "Make sure MPV is installed and available in your system PATH.",
    };
    format!("Failed to initialize MPV.\n\n{advice}")
}

/// Message shown when handing a file to the engine failed.
pub fn load_error_message(reason: &dyn std::fmt::Display) -> String {
    format!("Error loading file:\n{reason}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_host_family_gets_distinct_advice() {
        let hosts = [
            HostFamily::MacOs,
            HostFamily::Linux,
            HostFamily::Windows,
            HostFamily::Other,
        ];
        let messages: Vec<String> = hosts.into_iter().map(remediation_for).collect();

        for message in &messages {
            assert!(message.starts_with("Failed to initialize MPV."));
        }
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(messages[0].contains("DYLD_LIBRARY_PATH"));
        assert!(messages[1].contains("LD_LIBRARY_PATH"));
        assert!(messages[2].contains("mpv.exe"));
    }
}

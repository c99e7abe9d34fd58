use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Serial console parameters plus the remote command vocabulary.
/// 串口参数与远端命令配置，可从 TOML 文件加载，字段均有默认值。
///
/// The prompt marker is the sole termination condition for a transaction's
/// read loop; it must match the start of the remote login prompt exactly
/// (e.g. `root@orangepizero:`). There is no fallback framing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// Pause after sending the interrupt byte, letting the remote side react
    /// before the input buffer is discarded.
    pub cancel_settle_ms: u64,
    /// A response line starting with this string ends the transaction.
    pub prompt_marker: String,
    pub commands: RemoteCommands,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            read_timeout_ms: 1000,
            cancel_settle_ms: 500,
            prompt_marker: "root@orangepizero:".to_string(),
            commands: RemoteCommands::default(),
        }
    }
}

impl ConsoleConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn cancel_settle(&self) -> Duration {
        Duration::from_millis(self.cancel_settle_ms)
    }
}

/// The shell commands issued on the remote side, treated as opaque scripts.
/// They are inputs to the transaction runner, not something it interprets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteCommands {
    pub scan: String,
    /// `{ssid}` and `{password}` placeholders. Both substitutions must be
    /// shell-quoted by the caller; the runner sends the result verbatim.
    pub connect_template: String,
    pub status_query: String,
}

impl Default for RemoteCommands {
    fn default() -> Self {
        Self {
            scan: "bash /root/scan_wifi.sh".to_string(),
            connect_template: "nmcli dev wifi connect {ssid} password {password}".to_string(),
            status_query: "nmcli -t -f GENERAL.CONNECTION,IP4.ADDRESS device show wlan0 \
                           | grep 'GENERAL.CONNECTION\\|IP4.ADDRESS' --color=never"
                .to_string(),
        }
    }
}

impl RemoteCommands {
    /// Build the connect command from already-quoted SSID and password.
    pub fn connect_command(&self, quoted_ssid: &str, quoted_password: &str) -> String {
        self.connect_template
            .replace("{ssid}", quoted_ssid)
            .replace("{password}", quoted_password)
    }
}

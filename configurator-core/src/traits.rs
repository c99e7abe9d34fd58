use async_trait::async_trait;
use serde::Serialize;

// 在这里定义共享的数据结构，和为传输层与显示层定义的 trait。

/// Placeholder reported when a field could not be derived from status output.
pub const UNKNOWN: &str = "unknown";

/// Best-guess connection state derived from one status query.
/// 从一次状态查询中推断出的连接名与 IP 地址。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkStatus {
    pub connection: String,
    pub ip_address: String,
}

impl NetworkStatus {
    pub fn unknown() -> Self {
        Self {
            connection: UNKNOWN.to_string(),
            ip_address: UNKNOWN.to_string(),
        }
    }

    /// Whether the parser actually resolved an address worth displaying.
    pub fn has_address(&self) -> bool {
        self.ip_address != UNKNOWN
    }
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Byte-level seam under [`crate::session::Session`]. The real implementation
/// wraps a `serialport` handle; tests script one.
///
/// The channel is half-duplex in practice: one reader, one writer, and the
/// remote shell echoes what it receives.
pub trait ConsoleTransport: Send {
    fn send(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Read a single byte, blocking at most the configured per-read timeout.
    /// `Ok(None)` means the timeout elapsed with nothing to read.
    fn read_byte(&mut self) -> std::io::Result<Option<u8>>;

    /// Discard everything buffered but not yet read from the remote side.
    fn clear_input(&mut self) -> std::io::Result<()>;
}

/// 显示层接口。
/// Sink for everything the excluded UI layer renders: the raw terminal log,
/// the scanned network list, status labels, and the portal QR code.
#[async_trait]
pub trait DisplaySink: Send + Sync {
    /// Append raw transaction output (or a status line) to the log view.
    async fn append_log(&self, text: &str);

    /// Replace the list of available network names.
    async fn show_networks(&self, ssids: &[String]);

    /// Update the connection-status and IP-address labels.
    async fn show_status(&self, status: &NetworkStatus);

    /// Display the portal QR code, or clear it when `None`.
    async fn show_qr(&self, image: Option<&crate::qr::QrImage>);
}

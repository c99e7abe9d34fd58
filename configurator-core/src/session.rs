use crate::config::ConsoleConfig;
use crate::traits::ConsoleTransport;
use crate::{Error, Result};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Interrupt byte sent to the remote shell on cancellation (Ctrl-C).
const INTERRUPT: u8 = 0x03;

/// List the serial devices present on this machine, for device selection.
pub fn available_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(|e| Error::Io(e.into()))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Lifecycle of the single slot a session keeps for its current transaction.
/// `Cancelled` still occupies the slot: cancellation never aborts the read
/// loop, it only clears the transport buffer and waits for the remote prompt
/// to reappear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Sending,
    AwaitingMarker,
    Complete,
    Cancelled,
}

impl TransactionState {
    /// Whether the slot is taken and a new command must be refused.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            TransactionState::Sending
                | TransactionState::AwaitingMarker
                | TransactionState::Cancelled
        )
    }
}

/// Exclusive owner of one serial console channel.
/// 串口会话：独占一条到开发板的串口通道，所有命令都串行经过它。
///
/// All commands serialize through the session; at most one transaction is in
/// flight at a time (see [`TransactionState`]). The transport mutex is held
/// for at most one bounded read, so a cancel request interleaves with a
/// blocked read loop instead of waiting for the whole transaction.
pub struct Session {
    port_name: String,
    config: ConsoleConfig,
    pub(crate) transport: Arc<Mutex<Option<Box<dyn ConsoleTransport>>>>,
    pub(crate) state: Arc<Mutex<TransactionState>>,
}

impl Session {
    /// Open the named serial device at the configured baud rate (8N1, short
    /// per-read timeout).
    pub fn open(port_name: &str, config: ConsoleConfig) -> Result<Self> {
        let port = serialport::new(port_name, config.baud_rate)
            .timeout(config.read_timeout())
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .open()
            .map_err(|source| Error::OpenFailure {
                port: port_name.to_string(),
                source,
            })?;
        tracing::info!("serial console opened on {} at {} baud", port_name, config.baud_rate);
        Ok(Self::from_transport(
            port_name,
            Box::new(SerialTransport { port }),
            config,
        ))
    }

    /// Build a session over an arbitrary transport. Used by tests and by
    /// simulations that stand in for real hardware.
    pub fn from_transport(
        port_name: &str,
        transport: Box<dyn ConsoleTransport>,
        config: ConsoleConfig,
    ) -> Self {
        Self {
            port_name: port_name.to_string(),
            config,
            transport: Arc::new(Mutex::new(Some(transport))),
            state: Arc::new(Mutex::new(TransactionState::Idle)),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub async fn is_open(&self) -> bool {
        self.transport.lock().await.is_some()
    }

    pub async fn transaction_state(&self) -> TransactionState {
        *self.state.lock().await
    }

    /// Drop the serial channel. A transaction still waiting on its marker
    /// observes the closed channel at its next read and winds down.
    pub async fn close(&self) {
        if self.transport.lock().await.take().is_some() {
            tracing::info!("serial console on {} closed", self.port_name);
        }
        *self.state.lock().await = TransactionState::Idle;
    }

    /// Best-effort cancellation: send one interrupt byte, give the remote
    /// side a moment to react, then throw away whatever it already sent.
    ///
    /// This never aborts an in-flight read loop. If the interrupt kills the
    /// remote process, the prompt reappears and the pending transaction ends
    /// normally. A no-op on a closed session.
    pub async fn cancel(&self) -> Result<()> {
        {
            let mut guard = self.transport.lock().await;
            let Some(transport) = guard.as_mut() else {
                return Ok(());
            };
            transport.send(&[INTERRUPT])?;
        }
        {
            let mut state = self.state.lock().await;
            if state.is_in_flight() {
                *state = TransactionState::Cancelled;
            }
        }
        tracing::debug!("interrupt sent, waiting for the remote side to settle");
        tokio::time::sleep(self.config.cancel_settle()).await;
        if let Some(transport) = self.transport.lock().await.as_mut() {
            transport.clear_input()?;
        }
        Ok(())
    }
}

/// Real transport over a `serialport` handle.
struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl ConsoleTransport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.port.write_all(bytes)
    }

    fn read_byte(&mut self) -> std::io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn clear_input(&mut self) -> std::io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(|e| e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;

    fn session_with(transport: ScriptedTransport) -> (Session, std::sync::Arc<std::sync::Mutex<crate::testing::TransportLog>>) {
        let log = transport.log.clone();
        let session = Session::from_transport(
            "/dev/ttyUSB0",
            Box::new(transport),
            ConsoleConfig::default(),
        );
        (session, log)
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_sends_one_interrupt_and_clears_input() {
        let (session, log) = session_with(ScriptedTransport::new());
        session.cancel().await.unwrap();
        let log = log.lock().unwrap();
        assert_eq!(log.written, vec![0x03]);
        assert_eq!(log.input_clears, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_on_closed_session_is_a_noop() {
        let (session, log) = session_with(ScriptedTransport::new());
        session.close().await;
        session.cancel().await.unwrap();
        let log = log.lock().unwrap();
        assert!(log.written.is_empty());
        assert_eq!(log.input_clears, 0);
    }

    #[tokio::test]
    async fn close_resets_the_transaction_slot() {
        let (session, _log) = session_with(ScriptedTransport::new());
        assert_eq!(session.port_name(), "/dev/ttyUSB0");
        assert!(session.is_open().await);
        session.close().await;
        assert!(!session.is_open().await);
        assert_eq!(session.transaction_state().await, TransactionState::Idle);
    }
}

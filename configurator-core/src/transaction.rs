//! One command/response cycle against the remote shell.
//!
//! A transaction writes `command + "\n"`, then reads line by line until a
//! line starts with the configured prompt marker. That marker is the sole
//! termination condition: if it never arrives the loop blocks until the
//! channel is closed or the remote side recovers (an accepted property of
//! the delimiter-based design, not something this module papers over with a
//! transaction-wide timeout).

use crate::session::{Session, TransactionState};
use crate::traits::ConsoleTransport;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// What a running transaction reports back to its caller.
/// `Done` is always delivered after `Output`, even when the output was
/// empty, so the caller can tell "no data" from "still running".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEvent {
    Output(String),
    Done,
}

impl Session {
    /// Run `command` on the remote shell and stream back the result.
    ///
    /// Fails with [`Error::NotConnected`] (and performs no writes) when the
    /// channel is closed, and with [`Error::Busy`] while another transaction
    /// occupies the slot. The read loop runs on a blocking worker so the
    /// caller is never blocked.
    pub async fn execute(&self, command: &str) -> Result<mpsc::UnboundedReceiver<TransactionEvent>> {
        if self.transport.lock().await.is_none() {
            return Err(Error::NotConnected);
        }
        {
            let mut state = self.state.lock().await;
            if state.is_in_flight() {
                return Err(Error::Busy);
            }
            *state = TransactionState::Sending;
        }

        let (events, receiver) = mpsc::unbounded_channel();
        let transport = Arc::clone(&self.transport);
        let state = Arc::clone(&self.state);
        let marker = self.config().prompt_marker.clone();
        let command = command.to_string();
        tokio::task::spawn_blocking(move || {
            run_transaction(transport, state, marker, command, events)
        });
        Ok(receiver)
    }
}

fn run_transaction(
    transport: Arc<Mutex<Option<Box<dyn ConsoleTransport>>>>,
    state: Arc<Mutex<TransactionState>>,
    marker: String,
    command: String,
    events: mpsc::UnboundedSender<TransactionEvent>,
) {
    let outcome = collect_output(&transport, &state, &marker, &command);
    // Free the slot before signalling completion, so a caller reacting to
    // `Done` can immediately submit the next command.
    *state.blocking_lock() = TransactionState::Complete;
    match outcome {
        Ok(output) => {
            let _ = events.send(TransactionEvent::Output(output));
        }
        Err(e) => {
            tracing::warn!("serial transaction for {:?} failed: {}", command, e);
        }
    }
    let _ = events.send(TransactionEvent::Done);
}

fn collect_output(
    transport: &Mutex<Option<Box<dyn ConsoleTransport>>>,
    state: &Mutex<TransactionState>,
    marker: &str,
    command: &str,
) -> Result<String> {
    {
        let mut guard = transport.blocking_lock();
        let port = guard.as_mut().ok_or(Error::NotConnected)?;
        port.send(command.as_bytes())?;
        port.send(b"\n")?;
    }
    {
        let mut state = state.blocking_lock();
        if *state == TransactionState::Sending {
            *state = TransactionState::AwaitingMarker;
        }
    }

    let mut output = String::new();
    loop {
        // The lock is held for one bounded line read at most, so a cancel
        // request can interleave between lines.
        let line = {
            let mut guard = transport.blocking_lock();
            let Some(port) = guard.as_mut() else {
                tracing::debug!("channel closed while awaiting prompt marker");
                break;
            };
            read_line(port.as_mut())?
        };
        if line.starts_with(marker) {
            break;
        }
        // Drop the local echo of the command itself; keep everything else.
        if !line.starts_with(command) {
            output.push_str(&line);
        }
    }
    Ok(output)
}

/// Read one line, ending at `\n` or at the per-read timeout. A timeout
/// surfaces the partial line read so far; that is how the prompt, which has
/// no trailing newline, is ever matched.
fn read_line(port: &mut dyn ConsoleTransport) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        match port.read_byte()? {
            Some(b) => {
                bytes.push(b);
                if b == b'\n' {
                    break;
                }
            }
            None => break,
        }
    }
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsoleConfig;
    use crate::testing::ScriptedTransport;
    use std::time::Duration;

    const CMD: &str = "bash /root/scan_wifi.sh";

    fn open_session(transport: ScriptedTransport) -> (Session, std::sync::Arc<std::sync::Mutex<crate::testing::TransportLog>>) {
        let log = transport.log.clone();
        let session = Session::from_transport(
            "/dev/ttyUSB0",
            Box::new(transport),
            ConsoleConfig::default(),
        );
        (session, log)
    }

    async fn drain(mut rx: mpsc::UnboundedReceiver<TransactionEvent>) -> Vec<TransactionEvent> {
        let mut seen = Vec::new();
        while let Some(ev) = rx.recv().await {
            let done = ev == TransactionEvent::Done;
            seen.push(ev);
            if done {
                break;
            }
        }
        seen
    }

    #[tokio::test]
    async fn captures_lines_between_echo_and_marker() {
        let transport = ScriptedTransport::new()
            .feed(&format!("{CMD}\n"))
            .feed("HomeNet\n")
            .feed("CafeGuest\n")
            .feed("root@orangepizero:~# ")
            .feed_timeout();
        let (session, log) = open_session(transport);

        let events = drain(session.execute(CMD).await.unwrap()).await;
        assert_eq!(
            events,
            vec![
                TransactionEvent::Output("HomeNet\nCafeGuest\n".to_string()),
                TransactionEvent::Done,
            ]
        );
        assert_eq!(log.lock().unwrap().written, format!("{CMD}\n").into_bytes());
        assert_eq!(
            session.transaction_state().await,
            crate::session::TransactionState::Complete
        );
    }

    #[tokio::test]
    async fn empty_response_still_reports_output_then_done() {
        let transport = ScriptedTransport::new()
            .feed(&format!("{CMD}\n"))
            .feed("root@orangepizero:~# ")
            .feed_timeout();
        let (session, _log) = open_session(transport);

        let events = drain(session.execute(CMD).await.unwrap()).await;
        assert_eq!(
            events,
            vec![
                TransactionEvent::Output(String::new()),
                TransactionEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn timeouts_between_lines_do_not_end_the_transaction() {
        // The remote side stalls twice before producing anything; the loop
        // keeps waiting for the marker instead of giving up.
        let transport = ScriptedTransport::new()
            .feed_timeout()
            .feed_timeout()
            .feed("10.0.0.5\n")
            .feed("root@orangepizero:~# ")
            .feed_timeout();
        let (session, _log) = open_session(transport);

        let events = drain(session.execute("cat /tmp/ip").await.unwrap()).await;
        assert_eq!(
            events[0],
            TransactionEvent::Output("10.0.0.5\n".to_string())
        );
    }

    #[tokio::test]
    async fn execute_on_closed_session_fails_without_writing() {
        let (session, log) = open_session(ScriptedTransport::new());
        session.close().await;

        let err = session.execute(CMD).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert!(log.lock().unwrap().written.is_empty());
    }

    #[tokio::test]
    async fn second_command_is_refused_while_one_is_in_flight() {
        let transport = ScriptedTransport::new()
            .with_read_delay(Duration::from_millis(50))
            .feed_timeout()
            .feed_timeout()
            .feed("root@orangepizero:~# ")
            .feed_timeout();
        let (session, _log) = open_session(transport);

        let first = session.execute(CMD).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let err = session.execute("nmcli dev").await.unwrap_err();
        assert!(matches!(err, Error::Busy));

        // The refused command must not have broken the running one.
        let events = drain(first).await;
        assert_eq!(events.last(), Some(&TransactionEvent::Done));
    }

    #[tokio::test]
    async fn transport_failure_still_delivers_done() {
        // Script runs dry with no marker: the read errors out, output is
        // dropped, but the completion notification still arrives.
        let transport = ScriptedTransport::new().feed("partial");
        let (session, _log) = open_session(transport);

        let events = drain(session.execute(CMD).await.unwrap()).await;
        assert_eq!(events, vec![TransactionEvent::Done]);
        assert_eq!(
            session.transaction_state().await,
            crate::session::TransactionState::Complete
        );
    }
}

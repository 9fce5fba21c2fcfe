//! MI broker - manages communication with one GDB process
//!
//! The broker handles:
//! - Line framing and record decoding
//! - Command token generation
//! - Request/response correlation
//! - Serial forwarding of out-of-band records to the notification channel

use crate::constants::GDB_EXIT;
use crate::error::{Error, Result};
use crate::mi::{MiCommand, MiRecord, MiValue, ResultClass};
use remotedbg_config::AdapterTimeouts;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tracing::{debug, trace, warn};

/// Reply to one MI command. `^error` replies are converted to `Err`
/// before callers see them, so the class here is never `Error`.
#[derive(Debug, Clone, PartialEq)]
pub struct MiResult {
    pub class: ResultClass,
    pub payload: MiValue,
}

/// Channel for sending replies back to request callers
type ResponseSender = oneshot::Sender<Result<MiResult>>;

/// MI broker for a single GDB process
///
/// Out-of-band records (exec-async, notify, status, target output) are
/// forwarded to one notification channel in the exact order GDB emitted
/// them; the reader blocks on a full channel rather than reorder or drop.
pub struct MiBroker {
    /// Next command token
    next_token: Mutex<u64>,

    /// Pending commands awaiting replies (keyed by token)
    pending: Arc<RwLock<HashMap<u64, ResponseSender>>>,

    /// GDB stdin (for sending commands)
    stdin: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,

    /// Reader task handle (for shutdown)
    reader_task: Option<tokio::task::JoinHandle<()>>,

    timeouts: AdapterTimeouts,
}

impl MiBroker {
    /// Create a broker over the given I/O streams
    ///
    /// `notifications` receives every out-of-band record until the GDB
    /// side closes, at which point the channel closes too.
    pub fn new<R, W>(
        reader: R,
        writer: W,
        notifications: mpsc::Sender<MiRecord>,
        timeouts: AdapterTimeouts,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: Arc<RwLock<HashMap<u64, ResponseSender>>> =
            Arc::new(RwLock::new(HashMap::new()));
        let reader_task = Self::spawn_reader_task(reader, pending.clone(), notifications);

        Self {
            next_token: Mutex::new(1),
            pending,
            stdin: Mutex::new(Box::new(writer) as Box<dyn AsyncWrite + Send + Unpin>),
            reader_task: Some(reader_task),
            timeouts,
        }
    }

    async fn next_token(&self) -> u64 {
        let mut token = self.next_token.lock().await;
        let current = *token;
        *token += 1;
        current
    }

    /// Send a command and wait for its reply
    ///
    /// `^error` replies become `Err(Protocol)`; no reply within the
    /// configured window becomes `Err(Timeout)`.
    #[tracing::instrument(skip(self, command), fields(operation = command.operation(), token = tracing::field::Empty))]
    pub async fn send_request(&self, command: MiCommand) -> Result<MiResult> {
        let token = self.next_token().await;
        tracing::Span::current().record("token", token);
        debug!("Sending MI command");

        // Register before sending so a fast reply cannot slip past
        let (tx, rx) = oneshot::channel();
        self.pending.write().await.insert(token, tx);

        if let Err(e) = self.write_line(&command.render(token)).await {
            self.pending.write().await.remove(&token);
            return Err(e);
        }

        let timeout_ms = self.timeouts.request_timeout_ms;
        match tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(Error::Communication("Reply channel closed".to_string())),
            Err(_) => {
                self.pending.write().await.remove(&token);
                warn!(timeout_ms, "MI command timed out");
                Err(Error::Timeout(timeout_ms))
            }
        }
    }

    /// Send a command without waiting; the reply is logged when it arrives.
    ///
    /// Used for execution-control commands whose observable effect is the
    /// `*running`/`*stopped` records, not the `^done` acknowledgment.
    pub fn send_background(self: &Arc<Self>, command: MiCommand) {
        let broker = Arc::clone(self);
        tokio::spawn(async move {
            let operation = command.operation();
            if let Err(e) = broker.send_request(command).await {
                warn!(operation, error = %e, "Background MI command failed");
            }
        });
    }

    /// Best-effort `-gdb-exit`; used during teardown when the process may
    /// already be gone
    pub async fn send_exit(&self) {
        let token = self.next_token().await;
        if let Err(e) = self.write_line(&MiCommand::new(GDB_EXIT).render(token)).await {
            debug!(error = %e, "gdb-exit not delivered");
        }
    }

    /// Number of commands still awaiting replies
    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    /// False once the reader task has exited (GDB died or closed its pipe)
    pub fn is_alive(&self) -> bool {
        match &self.reader_task {
            Some(handle) => !handle.is_finished(),
            None => false,
        }
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        trace!(line = line.trim_end(), "Sent MI line");
        Ok(())
    }

    /// Background task decoding records and routing them
    fn spawn_reader_task<R>(
        reader: R,
        pending: Arc<RwLock<HashMap<u64, ResponseSender>>>,
        notifications: mpsc::Sender<MiRecord>,
    ) -> tokio::task::JoinHandle<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        tokio::spawn(async move {
            debug!("MI reader task started");
            let mut lines = BufReader::new(reader).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        trace!(line = %line, "Received MI line");
                        let record = match MiRecord::parse_line(&line) {
                            Ok(record) => record,
                            Err(e) => {
                                warn!(line = %line, error = %e, "Undecodable MI line");
                                continue;
                            }
                        };
                        if !Self::route_record(record, &pending, &notifications).await {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("GDB closed its output (EOF)");
                        break;
                    }
                    Err(e) => {
                        debug!(error = %e, "GDB read error");
                        break;
                    }
                }
            }

            // Fail whatever is still waiting; dropping `notifications`
            // afterwards closes the channel for the adapter side
            let mut pending = pending.write().await;
            for (_, tx) in pending.drain() {
                let _ = tx.send(Err(Error::Communication("GDB disconnected".to_string())));
            }
            debug!("MI reader task finished");
        })
    }

    /// Route one record. Returns false when the notification channel is
    /// gone and reading should stop.
    async fn route_record(
        record: MiRecord,
        pending: &Arc<RwLock<HashMap<u64, ResponseSender>>>,
        notifications: &mpsc::Sender<MiRecord>,
    ) -> bool {
        match record {
            MiRecord::Result {
                token: Some(token),
                class,
                payload,
            } => {
                let reply = if class == ResultClass::Error {
                    let msg = payload
                        .get_str("msg")
                        .unwrap_or("unknown error")
                        .to_string();
                    Err(Error::Protocol(msg))
                } else {
                    Ok(MiResult { class, payload })
                };
                let mut pending = pending.write().await;
                match pending.remove(&token) {
                    Some(tx) => {
                        if tx.send(reply).is_err() {
                            warn!(token, "Reply receiver dropped");
                        }
                    }
                    None => warn!(token, "Reply for unknown token"),
                }
                true
            }
            MiRecord::Result { token: None, .. } => {
                // Untokened results come from commands we did not send
                warn!("Result record without token");
                true
            }
            MiRecord::Prompt => true,
            MiRecord::Console(text) => {
                trace!(text = %text, "GDB console");
                true
            }
            MiRecord::Log(text) => {
                trace!(text = %text, "GDB log");
                true
            }
            // ExecAsync, Notify, Status, Target: ordered delivery matters.
            // Blocking here (rather than try_send) keeps emission order and
            // applies backpressure to the reader.
            record => notifications.send(record).await.is_ok(),
        }
    }
}

impl Drop for MiBroker {
    fn drop(&mut self) {
        if let Some(handle) = self.reader_task.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{BREAK_INSERT, EXEC_RUN, THREAD_INFO};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, DuplexStream};

    fn timeouts(ms: u64) -> AdapterTimeouts {
        AdapterTimeouts {
            request_timeout_ms: ms,
            ..AdapterTimeouts::default()
        }
    }

    fn test_broker(
        timeout_ms: u64,
    ) -> (MiBroker, DuplexStream, mpsc::Receiver<MiRecord>) {
        let (client, server) = tokio::io::duplex(8192);
        let (read, write) = tokio::io::split(client);
        let (tx, rx) = mpsc::channel(64);
        (MiBroker::new(read, write, tx, timeouts(timeout_ms)), server, rx)
    }

    /// Fake GDB: answers each incoming command with `script(operation, rest)`
    fn scripted_gdb<F>(server: DuplexStream, script: F)
    where
        F: Fn(&str, &str) -> Vec<String> + Send + 'static,
    {
        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut lines = BufReader::new(read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let (token, rest) = line.split_at(line.find('-').unwrap());
                let rest = &rest[1..];
                let (operation, args) = match rest.split_once(' ') {
                    Some((op, args)) => (op, args),
                    None => (rest, ""),
                };
                for reply in script(operation, args) {
                    let reply = reply.replace("{token}", token);
                    write.write_all(reply.as_bytes()).await.unwrap();
                    write.write_all(b"\n").await.unwrap();
                }
                write.flush().await.unwrap();
            }
        });
    }

    #[tokio::test]
    async fn request_reply_correlation() {
        let (broker, server, _rx) = test_broker(1000);
        scripted_gdb(server, |operation, args| {
            assert_eq!(operation, BREAK_INSERT);
            assert_eq!(args, "/box/main.c:10");
            vec![
                r#"{token}^done,bkpt={number="1",line="10"}"#.to_string(),
                "(gdb)".to_string(),
            ]
        });

        let reply = broker
            .send_request(MiCommand::new(BREAK_INSERT).arg("/box/main.c:10"))
            .await
            .unwrap();
        assert_eq!(reply.class, ResultClass::Done);
        assert_eq!(reply.payload.get("bkpt").unwrap().get_str("number"), Some("1"));
        assert_eq!(broker.pending_count().await, 0);
    }

    #[tokio::test]
    async fn error_reply_becomes_protocol_error() {
        let (broker, server, _rx) = test_broker(1000);
        scripted_gdb(server, |_, _| {
            vec![r#"{token}^error,msg="No symbol \"x\" in current context.""#.to_string()]
        });

        let err = broker
            .send_request(MiCommand::new(THREAD_INFO))
            .await
            .unwrap_err();
        match err {
            Error::Protocol(msg) => assert!(msg.contains("No symbol")),
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn request_times_out_without_reply() {
        let (broker, _server, _rx) = test_broker(50);
        let err = broker
            .send_request(MiCommand::new(THREAD_INFO))
            .await
            .unwrap_err();
        assert_eq!(err, Error::Timeout(50));
        assert_eq!(broker.pending_count().await, 0);
    }

    #[tokio::test]
    async fn out_of_band_records_forwarded_in_order() {
        let (_broker, server, mut rx) = test_broker(1000);

        let (read, mut write) = tokio::io::split(server);
        let _keep = read;
        write
            .write_all(
                concat!(
                    "*running,thread-id=\"all\"\n",
                    "@\"line one\"\n",
                    "~\"console noise\"\n",
                    "*stopped,reason=\"end-stepping-range\"\n",
                )
                .as_bytes(),
            )
            .await
            .unwrap();
        write.flush().await.unwrap();

        // Console records are swallowed; order of the rest is preserved
        match rx.recv().await.unwrap() {
            MiRecord::ExecAsync { class, .. } => assert_eq!(class, "running"),
            other => panic!("unexpected record {:?}", other),
        }
        assert_eq!(rx.recv().await.unwrap(), MiRecord::Target("line one".into()));
        match rx.recv().await.unwrap() {
            MiRecord::ExecAsync { class, .. } => assert_eq!(class, "stopped"),
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[tokio::test]
    async fn disconnect_fails_pending_and_closes_channel() {
        let (broker, server, mut rx) = test_broker(5_000);

        let request = tokio::spawn({
            let broker = Arc::new(broker);
            let broker2 = Arc::clone(&broker);
            async move { broker2.send_request(MiCommand::new(EXEC_RUN)).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        drop(server);

        let err = request.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Communication(_)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn concurrent_requests_resolve_independently() {
        let (broker, server, _rx) = test_broker(1000);
        scripted_gdb(server, |operation, _| {
            vec![format!(r#"{{token}}^done,op="{}""#, operation)]
        });

        let broker = Arc::new(broker);
        let (r1, r2) = tokio::join!(
            broker.send_request(MiCommand::new(THREAD_INFO)),
            broker.send_request(MiCommand::new(BREAK_INSERT).arg("x")),
        );
        assert_eq!(r1.unwrap().payload.get_str("op"), Some(THREAD_INFO));
        assert_eq!(r2.unwrap().payload.get_str("op"), Some(BREAK_INSERT));
    }
}

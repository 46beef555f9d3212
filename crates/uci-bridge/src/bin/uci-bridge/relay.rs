use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::io::BufRead;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uci_bridge::{BridgeConfig, EngineSupervisor, OutputSink, WriterSink};

/// How often the relay notices that the engine exited on its own
const LIVENESS_INTERVAL: Duration = Duration::from_millis(250);

/// Largest command datagram accepted from a UDP client
const MAX_DATAGRAM: usize = 4096;

/// Relay stdin lines to the engine and engine lines to stdout
pub async fn run_stdio(config: BridgeConfig) -> Result<()> {
    let supervisor = EngineSupervisor::new(config, WriterSink::stdout());
    if !supervisor.start().await {
        bail!("engine failed to start");
    }

    let mut commands = spawn_stdin_reader();
    let mut liveness = tokio::time::interval(LIVENESS_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => supervisor.send_command(&command).await,
                None => {
                    info!("Input closed");
                    break;
                }
            },
            _ = liveness.tick() => {
                if !supervisor.is_running().await {
                    info!("Engine exited");
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    supervisor.stop().await;
    Ok(())
}

/// Read stdin on a plain thread so a pending read never holds up shutdown
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

/// Sends each engine line as one datagram to the most recent client
pub struct DatagramSink {
    socket: Arc<UdpSocket>,
    client: watch::Receiver<Option<SocketAddr>>,
}

impl DatagramSink {
    pub fn new(socket: Arc<UdpSocket>, client: watch::Receiver<Option<SocketAddr>>) -> Self {
        Self { socket, client }
    }
}

#[async_trait]
impl OutputSink for DatagramSink {
    async fn emit(&self, line: String) {
        let target = *self.client.borrow();
        match target {
            Some(addr) => {
                if let Err(e) = self.socket.send_to(line.as_bytes(), addr).await {
                    warn!("Failed to send output to {}: {}", addr, e);
                }
            }
            None => debug!("No UDP client yet, dropping: {}", line),
        }
    }
}

/// Strip the line terminator a client may have sent with its command
/// Command carried by one datagram, or `None` when it exceeded `MAX_DATAGRAM`
fn datagram_command(payload: &[u8]) -> Option<String> {
    if payload.len() > MAX_DATAGRAM {
        return None;
    }

    Some(
        String::from_utf8_lossy(payload)
            .trim_end_matches(['\r', '\n'])
            .to_string(),
    )
}

/// Relay UDP datagrams to the engine, starting it on the first datagram
pub async fn run_udp(config: BridgeConfig, addr: SocketAddr) -> Result<()> {
    let socket = Arc::new(
        UdpSocket::bind(addr)
            .await
            .with_context(|| format!("Failed to listen on {addr}"))?,
    );
    info!("Listening for commands on {}", socket.local_addr()?);

    let (client_tx, client_rx) = watch::channel(None);
    let supervisor = EngineSupervisor::new(config, DatagramSink::new(socket.clone(), client_rx));

    // One spare byte tells an oversized datagram from one that fits exactly
    let mut buffer = vec![0u8; MAX_DATAGRAM + 1];
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            received = socket.recv_from(&mut buffer) => {
                let (n, from) = match received {
                    Ok(received) => received,
                    Err(e) => break Err(anyhow::Error::new(e).context("Failed to receive datagram")),
                };
                debug!("Received {} bytes from {}", n, from);
                client_tx.send_replace(Some(from));

                let Some(command) = datagram_command(&buffer[..n]) else {
                    warn!("Dropping datagram from {} larger than {} bytes", from, MAX_DATAGRAM);
                    continue;
                };

                if !supervisor.start().await {
                    break Err(anyhow::anyhow!("engine failed to start"));
                }
                supervisor.send_command(&command).await;
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break Ok(());
            }
        }
    };

    supervisor.stop().await;
    outcome
}

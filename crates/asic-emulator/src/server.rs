//! Emulator server sharing one register model between every client.
//!
//! All transactions funnel through a single processor thread that owns the
//! [`RegisterModel`], so requests from different clients are applied
//! strictly in arrival order and never interleave. Each connection gets a
//! reader thread feeding the processor and a writer thread draining its
//! replies. A monitor thread tracks which peers are connected.

use std::collections::{BTreeSet, HashMap};
use std::io::{self, BufReader};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use asic_model::{ModelSnapshot, RegisterModel};
use crossbeam_channel as cbc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::codec::{self, Frame};
use crate::{EmulatorConfig, ServerError};

/// Connection liveness report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    /// At least one client is connected.
    pub connected: bool,
    /// Peer addresses of the connected clients, sorted.
    pub clients: Vec<String>,
}

enum Request {
    Transaction {
        frame: Frame,
        reply: cbc::Sender<Frame>,
    },
    Snapshot {
        reply: cbc::Sender<ModelSnapshot>,
    },
    Stop,
}

enum ConnectionEvent {
    Accepted(SocketAddr),
    Disconnected(SocketAddr),
    Stop,
}

/// Pause after a failed `accept` so persistent failures such as descriptor
/// exhaustion do not spin the accept loop.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

type Connections = Arc<Mutex<HashMap<SocketAddr, TcpStream>>>;
type Workers = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// Running emulator server.
///
/// Dropping the server shuts it down.
#[derive(Debug)]
pub struct EmulatorServer {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    requests: cbc::Sender<Request>,
    events: cbc::Sender<ConnectionEvent>,
    clients: Arc<Mutex<BTreeSet<SocketAddr>>>,
    connections: Connections,
    workers: Workers,
    acceptor: Option<JoinHandle<()>>,
    processor: Option<JoinHandle<()>>,
    monitor: Option<JoinHandle<()>>,
}

impl EmulatorServer {
    /// Binds `config.endpoint` and starts serving a fresh register model.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the endpoint cannot be bound and
    /// [`ServerError::Spawn`] if a server thread cannot be started.
    pub fn bind(config: &EmulatorConfig) -> Result<Self, ServerError> {
        let listener =
            TcpListener::bind(&config.endpoint).map_err(|source| ServerError::Bind {
                endpoint: config.endpoint.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        let (requests, request_rx) = cbc::unbounded();
        let (events, event_rx) = cbc::unbounded();
        let clients = Arc::new(Mutex::new(BTreeSet::new()));
        let running = Arc::new(AtomicBool::new(true));
        let connections: Connections = Arc::default();
        let workers: Workers = Arc::default();

        let model = RegisterModel::with_config(config.model_config());
        let processor = spawn("processor", move || run_processor(model, &request_rx))?;

        let monitor = {
            let clients = Arc::clone(&clients);
            spawn("monitor", move || run_monitor(&event_rx, &clients))?
        };

        let acceptor = {
            let acceptor = Acceptor {
                listener,
                running: Arc::clone(&running),
                requests: requests.clone(),
                events: events.clone(),
                connections: Arc::clone(&connections),
                workers: Arc::clone(&workers),
            };
            spawn("acceptor", move || acceptor.run())?
        };

        info!(%local_addr, "emulator server listening");

        Ok(Self {
            local_addr,
            running,
            requests,
            events,
            clients,
            connections,
            workers,
            acceptor: Some(acceptor),
            processor: Some(processor),
            monitor: Some(monitor),
        })
    }

    /// Address the server is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Peers with an open connection.
    #[must_use]
    pub fn connected_clients(&self) -> BTreeSet<SocketAddr> {
        self.clients.lock().clone()
    }

    /// Connection liveness report.
    #[must_use]
    pub fn status(&self) -> ServerStatus {
        let clients: Vec<String> = self
            .clients
            .lock()
            .iter()
            .map(ToString::to_string)
            .collect();
        ServerStatus {
            connected: !clients.is_empty(),
            clients,
        }
    }

    /// Captures the model state, ordered after every transaction already
    /// received.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ProcessorStopped`] once the server is shut
    /// down.
    pub fn snapshot(&self) -> Result<ModelSnapshot, ServerError> {
        let (reply, snapshot) = cbc::bounded(1);
        self.requests
            .send(Request::Snapshot { reply })
            .map_err(|_| ServerError::ProcessorStopped)?;
        snapshot.recv().map_err(|_| ServerError::ProcessorStopped)
    }

    /// Register array contents indexed by true address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ProcessorStopped`] once the server is shut
    /// down.
    pub fn registers(&self) -> Result<Vec<u8>, ServerError> {
        Ok(self.snapshot()?.registers)
    }

    /// Blocks until the accept loop exits.
    pub fn wait(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            join("acceptor", acceptor);
        }
    }

    /// Stops accepting, closes every connection and stops the processor
    /// and monitor threads.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        info!(local_addr = %self.local_addr, "emulator server shutting down");

        if let Some(acceptor) = self.acceptor.take() {
            match TcpStream::connect(wake_address(self.local_addr)) {
                Ok(_) => join("acceptor", acceptor),
                Err(err) => warn!(%err, "failed to wake accept loop, leaving it detached"),
            }
        }

        for (peer, stream) in self.connections.lock().drain() {
            if let Err(err) = stream.shutdown(Shutdown::Both) {
                debug!(%peer, %err, "connection already closed");
            }
        }
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            join("connection", worker);
        }

        let _ = self.requests.send(Request::Stop);
        if let Some(processor) = self.processor.take() {
            join("processor", processor);
        }
        let _ = self.events.send(ConnectionEvent::Stop);
        if let Some(monitor) = self.monitor.take() {
            join("monitor", monitor);
        }
    }
}

impl Drop for EmulatorServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Applies one request frame to `model` and builds the reply.
///
/// A payload that is not a serialized transaction is logged and echoed back
/// unchanged. Model faults are absorbed by
/// [`RegisterModel::process_transaction`].
pub fn process_frame(model: &mut RegisterModel, frame: &Frame) -> Frame {
    let transaction = match codec::decode_transaction(&frame.payload) {
        Ok(transaction) => transaction,
        Err(err) => {
            warn!(%err, "failed to decode transaction, echoing payload");
            return frame.reply(frame.payload.clone());
        }
    };

    let response = model.process_transaction(transaction);
    match codec::encode_transaction(&response) {
        Ok(payload) => frame.reply(payload),
        Err(err) => {
            error!(%err, "failed to encode response, echoing payload");
            frame.reply(frame.payload.clone())
        }
    }
}

fn run_processor(mut model: RegisterModel, requests: &cbc::Receiver<Request>) {
    for request in requests {
        match request {
            Request::Transaction { frame, reply } => {
                let response = process_frame(&mut model, &frame);
                let _ = reply.send(response);
            }
            Request::Snapshot { reply } => {
                let _ = reply.send(model.snapshot());
            }
            Request::Stop => break,
        }
    }
    debug!("register model processor stopped");
}

fn run_monitor(events: &cbc::Receiver<ConnectionEvent>, clients: &Mutex<BTreeSet<SocketAddr>>) {
    for event in events {
        match event {
            ConnectionEvent::Accepted(peer) => {
                clients.lock().insert(peer);
                info!(%peer, "client connected");
            }
            ConnectionEvent::Disconnected(peer) => {
                clients.lock().remove(&peer);
                info!(%peer, "client disconnected");
            }
            ConnectionEvent::Stop => break,
        }
    }
    debug!("connection monitor stopped");
}

struct Acceptor {
    listener: TcpListener,
    running: Arc<AtomicBool>,
    requests: cbc::Sender<Request>,
    events: cbc::Sender<ConnectionEvent>,
    connections: Connections,
    workers: Workers,
}

impl Acceptor {
    fn run(self) {
        loop {
            let accepted = self.listener.accept();
            if !self.running.load(Ordering::Acquire) {
                break;
            }
            match accepted {
                Ok((stream, peer)) => {
                    if let Err(err) = self.open(stream, peer) {
                        warn!(%err, "dropping connection");
                    }
                }
                Err(err) => accept_failed(&err),
            }
        }
        debug!("accept loop stopped");
    }

    fn open(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), ServerError> {
        let connection_error = |source| ServerError::Connection { peer, source };
        stream.set_nodelay(true).map_err(connection_error)?;
        let writer_stream = stream.try_clone().map_err(connection_error)?;
        let control_stream = stream.try_clone().map_err(connection_error)?;

        self.connections.lock().insert(peer, control_stream);
        let _ = self.events.send(ConnectionEvent::Accepted(peer));

        let spawned = self.spawn_workers(stream, writer_stream, peer);
        if spawned.is_err() {
            self.connections.lock().remove(&peer);
            let _ = self.events.send(ConnectionEvent::Disconnected(peer));
        }
        spawned
    }

    fn spawn_workers(
        &self,
        reader_stream: TcpStream,
        writer_stream: TcpStream,
        peer: SocketAddr,
    ) -> Result<(), ServerError> {
        let (reply, replies) = cbc::unbounded();
        let writer = spawn("writer", move || run_writer(writer_stream, &replies, peer))?;

        let reader = {
            let requests = self.requests.clone();
            let events = self.events.clone();
            let connections = Arc::clone(&self.connections);
            spawn("reader", move || {
                run_reader(reader_stream, peer, &requests, &reply);
                connections.lock().remove(&peer);
                let _ = events.send(ConnectionEvent::Disconnected(peer));
            })?
        };

        let mut workers = self.workers.lock();
        workers.retain(|worker| !worker.is_finished());
        workers.extend([reader, writer]);
        Ok(())
    }
}

fn run_reader(
    stream: TcpStream,
    peer: SocketAddr,
    requests: &cbc::Sender<Request>,
    reply: &cbc::Sender<Frame>,
) {
    let mut reader = BufReader::new(stream);
    loop {
        match codec::read_frame(&mut reader) {
            Ok(Some(frame)) => {
                let request = Request::Transaction {
                    frame,
                    reply: reply.clone(),
                };
                if requests.send(request).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(%peer, %err, "closing connection after frame error");
                break;
            }
        }
    }
}

fn run_writer(mut stream: TcpStream, replies: &cbc::Receiver<Frame>, peer: SocketAddr) {
    for frame in replies {
        if let Err(err) = codec::write_frame(&mut stream, &frame) {
            warn!(%peer, %err, "failed to send reply");
            break;
        }
    }
}

fn spawn<F>(name: &'static str, body: F) -> Result<JoinHandle<()>, ServerError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(format!("asic-{name}"))
        .spawn(body)
        .map_err(|source| ServerError::Spawn { name, source })
}

fn accept_failed(err: &io::Error) {
    warn!(%err, "failed to accept connection");
    thread::sleep(ACCEPT_RETRY_DELAY);
}

fn join(name: &str, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!(thread = name, "server thread panicked");
    }
}

const fn wake_address(local_addr: SocketAddr) -> SocketAddr {
    match local_addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), local_addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), local_addr.port())
        }
        _ => local_addr,
    }
}

//! TCP transport for the FTL simple protocol
//!
//! One server task owns the listener, the client registry and every
//! session's line buffer. Connection tasks only shuttle bytes between
//! their socket and the server task, so parsing and event delivery are
//! serialized without locks: lines from one read are dispatched in order,
//! and reads from different clients interleave only as whole chunks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ftl_core::{CommsProtocol, Error, EventBus, Lifecycle, Result};
use ftl_protocol::Outbound;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{DeliveryPolicy, ServerConfig};
use crate::handler::ConnectionHandler;
use crate::registry::{ClientRegistry, Session};

const PROTOCOL_TYPE: &str = "FTLSimpleProtocol";

/// Pause after a failed accept before polling the listener again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Requests from the protocol handle to the server task
enum Control {
    Listen(TcpListener),
    Unlisten(oneshot::Sender<()>),
    Deliver(Bytes),
    Clients(oneshot::Sender<Vec<SocketAddr>>),
}

/// Notifications from connection tasks to the server task
enum SessionEvent {
    Data { id: u64, data: Bytes },
    Closed { id: u64 },
}

/// The built-in line protocol over TCP
///
/// ```text
/// D:<port>:<value>   Digital I/O
/// A:<port>:<value>   Analog I/O
/// P:<port>:<value>   PWM output
/// S:<message>        System message
/// RC:<message>       Robot command
/// RC:EN / RC:DS      Enable / disable robot
/// ```
pub struct SimpleProtocol {
    config: ServerConfig,
    bus: Arc<EventBus>,
    state: Mutex<ServerState>,
}

#[derive(Default)]
struct ServerState {
    lifecycle: Lifecycle,
    /// Present once the server task has been spawned
    control: Option<mpsc::UnboundedSender<Control>>,
    local_addr: Option<SocketAddr>,
}

impl SimpleProtocol {
    pub fn new(port: u16) -> Self {
        Self::with_config(ServerConfig::with_port(port))
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            bus: Arc::new(EventBus::new()),
            state: Mutex::new(ServerState::default()),
        }
    }

    /// Configured port
    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Address the listener is bound to while started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.lock().local_addr
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lock().lifecycle
    }

    /// Peer addresses of connected clients, in connection order
    pub async fn clients(&self) -> Vec<SocketAddr> {
        let Some(control) = self.control() else {
            return Vec::new();
        };

        let (tx, rx) = oneshot::channel();
        if control.send(Control::Clients(tx)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn client_count(&self) -> usize {
        self.clients().await.len()
    }

    fn control(&self) -> Option<mpsc::UnboundedSender<Control>> {
        self.state.lock().control.clone()
    }

    fn deliver(&self, line: Outbound) {
        match self.control() {
            Some(control) => {
                if control.send(Control::Deliver(line.encode().freeze())).is_err() {
                    warn!(line = ?line, "Server task stopped, dropping outbound line");
                }
            }
            None => debug!(line = ?line, "Protocol never started, dropping outbound line"),
        }
    }
}

impl Default for SimpleProtocol {
    fn default() -> Self {
        Self::with_config(ServerConfig::default())
    }
}

#[async_trait]
impl CommsProtocol for SimpleProtocol {
    fn protocol_type(&self) -> &'static str {
        PROTOCOL_TYPE
    }

    fn events(&self) -> &EventBus {
        &self.bus
    }

    async fn start(&self) -> Result<()> {
        self.state.lock().lifecycle.check_start()?;

        let addr = self.config.addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let mut state = self.state.lock();
        state.lifecycle.start()?;

        // A send hands the request back if the server task has exited
        let unsent = match &state.control {
            Some(control) => control.send(Control::Listen(listener)).err().map(|e| e.0),
            None => Some(Control::Listen(listener)),
        };
        if let Some(request) = unsent {
            if state.control.is_some() {
                warn!("Server task gone, spawning a new one");
            }
            let control = ServerTask::spawn(self.bus.clone(), self.config.clone());
            if control.send(request).is_err() {
                state.lifecycle = Lifecycle::Stopped;
                state.control = None;
                return Err(Error::TaskGone);
            }
            state.control = Some(control);
        }
        state.local_addr = Some(local_addr);

        info!(addr = %local_addr, "FTL simple protocol listening");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let control = {
            let mut state = self.state.lock();
            state.lifecycle.stop()?;
            state.local_addr = None;
            state.control.clone()
        };

        if let Some(control) = control {
            let (tx, rx) = oneshot::channel();
            if control.send(Control::Unlisten(tx)).is_err() || rx.await.is_err() {
                error!(port = self.config.port, "Server task gone, listener state unknown");
                let mut state = self.state.lock();
                if state.control.as_ref().is_some_and(|c| c.same_channel(&control)) {
                    state.control = None;
                }
                return Err(Error::TaskGone);
            }
        }

        info!(port = self.config.port, "FTL simple protocol stopped listening");
        Ok(())
    }

    fn set_analog_input(&self, channel: u32, value: f64) {
        self.deliver(Outbound::analog(channel, value));
    }

    fn set_digital_input(&self, channel: u32, value: bool) {
        self.deliver(Outbound::digital(channel, value));
    }

    fn send_status(&self, status_type: &str, message: &str) {
        self.deliver(Outbound::status(status_type, message));
    }

    fn send_raw(&self, data: &[u8]) {
        // Text protocol has no binary-safe framing
        debug!(len = data.len(), "Ignoring raw buffer");
    }
}

/// State owned by the server task
struct ServerTask {
    bus: Arc<EventBus>,
    config: ServerConfig,
    listener: Option<TcpListener>,
    registry: ClientRegistry,
    next_session: u64,
    control_rx: mpsc::UnboundedReceiver<Control>,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
    session_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl ServerTask {
    fn spawn(bus: Arc<EventBus>, config: ServerConfig) -> mpsc::UnboundedSender<Control> {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::unbounded_channel();

        let task = ServerTask {
            bus,
            config,
            listener: None,
            registry: ClientRegistry::new(),
            next_session: 0,
            control_rx,
            session_tx,
            session_rx,
        };
        tokio::spawn(task.run());

        control_tx
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                accepted = accept(&self.listener) => match accepted {
                    Ok((stream, peer)) => self.handle_accept(stream, peer),
                    Err(e) => accept_failed(e).await,
                },

                control = self.control_rx.recv() => match control {
                    Some(control) => self.handle_control(control),
                    // Protocol handle dropped
                    None => break,
                },

                Some(event) = self.session_rx.recv() => self.handle_session(event),
            }
        }

        debug!(clients = self.registry.len(), "Server task exiting");
    }

    fn handle_accept(&mut self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(peer = %peer, error = %e, "Failed to disable Nagle");
        }

        let id = self.next_session;
        self.next_session += 1;
        let client_id = format!("tcp:{}:{}", peer, id);
        info!(client = %client_id, "Client connected");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(handle_connection(id, stream, outbound_rx, self.session_tx.clone()));

        let handler = ConnectionHandler::new(client_id, self.config.max_line_length);
        self.registry.insert(Session::new(id, peer, outbound_tx, handler));
    }

    fn handle_control(&mut self, control: Control) {
        match control {
            Control::Listen(listener) => {
                self.listener = Some(listener);
            }
            Control::Unlisten(ack) => {
                self.listener = None;
                let _ = ack.send(());
            }
            Control::Deliver(data) => {
                let delivered = self.registry.deliver(self.config.delivery, data);
                if delivered == 0 {
                    debug!("No client connected, dropping outbound line");
                } else if self.config.delivery == DeliveryPolicy::AllClients {
                    debug!(clients = delivered, "Delivered outbound line");
                }
            }
            Control::Clients(reply) => {
                let _ = reply.send(self.registry.peers());
            }
        }
    }

    fn handle_session(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Data { id, data } => {
                let Some(session) = self.registry.get_mut(id) else {
                    return;
                };
                for event in session.handler.process(&data) {
                    self.bus.emit(event);
                }
            }
            SessionEvent::Closed { id } => {
                let Some(mut session) = self.registry.remove(id) else {
                    return;
                };
                // A final command may arrive without its terminator
                let last = session.handler.finish();
                info!(client = %session.handler.client_id, "Client disconnected");
                if let Some(event) = last {
                    self.bus.emit(event);
                }
            }
        }
    }
}

async fn accept(listener: &Option<TcpListener>) -> std::io::Result<(TcpStream, SocketAddr)> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}

/// Persistent errors such as EMFILE would otherwise spin the accept loop
async fn accept_failed(e: std::io::Error) {
    error!(error = %e, "Failed to accept connection");
    sleep(ACCEPT_BACKOFF).await;
}

/// Moves bytes between one socket and the server task
async fn handle_connection(
    id: u64,
    mut stream: TcpStream,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let mut buf = vec![0u8; 4096];

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => match result {
                Ok(0) => break,
                Ok(n) => {
                    let data = Bytes::copy_from_slice(&buf[..n]);
                    if events.send(SessionEvent::Data { id, data }).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!(session = id, error = %e, "Read error");
                    break;
                }
            },

            data = outbound.recv() => match data {
                Some(data) => {
                    if let Err(e) = stream.write_all(&data).await {
                        warn!(session = id, error = %e, "Write error");
                        break;
                    }
                }
                // Server task gone; dropping the stream closes the socket
                None => return,
            },
        }
    }

    let _ = events.send(SessionEvent::Closed { id });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftl_core::{Event, EventKind};
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::sync::broadcast;
    use tokio::time::{timeout, Instant};

    fn local_config() -> ServerConfig {
        ServerConfig {
            bind: Ipv4Addr::LOCALHOST.into(),
            port: 0,
            ..ServerConfig::default()
        }
    }

    async fn started(config: ServerConfig) -> SimpleProtocol {
        let server = SimpleProtocol::with_config(config);
        server.start().await.unwrap();
        server
    }

    async fn wait_for_clients(server: &SimpleProtocol, expected: usize) {
        for _ in 0..200 {
            if server.client_count().await == expected {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} clients", expected);
    }

    async fn connect(server: &SimpleProtocol, expected: usize) -> TcpStream {
        let stream = TcpStream::connect(server.local_addr().unwrap()).await.unwrap();
        wait_for_clients(server, expected).await;
        stream
    }

    async fn next_event(rx: &mut broadcast::Receiver<Event>) -> Event {
        timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap()
    }

    async fn read_line(reader: &mut BufReader<TcpStream>) -> String {
        let mut line = String::new();
        timeout(Duration::from_secs(2), reader.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        line
    }

    #[tokio::test]
    async fn test_defaults() {
        let server = SimpleProtocol::default();
        assert_eq!(server.port(), 6969);
        assert_eq!(server.protocol_type(), "FTLSimpleProtocol");
        assert_eq!(server.lifecycle(), Lifecycle::Created);
        assert!(server.local_addr().is_none());
        assert_eq!(server.client_count().await, 0);

        // Nothing to deliver to, and nothing should fail
        server.set_digital_input(1, true);
        server.send_raw(b"\x00\x01");
    }

    #[tokio::test]
    async fn test_events_from_client() {
        let server = started(local_config()).await;
        let mut rx = server.events().subscribe();
        let mut client = connect(&server, 1).await;

        client.write_all(b"D:1:1\nA:2:0.5\nX:1\nRC:EN\nRC:foo:bar\n").await.unwrap();

        assert_eq!(next_event(&mut rx).await, Event::digital(1, true));
        assert_eq!(next_event(&mut rx).await, Event::analog(2, 0.5));
        assert_eq!(next_event(&mut rx).await, Event::EnableRobot);
        assert_eq!(next_event(&mut rx).await, Event::robot_command("foo:bar"));
    }

    #[tokio::test]
    async fn test_command_split_across_writes() {
        let server = started(local_config()).await;
        let mut rx = server.events().subscribe();
        let mut client = connect(&server, 1).await;

        client.write_all(b"D:1:").await.unwrap();
        client.flush().await.unwrap();
        sleep(Duration::from_millis(50)).await;
        client.write_all(b"1\nRC:DS\n").await.unwrap();

        assert_eq!(next_event(&mut rx).await, Event::digital(1, true));
        assert_eq!(next_event(&mut rx).await, Event::DisableRobot);
    }

    #[tokio::test]
    async fn test_listeners_receive_events() {
        let server = started(local_config()).await;
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        server.events().on(EventKind::PwmOutput, move |e| s.lock().push(e.clone()));
        let mut rx = server.events().subscribe();

        let mut client = connect(&server, 1).await;
        client.write_all(b"P:3:200\nS:hello\n").await.unwrap();

        assert_eq!(next_event(&mut rx).await, Event::pwm(3, 200.0));
        assert_eq!(next_event(&mut rx).await, Event::system_message("hello"));
        assert_eq!(*seen.lock(), vec![Event::pwm(3, 200.0)]);
    }

    #[tokio::test]
    async fn test_outbound_goes_to_first_client() {
        let server = started(local_config()).await;
        let first = connect(&server, 1).await;
        let second = connect(&server, 2).await;
        let mut first = BufReader::new(first);
        let mut second = BufReader::new(second);

        server.set_digital_input(3, true);
        assert_eq!(read_line(&mut first).await, "D:3:1\n");

        server.send_status("battery", "low");
        assert_eq!(read_line(&mut first).await, "S:battery: low\n");

        let mut line = String::new();
        let quiet = timeout(Duration::from_millis(100), second.read_line(&mut line)).await;
        assert!(quiet.is_err(), "second client received {:?}", line);

        // Second client takes over once the first disconnects
        drop(first);
        wait_for_clients(&server, 1).await;

        server.set_analog_input(7, 3.5);
        assert_eq!(read_line(&mut second).await, "A:7:3.5\n");
    }

    #[tokio::test]
    async fn test_outbound_to_all_clients() {
        let config = ServerConfig {
            delivery: DeliveryPolicy::AllClients,
            ..local_config()
        };
        let server = started(config).await;
        let mut first = BufReader::new(connect(&server, 1).await);
        let mut second = BufReader::new(connect(&server, 2).await);

        server.set_digital_input(5, false);
        assert_eq!(read_line(&mut first).await, "D:5:0\n");
        assert_eq!(read_line(&mut second).await, "D:5:0\n");
    }

    #[tokio::test]
    async fn test_stop_keeps_open_sessions() {
        let server = started(local_config()).await;
        let addr = server.local_addr().unwrap();
        let mut rx = server.events().subscribe();
        let mut client = connect(&server, 1).await;

        server.stop().await.unwrap();
        assert_eq!(server.lifecycle(), Lifecycle::Stopped);
        assert!(server.local_addr().is_none());
        assert!(TcpStream::connect(addr).await.is_err());

        client.write_all(b"RC:DS\n").await.unwrap();
        assert_eq!(next_event(&mut rx).await, Event::DisableRobot);
        assert_eq!(server.client_count().await, 1);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let server = started(local_config()).await;
        server.stop().await.unwrap();
        server.start().await.unwrap();

        let mut rx = server.events().subscribe();
        let mut client = connect(&server, 1).await;
        client.write_all(b"RC:EN\n").await.unwrap();
        assert_eq!(next_event(&mut rx).await, Event::EnableRobot);
    }

    #[tokio::test]
    async fn test_lifecycle_errors() {
        let server = SimpleProtocol::with_config(local_config());
        assert!(matches!(server.stop().await, Err(Error::NotStarted)));

        server.start().await.unwrap();
        assert!(matches!(server.start().await, Err(Error::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_bind_error() {
        let taken = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let config = ServerConfig {
            port: taken.local_addr().unwrap().port(),
            ..local_config()
        };

        let server = SimpleProtocol::with_config(config);
        assert!(matches!(server.start().await, Err(Error::Bind { .. })));
        assert_eq!(server.lifecycle(), Lifecycle::Created);
    }

    #[tokio::test]
    async fn test_client_disconnect_removes_session() {
        let server = started(local_config()).await;
        let client = connect(&server, 1).await;
        let peer = client.local_addr().unwrap();

        assert_eq!(server.clients().await, vec![peer]);
        drop(client);
        wait_for_clients(&server, 0).await;
    }

    #[tokio::test]
    async fn test_final_line_without_newline() {
        let server = started(local_config()).await;
        let mut rx = server.events().subscribe();
        let mut client = connect(&server, 1).await;

        client.write_all(b"D:2:1\nRC:DS").await.unwrap();
        client.shutdown().await.unwrap();

        assert_eq!(next_event(&mut rx).await, Event::digital(2, true));
        assert_eq!(next_event(&mut rx).await, Event::DisableRobot);
        wait_for_clients(&server, 0).await;
    }

    #[tokio::test]
    async fn test_panicking_listener_keeps_server_running() {
        let server = started(local_config()).await;
        server.events().on(EventKind::EnableRobot, |_| panic!("host listener failure"));
        let mut rx = server.events().subscribe();
        let mut client = connect(&server, 1).await;

        client.write_all(b"RC:EN\nRC:DS\n").await.unwrap();
        assert_eq!(next_event(&mut rx).await, Event::EnableRobot);
        assert_eq!(next_event(&mut rx).await, Event::DisableRobot);
        assert_eq!(server.client_count().await, 1);

        server.stop().await.unwrap();
        server.start().await.unwrap();
        let _second = connect(&server, 2).await;
    }

    #[tokio::test]
    async fn test_stop_reports_dead_server_task() {
        let server = started(local_config()).await;
        let (dead, _) = mpsc::unbounded_channel();
        server.state.lock().control = Some(dead);

        assert!(matches!(server.stop().await, Err(Error::TaskGone)));
        assert_eq!(server.lifecycle(), Lifecycle::Stopped);

        server.start().await.unwrap();
        let mut rx = server.events().subscribe();
        let mut client = connect(&server, 1).await;
        client.write_all(b"RC:EN\n").await.unwrap();
        assert_eq!(next_event(&mut rx).await, Event::EnableRobot);
    }

    #[tokio::test]
    async fn test_start_replaces_dead_server_task() {
        let server = started(local_config()).await;
        server.stop().await.unwrap();
        let (dead, _) = mpsc::unbounded_channel();
        server.state.lock().control = Some(dead);

        server.start().await.unwrap();
        assert_eq!(server.lifecycle(), Lifecycle::Started);

        let mut rx = server.events().subscribe();
        let mut client = connect(&server, 1).await;
        client.write_all(b"S:back\n").await.unwrap();
        assert_eq!(next_event(&mut rx).await, Event::system_message("back"));
    }

    #[tokio::test]
    async fn test_accept_error_backs_off() {
        let begin = Instant::now();
        accept_failed(std::io::Error::from(std::io::ErrorKind::OutOfMemory)).await;
        assert!(begin.elapsed() >= ACCEPT_BACKOFF);
    }
}

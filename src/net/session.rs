use std::collections::{BTreeMap, VecDeque};
use std::net::UdpSocket;
use std::time::{Duration, Instant};

/// Reliable-datagram session against one game server. Control traffic is
/// framed behind an 0xffff marker no application opcode uses; anything else
/// passes through as an opaque application frame.
///
/// The driver polls the session instead of registering callbacks; the pump
/// dispatches the returned events on a single thread.
const CONTROL_MARKER: u16 = 0xffff;

const CTRL_SESSION_REQUEST: u8 = 0x01;
const CTRL_SESSION_RESPONSE: u8 = 0x02;
const CTRL_DISCONNECT: u8 = 0x05;
const CTRL_KEEP_ALIVE: u8 = 0x06;
const CTRL_RELIABLE_DATA: u8 = 0x09;
const CTRL_ACK: u8 = 0x15;

const CONNECT_RETRY: Duration = Duration::from_millis(500);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const RETRANSMIT_AFTER: Duration = Duration::from_millis(500);
const KEEP_ALIVE_EVERY: Duration = Duration::from_secs(5);
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

const RECV_BUFFER: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    Packet(Vec<u8>),
}

#[derive(Debug)]
pub struct Session {
    socket: UdpSocket,
    peer: String,
    status: SessionStatus,
    session_id: u32,
    next_out_seq: u16,
    next_in_seq: u16,
    /// Reliable frames awaiting acknowledgement: seq -> (payload, last send).
    pending_out: VecDeque<(u16, Vec<u8>, Instant)>,
    /// Future-sequenced frames held for in-order delivery.
    out_of_order: BTreeMap<u16, Vec<u8>>,
    last_recv: Instant,
    last_send: Instant,
    last_connect_attempt: Instant,
    opened: Instant,
}

impl Session {
    pub fn connect(host: &str, port: u16) -> Result<Self, String> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|err| format!("udp bind failed: {}", err))?;
        socket
            .connect((host, port))
            .map_err(|err| format!("udp connect to {}:{} failed: {}", host, port, err))?;
        socket
            .set_nonblocking(true)
            .map_err(|err| format!("set_nonblocking failed: {}", err))?;

        let session_id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(1)
            | 1;
        let now = Instant::now();
        let mut session = Self {
            socket,
            peer: format!("{}:{}", host, port),
            status: SessionStatus::Connecting,
            session_id,
            next_out_seq: 0,
            next_in_seq: 0,
            pending_out: VecDeque::new(),
            out_of_order: BTreeMap::new(),
            last_recv: now,
            last_send: now,
            last_connect_attempt: now,
            opened: now,
        };
        session.send_session_request();
        Ok(session)
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Queues an application frame. Reliable frames are sequenced, resent
    /// until acknowledged, and delivered in order by the far side;
    /// unreliable frames go out raw.
    pub fn queue_packet(&mut self, data: &[u8], reliable: bool) {
        if self.status == SessionStatus::Disconnected {
            return;
        }
        if !reliable {
            self.send_raw(data);
            return;
        }
        let seq = self.next_out_seq;
        self.next_out_seq = self.next_out_seq.wrapping_add(1);
        let mut frame = Vec::with_capacity(5 + data.len());
        frame.extend_from_slice(&CONTROL_MARKER.to_le_bytes());
        frame.push(CTRL_RELIABLE_DATA);
        frame.extend_from_slice(&seq.to_le_bytes());
        frame.extend_from_slice(data);
        self.send_raw(&frame);
        self.pending_out.push_back((seq, frame, Instant::now()));
    }

    pub fn close(&mut self) {
        if self.status != SessionStatus::Disconnected {
            let mut frame = Vec::with_capacity(7);
            frame.extend_from_slice(&CONTROL_MARKER.to_le_bytes());
            frame.push(CTRL_DISCONNECT);
            frame.extend_from_slice(&self.session_id.to_le_bytes());
            self.send_raw(&frame);
            self.status = SessionStatus::Disconnected;
        }
    }

    /// Drains the socket and the session timers; returns the events in the
    /// order they should be dispatched.
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.status == SessionStatus::Disconnected {
            return events;
        }

        let mut buf = [0u8; RECV_BUFFER];
        loop {
            match self.socket.recv(&mut buf) {
                Ok(len) => {
                    self.last_recv = Instant::now();
                    self.handle_datagram(&buf[..len], &mut events);
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }

        let now = Instant::now();
        match self.status {
            SessionStatus::Connecting => {
                if now.duration_since(self.opened) > CONNECT_TIMEOUT {
                    self.status = SessionStatus::Disconnected;
                    events.push(SessionEvent::Disconnected);
                } else if now.duration_since(self.last_connect_attempt) >= CONNECT_RETRY {
                    self.send_session_request();
                }
            }
            SessionStatus::Connected => {
                if now.duration_since(self.last_recv) > IDLE_TIMEOUT {
                    self.status = SessionStatus::Disconnected;
                    events.push(SessionEvent::Disconnected);
                } else {
                    self.retransmit(now);
                    if now.duration_since(self.last_send) >= KEEP_ALIVE_EVERY {
                        let mut frame = Vec::with_capacity(3);
                        frame.extend_from_slice(&CONTROL_MARKER.to_le_bytes());
                        frame.push(CTRL_KEEP_ALIVE);
                        self.send_raw(&frame);
                    }
                }
            }
            SessionStatus::Disconnected => {}
        }
        events
    }

    fn handle_datagram(&mut self, data: &[u8], events: &mut Vec<SessionEvent>) {
        if data.len() >= 3 && data[0] == 0xff && data[1] == 0xff {
            self.handle_control(data[2], &data[3..], events);
            return;
        }
        // bare application frame (unreliable path)
        if !data.is_empty() {
            events.push(SessionEvent::Packet(data.to_vec()));
        }
    }

    fn handle_control(&mut self, ctrl: u8, body: &[u8], events: &mut Vec<SessionEvent>) {
        match ctrl {
            CTRL_SESSION_RESPONSE => {
                if self.status == SessionStatus::Connecting {
                    self.status = SessionStatus::Connected;
                    events.push(SessionEvent::Connected);
                }
            }
            CTRL_RELIABLE_DATA => {
                if body.len() < 2 {
                    return;
                }
                let seq = u16::from_le_bytes([body[0], body[1]]);
                let payload = body[2..].to_vec();
                if seq == self.next_in_seq {
                    self.next_in_seq = self.next_in_seq.wrapping_add(1);
                    events.push(SessionEvent::Packet(payload));
                    while let Some(buffered) = self.out_of_order.remove(&self.next_in_seq) {
                        self.next_in_seq = self.next_in_seq.wrapping_add(1);
                        events.push(SessionEvent::Packet(buffered));
                    }
                } else if seq_after(seq, self.next_in_seq) {
                    self.out_of_order.insert(seq, payload);
                }
                self.send_ack(self.next_in_seq.wrapping_sub(1));
            }
            CTRL_ACK => {
                if body.len() < 2 {
                    return;
                }
                let acked = u16::from_le_bytes([body[0], body[1]]);
                self.pending_out
                    .retain(|(seq, _, _)| seq_after(*seq, acked));
            }
            CTRL_DISCONNECT => {
                if self.status != SessionStatus::Disconnected {
                    self.status = SessionStatus::Disconnected;
                    events.push(SessionEvent::Disconnected);
                }
            }
            CTRL_KEEP_ALIVE | CTRL_SESSION_REQUEST => {}
            _ => {}
        }
    }

    fn retransmit(&mut self, now: Instant) {
        let mut resend = Vec::new();
        for (_, frame, last_sent) in self.pending_out.iter_mut() {
            if now.duration_since(*last_sent) >= RETRANSMIT_AFTER {
                resend.push(frame.clone());
                *last_sent = now;
            }
        }
        for frame in resend {
            self.send_raw(&frame);
        }
    }

    fn send_session_request(&mut self) {
        let mut frame = Vec::with_capacity(11);
        frame.extend_from_slice(&CONTROL_MARKER.to_le_bytes());
        frame.push(CTRL_SESSION_REQUEST);
        frame.extend_from_slice(&self.session_id.to_le_bytes());
        frame.extend_from_slice(&(RECV_BUFFER as u32).to_le_bytes());
        self.send_raw(&frame);
        self.last_connect_attempt = Instant::now();
    }

    fn send_ack(&mut self, seq: u16) {
        let mut frame = Vec::with_capacity(5);
        frame.extend_from_slice(&CONTROL_MARKER.to_le_bytes());
        frame.push(CTRL_ACK);
        frame.extend_from_slice(&seq.to_le_bytes());
        self.send_raw(&frame);
    }

    fn send_raw(&mut self, data: &[u8]) {
        let _ = self.socket.send(data);
        self.last_send = Instant::now();
    }
}

/// True when `a` is later than `b` in wrapping sequence space.
fn seq_after(a: u16, b: u16) -> bool {
    (a.wrapping_sub(b) as i16) > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    struct FakeServer {
        socket: UdpSocket,
        client: Option<SocketAddr>,
    }

    impl FakeServer {
        fn new() -> Self {
            let socket = UdpSocket::bind("127.0.0.1:0").expect("bind");
            socket.set_nonblocking(true).expect("nonblocking");
            Self {
                socket,
                client: None,
            }
        }

        fn port(&self) -> u16 {
            self.socket.local_addr().expect("addr").port()
        }

        fn recv(&mut self) -> Option<Vec<u8>> {
            let mut buf = [0u8; RECV_BUFFER];
            match self.socket.recv_from(&mut buf) {
                Ok((len, from)) => {
                    self.client = Some(from);
                    Some(buf[..len].to_vec())
                }
                Err(_) => None,
            }
        }

        fn send(&self, data: &[u8]) {
            let client = self.client.expect("client address");
            self.socket.send_to(data, client).expect("send");
        }

        fn accept(&mut self, deadline: Instant) {
            while Instant::now() < deadline {
                if let Some(frame) = self.recv() {
                    if frame.len() >= 3 && frame[0] == 0xff && frame[1] == 0xff
                        && frame[2] == CTRL_SESSION_REQUEST
                    {
                        self.send(&[0xff, 0xff, CTRL_SESSION_RESPONSE, 0, 0, 0, 0]);
                        return;
                    }
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            panic!("no session request before deadline");
        }

        fn data_frame(seq: u16, payload: &[u8]) -> Vec<u8> {
            let mut frame = vec![0xff, 0xff, CTRL_RELIABLE_DATA];
            frame.extend_from_slice(&seq.to_le_bytes());
            frame.extend_from_slice(payload);
            frame
        }
    }

    fn pump_until<F: FnMut(&mut Vec<SessionEvent>) -> bool>(
        session: &mut Session,
        mut done: F,
    ) {
        let deadline = Instant::now() + Duration::from_secs(3);
        let mut events = Vec::new();
        while Instant::now() < deadline {
            events.extend(session.poll());
            if done(&mut events) {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("session pump timed out; saw {:?}", events);
    }

    #[test]
    fn establishes_and_delivers_in_order() {
        let mut server = FakeServer::new();
        let mut session = Session::connect("127.0.0.1", server.port()).expect("connect");
        assert_eq!(session.status(), SessionStatus::Connecting);

        server.accept(Instant::now() + Duration::from_secs(2));
        pump_until(&mut session, |events| {
            events.contains(&SessionEvent::Connected)
        });
        assert!(session.is_connected());

        // out-of-order arrival: seq 1 lands first, then seq 0
        server.send(&FakeServer::data_frame(1, b"second"));
        server.send(&FakeServer::data_frame(0, b"first"));
        let mut packets = Vec::new();
        pump_until(&mut session, |events| {
            for event in events.drain(..) {
                if let SessionEvent::Packet(data) = event {
                    packets.push(data);
                }
            }
            packets.len() >= 2
        });
        assert_eq!(packets[0], b"first");
        assert_eq!(packets[1], b"second");
        // duplicate of an old frame is dropped
        server.send(&FakeServer::data_frame(0, b"first"));
        std::thread::sleep(Duration::from_millis(30));
        for event in session.poll() {
            assert!(!matches!(event, SessionEvent::Packet(_)));
        }
    }

    #[test]
    fn reliable_sends_are_framed_and_acked() {
        let mut server = FakeServer::new();
        let mut session = Session::connect("127.0.0.1", server.port()).expect("connect");
        server.accept(Instant::now() + Duration::from_secs(2));
        pump_until(&mut session, |events| {
            events.contains(&SessionEvent::Connected)
        });

        session.queue_packet(b"hello", true);
        let deadline = Instant::now() + Duration::from_secs(2);
        let frame = loop {
            if let Some(frame) = server.recv() {
                if frame.len() >= 3 && frame[2] == CTRL_RELIABLE_DATA {
                    break frame;
                }
            }
            assert!(Instant::now() < deadline, "no data frame seen");
            std::thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(&frame[..3], &[0xff, 0xff, CTRL_RELIABLE_DATA]);
        assert_eq!(u16::from_le_bytes([frame[3], frame[4]]), 0);
        assert_eq!(&frame[5..], b"hello");

        // unreliable frames pass through raw
        session.queue_packet(&[0x13, 0x72], false);
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(frame) = server.recv() {
                if frame == vec![0x13, 0x72] {
                    break;
                }
            }
            assert!(Instant::now() < deadline, "no raw frame seen");
            std::thread::sleep(Duration::from_millis(5));
        }

        let mut ack = vec![0xff, 0xff, CTRL_ACK];
        ack.extend_from_slice(&0u16.to_le_bytes());
        server.send(&ack);
        std::thread::sleep(Duration::from_millis(30));
        session.poll();
        assert!(session.pending_out.is_empty());
    }

    #[test]
    fn server_disconnect_surfaces_event() {
        let mut server = FakeServer::new();
        let mut session = Session::connect("127.0.0.1", server.port()).expect("connect");
        server.accept(Instant::now() + Duration::from_secs(2));
        pump_until(&mut session, |events| {
            events.contains(&SessionEvent::Connected)
        });

        server.send(&[0xff, 0xff, CTRL_DISCONNECT, 0, 0, 0, 0]);
        pump_until(&mut session, |events| {
            events.contains(&SessionEvent::Disconnected)
        });
        assert_eq!(session.status(), SessionStatus::Disconnected);
        assert!(session.poll().is_empty());
    }

    #[test]
    fn sequence_comparison_wraps() {
        assert!(seq_after(1, 0));
        assert!(!seq_after(0, 1));
        assert!(seq_after(0, u16::MAX));
        assert!(!seq_after(u16::MAX, 0));
    }
}

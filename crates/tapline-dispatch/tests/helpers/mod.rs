//! Shared test helpers: an in-memory schema codec and a recording transport.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bytes::Bytes;
use serde_json::Value;

use tapline_core::config::dispatch::DispatchConfig;
use tapline_core::error::DispatchError;
use tapline_core::result::DispatchResult;
use tapline_core::traits::codec::ProtocolCodec;
use tapline_core::traits::transport::Transport;
use tapline_core::types::direction::Direction;
use tapline_core::types::frame::HEADER_LEN;
use tapline_core::types::version::ProtocolVersion;
use tapline_dispatch::Dispatch;

/// Test wire format: the standard 4-byte header followed by a JSON body.
/// A message with fields therefore always has a non-empty body, and a
/// header-only buffer fails to parse.
pub struct TestCodec {
    by_name: HashMap<String, u16>,
    by_opcode: HashMap<u16, String>,
    versions: HashMap<u16, Vec<u32>>,
}

pub const OP_CHECK_VERSION: u16 = 1;
pub const OP_LOGIN: u16 = 2;
pub const OP_CHAT_MESSAGE: u16 = 3;
pub const OP_PING: u16 = 4;

impl TestCodec {
    pub fn new() -> Self {
        let mut codec = Self {
            by_name: HashMap::new(),
            by_opcode: HashMap::new(),
            versions: HashMap::new(),
        };
        codec.define("C_CHECK_VERSION", OP_CHECK_VERSION, &[1]);
        codec.define("S_LOGIN", OP_LOGIN, &[1, 2]);
        codec.define("C_CHAT_MESSAGE", OP_CHAT_MESSAGE, &[1]);
        codec.define("S_PING", OP_PING, &[1]);
        codec
    }

    fn define(&mut self, name: &str, opcode: u16, versions: &[u32]) {
        self.by_name.insert(name.to_string(), opcode);
        self.by_opcode.insert(opcode, name.to_string());
        self.versions.insert(opcode, versions.to_vec());
    }

    fn resolve_version(&self, opcode: u16, version: ProtocolVersion) -> DispatchResult<u32> {
        let known = self
            .versions
            .get(&opcode)
            .ok_or_else(|| DispatchError::codec(format!("unknown opcode {opcode}")))?;
        match version {
            ProtocolVersion::Latest => Ok(*known.last().expect("at least one version")),
            ProtocolVersion::Exact(v) if known.contains(&v) => Ok(v),
            ProtocolVersion::Exact(v) => Err(DispatchError::codec(format!(
                "opcode {opcode} has no schema revision {v}"
            ))),
        }
    }
}

impl ProtocolCodec for TestCodec {
    fn opcode_of(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    fn name_of(&self, opcode: u16) -> Option<String> {
        self.by_opcode.get(&opcode).cloned()
    }

    fn parse(&self, opcode: u16, version: ProtocolVersion, buf: &[u8]) -> DispatchResult<Value> {
        self.resolve_version(opcode, version)?;
        let body = &buf[HEADER_LEN.min(buf.len())..];
        if body.is_empty() {
            return Err(DispatchError::codec(format!(
                "opcode {opcode} requires a body, buffer has none"
            )));
        }
        serde_json::from_slice(body).map_err(DispatchError::from)
    }

    fn encode(&self, opcode: u16, version: ProtocolVersion, event: &Value) -> DispatchResult<Bytes> {
        self.resolve_version(opcode, version)?;
        if event.get("__unencodable").is_some() {
            return Err(DispatchError::codec("event does not fit the schema"));
        }
        let body = serde_json::to_vec(event)?;
        Ok(framed(opcode, &body))
    }
}

/// Build a framed buffer: length + little-endian opcode + body.
pub fn framed(opcode: u16, body: &[u8]) -> Bytes {
    let len = (HEADER_LEN + body.len()) as u16;
    let mut buf = Vec::with_capacity(len as usize);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&opcode.to_le_bytes());
    buf.extend_from_slice(body);
    Bytes::from(buf)
}

/// A packet with a JSON body.
pub fn packet(opcode: u16, body: &Value) -> Bytes {
    framed(opcode, &serde_json::to_vec(body).expect("serializable body"))
}

/// Decode the JSON body of a framed buffer.
pub fn body_of(buf: &[u8]) -> Value {
    serde_json::from_slice(&buf[HEADER_LEN..]).expect("JSON body")
}

/// Transport that records every send instead of touching a socket.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: RefCell<Vec<(Direction, Vec<u8>)>>,
}

impl RecordingTransport {
    pub fn sent_count(&self) -> usize {
        self.sent.borrow().len()
    }
}

impl Transport for RecordingTransport {
    fn send_to_server(&self, buf: &[u8]) {
        self.sent
            .borrow_mut()
            .push((Direction::ClientToServer, buf.to_vec()));
    }

    fn send_to_client(&self, buf: &[u8]) {
        self.sent
            .borrow_mut()
            .push((Direction::ServerToClient, buf.to_vec()));
    }
}

/// Engine against the test codec, no transport bound.
pub fn engine() -> Rc<Dispatch> {
    Dispatch::new(DispatchConfig::default(), Rc::new(TestCodec::new()))
}

/// Engine plus a recording transport already bound.
pub fn engine_with_transport() -> (Rc<Dispatch>, Rc<RecordingTransport>) {
    let dispatch = engine();
    let transport = Rc::new(RecordingTransport::default());
    dispatch.bind_transport(transport.clone());
    (dispatch, transport)
}

/// Shared execution trace for asserting hook ordering.
pub type Trace = Rc<RefCell<Vec<String>>>;

pub fn trace() -> Trace {
    Rc::new(RefCell::new(Vec::new()))
}

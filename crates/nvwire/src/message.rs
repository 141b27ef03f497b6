//! # Message Framing
//!
//! Three message shapes share one connection:
//!
//! ```text
//! Request:      [0, msgid, method, params]
//! Response:     [1, msgid, error, result]
//! Notification: [2, method, params]
//! ```
//!
//! Messages are written back to back with no length prefix. A reader finds the
//! boundary of the next message with [`crate::frame::FrameScanner`].

use std::io::Cursor;

use crate::error::Error;
use crate::error::Result;
use crate::value::Value;

pub const REQUEST: i64 = 0;
pub const RESPONSE: i64 = 1;
pub const NOTIFICATION: i64 = 2;

/// A single protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request {
        msgid: u32,
        method: String,
        params: Vec<Value>,
    },
    Response {
        msgid: u32,
        /// `Value::Nil` when the call succeeded.
        error: Value,
        result: Value,
    },
    Notification {
        method: String,
        params: Vec<Value>,
    },
}

impl Message {
    /// Encodes the message as one MessagePack array.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let value = rmpv::Value::from(self.clone().into_value());
        let mut out = Vec::new();
        rmpv::encode::write_value(&mut out, &value).map_err(|e| Error::Encode(e.to_string()))?;
        Ok(out)
    }

    /// Decodes exactly one message from `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let value = rmpv::decode::read_value(&mut cursor).map_err(|e| Error::Decode(e.to_string()))?;
        let used = cursor.position() as usize;
        if used != bytes.len() {
            return Err(Error::ProtocolViolation(format!(
                "{} trailing bytes after message",
                bytes.len() - used
            )));
        }
        Self::from_value(Value::from(value))
    }

    /// Interprets an already decoded value as a message.
    pub fn from_value(value: Value) -> Result<Self> {
        let fields = match value {
            Value::Array(fields) => fields,
            other => {
                return Err(Error::ProtocolViolation(format!("message is {}, not array", other.kind_name())));
            }
        };
        let kind = fields.first().and_then(Value::as_i64);
        let arity = fields.len();
        let mut fields = fields.into_iter().skip(1);
        let mut next = || fields.next().unwrap_or(Value::Nil);

        match (kind, arity) {
            (Some(REQUEST), 4) => {
                let msgid = msgid(next())?;
                let method = method(next())?;
                let params = params(next())?;
                Ok(Self::Request { msgid, method, params })
            }
            (Some(RESPONSE), 4) => {
                let msgid = msgid(next())?;
                let error = next();
                let result = next();
                Ok(Self::Response { msgid, error, result })
            }
            (Some(NOTIFICATION), 3) => {
                let method = method(next())?;
                let params = params(next())?;
                Ok(Self::Notification { method, params })
            }
            (Some(kind @ (REQUEST | RESPONSE | NOTIFICATION)), n) => Err(Error::ProtocolViolation(
                format!("message type {} with {} fields", kind, n),
            )),
            (kind, _) => Err(Error::ProtocolViolation(format!("unknown message type {:?}", kind))),
        }
    }

    /// Converts the message into its array form.
    pub fn into_value(self) -> Value {
        match self {
            Self::Request { msgid, method, params } => Value::Array(vec![
                Value::Int(REQUEST),
                Value::Int(msgid as i64),
                Value::String(method),
                Value::Array(params),
            ]),
            Self::Response { msgid, error, result } => Value::Array(vec![
                Value::Int(RESPONSE),
                Value::Int(msgid as i64),
                error,
                result,
            ]),
            Self::Notification { method, params } => Value::Array(vec![
                Value::Int(NOTIFICATION),
                Value::String(method),
                Value::Array(params),
            ]),
        }
    }
}

fn msgid(v: Value) -> Result<u32> {
    v.as_i64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| Error::ProtocolViolation(format!("bad msgid {}", v)))
}

fn method(v: Value) -> Result<String> {
    match v {
        Value::String(s) => Ok(s),
        other => Err(Error::ProtocolViolation(format!("method name is {}", other.kind_name()))),
    }
}

fn params(v: Value) -> Result<Vec<Value>> {
    match v {
        Value::Array(items) => Ok(items),
        other => Err(Error::ProtocolViolation(format!("params is {}", other.kind_name()))),
    }
}

//! Framed message format.
//!
//! ```text
//! +------------------+------------------------+-----------------+
//! | 32 byte type tag | 4 byte length N (BE)   | N byte payload  |
//! +------------------+------------------------+-----------------+
//! ```
//!
//! The type tag is ASCII, padded with trailing zero bytes.

use crate::codec::PayloadCodec;
use bytes::{BufMut, Bytes, BytesMut};
use corelib::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Width of the type tag field.
pub const TYPE_LEN: usize = 32;
/// Width of the payload length field.
pub const LENGTH_LEN: usize = 4;
/// Total header width.
pub const HEADER_LEN: usize = TYPE_LEN + LENGTH_LEN;
/// Largest payload a reader accepts unless configured otherwise.
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

/// Type tag of a [`Message`].
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MessageType(Cow<'static, str>);

impl MessageType {
    pub const HI: MessageType = MessageType(Cow::Borrowed("HI"));
    pub const BYE: MessageType = MessageType(Cow::Borrowed("BYE"));
    pub const ACK: MessageType = MessageType(Cow::Borrowed("ACK"));
    pub const ERR: MessageType = MessageType(Cow::Borrowed("ERR"));
    pub const YES: MessageType = MessageType(Cow::Borrowed("YES"));
    pub const NO: MessageType = MessageType(Cow::Borrowed("NO"));

    pub const GET: MessageType = MessageType(Cow::Borrowed("GET"));
    pub const PUT: MessageType = MessageType(Cow::Borrowed("PUT"));
    pub const REMOVE: MessageType = MessageType(Cow::Borrowed("REMOVE"));
    pub const CLEAR: MessageType = MessageType(Cow::Borrowed("CLEAR"));
    pub const KEY_SET: MessageType = MessageType(Cow::Borrowed("KEY_SET"));
    pub const SIZE: MessageType = MessageType(Cow::Borrowed("SIZE"));
    pub const CONTAINS_KEY: MessageType = MessageType(Cow::Borrowed("CONTAINS_KEY"));
    pub const CONTAINS_VALUE: MessageType = MessageType(Cow::Borrowed("CONTAINS_VALUE"));
    pub const DUMP_ENTRIES: MessageType = MessageType(Cow::Borrowed("DUMP_ENTRIES"));

    /// Validates a tag: non-empty ASCII without NUL, at most 32 bytes.
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        if tag.len() > TYPE_LEN {
            return Err(Error::protocol(format!(
                "message type '{}' exceeds {} bytes",
                tag, TYPE_LEN
            )));
        }
        if tag.is_empty() || !tag.is_ascii() || tag.contains('\0') {
            return Err(Error::protocol(format!("message type {:?} is not a valid tag", tag)));
        }
        Ok(MessageType(Cow::Owned(tag)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Zero-payload join/leave notification.
    pub fn is_control(&self) -> bool {
        *self == Self::HI || *self == Self::BYE
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One request or response exchanged between nodes.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    message_type: MessageType,
    payload: Bytes,
}

impl Message {
    pub fn new(message_type: MessageType, payload: impl Into<Bytes>) -> Self {
        Self {
            message_type,
            payload: payload.into(),
        }
    }

    pub fn empty(message_type: MessageType) -> Self {
        Self::new(message_type, Bytes::new())
    }

    pub fn hi() -> Self {
        Self::empty(MessageType::HI)
    }

    pub fn bye() -> Self {
        Self::empty(MessageType::BYE)
    }

    pub fn ack() -> Self {
        Self::empty(MessageType::ACK)
    }

    /// Sentinel standing in for "no answer" in broadcast results.
    pub fn err() -> Self {
        Self::empty(MessageType::ERR)
    }

    pub fn yes() -> Self {
        Self::empty(MessageType::YES)
    }

    pub fn no() -> Self {
        Self::empty(MessageType::NO)
    }

    pub fn yes_or_no(answer: bool) -> Self {
        if answer {
            Self::yes()
        } else {
            Self::no()
        }
    }

    /// Message whose payload is `value` marshalled with codec `C`.
    pub fn encoded<C, T>(message_type: MessageType, value: &T) -> Result<Self>
    where
        C: PayloadCodec,
        T: Serialize + ?Sized,
    {
        Ok(Self::new(message_type, C::encode(value)?))
    }

    /// Message whose payload is a 4-byte big-endian integer.
    pub fn with_u32(message_type: MessageType, value: u32) -> Self {
        Self::new(message_type, Bytes::copy_from_slice(&value.to_be_bytes()))
    }

    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    pub fn is(&self, message_type: &MessageType) -> bool {
        self.message_type == *message_type
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Unmarshals the payload with codec `C`.
    pub fn decode_payload<C, T>(&self) -> Result<T>
    where
        C: PayloadCodec,
        T: DeserializeOwned,
    {
        C::decode(&self.payload)
    }

    pub fn payload_as_u32(&self) -> Result<u32> {
        let bytes: [u8; 4] = self.payload.as_ref().try_into().map_err(|_| {
            Error::marshalling(
                format!(
                    "{} payload must be 4 bytes, got {}",
                    self.message_type,
                    self.payload.len()
                ),
                "length mismatch",
            )
        })?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Serializes header and payload into one contiguous frame.
    pub fn encode(&self) -> Result<Bytes> {
        let length = u32::try_from(self.payload.len()).map_err(|_| {
            Error::protocol(format!("payload of {} bytes does not fit a frame", self.payload.len()))
        })?;

        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        let tag = self.message_type.as_str().as_bytes();
        buf.put_slice(tag);
        buf.put_bytes(0, TYPE_LEN - tag.len());
        buf.put_u32(length);
        buf.put_slice(&self.payload);
        Ok(buf.freeze())
    }

    /// Parses exactly one frame from `frame`.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        if frame.len() < HEADER_LEN {
            return Err(Error::protocol(format!(
                "frame of {} bytes is shorter than the {} byte header",
                frame.len(),
                HEADER_LEN
            )));
        }
        let message_type = parse_type(&frame[..TYPE_LEN])?;
        let mut length = [0u8; LENGTH_LEN];
        length.copy_from_slice(&frame[TYPE_LEN..HEADER_LEN]);
        let length = u32::from_be_bytes(length) as usize;

        let payload = &frame[HEADER_LEN..];
        if payload.len() != length {
            return Err(Error::protocol(format!(
                "frame declares {} payload bytes but carries {}",
                length,
                payload.len()
            )));
        }
        Ok(Self::new(message_type, Bytes::copy_from_slice(payload)))
    }

    /// Writes one frame to `writer`.
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = self.encode()?;
        writer
            .write_all(&frame)
            .await
            .map_err(|e| Error::transport(format!("unable to write {} message", self.message_type), e))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::transport("unable to flush message", e))?;
        Ok(())
    }

    /// Reads exactly one frame from `reader`.
    pub async fn read_from<R>(reader: &mut R, max_payload_len: usize) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; HEADER_LEN];
        reader
            .read_exact(&mut header)
            .await
            .map_err(|e| Error::transport("unable to read message header", e))?;

        let message_type = parse_type(&header[..TYPE_LEN])?;
        let mut length = [0u8; LENGTH_LEN];
        length.copy_from_slice(&header[TYPE_LEN..]);
        let length = u32::from_be_bytes(length) as usize;
        if length > max_payload_len {
            return Err(Error::protocol(format!(
                "{} payload of {} bytes exceeds the maximum of {}",
                message_type, length, max_payload_len
            )));
        }

        let mut payload = vec![0u8; length];
        reader
            .read_exact(&mut payload)
            .await
            .map_err(|e| Error::transport(format!("unable to read {} payload", message_type), e))?;
        Ok(Self::new(message_type, payload))
    }
}

fn parse_type(field: &[u8]) -> Result<MessageType> {
    let end = field.iter().rposition(|b| *b != 0).map(|i| i + 1).unwrap_or(0);
    let tag = std::str::from_utf8(&field[..end])
        .map_err(|_| Error::protocol("message type is not ASCII"))?;
    MessageType::new(tag)
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("type", &self.message_type.as_str())
            .field("length", &self.payload.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::ErrorKind;

    #[test]
    fn test_type_tag_length_limit() {
        assert!(MessageType::new("A".repeat(32)).is_ok());
        let err = MessageType::new("A".repeat(33)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(MessageType::new("").is_err());
        assert!(MessageType::new("NÖ").is_err());
    }

    #[test]
    fn test_well_known_tags_match_validated_tags() {
        assert_eq!(MessageType::new("CONTAINS_VALUE").unwrap(), MessageType::CONTAINS_VALUE);
        assert!(MessageType::HI.is_control());
        assert!(MessageType::BYE.is_control());
        assert!(!MessageType::ACK.is_control());
    }

    #[test]
    fn test_frame_layout() {
        let frame = Message::new(MessageType::GET, vec![1u8, 2, 3]).encode().unwrap();
        assert_eq!(frame.len(), HEADER_LEN + 3);
        assert_eq!(&frame[..3], b"GET");
        assert!(frame[3..TYPE_LEN].iter().all(|b| *b == 0));
        assert_eq!(&frame[TYPE_LEN..HEADER_LEN], &[0, 0, 0, 3]);
        assert_eq!(&frame[HEADER_LEN..], &[1, 2, 3]);
    }

    #[test]
    fn test_frame_round_trip_empty_payload() {
        let original = Message::ack();
        let decoded = Message::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded, original);
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_frame_round_trip_with_payload() {
        let original = Message::new(MessageType::new("CUSTOM_TYPE").unwrap(), b"hello world".to_vec());
        let decoded = Message::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded.message_type().as_str(), "CUSTOM_TYPE");
        assert_eq!(decoded.payload().as_ref(), b"hello world");
    }

    #[test]
    fn test_decode_rejects_truncated_frame() {
        let frame = Message::new(MessageType::PUT, vec![9u8; 10]).encode().unwrap();
        let err = Message::decode(&frame[..frame.len() - 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(Message::decode(&frame[..10]).is_err());
    }

    #[test]
    fn test_u32_payload() {
        let msg = Message::with_u32(MessageType::SIZE, 258);
        assert_eq!(msg.payload().as_ref(), &[0, 0, 1, 2]);
        assert_eq!(msg.payload_as_u32().unwrap(), 258);

        let err = Message::ack().payload_as_u32().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Marshalling);
    }

    #[tokio::test]
    async fn test_async_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let original = Message::new(MessageType::KEY_SET, vec![7u8; 100]);
        original.write_to(&mut client).await.unwrap();

        let read = Message::read_from(&mut server, DEFAULT_MAX_PAYLOAD_LEN).await.unwrap();
        assert_eq!(read, original);
    }

    #[tokio::test]
    async fn test_read_rejects_oversized_payload() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        Message::new(MessageType::PUT, vec![0u8; 64]).write_to(&mut client).await.unwrap();

        let err = Message::read_from(&mut server, 16).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn test_read_on_closed_stream_is_transport_failure() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        let err = Message::read_from(&mut server, DEFAULT_MAX_PAYLOAD_LEN).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}

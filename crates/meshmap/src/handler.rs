//! Dispatcher serving peer requests from the local store.
//!
//! Requests are answered from this node's own entries only; nothing here
//! routes through the ring, so a misrouted request cannot bounce between
//! nodes.

use crate::store::{LocalStore, MapKey, MapValue};
use corelib::{CachedRing, Result};
use std::marker::PhantomData;
use std::sync::Arc;
use streaming::{BincodeCodec, Message, MessageHandler, MessageType, PayloadCodec};
use tracing::debug;

/// Maps protocol messages onto [`LocalStore`] operations.
pub struct MapHandler<K: MapKey, V: MapValue, C = BincodeCodec> {
    store: LocalStore<K, V>,
    ring: Arc<CachedRing>,
    _codec: PhantomData<fn() -> C>,
}

impl<K: MapKey, V: MapValue, C: PayloadCodec> MapHandler<K, V, C> {
    pub fn new(store: LocalStore<K, V>, ring: Arc<CachedRing>) -> Self {
        Self {
            store,
            ring,
            _codec: PhantomData,
        }
    }
}

impl<K: MapKey, V: MapValue, C: PayloadCodec> MessageHandler for MapHandler<K, V, C> {
    fn handle(&self, message: Message) -> Result<Option<Message>> {
        let reply = match message.message_type().as_str() {
            "HI" | "BYE" => {
                debug!("Received {}, invalidating ring cache", message.message_type());
                self.ring.clear_cache();
                Message::ack()
            }
            "GET" => {
                let key: K = message.decode_payload::<C, _>()?;
                Message::encoded::<C, _>(MessageType::GET, &self.store.get(&key))?
            }
            "PUT" => {
                let (key, value): (K, V) = message.decode_payload::<C, _>()?;
                self.store.insert(key, value);
                Message::ack()
            }
            "REMOVE" => {
                let key: K = message.decode_payload::<C, _>()?;
                Message::encoded::<C, _>(MessageType::REMOVE, &self.store.remove(&key))?
            }
            "CLEAR" => {
                self.store.clear();
                Message::ack()
            }
            "KEY_SET" => Message::encoded::<C, _>(MessageType::KEY_SET, &self.store.keys())?,
            "SIZE" => {
                let size = u32::try_from(self.store.len()).unwrap_or(u32::MAX);
                Message::with_u32(MessageType::SIZE, size)
            }
            "CONTAINS_KEY" => {
                let key: K = message.decode_payload::<C, _>()?;
                Message::yes_or_no(self.store.contains_key(&key))
            }
            "CONTAINS_VALUE" => {
                let value: V = message.decode_payload::<C, _>()?;
                Message::yes_or_no(self.store.contains_value(&value))
            }
            "DUMP_ENTRIES" => {
                Message::encoded::<C, _>(MessageType::DUMP_ENTRIES, &self.store.entries())?
            }
            other => {
                debug!("Ignoring unknown message type {}", other);
                Message::ack()
            }
        };
        Ok(Some(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::{ErrorKind, HashRing, MemoryDirectory, Node, NodeAddress, NodeId, Ring};

    type Handler = MapHandler<String, String>;

    fn handler() -> (Handler, LocalStore<String, String>, Arc<CachedRing>) {
        let store = LocalStore::new();
        let ring = Arc::new(CachedRing::new(HashRing::new(Arc::new(MemoryDirectory::new()))));
        (MapHandler::new(store.clone(), Arc::clone(&ring)), store, ring)
    }

    fn request<T: serde::Serialize>(message_type: MessageType, payload: &T) -> Message {
        Message::encoded::<BincodeCodec, _>(message_type, payload).unwrap()
    }

    fn reply(handler: &Handler, message: Message) -> Message {
        handler.handle(message).unwrap().unwrap()
    }

    #[test]
    fn test_put_then_get() {
        let (handler, store, _) = handler();
        let put = request(MessageType::PUT, &("k".to_string(), "v".to_string()));
        assert_eq!(reply(&handler, put), Message::ack());
        assert_eq!(store.get(&"k".to_string()), Some("v".to_string()));

        let got = reply(&handler, request(MessageType::GET, &"k".to_string()));
        assert!(got.is(&MessageType::GET));
        let value: Option<String> = got.decode_payload::<BincodeCodec, _>().unwrap();
        assert_eq!(value, Some("v".to_string()));
    }

    #[test]
    fn test_get_missing_key_is_none() {
        let (handler, _, _) = handler();
        let got = reply(&handler, request(MessageType::GET, &"nope".to_string()));
        let value: Option<String> = got.decode_payload::<BincodeCodec, _>().unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_remove_returns_previous_value() {
        let (handler, store, _) = handler();
        store.insert("k".into(), "v".into());
        let removed = reply(&handler, request(MessageType::REMOVE, &"k".to_string()));
        assert!(removed.is(&MessageType::REMOVE));
        let value: Option<String> = removed.decode_payload::<BincodeCodec, _>().unwrap();
        assert_eq!(value, Some("v".to_string()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_size_keys_and_dump() {
        let (handler, store, _) = handler();
        store.insert("a".into(), "1".into());
        store.insert("b".into(), "2".into());

        let size = reply(&handler, Message::empty(MessageType::SIZE));
        assert_eq!(size.payload_as_u32().unwrap(), 2);

        let keys = reply(&handler, Message::empty(MessageType::KEY_SET));
        let mut keys: Vec<String> = keys.decode_payload::<BincodeCodec, _>().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

        let dump = reply(&handler, Message::empty(MessageType::DUMP_ENTRIES));
        let entries: Vec<(String, String)> = dump.decode_payload::<BincodeCodec, _>().unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(reply(&handler, Message::empty(MessageType::CLEAR)), Message::ack());
        assert!(store.is_empty());
    }

    #[test]
    fn test_contains_answers_yes_or_no() {
        let (handler, store, _) = handler();
        store.insert("k".into(), "v".into());

        assert_eq!(reply(&handler, request(MessageType::CONTAINS_KEY, &"k".to_string())), Message::yes());
        assert_eq!(reply(&handler, request(MessageType::CONTAINS_KEY, &"x".to_string())), Message::no());
        assert_eq!(reply(&handler, request(MessageType::CONTAINS_VALUE, &"v".to_string())), Message::yes());
        assert_eq!(reply(&handler, request(MessageType::CONTAINS_VALUE, &"x".to_string())), Message::no());
    }

    #[test]
    fn test_control_messages_clear_ring_cache() {
        let (handler, _, ring) = handler();
        ring.join(&Node::new(NodeId(1), NodeAddress::new("127.0.0.1", 1))).unwrap();
        ring.all_nodes().unwrap();
        assert!(ring.is_cached());

        assert_eq!(reply(&handler, Message::hi()), Message::ack());
        assert!(!ring.is_cached());

        ring.all_nodes().unwrap();
        assert_eq!(reply(&handler, Message::bye()), Message::ack());
        assert!(!ring.is_cached());
    }

    #[test]
    fn test_unknown_type_is_acknowledged() {
        let (handler, _, _) = handler();
        let unknown = Message::empty(MessageType::new("WHATEVER").unwrap());
        assert_eq!(reply(&handler, unknown), Message::ack());
    }

    #[test]
    fn test_garbage_payload_is_marshalling_failure() {
        let (handler, _, _) = handler();
        let bad = Message::new(MessageType::GET, vec![0xffu8]);
        assert_eq!(handler.handle(bad).unwrap_err().kind(), ErrorKind::Marshalling);
    }
}

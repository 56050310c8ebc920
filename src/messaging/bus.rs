//! Per-process message store.

use std::collections::HashMap;

use crate::error::MessagingError;
use crate::messaging::ring::RingBuffer;
use crate::messaging::{FieldDesc, Message};
use crate::types::SimTime;

/// Handle to a message inside one bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub usize);

/// Metadata attached to every write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageHeader {
    /// Clock time the producer wrote the payload
    pub write_time: SimTime,
    /// Earliest time readers may see the payload
    pub visible_time: SimTime,
    /// Running write counter; 0 means never written
    pub write_count: u64,
}

impl MessageHeader {
    pub fn is_written(&self) -> bool {
        self.write_count > 0
    }
}

/// Static description of a message.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageInfo {
    pub name: String,
    pub type_name: String,
    pub element_count: usize,
    pub buffer_count: usize,
    pub producer: Option<String>,
    /// Field layout, known for typed messages
    pub layout: Option<&'static [FieldDesc]>,
}

struct MessageRecord {
    info: MessageInfo,
    ring: RingBuffer,
    zeros: Vec<f64>,
    write_count: u64,
}

/// Named message store owned by a single process.
///
/// Names are unique within a bus. Access is sequenced by the scheduler, so no
/// locking is involved.
#[derive(Default)]
pub struct MessageBus {
    records: Vec<MessageRecord>,
    index: HashMap<String, MessageId>,
}

impl MessageBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a message.
    ///
    /// # Arguments
    /// * `name` - Unique message name
    /// * `type_name` - Payload type name checked by subscribers
    /// * `element_count` - Number of `f64` elements per payload
    /// * `buffer_count` - Ring depth, at least 1
    ///
    /// # Returns
    /// The message handle, or `DuplicateName` if the name is taken.
    pub fn create_message(
        &mut self,
        name: &str,
        type_name: &str,
        element_count: usize,
        buffer_count: usize,
    ) -> Result<MessageId, MessagingError> {
        if self.index.contains_key(name) {
            return Err(MessagingError::DuplicateName(name.to_string()));
        }
        if buffer_count == 0 {
            return Err(MessagingError::InvalidBufferCount(name.to_string()));
        }

        let id = MessageId(self.records.len());
        self.records.push(MessageRecord {
            info: MessageInfo {
                name: name.to_string(),
                type_name: type_name.to_string(),
                element_count,
                buffer_count,
                producer: None,
                layout: None,
            },
            ring: RingBuffer::new(buffer_count, element_count),
            zeros: vec![0.0; element_count],
            write_count: 0,
        });
        self.index.insert(name.to_string(), id);
        tracing::trace!(message = name, element_count, buffer_count, "message created");
        Ok(id)
    }

    /// Creates a message for payload type `T`.
    pub fn create<T: Message>(
        &mut self,
        name: &str,
        buffer_count: usize,
    ) -> Result<MessageId, MessagingError> {
        let id = self.create_message(name, T::TYPE_NAME, T::size(), buffer_count)?;
        self.records[id.0].info.layout = Some(T::layout());
        Ok(id)
    }

    /// Creates a message with the same description as `info`.
    pub fn create_mirror(&mut self, info: &MessageInfo) -> Result<MessageId, MessagingError> {
        let id = self.create_message(
            &info.name,
            &info.type_name,
            info.element_count,
            info.buffer_count,
        )?;
        let record = &mut self.records[id.0];
        record.info.producer = info.producer.clone();
        record.info.layout = info.layout;
        Ok(id)
    }

    /// Records which model produces a message.
    pub fn set_producer(&mut self, id: MessageId, producer: &str) -> Result<(), MessagingError> {
        let record = self.record_mut(id)?;
        record.info.producer = Some(producer.to_string());
        Ok(())
    }

    /// Looks up a message by name.
    pub fn find(&self, name: &str) -> Option<MessageId> {
        self.index.get(name).copied()
    }

    /// Resolves a message by name and checks its element count.
    pub fn subscribe_raw(
        &self,
        name: &str,
        element_count: usize,
    ) -> Result<MessageId, MessagingError> {
        let id = self
            .find(name)
            .ok_or_else(|| MessagingError::UnknownMessage(name.to_string()))?;
        let info = &self.records[id.0].info;
        if info.element_count != element_count {
            return Err(MessagingError::SizeMismatch {
                name: name.to_string(),
                expected: info.element_count,
                actual: element_count,
            });
        }
        Ok(id)
    }

    /// Resolves a message by name and checks it carries payload type `T`.
    pub fn subscribe<T: Message>(&self, name: &str) -> Result<MessageId, MessagingError> {
        let id = self.subscribe_raw(name, T::size())?;
        let info = &self.records[id.0].info;
        if info.type_name != T::TYPE_NAME {
            return Err(MessagingError::TypeMismatch {
                name: name.to_string(),
                expected: info.type_name.clone(),
                actual: T::TYPE_NAME.to_string(),
            });
        }
        Ok(id)
    }

    /// Appends a raw payload visible immediately.
    pub fn write_raw(
        &mut self,
        id: MessageId,
        data: &[f64],
        time: SimTime,
    ) -> Result<(), MessagingError> {
        self.write_visible(id, data, time, time)
    }

    /// Appends a raw payload that becomes visible at `visible_time`.
    pub fn write_visible(
        &mut self,
        id: MessageId,
        data: &[f64],
        write_time: SimTime,
        visible_time: SimTime,
    ) -> Result<(), MessagingError> {
        let record = self.record_mut(id)?;
        if data.len() != record.info.element_count {
            return Err(MessagingError::SizeMismatch {
                name: record.info.name.clone(),
                expected: record.info.element_count,
                actual: data.len(),
            });
        }
        record.write_count += 1;
        let header = MessageHeader {
            write_time,
            visible_time,
            write_count: record.write_count,
        };
        record.ring.push(header, data);
        Ok(())
    }

    /// Appends a typed payload.
    pub fn write<T: Message>(
        &mut self,
        id: MessageId,
        payload: &T,
        time: SimTime,
    ) -> Result<(), MessagingError> {
        let record = self.record_mut(id)?;
        if record.info.element_count != T::size() {
            return Err(MessagingError::SizeMismatch {
                name: record.info.name.clone(),
                expected: record.info.element_count,
                actual: T::size(),
            });
        }
        record.write_count += 1;
        let header = MessageHeader {
            write_time: time,
            visible_time: time,
            write_count: record.write_count,
        };
        record.ring.push(header, &payload.to_vec());
        Ok(())
    }

    /// Returns the latest payload visible at or before `time`.
    ///
    /// A message that has no visible write yields a zero payload and a default
    /// header (`write_count == 0`).
    pub fn read_raw(
        &self,
        id: MessageId,
        time: SimTime,
    ) -> Result<(MessageHeader, &[f64]), MessagingError> {
        let record = self.record(id)?;
        Ok(match record.ring.latest_at(time) {
            Some(entry) => (entry.header, entry.data.as_slice()),
            None => (MessageHeader::default(), record.zeros.as_slice()),
        })
    }

    /// Typed variant of [`read_raw`](Self::read_raw).
    pub fn read<T: Message>(
        &self,
        id: MessageId,
        time: SimTime,
    ) -> Result<(T, MessageHeader), MessagingError> {
        let (header, data) = self.read_raw(id, time)?;
        if data.len() != T::size() {
            return Err(MessagingError::SizeMismatch {
                name: self.record(id)?.info.name.clone(),
                expected: data.len(),
                actual: T::size(),
            });
        }
        Ok((T::decode(data), header))
    }

    /// Header of the newest write, ignoring visibility.
    pub fn latest_header(&self, id: MessageId) -> Result<MessageHeader, MessagingError> {
        let record = self.record(id)?;
        Ok(record
            .ring
            .latest()
            .map(|e| e.header)
            .unwrap_or_default())
    }

    /// Newest stored write, ignoring visibility.
    pub(crate) fn latest_entry(
        &self,
        id: MessageId,
    ) -> Result<Option<(MessageHeader, &[f64])>, MessagingError> {
        let record = self.record(id)?;
        Ok(record.ring.latest().map(|e| (e.header, e.data.as_slice())))
    }

    /// Stored writes newer than `after_count`, oldest first.
    pub(crate) fn writes_since(
        &self,
        id: MessageId,
        after_count: u64,
    ) -> Result<Vec<(MessageHeader, Vec<f64>)>, MessagingError> {
        let record = self.record(id)?;
        Ok(record
            .ring
            .iter_oldest()
            .filter(|e| e.header.write_count > after_count)
            .map(|e| (e.header, e.data.clone()))
            .collect())
    }

    /// Static description of a message.
    pub fn info(&self, id: MessageId) -> Result<&MessageInfo, MessagingError> {
        Ok(&self.record(id)?.info)
    }

    /// Iterates message names in creation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.info.name.as_str())
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the bus holds no messages.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops the stored history of every message, keeping the messages.
    pub fn clear_history(&mut self) {
        for record in &mut self.records {
            record.ring.clear();
            record.write_count = 0;
        }
    }

    fn record(&self, id: MessageId) -> Result<&MessageRecord, MessagingError> {
        self.records
            .get(id.0)
            .ok_or_else(|| MessagingError::UnknownMessage(format!("#{}", id.0)))
    }

    fn record_mut(&mut self, id: MessageId) -> Result<&mut MessageRecord, MessagingError> {
        self.records
            .get_mut(id.0)
            .ok_or_else(|| MessagingError::UnknownMessage(format!("#{}", id.0)))
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("messages", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::CmdTorqueBodyMsg;

    #[test]
    fn test_duplicate_name_rejected() {
        let mut bus = MessageBus::new();
        bus.create::<CmdTorqueBodyMsg>("cmd_torque", 2).unwrap();
        let err = bus.create::<CmdTorqueBodyMsg>("cmd_torque", 2).unwrap_err();
        assert_eq!(err, MessagingError::DuplicateName("cmd_torque".to_string()));
    }

    #[test]
    fn test_zero_buffer_count_rejected() {
        let mut bus = MessageBus::new();
        assert!(matches!(
            bus.create_message("x", "Raw", 3, 0),
            Err(MessagingError::InvalidBufferCount(_))
        ));
    }

    #[test]
    fn test_read_before_write_is_zero_payload() {
        let mut bus = MessageBus::new();
        let id = bus.create::<CmdTorqueBodyMsg>("cmd_torque", 2).unwrap();
        let (msg, header) = bus.read::<CmdTorqueBodyMsg>(id, 1_000).unwrap();
        assert_eq!(msg.torque_request_body, [0.0; 3]);
        assert!(!header.is_written());
    }

    #[test]
    fn test_read_returns_latest_at_or_before_time() {
        let mut bus = MessageBus::new();
        let id = bus.create_message("raw", "Raw", 1, 3).unwrap();
        bus.write_raw(id, &[1.0], 0).unwrap();
        bus.write_raw(id, &[2.0], 100).unwrap();
        bus.write_raw(id, &[3.0], 200).unwrap();

        assert_eq!(bus.read_raw(id, 150).unwrap().1, &[2.0]);
        assert_eq!(bus.read_raw(id, 200).unwrap().1, &[3.0]);
        assert_eq!(bus.read_raw(id, 0).unwrap().0.write_count, 1);

        // Capacity 3: a fourth write evicts the t=0 sample.
        bus.write_raw(id, &[4.0], 300).unwrap();
        assert_eq!(bus.read_raw(id, 50).unwrap().0.write_count, 0);
    }

    #[test]
    fn test_subscribe_checks_type_and_size() {
        let mut bus = MessageBus::new();
        bus.create_message("raw", "Raw", 3, 2).unwrap();
        assert!(matches!(
            bus.subscribe::<CmdTorqueBodyMsg>("raw"),
            Err(MessagingError::TypeMismatch { .. })
        ));
        assert!(matches!(
            bus.subscribe_raw("raw", 4),
            Err(MessagingError::SizeMismatch { .. })
        ));
        assert!(matches!(
            bus.subscribe_raw("nope", 3),
            Err(MessagingError::UnknownMessage(_))
        ));
    }

    #[test]
    fn test_write_size_mismatch() {
        let mut bus = MessageBus::new();
        let id = bus.create_message("raw", "Raw", 2, 2).unwrap();
        assert!(bus.write_raw(id, &[1.0], 0).is_err());
    }
}

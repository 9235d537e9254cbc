//! Per-source inbound queues with tag matching.

use std::collections::VecDeque;

use tokio::sync::mpsc;

use crate::{Element, Error, Rank};

/// Label attached to every message.
///
/// `User` tags are free for callers. `Broadcast` and `Barrier` are used by
/// the provided collective operations and never collide with user traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    User(u64),
    Broadcast,
    Barrier,
}

impl Tag {
    pub(crate) fn encode(self) -> (u8, u64) {
        match self {
            Tag::User(value) => (0, value),
            Tag::Broadcast => (1, 0),
            Tag::Barrier => (2, 0),
        }
    }

    pub(crate) fn decode(kind: u8, value: u64) -> Result<Self, Error> {
        match kind {
            0 => Ok(Tag::User(value)),
            1 => Ok(Tag::Broadcast),
            2 => Ok(Tag::Barrier),
            other => Err(Error::UnknownTagKind(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Frame {
    pub tag: Tag,
    pub payload: Vec<Element>,
}

/// Frames received from one source rank.
pub(crate) struct Mailbox {
    source: Rank,
    rx: mpsc::UnboundedReceiver<Frame>,
    parked: VecDeque<Frame>,
}

impl Mailbox {
    pub fn new(source: Rank, rx: mpsc::UnboundedReceiver<Frame>) -> Self {
        Self {
            source,
            rx,
            parked: VecDeque::new(),
        }
    }

    /// Waits for the oldest frame carrying `tag`.
    pub async fn take(&mut self, tag: Tag) -> Result<Frame, Error> {
        if let Some(pos) = self.parked.iter().position(|f| f.tag == tag) {
            if let Some(frame) = self.parked.remove(pos) {
                return Ok(frame);
            }
        }

        loop {
            let frame = self
                .rx
                .recv()
                .await
                .ok_or(Error::ConnectionClosed(self.source))?;
            if frame.tag == tag {
                return Ok(frame);
            }
            self.parked.push_back(frame);
        }
    }

    /// Waits for a frame carrying `tag` and copies it into `buf`.
    pub async fn take_into(&mut self, buf: &mut [Element], tag: Tag) -> Result<(), Error> {
        let frame = self.take(tag).await?;
        if frame.payload.len() != buf.len() {
            return Err(Error::SizeMismatch {
                peer: self.source,
                expected: buf.len(),
                actual: frame.payload.len(),
            });
        }
        buf.copy_from_slice(&frame.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;

    fn frame(tag: Tag, payload: &[Element]) -> Frame {
        Frame {
            tag,
            payload: payload.to_vec(),
        }
    }

    #[tokio::test]
    async fn parks_frames_with_other_tags() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut mailbox = Mailbox::new(3, rx);

        tx.send(frame(Tag::User(1), &[10])).unwrap();
        tx.send(frame(Tag::User(2), &[20])).unwrap();
        tx.send(frame(Tag::User(1), &[11])).unwrap();

        assert_eq!(mailbox.take(Tag::User(2)).await.unwrap().payload, vec![20]);
        assert_eq!(mailbox.take(Tag::User(1)).await.unwrap().payload, vec![10]);
        assert_eq!(mailbox.take(Tag::User(1)).await.unwrap().payload, vec![11]);
    }

    #[tokio::test]
    async fn size_mismatch_is_reported() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut mailbox = Mailbox::new(1, rx);
        tx.send(frame(Tag::Broadcast, &[1, 2, 3])).unwrap();

        let mut buf = [0; 2];
        let err = mailbox.take_into(&mut buf, Tag::Broadcast).await.unwrap_err();
        assert!(matches!(
            err,
            Error::SizeMismatch {
                peer: 1,
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn closed_channel_is_an_error() {
        let (tx, rx) = mpsc::unbounded_channel::<Frame>();
        let mut mailbox = Mailbox::new(4, rx);
        drop(tx);

        let err = mailbox.take(Tag::Barrier).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed(4)));
    }

    #[test]
    fn tag_encoding_round_trips() {
        for tag in [Tag::User(0), Tag::User(u64::MAX), Tag::Broadcast, Tag::Barrier] {
            let (kind, value) = tag.encode();
            assert_eq!(Tag::decode(kind, value).unwrap(), tag);
        }
        assert!(matches!(Tag::decode(9, 0), Err(Error::UnknownTagKind(9))));
    }

    fn arrivals_and_requests() -> impl Strategy<Value = (Vec<Tag>, Vec<Tag>)> {
        let tag = prop_oneof![
            (0u64..4).prop_map(Tag::User),
            Just(Tag::Broadcast),
            Just(Tag::Barrier),
        ];
        prop::collection::vec(tag, 0..40).prop_flat_map(|arrivals| {
            let requests = Just(arrivals.clone()).prop_shuffle();
            (Just(arrivals), requests)
        })
    }

    proptest! {
        #[test]
        fn each_tag_is_delivered_in_arrival_order((arrivals, requests) in arrivals_and_requests()) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let (tx, rx) = mpsc::unbounded_channel();
                let mut mailbox = Mailbox::new(0, rx);
                for (seq, &tag) in arrivals.iter().enumerate() {
                    tx.send(frame(tag, &[seq as Element])).unwrap();
                }

                let mut last_seen: HashMap<Tag, Element> = HashMap::new();
                for &tag in &requests {
                    let got = mailbox.take(tag).await.unwrap();
                    prop_assert_eq!(got.tag, tag);
                    let seq = got.payload[0];
                    if let Some(&prev) = last_seen.get(&tag) {
                        prop_assert!(prev < seq, "{:?} delivered {} after {}", tag, seq, prev);
                    }
                    last_seen.insert(tag, seq);
                }
                prop_assert!(mailbox.parked.is_empty());
                Ok(())
            })?;
        }
    }
}

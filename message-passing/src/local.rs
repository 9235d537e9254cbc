//! In-process transport: every rank is a task in the same runtime.

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::communicator::check_peer;
use crate::mailbox::{Frame, Mailbox};
use crate::{Communicator, Element, Error, Rank, Tag};

/// One rank of a [`local_cluster`].
pub struct LocalCommunicator {
    rank: Rank,
    outboxes: Vec<Option<mpsc::UnboundedSender<Frame>>>,
    mailboxes: Vec<Option<Mutex<Mailbox>>>,
}

/// Creates `size` ranks wired together by one channel per ordered pair.
///
/// Dropping a rank closes its outgoing channels, so peers waiting on it see
/// [`Error::ConnectionClosed`] instead of hanging.
pub fn local_cluster(size: usize) -> Vec<LocalCommunicator> {
    let mut outboxes: Vec<Vec<Option<mpsc::UnboundedSender<Frame>>>> =
        (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
    let mut mailboxes: Vec<Vec<Option<Mutex<Mailbox>>>> =
        (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

    for source in 0..size {
        for dest in (0..size).filter(|&dest| dest != source) {
            let (tx, rx) = mpsc::unbounded_channel();
            outboxes[source][dest] = Some(tx);
            mailboxes[dest][source] = Some(Mutex::new(Mailbox::new(source, rx)));
        }
    }

    outboxes
        .into_iter()
        .zip(mailboxes)
        .enumerate()
        .map(|(rank, (outboxes, mailboxes))| LocalCommunicator {
            rank,
            outboxes,
            mailboxes,
        })
        .collect()
}

#[async_trait]
impl Communicator for LocalCommunicator {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.outboxes.len()
    }

    async fn send(&self, buf: &[Element], dest: Rank, tag: Tag) -> Result<(), Error> {
        check_peer(self.rank, dest, self.size())?;
        let outbox = self.outboxes[dest]
            .as_ref()
            .ok_or(Error::ConnectionClosed(dest))?;
        outbox
            .send(Frame {
                tag,
                payload: buf.to_vec(),
            })
            .map_err(|_| Error::ConnectionClosed(dest))
    }

    async fn receive(&self, buf: &mut [Element], source: Rank, tag: Tag) -> Result<(), Error> {
        check_peer(self.rank, source, self.size())?;
        let mailbox = self.mailboxes[source]
            .as_ref()
            .ok_or(Error::ConnectionClosed(source))?;
        mailbox.lock().await.take_into(buf, tag).await
    }
}

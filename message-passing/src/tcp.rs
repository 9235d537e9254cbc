//! TCP transport: one rank per process, connected as a full mesh.
//!
//! # Connection setup
//!
//! Rank `r` listens on `addrs[r]`, dials every lower rank and accepts one
//! connection from every higher rank. Both ends of a connection exchange a
//! hello frame (magic, protocol version, rank, world size) before any data.
//!
//! # Wire format
//!
//! All integers are little-endian.
//!
//! - **Hello**: `b"MPCH"`, `u32` version, `u64` rank, `u64` world size
//! - **Frame**: `u8` tag kind, `u64` tag value, `u64` element count, then
//!   that many `i64` elements

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::communicator::{check_peer, check_rank};
use crate::mailbox::{Frame, Mailbox};
use crate::{Communicator, Element, Error, Rank, Tag};

const HANDSHAKE_MAGIC: &[u8; 4] = b"MPCH";
const PROTOCOL_VERSION: u32 = 1;
const MAX_CONNECT_ATTEMPTS: usize = 10;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(2);
const MAX_FRAME_ELEMENTS: u64 = 1 << 28;

/// A rank connected to its peers over TCP.
///
/// Each peer connection has a background task that decodes incoming frames
/// into that peer's mailbox. The tasks are aborted when the communicator is
/// dropped, which closes the connections and unblocks any peer waiting on
/// this rank with [`Error::ConnectionClosed`].
///
/// # Example
///
/// ```no_run
/// use message_passing::{Communicator, TcpCommunicator};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let addrs = vec!["127.0.0.1:47000".parse()?, "127.0.0.1:47001".parse()?];
///     let comm = TcpCommunicator::connect(0, &addrs).await?;
///
///     let mut n = [42];
///     comm.broadcast(&mut n, 0).await?;
///     Ok(())
/// }
/// ```
pub struct TcpCommunicator {
    rank: Rank,
    writers: Vec<Option<Mutex<OwnedWriteHalf>>>,
    mailboxes: Vec<Option<Mutex<Mailbox>>>,
    readers: Vec<JoinHandle<()>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hello {
    rank: Rank,
    size: usize,
}

impl TcpCommunicator {
    /// Binds `addrs[rank]` and connects to every other address in `addrs`.
    ///
    /// The world size is `addrs.len()`; every rank must pass the same list.
    pub async fn connect(rank: Rank, addrs: &[SocketAddr]) -> Result<Self, Error> {
        check_rank(rank, addrs.len())?;
        let listener = TcpListener::bind(addrs[rank]).await?;
        Self::with_listener(rank, listener, addrs).await
    }

    /// Like [`connect`](Self::connect), but with an already bound listener.
    ///
    /// Useful when ports are picked by the OS: bind every listener first,
    /// then hand out their local addresses.
    pub async fn with_listener(
        rank: Rank,
        listener: TcpListener,
        addrs: &[SocketAddr],
    ) -> Result<Self, Error> {
        let size = addrs.len();
        check_rank(rank, size)?;
        let own = Hello { rank, size };
        let mut streams: Vec<Option<TcpStream>> = (0..size).map(|_| None).collect();

        for (peer, addr) in addrs.iter().enumerate().take(rank) {
            let mut stream = dial(peer, *addr).await?;
            write_hello(&mut stream, own).await?;
            let hello = read_hello(&mut stream).await?;
            if hello != (Hello { rank: peer, size }) {
                return Err(Error::Handshake(format!(
                    "expected rank {peer} of {size} at {addr}, got rank {} of {}",
                    hello.rank, hello.size
                )));
            }
            debug!(rank, peer, %addr, "connected to peer");
            streams[peer] = Some(stream);
        }

        for _ in rank + 1..size {
            let (mut stream, remote) = listener.accept().await?;
            let hello = read_hello(&mut stream).await?;
            let expected_peer = hello.rank > rank && hello.rank < size;
            if hello.size != size || !expected_peer || streams[hello.rank].is_some() {
                return Err(Error::Handshake(format!(
                    "unexpected hello from {remote}: rank {} of {}",
                    hello.rank, hello.size
                )));
            }
            write_hello(&mut stream, own).await?;
            debug!(rank, peer = hello.rank, %remote, "accepted peer");
            streams[hello.rank] = Some(stream);
        }

        let mut writers = Vec::with_capacity(size);
        let mut mailboxes = Vec::with_capacity(size);
        let mut readers = Vec::with_capacity(size.saturating_sub(1));

        for (peer, stream) in streams.into_iter().enumerate() {
            let Some(stream) = stream else {
                writers.push(None);
                mailboxes.push(None);
                continue;
            };

            stream.set_nodelay(true)?;
            let (read_half, write_half) = stream.into_split();
            let (tx, rx) = mpsc::unbounded_channel();

            readers.push(tokio::spawn(async move {
                if let Err(e) = read_frames(BufReader::new(read_half), tx).await {
                    warn!(peer, error = %e, "reader task stopped");
                }
            }));
            writers.push(Some(Mutex::new(write_half)));
            mailboxes.push(Some(Mutex::new(Mailbox::new(peer, rx))));
        }

        Ok(Self {
            rank,
            writers,
            mailboxes,
            readers,
        })
    }
}

impl Drop for TcpCommunicator {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
    }
}

#[async_trait]
impl Communicator for TcpCommunicator {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.writers.len()
    }

    async fn send(&self, buf: &[Element], dest: Rank, tag: Tag) -> Result<(), Error> {
        check_peer(self.rank, dest, self.size())?;
        let writer = self.writers[dest]
            .as_ref()
            .ok_or(Error::ConnectionClosed(dest))?;
        let bytes = encode_frame(tag, buf);
        writer.lock().await.write_all(&bytes).await?;
        Ok(())
    }

    async fn receive(&self, buf: &mut [Element], source: Rank, tag: Tag) -> Result<(), Error> {
        check_peer(self.rank, source, self.size())?;
        let mailbox = self.mailboxes[source]
            .as_ref()
            .ok_or(Error::ConnectionClosed(source))?;
        mailbox.lock().await.take_into(buf, tag).await
    }
}

/// Connects to `addr`, retrying with exponential backoff while the peer
/// is still starting up.
async fn dial(peer: Rank, addr: SocketAddr) -> Result<TcpStream, Error> {
    let mut attempts = 0;
    let mut delay = Duration::from_millis(100);

    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                attempts += 1;
                if attempts >= MAX_CONNECT_ATTEMPTS {
                    return Err(Error::Unreachable {
                        rank: peer,
                        attempts,
                    });
                }
                debug!(peer, %addr, attempts, error = %e, "peer not reachable yet");
            }
        }

        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(MAX_RETRY_DELAY);
    }
}

async fn write_hello<W: AsyncWrite + Unpin>(writer: &mut W, hello: Hello) -> Result<(), Error> {
    let mut buf = Vec::with_capacity(24);
    buf.extend_from_slice(HANDSHAKE_MAGIC);
    buf.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    buf.extend_from_slice(&(hello.rank as u64).to_le_bytes());
    buf.extend_from_slice(&(hello.size as u64).to_le_bytes());
    writer.write_all(&buf).await?;
    Ok(())
}

async fn read_hello<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Hello, Error> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).await?;
    if &magic != HANDSHAKE_MAGIC {
        return Err(Error::Handshake(format!(
            "invalid magic: {}",
            String::from_utf8_lossy(&magic)
        )));
    }

    let version = reader.read_u32_le().await?;
    if version != PROTOCOL_VERSION {
        return Err(Error::Handshake(format!("unsupported version {version}")));
    }

    let rank = reader.read_u64_le().await?;
    let size = reader.read_u64_le().await?;
    let out_of_range =
        |what: &str, value: u64| Error::Handshake(format!("{what} {value} out of range"));
    Ok(Hello {
        rank: usize::try_from(rank).map_err(|_| out_of_range("rank", rank))?,
        size: usize::try_from(size).map_err(|_| out_of_range("size", size))?,
    })
}

fn encode_frame(tag: Tag, payload: &[Element]) -> Vec<u8> {
    let (kind, value) = tag.encode();
    let mut buf = Vec::with_capacity(17 + payload.len() * 8);
    buf.push(kind);
    buf.extend_from_slice(&value.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    for element in payload {
        buf.extend_from_slice(&element.to_le_bytes());
    }
    buf
}

/// Reads one frame, or `None` on a clean end of stream.
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Frame>, Error> {
    let kind = match reader.read_u8().await {
        Ok(kind) => kind,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value = reader.read_u64_le().await?;
    let tag = Tag::decode(kind, value)?;

    let len = reader.read_u64_le().await?;
    if len > MAX_FRAME_ELEMENTS {
        return Err(Error::FrameTooLarge(len));
    }

    let mut bytes = vec![0u8; len as usize * 8];
    reader.read_exact(&mut bytes).await?;
    let payload = bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            Element::from_le_bytes(word)
        })
        .collect();

    Ok(Some(Frame { tag, payload }))
}

async fn read_frames<R: AsyncRead + Unpin>(
    mut reader: R,
    tx: mpsc::UnboundedSender<Frame>,
) -> Result<(), Error> {
    while let Some(frame) = read_frame(&mut reader).await? {
        if tx.send(frame).is_err() {
            break;
        }
    }
    Ok(())
}

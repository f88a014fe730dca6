//! Connection lifecycle, the publish hot path, and subscriber fan-out.
//! Grounded on `original_source/pubsub/SimplePublisherV2.h` (accept loop,
//! per-client state, broadcast-on-publish) and `Common.h`'s `DataTopic`.

use std::sync::Arc;

use lithos_config::{Endpoint, PublisherConfig, SequenceStoreBackend};
use lithos_events::{SubscriptionResponse, TopicMessageHeader};
use lithos_journal::MessageLog;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::{Semaphore, broadcast};

use crate::codec::{self, Frame};
use crate::error::PubSubError;
use crate::recovery;
use crate::sequence_store::{FileSequenceStore, MasterSequenceStore, SequenceStore};

/// A socket half that can be driven as both an async reader and writer; lets
/// the accept loop treat TCP and Unix-domain connections identically.
pub trait DuplexStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> DuplexStream for T {}

const BROADCAST_CAPACITY: usize = 4096;

/// A publisher: owns the journal of record, the durable sequence counters,
/// and the live fan-out to connected subscribers. One `Publisher` serves one
/// configured listen endpoint.
pub struct Publisher {
    pub(crate) name: String,
    publisher_id: u32,
    publisher_date: i32,
    listen: Endpoint,
    pub(crate) journal: Mutex<MessageLog>,
    sequence_store: Box<dyn SequenceStore>,
    subscribers: broadcast::Sender<Arc<Vec<u8>>>,
    pub(crate) recovery_semaphore: Semaphore,
}

impl Publisher {
    pub fn open(config: &PublisherConfig, publisher_id: u32, publisher_date: i32) -> Result<Self, PubSubError> {
        let journal = MessageLog::open(&config.journal_base_path)?;
        let sequence_store: Box<dyn SequenceStore> = match config.sequence_store {
            SequenceStoreBackend::File => Box::new(FileSequenceStore::new(&config.sequence_store_dir)?),
            SequenceStoreBackend::Master => {
                Box::new(MasterSequenceStore::open(format!("{}/sequences", config.sequence_store_dir), 256)?)
            }
        };
        let (subscribers, _rx) = broadcast::channel(BROADCAST_CAPACITY);

        Ok(Self {
            name: config.publisher_name.clone(),
            publisher_id,
            publisher_date,
            listen: config.listen.clone(),
            journal: Mutex::new(journal),
            sequence_store,
            subscribers,
            recovery_semaphore: Semaphore::new(config.recovery_workers.max(1)),
        })
    }

    /// Returns the most recently assigned global sequence number, or 0 if
    /// nothing has been published yet.
    pub fn current_global_seq(&self) -> Result<u32, PubSubError> {
        Ok(self.sequence_store.load(&self.name)?.map(|r| r.all_topics_sequence).unwrap_or(0))
    }

    /// Assigns the next sequence numbers for `topic`, appends the encoded
    /// frame to the journal, and broadcasts it to subscribed connections.
    /// Returns the assigned global sequence number.
    pub fn publish(&self, topic: u32, data: &[u8]) -> Result<u32, PubSubError> {
        let now_ns = crate::now_ns();
        let mut journal = self.journal.lock();

        let (global_seq, topic_seq) =
            self.sequence_store.increment(&self.name, self.publisher_id, self.publisher_date, topic, now_ns)?;

        let header =
            TopicMessageHeader { topic, global_seq, topic_seq, timestamp: now_ns, data_size: data.len() as u32 };
        let mut frame_bytes = Vec::with_capacity(lithos_events::frame::TOPIC_MESSAGE_HEADER_SIZE + data.len());
        frame_bytes.extend_from_slice(&header.to_bytes());
        frame_bytes.extend_from_slice(data);

        journal.append(&frame_bytes, now_ns)?;
        drop(journal);

        let _ = self.subscribers.send(Arc::new(frame_bytes));
        Ok(global_seq)
    }

    /// Runs the accept loop for this publisher's configured endpoint until an
    /// unrecoverable listener error occurs. Intended to run inside its own
    /// single-threaded `tokio` runtime, one per publisher worker thread.
    pub async fn run(self: Arc<Self>) -> Result<(), PubSubError> {
        match self.listen.clone() {
            Endpoint::Tcp { host, port } => {
                let listener = TcpListener::bind((host.as_str(), port)).await?;
                tracing::info!(publisher = %self.name, %host, port, "publisher listening");
                loop {
                    let (stream, peer) = listener.accept().await?;
                    tracing::debug!(publisher = %self.name, %peer, "accepted connection");
                    let publisher = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, publisher).await {
                            tracing::warn!(%e, "connection ended with error");
                        }
                    });
                }
            }
            Endpoint::Unix { path } => {
                let _ = std::fs::remove_file(&path);
                let listener = UnixListener::bind(&path)?;
                tracing::info!(publisher = %self.name, %path, "publisher listening");
                loop {
                    let (stream, _addr) = listener.accept().await?;
                    let publisher = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, publisher).await {
                            tracing::warn!(%e, "connection ended with error");
                        }
                    });
                }
            }
        }
    }
}

async fn handle_connection<S: DuplexStream>(mut stream: S, publisher: Arc<Publisher>) -> Result<(), PubSubError> {
    match codec::read_frame(&mut stream).await? {
        Frame::SubscriptionRequest(req) => handle_subscribe(stream, publisher, req).await,
        Frame::RecoveryRequest(req) => {
            let current = publisher.current_global_seq()?;
            recovery::replay(&publisher, &mut stream, (req.last_seq as u64) + 1, current as u64, req.topic_mask)
                .await
                .map(|_| ())
        }
        other => {
            tracing::warn!(?other, "unexpected first frame on new connection");
            Ok(())
        }
    }
}

/// Serves one subscribed connection: an initial `SubscriptionResponse` (plus
/// recovery replay if `req.last_seq` trails the current tip), then live
/// fan-out. The connection is split, with the read half driven by its own
/// task feeding an `mpsc` channel (the wake-up-pipe equivalent), so a
/// subsequent `RecoveryRequest` on the same stream (a
/// [`Subscriber::resubscribe`] call, e.g. after a known gap) can be served
/// without dropping the connection, and without the cancellation hazard of
/// racing a multi-step frame read directly inside `select!`.
async fn handle_subscribe<S: DuplexStream>(
    stream: S,
    publisher: Arc<Publisher>,
    req: lithos_events::SubscriptionRequest,
) -> Result<(), PubSubError> {
    let (mut reader, mut writer) = tokio::io::split(stream);
    let approved = req.topic_mask & (lithos_events::Topic::All as u32);

    // Subscribe to the live broadcast before snapshotting the cutover
    // sequence: anything published after this point lands on `rx` even if
    // it also falls inside the replay range below, so a subscriber sees it
    // at least once rather than risking it lands in neither place. The
    // subscriber side drops the resulting duplicate.
    let mut rx = publisher.subscribers.subscribe();
    let current_seq = publisher.current_global_seq()?;

    codec::write_frame(
        &mut writer,
        &Frame::SubscriptionResponse(SubscriptionResponse { result: 0, approved_topics: approved, current_seq }),
    )
    .await?;

    if req.last_seq > 0 && (req.last_seq as u32) < current_seq {
        recovery::replay(&publisher, &mut writer, (req.last_seq as u64) + 1, current_seq as u64, approved).await?;
    }

    let (incoming_tx, mut incoming_rx) = tokio::sync::mpsc::channel(8);
    tokio::spawn(async move {
        loop {
            match codec::read_frame(&mut reader).await {
                Ok(frame) => {
                    if incoming_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Ok(frame_bytes) => {
                        let header = TopicMessageHeader::from_bytes(&frame_bytes[4..]);
                        if header.topic & approved == 0 {
                            continue;
                        }
                        if writer.write_all(&frame_bytes).await.is_err() {
                            break;
                        }
                        let _ = writer.flush().await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(publisher = %publisher.name, skipped, "subscriber lagged, some messages dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            frame = incoming_rx.recv() => {
                match frame {
                    Some(Frame::RecoveryRequest(r)) => {
                        let current = publisher.current_global_seq()?;
                        recovery::replay(&publisher, &mut writer, (r.last_seq as u64) + 1, current as u64, r.topic_mask).await?;
                    }
                    Some(other) => {
                        tracing::warn!(?other, "unexpected frame on live subscriber connection");
                    }
                    None => break,
                }
            }
        }
    }
    Ok(())
}

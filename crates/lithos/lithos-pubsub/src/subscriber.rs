//! Client-side connection and recovery state machine. Grounded on
//! `original_source/pubsub/SimpleSubscriber.h`'s `ClientStatus` transitions
//! and its `validate_sequence` per-topic gap/duplicate check.

use std::collections::HashMap;
use std::time::Duration;

use lithos_config::{Endpoint, SubscriberConfig};
use lithos_events::{RecoveryRequest, SubscriptionRequest, TopicMessageHeader};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};

use crate::codec::{self, Frame};
use crate::error::PubSubError;

/// Mirrors `ClientStatus` from the original system: where this subscriber
/// sits in the connect/recover/catch-up/online lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Connected,
    RecoveryNeeded,
    Recovering,
    CatchingUp,
    Online,
    Offline,
}

/// Outcome of checking an incoming topic message's per-topic sequence
/// against the last one accepted for that topic. Mirrors
/// `SimpleSubscriber::validate_sequence`'s three-way result.
#[derive(Debug, PartialEq, Eq)]
enum SequenceVerdict {
    /// `s == c + 1`: in order, accept and advance the per-topic counter.
    Accept,
    /// `s <= c`: already seen, drop silently.
    Duplicate,
    /// `s > c + 1`: one or more messages were missed.
    Gap,
}

/// Establishes a fresh transport connection of type `Self` for reconnects.
/// Implemented per concrete stream type since the endpoint it dials (and the
/// variant of `Endpoint` it's read from) differs between them.
trait Connectable: Sized {
    async fn dial(config: &SubscriberConfig) -> Result<Self, PubSubError>;
}

impl Connectable for TcpStream {
    async fn dial(config: &SubscriberConfig) -> Result<Self, PubSubError> {
        let Endpoint::Tcp { host, port } = &config.connect else {
            panic!("tcp subscriber reconnect called with a non-tcp endpoint");
        };
        Ok(TcpStream::connect((host.as_str(), *port)).await?)
    }
}

impl Connectable for UnixStream {
    async fn dial(config: &SubscriberConfig) -> Result<Self, PubSubError> {
        let Endpoint::Unix { path } = &config.connect else {
            panic!("unix subscriber reconnect called with a non-unix endpoint");
        };
        Ok(UnixStream::connect(path).await?)
    }
}

/// A connected subscriber session. Delivers topic messages to the caller via
/// [`Subscriber::next_message`], transparently recovering any gap between the
/// connection's `last_seq` and the publisher's current sequence before
/// switching to live delivery, and transparently reconnecting (after
/// `config.reconnect_delay_ms`) on EOF or I/O error.
pub struct Subscriber<S> {
    stream: S,
    config: SubscriberConfig,
    state: SubscriberState,
    client_id: u32,
    topic_mask: u32,
    approved_topics: u32,
    /// Last accepted per-topic sequence, keyed by the single topic bit
    /// carried on `TopicMessageHeader::topic`.
    topic_sequences: HashMap<u32, u32>,
    /// Last accepted global sequence; carried across reconnects so a
    /// resumed connection's subscribe/recovery request picks up where the
    /// previous one left off instead of re-requesting from scratch.
    last_global_seq: u32,
}

impl Subscriber<TcpStream> {
    pub async fn connect_tcp(config: &SubscriberConfig, client_id: u32) -> Result<Self, PubSubError> {
        let stream = TcpStream::dial(config).await?;
        Self::handshake(stream, config.clone(), client_id, 0).await
    }
}

impl Subscriber<UnixStream> {
    pub async fn connect_unix(config: &SubscriberConfig, client_id: u32) -> Result<Self, PubSubError> {
        let stream = UnixStream::dial(config).await?;
        Self::handshake(stream, config.clone(), client_id, 0).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Connectable> Subscriber<S> {
    async fn handshake(
        mut stream: S,
        config: SubscriberConfig,
        client_id: u32,
        last_seq: u32,
    ) -> Result<Self, PubSubError> {
        let mut client_name = [0u8; 64];
        let n = config.client_name.len().min(64);
        client_name[..n].copy_from_slice(&config.client_name.as_bytes()[..n]);

        codec::write_frame(
            &mut stream,
            &Frame::SubscriptionRequest(SubscriptionRequest {
                client_id,
                topic_mask: config.topic_mask,
                last_seq,
                client_name,
            }),
        )
        .await?;

        let Frame::SubscriptionResponse(response) = codec::read_frame(&mut stream).await? else {
            return Err(PubSubError::ShortRead);
        };

        let state = if response.current_seq > last_seq { SubscriberState::RecoveryNeeded } else { SubscriberState::Online };

        Ok(Self {
            stream,
            topic_mask: config.topic_mask,
            approved_topics: response.approved_topics,
            config,
            state,
            client_id,
            topic_sequences: HashMap::new(),
            last_global_seq: last_seq,
        })
    }

    /// Requests replay of everything published after `last_seq`, on the same
    /// connection, without resubscribing. The reply (a `RecoveryResponse`
    /// bracketing zero or more `TopicMessage` frames, then a
    /// `RecoveryComplete`) is picked up by subsequent [`Self::next_message`]
    /// calls, which drive the corresponding state transitions.
    pub async fn resubscribe(&mut self, last_seq: u32) -> Result<(), PubSubError> {
        codec::write_frame(
            &mut self.stream,
            &Frame::RecoveryRequest(RecoveryRequest { client_id: self.client_id, topic_mask: self.topic_mask, last_seq }),
        )
        .await?;
        self.state = SubscriberState::RecoveryNeeded;
        Ok(())
    }

    pub fn state(&self) -> SubscriberState {
        self.state
    }

    pub fn approved_topics(&self) -> u32 {
        self.approved_topics
    }

    /// Checks `sequence` on `topic` against the last one accepted for that
    /// topic and, if it's in order, records it.
    fn validate_sequence(&mut self, topic: u32, sequence: u32) -> SequenceVerdict {
        let current = self.topic_sequences.get(&topic).copied().unwrap_or(0);
        if sequence == current + 1 {
            self.topic_sequences.insert(topic, sequence);
            SequenceVerdict::Accept
        } else if sequence <= current {
            SequenceVerdict::Duplicate
        } else {
            SequenceVerdict::Gap
        }
    }

    /// Drops the current connection and retries dialing `config.connect`
    /// (and re-running the subscribe handshake, carrying forward
    /// `last_global_seq`) every `reconnect_delay_ms` until one succeeds.
    async fn reconnect(&mut self) -> Result<(), PubSubError> {
        self.state = SubscriberState::Offline;
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);
        loop {
            let attempt = async {
                let stream = S::dial(&self.config).await?;
                Self::handshake(stream, self.config.clone(), self.client_id, self.last_global_seq).await
            }
            .await;

            match attempt {
                Ok(fresh) => {
                    self.stream = fresh.stream;
                    self.state = fresh.state;
                    self.approved_topics = fresh.approved_topics;
                    tracing::info!(client = %self.config.client_name, "reconnected");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(client = %self.config.client_name, %e, "reconnect failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Returns the next topic message that's next in sequence for its topic,
    /// transparently stepping through recovery-response/recovery-complete
    /// bracket frames, dropping duplicates, triggering a recovery-request on
    /// a detected gap, and reconnecting (retrying indefinitely, per
    /// `config.reconnect_delay_ms`) across EOF or I/O errors.
    pub async fn next_message(&mut self) -> Result<(TopicMessageHeader, Vec<u8>), PubSubError> {
        loop {
            let frame = match codec::read_frame(&mut self.stream).await {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(client = %self.config.client_name, %e, "connection lost");
                    self.reconnect().await?;
                    continue;
                }
            };

            match frame {
                Frame::TopicMessage { header, data } => match self.validate_sequence(header.topic, header.topic_seq) {
                    SequenceVerdict::Accept => {
                        self.last_global_seq = header.global_seq;
                        if matches!(self.state, SubscriberState::RecoveryNeeded) {
                            self.state = SubscriberState::Recovering;
                        }
                        return Ok((header, data));
                    }
                    SequenceVerdict::Duplicate => continue,
                    SequenceVerdict::Gap => {
                        let last_seq = self.last_global_seq;
                        self.resubscribe(last_seq).await?;
                        continue;
                    }
                },
                Frame::RecoveryResponse(_) => {
                    self.state = SubscriberState::Recovering;
                    continue;
                }
                Frame::RecoveryComplete(_) => {
                    self.state = SubscriberState::Online;
                    continue;
                }
                other => {
                    tracing::debug!(?other, "ignoring unexpected frame while awaiting topic message");
                    continue;
                }
            }
        }
    }

    pub async fn shutdown(mut self) -> Result<(), PubSubError> {
        self.stream.shutdown().await?;
        self.state = SubscriberState::Offline;
        Ok(())
    }
}

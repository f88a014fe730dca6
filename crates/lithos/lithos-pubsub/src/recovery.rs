//! Gap-free recovery replay: a subscriber reconnecting
//! with a stale `last_seq` is caught up from the journal before (or instead
//! of) joining the live broadcast. Grounded on
//! `original_source/pubsub/SimplePublisherV2.h`'s recovery-thread replay loop.

use std::ops::ControlFlow;

use lithos_events::{RecoveryComplete, RecoveryResponse, TopicMessageHeader};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::codec::{self, Frame};
use crate::error::PubSubError;
use crate::publisher::Publisher;

/// Replays journal entries `[lo, hi]` matching `topic_mask` to `stream`,
/// bracketed by a `RecoveryResponse` and a `RecoveryComplete` frame. Bounded
/// by `Publisher`'s recovery semaphore so a burst of reconnects can't run
/// unbounded concurrent journal scans.
pub async fn replay<S: AsyncWrite + Unpin>(
    publisher: &Publisher,
    stream: &mut S,
    lo: u64,
    hi: u64,
    topic_mask: u32,
) -> Result<u32, PubSubError> {
    let _permit = publisher.recovery_semaphore.acquire().await.expect("recovery semaphore closed");

    let mut matched = Vec::new();
    if hi >= lo {
        let mut journal = publisher.journal.lock();
        journal.range(lo, hi, |_entry, payload| {
            let header = TopicMessageHeader::from_bytes(&payload[4..]);
            if header.topic & topic_mask != 0 {
                matched.push(payload.to_vec());
            }
            ControlFlow::Continue(())
        })?;
    }

    codec::write_frame(
        stream,
        &Frame::RecoveryResponse(RecoveryResponse { result: 0, start_seq: lo as u32, end_seq: hi as u32, total: matched.len() as u32 }),
    )
    .await?;

    for frame_bytes in &matched {
        stream.write_all(frame_bytes).await?;
    }
    stream.flush().await?;

    codec::write_frame(
        stream,
        &Frame::RecoveryComplete(RecoveryComplete { total_sent: matched.len() as u32, timestamp: crate::now_ns() }),
    )
    .await?;

    Ok(matched.len() as u32)
}

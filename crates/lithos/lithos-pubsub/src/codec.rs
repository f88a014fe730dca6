//! Async framing over the wire protocol defined in `lithos_events::frame`.
//! Grounded on `original_source/pubsub/Common.h`'s message structs; the byte
//! layout is read/written by `lithos_events`, this module only owns the
//! magic-number dispatch and the async read/write loop.

use lithos_events::{
    RecoveryComplete, RecoveryRequest, RecoveryResponse, SubscriptionRequest, SubscriptionResponse, TopicMessageHeader,
    magic,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::PubSubError;

#[derive(Debug, Clone)]
pub enum Frame {
    TopicMessage { header: TopicMessageHeader, data: Vec<u8> },
    SubscriptionRequest(SubscriptionRequest),
    SubscriptionResponse(SubscriptionResponse),
    RecoveryRequest(RecoveryRequest),
    RecoveryResponse(RecoveryResponse),
    RecoveryComplete(RecoveryComplete),
}

pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, PubSubError> {
    loop {
        let magic = reader.read_u32().await.map_err(|_| PubSubError::ShortRead)?;
        if let Some(frame) = read_frame_body(reader, magic).await? {
            return Ok(frame);
        }
        tracing::debug!(magic, "unknown frame magic, discarding and resyncing");
    }
}

/// Reads the body for a frame whose magic has already been consumed.
/// Returns `None` on an unrecognized magic so the caller can discard it and
/// keep scanning for the next valid frame, per the wire protocol's
/// defensive-resync rule.
async fn read_frame_body<R: AsyncRead + Unpin>(reader: &mut R, magic: u32) -> Result<Option<Frame>, PubSubError> {
    match magic {
        magic::TOPIC_MESSAGE => {
            let mut rest = [0u8; lithos_events::frame::TOPIC_MESSAGE_HEADER_SIZE - 4];
            reader.read_exact(&mut rest).await?;
            let header = TopicMessageHeader::from_bytes(&rest);
            let mut data = vec![0u8; header.data_size as usize];
            reader.read_exact(&mut data).await?;
            Ok(Some(Frame::TopicMessage { header, data }))
        }
        magic::SUBSCRIPTION_REQUEST => {
            let mut rest = [0u8; lithos_events::frame::SUBSCRIPTION_REQUEST_SIZE - 4];
            reader.read_exact(&mut rest).await?;
            Ok(Some(Frame::SubscriptionRequest(SubscriptionRequest::from_bytes(&rest))))
        }
        magic::SUBSCRIPTION_RESPONSE => {
            let mut rest = [0u8; lithos_events::frame::SUBSCRIPTION_RESPONSE_SIZE - 4];
            reader.read_exact(&mut rest).await?;
            Ok(Some(Frame::SubscriptionResponse(SubscriptionResponse::from_bytes(&rest))))
        }
        magic::RECOVERY_REQUEST => {
            let mut rest = [0u8; lithos_events::frame::RECOVERY_REQUEST_SIZE - 4];
            reader.read_exact(&mut rest).await?;
            Ok(Some(Frame::RecoveryRequest(RecoveryRequest::from_bytes(&rest))))
        }
        magic::RECOVERY_RESPONSE => {
            let mut rest = [0u8; lithos_events::frame::RECOVERY_RESPONSE_SIZE - 4];
            reader.read_exact(&mut rest).await?;
            Ok(Some(Frame::RecoveryResponse(RecoveryResponse::from_bytes(&rest))))
        }
        magic::RECOVERY_COMPLETE => {
            let mut rest = [0u8; lithos_events::frame::RECOVERY_COMPLETE_SIZE - 4];
            reader.read_exact(&mut rest).await?;
            Ok(Some(Frame::RecoveryComplete(RecoveryComplete::from_bytes(&rest))))
        }
        // Unknown magic: the 4 bytes are already consumed, so just report
        // none and let the caller keep scanning for the next frame.
        _ => Ok(None),
    }
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> Result<(), PubSubError> {
    match frame {
        Frame::TopicMessage { header, data } => {
            writer.write_all(&header.to_bytes()).await?;
            writer.write_all(data).await?;
        }
        Frame::SubscriptionRequest(r) => writer.write_all(&r.to_bytes()).await?,
        Frame::SubscriptionResponse(r) => writer.write_all(&r.to_bytes()).await?,
        Frame::RecoveryRequest(r) => writer.write_all(&r.to_bytes()).await?,
        Frame::RecoveryResponse(r) => writer.write_all(&r.to_bytes()).await?,
        Frame::RecoveryComplete(r) => writer.write_all(&r.to_bytes()).await?,
    }
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lithos_events::RecoveryComplete;

    #[tokio::test]
    async fn unknown_magic_is_discarded_and_parsing_resyncs() {
        let mut bytes = vec![0xde, 0xad, 0xbe, 0xef];
        bytes.extend_from_slice(&RecoveryComplete { total_sent: 3, timestamp: 99 }.to_bytes());

        let mut cursor = std::io::Cursor::new(bytes);
        let frame = read_frame(&mut cursor).await.unwrap();
        match frame {
            Frame::RecoveryComplete(r) => assert_eq!((r.total_sent, r.timestamp), (3, 99)),
            other => panic!("expected RecoveryComplete, got {other:?}"),
        }
    }
}

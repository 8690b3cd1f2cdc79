use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use murmur_proto::{Frame, FrameCodec};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Transport, TransportError};

/// How long `close` waits for the stream to flush its shutdown (TLS
/// close_notify) before giving up on a peer that stopped reading.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// [`Transport`] over any byte stream: a TLS socket in production, an
/// in-memory duplex in tests.
pub struct StreamTransport<S> {
    reader: AsyncMutex<FramedRead<ReadHalf<S>, FrameCodec>>,
    writer: AsyncMutex<FramedWrite<WriteHalf<S>, FrameCodec>>,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(stream: S) -> Self {
        Self::with_codec(stream, FrameCodec::new())
    }

    pub fn with_codec(stream: S, codec: FrameCodec) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: AsyncMutex::new(FramedRead::new(read_half, codec)),
            writer: AsyncMutex::new(FramedWrite::new(write_half, codec)),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn read_frame(&self) -> Result<Frame, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut reader = self.reader.lock().await;
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(TransportError::Closed),
            next = reader.next() => match next {
                Some(Ok(frame)) => Ok(frame),
                Some(Err(err)) => Err(err.into()),
                None => Err(TransportError::Closed),
            },
        }
    }

    async fn write_frame(&self, frame: Frame) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut writer = self.writer.lock().await;
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(TransportError::Closed),
            sent = writer.send(frame) => sent.map_err(TransportError::from),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.shutdown.cancel();
        let flush = async {
            let mut writer = self.writer.lock().await;
            writer.get_mut().shutdown().await
        };
        match tokio::time::timeout(SHUTDOWN_GRACE, flush).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                debug!(target: "murmur::transport", error = %err, "stream shutdown failed");
                Err(err.into())
            }
            Err(_) => {
                debug!(target: "murmur::transport", "stream shutdown timed out");
                Err(io::Error::new(io::ErrorKind::TimedOut, "stream shutdown timed out").into())
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use murmur_proto::MessageKind;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    #[test_timeout::tokio_timeout_test]
    async fn frames_cross_a_duplex_pair() {
        let (left, right) = tokio::io::duplex(1024);
        let a = StreamTransport::new(left);
        let b = StreamTransport::new(right);

        a.write_frame(Frame::new(MessageKind::TextMessage, Bytes::from_static(b"hi")))
            .await
            .unwrap();
        let frame = b.read_frame().await.unwrap();
        assert_eq!(frame.kind, MessageKind::TextMessage);
        assert_eq!(&frame.payload[..], b"hi");
    }

    #[test_timeout::tokio_timeout_test]
    async fn close_unblocks_a_pending_read() {
        let (left, _right) = tokio::io::duplex(1024);
        let transport = Arc::new(StreamTransport::new(left));

        let reader = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.read_frame().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        transport.close().await.unwrap();
        let result = reader.await.unwrap();
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[test_timeout::tokio_timeout_test]
    async fn close_is_idempotent_and_peer_sees_eof() {
        let (left, right) = tokio::io::duplex(1024);
        let transport = StreamTransport::new(left);
        let peer = StreamTransport::new(right);

        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(transport.is_closed());
        assert!(matches!(
            transport.write_frame(Frame::new(MessageKind::Ping, Bytes::new())).await,
            Err(TransportError::Closed)
        ));
        assert!(matches!(peer.read_frame().await, Err(TransportError::Closed)));
    }

    /// A stream whose shutdown never completes, like TLS close_notify stuck
    /// behind a full send buffer.
    struct StallOnShutdown(tokio::io::DuplexStream);

    impl AsyncRead for StallOnShutdown {
        fn poll_read(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.get_mut().0).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for StallOnShutdown {
        fn poll_write(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.get_mut().0).poll_write(cx, buf)
        }

        fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.get_mut().0).poll_flush(cx)
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    #[test_timeout::tokio_timeout_test(paused)]
    async fn stalled_shutdown_does_not_hang_close() {
        let (left, _right) = tokio::io::duplex(1024);
        let transport = Arc::new(StreamTransport::new(StallOnShutdown(left)));
        let reader = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.read_frame().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let result = transport.close().await;
        assert!(
            matches!(&result, Err(TransportError::Io(err)) if err.kind() == io::ErrorKind::TimedOut),
            "{result:?}"
        );
        assert!(transport.is_closed());
        assert!(matches!(reader.await.unwrap(), Err(TransportError::Closed)));
        assert!(transport.close().await.is_ok());
    }

    #[test_timeout::tokio_timeout_test]
    async fn unknown_kind_surfaces_as_a_read_error() {
        let (left, mut right) = tokio::io::duplex(1024);
        let transport = StreamTransport::new(left);
        right.write_all(&[0, 200, 0, 0, 0, 0]).await.unwrap();
        assert!(matches!(
            transport.read_frame().await,
            Err(TransportError::UnknownKind(200))
        ));
    }
}

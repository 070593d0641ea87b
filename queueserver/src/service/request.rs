//! 요청
//!
//! 수락된 연결 하나와 그 입출력 스트림을 감쌉니다.

use std::marker::PhantomData;
use std::net::SocketAddr;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use crate::protocol::{self, Payload};
use crate::tool::{ErrorHandler, ErrorSeverity, RequestError, ServerError};

/// 수락된 연결 하나
///
/// 수락 태스크가 생성하고, 큐에서 꺼낸 워커의 핸들러만 읽고 씁니다.
/// 처리 결과와 상관없이 워커가 `close()`로 닫습니다.
#[derive(Debug)]
pub struct Request<T> {
    id: u64,
    peer_addr: SocketAddr,
    reader: Option<BufReader<OwnedReadHalf>>,
    writer: Option<BufWriter<OwnedWriteHalf>>,
    max_frame_bytes: usize,
    _payload: PhantomData<fn() -> T>,
}

impl<T: Payload> Request<T> {
    /// 수락된 스트림으로 요청을 생성합니다.
    ///
    /// 피어 주소를 얻을 수 없으면 (이미 리셋된 연결 등) 실패합니다.
    pub fn new(id: u64, stream: TcpStream, max_frame_bytes: usize) -> Result<Self, RequestError> {
        let peer_addr = stream.peer_addr()?;
        stream.set_nodelay(true)?;

        let (reader, writer) = stream.into_split();
        Ok(Self {
            id,
            peer_addr,
            reader: Some(BufReader::new(reader)),
            writer: Some(BufWriter::new(writer)),
            max_frame_bytes,
            _payload: PhantomData,
        })
    }

    /// 수락 순서대로 부여된 요청 ID
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none() && self.writer.is_none()
    }

    /// 클라이언트가 보낸 값 하나를 읽습니다.
    ///
    /// 피어가 더 보내지 않고 연결을 닫았다면 `Ok(None)`입니다.
    pub async fn read(&mut self) -> Result<Option<T>, RequestError> {
        let reader = self.reader.as_mut().ok_or(RequestError::Closed)?;
        protocol::read_frame(reader, self.max_frame_bytes).await
    }

    /// 클라이언트에게 값 하나를 쓰고 flush합니다.
    pub async fn write(&mut self, value: &T) -> Result<(), RequestError> {
        let writer = self.writer.as_mut().ok_or(RequestError::Closed)?;
        protocol::write_frame(writer, value, self.max_frame_bytes).await
    }

    /// 스트림과 소켓을 닫습니다.
    ///
    /// 여러 번 호출해도 안전하며, 한쪽 스트림이 이미 없어도 나머지를 닫습니다.
    /// 종료 중 에러는 로깅만 하고 전파하지 않습니다.
    pub async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(source) = writer.shutdown().await {
                let error = ServerError::Close {
                    peer: self.peer_addr,
                    source,
                };
                ErrorHandler::handle_error(&error, ErrorSeverity::Info, "Request", "close");
            }
        }

        if self.reader.take().is_some() {
            debug!(request_id = self.id, peer = %self.peer_addr, "요청 연결 종료");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::connected_pair;

    const MAX_FRAME: usize = 1024;

    #[tokio::test]
    async fn test_request_read_write() {
        let (mut client, server) = connected_pair().await;
        let mut request: Request<String> = Request::new(1, server, MAX_FRAME).unwrap();

        protocol::write_frame(&mut client, &"안녕".to_string(), MAX_FRAME).await.unwrap();
        let value = request.read().await.unwrap();
        assert_eq!(value.as_deref(), Some("안녕"));

        request.write(&"응답".to_string()).await.unwrap();
        let reply: Option<String> = protocol::read_frame(&mut client, MAX_FRAME).await.unwrap();
        assert_eq!(reply.as_deref(), Some("응답"));
    }

    #[tokio::test]
    async fn test_read_returns_none_when_peer_closes() {
        let (client, server) = connected_pair().await;
        let mut request: Request<String> = Request::new(1, server, MAX_FRAME).unwrap();
        drop(client);

        assert!(request.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut client, server) = connected_pair().await;
        let mut request: Request<String> = Request::new(1, server, MAX_FRAME).unwrap();

        request.close().await;
        request.close().await;
        assert!(request.is_closed());

        assert!(matches!(request.read().await, Err(RequestError::Closed)));
        assert!(matches!(
            request.write(&"늦음".to_string()).await,
            Err(RequestError::Closed)
        ));

        // 클라이언트는 EOF를 관찰해야 함
        let eof: Option<String> = protocol::read_frame(&mut client, MAX_FRAME).await.unwrap();
        assert!(eof.is_none());
    }

    #[tokio::test]
    async fn test_request_metadata() {
        let (client, server) = connected_pair().await;
        let request: Request<String> = Request::new(42, server, MAX_FRAME).unwrap();

        assert_eq!(request.id(), 42);
        assert_eq!(request.peer_addr(), client.local_addr().unwrap());
        assert!(!request.is_closed());
    }
}

//! 값 프레이밍 프로토콜
//!
//! 요청 스트림으로 오가는 타입 있는 값을 직렬화합니다.
//!
//! # 프로토콜 구조
//!
//! ```text
//! [4바이트 길이 헤더 (big-endian)][JSON 데이터]
//! ```
//!
//! 값의 의미는 정의하지 않습니다. `Payload`를 만족하는 어떤 타입이든 전송할 수 있습니다.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::tool::RequestError;

/// 길이 헤더 크기
pub const HEADER_LEN: usize = 4;

/// 요청 스트림으로 전송 가능한 값
pub trait Payload: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// 값을 길이 헤더가 붙은 프레임으로 직렬화합니다.
///
/// # Errors
///
/// * JSON 직렬화 실패 시
/// * 본문이 `max_frame_bytes`를 넘을 때
pub fn encode_frame<T: Serialize>(value: &T, max_frame_bytes: usize) -> Result<Vec<u8>, RequestError> {
    let body = serde_json::to_vec(value).map_err(RequestError::Encode)?;
    if body.len() > max_frame_bytes || body.len() > u32::MAX as usize {
        return Err(RequestError::FrameTooLarge {
            len: body.len(),
            max: max_frame_bytes,
        });
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// 스트림에서 값 하나를 읽습니다.
///
/// 피어가 프레임 경계에서 연결을 닫았다면 `Ok(None)`을 반환합니다.
/// 헤더나 본문 중간에서 끊기면 `UnexpectedEof` I/O 에러입니다.
pub async fn read_frame<R, T>(reader: &mut R, max_frame_bytes: usize) -> Result<Option<T>, RequestError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(RequestError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "길이 헤더 수신 중 연결 종료",
            )));
        }
        filled += n;
    }

    let length = u32::from_be_bytes(header) as usize;
    if length > max_frame_bytes {
        return Err(RequestError::FrameTooLarge {
            len: length,
            max: max_frame_bytes,
        });
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;

    let value = serde_json::from_slice(&body).map_err(RequestError::Decode)?;
    Ok(Some(value))
}

/// 스트림에 값 하나를 쓰고 flush합니다.
pub async fn write_frame<W, T>(writer: &mut W, value: &T, max_frame_bytes: usize) -> Result<(), RequestError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(value, max_frame_bytes)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Probe {
        seq: u32,
        body: String,
    }

    #[tokio::test]
    async fn test_frame_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let sent = Probe {
            seq: 7,
            body: "값".to_string(),
        };

        write_frame(&mut client, &sent, 1024).await.unwrap();
        let received: Option<Probe> = read_frame(&mut server, 1024).await.unwrap();
        assert_eq!(received, Some(sent));
    }

    #[tokio::test]
    async fn test_clean_eof_returns_none() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let received: Option<Probe> = read_frame(&mut server, 1024).await.unwrap();
        assert!(received.is_none(), "경계에서 닫히면 None이어야 함");
    }

    #[tokio::test]
    async fn test_truncated_header_is_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0, 0]).await.unwrap();
        drop(client);

        let result: Result<Option<Probe>, _> = read_frame(&mut server, 1024).await;
        match result {
            Err(RequestError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("UnexpectedEof를 기대했지만: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&(4096u32).to_be_bytes()).await.unwrap();

        let result: Result<Option<Probe>, _> = read_frame(&mut server, 1024).await;
        assert!(matches!(
            result,
            Err(RequestError::FrameTooLarge { len: 4096, max: 1024 })
        ));

        let encoded = encode_frame(&"x".repeat(100), 10);
        assert!(matches!(encoded, Err(RequestError::FrameTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&(3u32).to_be_bytes()).await.unwrap();
        client.write_all(b"{{{").await.unwrap();

        let result: Result<Option<Probe>, _> = read_frame(&mut server, 1024).await;
        assert!(matches!(result, Err(RequestError::Decode(_))));
    }
}

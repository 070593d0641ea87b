//! 에코 핸들러
//!
//! 값 하나를 읽어 그대로 돌려보냅니다. 부트스트랩 바이너리의 기본 핸들러입니다.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::marker::PhantomData;
use tracing::debug;

use crate::handler::RequestHandler;
use crate::protocol::Payload;
use crate::service::Request;

#[derive(Debug)]
pub struct EchoHandler<T> {
    _payload: PhantomData<fn() -> T>,
}

impl<T> EchoHandler<T> {
    pub fn new() -> Self {
        Self {
            _payload: PhantomData,
        }
    }
}

impl<T> Default for EchoHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Payload> RequestHandler<T> for EchoHandler<T> {
    async fn handle(&self, request: &mut Request<T>) -> Result<()> {
        let Some(value) = request.read().await.context("요청 값 읽기 실패")? else {
            debug!(request_id = request.id(), "값 없이 연결 종료됨");
            return Ok(());
        };

        request.write(&value).await.context("응답 쓰기 실패")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol;
    use crate::tests::connected_pair;

    #[tokio::test]
    async fn test_echo_round() {
        let (mut client, server) = connected_pair().await;
        let mut request: Request<serde_json::Value> = Request::new(1, server, 1024).unwrap();
        let value = serde_json::json!({ "op": "ping", "seq": 3 });

        protocol::write_frame(&mut client, &value, 1024).await.unwrap();
        EchoHandler::new().handle(&mut request).await.unwrap();

        let reply: Option<serde_json::Value> = protocol::read_frame(&mut client, 1024).await.unwrap();
        assert_eq!(reply, Some(value));
    }

    #[tokio::test]
    async fn test_echo_without_value() {
        let (client, server) = connected_pair().await;
        let mut request: Request<String> = Request::new(1, server, 1024).unwrap();
        drop(client);

        assert!(EchoHandler::new().handle(&mut request).await.is_ok());
    }
}

//! 요청 처리 핸들러 레이어
//!
//! 워커가 큐에서 꺼낸 요청마다 호출하는 처리 로직을 정의합니다.

use anyhow::Result;
use async_trait::async_trait;

use crate::protocol::Payload;
use crate::service::Request;

pub mod echo_handler;

pub use echo_handler::EchoHandler;

/// 요청 처리 로직
///
/// 임베딩 애플리케이션이 구현하는 유일한 확장 지점입니다.
/// 호출 전후 훅과 연결 종료는 워커가 담당하므로 핸들러는 읽고 쓰기만 하면 됩니다.
/// 에러를 반환해도 서버와 워커는 계속 동작합니다.
#[async_trait]
pub trait RequestHandler<T: Payload>: Send + Sync + 'static {
    async fn handle(&self, request: &mut Request<T>) -> Result<()>;
}

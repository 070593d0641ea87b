//! 생명주기 훅
//!
//! 서버 시작/수락/처리/중지 전후에 호출되는 확장 지점입니다.
//! 모든 메서드는 빈 기본 구현을 가지므로 필요한 이벤트만 재정의하면 됩니다.

use anyhow::Result;
use std::any::Any;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::protocol::Payload;
use crate::service::Request;
use crate::tool::ServerError;

/// 생명주기 훅
///
/// 서버 생성 시 한 번 주입되어 서버와 워커가 수명 동안 공유합니다.
/// `Err`를 반환하면 이벤트를 거부하는 것으로 취급합니다.
///
/// | 훅 | 실패 시 |
/// |---|---|
/// | `before_start` | `start()`가 에러를 반환, 아무것도 바인드하지 않음 |
/// | `after_accept` | 연결을 큐에 넣지 않고 닫음 |
/// | `before_handle` | 핸들러를 건너뜀 (`after_handle`은 호출됨) |
/// | 나머지 | 로깅 후 계속 진행 |
#[allow(unused_variables)]
pub trait LifecycleHooks<T: Payload>: Send + Sync + 'static {
    /// 서버 시작 전
    fn before_start(&self) -> Result<()> {
        Ok(())
    }

    /// 리스너 바인드 후
    fn after_start(&self, local_addr: SocketAddr) -> Result<()> {
        Ok(())
    }

    /// 연결 수락 대기 전
    fn before_accept(&self) -> Result<()> {
        Ok(())
    }

    /// 연결 수락 직후, 요청 생성 전
    fn after_accept(&self, stream: &TcpStream, peer_addr: SocketAddr) -> Result<()> {
        Ok(())
    }

    fn before_handle(&self, request: &Request<T>) -> Result<()> {
        Ok(())
    }

    fn after_handle(&self, request: &Request<T>) -> Result<()> {
        Ok(())
    }

    fn before_stop(&self, local_addr: SocketAddr) -> Result<()> {
        Ok(())
    }

    /// 리스너가 닫힌 후
    fn after_stop(&self, local_addr: SocketAddr) -> Result<()> {
        Ok(())
    }
}

/// 아무 동작도 하지 않는 기본 훅
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl<T: Payload> LifecycleHooks<T> for NoopHooks {}

/// 모든 이벤트를 tracing으로 기록하는 훅
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHooks;

impl<T: Payload> LifecycleHooks<T> for LoggingHooks {
    fn before_start(&self) -> Result<()> {
        info!("🚀 서버 시작 중...");
        Ok(())
    }

    fn after_start(&self, local_addr: SocketAddr) -> Result<()> {
        info!("✅ 서버가 {}에서 실행 중입니다", local_addr);
        Ok(())
    }

    fn before_accept(&self) -> Result<()> {
        debug!("연결 수락 대기");
        Ok(())
    }

    fn after_accept(&self, _stream: &TcpStream, peer_addr: SocketAddr) -> Result<()> {
        info!("새 클라이언트 연결: {}", peer_addr);
        Ok(())
    }

    fn before_handle(&self, request: &Request<T>) -> Result<()> {
        debug!(request_id = request.id(), peer = %request.peer_addr(), "요청 처리 시작");
        Ok(())
    }

    fn after_handle(&self, request: &Request<T>) -> Result<()> {
        debug!(request_id = request.id(), peer = %request.peer_addr(), "요청 처리 종료");
        Ok(())
    }

    fn before_stop(&self, local_addr: SocketAddr) -> Result<()> {
        info!("🛑 서버 중지 중... ({})", local_addr);
        Ok(())
    }

    fn after_stop(&self, local_addr: SocketAddr) -> Result<()> {
        info!("✅ 서버가 중지되었습니다 ({})", local_addr);
        Ok(())
    }
}

/// 훅을 호출하고, 에러와 패닉을 모두 `ServerError::Hook`으로 바꿉니다.
pub(crate) fn fire_hook<F>(hook: &'static str, call: F) -> Result<(), ServerError>
where
    F: FnOnce() -> Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ServerError::Hook {
            hook,
            message: format!("{:#}", e),
        }),
        Err(payload) => Err(ServerError::Hook {
            hook,
            message: format!("패닉: {}", panic_message(payload.as_ref())),
        }),
    }
}

/// 패닉 페이로드에서 메시지를 꺼냅니다.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "알 수 없는 패닉".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::connected_pair;

    #[test]
    fn test_fire_hook_ok() {
        assert!(fire_hook("before_start", || Ok(())).is_ok());
    }

    #[test]
    fn test_fire_hook_error() {
        let result = fire_hook("before_accept", || Err(anyhow::anyhow!("거부됨")));
        match result {
            Err(ServerError::Hook { hook, message }) => {
                assert_eq!(hook, "before_accept");
                assert!(message.contains("거부됨"));
            }
            other => panic!("훅 에러를 기대했지만: {:?}", other),
        }
    }

    #[test]
    fn test_fire_hook_panic_is_contained() {
        let result = fire_hook("after_handle", || panic!("훅 내부 패닉"));
        match result {
            Err(ServerError::Hook { message, .. }) => assert!(message.contains("훅 내부 패닉")),
            other => panic!("훅 에러를 기대했지만: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_default_hooks_accept_everything() {
        let (client, server) = connected_pair().await;
        let peer = client.local_addr().unwrap();
        let request: Request<String> = Request::new(1, server, 1024).unwrap();

        for hooks in [&NoopHooks as &dyn LifecycleHooks<String>, &LoggingHooks] {
            assert!(hooks.before_start().is_ok());
            assert!(hooks.after_start(peer).is_ok());
            assert!(hooks.before_accept().is_ok());
            assert!(hooks.after_accept(&client, peer).is_ok());
            assert!(hooks.before_handle(&request).is_ok());
            assert!(hooks.after_handle(&request).is_ok());
            assert!(hooks.before_stop(peer).is_ok());
            assert!(hooks.after_stop(peer).is_ok());
        }
    }
}

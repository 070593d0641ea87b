//! 큐 기반 TCP 서버 라이브러리
//!
//! 클라이언트 연결을 수락해 요청으로 감싸 대기열에 넣고,
//! 하나의 백그라운드 워커가 수락 순서대로 요청을 처리합니다.
//!
//! # 아키텍처
//!
//! ```text
//! Queue Server
//! ├── Service Layer
//! │   ├── ConnectionServer (수락 루프, 생명주기)
//! │   ├── RequestQueue (FIFO 대기열)
//! │   ├── RequestWorker (처리 루프)
//! │   ├── Request (연결 + 값 스트림)
//! │   └── LifecycleHooks (이벤트 훅)
//! ├── Handler Layer
//! │   ├── RequestHandler (처리 로직 확장 지점)
//! │   └── EchoHandler
//! ├── Protocol (길이 헤더 + JSON 프레임)
//! └── Tool Layer (에러, 로깅, 통계)
//! ```
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! use queueserver::{ConnectionServer, EchoHandler, LoggingHooks};
//!
//! let server = ConnectionServer::builder()
//!     .handler_factory(EchoHandler::<serde_json::Value>::new)
//!     .hooks(Arc::new(LoggingHooks))
//!     .build()?;
//!
//! server.start(4100).await?;
//! tokio::signal::ctrl_c().await?;
//! server.stop().await;
//! ```

/// 환경 설정 관리
pub mod config;

/// 값 프레이밍 프로토콜
pub mod protocol;

/// 연결 수락, 대기열, 워커, 훅
pub mod service;

/// 요청 처리 핸들러
pub mod handler;

/// 에러, 로깅, 통계
pub mod tool;

#[cfg(test)]
mod tests;

pub use config::{validate_config, ServerConfig};
pub use handler::{EchoHandler, RequestHandler};
pub use protocol::Payload;
pub use service::{
    ConnectionServer, LifecycleHooks, LoggingHooks, NoopHooks, Request, RequestQueue, RequestWorker,
    ServerBuilder,
};
pub use tool::{init_logging, RequestError, ServerError, ServerResult, ServerStats};

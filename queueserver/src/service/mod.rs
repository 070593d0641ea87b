//! 서버 서비스 레이어
//!
//! 연결 수락, 요청 대기열, 요청 처리 워커와 생명주기 훅을 정의합니다.
//!
//! # 서비스 구조
//!
//! ```text
//! Service Layer
//! ├── ConnectionServer (연결 수락)
//! │   ├── 리스너 바인드/해제
//! │   ├── 수락 루프 + 재시도 지연
//! │   └── 워커 시작/중지
//! ├── RequestQueue (요청 대기열)
//! │   └── FIFO, 대기형 dequeue
//! ├── RequestWorker (요청 처리)
//! │   ├── before_handle → handle → after_handle → close
//! │   └── 종료 시 대기열 정리
//! ├── Request (연결 + 입출력 스트림)
//! └── LifecycleHooks (이벤트 확장 지점)
//! ```
//!
//! 데이터 흐름: ConnectionServer → RequestQueue → RequestWorker → RequestHandler → Request::close

pub mod connection_server;
pub mod lifecycle_hooks;
pub mod request;
pub mod request_queue;
pub mod request_worker;

pub use connection_server::{ConnectionServer, ServerBuilder};
pub use lifecycle_hooks::{LifecycleHooks, LoggingHooks, NoopHooks};
pub use request::Request;
pub use request_queue::RequestQueue;
pub use request_worker::RequestWorker;

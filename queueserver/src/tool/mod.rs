//! 공통 유틸리티 모듈
//!
//! 에러 분류, 로깅 초기화, 서버 통계를 제공합니다.

pub mod error;
pub mod logging;
pub mod stats;

pub use error::{ErrorHandler, ErrorSeverity, RequestError, ServerError, ServerResult};
pub use logging::init_logging;
pub use stats::{ServerCounters, ServerStats};

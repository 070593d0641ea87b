//! 공통 에러 처리 시스템
//!
//! 서버 생명주기와 요청 처리 중 발생하는 에러를 분류하고,
//! 루프 안에서 삼켜야 하는 에러를 일관된 로그 레벨로 보고합니다.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tracing::{error, info, warn};

/// 서버 에러 타입
///
/// `Configuration`과 `Bind`만 호출자에게 전파됩니다.
/// 나머지는 해당 루프 반복 안에서 로깅되고 서버를 멈추지 않습니다.
#[derive(Debug, Error)]
pub enum ServerError {
    /// 생성 시 필수 협력 객체 누락 또는 잘못된 설정
    #[error("설정 에러: {0}")]
    Configuration(String),

    /// 리스닝 소켓을 열 수 없음
    #[error("바인드 실패 [{addr}]: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// 연결 수락 중 일시적 에러
    #[error("연결 수락 실패: {0}")]
    Accept(#[source] io::Error),

    /// 핸들러 또는 요청 읽기/쓰기 실패
    #[error("요청 처리 실패 [요청 {id}] [{peer}]: {message}")]
    Handle {
        id: u64,
        peer: SocketAddr,
        message: String,
    },

    /// 연결 자원 해제 실패
    #[error("연결 종료 실패 [{peer}]: {source}")]
    Close {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// 생명주기 훅이 에러를 반환하거나 패닉함
    #[error("훅 실패 [{hook}]: {message}")]
    Hook { hook: &'static str, message: String },
}

/// 요청 스트림 에러 타입
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("I/O 에러: {0}")]
    Io(#[from] io::Error),

    #[error("역직렬화 실패: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("직렬화 실패: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("프레임 크기 초과: {len}바이트 (최대 {max}바이트)")]
    FrameTooLarge { len: usize, max: usize },

    #[error("이미 닫힌 요청입니다")]
    Closed,
}

/// 에러 심각도 레벨
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// 정상 동작 중 발생하는 예상 가능한 상황
    Info,
    /// 주의가 필요하지만 서비스는 계속 가능
    Warning,
    /// 기능에 영향을 주지만 복구 가능
    Error,
}

/// 에러 핸들러
///
/// 루프 안에서 처리되고 전파되지 않는 에러를 한 곳에서 로깅합니다.
pub struct ErrorHandler;

impl ErrorHandler {
    /// 에러를 심각도에 맞는 로그 레벨로 출력합니다.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let error = ServerError::Accept(io_error);
    /// ErrorHandler::handle_error(&error, ErrorSeverity::Warning, "ConnectionServer", "accept");
    /// ```
    pub fn handle_error(
        error: &ServerError,
        severity: ErrorSeverity,
        component: &str,
        operation: &str,
    ) {
        match severity {
            ErrorSeverity::Info => info!(component, operation, "{}", error),
            ErrorSeverity::Warning => warn!(component, operation, "{}", error),
            ErrorSeverity::Error => error!(component, operation, "{}", error),
        }
    }
}

/// 결과 타입 별칭
pub type ServerResult<T> = Result<T, ServerError>;

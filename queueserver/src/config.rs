//! 서버 환경 설정 모듈
//!
//! .env 파일과 환경변수에서 설정을 로드하고 관리합니다.

use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// 기본 최대 프레임 크기 (8 MiB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// 큐 서버 설정 구조체
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 바인드할 호스트 주소
    pub host: String,
    /// 부트스트랩 바이너리가 사용하는 포트 번호
    pub port: u16,
    /// 워커 종료 시 진행 중인 요청을 기다리는 최대 시간
    pub shutdown_grace: Duration,
    /// 연결 수락 실패 후 첫 재시도 지연
    pub accept_backoff_initial: Duration,
    /// 연결 수락 재시도 지연 상한
    pub accept_backoff_max: Duration,
    /// 한 프레임 본문의 최대 바이트 수
    pub max_frame_bytes: usize,
    /// JSON 로그 출력 여부
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4100,
            shutdown_grace: Duration::from_millis(5000),
            accept_backoff_initial: Duration::from_millis(100),
            accept_backoff_max: Duration::from_millis(5000),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            log_json: false,
        }
    }
}

impl ServerConfig {
    /// 환경변수에서 설정을 로드합니다.
    ///
    /// 로드 순서:
    /// 1. 상위 디렉토리의 .env 파일
    /// 2. 현재 디렉토리의 .env 파일
    /// 3. 시스템 환경변수
    /// 4. 기본값
    pub fn from_env() -> Result<Self> {
        Self::load_env_file();

        let defaults = Self::default();
        let config = Self {
            host: std::env::var("queue_server_host").unwrap_or(defaults.host),
            port: env_or("queue_server_port", defaults.port),
            shutdown_grace: Duration::from_millis(env_or(
                "queue_server_shutdown_grace_ms",
                defaults.shutdown_grace.as_millis() as u64,
            )),
            accept_backoff_initial: Duration::from_millis(env_or(
                "queue_server_accept_backoff_initial_ms",
                defaults.accept_backoff_initial.as_millis() as u64,
            )),
            accept_backoff_max: Duration::from_millis(env_or(
                "queue_server_accept_backoff_max_ms",
                defaults.accept_backoff_max.as_millis() as u64,
            )),
            max_frame_bytes: env_or("queue_server_max_frame_bytes", defaults.max_frame_bytes),
            log_json: env_or("queue_server_log_json", defaults.log_json),
        };

        info!("큐 서버 설정 로드 완료: {:?}", config);
        Ok(config)
    }

    /// 주어진 포트로 바인딩 주소를 만듭니다.
    pub fn bind_address(&self, port: u16) -> String {
        format!("{}:{}", self.host, port)
    }

    /// .env 파일을 로드합니다.
    fn load_env_file() {
        let env_paths = ["../.env", ".env", "../../.env"];

        for path in env_paths {
            if Path::new(path).exists() && dotenv::from_filename(path).is_ok() {
                info!(".env 파일 로드 성공: {}", path);
                return;
            }
        }

        warn!(".env 파일을 찾을 수 없습니다. 기본값과 시스템 환경변수를 사용합니다.");
    }
}

/// 환경변수를 파싱하고, 없거나 잘못된 값이면 기본값을 사용합니다.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("잘못된 환경변수 값 무시: {}={}", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

/// 설정 검증 유틸리티
pub fn validate_config(config: &ServerConfig) -> Result<()> {
    if config.host.is_empty() {
        anyhow::bail!("호스트 주소가 비어있습니다");
    }

    if config.max_frame_bytes == 0 {
        anyhow::bail!("최대 프레임 크기는 0보다 커야 합니다");
    }

    if config.accept_backoff_initial.is_zero() {
        anyhow::bail!("연결 수락 재시도 지연은 0보다 커야 합니다");
    }

    if config.accept_backoff_initial > config.accept_backoff_max {
        anyhow::bail!(
            "연결 수락 재시도 지연({:?})이 상한({:?})보다 큽니다",
            config.accept_backoff_initial,
            config.accept_backoff_max
        );
    }

    Ok(())
}

//! 로깅 초기화
//!
//! `RUST_LOG` 환경변수로 필터를 조정하며, 설정되지 않은 경우 `info` 레벨을 사용합니다.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// 기본 로그 필터
const DEFAULT_FILTER: &str = "info";

/// 전역 tracing 구독자를 설치합니다.
///
/// 이미 구독자가 설치된 경우 에러를 반환합니다.
/// 테스트처럼 여러 번 호출될 수 있는 곳에서는 결과를 무시하면 됩니다.
///
/// # Arguments
///
/// * `json_format` - true이면 JSON 한 줄 형식으로 출력
pub fn init_logging(json_format: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| anyhow!("로깅 초기화 실패: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        // 다른 테스트가 먼저 초기화했을 수 있으므로 첫 호출 결과는 보장되지 않음
        let _ = init_logging(false);

        let second = init_logging(true);
        assert!(second.is_err(), "두 번째 초기화는 실패해야 함");
        assert!(second.unwrap_err().to_string().contains("로깅 초기화 실패"));
    }
}

//! 큐 서버 부트스트랩
//!
//! 설정을 로드하고 에코 핸들러로 서버를 띄운 뒤 Ctrl+C를 기다립니다.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use queueserver::{init_logging, validate_config, ConnectionServer, EchoHandler, LoggingHooks, ServerConfig};

/// 큐 서버 메인 진입점
///
/// 환경변수:
/// - queue_server_host: 바인드 호스트 (기본값: "127.0.0.1")
/// - queue_server_port: 바인드 포트 (기본값: "4100")
/// - queue_server_log_json: JSON 로그 여부 (기본값: "false")
#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env()?;
    init_logging(config.log_json)?;
    validate_config(&config)?;

    info!("=== 큐 서버 설정 ===");
    info!("바인드 주소: {}", config.bind_address(config.port));
    info!("종료 대기 시간: {:?}", config.shutdown_grace);
    info!("최대 프레임 크기: {}바이트", config.max_frame_bytes);
    info!("====================");

    let port = config.port;
    let server = ConnectionServer::builder()
        .handler_factory(EchoHandler::<serde_json::Value>::new)
        .hooks(Arc::new(LoggingHooks))
        .config(config)
        .build()?;

    server.start(port).await?;

    tokio::signal::ctrl_c().await?;
    info!("종료 시그널 수신, 서버를 중지합니다...");

    server.stop().await;

    let stats = server.stats().await;
    info!("최종 통계: {}", serde_json::to_string(&stats)?);

    Ok(())
}

//! 서버 통계
//!
//! 수락 태스크와 워커 태스크가 함께 갱신하는 락-프리 카운터입니다.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// 원자적 서버 카운터
#[derive(Debug, Default)]
pub struct ServerCounters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    accept_errors: AtomicU64,
    handled: AtomicU64,
    handle_failures: AtomicU64,
    drained: AtomicU64,
}

impl ServerCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accept_error(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handled(&self) {
        self.handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handle_failure(&self) {
        self.handle_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drained(&self) {
        self.drained.fetch_add(1, Ordering::Relaxed);
    }

    /// 현재 카운터 값으로 스냅샷을 만듭니다.
    pub fn snapshot(&self, queued: usize, is_running: bool, started_at: Option<i64>) -> ServerStats {
        ServerStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            accept_errors: self.accept_errors.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            handle_failures: self.handle_failures.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            queued,
            is_running,
            started_at,
        }
    }
}

/// 서버 통계 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStats {
    /// 리스너에서 수락한 연결 수
    pub accepted: u64,
    /// 큐에 들어가기 전에 버려진 연결 수 (훅 거부, 요청 생성 실패)
    pub rejected: u64,
    pub accept_errors: u64,
    /// 핸들러가 성공적으로 처리한 요청 수
    pub handled: u64,
    pub handle_failures: u64,
    /// 종료 시 처리 없이 닫힌 요청 수
    pub drained: u64,
    pub queued: usize,
    pub is_running: bool,
    /// 마지막 시작 시각 (Unix timestamp)
    pub started_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = ServerCounters::new();
        counters.record_accepted();
        counters.record_accepted();
        counters.record_handled();
        counters.record_drained();

        let stats = counters.snapshot(3, true, Some(1_700_000_000));
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.handled, 1);
        assert_eq!(stats.drained, 1);
        assert_eq!(stats.handle_failures, 0);
        assert_eq!(stats.queued, 3);
        assert!(stats.is_running);
    }

    #[test]
    fn test_stats_serialization() {
        let stats = ServerCounters::new().snapshot(0, false, None);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["is_running"], false);
        assert_eq!(json["accepted"], 0);
    }
}

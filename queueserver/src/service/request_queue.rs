//! 요청 큐
//!
//! 수락 태스크(생산자)와 워커(소비자) 사이의 무제한 FIFO 큐입니다.
//! 비어 있으면 `dequeue()`가 항목이 들어올 때까지 대기합니다.

use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

/// 스레드 안전 FIFO 큐
///
/// 모든 변경은 내부 락으로 직렬화되며 락은 외부로 노출되지 않습니다.
#[derive(Debug)]
pub struct RequestQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Notify,
}

impl<T> RequestQueue<T> {
    /// 빈 큐 생성
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Notify::new(),
        }
    }

    /// 항목을 큐 끝에 추가합니다. 항상 성공합니다.
    pub fn enqueue(&self, item: T) {
        self.items.lock().push_back(item);
        self.available.notify_one();
    }

    /// 맨 앞 항목을 꺼냅니다. 비어 있으면 `None`입니다.
    pub fn try_dequeue(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// 맨 앞 항목을 꺼내며, 비어 있으면 항목이 들어올 때까지 대기합니다.
    ///
    /// 반환 전에 future가 취소되어도 항목은 유실되지 않습니다.
    pub async fn dequeue(&self) -> T {
        loop {
            if let Some(item) = self.try_dequeue() {
                return item;
            }
            self.available.notified().await;
        }
    }

    /// 남은 항목을 FIFO 순서로 모두 꺼냅니다.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Default for RequestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

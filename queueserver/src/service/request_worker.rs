//! 요청 워커
//!
//! 큐에서 요청을 하나씩 꺼내 핸들러에 넘기는 백그라운드 태스크입니다.
//! 처리 흐름은 항상 `before_handle` → `handle` → `after_handle` → `close` 순서입니다.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::handler::RequestHandler;
use crate::protocol::Payload;
use crate::service::lifecycle_hooks::{fire_hook, panic_message};
use crate::service::{LifecycleHooks, Request, RequestQueue};
use crate::tool::{ErrorHandler, ErrorSeverity, ServerCounters, ServerError};

/// 워커 루프가 공유하는 협력 객체들
struct WorkerContext<T: Payload> {
    queue: Arc<RequestQueue<Request<T>>>,
    hooks: Arc<dyn LifecycleHooks<T>>,
    handler: Arc<dyn RequestHandler<T>>,
    counters: Arc<ServerCounters>,
}

impl<T: Payload> Clone for WorkerContext<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            hooks: self.hooks.clone(),
            handler: self.handler.clone(),
            counters: self.counters.clone(),
        }
    }
}

/// 루프 태스크가 살아 있는 동안 실행 플래그를 유지합니다.
///
/// 태스크가 끝나거나 취소되어 future가 해제될 때 플래그가 내려갑니다.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 요청 워커
///
/// 큐와 훅은 소유하지 않고 서버와 공유합니다. 루프 태스크는 동시에 하나만 존재하므로
/// 요청은 수락된 순서대로 하나씩 처리됩니다.
pub struct RequestWorker<T: Payload> {
    context: WorkerContext<T>,
    shutdown_grace: Duration,
    shutdown_tx: watch::Sender<bool>,
    running: Arc<AtomicBool>,
    // 유예 시간 안에 끝나지 않은 루프의 핸들도 끝날 때까지 여기에 남음
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Payload> RequestWorker<T> {
    pub fn new(
        queue: Arc<RequestQueue<Request<T>>>,
        hooks: Arc<dyn LifecycleHooks<T>>,
        handler: Arc<dyn RequestHandler<T>>,
        counters: Arc<ServerCounters>,
        shutdown_grace: Duration,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            context: WorkerContext {
                queue,
                hooks,
                handler,
                counters,
            },
            shutdown_grace,
            shutdown_tx,
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// 워커 루프를 시작합니다. 이미 실행 중이면 아무것도 하지 않습니다.
    ///
    /// 중지 신호를 받았지만 아직 처리 중인 이전 루프가 있으면 그 루프가 끝날 때까지
    /// 기다린 뒤 새 루프를 띄웁니다. 두 루프가 같은 큐를 동시에 소비하지 않습니다.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;

        if let Some(previous) = task.as_mut() {
            if !previous.is_finished() {
                if !*self.shutdown_tx.borrow() {
                    warn!("요청 워커가 이미 실행 중입니다");
                    return;
                }
                info!("이전 워커 루프가 진행 중인 처리를 마치기를 기다립니다");
            }
            if let Err(e) = previous.await {
                warn!("이전 워커 태스크 비정상 종료: {}", e);
            }
            *task = None;
        }

        self.shutdown_tx.send_replace(false);
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.running.store(true, Ordering::Release);
        let guard = RunningGuard(self.running.clone());
        *task = Some(tokio::spawn(Self::run(self.context.clone(), shutdown_rx, guard)));

        info!("🔄 요청 워커 시작");
    }

    /// 워커 루프에 종료 신호만 보냅니다.
    ///
    /// 진행 중인 처리는 중단하지 않으며, 루프는 다음 반복 경계에서 신호를 확인합니다.
    pub fn cancel(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// 종료 신호를 보내고 루프가 큐를 비우고 끝날 때까지 기다립니다.
    ///
    /// 진행 중인 핸들러가 `shutdown_grace` 안에 끝나지 않으면 기다리기를 포기합니다.
    /// 이 경우 루프는 처리를 마친 뒤 큐를 비우고 스스로 끝나며, 그때까지
    /// `is_running()`은 true입니다.
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        let Some(handle) = task.as_mut() else {
            debug!("요청 워커가 이미 중지되어 있습니다");
            return;
        };

        self.shutdown_tx.send_replace(true);

        match tokio::time::timeout(self.shutdown_grace, handle).await {
            Ok(joined) => {
                *task = None;
                match joined {
                    Ok(()) => info!("✅ 요청 워커 중지 완료"),
                    Err(e) => warn!("요청 워커 태스크 비정상 종료: {}", e),
                }
            }
            Err(_) => warn!(
                "요청 워커가 {:?} 안에 종료되지 않았습니다. 진행 중인 처리가 끝나면 종료됩니다",
                self.shutdown_grace
            ),
        }
    }

    /// 워커 루프 태스크가 살아 있는지 확인합니다.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 큐에 남은 요청을 처리 없이 모두 닫습니다. 닫은 수를 반환합니다.
    pub async fn drain_queue(&self) -> usize {
        Self::drain(&self.context).await
    }

    async fn run(context: WorkerContext<T>, mut shutdown_rx: watch::Receiver<bool>, _running: RunningGuard) {
        debug!("요청 워커 루프 진입");

        loop {
            let mut request = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                request = context.queue.dequeue() => request,
            };

            Self::process(&context, &mut request).await;

            if *shutdown_rx.borrow() {
                break;
            }
        }

        let drained = Self::drain(&context).await;
        info!("요청 워커 루프 종료 (정리된 요청: {}개)", drained);
    }

    /// 요청 하나를 처리합니다. 결과와 상관없이 요청은 닫힙니다.
    async fn process(context: &WorkerContext<T>, request: &mut Request<T>) {
        let id = request.id();
        let peer = request.peer_addr();

        match fire_hook("before_handle", || context.hooks.before_handle(request)) {
            Ok(()) => {
                let outcome = AssertUnwindSafe(context.handler.handle(request))
                    .catch_unwind()
                    .await;

                let failure = match outcome {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(format!("{:#}", e)),
                    Err(payload) => Some(format!("핸들러 패닉: {}", panic_message(payload.as_ref()))),
                };

                match failure {
                    None => {
                        context.counters.record_handled();
                        debug!(request_id = id, peer = %peer, "요청 처리 완료");
                    }
                    Some(message) => {
                        context.counters.record_handle_failure();
                        let error = ServerError::Handle { id, peer, message };
                        ErrorHandler::handle_error(&error, ErrorSeverity::Error, "RequestWorker", "handle");
                    }
                }
            }
            Err(error) => {
                context.counters.record_handle_failure();
                ErrorHandler::handle_error(&error, ErrorSeverity::Warning, "RequestWorker", "before_handle");
            }
        }

        if let Err(error) = fire_hook("after_handle", || context.hooks.after_handle(request)) {
            ErrorHandler::handle_error(&error, ErrorSeverity::Warning, "RequestWorker", "after_handle");
        }

        request.close().await;
    }

    async fn drain(context: &WorkerContext<T>) -> usize {
        let mut drained = 0;
        while let Some(mut request) = context.queue.try_dequeue() {
            request.close().await;
            context.counters.record_drained();
            drained += 1;
        }
        drained
    }
}

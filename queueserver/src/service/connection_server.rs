//! 연결 서버
//!
//! 리스닝 소켓과 연결 수락 루프를 소유합니다. 수락한 연결은 요청으로 감싸 큐에 넣고,
//! 시작/중지 시 요청 워커를 함께 제어합니다.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{validate_config, ServerConfig};
use crate::handler::RequestHandler;
use crate::protocol::Payload;
use crate::service::lifecycle_hooks::fire_hook;
use crate::service::{LifecycleHooks, NoopHooks, Request, RequestQueue, RequestWorker};
use crate::tool::{ErrorHandler, ErrorSeverity, ServerCounters, ServerError, ServerResult, ServerStats};

/// 실행 중인 수락 태스크
struct AcceptorTask {
    local_addr: SocketAddr,
    started_at: i64,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// 핸들러 생성 함수
type HandlerFactory<T> = Box<dyn FnOnce() -> Arc<dyn RequestHandler<T>> + Send>;

/// 연결 서버
///
/// 큐와 훅은 서버 수명 전체 동안 유지되며, 재시작해도 같은 인스턴스를 사용합니다.
///
/// # 사용 예시
///
/// ```rust,ignore
/// let server = ConnectionServer::new(EchoHandler::<serde_json::Value>::new);
/// server.start(4100).await?;
/// // ...
/// server.stop().await;
/// ```
pub struct ConnectionServer<T: Payload> {
    config: ServerConfig,
    queue: Arc<RequestQueue<Request<T>>>,
    hooks: Arc<dyn LifecycleHooks<T>>,
    worker: RequestWorker<T>,
    counters: Arc<ServerCounters>,
    next_request_id: Arc<AtomicU64>,
    acceptor: Mutex<Option<AcceptorTask>>,
}

impl<T: Payload> ConnectionServer<T> {
    /// 기본 훅과 기본 설정으로 서버를 생성합니다.
    pub fn new<F, H>(handler_factory: F) -> Self
    where
        F: FnOnce() -> H,
        H: RequestHandler<T>,
    {
        Self::assemble(
            ServerConfig::default(),
            Arc::new(handler_factory()),
            Arc::new(NoopHooks),
        )
    }

    /// 지정한 훅으로 서버를 생성합니다.
    ///
    /// 훅이 없으면 `ServerError::Configuration`을 반환하며 소켓은 열지 않습니다.
    pub fn with_hooks<F, H>(
        handler_factory: F,
        hooks: Option<Arc<dyn LifecycleHooks<T>>>,
    ) -> ServerResult<Self>
    where
        F: FnOnce() -> H,
        H: RequestHandler<T>,
    {
        let hooks = hooks.ok_or_else(|| ServerError::Configuration("생명주기 훅은 비어 있을 수 없습니다".to_string()))?;
        Ok(Self::assemble(
            ServerConfig::default(),
            Arc::new(handler_factory()),
            hooks,
        ))
    }

    pub fn builder() -> ServerBuilder<T> {
        ServerBuilder::new()
    }

    fn assemble(
        config: ServerConfig,
        handler: Arc<dyn RequestHandler<T>>,
        hooks: Arc<dyn LifecycleHooks<T>>,
    ) -> Self {
        let queue = Arc::new(RequestQueue::new());
        let counters = Arc::new(ServerCounters::new());
        let worker = RequestWorker::new(
            queue.clone(),
            hooks.clone(),
            handler,
            counters.clone(),
            config.shutdown_grace,
        );

        Self {
            config,
            queue,
            hooks,
            worker,
            counters,
            next_request_id: Arc::new(AtomicU64::new(1)),
            acceptor: Mutex::new(None),
        }
    }

    /// 서버를 시작합니다. 이미 실행 중이면 아무것도 하지 않습니다.
    ///
    /// 포트 0은 임의 포트에 바인드하며, 실제 주소는 `local_addr()`로 확인합니다.
    ///
    /// # Errors
    ///
    /// * `before_start` 훅이 거부했을 때 (`ServerError::Hook`)
    /// * 리스닝 소켓을 열 수 없을 때 (`ServerError::Bind`)
    pub async fn start(&self, port: u16) -> ServerResult<()> {
        let mut acceptor = self.acceptor.lock().await;
        if acceptor.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            warn!("서버가 이미 실행 중입니다");
            return Ok(());
        }

        fire_hook("before_start", || self.hooks.before_start())?;

        let addr = self.config.bind_address(port);
        let listener = TcpListener::bind(&addr).await.map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        // 이전 실행의 워커 루프가 아직 처리 중이면 끝날 때까지 기다린 뒤 수락을 시작
        self.worker.start().await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let accept_loop = AcceptLoop {
            listener,
            queue: self.queue.clone(),
            hooks: self.hooks.clone(),
            counters: self.counters.clone(),
            next_request_id: self.next_request_id.clone(),
            shutdown_rx,
            backoff_initial: self.config.accept_backoff_initial,
            backoff_max: self.config.accept_backoff_max,
            max_frame_bytes: self.config.max_frame_bytes,
        };
        let handle = tokio::spawn(accept_loop.run());

        *acceptor = Some(AcceptorTask {
            local_addr,
            started_at: chrono::Utc::now().timestamp(),
            shutdown_tx,
            handle,
        });
        info!("✅ 연결 서버가 {}에서 실행 중입니다", local_addr);

        if let Err(error) = fire_hook("after_start", || self.hooks.after_start(local_addr)) {
            ErrorHandler::handle_error(&error, ErrorSeverity::Warning, "ConnectionServer", "after_start");
        }

        Ok(())
    }

    /// 서버를 중지합니다. 실행 중이 아니면 아무것도 하지 않습니다.
    ///
    /// 워커를 멈춰 큐를 비운 뒤 수락 루프를 끝내고 리스닝 소켓을 닫습니다.
    pub async fn stop(&self) {
        let mut acceptor = self.acceptor.lock().await;
        let Some(task) = acceptor.take() else {
            debug!("서버가 이미 중지되어 있습니다");
            return;
        };

        if let Err(error) = fire_hook("before_stop", || self.hooks.before_stop(task.local_addr)) {
            ErrorHandler::handle_error(&error, ErrorSeverity::Warning, "ConnectionServer", "before_stop");
        }

        self.worker.stop().await;

        let _ = task.shutdown_tx.send(true);
        if let Err(e) = task.handle.await {
            warn!("수락 태스크 비정상 종료: {}", e);
        }

        // 워커 정리 이후 수락 루프가 넣은 요청
        let late = self.worker.drain_queue().await;
        if late > 0 {
            debug!("중지 중 추가로 정리된 요청: {}개", late);
        }

        info!("✅ 연결 서버가 중지되었습니다 ({})", task.local_addr);

        if let Err(error) = fire_hook("after_stop", || self.hooks.after_stop(task.local_addr)) {
            ErrorHandler::handle_error(&error, ErrorSeverity::Warning, "ConnectionServer", "after_stop");
        }
    }

    /// 서버 실행 상태 확인
    pub async fn is_running(&self) -> bool {
        self.acceptor
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// 실행 중이면 리스너가 바인드된 주소
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.acceptor.lock().await.as_ref().map(|task| task.local_addr)
    }

    /// 처리 대기 중인 요청 수
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn worker_running(&self) -> bool {
        self.worker.is_running()
    }

    /// 서버 통계 조회
    pub async fn stats(&self) -> ServerStats {
        let acceptor = self.acceptor.lock().await;
        let is_running = acceptor.as_ref().is_some_and(|task| !task.handle.is_finished());
        let started_at = acceptor.as_ref().map(|task| task.started_at);
        self.counters.snapshot(self.queue.len(), is_running, started_at)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// 연결 서버 빌더
///
/// 핸들러 생성 함수는 필수이며, 훅과 설정은 생략하면 기본값을 사용합니다.
pub struct ServerBuilder<T: Payload> {
    handler_factory: Option<HandlerFactory<T>>,
    hooks: Option<Arc<dyn LifecycleHooks<T>>>,
    config: ServerConfig,
}

impl<T: Payload> ServerBuilder<T> {
    pub fn new() -> Self {
        Self {
            handler_factory: None,
            hooks: None,
            config: ServerConfig::default(),
        }
    }

    pub fn handler_factory<F, H>(mut self, factory: F) -> Self
    where
        F: FnOnce() -> H + Send + 'static,
        H: RequestHandler<T>,
    {
        self.handler_factory = Some(Box::new(move || Arc::new(factory()) as Arc<dyn RequestHandler<T>>));
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn LifecycleHooks<T>>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// 서버를 생성합니다.
    ///
    /// 핸들러 생성 함수가 없거나 설정이 유효하지 않으면 `ServerError::Configuration`입니다.
    pub fn build(self) -> ServerResult<ConnectionServer<T>> {
        let factory = self
            .handler_factory
            .ok_or_else(|| ServerError::Configuration("핸들러 생성 함수가 필요합니다".to_string()))?;
        validate_config(&self.config).map_err(|e| ServerError::Configuration(e.to_string()))?;

        let hooks = self.hooks.unwrap_or_else(|| Arc::new(NoopHooks));
        Ok(ConnectionServer::assemble(self.config, factory(), hooks))
    }
}

impl<T: Payload> Default for ServerBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 연결 수락 루프
///
/// 리스너를 소유하므로 루프가 끝나면 리스닝 소켓도 닫힙니다.
struct AcceptLoop<T: Payload> {
    listener: TcpListener,
    queue: Arc<RequestQueue<Request<T>>>,
    hooks: Arc<dyn LifecycleHooks<T>>,
    counters: Arc<ServerCounters>,
    next_request_id: Arc<AtomicU64>,
    shutdown_rx: watch::Receiver<bool>,
    backoff_initial: Duration,
    backoff_max: Duration,
    max_frame_bytes: usize,
}

impl<T: Payload> AcceptLoop<T> {
    async fn run(mut self) {
        let mut backoff = self.backoff_initial;

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            if let Err(error) = fire_hook("before_accept", || self.hooks.before_accept()) {
                self.counters.record_accept_error();
                ErrorHandler::handle_error(&error, ErrorSeverity::Warning, "ConnectionServer", "before_accept");
                if self.pause(&mut backoff).await {
                    break;
                }
                continue;
            }

            let accepted = tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer_addr)) => {
                    backoff = self.backoff_initial;
                    self.counters.record_accepted();
                    self.admit(stream, peer_addr);
                }
                Err(source) => {
                    self.counters.record_accept_error();
                    let error = ServerError::Accept(source);
                    ErrorHandler::handle_error(&error, ErrorSeverity::Warning, "ConnectionServer", "accept");
                    if self.pause(&mut backoff).await {
                        break;
                    }
                }
            }
        }

        debug!("연결 수락 루프 종료");
    }

    /// 수락한 연결을 요청으로 감싸 큐에 넣습니다.
    fn admit(&self, stream: TcpStream, peer_addr: SocketAddr) {
        if let Err(error) = fire_hook("after_accept", || self.hooks.after_accept(&stream, peer_addr)) {
            self.counters.record_rejected();
            ErrorHandler::handle_error(&error, ErrorSeverity::Warning, "ConnectionServer", "after_accept");
            return;
        }

        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        match Request::new(id, stream, self.max_frame_bytes) {
            Ok(request) => {
                self.queue.enqueue(request);
                debug!(request_id = id, peer = %peer_addr, "요청 대기열 추가");
            }
            Err(e) => {
                self.counters.record_rejected();
                warn!("요청 생성 실패, 연결을 버립니다 [{}]: {}", peer_addr, e);
            }
        }
    }

    /// 재시도 전 대기합니다. 대기 중 종료 신호를 받으면 true를 반환합니다.
    async fn pause(&mut self, backoff: &mut Duration) -> bool {
        let delay = *backoff;
        *backoff = (*backoff * 2).min(self.backoff_max);

        tokio::select! {
            _ = self.shutdown_rx.changed() => true,
            _ = tokio::time::sleep(delay) => false,
        }
    }
}

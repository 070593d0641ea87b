//! 단위 테스트 공용 유틸리티

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};

use crate::protocol::Payload;
use crate::service::{LifecycleHooks, Request};

/// 루프백으로 연결된 (클라이언트, 서버 측) 스트림 쌍
pub async fn connected_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    (client.unwrap(), accepted.unwrap().0)
}

/// 요청 `count`개와 각 요청의 클라이언트 스트림을 만듭니다. 요청 ID는 1부터 시작합니다.
pub async fn accepted_requests<T: Payload>(count: usize) -> (Vec<TcpStream>, Vec<Request<T>>) {
    let mut clients = Vec::with_capacity(count);
    let mut requests = Vec::with_capacity(count);
    for id in 1..=count as u64 {
        let (client, server) = connected_pair().await;
        clients.push(client);
        requests.push(Request::new(id, server, 1024).unwrap());
    }
    (clients, requests)
}

/// 호출된 훅을 순서대로 기록하는 훅, 지정한 이름의 훅은 거부
#[derive(Default)]
pub struct RecordingHooks {
    events: Mutex<Vec<String>>,
    reject: Option<&'static str>,
}

impl RecordingHooks {
    pub fn rejecting(hook: &'static str) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            reject: Some(hook),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn record(&self, hook: &'static str, detail: impl std::fmt::Display) -> Result<()> {
        self.events.lock().push(format!("{}:{}", hook, detail));
        if self.reject == Some(hook) {
            return Err(anyhow!("{} 거부", hook));
        }
        Ok(())
    }
}

impl<T: Payload> LifecycleHooks<T> for RecordingHooks {
    fn before_start(&self) -> Result<()> {
        self.record("before_start", "")
    }

    fn after_start(&self, local_addr: SocketAddr) -> Result<()> {
        self.record("after_start", local_addr.port())
    }

    fn before_accept(&self) -> Result<()> {
        self.record("before_accept", "")
    }

    fn after_accept(&self, _stream: &TcpStream, peer_addr: SocketAddr) -> Result<()> {
        self.record("after_accept", peer_addr.port())
    }

    fn before_handle(&self, request: &Request<T>) -> Result<()> {
        self.record("before_handle", request.id())
    }

    fn after_handle(&self, request: &Request<T>) -> Result<()> {
        self.record("after_handle", request.id())
    }

    fn before_stop(&self, local_addr: SocketAddr) -> Result<()> {
        self.record("before_stop", local_addr.port())
    }

    fn after_stop(&self, local_addr: SocketAddr) -> Result<()> {
        self.record("after_stop", local_addr.port())
    }
}

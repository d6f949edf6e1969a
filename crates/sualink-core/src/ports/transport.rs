//! 전송 바인딩 포트.
//!
//! 구현: `sualink-network` crate (rumqttc)
//!
//! 퍼블리시/서브스크라이브 클라이언트를 얇게 감싼 어댑터 경계.
//! 이벤트는 타입이 있는 합(sum) 타입으로 단일 채널에 전달되어,
//! 세션 상태 기계를 실제 전송과 분리해 검증할 수 있다.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::CoreError;
use crate::models::session::Credentials;

/// 발행 전달 보증 수준
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryLevel {
    /// 최대 한 번 (fire-and-forget)
    AtMostOnce,
    /// 최소 한 번 (일시적 유실 허용을 위한 제어 메시지 기본값)
    AtLeastOnce,
}

/// 전송 연결 옵션
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// 브로커 주소 (ws/wss/mqtt/mqtts URL)
    pub url: String,
    /// 클라이언트 ID (접속마다 고유해야 함)
    pub client_id: String,
    /// 자격증명 (None이면 익명 접속)
    pub credentials: Option<Credentials>,
    /// keepalive 간격
    pub keep_alive: Duration,
    /// 연결 수립 타임아웃
    pub connect_timeout: Duration,
    /// 수립된 세션 드롭 후 자동 재연결 간격.
    /// 최초 연결 실패에는 적용되지 않는다.
    pub reconnect_period: Duration,
}

/// 전송 계층 이벤트.
///
/// 핸들 하나가 내보내는 이벤트 순서는 보존된다. 소비자는 폐기된
/// 핸들의 잔류(stale) 이벤트를 식별해 무시할 책임이 있다.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// 브로커와 연결 수립됨 (재연결 복구 시에도 다시 발생)
    Connected,
    /// 구독 토픽으로 메시지 수신
    Message {
        /// 수신 토픽
        topic: String,
        /// 원시 페이로드
        payload: Vec<u8>,
    },
    /// 연결 실패. 수립 전 실패면 이 이벤트 후 핸들은 종료 상태다.
    Error {
        /// 브로커의 자격증명 거부 여부
        not_authorized: bool,
        /// 실패 상세
        detail: String,
    },
    /// 수립된 세션이 끊김 (전송 계층이 자동 복구 시도 중)
    Offline,
    /// 핸들 종료됨 (close 호출 또는 전송 계층 종료)
    Closed,
}

/// 전송 바인딩 — 연결 팩토리
#[async_trait]
pub trait Transport: Send + Sync {
    /// 브로커로 연결을 연다.
    ///
    /// 연결 수립 여부는 반환값이 아니라 `events` 채널의
    /// [`TransportEvent::Connected`] / [`TransportEvent::Error`]로
    /// 통지된다. 반환된 핸들은 동일 세션에서 교체 핸들을 열기 전에
    /// 반드시 닫아야 한다 (중복 구독/소켓 누수 방지).
    async fn open(
        &self,
        options: &ConnectOptions,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn TransportHandle>, CoreError>;
}

/// 열린 전송 연결 핸들
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// 토픽 구독
    async fn subscribe(&self, topic: &str) -> Result<(), CoreError>;

    /// 토픽으로 페이로드 발행
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        delivery: DeliveryLevel,
    ) -> Result<(), CoreError>;

    /// 연결 종료. 멱등 — 이미 닫힌 핸들을 다시 닫는 것은 no-op이다.
    async fn close(&self) -> Result<(), CoreError>;
}

//! 구독 세션 관리자.
//!
//! 하나의 논리 세션에 대해 전송 핸들 수명주기를 소유한다.
//! 전송 이벤트는 단일 순서 보장 큐로 합류하며, 각 이벤트는 그것을
//! 만든 핸들의 세대 번호로 태깅된다 — 교체된 핸들의 잔류 이벤트가
//! 상태를 되살리는 것을 세대 비교로 차단한다.
//!
//! 재연결 정책: 재연결은 항상 익명 모드로 강등된다. 쓰기 권한을
//! 되찾으려면 호출자가 자격증명을 다시 제공해 `connect`를 불러야
//! 한다 (DESIGN.md 참조).

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use sualink_core::config::BrokerConfig;
use sualink_core::error::CoreError;
use sualink_core::models::control::ControlIntent;
use sualink_core::models::session::{ConnectionStatus, Credentials, LoginMode};
use sualink_core::models::telemetry::TelemetrySnapshot;
use sualink_core::ports::credentials::CredentialStore;
use sualink_core::ports::transport::{
    ConnectOptions, Transport, TransportEvent, TransportHandle,
};

use crate::publisher;
use crate::reducer::TelemetryReducer;

/// 세션 이벤트 큐 깊이
const EVENT_QUEUE_DEPTH: usize = 64;

/// 세대 번호가 태깅된 전송 이벤트
struct TaggedEvent {
    generation: u64,
    event: TransportEvent,
}

/// 구독 세션 관리자.
///
/// 동시에 최대 하나의 살아 있는 전송 연결만 유지한다. 새 connect는
/// 항상 기존 연결을 먼저 닫는다 — 같은 토픽에 대한 중복 구독이
/// 공존할 수 없다.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    broker: BrokerConfig,
    reducer: TelemetryReducer,
    credential_store: Option<Arc<dyn CredentialStore>>,

    status_tx: watch::Sender<ConnectionStatus>,
    mode: LoginMode,
    subject_id: Option<u32>,
    topic_subscribed: bool,

    handle: Option<Box<dyn TransportHandle>>,
    /// 현재 추적 중인 핸들의 세대 (없으면 모든 이벤트가 잔류분)
    current_generation: Option<u64>,
    next_generation: u64,

    event_tx: mpsc::Sender<TaggedEvent>,
    event_rx: mpsc::Receiver<TaggedEvent>,
}

impl SessionManager {
    /// 새 세션 관리자 생성
    pub fn new(transport: Arc<dyn Transport>, broker: BrokerConfig, reducer: TelemetryReducer) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

        Self {
            transport,
            broker,
            reducer,
            credential_store: None,
            status_tx,
            mode: LoginMode::Anonymous,
            subject_id: None,
            topic_subscribed: false,
            handle: None,
            current_generation: None,
            next_generation: 0,
            event_tx,
            event_rx,
        }
    }

    /// 자격증명 저장소 연결.
    ///
    /// 인증 연결 성공 시 자격증명이 저장소에 기록된다.
    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = Some(store);
        self
    }

    /// 현재 연결 상태
    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    /// 상태 변경 수신기 생성
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// 현재 로그인 모드
    pub fn mode(&self) -> LoginMode {
        self.mode
    }

    /// 추적 중인 관찰 대상 ID
    pub fn subject_id(&self) -> Option<u32> {
        self.subject_id
    }

    /// 공개 토픽 구독 완료 여부
    pub fn topic_subscribed(&self) -> bool {
        self.topic_subscribed
    }

    /// 현재 텔레메트리 스냅샷 (복제본)
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.reducer.snapshot()
    }

    /// 브로커로 연결을 수립하고 대상 범위의 공개 토픽을 구독한다.
    ///
    /// `username`과 `password`가 모두 비어 있지 않으면 인증 모드,
    /// 아니면 익명 모드로 수립된다. 기존에 살아 있는 핸들은 새 연결을
    /// 열기 전에 먼저 닫는다.
    ///
    /// `subject_id == 0`은 사전 조건 위반이다 — 연결 시도 없이 즉시
    /// 실패한다. 브로커의 자격증명 거부는 [`CoreError::Auth`]로,
    /// 그 밖의 연결 실패는 [`CoreError::Network`]로 구분해 돌려준다.
    pub async fn connect(
        &mut self,
        username: &str,
        password: &str,
        subject_id: u32,
    ) -> Result<(), CoreError> {
        if subject_id == 0 {
            return Err(CoreError::Precondition(
                "관찰 대상 ID가 지정되지 않았습니다".to_string(),
            ));
        }

        // 교체 연결을 열기 전에 기존 연결부터 종료한다
        self.close_current_handle().await;

        self.subject_id = Some(subject_id);
        self.set_status(ConnectionStatus::Connecting);

        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let credentials = credentials.is_complete().then_some(credentials);

        let options = ConnectOptions {
            url: self.broker.url.clone(),
            client_id: format!(
                "{}_{}",
                self.broker.client_id_prefix,
                Uuid::new_v4().simple()
            ),
            credentials: credentials.clone(),
            keep_alive: self.broker.keep_alive(),
            connect_timeout: self.broker.connect_timeout(),
            reconnect_period: self.broker.reconnect_period(),
        };

        let generation = self.next_generation;
        self.next_generation += 1;

        let (raw_tx, mut raw_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let handle = match self.transport.open(&options, raw_tx).await {
            Ok(handle) => handle,
            Err(e) => {
                self.mode = LoginMode::Anonymous;
                self.set_status(ConnectionStatus::Error);
                return Err(e);
            }
        };

        // 핸들별 이벤트를 세대 번호로 태깅해 단일 큐로 합류시킨다
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = raw_rx.recv().await {
                if event_tx.send(TaggedEvent { generation, event }).await.is_err() {
                    break;
                }
            }
        });

        self.handle = Some(handle);
        self.current_generation = Some(generation);
        self.topic_subscribed = false;

        self.wait_for_establishment(generation, subject_id, credentials)
            .await
    }

    /// 연결을 다시 수립한다.
    ///
    /// 살아 있는 핸들을 닫고, 필요하면 관찰 대상을 교체한 뒤 빈
    /// 자격증명으로 `connect`를 재호출한다 — 재연결은 항상 익명
    /// 모드로 강등된다.
    pub async fn reconnect(&mut self, new_subject_id: Option<u32>) -> Result<(), CoreError> {
        if let Some(id) = new_subject_id {
            self.subject_id = Some(id);
        }
        let Some(subject_id) = self.subject_id else {
            return Err(CoreError::Precondition(
                "재연결할 관찰 대상 ID가 없습니다".to_string(),
            ));
        };

        self.connect("", "", subject_id).await
    }

    /// 연결 종료. 멱등 — 이미 끊긴 세션에 호출해도 무해하다.
    pub async fn disconnect(&mut self) {
        self.close_current_handle().await;
        self.mode = LoginMode::Anonymous;
        self.set_status(ConnectionStatus::Disconnected);
    }

    /// 관찰 대상 교체.
    ///
    /// 기존 세션을 끊고 텔레메트리를 기본값으로 되돌린다. 새 대상에
    /// 대한 구독은 호출자가 명시적으로 `connect`/`reconnect`를 불러야
    /// 시작된다 — 이전 자격증명으로 조용히 재구독하지 않는다.
    pub async fn change_subject(&mut self, new_subject_id: u32) {
        info!(subject_id = new_subject_id, "관찰 대상 교체");
        self.disconnect().await;
        self.reducer.reset();
        self.subject_id = Some(new_subject_id);
    }

    /// 텔레메트리 스냅샷을 기본값으로 복원 (연결 상태는 유지)
    pub fn reset_sensor_data(&self) {
        self.reducer.reset();
    }

    /// 장치의 잔량 경고 임계값 변경.
    ///
    /// 브로커가 발행을 수락하면 로컬 스냅샷의 임계값도 함께 갱신하고
    /// `true`를 돌려준다. 게이트 검사 실패(미연결/익명)와 발행 실패는
    /// 모두 `false`다.
    pub async fn set_alert_threshold(&mut self, value: f64) -> bool {
        let ok = self.publish_control(ControlIntent::Threshold(value)).await;
        if ok {
            self.reducer.set_alert_threshold(value);
        }
        ok
    }

    /// 장치 센서 리셋 명령 발행
    pub async fn set_reset(&mut self, reset: bool) -> bool {
        self.publish_control(ControlIntent::Reset(reset)).await
    }

    /// 큐에서 이벤트 하나를 기다려 상태 기계에 적용한다.
    ///
    /// 호스트의 이벤트 루프가 반복 호출한다.
    pub async fn tick(&mut self) {
        if let Some(tagged) = self.event_rx.recv().await {
            self.apply(tagged).await;
        }
    }

    /// 제어 의도 발행 — 게이트 검사에 걸리면 발행 시도 없이 false
    async fn publish_control(&mut self, intent: ControlIntent) -> bool {
        if !publisher::authorized(self.status(), self.mode) {
            debug!("제어 발행 거부: 연결된 인증 세션이 아님");
            return false;
        }
        let (Some(subject_id), Some(handle)) = (self.subject_id, self.handle.as_deref()) else {
            return false;
        };

        publisher::publish_intent(handle, &self.broker.private_topic(subject_id), intent).await
    }

    /// 연결 수립 대기 — 현재 세대의 Connected/Error가 올 때까지
    /// 큐를 소비한다.
    async fn wait_for_establishment(
        &mut self,
        generation: u64,
        subject_id: u32,
        credentials: Option<Credentials>,
    ) -> Result<(), CoreError> {
        loop {
            let Some(tagged) = self.event_rx.recv().await else {
                // event_tx를 self가 보유하므로 큐는 닫히지 않는다
                return Err(CoreError::Internal("이벤트 큐가 닫혔습니다".to_string()));
            };

            if tagged.generation != generation {
                debug!("폐기된 핸들의 잔류 이벤트 무시 (연결 수립 중)");
                continue;
            }

            match tagged.event {
                TransportEvent::Connected => {
                    let Some(handle) = self.handle.as_deref() else {
                        return Err(CoreError::Internal(
                            "수립 대기 중 핸들이 사라졌습니다".to_string(),
                        ));
                    };

                    let topic = self.broker.public_topic(subject_id);
                    if let Err(e) = handle.subscribe(&topic).await {
                        self.close_current_handle().await;
                        self.mode = LoginMode::Anonymous;
                        self.set_status(ConnectionStatus::Error);
                        return Err(e);
                    }

                    self.topic_subscribed = true;
                    self.mode = match &credentials {
                        Some(_) => LoginMode::Authenticated,
                        None => LoginMode::Anonymous,
                    };
                    self.set_status(ConnectionStatus::Connected);
                    info!(%topic, mode = ?self.mode, "브로커 연결 및 구독 완료");

                    if let (Some(store), Some(creds)) = (&self.credential_store, &credentials) {
                        if let Err(e) = store.store(creds).await {
                            warn!("자격증명 저장 실패 (무시): {e}");
                        }
                    }
                    return Ok(());
                }
                TransportEvent::Error { not_authorized, detail } => {
                    self.close_current_handle().await;
                    self.mode = LoginMode::Anonymous;
                    self.set_status(ConnectionStatus::Error);
                    return Err(if not_authorized {
                        CoreError::Auth("브로커가 자격증명을 거부했습니다".to_string())
                    } else {
                        CoreError::Network(detail)
                    });
                }
                TransportEvent::Closed => {
                    self.close_current_handle().await;
                    self.mode = LoginMode::Anonymous;
                    self.set_status(ConnectionStatus::Error);
                    return Err(CoreError::Network(
                        "연결 수립 전에 전송이 종료되었습니다".to_string(),
                    ));
                }
                // 수립 전의 Offline/메시지는 판정에 영향을 주지 않는다
                TransportEvent::Offline => continue,
                TransportEvent::Message { .. } => continue,
            }
        }
    }

    /// 이벤트 하나를 상태 기계에 적용
    async fn apply(&mut self, tagged: TaggedEvent) {
        // 세대 불일치 = 교체/종료된 핸들의 잔류 이벤트
        if self.current_generation != Some(tagged.generation) {
            debug!("폐기된 핸들의 잔류 이벤트 무시");
            return;
        }

        match tagged.event {
            TransportEvent::Message { topic, payload } => {
                if let Err(e) = self.reducer.apply(&payload).await {
                    // 파싱 실패는 메시지 폐기로 끝난다 — 연결은 유지
                    warn!(%topic, "텔레메트리 페이로드 폐기: {e}");
                }
            }
            TransportEvent::Offline => {
                if self.status() != ConnectionStatus::Disconnected {
                    self.set_status(ConnectionStatus::Offline);
                }
            }
            TransportEvent::Connected => {
                // 전송 계층이 끊긴 세션을 복구함 — 재구독 후 복귀
                if self.status() == ConnectionStatus::Offline {
                    self.resubscribe_after_recovery().await;
                }
            }
            TransportEvent::Error { detail, .. } => {
                warn!("전송 에러: {detail}");
                self.set_status(ConnectionStatus::Error);
            }
            TransportEvent::Closed => {
                self.handle = None;
                self.current_generation = None;
                self.topic_subscribed = false;
                self.set_status(ConnectionStatus::Disconnected);
            }
        }
    }

    /// 자동 복구된 연결에서 공개 토픽 재구독
    async fn resubscribe_after_recovery(&mut self) {
        let (Some(subject_id), Some(handle)) = (self.subject_id, self.handle.as_deref()) else {
            return;
        };

        let topic = self.broker.public_topic(subject_id);
        match handle.subscribe(&topic).await {
            Ok(()) => {
                self.topic_subscribed = true;
                self.set_status(ConnectionStatus::Connected);
                info!(%topic, "세션 복구 — 재구독 완료");
            }
            Err(e) => {
                warn!(%topic, "복구 후 재구독 실패: {e}");
            }
        }
    }

    /// 추적 중인 핸들 종료 및 세대 무효화
    async fn close_current_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.close().await {
                debug!("핸들 종료 중 오류 (무시): {e}");
            }
        }
        self.current_generation = None;
        self.topic_subscribed = false;
    }

    /// 상태 전이 기록 및 브로드캐스트
    fn set_status(&self, status: ConnectionStatus) {
        let previous = *self.status_tx.borrow();
        if previous != status {
            info!(%previous, %status, "연결 상태 전이");
            let _ = self.status_tx.send(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use sualink_core::ports::transport::DeliveryLevel;

    /// 스크립트된 인메모리 전송 — open마다 예약된 이벤트를 흘려보낸다
    struct MockTransport {
        state: Mutex<MockState>,
    }

    #[derive(Default)]
    struct MockState {
        scripts: VecDeque<Vec<TransportEvent>>,
        connections: Vec<Arc<MockConnection>>,
        opens: Vec<ConnectOptions>,
        fail_next_open: bool,
    }

    struct MockConnection {
        events: mpsc::Sender<TransportEvent>,
        subscriptions: Mutex<Vec<String>>,
        published: Mutex<Vec<(String, Vec<u8>, DeliveryLevel)>>,
        closed: AtomicBool,
        fail_publish: AtomicBool,
    }

    impl MockTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                state: Mutex::new(MockState::default()),
            })
        }

        /// 다음 open에서 흘려보낼 이벤트 예약 (기본: Connected)
        fn script_next(&self, events: Vec<TransportEvent>) {
            self.state.lock().scripts.push_back(events);
        }

        fn fail_next_open(&self) {
            self.state.lock().fail_next_open = true;
        }

        fn connection(&self, index: usize) -> Arc<MockConnection> {
            self.state.lock().connections[index].clone()
        }

        fn open_count(&self) -> usize {
            self.state.lock().opens.len()
        }

        fn open_options(&self, index: usize) -> ConnectOptions {
            self.state.lock().opens[index].clone()
        }
    }

    impl MockConnection {
        async fn send(&self, event: TransportEvent) {
            self.events.send(event).await.unwrap();
        }

        fn subscriptions(&self) -> Vec<String> {
            self.subscriptions.lock().clone()
        }

        fn published(&self) -> Vec<(String, Vec<u8>, DeliveryLevel)> {
            self.published.lock().clone()
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn open(
            &self,
            options: &ConnectOptions,
            events: mpsc::Sender<TransportEvent>,
        ) -> Result<Box<dyn TransportHandle>, CoreError> {
            let (connection, scripted) = {
                let mut state = self.state.lock();
                if state.fail_next_open {
                    state.fail_next_open = false;
                    return Err(CoreError::Network("연결 열기 실패".to_string()));
                }
                state.opens.push(options.clone());

                let connection = Arc::new(MockConnection {
                    events: events.clone(),
                    subscriptions: Mutex::new(Vec::new()),
                    published: Mutex::new(Vec::new()),
                    closed: AtomicBool::new(false),
                    fail_publish: AtomicBool::new(false),
                });
                state.connections.push(connection.clone());

                let scripted = state
                    .scripts
                    .pop_front()
                    .unwrap_or_else(|| vec![TransportEvent::Connected]);
                (connection, scripted)
            };

            for event in scripted {
                events.send(event).await.ok();
            }

            Ok(Box::new(MockHandle(connection)))
        }
    }

    struct MockHandle(Arc<MockConnection>);

    #[async_trait]
    impl TransportHandle for MockHandle {
        async fn subscribe(&self, topic: &str) -> Result<(), CoreError> {
            self.0.subscriptions.lock().push(topic.to_string());
            Ok(())
        }

        async fn publish(
            &self,
            topic: &str,
            payload: Vec<u8>,
            delivery: DeliveryLevel,
        ) -> Result<(), CoreError> {
            if self.0.fail_publish.load(Ordering::SeqCst) {
                return Err(CoreError::Network("발행 실패".to_string()));
            }
            self.0
                .published
                .lock()
                .push((topic.to_string(), payload, delivery));
            Ok(())
        }

        async fn close(&self) -> Result<(), CoreError> {
            // 멱등 — 두 번째 close는 no-op
            self.0.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn new_session(transport: Arc<MockTransport>) -> SessionManager {
        SessionManager::new(transport, BrokerConfig::default(), TelemetryReducer::new())
    }

    #[tokio::test]
    async fn connect_requires_subject_id() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        let result = session.connect("", "", 0).await;

        assert_matches!(result, Err(CoreError::Precondition(_)));
        // 연결 시도 자체가 없어야 한다
        assert_eq!(transport.open_count(), 0);
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn anonymous_connect_subscribes_public_topic() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("", "", 40).await.unwrap();

        assert_eq!(session.status(), ConnectionStatus::Connected);
        assert_eq!(session.mode(), LoginMode::Anonymous);
        assert!(session.topic_subscribed());
        assert_eq!(
            transport.connection(0).subscriptions(),
            vec!["public/ivbag/40".to_string()]
        );
        // 익명 접속은 자격증명 없이 열린다
        assert!(transport.open_options(0).credentials.is_none());
    }

    #[tokio::test]
    async fn authenticated_connect_passes_credentials() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("nurse01", "secret", 40).await.unwrap();

        assert_eq!(session.mode(), LoginMode::Authenticated);
        let credentials = transport.open_options(0).credentials.unwrap();
        assert_eq!(credentials.username, "nurse01");
    }

    #[tokio::test]
    async fn partial_credentials_fall_back_to_anonymous() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        // 비밀번호가 비어 있으면 익명 모드
        session.connect("nurse01", "", 40).await.unwrap();

        assert_eq!(session.mode(), LoginMode::Anonymous);
        assert!(transport.open_options(0).credentials.is_none());
    }

    #[tokio::test]
    async fn auth_rejection_is_distinguished_from_network_error() {
        let transport = MockTransport::new();
        transport.script_next(vec![TransportEvent::Error {
            not_authorized: true,
            detail: "not authorized".to_string(),
        }]);
        let mut session = new_session(transport.clone());

        let result = session.connect("nurse01", "wrong", 40).await;

        assert_matches!(result, Err(CoreError::Auth(_)));
        assert_eq!(session.status(), ConnectionStatus::Error);
        assert_eq!(session.mode(), LoginMode::Anonymous);
        assert!(transport.connection(0).is_closed());
    }

    #[tokio::test]
    async fn generic_connect_failure_is_network_error() {
        let transport = MockTransport::new();
        transport.script_next(vec![TransportEvent::Error {
            not_authorized: false,
            detail: "connection refused".to_string(),
        }]);
        let mut session = new_session(transport.clone());

        let result = session.connect("", "", 40).await;

        assert_matches!(result, Err(CoreError::Network(_)));
        assert_eq!(session.status(), ConnectionStatus::Error);
    }

    #[tokio::test]
    async fn open_failure_sets_error_status() {
        let transport = MockTransport::new();
        transport.fail_next_open();
        let mut session = new_session(transport.clone());

        let result = session.connect("", "", 40).await;

        assert!(result.is_err());
        assert_eq!(session.status(), ConnectionStatus::Error);
    }

    #[tokio::test]
    async fn connect_while_connected_closes_prior_handle() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("", "", 40).await.unwrap();
        session.connect("", "", 40).await.unwrap();

        // 이전 핸들은 새 핸들의 Connected 처리 전에 닫힌다
        assert!(transport.connection(0).is_closed());
        assert!(!transport.connection(1).is_closed());
        // 구독은 살아 있는 핸들당 최대 한 번
        assert_eq!(transport.connection(0).subscriptions().len(), 1);
        assert_eq!(transport.connection(1).subscriptions().len(), 1);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_resets_mode() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("nurse01", "secret", 40).await.unwrap();
        session.disconnect().await;

        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert_eq!(session.mode(), LoginMode::Anonymous);
        assert!(transport.connection(0).is_closed());

        // 두 번째 disconnect는 no-op
        session.disconnect().await;
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn stale_offline_does_not_resurrect_disconnected() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("", "", 40).await.unwrap();
        let old_connection = transport.connection(0);
        session.disconnect().await;

        // 닫힌 핸들에서 잔류 offline 이벤트가 도착
        old_connection.send(TransportEvent::Offline).await;
        session.tick().await;

        assert_eq!(session.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn stale_closed_from_superseded_handle_is_ignored() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("", "", 40).await.unwrap();
        let old_connection = transport.connection(0);
        session.connect("", "", 40).await.unwrap();

        // 교체된 핸들의 잔류 closed — 현재 세션을 끊어선 안 된다
        old_connection.send(TransportEvent::Closed).await;
        session.tick().await;

        assert_eq!(session.status(), ConnectionStatus::Connected);
        assert!(session.topic_subscribed());
    }

    #[tokio::test]
    async fn offline_then_recovery_resubscribes() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("", "", 40).await.unwrap();
        let connection = transport.connection(0);

        connection.send(TransportEvent::Offline).await;
        session.tick().await;
        assert_eq!(session.status(), ConnectionStatus::Offline);

        // 전송 계층 자동 복구 — 재구독 후 Connected 복귀
        connection.send(TransportEvent::Connected).await;
        session.tick().await;
        assert_eq!(session.status(), ConnectionStatus::Connected);
        assert_eq!(connection.subscriptions().len(), 2);
    }

    #[tokio::test]
    async fn transport_close_moves_to_disconnected() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("nurse01", "secret", 40).await.unwrap();
        transport.connection(0).send(TransportEvent::Closed).await;
        session.tick().await;

        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert!(!session.topic_subscribed());
        // 핸들이 사라졌으므로 제어 발행은 즉시 거부된다
        assert!(!session.set_reset(true).await);
    }

    #[tokio::test]
    async fn message_events_feed_the_reducer() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("", "", 40).await.unwrap();
        let connection = transport.connection(0);

        connection
            .send(TransportEvent::Message {
                topic: "public/ivbag/40".to_string(),
                payload: br#"{"level": 42, "rate": 1.25}"#.to_vec(),
            })
            .await;
        session.tick().await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.level, 42.0);
        assert_eq!(snapshot.rate, 1.25);
    }

    #[tokio::test]
    async fn malformed_payload_leaves_connection_intact() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("", "", 40).await.unwrap();
        transport
            .connection(0)
            .send(TransportEvent::Message {
                topic: "public/ivbag/40".to_string(),
                payload: b"garbage".to_vec(),
            })
            .await;
        session.tick().await;

        assert_eq!(session.status(), ConnectionStatus::Connected);
        assert_eq!(session.snapshot().level, 100.0);
    }

    #[tokio::test]
    async fn reconnect_degrades_to_anonymous() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("nurse01", "secret", 40).await.unwrap();
        assert_eq!(session.mode(), LoginMode::Authenticated);

        session.reconnect(None).await.unwrap();

        assert_eq!(session.mode(), LoginMode::Anonymous);
        assert!(transport.connection(0).is_closed());
        assert!(transport.open_options(1).credentials.is_none());
    }

    #[tokio::test]
    async fn reconnect_can_retarget_subject() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("", "", 40).await.unwrap();
        session.reconnect(Some(41)).await.unwrap();

        assert_eq!(session.subject_id(), Some(41));
        assert_eq!(
            transport.connection(1).subscriptions(),
            vec!["public/ivbag/41".to_string()]
        );
    }

    #[tokio::test]
    async fn reconnect_without_subject_fails_fast() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        let result = session.reconnect(None).await;

        assert_matches!(result, Err(CoreError::Precondition(_)));
        assert_eq!(transport.open_count(), 0);
    }

    #[tokio::test]
    async fn change_subject_tears_down_and_resets() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("nurse01", "secret", 40).await.unwrap();
        transport
            .connection(0)
            .send(TransportEvent::Message {
                topic: "public/ivbag/40".to_string(),
                payload: br#"{"level": 50}"#.to_vec(),
            })
            .await;
        session.tick().await;

        session.change_subject(41).await;

        // 기존 구독 종료, 스냅샷 기본값 복원, 자동 재구독 없음
        assert!(transport.connection(0).is_closed());
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert_eq!(session.subject_id(), Some(41));
        assert_eq!(session.snapshot(), TelemetrySnapshot::default());
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn anonymous_session_cannot_publish_control() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("", "", 40).await.unwrap();
        assert_eq!(session.status(), ConnectionStatus::Connected);

        // 연결되어 있어도 익명이면 발행 시도조차 하지 않는다
        assert!(!session.set_reset(true).await);
        assert!(!session.set_alert_threshold(20.0).await);
        assert!(transport.connection(0).published().is_empty());
    }

    #[tokio::test]
    async fn authenticated_session_publishes_control() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("nurse01", "secret", 40).await.unwrap();

        assert!(session.set_alert_threshold(20.0).await);
        assert!(session.set_reset(true).await);

        let published = transport.connection(0).published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].0, "private/ctl/ivbag/40");
        let threshold: serde_json::Value = serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(threshold, serde_json::json!({ "threshold": 20.0 }));
        let reset: serde_json::Value = serde_json::from_slice(&published[1].1).unwrap();
        assert_eq!(reset, serde_json::json!({ "reset": true }));

        // 수락된 임계값은 로컬 스냅샷에도 반영된다
        assert_eq!(session.snapshot().alert_threshold, 20.0);
    }

    #[tokio::test]
    async fn failed_publish_keeps_local_threshold() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("nurse01", "secret", 40).await.unwrap();
        transport
            .connection(0)
            .fail_publish
            .store(true, Ordering::SeqCst);

        assert!(!session.set_alert_threshold(20.0).await);
        assert_eq!(session.snapshot().alert_threshold, 15.0);
    }

    #[tokio::test]
    async fn credentials_stored_after_authenticated_connect() {
        struct RecordingStore {
            stored: Mutex<Vec<Credentials>>,
        }

        #[async_trait]
        impl CredentialStore for RecordingStore {
            async fn load(&self) -> Result<Option<Credentials>, CoreError> {
                Ok(self.stored.lock().last().cloned())
            }

            async fn store(&self, credentials: &Credentials) -> Result<(), CoreError> {
                self.stored.lock().push(credentials.clone());
                Ok(())
            }

            async fn clear(&self) -> Result<(), CoreError> {
                self.stored.lock().clear();
                Ok(())
            }
        }

        let store = Arc::new(RecordingStore {
            stored: Mutex::new(Vec::new()),
        });
        let transport = MockTransport::new();
        let mut session =
            new_session(transport.clone()).with_credential_store(store.clone());

        // 익명 연결은 저장소를 건드리지 않는다
        session.connect("", "", 40).await.unwrap();
        assert!(store.stored.lock().is_empty());

        session.connect("nurse01", "secret", 40).await.unwrap();
        let stored = store.stored.lock();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].username, "nurse01");
        assert_eq!(stored[0].password, "secret");
    }

    #[tokio::test]
    async fn status_watch_broadcasts_transitions() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());
        let mut status_rx = session.subscribe_status();

        assert_eq!(*status_rx.borrow(), ConnectionStatus::Disconnected);

        session.connect("", "", 40).await.unwrap();
        status_rx.changed().await.unwrap();
        assert_eq!(*status_rx.borrow(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn client_ids_are_unique_per_connection() {
        let transport = MockTransport::new();
        let mut session = new_session(transport.clone());

        session.connect("", "", 40).await.unwrap();
        session.reconnect(None).await.unwrap();

        let first = transport.open_options(0).client_id;
        let second = transport.open_options(1).client_id;
        assert!(first.starts_with("sualink_"));
        assert_ne!(first, second);
    }
}

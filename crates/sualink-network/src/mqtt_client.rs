//! MQTT 전송 어댑터.
//!
//! `Transport` 포트 구현. rumqttc 기반, WebSocket/TCP 전송 지원.
//!
//! 재시도 체계는 두 가지를 명확히 구분한다:
//! - 최초 연결 실패: `Error` 이벤트 하나를 보내고 펌프를 종료한다.
//!   자동 재시도는 없다 — 재시도는 호출자 몫이다.
//! - 수립된 세션 드롭: `Offline`을 보낸 뒤 재연결 간격으로 폴링을
//!   계속하고, 브로커가 복구되면 `Connected`를 다시 보낸다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
    TlsConfiguration, Transport as WireTransport,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use sualink_core::error::CoreError;
use sualink_core::ports::transport::{
    ConnectOptions, DeliveryLevel, Transport, TransportEvent, TransportHandle,
};

/// 이벤트 루프 요청 큐 용량
const REQUEST_QUEUE_CAPACITY: usize = 10;

/// MQTT 전송 — `Transport` 포트 구현
#[derive(Debug, Default)]
pub struct MqttTransport;

impl MqttTransport {
    /// 새 MQTT 전송 생성
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn open(
        &self,
        options: &ConnectOptions,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn TransportHandle>, CoreError> {
        let mqtt_options = mqtt_options_from(options)?;
        info!(url = %options.url, client_id = %options.client_id, "MQTT 연결 열기");

        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_QUEUE_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(pump(
            event_loop,
            events,
            closed.clone(),
            options.connect_timeout,
            options.reconnect_period,
        ));

        Ok(Box::new(MqttHandle { client, closed }))
    }
}

/// `ConnectOptions` → rumqttc 옵션 변환.
///
/// ws/wss 스킴은 전체 URL을 브로커 주소로 넘기고 (rumqttc 웹소켓
/// 규약), mqtt/mqtts는 호스트/포트로 분해한다.
fn mqtt_options_from(options: &ConnectOptions) -> Result<MqttOptions, CoreError> {
    let url = Url::parse(&options.url)
        .map_err(|e| CoreError::Config(format!("브로커 URL 파싱 실패: {}: {e}", options.url)))?;
    let host = url
        .host_str()
        .ok_or_else(|| CoreError::Config(format!("브로커 URL에 호스트가 없습니다: {}", options.url)))?;

    let (transport, default_port, broker_addr) = match url.scheme() {
        "ws" => (WireTransport::Ws, 80, options.url.clone()),
        "wss" => (
            WireTransport::Wss(TlsConfiguration::Native),
            443,
            options.url.clone(),
        ),
        "mqtt" | "tcp" => (WireTransport::Tcp, 1883, host.to_string()),
        "mqtts" | "ssl" => (
            WireTransport::Tls(TlsConfiguration::Native),
            8883,
            host.to_string(),
        ),
        other => {
            return Err(CoreError::Config(format!(
                "지원하지 않는 브로커 URL 스킴: {other}"
            )))
        }
    };
    let port = url.port().unwrap_or(default_port);

    let mut mqtt_options = MqttOptions::new(options.client_id.clone(), broker_addr, port);
    mqtt_options.set_transport(transport);
    mqtt_options.set_keep_alive(options.keep_alive);
    if let Some(credentials) = &options.credentials {
        mqtt_options.set_credentials(credentials.username.clone(), credentials.password.clone());
    }

    Ok(mqtt_options)
}

/// 브로커의 자격증명 거부 여부
fn is_auth_rejection(error: &ConnectionError) -> bool {
    matches!(
        error,
        ConnectionError::ConnectionRefused(
            ConnectReturnCode::NotAuthorized | ConnectReturnCode::BadUserNamePassword
        )
    )
}

/// 이벤트 루프 펌프 — rumqttc 이벤트를 포트 이벤트로 변환해 전달
async fn pump(
    mut event_loop: EventLoop,
    events: mpsc::Sender<TransportEvent>,
    closed: Arc<AtomicBool>,
    connect_timeout: Duration,
    reconnect_period: Duration,
) {
    // established: CONNACK 수락 이력, online: 현재 살아 있는 구간
    let mut established = false;
    let mut online = false;

    loop {
        let polled = if established {
            event_loop.poll().await
        } else {
            // 최초 수립 구간에만 연결 타임아웃 적용
            match tokio::time::timeout(connect_timeout, event_loop.poll()).await {
                Ok(polled) => polled,
                Err(_) => {
                    let _ = events
                        .send(TransportEvent::Error {
                            not_authorized: false,
                            detail: "연결 수립 타임아웃".to_string(),
                        })
                        .await;
                    return;
                }
            }
        };

        match polled {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    established = true;
                    online = true;
                    if events.send(TransportEvent::Connected).await.is_err() {
                        return;
                    }
                } else if !established {
                    let not_authorized = matches!(
                        ack.code,
                        ConnectReturnCode::NotAuthorized | ConnectReturnCode::BadUserNamePassword
                    );
                    let _ = events
                        .send(TransportEvent::Error {
                            not_authorized,
                            detail: format!("브로커가 연결을 거부했습니다: {:?}", ack.code),
                        })
                        .await;
                    return;
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = TransportEvent::Message {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                };
                if events.send(message).await.is_err() {
                    return;
                }
            }
            Ok(_) => {}
            Err(error) => {
                if closed.load(Ordering::SeqCst) {
                    debug!("핸들 종료로 이벤트 루프 종료");
                    let _ = events.send(TransportEvent::Closed).await;
                    return;
                }

                if !established {
                    // 최초 연결 실패 — 자동 재시도 없이 종료
                    let _ = events
                        .send(TransportEvent::Error {
                            not_authorized: is_auth_rejection(&error),
                            detail: error.to_string(),
                        })
                        .await;
                    return;
                }

                // 수립된 세션 드롭 — 복구 폴링은 재연결 간격으로 페이싱
                if online {
                    online = false;
                    warn!("수립된 세션 드롭: {error}");
                    if events.send(TransportEvent::Offline).await.is_err() {
                        return;
                    }
                }
                tokio::time::sleep(reconnect_period).await;
            }
        }
    }
}

/// 열린 MQTT 연결 핸들
struct MqttHandle {
    client: AsyncClient,
    closed: Arc<AtomicBool>,
}

impl MqttHandle {
    fn ensure_open(&self) -> Result<(), CoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoreError::Network("이미 닫힌 핸들입니다".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TransportHandle for MqttHandle {
    async fn subscribe(&self, topic: &str) -> Result<(), CoreError> {
        self.ensure_open()?;
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| CoreError::Network(format!("구독 실패: {topic}: {e}")))
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        delivery: DeliveryLevel,
    ) -> Result<(), CoreError> {
        self.ensure_open()?;
        let qos = match delivery {
            DeliveryLevel::AtMostOnce => QoS::AtMostOnce,
            DeliveryLevel::AtLeastOnce => QoS::AtLeastOnce,
        };
        self.client
            .publish(topic, qos, false, payload)
            .await
            .map_err(|e| CoreError::Network(format!("발행 실패: {topic}: {e}")))
    }

    async fn close(&self) -> Result<(), CoreError> {
        // 멱등 — 두 번째 close는 no-op
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // 이벤트 루프가 이미 죽었으면 disconnect 요청은 실패한다 — 무시
        self.client.disconnect().await.ok();
        Ok(())
    }
}

//! 애플리케이션 설정 구조체.
//!
//! 브로커 주소, 토픽 프리픽스, keepalive/재연결 주기 등 런타임 설정을
//! 정의한다. 파일 로드는 [`crate::config_manager`], 환경변수 오버레이는
//! `sualink-app`에서 `config` crate로 처리한다.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 브로커 연결 설정
    pub broker: BrokerConfig,
    /// 알림 설정
    #[serde(default)]
    pub notification: NotificationConfig,
}

/// 브로커 연결 설정
///
/// 토픽은 `{프리픽스}{대상 ID}` 형태로 조합된다. 프리픽스는 계약이
/// 아니라 설정값이다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// 브로커 주소 (ws/wss/mqtt/mqtts URL)
    #[serde(default = "default_broker_url")]
    pub url: String,
    /// 수신 텔레메트리 토픽 프리픽스
    #[serde(default = "default_public_prefix")]
    pub public_topic_prefix: String,
    /// 송신 제어 토픽 프리픽스
    #[serde(default = "default_private_prefix")]
    pub private_topic_prefix: String,
    /// MQTT 클라이언트 ID 프리픽스 (실제 ID는 접속마다 랜덤 접미사 부착)
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
    /// keepalive 간격 (초)
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// 연결 수립 타임아웃 (밀리초)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// 수립된 세션 드롭 후 자동 재연결 간격 (밀리초).
    /// 최초 연결 실패에는 적용되지 않는다 — 그 경우 재시도는 호출자 몫.
    #[serde(default = "default_reconnect_period_ms")]
    pub reconnect_period_ms: u64,
}

/// 알림 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// 잔량 경고 알림 활성화 여부
    #[serde(default = "default_true")]
    pub low_level_alerts: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            low_level_alerts: true,
        }
    }
}

fn default_broker_url() -> String {
    "wss://test.mosquitto.org:8081".to_string()
}

fn default_public_prefix() -> String {
    "public/ivbag/".to_string()
}

fn default_private_prefix() -> String {
    "private/ctl/ivbag/".to_string()
}

fn default_client_id_prefix() -> String {
    "sualink".to_string()
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_connect_timeout_ms() -> u64 {
    4_000
}

fn default_reconnect_period_ms() -> u64 {
    4_000
}

fn default_true() -> bool {
    true
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: default_broker_url(),
            public_topic_prefix: default_public_prefix(),
            private_topic_prefix: default_private_prefix(),
            client_id_prefix: default_client_id_prefix(),
            keep_alive_secs: default_keep_alive_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect_period_ms: default_reconnect_period_ms(),
        }
    }
}

impl BrokerConfig {
    /// 대상 ID 범위의 수신 텔레메트리 토픽
    pub fn public_topic(&self, subject_id: u32) -> String {
        format!("{}{}", self.public_topic_prefix, subject_id)
    }

    /// 대상 ID 범위의 송신 제어 토픽
    pub fn private_topic(&self, subject_id: u32) -> String {
        format!("{}{}", self.private_topic_prefix, subject_id)
    }

    /// keepalive 간격
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// 연결 수립 타임아웃
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// 자동 재연결 간격
    pub fn reconnect_period(&self) -> Duration {
        Duration::from_millis(self.reconnect_period_ms)
    }
}

impl AppConfig {
    /// 기본 설정 생성
    pub fn default_config() -> Self {
        Self {
            broker: BrokerConfig::default(),
            notification: NotificationConfig::default(),
        }
    }
}

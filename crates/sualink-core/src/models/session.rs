//! 세션 모델.
//!
//! 브로커와의 구독 세션 상태와 로그인 모드를 표현.

use serde::{Deserialize, Serialize};

/// 연결 상태.
///
/// 한 시점에 정확히 하나의 값만 활성화된다. 허용 전이는
/// 세션 관리자(`sualink-session`)의 상태 기계가 정의한다.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    /// 연결 끊김 (초기 상태, 재진입 가능)
    Disconnected,
    /// 연결 수립 중
    Connecting,
    /// 연결됨 (토픽 구독 완료)
    Connected,
    /// 수립된 세션이 끊겨 전송 계층이 복구 대기 중
    Offline,
    /// 연결 실패 (수동 재시도 필요)
    Error,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting"),
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Offline => write!(f, "Offline"),
            ConnectionStatus::Error => write!(f, "Error"),
        }
    }
}

/// 로그인 모드
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoginMode {
    /// 읽기 전용 — 자격증명 없이 수립된 세션
    Anonymous,
    /// 읽기/쓰기 — 자격증명으로 수립된 세션 (제어 발행 허용)
    Authenticated,
}

/// 브로커 자격증명
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    /// 사용자 이름
    pub username: String,
    /// 비밀번호
    pub password: String,
}

impl Credentials {
    /// 두 필드가 모두 비어 있지 않은 경우에만 인증 모드로 취급된다
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

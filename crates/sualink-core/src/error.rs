//! SUALINK 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 자체 에러를 `CoreError`로 래핑해 반환한다.
//! 이 코어에서 치명적인 에러는 없다 — 모든 실패는 호출자 주도의
//! 재시도 또는 재설정으로 복구 가능하다.

use thiserror::Error;

/// 코어 레이어 에러.
/// 연결, 인증, 파싱, 사전 조건 등 도메인 공통 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패 (수신 페이로드 폐기, 연결은 유지)
    #[error("파싱 에러: {0}")]
    Parse(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 — {field}: {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 호출자 입력 사전 조건 위반 (예: 대상 ID 미지정)
    #[error("사전 조건 위반: {0}")]
    Precondition(String),

    /// 브로커가 자격증명을 거부함
    #[error("인증 에러: {0}")]
    Auth(String),

    /// 네트워크/전송 계층 실패 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 자격증명 저장소 에러 (키체인 접근 실패 등)
    #[error("저장소 에러: {0}")]
    Storage(String),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// 브로커의 자격증명 거부로 인한 실패 여부.
    ///
    /// UI는 이 구분으로 "재입력 요청"과 "단순 재시도"를 가른다.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, CoreError::Auth(_))
    }
}

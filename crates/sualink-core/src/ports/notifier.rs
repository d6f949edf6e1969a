//! 알림 포트.
//!
//! 구현: `sualink-app` (터미널 출력)
//!
//! 잔량이 경고 임계값 아래로 내려가면 코어가 fire-and-forget으로
//! 호출한다. 표시 완료를 기다리지 않으며, 실패는 로그 후 무시된다.

use async_trait::async_trait;

use crate::error::CoreError;

/// 잔량 경고 알림 인터페이스
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// 포맷된 경고 메시지 표시
    async fn alert(&self, message: &str) -> Result<(), CoreError>;
}

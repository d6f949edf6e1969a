//! 터미널 알림 어댑터.
//!
//! `AlertNotifier` 포트 구현. 잔량 경고를 stderr로 출력한다 —
//! 텔레메트리 렌더 스트림(stdout)과 섞이지 않는다.

use async_trait::async_trait;
use tracing::warn;

use sualink_core::error::CoreError;
use sualink_core::ports::notifier::AlertNotifier;

/// 터미널 잔량 경고 알림
pub struct TerminalNotifier;

#[async_trait]
impl AlertNotifier for TerminalNotifier {
    async fn alert(&self, message: &str) -> Result<(), CoreError> {
        warn!("{message}");
        eprintln!("⚠  {message}");
        Ok(())
    }
}

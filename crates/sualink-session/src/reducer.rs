//! 텔레메트리 리듀서.
//!
//! 수신 페이로드를 파싱/검증/클램프하여 스냅샷에 병합한다.
//! 병합은 필드 단위 last-write-wins이며, 스냅샷 락 아래에서
//! 원자적으로 적용된다 — 동시 렌더러가 반쯤 병합된 값을 볼 수 없다.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use sualink_core::error::CoreError;
use sualink_core::models::telemetry::{clamp_percent, TelemetrySnapshot, TelemetryUpdate};
use sualink_core::ports::notifier::AlertNotifier;

/// 텔레메트리 리듀서 — 스냅샷 소유자
pub struct TelemetryReducer {
    snapshot: Mutex<TelemetrySnapshot>,
    notifier: Option<Arc<dyn AlertNotifier>>,
    alerts_enabled: bool,
}

impl TelemetryReducer {
    /// 알림 없는 리듀서 생성
    pub fn new() -> Self {
        Self {
            snapshot: Mutex::new(TelemetrySnapshot::default()),
            notifier: None,
            alerts_enabled: true,
        }
    }

    /// 잔량 경고 알림 수신자 연결
    pub fn with_notifier(mut self, notifier: Arc<dyn AlertNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 잔량 경고 알림 활성화 여부 설정
    pub fn with_alerts_enabled(mut self, enabled: bool) -> Self {
        self.alerts_enabled = enabled;
        self
    }

    /// 수신 페이로드 적용.
    ///
    /// JSON이 아니거나 `level` 필드가 숫자가 아니면 [`CoreError::Parse`]로
    /// 실패한다 — 호출자는 경고 로그 후 메시지를 폐기하며, 연결은
    /// 영향을 받지 않는다. 제공된 필드만 덮어쓴다.
    pub async fn apply(&self, raw: &[u8]) -> Result<(), CoreError> {
        let update: TelemetryUpdate = serde_json::from_slice(raw)?;

        // 락 구간에서 병합만 수행하고, 알림은 락 해제 후 보낸다
        let alert_level = {
            let mut snapshot = self.snapshot.lock();
            let mut alert_level = None;

            if let Some(level) = update.level {
                let clamped = clamp_percent(level);
                snapshot.level = clamped;
                if clamped < snapshot.alert_threshold {
                    alert_level = Some(clamped);
                }
            }
            if let Some(rate) = update.rate {
                snapshot.rate = rate;
            }
            if let Some(time_left) = update.time_left {
                snapshot.time_left = Some(time_left);
            }
            snapshot.updated_at = Some(chrono::Utc::now());

            alert_level
        };

        if let Some(level) = alert_level {
            self.notify_low_level(level).await;
        }

        Ok(())
    }

    /// 현재 스냅샷 (복제본)
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot.lock().clone()
    }

    /// 스냅샷을 기본값으로 복원
    pub fn reset(&self) {
        *self.snapshot.lock() = TelemetrySnapshot::default();
        debug!("텔레메트리 스냅샷 초기화");
    }

    /// 로컬 경고 임계값 갱신 (클램프 후 저장)
    pub fn set_alert_threshold(&self, value: f64) {
        self.snapshot.lock().alert_threshold = clamp_percent(value);
    }

    /// 잔량 경고 전달 — fire-and-forget, 실패는 로그 후 무시
    async fn notify_low_level(&self, level: f64) {
        if !self.alerts_enabled {
            return;
        }
        let Some(notifier) = &self.notifier else {
            return;
        };

        let message = format!("수액 잔량 경고: {level}%");
        if let Err(e) = notifier.alert(&message).await {
            warn!("잔량 경고 알림 전달 실패 (무시): {e}");
        }
    }
}

impl Default for TelemetryReducer {
    fn default() -> Self {
        Self::new()
    }
}

//! 텔레메트리 모델.
//!
//! 수액 센서가 보내는 수신 페이로드와, 병합된 뷰 모델(스냅샷)을 정의.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 예상 잔여 시간
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLeft {
    /// 잔여 시간 (시)
    pub hour: u32,
    /// 잔여 시간 (분)
    pub minute: u32,
}

/// 병합된 텔레메트리 뷰 모델.
///
/// 부분 업데이트는 제공된 필드만 덮어쓰며, 건드리지 않은 필드는
/// 마지막으로 알려진 값을 유지한다 (기본값으로 되돌리지 않는다).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    /// 수액 잔량 (%) — 항상 [0, 100] 범위로 클램프되어 저장된다
    pub level: f64,
    /// 주입 속도 — 관례상 음수가 아니지만 강제하지 않는 허용 필드
    pub rate: f64,
    /// 예상 잔여 시간 (수신 전에는 미설정)
    pub time_left: Option<TimeLeft>,
    /// 잔량 경고 임계값 (%) — [0, 100]
    pub alert_threshold: f64,
    /// 마지막 업데이트 수신 시각
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            level: 100.0,
            rate: 0.0,
            time_left: None,
            alert_threshold: 15.0,
            updated_at: None,
        }
    }
}

/// 수신 텔레메트리 페이로드 (부분 업데이트).
///
/// `level`/`rate`/`timeLeft`의 임의 부분집합을 허용하고,
/// 알 수 없는 필드는 무시한다. `level`이 존재하는데 숫자가 아니면
/// 역직렬화 자체가 실패한다 (메시지 폐기 대상).
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryUpdate {
    /// 수액 잔량 (%)
    pub level: Option<f64>,
    /// 주입 속도
    pub rate: Option<f64>,
    /// 예상 잔여 시간
    #[serde(rename = "timeLeft")]
    pub time_left: Option<TimeLeft>,
}

/// 퍼센트 값을 [0, 100]으로 클램프
pub fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

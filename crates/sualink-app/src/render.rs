//! 터미널 텔레메트리 렌더링.

use sualink_core::models::session::ConnectionStatus;
use sualink_core::models::telemetry::TelemetrySnapshot;

/// 스냅샷 한 줄 렌더링
pub fn telemetry_line(snapshot: &TelemetrySnapshot) -> String {
    let time_left = snapshot
        .time_left
        .map(|t| format!("{}시간 {}분", t.hour, t.minute))
        .unwrap_or_else(|| "--".to_string());

    format!(
        "잔량 {:>5.1}% | 속도 {:.2} | 잔여 {} | 경고 임계값 {}%",
        snapshot.level, snapshot.rate, time_left, snapshot.alert_threshold
    )
}

/// 연결 상태 한 줄 렌더링
pub fn status_line(status: ConnectionStatus) -> String {
    format!("[연결 상태] {status}")
}

//! 제어 발행.
//!
//! 제어 의도를 검증/직렬화해 대상 범위의 제어 토픽으로 발행한다.
//! 게이트 검사(연결됨 + 인증됨)에 걸리면 발행 시도 없이 실패를
//! 돌려준다 — 흔히 발생하는 정상 경로이므로 에러가 아니라 bool이다.

use tracing::{debug, warn};

use sualink_core::models::control::ControlIntent;
use sualink_core::models::session::{ConnectionStatus, LoginMode};
use sualink_core::ports::transport::{DeliveryLevel, TransportHandle};

/// 제어 발행 허용 여부.
///
/// 연결된 인증 세션에서만 제어 메시지를 내보낼 수 있다.
pub(crate) fn authorized(status: ConnectionStatus, mode: LoginMode) -> bool {
    status == ConnectionStatus::Connected && mode == LoginMode::Authenticated
}

/// 제어 의도를 발행한다.
///
/// 브로커 수락 시 `true`, 검증 실패나 발행 에러는 로그 후 `false`로
/// 수렴한다 — 하부 전송 에러를 위로 전파하지 않는다.
pub(crate) async fn publish_intent(
    handle: &dyn TransportHandle,
    topic: &str,
    intent: ControlIntent,
) -> bool {
    let payload = match intent.to_payload() {
        Ok(payload) => payload,
        Err(e) => {
            warn!("제어 의도 검증 실패: {e}");
            return false;
        }
    };

    // 일시적 유실을 견디기 위해 최소 한 번 전달 보증 사용
    match handle
        .publish(topic, payload, DeliveryLevel::AtLeastOnce)
        .await
    {
        Ok(()) => {
            debug!(%topic, "제어 메시지 발행 완료");
            true
        }
        Err(e) => {
            warn!(%topic, "제어 메시지 발행 실패: {e}");
            false
        }
    }
}

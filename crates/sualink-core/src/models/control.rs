//! 제어 명령 모델.
//!
//! 운영자가 장치로 내려보내는 제어 의도. 저장되지 않고 전송만 된다.

use crate::error::CoreError;
use crate::models::telemetry::clamp_percent;

/// 송신 제어 의도.
///
/// 와이어 페이로드는 `{"threshold": v}` 또는 `{"reset": b}` 중
/// 정확히 하나의 키를 갖는 JSON 객체다.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlIntent {
    /// 장치의 잔량 경고 임계값 변경 (%)
    Threshold(f64),
    /// 장치 센서 리셋
    Reset(bool),
}

impl ControlIntent {
    /// 발행 전 유효성 검증.
    ///
    /// 임계값은 [0, 100] 범위의 유한한 수만 허용한다.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            ControlIntent::Threshold(value) => {
                if !value.is_finite() || *value != clamp_percent(*value) {
                    return Err(CoreError::Validation {
                        field: "threshold".to_string(),
                        message: format!("허용 범위 [0, 100]를 벗어남: {value}"),
                    });
                }
                Ok(())
            }
            ControlIntent::Reset(_) => Ok(()),
        }
    }

    /// JSON 와이어 페이로드로 직렬화
    pub fn to_payload(&self) -> Result<Vec<u8>, CoreError> {
        self.validate()?;
        let value = match self {
            ControlIntent::Threshold(threshold) => {
                serde_json::json!({ "threshold": threshold })
            }
            ControlIntent::Reset(reset) => serde_json::json!({ "reset": reset }),
        };
        Ok(serde_json::to_vec(&value)?)
    }
}

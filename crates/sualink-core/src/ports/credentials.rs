//! 자격증명 저장소 포트.
//!
//! 구현: `sualink-storage` crate (keyring)
//!
//! 세션 시작 시 읽고, 인증 연결 성공 후 기록한다. 코어는 저장
//! 매체를 가정하지 않으며, 영속 값에 대한 추가 검증도 하지 않는다.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::session::Credentials;

/// 자격증명 저장소 인터페이스
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 저장된 자격증명 조회 (없으면 None)
    async fn load(&self) -> Result<Option<Credentials>, CoreError>;

    /// 자격증명 저장 (기존 값 덮어쓰기)
    async fn store(&self, credentials: &Credentials) -> Result<(), CoreError>;

    /// 저장된 자격증명 삭제
    async fn clear(&self) -> Result<(), CoreError>;
}

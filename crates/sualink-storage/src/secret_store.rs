//! OS 키체인 자격증명 저장소.
//!
//! `CredentialStore` 포트 구현. keyring crate로 플랫폼 키체인
//! (macOS Keychain, Windows Credential Manager, Secret Service)에
//! 자격증명을 JSON 한 건으로 저장한다.

use async_trait::async_trait;
use keyring::Entry;
use tracing::debug;

use sualink_core::error::CoreError;
use sualink_core::models::session::Credentials;
use sualink_core::ports::credentials::CredentialStore;

/// 키체인 서비스 이름 기본값
const DEFAULT_SERVICE: &str = "sualink";

/// 키체인 엔트리 이름 — 세션당 자격증명 한 건
const ENTRY_NAME: &str = "broker-credentials";

/// OS 키체인 기반 자격증명 저장소
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    /// 기본 서비스 이름으로 생성
    pub fn new() -> Self {
        Self::with_service(DEFAULT_SERVICE)
    }

    /// 서비스 이름 지정 생성 (테스트/멀티 프로필용)
    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry, CoreError> {
        Entry::new(&self.service, ENTRY_NAME)
            .map_err(|e| CoreError::Storage(format!("키체인 엔트리 생성 실패: {e}")))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>, CoreError> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(secret) => {
                let credentials: Credentials = serde_json::from_str(&secret)?;
                debug!("키체인에서 자격증명 로드");
                Ok(Some(credentials))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CoreError::Storage(format!("키체인 조회 실패: {e}"))),
        }
    }

    async fn store(&self, credentials: &Credentials) -> Result<(), CoreError> {
        let entry = self.entry()?;
        let secret = serde_json::to_string(credentials)?;
        entry
            .set_password(&secret)
            .map_err(|e| CoreError::Storage(format!("키체인 저장 실패: {e}")))?;
        debug!("키체인에 자격증명 저장");
        Ok(())
    }

    async fn clear(&self) -> Result<(), CoreError> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CoreError::Storage(format!("키체인 삭제 실패: {e}"))),
        }
    }
}

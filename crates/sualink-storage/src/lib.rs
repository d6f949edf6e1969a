//! # sualink-storage
//!
//! 자격증명 저장소 어댑터.
//! `sualink-core`의 `CredentialStore` 포트를 OS 키체인(keyring)으로
//! 구현한다. 인증 연결 성공 후 기록되고, 세션 시작 시 읽힌다.

pub mod secret_store;

pub use secret_store::KeyringCredentialStore;

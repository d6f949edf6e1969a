//! # sualink-app
//!
//! SUALINK 클라이언트 바이너리 진입점.
//! DI 컨테이너 역할 — 어댑터를 생성해 세션 관리자에 와이어링하고,
//! 터미널 서브커맨드(watch / set-threshold / reset)를 제공한다.

mod notifier;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sualink_core::config::AppConfig;
use sualink_core::config_manager::ConfigManager;
use sualink_core::ports::credentials::CredentialStore;
use sualink_network::MqttTransport;
use sualink_session::{SessionManager, TelemetryReducer};
use sualink_storage::KeyringCredentialStore;

use crate::notifier::TerminalNotifier;

/// SUALINK 수액 모니터링 클라이언트
///
/// 브로커 구독으로 수액 텔레메트리를 실시간 관찰하고,
/// 인증 세션에서 장치 제어 명령을 발행한다.
#[derive(Parser, Debug)]
#[command(name = "sualink")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "warn")]
    log_level: String,

    /// 브로커 주소 재정의 (ws/wss/mqtt/mqtts URL)
    #[arg(long, short = 'b')]
    broker: Option<String>,

    /// 설정 파일 경로 재정의 (기본: 플랫폼 설정 디렉토리)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// 자격증명 인자 (서브커맨드 공통)
#[derive(clap::Args, Debug)]
struct CredentialArgs {
    /// 브로커 사용자 이름 (비우면 익명)
    #[arg(long, short = 'u', default_value = "")]
    username: String,

    /// 브로커 비밀번호
    #[arg(long, short = 'p', default_value = "")]
    password: String,

    /// OS 키체인에 저장된 자격증명 사용
    #[arg(long)]
    stored_credentials: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 실시간 텔레메트리 관찰 (Ctrl-C로 종료)
    Watch {
        /// 관찰 대상(환자) ID
        #[arg(long, short = 's')]
        subject: u32,

        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// 장치의 잔량 경고 임계값 변경 (인증 필요)
    SetThreshold {
        /// 관찰 대상(환자) ID
        #[arg(long, short = 's')]
        subject: u32,

        /// 새 임계값 (%) — [0, 100]
        #[arg(long, short = 'v')]
        value: f64,

        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// 장치 센서 리셋 (인증 필요)
    Reset {
        /// 관찰 대상(환자) ID
        #[arg(long, short = 's')]
        subject: u32,

        #[command(flatten)]
        credentials: CredentialArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = load_config(args.config.clone(), args.broker.clone())?;
    info!(broker = %config.broker.url, "설정 로드 완료");

    match args.command {
        Command::Watch {
            subject,
            credentials,
        } => run_watch(config, subject, credentials).await,
        Command::SetThreshold {
            subject,
            value,
            credentials,
        } => run_control(config, subject, credentials, ControlAction::Threshold(value)).await,
        Command::Reset {
            subject,
            credentials,
        } => run_control(config, subject, credentials, ControlAction::Reset).await,
    }
}

/// 로깅 초기화 — RUST_LOG가 있으면 그것을, 없으면 CLI 인자를 따른다.
/// 로그는 stderr로 보낸다 — stdout은 텔레메트리 렌더 전용.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// 설정 로드 — 파일 → `SUALINK_*` 환경변수 → CLI 인자 순으로 덮어쓴다
fn load_config(path: Option<PathBuf>, broker_override: Option<String>) -> Result<AppConfig> {
    let manager = match path {
        Some(path) => ConfigManager::with_path(path)?,
        None => ConfigManager::new()?,
    };

    let mut config = apply_env_overrides(manager.get())?;
    if let Some(url) = broker_override {
        config.broker.url = url;
    }
    Ok(config)
}

/// `SUALINK_*` 환경변수를 파일 설정 위에 오버레이.
///
/// 예: `SUALINK_BROKER__URL`, `SUALINK_BROKER__RECONNECT_PERIOD_MS`
fn apply_env_overrides(base: AppConfig) -> Result<AppConfig> {
    let layered = config::Config::builder()
        .add_source(config::Config::try_from(&base)?)
        .add_source(
            config::Environment::with_prefix("SUALINK")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("환경변수 설정 오버레이 실패")?;

    layered
        .try_deserialize()
        .context("설정 역직렬화 실패")
}

/// 자격증명 결정 — 명시 인자 > 키체인 > 익명
async fn resolve_credentials(
    args: &CredentialArgs,
    store: &dyn CredentialStore,
) -> Result<(String, String)> {
    if !args.username.is_empty() && !args.password.is_empty() {
        return Ok((args.username.clone(), args.password.clone()));
    }

    if args.stored_credentials {
        if let Some(credentials) = store.load().await? {
            return Ok((credentials.username, credentials.password));
        }
        bail!("키체인에 저장된 자격증명이 없습니다 — --username/--password로 로그인하세요");
    }

    // 익명 (읽기 전용)
    Ok((String::new(), String::new()))
}

/// 실시간 관찰 루프
async fn run_watch(config: AppConfig, subject: u32, credentials: CredentialArgs) -> Result<()> {
    let store: Arc<dyn CredentialStore> = Arc::new(KeyringCredentialStore::new());
    let (username, password) = resolve_credentials(&credentials, store.as_ref()).await?;

    let reducer = TelemetryReducer::new()
        .with_notifier(Arc::new(TerminalNotifier))
        .with_alerts_enabled(config.notification.low_level_alerts);
    let mut session = SessionManager::new(
        Arc::new(MqttTransport::new()),
        config.broker.clone(),
        reducer,
    )
    .with_credential_store(store);
    let mut status_rx = session.subscribe_status();

    session
        .connect(&username, &password, subject)
        .await
        .context("브로커 연결 실패")?;
    println!("{}", render::status_line(session.status()));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = session.tick() => {
                println!("{}", render::telemetry_line(&session.snapshot()));
            }
            changed = status_rx.changed() => {
                if changed.is_ok() {
                    println!("{}", render::status_line(*status_rx.borrow_and_update()));
                }
            }
        }
    }

    session.disconnect().await;
    println!("{}", render::status_line(session.status()));
    Ok(())
}

/// 단발 제어 명령
enum ControlAction {
    Threshold(f64),
    Reset,
}

/// 제어 명령 전송 — 인증 연결 후 발행하고 종료한다
async fn run_control(
    config: AppConfig,
    subject: u32,
    credentials: CredentialArgs,
    action: ControlAction,
) -> Result<()> {
    let store: Arc<dyn CredentialStore> = Arc::new(KeyringCredentialStore::new());
    let (username, password) = resolve_credentials(&credentials, store.as_ref()).await?;
    if username.is_empty() || password.is_empty() {
        bail!("제어 명령에는 자격증명이 필요합니다 — 익명 세션은 읽기 전용입니다");
    }

    let mut session = SessionManager::new(
        Arc::new(MqttTransport::new()),
        config.broker.clone(),
        TelemetryReducer::new(),
    )
    .with_credential_store(store);

    session
        .connect(&username, &password, subject)
        .await
        .context("브로커 연결 실패")?;

    let ok = match action {
        ControlAction::Threshold(value) => session.set_alert_threshold(value).await,
        ControlAction::Reset => session.set_reset(true).await,
    };

    session.disconnect().await;

    if ok {
        println!("제어 명령 전송 완료");
        Ok(())
    } else {
        bail!("제어 명령 전송 실패 — 세션 상태와 입력값을 확인하세요");
    }
}

//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버 설정값을 읽어오는 모듈입니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져옵니다.
//!
//! 설정 항목:
//! - `DATABASE_URL`: SQLite 데이터베이스 경로 (필수)
//! - `JWT_SECRET`: 인증 계층과 공유하는 JWT 서명 비밀키 (필수)
//! - `HOST`, `PORT`: 서버 바인딩 주소
//! - `GRACE_MS`: 늦은 답안 판정 시 네트워크 지연을 흡수하는 유예 시간
//! - `DEFAULT_QUESTION_DURATION_MS`: 문항에 제한 시간이 없을 때의 기본값
//! - `SCORE_BASE_POINTS`, `SCORE_MAX_RAPIDITY_BONUS`, `SCORE_MAX_TIME_PENALTY`: 채점 곡선
//! - `EVENT_CHANNEL_CAPACITY`: 방(room)마다 쌓아 둘 수 있는 이벤트 수

use std::env;
use std::str::FromStr;

use crate::services::scoring::ScoringConfig;
use crate::services::timers::MAX_DURATION_MS;

/// 유예 시간 상한 (1분)
const MAX_GRACE_MS: i64 = 60_000;

/// 애플리케이션 전체 설정을 담는 구조체
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 데이터베이스 파일 경로 (예: "sqlite:data/quizpulse.db")
    pub database_url: String,
    /// JWT 토큰 검증에 사용하는 비밀키
    pub jwt_secret: String,
    /// 서버가 바인딩할 호스트 주소 (기본값: "0.0.0.0")
    pub host: String,
    /// 서버 포트 번호 (기본값: 3000)
    pub port: u16,
    pub engine: EngineConfig,
}

/// 타이머/채점 엔진 설정. DB나 HTTP와 무관하므로 테스트에서 직접 만들어 씁니다.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub grace_ms: i64,
    pub default_duration_ms: i64,
    pub scoring: ScoringConfig,
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_ms: 500,
            default_duration_ms: 20_000,
            scoring: ScoringConfig::default(),
            event_channel_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// 잘못된 환경변수 값을 쓸 수 있는 범위로 맞춥니다.
    /// 유예 시간은 0 ~ 1분, 기본 제한 시간은 1ms ~ 24시간, 채널 용량은 최소 1입니다.
    pub fn sanitized(self) -> Self {
        Self {
            grace_ms: self.grace_ms.clamp(0, MAX_GRACE_MS),
            default_duration_ms: self.default_duration_ms.clamp(1, MAX_DURATION_MS),
            scoring: self.scoring.sanitized(),
            event_channel_capacity: self.event_channel_capacity.max(1),
        }
    }
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// # 에러
    /// `DATABASE_URL`과 `JWT_SECRET`은 필수이며, 없으면 에러가 발생합니다.
    /// 나머지 설정은 기본값이 있어 환경변수가 없거나 잘못되어도 동작합니다.
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = EngineConfig::default();
        let scoring = ScoringConfig {
            base_points: parse_or("SCORE_BASE_POINTS", defaults.scoring.base_points),
            max_rapidity_bonus: parse_or(
                "SCORE_MAX_RAPIDITY_BONUS",
                defaults.scoring.max_rapidity_bonus,
            ),
            max_time_penalty: parse_or(
                "SCORE_MAX_TIME_PENALTY",
                defaults.scoring.max_time_penalty,
            ),
            ..defaults.scoring
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("PORT", 3000),
            engine: EngineConfig {
                grace_ms: parse_or("GRACE_MS", defaults.grace_ms),
                default_duration_ms: parse_or(
                    "DEFAULT_QUESTION_DURATION_MS",
                    defaults.default_duration_ms,
                ),
                scoring,
                event_channel_capacity: parse_or(
                    "EVENT_CHANNEL_CAPACITY",
                    defaults.event_channel_capacity,
                ),
            }
            .sanitized(),
        })
    }
}

/// 환경변수를 읽어 파싱하고, 없거나 파싱에 실패하면 기본값을 씁니다.
///
/// 제네릭 `T: FromStr`: `"3000".parse::<u16>()`처럼 문자열에서 만들 수 있는 모든 타입에 동작합니다.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

//! 요청 전처리 계층. 현재는 JWT 인증 추출기(`AuthUser`)만 있습니다.

pub mod auth;

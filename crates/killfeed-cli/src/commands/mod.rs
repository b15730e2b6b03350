//! CLI 명령어 구현 모듈.

pub mod publish;
pub mod tail;

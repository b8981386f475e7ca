//! ProjectRoom 채팅 서버
//!
//! 프로젝트 단위 실시간 채팅방, 최근 기록, 개인 메시지, 그리고
//! 캐시와 분산 잠금으로 보호되는 AI 어시스턴트를 제공한다.

pub mod ai;
pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod history;
pub mod presence;
pub mod projects;
pub mod protocol;
pub mod server;
pub mod state;
pub mod store;

#[cfg(test)]
mod test_support;

//! 핸들러 모듈

pub mod assistant;
pub mod connection;
pub mod direct;
pub mod room;

pub use connection::*;
pub use direct::*;
pub use room::*;

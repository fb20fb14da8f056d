//! 配置管理
//!
//! 默认值 → TOML 文件 → 环境变量，加载后统一校验。

pub mod models;

pub use models::*;

use thiserror::Error;

/// Reel生命周期引擎的统一错误类型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReelError {
    #[error("数据验证失败: {0}")]
    Validation(String),
    #[error("Reel未找到: {id}")]
    ReelNotFound { id: String },
    #[error("非法的状态转换: Reel {id} 从 {from} 到 {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },
    #[error("发布暂时失败: {0}")]
    PublishTransient(String),
    #[error("发布重试已耗尽: Reel {id} 已尝试 {attempts} 次")]
    PublishExhausted { id: String, attempts: u32 },
    #[error("发布超时: {0}")]
    PublishTimeout(String),
    #[error("存储错误: {0}")]
    Storage(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("导出失败: {0}")]
    Export(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type ReelResult<T> = Result<T, ReelError>;

impl ReelError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::ReelNotFound { id: id.into() }
    }
    pub fn invalid_transition<I, F, T>(id: I, from: F, to: T) -> Self
    where
        I: Into<String>,
        F: ToString,
        T: ToString,
    {
        Self::InvalidTransition {
            id: id.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }
    pub fn export<S: Into<String>>(msg: S) -> Self {
        Self::Export(msg.into())
    }
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReelError::Internal(_) | ReelError::Configuration(_) | ReelError::PublishExhausted { .. }
        )
    }
    /// 发布侧的暂时性错误与存储错误可以重试，业务规则错误不可以
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReelError::PublishTransient(_) | ReelError::PublishTimeout(_) | ReelError::Storage(_)
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            ReelError::Validation(_) => "请填写 niche 和 product 后再生成",
            ReelError::ReelNotFound { .. } => "请求的Reel不存在",
            ReelError::InvalidTransition { .. } => "当前状态不允许该操作",
            ReelError::PublishExhausted { .. } => "发布多次失败，需要手动处理",
            ReelError::PublishTransient(_) | ReelError::PublishTimeout(_) => {
                "发布暂时失败，系统将自动重试"
            }
            ReelError::Storage(_) => "数据保存失败，请稍后重试",
            ReelError::Export(_) => "导出失败",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for ReelError {
    fn from(err: serde_json::Error) -> Self {
        ReelError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for ReelError {
    fn from(err: anyhow::Error) -> Self {
        ReelError::Internal(err.to_string())
    }
}

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 试卷生成错误
    #[error("生成错误: {0}")]
    Generation(#[from] GenerationError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// API 返回非成功状态码
    #[error("API返回错误状态 ({endpoint}): HTTP {status} - {body}")]
    BadStatus {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// JSON 解析失败
    #[error("API响应解析失败 ({endpoint}): {source}")]
    JsonParseFailed {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    /// API 返回空结果
    #[error("API返回空结果: {endpoint}")]
    EmptyResponse { endpoint: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 回复格式不符合预期
    #[error("无法从LLM回复中解析{expected} (回复: {reply})")]
    MalformedReply { expected: String, reply: String },
}

/// 试卷生成错误
#[derive(Debug, Error)]
pub enum GenerationError {
    /// 运行以失败状态结束
    #[error("生成运行以 {status} 状态结束")]
    RunFailed { status: String },
    /// 运行超过最大等待时间
    #[error("生成运行超过 {seconds} 秒未结束")]
    RunTimedOut { seconds: u64 },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 缺少必需的 API 密钥
    #[error("缺少 API 密钥 (环境变量 {var_name})")]
    MissingApiKey { var_name: String },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

// ========== 从常见错误类型转换 ==========
// 注意：不需要手动实现 From<AppError> for anyhow::Error，
// 因为 anyhow 已经为所有实现了 std::error::Error 的类型提供了自动实现

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            endpoint: String::new(), // 解析错误通常不携带端点信息
            source: err,
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source,
        })
    }

    /// 创建API错误状态错误
    pub fn api_bad_status(endpoint: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        AppError::Api(ApiError::BadStatus {
            endpoint: endpoint.into(),
            status,
            body: body.into(),
        })
    }

    /// 创建API响应解析错误
    pub fn api_json_failed(endpoint: impl Into<String>, source: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            endpoint: endpoint.into(),
            source,
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 创建LLM回复格式错误
    pub fn llm_malformed_reply(expected: impl Into<String>, reply: &str) -> Self {
        AppError::Llm(LlmError::MalformedReply {
            expected: expected.into(),
            reply: crate::utils::logging::truncate_text(reply, 200),
        })
    }

    /// 创建生成运行失败错误
    pub fn run_failed(status: impl Into<String>) -> Self {
        AppError::Generation(GenerationError::RunFailed {
            status: status.into(),
        })
    }

    /// 创建生成运行超时错误
    pub fn run_timed_out(seconds: u64) -> Self {
        AppError::Generation(GenerationError::RunTimedOut { seconds })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

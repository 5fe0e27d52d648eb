//! 配置系统
//! 从默认值和环境变量加载所有配置（前缀 EXCEL_，容器约定的 PORT 单独处理）

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::net::SocketAddr;

/// 厂商图片服务器的默认地址
pub const DEFAULT_IMAGE_BASE_URL: &str =
    "https://mb-lightingsolutions.com/wp-content/uploads/2025/11/";

/// URL 模板中的货号占位符
pub const SKU_PLACEHOLDER: &str = "{sku}";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:8080"
    pub addr: String,
    /// 工作线程数
    pub workers: usize,
    /// 单个请求的超时时间（秒）
    pub request_timeout_secs: u64,
    /// 请求体上限（字节），base64 编码后的 Excel 会比原文件大约三分之一
    pub max_body_bytes: usize,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// 图片服务器基础 URL
    pub base_url: String,
    /// 依次尝试的文件名模板，{sku} 会被替换为货号
    pub url_patterns: Vec<String>,
    /// 单次下载超时（秒）
    pub fetch_timeout_secs: u64,
    /// 同一请求内并发下载数
    pub concurrency: usize,
    /// 压缩后的最大宽度（像素）
    pub max_width: u32,
    /// 压缩后的最大高度（像素）
    pub max_height: u32,
    /// JPEG 质量 1-100
    pub quality: u8,
    /// 嵌入 Excel 时的显示宽度（像素）
    pub display_width: u32,
    /// 嵌入 Excel 时的显示高度（像素）
    pub display_height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub images: ImageConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:8080")?
            .set_default("server.workers", 2)?
            .set_default("server.request_timeout_secs", 120)?
            .set_default("server.max_body_bytes", 50 * 1024 * 1024)?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("images.base_url", DEFAULT_IMAGE_BASE_URL)?
            .set_default(
                "images.url_patterns",
                vec![
                    "{sku}_1.jpg",
                    "thumbnail_{sku}_1.jpg",
                    "thumbnail_{sku}_1-scaled.jpg",
                    "{sku}_3-scaled.jpg",
                ],
            )?
            .set_default("images.fetch_timeout_secs", 10)?
            .set_default("images.concurrency", 4)?
            .set_default("images.max_width", 150)?
            .set_default("images.max_height", 150)?
            .set_default("images.quality", 75)?
            .set_default("images.display_width", 100)?
            .set_default("images.display_height", 100)?;

        // 从环境变量加载配置（前缀为 EXCEL_）
        settings = settings.add_source(
            Environment::with_prefix("EXCEL")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("images.url_patterns")
                .try_parsing(true),
        );

        let mut config: AppConfig = settings.build()?.try_deserialize()?;

        // 容器平台通常只注入 PORT
        if let Ok(port) = std::env::var("PORT") {
            config.server.apply_port(&port)?;
        }

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    fn validate(&self) -> Result<(), ConfigError> {
        // 验证监听地址
        let addr: SocketAddr = self.server.addr.parse().map_err(|_| {
            ConfigError::Message(format!("Invalid server address: {}", self.server.addr))
        })?;
        if addr.port() == 0 {
            return Err(ConfigError::Message("Server port must not be 0".to_string()));
        }

        if self.server.workers == 0 || self.server.workers > 64 {
            return Err(ConfigError::Message(
                "workers must be between 1 and 64".to_string(),
            ));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        self.images.validate()
    }
}

impl ServerConfig {
    /// 用 PORT 覆盖监听地址中的端口，保留主机部分
    fn apply_port(&mut self, port: &str) -> Result<(), ConfigError> {
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::Message(format!("Invalid PORT: {}", port)))?;
        let host = self
            .addr
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or("0.0.0.0");
        self.addr = format!("{}:{}", host, port);
        Ok(())
    }
}

impl ImageConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url_patterns.is_empty() {
            return Err(ConfigError::Message(
                "images.url_patterns must not be empty".to_string(),
            ));
        }

        if let Some(pattern) = self
            .url_patterns
            .iter()
            .find(|p| !p.contains(SKU_PLACEHOLDER))
        {
            return Err(ConfigError::Message(format!(
                "URL pattern '{}' does not contain {}",
                pattern, SKU_PLACEHOLDER
            )));
        }

        if self.concurrency == 0 {
            return Err(ConfigError::Message(
                "images.concurrency must be > 0".to_string(),
            ));
        }

        if self.quality == 0 || self.quality > 100 {
            return Err(ConfigError::Message(
                "images.quality must be between 1 and 100".to_string(),
            ));
        }

        if self.max_width == 0
            || self.max_height == 0
            || self.display_width == 0
            || self.display_height == 0
        {
            return Err(ConfigError::Message(
                "image dimensions must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "PORT",
            "EXCEL_SERVER__ADDR",
            "EXCEL_SERVER__WORKERS",
            "EXCEL_LOGGING__LEVEL",
            "EXCEL_IMAGES__URL_PATTERNS",
            "EXCEL_IMAGES__QUALITY",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env();

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.server.addr, "0.0.0.0:8080");
        assert_eq!(config.server.workers, 2);
        assert_eq!(config.server.request_timeout_secs, 120);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.images.base_url, DEFAULT_IMAGE_BASE_URL);
        assert_eq!(config.images.url_patterns.len(), 4);
        assert_eq!(config.images.url_patterns[0], "{sku}_1.jpg");
        assert_eq!(config.images.quality, 75);
    }

    #[test]
    #[serial]
    fn test_port_overrides_addr() {
        clear_env();
        std::env::set_var("PORT", "9090");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.server.addr, "0.0.0.0:9090");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_port_rejected() {
        clear_env();
        std::env::set_var("PORT", "http");

        assert!(AppConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_url_patterns_from_env() {
        clear_env();
        std::env::set_var("EXCEL_IMAGES__URL_PATTERNS", "{sku}.png,big_{sku}.png");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.images.url_patterns, vec!["{sku}.png", "big_{sku}.png"]);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_pattern_without_placeholder_rejected() {
        clear_env();
        std::env::set_var("EXCEL_IMAGES__URL_PATTERNS", "static.jpg");

        assert!(AppConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_validation_invalid_log_level() {
        clear_env();
        std::env::set_var("EXCEL_LOGGING__LEVEL", "invalid");

        assert!(AppConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_validation_invalid_workers() {
        clear_env();
        std::env::set_var("EXCEL_SERVER__WORKERS", "0");

        assert!(AppConfig::from_env().is_err());

        clear_env();
    }
}

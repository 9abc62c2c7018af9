use crate::domain::port::{LogLevel, Logger};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// ログエントリ
/// 構造化ログの基本構造を定義
/// アダプター層の実装詳細として配置
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub correlation_id: Option<Uuid>,
    pub component: String,
    pub additional_context: HashMap<String, String>,
}

impl LogEntry {
    /// 新しいログエントリを作成
    pub fn new(level: LogLevel, message: String, component: String) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message,
            correlation_id: None,
            component,
            additional_context: HashMap::new(),
        }
    }

    /// 相関IDを設定
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// 追加コンテキストを設定
    pub fn with_context(mut self, context: HashMap<String, String>) -> Self {
        self.additional_context = context;
        self
    }

    /// ログエントリを文字列として出力
    pub fn format(&self) -> String {
        let level_str = match self.level {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        };

        let mut parts = vec![
            format!("[{}]", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")),
            format!("[{}]", level_str),
            format!("[{}]", self.component),
        ];

        if let Some(correlation_id) = self.correlation_id {
            parts.push(format!("[correlation_id: {}]", correlation_id));
        }

        parts.push(self.message.clone());

        // 追加コンテキストがある場合は追加
        if !self.additional_context.is_empty() {
            let context_str = self
                .additional_context
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("[{}]", context_str));
        }

        parts.join(" ")
    }
}

/// コンソールログ実装
/// 標準出力・標準エラー出力にログを出力する
pub struct ConsoleLogger;

impl ConsoleLogger {
    pub fn new() -> Self {
        Self
    }

    fn emit(
        &self,
        level: LogLevel,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        let mut entry = LogEntry::new(level, message.to_string(), component.to_string());
        if let Some(correlation_id) = correlation_id {
            entry = entry.with_correlation_id(correlation_id);
        }
        if let Some(context) = context {
            entry = entry.with_context(context);
        }

        match level {
            LogLevel::Warning | LogLevel::Error => eprintln!("{}", entry.format()),
            _ => println!("{}", entry.format()),
        }
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for ConsoleLogger {
    fn debug(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(LogLevel::Debug, component, message, correlation_id, context);
    }

    fn info(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(LogLevel::Info, component, message, correlation_id, context);
    }

    fn warn(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(
            LogLevel::Warning,
            component,
            message,
            correlation_id,
            context,
        );
    }

    fn error(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    ) {
        self.emit(LogLevel::Error, component, message, correlation_id, context);
    }
}

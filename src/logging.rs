//! 日志初始化与注入式事件日志。

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 初始化 tracing 日志订阅与默认过滤规则。
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// 核心处理器使用的日志协作者，由调用方在构造时注入。
pub trait EventLog: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
}

/// 转发到 tracing 的默认实现。
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLog;

impl EventLog for TracingLog {
    fn info(&self, message: &str) {
        tracing::info!(target: "ota_file_server::core", "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "ota_file_server::core", "{message}");
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::EventLog;

    /// 记录所有日志行，供测试断言。
    #[derive(Debug, Default)]
    pub struct RecordingLog {
        pub lines: Mutex<Vec<String>>,
    }

    impl RecordingLog {
        pub fn warnings(&self) -> Vec<String> {
            self.lines
                .lock()
                .expect("log lock")
                .iter()
                .filter_map(|line| line.strip_prefix("WARN ").map(str::to_string))
                .collect()
        }
    }

    impl EventLog for RecordingLog {
        fn info(&self, message: &str) {
            self.lines
                .lock()
                .expect("log lock")
                .push(format!("INFO {message}"));
        }

        fn warn(&self, message: &str) {
            self.lines
                .lock()
                .expect("log lock")
                .push(format!("WARN {message}"));
        }
    }
}

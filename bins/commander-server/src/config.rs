use std::collections::BTreeMap;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use efd_reports::{ActuatorTable, Dashboard, ForceActuator, default_dashboards};

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "commander-server", about = "HTTP gateway для команд компонентов и запросов к EFD")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить gateway
    Serve(ServeArgs),
    /// Проверить конфиг и вывести итоговые настройки
    CheckConfig(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = "config.toml", env = "COMMANDER_CONFIG")]
    pub config: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct MiddlewareConfig {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct DataInstanceConfig {
    pub name: String,
    pub url: String,
}

/// Каталог интерфейсов компонентов (`/salinfo/*`).
#[derive(Debug, Default, Deserialize)]
pub struct SalinfoConfig {
    /// Сколько компонентов из каталога middleware загружать; без лимита все.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Отчёты (`/reports/*`).
#[derive(Debug, Deserialize)]
pub struct ReportsConfig {
    /// `data instance → dashboard` для ссылок на bump-тесты.
    #[serde(default = "default_dashboards")]
    pub dashboards: BTreeMap<String, Dashboard>,
    /// Геометрия силовых актуаторов M1M3.
    #[serde(default)]
    pub m1m3_actuators: Vec<ForceActuator>,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self { dashboards: default_dashboards(), m1m3_actuators: Vec::new() }
    }
}

impl ReportsConfig {
    pub fn actuator_table(&self) -> ActuatorTable {
        self.m1m3_actuators.iter().copied().collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Бюджет на подключение клиента, секунды.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Дедлайн подтверждения команды, секунды (5..=10).
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout_secs: u64,
    #[serde(default = "default_log_cap")]
    pub log_cap: usize,
    /// Каталог data instance'ов. Без него список берётся из `data_instances`.
    #[serde(default)]
    pub directory_url: Option<String>,
    pub middleware: MiddlewareConfig,
    #[serde(default)]
    pub data_instances: Vec<DataInstanceConfig>,
    #[serde(default)]
    pub salinfo: SalinfoConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
}

fn default_api_port() -> u16 {
    8080
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_ack_timeout() -> u64 {
    5
}
fn default_log_cap() -> usize {
    100
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content).map_err(|e| match e {
            ServerError::Config { context, detail } => ServerError::Config { context, detail: format!("'{path}': {detail}") },
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, ServerError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::Config { context: "parse", detail: e.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ServerError> {
        let invalid = |detail: String| ServerError::Config { context: "validate", detail };
        if self.connect_timeout_secs == 0 {
            return Err(invalid("connect_timeout_secs must be positive".into()));
        }
        if !(5..=10).contains(&self.ack_timeout_secs) {
            return Err(invalid(format!("ack_timeout_secs must be within 5..=10, got {}", self.ack_timeout_secs)));
        }
        if self.log_cap == 0 {
            return Err(invalid("log_cap must be positive".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for instance in &self.data_instances {
            if !seen.insert(instance.name.as_str()) {
                return Err(invalid(format!("duplicate data instance '{}'", instance.name)));
            }
        }
        if self.salinfo.limit == Some(0) {
            return Err(invalid("salinfo.limit must be positive".into()));
        }
        let mut ids = std::collections::HashSet::new();
        for actuator in &self.reports.m1m3_actuators {
            if !ids.insert(actuator.id) {
                return Err(invalid(format!("duplicate force actuator {}", actuator.id)));
            }
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }

    /// `name → url` для коннектора data instance'ов.
    pub fn instance_urls(&self) -> BTreeMap<String, String> {
        self.data_instances.iter().map(|i| (i.name.clone(), i.url.clone())).collect()
    }
}

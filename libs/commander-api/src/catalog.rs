use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Префикс служебных полей topic'а, которые не показываются клиентам.
pub const PRIVATE_FIELD_PREFIX: &str = "private_";

/// Описание одного поля topic'а из интерфейса компонента.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub units: String,
    pub type_name: String,
}

/// Поля topic'а: `field → FieldInfo`.
pub type TopicFields = BTreeMap<String, FieldInfo>;

/// Категория topic'а в интерфейсе компонента.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TopicCategory {
    Telemetry,
    Event,
    Command,
}

impl TopicCategory {
    pub const ALL: [TopicCategory; 3] = [TopicCategory::Telemetry, TopicCategory::Event, TopicCategory::Command];

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicCategory::Telemetry => "telemetry",
            TopicCategory::Event => "event",
            TopicCategory::Command => "command",
        }
    }

    /// Ключ списка имён в ответе (`telemetry_names`, ...).
    pub fn names_key(&self) -> String {
        format!("{}_names", self.as_str())
    }

    /// Ключ описаний в ответе (`telemetry_data`, ...).
    pub fn data_key(&self) -> String {
        format!("{}_data", self.as_str())
    }

    /// Разобрать список вида `telemetry-event`. Неизвестные имена
    /// пропускаются; пустой результат означает все категории.
    pub fn parse_list(input: &str) -> Vec<TopicCategory> {
        let mut picked: Vec<TopicCategory> = input
            .split('-')
            .filter_map(|name| TopicCategory::ALL.into_iter().find(|c| c.as_str() == name))
            .collect();
        picked.sort();
        picked.dedup();
        if picked.is_empty() {
            TopicCategory::ALL.to_vec()
        } else {
            picked
        }
    }
}

impl std::fmt::Display for TopicCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Версии интерфейса компонента.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    pub sal_version: String,
    pub xml_version: String,
}

/// Интерфейс компонента: версии и topic'и по категориям.
///
/// Ключи topic'ов без префиксов (`position`, а не `logevent_position`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSchema {
    pub name: String,
    #[serde(flatten)]
    pub metadata: ComponentMetadata,
    #[serde(default)]
    pub telemetry: BTreeMap<String, TopicFields>,
    #[serde(default)]
    pub events: BTreeMap<String, TopicFields>,
    #[serde(default)]
    pub commands: BTreeMap<String, TopicFields>,
}

impl ComponentSchema {
    pub fn topics(&self, category: TopicCategory) -> &BTreeMap<String, TopicFields> {
        match category {
            TopicCategory::Telemetry => &self.telemetry,
            TopicCategory::Event => &self.events,
            TopicCategory::Command => &self.commands,
        }
    }

    pub fn topic_names(&self, category: TopicCategory) -> Vec<String> {
        self.topics(category).keys().cloned().collect()
    }

    /// Описания topic'ов категории без служебных полей.
    pub fn public_topics(&self, category: TopicCategory) -> BTreeMap<String, TopicFields> {
        self.topics(category)
            .iter()
            .map(|(topic, fields)| {
                let public = fields
                    .iter()
                    .filter(|(name, _)| !name.starts_with(PRIVATE_FIELD_PREFIX))
                    .map(|(name, info)| (name.clone(), info.clone()))
                    .collect();
                (topic.clone(), public)
            })
            .collect()
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use commander_api::TopicRef;

/// Ключ уровня индексов: числовое значение и текст ключа, как его
/// прислал клиент.
///
/// `"1"` и `"01"` адресуют один индекс, но остаются разными узлами
/// дерева и дают разные `sourceId`. Порядок: по значению, затем по тексту.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexKey {
    value: u32,
    text: String,
}

impl IndexKey {
    pub fn new(value: u32) -> Self {
        Self { value, text: value.to_string() }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl std::str::FromStr for IndexKey {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let value = text
            .parse::<u32>()
            .map_err(|_| format!("index '{text}' is not a non-negative integer"))?;
        Ok(Self { value, text: text.to_string() })
    }
}

impl<'de> Deserialize<'de> for IndexKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Дерево источников запроса: `component → index → topic → [field]`.
///
/// Индексы приходят ключами JSON-объекта и должны парситься как
/// неотрицательные целые. Обход идёт в отсортированном порядке ключей
/// на каждом уровне.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SourceTree(BTreeMap<String, BTreeMap<IndexKey, BTreeMap<String, Vec<String>>>>);

impl SourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        component: impl Into<String>,
        index: u32,
        topic: impl Into<String>,
        fields: Vec<String>,
    ) {
        self.0
            .entry(component.into())
            .or_default()
            .entry(IndexKey::new(index))
            .or_default()
            .insert(topic.into(), fields);
    }

    pub fn with(mut self, component: &str, index: u32, topic: &str, fields: &[&str]) -> Self {
        self.insert(component, index, topic, fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Число topic-узлов (= число задач).
    pub fn topic_count(&self) -> usize {
        self.0.values().flat_map(|by_index| by_index.values()).map(|topics| topics.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.topic_count() == 0
    }

    /// Развернуть дерево в задачи, по одной на topic-узел.
    pub fn expand(&self) -> Vec<QueryTask> {
        let mut tasks = Vec::with_capacity(self.topic_count());
        for (component, by_index) in &self.0 {
            for (index, topics) in by_index {
                for (topic, fields) in topics {
                    tasks.push(QueryTask {
                        source_id: format!("{component}-{}-{topic}", index.as_str()),
                        topic: TopicRef {
                            component: component.clone(),
                            index: index.value(),
                            topic: topic.clone(),
                        },
                        fields: fields.clone(),
                    });
                }
            }
        }
        tasks
    }
}

/// Запрос к одному topic'у. Окно и режим общие для всего batch'а.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTask {
    /// `{component}-{index}-{topic}`, индекс в тексте запроса.
    pub source_id: String,
    pub topic: TopicRef,
    pub fields: Vec<String>,
}

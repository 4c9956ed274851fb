use std::collections::BTreeMap;

use serde::Deserialize;

/// Силовой актуатор M1M3: идентификатор и индексы в массивах telemetry.
///
/// `x_index`/`y_index`/`s_index` есть только у актуаторов с
/// соответствующей осью; `s_index` также означает, что у актуатора есть
/// вторичный цилиндр и вторичный bump-тест.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ForceActuator {
    pub id: u32,
    pub index: usize,
    #[serde(default)]
    pub x_index: Option<usize>,
    #[serde(default)]
    pub y_index: Option<usize>,
    #[serde(default)]
    pub s_index: Option<usize>,
}

impl ForceActuator {
    pub fn primary_field(&self) -> String {
        format!("primaryTest{}", self.index)
    }

    pub fn secondary_field(&self) -> Option<String> {
        self.s_index.map(|i| format!("secondaryTest{i}"))
    }

    /// Значение переменной оси на dashboard'е: id актуатора или 0 без оси.
    pub(crate) fn axis_var(&self, axis: Option<usize>) -> u32 {
        if axis.is_some() { self.id } else { 0 }
    }
}

/// Таблица актуаторов по id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActuatorTable(BTreeMap<u32, ForceActuator>);

impl ActuatorTable {
    pub fn get(&self, id: u32) -> Option<&ForceActuator> {
        self.0.get(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ForceActuator> for ActuatorTable {
    fn from_iter<I: IntoIterator<Item = ForceActuator>>(iter: I) -> Self {
        Self(iter.into_iter().map(|fa| (fa.id, fa)).collect())
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::actuator::ForceActuator;

/// Dashboard bump-тестов одного сайта: `https://{domain}{path}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Dashboard {
    pub domain: String,
    pub path: String,
}

impl Dashboard {
    pub fn new(domain: impl Into<String>, path: impl Into<String>) -> Self {
        Self { domain: domain.into(), path: path.into() }
    }

    /// Ссылка на dashboard, остановленный на интервале теста.
    pub fn bump_test_url(&self, actuator: &ForceActuator, start: &DateTime<Utc>, end: &DateTime<Utc>) -> String {
        let params = [
            ("refresh", "Paused".to_string()),
            ("tempVars[x_index]", actuator.axis_var(actuator.x_index).to_string()),
            ("tempVars[y_index]", actuator.axis_var(actuator.y_index).to_string()),
            ("tempVars[z_index]", actuator.id.to_string()),
            ("tempVars[s_index]", actuator.axis_var(actuator.s_index).to_string()),
            ("lower", format!("{}Z", isot(start))),
            ("upper", format!("{}Z", isot(end))),
        ];
        let query: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        format!("https://{}{}?{}", self.domain, self.path, query.join("&"))
    }
}

/// ISO-время с миллисекундами без зоны: `2023-06-01T12:00:00.000`.
pub fn isot(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Dashboard'ы по умолчанию для известных data instance'ов.
pub fn default_dashboards() -> BTreeMap<String, Dashboard> {
    BTreeMap::from([
        (
            "summit_efd".to_string(),
            Dashboard::new("summit-lsp.lsst.codes", "/chronograf/sources/1/dashboards/199"),
        ),
        (
            "usdf_efd".to_string(),
            Dashboard::new("usdf-rsp.slac.stanford.edu", "/chronograf/sources/1/dashboards/61"),
        ),
    ])
}

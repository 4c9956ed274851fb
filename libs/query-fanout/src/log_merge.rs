use std::collections::{BTreeMap, HashSet};

use commander_api::{LogRow, SortOrder};

use crate::record::LogRecord;

/// Сколько записей лога оставлять по умолчанию.
pub const DEFAULT_LOG_CAP: usize = 100;

/// Слить логи всех источников с глобальным лимитом.
///
/// Каждая запись получает сквозной id в порядке перечисления
/// источников. Все записи сортируются по времени (`order`, при равенстве
/// по id), остаются первые `cap`. Внутри источника сохраняются только
/// оставшиеся записи в их исходном порядке; id в ответ не попадает.
pub fn capped_merge(
    batches: Vec<(String, Vec<LogRow>)>,
    cap: usize,
    order: SortOrder,
) -> BTreeMap<String, Vec<LogRecord>> {
    let mut next_id = 0u64;
    let mut numbered: Vec<(String, Vec<(u64, LogRow)>)> = Vec::with_capacity(batches.len());
    for (source_id, rows) in batches {
        let mut with_ids = Vec::with_capacity(rows.len());
        for row in rows {
            with_ids.push((next_id, row));
            next_id += 1;
        }
        numbered.push((source_id, with_ids));
    }

    let mut ranking: Vec<_> = numbered
        .iter()
        .flat_map(|(_, rows)| rows.iter().map(|(id, row)| (row.ts, *id)))
        .collect();
    match order {
        SortOrder::Desc => ranking.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1))),
        SortOrder::Asc => ranking.sort_unstable(),
    }
    ranking.truncate(cap);
    let kept: HashSet<u64> = ranking.into_iter().map(|(_, id)| id).collect();

    numbered
        .into_iter()
        .map(|(source_id, rows)| {
            let records = rows
                .into_iter()
                .filter(|(id, _)| kept.contains(id))
                .map(|(_, row)| LogRecord::from(row))
                .collect();
            (source_id, records)
        })
        .collect()
}

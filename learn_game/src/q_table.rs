use crate::board::{GameState, NUM_CELLS};
use crate::error::LearnError;
use chrono::NaiveDate;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, prelude::*, BufReader, BufWriter};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

/// One value per board cell, including cells that are currently occupied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QValues {
    values: [f64; NUM_CELLS],
}

/// Sparse mapping from visited states to their action values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QTable {
    qtable: HashMap<GameState, QValues>,
}

impl Deref for QValues {
    type Target = [f64; NUM_CELLS];
    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl DerefMut for QValues {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.values
    }
}

impl From<[f64; NUM_CELLS]> for QValues {
    fn from(values: [f64; NUM_CELLS]) -> Self {
        QValues { values }
    }
}

impl QValues {
    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&value| value == 0.0)
    }
}

impl Deref for QTable {
    type Target = HashMap<GameState, QValues>;
    fn deref(&self) -> &Self::Target {
        &self.qtable
    }
}

impl DerefMut for QTable {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.qtable
    }
}

impl QTable {
    pub fn new() -> Self {
        QTable {
            qtable: HashMap::with_capacity(6_000),
        }
    }

    /// The values for `state`, inserting an all-zero row on first visit.
    pub fn values_mut(&mut self, state: &GameState) -> &mut QValues {
        self.qtable.entry(*state).or_default()
    }

    /// Up to `n` states with at least one non-zero value, ordered by key.
    pub fn non_zero_samples(&self, n: usize) -> Vec<(GameState, QValues)> {
        let mut samples: Vec<(GameState, QValues)> = self
            .qtable
            .iter()
            .filter(|(_, values)| !values.is_zero())
            .map(|(state, values)| (*state, *values))
            .collect();
        samples.sort_by_key(|(state, _)| state.to_state_key());
        samples.truncate(n);
        samples
    }
}

impl Serialize for QTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.qtable.len()))?;
        for (state, values) in &self.qtable {
            map.serialize_entry(&state.to_state_key(), values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for QTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct QTableVisitor;

        impl<'de> Visitor<'de> for QTableVisitor {
            type Value = QTable;
            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map from 9-cell state keys to 9 action values")
            }
            fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut qtable = HashMap::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, values)) = access.next_entry::<String, QValues>()? {
                    let state: GameState = key.parse().map_err(de::Error::custom)?;
                    qtable.insert(state, values);
                }
                Ok(QTable { qtable })
            }
        }

        deserializer.deserialize_map(QTableVisitor)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Date-stamped file in `dir`, e.g. `q_table_archive/qtable-2024-10-19.pickle`.
pub fn archive_path(dir: &Path, today: NaiveDate) -> PathBuf {
    let filename = "qtable-".to_owned() + &today.to_string() + ".pickle";
    dir.join(filename)
}

/// Writes the whole table to `path`, as JSON when the extension is `.json`
/// and as a pickle otherwise. Missing parent directories are created.
pub fn q_table_to_disk(path: &Path, q: &QTable) -> Result<(), LearnError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    if is_json(path) {
        serde_json::to_writer(&mut writer, q).map_err(io::Error::from)?;
    } else {
        serde_pickle::to_writer(&mut writer, q, serde_pickle::SerOptions::new())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    }
    writer.flush()?;
    log::info!("{:<32}{:<32}", "saved q-table", path.display());
    Ok(())
}

/// Reads a table written by [`q_table_to_disk`].
pub fn q_table_from_disk(path: &Path) -> Result<QTable, LearnError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LearnError::PersistenceNotFound(path.to_path_buf()),
        _ => LearnError::Io(e),
    })?;
    let mut buf: Vec<u8> = vec![];
    BufReader::new(file).read_to_end(&mut buf)?;
    let corrupt = |reason: String| LearnError::PersistenceCorrupt {
        path: path.to_path_buf(),
        reason,
    };
    let q: QTable = if is_json(path) {
        serde_json::from_slice(&buf).map_err(|e| corrupt(e.to_string()))?
    } else {
        serde_pickle::from_slice(&buf, serde_pickle::DeOptions::new())
            .map_err(|e| corrupt(e.to_string()))?
    };
    log::info!("{:<32}{:<32}", "loaded q-table", path.display());
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> QTable {
        let mut q = QTable::new();
        *q.values_mut(&GameState::new()) =
            QValues::from([0.1, -0.25, 0.0, 1.0 / 3.0, 0.5, 0.0, -1.0, 0.05, 1e-9]);
        let state: GameState = "X---O----".parse().unwrap();
        q.values_mut(&state)[8] = 0.271;
        q.values_mut(&"XO-------".parse().unwrap());
        q
    }

    #[test]
    fn unseen_state_starts_at_zero() {
        let mut q = QTable::new();
        let state: GameState = "X--------".parse().unwrap();
        assert!(q.get(&state).is_none());
        assert!(q.values_mut(&state).is_zero());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn pickle_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("q_table.pickle");
        let q = sample_table();
        q_table_to_disk(&path, &q).unwrap();
        assert_eq!(q_table_from_disk(&path).unwrap(), q);
    }

    #[test]
    fn json_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q_table.json");
        let q = sample_table();
        q_table_to_disk(&path, &q).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"X---O----\""));
        assert_eq!(q_table_from_disk(&path).unwrap(), q);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.pickle");
        assert!(matches!(
            q_table_from_disk(&path),
            Err(LearnError::PersistenceNotFound(p)) if p == path
        ));
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let pickle = dir.path().join("garbage.pickle");
        fs::write(&pickle, b"definitely not a pickle").unwrap();
        assert!(matches!(
            q_table_from_disk(&pickle),
            Err(LearnError::PersistenceCorrupt { .. })
        ));
        let json = dir.path().join("bad_key.json");
        fs::write(&json, r#"{"XX": [0,0,0,0,0,0,0,0,0]}"#).unwrap();
        assert!(matches!(
            q_table_from_disk(&json),
            Err(LearnError::PersistenceCorrupt { .. })
        ));
    }

    #[test]
    fn samples_skip_all_zero_rows() {
        let q = sample_table();
        let samples = q.non_zero_samples(5);
        let keys: Vec<String> = samples.iter().map(|(s, _)| s.to_state_key()).collect();
        assert_eq!(keys, vec!["---------", "X---O----"]);
        assert_eq!(q.non_zero_samples(1).len(), 1);
    }

    #[test]
    fn archive_path_is_date_stamped() {
        let today = NaiveDate::from_ymd_opt(2024, 10, 19).unwrap();
        let path = archive_path(Path::new("q_table_archive"), today);
        assert_eq!(path, Path::new("q_table_archive/qtable-2024-10-19.pickle"));
    }
}

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use super::model::{Task, TaskError, record_id};

/// JSON file persistence for the task list.
#[derive(Debug, Clone)]
pub struct Storage {
    data_file: PathBuf,
}

impl Storage {
    pub fn new(data_file: impl Into<PathBuf>) -> Self {
        Self {
            data_file: data_file.into(),
        }
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    /// Loads every stored task. A missing, empty or non-array file reads as an
    /// empty list; failures are logged, not returned. Individual records are
    /// repaired rather than dropped.
    pub async fn read(&self) -> Vec<Task> {
        match self.try_read().await {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::error!(path = ?self.data_file, error = %e, "failed to read task data");
                Vec::new()
            }
        }
    }

    async fn try_read(&self) -> Result<Vec<Task>, TaskError> {
        let content = match tokio::fs::read_to_string(&self.data_file).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(&content)? {
            Value::Array(items) => Ok(self.repair(&items)),
            _ => Ok(Vec::new()),
        }
    }

    /// Records whose id is missing, invalid or duplicated get ids above the
    /// highest valid one.
    fn repair(&self, items: &[Value]) -> Vec<Task> {
        let ids: Vec<Option<u64>> = items.iter().map(record_id).collect();
        let mut next_id = ids.iter().flatten().max().map_or(1, |max| max + 1);
        let mut seen = HashSet::new();

        items
            .iter()
            .zip(ids)
            .map(|(item, id)| {
                let id = match id {
                    Some(id) if seen.insert(id) => id,
                    _ => {
                        let id = next_id;
                        next_id += 1;
                        seen.insert(id);
                        tracing::warn!(path = ?self.data_file, id, "task record had an unusable id, reassigned");
                        id
                    }
                };
                Task::from_value(id, item)
            })
            .collect()
    }

    pub async fn write(&self, tasks: &[Task]) -> Result<(), TaskError> {
        write_json(&self.data_file, tasks).await.inspect_err(|e| {
            tracing::error!(path = ?self.data_file, error = %e, "failed to write task data");
        })?;
        tracing::debug!(path = ?self.data_file, count = tasks.len(), "task data saved");
        Ok(())
    }

    /// Writes `tasks` to a caller-chosen file without touching the data file.
    pub async fn export_to(&self, path: &Path, tasks: &[Task]) -> Result<(), TaskError> {
        write_json(path, tasks).await?;
        tracing::info!(path = ?path, count = tasks.len(), "tasks exported");
        Ok(())
    }

    /// Raw task objects from an export file. Unlike [`Storage::read`], a
    /// missing or malformed file is an error. Entries are left untyped so the
    /// caller can repair ids and fields.
    pub async fn import_from(&self, path: &Path) -> Result<Vec<Value>, TaskError> {
        let content = tokio::fs::read_to_string(path).await?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(&content)? {
            Value::Array(items) => Ok(items),
            _ => Ok(Vec::new()),
        }
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<(), TaskError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    let json = serde_json::to_string_pretty(data)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::model::Priority;

    #[tokio::test]
    async fn unreadable_data_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("tasks.json"));
        assert!(storage.read().await.is_empty());

        tokio::fs::write(storage.data_file(), "").await.unwrap();
        assert!(storage.read().await.is_empty());

        tokio::fs::write(storage.data_file(), "{\"id\": 1}").await.unwrap();
        assert!(storage.read().await.is_empty());

        tokio::fs::write(storage.data_file(), "not json").await.unwrap();
        assert!(storage.read().await.is_empty());
    }

    #[tokio::test]
    async fn one_bad_record_does_not_drop_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("tasks.json"));
        let raw = r#"[
            {"id": 4, "title": "ok", "priority": "low", "completed": false, "createdAt": "2024-01-01T00:00:00.000Z"},
            {"id": 7, "title": "shouty", "priority": "High", "completed": null, "tags": null},
            {"id": 2.5, "title": "fractional"},
            {"id": 4, "title": "duplicate"}
        ]"#;
        tokio::fs::write(storage.data_file(), raw).await.unwrap();

        let tasks = storage.read().await;
        let ids: Vec<u64> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![4, 7, 8, 9]);
        assert_eq!(tasks[1].priority, Priority::High);
        assert_eq!(tasks[2].title, "fractional");
    }

    #[tokio::test]
    async fn write_creates_directories_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("nested/data/tasks.json"));
        let tasks = vec![Task::new(1, "first", Priority::High)];

        storage.write(&tasks).await.unwrap();
        assert_eq!(storage.read().await, tasks);

        let raw = tokio::fs::read_to_string(storage.data_file()).await.unwrap();
        assert!(raw.contains("\n  {"), "expected pretty-printed JSON");
    }

    #[tokio::test]
    async fn import_propagates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("tasks.json"));
        let err = storage.import_from(&dir.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(err, TaskError::Io(_)));
    }
}

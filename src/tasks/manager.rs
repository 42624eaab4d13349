use std::collections::HashSet;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use super::model::{Priority, Task, TaskError, now_iso, parse_timestamp, record_id};
use super::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl StatusFilter {
    /// Unknown values list everything.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "pending" => StatusFilter::Pending,
            "completed" => StatusFilter::Completed,
            _ => StatusFilter::All,
        }
    }

    fn matches(&self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => !task.completed,
            StatusFilter::Completed => task.completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Priority,
    Date,
}

impl SortKey {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "priority" => Some(SortKey::Priority),
            "date" => Some(SortKey::Date),
            _ => None,
        }
    }

    fn apply(&self, tasks: &mut [Task]) {
        match self {
            SortKey::Priority => tasks.sort_by_key(|t| t.priority.rank()),
            SortKey::Date => tasks.sort_by_key(|t| parse_timestamp(&t.created_at)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub tag: Option<String>,
    pub overdue: bool,
    pub sort: Option<SortKey>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub priority: Priority,
    pub due: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Task list operations over a [`Storage`]. The file is re-read before every
/// operation so concurrent CLI invocations see each other's writes.
pub struct TaskManager {
    storage: Storage,
    tasks: Vec<Task>,
    next_id: u64,
}

impl TaskManager {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            tasks: Vec::new(),
            next_id: 1,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    async fn load(&mut self) {
        self.tasks = self.storage.read().await;
        self.next_id = self.tasks.iter().map(|t| t.id).max().map_or(1, |max| max.saturating_add(1));
    }

    async fn save(&self) -> Result<(), TaskError> {
        self.storage.write(&self.tasks).await
    }

    fn find_mut(&mut self, id: u64) -> Result<&mut Task, TaskError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TaskError::NotFound(id))
    }

    pub async fn add(&mut self, new: NewTask) -> Result<Task, TaskError> {
        self.load().await;

        let mut task = Task::new(self.next_id, new.title, new.priority);
        task.due_date = new.due.filter(|d| !d.trim().is_empty());
        task.tags = new.tags;
        self.next_id += 1;

        self.tasks.push(task.clone());
        self.save().await?;
        tracing::info!(id = task.id, title = %task.title, "task added");
        Ok(task)
    }

    pub async fn list(&mut self, filter: StatusFilter, opts: &ListOptions) -> Vec<Task> {
        self.load().await;
        let now = Utc::now();

        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| filter.matches(t))
            .filter(|t| opts.tag.as_deref().is_none_or(|tag| t.has_tag(tag)))
            .filter(|t| !opts.overdue || t.is_overdue(now))
            .cloned()
            .collect();

        if let Some(sort) = opts.sort {
            sort.apply(&mut tasks);
        }
        tasks
    }

    /// Case-insensitive match against the title or any tag.
    pub async fn search(&mut self, query: &str, opts: &ListOptions) -> Result<Vec<Task>, TaskError> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Err(TaskError::EmptyQuery);
        }
        self.load().await;

        let mut results: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| t.title.to_lowercase().contains(&q) || t.tags.iter().any(|tag| tag.to_lowercase().contains(&q)))
            .filter(|t| opts.tag.as_deref().is_none_or(|tag| t.has_tag(tag)))
            .cloned()
            .collect();

        if let Some(sort) = opts.sort {
            sort.apply(&mut results);
        }
        Ok(results)
    }

    pub async fn complete(&mut self, id: u64) -> Result<Task, TaskError> {
        self.load().await;

        let task = self.find_mut(id)?;
        if task.completed {
            return Err(TaskError::AlreadyCompleted(id));
        }
        task.completed = true;
        task.completed_at = Some(now_iso());
        let task = task.clone();

        self.save().await?;
        tracing::info!(id, "task completed");
        Ok(task)
    }

    pub async fn delete(&mut self, id: u64) -> Result<Task, TaskError> {
        self.load().await;

        let idx = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(TaskError::NotFound(id))?;
        let task = self.tasks.remove(idx);

        self.save().await?;
        tracing::info!(id, "task deleted");
        Ok(task)
    }

    pub async fn update(&mut self, id: u64, title: &str) -> Result<Task, TaskError> {
        self.load().await;

        let task = self.find_mut(id)?;
        task.title = title.to_string();
        task.updated_at = Some(now_iso());
        let task = task.clone();

        self.save().await?;
        tracing::info!(id, "task updated");
        Ok(task)
    }

    pub async fn stats(&mut self) -> TaskStats {
        self.load().await;

        let mut stats = TaskStats {
            total: self.tasks.len(),
            ..Default::default()
        };
        for task in &self.tasks {
            if task.completed {
                stats.completed += 1;
            }
            match task.priority {
                Priority::High => stats.high += 1,
                Priority::Medium => stats.medium += 1,
                Priority::Low => stats.low += 1,
            }
        }
        stats.pending = stats.total - stats.completed;
        stats
    }

    pub async fn export(&mut self, path: &Path) -> Result<usize, TaskError> {
        self.load().await;
        self.storage.export_to(path, &self.tasks).await?;
        Ok(self.tasks.len())
    }

    /// Merges tasks from an export file and returns how many were added.
    /// Incoming ids that are missing, non-numeric, too large to have a
    /// successor or already taken get the next free id; valid ids are kept
    /// and reserved.
    pub async fn import(&mut self, path: &Path) -> Result<usize, TaskError> {
        self.load().await;

        let incoming = self.storage.import_from(path).await?;
        if incoming.is_empty() {
            return Ok(0);
        }

        let mut taken: HashSet<u64> = self.tasks.iter().map(|t| t.id).collect();
        let mut imported = 0;

        for item in &incoming {
            let id = match record_id(item).filter(|id| !taken.contains(id)) {
                Some(id) => {
                    if let Some(next) = id.checked_add(1) {
                        self.next_id = self.next_id.max(next);
                    }
                    id
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    id
                }
            };

            if taken.insert(id) {
                self.tasks.push(Task::from_value(id, item));
                imported += 1;
            }
        }

        self.save().await?;
        tracing::info!(path = ?path, imported, "tasks imported");
        Ok(imported)
    }
}

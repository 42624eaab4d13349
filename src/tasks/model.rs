use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid task data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Task with ID {0} not found")]
    NotFound(u64),
    #[error("Task {0} is already completed")]
    AlreadyCompleted(u64),
    #[error("Please provide a search query")]
    EmptyQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Case-insensitive; anything unrecognised becomes `Medium`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "low" => Priority::Low,
            "high" => Priority::High,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Sort rank, most urgent first.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Task {
    pub fn new(id: u64, title: impl Into<String>, priority: Priority) -> Self {
        Self {
            id,
            title: title.into(),
            priority,
            completed: false,
            created_at: now_iso(),
            updated_at: None,
            completed_at: None,
            due_date: None,
            tags: Vec::new(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// A pending task whose due date lies before `now`. Unparseable due dates
    /// are never overdue.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed
            && self
                .due_date
                .as_deref()
                .and_then(parse_timestamp)
                .is_some_and(|due| due < now)
    }

    pub fn status(&self) -> &'static str {
        if self.completed { "completed" } else { "pending" }
    }

    /// Builds a task from a loosely typed record, keeping whatever fields
    /// are usable. `id` is assigned by the caller.
    pub fn from_value(id: u64, item: &Value) -> Self {
        Task {
            id,
            title: text(item.get("title")).unwrap_or_default(),
            priority: item
                .get("priority")
                .and_then(Value::as_str)
                .map(Priority::parse_lenient)
                .unwrap_or_default(),
            completed: truthy(item.get("completed")),
            created_at: text(item.get("createdAt")).unwrap_or_else(now_iso),
            updated_at: text(item.get("updatedAt")),
            completed_at: text(item.get("completedAt")),
            due_date: text(item.get("dueDate")),
            tags: tags(item.get("tags")),
        }
    }
}

/// The record's id when it is a positive integer (number or numeric string)
/// that still has a successor.
pub fn record_id(item: &Value) -> Option<u64> {
    let id = match item.get("id")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    (id > 0 && id.checked_add(1).is_some()).then_some(id)
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

fn tags(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| text(Some(v))).collect(),
        other => text(other).into_iter().collect(),
    }
}

/// Current time in the `2024-01-31T08:00:00.000Z` form used in the data file.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_parsing_is_lenient() {
        assert_eq!(Priority::parse_lenient("HIGH"), Priority::High);
        assert_eq!(Priority::parse_lenient(" low "), Priority::Low);
        assert_eq!(Priority::parse_lenient("urgent"), Priority::Medium);
    }

    #[test]
    fn overdue_only_for_pending_tasks_with_past_due_date() {
        let now = parse_timestamp("2024-06-01T12:00:00Z").unwrap();
        let mut task = Task::new(1, "pay rent", Priority::High);
        assert!(!task.is_overdue(now));

        task.due_date = Some("2024-05-31".into());
        assert!(task.is_overdue(now));

        task.due_date = Some("not a date".into());
        assert!(!task.is_overdue(now));

        task.due_date = Some("2024-05-31".into());
        task.completed = true;
        assert!(!task.is_overdue(now));
    }

    #[test]
    fn record_ids_must_be_positive_with_a_successor() {
        assert_eq!(record_id(&serde_json::json!({"id": 7})), Some(7));
        assert_eq!(record_id(&serde_json::json!({"id": "12"})), Some(12));
        assert_eq!(record_id(&serde_json::json!({"id": 2.5})), None);
        assert_eq!(record_id(&serde_json::json!({"id": 0})), None);
        assert_eq!(record_id(&serde_json::json!({"id": u64::MAX})), None);
        assert_eq!(record_id(&serde_json::json!({"title": "no id"})), None);
    }

    #[test]
    fn loose_records_are_repaired_field_by_field() {
        let task = Task::from_value(
            4,
            &serde_json::json!({"title": "t", "priority": "High", "completed": null, "tags": null}),
        );
        assert_eq!(task.priority, Priority::High);
        assert!(!task.completed);
        assert!(task.tags.is_empty());
        assert!(!task.created_at.is_empty());
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let task = Task::new(3, "write report", Priority::Low);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["priority"], "low");
        assert!(json.get("dueDate").is_none());
        assert!(json.get("tags").is_none());
        assert!(json.get("createdAt").is_some());
    }
}

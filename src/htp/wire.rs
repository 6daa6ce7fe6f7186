//! JSON wire format for plans.
//!
//! ```json
//! {"task": {"ask": "...", "resources": ["10k"]}, "sub-plans": [{"task": "..."}]}
//! ```
//!
//! A bare string task is shorthand for `{"ask": ...}`. Planner prompts ask
//! the LM for a singular `"resource"` slot, so both forms are accepted.

use serde::{Deserialize, Deserializer, Serialize};

use crate::task::TaskStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtpDoc {
    pub task: TaskDoc,
    #[serde(rename = "sub-plans", default, deserialize_with = "null_as_empty")]
    pub sub_plans: Vec<HtpDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskDoc {
    Ask(String),
    Spec(TaskSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub ask: String,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    /// `Some(None)` serializes as `"resource": null`, an open slot the
    /// planner may fill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "is_pending")]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl TaskDoc {
    pub fn ask(&self) -> &str {
        match self {
            Self::Ask(ask) => ask,
            Self::Spec(spec) => &spec.ask,
        }
    }

    /// Resource names from both the list and the singular slot.
    pub fn resource_names(&self) -> Vec<&str> {
        match self {
            Self::Ask(_) => Vec::new(),
            Self::Spec(spec) => spec
                .resources
                .iter()
                .map(String::as_str)
                .chain(spec.resource.iter().flatten().map(String::as_str))
                .collect(),
        }
    }
}

fn is_pending(status: &TaskStatus) -> bool {
    *status == TaskStatus::Pending
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_string_and_object_tasks() {
        let doc: HtpDoc = serde_json::from_str(
            r#"{"task": "Q", "sub-plans": [
                {"task": {"ask": "Q1", "resource": "doc"}},
                {"task": {"ask": "Q2", "resource": null, "resources": ["a", "b"]}, "sub-plans": null}
            ]}"#,
        )
        .unwrap();
        assert_eq!(doc.task.ask(), "Q");
        assert_eq!(doc.sub_plans[0].task.resource_names(), vec!["doc"]);
        assert_eq!(doc.sub_plans[1].task.resource_names(), vec!["a", "b"]);
        assert!(doc.sub_plans[1].sub_plans.is_empty());
    }

    #[test]
    fn rejects_missing_task() {
        assert!(serde_json::from_str::<HtpDoc>(r#"{"plan": "Q"}"#).is_err());
        assert!(serde_json::from_str::<HtpDoc>(r#"{"task": 7}"#).is_err());
    }

    #[test]
    fn open_resource_slot_serializes_as_null() {
        let spec = TaskSpec {
            ask: "Q".into(),
            resources: Vec::new(),
            resource: Some(None),
            status: TaskStatus::Pending,
            result: None,
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json, serde_json::json!({"ask": "Q", "resource": null}));
    }
}

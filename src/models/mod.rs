use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two to-do list categories: what matters and what doesn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Signal,
    Noise,
}

impl ListType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListType::Signal => "signal",
            ListType::Noise => "noise",
        }
    }
}

impl FromStr for ListType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signal" => Ok(ListType::Signal),
            "noise" => Ok(ListType::Noise),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a user's background is sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundType {
    Custom,
    Predefined,
    None,
}

impl Default for BackgroundType {
    fn default() -> Self {
        BackgroundType::Predefined
    }
}

impl BackgroundType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundType::Custom => "custom",
            BackgroundType::Predefined => "predefined",
            BackgroundType::None => "none",
        }
    }
}

impl FromStr for BackgroundType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "custom" => Ok(BackgroundType::Custom),
            "predefined" => Ok(BackgroundType::Predefined),
            "none" => Ok(BackgroundType::None),
            _ => Err(()),
        }
    }
}

/// A user's single countdown target. Fully replaced on update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Countdown {
    pub user_id: String,
    pub target_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A custom background image, stored as a data-URI string.
/// Uploads append records; reads take the most recent one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Background {
    pub id: String,
    pub image_data: String,
    pub created_at: DateTime<Utc>,
}

/// One entry in a signal/noise list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    /// Serving URLs for attached images, in upload order.
    pub images: Vec<String>,
}

/// A whole list. One row per type, created lazily on first access.
#[derive(Debug, Clone)]
pub struct TaskList {
    pub list_type: ListType,
    pub items: Vec<TaskItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Image binary attached to a task item, served back by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListImage {
    pub id: String,
    pub item_id: String,
    #[serde(skip_serializing)]
    pub data: Vec<u8>,
    pub content_type: String,
    pub filename: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

/// Per-user background preference. One row per user, upserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub user_id: String,
    pub background_type: BackgroundType,
    pub background_value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Request/Response types for API

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCountdownRequest {
    pub user_id: Option<String>,
    pub target_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownResponse {
    pub target_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBackgroundRequest {
    pub image_data: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundResponse {
    pub image_data: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    #[serde(rename = "type")]
    pub list_type: ListType,
    pub entries: Vec<TaskItem>,
}

impl From<TaskList> for ListResponse {
    fn from(list: TaskList) -> Self {
        Self {
            list_type: list.list_type,
            entries: list.items,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub completed: Option<bool>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSettingsRequest {
    pub user_id: Option<String>,
    pub background_type: Option<BackgroundType>,
    pub background_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

/// Body for mutations that have nothing else to report.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

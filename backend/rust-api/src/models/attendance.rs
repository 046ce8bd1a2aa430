use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::time::bson_datetime_as_chrono;

/// Study group stored in MongoDB "study_groups" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyGroup {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub teacher_ids: Vec<ObjectId>,
    #[serde(default)]
    pub student_ids: Vec<ObjectId>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Attendance row, unique per (student, group, date)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub student_id: ObjectId,
    pub group_id: ObjectId,
    pub date: NaiveDate,
    pub is_present: bool,
    pub marked_by: ObjectId,
    #[serde(rename = "markedAt", with = "bson_datetime_as_chrono")]
    pub marked_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttendanceView {
    pub student_id: String,
    pub group_id: String,
    pub date: NaiveDate,
    pub is_present: bool,
    pub marked_by: String,
    pub marked_at: DateTime<Utc>,
    pub notes: String,
}

impl From<AttendanceRecord> for AttendanceView {
    fn from(r: AttendanceRecord) -> Self {
        AttendanceView {
            student_id: r.student_id.to_hex(),
            group_id: r.group_id.to_hex(),
            date: r.date,
            is_present: r.is_present,
            marked_by: r.marked_by.to_hex(),
            marked_at: r.marked_at,
            notes: r.notes,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct MarkAttendanceRequest {
    pub group_id: String,
    pub date: NaiveDate,
    #[validate(length(min = 1, max = 200, message = "Between 1 and 200 records per request"))]
    pub records: Vec<AttendanceEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub student_id: String,
    pub is_present: bool,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkAttendanceResponse {
    pub marked: usize,
    /// Student ids that are unknown or not members of the group
    pub skipped: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceQuery {
    pub group_id: String,
    pub date: NaiveDate,
}

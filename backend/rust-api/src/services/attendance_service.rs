use chrono::{Days, NaiveDate, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::FindOptions,
    Collection, Database,
};

use super::{upsert_one, ServiceError, ServiceResult};
use crate::authz::Role;
use crate::models::attendance::{
    AttendanceEntry, AttendanceRecord, AttendanceView, MarkAttendanceResponse, StudyGroup,
};
use crate::utils::time::chrono_to_bson;

/// Attendance may be recorded for today or up to `window_days` back, never ahead.
pub fn check_attendance_date(
    date: NaiveDate,
    today: NaiveDate,
    window_days: i64,
) -> ServiceResult<()> {
    if date > today {
        return Err(ServiceError::Validation(
            "Cannot mark attendance for a future date".to_string(),
        ));
    }
    let earliest = today
        .checked_sub_days(Days::new(window_days.max(0) as u64))
        .unwrap_or(NaiveDate::MIN);
    if date < earliest {
        return Err(ServiceError::Validation(format!(
            "Attendance can only be marked for the last {} days",
            window_days
        )));
    }
    Ok(())
}

/// Splits entries into group members and rejected ids (unparsable or not enrolled).
pub fn partition_members<'a>(
    entries: &'a [AttendanceEntry],
    group: &StudyGroup,
) -> (Vec<(ObjectId, &'a AttendanceEntry)>, Vec<String>) {
    let mut members = Vec::new();
    let mut skipped = Vec::new();
    for entry in entries {
        match ObjectId::parse_str(entry.student_id.trim()) {
            Ok(id) if group.student_ids.contains(&id) => members.push((id, entry)),
            _ => skipped.push(entry.student_id.clone()),
        }
    }
    (members, skipped)
}

pub struct AttendanceService {
    mongo: Database,
    window_days: i64,
}

impl AttendanceService {
    pub fn new(mongo: Database, window_days: i64) -> Self {
        Self { mongo, window_days }
    }

    fn groups(&self) -> Collection<StudyGroup> {
        self.mongo.collection("study_groups")
    }

    fn records(&self) -> Collection<AttendanceRecord> {
        self.mongo.collection("attendance")
    }

    async fn group_for_staff(
        &self,
        group_id: &ObjectId,
        user_id: &ObjectId,
        role: Role,
    ) -> ServiceResult<StudyGroup> {
        let group = self
            .groups()
            .find_one(doc! { "_id": group_id, "is_active": true })
            .await?
            .ok_or_else(|| ServiceError::NotFound("Group not found".to_string()))?;

        if role != Role::Admin && !group.teacher_ids.contains(user_id) {
            return Err(ServiceError::Forbidden(
                "You are not assigned to this group".to_string(),
            ));
        }
        Ok(group)
    }

    pub async fn mark(
        &self,
        marker_id: &ObjectId,
        role: Role,
        group_id: &ObjectId,
        date: NaiveDate,
        entries: &[AttendanceEntry],
    ) -> ServiceResult<MarkAttendanceResponse> {
        check_attendance_date(date, Utc::now().date_naive(), self.window_days)?;
        let group = self.group_for_staff(group_id, marker_id, role).await?;

        let (members, skipped) = partition_members(entries, &group);
        let marked_at = chrono_to_bson(Utc::now());

        for (student_id, entry) in &members {
            upsert_one(
                &self.records(),
                doc! {
                    "student_id": student_id,
                    "group_id": group_id,
                    "date": date.to_string(),
                },
                doc! { "$set": {
                    "is_present": entry.is_present,
                    "marked_by": marker_id,
                    "markedAt": marked_at,
                    "notes": entry.notes.trim(),
                } },
            )
            .await?;
        }

        if !skipped.is_empty() {
            tracing::warn!(
                group_id = %group_id,
                skipped = skipped.len(),
                "Attendance entries skipped for non-members"
            );
        }
        tracing::info!(
            group_id = %group_id,
            marker_id = %marker_id,
            %date,
            marked = members.len(),
            "Attendance marked"
        );

        Ok(MarkAttendanceResponse {
            marked: members.len(),
            skipped,
        })
    }

    pub async fn list_for_group(
        &self,
        viewer_id: &ObjectId,
        role: Role,
        group_id: &ObjectId,
        date: NaiveDate,
    ) -> ServiceResult<Vec<AttendanceView>> {
        self.group_for_staff(group_id, viewer_id, role).await?;

        let mut cursor = self
            .records()
            .find(doc! { "group_id": group_id, "date": date.to_string() })
            .with_options(FindOptions::builder().sort(doc! { "student_id": 1 }).build())
            .await?;

        let mut rows = Vec::new();
        while let Some(record) = cursor.try_next().await? {
            rows.push(record.into());
        }
        Ok(rows)
    }
}

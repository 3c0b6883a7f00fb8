//! # Attendance Repository
//!
//! Daily check-ins with the 08:00 punctuality cutoff.
//!
//! One record per employee per calendar day, enforced by an explicit
//! existence check inside the insert transaction. A late check-in
//! without an excuse note is still saved; the caller gets a warning
//! flag to surface, never a rejection.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use comanda_core::{Attendance, LATE_CUTOFF};

const ATTENDANCE_COLUMNS: &str = "id, employee, date, entry_time, note";

/// Result of a check-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    pub record: Attendance,
    /// True when the entry is past the cutoff and no excuse note was
    /// supplied. Non-blocking: the record is saved either way.
    pub late_without_note: bool,
}

/// Per-day headcount for the dashboard cards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceDaySummary {
    pub present: i64,
    pub late: i64,
    pub punctual: i64,
}

/// Repository for attendance database operations.
#[derive(Debug, Clone)]
pub struct AttendanceRepository {
    pool: SqlitePool,
}

impl AttendanceRepository {
    /// Creates a new AttendanceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AttendanceRepository { pool }
    }

    /// Records a check-in for `now`.
    ///
    /// Fails with [`DbError::DuplicateAttendance`] if the employee
    /// already checked in on the same calendar day, without touching
    /// the existing record.
    pub async fn check_in(
        &self,
        employee: &str,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<CheckIn> {
        let date = now.date_naive();
        let entry_time = now.time();

        let mut tx = self.pool.begin().await?;

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT id FROM attendance WHERE employee = ?1 AND date = ?2 LIMIT 1",
        )
        .bind(employee)
        .bind(date)
        .fetch_optional(&mut *tx)
        .await?;

        if existing.is_some() {
            return Err(DbError::DuplicateAttendance {
                employee: employee.to_string(),
                date: date.to_string(),
            });
        }

        let record = Attendance {
            id: Uuid::new_v4().to_string(),
            employee: employee.to_string(),
            date,
            entry_time,
            note: note.map(str::to_string),
        };

        sqlx::query(
            "INSERT INTO attendance (id, employee, date, entry_time, note) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&record.id)
        .bind(&record.employee)
        .bind(record.date)
        .bind(record.entry_time)
        .bind(&record.note)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let late_without_note = record.is_late() && record.note.is_none();
        if late_without_note {
            warn!(employee = %employee, time = %entry_time, "Late check-in without excuse note");
        } else {
            info!(employee = %employee, time = %entry_time, "Attendance recorded");
        }

        Ok(CheckIn {
            record,
            late_without_note,
        })
    }

    /// All check-ins for one day, earliest first.
    pub async fn list_for_day(&self, date: NaiveDate) -> DbResult<Vec<Attendance>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE date = ?1 ORDER BY entry_time"
        );
        let records = sqlx::query_as::<_, Attendance>(&sql)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Present / late / punctual counts for the dashboard cards.
    pub async fn day_summary(&self, date: NaiveDate) -> DbResult<AttendanceDaySummary> {
        let (h, m) = LATE_CUTOFF;
        let cutoff = NaiveTime::from_hms_opt(h, m, 0).expect("valid cutoff");

        let present: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE date = ?1")
            .bind(date)
            .fetch_one(&self.pool)
            .await?;

        let late: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attendance WHERE date = ?1 AND entry_time > ?2",
        )
        .bind(date)
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;

        Ok(AttendanceDaySummary {
            present,
            late,
            punctual: present - late,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn test_punctual_check_in() {
        let db = test_db().await;
        let checkin = db
            .attendance()
            .check_in("maria", None, at(7, 45))
            .await
            .unwrap();
        assert!(!checkin.late_without_note);
        assert!(!checkin.record.is_late());
    }

    #[tokio::test]
    async fn test_duplicate_same_day_rejected_without_mutation() {
        let db = test_db().await;
        let repo = db.attendance();

        let first = repo.check_in("maria", None, at(7, 45)).await.unwrap();

        let err = repo.check_in("maria", None, at(12, 0)).await.unwrap_err();
        assert!(matches!(err, DbError::DuplicateAttendance { .. }));

        // Existing record untouched
        let date = at(7, 45).date_naive();
        let records = repo.list_for_day(date).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, first.record.id);
        assert_eq!(records[0].entry_time, first.record.entry_time);
    }

    #[tokio::test]
    async fn test_same_employee_next_day_is_fine() {
        let db = test_db().await;
        let repo = db.attendance();

        repo.check_in("maria", None, at(7, 45)).await.unwrap();
        let next_day = Utc.with_ymd_and_hms(2026, 3, 3, 7, 50, 0).unwrap();
        repo.check_in("maria", None, next_day).await.unwrap();
    }

    #[tokio::test]
    async fn test_late_without_note_warns_but_saves() {
        let db = test_db().await;
        let checkin = db
            .attendance()
            .check_in("pedro", None, at(8, 20))
            .await
            .unwrap();
        assert!(checkin.late_without_note);

        let records = db
            .attendance()
            .list_for_day(at(8, 20).date_naive())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_late_with_note_is_not_flagged() {
        let db = test_db().await;
        let checkin = db
            .attendance()
            .check_in("pedro", Some("Trafico en el puente"), at(8, 20))
            .await
            .unwrap();
        assert!(!checkin.late_without_note);
        assert!(checkin.record.is_late());
    }

    #[tokio::test]
    async fn test_day_summary() {
        let db = test_db().await;
        let repo = db.attendance();

        repo.check_in("maria", None, at(7, 30)).await.unwrap();
        repo.check_in("pedro", None, at(8, 15)).await.unwrap();
        repo.check_in("luis", Some("Cita medica"), at(9, 0)).await.unwrap();

        let summary = repo.day_summary(at(7, 30).date_naive()).await.unwrap();
        assert_eq!(summary.present, 3);
        assert_eq!(summary.late, 2);
        assert_eq!(summary.punctual, 1);
    }
}

//! Borrowing record model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One lending transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BorrowingRecord {
    pub id: i32,
    pub book_id: i32,
    /// Owning member, fixed at creation
    pub member_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub approved: bool,
}

/// Lifecycle state derived from the stored fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorrowingState {
    Requested,
    Approved,
    Returned,
}

impl BorrowingRecord {
    /// A return date wins over the approval flag
    pub fn state(&self) -> BorrowingState {
        match (self.return_date, self.approved) {
            (Some(_), _) => BorrowingState::Returned,
            (None, true) => BorrowingState::Approved,
            (None, false) => BorrowingState::Requested,
        }
    }

    pub fn is_returned(&self) -> bool {
        self.return_date.is_some()
    }
}

/// Borrowing record as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct BorrowingResponse {
    #[serde(flatten)]
    pub record: BorrowingRecord,
    pub state: BorrowingState,
}

impl From<BorrowingRecord> for BorrowingResponse {
    fn from(record: BorrowingRecord) -> Self {
        BorrowingResponse {
            state: record.state(),
            record,
        }
    }
}

/// Borrow request.
///
/// The display fields (`book_title`, `member_email`, `member_name`) are
/// checked against the entities found by id; `member_email` is also the
/// claim compared with the caller's identity.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBorrowing {
    pub book_id: i32,
    pub book_title: Option<String>,
    pub member_id: i32,
    pub member_email: String,
    pub member_name: Option<String>,
    /// Defaults to now
    pub borrow_date: Option<DateTime<Utc>>,
}

/// Full replacement of a record's editable fields
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBorrowing {
    pub book_id: i32,
    pub book_title: Option<String>,
    pub member_id: i32,
    pub member_email: String,
    pub member_name: Option<String>,
    pub borrow_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved: bool,
}

/// Insert payload handed to the borrowing store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBorrowing {
    pub book_id: i32,
    pub member_id: i32,
    pub borrow_date: DateTime<Utc>,
}

/// Return request; the return date defaults to now
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnBorrowing {
    pub return_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(return_date: Option<DateTime<Utc>>, approved: bool) -> BorrowingRecord {
        BorrowingRecord {
            id: 1,
            book_id: 1,
            member_id: 1,
            borrow_date: Utc::now(),
            return_date,
            approved,
        }
    }

    #[test]
    fn test_state_derivation() {
        assert_eq!(record(None, false).state(), BorrowingState::Requested);
        assert_eq!(record(None, true).state(), BorrowingState::Approved);
        assert_eq!(record(Some(Utc::now()), false).state(), BorrowingState::Returned);
        assert_eq!(record(Some(Utc::now()), true).state(), BorrowingState::Returned);
    }

    #[test]
    fn test_response_carries_state() {
        let json = serde_json::to_value(BorrowingResponse::from(record(None, true))).unwrap();
        assert_eq!(json["state"], "approved");
        assert_eq!(json["approved"], true);
        assert!(json["return_date"].is_null());
    }
}

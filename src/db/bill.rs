use std::{fmt, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_postgres::Row;
use tracing::error;
use uuid::Uuid;

use crate::db::{PostgresStore, StoreError};

/// Lifecycle of an expense report. A bill is submitted as `Pending`;
/// acceptance and refusal happen outside this application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillStatus {
    Pending,
    Accepted,
    Refused,
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BillStatus::Pending => "pending",
            BillStatus::Accepted => "accepted",
            BillStatus::Refused => "refused",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
#[error("unknown bill status: {0}")]
pub struct ParseBillStatusError(String);

impl FromStr for BillStatus {
    type Err = ParseBillStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BillStatus::Pending),
            "accepted" => Ok(BillStatus::Accepted),
            "refused" => Ok(BillStatus::Refused),
            other => Err(ParseBillStatusError(other.to_string())),
        }
    }
}

/// An employee expense report with its attached receipt.
///
/// `date` is kept as the submitted string. It is the sole sort key of the
/// list view and is compared lexicographically, so it must not be
/// reformatted on the way through. `file_url` is equally opaque - whatever
/// the receipt store returned is what the preview renders.
#[derive(Clone, Debug)]
pub struct Bill {
    pub id: Uuid,
    pub email: String,
    pub expense_type: String,
    pub name: String,
    pub amount: f64,
    pub vat: String,
    pub pct: i32,
    pub date: String,
    pub commentary: Option<String>,
    pub file_name: String,
    pub file_url: String,
    pub status: BillStatus,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        email: &str,
        expense_type: &str,
        name: &str,
        amount: f64,
        vat: &str,
        pct: i32,
        date: &str,
        commentary: Option<String>,
        file_name: String,
        file_url: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            expense_type: expense_type.to_owned(),
            name: name.to_owned(),
            amount,
            vat: vat.to_owned(),
            pct,
            date: date.to_owned(),
            commentary,
            file_name,
            file_url,
            status: BillStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait BillStore: Send + Sync {
    async fn list_for_owner(&self, email: &str) -> Result<Vec<Bill>, StoreError>;
    async fn get_by_id_for_owner(
        &self,
        id: &Uuid,
        email: &str,
    ) -> Result<Option<Bill>, StoreError>;
    async fn create_bill(&self, bill: &Bill) -> Result<(), StoreError>;
}

#[async_trait]
impl BillStore for PostgresStore {
    async fn list_for_owner(&self, email: &str) -> Result<Vec<Bill>, StoreError> {
        let client = self.pool.get().await.map_err(|e| {
            error!("Error getting db connection: {e}");
            StoreError::Internal
        })?;
        let rows = client
            .query(
                "SELECT id, email, expense_type, name, amount, vat, pct, bill_date, commentary, file_name, file_url, status, created_at FROM bills WHERE email = $1",
                &[&email],
            )
            .await
            .map_err(|e| {
                error!("Error fetching bills for {email}: {e}");
                StoreError::Internal
            })?;

        rows.iter().map(row_to_bill).collect()
    }

    async fn get_by_id_for_owner(
        &self,
        id: &Uuid,
        email: &str,
    ) -> Result<Option<Bill>, StoreError> {
        let client = self.pool.get().await.map_err(|e| {
            error!("Error getting db connection: {e}");
            StoreError::Internal
        })?;
        let row = client
            .query_opt(
                "SELECT id, email, expense_type, name, amount, vat, pct, bill_date, commentary, file_name, file_url, status, created_at FROM bills WHERE id = $1 AND email = $2",
                &[&id, &email],
            )
            .await
            .map_err(|e| {
                error!("Error fetching bill {id}: {e}");
                StoreError::Internal
            })?;

        match row {
            Some(row) => Ok(Some(row_to_bill(&row)?)),
            None => Ok(None),
        }
    }

    async fn create_bill(&self, bill: &Bill) -> Result<(), StoreError> {
        let client = self.pool.get().await.map_err(|e| {
            error!("Error getting db connection: {e}");
            StoreError::Internal
        })?;
        client
            .execute(
                r#"INSERT INTO bills
                        (id, email, expense_type, name, amount, vat, pct, bill_date, commentary, file_name, file_url, status, created_at)
                    VALUES
                        ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
                &[
                    &bill.id,
                    &bill.email,
                    &bill.expense_type,
                    &bill.name,
                    &bill.amount,
                    &bill.vat,
                    &bill.pct,
                    &bill.date,
                    &bill.commentary,
                    &bill.file_name,
                    &bill.file_url,
                    &bill.status.to_string(),
                    &bill.created_at,
                ],
            )
            .await
            .map_err(|e| {
                error!("Error persisting bill {}: {e}", bill.id);
                StoreError::Internal
            })?;
        Ok(())
    }
}

fn row_to_bill(row: &Row) -> Result<Bill, StoreError> {
    let status_str: String = row.get(11);
    let status = BillStatus::from_str(&status_str).map_err(|e| {
        error!("Error reading bill row: {e}");
        StoreError::Internal
    })?;

    Ok(Bill {
        id: row.get(0),
        email: row.get(1),
        expense_type: row.get(2),
        name: row.get(3),
        amount: row.get(4),
        vat: row.get(5),
        pct: row.get(6),
        date: row.get(7),
        commentary: row.get(8),
        file_name: row.get(9),
        file_url: row.get(10),
        status,
        created_at: row.get(12),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_string_form() {
        for status in [BillStatus::Pending, BillStatus::Accepted, BillStatus::Refused] {
            assert_eq!(BillStatus::from_str(&status.to_string()).unwrap(), status);
        }
        assert!(BillStatus::from_str("cancelled").is_err());
    }

    #[test]
    fn new_bills_start_out_pending() {
        let bill = Bill::new(
            "a@a",
            "Transports",
            "vol Paris Londres",
            348.0,
            "70",
            20,
            "2023-04-04",
            None,
            "billet.jpg".to_string(),
            "/receipts/billet.jpg".to_string(),
        );
        assert_eq!(bill.status, BillStatus::Pending);
        assert_eq!(bill.date, "2023-04-04");
    }
}

use serde::{Deserialize, Serialize};

use crate::db::bill::Bill;

/// One row of the bills table view.
#[derive(Debug, Clone)]
pub struct BillForList {
    pub id: String,
    pub expense_type: String,
    pub name: String,
    pub date: String,
    pub amount: String,
    pub status: String,
}

impl From<Bill> for BillForList {
    fn from(bill: Bill) -> Self {
        Self {
            id: bill.id.to_string(),
            expense_type: bill.expense_type,
            name: bill.name,
            date: bill.date,
            amount: format!("{} €", bill.amount),
            status: bill.status.to_string(),
        }
    }
}

/// The uploaded receipt of an in-progress bill, held in the session until
/// the form is submitted or abandoned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftReceipt {
    pub file_name: String,
    pub file_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBillData {
    pub csrf_token: String,
    pub expense_type: String,
    pub name: String,
    pub amount: f64,
    pub vat: String,
    pub pct: i32,
    pub date: String,
    pub commentary: String,
}

impl NewBillData {
    /// A missing date is the one guard that blocks submission; the form is
    /// re-rendered without the store ever being called.
    pub fn validate(&self) -> bool {
        if self.date.trim().is_empty() {
            return false;
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return false;
        }
        true
    }

    pub fn commentary(&self) -> Option<String> {
        let trimmed = self.commentary.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    }
}

/// Receipts are images; anything else is dropped before the upload.
pub fn valid_receipt_extension(file_name: &str) -> bool {
    match file_name.rsplit_once('.') {
        Some((_, ext)) => matches!(
            ext.to_ascii_lowercase().as_str(),
            "jpg" | "jpeg" | "png"
        ),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_image_extensions_are_accepted_case_insensitively() {
        assert!(valid_receipt_extension("receipt.jpg"));
        assert!(valid_receipt_extension("receipt.jpeg"));
        assert!(valid_receipt_extension("receipt.png"));
        assert!(valid_receipt_extension("FACTURE.JPG"));
        assert!(valid_receipt_extension("photo.PnG"));
        assert!(valid_receipt_extension("archive.tar.jpg"));

        assert!(!valid_receipt_extension("receipt.pdf"));
        assert!(!valid_receipt_extension("receipt.gif"));
        assert!(!valid_receipt_extension("script.jpg.exe"));
        assert!(!valid_receipt_extension("receipt"));
        assert!(!valid_receipt_extension(""));
    }

    fn form(date: &str, amount: f64, commentary: &str) -> NewBillData {
        NewBillData {
            csrf_token: "t".to_string(),
            expense_type: "Transports".to_string(),
            name: "vol Paris Londres".to_string(),
            amount,
            vat: "70".to_string(),
            pct: 20,
            date: date.to_string(),
            commentary: commentary.to_string(),
        }
    }

    #[test]
    fn an_empty_date_blocks_the_submission() {
        assert!(!form("", 100.0, "").validate());
        assert!(!form("   ", 100.0, "").validate());
        assert!(form("2023-12-15", 100.0, "").validate());
    }

    #[test]
    fn amounts_must_be_finite_and_not_negative() {
        assert!(!form("2023-12-15", -1.0, "").validate());
        assert!(!form("2023-12-15", f64::NAN, "").validate());
        assert!(!form("2023-12-15", f64::INFINITY, "").validate());
        assert!(form("2023-12-15", 0.0, "").validate());
    }

    #[test]
    fn commentary_is_trimmed_down_to_an_option() {
        assert_eq!(form("2023-12-15", 1.0, "").commentary(), None);
        assert_eq!(form("2023-12-15", 1.0, "   ").commentary(), None);
        assert_eq!(
            form("2023-12-15", 1.0, " séminaire ").commentary(),
            Some("séminaire".to_string())
        );
    }

    #[test]
    fn list_rows_carry_display_strings() {
        let row = BillForList::from(crate::db::bill::Bill::new(
            "a@a",
            "Transports",
            "vol Paris Londres",
            348.0,
            "70",
            20,
            "2004-04-04",
            None,
            "billet.jpg".to_string(),
            "/receipts/billet.jpg".to_string(),
        ));
        assert_eq!(row.date, "2004-04-04");
        assert_eq!(row.amount, "348 €");
        assert_eq!(row.status, "pending");
    }
}

use std::str::FromStr;

use axum::{
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    Ctx,
    db::{
        StoreError,
        bill::{Bill, BillStore},
    },
    web::{
        BILLS_PATH, DRAFT_RECEIPT, NEW_BILL_PATH, Result,
        bill::data::{BillForList, DraftReceipt, NewBillData, valid_receipt_extension},
        csrf::{gen_csrf, verify_csrf},
        error::Error,
        rate_limit::RealIp,
        templates::{BillsTemplate, Employee, ErrorTemplate, HtmlTemplate, NewBillTemplate, ReceiptTemplate},
    },
};

/// Most recent date first; equal dates keep their original order. The
/// comparison is on the raw date strings.
pub(crate) fn sort_anti_chronological(bills: &mut [Bill]) {
    bills.sort_by(|a, b| b.date.cmp(&a.date));
}

pub(crate) async fn bills_for(
    store: &dyn BillStore,
    email: &str,
) -> std::result::Result<Vec<BillForList>, StoreError> {
    let mut bills = store.list_for_owner(email).await?;
    sort_anti_chronological(&mut bills);
    Ok(bills.into_iter().map(BillForList::from).collect())
}

/// The bills list page. A store rejection is rendered as the error page
/// with the rejection's message; nothing escapes this handler as an error.
#[tracing::instrument(level = tracing::Level::DEBUG, skip(ctx))]
pub async fn list(employee: Employee, State(ctx): State<Ctx>) -> Result<impl IntoResponse> {
    let page = match bills_for(ctx.bill_store.as_ref(), &employee.email).await {
        Ok(bills) => HtmlTemplate(BillsTemplate {
            email: employee.email,
            bills,
        })
        .into_response(),
        Err(e) => HtmlTemplate(ErrorTemplate {
            error: e.to_string(),
        })
        .into_response(),
    };
    Ok(page)
}

/// Receipt preview for one bill row, shown at a fixed display width.
#[tracing::instrument(level = tracing::Level::DEBUG, skip(ctx))]
pub async fn receipt(
    employee: Employee,
    State(ctx): State<Ctx>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let parsed_id = Uuid::from_str(&id).map_err(|_| Error::BadRequest("invalid id".to_string()))?;

    let bill = match ctx
        .bill_store
        .get_by_id_for_owner(&parsed_id, &employee.email)
        .await
    {
        Ok(Some(bill)) => bill,
        Ok(None) => return Err(Error::Store(StoreError::NotFound)),
        Err(e) => return Err(Error::Store(e)),
    };

    Ok(HtmlTemplate(ReceiptTemplate {
        file_name: bill.file_name,
        file_url: bill.file_url,
    }))
}

#[tracing::instrument(level = tracing::Level::DEBUG, skip(session))]
pub async fn new_bill(employee: Employee, session: Session) -> Result<impl IntoResponse> {
    let csrf_token = gen_csrf(&session).await.map_err(|_| Error::Internal)?;
    let receipt = session
        .get::<DraftReceipt>(DRAFT_RECEIPT)
        .await
        .map_err(|_| Error::Internal)?;

    Ok(HtmlTemplate(NewBillTemplate {
        email: employee.email,
        csrf_token,
        receipt,
    }))
}

/// Receives the selected receipt file. An invalid extension clears the
/// draft silently; a valid one is stored right away and its URL kept in
/// the session for submit time.
#[tracing::instrument(level = tracing::Level::DEBUG, skip(ctx, session, multipart))]
pub async fn upload_receipt(
    RealIp(ip): RealIp,
    employee: Employee,
    session: Session,
    State(ctx): State<Ctx>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut rate_limiter = ctx.rate_limiter.lock().await;
    let allowed = rate_limiter.check(&ip.to_string());
    drop(rate_limiter);
    if !allowed {
        warn!("Rate limited req from {}", &ip.to_string());
        return Err(Error::TooManyRequests);
    }

    let mut csrf_token = None;
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| Error::BadRequest("invalid form data".to_string()))?
    {
        match field.name() {
            Some("csrf_token") => {
                csrf_token = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| Error::BadRequest("invalid form data".to_string()))?,
                );
            }
            Some("file") => {
                let file_name = field.file_name().map(str::to_owned);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| Error::BadRequest("invalid form data".to_string()))?;
                if let Some(name) = file_name {
                    file = Some((name, bytes.to_vec()));
                }
            }
            _ => {}
        }
    }

    verify_csrf(csrf_token.as_deref().unwrap_or_default(), &session)
        .await
        .map_err(|_| Error::Unauthorized)?;

    let Some((file_name, bytes)) = file else {
        return Err(Error::BadRequest("missing file".to_string()));
    };

    if !valid_receipt_extension(&file_name) {
        // Not an error: the selection is dropped so a stale invalid file
        // cannot be submitted later.
        session
            .remove::<DraftReceipt>(DRAFT_RECEIPT)
            .await
            .map_err(|e| {
                error!("Error clearing receipt draft: {e}");
                Error::Internal
            })?;
        return Ok(Redirect::to(NEW_BILL_PATH).into_response());
    }

    let file_url = ctx
        .receipt_store
        .save_receipt(&employee.email, &file_name, &bytes)
        .await?;

    session
        .insert(DRAFT_RECEIPT, DraftReceipt { file_name, file_url })
        .await
        .map_err(|e| {
            error!("Error storing receipt draft: {e}");
            Error::Internal
        })?;

    Ok(Redirect::to(NEW_BILL_PATH).into_response())
}

/// Builds the bill from the submitted form and the uploaded receipt, and
/// persists it. `Ok(None)` means the guard refused the submission and the
/// store was never called.
pub(crate) async fn submit_bill(
    store: &dyn BillStore,
    email: &str,
    data: &NewBillData,
    receipt: Option<&DraftReceipt>,
) -> std::result::Result<Option<Bill>, StoreError> {
    if !data.validate() {
        return Ok(None);
    }

    let (file_name, file_url) = match receipt {
        Some(r) => (r.file_name.clone(), r.file_url.clone()),
        None => (String::new(), String::new()),
    };

    let bill = Bill::new(
        email,
        &data.expense_type,
        &data.name,
        data.amount,
        &data.vat,
        data.pct,
        &data.date,
        data.commentary(),
        file_name,
        file_url,
    );
    store.create_bill(&bill).await?;
    Ok(Some(bill))
}

/// Form submission. On success the user is sent to the bills list; on a
/// store rejection no navigation happens and the 404/500-style message is
/// rendered instead.
#[tracing::instrument(level = tracing::Level::DEBUG, skip(ctx, session, data))]
pub async fn create(
    RealIp(ip): RealIp,
    employee: Employee,
    session: Session,
    State(ctx): State<Ctx>,
    axum::Form(data): axum::Form<NewBillData>,
) -> Result<Response> {
    let mut rate_limiter = ctx.rate_limiter.lock().await;
    let allowed = rate_limiter.check(&ip.to_string());
    drop(rate_limiter);
    if !allowed {
        warn!("Rate limited req from {}", &ip.to_string());
        return Err(Error::TooManyRequests);
    }

    verify_csrf(&data.csrf_token, &session)
        .await
        .map_err(|_| Error::Unauthorized)?;

    let receipt = session
        .get::<DraftReceipt>(DRAFT_RECEIPT)
        .await
        .map_err(|_| Error::Internal)?;

    match submit_bill(
        ctx.bill_store.as_ref(),
        &employee.email,
        &data,
        receipt.as_ref(),
    )
    .await?
    {
        Some(bill) => {
            tracing::debug!("created bill {}", bill.id);
            session
                .remove::<DraftReceipt>(DRAFT_RECEIPT)
                .await
                .map_err(|e| {
                    error!("Error clearing receipt draft: {e}");
                    Error::Internal
                })?;
            Ok(Redirect::to(BILLS_PATH).into_response())
        }
        None => {
            let csrf_token = gen_csrf(&session).await.map_err(|_| Error::Internal)?;
            Ok(HtmlTemplate(NewBillTemplate {
                email: employee.email,
                csrf_token,
                receipt,
            })
            .into_response())
        }
    }
}

use askama::Template;
use axum::{
    http::{StatusCode, request::Parts},
    extract::FromRequestParts,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    db::StoreError,
    web::{EMPLOYEE, LOGIN_PATH, bill::data::{BillForList, DraftReceipt}},
};

use super::error::Error;

pub struct HtmlTemplate<T>(pub T);

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub error: String,
}

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                tracing::error!("Error rendering template: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error rendering template",
                )
                    .into_response()
            }
        }
    }
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub auth: Auth,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub auth: Auth,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "bills.html")]
pub struct BillsTemplate {
    pub email: String,
    pub bills: Vec<BillForList>,
}

#[derive(Template)]
#[template(path = "new_bill.html")]
pub struct NewBillTemplate {
    pub email: String,
    pub csrf_token: String,
    pub receipt: Option<DraftReceipt>,
}

#[derive(Template)]
#[template(path = "receipt.html")]
pub struct ReceiptTemplate {
    pub file_name: String,
    pub file_url: String,
}

/// The session identity, stored as `{ "type": "Employee", "email": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    #[serde(rename = "type")]
    pub role: String,
    pub email: String,
}

impl Employee {
    pub fn new(email: &str) -> Self {
        Self {
            role: "Employee".to_string(),
            email: email.to_owned(),
        }
    }
}

/// Extractor for pages that require a logged-in employee; anonymous
/// visitors are sent to the login page.
impl<S> FromRequestParts<S> for Employee
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| Redirect::to(LOGIN_PATH))?;
        match session.get::<Employee>(EMPLOYEE).await {
            Ok(Some(employee)) => Ok(employee),
            _ => Err(Redirect::to(LOGIN_PATH)),
        }
    }
}

/// Like [`Employee`], but never rejects; pages open to anonymous visitors
/// use it to render the login/logout navigation.
#[derive(Debug, Clone, Default)]
pub struct Auth {
    pub employee: Option<Employee>,
}

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(session) = Session::from_request_parts(parts, state).await else {
            return Ok(Auth::default());
        };
        let employee = session.get::<Employee>(EMPLOYEE).await.ok().flatten();
        Ok(Auth { employee })
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Error::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            Error::Store(StoreError::Internal) | Error::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        };

        (
            status,
            HtmlTemplate(ErrorTemplate {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect},
};
use tower_sessions::Session;
use tracing::{error, warn};

mod data;

use crate::{
    Ctx,
    web::{
        BILLS_PATH, EMPLOYEE, Result,
        csrf::{gen_csrf, verify_csrf},
        error::Error,
        rate_limit::RealIp,
        templates::{Auth, Employee, HtmlTemplate, LoginTemplate},
        user::data::LoginData,
    },
};

#[tracing::instrument(level = tracing::Level::DEBUG, skip(auth, session))]
pub async fn login(session: Session, auth: Auth) -> Result<impl IntoResponse> {
    tracing::debug!("login called");
    let template = LoginTemplate {
        auth,
        csrf_token: gen_csrf(&session).await.map_err(|_| Error::Internal)?,
    };
    Ok(HtmlTemplate(template))
}

#[tracing::instrument(level = tracing::Level::DEBUG, skip(ctx, session, payload))]
pub async fn do_login(
    RealIp(ip): RealIp,
    session: Session,
    State(ctx): State<Ctx>,
    Form(payload): Form<LoginData>,
) -> Result<impl IntoResponse> {
    tracing::debug!("do login called");
    let mut rate_limiter = ctx.rate_limiter.lock().await;
    let allowed = rate_limiter.check(&ip.to_string());
    drop(rate_limiter);
    if !allowed {
        warn!("Rate limited req from {}", &ip.to_string());
        return Err(Error::TooManyRequests);
    }

    verify_csrf(&payload.csrf_token, &session)
        .await
        .map_err(|_| Error::Unauthorized)?;
    if !payload.validate() {
        return Err(Error::BadRequest("invalid payload".to_string()));
    }

    // add the employee to the session
    session
        .insert(EMPLOYEE, Employee::new(payload.email.trim()))
        .await
        .map_err(|e| {
            error!("error putting employee in session: {e}");
            Error::Internal
        })?;

    Ok(Redirect::to(BILLS_PATH).into_response())
}

#[tracing::instrument(level = tracing::Level::DEBUG, skip(session))]
pub async fn logout(session: Session) -> Result<impl IntoResponse> {
    tracing::debug!("logout called");
    session.delete().await.map_err(|e| {
        error!("Error logging out: {e}");
        Error::Internal
    })?;
    Ok(Redirect::to("/"))
}

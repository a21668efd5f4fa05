use anyhow::anyhow;
use rand::{distr::Alphanumeric, prelude::*};
use tower_sessions::Session;

use crate::web::CSRF_TOKEN;

fn gen_token() -> String {
    let rng = rand::rng();
    rng.sample_iter(&Alphanumeric)
        .take(42)
        .map(char::from)
        .collect()
}

pub async fn gen_csrf(session: &Session) -> Result<String, anyhow::Error> {
    if let Some(session_token) = session.get::<String>(CSRF_TOKEN).await? {
        Ok(session_token)
    } else {
        let token = gen_token();
        session.insert(CSRF_TOKEN, &token).await?;
        Ok(token)
    }
}

pub async fn verify_csrf(csrf_token: &str, session: &Session) -> Result<(), anyhow::Error> {
    if let Some(session_token) = session.get::<String>(CSRF_TOKEN).await? {
        if csrf_token != session_token {
            return Err(anyhow!("invalid csrf"));
        }
    } else {
        return Err(anyhow!("invalid csrf"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_alphanumeric() {
        let token = gen_token();
        assert_eq!(token.len(), 42);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, gen_token());
    }
}

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    pub csrf_token: String,
    pub email: String,
}

impl LoginData {
    pub fn validate(&self) -> bool {
        let email = self.email.trim();
        if email.is_empty() || email.len() > 254 {
            return false;
        }
        // Real address validation belongs to the mail provider; this only
        // keeps obvious garbage out of the session.
        email.contains('@')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(email: &str) -> LoginData {
        LoginData {
            csrf_token: "t".to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn accepts_plausible_addresses_only() {
        assert!(data("john@smith").validate());
        assert!(data("a@a").validate());
        assert!(!data("").validate());
        assert!(!data("   ").validate());
        assert!(!data("no-at-sign").validate());
        assert!(!data(&format!("{}@x", "a".repeat(260))).validate());
    }
}

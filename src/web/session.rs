use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tower_sessions::{
    ExpiredDeletion, SessionStore,
    cookie::time::OffsetDateTime,
    session::{Id, Record},
    session_store,
};

/// Session records held in process memory. Sessions do not survive a
/// restart, which is acceptable here: logging in again is one form away.
#[derive(Default, Clone, Debug)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<Id, Record>>>,
}

fn is_live(record: &Record, now: OffsetDateTime) -> bool {
    record.expiry_date > now
}

#[async_trait()]
impl SessionStore for MemorySessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        let mut sessions = self.sessions.lock().await;
        // regenerate on the (unlikely) id collision
        while sessions.contains_key(&record.id) {
            record.id = Id::default();
        }
        sessions.insert(record.id, record.clone());
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.sessions.lock().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let sessions = self.sessions.lock().await;
        let now = OffsetDateTime::now_utc();
        Ok(sessions
            .get(session_id)
            .filter(|record| is_live(record, now))
            .cloned())
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.sessions.lock().await.remove(session_id);
        Ok(())
    }
}

#[async_trait()]
impl ExpiredDeletion for MemorySessionStore {
    async fn delete_expired(&self) -> session_store::Result<()> {
        let mut sessions = self.sessions.lock().await;
        let now = OffsetDateTime::now_utc();
        let before = sessions.len();
        sessions.retain(|_, record| is_live(record, now));
        tracing::debug!("swept {} expired sessions", before - sessions.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tower_sessions::cookie::time::Duration;

    fn record(expires_in: Duration) -> Record {
        Record {
            id: Id::default(),
            data: HashMap::default(),
            expiry_date: OffsetDateTime::now_utc() + expires_in,
        }
    }

    #[tokio::test]
    async fn loads_what_it_created_until_expiry() {
        let store = MemorySessionStore::default();
        let mut rec = record(Duration::minutes(30));
        store.create(&mut rec).await.expect("create");

        assert!(store.load(&rec.id).await.expect("load").is_some());

        store.delete(&rec.id).await.expect("delete");
        assert!(store.load(&rec.id).await.expect("load").is_none());
    }

    #[tokio::test]
    async fn expired_records_are_not_served_and_get_swept() {
        let store = MemorySessionStore::default();
        let mut rec = record(Duration::minutes(-1));
        store.create(&mut rec).await.expect("create");

        assert!(store.load(&rec.id).await.expect("load").is_none());

        store.delete_expired().await.expect("sweep");
        assert!(store.sessions.lock().await.is_empty());
    }
}

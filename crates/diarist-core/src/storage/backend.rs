use chrono::NaiveDate;

use crate::error::Result;
use crate::model::Session;

/// Persistence for day sessions, keyed by calendar date.
///
/// `save` is an idempotent overwrite: saving the same day twice keeps only
/// the latest snapshot.
pub trait SessionStore: Send + Sync {
    fn save(&self, session: &Session) -> impl std::future::Future<Output = Result<()>> + Send;

    fn load(
        &self,
        date: NaiveDate,
    ) -> impl std::future::Future<Output = Result<Option<Session>>> + Send;

    fn exists(&self, date: NaiveDate) -> impl std::future::Future<Output = Result<bool>> + Send;

    // -- Calendar --

    /// All dates with a saved session, oldest first.
    fn list_dates(&self) -> impl std::future::Future<Output = Result<Vec<NaiveDate>>> + Send;
}

impl<S: SessionStore> SessionStore for std::sync::Arc<S> {
    async fn save(&self, session: &Session) -> Result<()> {
        self.as_ref().save(session).await
    }

    async fn load(&self, date: NaiveDate) -> Result<Option<Session>> {
        self.as_ref().load(date).await
    }

    async fn exists(&self, date: NaiveDate) -> Result<bool> {
        self.as_ref().exists(date).await
    }

    async fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        self.as_ref().list_dates().await
    }
}

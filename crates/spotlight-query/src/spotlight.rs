//! The `Spotlight` hub: one substrate, one notification center, one router

use std::sync::Arc;

use spotlight_core::QueryConfig;

use crate::center::NotificationCenter;
use crate::error::QueryResult;
use crate::extract::ResultSink;
use crate::lifecycle::SpotlightQuery;
use crate::router::NotificationRouter;
use crate::traits::Substrate;

/// Creates queries that share a substrate, notification center and router
pub struct Spotlight {
    substrate: Arc<dyn Substrate>,
    router: Arc<NotificationRouter>,
    center: Arc<NotificationCenter>,
    config: QueryConfig,
}

impl Spotlight {
    /// Hub routed through the process-wide router
    pub fn new(substrate: Arc<dyn Substrate>, config: QueryConfig) -> QueryResult<Self> {
        Self::with_router(substrate, config, NotificationRouter::shared())
    }

    pub fn with_router(
        substrate: Arc<dyn Substrate>,
        config: QueryConfig,
        router: Arc<NotificationRouter>,
    ) -> QueryResult<Self> {
        config.validate()?;
        let center = Arc::new(NotificationCenter::new(router.clone()));
        Ok(Self {
            substrate,
            router,
            center,
            config,
        })
    }

    /// New query delivering each result to `sink`
    pub fn query<S: ResultSink + 'static>(&self, sink: S) -> QueryResult<SpotlightQuery> {
        SpotlightQuery::new(self, Some(Box::new(sink)))
    }

    /// New query without a sink; results are still counted and fetched
    pub fn detached_query(&self) -> QueryResult<SpotlightQuery> {
        SpotlightQuery::new(self, None)
    }

    pub fn substrate(&self) -> &Arc<dyn Substrate> {
        &self.substrate
    }

    pub fn router(&self) -> &Arc<NotificationRouter> {
        &self.router
    }

    pub fn center(&self) -> &Arc<NotificationCenter> {
        &self.center
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::memory::MemorySubstrate;
    use spotlight_core::PollConfig;
    use std::time::Duration;

    #[test]
    fn test_rejects_invalid_config() {
        let config = QueryConfig::default().with_poll(PollConfig::new(Duration::ZERO));
        let result = Spotlight::new(Arc::new(MemorySubstrate::new()), config);
        assert!(matches!(result, Err(QueryError::Config(_))));
    }

    #[test]
    fn test_new_uses_shared_router() {
        let spotlight = Spotlight::new(Arc::new(MemorySubstrate::new()), QueryConfig::default()).unwrap();
        assert!(Arc::ptr_eq(spotlight.router(), &NotificationRouter::shared()));
    }
}

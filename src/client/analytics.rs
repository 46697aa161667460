use chrono::Local;

use super::{api::Api, session::Session};
use crate::{
    error::{Error, Result},
    models::{rank_top_links, LinkStats, PlatformStats},
};

#[derive(Debug, Clone)]
pub struct Analytics {
    api: Api,
}

impl Analytics {
    pub fn new(api: Api) -> Self {
        Self { api }
    }

    /// Click count, dates and the most recent clicks of one link. Only its
    /// owner or an admin may look.
    pub async fn get_stats(&self, session: &Session, short_code: &str) -> Result<LinkStats> {
        let short_code = short_code.trim();
        if short_code.is_empty() {
            return Err(Error::Validation("Short code must not be empty.".into()));
        }

        let ticket = session.ticket()?;
        let result = self.api.link_stats(&ticket.token, short_code).await;
        session.settle(ticket.generation, result)
    }

    /// Platform-wide totals for administrators. "Today" means the caller's
    /// local calendar day.
    pub async fn get_platform_stats(&self, session: &Session) -> Result<PlatformStats> {
        let ticket = session.ticket()?;
        if !ticket.identity.is_admin() {
            return Err(Error::Permission(
                "Only administrators can view platform statistics.".into(),
            ));
        }

        let offset_minutes = Local::now().offset().local_minus_utc() / 60;
        let result = self.api.platform_stats(&ticket.token, offset_minutes).await;
        let mut stats = session.settle(ticket.generation, result)?;

        rank_top_links(&mut stats.top_urls);
        Ok(stats)
    }
}

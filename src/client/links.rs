use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    api::Api,
    session::{Generation, Session},
};
use crate::{
    error::{Error, Result},
    models::{validate_original_url, CreateLinkRequest, ShortLink},
};

/// `{site}/{short_code}`: the address people actually share.
pub fn short_url(site_url: &str, short_code: &str) -> String {
    format!("{}/{}", site_url.trim_end_matches('/'), short_code)
}

/// The last listing fetched, tagged with whose it is.
#[derive(Debug, Clone)]
struct Listing {
    owner: i64,
    generation: Generation,
    items: Vec<ShortLink>,
}

/// Link operations plus the listing currently on screen.
///
/// The held listing is kept newest-first and patched in place by `create`
/// and `delete`, so it matches what a fresh `list` would return without
/// another round trip.
#[derive(Debug, Clone)]
pub struct LinkRegistry {
    api: Api,
    listing: Option<Listing>,
}

impl LinkRegistry {
    pub fn new(api: Api) -> Self {
        Self { api, listing: None }
    }

    /// Shorten `original_url`. Attributed to the signed-in identity, or
    /// unowned when the session is anonymous.
    pub async fn create(&mut self, session: &Session, original_url: &str) -> Result<ShortLink> {
        self.create_with_expiry(session, original_url, None).await
    }

    pub async fn create_with_expiry(
        &mut self,
        session: &Session,
        original_url: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ShortLink> {
        let original_url = validate_original_url(original_url).map_err(Error::Validation)?;
        if expires_at.is_some_and(|at| at <= Utc::now()) {
            return Err(Error::Validation("Expiry must be in the future.".into()));
        }

        let ticket = session.optional_ticket()?;
        let request = CreateLinkRequest {
            original_url,
            expires_at,
        };

        let Some(ticket) = ticket else {
            let link = self.api.create_link(None, &request).await?;
            tracing::debug!(short_code = %link.short_code, "Created anonymous link");
            return Ok(link);
        };

        let result = self.api.create_link(Some(&ticket.token), &request).await;
        let link = session.settle(ticket.generation, result)?;

        if let Some(listing) = self.current_listing_mut(ticket.identity.id, ticket.generation) {
            listing.items.insert(0, link.clone());
        }
        tracing::debug!(short_code = %link.short_code, "Created link");

        Ok(link)
    }

    /// Fetch every link owned by the signed-in identity, newest first, and
    /// hold it as the current listing.
    pub async fn list(&mut self, session: &Session) -> Result<Vec<ShortLink>> {
        let ticket = session.ticket()?;
        let result = self.api.list_links(&ticket.token).await;
        let items = session.settle(ticket.generation, result)?;

        self.listing = Some(Listing {
            owner: ticket.identity.id,
            generation: ticket.generation,
            items: items.clone(),
        });

        Ok(items)
    }

    /// Delete one of the signed-in identity's links.
    ///
    /// A link that is already gone reports `NotFound` and is dropped from the
    /// held listing all the same.
    pub async fn delete(&mut self, session: &Session, id: Uuid) -> Result<()> {
        let ticket = session.ticket()?;
        let result = self.api.delete_link(&ticket.token, id).await;
        let outcome = session.settle(ticket.generation, result);

        if matches!(outcome, Ok(()) | Err(Error::NotFound(_))) {
            if let Some(listing) = self.current_listing_mut(ticket.identity.id, ticket.generation)
            {
                listing.items.retain(|link| link.id != id);
            }
        }

        outcome
    }

    /// The held listing, if it still belongs to the session's current
    /// identity.
    pub fn listing(&self, session: &Session) -> Option<&[ShortLink]> {
        let identity = session.identity()?;
        self.listing
            .as_ref()
            .filter(|l| l.owner == identity.id && l.generation == session.generation())
            .map(|l| l.items.as_slice())
    }

    fn current_listing_mut(&mut self, owner: i64, generation: Generation) -> Option<&mut Listing> {
        self.listing
            .as_mut()
            .filter(|l| l.owner == owner && l.generation == generation)
    }
}

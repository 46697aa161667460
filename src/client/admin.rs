use super::{api::Api, session::Session};
use crate::{
    error::{Error, Result},
    models::{Identity, Role, UserSummary},
};

#[derive(Debug, Clone)]
pub struct RoleAdmin {
    api: Api,
}

impl RoleAdmin {
    pub fn new(api: Api) -> Self {
        Self { api }
    }

    pub async fn list_users(&self, session: &Session) -> Result<Vec<UserSummary>> {
        let ticket = session.ticket()?;
        require_admin(&ticket.identity)?;

        let result = self.api.list_users(&ticket.token).await;
        session.settle(ticket.generation, result)
    }

    /// Promote or demote another account.
    ///
    /// Checks run in a fixed order: the actor must be an admin, `new_role`
    /// must be `admin` or `user`, and the target must not be the actor.
    pub async fn set_role(
        &self,
        session: &Session,
        target_id: i64,
        new_role: &str,
    ) -> Result<Identity> {
        let ticket = session.ticket()?;
        require_admin(&ticket.identity)?;

        let role: Role = new_role
            .parse()
            .map_err(|e: crate::models::InvalidRole| Error::Validation(e.to_string()))?;

        if target_id == ticket.identity.id {
            return Err(Error::Permission("You cannot change your own role.".into()));
        }

        let result = self
            .api
            .set_role(&ticket.token, target_id, role.as_str())
            .await;
        let updated = session.settle(ticket.generation, result)?;
        tracing::info!(target = target_id, role = %updated.role, "Changed role");

        Ok(updated)
    }
}

fn require_admin(identity: &Identity) -> Result<()> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(Error::Permission(
            "Only administrators can manage users.".into(),
        ))
    }
}

//! PAT lifecycle on top of the IdP directory.
//!
//! Each human user is represented in the IdP by one machine user whose
//! username is the human user id. The machine user is created lazily on the
//! first `create_pat` and looked up by username afterwards.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::services::idp::{MachineUser, NewMachineUser, PatDirectory, PersonalAccessToken};
use crate::services::pat::error::PatError;

/// A PAT as seen by the management surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pat {
    pub id: String,
    pub machine_user_id: String,
    pub human_user_id: String,
    pub expiration_date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Pat {
    fn from_idp(pat: PersonalAccessToken, machine_user_id: &str, human_user_id: &str) -> Self {
        Self {
            id: pat.id,
            machine_user_id: machine_user_id.to_string(),
            human_user_id: human_user_id.to_string(),
            expiration_date: pat.expiration_date,
            created_at: pat.created_at,
        }
    }
}

/// Caller identity forwarded by the edge.
#[derive(Debug, Clone, Default)]
pub struct HumanUser {
    pub id: String,
    pub email: String,
    pub preferred_username: String,
}

pub struct PatService {
    directory: Arc<dyn PatDirectory>,
    admin_token: String,
}

impl PatService {
    pub fn new(directory: Arc<dyn PatDirectory>, admin_token: impl Into<String>) -> Self {
        Self {
            directory,
            admin_token: admin_token.into(),
        }
    }

    /// Issues a PAT for `user`, creating its machine user if needed.
    ///
    /// The returned raw token is only visible here.
    pub async fn create_pat(
        &self,
        user: &HumanUser,
        expiration_date: DateTime<Utc>,
    ) -> Result<(Pat, String), PatError> {
        if expiration_date <= Utc::now() {
            return Err(PatError::InvalidExpiration);
        }

        let machine = match self.find_machine_user(&user.id).await? {
            Some(machine) => machine,
            None => self.create_machine_user(user).await?,
        };
        if machine.id.is_empty() {
            return Err(PatError::Inconsistent(
                "machine user has an empty id".to_string(),
            ));
        }

        let (pat, token) = self
            .directory
            .add_personal_access_token(&self.admin_token, &machine.id, expiration_date)
            .await?;

        info!(user_id = %user.id, machine_user_id = %machine.id, pat_id = %pat.id, "PAT created");
        Ok((Pat::from_idp(pat, &machine.id, &user.id), token))
    }

    /// Lists the PATs of `user_id`; a user without a machine user has none.
    pub async fn list_pats(&self, user_id: &str) -> Result<Vec<Pat>, PatError> {
        let Some(machine) = self.find_machine_user(user_id).await? else {
            debug!(user_id, "No machine user yet, no PATs");
            return Ok(Vec::new());
        };

        let pats = self
            .directory
            .list_personal_access_tokens(&self.admin_token, &machine.id)
            .await?;

        Ok(pats
            .into_iter()
            .map(|pat| Pat::from_idp(pat, &machine.id, user_id))
            .collect())
    }

    pub async fn delete_pat(&self, user_id: &str, pat_id: &str) -> Result<(), PatError> {
        let Some(machine) = self.find_machine_user(user_id).await? else {
            return Err(PatError::MachineUserNotFound);
        };

        match self
            .directory
            .remove_personal_access_token(&self.admin_token, &machine.id, pat_id)
            .await
        {
            Ok(()) => {
                info!(user_id, pat_id, "PAT deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => Err(PatError::PatNotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_machine_user(&self, username: &str) -> Result<Option<MachineUser>, PatError> {
        Ok(self
            .directory
            .get_machine_user_by_username(&self.admin_token, username)
            .await?)
    }

    /// Creates the machine user for `user`. A conflict means a concurrent
    /// request created it first; the existing user is fetched instead.
    async fn create_machine_user(&self, user: &HumanUser) -> Result<MachineUser, PatError> {
        let name = if user.preferred_username.is_empty() {
            user.id.clone()
        } else {
            user.preferred_username.clone()
        };
        let new_user = NewMachineUser {
            username: user.id.clone(),
            name,
            description: user.email.clone(),
        };

        match self
            .directory
            .create_machine_user(&self.admin_token, &new_user)
            .await
        {
            Ok(machine) => {
                debug!(user_id = %user.id, machine_user_id = %machine.id, "Machine user created");
                Ok(machine)
            }
            Err(e) if e.is_conflict() => {
                warn!(user_id = %user.id, "Machine user already exists, re-fetching");
                self.find_machine_user(&user.id).await?.ok_or_else(|| {
                    PatError::Inconsistent(
                        "machine user already exists but could not be retrieved".to_string(),
                    )
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::services::idp::client::{MachineUserManager, PatManager};
    use crate::services::idp::{IdpError, MachineUser, NewMachineUser, PersonalAccessToken};

    /// In-memory IdP directory.
    ///
    /// `conflict_on_create` makes the next creation report 409 while a
    /// "concurrent" caller's machine user appears in the directory.
    #[derive(Default)]
    pub struct FakeDirectory {
        pub users: Mutex<HashMap<String, MachineUser>>,
        pub pats: Mutex<Vec<PersonalAccessToken>>,
        pub conflict_on_create: bool,
        pub calls: AtomicUsize,
    }

    impl FakeDirectory {
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn with_machine_user(self, username: &str, id: &str) -> Self {
            self.users.lock().unwrap().insert(
                username.to_string(),
                MachineUser {
                    id: id.to_string(),
                    username: username.to_string(),
                    name: username.to_string(),
                    description: String::new(),
                },
            );
            self
        }

        fn tick(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl MachineUserManager for FakeDirectory {
        async fn get_machine_user_by_username(
            &self,
            _admin_token: &str,
            username: &str,
        ) -> Result<Option<MachineUser>, IdpError> {
            self.tick();
            Ok(self.users.lock().unwrap().get(username).cloned())
        }

        async fn create_machine_user(
            &self,
            _admin_token: &str,
            user: &NewMachineUser,
        ) -> Result<MachineUser, IdpError> {
            self.tick();
            let mut users = self.users.lock().unwrap();
            let id = format!("m-{}", users.len() + 1);
            let machine = MachineUser {
                id,
                username: user.username.clone(),
                name: user.name.clone(),
                description: user.description.clone(),
            };
            users.insert(user.username.clone(), machine.clone());
            if self.conflict_on_create {
                return Err(IdpError::status("create machine user", 409, "already exists"));
            }
            Ok(machine)
        }
    }

    #[async_trait]
    impl PatManager for FakeDirectory {
        async fn add_personal_access_token(
            &self,
            _admin_token: &str,
            user_id: &str,
            expiration_date: DateTime<Utc>,
        ) -> Result<(PersonalAccessToken, String), IdpError> {
            self.tick();
            let mut pats = self.pats.lock().unwrap();
            let pat = PersonalAccessToken {
                id: format!("p-{}", pats.len() + 1),
                user_id: user_id.to_string(),
                expiration_date: Some(expiration_date),
                created_at: Some(Utc::now()),
            };
            pats.push(pat.clone());
            Ok((pat, format!("raw-{user_id}")))
        }

        async fn list_personal_access_tokens(
            &self,
            _admin_token: &str,
            user_id: &str,
        ) -> Result<Vec<PersonalAccessToken>, IdpError> {
            self.tick();
            let pats = self.pats.lock().unwrap();
            Ok(pats.iter().filter(|p| p.user_id == user_id).cloned().collect())
        }

        async fn remove_personal_access_token(
            &self,
            _admin_token: &str,
            user_id: &str,
            pat_id: &str,
        ) -> Result<(), IdpError> {
            self.tick();
            let mut pats = self.pats.lock().unwrap();
            let before = pats.len();
            pats.retain(|p| !(p.user_id == user_id && p.id == pat_id));
            if pats.len() == before {
                return Err(IdpError::status("remove personal access token", 404, "not found"));
            }
            Ok(())
        }
    }
}

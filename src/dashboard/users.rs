//! Directory operations: login, user edits and password tokens

use super::types::*;
use super::{log_user_change, secs, Dashboard};
use crate::access::{branches_for, Viewer};
use crate::auth::{hash_token, issue_token, validate_password};
use crate::error::{DashboardError, DashboardResult};
use crate::model::{Role, User, UserView};
use crate::notify::{set_password_link, AccessLink, LinkKind};
use crate::observability::metrics::metrics;
use chrono::{Duration, Utc};
use std::collections::BTreeSet;
use tracing::{info, warn};

impl Dashboard {
    fn viewer_for(&self, user: &User) -> Viewer {
        Viewer::new(
            user.name.clone(),
            user.role,
            branches_for(user.role, &user.branch, &self.config.branches),
        )
    }

    /// Log in by name or e-mail
    pub async fn login(&self, request: LoginRequest) -> DashboardResult<LoginResponse> {
        let (Some(login), Some(password)) = (present(&request.user_id), request.password.as_deref())
        else {
            return Err(DashboardError::invalid_input("Missing credentials"));
        };
        if password.is_empty() {
            return Err(DashboardError::invalid_input("Missing credentials"));
        }

        let result = self.authenticate(login, password).await;
        match &result {
            Ok(_) => metrics().login_succeeded(),
            Err(e) => {
                warn!(user = login, error = %e, "Login failed");
                metrics().login_failed();
            }
        }
        result
    }

    async fn authenticate(&self, login: &str, password: &str) -> DashboardResult<LoginResponse> {
        let users = self.store.users().await?;
        let user = users
            .iter()
            .find(|u| u.email_matches(login))
            .or_else(|| users.iter().find(|u| u.name_matches(login)))
            .ok_or_else(|| DashboardError::unauthorized("Invalid user or password"))?;

        let Some(password_hash) = user.password_hash.as_deref() else {
            return Err(DashboardError::unauthorized(
                "User account not fully set up for password login. Please contact an admin.",
            ));
        };
        if !self.hasher.verify(password, password_hash) {
            return Err(DashboardError::unauthorized("Invalid user or password"));
        }
        if user.inactive {
            return Err(DashboardError::forbidden(
                "User account is inactive. Please contact an admin.",
            ));
        }

        let viewer = self.viewer_for(user);
        let (token, expires_at) = self.sessions.create(viewer.clone(), &user.id).await;
        info!(user = %user.name, role = %user.role, "Login succeeded");

        Ok(LoginResponse {
            ok: true,
            branches: viewer.branches.clone(),
            token,
            expires_at,
            user: user.view(),
            viewer,
        })
    }

    /// End the session behind `token`
    pub async fn logout(&self, token: &str) -> bool {
        self.sessions.revoke(token).await
    }

    pub async fn users(&self) -> DashboardResult<Vec<UserView>> {
        Ok(self.store.users().await?.iter().map(User::view).collect())
    }

    /// Distinct user names, sorted
    pub async fn bde_names(&self) -> DashboardResult<Vec<String>> {
        let users = self.store.users().await?;
        let names: BTreeSet<String> = users.into_iter().map(|u| u.name).collect();
        Ok(names.into_iter().collect())
    }

    /// Distinct roles present in the directory, sorted by name
    pub async fn roles(&self) -> DashboardResult<Vec<Role>> {
        let users = self.store.users().await?;
        let mut roles: Vec<Role> = users.iter().map(|u| u.role).collect();
        roles.sort_by_key(|r| r.name());
        roles.dedup();
        Ok(roles)
    }

    pub async fn update_user(
        &self,
        name: &str,
        request: UpdateUserRequest,
    ) -> DashboardResult<MessageResponse> {
        if !request.has_update() {
            return Err(DashboardError::invalid_input(
                "At least one field must be provided for update.",
            ));
        }
        let new_name = match request.name.as_deref().map(str::trim) {
            Some("") => {
                return Err(DashboardError::invalid_input(
                    "Invalid \"name\" field in request body.",
                ))
            }
            other => other.map(str::to_string),
        };
        let email = match &request.email {
            Some(Some(email)) if !email.trim().is_empty() && !email.contains('@') => {
                return Err(DashboardError::invalid_input(
                    "Invalid \"email\" field in request body.",
                ))
            }
            Some(email) => Some(email.as_deref().map(str::trim).filter(|e| !e.is_empty())),
            None => None,
        };
        let role = match request.role.as_deref() {
            Some(raw) => Some(Role::parse(raw).filter(|r| r.is_assignable()).ok_or_else(|| {
                DashboardError::invalid_input("Invalid \"role\" field in request body.")
            })?),
            None => None,
        };
        if let Some(branch) = request.new_branch.as_deref() {
            if !self.config.is_known_branch(branch) {
                return Err(DashboardError::invalid_input(
                    "Invalid \"branch\" field in request body.",
                ));
            }
        }
        if let Some(password) = request.password.as_deref() {
            if validate_password(password).is_err() {
                return Err(DashboardError::invalid_input(
                    "Password must be a string with at least 6 characters.",
                ));
            }
        }
        let Some(search_branch) = present(&request.branch).or(present(&request.new_branch)) else {
            return Err(DashboardError::invalid_input(
                "Either current \"branch\" or new \"branch\" field must be provided.",
            ));
        };

        let _guard = self.writes.lock().await;
        let users = self.store.users().await?;
        let Some(existing) = users
            .iter()
            .find(|u| u.branch == search_branch && u.name_matches(name))
        else {
            return Err(DashboardError::not_found(format!(
                "User \"{name}\" not found in branch \"{search_branch}\"."
            )));
        };

        let mut user = existing.clone();
        if let Some(new_name) = &new_name {
            user.name = new_name.clone();
        }
        if let Some(email) = email {
            user.email = email.map(str::to_string);
        }
        if let Some(role) = role {
            user.role = role;
        }
        if let Some(branch) = &request.new_branch {
            user.branch = branch.clone();
        }
        if let Some(inactive) = request.inactive {
            user.inactive = inactive;
        }
        if let Some(password) = &request.password {
            user.password_hash = Some(self.hasher.hash(password));
        }

        if user != *existing {
            self.store.save_user(user.clone()).await?;
            log_user_change("update", &user);

            // Carry renames and branch moves over to the user's records
            if user.name != existing.name || user.branch != existing.branch {
                let (old_name, old_branch) = (existing.name.clone(), existing.branch.clone());
                let (name, branch) = (user.name.clone(), user.branch.clone());
                let moved = self
                    .store
                    .update_records(
                        &|r| r.bde_name == old_name && r.branch == old_branch,
                        &|r| {
                            r.bde_name = name.clone();
                            r.branch = branch.clone();
                        },
                    )
                    .await?;
                info!(from = %old_name, to = %user.name, records = moved, "Records follow user change");
            }
            // Sessions hold the viewer as of login
            let identity_changed = user.name != existing.name
                || user.role != existing.role
                || user.branch != existing.branch;
            if request.password.is_some() || user.inactive || identity_changed {
                self.sessions.revoke_user(&user.id).await;
            }
        }

        if let (Some(current), Some(team)) = (request.is_current_team_member, present(&request.team_name)) {
            self.set_team_membership(&user, team, current).await?;
        }

        Ok(MessageResponse::ok(format!(
            "User \"{}\" updated successfully.",
            existing.name
        )))
    }

    /// Mark `user`'s records in `team` as current or not. Marking a team
    /// current clears the flag on every other team of the user.
    async fn set_team_membership(&self, user: &User, team: &str, current: bool) -> DashboardResult<()> {
        let in_team = |r: &crate::model::SalesRecord| r.team_name == team || r.team_leader == team;
        let is_user = |r: &crate::model::SalesRecord| {
            r.branch == user.branch && r.bde_name.to_lowercase() == user.name.to_lowercase()
        };

        if current {
            self.store
                .update_records(&|r| is_user(r) && !in_team(r), &|r| {
                    r.is_current_team_member = Some(false)
                })
                .await?;
        }
        let matched = self
            .store
            .update_records(&|r| is_user(r) && in_team(r), &|r| {
                r.is_current_team_member = Some(current)
            })
            .await?;
        if matched == 0 {
            warn!(user = %user.name, team, "No sales records found for team membership change");
        }
        Ok(())
    }

    pub async fn update_role(&self, request: UpdateRoleRequest) -> DashboardResult<MessageResponse> {
        let (Some(name), Some(branch), Some(raw_role)) = (
            present(&request.name),
            present(&request.branch),
            present(&request.new_role),
        ) else {
            return Err(DashboardError::invalid_input(
                "Missing required fields: name, branch, newRole",
            ));
        };
        let role = Role::parse(raw_role)
            .ok_or_else(|| DashboardError::invalid_input(format!("Invalid role \"{raw_role}\".")))?;

        let _guard = self.writes.lock().await;
        let selects = |u: &User| u.name_matches(name) && u.branch.eq_ignore_ascii_case(branch);
        let affected: Vec<String> = self
            .store
            .users()
            .await?
            .into_iter()
            .filter(|u| selects(u))
            .map(|u| u.id)
            .collect();
        let matched = self.store.update_users(&selects, &|u| u.role = role).await?;
        if matched == 0 {
            return Err(DashboardError::not_found(format!(
                "User \"{name}\" in branch \"{branch}\" not found."
            )));
        }
        for id in &affected {
            self.sessions.revoke_user(id).await;
        }

        info!(user = name, branch, role = %role, "Role updated");
        Ok(MessageResponse::ok(format!(
            "User \"{name}\" role updated successfully to \"{role}\"."
        )))
    }

    /// Create a user, or with `createdByAdmin` overwrite an existing one's
    /// e-mail, password and branch. A password set-up link is always issued.
    pub async fn create_user(&self, request: CreateUserRequest) -> DashboardResult<CreateUserResponse> {
        let (Some(name), Some(email), Some(password), Some(raw_role), Some(branch)) = (
            present(&request.name),
            present(&request.email),
            request.password.as_deref().filter(|p| !p.is_empty()),
            present(&request.role),
            present(&request.branch),
        ) else {
            return Err(DashboardError::invalid_input(
                "Missing required fields: name, email, password, role, branch",
            ));
        };
        let role = Role::parse(raw_role)
            .ok_or_else(|| DashboardError::invalid_input(format!("Invalid role \"{raw_role}\".")))?;

        let _guard = self.writes.lock().await;
        let users = self.store.users().await?;
        let has_records = self
            .store
            .records()
            .await?
            .iter()
            .any(|r| r.bde_name == name);

        let issued = issue_token(Duration::seconds(secs(self.config.auth.reset_token_ttl_secs)));
        let existing = users.iter().find(|u| u.name_matches(name));

        let user = match existing {
            Some(_) if !request.created_by_admin => {
                return Err(DashboardError::invalid_input(
                    "User with this name already exists",
                ))
            }
            // Name and role stay as they are
            Some(existing) => User {
                email: Some(email.to_string()),
                password_hash: Some(self.hasher.hash(password)),
                branch: branch.to_string(),
                inactive: false,
                has_performance_data: has_records,
                reset_token_hash: Some(issued.hash.clone()),
                reset_token_expires: Some(issued.expires),
                ..existing.clone()
            },
            None => User {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.to_string(),
                email: Some(email.to_string()),
                role,
                branch: branch.to_string(),
                inactive: false,
                is_current_team_member: true,
                password_hash: Some(self.hasher.hash(password)),
                reset_token_hash: Some(issued.hash.clone()),
                reset_token_expires: Some(issued.expires),
                has_performance_data: has_records,
            },
        };
        self.store.save_user(user.clone()).await?;
        if existing.is_some() {
            self.sessions.revoke_user(&user.id).await;
        }
        log_user_change(if existing.is_some() { "overwrite" } else { "create" }, &user);

        self.notifier
            .send(&AccessLink {
                kind: LinkKind::PasswordSetup,
                name: user.name.clone(),
                email: user.email.clone(),
                role: user.role.to_string(),
                link: set_password_link(self.config.server.frontend_url.as_deref(), &issued.token),
            })
            .await;

        Ok(CreateUserResponse {
            success: true,
            message: if existing.is_some() {
                "User updated successfully (admin overwrite). Reset email sent.".to_string()
            } else {
                "User created successfully. Reset email sent.".to_string()
            },
            id: user.id,
            linked_to_existing_data: has_records,
        })
    }

    /// Issue 24-hour access links for the named users
    pub async fn send_access_emails(
        &self,
        request: AccessEmailRequest,
    ) -> DashboardResult<AccessEmailResponse> {
        let names = match request.user_ids {
            Some(names) if !names.is_empty() => names,
            _ => {
                return Err(DashboardError::invalid_input(
                    "Missing or invalid userIds array",
                ))
            }
        };

        let _guard = self.writes.lock().await;
        let users: Vec<User> = self
            .store
            .users()
            .await?
            .into_iter()
            .filter(|u| names.contains(&u.name))
            .collect();
        if users.is_empty() {
            return Err(DashboardError::not_found("No users found"));
        }

        let ttl = Duration::seconds(secs(self.config.auth.access_token_ttl_secs));
        let mut entries = Vec::with_capacity(users.len());
        for mut user in users {
            let issued = issue_token(ttl);
            user.reset_token_hash = Some(issued.hash);
            user.reset_token_expires = Some(issued.expires);
            self.store.save_user(user.clone()).await?;

            let link = AccessLink {
                kind: LinkKind::Access,
                name: user.name.clone(),
                email: user.email.clone(),
                role: user.role.to_string(),
                link: set_password_link(self.config.server.frontend_url.as_deref(), &issued.token),
            };
            self.notifier.send(&link).await;
            entries.push(AccessLinkEntry {
                name: link.name,
                email: link.email,
                reset_link: link.link,
            });
        }

        Ok(AccessEmailResponse {
            success: true,
            message: format!("Access emails prepared for {} users", entries.len()),
            users: entries,
        })
    }

    async fn user_for_token(&self, token: &str) -> DashboardResult<User> {
        let hash = hash_token(token);
        let now = Utc::now();
        self.store
            .users()
            .await?
            .into_iter()
            .find(|u| {
                u.reset_token_hash.as_deref() == Some(hash.as_str())
                    && u.reset_token_expires.is_some_and(|expires| expires > now)
            })
            .ok_or_else(|| DashboardError::invalid_input("Invalid or expired token"))
    }

    pub async fn validate_token(&self, token: &str) -> DashboardResult<TokenUserResponse> {
        if token.trim().is_empty() {
            return Err(DashboardError::invalid_input("Missing token"));
        }
        let user = self.user_for_token(token).await?;
        Ok(TokenUserResponse {
            success: true,
            user: TokenUser {
                name: user.name,
                email: user.email,
                role: user.role,
                branch: user.branch,
            },
        })
    }

    async fn apply_password(&self, token: &str, password: &str) -> DashboardResult<()> {
        validate_password(password)?;
        let _guard = self.writes.lock().await;
        let mut user = self.user_for_token(token).await?;
        user.password_hash = Some(self.hasher.hash(password));
        user.reset_token_hash = None;
        user.reset_token_expires = None;
        self.store.save_user(user.clone()).await?;
        self.sessions.revoke_user(&user.id).await;
        log_user_change("password", &user);
        Ok(())
    }

    pub async fn set_password(
        &self,
        token: &str,
        request: SetPasswordRequest,
    ) -> DashboardResult<PasswordResponse> {
        let Some(password) = request.password.as_deref().filter(|p| !p.is_empty()) else {
            return Err(DashboardError::invalid_input("Missing token or password"));
        };
        if token.trim().is_empty() {
            return Err(DashboardError::invalid_input("Missing token or password"));
        }
        self.apply_password(token, password).await?;
        Ok(PasswordResponse {
            success: true,
            message: "Password set successfully. You can now log in.".to_string(),
            redirect_to: String::new(),
        })
    }

    pub async fn reset_password(&self, request: ResetPasswordRequest) -> DashboardResult<PasswordResponse> {
        let (Some(token), Some(password)) = (
            present(&request.token),
            request.new_password.as_deref().filter(|p| !p.is_empty()),
        ) else {
            return Err(DashboardError::invalid_input("Missing token or newPassword"));
        };
        self.apply_password(token, password).await?;
        Ok(PasswordResponse {
            success: true,
            message: "Password reset successfully. You can now log in.".to_string(),
            redirect_to: self
                .config
                .server
                .frontend_url
                .clone()
                .unwrap_or_else(|| "/".to_string()),
        })
    }

    /// Create listed users that are missing and give a password to listed
    /// users that have none. Users that already have a password are skipped.
    pub async fn bootstrap_users(&self, file: BootstrapFile) -> DashboardResult<BootstrapReport> {
        let _guard = self.writes.lock().await;
        let users = self.store.users().await?;
        let mut report = BootstrapReport::default();

        for entry in file.users {
            let role = Role::parse(&entry.role).ok_or_else(|| {
                DashboardError::invalid_input(format!(
                    "Invalid role \"{}\" for user \"{}\"",
                    entry.role, entry.name
                ))
            })?;
            validate_password(&entry.password)?;

            match users
                .iter()
                .find(|u| u.branch == entry.branch && u.name_matches(&entry.name))
            {
                Some(existing) if existing.password_hash.is_some() => report.skipped += 1,
                Some(existing) => {
                    let mut user = existing.clone();
                    user.password_hash = Some(self.hasher.hash(&entry.password));
                    if user.email.is_none() {
                        user.email = entry.email.clone();
                    }
                    self.store.save_user(user.clone()).await?;
                    log_user_change("bootstrap-password", &user);
                    report.passwords_set += 1;
                }
                None => {
                    let mut user = User::derived(&entry.name, role, &entry.branch);
                    user.has_performance_data = false;
                    user.email = entry.email.clone();
                    user.password_hash = Some(self.hasher.hash(&entry.password));
                    self.store.save_user(user.clone()).await?;
                    log_user_change("bootstrap-create", &user);
                    report.created += 1;
                }
            }
        }

        info!(
            created = report.created,
            passwords_set = report.passwords_set,
            skipped = report.skipped,
            "User bootstrap complete"
        );
        Ok(report)
    }
}

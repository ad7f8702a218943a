//! User accounts: lookups, profile edits, admin management and bulk import.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use utoipa::ToSchema;

use crate::error::{AppError, Result};
use crate::models::catalog::Department;
use crate::models::role::{Role, RoleRow};
use crate::models::user::{GuestStatus, User, USER_SELECT};
use crate::services::auth_service::hash_password;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Fields for inserting a user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub dept_id: Option<i64>,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub q: Option<String>,
    pub role_id: Option<i64>,
    pub dept_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub full_name: String,
    pub username: Option<String>,
    pub email: String,
    pub password: String,
    pub role_id: i64,
    pub dept_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub full_name: String,
    pub username: Option<String>,
    pub email: String,
    pub role_id: i64,
    pub dept_id: Option<i64>,
}

/// One student created by a bulk upload, with the password that was set.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedStudent {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub dept_name: String,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct BulkUploadResult {
    pub created: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub created_entries: Vec<CreatedStudent>,
}

/// Lower-case, trim, and turn spaces and dashes into underscores.
pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace([' ', '-'], "_")
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub struct UserService {
    db: SqlitePool,
}

impl UserService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let sql = format!("{} WHERE u.user_id = ?", USER_SELECT);
        sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn get_by_id(&self, user_id: i64) -> Result<User> {
        self.find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("{} WHERE u.email = ?", USER_SELECT);
        sqlx::query_as(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("{} WHERE u.username = ?", USER_SELECT);
        sqlx::query_as(&sql)
            .bind(username)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn email_taken(&self, email: &str, exclude_user: Option<i64>) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? AND user_id != ?")
                .bind(email)
                .bind(exclude_user.unwrap_or(-1))
                .fetch_one(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    pub async fn username_taken(&self, username: &str, exclude_user: Option<i64>) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ? AND user_id != ?")
                .bind(username)
                .bind(exclude_user.unwrap_or(-1))
                .fetch_one(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    pub async fn list_roles(&self) -> Result<Vec<RoleRow>> {
        sqlx::query_as("SELECT role_id, role_name FROM roles ORDER BY role_name")
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Resolve the `roles` row for a canonical role.
    pub async fn role_id(&self, role: Role) -> Result<i64> {
        self.list_roles()
            .await?
            .into_iter()
            .find(|r| Role::from_name(&r.role_name) == Some(role))
            .map(|r| r.role_id)
            .ok_or_else(|| AppError::Internal(format!("Role {} is not seeded", role.as_str())))
    }

    async fn role_by_id(&self, role_id: i64) -> Result<Role> {
        let name: Option<String> =
            sqlx::query_scalar("SELECT role_name FROM roles WHERE role_id = ?")
                .bind(role_id)
                .fetch_optional(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        name.as_deref()
            .and_then(Role::from_name)
            .ok_or_else(|| AppError::Validation("Invalid role selected.".to_string()))
    }

    /// Users holding `role`, optionally restricted to a department.
    pub async fn users_with_role(&self, role: Role, dept_id: Option<i64>) -> Result<Vec<User>> {
        let role_id = self.role_id(role).await?;
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(USER_SELECT);
        qb.push(" WHERE u.role_id = ").push_bind(role_id);
        if let Some(dept_id) = dept_id {
            qb.push(" AND u.dept_id = ").push_bind(dept_id);
        }
        qb.push(" ORDER BY u.user_id");
        qb.build_query_as()
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User> {
        let role_id = self.role_id(new_user.role).await?;
        let result = sqlx::query(
            r#"
            INSERT INTO users (full_name, username, email, password, role_id, dept_id,
                               created_at, expiry_date, guest_status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new_user.full_name)
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(role_id)
        .bind(new_user.dept_id)
        .bind(Utc::now())
        .bind(new_user.expiry_date)
        .bind(GuestStatus::Active.as_str())
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.get_by_id(result.last_insert_rowid()).await
    }

    pub async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password = ? WHERE user_id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn set_guest_status(&self, user_id: i64, status: GuestStatus) -> Result<()> {
        sqlx::query("UPDATE users SET guest_status = ? WHERE user_id = ?")
            .bind(status.as_str())
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn set_username(&self, user_id: i64, username: &str) -> Result<()> {
        sqlx::query("UPDATE users SET username = ? WHERE user_id = ?")
            .bind(username)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Apply a self-service profile edit.
    ///
    /// Students keep their name and username; guests keep their email and
    /// username; privileged staff keep their username.
    pub async fn update_profile(&self, user: &User, req: UpdateProfileRequest) -> Result<User> {
        let email = req.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AppError::Validation("Email is required.".to_string()));
        }

        let role = user.role();
        let is_guest = role == Some(Role::Guest);
        let is_student = role == Some(Role::Student);

        let mut full_name = user.full_name.clone();
        let mut username = user.username.clone();

        if !is_student {
            let requested_name = req.full_name.as_deref().map(str::trim).unwrap_or("");
            if requested_name.is_empty() {
                return Err(AppError::Validation("Name is required.".to_string()));
            }
            full_name = requested_name.to_string();

            let may_change_username = !is_guest
                && !matches!(
                    role,
                    Some(Role::Admin | Role::Hod | Role::Principal | Role::Organizer)
                );
            if let Some(requested) = non_empty(req.username.as_deref()) {
                if may_change_username && Some(&requested) != user.username.as_ref() {
                    if self.username_taken(&requested, Some(user.user_id)).await? {
                        return Err(AppError::Conflict(
                            "Username already in use. Please choose another.".to_string(),
                        ));
                    }
                    username = Some(requested);
                }
            }
        }

        let current_email = user.email.clone().unwrap_or_default();
        if email != current_email {
            if is_guest {
                return Err(AppError::Validation(
                    "Guest email cannot be changed. Please contact an administrator.".to_string(),
                ));
            }
            if self.email_taken(&email, Some(user.user_id)).await? {
                return Err(AppError::Conflict(
                    "Email already in use. Please choose another.".to_string(),
                ));
            }
        }

        sqlx::query("UPDATE users SET full_name = ?, username = ?, email = ? WHERE user_id = ?")
            .bind(&full_name)
            .bind(&username)
            .bind(&email)
            .bind(user.user_id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.get_by_id(user.user_id).await
    }

    pub async fn list_users(&self, query: &UserListQuery) -> Result<Vec<User>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(USER_SELECT);
        qb.push(" WHERE 1 = 1");
        if let Some(search) = non_empty(query.q.as_deref()) {
            let like = format!("%{}%", search);
            qb.push(" AND (u.full_name LIKE ")
                .push_bind(like.clone())
                .push(" OR u.email LIKE ")
                .push_bind(like.clone())
                .push(" OR u.username LIKE ")
                .push_bind(like)
                .push(")");
        }
        if let Some(role_id) = query.role_id {
            qb.push(" AND u.role_id = ").push_bind(role_id);
        }
        if let Some(dept_id) = query.dept_id {
            qb.push(" AND u.dept_id = ").push_bind(dept_id);
        }
        qb.push(" ORDER BY u.created_at DESC, u.user_id DESC");

        qb.build_query_as()
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Enforce the staffing rules for a role assignment: no Admin via the
    /// API, a HOD needs a department with no other HOD, at most one Principal.
    async fn check_role_assignment(
        &self,
        role: Role,
        dept_id: Option<i64>,
        exclude_user: Option<i64>,
    ) -> Result<()> {
        match role {
            Role::Admin => Err(AppError::Validation(
                "Cannot assign the Admin role via this interface.".to_string(),
            )),
            Role::Hod => {
                let dept_id = dept_id.ok_or_else(|| {
                    AppError::Validation("Please select a department for HOD.".to_string())
                })?;
                let existing = self.users_with_role(Role::Hod, Some(dept_id)).await?;
                if existing.iter().any(|u| Some(u.user_id) != exclude_user) {
                    return Err(AppError::Conflict(
                        "A HOD already exists for the selected department.".to_string(),
                    ));
                }
                Ok(())
            }
            Role::Principal => {
                let existing = self.users_with_role(Role::Principal, None).await?;
                if existing.iter().any(|u| Some(u.user_id) != exclude_user) {
                    return Err(AppError::Conflict(
                        "A Principal account already exists.".to_string(),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub async fn create_user_admin(&self, req: CreateUserRequest, bcrypt_cost: u32) -> Result<User> {
        let full_name = req.full_name.trim().to_string();
        let email = req.email.trim().to_lowercase();
        let username = non_empty(req.username.as_deref());

        if full_name.is_empty() || email.is_empty() || req.password.is_empty() {
            return Err(AppError::Validation(
                "Please fill all required fields for user creation.".to_string(),
            ));
        }
        if req.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(
                "Password must be at least 8 characters long.".to_string(),
            ));
        }

        let role = self.role_by_id(req.role_id).await?;
        if role == Role::Admin {
            return Err(AppError::Validation(
                "Cannot create Admin accounts via this interface.".to_string(),
            ));
        }
        if self.email_taken(&email, None).await? {
            return Err(AppError::Conflict(
                "Email already exists. Please use a different email.".to_string(),
            ));
        }
        if let Some(username) = &username {
            if self.username_taken(username, None).await? {
                return Err(AppError::Conflict(
                    "Username already exists. Please use a different username.".to_string(),
                ));
            }
        }
        self.check_role_assignment(role, req.dept_id, None).await?;

        self.create(NewUser {
            full_name,
            username,
            email: Some(email),
            password_hash: hash_password(&req.password, bcrypt_cost)?,
            role,
            dept_id: req.dept_id,
            expiry_date: None,
        })
        .await
    }

    pub async fn update_user_admin(&self, user_id: i64, req: UpdateUserRequest) -> Result<User> {
        let user = self.get_by_id(user_id).await?;
        let full_name = req.full_name.trim().to_string();
        let email = req.email.trim().to_lowercase();
        let username = non_empty(req.username.as_deref());

        if full_name.is_empty() || email.is_empty() {
            return Err(AppError::Validation(
                "Full name, email, and role are required.".to_string(),
            ));
        }

        let role = self.role_by_id(req.role_id).await?;
        self.check_role_assignment(role, req.dept_id, Some(user.user_id))
            .await?;

        if let Some(username) = &username {
            if self.username_taken(username, Some(user.user_id)).await? {
                return Err(AppError::Conflict(
                    "Username already exists. Please use a different username.".to_string(),
                ));
            }
        }
        if self.email_taken(&email, Some(user.user_id)).await? {
            return Err(AppError::Conflict(
                "Email already exists. Please use a different email.".to_string(),
            ));
        }

        sqlx::query(
            r#"
            UPDATE users SET full_name = ?, username = ?, email = ?, role_id = ?, dept_id = ?
            WHERE user_id = ?
            "#,
        )
        .bind(&full_name)
        .bind(&username)
        .bind(&email)
        .bind(req.role_id)
        .bind(req.dept_id)
        .bind(user.user_id)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.get_by_id(user.user_id).await
    }

    /// Delete an account and everything it owns. Admins cannot be deleted,
    /// nor can the caller delete themselves.
    pub async fn delete_user(&self, user_id: i64, actor_id: i64) -> Result<()> {
        if user_id == actor_id {
            return Err(AppError::Validation(
                "You cannot delete your own account.".to_string(),
            ));
        }
        let user = self.get_by_id(user_id).await?;
        if user.has_role(Role::Admin) {
            return Err(AppError::Authorization(
                "Admin accounts cannot be deleted.".to_string(),
            ));
        }
        self.purge(user_id).await
    }

    /// Remove a user row together with dependent rows.
    pub async fn purge(&self, user_id: i64) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for statement in [
            "DELETE FROM attendance WHERE scanned_by = ?",
            "DELETE FROM team_invitations WHERE invitee_id = ?",
            "DELETE FROM registrations WHERE student_id = ?",
            "DELETE FROM teams WHERE leader_id = ?",
            "DELETE FROM certificates WHERE student_id = ?",
            "DELETE FROM feedback WHERE student_id = ?",
            "DELETE FROM approvals WHERE approver_id = ?",
            "DELETE FROM events WHERE organizer_id = ?",
            "DELETE FROM users WHERE user_id = ?",
        ] {
            sqlx::query(statement)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn departments(&self) -> Result<Vec<Department>> {
        sqlx::query_as("SELECT dept_id, dept_name FROM departments ORDER BY dept_name")
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create student accounts from CSV text.
    ///
    /// Rows missing a name or email, duplicating an existing email or
    /// username, or lacking a usable password are skipped.
    pub async fn bulk_upload_students(
        &self,
        csv_text: &str,
        default_password: &str,
        bcrypt_cost: u32,
    ) -> Result<BulkUploadResult> {
        let departments = self.departments().await?;
        let dept_by_name: HashMap<String, i64> = departments
            .iter()
            .map(|d| (d.dept_name.trim().to_lowercase(), d.dept_id))
            .collect();
        let dept_name_by_id: HashMap<i64, String> = departments
            .iter()
            .map(|d| (d.dept_id, d.dept_name.clone()))
            .collect();

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(csv_text.as_bytes());
        let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();

        let mut result = BulkUploadResult::default();

        for record in reader.records() {
            let record = record?;
            let row: HashMap<&str, &str> = headers
                .iter()
                .map(String::as_str)
                .zip(record.iter())
                .collect();
            let field = |key: &str| non_empty(row.get(key).copied());

            let full_name = field("full_name");
            let email = field("email").map(|e| e.to_lowercase());
            let (Some(full_name), Some(email)) = (full_name, email) else {
                result.skipped += 1;
                result.errors.push("Missing full_name or email".to_string());
                continue;
            };
            let username = field("username")
                .or_else(|| field("reg_no"))
                .or_else(|| field("registration_no"));

            if self.email_taken(&email, None).await? {
                result.skipped += 1;
                continue;
            }
            if let Some(username) = &username {
                if self.username_taken(username, None).await? {
                    result.skipped += 1;
                    result
                        .errors
                        .push(format!("Duplicate username for {}", email));
                    continue;
                }
            }

            let password = field("password")
                .or_else(|| non_empty(Some(default_password)))
                .unwrap_or_default();
            if password.is_empty() {
                result.skipped += 1;
                result.errors.push(format!("Missing password for {}", email));
                continue;
            }
            if password.chars().count() < MIN_PASSWORD_LEN {
                result.skipped += 1;
                result
                    .errors
                    .push(format!("Password too short for {} (min 8 chars)", email));
                continue;
            }

            let dept_name_field = field("dept_name").or_else(|| field("department"));
            let dept_id = match field("dept_id") {
                Some(raw) => raw.parse::<i64>().ok(),
                None => dept_name_field
                    .as_ref()
                    .and_then(|name| dept_by_name.get(&name.to_lowercase()).copied()),
            };

            self.create(NewUser {
                full_name: full_name.clone(),
                username: username.clone(),
                email: Some(email.clone()),
                password_hash: hash_password(&password, bcrypt_cost)?,
                role: Role::Student,
                dept_id,
                expiry_date: None,
            })
            .await?;

            result.created += 1;
            result.created_entries.push(CreatedStudent {
                full_name,
                username: username.unwrap_or_default(),
                email,
                password,
                dept_name: dept_id
                    .and_then(|id| dept_name_by_id.get(&id).cloned())
                    .or(dept_name_field)
                    .unwrap_or_default(),
            });
        }

        tracing::info!(
            created = result.created,
            skipped = result.skipped,
            "Bulk student upload processed"
        );
        Ok(result)
    }

    /// CSV template for the bulk upload, pre-filled with a department name.
    /// Returns `(file_name, csv_text)`.
    pub async fn bulk_template(&self, dept_id: Option<i64>) -> Result<(String, String)> {
        let mut dept_name = "Department".to_string();
        if let Some(dept_id) = dept_id {
            let name: Option<String> =
                sqlx::query_scalar("SELECT dept_name FROM departments WHERE dept_id = ?")
                    .bind(dept_id)
                    .fetch_optional(&self.db)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
            if let Some(name) = name {
                dept_name = name;
            }
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["full_name", "username", "email", "dept_name", "password"])?;
        writer.write_record([
            "Student Name",
            "22CS001",
            "student@campus.edu",
            dept_name.as_str(),
            "Student@123",
        ])?;
        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let body = String::from_utf8(bytes).map_err(|e| AppError::Internal(e.to_string()))?;

        Ok((
            format!("student_template_{}.csv", dept_name.replace(' ', "_")),
            body,
        ))
    }
}

//! Reference data and demo accounts written during startup.
//!
//! Every insert is insert-or-ignore, so seeding an already prepared
//! database is a no-op.

use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::models::role::Role;
use crate::services::auth_service::hash_password;

/// A demonstration login printed by the launcher and created by the seeder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoAccount {
    /// Label shown in the credential banner
    pub label: &'static str,
    pub role: Role,
    pub full_name: &'static str,
    pub email: &'static str,
    pub password: &'static str,
    pub department: Option<&'static str>,
}

pub const DEMO_ACCOUNTS: [DemoAccount; 5] = [
    DemoAccount {
        label: "Admin",
        role: Role::Admin,
        full_name: "System Administrator",
        email: "admin@campus.edu",
        password: "admin123",
        department: None,
    },
    DemoAccount {
        label: "Principal",
        role: Role::Principal,
        full_name: "College Principal",
        email: "principal@campus.edu",
        password: "principal123",
        department: None,
    },
    DemoAccount {
        label: "HOD",
        role: Role::Hod,
        full_name: "HOD Computer Science",
        email: "hod.cse@campus.edu",
        password: "hod12345",
        department: Some("Computer Science"),
    },
    DemoAccount {
        label: "Organizer",
        role: Role::Organizer,
        full_name: "Event Organizer",
        email: "organizer@campus.edu",
        password: "organizer123",
        department: Some("Computer Science"),
    },
    DemoAccount {
        label: "Student",
        role: Role::Student,
        full_name: "Demo Student",
        email: "student@campus.edu",
        password: "student123",
        department: Some("Computer Science"),
    },
];

pub const DEPARTMENTS: [&str; 4] = [
    "Computer Science",
    "Electronics",
    "Mechanical",
    "Civil",
];

/// `(venue name, owning department, capacity)`
pub const VENUES: [(&str, Option<&str>, i64); 4] = [
    ("Main Auditorium", None, 500),
    ("CS Seminar Hall", Some("Computer Science"), 120),
    ("Electronics Lab", Some("Electronics"), 60),
    ("Open Air Theatre", None, 800),
];

/// Counts of rows actually inserted by one seeding pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub departments: u64,
    pub venues: u64,
    pub accounts: u64,
}

pub struct SeedService {
    db: SqlitePool,
}

impl SeedService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Seed departments and venues, plus the demo accounts when `with_demo` is set.
    pub async fn seed(&self, with_demo: bool, bcrypt_cost: u32) -> Result<SeedReport> {
        let mut report = SeedReport::default();

        for name in DEPARTMENTS {
            let result = sqlx::query("INSERT OR IGNORE INTO departments (dept_name) VALUES (?)")
                .bind(name)
                .execute(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            report.departments += result.rows_affected();
        }

        for (name, department, capacity) in VENUES {
            let dept_id = match department {
                Some(dept) => Some(self.department_id(dept).await?),
                None => None,
            };
            let result = sqlx::query(
                r#"
                INSERT INTO venues (venue_name, dept_id, capacity)
                SELECT ?, ?, ?
                WHERE NOT EXISTS (SELECT 1 FROM venues WHERE venue_name = ?)
                "#,
            )
            .bind(name)
            .bind(dept_id)
            .bind(capacity)
            .bind(name)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
            report.venues += result.rows_affected();
        }

        if with_demo {
            for account in &DEMO_ACCOUNTS {
                if self.seed_account(account, bcrypt_cost).await? {
                    report.accounts += 1;
                }
            }
        }

        tracing::info!(
            departments = report.departments,
            venues = report.venues,
            accounts = report.accounts,
            "Seed data applied"
        );
        Ok(report)
    }

    async fn department_id(&self, name: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT dept_id FROM departments WHERE dept_name = ?")
            .bind(name)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::Internal(format!("Department '{}' was not seeded", name)))
    }

    /// Returns whether a new row was written.
    async fn seed_account(&self, account: &DemoAccount, bcrypt_cost: u32) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(account.email)
            .fetch_one(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if exists > 0 {
            return Ok(false);
        }

        let dept_id = match account.department {
            Some(dept) => Some(self.department_id(dept).await?),
            None => None,
        };
        let password_hash = hash_password(account.password, bcrypt_cost)?;
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO users (full_name, email, password, role_id, dept_id,
                                         created_at, guest_status)
            SELECT ?, ?, ?, role_id, ?, ?, 'active' FROM roles WHERE role_name = ?
            "#,
        )
        .bind(account.full_name)
        .bind(account.email)
        .bind(&password_hash)
        .bind(dept_id)
        .bind(chrono::Utc::now())
        .bind(account.role.as_str())
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

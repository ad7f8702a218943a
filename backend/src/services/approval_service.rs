//! Event approval chain (HOD, then Principal).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::{AppError, Result};
use crate::models::approval::{Approval, ApprovalStatus, APPROVAL_SELECT};
use crate::models::event::{Event, EventStatus};
use crate::models::role::Role;
use crate::models::user::User;
use crate::services::email_service::Notifier;
use crate::services::event_service::{fetch_event, set_event_status};
use crate::services::metrics_service;
use crate::services::user_service::UserService;

pub const APPROVER_HOD: &str = "HOD";
pub const APPROVER_PRINCIPAL: &str = "Principal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DecisionRequest {
    pub remarks: Option<String>,
}

/// What happened when a chain was built for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainOutcome {
    pub hod_step: bool,
    pub principal_step: bool,
}

impl ChainOutcome {
    /// No approver exists, so the event needs no sign-off.
    pub fn is_empty(&self) -> bool {
        !self.hod_step && !self.principal_step
    }
}

/// Result of recording a decision.
#[derive(Debug, Serialize, ToSchema)]
pub struct DecisionOutcome {
    pub approval: Approval,
    pub event_status: String,
}

/// A rejection anywhere in the chain closes the event.
pub fn chain_rejected(event_approvals: &[Approval]) -> bool {
    event_approvals
        .iter()
        .any(|a| a.status == ApprovalStatus::Rejected.as_str())
}

/// A Principal step is actionable only once no HOD step for the same event
/// is still pending. Nothing is actionable on a rejected chain.
pub fn is_actionable(approval: &Approval, event_approvals: &[Approval]) -> bool {
    if !approval.is_pending() || chain_rejected(event_approvals) {
        return false;
    }
    if approval.is_hod_step() {
        return true;
    }
    !event_approvals
        .iter()
        .any(|a| a.approval_id != approval.approval_id && a.is_hod_step() && a.is_pending())
}

pub fn approval_request_body(approver: &User, event: &Event, login_url: &str) -> String {
    format!(
        "Hello {},\n\nA new event requires your approval.\n\nEvent: {}\nOrganizer: {}\nDate: {}\nTime: {} - {}\nVenue: {}\n\nLogin: {}\n",
        approver.full_name,
        event.title,
        event.organizer_name.as_deref().unwrap_or("N/A"),
        event.event_date.format("%Y-%m-%d"),
        event.start_time.format("%H:%M"),
        event.end_time.format("%H:%M"),
        event.venue_name.as_deref().unwrap_or("N/A"),
        login_url
    )
}

pub struct ApprovalService {
    db: SqlitePool,
    notifier: Notifier,
}

impl ApprovalService {
    pub fn new(db: SqlitePool, notifier: Notifier) -> Self {
        Self { db, notifier }
    }

    async fn event_or_404(&self, event_id: i64) -> Result<Event> {
        fetch_event(&self.db, event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
    }

    pub async fn list_for_event(&self, event_id: i64) -> Result<Vec<Approval>> {
        let sql = format!("{} WHERE a.event_id = ? ORDER BY a.approval_id", APPROVAL_SELECT);
        sqlx::query_as(&sql)
            .bind(event_id)
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get(&self, approval_id: i64) -> Result<Approval> {
        let sql = format!("{} WHERE a.approval_id = ?", APPROVAL_SELECT);
        sqlx::query_as(&sql)
            .bind(approval_id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound("Approval not found".to_string()))
    }

    async fn insert_step(
        &self,
        event_id: i64,
        approver_id: i64,
        approver_role: &str,
        remarks: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO approvals (event_id, approver_id, approver_role, status, remarks)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(event_id)
        .bind(approver_id)
        .bind(approver_role)
        .bind(ApprovalStatus::Pending.as_str())
        .bind(remarks)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Build the approval chain for an event.
    ///
    /// The department checked for a HOD is the venue's department when the
    /// venue belongs to one, else the event's own department. When neither a
    /// HOD nor a Principal exists the event is approved immediately.
    pub async fn create_chain(&self, event_id: i64, remarks: Option<&str>) -> Result<ChainOutcome> {
        let event = self.event_or_404(event_id).await?;
        let users = UserService::new(self.db.clone());

        let venue_dept: Option<i64> = match event.venue_id {
            Some(venue_id) => sqlx::query_scalar("SELECT dept_id FROM venues WHERE venue_id = ?")
                .bind(venue_id)
                .fetch_optional(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?
                .flatten(),
            None => None,
        };
        let dept_to_check = venue_dept.or(event.dept_id);

        let hod = match dept_to_check {
            Some(dept_id) => users
                .users_with_role(Role::Hod, Some(dept_id))
                .await?
                .into_iter()
                .next(),
            None => None,
        };
        let principal = users
            .users_with_role(Role::Principal, None)
            .await?
            .into_iter()
            .next();

        let subject = format!("New event awaiting approval: {}", event.title);

        if let Some(hod) = &hod {
            self.insert_step(event.event_id, hod.user_id, APPROVER_HOD, remarks)
                .await?;
            let body = approval_request_body(hod, &event, &self.notifier.login_url());
            self.notifier
                .notify(hod.email.as_deref(), &subject, &body)
                .await;
        }

        if let Some(principal) = &principal {
            self.insert_step(event.event_id, principal.user_id, APPROVER_PRINCIPAL, remarks)
                .await?;
            if hod.is_none() {
                let body = approval_request_body(principal, &event, &self.notifier.login_url());
                self.notifier
                    .notify(principal.email.as_deref(), &subject, &body)
                    .await;
            }
        }

        let outcome = ChainOutcome {
            hod_step: hod.is_some(),
            principal_step: principal.is_some(),
        };

        if outcome.is_empty() {
            tracing::info!(
                event_id = event.event_id,
                "No approvers configured, event approved automatically"
            );
            set_event_status(&self.db, event.event_id, EventStatus::Approved).await?;
        }

        Ok(outcome)
    }

    /// Remove every step of an event's chain.
    pub async fn clear_chain(&self, event_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM approvals WHERE event_id = ?")
            .bind(event_id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// The caller's pending approvals that can be acted on now.
    pub async fn pending_for(&self, approver: &User) -> Result<Vec<Approval>> {
        let sql = format!(
            "{} WHERE a.approver_id = ? AND a.status = ? ORDER BY e.event_date, a.approval_id",
            APPROVAL_SELECT
        );
        let mine: Vec<Approval> = sqlx::query_as(&sql)
            .bind(approver.user_id)
            .bind(ApprovalStatus::Pending.as_str())
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut actionable = Vec::with_capacity(mine.len());
        for approval in mine {
            let siblings = self.list_for_event(approval.event_id).await?;
            if is_actionable(&approval, &siblings) {
                actionable.push(approval);
            }
        }
        Ok(actionable)
    }

    pub async fn history_for(&self, approver: &User) -> Result<Vec<Approval>> {
        let sql = format!(
            "{} WHERE a.approver_id = ? AND a.status != ? ORDER BY a.approved_at DESC, a.approval_id DESC",
            APPROVAL_SELECT
        );
        sqlx::query_as(&sql)
            .bind(approver.user_id)
            .bind(ApprovalStatus::Pending.as_str())
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record an approve/reject decision by the assigned approver.
    pub async fn decide(
        &self,
        approval_id: i64,
        approver: &User,
        decision: Decision,
        remarks: Option<String>,
    ) -> Result<DecisionOutcome> {
        let approval = self.get(approval_id).await?;
        if approval.approver_id != approver.user_id {
            return Err(AppError::Authorization(
                "This approval is assigned to another approver".to_string(),
            ));
        }
        if !approval.is_pending() {
            return Err(AppError::Conflict(
                "This approval has already been decided".to_string(),
            ));
        }
        let siblings = self.list_for_event(approval.event_id).await?;
        if chain_rejected(&siblings) {
            return Err(AppError::Conflict(
                "This event has already been rejected".to_string(),
            ));
        }
        if !is_actionable(&approval, &siblings) {
            return Err(AppError::Validation(
                "Waiting for HOD approval before the Principal can decide".to_string(),
            ));
        }

        let status = match decision {
            Decision::Approve => ApprovalStatus::Approved,
            Decision::Reject => ApprovalStatus::Rejected,
        };
        let remarks = remarks
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        sqlx::query(
            "UPDATE approvals SET status = ?, remarks = COALESCE(?, remarks), approved_at = ? WHERE approval_id = ?",
        )
        .bind(status.as_str())
        .bind(&remarks)
        .bind(Utc::now())
        .bind(approval.approval_id)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let event = self.event_or_404(approval.event_id).await?;
        let organizer = UserService::new(self.db.clone())
            .find_by_id(event.organizer_id)
            .await?;
        let organizer_email = organizer.as_ref().and_then(|o| o.email.clone());

        let event_status = match decision {
            Decision::Reject => {
                metrics_service::record_approval_decision("rejected");
                set_event_status(&self.db, event.event_id, EventStatus::Rejected).await?;
                let body = format!(
                    "Your event \"{}\" was rejected by {}.\n\nRemarks: {}\n",
                    event.title,
                    approval.approver_role,
                    remarks.as_deref().unwrap_or("-")
                );
                self.notifier
                    .notify(
                        organizer_email.as_deref(),
                        &format!("Event rejected: {}", event.title),
                        &body,
                    )
                    .await;
                EventStatus::Rejected
            }
            Decision::Approve => {
                metrics_service::record_approval_decision("approved");
                let chain = self.list_for_event(event.event_id).await?;
                if chain.iter().all(|a| a.status == ApprovalStatus::Approved.as_str()) {
                    set_event_status(&self.db, event.event_id, EventStatus::Approved).await?;
                    let body = format!(
                        "Your event \"{}\" on {} has been fully approved.\n",
                        event.title,
                        event.event_date.format("%Y-%m-%d")
                    );
                    self.notifier
                        .notify(
                            organizer_email.as_deref(),
                            &format!("Event approved: {}", event.title),
                            &body,
                        )
                        .await;
                    EventStatus::Approved
                } else {
                    if approval.is_hod_step() {
                        self.notify_principal(&chain, &event).await?;
                    }
                    event.status().unwrap_or(EventStatus::Pending)
                }
            }
        };

        tracing::info!(
            approval_id = approval.approval_id,
            event_id = event.event_id,
            decision = ?decision,
            "Approval decided"
        );

        Ok(DecisionOutcome {
            approval: self.get(approval.approval_id).await?,
            event_status: event_status.as_str().to_string(),
        })
    }

    async fn notify_principal(&self, chain: &[Approval], event: &Event) -> Result<()> {
        let Some(step) = chain
            .iter()
            .find(|a| !a.is_hod_step() && a.is_pending())
        else {
            return Ok(());
        };
        let principal = UserService::new(self.db.clone())
            .find_by_id(step.approver_id)
            .await?;
        if let Some(principal) = principal {
            let body = approval_request_body(&principal, event, &self.notifier.login_url());
            self.notifier
                .notify(
                    principal.email.as_deref(),
                    &format!("Event awaiting your approval: {}", event.title),
                    &body,
                )
                .await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn step(id: i64, role: &str, status: &str) -> Approval {
        Approval {
            approval_id: id,
            event_id: 1,
            event_title: "Expo".into(),
            event_date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            organizer_id: 9,
            approver_id: id + 100,
            approver_name: "Approver".into(),
            approver_role: role.into(),
            status: status.into(),
            remarks: None,
            approved_at: None,
        }
    }

    #[test]
    fn test_principal_waits_for_hod() {
        let hod = step(1, "HOD", "pending");
        let principal = step(2, "Principal", "pending");
        let chain = vec![hod.clone(), principal.clone()];
        assert!(is_actionable(&hod, &chain));
        assert!(!is_actionable(&principal, &chain));
    }

    #[test]
    fn test_principal_actionable_after_hod_approves() {
        let hod = step(1, "HOD", "approved");
        let principal = step(2, "Principal", "pending");
        let chain = vec![hod, principal.clone()];
        assert!(is_actionable(&principal, &chain));
    }

    #[test]
    fn test_nothing_actionable_after_rejection() {
        let hod = step(1, "HOD", "rejected");
        let principal = step(2, "Principal", "pending");
        let chain = vec![hod, principal.clone()];
        assert!(chain_rejected(&chain));
        assert!(!is_actionable(&principal, &chain));
    }

    #[test]
    fn test_principal_alone_is_actionable() {
        let principal = step(2, "Principal", "pending");
        assert!(is_actionable(&principal, &[principal.clone()]));
    }

    #[test]
    fn test_decided_step_not_actionable() {
        let hod = step(1, "HOD", "rejected");
        assert!(!is_actionable(&hod, &[hod.clone()]));
    }

    #[test]
    fn test_chain_outcome_empty() {
        assert!(ChainOutcome {
            hod_step: false,
            principal_step: false
        }
        .is_empty());
        assert!(!ChainOutcome {
            hod_step: true,
            principal_step: false
        }
        .is_empty());
    }
}

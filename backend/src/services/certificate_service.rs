//! Participation certificates, organizer templates and prize assignment.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use utoipa::ToSchema;

use crate::api::validation::validate_poster_url;
use crate::error::{AppError, Result};
use crate::models::certificate::{Certificate, CertificateTemplate};
use crate::models::event::Event;
use crate::models::registration::{Registration, Team};
use crate::services::event_service::{fetch_event, EventService};

pub const MAX_TEMPLATES_PER_ORGANIZER: i64 = 10;
pub const PARTICIPANT: &str = "Participant";

const CERTIFICATE_SELECT: &str = r#"
    SELECT c.certificate_id, c.student_id, c.event_id, e.title AS event_title, e.event_date,
           c.certificate_url, c.issued_at
    FROM certificates c
    JOIN events e ON e.event_id = c.event_id
"#;

/// Text printed under the student's name for prize winners.
///
/// `Participant` or a blank position prints nothing.
pub fn prize_text(position: Option<&str>, title: Option<&str>) -> Option<String> {
    let position = position.map(str::trim).filter(|p| !p.is_empty())?;
    if position == PARTICIPANT {
        return None;
    }
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => Some(format!("{} - {}", position, title)),
        None => Some(format!("{} Place", position)),
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Where one text field sits on a template image, in percent of the page.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TextPlacement {
    pub x: f64,
    pub y: f64,
    pub font_size: Option<f64>,
}

impl TextPlacement {
    fn style(&self) -> String {
        let mut style = format!(
            "position:absolute;left:{}%;top:{}%;transform:translate(-50%,-50%);margin:0;",
            self.x.clamp(0.0, 100.0),
            self.y.clamp(0.0, 100.0)
        );
        if let Some(size) = self.font_size.filter(|s| *s > 0.0) {
            style.push_str(&format!("font-size:{}px;", size));
        }
        style
    }
}

/// Field placements read from a template's stored `positions`.
///
/// Keys are `name`, `prize`, `event`, `date` and `organizer`. Unknown keys and
/// malformed entries are ignored so a bad layout falls back to the flowing page.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TemplateLayout {
    pub name: Option<TextPlacement>,
    pub prize: Option<TextPlacement>,
    pub event: Option<TextPlacement>,
    pub date: Option<TextPlacement>,
    pub organizer: Option<TextPlacement>,
}

impl TemplateLayout {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(serde_json::Value::Object(map)) =
            raw.and_then(|r| serde_json::from_str::<serde_json::Value>(r).ok())
        else {
            return Self::default();
        };
        let field = |key: &str| {
            map.get(key)
                .and_then(|v| serde_json::from_value::<TextPlacement>(v.clone()).ok())
                .filter(|p| p.x.is_finite() && p.y.is_finite())
        };
        Self {
            name: field("name"),
            prize: field("prize"),
            event: field("event"),
            date: field("date"),
            organizer: field("organizer"),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Everything needed to render one certificate.
#[derive(Debug, Clone)]
pub struct CertificateDocument {
    pub student_name: String,
    pub event_title: String,
    pub event_date: String,
    pub organizer_name: String,
    pub prize_text: Option<String>,
    pub template: Option<CertificateTemplate>,
}

impl CertificateDocument {
    /// Standalone HTML page; a template image becomes the page background.
    /// Templates with a stored layout get their fields placed on the image.
    pub fn render_html(&self) -> String {
        let layout = self
            .template
            .as_ref()
            .map(|t| TemplateLayout::parse(t.positions.as_deref()))
            .unwrap_or_default();
        if layout.is_empty() {
            self.render_flowing()
        } else {
            self.render_placed(&layout)
        }
    }

    fn render_placed(&self, layout: &TemplateLayout) -> String {
        let image = self
            .template
            .as_ref()
            .map(|t| escape_html(&t.image_url))
            .unwrap_or_default();
        let mut fields = String::new();
        let mut place = |placement: Option<TextPlacement>, class: &str, text: &str| {
            if let Some(p) = placement {
                fields.push_str(&format!(
                    "<p class=\"{}\" style=\"{}\">{}</p>\n",
                    class,
                    p.style(),
                    escape_html(text)
                ));
            }
        };
        place(layout.name, "name", &self.student_name);
        if let Some(prize) = self.prize_text.as_deref() {
            place(layout.prize, "prize", prize);
        }
        place(layout.event, "event", &self.event_title);
        place(layout.date, "date", &self.event_date);
        place(layout.organizer, "organizer", &self.organizer_name);

        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Certificate - {title}</title>\n\
             <style>body{{font-family:Georgia,serif;margin:0}}\
             .page{{position:relative;width:1123px;height:794px;margin:auto;\
             background-image:url('{image}');background-size:cover}}\
             .name{{font-size:42px;font-weight:bold}}.prize{{font-size:26px;color:#b8860b}}</style>\n\
             </head>\n<body>\n<div class=\"page\">\n{fields}</div>\n</body>\n</html>\n",
            title = escape_html(&self.event_title),
            image = image,
            fields = fields,
        )
    }

    fn render_flowing(&self) -> String {
        let background = self
            .template
            .as_ref()
            .map(|t| {
                format!(
                    "background-image:url('{}');background-size:cover;",
                    escape_html(&t.image_url)
                )
            })
            .unwrap_or_default();
        let prize = self
            .prize_text
            .as_deref()
            .map(|p| format!("<p class=\"prize\">{}</p>\n", escape_html(p)))
            .unwrap_or_default();

        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Certificate - {title}</title>\n\
             <style>body{{font-family:Georgia,serif;text-align:center;margin:0}}\
             .page{{width:1123px;height:794px;margin:auto;padding-top:180px;box-sizing:border-box;{bg}}}\
             .name{{font-size:42px;font-weight:bold}}.prize{{font-size:26px;color:#b8860b}}</style>\n\
             </head>\n<body>\n<div class=\"page\">\n<h1>Certificate of Participation</h1>\n\
             <p>This is to certify that</p>\n<p class=\"name\">{name}</p>\n{prize}\
             <p>participated in <strong>{title}</strong> held on {date}.</p>\n\
             <p>Organized by {organizer}</p>\n</div>\n</body>\n</html>\n",
            title = escape_html(&self.event_title),
            bg = background,
            name = escape_html(&self.student_name),
            prize = prize,
            date = escape_html(&self.event_date),
            organizer = escape_html(&self.organizer_name),
        )
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTemplateRequest {
    pub name: Option<String>,
    /// Path or URL of the uploaded template image (JPG, PNG or WEBP)
    pub image_url: String,
    pub positions: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    /// Text placement; `null` clears it
    pub positions: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TeamPrizeRequest {
    pub team_id: i64,
    pub prize_position: String,
    pub prize_title: Option<String>,
    pub certificate_template_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IndividualPrizeRequest {
    pub registration_id: i64,
    pub prize_position: String,
    pub prize_title: Option<String>,
    pub certificate_template_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PrizeOutcome {
    pub message: String,
    pub certificates_updated: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StudentCertificate {
    #[serde(flatten)]
    pub certificate: Certificate,
    pub prize_text: Option<String>,
}

fn positions_json(value: Option<serde_json::Value>) -> Result<Option<String>> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v @ serde_json::Value::Object(_)) => Ok(Some(v.to_string())),
        Some(_) => Err(AppError::Validation(
            "Invalid positions data. Please try again.".to_string(),
        )),
    }
}

pub struct CertificateService {
    db: SqlitePool,
}

impl CertificateService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn find(&self, student_id: i64, event_id: i64) -> Result<Option<Certificate>> {
        let sql = format!("{} WHERE c.student_id = ? AND c.event_id = ?", CERTIFICATE_SELECT);
        sqlx::query_as(&sql)
            .bind(student_id)
            .bind(event_id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn registration_for(&self, event_id: i64, student_id: i64) -> Result<Option<Registration>> {
        sqlx::query_as("SELECT * FROM registrations WHERE event_id = ? AND student_id = ?")
            .bind(event_id)
            .bind(student_id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn team(&self, team_id: i64) -> Result<Option<Team>> {
        sqlx::query_as("SELECT * FROM teams WHERE team_id = ?")
            .bind(team_id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn template(&self, template_id: i64) -> Result<Option<CertificateTemplate>> {
        sqlx::query_as("SELECT * FROM certificate_templates WHERE template_id = ?")
            .bind(template_id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Prize text and prize template id for a student's registration.
    async fn prize_for(
        &self,
        event: &Event,
        registration: Option<&Registration>,
    ) -> Result<(Option<String>, Option<i64>)> {
        let Some(registration) = registration else {
            return Ok((None, None));
        };
        if event.is_team_event {
            let team = match registration.team_id {
                Some(team_id) => self.team(team_id).await?,
                None => None,
            };
            Ok(team.map_or((None, None), |t| {
                let text = prize_text(t.prize_position.as_deref(), t.prize_title.as_deref());
                let template = text.as_ref().and(t.prize_certificate_template_id);
                (text, template)
            }))
        } else {
            let text = prize_text(
                registration.prize_position.as_deref(),
                registration.prize_title.as_deref(),
            );
            let template = text
                .as_ref()
                .and(registration.prize_certificate_template_id);
            Ok((text, template))
        }
    }

    /// Template priority: prize template, the event's own template (when the
    /// organizer owns it), then the organizer's default.
    async fn resolve_template(
        &self,
        event: &Event,
        prize_template: Option<i64>,
    ) -> Result<Option<CertificateTemplate>> {
        if let Some(id) = prize_template {
            if let Some(t) = self.template(id).await? {
                return Ok(Some(t));
            }
        }
        if let Some(id) = event.certificate_template_id {
            if let Some(t) = self
                .template(id)
                .await?
                .filter(|t| t.organizer_id == event.organizer_id)
            {
                return Ok(Some(t));
            }
        }
        sqlx::query_as(
            "SELECT * FROM certificate_templates WHERE organizer_id = ? AND is_default = 1 LIMIT 1",
        )
        .bind(event.organizer_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Issue a certificate once per student and event. Returns the existing
    /// certificate when one was already issued.
    pub async fn issue(&self, student_id: i64, event_id: i64) -> Result<Certificate> {
        if let Some(existing) = self.find(student_id, event_id).await? {
            return Ok(existing);
        }
        let now = Utc::now();
        let url = format!(
            "certificates/cert_{}_{}_{}.html",
            student_id,
            event_id,
            now.format("%Y%m%d%H%M%S")
        );
        sqlx::query(
            r#"
            INSERT INTO certificates (student_id, event_id, certificate_url, issued_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (student_id, event_id) DO NOTHING
            "#,
        )
        .bind(student_id)
        .bind(event_id)
        .bind(&url)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(student_id, event_id, "Certificate issued");
        self.find(student_id, event_id)
            .await?
            .ok_or_else(|| AppError::Internal("Certificate missing after insert".to_string()))
    }

    /// Drop and re-issue a certificate so it reflects current prize data.
    pub async fn reissue(&self, student_id: i64, event_id: i64) -> Result<Certificate> {
        sqlx::query("DELETE FROM certificates WHERE student_id = ? AND event_id = ?")
            .bind(student_id)
            .bind(event_id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        self.issue(student_id, event_id).await
    }

    async fn ensure_template_owned(&self, template_id: Option<i64>, organizer_id: i64) -> Result<()> {
        if let Some(id) = template_id {
            match self.template(id).await? {
                Some(t) if t.organizer_id == organizer_id => {}
                _ => {
                    return Err(AppError::Validation(
                        "Certificate template not found".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    // -- templates ---------------------------------------------------------

    pub async fn list_templates(&self, organizer_id: i64) -> Result<Vec<CertificateTemplate>> {
        sqlx::query_as(
            "SELECT * FROM certificate_templates WHERE organizer_id = ? ORDER BY template_id DESC",
        )
        .bind(organizer_id)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn owned_template(&self, template_id: i64, organizer_id: i64) -> Result<CertificateTemplate> {
        self.template(template_id)
            .await?
            .filter(|t| t.organizer_id == organizer_id)
            .ok_or_else(|| AppError::NotFound("Template not found".to_string()))
    }

    pub async fn create_template(
        &self,
        organizer_id: i64,
        req: CreateTemplateRequest,
    ) -> Result<CertificateTemplate> {
        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM certificate_templates WHERE organizer_id = ?")
                .bind(organizer_id)
                .fetch_one(&self.db)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        if existing >= MAX_TEMPLATES_PER_ORGANIZER {
            return Err(AppError::Validation(format!(
                "You can upload up to {} certificate templates only.",
                MAX_TEMPLATES_PER_ORGANIZER
            )));
        }

        let image_url = req.image_url.trim();
        if image_url.is_empty() {
            return Err(AppError::Validation(
                "Please select a template image to upload.".to_string(),
            ));
        }
        validate_poster_url(image_url)
            .map_err(|_| AppError::Validation("Template must be a JPG, PNG, or WEBP image.".to_string()))?;

        let name = req
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Template {}", existing + 1));
        let positions = positions_json(req.positions)?;

        let result = sqlx::query(
            r#"
            INSERT INTO certificate_templates (organizer_id, name, image_url, is_default, positions, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(organizer_id)
        .bind(&name)
        .bind(image_url)
        .bind(existing == 0)
        .bind(&positions)
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.owned_template(result.last_insert_rowid(), organizer_id)
            .await
    }

    pub async fn update_template(
        &self,
        template_id: i64,
        organizer_id: i64,
        req: UpdateTemplateRequest,
    ) -> Result<CertificateTemplate> {
        let template = self.owned_template(template_id, organizer_id).await?;
        let name = req
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or(template.name);
        let positions = positions_json(req.positions)?;

        sqlx::query("UPDATE certificate_templates SET name = ?, positions = ? WHERE template_id = ?")
            .bind(&name)
            .bind(&positions)
            .bind(template_id)
            .execute(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        self.owned_template(template_id, organizer_id).await
    }

    /// Exactly one default per organizer.
    pub async fn set_default_template(
        &self,
        template_id: i64,
        organizer_id: i64,
    ) -> Result<CertificateTemplate> {
        self.owned_template(template_id, organizer_id).await?;
        let mut tx = self.db.begin().await?;
        sqlx::query("UPDATE certificate_templates SET is_default = 0 WHERE organizer_id = ?")
            .bind(organizer_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        sqlx::query("UPDATE certificate_templates SET is_default = 1 WHERE template_id = ?")
            .bind(template_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tx.commit().await?;
        self.owned_template(template_id, organizer_id).await
    }

    /// Delete a template, clear references to it and promote the newest
    /// remaining template when the default was removed.
    pub async fn delete_template(&self, template_id: i64, organizer_id: i64) -> Result<()> {
        let template = self.owned_template(template_id, organizer_id).await?;

        let mut tx = self.db.begin().await?;
        for statement in [
            "UPDATE events SET certificate_template_id = NULL WHERE certificate_template_id = ?",
            "UPDATE teams SET prize_certificate_template_id = NULL WHERE prize_certificate_template_id = ?",
            "UPDATE registrations SET prize_certificate_template_id = NULL WHERE prize_certificate_template_id = ?",
            "DELETE FROM certificate_templates WHERE template_id = ?",
        ] {
            sqlx::query(statement)
                .bind(template_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        if template.is_default {
            sqlx::query(
                r#"
                UPDATE certificate_templates SET is_default = 1
                WHERE template_id = (
                    SELECT template_id FROM certificate_templates
                    WHERE organizer_id = ? ORDER BY template_id DESC LIMIT 1
                )
                "#,
            )
            .bind(organizer_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }
        tx.commit().await?;
        Ok(())
    }

    // -- prizes ------------------------------------------------------------

    async fn attended_members(&self, team_id: i64) -> Result<Vec<i64>> {
        sqlx::query_scalar(
            r#"
            SELECT r.student_id FROM registrations r
            JOIN attendance a ON a.registration_id = r.registration_id
            WHERE r.team_id = ?
            ORDER BY r.registration_id
            "#,
        )
        .bind(team_id)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn event_team(&self, event_id: i64, team_id: i64) -> Result<Team> {
        self.team(team_id)
            .await?
            .filter(|t| t.event_id == event_id)
            .ok_or_else(|| AppError::NotFound("Team not found.".to_string()))
    }

    async fn reissue_all(&self, event_id: i64, students: &[i64]) -> Result<usize> {
        for student_id in students {
            self.reissue(*student_id, event_id).await?;
        }
        Ok(students.len())
    }

    pub async fn assign_team_prize(
        &self,
        event_id: i64,
        organizer_id: i64,
        req: TeamPrizeRequest,
    ) -> Result<PrizeOutcome> {
        let event = EventService::new(self.db.clone())
            .owned(event_id, organizer_id)
            .await?;
        if !event.is_team_event {
            return Err(AppError::Validation(
                "Use the individual prize assignment for non-team events.".to_string(),
            ));
        }
        let position = req.prize_position.trim();
        if position.is_empty() {
            return Err(AppError::Validation(
                "Please select a team and prize position.".to_string(),
            ));
        }
        let team = self.event_team(event_id, req.team_id).await?;
        let attended = self.attended_members(team.team_id).await?;
        if (attended.len() as i64) < event.min_team_size {
            return Err(AppError::Validation(format!(
                "Cannot assign prize. At least {} team members must have attended (currently {} attended).",
                event.min_team_size,
                attended.len()
            )));
        }
        self.ensure_template_owned(req.certificate_template_id, organizer_id)
            .await?;

        let title = req
            .prize_title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        sqlx::query(
            "UPDATE teams SET prize_position = ?, prize_title = ?, prize_certificate_template_id = ? WHERE team_id = ?",
        )
        .bind(position)
        .bind(title)
        .bind(req.certificate_template_id)
        .bind(team.team_id)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let updated = self.reissue_all(event_id, &attended).await?;
        Ok(PrizeOutcome {
            message: format!(
                "Prize \"{}\" assigned to team \"{}\"!",
                position, team.team_name
            ),
            certificates_updated: updated,
        })
    }

    pub async fn clear_team_prize(
        &self,
        event_id: i64,
        organizer_id: i64,
        team_id: i64,
    ) -> Result<PrizeOutcome> {
        EventService::new(self.db.clone())
            .owned(event_id, organizer_id)
            .await?;
        let team = self.event_team(event_id, team_id).await?;
        sqlx::query(
            "UPDATE teams SET prize_position = NULL, prize_title = NULL, prize_certificate_template_id = NULL WHERE team_id = ?",
        )
        .bind(team_id)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let attended = self.attended_members(team_id).await?;
        let updated = self.reissue_all(event_id, &attended).await?;
        Ok(PrizeOutcome {
            message: format!("Prize cleared from team \"{}\".", team.team_name),
            certificates_updated: updated,
        })
    }

    async fn event_registration(&self, event_id: i64, registration_id: i64) -> Result<(Registration, bool)> {
        let row: Option<(i64, bool)> = sqlx::query_as(
            r#"
            SELECT r.registration_id, (a.attendance_id IS NOT NULL) AS attended
            FROM registrations r
            LEFT JOIN attendance a ON a.registration_id = r.registration_id
            WHERE r.registration_id = ? AND r.event_id = ?
            "#,
        )
        .bind(registration_id)
        .bind(event_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
        let (_, attended) =
            row.ok_or_else(|| AppError::NotFound("Participant not found.".to_string()))?;
        let registration = sqlx::query_as("SELECT * FROM registrations WHERE registration_id = ?")
            .bind(registration_id)
            .fetch_one(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok((registration, attended))
    }

    pub async fn assign_individual_prize(
        &self,
        event_id: i64,
        organizer_id: i64,
        req: IndividualPrizeRequest,
    ) -> Result<PrizeOutcome> {
        let event = EventService::new(self.db.clone())
            .owned(event_id, organizer_id)
            .await?;
        if event.is_team_event {
            return Err(AppError::Validation(
                "Use team prize assignment for team events.".to_string(),
            ));
        }
        if !event.has_prizes {
            return Err(AppError::Validation(
                "This event does not have prizes enabled.".to_string(),
            ));
        }
        let position = req.prize_position.trim();
        if position.is_empty() {
            return Err(AppError::Validation(
                "Please select a participant and prize position.".to_string(),
            ));
        }
        let (registration, attended) = self
            .event_registration(event_id, req.registration_id)
            .await?;
        if !attended {
            return Err(AppError::Validation(
                "Cannot assign prize to a participant who has not attended the event.".to_string(),
            ));
        }
        self.ensure_template_owned(req.certificate_template_id, organizer_id)
            .await?;

        let title = req
            .prize_title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        sqlx::query(
            "UPDATE registrations SET prize_position = ?, prize_title = ?, prize_certificate_template_id = ? WHERE registration_id = ?",
        )
        .bind(position)
        .bind(title)
        .bind(req.certificate_template_id)
        .bind(registration.registration_id)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.reissue(registration.student_id, event_id).await?;
        Ok(PrizeOutcome {
            message: format!("Prize \"{}\" assigned! Certificate updated.", position),
            certificates_updated: 1,
        })
    }

    pub async fn clear_individual_prize(
        &self,
        event_id: i64,
        organizer_id: i64,
        registration_id: i64,
    ) -> Result<PrizeOutcome> {
        EventService::new(self.db.clone())
            .owned(event_id, organizer_id)
            .await?;
        let (registration, attended) = self.event_registration(event_id, registration_id).await?;
        sqlx::query(
            "UPDATE registrations SET prize_position = NULL, prize_title = NULL, prize_certificate_template_id = NULL WHERE registration_id = ?",
        )
        .bind(registration_id)
        .execute(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let updated = if attended {
            self.reissue(registration.student_id, event_id).await?;
            1
        } else {
            0
        };
        Ok(PrizeOutcome {
            message: "Prize cleared.".to_string(),
            certificates_updated: updated,
        })
    }

    // -- students ----------------------------------------------------------

    pub async fn student_certificates(
        &self,
        student_id: i64,
        q: Option<&str>,
    ) -> Result<Vec<StudentCertificate>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(CERTIFICATE_SELECT);
        qb.push(" WHERE c.student_id = ").push_bind(student_id);
        if let Some(q) = q.map(str::trim).filter(|q| !q.is_empty()) {
            qb.push(" AND lower(e.title) LIKE ")
                .push_bind(format!("%{}%", q.to_lowercase()));
        }
        qb.push(" ORDER BY c.certificate_id DESC");
        let certificates: Vec<Certificate> = qb
            .build_query_as()
            .fetch_all(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut out = Vec::with_capacity(certificates.len());
        for certificate in certificates {
            let prize_text = match fetch_event(&self.db, certificate.event_id).await? {
                Some(event) => {
                    let registration = self.registration_for(event.event_id, student_id).await?;
                    self.prize_for(&event, registration.as_ref()).await?.0
                }
                None => None,
            };
            out.push(StudentCertificate {
                certificate,
                prize_text,
            });
        }
        Ok(out)
    }

    /// Render a student's own certificate. Returns `(filename, html)`.
    pub async fn download(&self, certificate_id: i64, student_id: i64) -> Result<(String, String)> {
        let sql = format!("{} WHERE c.certificate_id = ? AND c.student_id = ?", CERTIFICATE_SELECT);
        let certificate: Certificate = sqlx::query_as(&sql)
            .bind(certificate_id)
            .bind(student_id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound("Certificate not found".to_string()))?;

        let event = fetch_event(&self.db, certificate.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
        let student_name: String = sqlx::query_scalar("SELECT full_name FROM users WHERE user_id = ?")
            .bind(student_id)
            .fetch_one(&self.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let registration = self.registration_for(event.event_id, student_id).await?;
        let (prize_text, prize_template) = self.prize_for(&event, registration.as_ref()).await?;
        let template = self.resolve_template(&event, prize_template).await?;

        let document = CertificateDocument {
            student_name,
            event_title: event.title.clone(),
            event_date: event.event_date.format("%B %d, %Y").to_string(),
            organizer_name: event.organizer_name.clone().unwrap_or_default(),
            prize_text,
            template,
        };

        let filename = certificate
            .certificate_url
            .rsplit('/')
            .next()
            .unwrap_or("certificate.html")
            .to_string();
        Ok((filename, document.render_html()))
    }
}

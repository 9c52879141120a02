use std::env;
use std::error::Error;

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::warn;

use crate::models::{MonitoringForm, RoomChangeForm};

type MailResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Stateless SMTP notifier. Every send is fire-and-forget: callers spawn it,
/// failures are logged, nothing is retried or queued.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    absence_to: Option<Mailbox>,
}

impl Mailer {
    /// Returns `None` unless SMTP_HOST, SMTP_USERNAME and SMTP_PASSWORD are
    /// all present. SMTP_FROM defaults to the username.
    pub fn from_env() -> Option<Mailer> {
        let host = env::var("SMTP_HOST").ok()?;
        let username = env::var("SMTP_USERNAME").ok()?;
        let password = env::var("SMTP_PASSWORD").ok()?;

        let from = env::var("SMTP_FROM")
            .unwrap_or_else(|_| username.clone())
            .parse()
            .ok()?;
        let absence_to = env::var("ABSENCE_NOTICE_EMAIL")
            .ok()
            .and_then(|address| address.parse().ok());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .ok()?
            .credentials(Credentials::new(username, password))
            .build();

        Some(Mailer {
            transport,
            from,
            absence_to,
        })
    }

    pub async fn send_absence_notice(&self, form: &MonitoringForm) -> MailResult {
        let to = match &self.absence_to {
            Some(to) => to.clone(),
            None => {
                warn!("ABSENCE_NOTICE_EMAIL is not configured, skipping absence notice");
                return Ok(());
            }
        };
        let message = absence_notice(&self.from, &to, form)?;
        self.transport.send(message).await?;
        Ok(())
    }

    pub async fn send_dpd_approval_notices(
        &self,
        recipients: &[String],
        form: &RoomChangeForm,
    ) -> MailResult {
        for recipient in recipients {
            let to: Mailbox = match recipient.parse() {
                Ok(to) => to,
                Err(err) => {
                    warn!("Skipping DPD notice to invalid address {recipient}: {err}");
                    continue;
                }
            };
            let message = dpd_approval_notice(&self.from, &to, form)?;
            self.transport.send(message).await?;
        }
        Ok(())
    }

    pub async fn send_rlic_approval_notice(
        &self,
        recipient: &str,
        form: &RoomChangeForm,
    ) -> MailResult {
        let to: Mailbox = recipient.parse()?;
        let message = rlic_approval_notice(&self.from, &to, form)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

fn absence_notice(
    from: &Mailbox,
    to: &Mailbox,
    form: &MonitoringForm,
) -> Result<Message, lettre::error::Error> {
    Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(format!(
            "Instructor absence recorded in room {}",
            form.room_number
        ))
        .body(format!(
            "A classroom check on {} at {} found {} absent from room {}.\n\nRemarks: {}\n",
            form.date_monitored,
            form.time_monitored,
            form.instructor_name,
            form.room_number,
            form.remarks.as_deref().unwrap_or("none"),
        ))
}

fn dpd_approval_notice(
    from: &Mailbox,
    to: &Mailbox,
    form: &RoomChangeForm,
) -> Result<Message, lettre::error::Error> {
    Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(format!(
            "Room change request #{} awaits department approval",
            form.id
        ))
        .body(format!(
            "{} ({}) requested to move schedule {} from room {} ({} {}) to room {} ({} {}).\n\nReason: {}\n",
            form.full_name,
            form.email,
            form.schedule_number,
            form.from_room,
            form.from_day,
            form.from_time,
            form.to_room,
            form.to_day,
            form.to_time,
            form.reason_of_change,
        ))
}

fn rlic_approval_notice(
    from: &Mailbox,
    to: &Mailbox,
    form: &RoomChangeForm,
) -> Result<Message, lettre::error::Error> {
    Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(format!(
            "Room change request #{} awaits room loading approval",
            form.id
        ))
        .body(format!(
            "The department head has approved request #{} by {} to move schedule {} from room {} to room {}.\n\nReason: {}\n",
            form.id,
            form.full_name,
            form.schedule_number,
            form.from_room,
            form.to_room,
            form.reason_of_change,
        ))
}

#[cfg(test)]
mod tests {
    use time::macros::{date, time};

    use super::*;

    fn sample_form() -> MonitoringForm {
        MonitoringForm {
            form_id: 12,
            date_monitored: date!(2025 - 11 - 03),
            time_monitored: time!(9:30),
            room_number: "A-204".to_string(),
            instructor_name: "R. Santos".to_string(),
            instructor_presence: false,
            remarks: Some("Class left unattended".to_string()),
            photo: None,
            checker_id: 4,
        }
    }

    fn sample_request() -> RoomChangeForm {
        RoomChangeForm {
            id: 5,
            full_name: "L. Cruz".to_string(),
            email: "lcruz@campus.edu".to_string(),
            from_room: "A-204".to_string(),
            to_room: "B-101".to_string(),
            from_day: "Monday".to_string(),
            to_day: "Tuesday".to_string(),
            from_time: "09:00-10:30".to_string(),
            to_time: "13:00-14:30".to_string(),
            schedule_number: "SCH-31".to_string(),
            reason_of_change: "Projector broken".to_string(),
            approved_by: None,
            is_approved_head: Some(true),
            is_approved_room_loading: None,
            is_noted_by_checker: None,
        }
    }

    fn rendered(message: Message) -> String {
        String::from_utf8_lossy(&message.formatted()).into_owned()
    }

    #[test]
    fn absence_notice_names_room_and_instructor() {
        let from: Mailbox = "monitor@campus.edu".parse().unwrap();
        let to: Mailbox = "dean@campus.edu".parse().unwrap();
        let text = rendered(absence_notice(&from, &to, &sample_form()).unwrap());
        assert!(text.contains("A-204"));
        assert!(text.contains("R. Santos"));
        assert!(text.contains("dean@campus.edu"));
    }

    #[test]
    fn dpd_notice_carries_request_details() {
        let from: Mailbox = "monitor@campus.edu".parse().unwrap();
        let to: Mailbox = "dpd@campus.edu".parse().unwrap();
        let text = rendered(dpd_approval_notice(&from, &to, &sample_request()).unwrap());
        assert!(text.contains("SCH-31"));
        assert!(text.contains("B-101"));
        assert!(text.contains("Projector broken"));
    }

    #[test]
    fn rlic_notice_references_head_approval() {
        let from: Mailbox = "monitor@campus.edu".parse().unwrap();
        let to: Mailbox = "rlic@campus.edu".parse().unwrap();
        let text = rendered(rlic_approval_notice(&from, &to, &sample_request()).unwrap());
        assert!(text.contains("request #5"));
        assert!(text.contains("rlic@campus.edu"));
    }
}

use crate::model::employee::Employee;
use crate::model::vacation::Vacation;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum NotificationError {
    #[error("HR email address not configured")]
    HrEmailNotConfigured,
    #[error("failed to send mail: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub address: String,
}

impl From<&Employee> for Recipient {
    fn from(employee: &Employee) -> Self {
        Self {
            name: employee.full_name(),
            address: employee.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mail {
    pub to: Vec<Recipient>,
    pub subject: String,
    pub content: String,
}

/// Outgoing mail transport.
pub trait Mailer: Send + Sync {
    fn send(&self, mail: &Mail) -> Result<(), NotificationError>;
}

/// Writes mails to the log instead of delivering them.
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: &Mail) -> Result<(), NotificationError> {
        let to = mail
            .to
            .iter()
            .map(|r| r.address.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!(%to, subject = %mail.subject, "Mail sent");
        tracing::debug!(content = %mail.content, "Mail content");
        Ok(())
    }
}

/// Everyone involved in a leave application.
pub struct VacationParties<'a> {
    pub vacation: &'a Vacation,
    pub employee: &'a Employee,
    pub manager: &'a Employee,
    pub substitution: &'a Employee,
}

impl VacationParties<'_> {
    fn period(&self) -> (NaiveDate, NaiveDate) {
        (self.vacation.start_date, self.vacation.end_date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationEvent {
    New,
    Edited,
    Deleted,
}

/// Mails to the manager and the substitution, both with the employee in copy.
pub fn application_mails(parties: &VacationParties<'_>, event: ApplicationEvent) -> Vec<Mail> {
    let employee = parties.employee.full_name();
    let (start, end) = parties.period();

    let (subject, manager_text, substitution_text) = match event {
        ApplicationEvent::New => (
            format!("Leave application of {employee}"),
            format!("{employee} applied for leave from {start} to {end}. Please approve or reject the application."),
            format!("{employee} applied for leave from {start} to {end} and named you as substitution."),
        ),
        ApplicationEvent::Edited => (
            format!("Leave application of {employee} changed"),
            format!("{employee} changed the leave application to {start} until {end}. Please review it again."),
            format!("{employee} changed the leave application you substitute for to {start} until {end}."),
        ),
        ApplicationEvent::Deleted => {
            let text = format!("The leave application of {employee} from {start} to {end} was deleted.");
            (
                format!("Leave application of {employee} deleted"),
                text.clone(),
                text,
            )
        }
    };

    vec![
        Mail {
            to: vec![parties.manager.into(), parties.employee.into()],
            subject: subject.clone(),
            content: format!("Hello {},\n\n{manager_text}", parties.manager.first_name),
        },
        Mail {
            to: vec![parties.substitution.into(), parties.employee.into()],
            subject,
            content: format!("Hello {},\n\n{substitution_text}", parties.substitution.first_name),
        },
    ]
}

/// Mails announcing a decision. Approvals also go to HR.
pub fn decision_mails(
    parties: &VacationParties<'_>,
    approved: bool,
    hr_email: Option<&str>,
) -> Result<Vec<Mail>, NotificationError> {
    let employee = parties.employee.full_name();
    let substitution = parties.substitution.full_name();
    let (start, end) = parties.period();
    let mut mails = Vec::with_capacity(2);

    if approved {
        let hr = hr_email.ok_or(NotificationError::HrEmailNotConfigured)?;
        mails.push(Mail {
            to: vec![
                Recipient {
                    name: "HR-MANAGEMENT".to_string(),
                    address: hr.to_string(),
                },
                parties.manager.into(),
                parties.employee.into(),
            ],
            subject: format!("Leave application of {employee}"),
            content: format!(
                "The leave of {employee} from {start} to {end} was approved by {}. Substitution: {substitution}.",
                parties.manager.full_name()
            ),
        });
    }

    let decision = if approved { "approved" } else { "declined" };
    mails.push(Mail {
        to: vec![parties.substitution.into(), parties.employee.into()],
        subject: format!("Leave application of {employee} changed"),
        content: format!(
            "Hello {} and {},\n\nthe leave application of {employee} from {start} to {end} was {decision}. Substitution: {substitution}.",
            parties.employee.first_name, parties.substitution.first_name
        ),
    });
    Ok(mails)
}

/// Sends all mails, stopping at the first failure.
pub fn send_all(mailer: &dyn Mailer, mails: &[Mail]) -> Result<(), NotificationError> {
    mails.iter().try_for_each(|mail| mailer.send(mail))
}

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;
use worklog_core::config::SmtpConfig;
use worklog_core::error::RemoteError;
use worklog_core::model::Service;
use worklog_core::provider::{Notifier, RemoteFuture};
use worklog_core::report::RunReport;

/// Sends run reports as plain-text mail through a STARTTLS relay.
pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn recipients(&self) -> Result<Vec<Mailbox>, RemoteError> {
        let recipients: Vec<Mailbox> = self
            .config
            .to
            .split([',', ';'])
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(|address| address.parse::<Mailbox>().map_err(|err| rejected(format!("recipient {address}: {err}"))))
            .collect::<Result<_, _>>()?;
        if recipients.is_empty() {
            return Err(rejected("no recipient configured".to_string()));
        }
        Ok(recipients)
    }

    pub(crate) fn build_message(&self, report: &RunReport) -> Result<Message, RemoteError> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|err| rejected(format!("sender {}: {err}", self.config.from)))?;
        let mut builder = Message::builder()
            .from(from)
            .subject(report.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for recipient in self.recipients()? {
            builder = builder.to(recipient);
        }
        builder
            .body(report.body.clone())
            .map_err(|err| rejected(format!("build message: {err}")))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, RemoteError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
            .map_err(|err| connectivity(err.to_string()))?
            .port(self.config.port);
        if let Some(password) = &self.config.password {
            let user = self.config.username.clone().unwrap_or_else(|| self.config.from.clone());
            builder = builder.credentials(Credentials::new(user, password.clone()));
        }
        Ok(builder.build())
    }
}

impl Notifier for SmtpNotifier {
    fn send_report<'a>(&'a self, report: &'a RunReport) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            let message = self.build_message(report)?;
            let transport = self.transport()?;
            transport.send(message).await.map_err(|err| {
                if err.is_permanent() {
                    RemoteError::Rejected {
                        service: Service::Notifier,
                        message: err.to_string(),
                    }
                } else {
                    connectivity(err.to_string())
                }
            })?;
            info!(to = %self.config.to, subject = %report.subject, "report mailed");
            Ok(())
        })
    }
}

fn rejected(message: String) -> RemoteError {
    RemoteError::Rejected {
        service: Service::Notifier,
        message,
    }
}

fn connectivity(message: String) -> RemoteError {
    RemoteError::Connectivity {
        service: Service::Notifier,
        message,
    }
}

use crate::config::VerifyConfig;
use crate::constants::notify;
use crate::Result;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, error};

/// 失败通知
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, cluster: &str, excerpt: &str) -> Result<()>;
}

/// 读取日志文件尾部，最多 `budget` 字节
///
/// 被截断时加一行说明；未配置日志文件时返回固定说明文字。
pub fn read_log_excerpt(log_file: Option<&Path>, budget: u64) -> String {
    let Some(path) = log_file else {
        return notify::NO_LOG_FILE_BODY.to_string();
    };

    match tail(path, budget) {
        Ok((bytes, truncated)) => {
            let body = String::from_utf8_lossy(&bytes);
            if truncated {
                format!(
                    "The last {} bytes of the log file {}:\n{}",
                    budget,
                    path.display(),
                    body
                )
            } else {
                body.to_string()
            }
        }
        Err(e) => format!("Could not read log file {}: {}", path.display(), e),
    }
}

fn tail(path: &Path, budget: u64) -> std::io::Result<(Vec<u8>, bool)> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let truncated = len > budget;
    if truncated {
        file.seek(SeekFrom::End(-(budget as i64)))?;
    }
    let mut bytes = Vec::with_capacity(len.min(budget) as usize);
    file.read_to_end(&mut bytes)?;
    Ok((bytes, truncated))
}

/// 通知某个集群失败；发送失败只记日志，不影响本次运行
pub async fn notify_failure(notifier: &dyn Notifier, config: &VerifyConfig, cluster: &str) {
    if config.email_list.is_empty() {
        return;
    }

    let excerpt = read_log_excerpt(
        config.log_file.as_deref(),
        config.tunables.mail.log_excerpt_bytes,
    );
    debug!(
        " Sending email about a problem with {} to {}",
        cluster,
        config.email_list.join(",")
    );
    if let Err(e) = notifier.notify(cluster, &excerpt).await {
        error!(
            " Problem with sending email to {}: {}",
            config.email_list.join(","),
            e
        );
    }
}

/// 通过 SMTP 发送纯文本邮件
#[derive(Debug, Clone)]
pub struct MailNotifier {
    tool_name: String,
    from: String,
    recipients: Vec<String>,
    smtp_host: String,
    smtp_port: u16,
}

impl MailNotifier {
    pub fn new(tool_name: impl Into<String>, config: &VerifyConfig) -> Self {
        Self {
            tool_name: tool_name.into(),
            from: sender_address(),
            recipients: config.email_list.clone(),
            smtp_host: config.tunables.mail.smtp_host.clone(),
            smtp_port: config.tunables.mail.smtp_port,
        }
    }

    pub fn subject(&self, cluster: &str) -> String {
        format!("Errors in {} with cluster {}", self.tool_name, cluster)
    }

    fn build_message(&self, cluster: &str, excerpt: &str) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.parse::<Mailbox>()?)
            .subject(self.subject(cluster))
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.recipients {
            builder = builder.to(recipient.parse::<Mailbox>()?);
        }
        Ok(builder.body(excerpt.to_string())?)
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    async fn notify(&self, cluster: &str, excerpt: &str) -> Result<()> {
        let message = self.build_message(cluster, excerpt)?;
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.smtp_host)
            .port(self.smtp_port)
            .build();
        mailer.send(message).await?;
        Ok(())
    }
}

/// 发件人：当前用户@本机主机名
pub fn sender_address() -> String {
    let user = nix::unistd::User::from_uid(nix::unistd::getuid())
        .ok()
        .flatten()
        .map(|u| u.name)
        .unwrap_or_else(|| "root".to_string());
    let host = nix::unistd::gethostname()
        .ok()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|| "localhost".to_string());
    format!("{user}@{host}")
}

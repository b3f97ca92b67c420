//! Notification payload construction

/// A file attached to a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Everything the notifier needs to send one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    /// Formatted sender, `Name <address>` when a display name is set
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl NotificationPayload {
    /// Build the renewal notice for `domain` carrying the archive bytes
    pub fn certificate_notice(
        from: String,
        to: Vec<String>,
        domain: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Self {
        let size = content.len();

        let subject = format!("SSL certificate renewal - {}", domain);

        let html = format!(
            r#"<html>
<body>
    <h2>SSL certificate renewal notice</h2>
    <p>Hello,</p>
    <p>The automated renewal system has packaged the current certificate material.</p>
    <ul>
        <li><strong>Domain:</strong> {domain}</li>
        <li><strong>File name:</strong> {file_name}</li>
        <li><strong>File size:</strong> {size} bytes</li>
    </ul>
    <p>The archive is attached. Please deploy it before the current certificate expires.</p>
    <hr>
    <p style="color: #666; font-size: 12px;">
        This message was sent by an automated system. Please do not reply.
    </p>
</body>
</html>
"#
        );

        let text = format!(
            "SSL certificate renewal notice\n\
             \n\
             Hello,\n\
             \n\
             The automated renewal system has packaged the current certificate material.\n\
             \n\
             Domain: {domain}\n\
             File name: {file_name}\n\
             File size: {size} bytes\n\
             \n\
             The archive is attached. Please deploy it before the current certificate expires.\n\
             \n\
             ---\n\
             This message was sent by an automated system. Please do not reply.\n"
        );

        Self {
            from,
            to,
            subject,
            html,
            text,
            attachments: vec![Attachment {
                filename: file_name.to_string(),
                content,
            }],
        }
    }

    /// Total attachment size in bytes
    pub fn attachment_bytes(&self) -> usize {
        self.attachments.iter().map(|a| a.content.len()).sum()
    }
}

/// Split a single address or comma separated list, dropping blanks
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `Name <address>` when a display name is set, else the bare address
pub fn format_sender(address: &str, display_name: Option<&str>) -> String {
    match display_name {
        Some(name) => format!("{} <{}>", name, address),
        None => address.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recipients() {
        assert_eq!(parse_recipients("ops@example.com"), vec!["ops@example.com"]);
        assert_eq!(
            parse_recipients(" a@example.com, ,b@example.com ,"),
            vec!["a@example.com", "b@example.com"]
        );
        assert!(parse_recipients(" , ,").is_empty());
        assert!(parse_recipients("").is_empty());
    }

    #[test]
    fn test_format_sender() {
        assert_eq!(format_sender("certs@example.com", None), "certs@example.com");
        assert_eq!(
            format_sender("certs@example.com", Some("Cert Bot")),
            "Cert Bot <certs@example.com>"
        );
    }

    #[test]
    fn test_certificate_notice_content() {
        let payload = NotificationPayload::certificate_notice(
            "certs@example.com".to_string(),
            vec!["ops@example.com".to_string()],
            "example.com",
            "ssl_cert_example.com_20240101_000000.tar.gz",
            vec![1, 2, 3, 4, 5],
        );

        assert!(payload.subject.contains("example.com"));
        for body in [&payload.html, &payload.text] {
            assert!(body.contains("example.com"));
            assert!(body.contains("ssl_cert_example.com_20240101_000000.tar.gz"));
            assert!(body.contains("5 bytes"));
        }
        assert_eq!(payload.attachments.len(), 1);
        assert_eq!(payload.attachments[0].content, vec![1, 2, 3, 4, 5]);
        assert_eq!(payload.attachment_bytes(), 5);
    }
}

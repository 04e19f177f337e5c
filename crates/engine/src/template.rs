//! Invitation message templates (SMS, email subject, plain-text and HTML bodies).

/// Display name used when the contractor can't be resolved.
pub const DEFAULT_CONTRACTOR_NAME: &str = "Your contractor";

/// Project name used when the project has none.
pub const DEFAULT_PROJECT_NAME: &str = "Your Project";

/// Greeting name used when the client has none.
pub const DEFAULT_CLIENT_NAME: &str = "there";

/// Sender display name on invitation emails.
pub const SENDER_NAME: &str = "ProjectPulse";

const INVITATION_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <style>
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; margin: 0; padding: 0; background-color: #f8f9fa; }
    .container { max-width: 600px; margin: 20px auto; background: white; border-radius: 12px; overflow: hidden; box-shadow: 0 4px 6px rgba(0, 0, 0, 0.1); }
    .header { background: linear-gradient(135deg, #2D3748 0%, #FF6B35 100%); color: white; padding: 40px 30px; text-align: center; }
    .header h1 { margin: 0 0 8px 0; font-size: 28px; font-weight: 700; }
    .header p { margin: 0; opacity: 0.95; font-size: 16px; }
    .contractor { background: #f8f9fa; padding: 20px 30px; border-bottom: 1px solid #e2e8f0; }
    .contractor-label { color: #718096; font-size: 14px; margin: 0; }
    .contractor-name { color: #2D3748; font-weight: 600; font-size: 18px; margin: 0 0 4px 0; }
    .content { padding: 30px; }
    .project-name { color: #2D3748; font-weight: 600; font-size: 22px; margin: 20px 0; padding: 15px 20px; background: #f8f9fa; border-left: 4px solid #FF6B35; border-radius: 4px; }
    .button { display: inline-block; background: linear-gradient(135deg, #2D3748 0%, #FF6B35 100%); color: white; padding: 16px 32px; text-decoration: none; border-radius: 8px; font-weight: 600; font-size: 16px; margin: 20px 0; }
    .link-box { background: #f8f9fa; padding: 12px; border-radius: 6px; margin: 20px 0; text-align: center; }
    .link-box code { color: #718096; font-size: 13px; word-break: break-all; }
    .footer { text-align: center; padding: 30px; background: #f8f9fa; color: #718096; font-size: 14px; border-top: 1px solid #e2e8f0; }
    .footer strong { color: #2D3748; }
  </style>
</head>
<body>
  <div class="container">
    <div class="header">
      <h1>🏗️ ProjectPulse</h1>
      <p>You've been invited to view your project</p>
    </div>
    <div class="contractor">
      <p class="contractor-label">Your Contractor</p>
      <p class="contractor-name">{{contractor_name}}</p>
    </div>
    <div class="content">
      <p>Hi <strong>{{client_name}}</strong>!</p>
      <p>{{contractor_name}} has invited you to track your project in real-time:</p>
      <div class="project-name">"{{project_name}}"</div>
      <p>View daily photo updates, track milestones, and stay connected throughout your project.</p>
      <p style="text-align: center;">
        <a href="{{invite_link}}" class="button">View Your Project →</a>
      </p>
      <div class="link-box">
        <p style="margin: 0 0 8px 0; font-size: 13px; color: #718096;">Or copy this link:</p>
        <code>{{invite_link}}</code>
      </div>
    </div>
    <div class="footer">
      <p><strong>ProjectPulse</strong> · Real-time project communication</p>
      <p style="font-size: 12px; margin-top: 8px;">Keeping contractors and clients connected</p>
    </div>
  </div>
</body>
</html>
"#;

/// Values interpolated into every invitation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationContext {
    pub contractor_name: String,
    pub client_name: String,
    pub project_name: String,
    pub invite_link: String,
}

impl InvitationContext {
    pub fn sms_body(&self) -> String {
        format!(
            "Hi {}! {} created a project for you: \"{}\"\n\nView real-time updates here: {}\n\n- ProjectPulse",
            self.client_name, self.contractor_name, self.project_name, self.invite_link
        )
    }

    pub fn email_subject(&self) -> String {
        format!("{} invited you to: {}", self.contractor_name, self.project_name)
    }

    pub fn email_text(&self) -> String {
        format!(
            "Hi {}!\n\n{} has created a project for you: \"{}\"\n\nView real-time updates here: {}\n\n\
             ProjectPulse keeps you connected with your contractor through real-time updates, \
             photo timelines, and instant messaging.\n\n- ProjectPulse Team",
            self.client_name, self.contractor_name, self.project_name, self.invite_link
        )
    }

    /// HTML body with every interpolated value escaped.
    pub fn email_html(&self) -> String {
        let contractor_name = escape_html(&self.contractor_name);
        let client_name = escape_html(&self.client_name);
        let project_name = escape_html(&self.project_name);
        let invite_link = escape_html(&self.invite_link);

        render(
            INVITATION_HTML,
            &[
                ("contractor_name", contractor_name.as_str()),
                ("client_name", client_name.as_str()),
                ("project_name", project_name.as_str()),
                ("invite_link", invite_link.as_str()),
            ],
        )
    }
}

/// Substitute `{{key}}` placeholders in one pass. Unknown placeholders are
/// left as-is, and substituted text is never rescanned.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match values.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

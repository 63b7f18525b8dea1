//! Outgoing email bodies.
//!
//! Rendering is pure string assembly from typed contexts; a missing
//! domain renders as an empty link line rather than failing the send.

/// Context for the individual reminder email.
pub struct ReminderContext<'a> {
    pub team_name: &'a str,
    pub team_email: &'a str,
    pub todos: Option<&'a [String]>,
    pub blockers: Option<&'a [String]>,
    pub domain: &'a str,
}

/// One member's row in the digest roster.
pub struct DigestEntry {
    pub name: String,
    pub role: Option<String>,
    pub done: Vec<String>,
    pub will_do: Vec<String>,
    pub blockers: Vec<String>,
    pub has_update: bool,
}

/// Context for the team digest email.
pub struct DigestContext<'a> {
    pub team_name: &'a str,
    pub date: &'a str,
    pub domain: &'a str,
    pub entries: &'a [DigestEntry],
}

/// Plain-text reminder body.
pub fn reminder_text(ctx: &ReminderContext<'_>) -> String {
    let mut body = String::new();
    body.push_str("Hi!\n\n");
    body.push_str(&format!(
        "What did you get done today? Reply to this email with your update for {}.\n",
        ctx.team_name
    ));

    if let Some(todos) = ctx.todos.filter(|t| !t.is_empty()) {
        body.push_str("\nYesterday you planned to:\n");
        for todo in todos {
            body.push_str(&format!("  - {}\n", todo));
        }
    }

    if let Some(blockers) = ctx.blockers.filter(|b| !b.is_empty()) {
        body.push_str("\nYou reported these blockers:\n");
        for blocker in blockers {
            body.push_str(&format!("  - {}\n", blocker));
        }
    }

    body.push_str(&format!(
        "\nSend your update to {} and it will be shared in the next digest.\n",
        ctx.team_email
    ));
    if !ctx.domain.is_empty() {
        body.push_str(&format!("\n-- \nhttps://{}\n", ctx.domain));
    }
    body
}

/// Plain-text digest body.
pub fn digest_text(ctx: &DigestContext<'_>) -> String {
    let mut body = String::new();
    body.push_str(&format!("Digest for {} for {}\n", ctx.team_name, ctx.date));

    for entry in ctx.entries {
        body.push('\n');
        match &entry.role {
            Some(role) => body.push_str(&format!("{} ({})\n", entry.name, role)),
            None => body.push_str(&format!("{}\n", entry.name)),
        }
        if entry.has_update {
            push_section(&mut body, "Done", &entry.done);
            push_section(&mut body, "Will do", &entry.will_do);
            push_section(&mut body, "Blockers", &entry.blockers);
        } else {
            body.push_str("  No update submitted.\n");
        }
    }

    if !ctx.domain.is_empty() {
        body.push_str(&format!("\n-- \nhttps://{}\n", ctx.domain));
    }
    body
}

/// HTML digest body.
pub fn digest_html(ctx: &DigestContext<'_>) -> String {
    let mut body = String::new();
    body.push_str("<html><body>\n");
    body.push_str(&format!(
        "<h2>Digest for {} for {}</h2>\n",
        escape(ctx.team_name),
        escape(ctx.date)
    ));

    for entry in ctx.entries {
        match &entry.role {
            Some(role) => body.push_str(&format!(
                "<h3>{} <small>({})</small></h3>\n",
                escape(&entry.name),
                escape(role)
            )),
            None => body.push_str(&format!("<h3>{}</h3>\n", escape(&entry.name))),
        }
        if entry.has_update {
            push_html_section(&mut body, "Done", &entry.done);
            push_html_section(&mut body, "Will do", &entry.will_do);
            push_html_section(&mut body, "Blockers", &entry.blockers);
        } else {
            body.push_str("<p><em>No update submitted.</em></p>\n");
        }
    }

    if !ctx.domain.is_empty() {
        body.push_str(&format!(
            "<p><a href=\"https://{domain}\">{domain}</a></p>\n",
            domain = escape(ctx.domain)
        ));
    }
    body.push_str("</body></html>\n");
    body
}

/// Auto-reply for an inbound message that could not be parsed.
pub fn auto_reply_text(email_text: &str) -> String {
    format!(
        "Sorry, we could not read your update. Prefix each line with \
         '-' for done, '+' for will-do, or '*' for blockers, then resend.\n\n\
         Your message was:\n\n{}\n",
        email_text
    )
}

fn push_section(body: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    body.push_str(&format!("  {}:\n", label));
    for item in items {
        body.push_str(&format!("    - {}\n", item));
    }
}

fn push_html_section(body: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    body.push_str(&format!("<p><strong>{}</strong></p>\n<ul>\n", label));
    for item in items {
        body.push_str(&format!("<li>{}</li>\n", escape(item)));
    }
    body.push_str("</ul>\n");
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

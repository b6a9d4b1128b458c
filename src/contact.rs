//! Contact form payload and field checks. Delivery happens elsewhere.

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContactPayload {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactField {
    Name,
    Email,
    Subject,
    Message,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct FieldIssue {
    pub field: ContactField,
    pub message: &'static str,
}

const MIN_NAME: usize = 2;
const MIN_SUBJECT: usize = 5;
const MIN_MESSAGE: usize = 10;

/// `local@domain.tld`: one `@`, no whitespace, a dot inside the domain with text on both sides.
fn is_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && tld.chars().count() >= 2 && !host.ends_with('.'),
        None => false,
    }
}

impl ContactPayload {
    /// Every failing field, in form order.
    pub fn validate(&self) -> Result<(), Vec<FieldIssue>> {
        let mut issues = Vec::new();
        let mut check = |ok: bool, field, message| {
            if !ok {
                issues.push(FieldIssue { field, message });
            }
        };
        check(
            self.name.trim().chars().count() >= MIN_NAME,
            ContactField::Name,
            "Name must be at least 2 characters.",
        );
        check(
            is_email(self.email.trim()),
            ContactField::Email,
            "Please enter a valid email address.",
        );
        check(
            self.subject.trim().chars().count() >= MIN_SUBJECT,
            ContactField::Subject,
            "Subject must be at least 5 characters.",
        );
        check(
            self.message.trim().chars().count() >= MIN_MESSAGE,
            ContactField::Message,
            "Message must be at least 10 characters.",
        );
        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }
}

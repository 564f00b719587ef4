//! `$HOST$`-style placeholder substitution in action strings.

/// Values for one action invocation.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderValues {
    pub host: String,
    pub service: String,
    pub address: String,
    pub monitor: String,
    pub monitor_cgi: String,
    pub status_information: String,
    pub username: String,
    pub password: String,
    pub comment_ack: String,
    pub comment_down: String,
    pub comment_submit: String,
}

pub const TRANSID: &str = "$TRANSID$";

impl PlaceholderValues {
    fn mapping(&self) -> [(&'static str, &str); 11] {
        [
            ("$HOST$", &self.host),
            ("$SERVICE$", &self.service),
            ("$ADDRESS$", &self.address),
            ("$MONITOR$", &self.monitor),
            ("$MONITOR-CGI$", &self.monitor_cgi),
            ("$STATUS-INFO$", &self.status_information),
            ("$USERNAME$", &self.username),
            ("$PASSWORD$", &self.password),
            ("$COMMENT-ACK$", &self.comment_ack),
            ("$COMMENT-DOWN$", &self.comment_down),
            ("$COMMENT-SUBMIT$", &self.comment_submit),
        ]
    }

    /// `$$X$$` gets the URL-quoted value, `$X$` the literal one.
    pub fn substitute(&self, template: &str) -> String {
        let mut out = template.to_string();
        for (placeholder, value) in self.mapping() {
            out = out.replace(&format!("${}$", placeholder), &urlencoding::encode(value));
            out = out.replace(placeholder, value);
        }
        out
    }
}

pub fn needs_transid(s: &str) -> bool {
    s.contains(TRANSID)
}

/// Insert a Checkmk transaction id. Spaces become `+` in the whole URL.
pub fn substitute_transid(s: &str, transid: &str) -> String {
    s.replace(TRANSID, transid).replace(' ', "+")
}

/// Spaces in a plain action URL.
pub fn urlify(s: &str) -> String {
    s.trim().replace(' ', "%20")
}

/// Parse `key=value&key=value` POST data after substitution.
pub fn parse_cgi_data(data: &str) -> Vec<(String, String)> {
    data.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

use url::Url;

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Structural check: one `@`, non-empty local part, dotted domain, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

pub fn email_domain(email: &str) -> Option<&str> {
    email.rsplit_once('@').map(|(_, domain)| domain)
}

/// True when the email's domain equals, or is a subdomain of, a blacklisted domain.
pub fn is_blacklisted(email: &str, blacklist: &[String]) -> bool {
    let Some(domain) = email_domain(email) else {
        return false;
    };
    let domain = domain.to_ascii_lowercase();
    blacklist.iter().any(|blocked| {
        domain == *blocked
            || domain
                .strip_suffix(blocked.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

pub fn is_http_url(raw: &str) -> bool {
    match Url::parse(raw.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Index-keyed messages for every listing URL that is not absolute http(s).
pub fn invalid_listing_urls(urls: &[String]) -> Vec<String> {
    urls.iter()
        .enumerate()
        .filter(|(_, url)| !is_http_url(url))
        .map(|(index, _)| format!("Item {index}: Enter a valid URL."))
        .collect()
}

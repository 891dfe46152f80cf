/// Picks where to send the browser after checkout.
///
/// Only targets on the frontend's own origin are honoured; anything else, or
/// no target at all, lands on `domain`.
pub fn safe_redirect(requested: Option<&str>, domain: &str) -> String {
    match requested.map(str::trim) {
        Some(target) if is_same_origin(target, domain) => target.to_string(),
        _ => domain.to_string(),
    }
}

fn is_same_origin(target: &str, domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    match target.strip_prefix(domain) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "https://fitnest.app";

    #[test]
    fn keeps_targets_on_the_frontend() {
        assert_eq!(
            safe_redirect(Some("https://fitnest.app/customer/sessions"), DOMAIN),
            "https://fitnest.app/customer/sessions"
        );
        assert_eq!(safe_redirect(Some(DOMAIN), DOMAIN), DOMAIN);
    }

    #[test]
    fn foreign_or_missing_targets_fall_back() {
        assert_eq!(safe_redirect(None, DOMAIN), DOMAIN);
        assert_eq!(safe_redirect(Some("https://evil.example"), DOMAIN), DOMAIN);
        // prefix match alone is not enough
        assert_eq!(
            safe_redirect(Some("https://fitnest.app.evil.example/x"), DOMAIN),
            DOMAIN
        );
    }
}

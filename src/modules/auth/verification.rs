use crate::modules::config::LinkConfig;

/// Build the link mailed to a user to confirm their address.
///
/// `scheme://host[:port]<path>?token=<token>`: the host is the configured
/// domain, or `localhost` without one, and the port only appears when no
/// domain is configured. Tokens are base64url JWTs and need no escaping.
pub fn build_verification_url(link: &LinkConfig, token: &str) -> String {
    let authority = match &link.domain {
        Some(domain) => domain.clone(),
        None => format!("localhost:{}", link.port),
    };

    let path = if link.verify_path.starts_with('/') {
        link.verify_path.clone()
    } else {
        format!("/{}", link.verify_path)
    };

    format!("{}://{}{}?token={}", link.scheme, authority, path, token)
}

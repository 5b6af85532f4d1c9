use url::Url;

use super::{ProxyIdentity, RewriteError};

/// Where the path of a rewritten URL comes from
#[derive(Debug, Clone, Copy)]
pub enum PathSource<'a> {
    /// Precomputed proxy path of a playlist track
    Relative(&'a str),
    /// Upstream path with upstream Xtream credentials swapped for the proxy's
    XtreamPassthrough,
}

/// Rewrite an upstream URL into the externally reachable proxy URL
///
/// `scheme://[userinfo@]host:port[/custom]path`, where userinfo is copied from
/// the upstream URL.
pub fn rewrite_url(
    uri: &str,
    source: PathSource<'_>,
    identity: &ProxyIdentity,
) -> Result<String, RewriteError> {
    let original = Url::parse(uri).map_err(|e| RewriteError::MalformedUpstreamUrl {
        uri: uri.to_string(),
        source: e,
    })?;

    let path = match source {
        PathSource::Relative(relative) => relative.to_string(),
        PathSource::XtreamPassthrough => passthrough_path(&original, identity),
    };

    let rewritten = format!(
        "{}://{}{}:{}{}{}",
        identity.scheme(),
        basic_auth(&original),
        identity.hostname,
        identity.advertised_port,
        identity.custom_prefix(),
        path
    );

    let parsed = Url::parse(&rewritten).map_err(|e| RewriteError::InvalidProxyUrl {
        url: rewritten.clone(),
        source: e,
    })?;

    Ok(parsed.to_string())
}

/// Upstream path with every segment equal to an upstream credential replaced
/// by the proxy's escaped credential
fn passthrough_path(original: &Url, identity: &ProxyIdentity) -> String {
    let Some(upstream) = &identity.upstream else {
        return original.path().to_string();
    };
    let Some(segments) = original.path_segments() else {
        return original.path().to_string();
    };

    let swapped: Vec<String> = segments
        .map(|segment| {
            let decoded = urlencoding::decode(segment).unwrap_or(segment.into());
            if !upstream.username.is_empty() && decoded == upstream.username.as_str() {
                identity.escaped_user().into_owned()
            } else if !upstream.password.is_empty() && decoded == upstream.password.as_str() {
                identity.escaped_password().into_owned()
            } else {
                segment.to_string()
            }
        })
        .collect();

    format!("/{}", swapped.join("/"))
}

/// `user[:password]@` from the upstream URL, empty when absent
fn basic_auth(url: &Url) -> String {
    let user = url.username();
    match (user.is_empty(), url.password()) {
        (true, None) => String::new(),
        (_, Some(password)) => format!("{}:{}@", user, password),
        (false, None) => format!("{}@", user),
    }
}

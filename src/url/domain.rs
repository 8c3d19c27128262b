use url::{Host, Url};

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host, it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_fetch::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Extracts the pay-level domain (registrable domain, eTLD+1) of a URL
///
/// IP literals and hosts without a registrable part (e.g. `localhost`) are
/// returned unchanged, so every valid host maps to some target.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_fetch::url::pay_level_domain;
///
/// let url = Url::parse("https://www.example.co.uk/a").unwrap();
/// assert_eq!(pay_level_domain(&url), Some("example.co.uk".to_string()));
/// ```
pub fn pay_level_domain(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
        Host::Domain(host) => {
            let host = host.to_lowercase();
            let pld = psl::domain(host.as_bytes())
                .map(|domain| String::from_utf8_lossy(domain.as_bytes()).to_string());
            Some(pld.unwrap_or(host))
        }
    }
}

/// Returns the `scheme://host[:port]` origin used to key robots.txt
pub fn robots_origin(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Returns the robots.txt URL for the origin of `url`
pub fn robots_url(url: &Url) -> Option<Url> {
    let origin = robots_origin(url)?;
    Url::parse(&format!("{}/robots.txt", origin)).ok()
}

/// Returns the path plus query, the part robots.txt rules are matched against
pub fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

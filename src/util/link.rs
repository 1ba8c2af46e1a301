use url::Url;

/// Turn a story URL into something safe to hand to the system browser.
///
/// Story URLs are user-submitted; a missing scheme is read as `https://`.
/// Anything other than http(s) is refused so `open` never launches a local
/// handler (`file:`, `javascript:` and the like).
pub fn browser_url(raw: &str) -> Result<Url, &'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("Story has no URL");
    }

    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let with_scheme = match raw.strip_prefix("//") {
                Some(rest) => format!("https://{rest}"),
                None => format!("https://{raw}"),
            };
            Url::parse(&with_scheme).map_err(|_| "Story URL is not valid")?
        }
        Err(_) => return Err("Story URL is not valid"),
    };

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err("Story URL has no host"),
        _ => Err("Only http and https links can be opened"),
    }
}

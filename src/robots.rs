//! robots.txt consultation before fetching. Any failure allows the fetch.

use texting_robots::Robot;
use tracing::{debug, warn};

/// Agent name checked against robots.txt groups.
pub const ROBOTS_AGENT: &str = "*";

/// Whether `robots_txt` lets `agent` fetch `url`. Unparseable files allow.
pub fn allowed_by(robots_txt: &str, url: &str, agent: &str) -> bool {
    Robot::new(agent, robots_txt.as_bytes())
        .map(|r| r.allowed(url))
        .unwrap_or(true)
}

/// Fetch the host's `/robots.txt` and check `url` against it.
pub async fn is_allowed(client: &reqwest::Client, url: &str) -> bool {
    let Some(robots_url) = url::Url::parse(url)
        .ok()
        .and_then(|u| u.join("/robots.txt").ok())
    else {
        return true;
    };

    let body = match client.get(robots_url.as_str()).send().await {
        Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
        Ok(resp) => {
            debug!("No robots.txt at {} (HTTP {})", robots_url, resp.status());
            return true;
        }
        Err(e) => {
            warn!("Could not read {}: {}", robots_url, e);
            return true;
        }
    };

    let allowed = allowed_by(&body, url, ROBOTS_AGENT);
    if !allowed {
        warn!("robots.txt disallows {}", url);
    }
    allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn disallow_rules_apply() {
        let txt = "User-agent: *\nDisallow: /private\n";
        assert!(!allowed_by(txt, "https://x.test/private/page", "*"));
        assert!(allowed_by(txt, "https://x.test/public", "*"));
        assert!(allowed_by("", "https://x.test/private", "*"));
    }

    #[tokio::test]
    async fn fetched_rules_and_missing_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /admin\n"))
            .mount(&server)
            .await;
        let client = reqwest::Client::new();
        assert!(!is_allowed(&client, &format!("{}/admin/x", server.uri())).await);
        assert!(is_allowed(&client, &format!("{}/shop", server.uri())).await);

        let empty = MockServer::start().await;
        assert!(is_allowed(&client, &format!("{}/admin/x", empty.uri())).await);
    }
}

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

lazy_static! {
    // Alphanumerics and single inner hyphens, 39 characters at most.
    static ref USERNAME_PATTERN: Regex =
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9]|-[A-Za-z0-9]){0,38}$").unwrap();
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProfileSummary {
    pub login: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: String,
    pub html_url: String,
    pub public_repos: u32,
    pub followers: u32,
    pub following: u32,
}

pub struct GitHub;

impl GitHub {
    pub fn is_valid_username(user: &str) -> bool {
        USERNAME_PATTERN.is_match(user)
    }

    pub fn profile_url(api_base: &str, user: &str) -> String {
        format!("{}/users/{}", api_base.trim_end_matches('/'), user)
    }

    pub async fn fetch_profile(
        client: &reqwest::Client,
        api_base: &str,
        user: &str,
    ) -> Result<ProfileSummary> {
        if !Self::is_valid_username(user) {
            return Err(anyhow::anyhow!("Invalid GitHub username: {}", user));
        }

        let res = client
            .get(Self::profile_url(api_base, user))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        if res.status().is_success() {
            let profile = res.json::<ProfileSummary>().await?;
            info!("Fetched GitHub profile for {}", profile.login);
            Ok(profile)
        } else {
            Err(anyhow::anyhow!(
                "GitHub profile request for {} failed with status: {}",
                user,
                res.status()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GitHub;

    #[test]
    fn test_username_validation() {
        assert!(GitHub::is_valid_username("octocat"));
        assert!(GitHub::is_valid_username("jane-doe-42"));
        assert!(!GitHub::is_valid_username("-leading"));
        assert!(!GitHub::is_valid_username("trailing-"));
        assert!(!GitHub::is_valid_username("double--hyphen"));
        assert!(!GitHub::is_valid_username("../etc/passwd"));
        assert!(!GitHub::is_valid_username(&"a".repeat(40)));
        assert!(GitHub::is_valid_username(&"a".repeat(39)));
    }

    #[test]
    fn test_profile_url_tolerates_trailing_slash() {
        assert_eq!(
            GitHub::profile_url("https://api.github.com/", "octocat"),
            "https://api.github.com/users/octocat"
        );
    }

    #[tokio::test]
    async fn test_fetch_profile_rejects_bad_username_without_request() {
        let client = reqwest::Client::new();
        let err = GitHub::fetch_profile(&client, "http://127.0.0.1:9", "bad/name")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid GitHub username"));
    }
}

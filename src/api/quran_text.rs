//! Verse text from the alquran.cloud REST API, one request per verse.

use crate::api::USER_AGENT;
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::models::Verse;
use crate::registry;
use crate::{logi, logw};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

const STATUS_OK: u16 = 200;

#[derive(Debug, Deserialize)]
struct AyahEnvelope {
    code: u16,
    #[serde(default)]
    data: Option<AyahData>,
}

#[derive(Debug, Deserialize)]
struct AyahData {
    #[serde(default)]
    text: String,
}

pub struct QuranTextClient {
    pub client: reqwest::Client,
    base: String,
    timeout: Duration,
}

impl QuranTextClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self::with_client(client, cfg))
    }

    pub fn with_client(client: reqwest::Client, cfg: &Config) -> Self {
        Self {
            client,
            base: cfg.text_api_base.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(cfg.timeouts.text),
        }
    }

    pub fn verse_url(&self, surah: u16, verse: u16) -> String {
        format!("{}/ayah/{}:{}", self.base, surah, verse)
    }

    /// Fetches `verse_start..=verse_end`. Verses whose envelope is not OK are skipped;
    /// a transport failure stops the range and returns what was collected so far.
    pub async fn fetch_verses(
        &self,
        surah: u16,
        verse_start: u16,
        verse_end: u16,
        cancel: &CancelToken,
    ) -> Vec<Verse> {
        let mut verses = Vec::new();
        let surah_name = registry::surah_name(surah);

        for number in verse_start..=verse_end {
            let outcome = match cancel.run(self.fetch_one(surah, number)).await {
                Some(outcome) => outcome,
                None => {
                    logw("Verse text fetch cancelled");
                    break;
                }
            };

            match outcome {
                Ok(Some(text)) => verses.push(Verse {
                    surah,
                    number,
                    text,
                    surah_name: surah_name.to_string(),
                }),
                Ok(None) => logw(format!("API error for verse {}:{}", surah, number)),
                Err(err) => {
                    logw(format!("Error fetching verse text: {:#}", err));
                    break;
                }
            }
        }

        logi(format!("Fetched {} verse texts for surah {}", verses.len(), surah));
        verses
    }

    async fn fetch_one(&self, surah: u16, verse: u16) -> Result<Option<String>> {
        let url = self.verse_url(surah, verse);
        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("HTTP error: {url}"))?;

        let envelope: AyahEnvelope = resp
            .json()
            .await
            .with_context(|| format!("invalid response body: {url}"))?;

        if envelope.code != STATUS_OK {
            return Ok(None);
        }
        Ok(envelope.data.map(|d| d.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> QuranTextClient {
        let cfg = Config {
            text_api_base: server.uri(),
            ..Config::default()
        };
        QuranTextClient::new(&cfg).unwrap()
    }

    fn ok_body(text: &str) -> serde_json::Value {
        json!({"code": 200, "status": "OK", "data": {"text": text}})
    }

    #[tokio::test]
    async fn test_fetches_full_range_in_order() {
        let server = MockServer::start().await;
        for (n, text) in [(1, "بِسْمِ"), (2, "ٱلْحَمْدُ"), (3, "ٱلرَّحْمَـٰنِ")] {
            Mock::given(method("GET"))
                .and(path(format!("/ayah/1:{n}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(ok_body(text)))
                .mount(&server)
                .await;
        }

        let verses = client_for(&server).fetch_verses(1, 1, 3, &CancelToken::never()).await;
        assert_eq!(verses.len(), 3);
        assert_eq!(verses.iter().map(|v| v.number).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(verses[0].text, "بِسْمِ");
        assert_eq!(verses[0].surah_name, "الفاتحة");
    }

    #[tokio::test]
    async fn test_skips_verse_with_non_ok_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ayah/1:1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("a")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ayah/1:2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 404, "data": null})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ayah/1:3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("c")))
            .mount(&server)
            .await;

        let verses = client_for(&server).fetch_verses(1, 1, 3, &CancelToken::never()).await;
        assert_eq!(verses.iter().map(|v| v.number).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_http_failure_short_circuits_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ayah/2:1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("a")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ayah/2:2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let verses = client_for(&server).fetch_verses(2, 1, 5, &CancelToken::never()).await;
        assert_eq!(verses.len(), 1);
        assert_eq!(verses[0].number, 1);
    }

    #[test]
    fn test_verse_url() {
        let cfg = Config {
            text_api_base: "https://api.example.test/v1/".to_string(),
            ..Config::default()
        };
        let client = QuranTextClient::new(&cfg).unwrap();
        assert_eq!(client.verse_url(2, 255), "https://api.example.test/v1/ayah/2:255");
    }
}

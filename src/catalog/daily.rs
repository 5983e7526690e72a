use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::models::{BreathPattern, Practice, PracticeKind, Step};

use super::default_practice;

const DAILY_XP: u32 = 30;

/// Shape returned by the daily script endpoint. Only `steps` is required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyScript {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    kind: Option<PracticeKind>,
    #[serde(default)]
    xp: Option<u32>,
    #[serde(default)]
    breath_pattern: Option<BreathPattern>,
    #[serde(default)]
    auto_advance: bool,
    steps: Vec<Step>,
}

impl DailyScript {
    fn into_practice(self, date: NaiveDate) -> Result<Practice> {
        let mut practice = Practice::new(
            format!("daily-{date}"),
            self.title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| "Today's Practice".to_string()),
            self.kind.unwrap_or(PracticeKind::Presence),
            self.xp.unwrap_or(DAILY_XP),
            self.steps,
        );
        practice.breath_pattern = self.breath_pattern;
        practice.auto_advance = self.auto_advance;
        practice.validate()?;
        Ok(practice)
    }
}

/// Remote "daily script" feed. Any failure yields the built-in default
/// practice so the user always has something to run.
pub struct DailyScriptSource {
    client: reqwest::Client,
    url: Option<String>,
}

impl DailyScriptSource {
    pub fn new(url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, url })
    }

    pub async fn fetch(&self) -> Practice {
        match self.try_fetch().await {
            Ok(practice) => {
                log::info!("Loaded daily practice '{}'", practice.title);
                practice
            }
            Err(err) => {
                log::warn!("Daily script unavailable, using default practice: {err:#}");
                default_practice()
            }
        }
    }

    async fn try_fetch(&self) -> Result<Practice> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| anyhow!("no daily script URL configured"))?;

        let response = self
            .client
            .get(url)
            .query(&[("date", Utc::now().date_naive().to_string())])
            .send()
            .await
            .context("daily script request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("daily script endpoint returned {status}");
        }

        let body = response.text().await.context("failed to read daily script")?;
        parse_daily_script(&body, Utc::now().date_naive())
    }
}

/// Normalize a daily script body into a practice for `date`.
pub fn parse_daily_script(body: &str, date: NaiveDate) -> Result<Practice> {
    let script: DailyScript =
        serde_json::from_str(body).context("malformed daily script")?;
    script.into_practice(date)
}

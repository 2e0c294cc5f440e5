use crate::tools::{extract_string_arg, extract_string_arg_opt};
use crate::traits::{Tool, ToolParameter, ToolParameters, ToolResult};
use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

const WTTR_BASE_URL: &str = "https://wttr.in";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Conditions {
    #[serde(rename = "FeelsLikeC")]
    pub feels_like_c: String,
    #[serde(rename = "FeelsLikeF")]
    pub feels_like_f: String,
    pub humidity: String,
    #[serde(rename = "temp_C", alias = "tempC")]
    pub temp_c: String,
    #[serde(rename = "temp_F", alias = "tempF")]
    pub temp_f: String,
    #[serde(rename = "localObsDateTime", skip_serializing_if = "String::is_empty")]
    pub local_obs_date_time: String,
    #[serde(rename = "weatherDesc")]
    pub weather_desc: Vec<Description>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Description {
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Astronomy {
    pub sunrise: String,
    pub sunset: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Forecast {
    pub astronomy: Vec<Astronomy>,
    pub date: String,
    pub hourly: Vec<Conditions>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherReport {
    pub current_condition: Vec<Conditions>,
    pub weather: Vec<Forecast>,
}

impl WeatherReport {
    /// Keeps only the forecast days inside `[start, end]`. Days with an
    /// unparseable date are dropped once any bound is set.
    fn retain_range(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        if start.is_none() && end.is_none() {
            return;
        }
        self.weather.retain(|day| {
            let Ok(date) = NaiveDate::parse_from_str(&day.date, DATE_FORMAT) else {
                return false;
            };
            start.is_none_or(|s| date >= s) && end.is_none_or(|e| date <= e)
        });
    }
}

/// Looks up current conditions and the forecast on wttr.in.
pub struct WeatherTool {
    client: reqwest::Client,
    base_url: String,
}

impl WeatherTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: WTTR_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn report_url(&self, location: &str) -> anyhow::Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("Invalid weather endpoint: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Weather endpoint cannot carry a path"))?
            .pop_if_empty()
            .push(location);
        url.query_pairs_mut().append_pair("format", "j1");
        Ok(url)
    }

    pub async fn fetch(&self, location: &str) -> anyhow::Result<WeatherReport> {
        let url = self.report_url(location)?;
        debug!("Fetching weather from {}", url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("wttr.in returned {}", response.status());
        }
        response
            .json::<WeatherReport>()
            .await
            .context("Failed to decode weather report")
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_date_arg(arguments: &Map<String, Value>, key: &str) -> anyhow::Result<Option<NaiveDate>> {
    let raw = extract_string_arg_opt(arguments, key, "");
    if raw.trim().is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map(Some)
        .with_context(|| format!("'{key}' must be formatted as YYYY-MM-DD, got '{raw}'"))
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> String {
        "Weather is a tool that allows you to get the weather of a location.".to_string()
    }

    fn parameters(&self) -> ToolParameters {
        let mut params = ToolParameters::new();
        params.insert(
            "location".into(),
            ToolParameter::required("string", "The location that you want to get the weather of."),
        );
        params.insert(
            "start_date".into(),
            ToolParameter::optional("string", "The start date of the weather that you want to get.")
                .with_format("YYYY-MM-DD"),
        );
        params.insert(
            "end_date".into(),
            ToolParameter::optional("string", "The end date of the weather that you want to get.")
                .with_format("YYYY-MM-DD"),
        );
        params
    }

    fn use_cases(&self) -> Vec<String> {
        vec![
            "Run this tool if the user wants to get the weather of a location.".to_string(),
            "Run this tool if the user want to know about a weather condition in a location, for example: is raining in New York?".to_string(),
        ]
    }

    async fn run(&self, arguments: &Map<String, Value>, query: &str) -> anyhow::Result<ToolResult> {
        let location = extract_string_arg(arguments, "location")?;
        let start = parse_date_arg(arguments, "start_date")?;
        let end = parse_date_arg(arguments, "end_date")?;

        let mut report = self.fetch(&location).await?;
        report.retain_range(start, end);

        let data = serde_json::to_string(&report)?;
        Ok(ToolResult::prompts(vec![format!(
            "[weather-tool] UserQuery: {query}, data: {data}. NOTE: Some answer could be in a different language that user query, please translate it."
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ToolOutput;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_report() -> Value {
        json!({
            "current_condition": [{
                "FeelsLikeC": "18", "FeelsLikeF": "64", "humidity": "72",
                "temp_C": "19", "temp_F": "66",
                "localObsDateTime": "2024-05-01 09:00 AM",
                "weatherDesc": [{"value": "Light rain"}],
                "uvIndex": "3"
            }],
            "weather": [
                {"date": "2024-05-01", "astronomy": [{"sunrise": "04:50 AM", "sunset": "06:30 PM"}], "hourly": []},
                {"date": "2024-05-02", "astronomy": [], "hourly": []},
                {"date": "2024-05-03", "astronomy": [], "hourly": []}
            ],
            "nearest_area": []
        })
    }

    #[tokio::test]
    async fn fetches_report_and_filters_dates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Tokyo"))
            .and(query_param("format", "j1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_report()))
            .expect(1)
            .mount(&server)
            .await;

        let tool = WeatherTool::new().with_base_url(server.uri());
        let args = json!({"location": "Tokyo", "start_date": "2024-05-02"});
        let result = tool
            .run(args.as_object().unwrap(), "will it rain in tokyo?")
            .await
            .unwrap();

        let ToolOutput::Prompts(blobs) = result.output else {
            panic!("expected prompts");
        };
        assert_eq!(blobs.len(), 1);
        let blob = &blobs[0];
        assert!(blob.starts_with("[weather-tool] UserQuery: will it rain in tokyo?, data: "));
        assert!(blob.contains("Light rain"));
        assert!(blob.contains("2024-05-02"));
        assert!(blob.contains("2024-05-03"));
        assert!(!blob.contains("2024-05-01\""));
        assert!(!blob.contains("uvIndex"));
    }

    #[test]
    fn location_is_path_encoded() {
        let tool = WeatherTool::new().with_base_url("http://localhost:9/");
        let url = tool.report_url("New York").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9/New%20York?format=j1");
    }

    #[test]
    fn range_keeps_inclusive_bounds() {
        let mut report: WeatherReport = serde_json::from_value(sample_report()).unwrap();
        let day = |s| NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap();
        report.retain_range(Some(day("2024-05-01")), Some(day("2024-05-02")));
        let dates: Vec<_> = report.weather.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-05-01", "2024-05-02"]);
    }

    #[tokio::test]
    async fn rejects_malformed_dates() {
        let tool = WeatherTool::new().with_base_url("http://localhost:9");
        let args = json!({"location": "Paris", "end_date": "tomorrow"});
        let err = tool.run(args.as_object().unwrap(), "q").await.unwrap_err();
        assert!(err.to_string().contains("end_date"));
    }

    #[tokio::test]
    async fn missing_location_fails() {
        let tool = WeatherTool::new();
        assert!(tool.run(&Map::new(), "q").await.is_err());
    }

    #[tokio::test]
    async fn upstream_error_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let tool = WeatherTool::new().with_base_url(server.uri());
        let args = json!({"location": "Oslo"});
        assert!(tool.run(args.as_object().unwrap(), "q").await.is_err());
    }
}

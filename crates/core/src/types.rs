use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Media channel a placement was delivered through.
///
/// Unrecognised values are kept verbatim in `Other` so that distinct
/// channels never share an aggregate key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(from = "String", into = "String")]
pub enum Channel {
    Print,
    Radio,
    Podcast,
    Digital,
    Newsletter,
    Social,
    Events,
    Streaming,
    Television,
    Other(String),
}

impl Channel {
    pub fn as_str(&self) -> &str {
        match self {
            Channel::Print => "print",
            Channel::Radio => "radio",
            Channel::Podcast => "podcast",
            Channel::Digital => "digital",
            Channel::Newsletter => "newsletter",
            Channel::Social => "social",
            Channel::Events => "events",
            Channel::Streaming => "streaming",
            Channel::Television => "television",
            Channel::Other(raw) => raw,
        }
    }
}

impl From<String> for Channel {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "print" => Channel::Print,
            "radio" => Channel::Radio,
            "podcast" => Channel::Podcast,
            "digital" => Channel::Digital,
            "newsletter" => Channel::Newsletter,
            "social" => Channel::Social,
            "events" => Channel::Events,
            "streaming" => Channel::Streaming,
            "television" => Channel::Television,
            _ => Channel::Other(raw),
        }
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sparse delivery metrics reported on an entry. Absent fields count as zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impressions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clicks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reach: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insertions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spots_aired: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<u64>,
}

impl EntryMetrics {
    /// Units delivered across every channel-specific unit field. Saturates
    /// at `u64::MAX`.
    pub fn units_delivered(&self) -> u64 {
        [self.insertions, self.spots_aired, self.downloads, self.posts]
            .into_iter()
            .flatten()
            .fold(0u64, u64::saturating_add)
    }
}

/// One raw delivery report, written by outlet reporting workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEntry {
    pub id: String,
    pub campaign_id: String,
    pub publication_id: i64,
    pub publication_name: String,
    pub channel: Channel,
    pub date_start: DateTime<Utc>,
    pub date_end: DateTime<Utc>,
    #[serde(default)]
    pub metrics: EntryMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PerformanceEntry {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Day bucket this entry aggregates into.
    pub fn day(&self) -> NaiveDate {
        self.date_start.date_naive()
    }

    pub fn aggregate_key(&self) -> AggregateKey {
        AggregateKey {
            date: self.day(),
            campaign_id: self.campaign_id.clone(),
            publication_id: self.publication_id,
            channel: self.channel.clone(),
        }
    }
}

/// Composite identity of a daily aggregate row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub struct AggregateKey {
    pub date: NaiveDate,
    pub campaign_id: String,
    pub publication_id: i64,
    pub channel: Channel,
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "campaign={} publication={} channel={} date={}",
            self.campaign_id, self.publication_id, self.channel, self.date
        )
    }
}

/// Day-level rollup keyed by (date, campaign, publication, channel).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub campaign_id: String,
    pub publication_id: i64,
    pub publication_name: String,
    pub channel: Channel,
    pub impressions: u64,
    pub clicks: u64,
    pub units_delivered: u64,
    pub reach: u64,
    pub ctr: f64,
    pub entry_count: u64,
    pub computed_at: DateTime<Utc>,
}

impl DailyAggregate {
    pub fn key(&self) -> AggregateKey {
        AggregateKey {
            date: self.date,
            campaign_id: self.campaign_id.clone(),
            publication_id: self.publication_id,
            channel: self.channel.clone(),
        }
    }
}

/// Click-through rate with a zero guard on impressions.
pub fn click_through_rate(clicks: u64, impressions: u64) -> f64 {
    if impressions > 0 {
        clicks as f64 / impressions as f64
    } else {
        0.0
    }
}

/// Midnight UTC of the day containing `ts`.
pub fn start_of_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Midnight UTC of the day after the one containing `ts`.
pub fn start_of_next_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day(ts) + Duration::days(1)
}

/// Requested range echoed back in every run result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Summary of a single aggregation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationRunResult {
    pub run_id: Uuid,
    pub success: bool,
    pub aggregates_created: u64,
    pub aggregates_updated: u64,
    pub date_range: DateRange,
    pub duration_ms: u64,
    pub errors: Vec<String>,
}

impl AggregationRunResult {
    /// Successful run that touched nothing.
    pub fn noop(at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            success: true,
            aggregates_created: 0,
            aggregates_updated: 0,
            date_range: DateRange { from: at, to: at },
            duration_ms: 0,
            errors: Vec::new(),
        }
    }

    /// Run aborted before any upsert was attempted.
    pub fn failed(
        run_id: Uuid,
        date_range: DateRange,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            run_id,
            success: false,
            aggregates_created: 0,
            aggregates_updated: 0,
            date_range,
            duration_ms,
            errors: vec![error.into()],
        }
    }
}

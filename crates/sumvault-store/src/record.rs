//! Summary records and their metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

/// A persisted summary. `envelope` is opaque ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub id: String,
    /// Wallet address the summary belongs to
    pub owner: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub envelope: String,
    pub conversation_length: u32,
    pub duration_minutes: Option<i64>,
    pub topic: Option<String>,
    pub session_id: Option<String>,
    pub contract_stored: bool,
}

impl SummaryRecord {
    pub fn new(owner: impl Into<String>, envelope: impl Into<String>) -> Self {
        let created_at = Utc::now();
        Self {
            id: summary_id(created_at),
            owner: owner.into(),
            title: None,
            created_at,
            envelope: envelope.into(),
            conversation_length: 0,
            duration_minutes: None,
            topic: None,
            session_id: None,
            contract_stored: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_stats(mut self, stats: ConversationStats) -> Self {
        self.conversation_length = stats.message_count;
        self.duration_minutes = Some(stats.duration_minutes);
        self
    }

    /// Metadata plus the still-encrypted envelope, as camelCase JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Message count and wall-clock length of the summarized conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversationStats {
    pub message_count: u32,
    pub duration_minutes: i64,
}

impl ConversationStats {
    /// Duration runs from the first to the last message, rounded to minutes
    pub fn from_timestamps(timestamps: &[DateTime<Utc>]) -> Self {
        let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) else {
            return Self::default();
        };
        let millis = (*last - *first).num_milliseconds();
        Self {
            message_count: timestamps.len() as u32,
            duration_minutes: (millis as f64 / 60_000.0).round() as i64,
        }
    }
}

/// `summary_YYYY_MM_DD_HH_MM_<suffix>`; the suffix keeps ids unique within a minute
fn summary_id(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("summary_{}_{}", at.format("%Y_%m_%d_%H_%M"), &suffix[..8])
}

/// Chat session id: `<unix millis>_<9 random chars>`
pub fn generate_session_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().timestamp_millis(), &random[..9])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_summary_id_format() {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 0).unwrap();
        let id = summary_id(at);
        assert!(id.starts_with("summary_2025_03_07_09_05_"));
        assert_eq!(id.len(), "summary_2025_03_07_09_05_".len() + 8);
        assert_ne!(summary_id(at), id);
    }

    #[test]
    fn test_session_id_format() {
        let id = generate_session_id();
        let (millis, random) = id.split_once('_').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(random.len(), 9);
    }

    #[test]
    fn test_stats_rounding() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let stamps = [
            start,
            start + Duration::seconds(40),
            start + Duration::seconds(150),
        ];
        let stats = ConversationStats::from_timestamps(&stamps);
        assert_eq!(stats.message_count, 3);
        // 2.5 minutes rounds away from zero
        assert_eq!(stats.duration_minutes, 3);
    }

    #[test]
    fn test_stats_empty_and_single() {
        assert_eq!(ConversationStats::from_timestamps(&[]), ConversationStats::default());

        let one = ConversationStats::from_timestamps(&[Utc::now()]);
        assert_eq!(one.message_count, 1);
        assert_eq!(one.duration_minutes, 0);
    }

    #[test]
    fn test_json_export() {
        let record = SummaryRecord::new("0xabc", "{\"v\":1}")
            .with_title("Standup")
            .with_session("123_abc");

        let json = record.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["owner"], "0xabc");
        assert_eq!(value["sessionId"], "123_abc");
        assert_eq!(value["contractStored"], false);
        assert_eq!(value["envelope"], "{\"v\":1}");

        assert_eq!(SummaryRecord::from_json(&json).unwrap(), record);
        assert!(matches!(
            SummaryRecord::from_json("{}"),
            Err(crate::StoreError::Json(_))
        ));
    }

    #[test]
    fn test_builder() {
        let record = SummaryRecord::new("0xabc", "{\"v\":1}")
            .with_title("Standup")
            .with_topic("planning")
            .with_session("123_abc")
            .with_stats(ConversationStats {
                message_count: 12,
                duration_minutes: 7,
            });

        assert_eq!(record.owner, "0xabc");
        assert_eq!(record.envelope, "{\"v\":1}");
        assert_eq!(record.title.as_deref(), Some("Standup"));
        assert_eq!(record.conversation_length, 12);
        assert_eq!(record.duration_minutes, Some(7));
        assert!(!record.contract_stored);
    }
}

//! Intent Router
//!
//! Classifies a raw query as either:
//! - Weather: anything mentioning weather vocabulary ("北京今天的天气怎么样？")
//! - Knowledge: everything else, answered from the finance knowledge base
//!
//! Pure keyword matching, no LLM call.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Weather,
    Knowledge,
}

/// Static keyword lists
const WEATHER_KEYWORDS: &[&str] = &[
    // Chinese
    "天气", "气温", "温度", "下雨", "下雪", "刮风", "气象",
    // English
    "weather", "temperature", "forecast", "raining", "snowing",
];

/// Filler words trimmed off a location candidate
const LOCATION_FILLERS: &[&str] = &[
    "今天", "明天", "后天", "现在", "目前", "当前", "最近", "这几天", "的", "查询", "查一下", "请问",
];

/// Used when no location can be pulled out of the query
pub const DEFAULT_LOCATION: &str = "北京";

/// Intent router
pub struct IntentRouter;

impl IntentRouter {
    /// Classify a query; ambiguous input is `Knowledge`
    pub fn classify(query: &str) -> Intent {
        let lowered = query.to_lowercase();

        if WEATHER_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            Intent::Weather
        } else {
            Intent::Knowledge
        }
    }

    /// Naive location extraction: the text before the first weather keyword,
    /// minus filler words. English "weather in X" takes the words after "in".
    pub fn extract_location(query: &str) -> String {
        let lowered = query.to_lowercase();

        if let Some(idx) = lowered.find(" in ") {
            let tail: String = query
                .get(idx + 4..)
                .unwrap_or_default()
                .chars()
                .take_while(|c| c.is_alphabetic() || *c == ' ' || *c == '-')
                .collect();
            let tail = tail.trim();
            if !tail.is_empty() {
                return tail.to_string();
            }
        }

        let cut = WEATHER_KEYWORDS
            .iter()
            .filter_map(|kw| lowered.find(kw))
            .min()
            .unwrap_or(lowered.len());

        // offsets come from `lowered`; `get` guards against case folding
        // that changed byte lengths
        let head = query.get(..cut).unwrap_or(query);

        let mut candidate = head.trim().to_string();
        loop {
            let before = candidate.clone();
            for filler in LOCATION_FILLERS {
                if let Some(stripped) = candidate.strip_suffix(filler) {
                    candidate = stripped.trim_end().to_string();
                }
                if let Some(stripped) = candidate.strip_prefix(filler) {
                    candidate = stripped.trim_start().to_string();
                }
            }
            if candidate == before {
                break;
            }
        }

        let candidate: String = candidate
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-')
            .collect();
        let candidate = candidate.trim();

        if candidate.is_empty() {
            DEFAULT_LOCATION.to_string()
        } else {
            candidate.to_string()
        }
    }
}

use ccc_events::{topics, Envelope};
use chrono::{DateTime, Local};
use serde_json::Value;

fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn clock(time: &str) -> String {
    DateTime::parse_from_rfc3339(time)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|_| time.to_string())
}

fn gauge_line(gauge: &Value) -> String {
    match gauge["state"].as_str() {
        Some("available") => format!(
            "risk {}% at {:+.1}° ({})",
            text(&gauge["percent"]),
            gauge["angle_degrees"].as_f64().unwrap_or(0.0),
            text(&gauge["tone"])
        ),
        Some("unavailable") => "risk not available".to_string(),
        _ => "idle".to_string(),
    }
}

/// One terminal line per view update.
pub fn render(env: &Envelope) -> String {
    let p = &env.payload;
    let body = match env.topic.as_str() {
        topics::TOPIC_STATUS => format!("[{}] {}", text(&p["level"]), text(&p["message"])),
        topics::TOPIC_SELECTION_ANALYZED => format!(
            "Customer {} [{}] Base Risk: {} | With Action: {}",
            text(&p["customer_id"]),
            text(&p["badge"]),
            text(&p["base_pct"]),
            text(&p["with_action_pct"])
        ),
        topics::TOPIC_IMPORTANCE_UPDATED => p
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|f| {
                        format!(
                            "{}={:.2}",
                            text(&f["feature"]),
                            f["importance"].as_f64().unwrap_or(0.0)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default(),
        topics::TOPIC_SIMULATION_UPDATED => format!(
            "{} usage_drop={} tickets={}",
            gauge_line(&p["gauge"]),
            text(&p["overrides"]["usage_drop_pct"]),
            text(&p["overrides"]["tickets_30d"])
        ),
        topics::TOPIC_REGRET_LOADED => match p["state"].as_str() {
            Some("rows") => format!(
                "{} rows",
                p["rows"].as_array().map(|r| r.len()).unwrap_or(0)
            ),
            Some("empty") => "no data".to_string(),
            _ => "not loaded".to_string(),
        },
        topics::TOPIC_RECOMMENDATION_APPLIED => format!(
            "{} at day {} (-{:.1}%)",
            text(&p["best_action"]),
            text(&p["best_timing"]),
            p["improvement"].as_f64().unwrap_or(0.0) * 100.0
        ),
        topics::TOPIC_PLAN_CHANGED => format!(
            "{} at day {}",
            text(&p["action_type"]),
            text(&p["timing_days"])
        ),
        topics::TOPIC_ACTION_TRIGGERED => format!(
            "{} for {}",
            text(&p["action_type"]),
            text(&p["customer_ids"])
        ),
        topics::TOPIC_BACKEND_PROBE => match p["state"].as_str() {
            Some("reachable") => format!(
                "{} reachable ({} ms)",
                text(&p["base"]),
                text(&p["latency_ms"])
            ),
            Some("unreachable") => format!("{} unreachable: {}", text(&p["base"]), text(&p["detail"])),
            _ => "unknown".to_string(),
        },
        topics::TOPIC_SETTINGS_SAVED => format!(
            "api_base={} slack={}",
            text(&p["api_base"]),
            text(&p["slack_enabled"])
        ),
        _ => p.to_string(),
    };
    format!(
        "{} #{:<5} {:<28} {}",
        clock(&env.time),
        env.seq,
        env.topic,
        body
    )
}

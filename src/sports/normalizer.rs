//! Normalizes provider-specific JSON into canonical [`GameEvent`]s, so
//! Oracle and Brain never see provider-specific field names or status codes.

use crate::models::{GameEvent, Sport};

const SPORTSDATA_LIVE_STATUSES: &[&str] = &["InProgress", "Halftime", "DelayedStart", "Delayed"];
const SPORTSDATA_FINAL_STATUSES: &[&str] = &["Final", "F/OT", "F/2OT", "F/3OT", "Forfeit"];
const SPORTSDATA_SOCCER_LIVE_STATUSES: &[&str] = &["InProgress", "Halftime"];
const SPORTSDATA_SOCCER_FINAL_STATUSES: &[&str] = &["Final", "FinalAET", "FinalPEN"];

/// Normalize a SportsData.io NCAA basketball game object. Returns `None`
/// for games that aren't live or final (scheduled, postponed, etc).
pub fn sportsdata_ncaa_to_game_event(
    raw: &serde_json::Value,
    received_at_ns: u64,
) -> Option<GameEvent> {
    let status = raw.get("Status").and_then(|v| v.as_str()).unwrap_or("");
    let is_final = SPORTSDATA_FINAL_STATUSES.contains(&status);
    if !SPORTSDATA_LIVE_STATUSES.contains(&status) && !is_final {
        return None;
    }

    let home_score = raw.get("HomeTeamScore").and_then(|v| v.as_i64()).unwrap_or(0) as i32;
    let away_score = raw.get("AwayTeamScore").and_then(|v| v.as_i64()).unwrap_or(0) as i32;
    let game_id = raw
        .get("GameID")
        .or_else(|| raw.get("GameId"))
        .map(value_to_id_string)
        .unwrap_or_default();
    let event_id = format!("{game_id}-{home_score}-{away_score}");

    let period = raw
        .get("Quarter")
        .or_else(|| raw.get("Period"))
        .and_then(|v| v.as_i64())
        .unwrap_or(0) as u32;

    let game_clock = match (
        raw.get("TimeRemainingMinutes").and_then(|v| v.as_i64()),
        raw.get("TimeRemainingSeconds").and_then(|v| v.as_i64()),
    ) {
        (Some(min), Some(sec)) => format!("Q{period} {min:02}:{sec:02}"),
        _ => format!("Q{period}"),
    };

    Some(GameEvent::new(
        event_id,
        Sport::NcaaBasketball,
        game_id,
        raw.get("HomeTeam").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        raw.get("AwayTeam").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        home_score,
        away_score,
        game_clock,
        period,
        is_final,
        "sportsdata_io",
        received_at_ns,
    ))
}

/// Normalize a SportsData.io soccer game object. `sport` must be
/// `PremierLeague` or `ChampionsLeague`.
pub fn sportsdata_soccer_to_game_event(
    raw: &serde_json::Value,
    sport: Sport,
    received_at_ns: u64,
) -> Option<GameEvent> {
    let status = raw.get("Status").and_then(|v| v.as_str()).unwrap_or("");
    let is_final = SPORTSDATA_SOCCER_FINAL_STATUSES.contains(&status);
    if !SPORTSDATA_SOCCER_LIVE_STATUSES.contains(&status) && !is_final {
        return None;
    }

    let home_score = raw.get("HomeTeamScore").and_then(|v| v.as_i64()).unwrap_or(0) as i32;
    let away_score = raw.get("AwayTeamScore").and_then(|v| v.as_i64()).unwrap_or(0) as i32;
    let game_id = raw
        .get("GameId")
        .or_else(|| raw.get("GameID"))
        .map(value_to_id_string)
        .unwrap_or_default();
    let event_id = format!("{game_id}-{home_score}-{away_score}");

    let (game_clock, period) = if status == "Halftime" {
        ("HT".to_string(), 1)
    } else {
        let elapsed = raw
            .get("Clock")
            .or_else(|| raw.get("Elapsed"))
            .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string())))
            .unwrap_or_default();
        let elapsed_min: i64 = elapsed.trim_end_matches('\'').parse().unwrap_or(0);
        let clock = if elapsed.is_empty() { status.to_string() } else { format!("{elapsed}'") };
        (clock, if elapsed_min > 45 { 2 } else { 1 })
    };

    Some(GameEvent::new(
        event_id,
        sport,
        game_id,
        raw.get("HomeTeamName")
            .or_else(|| raw.get("HomeTeam"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        raw.get("AwayTeamName")
            .or_else(|| raw.get("AwayTeam"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        home_score,
        away_score,
        game_clock,
        period,
        is_final,
        "sportsdata_io",
        received_at_ns,
    ))
}

/// Normalize an ESPN scoreboard `event` object (standard ESPN site-API
/// shape: `competitions[0].competitors[]`, `status.type.completed`).
/// Shared by both the basketball and soccer ESPN scoreboards — the JSON
/// shape is the same, only the sport tag differs.
pub fn espn_to_game_event(raw: &serde_json::Value, sport: Sport, received_at_ns: u64) -> Option<GameEvent> {
    let competition = raw.get("competitions")?.get(0)?;
    let competitors = competition.get("competitors")?.as_array()?;

    let home = competitors.iter().find(|c| c.get("homeAway").and_then(|v| v.as_str()) == Some("home"))?;
    let away = competitors.iter().find(|c| c.get("homeAway").and_then(|v| v.as_str()) == Some("away"))?;

    let home_score: i32 = home.get("score").and_then(|v| v.as_str()).and_then(|s| s.parse().ok()).unwrap_or(0);
    let away_score: i32 = away.get("score").and_then(|v| v.as_str()).and_then(|s| s.parse().ok()).unwrap_or(0);

    let status = competition.get("status").or_else(|| raw.get("status"))?;
    let is_final = status
        .get("type")
        .and_then(|t| t.get("completed"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let in_progress = status
        .get("type")
        .and_then(|t| t.get("state"))
        .and_then(|v| v.as_str())
        == Some("in");
    if !is_final && !in_progress {
        return None;
    }

    let period = status.get("period").and_then(|v| v.as_i64()).unwrap_or(0) as u32;
    let game_clock = status
        .get("type")
        .and_then(|t| t.get("shortDetail"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let game_id = raw.get("id").map(value_to_id_string).unwrap_or_default();
    let home_score_v = home_score;
    let away_score_v = away_score;
    let event_id = format!("{game_id}-{home_score_v}-{away_score_v}");

    let home_team = team_name(home);
    let away_team = team_name(away);

    Some(GameEvent::new(
        event_id,
        sport,
        game_id,
        home_team,
        away_team,
        home_score,
        away_score,
        game_clock,
        period,
        is_final,
        "espn",
        received_at_ns,
    ))
}

fn team_name(competitor: &serde_json::Value) -> String {
    competitor
        .get("team")
        .and_then(|t| t.get("abbreviation").or_else(|| t.get("displayName")))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn value_to_id_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

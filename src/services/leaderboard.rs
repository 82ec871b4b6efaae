//! Leaderboard builder: a pure projection of the roster into ranked rows,
//! plus the CSV rendering used by the export route.

use indexmap::IndexMap;

use crate::{dto::game::LeaderboardRow, state::game::Player};

/// Build a full leaderboard snapshot from the roster.
///
/// Rows are ordered by cumulative score descending with roll number ascending
/// as the deterministic tie-break; ranks are dense (tied scores share a rank).
pub fn build(players: &IndexMap<String, Player>) -> Vec<LeaderboardRow> {
    let mut entries: Vec<&Player> = players.values().collect();
    entries.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.roll_number.cmp(&b.roll_number))
    });

    let mut rows = Vec::with_capacity(entries.len());
    let mut rank = 0u32;
    let mut previous_score: Option<i32> = None;

    for player in entries {
        if previous_score != Some(player.score) {
            rank += 1;
            previous_score = Some(player.score);
        }
        rows.push(LeaderboardRow {
            rank,
            name: player.name.clone(),
            roll_number: player.roll_number.clone(),
            score: player.score,
            status: player.status.into(),
        });
    }

    rows
}

/// Truncate a snapshot for broadcast; `None` keeps the full board.
pub fn broadcast_view(rows: &[LeaderboardRow], limit: Option<usize>) -> Vec<LeaderboardRow> {
    match limit {
        Some(limit) => rows.iter().take(limit).cloned().collect(),
        None => rows.to_vec(),
    }
}

/// Render a snapshot as CSV with a stable header, quoting fields that carry
/// commas, quotes or line breaks.
pub fn to_csv(rows: &[LeaderboardRow]) -> String {
    let mut out = String::from("rank,name,rollNumber,score,status\n");
    for row in rows {
        let status = serde_json::to_value(row.status)
            .ok()
            .and_then(|value| value.as_str().map(str::to_owned))
            .unwrap_or_default();
        let fields = [
            row.rank.to_string(),
            row.name.clone(),
            row.roll_number.clone(),
            row.score.to_string(),
            status,
        ];
        let line: Vec<String> = fields.iter().map(|field| escape_csv(field)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn escape_csv(value: &str) -> String {
    if value.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::PlayerStatus;

    fn roster(entries: &[(&str, i32)]) -> IndexMap<String, Player> {
        entries
            .iter()
            .map(|(roll, score)| {
                let mut player =
                    Player::new(format!("Player {roll}"), (*roll).into(), PlayerStatus::Active);
                player.score = *score;
                ((*roll).to_string(), player)
            })
            .collect()
    }

    #[test]
    fn equal_scores_share_a_dense_rank_with_deterministic_order() {
        let players = roster(&[("B2", 30), ("C3", 10), ("A1", 30)]);
        let rows = build(&players);

        assert_eq!(rows.len(), 3);
        // Both 30s ahead of the 10; tie broken by roll number ascending.
        assert_eq!(rows[0].roll_number, "A1");
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[1].roll_number, "B2");
        assert_eq!(rows[1].rank, 1);
        assert_eq!(rows[2].roll_number, "C3");
        assert_eq!(rows[2].rank, 2);

        // Re-building from the same roster yields the identical order.
        assert_eq!(build(&players), rows);
    }

    #[test]
    fn negative_scores_sort_below_zero() {
        let players = roster(&[("A1", -2), ("B2", 0)]);
        let rows = build(&players);
        assert_eq!(rows[0].roll_number, "B2");
        assert_eq!(rows[1].roll_number, "A1");
        assert_eq!(rows[1].rank, 2);
    }

    #[test]
    fn broadcast_view_truncates_only_when_asked() {
        let players = roster(&[("A1", 3), ("B2", 2), ("C3", 1)]);
        let rows = build(&players);
        assert_eq!(broadcast_view(&rows, Some(2)).len(), 2);
        assert_eq!(broadcast_view(&rows, None).len(), 3);
    }

    #[test]
    fn csv_escapes_awkward_names() {
        let mut players = roster(&[("A1", 5)]);
        players.get_mut("A1").unwrap().name = "Quote \" and, comma".into();
        let csv = to_csv(&build(&players));

        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("rank,name,rollNumber,score,status"));
        assert_eq!(
            lines.next(),
            Some("1,\"Quote \"\" and, comma\",A1,5,active")
        );
    }
}

use std::{fmt::Write as _, time::Duration};

use schema::CaseRecord;

use crate::state::DashboardState;

/// Text rendering of the case list, one card per record.
pub fn render_list(state: &DashboardState, poll_interval: Duration) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Case Dashboard  (link check every {}s)",
        poll_interval.as_secs()
    );
    if !state.query.is_empty() {
        let _ = writeln!(out, "search: {}", state.query);
    }
    out.push('\n');

    let filtered = state.filtered();
    if state.loading && state.cases.is_empty() {
        out.push_str("Loading cases...\n");
    } else if filtered.is_empty() {
        out.push_str("No cases found.\n");
    } else {
        for record in filtered {
            out.push_str(&render_card(record));
            out.push('\n');
        }
    }
    out
}

pub fn render_card(record: &CaseRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Case #{}  [{}]", record.id, record.status);
    let _ = writeln!(out, "  {}", record.title);
    let _ = writeln!(
        out,
        "  applicant: {}  postal code: {}",
        record.applicant_name, record.postal_code
    );
    let _ = writeln!(out, "  created: {}", record.created_at);
    if !record.summary.is_empty() {
        let _ = writeln!(out, "  {}", record.summary);
    }
    match record.confirm_url() {
        Some(_) => out.push_str("  confirmation link: assigned\n"),
        None => out.push_str("  confirmation link: waiting for assignment\n"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64) -> CaseRecord {
        CaseRecord {
            id,
            title: "Lagerist".into(),
            status: "Offen".into(),
            created_at: "2025-04-02".into(),
            summary: "Berlin".into(),
            applicant_name: "Jana".into(),
            postal_code: "10115".into(),
            ..CaseRecord::default()
        }
    }

    #[test]
    fn loading_state_shows_until_records_arrive() {
        let state = DashboardState::default();
        let text = render_list(&state, Duration::from_secs(10));
        assert!(text.starts_with("Case Dashboard  (link check every 10s)"));
        assert!(text.contains("Loading cases..."));
    }

    #[test]
    fn empty_filter_result_says_no_cases() {
        let state = DashboardState {
            loading: false,
            cases: vec![record(1)],
            query: "zzz".into(),
        };
        assert!(render_list(&state, Duration::from_secs(10)).contains("No cases found."));
    }

    #[test]
    fn card_shows_fields_and_link_state() {
        let mut item = record(4);
        let card = render_card(&item);
        assert!(card.contains("Case #4  [Offen]"));
        assert!(card.contains("applicant: Jana  postal code: 10115"));
        assert!(card.contains("waiting for assignment"));

        item.confirm_url = Some("https://confirm/4".into());
        assert!(render_card(&item).contains("confirmation link: assigned"));
    }
}

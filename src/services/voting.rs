use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::vote::{VoteOption, VoteResponse};

/// Per-option count for binary and multiple-choice polls, in option
/// insertion order.
#[derive(Debug, Serialize)]
pub struct OptionTally {
    #[serde(rename = "optionId")]
    pub option_id: Uuid,
    pub label: String,
    pub count: i64,
}

/// Result of a percentage poll: how many active members responded with an
/// approval (>= 50) and the ratio of approvals over the whole membership.
#[derive(Debug, Serialize)]
pub struct PercentageTally {
    #[serde(rename = "totalMembers")]
    pub total_members: i64,
    pub approvals: i64,
    #[serde(rename = "approvalRatio")]
    pub approval_ratio: f64,
}

const APPROVAL_CUTOFF: i32 = 50;

pub fn tally_options(options: &[VoteOption], responses: &[VoteResponse]) -> Vec<OptionTally> {
    options
        .iter()
        .map(|opt| OptionTally {
            option_id: opt.id,
            label: opt.label.clone(),
            count: responses
                .iter()
                .filter(|r| r.option_id == Some(opt.id))
                .count() as i64,
        })
        .collect()
}

pub fn tally_percentage(total_members: i64, responses: &[VoteResponse]) -> PercentageTally {
    let approvals = responses
        .iter()
        .filter(|r| r.percentage_value.unwrap_or(0) >= APPROVAL_CUTOFF)
        .count() as i64;
    // A chama with no active members tallies to 0, not a division error.
    let approval_ratio = if total_members > 0 {
        (approvals as f64 / total_members as f64) * 100.0
    } else {
        0.0
    };
    PercentageTally {
        total_members,
        approvals,
        approval_ratio,
    }
}

/// Drops blank labels from admin-supplied multiple-choice options.
pub fn clean_option_labels(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Ballot acceptance window: `closes_at` is an exclusive upper bound checked
/// against the wall clock at submission time.
pub fn accepts_ballots_at(closes_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match closes_at {
        Some(deadline) => now < deadline,
        None => true,
    }
}

pub fn valid_percentage(value: i32) -> bool {
    (0..=100).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn option(label: &str, position: i32) -> VoteOption {
        VoteOption {
            id: Uuid::new_v4(),
            vote_id: Uuid::new_v4(),
            label: label.to_string(),
            position,
        }
    }

    fn response_for(option_id: Uuid) -> VoteResponse {
        VoteResponse {
            id: Uuid::new_v4(),
            vote_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            option_id: Some(option_id),
            percentage_value: None,
            responded_at: Utc::now(),
        }
    }

    fn percentage_response(value: i32) -> VoteResponse {
        VoteResponse {
            id: Uuid::new_v4(),
            vote_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            option_id: None,
            percentage_value: Some(value),
            responded_at: Utc::now(),
        }
    }

    #[test]
    fn tally_counts_per_option_in_display_order() {
        let yes = option("Yes", 0);
        let no = option("No", 1);
        let responses = vec![
            response_for(yes.id),
            response_for(yes.id),
            response_for(no.id),
        ];

        let tally = tally_options(&[yes.clone(), no.clone()], &responses);
        assert_eq!(tally.len(), 2);
        assert_eq!((tally[0].label.as_str(), tally[0].count), ("Yes", 2));
        assert_eq!((tally[1].label.as_str(), tally[1].count), ("No", 1));
    }

    #[test]
    fn tally_ignores_responses_for_foreign_options() {
        let a = option("A", 0);
        let responses = vec![response_for(Uuid::new_v4())];
        let tally = tally_options(&[a], &responses);
        assert_eq!(tally[0].count, 0);
    }

    #[test]
    fn percentage_tally_counts_fifty_and_above_as_approval() {
        let responses = vec![
            percentage_response(49),
            percentage_response(50),
            percentage_response(100),
        ];
        let tally = tally_percentage(4, &responses);
        assert_eq!(tally.approvals, 2);
        assert!((tally.approval_ratio - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn percentage_tally_with_no_members_is_zero() {
        let tally = tally_percentage(0, &[percentage_response(90)]);
        assert_eq!(tally.approval_ratio, 0.0);
    }

    #[test]
    fn blank_option_labels_are_discarded() {
        let labels = vec!["A".to_string(), "B".to_string(), "".to_string(), "  ".to_string()];
        assert_eq!(clean_option_labels(&labels), vec!["A", "B"]);
    }

    #[test]
    fn close_time_is_an_exclusive_upper_bound() {
        let now = Utc::now();
        assert!(accepts_ballots_at(None, now));
        assert!(accepts_ballots_at(Some(now + Duration::minutes(1)), now));
        assert!(!accepts_ballots_at(Some(now), now));
        assert!(!accepts_ballots_at(Some(now - Duration::minutes(1)), now));
    }

    #[test]
    fn percentage_range_is_inclusive() {
        assert!(valid_percentage(0));
        assert!(valid_percentage(100));
        assert!(!valid_percentage(-1));
        assert!(!valid_percentage(150));
    }
}

//! Extraction behaviour over whole documents: ownership, ordering, undated
//! placeholders and invariants over generated input.

use proptest::prelude::*;
use rstest::rstest;
use taski_core::parser::{match_log_line, match_task_marker};
use taski_core::{extract_all_dates, extract_for_date, parse_document};

// ---------------------------------------------------------------------------
// 1. Date-targeted extraction
// ---------------------------------------------------------------------------

#[test]
fn open_task_with_log_on_target_date() {
    let lines = ["- [ ] タスクA", "    - 2026-02-01: ログA"];
    let result = extract_for_date(lines, "2026-02-01");
    assert_eq!(result.len(), 1);
    assert!(!result[0].completed);
    assert_eq!(result[0].text, "タスクA");
    assert_eq!(result[0].log, "ログA");
    assert_eq!(result[0].source_line, 0);
}

#[test]
fn completed_task_with_log() {
    let lines = ["- [x] 完了タスク", "    - 2026-02-01: 完了ログ"];
    let result = extract_for_date(lines, "2026-02-01");
    assert_eq!(result.len(), 1);
    assert!(result[0].completed);
    assert_eq!(result[0].log, "完了ログ");
}

#[test]
fn other_dates_are_filtered_out() {
    let lines = [
        "- [ ] タスク",
        "    - 2026-01-31: 昨日のログ",
        "    - 2026-02-01: 今日のログ",
        "    - 2026-02-02: 明日のログ",
    ];
    let result = extract_for_date(lines, "2026-02-01");
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].log, "今日のログ");
}

#[test]
fn same_date_twice_yields_two_records() {
    let lines = ["- [ ] タスク", "    - 2026-02-01: ログA", "    - 2026-02-01: ログB"];
    let logs: Vec<_> = extract_for_date(lines, "2026-02-01")
        .into_iter()
        .map(|r| r.log)
        .collect();
    assert_eq!(logs, vec!["ログA", "ログB"]);
}

#[rstest]
#[case::same_or_shallower_indent(&[
    "    - [ ] タスク（インデント4）",
    "    - 2026-02-01: 同レベルのログ",
    "  - 2026-02-01: 浅いインデントのログ",
])]
#[case::shallow_after_indented_task(&["    - [ ] Task", "  - 2026-02-01: shallow"])]
#[case::orphan_log(&["    - 2026-02-01: 孤立したログ"])]
#[case::empty(&[])]
#[case::task_without_logs(&["- [ ] ログなしタスク"])]
#[case::uppercase_checkbox(&["- [X] upper", "    - 2026-02-01: ignored"])]
fn yields_no_records(#[case] lines: &[&str]) {
    assert!(extract_for_date(lines, "2026-02-01").is_empty());
}

#[test]
fn source_line_is_zero_based_marker_index() {
    let lines = ["# ヘッダー", "", "- [ ] 3行目のタスク", "    - 2026-02-01: ログ"];
    let result = extract_for_date(lines, "2026-02-01");
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].source_line, 2);
}

#[test]
fn inert_lines_do_not_break_ownership() {
    let lines = [
        "- [ ] タスク1",
        "",
        "これは普通のテキスト",
        "    - 2026-02-01: ログ1",
        "- [x] タスク2",
        "    - 2026-02-01: ログ2",
    ];
    let texts: Vec<_> = extract_for_date(lines, "2026-02-01")
        .into_iter()
        .map(|r| r.text)
        .collect();
    assert_eq!(texts, vec!["タスク1", "タスク2"]);
}

#[test]
fn nested_marker_shadows_parent() {
    let lines = ["- [ ] 親タスク", "    - [ ] 子タスク", "        - 2026-02-01: 子のログ"];
    let result = extract_for_date(lines, "2026-02-01");
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].text, "子タスク");
    assert_eq!(result[0].source_line, 1);
}

#[test]
fn log_shallower_than_child_is_dropped_even_if_parent_qualifies() {
    let lines = [
        "- [ ] parent",
        "        - [ ] child",
        "    - 2026-02-01: between parent and child depth",
    ];
    assert!(extract_for_date(lines, "2026-02-01").is_empty());
}

// ---------------------------------------------------------------------------
// 2. All-dates extraction
// ---------------------------------------------------------------------------

#[test]
fn all_dates_keeps_line_order() {
    let lines = [
        "- [ ] タスクA",
        "    - 2026-01-31: 昨日のログ",
        "    - 2026-02-01: 今日のログ",
        "    - 2026-02-02: 明日のログ",
    ];
    let dates: Vec<_> = extract_all_dates(lines).into_iter().map(|r| r.date).collect();
    assert_eq!(dates, vec!["2026-01-31", "2026-02-01", "2026-02-02"]);
}

#[test]
fn task_without_logs_yields_one_undated_record() {
    let result = extract_all_dates(["- [ ] ログなしタスク"]);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].text, "ログなしタスク");
    assert_eq!(result[0].date, "");
    assert_eq!(result[0].log, "");
    assert!(result[0].is_undated());
}

#[test]
fn rejected_log_leaves_task_undated() {
    let lines = ["    - [ ] タスク（インデント4）", "    - 2026-02-01: 同レベルのログ"];
    let result = extract_all_dates(lines);
    assert_eq!(result.len(), 1);
    assert!(result[0].is_undated());
}

#[test]
fn two_logs_share_task_fields() {
    let lines = ["- [x] ship", "  - 2026-02-01: build", "  - 2026-02-03: release"];
    let result = extract_all_dates(lines);
    assert_eq!(result.len(), 2, "k logs must yield k records, never k+1");
    assert_eq!(result[0].text, result[1].text);
    assert_eq!(result[0].completed, result[1].completed);
    assert_eq!(result[0].source_line, result[1].source_line);
    assert_ne!(result[0].date, result[1].date);
    assert_ne!(result[0].log, result[1].log);
}

#[test]
fn mixed_logged_and_unlogged_tasks() {
    let lines = [
        "- [ ] タスク1",
        "    - 2026-02-01: ログ1",
        "- [ ] タスク2",
        "- [x] タスク3",
        "    - 2026-01-30: ログ3",
    ];
    let result = extract_all_dates(lines);
    let summary: Vec<_> = result.iter().map(|r| (r.text.as_str(), r.date.as_str())).collect();
    assert_eq!(
        summary,
        vec![("タスク1", "2026-02-01"), ("タスク2", ""), ("タスク3", "2026-01-30")]
    );
}

#[test]
fn all_dates_on_empty_input_is_empty() {
    assert!(extract_all_dates(Vec::<String>::new()).is_empty());
}

// ---------------------------------------------------------------------------
// 3. Invariants over generated documents
// ---------------------------------------------------------------------------

const DATES: [&str; 3] = ["2026-02-01", "2026-02-02", "1999-12-31"];

/// Lines that look like markers or logs but fall outside the grammar.
const NEAR_MISSES: [&str; 8] = [
    "-[X] shouted flag",
    "- [  ] wide box",
    "* [ ] star bullet",
    "[ ] no dash",
    "- 2026-2-01: short month",
    "- 2026-02-01 no colon",
    "- 26-02-01: short year",
    "-- [ ] double dash",
];

fn arb_indent() -> impl Strategy<Value = String> {
    prop::collection::vec(prop_oneof![Just(" "), Just("\t"), Just("\u{3000}")], 0..=8)
        .prop_map(|parts| parts.concat())
}

fn arb_body() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => (any::<bool>(), "[a-z #]{0,8}")
            .prop_map(|(done, text)| format!("- [{}] task{text}", if done { 'x' } else { ' ' })),
        3 => (prop::sample::select(DATES.to_vec()), "[a-z ]{0,8}")
            .prop_map(|(date, note)| format!("- {date}: note{note}")),
        2 => prop::sample::select(NEAR_MISSES.to_vec()).prop_map(str::to_owned),
        1 => Just("plain text".to_owned()),
    ]
}

fn arb_document() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        (arb_indent(), arb_body()).prop_map(|(indent, body)| format!("{indent}{body}")),
        0..40,
    )
}

proptest! {
    #[test]
    fn extracted_logs_always_match_date_and_are_deeper_than_owner(
        doc in arb_document(),
        target in prop::sample::select(DATES.to_vec()),
    ) {
        for record in extract_for_date(&doc, target) {
            let marker = match_task_marker(&doc[record.source_line]).expect("record points at marker");
            let owned = doc[record.source_line + 1..]
                .iter()
                .take_while(|line| match_task_marker(line).is_none())
                .filter_map(|line| match_log_line(line))
                .any(|log| log.date == target && log.content == record.log && log.indent > marker.indent);
            prop_assert!(owned, "record {:?} not owned by its marker", record);
        }
    }

    #[test]
    fn every_task_is_represented_exactly_k_or_one_times(doc in arb_document()) {
        let tasks = parse_document(&doc);
        let records = extract_all_dates(&doc);
        for task in &tasks {
            let count = records.iter().filter(|r| r.source_line == task.source_line).count();
            prop_assert_eq!(count, task.logs.len().max(1), "task at {}", task.source_line);
        }
        let expected: usize = tasks.iter().map(|t| t.logs.len().max(1)).sum();
        prop_assert_eq!(records.len(), expected);
    }

    #[test]
    fn task_indent_counts_leading_whitespace_characters(doc in arb_document()) {
        for task in parse_document(&doc) {
            let leading = doc[task.source_line].chars().take_while(|c| c.is_whitespace()).count();
            prop_assert_eq!(task.indent, leading);
            for log in &task.logs {
                prop_assert!(log.indent > task.indent);
            }
        }
    }

    #[test]
    fn extraction_is_idempotent(
        doc in arb_document(),
        target in prop::sample::select(DATES.to_vec()),
    ) {
        prop_assert_eq!(extract_all_dates(&doc), extract_all_dates(&doc));
        prop_assert_eq!(extract_for_date(&doc, target), extract_for_date(&doc, target));
    }
}

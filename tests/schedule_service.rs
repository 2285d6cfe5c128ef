use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use schedule_board::{
    config::DatabaseConfig,
    core::{
        parse_timestamp, render_timestamp, ActorId, BoardColumnId, ScheduleId, WorkspaceId,
    },
    infrastructure::{ScheduleStore, SqliteScheduleStore},
    models::{
        DueCriteria, DueWindow, Lifecycle, Schedule, ScheduleFields, ScheduleFilter,
        SchedulePatch,
    },
    services::PositionShift,
    AppError, ScheduleService,
};
use serde_json::json;
use tempfile::TempDir;

const WORKSPACE: WorkspaceId = WorkspaceId(1);
const ACTOR: ActorId = ActorId(100);
const BACKLOG: BoardColumnId = BoardColumnId(1);
const DOING: BoardColumnId = BoardColumnId(2);

struct Board {
    store: Arc<SqliteScheduleStore>,
    service: ScheduleService,
    _dir: TempDir,
}

async fn board() -> Board {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("board.db").display());
    let store = Arc::new(
        SqliteScheduleStore::connect(&DatabaseConfig::with_url(url))
            .await
            .unwrap(),
    );
    store.initialize().await.unwrap();
    let service = ScheduleService::new(store.clone() as Arc<dyn ScheduleStore>);
    Board {
        store,
        service,
        _dir: dir,
    }
}

fn titled(title: &str) -> ScheduleFields {
    ScheduleFields {
        title: Some(title.to_string()),
        ..Default::default()
    }
}

async fn create(board: &Board, column: BoardColumnId, title: &str) -> Schedule {
    board
        .service
        .create(column, WORKSPACE, ACTOR, titled(title))
        .await
        .unwrap()
}

/// (title, position) pairs of a column's active schedules
async fn order(board: &Board, column: BoardColumnId) -> Vec<(String, i64)> {
    board
        .service
        .list_by_column(column)
        .await
        .unwrap()
        .into_iter()
        .map(|s| (s.title, s.position))
        .collect()
}

fn expect(pairs: &[(&str, i64)]) -> Vec<(String, i64)> {
    pairs.iter().map(|(t, p)| (t.to_string(), *p)).collect()
}

async fn assert_dense(board: &Board, column: BoardColumnId) {
    let positions: Vec<i64> = board
        .service
        .list_by_column(column)
        .await
        .unwrap()
        .iter()
        .map(|s| s.position)
        .collect();
    let expected: Vec<i64> = (1..=positions.len() as i64).collect();
    assert_eq!(positions, expected, "column {} is not dense", column);
}

async fn log_fields(board: &Board, id: ScheduleId) -> Vec<(String, String, String, String)> {
    board
        .service
        .list_logs(id)
        .await
        .unwrap()
        .into_iter()
        .map(|l| (l.action, l.field_changed, l.old_value, l.new_value))
        .collect()
}

fn log(action: &str, field: &str, old: &str, new: &str) -> (String, String, String, String) {
    (
        action.to_string(),
        field.to_string(),
        old.to_string(),
        new.to_string(),
    )
}

#[tokio::test]
async fn test_create_appends_with_participant_and_log() {
    let board = board().await;
    let a = create(&board, BACKLOG, "A").await;
    let b = create(&board, BACKLOG, "B").await;
    let c = create(&board, BACKLOG, "C").await;

    assert_eq!((a.position, b.position, c.position), (1, 2, 3));
    assert_eq!(order(&board, BACKLOG).await, expect(&[("A", 1), ("B", 2), ("C", 3)]));

    assert_eq!(c.status, "not yet");
    assert_eq!(c.visibility, "public");
    assert_eq!(c.description, "");
    assert!(c.is_active());

    let participants = board.service.list_participants(c.id).await.unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0].actor_id, ACTOR);
    assert_eq!(participants[0].assign_by, ACTOR);
    assert_eq!(participants[0].status, "creator");
    assert_eq!(participants[0].invitation_status, "joined");
    assert!(participants[0].assign_at.is_some());

    assert_eq!(log_fields(&board, c.id).await, vec![log("create schedule", "", "", "")]);
}

#[tokio::test]
async fn test_create_requires_title() {
    let board = board().await;
    let err = board
        .service
        .create(BACKLOG, WORKSPACE, ACTOR, ScheduleFields::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
    assert!(board.service.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_ignores_deleted_rows_when_appending() {
    let board = board().await;
    create(&board, BACKLOG, "A").await;
    let b = create(&board, BACKLOG, "B").await;
    board.service.delete(b.id, ACTOR).await.unwrap();

    let c = create(&board, BACKLOG, "C").await;
    assert_eq!(c.position, 2);
    assert_dense(&board, BACKLOG).await;
}

#[tokio::test]
async fn test_move_up_within_column() {
    let board = board().await;
    for title in ["A", "B", "C", "D"] {
        create(&board, BACKLOG, title).await;
    }
    let d = board.service.list_by_column(BACKLOG).await.unwrap()[3].clone();

    let moved = board
        .service
        .move_schedule(d.id, ActorId(7), None, 2)
        .await
        .unwrap();
    assert_eq!(moved.position, 2);
    assert_eq!(
        order(&board, BACKLOG).await,
        expect(&[("A", 1), ("D", 2), ("B", 3), ("C", 4)])
    );
    assert_eq!(
        log_fields(&board, d.id).await,
        vec![
            log("create schedule", "", "", ""),
            log("move schedule", "position", "4", "2"),
        ]
    );
    let logs = board.service.list_logs(d.id).await.unwrap();
    assert_eq!(logs[1].actor_id, ActorId(7));
}

#[tokio::test]
async fn test_move_down_within_column() {
    let board = board().await;
    let a = create(&board, BACKLOG, "A").await;
    for title in ["B", "C", "D"] {
        create(&board, BACKLOG, title).await;
    }

    board
        .service
        .move_schedule(a.id, ACTOR, Some(BACKLOG), 3)
        .await
        .unwrap();
    assert_eq!(
        order(&board, BACKLOG).await,
        expect(&[("B", 1), ("C", 2), ("A", 3), ("D", 4)])
    );
}

#[tokio::test]
async fn test_move_to_same_position_is_noop() {
    let board = board().await;
    create(&board, BACKLOG, "A").await;
    let b = create(&board, BACKLOG, "B").await;
    let before = board.service.get(b.id).await.unwrap();

    let result = board
        .service
        .move_schedule(b.id, ACTOR, None, 2)
        .await
        .unwrap();
    assert_eq!(result.position, 2);

    let after = board.service.get(b.id).await.unwrap();
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(log_fields(&board, b.id).await.len(), 1);
}

#[tokio::test]
async fn test_move_within_column_out_of_range() {
    let board = board().await;
    let a = create(&board, BACKLOG, "A").await;
    create(&board, BACKLOG, "B").await;

    for position in [0, 3, -1] {
        let err = board
            .service
            .move_schedule(a.id, ACTOR, None, position)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)), "{}", position);
    }
    assert_eq!(order(&board, BACKLOG).await, expect(&[("A", 1), ("B", 2)]));
    assert_eq!(log_fields(&board, a.id).await.len(), 1);
}

#[tokio::test]
async fn test_move_across_columns_mid_insert() {
    let board = board().await;
    create(&board, BACKLOG, "A").await;
    let b = create(&board, BACKLOG, "B").await;
    create(&board, BACKLOG, "C").await;
    for title in ["X", "Y", "Z"] {
        create(&board, DOING, title).await;
    }

    let moved = board
        .service
        .move_schedule(b.id, ACTOR, Some(DOING), 2)
        .await
        .unwrap();
    assert_eq!((moved.board_column_id, moved.position), (DOING, 2));

    assert_eq!(order(&board, BACKLOG).await, expect(&[("A", 1), ("C", 2)]));
    assert_eq!(
        order(&board, DOING).await,
        expect(&[("X", 1), ("B", 2), ("Y", 3), ("Z", 4)])
    );
    // Position stayed 2, only the column changed
    assert_eq!(
        log_fields(&board, b.id).await[1..].to_vec(),
        vec![log("move schedule", "board_column_id", "1", "2")]
    );
}

#[tokio::test]
async fn test_move_across_columns_clamps_to_append() {
    let board = board().await;
    let a = create(&board, BACKLOG, "A").await;
    let b = create(&board, BACKLOG, "B").await;
    for title in ["X", "Y", "Z"] {
        create(&board, DOING, title).await;
    }

    let moved = board
        .service
        .move_schedule(a.id, ACTOR, Some(DOING), 99)
        .await
        .unwrap();
    assert_eq!(moved.position, 4);
    assert_eq!(
        order(&board, DOING).await,
        expect(&[("X", 1), ("Y", 2), ("Z", 3), ("A", 4)])
    );
    assert_eq!(order(&board, BACKLOG).await, expect(&[("B", 1)]));
    assert_eq!(
        log_fields(&board, a.id).await[1..].to_vec(),
        vec![
            log("move schedule", "position", "1", "4"),
            log("move schedule", "board_column_id", "1", "2"),
        ]
    );

    // Into an empty column
    let empty = BoardColumnId(3);
    let moved = board
        .service
        .move_schedule(b.id, ACTOR, Some(empty), 5)
        .await
        .unwrap();
    assert_eq!((moved.board_column_id, moved.position), (empty, 1));
    assert!(order(&board, BACKLOG).await.is_empty());
}

#[tokio::test]
async fn test_move_across_columns_rejects_non_positive() {
    let board = board().await;
    let a = create(&board, BACKLOG, "A").await;
    create(&board, DOING, "X").await;

    let err = board
        .service
        .move_schedule(a.id, ACTOR, Some(DOING), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
    assert_eq!(order(&board, BACKLOG).await, expect(&[("A", 1)]));
    assert_eq!(order(&board, DOING).await, expect(&[("X", 1)]));
}

#[tokio::test]
async fn test_delete_compacts_and_freezes() {
    let board = board().await;
    create(&board, BACKLOG, "A").await;
    let b = create(&board, BACKLOG, "B").await;
    create(&board, BACKLOG, "C").await;
    create(&board, BACKLOG, "D").await;

    let deleted = board.service.delete(b.id, ActorId(9)).await.unwrap();
    assert!(!deleted.is_active());

    assert_eq!(
        order(&board, BACKLOG).await,
        expect(&[("A", 1), ("C", 2), ("D", 3)])
    );

    let stored = board.service.get(b.id).await.unwrap();
    assert_eq!(stored.position, 2);
    assert!(matches!(stored.lifecycle, Lifecycle::Deleted { .. }));
    assert_eq!(stored.deleted_at(), deleted.deleted_at());

    let logs = board.service.list_logs(b.id).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[1].action, "delete schedule");
    assert_eq!(logs[1].actor_id, ActorId(9));
    assert_eq!(logs[1].field_changed, "");
}

#[tokio::test]
async fn test_deleted_schedule_is_not_mutable() {
    let board = board().await;
    let a = create(&board, BACKLOG, "A").await;
    create(&board, BACKLOG, "B").await;
    board.service.delete(a.id, ACTOR).await.unwrap();

    let second = board.service.delete(a.id, ACTOR).await.unwrap_err();
    assert!(matches!(second, AppError::NotFound(_)));
    // Column was compacted exactly once
    assert_eq!(order(&board, BACKLOG).await, expect(&[("B", 1)]));

    let moved = board.service.move_schedule(a.id, ACTOR, None, 1).await;
    assert!(matches!(moved, Err(AppError::NotFound(_))));

    let patch = SchedulePatch {
        title: Some("again".to_string()),
        ..Default::default()
    };
    let updated = board.service.update(a.id, ACTOR, patch).await;
    assert!(matches!(updated, Err(AppError::NotFound(_))));

    assert_eq!(board.service.get(a.id).await.unwrap().position, 1);
}

#[tokio::test]
async fn test_missing_schedule_is_not_found() {
    let board = board().await;
    let missing = ScheduleId(404);

    assert!(matches!(board.service.get(missing).await, Err(AppError::NotFound(_))));
    assert!(matches!(
        board.service.delete(missing, ACTOR).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        board.service.move_schedule(missing, ACTOR, None, 1).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        board.service.list_logs(missing).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_update_logs_each_changed_field() {
    let board = board().await;
    let a = create(&board, BACKLOG, "Plan").await;

    let patch = SchedulePatch {
        title: Some("Plan v2".to_string()),
        status: Some("not yet".to_string()),
        all_day: Some(true),
        start_time: Some("2024-05-01 09:30:00".to_string()),
        ..Default::default()
    };
    let updated = board.service.update(a.id, ActorId(5), patch).await.unwrap();
    assert_eq!(updated.title, "Plan v2");
    assert!(updated.all_day);
    assert_eq!(updated.position, a.position);
    assert!(updated.updated_at >= a.updated_at);

    let logs = log_fields(&board, a.id).await;
    let old_start = render_timestamp(a.start_time);
    assert_eq!(
        logs[1..].to_vec(),
        vec![
            log("update schedule", "title", "Plan", "Plan v2"),
            log("update schedule", "start_time", &old_start, "2024-05-01T09:30:00Z"),
            log("update schedule", "all_day", "false", "true"),
        ]
    );

    let stored = board.service.get(a.id).await.unwrap();
    assert_eq!(stored.title, "Plan v2");
    assert_eq!(stored.start_time, updated.start_time);
}

#[tokio::test]
async fn test_update_without_changes_writes_nothing() {
    let board = board().await;
    let a = create(&board, BACKLOG, "Same").await;
    let before = board.service.get(a.id).await.unwrap();

    let patch = SchedulePatch {
        title: Some("Same".to_string()),
        ..Default::default()
    };
    board.service.update(a.id, ACTOR, patch).await.unwrap();

    let after = board.service.get(a.id).await.unwrap();
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(log_fields(&board, a.id).await.len(), 1);
}

#[tokio::test]
async fn test_update_rejects_bad_input() {
    let board = board().await;
    let a = create(&board, BACKLOG, "A").await;

    let empty = board
        .service
        .update(a.id, ACTOR, SchedulePatch::default())
        .await
        .unwrap_err();
    assert!(matches!(empty, AppError::InvalidArgument(_)));

    let bad_time = SchedulePatch {
        title: Some("B".to_string()),
        end_time: Some("next tuesday".to_string()),
        ..Default::default()
    };
    let err = board.service.update(a.id, ACTOR, bad_time).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    assert_eq!(board.service.get(a.id).await.unwrap().title, "A");
    assert_eq!(log_fields(&board, a.id).await.len(), 1);
}

#[tokio::test]
async fn test_update_transcript() {
    let board = board().await;
    let a = create(&board, BACKLOG, "Call").await;

    let transcript = json!({"segments": [{"speaker": "ana", "text": "hi"}]});
    let updated = board
        .service
        .update_transcript(a.id, ACTOR, &transcript)
        .await
        .unwrap();
    let stored: serde_json::Value = serde_json::from_str(&updated.video_transcript).unwrap();
    assert_eq!(stored, transcript);

    let logs = board.service.list_logs(a.id).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[1].action, "update schedule");
    assert_eq!(logs[1].field_changed, "video_transcript");
    assert_eq!(logs[1].old_value, "");

    let err = board
        .service
        .update_transcript(a.id, ACTOR, &json!(["not", "an", "object"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_failed_shift_rolls_back_whole_batch() {
    let board = board().await;
    let a = create(&board, BACKLOG, "A").await;
    create(&board, BACKLOG, "B").await;
    let c = create(&board, BACKLOG, "C").await;
    create(&board, BACKLOG, "D").await;

    sqlx::query(&format!(
        "CREATE TRIGGER fail_shift BEFORE UPDATE OF position ON schedules \
         WHEN OLD.id = {} BEGIN SELECT RAISE(ABORT, 'injected failure'); END",
        c.id
    ))
    .execute(board.store.pool())
    .await
    .unwrap();

    let before = board.service.list_all().await.unwrap();

    let err = board.service.delete(a.id, ACTOR).await.unwrap_err();
    assert!(matches!(err, AppError::StorageFailure(_)), "{:?}", err);

    let err = board
        .service
        .move_schedule(a.id, ACTOR, None, 4)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StorageFailure(_)), "{:?}", err);

    assert_eq!(board.service.list_all().await.unwrap(), before);
    assert_eq!(log_fields(&board, a.id).await.len(), 1);
    assert_eq!(
        order(&board, BACKLOG).await,
        expect(&[("A", 1), ("B", 2), ("C", 3), ("D", 4)])
    );
}

#[tokio::test]
async fn test_columns_stay_dense_through_mixed_operations() {
    let board = board().await;
    let mut ids = Vec::new();
    for i in 0..6 {
        let column = if i % 2 == 0 { BACKLOG } else { DOING };
        ids.push(create(&board, column, &format!("card-{}", i)).await.id);
    }

    let service = &board.service;
    service.move_schedule(ids[0], ACTOR, Some(DOING), 1).await.unwrap();
    assert_dense(&board, BACKLOG).await;
    assert_dense(&board, DOING).await;

    service.move_schedule(ids[3], ACTOR, None, 1).await.unwrap();
    service.delete(ids[2], ACTOR).await.unwrap();
    assert_dense(&board, BACKLOG).await;
    assert_dense(&board, DOING).await;

    service.move_schedule(ids[5], ACTOR, Some(BACKLOG), 1).await.unwrap();
    service.create(DOING, WORKSPACE, ACTOR, titled("late")).await.unwrap();
    service.move_schedule(ids[1], ACTOR, Some(BACKLOG), 50).await.unwrap();
    service.delete(ids[0], ACTOR).await.unwrap();
    assert_dense(&board, BACKLOG).await;
    assert_dense(&board, DOING).await;

    let todo = order(&board, BACKLOG).await;
    let doing = order(&board, DOING).await;
    assert_eq!(todo.len() + doing.len(), 5);
}

#[tokio::test]
async fn test_concurrent_creates_stay_dense() {
    let board = board().await;
    let creates = (0..20).map(|i| {
        let service = board.service.clone();
        async move {
            service
                .create(BACKLOG, WORKSPACE, ACTOR, titled(&format!("card-{}", i)))
                .await
        }
    });
    let results = futures::future::join_all(creates).await;
    assert!(results.iter().all(|r| r.is_ok()));

    assert_dense(&board, BACKLOG).await;
    assert_eq!(board.service.list_by_column(BACKLOG).await.unwrap().len(), 20);
}

#[tokio::test]
async fn test_concurrent_moves_stay_dense() {
    let board = board().await;
    let mut ids = Vec::new();
    for i in 0..8 {
        ids.push(create(&board, BACKLOG, &format!("card-{}", i)).await.id);
    }

    let moves = ids.iter().enumerate().map(|(i, id)| {
        let service = board.service.clone();
        let id = *id;
        async move {
            let target = if i % 3 == 0 { Some(DOING) } else { None };
            service
                .move_schedule(id, ACTOR, target, (8 - i as i64).max(1).min(5))
                .await
        }
    });
    let results = futures::future::join_all(moves).await;
    assert!(results.iter().all(|r| r.is_ok()), "{:?}", results);

    assert_dense(&board, BACKLOG).await;
    assert_dense(&board, DOING).await;
}

#[tokio::test]
async fn test_reads_and_filters() {
    let board = board().await;
    let a = create(&board, BACKLOG, "A").await;
    let b = board
        .service
        .create(
            DOING,
            WorkspaceId(2),
            ActorId(200),
            ScheduleFields {
                title: Some("B".to_string()),
                status: Some("done".to_string()),
                start_time: Some("2024-06-01T10:00:00Z".to_string()),
                end_time: Some("2024-06-01T11:00:00Z".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let c = create(&board, BACKLOG, "C").await;
    board.service.delete(c.id, ACTOR).await.unwrap();

    let all: Vec<ScheduleId> = board
        .service
        .list_all()
        .await
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(all, vec![a.id, b.id, c.id]);

    let ws1: Vec<ScheduleId> = board
        .service
        .list_by_workspace(WORKSPACE)
        .await
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ws1, vec![a.id, c.id]);

    let ws1_todo = board
        .service
        .list_by_workspace_column(WORKSPACE, BACKLOG)
        .await
        .unwrap();
    assert_eq!(ws1_todo.len(), 1);
    assert_eq!(ws1_todo[0].id, a.id);

    let done = board
        .service
        .filter(&ScheduleFilter {
            workspace_ids: vec![WORKSPACE, WorkspaceId(2)],
            status: Some("done".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, b.id);

    let by_creator = board
        .service
        .filter(&ScheduleFilter {
            created_by: Some(ActorId(200)),
            start_after: Some(parse_timestamp("start_after", "2024-06-01 00:00:00").unwrap()),
            end_before: Some(parse_timestamp("end_before", "2024-06-02T00:00:00Z").unwrap()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_creator.len(), 1);

    let deleted = board
        .service
        .filter(&ScheduleFilter {
            is_deleted: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].id, c.id);
}

async fn create_starting(board: &Board, title: &str, start: &str, status: &str) -> Schedule {
    board
        .service
        .create(
            BACKLOG,
            WORKSPACE,
            ACTOR,
            ScheduleFields {
                title: Some(title.to_string()),
                start_time: Some(start.to_string()),
                status: Some(status.to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

async fn due_titles(board: &Board, due: DueCriteria, today: NaiveDate) -> Vec<String> {
    let filter = ScheduleFilter {
        workspace_ids: vec![WORKSPACE],
        ..ScheduleFilter::active_in_column(BACKLOG)
    }
    .with_due(due, today);
    board
        .service
        .filter(&filter)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.title)
        .collect()
}

#[tokio::test]
async fn test_due_date_criteria() {
    let board = board().await;
    create_starting(&board, "Today", "2024-06-01T10:00:00Z", "not yet").await;
    create_starting(&board, "ThisWeek", "2024-06-07T23:00:00Z", "not yet").await;
    create_starting(&board, "ThisMonth", "2024-06-20T09:00:00Z", "not yet").await;
    create_starting(&board, "Later", "2024-08-01T09:00:00Z", "not yet").await;
    create_starting(&board, "Late", "2024-05-28T09:00:00Z", "in progress").await;
    create_starting(&board, "Finished", "2024-05-28T09:00:00Z", "done").await;
    let unscheduled = create(&board, BACKLOG, "Unscheduled").await;
    sqlx::query("UPDATE schedules SET start_time = NULL WHERE id = ?")
        .bind(unscheduled.id.value())
        .execute(board.store.pool())
        .await
        .unwrap();

    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let within = |window: DueWindow| DueCriteria {
        window: Some(window),
        ..Default::default()
    };

    assert_eq!(due_titles(&board, within(DueWindow::Day), today).await, vec!["Today"]);
    assert_eq!(
        due_titles(&board, within(DueWindow::Week), today).await,
        vec!["Today", "ThisWeek"]
    );
    assert_eq!(
        due_titles(&board, within(DueWindow::Month), today).await,
        vec!["Today", "ThisWeek", "ThisMonth"]
    );

    let complete = DueCriteria {
        complete: true,
        ..Default::default()
    };
    assert_eq!(due_titles(&board, complete, today).await, vec!["Finished"]);

    let overdue = DueCriteria {
        overdue: true,
        ..Default::default()
    };
    assert_eq!(due_titles(&board, overdue, today).await, vec!["Late"]);

    let not_due = DueCriteria {
        not_due: true,
        ..Default::default()
    };
    assert_eq!(due_titles(&board, not_due, today).await, vec!["Unscheduled"]);

    let month_and_done = DueCriteria {
        window: Some(DueWindow::Month),
        complete: true,
        ..Default::default()
    };
    assert!(due_titles(&board, month_and_done, today).await.is_empty());
    assert_eq!(due_titles(&board, DueCriteria::default(), today).await.len(), 7);

    // Against the real clock, through the board-column view
    let view = board
        .service
        .filter_workspace_column(WORKSPACE, BACKLOG, not_due)
        .await
        .unwrap();
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].id, unscheduled.id);
    let late: Vec<String> = board
        .service
        .filter_workspace_column(WORKSPACE, BACKLOG, overdue)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.title)
        .collect();
    assert_eq!(late, vec!["Late"]);
}

#[tokio::test]
async fn test_move_conflicts_when_card_changes_column_while_waiting() {
    let board = board().await;
    let a = create(&board, BACKLOG, "A").await;
    let b = create(&board, BACKLOG, "B").await;

    // Another writer holds the database write lock for both columns
    let store: Arc<dyn ScheduleStore> = board.store.clone();
    let now = Utc::now();
    let mut tx = store.begin_transaction().await.unwrap();
    store
        .lock_columns_tx(&mut tx, &[BACKLOG, DOING], now)
        .await
        .unwrap();

    let waiting = {
        let service = board.service.clone();
        tokio::spawn(async move { service.move_schedule(a.id, ACTOR, None, 2).await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!waiting.is_finished());

    store
        .place_schedule_tx(&mut tx, a.id, 1, DOING, 1, now)
        .await
        .unwrap();
    store
        .apply_shifts_tx(
            &mut tx,
            &[PositionShift {
                schedule_id: b.id,
                from: 2,
                to: 1,
            }],
            now,
        )
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let err = waiting.await.unwrap().unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);

    assert_eq!(order(&board, BACKLOG).await, expect(&[("B", 1)]));
    assert_eq!(order(&board, DOING).await, expect(&[("A", 1)]));
    assert_eq!(log_fields(&board, a.id).await.len(), 1);
}

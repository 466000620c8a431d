// ==========================================
// 同步管道端到端测试
// ==========================================
// 测试目标: 触发 → 后台运行 → 计数 / 错误 / 终态
// ==========================================

mod test_helpers;

use aqua_sheet_sync::api::{ApiError, JobErrorsRequest};
use aqua_sheet_sync::domain::{CellValue, SyncJob, SyncJobMetadata};
use aqua_sheet_sync::engine::SyncRequest;
use aqua_sheet_sync::importer::CellGrid;
use aqua_sheet_sync::logging;
use aqua_sheet_sync::repository::SyncJobRepository;
use aqua_sheet_sync::{EntityType, ErrorKind, SyncMode, SyncStatus};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use test_helpers::*;

fn request(entities: &[&str]) -> SyncRequest {
    SyncRequest {
        entity_types: entities.iter().map(|e| e.to_string()).collect(),
        triggered_by: Some("tester".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_customer_with_blank_row_completes() {
    logging::init_test();
    let (_temp, conn) = create_test_db().unwrap();

    let transport = MockSheetTransport::new().with_tab(
        "Customers",
        grid(&[
            CUSTOMER_HEADER,
            &["Acme Corp", "Jane", "a@acme.com", "", "", "", "active"],
            &["", "", "", "", "", "", ""],
        ]),
    );
    let api = build_api(conn, MockTransportFactory::new(transport), test_settings());

    let triggered = api.trigger_sync(request(&["customers"])).await.unwrap();
    assert_eq!(triggered.status, SyncStatus::Pending);
    let job_id = triggered.job_id.clone();
    assert_eq!(wait(triggered).await, SyncStatus::Completed);

    let job = api.get_job(&job_id).unwrap();
    assert_eq!(job.status, SyncStatus::Completed);
    assert_eq!(job.counts.processed, 1);
    assert_eq!(job.counts.inserted, 1);
    assert_eq!(job.counts.skipped, 0);
    assert_eq!(job.counts.failed, 0);
    assert_eq!(job.counts.customers_inserted, 1);
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_some());
    assert_eq!(job.triggered_by.as_deref(), Some("tester"));
    assert_eq!(job.metadata.entity_types, vec![EntityType::Customers]);

    let audit = api.list_job_audit(&job_id, None, None).unwrap();
    assert_eq!(audit.total, 1);
    assert_eq!(audit.items[0].row_number, 2);
    assert_eq!(audit.items[0].data["name"], "Acme Corp");
}

#[tokio::test]
async fn test_orders_without_customers_fail_with_missing_reference() {
    let (_temp, conn) = create_test_db().unwrap();

    let transport = MockSheetTransport::new().with_tab(
        "Orders",
        grid(&[
            ORDER_HEADER,
            &["new@buyer.com", "2024-05-01", "Penaeus monodon", "100", "2.5", "", ""],
            &["new@buyer.com", "2024-05-02", "Penaeus monodon", "50", "2.5", "", ""],
        ]),
    );
    let api = build_api(conn, MockTransportFactory::new(transport), test_settings());

    let triggered = api.trigger_sync(request(&["orders"])).await.unwrap();
    let job_id = triggered.job_id.clone();
    assert_eq!(wait(triggered).await, SyncStatus::Failed);

    let job = api.get_job(&job_id).unwrap();
    assert_eq!(job.counts.processed, 2);
    assert_eq!(job.counts.inserted, 0);
    assert_eq!(job.counts.failed, 2);
    assert_eq!(job.error_message, None);

    let errors = api.list_job_errors(&job_id, &JobErrorsRequest::default()).unwrap();
    assert_eq!(errors.total, 2);
    for err in &errors.items {
        assert_eq!(err.error_kind, ErrorKind::MissingReference);
        assert_eq!(err.field_name.as_deref(), Some("customer_email"));
        assert_eq!(err.invalid_value.as_deref(), Some("new@buyer.com"));
        assert_eq!(err.sheet_name, "Orders");
    }
    assert_eq!(errors.items[0].row_number, 2);
    assert_eq!(errors.items[1].row_number, 3);
}

#[tokio::test]
async fn test_duplicate_batch_code_is_partial() {
    let (_temp, conn) = create_test_db().unwrap();

    let transport = MockSheetTransport::new().with_tab(
        "Batches",
        grid(&[
            BATCH_HEADER,
            &["BS-001", "Penaeus monodon", "2024-04-01", "500", "800"],
            &["BS-001", "Penaeus monodon", "2024-04-02", "300", ""],
        ]),
    );
    let api = build_api(conn, MockTransportFactory::new(transport), test_settings());

    let triggered = api.trigger_sync(request(&["batches"])).await.unwrap();
    let job_id = triggered.job_id.clone();
    assert_eq!(wait(triggered).await, SyncStatus::Partial);

    let job = api.get_job(&job_id).unwrap();
    assert_eq!(job.counts.inserted, 1);
    assert_eq!(job.counts.skipped, 1);
    assert_eq!(job.counts.failed, 0);
    assert_eq!(job.error_summary.total, 1);

    let errors = api.list_job_errors(&job_id, &JobErrorsRequest::default()).unwrap();
    assert_eq!(errors.total, 1);
    assert_eq!(errors.items[0].error_kind, ErrorKind::Duplicate);
    assert_eq!(errors.items[0].field_name.as_deref(), Some("batch_code"));
    assert_eq!(errors.items[0].invalid_value.as_deref(), Some("BS-001"));
    assert_eq!(errors.items[0].row_number, 3);
}

fn full_sheet() -> MockSheetTransport {
    MockSheetTransport::new()
        .with_tab(
            "Customers",
            grid(&[
                CUSTOMER_HEADER,
                &["Acme Corp", "Jane", "a@acme.com", "", "", "", "active"],
            ]),
        )
        .with_tab(
            "Batches",
            grid(&[
                BATCH_HEADER,
                &["BS-001", "Penaeus monodon", "2024-04-01", "500", "800"],
            ]),
        )
        .with_tab(
            "Orders",
            grid(&[
                ORDER_HEADER,
                // total_value 列被忽略
                &["A@ACME.com", "2024-05-01", "Penaeus monodon", "120", "2.5", "BS-001", "99999"],
            ]),
        )
}

#[tokio::test]
async fn test_rerun_inserts_each_entity_once() {
    let (_temp, conn) = create_test_db().unwrap();
    let api = build_api(conn.clone(), MockTransportFactory::new(full_sheet()), test_settings());

    let first = api.trigger_sync(SyncRequest::default()).await.unwrap();
    let first_id = first.job_id.clone();
    assert_eq!(wait(first).await, SyncStatus::Completed);

    let job = api.get_job(&first_id).unwrap();
    assert_eq!(job.counts.processed, 3);
    assert_eq!(job.counts.inserted, 3);
    assert_eq!(job.counts.customers_inserted, 1);
    assert_eq!(job.counts.batches_inserted, 1);
    assert_eq!(job.counts.orders_inserted, 1);

    {
        let guard = conn.lock().unwrap();
        let (number, total, batch_id): (String, f64, Option<String>) = guard
            .query_row(
                "SELECT order_number, total_value, batch_id FROM orders",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(total, 300.0);
        assert!(number.starts_with("ORD-202405-"));
        assert!(batch_id.is_some());
    }

    let second = api.trigger_sync(SyncRequest::default()).await.unwrap();
    let second_id = second.job_id.clone();
    // 客户 / 批次重复计入错误，订单静默跳过
    assert_eq!(wait(second).await, SyncStatus::Failed);

    let job = api.get_job(&second_id).unwrap();
    assert_eq!(job.counts.processed, 3);
    assert_eq!(job.counts.inserted, 0);
    assert_eq!(job.counts.skipped, 3);
    assert_eq!(job.counts.failed, 0);

    let errors = api.list_job_errors(&second_id, &JobErrorsRequest::default()).unwrap();
    assert_eq!(errors.total, 2);
    assert!(errors.items.iter().all(|e| e.error_kind == ErrorKind::Duplicate));

    let guard = conn.lock().unwrap();
    for table in ["customers", "broodstock_batches", "orders"] {
        let n: i64 = guard
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 1, "table {}", table);
    }
}

#[tokio::test]
async fn test_serial_dates_are_normalized() {
    let (_temp, conn) = create_test_db().unwrap();

    let mut batches = grid(&[BATCH_HEADER, &["BS-777", "Penaeus monodon", "", "10", ""]]);
    batches[1][2] = CellValue::Number(45000.0);
    let transport = MockSheetTransport::new().with_tab("Batches", batches);
    let api = build_api(conn.clone(), MockTransportFactory::new(transport), test_settings());

    let triggered = api.trigger_sync(request(&["batches"])).await.unwrap();
    assert_eq!(wait(triggered).await, SyncStatus::Completed);

    let guard = conn.lock().unwrap();
    let arrival: String = guard
        .query_row(
            "SELECT arrival_date FROM broodstock_batches WHERE batch_code = 'BS-777'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(arrival, "2023-03-15");
}

#[tokio::test]
async fn test_single_coordinate_is_business_rule_violation() {
    let (_temp, conn) = create_test_db().unwrap();

    let transport = MockSheetTransport::new().with_tab(
        "Customers",
        grid(&[
            CUSTOMER_HEADER,
            &["Geo Farm", "Minh", "geo@farm.vn", "", "10.77", "", "active"],
            &["", "", "", "", "", "", ""],
            &["Both Farm", "Lan", "both@farm.vn", "", "10.77", "106.70", ""],
        ]),
    );
    let api = build_api(conn, MockTransportFactory::new(transport), test_settings());

    let triggered = api.trigger_sync(request(&["customers"])).await.unwrap();
    let job_id = triggered.job_id.clone();
    assert_eq!(wait(triggered).await, SyncStatus::Partial);

    let errors = api.list_job_errors(&job_id, &JobErrorsRequest::default()).unwrap();
    assert_eq!(errors.total, 1);
    let err = &errors.items[0];
    assert_eq!(err.error_kind, ErrorKind::BusinessRuleViolation);
    assert_eq!(err.field_name.as_deref(), Some("longitude"));
    assert_eq!(err.row_number, 2);
    assert_eq!(err.raw_data["name"], "Geo Farm");

    let job = api.get_job(&job_id).unwrap();
    assert_eq!(job.counts.processed, 2);
    assert_eq!(job.counts.failed, 1);
    assert_eq!(job.counts.inserted, 1);
}

#[tokio::test]
async fn test_row_numbers_follow_physical_rows() {
    let (_temp, conn) = create_test_db().unwrap();

    let transport = MockSheetTransport::new().with_tab(
        "Customers",
        grid(&[
            CUSTOMER_HEADER,
            &["", "", "", "", "", "", ""],
            &["", "", "", "", "", "", ""],
            &["No Contact", "", "x@y.com", "", "", "", ""],
        ]),
    );
    let api = build_api(conn, MockTransportFactory::new(transport), test_settings());

    let triggered = api.trigger_sync(request(&["customers"])).await.unwrap();
    let job_id = triggered.job_id.clone();
    assert_eq!(wait(triggered).await, SyncStatus::Failed);

    let errors = api.list_job_errors(&job_id, &JobErrorsRequest::default()).unwrap();
    assert_eq!(errors.items[0].row_number, 4);
    assert_eq!(errors.items[0].error_kind, ErrorKind::TypeError);
    assert_eq!(errors.items[0].field_name.as_deref(), Some("primary_contact_name"));
}

#[tokio::test]
async fn test_transport_failure_fails_job_without_row_errors() {
    let (_temp, conn) = create_test_db().unwrap();
    let api = build_api(
        conn,
        MockTransportFactory::failing("service account rejected"),
        test_settings(),
    );

    let triggered = api.trigger_sync(SyncRequest::default()).await.unwrap();
    let job_id = triggered.job_id.clone();
    assert_eq!(wait(triggered).await, SyncStatus::Failed);

    let job = api.get_job(&job_id).unwrap();
    assert!(job
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("service account rejected")));
    assert_eq!(job.counts.processed, 0);
    assert!(job.started_at.is_some());

    let errors = api.list_job_errors(&job_id, &JobErrorsRequest::default()).unwrap();
    assert_eq!(errors.total, 0);
}

#[tokio::test]
async fn test_missing_tab_aborts_before_any_insert() {
    let (_temp, conn) = create_test_db().unwrap();

    // 缺少 Orders 工作表: 客户也不应被插入
    let transport = MockSheetTransport::new().with_tab(
        "Customers",
        grid(&[
            CUSTOMER_HEADER,
            &["Acme Corp", "Jane", "a@acme.com", "", "", "", "active"],
        ]),
    );
    let api = build_api(conn.clone(), MockTransportFactory::new(transport), test_settings());

    let triggered = api.trigger_sync(request(&["customers", "orders"])).await.unwrap();
    let job_id = triggered.job_id.clone();
    assert_eq!(wait(triggered).await, SyncStatus::Failed);

    let job = api.get_job(&job_id).unwrap();
    assert!(job.error_message.as_deref().is_some_and(|m| m.contains("Orders")));

    let guard = conn.lock().unwrap();
    let n: i64 = guard
        .query_row("SELECT COUNT(*) FROM customers", [], |r| r.get(0))
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_fetch_timeout_fails_job() {
    let (_temp, conn) = create_test_db().unwrap();

    let transport = MockSheetTransport::new()
        .with_tab("Customers", grid(&[CUSTOMER_HEADER]))
        .with_delay(Duration::from_millis(2500));
    let settings = aqua_sheet_sync::config::SyncSettings {
        fetch_timeout_secs: 1,
        ..test_settings()
    };
    let api = build_api(conn, MockTransportFactory::new(transport), settings);

    let triggered = api.trigger_sync(request(&["customers"])).await.unwrap();
    let job_id = triggered.job_id.clone();
    assert_eq!(wait(triggered).await, SyncStatus::Failed);

    let job = api.get_job(&job_id).unwrap();
    assert!(job.error_message.is_some());
}

/// 插入 running 任务并让其持有测试表格的同步锁
fn hold_lock(conn: &Arc<Mutex<Connection>>, job_id: &str) -> SyncJobRepository {
    let job_repo = SyncJobRepository::new(conn.clone());
    let holder = SyncJob::pending(
        job_id.to_string(),
        None,
        SyncJobMetadata {
            sheet_id: TEST_SHEET_ID.to_string(),
            entity_types: EntityType::SYNC_ORDER.to_vec(),
            mode: SyncMode::InsertOnly,
        },
    );
    job_repo.insert(&holder).unwrap();
    job_repo.mark_running(job_id).unwrap();
    job_repo
        .acquire_lock(TEST_SHEET_ID, job_id, chrono::Duration::seconds(3600))
        .unwrap();
    job_repo
}

#[tokio::test]
async fn test_concurrent_run_on_same_sheet_is_rejected() {
    let (_temp, conn) = create_test_db().unwrap();

    // 模拟一个正在运行的任务持有该表格的同步锁
    let job_repo = hold_lock(&conn, "holder-job");

    let api = build_api(conn, MockTransportFactory::new(full_sheet()), test_settings());
    let triggered = api.trigger_sync(SyncRequest::default()).await.unwrap();
    let job_id = triggered.job_id.clone();
    assert_eq!(wait(triggered).await, SyncStatus::Failed);

    let job = api.get_job(&job_id).unwrap();
    assert!(job.started_at.is_none());
    assert!(job
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("holder-job")));

    // 持有者的锁不受影响
    assert_eq!(
        job_repo.lock_holder(TEST_SHEET_ID).unwrap().as_deref(),
        Some("holder-job")
    );
}

#[tokio::test]
async fn test_expired_lock_from_interrupted_run_is_taken_over() {
    let (_temp, conn) = create_test_db().unwrap();

    // 进程中断: 任务停留在 running，锁未释放且早已过期
    let job_repo = hold_lock(&conn, "crashed-job");
    conn.lock()
        .unwrap()
        .execute(
            "UPDATE sync_locks SET acquired_at = '2020-01-01T00:00:00+00:00' WHERE lock_key = ?1",
            [TEST_SHEET_ID],
        )
        .unwrap();

    let api = build_api(conn, MockTransportFactory::new(full_sheet()), test_settings());
    let triggered = api.trigger_sync(SyncRequest::default()).await.unwrap();
    let job_id = triggered.job_id.clone();
    assert_eq!(wait(triggered).await, SyncStatus::Completed);

    let crashed = api.get_job("crashed-job").unwrap();
    assert_eq!(crashed.status, SyncStatus::Failed);
    assert!(crashed
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains(&job_id)));

    // 新任务结束后锁已释放，后续运行不再被拒绝
    assert_eq!(job_repo.lock_holder(TEST_SHEET_ID).unwrap(), None);
    let again = api.trigger_sync(SyncRequest::default()).await.unwrap();
    let again_id = again.job_id.clone();
    wait(again).await;
    let again = api.get_job(&again_id).unwrap();
    assert!(again.started_at.is_some());
    assert_eq!(again.error_message, None);
}

#[tokio::test]
async fn test_lock_released_after_run() {
    let (_temp, conn) = create_test_db().unwrap();
    let api = build_api(conn.clone(), MockTransportFactory::new(full_sheet()), test_settings());

    let triggered = api.trigger_sync(SyncRequest::default()).await.unwrap();
    wait(triggered).await;

    let job_repo = SyncJobRepository::new(conn);
    assert_eq!(job_repo.lock_holder(TEST_SHEET_ID).unwrap(), None);
}

#[tokio::test]
async fn test_trigger_rejections() {
    let (_temp, conn) = create_test_db().unwrap();

    let api = build_api(
        conn.clone(),
        MockTransportFactory::new(MockSheetTransport::new()),
        test_settings(),
    );
    assert!(matches!(
        api.trigger_sync(request(&["suppliers"])).await,
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        api.trigger_sync(SyncRequest {
            mode: Some("upsert".to_string()),
            ..Default::default()
        })
        .await,
        Err(ApiError::InvalidInput(_))
    ));

    let no_default = build_api(
        conn.clone(),
        MockTransportFactory::new(MockSheetTransport::new()),
        Default::default(),
    );
    assert!(matches!(
        no_default.trigger_sync(SyncRequest::default()).await,
        Err(ApiError::InvalidInput(_))
    ));

    api.update_config("enabled", "false", Some("ops")).unwrap();
    assert!(matches!(
        api.trigger_sync(SyncRequest::default()).await,
        Err(ApiError::SyncDisabled)
    ));

    // 被拒绝的触发不创建任务
    let history = api.list_jobs(&Default::default()).unwrap();
    assert_eq!(history.total, 0);
}

#[tokio::test]
async fn test_failed_row_rolls_back_only_itself() {
    let (_temp, conn) = create_test_db().unwrap();

    // 审计写入失败: 该行的客户插入须随行事务一同回滚
    conn.lock()
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER reject_audit BEFORE INSERT ON sync_audit_log
             WHEN NEW.data LIKE '%boom@farm.vn%'
             BEGIN SELECT RAISE(ABORT, 'audit write rejected'); END;",
        )
        .unwrap();

    let transport = MockSheetTransport::new().with_tab(
        "Customers",
        grid(&[
            CUSTOMER_HEADER,
            &["Ok Farm", "Lan", "ok@farm.vn", "", "", "", ""],
            &["Boom Farm", "Minh", "boom@farm.vn", "", "", "", ""],
            &["After Farm", "Hoa", "after@farm.vn", "", "", "", ""],
        ]),
    );
    let api = build_api(conn.clone(), MockTransportFactory::new(transport), test_settings());

    let triggered = api.trigger_sync(request(&["customers"])).await.unwrap();
    let job_id = triggered.job_id.clone();
    assert_eq!(wait(triggered).await, SyncStatus::Partial);

    let job = api.get_job(&job_id).unwrap();
    assert_eq!(job.counts.processed, 3);
    assert_eq!(job.counts.inserted, 2);
    assert_eq!(job.counts.failed, 1);

    let errors = api.list_job_errors(&job_id, &JobErrorsRequest::default()).unwrap();
    assert_eq!(errors.total, 1);
    assert_eq!(errors.items[0].error_kind, ErrorKind::DatabaseError);
    assert_eq!(errors.items[0].row_number, 3);
    assert!(errors.items[0].error_message.contains("audit write rejected"));

    let audit = api.list_job_audit(&job_id, None, None).unwrap();
    assert_eq!(audit.total, 2);
    assert!(audit.items.iter().all(|e| e.row_number != 3));

    let guard = conn.lock().unwrap();
    let emails: Vec<String> = guard
        .prepare("SELECT email FROM customers ORDER BY email")
        .unwrap()
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(emails, vec!["after@farm.vn", "ok@farm.vn"]);
}

#[tokio::test]
async fn test_run_deadline_stops_processing() {
    let (_temp, conn) = create_test_db().unwrap();

    let settings = aqua_sheet_sync::config::SyncSettings {
        run_timeout_secs: 0,
        ..test_settings()
    };
    let api = build_api(conn, MockTransportFactory::new(full_sheet()), settings);

    let triggered = api.trigger_sync(SyncRequest::default()).await.unwrap();
    let job_id = triggered.job_id.clone();
    assert_eq!(wait(triggered).await, SyncStatus::Failed);

    let job = api.get_job(&job_id).unwrap();
    assert_eq!(job.counts.processed, 1);
    assert_eq!(job.counts.inserted, 0);
    assert!(job
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("运行超时")));
    assert!(job.completed_at.is_some());

    let audit = api.list_job_audit(&job_id, None, None).unwrap();
    assert_eq!(audit.total, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_job_status_readable_during_run() {
    let (_temp, conn) = create_test_db().unwrap();

    let mut customers: CellGrid = vec![CUSTOMER_HEADER
        .iter()
        .map(|h| CellValue::from(*h))
        .collect()];
    for i in 0..3000 {
        let email = format!("farm{}@aqua.vn", i);
        customers.push(vec![
            CellValue::from("Farm"),
            CellValue::from("Lan"),
            CellValue::from(email.as_str()),
            CellValue::Empty,
            CellValue::Empty,
            CellValue::Empty,
            CellValue::Empty,
        ]);
    }
    let transport = MockSheetTransport::new().with_tab("Customers", customers);
    let api = build_api(conn, MockTransportFactory::new(transport), test_settings());

    let triggered = api.trigger_sync(request(&["customers"])).await.unwrap();
    let job_id = triggered.job_id.clone();

    let mut saw_running = false;
    let mut slowest = Duration::ZERO;
    loop {
        let started = Instant::now();
        let job = api.get_job(&job_id).unwrap();
        api.list_jobs(&Default::default()).unwrap();
        slowest = slowest.max(started.elapsed());

        if job.status == SyncStatus::Running {
            saw_running = true;
        }
        if job.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(saw_running);
    assert!(slowest < Duration::from_millis(500), "查询耗时 {:?}", slowest);
    assert_eq!(wait(triggered).await, SyncStatus::Completed);
    assert_eq!(api.get_job(&job_id).unwrap().counts.inserted, 3000);
}

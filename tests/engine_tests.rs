// tests/engine_tests.rs

use std::sync::Arc;

use path_server::{
    engine::{
        PathEngine,
        policy::{UnlockMode, UnlockPolicy},
    },
    error::AppError,
    models::{
        category::CreateCategoryRequest,
        node::{CompleteNodeRequest, CreateNodeRequest, UpdateNodeRequest},
        path::{CreatePathRequest, UpdatePathRequest},
        progress::NodeStatus,
    },
    services::PathService,
    store::{self, CatalogStore, ProgressLedger, SqliteStore},
};

struct TestContext {
    service: PathService,
    store: SqliteStore,
}

impl TestContext {
    fn engine(&self) -> &PathEngine {
        self.service.engine()
    }
}

async fn setup(mode: UnlockMode, min_accuracy: Option<f64>) -> TestContext {
    let pool = store::connect("sqlite::memory:", 1)
        .await
        .expect("Failed to open in-memory SQLite database");
    store::migrate(&pool)
        .await
        .expect("Failed to migrate database");

    let store = SqliteStore::new(pool);
    let catalog: Arc<dyn CatalogStore> = Arc::new(store.clone());
    let ledger: Arc<dyn ProgressLedger> = Arc::new(store.clone());
    let engine = PathEngine::new(catalog.clone(), ledger, UnlockPolicy::new(mode, min_accuracy));

    TestContext {
        service: PathService::new(engine, catalog, 1),
        store,
    }
}

fn path(id: &str, tech_stack: &str) -> CreatePathRequest {
    CreatePathRequest {
        id: id.to_string(),
        tech_stack: tech_stack.to_string(),
        title: format!("{tech_stack} path"),
        subtitle: None,
        character_icon: None,
        character_dialog: None,
    }
}

fn category(id: &str, path_id: &str, sort_order: i64) -> CreateCategoryRequest {
    CreateCategoryRequest {
        id: id.to_string(),
        path_id: path_id.to_string(),
        name: id.to_string(),
        icon: None,
        color: None,
        sort_order: Some(sort_order),
    }
}

fn node(id: &str, category_id: &str, sort_order: i64, prerequisite: Option<&str>) -> CreateNodeRequest {
    CreateNodeRequest {
        id: id.to_string(),
        category_id: category_id.to_string(),
        title: id.to_string(),
        icon: None,
        color: None,
        sort_order: Some(sort_order),
        question_ids: vec![format!("{id}-q1")],
        prerequisite_node_ids: prerequisite.map(|p| vec![p.to_string()]).unwrap_or_default(),
        estimated_minutes: None,
    }
}

fn counts(correct_count: i64, total_count: i64) -> CompleteNodeRequest {
    CompleteNodeRequest {
        correct_count,
        total_count,
    }
}

/// path_js: cat1 [n1, n2 (after n1)], cat2 [n3 (after n2)], cat3 [], cat4 [n4, n5].
async fn seed(ctx: &TestContext) {
    let service = &ctx.service;
    service.create_path(path("path_js", "js")).await.unwrap();
    service.create_category(category("cat1", "path_js", 0)).await.unwrap();
    service.create_category(category("cat2", "path_js", 1)).await.unwrap();
    service.create_category(category("cat3", "path_js", 2)).await.unwrap();
    service.create_category(category("cat4", "path_js", 3)).await.unwrap();
    service.create_node(node("n1", "cat1", 0, None)).await.unwrap();
    service.create_node(node("n2", "cat1", 1, Some("n1"))).await.unwrap();
    service.create_node(node("n3", "cat2", 0, Some("n2"))).await.unwrap();
    service.create_node(node("n4", "cat4", 0, Some("n3"))).await.unwrap();
    service.create_node(node("n5", "cat4", 1, Some("n4"))).await.unwrap();
}

async fn status_of(ctx: &TestContext, category_id: &str, node_id: &str, user_id: &str) -> Option<NodeStatus> {
    let listing = ctx
        .service
        .list_category_nodes(category_id, Some(user_id))
        .await
        .unwrap();
    listing
        .nodes
        .into_iter()
        .find(|view| view.node.id == node_id)
        .and_then(|view| view.status)
}

#[tokio::test]
async fn rejects_correct_count_above_total() {
    let ctx = setup(UnlockMode::Explicit, None).await;
    seed(&ctx).await;

    let result = ctx.service.complete_node("user-1", "n1", counts(5, 3)).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let stored = ctx.store.get_progress("user-1", "n1").await.unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn rejects_blank_identifiers() {
    let ctx = setup(UnlockMode::Explicit, None).await;
    seed(&ctx).await;

    let blank_user = ctx.service.complete_node("  ", "n1", counts(1, 1)).await;
    assert!(matches!(blank_user, Err(AppError::BadRequest(_))));

    let blank_node = ctx.service.complete_node("user-1", "", counts(1, 1)).await;
    assert!(matches!(blank_node, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn completing_missing_node_is_not_found() {
    let ctx = setup(UnlockMode::Explicit, None).await;
    seed(&ctx).await;

    let result = ctx.service.complete_node("user-1", "ghost", counts(1, 1)).await;
    match result {
        Err(AppError::NotFound { entity, key }) => {
            assert_eq!(entity, "node");
            assert_eq!(key, "ghost");
        }
        other => panic!("expected not found, got {:?}", other.map(|c| c.node.id)),
    }
}

#[tokio::test]
async fn repeated_completion_keeps_one_row_with_latest_counts() {
    let ctx = setup(UnlockMode::Explicit, None).await;
    seed(&ctx).await;

    ctx.service.complete_node("user-1", "n1", counts(1, 2)).await.unwrap();
    let second = ctx.service.complete_node("user-1", "n1", counts(2, 2)).await.unwrap();
    assert_eq!(second.progress.status, NodeStatus::Completed);

    let rows = ctx
        .store
        .list_progress("user-1", &["n1".to_string()])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].correct_count, 2);
    assert_eq!(rows[0].total_count, 2);
    assert!(rows[0].completed_at.is_some());
}

#[tokio::test]
async fn initialization_is_idempotent() {
    let ctx = setup(UnlockMode::Explicit, None).await;
    seed(&ctx).await;

    ctx.engine().initialize("user-1", "path_js").await.unwrap();
    ctx.engine().initialize("user-1", "path_js").await.unwrap();
    ctx.service.get_path("path_js", Some("user-1")).await.unwrap();

    let ids: Vec<String> = ["n1", "n2", "n3", "n4", "n5"].iter().map(|s| s.to_string()).collect();
    let rows = ctx.store.list_progress("user-1", &ids).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].node_id, "n1");
    assert_eq!(rows[0].status, NodeStatus::Unlocked);
}

#[tokio::test]
async fn initialization_does_not_reset_completed_entry() {
    let ctx = setup(UnlockMode::Explicit, None).await;
    seed(&ctx).await;

    ctx.service.complete_node("user-1", "n1", counts(3, 4)).await.unwrap();
    ctx.engine().initialize("user-1", "path_js").await.unwrap();

    let entry = ctx.store.get_progress("user-1", "n1").await.unwrap().unwrap();
    assert_eq!(entry.status, NodeStatus::Completed);
    assert_eq!(entry.correct_count, 3);
}

#[tokio::test]
async fn derived_mode_writes_nothing_on_initialize() {
    let ctx = setup(UnlockMode::Derived, None).await;
    seed(&ctx).await;

    ctx.engine().initialize("user-1", "path_js").await.unwrap();
    assert!(ctx.store.get_progress("user-1", "n1").await.unwrap().is_none());
    assert_eq!(status_of(&ctx, "cat1", "n1", "user-1").await, Some(NodeStatus::Unlocked));
}

#[tokio::test]
async fn prerequisite_unlocks_dependent_in_both_modes() {
    for mode in [UnlockMode::Explicit, UnlockMode::Derived] {
        let ctx = setup(mode, None).await;
        seed(&ctx).await;
        ctx.service.get_path("path_js", Some("user-1")).await.unwrap();

        assert_eq!(status_of(&ctx, "cat1", "n2", "user-1").await, Some(NodeStatus::Locked), "{mode}");

        ctx.service.complete_node("user-1", "n1", counts(1, 3)).await.unwrap();

        assert_eq!(status_of(&ctx, "cat1", "n1", "user-1").await, Some(NodeStatus::Completed), "{mode}");
        assert_eq!(status_of(&ctx, "cat1", "n2", "user-1").await, Some(NodeStatus::Unlocked), "{mode}");
        assert_eq!(status_of(&ctx, "cat2", "n3", "user-1").await, Some(NodeStatus::Locked), "{mode}");

        // Other users are unaffected
        assert_eq!(status_of(&ctx, "cat1", "n2", "user-2").await, Some(NodeStatus::Locked), "{mode}");
    }
}

#[tokio::test]
async fn accuracy_threshold_gates_unlocking() {
    for mode in [UnlockMode::Explicit, UnlockMode::Derived] {
        let ctx = setup(mode, Some(0.6)).await;
        seed(&ctx).await;

        let weak = ctx.service.complete_node("user-1", "n1", counts(1, 4)).await.unwrap();
        assert!(!weak.unlocked_next, "{mode}");
        assert_eq!(weak.next_node.as_ref().map(|n| n.id.as_str()), Some("n2"));
        assert_eq!(status_of(&ctx, "cat1", "n2", "user-1").await, Some(NodeStatus::Locked), "{mode}");

        let strong = ctx.service.complete_node("user-1", "n1", counts(3, 4)).await.unwrap();
        assert!(strong.unlocked_next, "{mode}");
        assert_eq!(status_of(&ctx, "cat1", "n2", "user-1").await, Some(NodeStatus::Unlocked), "{mode}");
    }
}

#[tokio::test]
async fn next_node_walks_categories_in_order() {
    let ctx = setup(UnlockMode::Explicit, None).await;
    seed(&ctx).await;

    let first = ctx.service.complete_node("user-1", "n1", counts(1, 1)).await.unwrap();
    assert_eq!(first.next_node.map(|n| n.id), Some("n2".to_string()));

    let second = ctx.service.complete_node("user-1", "n2", counts(1, 1)).await.unwrap();
    assert_eq!(second.next_node.map(|n| n.id), Some("n3".to_string()));

    // cat3 is empty, so the walk continues into cat4
    let third = ctx.service.complete_node("user-1", "n3", counts(1, 1)).await.unwrap();
    assert_eq!(third.next_node.map(|n| n.id), Some("n4".to_string()));

    let last = ctx.service.complete_node("user-1", "n5", counts(1, 1)).await.unwrap();
    assert!(last.next_node.is_none());
    assert!(!last.unlocked_next);
}

#[tokio::test]
async fn sort_order_ties_keep_insertion_order() {
    let ctx = setup(UnlockMode::Explicit, None).await;
    ctx.service.create_path(path("path_go", "go")).await.unwrap();
    ctx.service.create_category(category("go1", "path_go", 0)).await.unwrap();
    ctx.service.create_node(node("b", "go1", 0, None)).await.unwrap();
    ctx.service.create_node(node("a", "go1", 0, None)).await.unwrap();

    let listing = ctx.service.list_category_nodes("go1", None).await.unwrap();
    let ids: Vec<&str> = listing.nodes.iter().map(|v| v.node.id.as_str()).collect();
    assert_eq!(ids, ["b", "a"]);
    assert!(listing.nodes.iter().all(|v| v.status.is_none()));
}

#[tokio::test]
async fn completion_rate_counts_completed_nodes() {
    let ctx = setup(UnlockMode::Explicit, None).await;
    seed(&ctx).await;

    for id in ["n1", "n2", "n3"] {
        ctx.service.complete_node("user-1", id, counts(1, 1)).await.unwrap();
    }

    let summary = ctx.service.get_user_path_progress("user-1", "path_js").await.unwrap();
    assert_eq!(summary.progress.total_nodes, 5);
    assert_eq!(summary.progress.completed_nodes, 3);
    assert!((summary.progress.completion_rate - 0.6).abs() < 1e-9);
}

#[tokio::test]
async fn empty_path_has_zero_completion_rate() {
    let ctx = setup(UnlockMode::Explicit, None).await;
    ctx.service.create_path(path("path_empty", "rust")).await.unwrap();

    let summary = ctx.service.get_user_path_progress("user-1", "path_empty").await.unwrap();
    assert_eq!(summary.progress.total_nodes, 0);
    assert_eq!(summary.progress.completion_rate, 0.0);

    let detail = ctx.service.get_path("rust", Some("user-1")).await.unwrap();
    assert_eq!(detail.path.id, "path_empty");
    assert!(detail.categories.is_empty());
}

#[tokio::test]
async fn deleting_path_cascades_to_nodes_and_progress() {
    let ctx = setup(UnlockMode::Explicit, None).await;
    seed(&ctx).await;
    ctx.service.complete_node("user-1", "n1", counts(1, 1)).await.unwrap();

    ctx.service.delete_path("path_js").await.unwrap();

    assert!(ctx.store.get_node("n1").await.unwrap().is_none());
    assert!(ctx.store.get_category("cat1").await.unwrap().is_none());
    assert!(ctx.store.get_progress("user-1", "n1").await.unwrap().is_none());

    let result = ctx.service.complete_node("user-1", "n1", counts(1, 1)).await;
    assert!(matches!(result, Err(AppError::NotFound { entity: "node", .. })));

    let again = ctx.service.delete_path("path_js").await;
    assert!(matches!(again, Err(AppError::NotFound { entity: "path", .. })));
}

#[tokio::test]
async fn prerequisite_integrity_is_enforced() {
    let ctx = setup(UnlockMode::Explicit, None).await;
    seed(&ctx).await;

    let self_ref = ctx.service.create_node(node("n6", "cat4", 2, Some("n6"))).await;
    assert!(matches!(self_ref, Err(AppError::Integrity(_))));

    let dangling = ctx.service.create_node(node("n6", "cat4", 2, Some("nope"))).await;
    assert!(matches!(dangling, Err(AppError::Integrity(_))));

    // n1 -> n2 -> n3; making n1 depend on n3 closes a cycle
    let cycle = ctx
        .service
        .update_node(
            "n1",
            UpdateNodeRequest {
                prerequisite_node_ids: Some(vec!["n3".to_string()]),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(cycle, Err(AppError::Integrity(_))));

    let mut two = node("n6", "cat4", 2, Some("n1"));
    two.prerequisite_node_ids.push("n2".to_string());
    let too_many = ctx.service.create_node(two).await;
    assert!(matches!(too_many, Err(AppError::Integrity(_))));

    assert!(ctx.store.get_node("n6").await.unwrap().is_none());
    let n1 = ctx.store.get_node("n1").await.unwrap().unwrap();
    assert!(n1.prerequisite_node_ids.is_empty());
}

#[tokio::test]
async fn duplicate_ids_and_tech_stacks_conflict() {
    let ctx = setup(UnlockMode::Explicit, None).await;
    seed(&ctx).await;

    let same_id = ctx.service.create_path(path("path_js", "python")).await;
    assert!(matches!(same_id, Err(AppError::Conflict { entity: "path", .. })));

    let same_stack = ctx.service.create_path(path("path_js2", "JS")).await;
    assert!(matches!(same_stack, Err(AppError::Conflict { entity: "techStack", .. })));

    let same_category = ctx.service.create_category(category("cat1", "path_js", 9)).await;
    assert!(matches!(same_category, Err(AppError::Conflict { .. })));

    let orphan = ctx.service.create_category(category("cat9", "path_none", 0)).await;
    assert!(matches!(orphan, Err(AppError::NotFound { entity: "path", .. })));
}

#[tokio::test]
async fn unknown_lookups_are_not_found() {
    let ctx = setup(UnlockMode::Explicit, None).await;

    let by_stack = ctx.service.get_path_by_tech_stack("cobol", None).await;
    assert!(matches!(by_stack, Err(AppError::NotFound { .. })));

    let category = ctx.service.list_category_nodes("nowhere", Some("user-1")).await;
    assert!(matches!(category, Err(AppError::NotFound { entity: "category", .. })));

    let blank = ctx.service.get_path("   ", None).await;
    assert!(matches!(blank, Err(AppError::BadRequest(_))));
}

/// path_seq: s1 [p1, p2], s2 [p3]; no declared prerequisites.
async fn seed_sequential(ctx: &TestContext) {
    let service = &ctx.service;
    service.create_path(path("path_seq", "sql")).await.unwrap();
    service.create_category(category("s1", "path_seq", 0)).await.unwrap();
    service.create_category(category("s2", "path_seq", 1)).await.unwrap();
    service.create_node(node("p1", "s1", 0, None)).await.unwrap();
    service.create_node(node("p2", "s1", 1, None)).await.unwrap();
    service.create_node(node("p3", "s2", 0, None)).await.unwrap();
}

#[tokio::test]
async fn follower_without_prerequisites_opens_after_predecessor() {
    for mode in [UnlockMode::Explicit, UnlockMode::Derived] {
        let ctx = setup(mode, None).await;
        seed_sequential(&ctx).await;
        ctx.service.get_path("path_seq", Some("u")).await.unwrap();

        assert_eq!(status_of(&ctx, "s1", "p1", "u").await, Some(NodeStatus::Unlocked), "{mode}");
        assert_eq!(status_of(&ctx, "s1", "p2", "u").await, Some(NodeStatus::Locked), "{mode}");

        let first = ctx.service.complete_node("u", "p1", counts(2, 2)).await.unwrap();
        assert_eq!(first.next_node.as_ref().map(|n| n.id.as_str()), Some("p2"), "{mode}");
        let p2 = status_of(&ctx, "s1", "p2", "u").await;
        assert!(first.unlocked_next, "{mode}");
        assert_eq!(first.unlocked_next, p2 == Some(NodeStatus::Unlocked), "{mode}");
        assert_eq!(status_of(&ctx, "s2", "p3", "u").await, Some(NodeStatus::Locked), "{mode}");

        // Crosses into the next category
        let second = ctx.service.complete_node("u", "p2", counts(1, 2)).await.unwrap();
        assert_eq!(second.next_node.as_ref().map(|n| n.id.as_str()), Some("p3"), "{mode}");
        let p3 = status_of(&ctx, "s2", "p3", "u").await;
        assert!(second.unlocked_next, "{mode}");
        assert_eq!(second.unlocked_next, p3 == Some(NodeStatus::Unlocked), "{mode}");
    }
}

#[tokio::test]
async fn follower_without_prerequisites_respects_accuracy_threshold() {
    for mode in [UnlockMode::Explicit, UnlockMode::Derived] {
        let ctx = setup(mode, Some(0.6)).await;
        seed_sequential(&ctx).await;

        let weak = ctx.service.complete_node("u", "p1", counts(1, 4)).await.unwrap();
        assert!(!weak.unlocked_next, "{mode}");
        assert_eq!(status_of(&ctx, "s1", "p2", "u").await, Some(NodeStatus::Locked), "{mode}");

        let strong = ctx.service.complete_node("u", "p1", counts(4, 4)).await.unwrap();
        assert!(strong.unlocked_next, "{mode}");
        assert_eq!(status_of(&ctx, "s1", "p2", "u").await, Some(NodeStatus::Unlocked), "{mode}");
    }
}

#[tokio::test]
async fn next_node_waits_on_its_own_prerequisite() {
    for mode in [UnlockMode::Explicit, UnlockMode::Derived] {
        let ctx = setup(mode, None).await;
        let service = &ctx.service;
        service.create_path(path("path_dag", "css")).await.unwrap();
        service.create_category(category("d1", "path_dag", 0)).await.unwrap();
        // Traversal order x, y, z; y depends on z, z depends on x.
        service.create_node(node("x", "d1", 0, None)).await.unwrap();
        service.create_node(node("z", "d1", 2, Some("x"))).await.unwrap();
        service.create_node(node("y", "d1", 1, Some("z"))).await.unwrap();
        service.get_path("path_dag", Some("u")).await.unwrap();

        let after_x = service.complete_node("u", "x", counts(3, 3)).await.unwrap();
        assert_eq!(after_x.next_node.as_ref().map(|n| n.id.as_str()), Some("y"), "{mode}");
        let y = status_of(&ctx, "d1", "y", "u").await;
        assert!(!after_x.unlocked_next, "{mode}");
        assert_eq!(after_x.unlocked_next, y == Some(NodeStatus::Unlocked), "{mode}");
        assert_eq!(status_of(&ctx, "d1", "z", "u").await, Some(NodeStatus::Unlocked), "{mode}");

        // Nothing was persisted for y
        let y_row = ctx.store.get_progress("u", "y").await.unwrap();
        assert!(y_row.is_none(), "{mode}");

        let after_z = service.complete_node("u", "z", counts(1, 1)).await.unwrap();
        assert!(after_z.next_node.is_none(), "{mode}");
        assert_eq!(status_of(&ctx, "d1", "y", "u").await, Some(NodeStatus::Unlocked), "{mode}");
    }
}

#[tokio::test]
async fn next_node_skips_empty_categories() {
    let ctx = setup(UnlockMode::Explicit, None).await;
    seed(&ctx).await;

    let n3 = ctx.store.get_node("n3").await.unwrap().unwrap();
    let next = ctx.engine().next_node(&n3).await.unwrap();
    assert_eq!(next.map(|n| n.id), Some("n4".to_string()));
}

#[tokio::test]
async fn tech_stack_update_conflict_reports_the_stack() {
    let ctx = setup(UnlockMode::Explicit, None).await;
    seed(&ctx).await;
    ctx.service.create_path(path("path_go", "go")).await.unwrap();

    let result = ctx
        .service
        .update_path(
            "path_go",
            UpdatePathRequest {
                tech_stack: Some(" JS ".to_string()),
                ..Default::default()
            },
        )
        .await;

    match result {
        Err(AppError::Conflict { entity, key }) => {
            assert_eq!(entity, "techStack");
            assert_eq!(key, "js");
        }
        other => panic!("expected conflict, got {:?}", other.map(|p| p.id)),
    }
}

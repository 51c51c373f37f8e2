//! # Session Sync Tests
//!
//! Drive a `Session` against a recording remote and check when saves reach
//! it, what they carry and what is written to the local store.

use std::sync::{Arc, Mutex};

use alchemy_client::{OfflineRemote, RemoteApi, RemoteError, Session, Synchronizer};
use alchemy_core::{
    ElementName, EngineConfig, EngineEvent, InitResponse, InputEvent, LocalProgress, MemoryStore,
    PointerEvent, RecipeCatalog, SaveRequest, SaveResponse, SyncConfig, SyncStatus, Table, Viewport,
    PRIMITIVES,
};
use async_trait::async_trait;
use tokio::sync::Notify;

/// Remote whose fetch waits for the test to release it and which records
/// every save.
struct RecordingRemote {
    init: InitResponse,
    gate: Notify,
    saves: Mutex<Vec<SaveRequest>>,
}

impl RecordingRemote {
    fn new(init: InitResponse) -> Arc<Self> {
        Arc::new(Self {
            init,
            gate: Notify::new(),
            saves: Mutex::new(Vec::new()),
        })
    }

    fn release(&self) {
        self.gate.notify_one();
    }

    fn saves(&self) -> Vec<SaveRequest> {
        self.saves.lock().expect("saves lock").clone()
    }
}

#[async_trait]
impl RemoteApi for RecordingRemote {
    async fn fetch_init(&self) -> Result<InitResponse, RemoteError> {
        self.gate.notified().await;
        Ok(self.init.clone())
    }

    async fn save_progress(&self, request: &SaveRequest) -> Result<SaveResponse, RemoteError> {
        self.saves.lock().expect("saves lock").push(request.clone());
        Ok(SaveResponse { success: true })
    }
}

fn primitives_only() -> InitResponse {
    InitResponse {
        discovered_names: PRIMITIVES.iter().map(|&n| n.into()).collect(),
        table_tokens: None,
        username: Some("ash".into()),
    }
}

/// Store holding water at (100, 100) and fire at (200, 100).
fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    let mut table = Table::new();
    table.spawn("water".into(), 100.0, 100.0);
    table.spawn("fire".into(), 200.0, 100.0);
    LocalProgress::new(store.clone())
        .save_table(&table)
        .expect("seed table");
    store
}

fn open(store: &MemoryStore, remote: Arc<dyn RemoteApi>) -> Session<MemoryStore> {
    let config = EngineConfig::default().with_viewport(Viewport::new(400.0, 800.0));
    let sync = Synchronizer::new(remote, SyncConfig::default());
    Session::open(
        config,
        RecipeCatalog::builtin(),
        LocalProgress::new(store.clone()),
        sync,
    )
}

fn drag(
    session: &mut Session<MemoryStore>,
    from: (f32, f32),
    to: (f32, f32),
    t: u64,
) -> Vec<EngineEvent> {
    let mut events = session.apply(&InputEvent::Pointer(PointerEvent::down(from.0, from.1, t)));
    events.extend(session.apply(&InputEvent::Pointer(PointerEvent::moved(to.0, to.1, t + 16))));
    events.extend(session.apply(&InputEvent::Pointer(PointerEvent::up(to.0, to.1, t + 32))));
    events
}

fn discovered(name: &str) -> EngineEvent {
    EngineEvent::Discovered {
        name: ElementName::from(name),
    }
}

#[tokio::test]
async fn test_discovery_before_load_is_pushed_after_merge() {
    let store = seeded_store();
    let remote = RecordingRemote::new(primitives_only());
    let mut session = open(&store, remote.clone());
    assert_eq!(session.sync().status(), SyncStatus::Loading);

    let events = drag(&mut session, (200.0, 100.0), (140.0, 100.0), 0);
    assert!(events.contains(&discovered("alcohol")));

    // Nothing may be saved while the fetch is in flight.
    session.finish().await;
    assert!(remote.saves().is_empty());

    remote.release();
    session.settle_fetch().await;
    assert_eq!(session.sync().status(), SyncStatus::Idle);
    assert_eq!(session.sync().username(), Some("ash"));
    session.finish().await;

    let saves = remote.saves();
    assert_eq!(saves.len(), 1);
    assert!(saves[0]
        .discovered_names
        .contains(&ElementName::from("alcohol")));
    assert_eq!(saves[0].table_tokens.len(), 1);
}

#[tokio::test]
async fn test_remote_names_merge_without_push() {
    let store = MemoryStore::new();
    let mut init = primitives_only();
    init.discovered_names.push("steam".into());
    let remote = RecordingRemote::new(init);
    remote.release();

    let mut session = open(&store, remote.clone());
    let events = session.settle_fetch().await;
    session.finish().await;

    let names: Vec<&str> = session
        .game()
        .discovery()
        .iter()
        .map(ElementName::as_str)
        .collect();
    assert_eq!(names, vec!["air", "fire", "earth", "water", "steam"]);
    assert!(remote.saves().is_empty());
    assert!(events
        .iter()
        .all(|event| !matches!(event, EngineEvent::Discovered { .. })));

    // The merged list is written back locally.
    let local = LocalProgress::new(store).load();
    assert!(local.discovered.contains("steam"));
}

#[tokio::test]
async fn test_table_edits_save_after_quiet_period() {
    let store = seeded_store();
    let remote = RecordingRemote::new(primitives_only());
    remote.release();
    let mut session = open(&store, remote.clone());
    session.settle_fetch().await;

    drag(&mut session, (100.0, 100.0), (300.0, 300.0), 1000);
    let deadline = session
        .sync()
        .next_deadline_ms()
        .expect("table edit schedules a save");
    assert!(deadline >= 3000);

    session.tick(deadline - 1);
    assert_eq!(session.sync().next_deadline_ms(), Some(deadline));

    session.tick(deadline);
    assert_eq!(session.sync().next_deadline_ms(), None);
    session.finish().await;

    let saves = remote.saves();
    assert_eq!(saves.len(), 1);
    let water = saves[0]
        .table_tokens
        .iter()
        .find(|token| token.name.as_str() == "water")
        .expect("water saved");
    assert!((water.x - 300.0).abs() < 1e-3);
}

#[tokio::test]
async fn test_pending_save_flushed_on_finish() {
    let store = seeded_store();
    let remote = RecordingRemote::new(primitives_only());
    remote.release();
    let mut session = open(&store, remote.clone());
    session.settle_fetch().await;

    drag(&mut session, (100.0, 100.0), (300.0, 300.0), 0);
    assert!(session.sync().next_deadline_ms().is_some());
    session.finish().await;

    assert_eq!(remote.saves().len(), 1);
}

#[tokio::test]
async fn test_offline_session_still_plays() {
    let store = seeded_store();
    let mut session = open(&store, Arc::new(OfflineRemote));
    session.settle_fetch().await;
    assert_eq!(session.sync().status(), SyncStatus::Idle);

    let events = drag(&mut session, (200.0, 100.0), (140.0, 100.0), 0);
    assert!(events.contains(&discovered("alcohol")));
    session.finish().await;

    let local = LocalProgress::new(store).load();
    assert!(local.discovered.contains("alcohol"));
    assert_eq!(local.table.len(), 1);
    assert_eq!(local.table[0].name.as_str(), "alcohol");
}

#[tokio::test]
async fn test_run_writes_ndjson_events() {
    let store = seeded_store();
    let session = open(&store, Arc::new(OfflineRemote));

    let input = [
        InputEvent::Pointer(PointerEvent::down(200.0, 100.0, 0)),
        InputEvent::Pointer(PointerEvent::moved(140.0, 100.0, 16)),
        InputEvent::Pointer(PointerEvent::up(140.0, 100.0, 32)),
    ]
    .iter()
    .map(|event| serde_json::to_string(event).expect("serialize input"))
    .chain(["not json".to_string(), String::new()])
    .collect::<Vec<_>>()
    .join("\n");

    let mut output = Vec::new();
    session
        .run(input.as_bytes(), &mut output)
        .await
        .expect("session runs");

    let events: Vec<EngineEvent> = String::from_utf8(output)
        .expect("utf8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("engine event line"))
        .collect();
    assert!(events.contains(&discovered("alcohol")));
    assert!(events
        .iter()
        .any(|event| matches!(event, EngineEvent::Merged { .. })));

    let local = LocalProgress::new(store).load();
    assert!(local.discovered.contains("alcohol"));
}

fn steam_remote() -> InitResponse {
    let mut init = primitives_only();
    init.discovered_names.push("steam".into());
    init
}

/// Spawn the first palette entry and drop it on the table.
fn spawn_from_palette(session: &mut Session<MemoryStore>, t: u64) {
    session.apply(&InputEvent::Pointer(PointerEvent::down(56.0, 604.0, t)));
    session.apply(&InputEvent::Pointer(PointerEvent::moved(56.0, 560.0, t + 16)));
    session.apply(&InputEvent::Pointer(PointerEvent::moved(56.0, 300.0, t + 32)));
    session.apply(&InputEvent::Pointer(PointerEvent::up(56.0, 300.0, t + 48)));
}

fn saved_names(request: &SaveRequest) -> Vec<&str> {
    request
        .discovered_names
        .iter()
        .map(ElementName::as_str)
        .collect()
}

#[tokio::test]
async fn test_wipe_replaces_remote_progress() {
    let store = seeded_store();
    let remote = RecordingRemote::new(steam_remote());
    remote.release();
    let mut session = open(&store, remote.clone());
    session.settle_fetch().await;
    assert!(session.game().discovery().contains("steam"));

    session.apply(&InputEvent::WipeProgress);
    session.finish().await;
    let saves = remote.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saved_names(&saves[0]), PRIMITIVES.to_vec());
    assert!(saves[0].table_tokens.is_empty());

    // Later edits keep saving the reset list, never the wiped names.
    spawn_from_palette(&mut session, 5000);
    assert_eq!(session.game().table().len(), 1);
    session.finish().await;
    let saves = remote.saves();
    assert_eq!(saves.len(), 2);
    assert_eq!(saved_names(&saves[1]), PRIMITIVES.to_vec());
    assert_eq!(saves[1].table_tokens.len(), 1);
}

#[tokio::test]
async fn test_wipe_before_load_is_not_undone_by_merge() {
    let store = seeded_store();
    let remote = RecordingRemote::new(steam_remote());
    let mut session = open(&store, remote.clone());

    session.apply(&InputEvent::WipeProgress);
    remote.release();
    session.settle_fetch().await;
    session.finish().await;

    let names: Vec<&str> = session
        .game()
        .discovery()
        .iter()
        .map(ElementName::as_str)
        .collect();
    assert_eq!(names, PRIMITIVES.to_vec());
    assert!(session.game().table().is_empty());

    let saves = remote.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saved_names(&saves[0]), PRIMITIVES.to_vec());
    assert!(!LocalProgress::new(store).load().discovered.contains("steam"));
}

#[tokio::test]
async fn test_oversized_save_is_skipped() {
    let store = MemoryStore::new();
    let discovered = alchemy_core::DiscoverySet::from_names(
        (0..2000).map(|i| ElementName::from(format!("element-number-{i}"))),
    );
    LocalProgress::new(store.clone())
        .save_discovered(&discovered)
        .expect("seed discoveries");

    let remote = RecordingRemote::new(primitives_only());
    remote.release();
    let mut session = open(&store, remote.clone());
    session.settle_fetch().await;
    session.finish().await;

    // The merge wanted to push the local names, but the body is too large.
    assert_eq!(session.sync().status(), SyncStatus::Idle);
    assert!(remote.saves().is_empty());
    assert_eq!(LocalProgress::new(store).load().discovered.len(), 2004);
}

#[tokio::test]
async fn test_table_edits_while_loading_are_saved() {
    let store = seeded_store();
    let remote = RecordingRemote::new(primitives_only());
    let mut session = open(&store, remote.clone());

    drag(&mut session, (100.0, 100.0), (300.0, 300.0), 0);
    remote.release();
    session.settle_fetch().await;
    assert!(session.sync().next_deadline_ms().is_some());
    assert!(remote.saves().is_empty());

    session.finish().await;
    let saves = remote.saves();
    assert_eq!(saves.len(), 1);
    let water = saves[0]
        .table_tokens
        .iter()
        .find(|token| token.name.as_str() == "water")
        .expect("water saved");
    assert!((water.x - 300.0).abs() < 1e-3);
}

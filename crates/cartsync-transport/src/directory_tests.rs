use super::*;
use cartsync_config::DEFAULT_IGNORE_LIST;
use cartsync_session::{LogLevel, MemoryLog};
use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind};
use std::sync::Mutex;
use tempfile::tempdir;

/// Records what the transport asked and answers with a fixed list.
#[derive(Default)]
struct RecordingAdvisor {
    answer: Vec<String>,
    asked: Mutex<Vec<(Vec<String>, Vec<String>)>>,
}

impl RecordingAdvisor {
    fn answering(answer: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.iter().map(|s| s.to_string()).collect(),
            asked: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CleanupAdvisor for RecordingAdvisor {
    async fn ask_clean_cartridge(&self, remote: &[String], local: &[String]) -> Vec<String> {
        self.asked
            .lock()
            .unwrap()
            .push((remote.to_vec(), local.to_vec()));
        self.answer.clone()
    }
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn options(clean_on_start: bool) -> UploadOptions {
    UploadOptions {
        clean_on_start,
        ignore_list: DEFAULT_IGNORE_LIST.iter().map(|s| s.to_string()).collect(),
        debounce: Duration::from_millis(20),
    }
}

fn config_for(cartridges: &[&Path]) -> UploadConfig {
    UploadConfig {
        cartridge: Some(
            cartridges
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        ),
        ..UploadConfig::default()
    }
}

#[tokio::test]
async fn test_missing_sandbox_is_target_unavailable() {
    let dir = tempdir().unwrap();
    let transport = DirectoryTransport::new(dir.path().join("no-sandbox"));
    let result = transport
        .init(
            UploadConfig::default(),
            Arc::new(MemoryLog::new()),
            options(false),
            RecordingAdvisor::answering(&[]),
        )
        .await;

    let err = result.err().expect("init must fail");
    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::TargetUnavailable(_))
    ));
}

#[tokio::test]
async fn test_invalid_ignore_pattern_fails_start() {
    let dir = tempdir().unwrap();
    let mut opts = options(false);
    opts.ignore_list = vec!["(".to_string()];
    let result = DirectoryTransport::new(dir.path())
        .init(
            UploadConfig::default(),
            Arc::new(MemoryLog::new()),
            opts,
            RecordingAdvisor::answering(&[]),
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_initial_upload_mirrors_into_code_version() {
    let dir = tempdir().unwrap();
    let sandbox = dir.path().join("sandbox");
    std::fs::create_dir_all(&sandbox).unwrap();
    let app_core = dir.path().join("ws/cartridges/app_core");
    write(&app_core.join("cartridge/app.js"), "ok");
    write(&app_core.join("node_modules/dep/index.js"), "skip");

    let mut config = config_for(&[&app_core]);
    config.code_version = Some("release_2".to_string());
    let log = Arc::new(MemoryLog::new());
    let advisor = RecordingAdvisor::answering(&[]);
    let mut session = DirectoryTransport::new(&sandbox)
        .init(config, log.clone(), options(false), advisor.clone())
        .await
        .unwrap();

    assert!(sandbox.join("release_2/app_core/cartridge/app.js").is_file());
    assert!(!sandbox.join("release_2/app_core/node_modules").exists());
    assert!(advisor.asked.lock().unwrap().is_empty());
    assert!(log.contains("1 file(s) copied"));

    session.stop();
    tokio::time::timeout(Duration::from_secs(5), session.closed())
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_clean_on_start_deletes_advised_names_only() {
    let dir = tempdir().unwrap();
    let sandbox = dir.path().join("sandbox");
    let version_dir = sandbox.join("version1");
    write(&version_dir.join("old_cartridge/x.js"), "stale");
    write(&version_dir.join("app_core/x.js"), "stale");
    write(&version_dir.join("release.zip"), "archive");
    let app_core = dir.path().join("ws/app_core");
    write(&app_core.join("x.js"), "fresh");

    let log = Arc::new(MemoryLog::new());
    let advisor = RecordingAdvisor::answering(&["old_cartridge", "../escape"]);
    let _session = DirectoryTransport::new(&sandbox)
        .init(config_for(&[&app_core]), log.clone(), options(true), advisor.clone())
        .await
        .unwrap();

    let asked = advisor.asked.lock().unwrap().clone();
    assert_eq!(asked.len(), 1);
    assert_eq!(asked[0].0, vec!["app_core", "old_cartridge", "release.zip"]);
    assert_eq!(asked[0].1, vec!["app_core"]);

    assert!(!version_dir.join("old_cartridge").exists());
    assert!(version_dir.join("release.zip").is_file());
    assert_eq!(
        std::fs::read_to_string(version_dir.join("app_core/x.js")).unwrap(),
        "fresh"
    );
    assert!(log.contains("Removed remote cartridge 'old_cartridge'"));
    let warnings = log.lines_at(LogLevel::Warn);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("../escape"));
}

#[tokio::test]
async fn test_watcher_uploads_changes_until_stopped() {
    let dir = tempdir().unwrap();
    let sandbox = dir.path().join("sandbox");
    std::fs::create_dir_all(&sandbox).unwrap();
    let app_core = dir.path().join("ws/app_core");
    write(&app_core.join("x.js"), "v1");

    let mut session = DirectoryTransport::new(&sandbox)
        .init(
            config_for(&[&app_core]),
            Arc::new(MemoryLog::new()),
            options(false),
            RecordingAdvisor::answering(&[]),
        )
        .await
        .unwrap();

    write(&app_core.join("x.js"), "v2");
    let target = sandbox.join("version1/app_core/x.js");
    tokio::time::timeout(Duration::from_secs(5), async {
        while std::fs::read_to_string(&target).unwrap_or_default() != "v2" {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("change was not uploaded");

    session.stop();
    tokio::time::timeout(Duration::from_secs(5), session.closed())
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_code_version_outside_sandbox_is_refused() {
    let dir = tempdir().unwrap();
    let sandbox = dir.path().join("sandbox");
    std::fs::create_dir_all(&sandbox).unwrap();
    let outside = dir.path().join("outside");
    write(&outside.join("precious/keep.txt"), "keep");
    let app_core = dir.path().join("ws/app_core");
    write(&app_core.join("x.js"), "x");

    let absolute = outside.to_string_lossy().into_owned();
    for code_version in ["../outside", absolute.as_str(), "a/b", ".."] {
        let mut config = config_for(&[&app_core]);
        config.code_version = Some(code_version.to_string());
        let advisor = RecordingAdvisor::answering(&["precious"]);
        let result = DirectoryTransport::new(&sandbox)
            .init(config, Arc::new(MemoryLog::new()), options(true), advisor.clone())
            .await;

        let err = result.err().expect("init must fail");
        assert!(
            matches!(
                err.downcast_ref::<SyncError>(),
                Some(SyncError::UnsafeCodeVersion(v)) if v == code_version
            ),
            "{code_version} should be refused"
        );
        assert!(advisor.asked.lock().unwrap().is_empty());
    }
    assert!(outside.join("precious/keep.txt").is_file());
    assert!(!outside.join("app_core").exists());
    assert!(!dir.path().join("a").exists());
}

fn job_for(cartridges: &[&Path]) -> MirrorJob {
    MirrorJob {
        cartridges: cartridges.iter().map(|p| p.to_path_buf()).collect(),
        version_dir: PathBuf::from("/sandbox/version1"),
        ignore: Arc::new(compile_ignore_list(&options(false).ignore_list).unwrap()),
    }
}

#[test]
fn test_dirty_cartridges_maps_events_to_owners() {
    let app_core = Path::new("/ws/cartridges/app_core");
    let int_pay = Path::new("/ws/cartridges/int_pay");
    let job = job_for(&[app_core, int_pay]);

    let edit = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
        .add_path(app_core.join("cartridge/app.js"));
    assert_eq!(job.dirty_cartridges(Ok(edit)), vec![app_core.to_path_buf()]);

    let created = Event::new(EventKind::Create(CreateKind::File))
        .add_path(int_pay.join("pay.js"))
        .add_path(app_core.join("b.js"));
    assert_eq!(job.dirty_cartridges(Ok(created)).len(), 2);

    let ignored = Event::new(EventKind::Create(CreateKind::File))
        .add_path(app_core.join("node_modules/dep/index.js"));
    assert!(job.dirty_cartridges(Ok(ignored)).is_empty());

    let read = Event::new(EventKind::Access(AccessKind::Read)).add_path(app_core.join("a.js"));
    assert!(job.dirty_cartridges(Ok(read)).is_empty());

    let elsewhere = Event::new(EventKind::Create(CreateKind::File))
        .add_path(PathBuf::from("/ws/cartridges/app_core_old/a.js"));
    assert!(job.dirty_cartridges(Ok(elsewhere)).is_empty());
}

#[test]
fn test_dirty_cartridges_rescans_everything_on_overflow() {
    let app_core = Path::new("/ws/app_core");
    let int_pay = Path::new("/ws/int_pay");
    let job = job_for(&[app_core, int_pay]);

    assert_eq!(job.dirty_cartridges(Ok(Event::new(EventKind::Other))).len(), 2);
    assert_eq!(
        job.dirty_cartridges(Err(notify::Error::generic("queue overflow"))).len(),
        2
    );
}

#[tokio::test]
async fn test_ignored_edits_are_not_uploaded() {
    let dir = tempdir().unwrap();
    let sandbox = dir.path().join("sandbox");
    std::fs::create_dir_all(&sandbox).unwrap();
    let app_core = dir.path().join("ws/app_core");
    write(&app_core.join("x.js"), "v1");
    std::fs::create_dir_all(app_core.join("node_modules")).unwrap();

    let log = Arc::new(MemoryLog::new());
    let mut session = DirectoryTransport::new(&sandbox)
        .init(
            config_for(&[&app_core]),
            log.clone(),
            options(false),
            RecordingAdvisor::answering(&[]),
        )
        .await
        .unwrap();

    write(&app_core.join("node_modules/dep.js"), "skip");
    write(&app_core.join("y.js"), "new");
    let target = sandbox.join("version1/app_core/y.js");
    tokio::time::timeout(Duration::from_secs(5), async {
        while !target.is_file() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("new file was not uploaded");
    assert!(!sandbox.join("version1/app_core/node_modules").exists());

    session.stop();
    tokio::time::timeout(Duration::from_secs(5), session.closed())
        .await
        .unwrap()
        .unwrap();
}

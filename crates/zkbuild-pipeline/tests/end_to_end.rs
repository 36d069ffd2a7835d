//! Driver and pipeline against an in-memory toolchain runtime.

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use zkbuild_core::config::{Config, TeardownPolicy};
use zkbuild_core::preprocess::NoExpander;
use zkbuild_core::{BuildError, Stage, StreamCapture};
use zkbuild_docker::{ContainerRuntime, ContainerSession, ExecStatus, RuntimeError, SessionState};
use zkbuild_pipeline::{Driver, Outcome, Pipeline};

const CIRCUIT: &str = "def main(private field a, field b) -> (field):\n  a == b\n  return 1\n";

const VERIFIER: &str = r#"
contract Verifier {
    function verifyingKey() pure internal returns (VerifyingKey memory vk) {
        vk.h = Pairing.G2Point([0x1, 0x2], [0x3, 0x4]);
        vk.g_alpha = Pairing.G1Point(0x5, 0x6);
        vk.query = new Pairing.G1Point[](1);
        vk.query[0] = Pairing.G1Point(0x7, 0x8);
    }
}
"#;

#[derive(Default)]
struct Log {
    started: Vec<PathBuf>,
    commands: Vec<String>,
    stopped: Vec<(String, bool)>,
}

/// Simulates the toolchain: the copy stage drops artifacts into the mount.
#[derive(Clone, Default)]
struct FakeToolchain {
    log: Arc<Mutex<Log>>,
    panic_on: Option<&'static str>,
    verifier: Option<&'static str>,
}

impl FakeToolchain {
    fn log(&self) -> std::sync::MutexGuard<'_, Log> {
        self.log.lock().unwrap()
    }
}

#[async_trait]
impl ContainerRuntime for FakeToolchain {
    async fn start(&self, mount: &Path) -> Result<ContainerSession, RuntimeError> {
        let mut log = self.log();
        log.started.push(mount.to_path_buf());
        let id = format!("{:064x}", log.started.len());
        Ok(ContainerSession::new(id, mount, SessionState::Running))
    }

    async fn exec(
        &self,
        session: &ContainerSession,
        command: &str,
        capture: &mut StreamCapture,
    ) -> Result<ExecStatus, RuntimeError> {
        self.log().commands.push(command.to_owned());
        let stage = if command.contains("export-verifier") {
            "export-verifier"
        } else if command.contains(" setup ") {
            "setup"
        } else if command.contains(" compile ") {
            "compile"
        } else {
            "copy"
        };

        if self.panic_on == Some(stage) {
            capture.push_str("thread 'main' panicked at 'insufficient memory'");
            return Ok(ExecStatus { code: Some(0) });
        }

        match stage {
            "compile" => capture.push_str("Compiling source.code\nNumber of constraints: 3\n"),
            "setup" => capture.push_str("Performing setup...\n"),
            "export-verifier" => capture.push_str("Exporting verifier...\nFinished exporting verifier.\n"),
            _ => {
                let dir = session.mount();
                for f in ["out", "proving.key", "verification.key", "variables.inf"] {
                    fs::write(dir.join(f), f)?;
                }
                fs::write(dir.join("verifier.sol"), self.verifier.unwrap_or(VERIFIER))?;
            }
        }
        Ok(ExecStatus { code: Some(0) })
    }

    async fn stop(
        &self,
        session: &mut ContainerSession,
        force_kill: bool,
    ) -> Result<(), RuntimeError> {
        self.log().stopped.push((session.id().to_owned(), force_kill));
        session.set_state(SessionState::Killed);
        Ok(())
    }
}

fn write(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn driver(rt: FakeToolchain, cfg: &Config) -> Driver<FakeToolchain> {
    Driver::new(Pipeline::new(rt, cfg), Box::new(NoExpander))
}

#[tokio::test]
async fn unsupported_backend_fails_alone_without_build_dir() {
    let code = tempfile::tempdir().unwrap();
    let build = tempfile::tempdir().unwrap();
    write(&code.path().join("a/gm17/main.code"), CIRCUIT);
    write(&code.path().join("b/pghr13/main.code"), CIRCUIT);

    let rt = FakeToolchain::default();
    let summary = driver(rt.clone(), &Config::default())
        .setup(code.path(), build.path())
        .await
        .unwrap();

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 1);
    assert!(!summary.is_success());

    let a = &summary.reports[0];
    match &a.outcome {
        Outcome::Built(set) => {
            assert!(set.missing().is_empty(), "missing {:?}", set.missing());
            assert_eq!(set.vk_document(), build.path().join("a/gm17/gm17-vk.json"));
        }
        Outcome::Failed(e) => panic!("a failed: {e}"),
    }

    let b = &summary.reports[1];
    assert!(matches!(b.error(), Some(BuildError::UnsupportedBackend { .. })));
    assert_eq!(b.failed_stage(), Some(Stage::Backend));
    assert!(!build.path().join("b").exists());

    let log = rt.log();
    assert_eq!(log.started, vec![build.path().join("a/gm17")]);
    assert!(log.stopped.is_empty(), "keep policy leaves the container running");
}

#[tokio::test]
async fn vk_document_has_contract_fields() {
    let code = tempfile::tempdir().unwrap();
    let build = tempfile::tempdir().unwrap();
    let src = code.path().join("gm17/main.code");
    write(&src, CIRCUIT);
    let out = build.path().join("transfer");

    let summary = driver(FakeToolchain::default(), &Config::default())
        .setup(&src, &out)
        .await
        .unwrap();
    assert!(summary.is_success());

    let doc: serde_json::Value =
        serde_json::from_slice(&fs::read(out.join("transfer-vk.json")).unwrap()).unwrap();
    assert_eq!(doc["g_alpha"], serde_json::json!(["0x5", "0x6"]));
    assert_eq!(doc["query"][0], serde_json::json!(["0x7", "0x8"]));
    assert_eq!(fs::read(out.join("source.code")).unwrap(), CIRCUIT.as_bytes());
}

#[tokio::test]
async fn stages_run_in_order() {
    let code = tempfile::tempdir().unwrap();
    let build = tempfile::tempdir().unwrap();
    write(&code.path().join("gm17/main.code"), CIRCUIT);

    let rt = FakeToolchain::default();
    driver(rt.clone(), &Config::default())
        .setup(code.path(), build.path())
        .await
        .unwrap();

    let log = rt.log();
    assert_eq!(log.commands.len(), 4);
    assert!(log.commands[0].contains(" compile -i /home/zokrates/code/source.code"));
    assert!(log.commands[1].contains(" setup --proving-scheme gm17"));
    assert!(log.commands[2].contains(" export-verifier --proving-scheme gm17"));
    assert!(log.commands[3].contains("cp out proving.key"));
}

#[tokio::test]
async fn delete_policy_kills_container_after_success() {
    let code = tempfile::tempdir().unwrap();
    let build = tempfile::tempdir().unwrap();
    write(&code.path().join("gm17/main.code"), CIRCUIT);

    let mut cfg = Config::default();
    cfg.pipeline.on_success = TeardownPolicy::Delete;
    let rt = FakeToolchain::default();
    let summary = driver(rt.clone(), &cfg)
        .setup(code.path(), build.path())
        .await
        .unwrap();

    assert!(summary.is_success());
    let log = rt.log();
    assert_eq!(log.stopped.len(), 1);
    assert!(log.stopped[0].1, "teardown is a forced kill");
}

#[tokio::test]
async fn panicking_stage_fails_task_and_next_task_still_runs() {
    let code = tempfile::tempdir().unwrap();
    let build = tempfile::tempdir().unwrap();
    write(&code.path().join("a/gm17/main.code"), CIRCUIT);
    write(&code.path().join("b/gm17/main.code"), CIRCUIT);

    let rt = FakeToolchain {
        panic_on: Some("setup"),
        ..FakeToolchain::default()
    };
    let summary = driver(rt.clone(), &Config::default())
        .setup(code.path(), build.path())
        .await
        .unwrap();

    assert_eq!(summary.failed(), 2);
    for report in &summary.reports {
        match report.error() {
            Some(BuildError::Setup { output }) => {
                assert!(output.starts_with("panicked at 'insufficient memory'"))
            }
            other => panic!("expected setup failure, got {other:?}"),
        }
    }

    let log = rt.log();
    assert_eq!(log.started.len(), 2, "second task ran after the first failed");
    assert_eq!(log.stopped.len(), 2, "failed tasks always tear down");
    assert!(log.stopped.iter().all(|(_, force)| *force));
    assert!(!log.commands.iter().any(|c| c.contains("export-verifier")));
    assert!(build.path().join("a/gm17/source.code").exists(), "partial output is kept");
}

#[tokio::test]
async fn populated_build_dir_is_refused_before_launch() {
    let code = tempfile::tempdir().unwrap();
    let build = tempfile::tempdir().unwrap();
    write(&code.path().join("gm17/main.code"), CIRCUIT);
    write(&build.path().join("gm17/out"), "previous");

    let rt = FakeToolchain::default();
    let summary = driver(rt.clone(), &Config::default())
        .setup(code.path(), build.path())
        .await
        .unwrap();

    assert_eq!(summary.reports[0].failed_stage(), Some(Stage::Guard));
    assert!(!build.path().join("gm17/source.code").exists());
    assert_eq!(fs::read_to_string(build.path().join("gm17/out")).unwrap(), "previous");
    assert!(rt.log().started.is_empty());
}

#[tokio::test]
async fn import_directive_fails_before_launch() {
    let code = tempfile::tempdir().unwrap();
    let build = tempfile::tempdir().unwrap();
    write(
        &code.path().join("gm17/main.code"),
        &format!("import \"foo.code\"\n{CIRCUIT}"),
    );

    let rt = FakeToolchain::default();
    let summary = driver(rt.clone(), &Config::default())
        .setup(code.path(), build.path())
        .await
        .unwrap();

    assert!(matches!(
        summary.reports[0].error(),
        Some(BuildError::UnsupportedImport { .. })
    ));
    assert!(rt.log().started.is_empty());
}

#[tokio::test]
async fn missing_key_fails_task_but_keeps_artifacts() {
    let code = tempfile::tempdir().unwrap();
    let build = tempfile::tempdir().unwrap();
    write(&code.path().join("gm17/main.code"), CIRCUIT);

    let rt = FakeToolchain {
        verifier: Some("contract Verifier {}"),
        ..FakeToolchain::default()
    };
    let summary = driver(rt.clone(), &Config::default())
        .setup(code.path(), build.path())
        .await
        .unwrap();

    assert_eq!(summary.reports[0].failed_stage(), Some(Stage::ExtractKey));
    assert!(build.path().join("gm17/proving.key").exists());
    assert!(!build.path().join("gm17/gm17-vk.json").exists());
    assert_eq!(rt.log().stopped.len(), 1);
}

#[tokio::test]
async fn summary_lines_serialize() {
    let code = tempfile::tempdir().unwrap();
    let build = tempfile::tempdir().unwrap();
    write(&code.path().join("pghr13/main.code"), CIRCUIT);

    let summary = driver(FakeToolchain::default(), &Config::default())
        .setup(code.path(), build.path())
        .await
        .unwrap();
    let json = serde_json::to_value(summary.lines()).unwrap();
    assert_eq!(json[0]["stage"], "backend");
    assert!(json[0]["error"].as_str().unwrap().contains("pghr13"));
}

#[test]
fn connect_hint_uses_configured_runtime() {
    let mut cfg = Config::default();
    assert_eq!(
        Pipeline::new(FakeToolchain::default(), &cfg).connect_command("abc"),
        "docker exec -ti abc bash"
    );

    cfg.toolchain.docker = "podman".into();
    let pipeline = Pipeline::new(FakeToolchain::default(), &cfg);
    assert_eq!(pipeline.connect_command("abc"), "podman exec -ti abc bash");
}

#[tokio::test]
async fn missing_code_path_is_an_empty_run() {
    let build = tempfile::tempdir().unwrap();
    let rt = FakeToolchain::default();
    let summary = driver(rt.clone(), &Config::default())
        .setup(build.path().join("no-such-code"), build.path())
        .await
        .unwrap();

    assert!(summary.reports.is_empty());
    assert!(summary.is_success());
    assert!(rt.log().started.is_empty());
}

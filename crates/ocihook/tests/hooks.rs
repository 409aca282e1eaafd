// End-to-end hook execution against real processes.
// Hooks are `/bin/sh` running a script from a tempdir, so no executable
// files need to be written during the test run.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ocihook::{
    Hook, HookContext, HookErrorKind, Hooks, Spec, Stage, post_start_hooks, post_stop_hooks,
    pre_start_hooks, run_hook,
};
use tokio_util::sync::CancellationToken;

const TEST_KEY: &str = "test-key";
const TEST_CONTAINER_ID: &str = "test-container-id";
const TEST_CONTROLLER_ID: &str = "test-controller-id";
const TEST_BUNDLE: &str = "/test/bundle";
const TEST_SANDBOX_ID: &str = "test-sandbox-id";

/// Mock hook: checks its arguments and the bundle in the state on stdin,
/// then optionally sleeps for `$3` seconds.
const MOCK_HOOK: &str = r#"
[ "$1" = "test-container-id" ] || { echo "bad container id: $1" >&2; exit 1; }
[ "$2" = "test-controller-id" ] || { echo "bad controller id: $2" >&2; exit 1; }
state=$(cat)
case "$state" in
  *'"bundle":"/test/bundle"'*) ;;
  *) echo "unexpected state: $state" >&2; exit 2 ;;
esac
if [ -n "$3" ]; then sleep "$3"; fi
exit 0
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write script");
    path
}

fn create_hook(script: &Path, timeout: i64) -> Hook {
    let hook = Hook::new("/bin/sh")
        .with_args([
            TEST_KEY.to_string(),
            script.display().to_string(),
            TEST_CONTAINER_ID.to_string(),
            TEST_CONTROLLER_ID.to_string(),
        ])
        .with_inherited_env();
    if timeout == 0 {
        hook
    } else {
        hook.with_timeout(timeout)
    }
}

fn create_wrong_hook(script: &Path) -> Hook {
    Hook::new("/bin/sh")
        .with_args([TEST_KEY.to_string(), script.display().to_string(), "wrong-args".to_string()])
        .with_inherited_env()
}

fn spec_for(stage: Stage, hook: Hook) -> Spec {
    let mut hooks = Hooks::default();
    match stage {
        Stage::Prestart => hooks.prestart = Some(vec![hook]),
        Stage::Poststart => hooks.poststart = Some(vec![hook]),
        Stage::Poststop => hooks.poststop = Some(vec![hook]),
    }
    Spec {
        hooks: Some(hooks),
        ..Spec::default()
    }
}

async fn run_stage(stage: Stage, spec: &Spec, id: &str, bundle: &str) -> ocihook::HookResult<()> {
    let ctx = HookContext::new().with_pid(std::process::id());
    match stage {
        Stage::Prestart => pre_start_hooks(&ctx, spec, id, bundle).await,
        Stage::Poststart => post_start_hooks(&ctx, spec, id, bundle).await,
        Stage::Poststop => post_stop_hooks(&ctx, spec, id, bundle).await,
    }
}

#[tokio::test]
async fn run_hook_without_timeout_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "hook.sh", MOCK_HOOK);

    let hook = create_hook(&script, 0);
    run_hook(&HookContext::new(), Stage::Prestart, &hook, TEST_SANDBOX_ID, TEST_BUNDLE)
        .await
        .expect("hook without timeout should succeed");
}

#[tokio::test]
async fn run_hook_with_timeout_succeeds_when_fast() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "hook.sh", MOCK_HOOK);

    let hook = create_hook(&script, 1);
    run_hook(&HookContext::new(), Stage::Prestart, &hook, TEST_SANDBOX_ID, TEST_BUNDLE)
        .await
        .expect("hook finishing within its timeout should succeed");
}

#[tokio::test]
async fn run_hook_timeout_failure() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "hook.sh", MOCK_HOOK);

    let mut hook = create_hook(&script, 1);
    hook.args.push("2".to_string());
    let start = Instant::now();
    let err = run_hook(&HookContext::new(), Stage::Prestart, &hook, TEST_SANDBOX_ID, TEST_BUNDLE)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), HookErrorKind::Timeout);
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn run_hook_wrong_args_fails() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "hook.sh", MOCK_HOOK);

    let err = run_hook(
        &HookContext::new(),
        Stage::Prestart,
        &create_wrong_hook(&script),
        TEST_SANDBOX_ID,
        TEST_BUNDLE,
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), HookErrorKind::NonZeroExit);
    match err {
        ocihook::HookError::NonZeroExit { stderr, .. } => {
            assert!(stderr.contains("bad container id"), "stderr: {stderr}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn run_hook_missing_binary_is_launch_failure() {
    let hook = Hook::new("/nonexistent/path/to/hook_abc123").with_timeout(1);
    let err = run_hook(&HookContext::new(), Stage::Prestart, &hook, TEST_SANDBOX_ID, TEST_BUNDLE)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HookErrorKind::LaunchFailure);
}

#[tokio::test]
async fn run_hook_non_executable_is_launch_failure() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "not-executable", "#!/bin/sh\nexit 0\n");
    let err = run_hook(
        &HookContext::new(),
        Stage::Prestart,
        &Hook::new(&script),
        TEST_SANDBOX_ID,
        TEST_BUNDLE,
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), HookErrorKind::LaunchFailure);
}

#[tokio::test]
async fn run_hook_receives_declared_env_only() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        "env.sh",
        "[ \"$HOOK_VAR\" = configured ] && [ -z \"$HOME\" ]\n",
    );
    let hook = Hook::new("/bin/sh")
        .with_args(["sh".to_string(), script.display().to_string()])
        .with_env(["HOOK_VAR=configured"]);

    run_hook(&HookContext::new(), Stage::Poststart, &hook, TEST_SANDBOX_ID, TEST_BUNDLE)
        .await
        .expect("hook should see exactly its declared environment");
}

#[tokio::test]
async fn run_hook_state_carries_status_and_pid() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        "state.sh",
        r#"state=$(cat)
case "$state" in
  *'"status":"running"'*'"pid":4242'*) exit 0 ;;
  *) echo "$state" >&2; exit 1 ;;
esac
"#,
    );
    let hook = Hook::new("/bin/sh").with_args(["sh".to_string(), script.display().to_string()]);
    let ctx = HookContext::new().with_pid(4242);

    run_hook(&ctx, Stage::Poststart, &hook, TEST_SANDBOX_ID, TEST_BUNDLE)
        .await
        .expect("state should report running status and pid");
}

#[cfg(unix)]
#[tokio::test]
async fn timeout_kills_hook_descendants() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("descendant-survived");
    let script = write_script(
        dir.path(),
        "fork.sh",
        &format!("(sleep 2; touch '{}') &\nsleep 30\n", marker.display()),
    );
    let hook = Hook::new("/bin/sh")
        .with_args(["sh".to_string(), script.display().to_string()])
        .with_timeout(1);

    let err = run_hook(&HookContext::new(), Stage::Prestart, &hook, TEST_SANDBOX_ID, TEST_BUNDLE)
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!marker.exists(), "descendant outlived the timed-out hook");
}

#[tokio::test]
async fn caller_cancellation_kills_running_hook() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "hook.sh", MOCK_HOOK);
    let mut hook = create_hook(&script, 0);
    hook.args.push("30".to_string());

    let token = CancellationToken::new();
    let ctx = HookContext::new().with_cancellation(token.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();
    });

    let start = Instant::now();
    let err = run_hook(&ctx, Stage::Prestart, &hook, TEST_SANDBOX_ID, TEST_BUNDLE)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HookErrorKind::Cancelled);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn stage_hooks_field_absent() {
    let spec = Spec::default();
    for stage in Stage::ALL {
        run_stage(stage, &spec, "", "")
            .await
            .expect("absent hooks should be a no-op");
    }
}

#[tokio::test]
async fn stage_hooks_list_empty() {
    let spec = Spec {
        hooks: Some(Hooks::default()),
        ..Spec::default()
    };
    for stage in Stage::ALL {
        run_stage(stage, &spec, "", "")
            .await
            .expect("empty hooks should be a no-op");
    }
}

#[tokio::test]
async fn stage_runs_well_formed_hook() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "hook.sh", MOCK_HOOK);
    for stage in Stage::ALL {
        let spec = spec_for(stage, create_hook(&script, 0));
        run_stage(stage, &spec, TEST_SANDBOX_ID, TEST_BUNDLE)
            .await
            .unwrap_or_else(|e| panic!("{stage} hook should succeed: {e}"));
    }
}

#[tokio::test]
async fn stage_propagates_wrong_hook_failure() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "hook.sh", MOCK_HOOK);
    for stage in Stage::ALL {
        let spec = spec_for(stage, create_wrong_hook(&script));
        let err = run_stage(stage, &spec, TEST_SANDBOX_ID, TEST_BUNDLE)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), HookErrorKind::NonZeroExit);
    }
}

#[tokio::test]
async fn stage_timeout_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "hook.sh", MOCK_HOOK);
    let mut hook = create_hook(&script, 1);
    hook.args.push("2".to_string());

    let err = run_stage(
        Stage::Prestart,
        &spec_for(Stage::Prestart, hook),
        TEST_SANDBOX_ID,
        TEST_BUNDLE,
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), HookErrorKind::Timeout);
}

#[tokio::test]
async fn stage_fail_fast_skips_later_hooks() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("second-ran");
    let first = write_script(dir.path(), "first.sh", "exit 3\n");
    let second = write_script(
        dir.path(),
        "second.sh",
        &format!("touch '{}'\n", marker.display()),
    );
    let spec = Spec {
        hooks: Some(Hooks {
            prestart: Some(vec![
                Hook::new("/bin/sh").with_args(["sh".to_string(), first.display().to_string()]),
                Hook::new("/bin/sh").with_args(["sh".to_string(), second.display().to_string()]),
            ]),
            ..Hooks::default()
        }),
        ..Spec::default()
    };

    let err = run_stage(Stage::Prestart, &spec, TEST_SANDBOX_ID, TEST_BUNDLE)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HookErrorKind::NonZeroExit);
    assert!(!marker.exists(), "second hook must not start after a failure");
}

#[tokio::test]
async fn stage_hook_sees_spec_annotations() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        "annotations.sh",
        r#"state=$(cat)
case "$state" in
  *'"annotations":{"owner":"ops"}'*) exit 0 ;;
  *) echo "$state" >&2; exit 1 ;;
esac
"#,
    );
    let hook = Hook::new("/bin/sh").with_args(["sh".to_string(), script.display().to_string()]);
    let mut spec = spec_for(Stage::Prestart, hook);
    spec.annotations
        .insert("owner".to_string(), "ops".to_string());

    run_stage(Stage::Prestart, &spec, TEST_SANDBOX_ID, TEST_BUNDLE)
        .await
        .expect("hook should see the bundle annotations on stdin");
}

//! End-to-end adapter scenarios against a scripted GDB
//!
//! The adapter is wired over in-memory duplex pipes; a fake GDB task
//! answers commands from a per-test script and can inject asynchronous
//! records at any point.

use remotedbg_config::AdapterTimeouts;
use remotedbg_core::{
    Breakpoint, BreakpointReason, DebugEvent, Error, Language, StopReason, VariableRef,
};
use remotedbg_mi::gdb::InferiorIo;
use remotedbg_mi::{GdbAdapter, NullCompiler};
use remotedbg_session::{CompileService, Debugger, LaunchParams};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::mpsc;

const WORK_PATH: &str = "/box/u1";

/// Handle to the fake GDB: injected lines go straight to the adapter,
/// `log` records every operation the adapter sent.
struct FakeGdb {
    inject_tx: mpsc::UnboundedSender<String>,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeGdb {
    fn inject(&self, line: &str) {
        self.inject_tx.send(line.to_string()).unwrap();
    }

    fn operations(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

/// Run a fake GDB on `server`, answering each command with
/// `script(operation, args)`; `{token}` in replies is substituted.
fn scripted_gdb<F>(server: DuplexStream, script: F) -> FakeGdb
where
    F: Fn(&str, &str) -> Vec<String> + Send + 'static,
{
    let (inject_tx, mut inject_rx) = mpsc::unbounded_channel::<String>();
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_writer = Arc::clone(&log);

    tokio::spawn(async move {
        let (read, mut write) = tokio::io::split(server);
        let mut lines = BufReader::new(read).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        _ => break,
                    };
                    let dash = match line.find('-') {
                        Some(dash) => dash,
                        None => continue,
                    };
                    let (token, rest) = line.split_at(dash);
                    let rest = &rest[1..];
                    let (operation, args) = match rest.split_once(' ') {
                        Some((op, args)) => (op, args),
                        None => (rest, ""),
                    };
                    log_writer.lock().unwrap().push(operation.to_string());
                    for reply in script(operation, args) {
                        let reply = reply.replace("{token}", token);
                        write.write_all(reply.as_bytes()).await.unwrap();
                        write.write_all(b"\n").await.unwrap();
                    }
                    write.flush().await.unwrap();
                }
                injected = inject_rx.recv() => {
                    let line = match injected {
                        Some(line) => line,
                        None => continue,
                    };
                    write.write_all(line.as_bytes()).await.unwrap();
                    write.write_all(b"\n").await.unwrap();
                    write.flush().await.unwrap();
                }
            }
        }
    });

    FakeGdb {
        inject_tx,
        log,
    }
}

struct Harness {
    adapter: GdbAdapter,
    gdb: FakeGdb,
    events: mpsc::Receiver<DebugEvent>,
    /// Far end of the debuggee terminal
    inferior: DuplexStream,
}

fn harness_with<F>(compiler: Arc<dyn CompileService>, script: F) -> Harness
where
    F: Fn(&str, &str) -> Vec<String> + Send + 'static,
{
    remotedbg_logging::init_test();

    let (mi_client, mi_server) = tokio::io::duplex(16384);
    let (mi_read, mi_write) = tokio::io::split(mi_client);
    let (inferior_client, inferior_server) = tokio::io::duplex(4096);
    let (inferior_read, inferior_write) = tokio::io::split(inferior_client);
    let (events_tx, events_rx) = mpsc::channel(64);

    let timeouts = AdapterTimeouts {
        request_timeout_ms: 1_000,
        ..AdapterTimeouts::default()
    };
    let adapter = GdbAdapter::new(
        mi_read,
        mi_write,
        InferiorIo::new(inferior_read, inferior_write),
        compiler,
        events_tx,
        timeouts,
    );
    let gdb = scripted_gdb(mi_server, script);

    Harness {
        adapter,
        gdb,
        events: events_rx,
        inferior: inferior_server,
    }
}

fn harness<F>(script: F) -> Harness
where
    F: Fn(&str, &str) -> Vec<String> + Send + 'static,
{
    harness_with(Arc::new(NullCompiler::succeeding()), script)
}

fn launch_params() -> LaunchParams {
    LaunchParams {
        language: Language::C,
        sources: vec![PathBuf::from("/box/u1/main.c")],
        work_path: PathBuf::from(WORK_PATH),
        binary_path: PathBuf::from("/box/u1/a.out"),
    }
}

/// Default script: acknowledge everything, with canned payloads for the
/// operations that need them
fn default_script(operation: &str, _args: &str) -> Vec<String> {
    let reply = match operation {
        "break-insert" => r#"{token}^done,bkpt={number="1",line="10"}"#,
        "exec-run" | "exec-continue" | "exec-next" | "exec-step" | "exec-finish" => {
            r"{token}^running"
        }
        _ => r"{token}^done",
    };
    vec![reply.to_string(), "(gdb)".to_string()]
}

async fn next_event(events: &mut mpsc::Receiver<DebugEvent>) -> DebugEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn assert_no_event(events: &mut mpsc::Receiver<DebugEvent>) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    match events.try_recv() {
        Err(_) => {}
        Ok(event) => panic!("unexpected event {:?}", event),
    }
}

/// Launch and wait for the Compile + Launch events
async fn launch(harness: &mut Harness) {
    harness.adapter.launch(launch_params()).await.unwrap();
    assert_eq!(
        next_event(&mut harness.events).await,
        DebugEvent::Compile {
            success: true,
            message: String::new(),
        }
    );
    assert_eq!(
        next_event(&mut harness.events).await,
        DebugEvent::Launch {
            success: true,
            message: String::new(),
        }
    );
}

/// Launch, start, and consume the Continued event for the initial run
async fn launch_and_start(harness: &mut Harness) {
    launch(harness).await;
    harness.adapter.start().await.unwrap();
    harness.gdb.inject(r#"*running,thread-id="all""#);
    assert_eq!(next_event(&mut harness.events).await, DebugEvent::Continued);
}

#[tokio::test]
async fn launch_reports_compile_and_launch_events() {
    let mut harness = harness(default_script);
    launch(&mut harness).await;

    // Startup options are applied before symbols load
    let operations = harness.gdb.operations();
    assert!(operations.contains(&"gdb-set".to_string()));
    assert_eq!(operations.last().unwrap(), "file-exec-and-symbols");
}

#[tokio::test]
async fn failed_compile_skips_gdb_and_allows_relaunch() {
    let mut harness = harness_with(
        Arc::new(NullCompiler::failing("main.c:2: expected ';'")),
        default_script,
    );

    harness.adapter.launch(launch_params()).await.unwrap();
    match next_event(&mut harness.events).await {
        DebugEvent::Compile { success, message } => {
            assert!(!success);
            assert!(message.contains("expected ';'"));
        }
        other => panic!("expected compile event, got {:?}", other),
    }
    assert_no_event(&mut harness.events).await;
    assert!(harness.gdb.operations().is_empty());

    // The failed launch left the adapter ready for another attempt
    harness.adapter.launch(launch_params()).await.unwrap();
}

#[tokio::test]
async fn second_launch_while_loaded_is_rejected() {
    let mut harness = harness(default_script);
    launch(&mut harness).await;

    let err = harness.adapter.launch(launch_params()).await.unwrap_err();
    assert!(matches!(err, Error::State(_)));
}

#[tokio::test]
async fn breakpoints_are_unmasked_registered_and_removed() {
    let mut harness = harness(|operation, args| {
        if operation == "break-insert" {
            assert_eq!(args, "/box/u1/main.c:10");
            vec![r#"{token}^done,bkpt={number="7",line="10"}"#.to_string()]
        } else {
            default_script(operation, args)
        }
    });
    launch(&mut harness).await;

    let bp = Breakpoint::new("/main.c", 10);
    harness.adapter.add_breakpoints(vec![bp.clone()]).await.unwrap();
    assert_eq!(
        next_event(&mut harness.events).await,
        DebugEvent::Breakpoint {
            reason: BreakpointReason::New,
            breakpoints: vec![bp.clone()],
        }
    );

    harness
        .adapter
        .remove_breakpoints(vec![bp.clone()])
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut harness.events).await,
        DebugEvent::Breakpoint {
            reason: BreakpointReason::Removed,
            breakpoints: vec![bp.clone()],
        }
    );

    // The registry entry is gone; removing again is an error
    let err = harness.adapter.remove_breakpoints(vec![bp]).await.unwrap_err();
    assert!(matches!(err, Error::BreakpointNotFound { line: 10, .. }));
}

#[tokio::test]
async fn breakpoint_hit_reports_masked_location() {
    let mut harness = harness(default_script);
    launch_and_start(&mut harness).await;

    // While running, inspection and stepping are rejected
    assert!(matches!(
        harness.adapter.step_over().await.unwrap_err(),
        Error::State(_)
    ));
    assert!(matches!(
        harness.adapter.get_stack_trace().await.unwrap_err(),
        Error::State(_)
    ));

    harness.gdb.inject(
        r#"*stopped,reason="breakpoint-hit",bkptno="1",frame={func="main",fullname="/box/u1/main.c",line="10"}"#,
    );
    assert_eq!(
        next_event(&mut harness.events).await,
        DebugEvent::Stopped {
            reason: StopReason::Breakpoint,
            file: "/main.c".to_string(),
            line: 10,
        }
    );

    // Stopped again, stepping is allowed
    harness.adapter.step_over().await.unwrap();
}

#[tokio::test]
async fn step_outside_workspace_is_silently_corrected() {
    let mut harness = harness(default_script);
    launch_and_start(&mut harness).await;

    // Step lands in libc: no event, a step-out goes to GDB instead
    harness.gdb.inject(
        r#"*stopped,reason="end-stepping-range",frame={func="__printf",fullname="/usr/src/libc/printf.c",line="28"}"#,
    );
    // The correction resumes execution; that running record is swallowed
    harness.gdb.inject(r#"*running,thread-id="all""#);
    // Step-out completes back in user code
    harness.gdb.inject(
        r#"*stopped,reason="function-finished",frame={func="main",fullname="/box/u1/main.c",line="12"}"#,
    );

    assert_eq!(
        next_event(&mut harness.events).await,
        DebugEvent::Stopped {
            reason: StopReason::Step,
            file: "/main.c".to_string(),
            line: 12,
        }
    );
    assert_no_event(&mut harness.events).await;
    assert!(harness.gdb.operations().contains(&"exec-finish".to_string()));
}

#[tokio::test]
async fn rejected_step_out_correction_is_withdrawn() {
    let mut harness = harness(|operation, args| {
        if operation == "exec-finish" {
            vec![
                r#"{token}^error,msg="\"finish\" not meaningful in the outermost frame.""#
                    .to_string(),
            ]
        } else {
            default_script(operation, args)
        }
    });
    launch_and_start(&mut harness).await;

    // Step lands outside the workspace but the step-out is rejected:
    // no running record will ever arrive for the correction
    harness.gdb.inject(
        r#"*stopped,reason="end-stepping-range",frame={func="_start",fullname="/usr/src/libc/start.c",line="40"}"#,
    );
    assert_no_event(&mut harness.events).await;

    // The next genuine resume must not be swallowed by a stale correction
    harness.adapter.continue_exec().await.unwrap();
    harness.gdb.inject(r#"*running,thread-id="all""#);
    assert_eq!(next_event(&mut harness.events).await, DebugEvent::Continued);
}

#[tokio::test]
async fn breakpoint_moved_by_gdb_reports_placed_location() {
    let mut harness = harness(|operation, args| {
        if operation == "break-insert" {
            assert_eq!(args, "/box/u1/main.c:10");
            // Line 10 is not executable; GDB places the breakpoint below
            vec![r#"{token}^done,bkpt={number="3",fullname="/box/u1/main.c",line="12"}"#.to_string()]
        } else {
            default_script(operation, args)
        }
    });
    launch(&mut harness).await;

    harness
        .adapter
        .add_breakpoints(vec![Breakpoint::new("/main.c", 10)])
        .await
        .unwrap();
    let placed = Breakpoint::new("/main.c", 12);
    assert_eq!(
        next_event(&mut harness.events).await,
        DebugEvent::Breakpoint {
            reason: BreakpointReason::New,
            breakpoints: vec![placed.clone()],
        }
    );

    // The registry tracks where GDB placed it, not where it was requested
    let err = harness
        .adapter
        .remove_breakpoints(vec![Breakpoint::new("/main.c", 10)])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BreakpointNotFound { line: 10, .. }));
    harness.adapter.remove_breakpoints(vec![placed]).await.unwrap();
}

#[tokio::test]
async fn failed_insert_mid_list_keeps_completed_entries_visible() {
    let mut harness = harness(|operation, args| {
        if operation == "break-insert" {
            if args.contains("missing.c") {
                vec![r#"{token}^error,msg="No source file named missing.c.""#.to_string()]
            } else {
                vec![
                    r#"{token}^done,bkpt={number="1",fullname="/box/u1/main.c",line="10"}"#
                        .to_string(),
                ]
            }
        } else {
            default_script(operation, args)
        }
    });
    launch(&mut harness).await;

    let err = harness
        .adapter
        .add_breakpoints(vec![
            Breakpoint::new("/main.c", 10),
            Breakpoint::new("/missing.c", 5),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Adapter(_)));

    // The acknowledged insert was announced before the failure, so
    // clients and the registry agree on what is placed
    assert_eq!(
        next_event(&mut harness.events).await,
        DebugEvent::Breakpoint {
            reason: BreakpointReason::New,
            breakpoints: vec![Breakpoint::new("/main.c", 10)],
        }
    );
    assert_no_event(&mut harness.events).await;
    assert_eq!(harness.adapter.breakpoint_count(), 1);
}

#[tokio::test]
async fn debuggee_exit_reports_code() {
    let mut harness = harness(default_script);
    launch_and_start(&mut harness).await;

    // GDB reports exit codes in octal
    harness.gdb.inject(r#"*stopped,reason="exited",exit-code="012""#);
    assert_eq!(
        next_event(&mut harness.events).await,
        DebugEvent::Exited { exit_code: 10 }
    );
}

#[tokio::test]
async fn normal_exit_reports_code_zero() {
    let mut harness = harness(default_script);
    launch_and_start(&mut harness).await;

    harness.gdb.inject(r#"*stopped,reason="exited-normally""#);
    assert_eq!(
        next_event(&mut harness.events).await,
        DebugEvent::Exited { exit_code: 0 }
    );
}

#[tokio::test]
async fn debuggee_terminal_round_trip() {
    let mut harness = harness(default_script);
    launch_and_start(&mut harness).await;

    // Output side: bytes from the debuggee become Output events
    harness.inferior.write_all(b"hello\n").await.unwrap();
    harness.inferior.flush().await.unwrap();
    assert_eq!(
        next_event(&mut harness.events).await,
        DebugEvent::Output {
            output: "hello\n".to_string(),
        }
    );

    // Input side: console input reaches the debuggee with a newline
    harness.adapter.send_to_console("42").await.unwrap();
    let mut buf = [0u8; 8];
    let n = harness.inferior.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"42\n");
}

#[tokio::test]
async fn stack_trace_masks_and_filters_frames() {
    let mut harness = harness(|operation, args| {
        if operation == "stack-list-frames" {
            vec![concat!(
                r#"{token}^done,stack=["#,
                r#"frame={level="0",func="helper",fullname="/box/u1/util.c",line="3"},"#,
                r#"frame={level="1",func="main",fullname="/box/u1/main.c",line="9"},"#,
                r#"frame={level="2",func="__libc_start_main",fullname="/usr/src/libc/start.c",line="308"}]"#,
            )
            .to_string()]
        } else {
            default_script(operation, args)
        }
    });
    launch(&mut harness).await;

    let frames = harness.adapter.get_stack_trace().await.unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].name, "helper");
    assert_eq!(frames[0].path, "/util.c");
    assert_eq!(frames[1].id, 1);
    assert_eq!(frames[1].path, "/main.c");
    assert_eq!(frames[1].line, 9);
}

#[tokio::test]
async fn frame_variables_classify_references() {
    let mut harness = harness(|operation, args| match operation {
        "thread-info" => {
            vec![r#"{token}^done,threads=[],current-thread-id="1""#.to_string()]
        }
        "stack-list-variables" => {
            assert!(args.contains("--thread 1"));
            assert!(args.contains("--frame 0"));
            vec![concat!(
                r#"{token}^done,variables=["#,
                r#"{name="count",type="int",value="42"},"#,
                r#"{name="buf",type="char [16]"},"#,
                r#"{name="node",type="struct node *",value="0x55555555a2a0"},"#,
                r#"{name="text",type="char *",value="0x400566 \"hi\""},"#,
                r#"{name="nothing",type="int *",value="0x0"},"#,
                r#"{name="cs",type="charset_t *",value="0x7000"}]"#,
            )
            .to_string()]
        }
        _ => default_script(operation, args),
    });
    launch(&mut harness).await;

    let variables = harness.adapter.get_frame_variables(0).await.unwrap();
    assert_eq!(variables.len(), 6);

    // Plain scalar: no reference
    assert_eq!(variables[0].name, "count");
    assert_eq!(variables[0].value, "42");
    assert_eq!(variables[0].reference, None);

    // Compound without a value: frame-scoped reference
    assert_eq!(
        variables[1].reference.as_deref(),
        Some(VariableRef::frame(0, "buf").encode().as_str())
    );

    // Non-null struct pointer: pointer-scoped reference
    assert_eq!(
        variables[2].reference.as_deref(),
        Some(
            VariableRef::pointer("struct node *", 0x55555555a2a0, "")
                .encode()
                .as_str()
        )
    );

    // char* prints inline, null pointers cannot be expanded
    assert_eq!(variables[3].reference, None);
    assert_eq!(variables[4].reference, None);

    // A type name containing "char" is still an ordinary pointer
    assert_eq!(
        variables[5].reference.as_deref(),
        Some(VariableRef::pointer("charset_t *", 0x7000, "").encode().as_str())
    );
}

#[tokio::test]
async fn frame_scoped_children_use_scratch_varobj() {
    let mut harness = harness(|operation, args| match operation {
        "var-create" => {
            assert!(args.contains("rdbg_var"));
            assert!(args.contains("buf"));
            vec![r#"{token}^done,name="rdbg_var",numchild="2",type="char [2]""#.to_string()]
        }
        "var-list-children" => vec![concat!(
            r#"{token}^done,numchild="2",children=["#,
            r#"child={name="rdbg_var.0",exp="0",numchild="0",value="104 'h'",type="char"},"#,
            r#"child={name="rdbg_var.1",exp="1",numchild="0",value="105 'i'",type="char"}]"#,
        )
        .to_string()],
        _ => default_script(operation, args),
    });
    launch(&mut harness).await;

    let reference = VariableRef::frame(0, "buf").encode();
    let children = harness.adapter.get_variables(&reference).await.unwrap();

    assert_eq!(children.len(), 2);
    assert_eq!(children[0].name, "0");
    assert_eq!(children[0].value, "104 'h'");
    assert_eq!(children[0].reference, None);

    let operations = harness.gdb.operations();
    assert!(operations.contains(&"stack-select-frame".to_string()));
    // The scratch object never outlives the request
    assert_eq!(operations.last().unwrap(), "var-delete");
}

#[tokio::test]
async fn struct_children_get_member_path_references() {
    let mut harness = harness(|operation, args| match operation {
        "var-create" => {
            vec![r#"{token}^done,name="rdbg_var",numchild="2",type="struct list""#.to_string()]
        }
        "var-list-children" => vec![concat!(
            r#"{token}^done,numchild="2",children=["#,
            r#"child={name="rdbg_var.len",exp="len",numchild="0",value="3",type="int"},"#,
            r#"child={name="rdbg_var.head",exp="head",numchild="1",value="0x5555deadbeef",type="struct node *"}]"#,
        )
        .to_string()],
        _ => default_script(operation, args),
    });
    launch(&mut harness).await;

    let reference = VariableRef::frame(1, "mylist").encode();
    let children = harness.adapter.get_variables(&reference).await.unwrap();

    assert_eq!(children[0].reference, None);
    // Pointer member expands by address, not through the frame
    assert_eq!(
        children[1].reference.as_deref(),
        Some(
            VariableRef::pointer("struct node *", 0x5555deadbeef, "")
                .encode()
                .as_str()
        )
    );
}

#[tokio::test]
async fn pointer_reference_casts_by_address() {
    let mut harness = harness(|operation, args| match operation {
        "var-create" => {
            // The pointee is addressed by a cast, independent of any frame
            assert!(args.contains("(*(int *)0x1234)"));
            vec![r#"{token}^done,name="rdbg_var",numchild="0",value="42",type="int""#.to_string()]
        }
        _ => default_script(operation, args),
    });
    launch(&mut harness).await;

    let reference = VariableRef::pointer("int *", 0x1234, "").encode();
    let variables = harness.adapter.get_variables(&reference).await.unwrap();

    assert_eq!(variables.len(), 1);
    assert_eq!(variables[0].name, "*");
    assert_eq!(variables[0].value, "42");
    assert_eq!(variables[0].reference, None);
    assert_eq!(harness.gdb.operations().last().unwrap(), "var-delete");
}

#[tokio::test]
async fn scratch_varobj_deleted_even_when_listing_fails() {
    let mut harness = harness(|operation, args| match operation {
        "var-create" => {
            vec![r#"{token}^done,name="rdbg_var",numchild="1",type="struct s""#.to_string()]
        }
        "var-list-children" => {
            vec![r#"{token}^error,msg="variable object is out of scope""#.to_string()]
        }
        _ => default_script(operation, args),
    });
    launch(&mut harness).await;

    let reference = VariableRef::frame(0, "s").encode();
    let err = harness.adapter.get_variables(&reference).await.unwrap_err();
    assert!(matches!(err, Error::Adapter(_)));
    assert_eq!(harness.gdb.operations().last().unwrap(), "var-delete");
}

#[tokio::test]
async fn invalid_reference_is_rejected_without_gdb_traffic() {
    let mut harness = harness(default_script);
    launch(&mut harness).await;
    let before = harness.gdb.operations().len();

    let err = harness.adapter.get_variables("v1:huh").await.unwrap_err();
    assert!(matches!(err, Error::InvalidReference(_)));
    assert_eq!(harness.gdb.operations().len(), before);
}

#[tokio::test]
async fn terminate_is_idempotent() {
    let mut harness = harness(default_script);
    launch(&mut harness).await;

    harness.adapter.terminate().await.unwrap();
    assert_eq!(next_event(&mut harness.events).await, DebugEvent::Terminated);

    // Second terminate is a no-op: no error, no second event
    harness.adapter.terminate().await.unwrap();
    assert_no_event(&mut harness.events).await;
    assert_eq!(harness.adapter.breakpoint_count(), 0);
}

#[tokio::test]
async fn concurrent_terminates_emit_one_event() {
    let mut harness = harness(default_script);
    launch(&mut harness).await;

    let adapter = Arc::new(harness.adapter);
    let first = {
        let adapter = Arc::clone(&adapter);
        tokio::spawn(async move { adapter.terminate().await })
    };
    let second = {
        let adapter = Arc::clone(&adapter);
        tokio::spawn(async move { adapter.terminate().await })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(next_event(&mut harness.events).await, DebugEvent::Terminated);
    assert_no_event(&mut harness.events).await;
}

//! MI operation names and adapter constants

// Execution control
pub const EXEC_RUN: &str = "exec-run";
pub const EXEC_CONTINUE: &str = "exec-continue";
pub const EXEC_NEXT: &str = "exec-next";
pub const EXEC_STEP: &str = "exec-step";
pub const EXEC_FINISH: &str = "exec-finish";
pub const EXEC_INTERRUPT: &str = "exec-interrupt";

// Breakpoints
pub const BREAK_INSERT: &str = "break-insert";
pub const BREAK_DELETE: &str = "break-delete";

// Inspection
pub const STACK_LIST_FRAMES: &str = "stack-list-frames";
pub const STACK_LIST_VARIABLES: &str = "stack-list-variables";
pub const STACK_SELECT_FRAME: &str = "stack-select-frame";
pub const THREAD_INFO: &str = "thread-info";

// Variable objects
pub const VAR_CREATE: &str = "var-create";
pub const VAR_DELETE: &str = "var-delete";
pub const VAR_LIST_CHILDREN: &str = "var-list-children";

// Session control
pub const FILE_EXEC_AND_SYMBOLS: &str = "file-exec-and-symbols";
pub const GDB_SET: &str = "gdb-set";
pub const GDB_EXIT: &str = "gdb-exit";
pub const INFERIOR_TTY_SET: &str = "inferior-tty-set";

// Stop reasons reported in *stopped records
pub const REASON_BREAKPOINT_HIT: &str = "breakpoint-hit";
pub const REASON_END_STEPPING_RANGE: &str = "end-stepping-range";
pub const REASON_FUNCTION_FINISHED: &str = "function-finished";
pub const REASON_EXITED_NORMALLY: &str = "exited-normally";
pub const REASON_EXITED: &str = "exited";

/// Name used for transient variable objects; deleted right after use
pub const SCRATCH_VAROBJ: &str = "rdbg_var";

/// Options applied to every GDB process after spawn, before symbols load.
/// Keeps value printing deterministic for client display.
pub const GDB_STARTUP_OPTIONS: &[(&str, &str)] = &[
    ("mi-async", "on"),
    ("print elements", "0"),
    ("print null-stop", "on"),
    ("print repeats", "0"),
    ("print union", "on"),
    ("width", "0"),
    ("confirm", "off"),
];

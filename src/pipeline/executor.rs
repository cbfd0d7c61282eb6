//! Restricted execution of generated plotting code.
//!
//! Code runs in a separate interpreter process under a fixed harness: the
//! Agg backend, an allow-listed set of builtins, an import guard admitting
//! only the configured root modules, and `savefig` neutralised. The harness
//! rasterises the current figure to PNG on stdout; the figure never outlives
//! the child process.
//!
//! This is capability restriction, not a sandbox. The child still runs with
//! the user's privileges.

use super::artifacts::RenderOptions;
use crate::config::ExecutorSettings;
use crate::error::{Result, TyrewiseError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

static DUNDER_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.\s*__\w*").expect("valid dunder attribute pattern"));

static DUNDER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b__\w*").expect("valid dunder name pattern"));

const ALLOWED_DUNDERS: [&str; 2] = ["__name__", "__main__"];

/// Leading bytes of every PNG file.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Shared matplotlib config and font cache, kept across renders.
const MPL_CACHE_DIR: &str = "tyrewise-matplotlib";

const EXIT_RUNTIME: i32 = 1;
const EXIT_SYNTAX: i32 = 2;
const EXIT_NO_FIGURE: i32 = 3;

/// Python harness. Arguments: allowed roots (comma separated), style, dpi.
/// The generated code is read from stdin.
const HARNESS: &str = r##"
import builtins
import io
import sys

png_out = sys.stdout.buffer
sys.stdout = sys.stderr

allowed_roots = frozenset(name for name in sys.argv[1].split(",") if name)
style = sys.argv[2]
dpi = int(sys.argv[3])

source = sys.stdin.read()
try:
    program = compile(source, "<generated>", "exec")
except (SyntaxError, ValueError) as exc:
    print("syntax error:", exc, file=sys.stderr)
    sys.exit(2)

import matplotlib
matplotlib.use("Agg")
import matplotlib.pyplot as plt
from matplotlib.figure import Figure

real_import = builtins.__import__
render = Figure.savefig


def guarded_import(name, globals=None, locals=None, fromlist=(), level=0):
    if level != 0 or name.partition(".")[0] not in allowed_roots:
        raise ImportError("import of %r is not allowed" % name)
    return real_import(name, globals, locals, fromlist, level)


def ignore_save(*args, **kwargs):
    return None


SAFE_NAMES = (
    "abs", "all", "any", "bool", "dict", "divmod", "enumerate", "filter",
    "float", "format", "int", "isinstance", "len", "list", "map", "max",
    "min", "print", "range", "reversed", "round", "set", "slice", "sorted",
    "str", "sum", "tuple", "zip",
    "ArithmeticError", "Exception", "IndexError", "KeyError", "TypeError",
    "ValueError", "ZeroDivisionError",
)
safe_builtins = {name: getattr(builtins, name) for name in SAFE_NAMES if hasattr(builtins, name)}
safe_builtins["__import__"] = guarded_import

Figure.savefig = ignore_save
plt.savefig = ignore_save

try:
    try:
        plt.style.use(style)
    except (OSError, ValueError) as exc:
        print("style unavailable:", exc, file=sys.stderr)
    try:
        exec(program, {"__builtins__": safe_builtins, "__name__": "__main__", "plt": plt})
    except Exception as exc:
        print("%s: %s" % (type(exc).__name__, exc), file=sys.stderr)
        sys.exit(1)
    if not plt.get_fignums():
        sys.exit(3)
    buffer = io.BytesIO()
    render(plt.gcf(), buffer, format="png", dpi=dpi, bbox_inches="tight")
    png_out.write(buffer.getvalue())
    png_out.flush()
finally:
    plt.close("all")
"##;

/// Why generated code did not produce a figure.
#[derive(Error, Debug)]
pub enum ExecutionFailure {
    #[error("code rejected: {0}")]
    Rejected(String),

    #[error("failed to run interpreter: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("code produced no figure")]
    NoFigure,

    #[error("execution exceeded {0:?}")]
    TimedOut(Duration),

    #[error("invalid image output: {0}")]
    InvalidOutput(String),
}

/// A rasterised figure.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFigure {
    png: Vec<u8>,
}

impl RenderedFigure {
    /// Wrap PNG bytes, checking the signature.
    pub fn from_png(png: Vec<u8>) -> std::result::Result<Self, ExecutionFailure> {
        if !png.starts_with(&PNG_SIGNATURE) {
            return Err(ExecutionFailure::InvalidOutput(format!(
                "{} bytes without a PNG signature",
                png.len()
            )));
        }
        Ok(Self { png })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn len(&self) -> usize {
        self.png.len()
    }

    pub fn is_empty(&self) -> bool {
        self.png.is_empty()
    }
}

/// Runs generated plotting code in a restricted interpreter process.
pub struct RestrictedExecutor {
    interpreter: String,
    allowed_modules: Vec<String>,
    timeout: Duration,
    options: RenderOptions,
    lock: Mutex<()>,
}

impl RestrictedExecutor {
    /// Create an executor from settings, rasterising with `options`.
    pub fn new(settings: &ExecutorSettings, options: RenderOptions) -> Self {
        Self {
            interpreter: settings.interpreter.clone(),
            allowed_modules: settings.allowed_modules.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            options,
            lock: Mutex::new(()),
        }
    }

    /// Override the wall-clock limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    /// Execute `code` and rasterise the figure it draws.
    ///
    /// One render runs at a time; the child is killed when the timeout
    /// elapses.
    #[instrument(skip_all, fields(interpreter = %self.interpreter))]
    pub async fn render(&self, code: &str) -> std::result::Result<RenderedFigure, ExecutionFailure> {
        screen(code)?;

        let _guard = self.lock.lock().await;
        let workdir = tempfile::tempdir().map_err(ExecutionFailure::Spawn)?;
        let cache_dir = std::env::temp_dir().join(MPL_CACHE_DIR);
        std::fs::create_dir_all(&cache_dir).map_err(ExecutionFailure::Spawn)?;

        let mut command = Command::new(&self.interpreter);
        command
            .arg("-I")
            .arg("-B")
            .arg("-c")
            .arg(HARNESS)
            .arg(self.allowed_modules.join(","))
            .arg(&self.options.style)
            .arg(self.options.dpi.to_string())
            .env_clear()
            .env("MPLBACKEND", "Agg")
            .env("MPLCONFIGDIR", &cache_dir)
            .current_dir(workdir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            command.env("PATH", path);
        }

        let mut child = command.spawn().map_err(ExecutionFailure::Spawn)?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExecutionFailure::Runtime("interpreter stdin unavailable".into()))?;
        let source = code.to_string();

        let run = async move {
            stdin.write_all(source.as_bytes()).await?;
            drop(stdin);
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ExecutionFailure::Spawn(e)),
            Err(_) => return Err(ExecutionFailure::TimedOut(self.timeout)),
        };

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!("Interpreter exited with {:?}", output.status.code());

        match output.status.code() {
            Some(0) => RenderedFigure::from_png(output.stdout),
            Some(EXIT_SYNTAX) => Err(ExecutionFailure::Syntax(stderr)),
            Some(EXIT_NO_FIGURE) => Err(ExecutionFailure::NoFigure),
            Some(EXIT_RUNTIME) => Err(ExecutionFailure::Runtime(stderr)),
            Some(code) => Err(ExecutionFailure::Runtime(format!("exit code {code}: {stderr}"))),
            None => Err(ExecutionFailure::Runtime("interpreter terminated by signal".into())),
        }
    }
}

/// Reject code reaching for dunder attributes or names before it is run.
///
/// Attribute access such as `x.__class__` is refused anywhere, format
/// strings included, as is any word starting with `__` apart from the
/// `__name__ == "__main__"` guard. Inner underscores (`front__rear`) pass.
pub fn screen(code: &str) -> std::result::Result<(), ExecutionFailure> {
    if let Some(found) = DUNDER_ATTRIBUTE.find(code) {
        return Err(ExecutionFailure::Rejected(format!(
            "dunder attribute access `{}` is not allowed",
            found.as_str()
        )));
    }

    if let Some(name) = DUNDER_NAME
        .find_iter(code)
        .map(|m| m.as_str())
        .find(|name| !ALLOWED_DUNDERS.contains(name))
    {
        return Err(ExecutionFailure::Rejected(format!("name `{name}` is not allowed")));
    }
    Ok(())
}

/// Check that `interpreter` can import matplotlib; returns its version.
pub async fn matplotlib_version(interpreter: &str) -> Result<String> {
    let result = Command::new(interpreter)
        .arg("-I")
        .arg("-c")
        .arg("import matplotlib; print(matplotlib.__version__)")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TyrewiseError::ToolNotFound(interpreter.to_string()));
        }
        Err(e) => {
            return Err(TyrewiseError::ToolFailed(format!("{interpreter} execution failed: {e}")));
        }
    };

    if !output.status.success() {
        return Err(TyrewiseError::ToolFailed(format!(
            "matplotlib is not importable with {interpreter}"
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::Settings;
use crate::loader::list_manuals;
use crate::openai::{api_key, API_KEY_VARS};
use crate::pipeline::executor::matplotlib_version;
use console::style;
use std::path::Path;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: Option<&str>) -> anyhow::Result<()> {
    Output::header("Tyrewise Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("External Tools").bold());
    let tool_checks = vec![
        check_pdftotext(),
        check_interpreter(&settings.executor.interpreter).await,
    ];
    for check in &tool_checks {
        check.print();
    }
    checks.extend(tool_checks);

    println!();

    println!("{}", style("API Configuration").bold());
    let api_check = check_openai_api_key(api_key().as_deref());
    api_check.print();
    checks.push(api_check);

    println!();

    println!("{}", style("Directories").bold());
    let dir_checks = check_directories(settings);
    for check in &dir_checks {
        check.print();
    }
    checks.extend(dir_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file(config_path);
    config_check.print();
    checks.push(config_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Tyrewise.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Tyrewise is ready to use.");
    }

    Ok(())
}

/// `pdftotext` prints its version on stderr.
fn check_pdftotext() -> CheckResult {
    match Command::new("pdftotext").arg("-v").output() {
        Ok(output) => {
            let text = String::from_utf8_lossy(&output.stderr);
            let version = text.lines().next().unwrap_or("installed").trim();
            CheckResult::ok("pdftotext", &truncate(version, 50))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error("pdftotext", "not found", install_hint_poppler())
        }
        Err(e) => CheckResult::error("pdftotext", &format!("error: {}", e), install_hint_poppler()),
    }
}

/// Charts need an interpreter that can import matplotlib.
async fn check_interpreter(interpreter: &str) -> CheckResult {
    match matplotlib_version(interpreter).await {
        Ok(version) => CheckResult::ok(interpreter, &format!("matplotlib {}", version)),
        Err(e) => CheckResult::warning(
            interpreter,
            &format!("charts disabled: {}", e),
            "Install with: pip install matplotlib",
        ),
    }
}

/// Check if an OpenAI API key is configured.
fn check_openai_api_key(key: Option<&str>) -> CheckResult {
    let name = API_KEY_VARS[0];
    match key {
        Some(key) if key.starts_with("sk-") && key.len() > 20 => {
            let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
            CheckResult::ok(name, &format!("configured ({})", masked))
        }
        Some(_) => CheckResult::warning(
            name,
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        None => CheckResult::error(
            name,
            "not set",
            "Set with: export OPENAI_API_KEY='sk-...' (or add it to .env)",
        ),
    }
}

/// Check manuals, quick reference, index and chart directories.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let manuals_dir = settings.manuals_dir();
    match list_manuals(&manuals_dir) {
        Ok(manuals) if !manuals.is_empty() => results.push(CheckResult::ok(
            "Manuals",
            &format!("{} ({} PDFs)", manuals_dir.display(), manuals.len()),
        )),
        Ok(_) => results.push(CheckResult::warning(
            "Manuals",
            &format!("{} (no PDFs)", manuals_dir.display()),
            "Copy your PDF manuals there, then run: tyrewise index",
        )),
        Err(e) => results.push(CheckResult::error(
            "Manuals",
            &format!("{}: {}", manuals_dir.display(), e),
            "Check the directory permissions",
        )),
    }

    let quick_reference = settings.quick_reference_path();
    if quick_reference.exists() {
        results.push(CheckResult::ok("Quick reference", &quick_reference.display().to_string()));
    } else {
        results.push(CheckResult::warning(
            "Quick reference",
            &format!("{} (missing)", quick_reference.display()),
            "Optional; manual URLs are usually cited from it",
        ));
    }

    let db_path = settings.sqlite_path();
    if db_path.exists() {
        results.push(CheckResult::ok(
            "Index",
            &format!("{} ({})", db_path.display(), file_size(&db_path)),
        ));
    } else {
        results.push(CheckResult::warning(
            "Index",
            &format!("{} (not created yet)", db_path.display()),
            "Build it with: tyrewise index",
        ));
    }

    let artifacts_dir = settings.artifacts_dir();
    if artifacts_dir.exists() {
        results.push(CheckResult::ok("Charts", &artifacts_dir.display().to_string()));
    } else {
        results.push(CheckResult::warning(
            "Charts",
            &format!("{} (will be created)", artifacts_dir.display()),
            "Directory will be created on the first chart",
        ));
    }

    results
}

/// Check if config file exists.
fn check_config_file(config_path: Option<&str>) -> CheckResult {
    let path = config_path
        .map(std::path::PathBuf::from)
        .unwrap_or_else(Settings::default_config_path);
    if path.exists() {
        CheckResult::ok("Config file", &format!("{}", path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: tyrewise config init",
        )
    }
}

fn file_size(path: &Path) -> String {
    std::fs::metadata(path)
        .map(|m| format_size(m.len()))
        .unwrap_or_else(|_| "unknown size".to_string())
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Platform-specific install hint for poppler.
fn install_hint_poppler() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install poppler"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install poppler-utils (or your package manager)"
    } else {
        "Install from: https://poppler.freedesktop.org"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("test", "passed");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.hint.is_none());
    }

    #[test]
    fn test_api_key_checks() {
        assert_eq!(check_openai_api_key(None).status, CheckStatus::Error);
        assert_eq!(check_openai_api_key(Some("not-a-key")).status, CheckStatus::Warning);

        let ok = check_openai_api_key(Some("sk-abcdefghijklmnopqrstuvwxyz"));
        assert_eq!(ok.status, CheckStatus::Ok);
        assert!(ok.message.contains("sk-abcd...wxyz"));
    }

    #[test]
    fn test_empty_manuals_dir_is_warning() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.index.manuals_dir = dir.path().display().to_string();

        let checks = check_directories(&settings);
        assert_eq!(checks[0].name, "Manuals");
        assert_eq!(checks[0].status, CheckStatus::Warning);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }
}

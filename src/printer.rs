//! Printer functionality - cross-platform silent PDF printing

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::process::Command;

use crate::error::PrintError;

#[cfg(target_os = "windows")]
use std::path::PathBuf;

/// Windows flag to hide console window
#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Printer information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrinterInfo {
    pub name: String,
    #[serde(rename = "isDefault")]
    pub is_default: bool,
    pub status: String,
}

/// Options for a single print submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintOptions {
    /// Print without any dialog.
    pub silent: bool,
    /// Page range such as `1-4`; `None` prints the whole document.
    pub pages: Option<String>,
}

/// The OS print collaborator.
#[async_trait]
pub trait Printer: Send + Sync {
    async fn print(&self, file: &Path, options: &PrintOptions) -> Result<(), PrintError>;
}

/// Prints through the platform print spooler.
#[derive(Debug, Clone, Default)]
pub struct SystemPrinter {
    printer_name: Option<String>,
}

impl SystemPrinter {
    /// `None` prints to the system default printer.
    pub fn new(printer_name: Option<String>) -> Self {
        Self { printer_name }
    }
}

#[async_trait]
impl Printer for SystemPrinter {
    async fn print(&self, file: &Path, options: &PrintOptions) -> Result<(), PrintError> {
        tracing::info!(
            file = %file.display(),
            printer = ?self.printer_name,
            pages = ?options.pages,
            "submitting print job"
        );

        #[cfg(target_os = "windows")]
        {
            print_pdf_windows(file, self.printer_name.as_deref(), options).await
        }

        #[cfg(not(target_os = "windows"))]
        {
            print_pdf_lp(file, self.printer_name.as_deref(), options).await
        }
    }
}

/// List available printers on the system
pub async fn list_printers() -> Result<Vec<PrinterInfo>, PrintError> {
    #[cfg(target_os = "windows")]
    {
        list_printers_windows().await
    }

    #[cfg(not(target_os = "windows"))]
    {
        list_printers_lpstat().await
    }
}

/// SumatraPDF `-print-settings` value for the given options.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn sumatra_print_settings(options: &PrintOptions) -> String {
    match &options.pages {
        Some(pages) => format!("{},noscale", pages),
        None => "noscale".to_string(),
    }
}

/// Arguments for `lp` on macOS and Linux.
#[cfg_attr(target_os = "windows", allow(dead_code))]
fn lp_args(pdf_path: &Path, printer_name: Option<&str>, options: &PrintOptions) -> Vec<String> {
    let mut args = vec!["-o".to_string(), "fit-to-page=false".to_string()];

    if let Some(pages) = &options.pages {
        args.push("-o".to_string());
        args.push(format!("page-ranges={}", pages));
    }

    if let Some(printer) = printer_name {
        args.push("-d".to_string());
        args.push(printer.to_string());
    }

    args.push(pdf_path.to_string_lossy().to_string());
    args
}

#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn printer_status(code: u32) -> &'static str {
    match code {
        0 => "ready",
        1 => "busy",
        _ => "unknown",
    }
}

/// Parse `Get-Printer | ConvertTo-Json` output, which is an object for a
/// single printer and an array otherwise.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn parse_powershell_printers(json_str: &str) -> Vec<PrinterInfo> {
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct WinPrinter {
        name: String,
        default: Option<bool>,
        printer_status: Option<u32>,
    }

    let win_printers: Vec<WinPrinter> = match json_str.trim().chars().next() {
        Some('[') => serde_json::from_str(json_str).unwrap_or_default(),
        Some('{') => serde_json::from_str::<WinPrinter>(json_str)
            .map(|p| vec![p])
            .unwrap_or_default(),
        _ => vec![],
    };

    win_printers
        .into_iter()
        .map(|p| PrinterInfo {
            name: p.name,
            is_default: p.default.unwrap_or(false),
            status: printer_status(p.printer_status.unwrap_or(0)).to_string(),
        })
        .collect()
}

/// Parse `lpstat -p -d` output.
#[cfg_attr(target_os = "windows", allow(dead_code))]
fn parse_lpstat(output_str: &str) -> Vec<PrinterInfo> {
    let mut printers = Vec::new();
    let mut default_printer = String::new();

    for line in output_str.lines() {
        if line.starts_with("printer ") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                let status = if line.contains("idle") {
                    "ready"
                } else if line.contains("printing") {
                    "busy"
                } else {
                    "unknown"
                };
                printers.push(PrinterInfo {
                    name: parts[1].to_string(),
                    is_default: false,
                    status: status.to_string(),
                });
            }
        } else if let Some(rest) = line.strip_prefix("system default destination:") {
            default_printer = rest.trim().to_string();
        }
    }

    for printer in &mut printers {
        if printer.name == default_printer {
            printer.is_default = true;
        }
    }

    printers
}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(target_os = "windows")]
async fn list_printers_windows() -> Result<Vec<PrinterInfo>, PrintError> {
    let output = Command::new("powershell")
        .args([
            "-Command",
            "Get-Printer | Select-Object Name, Default, PrinterStatus | ConvertTo-Json",
        ])
        .creation_flags(CREATE_NO_WINDOW)
        .output()
        .await?;

    tracing::debug!("PowerShell stderr: {}", String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Ok(vec![]);
    }

    Ok(parse_powershell_printers(&String::from_utf8_lossy(&output.stdout)))
}

/// Get path to SumatraPDF executable
#[cfg(target_os = "windows")]
fn get_sumatra_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tls-print-helper")
        .join("tools")
        .join("SumatraPDF.exe")
}

/// Download SumatraPDF if not present
#[cfg(target_os = "windows")]
async fn ensure_sumatra_available() -> Result<PathBuf, PrintError> {
    let sumatra_path = get_sumatra_path();

    if sumatra_path.exists() {
        return Ok(sumatra_path);
    }

    tracing::info!("Downloading SumatraPDF for silent printing...");

    if let Some(dir) = sumatra_path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }

    let download_url = "https://www.sumatrapdfreader.org/dl/rel/3.5.2/SumatraPDF-3.5.2-64.exe";

    let response = reqwest::get(download_url)
        .await
        .map_err(|e| PrintError::Failed(format!("Failed to download SumatraPDF: {}", e)))?;

    if !response.status().is_success() {
        return Err(PrintError::Failed(format!(
            "Failed to download SumatraPDF: HTTP {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PrintError::Failed(format!("Failed to download SumatraPDF: {}", e)))?;
    tokio::fs::write(&sumatra_path, &bytes).await?;

    tracing::info!("SumatraPDF downloaded successfully to {:?}", sumatra_path);
    Ok(sumatra_path)
}

#[cfg(target_os = "windows")]
async fn print_pdf_windows(
    pdf_path: &Path,
    printer_name: Option<&str>,
    options: &PrintOptions,
) -> Result<(), PrintError> {
    let sumatra_path = ensure_sumatra_available().await?;

    let mut args: Vec<String> = Vec::new();
    match printer_name {
        Some(name) => {
            args.push("-print-to".to_string());
            args.push(name.to_string());
        }
        None => args.push("-print-to-default".to_string()),
    }
    args.push("-print-settings".to_string());
    args.push(sumatra_print_settings(options));
    if options.silent {
        args.push("-silent".to_string());
    }
    args.push(pdf_path.to_string_lossy().to_string());

    let output = Command::new(&sumatra_path)
        .args(&args)
        .creation_flags(CREATE_NO_WINDOW)
        .output()
        .await?;

    if !output.stderr.is_empty() {
        tracing::debug!("stderr: {}", String::from_utf8_lossy(&output.stderr));
    }

    if !output.status.success() {
        return Err(PrintError::Failed(format!(
            "SumatraPDF exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    Ok(())
}

// ============================================================================
// macOS / Linux Implementation (CUPS)
// ============================================================================

#[cfg(not(target_os = "windows"))]
async fn list_printers_lpstat() -> Result<Vec<PrinterInfo>, PrintError> {
    let output = Command::new("lpstat").args(["-p", "-d"]).output().await?;

    if !output.status.success() {
        return Ok(vec![]);
    }

    Ok(parse_lpstat(&String::from_utf8_lossy(&output.stdout)))
}

#[cfg(not(target_os = "windows"))]
async fn print_pdf_lp(
    pdf_path: &Path,
    printer_name: Option<&str>,
    options: &PrintOptions,
) -> Result<(), PrintError> {
    let args = lp_args(pdf_path, printer_name, options);
    tracing::debug!("Executing lp with args: {:?}", args);

    let output = Command::new("lp").args(&args).output().await?;

    if !output.status.success() {
        return Err(PrintError::Failed(format!(
            "lp exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(())
}

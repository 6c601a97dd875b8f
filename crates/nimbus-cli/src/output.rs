use nimbus_core::domain::ItemView;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, _message: &str) {}
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    if format.is_json() {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

/// Format bytes as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Single-character state marker used in listings
pub fn state_marker(view: &ItemView) -> char {
    if view.is_directory {
        'd'
    } else if view.download_error.is_some() || view.upload_error.is_some() {
        '!'
    } else if view.is_downloading {
        '\u{2193}'
    } else if view.is_uploading {
        '\u{2191}'
    } else if view.is_downloaded {
        '\u{25cf}'
    } else {
        '\u{25cb}'
    }
}

/// One listing line: marker, size, name and identifier
pub fn item_line(view: &ItemView) -> String {
    let size = if view.is_directory {
        "-".to_string()
    } else {
        format_bytes(view.size)
    };
    format!(
        "{} {:>12}  {}  [{}]",
        state_marker(view),
        size,
        view.name,
        view.identifier
    )
}

//! Output formatting module for rustible-ios
//!
//! Prints module results as colored text, JSON or YAML.

use super::OutputFormat;
use colored::Colorize;
use is_terminal::IsTerminal;
use rustible_ios::modules::ModuleOutput;
use serde_json::{json, Value};
use std::io::{self, Write};

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// Selected format
    format: OutputFormat,
    /// Verbosity level
    verbosity: u8,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, format: OutputFormat, verbosity: u8) -> Self {
        // Respect NO_COLOR and piped output
        let use_color =
            use_color && std::env::var("NO_COLOR").is_err() && io::stdout().is_terminal();

        Self {
            use_color,
            format,
            verbosity,
        }
    }

    fn structured(&self) -> bool {
        self.format != OutputFormat::Human
    }

    /// Print a structured value in the selected machine format
    fn emit(&self, value: &Value) {
        let text = match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(value).unwrap_or_else(|_| value.to_string()),
            _ => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        };
        println!("{}", text.trim_end());
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.structured() {
            eprintln!("{}", json!({"type": "error", "message": message}));
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.structured() {
            eprintln!("{}", json!({"type": "warning", "message": message}));
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    /// Print a debug message (requires higher verbosity)
    pub fn debug(&self, message: &str) {
        if self.verbosity < 2 || self.structured() {
            return;
        }

        if self.use_color {
            eprintln!("{} {}", "DEBUG:".magenta(), message);
        } else {
            eprintln!("DEBUG: {}", message);
        }
    }

    /// Print a list of named items with descriptions
    pub fn list(&self, title: &str, items: &[(String, String)]) {
        if self.structured() {
            let items: Vec<Value> = items
                .iter()
                .map(|(name, description)| json!({"name": name, "description": description}))
                .collect();
            self.emit(&json!({ title: items }));
            return;
        }

        let width = items.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
        if self.use_color {
            println!("{}:", title.bright_white().bold());
        } else {
            println!("{}:", title);
        }
        for (name, description) in items {
            let name = format!("{:width$}", name, width = width);
            if self.use_color {
                println!("  {}  {}", name.cyan(), description);
            } else {
                println!("  {}  {}", name, description);
            }
        }
    }

    /// Print the result of a module run
    pub fn module_result(&self, module: &str, output: &ModuleOutput) {
        if self.structured() {
            let mut value = json!({
                "module": module,
                "changed": output.changed,
                "msg": output.msg,
            });
            if let Value::Object(map) = &mut value {
                for (key, data) in &output.data {
                    map.insert(key.clone(), data.clone());
                }
                if let Some(details) = output.diff.as_ref().and_then(|d| d.details.clone()) {
                    map.insert("diff".to_string(), Value::String(details));
                }
            }
            self.emit(&value);
            return;
        }

        let status = if output.changed {
            if self.use_color { "changed".yellow().to_string() } else { "changed".to_string() }
        } else if self.use_color {
            "ok".green().to_string()
        } else {
            "ok".to_string()
        };
        println!("{}: [{}] {}", module, status, output.msg);

        for key in ["parsed", "gathered"] {
            if let Some(facts) = output.data.get(key) {
                println!("{}", serde_yaml::to_string(facts).unwrap_or_default().trim_end());
            }
        }

        for command in output.commands() {
            println!("  {}", command);
        }

        if let Some(details) = output.diff.as_ref().and_then(|d| d.details.as_deref()) {
            self.diff(details);
        }
    }

    /// Print a unified diff
    fn diff(&self, details: &str) {
        println!();
        for line in details.lines() {
            if !self.use_color {
                println!("{}", line);
            } else if line.starts_with('+') {
                println!("{}", line.green());
            } else if line.starts_with('-') {
                println!("{}", line.red());
            } else if line.starts_with("@@") {
                println!("{}", line.cyan());
            } else {
                println!("{}", line);
            }
        }
    }

    /// Flush stdout
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_disabled_when_requested() {
        let formatter = OutputFormatter::new(false, OutputFormat::Human, 0);
        assert!(!formatter.use_color);
        assert!(!formatter.structured());
    }

    #[test]
    fn test_structured_formats() {
        assert!(OutputFormatter::new(false, OutputFormat::Json, 0).structured());
        assert!(OutputFormatter::new(false, OutputFormat::Yaml, 0).structured());
    }
}

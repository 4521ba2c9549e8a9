/// Vulkan debug messenger - validation layer messages with coloured output
///
/// The callback state lives in a boxed [`DebugState`] whose address is handed
/// to the driver as `p_user_data`. The box is owned by the GPU context and
/// outlives the messenger, so nothing here is global.

use ash::vk;
use colored::*;
use mgp_engine::mgp::{DebugMessageFilter, DebugOutput, DebugSeverity, ValidationStats};
use rustc_hash::FxHashMap;
use std::ffi::{c_void, CStr};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

/// Settings the callback filters and reports with
#[derive(Debug, Clone)]
pub struct DebugConfig {
    pub severity: DebugSeverity,
    pub output: DebugOutput,
    pub message_filter: DebugMessageFilter,
    pub break_on_error: bool,
    pub panic_on_error: bool,
    pub enable_stats: bool,
}

/// Atomic validation counters
#[derive(Debug, Default)]
struct StatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl StatsTracker {
    fn snapshot(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }
}

/// Message severity after filtering, with its counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Error,
    Warning,
    Info,
    Verbose,
}

impl Level {
    fn from_vk(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            Level::Error
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            Level::Warning
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            Level::Info
        } else {
            Level::Verbose
        }
    }

    fn label(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Info => "INFO",
            Level::Verbose => "VERBOSE",
        }
    }

    fn colored(self) -> ColoredString {
        match self {
            Level::Error => self.label().red().bold(),
            Level::Warning => self.label().yellow().bold(),
            Level::Info => self.label().cyan(),
            Level::Verbose => self.label().bright_black(),
        }
    }
}

/// Message category
fn category(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

/// Severity flags the messenger subscribes to
pub(crate) fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    let errors = vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    match severity {
        DebugSeverity::ErrorsOnly => errors,
        DebugSeverity::ErrorsAndWarnings => errors | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        DebugSeverity::All => {
            errors
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

/// State behind the messenger's user data pointer
pub struct DebugState {
    config: DebugConfig,
    stats: StatsTracker,
    /// Occurrences per message text, for grouping repeats
    seen: Mutex<FxHashMap<String, u32>>,
}

impl DebugState {
    pub fn new(config: DebugConfig) -> Self {
        Self {
            config,
            stats: StatsTracker::default(),
            seen: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn stats(&self) -> ValidationStats {
        self.stats.snapshot()
    }

    /// Whether a message passes the severity and category filters
    fn accepts(&self, level: Level, message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> bool {
        let severity_ok = match self.config.severity {
            DebugSeverity::ErrorsOnly => level == Level::Error,
            DebugSeverity::ErrorsAndWarnings => matches!(level, Level::Error | Level::Warning),
            DebugSeverity::All => true,
        };
        let filter = &self.config.message_filter;
        let category_ok = match category(message_type) {
            "Validation" => filter.show_validation,
            "Performance" => filter.show_performance,
            _ => filter.show_general,
        };
        severity_ok && category_ok
    }

    fn count(&self, level: Level) {
        if !self.config.enable_stats {
            return;
        }
        let counter = match level {
            Level::Error => &self.stats.errors,
            Level::Warning => &self.stats.warnings,
            Level::Info => &self.stats.info,
            Level::Verbose => &self.stats.verbose,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// How many times this exact message has been reported, this one included
    fn occurrence(&self, message: &str) -> u32 {
        if !self.config.enable_stats {
            return 1;
        }
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        let count = seen.entry(message.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Number of distinct messages reported more than once
    fn repeated(&self) -> usize {
        let seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.values().filter(|&&count| count > 1).count()
    }

    /// Filter, count and print one message
    ///
    /// # Returns
    ///
    /// True when the message was displayed.
    fn report(
        &self,
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT,
        message_id: &str,
        message: &str,
    ) -> bool {
        let level = Level::from_vk(severity);
        if !self.accepts(level, message_type) {
            return false;
        }
        self.count(level);

        let type_str = category(message_type);
        let occurrences = self.occurrence(message);
        let repeat = if occurrences > 1 {
            format!(" [×{}]", occurrences)
        } else {
            String::new()
        };

        let console_output = format!(
            "{} {} [{}]{}\n  ├─ {}: {}\n  └─ {}\n",
            "[VULKAN".bright_blue().bold(),
            format!("{}]", level.colored()).bright_blue().bold(),
            type_str.bright_black(),
            repeat.yellow(),
            "Message ID".bright_black(),
            message_id.white(),
            message.white()
        );
        let file_output = format!(
            "[VULKAN {}] [{}]{}\n  ├─ Message ID: {}\n  └─ {}\n",
            level.label(),
            type_str,
            repeat,
            message_id,
            message
        );

        match &self.config.output {
            DebugOutput::Console => eprint!("{}", console_output),
            DebugOutput::File(path) => write_to_file(path, &file_output),
            DebugOutput::Both(path) => {
                eprint!("{}", console_output);
                write_to_file(path, &file_output);
            }
        }

        if level == Level::Error && self.config.panic_on_error {
            panic!(
                "\n⚠️  PANIC ON ERROR (Strict Mode)\nMessage ID: {}\nType: {}\nMessage: {}\n",
                message_id, type_str, message
            );
        }
        if level == Level::Error && self.config.break_on_error {
            eprintln!(
                "\n{}\n  Context: {} [{}]\n  Message: {}\n",
                "⚠️  BREAK ON VALIDATION ERROR - Aborting execution".red().bold(),
                message_id.yellow(),
                type_str.cyan(),
                message.white()
            );
            std::process::abort();
        }
        true
    }

    /// Print the per-severity counters collected so far
    pub fn print_report(&self) {
        let stats = self.stats();
        if stats.total() == 0 {
            println!("\n{}", "✓ No validation messages".green().bold());
            return;
        }

        println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());
        if stats.errors > 0 {
            println!("  {} {}", "Errors:".red().bold(), stats.errors);
        }
        if stats.warnings > 0 {
            println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
        }
        if stats.info > 0 {
            println!("  {} {}", "Info:".cyan(), stats.info);
        }
        if stats.verbose > 0 {
            println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
        }
        println!("  {} {}", "Total:".white().bold(), stats.total());

        let repeated = self.repeated();
        if repeated > 0 {
            println!("\n  {} {} message(s) appeared multiple times", "ℹ".cyan(), repeated);
        }
        println!("{}\n", "====================================".bright_blue().bold());
    }
}

/// Messenger create info pointing the callback at `state`
///
/// `state` must stay at the same address until the messenger is destroyed.
pub(crate) fn messenger_create_info(state: &DebugState) -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(severity_flags(state.config.severity))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
        .user_data(state as *const DebugState as *mut c_void)
}

/// Vulkan debug messenger callback
///
/// # Safety
///
/// Called by the validation layers with `user_data` set to a live
/// [`DebugState`].
unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    user_data: *mut c_void,
) -> vk::Bool32 {
    if user_data.is_null() || p_callback_data.is_null() {
        return vk::FALSE;
    }
    let state = &*(user_data as *const DebugState);
    let callback_data = &*p_callback_data;

    let message_id = if callback_data.p_message_id_name.is_null() {
        "Unknown"
    } else {
        CStr::from_ptr(callback_data.p_message_id_name).to_str().unwrap_or("Invalid UTF-8")
    };
    let message = if callback_data.p_message.is_null() {
        "No message"
    } else {
        CStr::from_ptr(callback_data.p_message).to_str().unwrap_or("Invalid UTF-8")
    };

    state.report(message_severity, message_type, message_id, message);
    vk::FALSE
}

/// Append a message to the log file
fn write_to_file(path: &str, message: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{}", message);
    }
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;

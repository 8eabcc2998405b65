/// Vulkan debug messenger: validation layer messages with colored output
///
/// Compiled only with the `vulkan-validation` feature. Messages are filtered
/// by severity and category, grouped by text (repeats are counted) and
/// written to the console and/or a log file.

use ash::vk;
use colored::*;
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::vulkan_context::{DebugMessageFilter, DebugOutput, DebugSeverity, ValidationStats, VulkanConfig};

static DEBUG_CONFIG: Mutex<Option<Config>> = Mutex::new(None);

static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Callback configuration, copied from `VulkanConfig` at device creation
#[derive(Clone)]
pub struct Config {
    pub severity: DebugSeverity,
    pub output: DebugOutput,
    pub message_filter: DebugMessageFilter,
    pub break_on_error: bool,
    pub panic_on_error: bool,
    pub enable_stats: bool,
}

impl From<&VulkanConfig> for Config {
    fn from(config: &VulkanConfig) -> Self {
        Self {
            severity: config.debug_severity,
            output: config.debug_output.clone(),
            message_filter: config.debug_message_filter,
            break_on_error: config.break_on_validation_error,
            panic_on_error: config.panic_on_error,
            enable_stats: config.enable_validation_stats,
        }
    }
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn get_stats(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

// A panicking callback must not disable validation output for the rest of the run
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Severity flags to request from the messenger
pub fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    match severity {
        DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        DebugSeverity::ErrorsAndWarnings => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        }
        DebugSeverity::All => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

pub fn init_debug_config(config: Config) {
    VALIDATION_STATS.reset();
    *lock(&MESSAGE_TRACKER) = Some(FxHashMap::default());
    *lock(&DEBUG_CONFIG) = Some(config);
}

/// Stop reporting; called before the messenger is destroyed
pub fn cleanup_debug_config() {
    *lock(&DEBUG_CONFIG) = None;
}

/// Validation message counts since the device was created
pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_STATS.get_stats()
}

pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
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

    if let Some(tracker) = lock(&MESSAGE_TRACKER).as_ref() {
        let repeated = tracker.values().filter(|&&count| count > 1).count();
        if repeated > 0 {
            println!("\n  {} message(s) appeared multiple times", repeated);
        }
    }
    println!("{}\n", "====================================".bright_blue().bold());
}

/// Whether a message passes the configured severity and category filters
pub fn should_display(
    config: &Config,
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
) -> bool {
    if !severity_flags(config.severity).intersects(severity) {
        return false;
    }
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        config.message_filter.show_validation
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        config.message_filter.show_performance
    } else {
        config.message_filter.show_general
    }
}

/// Vulkan debug messenger callback
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let callback_data = *p_callback_data;
    let message_id_name = if callback_data.p_message_id_name.is_null() {
        "Unknown"
    } else {
        CStr::from_ptr(callback_data.p_message_id_name).to_str().unwrap_or("Invalid UTF-8")
    };
    let message = if callback_data.p_message.is_null() {
        "No message"
    } else {
        CStr::from_ptr(callback_data.p_message).to_str().unwrap_or("Invalid UTF-8")
    };

    let config = match lock(&DEBUG_CONFIG).as_ref() {
        Some(config) => config.clone(),
        None => return vk::FALSE,
    };
    if !should_display(&config, message_severity, message_type) {
        return vk::FALSE;
    }

    let is_error = message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR);
    let (severity_str, severity_colored, counter) = if is_error {
        ("ERROR", "ERROR".red().bold(), &VALIDATION_STATS.errors)
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        ("WARNING", "WARNING".yellow().bold(), &VALIDATION_STATS.warnings)
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        ("INFO", "INFO".cyan(), &VALIDATION_STATS.info)
    } else {
        ("VERBOSE", "VERBOSE".bright_black(), &VALIDATION_STATS.verbose)
    };

    let type_str = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    };

    let occurrences = if config.enable_stats {
        counter.fetch_add(1, Ordering::Relaxed);
        let mut tracker = lock(&MESSAGE_TRACKER);
        let count = tracker.get_or_insert_with(FxHashMap::default).entry(message.to_string()).or_insert(0);
        *count += 1;
        *count
    } else {
        1
    };
    let repeat = if occurrences > 1 { format!(" [x{}]", occurrences) } else { String::new() };

    let console_output = format!(
        "{} {} [{}]{}\n  |- {}: {}\n  '- {}\n",
        "[VULKAN".bright_blue().bold(),
        format!("{}]", severity_colored).bright_blue().bold(),
        type_str.bright_black(),
        repeat.yellow(),
        "Message ID".bright_black(),
        message_id_name.white(),
        message.white()
    );
    let file_output = format!(
        "[VULKAN {}] [{}]{}\n  |- Message ID: {}\n  '- {}\n",
        severity_str, type_str, repeat, message_id_name, message
    );

    match &config.output {
        DebugOutput::Console => eprint!("{}", console_output),
        DebugOutput::File(path) => write_to_file(path, &file_output),
        DebugOutput::Both(path) => {
            eprint!("{}", console_output);
            write_to_file(path, &file_output);
        }
    }

    if is_error && config.panic_on_error {
        panic!("Vulkan validation error ({}): {}", message_id_name, message);
    }
    if is_error && config.break_on_error {
        eprintln!(
            "\n{}\n  Context: {} [{}]\n  Message: {}\n",
            "BREAK ON VALIDATION ERROR - aborting".red().bold(),
            message_id_name.yellow(),
            type_str.cyan(),
            message.white()
        );
        std::process::abort();
    }

    vk::FALSE
}

fn write_to_file(path: &str, message: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{}", message);
    }
}

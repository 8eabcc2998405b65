/// VulkanConfig - backend options that only make sense for Vulkan
///
/// `GpuConfig` (core crate) decides whether validation is requested at all;
/// these options shape what the debug messenger reports and how.

/// Which validation messages reach the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Where validation messages go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutput {
    Console,
    /// Append to a log file (no colors)
    File(String),
    Both(String),
}

/// Message categories to display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: true,
        }
    }
}

/// Validation message counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VulkanConfig {
    pub debug_severity: DebugSeverity,
    pub debug_output: DebugOutput,
    pub debug_message_filter: DebugMessageFilter,

    /// Abort the process on the first validation error (debugger attachment)
    pub break_on_validation_error: bool,

    /// Panic on the first validation error (strict test runs)
    pub panic_on_error: bool,

    /// Count validation messages (see `get_validation_stats`)
    pub enable_validation_stats: bool,

    /// FIFO presentation; `false` prefers MAILBOX when available
    pub vsync: bool,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            debug_output: DebugOutput::Console,
            debug_message_filter: DebugMessageFilter::default(),
            break_on_validation_error: false,
            panic_on_error: false,
            enable_validation_stats: true,
            vsync: true,
        }
    }
}

use colored::Colorize;

#[derive(Debug)]
pub struct UxError {
    pub what: String,
    pub why: Option<String>,
    pub how_to_fix: Vec<String>,
    pub suggested_command: Option<String>,
}

impl UxError {
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            why: None,
            how_to_fix: Vec::new(),
            suggested_command: None,
        }
    }

    pub fn why(mut self, reason: impl Into<String>) -> Self {
        self.why = Some(reason.into());
        self
    }

    pub fn fix(mut self, suggestion: impl Into<String>) -> Self {
        self.how_to_fix.push(suggestion.into());
        self
    }

    pub fn suggest(mut self, cmd: impl Into<String>) -> Self {
        self.suggested_command = Some(cmd.into());
        self
    }

    pub fn display(&self) {
        eprintln!();
        eprintln!("{} {}", "error:".red().bold(), self.what.white().bold());

        if let Some(why) = &self.why {
            eprintln!("       {}", why.dimmed());
        }

        if !self.how_to_fix.is_empty() {
            eprintln!();
            eprintln!("{}", "How to fix:".yellow().bold());
            for (i, fix) in self.how_to_fix.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, fix);
            }
        }

        if let Some(cmd) = &self.suggested_command {
            eprintln!();
            eprintln!("{}", "Try this:".green().bold());
            eprintln!("  $ {}", cmd.cyan());
        }
        eprintln!();
    }
}

impl std::fmt::Display for UxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.what)
    }
}

impl std::error::Error for UxError {}

pub fn config_error(message: &str) -> UxError {
    UxError::new(format!("Configuration error: {}", message))
        .why("The configuration file or STASH_* environment is invalid")
        .fix("Check the file passed with --config")
        .fix("Queue mode needs a Redis URL, the postgres backend needs a database URL")
        .suggest("stash config show")
}

pub fn capture_not_found(id: &str) -> UxError {
    UxError::new(format!("Capture not found: {}", id))
        .why("No capture with this ID exists in the configured store")
        .fix("Verify the capture ID is correct")
        .fix("The memory backend keeps nothing between invocations")
        .suggest("stash capture create \"<text>\" --owner <owner> --process")
}

pub fn invalid_id(kind: &str, value: &str) -> UxError {
    UxError::new(format!("Invalid {}: '{}'", kind, value))
        .why("IDs must be between 1 and 100 characters")
        .fix(format!("Provide a non-empty {}", kind))
}

pub fn postgres_unreachable(reason: &str) -> UxError {
    UxError::new("Cannot connect to PostgreSQL")
        .why(reason.to_string())
        .fix("Check STASH_DATABASE_URL")
        .fix("Or use the memory backend: STASH_STORAGE_BACKEND=memory")
}

pub fn redis_unreachable(reason: &str) -> UxError {
    UxError::new("Cannot connect to Redis")
        .why(reason.to_string())
        .fix("Check STASH_REDIS_URL")
        .fix("Set STASH_QUEUE_FALLBACK_TO_IN_PROCESS=true to run without a queue")
        .suggest("stash config show")
}

pub fn queue_required(command: &str) -> UxError {
    UxError::new(format!("'{}' needs queue mode", command))
        .why("The dispatcher is running in-process, there is no queue to drain")
        .fix("Set STASH_QUEUE_MODE=queue and STASH_REDIS_URL")
}

use console::style;

/// Terminal messages for the operator. Tables and results go to files.
pub struct OutputManager {
    colored: bool,
    quiet: bool,
}

impl OutputManager {
    pub fn new(colored: bool, quiet: bool) -> Self {
        Self { colored, quiet }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn print_success(&self, message: &str) {
        if self.quiet {
            return;
        }
        if self.colored {
            println!("{} {}", style("✓").green().bold(), message);
        } else {
            println!("✓ {}", message);
        }
    }

    pub fn print_warning(&self, message: &str) {
        if self.colored {
            eprintln!("{} {}", style("⚠").yellow().bold(), message);
        } else {
            eprintln!("⚠ {}", message);
        }
    }

    pub fn print_error(&self, message: &str) {
        if self.colored {
            eprintln!("{} {}", style("✗").red().bold(), message);
        } else {
            eprintln!("✗ {}", message);
        }
    }

    pub fn print_info(&self, message: &str) {
        if self.quiet {
            return;
        }
        if self.colored {
            println!("{} {}", style("ℹ").blue().bold(), message);
        } else {
            println!("ℹ {}", message);
        }
    }

    /// Plain line on stdout, printed even in quiet mode
    pub fn print_line(&self, line: &str) {
        println!("{}", line);
    }
}

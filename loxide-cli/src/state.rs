use loxide::KEYWORDS;

/// Buffers REPL lines until braces balance, so blocks, functions, and
/// classes can be typed across several lines.
pub struct ReplState {
    buffer: String,
    brace_depth: usize,
}

impl ReplState {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            brace_depth: 0,
        }
    }

    pub fn prompt(&self) -> String {
        if self.brace_depth == 0 {
            "> ".to_string()
        } else {
            format!("..{} ", self.brace_depth)
        }
    }

    /// Returns true when the buffered input is ready to execute
    pub fn process_line(&mut self, line: &str) -> bool {
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => self.brace_depth = self.brace_depth.saturating_sub(1),
                _ => {}
            }
        }

        self.buffer.push_str(line);
        self.buffer.push('\n');

        self.brace_depth == 0
    }

    pub fn take_buffer(&mut self) -> String {
        self.brace_depth = 0;
        std::mem::take(&mut self.buffer)
    }

    pub fn cancel(&mut self) {
        self.buffer.clear();
        self.brace_depth = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// A bare expression (no trailing ';') gets wrapped in a print statement
    pub fn should_auto_print(input: &str) -> bool {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            return false;
        }

        // Ignore a trailing line comment when deciding
        let code = match trimmed.find("//") {
            Some(idx) => trimmed[..idx].trim(),
            None => trimmed,
        };
        if code.is_empty() {
            return false;
        }

        // Blocks and finished statements stay as they are
        if code.ends_with('}') || code.ends_with(';') {
            return false;
        }

        // A leading keyword means an unfinished statement; let the parser
        // produce its own error instead of wrapping it
        for (keyword, _) in KEYWORDS {
            if let Some(rest) = code.strip_prefix(keyword)
                && (rest.is_empty() || rest.starts_with(' '))
            {
                return false;
            }
        }

        true
    }

    pub fn wrap_for_print(input: &str) -> String {
        format!("print {};", input.trim())
    }
}

use std::io::Write;

/// Destination for human-readable progress and relayed benchmark output
pub trait OutputSink {
    fn write_line(&mut self, line: &str);
}

/// Writes each line to the process's stdout and flushes it immediately
#[derive(Debug, Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        Self
    }
}

impl OutputSink for StdoutSink {
    fn write_line(&mut self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        // A closed stdout (e.g. `| head`) must not abort the launch
        let _ = writeln!(stdout, "{line}");
        let _ = stdout.flush();
    }
}

/// Collects lines in memory
impl OutputSink for Vec<String> {
    fn write_line(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

impl<T: OutputSink + ?Sized> OutputSink for &mut T {
    fn write_line(&mut self, line: &str) {
        (**self).write_line(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit(sink: &mut impl OutputSink) {
        sink.write_line("first");
        sink.write_line("second");
    }

    #[test]
    fn test_vec_sink_through_reference() {
        let mut lines: Vec<String> = Vec::new();
        emit(&mut &mut lines);
        assert_eq!(lines, vec!["first", "second"]);
    }
}

use fastrace::local::LocalSpan;
use fastrace::Event;
use log::{Log, Metadata, Record};

/// Writes log records to the console and, when traces are exported,
/// attaches the same records to the current local span as events.
pub struct RunLogger {
    console: env_logger::Logger,
    span_events: bool,
}

impl RunLogger {
    pub fn new(console: env_logger::Logger, span_events: bool) -> Self {
        Self {
            console,
            span_events,
        }
    }
}

impl Log for RunLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.console.matches(record) {
            return;
        }
        self.console.log(record);
        if self.span_events {
            let event = Event::new(record.level().as_str()).with_properties(|| {
                [
                    ("target", record.target().to_string()),
                    ("message", record.args().to_string()),
                ]
            });
            LocalSpan::add_event(event);
        }
    }

    fn flush(&self) {
        self.console.flush();
    }
}

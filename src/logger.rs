use std::cell::RefCell;
use std::fs::{File, create_dir_all};
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Log event types that determine which receivers should log the message
///
/// Ordered from the most detailed to the coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogEvent {
    /// Single selection decisions (candidates, biases, draw, winner)
    Selection,
    /// Rotation run summaries (per-banner views and clicks)
    Rotation,
    /// Scenario-level data (comparisons between variants)
    Scenario,
    /// Validation results (pass/fail messages)
    Validation,
}

const ALL_EVENTS: [LogEvent; 4] = [
    LogEvent::Selection,
    LogEvent::Rotation,
    LogEvent::Scenario,
    LogEvent::Validation,
];

/// Trait for log receivers that can receive log messages
pub trait LogReceiver {
    /// Check if this receiver should handle the given log event
    fn should_log(&self, event: LogEvent) -> bool;

    /// Write a string to this receiver
    fn write(&mut self, s: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// Console log receiver (writes to stdout)
pub struct ConsoleReceiver {
    enabled_events: Vec<LogEvent>,
}

impl ConsoleReceiver {
    pub fn new(enabled_events: Vec<LogEvent>) -> Box<dyn LogReceiver> {
        Box::new(Self { enabled_events })
    }
}

impl LogReceiver for ConsoleReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        print!("{}", s);
        io::stdout().flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// File log receiver
pub struct FileReceiver {
    file: File,
    enabled_events: Vec<LogEvent>,
}

impl FileReceiver {
    /// Create a receiver writing to `path`, truncating an existing file and creating parent directories
    pub fn new(path: &Path, enabled_events: Vec<LogEvent>) -> io::Result<Box<dyn LogReceiver>> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Box::new(Self { file, enabled_events }))
    }
}

impl LogReceiver for FileReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        write!(self.file, "{}", s)?;
        self.file.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// In-memory receiver, handy for inspecting log output
pub struct MemoryReceiver {
    buffer: Rc<RefCell<String>>,
    enabled_events: Vec<LogEvent>,
}

impl MemoryReceiver {
    /// Returns the receiver and a handle to the buffer it fills
    pub fn new(enabled_events: Vec<LogEvent>) -> (Box<dyn LogReceiver>, Rc<RefCell<String>>) {
        let buffer = Rc::new(RefCell::new(String::new()));
        (Box::new(Self { buffer: buffer.clone(), enabled_events }), buffer)
    }
}

impl LogReceiver for MemoryReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        self.buffer.borrow_mut().push_str(s);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub type ReceiverId = usize;

static RECEIVER_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Logger fanning messages out to receivers by event
pub struct Logger {
    receivers: Vec<(ReceiverId, Box<dyn LogReceiver>)>,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            receivers: Vec::new(),
        }
    }

    /// Add a receiver to the logger and return its unique ID
    pub fn add_receiver(&mut self, receiver: Box<dyn LogReceiver>) -> ReceiverId {
        let id = RECEIVER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.receivers.push((id, receiver));
        id
    }

    pub fn remove_receiver(&mut self, id: ReceiverId) {
        self.receivers.retain(|(receiver_id, _)| *receiver_id != id);
    }

    /// True if any receiver listens to `event`, lets callers skip building expensive messages
    pub fn is_enabled(&self, event: LogEvent) -> bool {
        self.receivers.iter().any(|(_, receiver)| receiver.should_log(event))
    }

    pub fn log(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        for (_, receiver) in &mut self.receivers {
            if receiver.should_log(event) {
                receiver.write(message)?;
            }
        }
        Ok(())
    }

    pub fn logln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log(event, &format!("{}\n", message))
    }

    /// Write a prefixed line to `event` and every coarser event.
    /// Each receiver receives the message only once, even if it listens to several of them.
    fn log_with_prefix(&mut self, event: LogEvent, prefix: &str, message: &str) -> io::Result<()> {
        let formatted_message = format!("{} {}\n", prefix, message);
        for (_, receiver) in &mut self.receivers {
            let should_receive = ALL_EVENTS
                .iter()
                .filter(|&&evt| evt >= event)
                .any(|&evt| receiver.should_log(evt));
            if should_receive {
                receiver.write(&formatted_message)?;
            }
        }
        Ok(())
    }

    /// Error line, propagated to `event` and every coarser event
    pub fn errln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log_with_prefix(event, "ERROR", message)
    }

    /// Warning line, propagated to `event` and every coarser event
    pub fn warnln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log_with_prefix(event, "WARNING", message)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        for (_, receiver) in &mut self.receivers {
            receiver.flush()?;
        }
        Ok(())
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}


/// Sanitize a string to be used as a filename
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// Macro to log a formatted string (like println! but for logger)
#[macro_export]
macro_rules! logln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.logln($event, &format!($($arg)*));
        }
    };
}

/// Macro to log a formatted string without newline (like print! but for logger)
#[macro_export]
macro_rules! log {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.log($event, &format!($($arg)*));
        }
    };
}

/// Error line to the event and every coarser event, prefixed with "ERROR"
#[macro_export]
macro_rules! errln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.errln($event, &format!($($arg)*));
        }
    };
}

/// Warning line to the event and every coarser event, prefixed with "WARNING"
#[macro_export]
macro_rules! warnln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.warnln($event, &format!($($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("view quota"), "view_quota");
        assert_eq!(sanitize_filename("place/header"), "place_header");
        assert_eq!(sanitize_filename("run:1"), "run_1");
    }

    #[test]
    fn test_log_routes_by_event() {
        let mut logger = Logger::new();
        let (receiver, buffer) = MemoryReceiver::new(vec![LogEvent::Rotation]);
        logger.add_receiver(receiver);

        logln!(&mut logger, LogEvent::Selection, "draw {}", 0.25);
        logln!(&mut logger, LogEvent::Rotation, "served {}", 10);
        assert_eq!(buffer.borrow().as_str(), "served 10\n");
    }

    #[test]
    fn test_errln_reaches_coarser_receivers_once() {
        let mut logger = Logger::new();
        let (receiver, buffer) = MemoryReceiver::new(vec![LogEvent::Rotation, LogEvent::Validation]);
        logger.add_receiver(receiver);
        let (detail, detail_buffer) = MemoryReceiver::new(vec![LogEvent::Selection]);
        logger.add_receiver(detail);

        errln!(&mut logger, LogEvent::Selection, "no eligible banner");
        assert_eq!(buffer.borrow().as_str(), "ERROR no eligible banner\n");
        assert_eq!(detail_buffer.borrow().as_str(), "ERROR no eligible banner\n");

        warnln!(&mut logger, LogEvent::Scenario, "share off");
        assert!(buffer.borrow().ends_with("WARNING share off\n"));
        assert!(!detail_buffer.borrow().contains("share off"), "finer receivers do not get coarser events");
    }

    #[test]
    fn test_remove_receiver() {
        let mut logger = Logger::new();
        let (receiver, buffer) = MemoryReceiver::new(vec![LogEvent::Validation]);
        let id = logger.add_receiver(receiver);
        assert!(logger.is_enabled(LogEvent::Validation));
        logger.remove_receiver(id);
        assert!(!logger.is_enabled(LogEvent::Validation));
        logln!(&mut logger, LogEvent::Validation, "dropped");
        assert!(buffer.borrow().is_empty());
    }
}

//! Event logging for the pass pipeline.
//!
//! Every rewrite a pass commits, and every notable decision it makes, can be
//! recorded as an [`Event`]. Logs are append-only and thread-safe, so methods
//! processed in parallel record into the same [`EventLog`] through a shared
//! reference.
//!
//! Events are mirrored to the [`log`] facade at `trace` level (diagnostics at
//! their own level), so nothing is lost when the log itself is ignored.
//!
//! # Example
//!
//! ```rust
//! use optscope::compiler::{EventKind, EventLog};
//! use optscope::ir::{InsnId, MethodRef};
//!
//! let log = EventLog::new();
//! let method = MethodRef::parse("LFoo;.bar:()V")?;
//!
//! log.record(EventKind::BranchFolded)
//!     .at(method, InsnId::new(3))
//!     .message("if-eqz v0 is always taken");
//! log.info("constant propagation finished");
//!
//! assert_eq!(log.count_kind(EventKind::BranchFolded), 1);
//! assert_eq!(log.summary(), "1 branch folded");
//! # Ok::<(), optscope::Error>(())
//! ```

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use log::{error, info, trace, warn};

use crate::ir::{InsnId, MethodRef};

/// Categories of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A value producer was replaced by a constant load.
    ConstantMaterialized,
    /// A conditional branch with a known outcome became a `goto`.
    BranchFolded,
    /// A dead instruction was removed.
    InstructionRemoved,
    /// A static write of a value the field already holds was removed.
    RedundantWriteRemoved,
    /// A heap write with no observable effect was removed.
    DeadWriteRemoved,
    /// A static field value was moved into the class's encoded values.
    FieldEncoded,
    /// A class initializer with nothing left to do was deleted.
    InitializerRemoved,

    /// A side-effect summary was published.
    SummaryComputed,
    /// The summary cache could not be used and was rebuilt.
    CacheRebuilt,

    /// A pass started.
    PassStarted,
    /// A pass completed.
    PassCompleted,

    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
    /// A pass failed on a method.
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            // Transformations
            Self::ConstantMaterialized => "constant materialized",
            Self::BranchFolded => "branch folded",
            Self::InstructionRemoved => "instruction removed",
            Self::RedundantWriteRemoved => "redundant write removed",
            Self::DeadWriteRemoved => "dead write removed",
            Self::FieldEncoded => "field encoded",
            Self::InitializerRemoved => "initializer removed",
            // Analysis
            Self::SummaryComputed => "summary computed",
            Self::CacheRebuilt => "cache rebuilt",
            // Engine
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            // Diagnostic
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a code transformation.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::ConstantMaterialized
                | Self::BranchFolded
                | Self::InstructionRemoved
                | Self::RedundantWriteRemoved
                | Self::DeadWriteRemoved
                | Self::FieldEncoded
                | Self::InitializerRemoved
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The method where the event occurred (if applicable).
    pub method: Option<MethodRef>,
    /// The instruction the event concerns (if applicable).
    pub location: Option<InsnId>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            method: None,
            location: None,
            message: message.into(),
            pass: None,
        }
    }

    fn emit(&self) {
        match self.kind {
            EventKind::Info => info!("{self}"),
            EventKind::Warning => warn!("{self}"),
            EventKind::Error => error!("{self}"),
            _ => trace!("{self}"),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(pass) = &self.pass {
            write!(f, " {pass}:")?;
        }
        if let Some(method) = &self.method {
            write!(f, " {method}")?;
        }
        if let Some(location) = self.location {
            write!(f, " {location}")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the
/// builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    method: Option<MethodRef>,
    location: Option<InsnId>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            method: None,
            location: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the method and instruction the event concerns.
    pub fn at(mut self, method: MethodRef, location: InsnId) -> Self {
        self.method = Some(method);
        self.location = Some(location);
        self
    }

    /// Sets only the method (for method-level events).
    pub fn method(mut self, method: MethodRef) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.pass = Some(pass_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        let event = Event {
            kind: self.kind,
            method: self.method.take(),
            location: self.location.take(),
            message,
            pass: self.pass.take(),
        };
        self.log.push(event);
    }
}

/// Collection of events recorded by passes.
///
/// This type is thread-safe: events can be appended concurrently from
/// multiple threads using shared references (`&self`).
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        for (_, event) in &self.events {
            new_log.events.push(event.clone());
        }
        new_log
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    fn push(&self, event: Event) {
        event.emit();
        self.events.push(event);
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The event is added when the builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.push(Event::new(EventKind::Warning, message));
    }

    /// Appends every event of `other`. Events are not mirrored to the log
    /// facade a second time.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events for a specific method.
    pub fn filter_method<'a>(&'a self, method: &'a MethodRef) -> impl Iterator<Item = &'a Event> {
        self.iter().filter(move |e| e.method.as_ref() == Some(method))
    }

    /// Takes a copy of the events.
    ///
    /// `boxcar::Vec` is append-only and cannot be drained, so this clones.
    #[must_use]
    pub fn take(&self) -> EventLog {
        self.clone()
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for (_, event) in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of transformation events.
    #[must_use]
    pub fn transformation_count(&self) -> usize {
        self.iter().filter(|e| e.kind.is_transformation()).count()
    }

    /// Returns the number of distinct methods with events.
    #[must_use]
    pub fn methods_affected(&self) -> usize {
        self.iter()
            .filter_map(|e| e.method.as_ref())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Generates a human-readable summary of all events.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let counts = self.count_by_kind();

        // Only transformations are interesting at a glance
        let mut parts: Vec<String> = counts
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = Box<dyn Iterator<Item = &'a Event> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl Extend<Event> for EventLog {
    fn extend<T: IntoIterator<Item = Event>>(&mut self, iter: T) {
        for event in iter {
            self.events.push(event);
        }
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        let log = Self::new();
        for event in iter {
            log.events.push(event);
        }
        log
    }
}

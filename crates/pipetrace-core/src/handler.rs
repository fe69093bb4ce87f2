//! Callback handler - the entry point an instrumented pipeline calls into
//!
//! A [`CallbackHandler`] owns one session's state: the event index, the
//! current trace, the session context stamped onto sink records, and an
//! optional forwarder mirroring every event to a remote sink. It is created
//! explicitly by the caller and cleared with [`CallbackHandler::flush_event_logs`].

use crate::config::{ConfigError, ConfigResult, HandlerSettings};
use crate::error::TraceResult;
use crate::forwarder::SinkForwarder;
use crate::index::EventIndex;
use crate::pairing::{pair_events, EventPair};
use crate::record::{EventRecord, EventType};
use crate::session::SessionId;
use crate::sink::{ApiKeyValidator, SessionContext, SinkRecord};
use crate::stats::{time_stats, EventStats};
use crate::trace::{render_trace, write_trace_dump, TraceLine, TraceMap, TraceState};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Records, pairs and renders pipeline events
pub struct CallbackHandler {
    settings: HandlerSettings,
    index: EventIndex,
    trace: Mutex<TraceState>,
    user_id: RwLock<Option<String>>,
    session_id: RwLock<Option<SessionId>>,
    login_url: Option<String>,
    forwarder: Option<SinkForwarder>,
}

impl CallbackHandler {
    pub fn new(settings: HandlerSettings) -> Self {
        Self {
            settings,
            index: EventIndex::new(),
            trace: Mutex::new(TraceState::new()),
            user_id: RwLock::new(None),
            session_id: RwLock::new(None),
            login_url: None,
            forwarder: None,
        }
    }

    /// Mirror every recorded event through `forwarder`
    pub fn with_forwarder(mut self, forwarder: SinkForwarder) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// URL shown to users whose API key is missing
    pub fn with_login_url(mut self, login_url: Option<String>) -> Self {
        self.login_url = login_url;
        self
    }

    pub fn settings(&self) -> &HandlerSettings {
        &self.settings
    }

    pub fn forwarder(&self) -> Option<&SinkForwarder> {
        self.forwarder.as_ref()
    }

    /// Detach the forwarder, e.g. to shut it down
    pub fn take_forwarder(&mut self) -> Option<SinkForwarder> {
        self.forwarder.take()
    }

    // =========================================================================
    // Session setup
    // =========================================================================

    /// Generate a session identifier and stamp it on subsequent records
    pub fn start_session(&self) -> SessionId {
        let id = SessionId::generate();
        *self.session_id.write() = Some(id.clone());

        println!("Please keep a note of your session ID: {}", id);
        info!("Session ID: {}", id);

        id
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id.read().clone()
    }

    /// Resolve an API key to a user id and stamp it on subsequent records
    pub async fn set_api_key(
        &self,
        api_key: Option<&str>,
        validator: &dyn ApiKeyValidator,
    ) -> ConfigResult<String> {
        let api_key = match api_key {
            Some(key) if !key.trim().is_empty() => key,
            _ => {
                let err = ConfigError::MissingApiKey {
                    login_url: self.login_url.clone(),
                };
                error!("{}", err);
                return Err(err);
            }
        };

        let user_id = validator.validate(api_key).await?;
        info!("API key authenticated, user ID: {}", user_id);
        *self.user_id.write() = Some(user_id.clone());
        Ok(user_id)
    }

    pub fn user_id(&self) -> Option<String> {
        self.user_id.read().clone()
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Record an event start captured now
    pub fn on_event_start(
        &self,
        event_type: EventType,
        payload: Option<serde_json::Value>,
        event_id: &str,
        parent_id: &str,
    ) -> String {
        self.record_start(EventRecord::new(event_type, payload, event_id), parent_id)
    }

    /// Record an event end captured now
    pub fn on_event_end(
        &self,
        event_type: EventType,
        payload: Option<serde_json::Value>,
        event_id: &str,
    ) {
        self.record_end(EventRecord::new(event_type, payload, event_id));
    }

    /// Index a start record and mirror it. Returns the record's id.
    pub fn record_start(&self, record: EventRecord, parent_id: &str) -> String {
        let id = record.id().to_string();
        if self
            .settings
            .event_starts_to_ignore
            .contains(record.event_type())
        {
            debug!("Ignoring start of {} event {}", record.event_type(), id);
            return id;
        }

        let record = self.index.insert(record);
        self.forward(&record, parent_id);
        id
    }

    /// Index an end record and mirror it.
    ///
    /// This also empties the current trace map, even mid-trace.
    pub fn record_end(&self, record: EventRecord) {
        if self
            .settings
            .event_ends_to_ignore
            .contains(record.event_type())
        {
            debug!(
                "Ignoring end of {} event {}",
                record.event_type(),
                record.id()
            );
            return;
        }

        let record = self.index.insert(record);
        self.forward(&record, "");
        self.trace.lock().reset_map();
    }

    fn forward(&self, record: &EventRecord, parent_id: &str) {
        let Some(forwarder) = &self.forwarder else {
            return;
        };
        let context = self.session_context();
        forwarder.forward(SinkRecord::from_event(record, parent_id, &context));
    }

    fn session_context(&self) -> SessionContext {
        SessionContext {
            user_id: self.user_id.read().clone(),
            session_id: self.session_id.read().clone(),
            trace_type: self.trace.lock().trace_id().map(str::to_string),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Events of one type, or every event in arrival order
    pub fn get_events(&self, event_type: Option<&EventType>) -> Vec<Arc<EventRecord>> {
        self.index.events(event_type)
    }

    /// Pair events by id, for one type or all events
    pub fn get_event_pairs(&self, event_type: Option<&EventType>) -> TraceResult<Vec<EventPair>> {
        pair_events(&self.index.events(event_type))
    }

    /// Start/end pairs of model invocations
    pub fn get_llm_inputs_outputs(&self) -> TraceResult<Vec<EventPair>> {
        self.get_event_pairs(Some(&EventType::Llm))
    }

    /// Timing statistics over the pairs of one type, or all pairs
    pub fn get_event_time_info(&self, event_type: Option<&EventType>) -> TraceResult<EventStats> {
        time_stats(&self.get_event_pairs(event_type)?)
    }

    pub fn event_pairs_by_type(&self) -> HashMap<EventType, Vec<Arc<EventRecord>>> {
        self.index.by_type_snapshot()
    }

    pub fn event_pairs_by_id(&self) -> HashMap<String, Vec<Arc<EventRecord>>> {
        self.index.by_id_snapshot()
    }

    pub fn sequential_events(&self) -> Vec<Arc<EventRecord>> {
        self.index.events(None)
    }

    pub fn index(&self) -> &EventIndex {
        &self.index
    }

    /// Clear all recorded events
    pub fn flush_event_logs(&self) {
        self.index.flush();
    }

    // =========================================================================
    // Traces
    // =========================================================================

    /// Begin a trace, discarding the in-flight trace map
    pub fn start_trace(&self, trace_id: Option<&str>) {
        self.trace.lock().start(trace_id);
        debug!("Trace started: {:?}", trace_id);
    }

    /// Install the finished trace's map and print it if configured to
    pub fn end_trace(&self, trace_id: Option<&str>, trace_map: Option<TraceMap>) {
        self.trace.lock().end(trace_map);
        debug!("Trace ended: {:?}", trace_id);

        if self.settings.print_trace_on_end {
            self.print_trace_map();
        }
    }

    pub fn current_trace_id(&self) -> Option<String> {
        self.trace.lock().trace_id().map(str::to_string)
    }

    pub fn trace_map(&self) -> TraceMap {
        self.trace.lock().map().clone()
    }

    /// Render the current trace map as tree lines
    pub fn render_trace_map(&self) -> Vec<TraceLine> {
        let map = self.trace_map();
        render_trace(&map, &self.index, self.settings.max_render_depth)
    }

    /// Write the current trace as a bracketed text dump
    pub fn write_trace_map<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let trace_id = self.current_trace_id();
        let lines = self.render_trace_map();
        write_trace_dump(out, trace_id.as_deref(), &lines)
    }

    /// Print the current trace to stdout
    pub fn print_trace_map(&self) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        if let Err(e) = self.write_trace_map(&mut out) {
            warn!("Failed to print trace map: {}", e);
        }
    }
}

impl Default for CallbackHandler {
    fn default() -> Self {
        Self::new(HandlerSettings::default())
    }
}

//! Message logging for post-run analysis.
//!
//! A logged message is sampled after every tick. A new row `[time, fields...]`
//! is stored when the message has a write the logger has not seen yet and at
//! least `period` nanoseconds have passed since the previous row.

use std::collections::HashMap;
use std::io::Write;
use std::ops::Range;
use std::path::Path;

use crate::error::MessagingError;
use crate::messaging::bus::{MessageBus, MessageId};
use crate::messaging::FieldDesc;
use crate::types::{ProcessId, SimTime};

#[derive(Clone, Debug)]
struct LogChannel {
    name: String,
    process: ProcessId,
    message: MessageId,
    period: SimTime,
    layout: Vec<(String, usize)>,
    last_log_time: Option<SimTime>,
    last_count: u64,
    rows: Vec<Vec<f64>>,
}

/// Collects time series of selected messages.
#[derive(Clone, Debug, Default)]
pub struct MessageLogger {
    channels: Vec<LogChannel>,
    index: HashMap<String, usize>,
}

impl MessageLogger {
    /// Creates an empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts logging a message.
    ///
    /// Registering the same name twice in the same process only updates its
    /// period. Names are unique across processes.
    ///
    /// # Arguments
    /// * `name` - Message name, also used to pull the data
    /// * `process` - Process whose bus holds the message
    /// * `message` - Message handle in that bus
    /// * `period` - Minimum spacing between rows; 0 logs every write
    /// * `layout` - Field layout used for named field selection
    pub fn add(
        &mut self,
        name: &str,
        process: ProcessId,
        message: MessageId,
        period: SimTime,
        layout: &[FieldDesc],
    ) -> Result<(), MessagingError> {
        if let Some(&idx) = self.index.get(name) {
            let channel = &mut self.channels[idx];
            if channel.process != process {
                return Err(MessagingError::DuplicateName(name.to_string()));
            }
            channel.period = period;
            return Ok(());
        }
        self.index.insert(name.to_string(), self.channels.len());
        self.channels.push(LogChannel {
            name: name.to_string(),
            process,
            message,
            period,
            layout: layout.iter().map(|f| (f.name.to_string(), f.len)).collect(),
            last_log_time: None,
            last_count: 0,
            rows: Vec::new(),
        });
        Ok(())
    }

    /// Process of a logged message.
    pub fn process_of(&self, name: &str) -> Option<ProcessId> {
        self.index.get(name).map(|&i| self.channels[i].process)
    }

    /// Samples every channel that lives in `process`.
    pub fn record(&mut self, process: ProcessId, bus: &MessageBus) {
        for channel in self.channels.iter_mut().filter(|c| c.process == process) {
            let Ok(Some((header, data))) = bus.latest_entry(channel.message) else {
                continue;
            };
            if header.write_count <= channel.last_count {
                continue;
            }
            let due = match channel.last_log_time {
                Some(last) => header.write_time >= last.saturating_add(channel.period),
                None => true,
            };
            if !due {
                continue;
            }
            let mut row = Vec::with_capacity(data.len() + 1);
            row.push(header.write_time as f64);
            row.extend_from_slice(data);
            channel.rows.push(row);
            channel.last_log_time = Some(header.write_time);
            channel.last_count = header.write_count;
        }
    }

    /// Returns true if `name` is being logged.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of rows stored for `name`.
    pub fn row_count(&self, name: &str) -> usize {
        self.index
            .get(name)
            .map(|&i| self.channels[i].rows.len())
            .unwrap_or(0)
    }

    /// Pulls logged rows as `[time_ns, selected fields...]`.
    ///
    /// `selector` is either a message name or `message.field`. The optional
    /// `range` indexes into the selected field (or the whole payload).
    ///
    /// # Returns
    /// `None` if the message is not logged or the field does not exist.
    pub fn pull(&self, selector: &str, range: Option<Range<usize>>) -> Option<Vec<Vec<f64>>> {
        let (channel, field_span) = self.resolve(selector)?;
        let span = match range {
            Some(r) if r.start <= r.end && r.end <= field_span.len() => {
                field_span.start + r.start..field_span.start + r.end
            }
            Some(_) => return None,
            None => field_span,
        };
        Some(
            channel
                .rows
                .iter()
                .map(|row| {
                    let mut out = Vec::with_capacity(span.len() + 1);
                    out.push(row[0]);
                    out.extend_from_slice(&row[1 + span.start..1 + span.end]);
                    out
                })
                .collect(),
        )
    }

    /// Column headers for a logged message: `time_ns` then `field[i]`.
    pub fn headers(&self, name: &str) -> Option<Vec<String>> {
        let channel = &self.channels[*self.index.get(name)?];
        let mut headers = vec!["time_ns".to_string()];
        for (field, len) in &channel.layout {
            if *len == 1 {
                headers.push(field.clone());
            } else {
                headers.extend((0..*len).map(|i| format!("{field}[{i}]")));
            }
        }
        Some(headers)
    }

    /// Writes a logged message as CSV.
    pub fn write_csv<W: Write>(&self, name: &str, mut writer: W) -> std::io::Result<()> {
        let not_logged = || {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("message '{name}' is not logged"),
            )
        };
        let headers = self.headers(name).ok_or_else(not_logged)?;
        let rows = self.pull(name, None).ok_or_else(not_logged)?;

        writeln!(writer, "{}", headers.join(","))?;
        for row in rows {
            let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(writer, "{}", line.join(","))?;
        }
        Ok(())
    }

    /// Writes a logged message to a CSV file.
    pub fn save_csv(&self, name: &str, path: impl AsRef<Path>) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(name, std::io::BufWriter::new(file))
    }

    /// Drops every stored row, keeping the channels.
    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.rows.clear();
            channel.last_log_time = None;
            channel.last_count = 0;
        }
    }

    /// Names of every logged message.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.name.as_str())
    }

    fn resolve(&self, selector: &str) -> Option<(&LogChannel, Range<usize>)> {
        if let Some(&idx) = self.index.get(selector) {
            let channel = &self.channels[idx];
            let total: usize = channel.layout.iter().map(|(_, len)| len).sum();
            return Some((channel, 0..total));
        }
        let (name, field) = selector.rsplit_once('.')?;
        let channel = &self.channels[*self.index.get(name)?];
        let mut offset = 0;
        for (candidate, len) in &channel.layout {
            if candidate == field {
                return Some((channel, offset..offset + len));
            }
            offset += len;
        }
        None
    }
}

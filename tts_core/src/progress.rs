//! Progress notifications emitted while loading and synthesizing.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A resource finished loading; `current` is 1-based.
    Loading {
        current: usize,
        total: usize,
        resource: String,
    },
    /// A denoising step is about to run.
    Denoising {
        step: usize,
        total_steps: usize,
        chunk_index: usize,
        total_chunks: usize,
        progress: f32,
    },
}

impl ProgressEvent {
    /// Build a denoising event. `step` is 1-based, `chunk_index` 0-based; the
    /// overall fraction assumes every step of every chunk costs the same.
    pub fn denoising(step: usize, total_steps: usize, chunk_index: usize, total_chunks: usize) -> Self {
        let chunks = total_chunks.max(1) as f32;
        let steps = total_steps.max(1) as f32;
        let progress = chunk_index as f32 / chunks + step as f32 / (steps * chunks);
        ProgressEvent::Denoising {
            step,
            total_steps,
            chunk_index,
            total_chunks,
            progress,
        }
    }
}

/// Receiver of progress events. Called synchronously on the synthesis thread.
pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent);
}

impl<F: FnMut(ProgressEvent)> ProgressSink for F {
    fn emit(&mut self, event: ProgressEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&mut self, _event: ProgressEvent) {}
}

/// Counts resources as they load and reports each one.
pub struct LoadTracker<'a> {
    current: usize,
    total: usize,
    sink: &'a mut dyn ProgressSink,
}

impl<'a> LoadTracker<'a> {
    pub fn new(total: usize, sink: &'a mut dyn ProgressSink) -> Self {
        Self { current: 0, total, sink }
    }

    pub fn loaded(&mut self, resource: &str) {
        self.current += 1;
        tracing::debug!(current = self.current, total = self.total, resource, "loaded");
        self.sink.emit(ProgressEvent::Loading {
            current: self.current,
            total: self.total,
            resource: resource.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denoising_fraction() {
        let first = ProgressEvent::denoising(1, 4, 0, 2);
        let last = ProgressEvent::denoising(4, 4, 1, 2);
        let mid = ProgressEvent::denoising(2, 4, 1, 2);
        let fraction = |e: &ProgressEvent| match e {
            ProgressEvent::Denoising { progress, .. } => *progress,
            _ => unreachable!(),
        };
        assert!((fraction(&first) - 0.125).abs() < 1e-6);
        assert!((fraction(&mid) - 0.75).abs() < 1e-6);
        assert!((fraction(&last) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let json = serde_json::to_value(ProgressEvent::Loading {
            current: 1,
            total: 6,
            resource: "tts.json".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "loading");
        assert_eq!(json["resource"], "tts.json");

        let json = serde_json::to_value(ProgressEvent::denoising(1, 2, 0, 1)).unwrap();
        assert_eq!(json["type"], "denoising");
        assert_eq!(json["total_steps"], 2);
    }

    #[test]
    fn test_load_tracker_counts_up() {
        let mut events = Vec::new();
        {
            let mut sink = |e: ProgressEvent| events.push(e);
            let mut tracker = LoadTracker::new(2, &mut sink);
            tracker.loaded("a");
            tracker.loaded("b");
        }
        assert_eq!(
            events,
            vec![
                ProgressEvent::Loading { current: 1, total: 2, resource: "a".into() },
                ProgressEvent::Loading { current: 2, total: 2, resource: "b".into() },
            ]
        );
    }
}

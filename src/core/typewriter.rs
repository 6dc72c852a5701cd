/// Typewriter sequencer — timed, cancellable reveal of scene text.
///
/// A reveal publishes growing prefixes of a text into a [`RevealPublisher`],
/// one character per tick. Every reveal owns a generation number; the
/// publisher only accepts frames from the current generation, so a
/// cancelled or superseded reveal can never overwrite newer text.

use std::str::CharIndices;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Per-character delay used when nothing else is configured.
pub const DEFAULT_CHAR_DELAY: Duration = Duration::from_millis(30);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevealError {
    #[error("reveal interval must be greater than zero")]
    ZeroInterval,
    #[error("no tokio runtime available to drive the reveal")]
    NoRuntime,
}

/// Snapshot of the text currently on display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealFrame {
    generation: u64,
    text: String,
    complete: bool,
}

impl Default for RevealFrame {
    fn default() -> Self {
        Self {
            generation: 0,
            text: String::new(),
            complete: true,
        }
    }
}

impl RevealFrame {
    /// The reveal this frame belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The revealed prefix, or the full text once complete.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Terminal signal: the whole text is on display.
    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

/// Shared sink for reveal frames. Readers subscribe to a watch channel.
#[derive(Debug, Clone)]
pub struct RevealPublisher {
    tx: Arc<watch::Sender<RevealFrame>>,
}

impl Default for RevealPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl RevealPublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RevealFrame::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<RevealFrame> {
        self.tx.subscribe()
    }

    /// A copy of the latest frame.
    pub fn current(&self) -> RevealFrame {
        self.tx.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    /// Open a new generation with empty text. Frames from older
    /// generations are rejected from this point on.
    fn begin(&self, complete: bool) -> u64 {
        let mut generation = 0;
        self.tx.send_modify(|frame| {
            frame.generation += 1;
            frame.text.clear();
            frame.complete = complete;
            generation = frame.generation;
        });
        generation
    }

    /// Replace the display with `text` in a fresh, completed generation.
    pub fn finish(&self, text: &str) -> u64 {
        let mut generation = 0;
        self.tx.send_modify(|frame| {
            frame.generation += 1;
            frame.text.clear();
            frame.text.push_str(text);
            frame.complete = true;
            generation = frame.generation;
        });
        generation
    }

    /// Clear the display and invalidate any in-flight reveal.
    pub fn reset(&self) -> u64 {
        self.begin(true)
    }

    /// Write a frame for `generation`. Returns false, writing nothing,
    /// when that generation has been superseded.
    fn publish(&self, generation: u64, text: &str, complete: bool) -> bool {
        self.tx.send_if_modified(|frame| {
            if frame.generation != generation {
                return false;
            }
            frame.text.clear();
            frame.text.push_str(text);
            frame.complete = complete;
            true
        })
    }
}

/// Lazy iterator over the growing prefixes of a string, one Unicode
/// scalar value longer each step.
#[derive(Debug, Clone)]
pub struct Prefixes<'a> {
    text: &'a str,
    indices: CharIndices<'a>,
}

impl<'a> Iterator for Prefixes<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.text;
        self.indices
            .next()
            .map(|(start, ch)| &text[..start + ch.len_utf8()])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.indices.size_hint()
    }
}

/// A text and the delay between revealed characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typewriter {
    text: String,
    interval: Duration,
}

impl Typewriter {
    pub fn new(text: impl Into<String>, interval: Duration) -> Result<Self, RevealError> {
        if interval.is_zero() {
            return Err(RevealError::ZeroInterval);
        }
        Ok(Self {
            text: text.into(),
            interval,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn prefixes(&self) -> Prefixes<'_> {
        Prefixes {
            text: &self.text,
            indices: self.text.char_indices(),
        }
    }

    /// Number of ticks the full reveal takes.
    pub fn steps(&self) -> usize {
        self.text.chars().count()
    }

    /// Start revealing into `publisher` on the current tokio runtime.
    ///
    /// The publisher moves to a new generation before this returns, so any
    /// older reveal is already unable to write. The first prefix appears
    /// one interval after the call; an empty text completes immediately.
    pub fn spawn(self, publisher: &RevealPublisher) -> Result<RevealHandle, RevealError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| RevealError::NoRuntime)?;

        let token = CancellationToken::new();
        if self.text.is_empty() {
            let generation = publisher.begin(true);
            return Ok(RevealHandle {
                generation,
                token,
                task: None,
            });
        }

        let generation = publisher.begin(false);
        debug!(generation, chars = self.steps(), "reveal started");

        let child = token.clone();
        let publisher = publisher.clone();
        let task = runtime.spawn(async move {
            let mut ticker =
                tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let total = self.text.len();
            for prefix in self.prefixes() {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => {
                        trace!(generation, "reveal cancelled");
                        return;
                    }
                    _ = ticker.tick() => {}
                }

                let complete = prefix.len() == total;
                if !publisher.publish(generation, prefix, complete) {
                    trace!(generation, "reveal superseded");
                    return;
                }
            }
            debug!(generation, "reveal complete");
        });

        Ok(RevealHandle {
            generation,
            token,
            task: Some(task),
        })
    }
}

/// Ownership of one in-flight reveal. Dropping the handle cancels it.
#[derive(Debug)]
pub struct RevealHandle {
    generation: u64,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RevealHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop the reveal. No tick of this reveal runs after this call.
    pub fn cancel(&self) {
        self.token.cancel();
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the reveal task has stopped, for any reason.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for RevealHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

//! File-system watcher
//!
//! One [`FileWatcher`] per glob subscription. Raw notify events are translated to
//! create/change/delete, pushed through an unbounded channel and consumed by a
//! single dispatch task, so one watcher's handler calls never overlap and arrive
//! in event order. Handler errors are logged here and never stop the stream.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;
use notify::event::{MetadataKind, ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use crate::ignore::FileMatcher;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    Create,
    Change,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn new(kind: WatchEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Receives filtered events. Every method defaults to doing nothing.
#[async_trait]
pub trait WatchHandler: Send + Sync {
    async fn on_create(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    async fn on_change(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    async fn on_delete(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

/// A running subscription. Dropping it stops dispatch.
pub struct FileWatcher {
    name: String,
    cancel: CancellationToken,
    sender: mpsc::UnboundedSender<WatchEvent>,
    task: Option<JoinHandle<()>>,
    // Keep watcher alive
    _watcher: Option<RecommendedWatcher>,
}

impl FileWatcher {
    /// Subscribe to file-system events under the matcher's root
    pub fn start(name: &str, filter: FileMatcher, handler: Arc<dyn WatchHandler>) -> Result<Self> {
        let root = filter.root().to_path_buf();
        let mut watcher = Self::detached(name, filter, handler);

        let tx = watcher.sender.clone();
        let label = watcher.name.clone();
        let mut notify_watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for translated in translate_event(event) {
                        let _ = tx.send(translated);
                    }
                }
                Err(e) => warn!(watcher = %label, "watch error: {}", e),
            },
            Config::default(),
        )?;
        notify_watcher.watch(&root, RecursiveMode::Recursive)?;

        info!(watcher = %watcher.name, root = %root.display(), "started watching");
        watcher._watcher = Some(notify_watcher);
        Ok(watcher)
    }

    /// A watcher with no file-system subscription; events arrive only via [`inject`](Self::inject)
    pub fn detached(name: &str, filter: FileMatcher, handler: Arc<dyn WatchHandler>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(dispatch_loop(
            name.to_string(),
            receiver,
            filter,
            handler,
            cancel.clone(),
        ));

        Self {
            name: name.to_string(),
            cancel,
            sender,
            task: Some(task),
            _watcher: None,
        }
    }

    /// Queue an event as if the file system had reported it
    pub fn inject(&self, event: WatchEvent) {
        let _ = self.sender.send(event);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop dispatching and wait for the dispatch task to exit
    pub async fn stop(mut self) {
        self.cancel.cancel();
        self._watcher = None;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn dispatch_loop(
    name: String,
    mut receiver: mpsc::UnboundedReceiver<WatchEvent>,
    filter: FileMatcher,
    handler: Arc<dyn WatchHandler>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = receiver.recv() => match event {
                Some(event) => dispatch(&name, &filter, handler.as_ref(), event).await,
                None => break,
            },
        }
    }
    debug!(watcher = %name, "dispatch task ended");
}

async fn dispatch(name: &str, filter: &FileMatcher, handler: &dyn WatchHandler, event: WatchEvent) {
    if !filter.accepts(&event.path) {
        trace!(watcher = %name, path = %event.path.display(), "event filtered out");
        return;
    }

    debug!(watcher = %name, kind = ?event.kind, path = %event.path.display(), "dispatching event");
    let result = match event.kind {
        WatchEventKind::Create => handler.on_create(&event.path).await,
        WatchEventKind::Change => handler.on_change(&event.path).await,
        WatchEventKind::Delete => handler.on_delete(&event.path).await,
    };

    if let Err(e) = result {
        warn!(watcher = %name, kind = ?event.kind, path = %event.path.display(), "handler failed: {}", e);
    }
}

/// Map a notify event onto create/change/delete. Renames become delete + create.
fn translate_event(event: Event) -> Vec<WatchEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => WatchEventKind::Create,
        EventKind::Remove(_) => WatchEventKind::Delete,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => WatchEventKind::Delete,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => WatchEventKind::Create,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            let mut translated = Vec::new();
            if let Some(from) = paths.next() {
                translated.push(WatchEvent::new(WatchEventKind::Delete, from));
            }
            if let Some(to) = paths.next() {
                translated.push(WatchEvent::new(WatchEventKind::Create, to));
            }
            return translated;
        }
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => return Vec::new(),
        EventKind::Modify(_) => WatchEventKind::Change,
        _ => return Vec::new(),
    };

    event
        .paths
        .into_iter()
        .map(|path| WatchEvent::new(kind, path))
        .collect()
}

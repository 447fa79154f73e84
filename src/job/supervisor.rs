//! Supervised external processes with streamed output and cancellation.
//!
//! The child's stdout and stderr share one pipe. A reader thread decodes
//! that stream into lines (lossy UTF-8) and pushes them through a channel;
//! a worker thread forwards them, in emission order, to every subscriber
//! and then records the exit state. Cancellation kills the child from any
//! thread without waiting for it.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, PipeReader, Read};
use std::path::Path;
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::command::ToolCommand;
use crate::error::TrainerError;

/// Output lines retained per job for late subscribers.
pub const BACKLOG_LINES: usize = 1000;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Lifecycle of a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Succeeded,
    /// Non-zero exit. `code` is `None` if the process died from a signal.
    Failed { code: Option<i32> },
    Killed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed { .. } | JobState::Killed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed { .. } => "failed",
            JobState::Killed => "killed",
        }
    }
}

/// Messages delivered to subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobEvent {
    /// One non-empty output line, without its line terminator.
    Line(String),
    /// The job reached a terminal state. Always the last event.
    Finished(JobState),
}

/// Identifier of a job within its supervisor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

struct Status {
    state: JobState,
    backlog: VecDeque<String>,
    subscribers: Vec<Sender<JobEvent>>,
}

struct ChildSlot {
    child: Option<Child>,
    exit: Option<ExitStatus>,
}

struct Shared {
    id: JobId,
    name: String,
    status: Mutex<Status>,
    finished: Condvar,
    child: Mutex<ChildSlot>,
    cancel_requested: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn new(id: JobId, name: String) -> Self {
        Self {
            id,
            name,
            status: Mutex::new(Status {
                state: JobState::Idle,
                backlog: VecDeque::new(),
                subscribers: Vec::new(),
            }),
            finished: Condvar::new(),
            child: Mutex::new(ChildSlot {
                child: None,
                exit: None,
            }),
            cancel_requested: AtomicBool::new(false),
        }
    }

    fn set_state(&self, state: JobState) {
        lock(&self.status).state = state;
    }

    fn publish_line(&self, line: String) {
        let mut status = lock(&self.status);
        status
            .subscribers
            .retain(|tx| tx.send(JobEvent::Line(line.clone())).is_ok());
        if status.backlog.len() == BACKLOG_LINES {
            status.backlog.pop_front();
        }
        status.backlog.push_back(line);
    }

    fn finish(&self, state: JobState) {
        let mut status = lock(&self.status);
        status.state = state;
        for tx in status.subscribers.drain(..) {
            let _ = tx.send(JobEvent::Finished(state));
        }
        self.finished.notify_all();
    }

    /// Kill and reap the child of a job whose threads could not start.
    fn abort(&self) {
        let mut slot = lock(&self.child);
        if let Some(mut child) = slot.child.take() {
            let _ = child.kill();
            slot.exit = child.wait().ok();
        }
        drop(slot);
        warn!(
            "Job {} ({}) aborted before its output could be read",
            self.id.0, self.name
        );
        self.finish(JobState::Failed { code: None });
    }

    /// Non-blocking exit check; the status is cached once observed.
    fn poll_exit(&self) -> io::Result<Option<ExitStatus>> {
        let mut slot = lock(&self.child);
        if let Some(exit) = slot.exit {
            return Ok(Some(exit));
        }
        let Some(child) = slot.child.as_mut() else {
            return Err(io::Error::other("child process handle is gone"));
        };
        let exit = child.try_wait()?;
        if exit.is_some() {
            slot.exit = exit;
            slot.child = None;
        }
        Ok(exit)
    }
}

/// Shared handle to one supervised job. Cloning is cheap.
#[derive(Clone)]
pub struct JobHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish()
    }
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.shared.id
    }

    /// Program name the job was launched with.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> JobState {
        lock(&self.shared.status).state
    }

    /// Receive this job's output.
    ///
    /// The receiver first gets the retained backlog, then live lines in
    /// emission order, and finally a single [`JobEvent::Finished`].
    pub fn subscribe(&self) -> Receiver<JobEvent> {
        let (tx, rx) = mpsc::channel();
        let mut status = lock(&self.shared.status);
        for line in &status.backlog {
            let _ = tx.send(JobEvent::Line(line.clone()));
        }
        if status.state.is_terminal() {
            let _ = tx.send(JobEvent::Finished(status.state));
        } else {
            status.subscribers.push(tx);
        }
        rx
    }

    /// Call `on_line` for every output line on a dedicated thread.
    ///
    /// The thread ends once the job finishes.
    pub fn on_line<F>(&self, mut on_line: F) -> thread::JoinHandle<()>
    where
        F: FnMut(&str) + Send + 'static,
    {
        let rx = self.subscribe();
        thread::spawn(move || {
            for event in rx {
                match event {
                    JobEvent::Line(line) => on_line(&line),
                    JobEvent::Finished(_) => break,
                }
            }
        })
    }

    /// Kill the process if it is still running.
    ///
    /// Returns immediately; the state becomes [`JobState::Killed`] once the
    /// worker observes the exit. Repeated calls and calls on finished jobs
    /// are no-ops.
    pub fn cancel(&self) {
        if self.state() != JobState::Running {
            return;
        }
        if self.shared.cancel_requested.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut slot = lock(&self.shared.child);
        if let Some(child) = slot.child.as_mut() {
            match child.kill() {
                Ok(()) => info!("Job {} ({}) cancelled", self.shared.id.0, self.shared.name),
                Err(err) => debug!("Job {} kill failed: {}", self.shared.id.0, err),
            }
        }
    }

    /// Block until the job reaches a terminal state.
    pub fn wait(&self) -> JobState {
        let mut status = lock(&self.shared.status);
        while !status.state.is_terminal() {
            status = self
                .shared
                .finished
                .wait(status)
                .unwrap_or_else(PoisonError::into_inner);
        }
        status.state
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<JobState> {
        let status = lock(&self.shared.status);
        let (status, _) = self
            .shared
            .finished
            .wait_timeout_while(status, timeout, |status| !status.state.is_terminal())
            .unwrap_or_else(PoisonError::into_inner);
        status.state.is_terminal().then_some(status.state)
    }

    /// Wait for the job and turn anything but success into an error.
    pub fn join(&self) -> Result<(), TrainerError> {
        match self.wait() {
            JobState::Succeeded => Ok(()),
            JobState::Failed { code } => Err(TrainerError::ProcessExit {
                program: self.shared.name.clone(),
                code,
            }),
            _ => Err(TrainerError::ProcessExit {
                program: self.shared.name.clone(),
                code: None,
            }),
        }
    }
}

/// Launches jobs and keeps track of the ones it started.
#[derive(Default)]
pub struct JobSupervisor {
    next_id: AtomicU64,
    jobs: Mutex<Vec<JobHandle>>,
}

impl JobSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `command` in `working_dir` (or the current directory).
    ///
    /// Returns once the process is running; output is drained on background
    /// threads. A program that cannot be found fails with `NotFound`.
    pub fn launch(
        &self,
        command: &ToolCommand,
        working_dir: Option<&Path>,
    ) -> Result<JobHandle, TrainerError> {
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let shared = Arc::new(Shared::new(id, command.name()));

        // One pipe for both streams keeps stdout and stderr lines in the
        // order the child wrote them.
        let (output, output_writer) = io::pipe()?;
        let mut cmd = command.to_command(working_dir, output_writer)?;
        let spawned = cmd.spawn();
        // The command still owns the parent's write ends; EOF needs them closed.
        drop(cmd);
        let child = spawned.map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => TrainerError::not_found("tool", command.program()),
            _ => TrainerError::Spawn {
                program: command.name(),
                source,
            },
        })?;
        info!("Job {} started: {}", id.0, command);

        lock(&shared.child).child = Some(child);
        shared.set_state(JobState::Running);

        if let Err(err) = start_threads(&shared, output) {
            shared.abort();
            return Err(err.into());
        }

        let handle = JobHandle { shared };
        let mut jobs = lock(&self.jobs);
        jobs.retain(|job| !job.state().is_terminal());
        jobs.push(handle.clone());
        Ok(handle)
    }

    pub fn subscribe(&self, handle: &JobHandle) -> Receiver<JobEvent> {
        handle.subscribe()
    }

    pub fn on_line<F>(&self, handle: &JobHandle, on_line: F) -> thread::JoinHandle<()>
    where
        F: FnMut(&str) + Send + 'static,
    {
        handle.on_line(on_line)
    }

    pub fn cancel(&self, handle: &JobHandle) {
        handle.cancel();
    }

    /// Jobs started here that have not finished yet.
    pub fn running(&self) -> Vec<JobHandle> {
        let mut jobs = lock(&self.jobs);
        jobs.retain(|job| !job.state().is_terminal());
        jobs.clone()
    }

    pub fn cancel_all(&self) {
        for job in self.running() {
            job.cancel();
        }
    }
}

/// Start the reader and worker threads of a freshly spawned job.
fn start_threads(shared: &Arc<Shared>, output: PipeReader) -> io::Result<()> {
    let id = shared.id.0;
    let (line_tx, line_rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("job-{id}-output"))
        .spawn(move || read_lines(output, line_tx))?;

    let worker = Arc::clone(shared);
    thread::Builder::new()
        .name(format!("job-{id}"))
        .spawn(move || drive(&worker, line_rx))?;
    Ok(())
}

fn read_lines<R: Read>(stream: R, tx: Sender<String>) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if line.trim().is_empty() {
                    continue;
                }
                if tx.send(line.to_string()).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

/// Worker loop: forward lines until both streams close, then record the exit.
fn drive(shared: &Shared, lines: Receiver<String>) {
    loop {
        match lines.recv_timeout(EXIT_POLL_INTERVAL) {
            Ok(line) => shared.publish_line(line),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                // A killed child may leave descendants holding the pipes open.
                if shared.cancel_requested.load(Ordering::SeqCst)
                    && matches!(shared.poll_exit(), Ok(Some(_)))
                {
                    for line in lines.try_iter() {
                        shared.publish_line(line);
                    }
                    break;
                }
            }
        }
    }

    let exit = loop {
        match shared.poll_exit() {
            Ok(Some(exit)) => break Ok(exit),
            Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
            Err(err) => break Err(err),
        }
    };

    let state = if shared.cancel_requested.load(Ordering::SeqCst) {
        JobState::Killed
    } else {
        match exit {
            Ok(exit) if exit.success() => JobState::Succeeded,
            Ok(exit) => JobState::Failed { code: exit.code() },
            Err(err) => {
                warn!("Job {} could not be waited on: {}", shared.id.0, err);
                JobState::Failed { code: None }
            }
        }
    };

    match state {
        JobState::Failed { code } => warn!(
            "Job {} ({}) failed with code {:?}",
            shared.id.0, shared.name, code
        ),
        _ => info!("Job {} ({}) {}", shared.id.0, shared.name, state.as_str()),
    }
    shared.finish(state);
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn lines_arrive_in_order_then_success() {
        let supervisor = JobSupervisor::new();
        let job = supervisor
            .launch(&sh("echo one; echo two; echo three"), None)
            .expect("launch");

        let events: Vec<JobEvent> = job.subscribe().into_iter().collect();
        assert_eq!(
            events,
            vec![
                JobEvent::Line("one".to_string()),
                JobEvent::Line("two".to_string()),
                JobEvent::Line("three".to_string()),
                JobEvent::Finished(JobState::Succeeded),
            ]
        );
        assert_eq!(job.state(), JobState::Succeeded);
    }

    #[test]
    fn invalid_utf8_is_replaced_and_blank_lines_dropped() {
        let supervisor = JobSupervisor::new();
        let job = supervisor
            .launch(&sh("printf 'a\\377b\\n\\n   \\nend\\n'"), None)
            .expect("launch");
        job.wait();

        let lines: Vec<String> = job
            .subscribe()
            .into_iter()
            .filter_map(|event| match event {
                JobEvent::Line(line) => Some(line),
                JobEvent::Finished(_) => None,
            })
            .collect();
        assert_eq!(lines, vec!["a\u{FFFD}b".to_string(), "end".to_string()]);
    }

    #[test]
    fn non_zero_exit_is_failed_with_code() {
        let supervisor = JobSupervisor::new();
        let job = supervisor.launch(&sh("exit 3"), None).expect("launch");
        assert_eq!(job.wait(), JobState::Failed { code: Some(3) });
        assert!(matches!(
            job.join(),
            Err(TrainerError::ProcessExit { code: Some(3), .. })
        ));
    }

    #[test]
    fn cancel_is_idempotent_and_a_no_op_after_finish() {
        let supervisor = JobSupervisor::new();
        let job = supervisor.launch(&sh("exec sleep 30"), None).expect("launch");
        job.cancel();
        job.cancel();
        assert_eq!(
            job.wait_timeout(Duration::from_secs(10)),
            Some(JobState::Killed)
        );

        job.cancel();
        assert_eq!(job.state(), JobState::Killed);
    }

    #[test]
    fn working_directory_is_honoured() {
        let temp = tempfile::tempdir().expect("create temp dir");
        std::fs::write(temp.path().join("marker.txt"), "here").expect("write marker");

        let supervisor = JobSupervisor::new();
        let job = supervisor
            .launch(&sh("cat marker.txt"), Some(temp.path()))
            .expect("launch");
        job.wait();
        let first = job.subscribe().recv().expect("first event");
        assert_eq!(first, JobEvent::Line("here".to_string()));
    }

    #[test]
    fn abort_kills_and_reaps_the_child() {
        let child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawn sleep");
        let shared = Shared::new(JobId(1), "sleep".to_string());
        lock(&shared.child).child = Some(child);
        shared.set_state(JobState::Running);
        let handle = JobHandle {
            shared: Arc::new(shared),
        };
        let rx = handle.subscribe();

        handle.shared.abort();

        assert_eq!(handle.state(), JobState::Failed { code: None });
        {
            let slot = lock(&handle.shared.child);
            assert!(slot.child.is_none());
            assert!(slot.exit.is_some_and(|exit| !exit.success()));
        }
        assert_eq!(
            rx.recv().expect("finished event"),
            JobEvent::Finished(JobState::Failed { code: None })
        );
    }

    #[test]
    fn missing_program_is_not_found() {
        let supervisor = JobSupervisor::new();
        let err = supervisor
            .launch(&ToolCommand::new("/definitely/not/a/tool"), None)
            .unwrap_err();
        assert!(matches!(err, TrainerError::NotFound { .. }));
    }
}

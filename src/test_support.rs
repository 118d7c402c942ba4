//! Shared fixtures for unit tests.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::api::BackendClient;
use crate::error::{MediaLoadError, TransportError};
use crate::playback::{AudioSource, EventSink, FrameScheduler, FrameTask, HandleId, SourceFactory};
use crate::session::Session;

/// Serve one canned HTTP response on a loopback port. The join handle
/// yields the raw request text.
pub async fn serve_once(
    status_line: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
            if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&request[..end]).to_string();
                let body_len = head
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        let head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status_line,
            content_type,
            body.len()
        );
        sock.write_all(head.as_bytes()).await.unwrap();
        sock.write_all(&body).await.unwrap();
        sock.shutdown().await.ok();
        String::from_utf8_lossy(&request).to_string()
    });
    (format!("http://{}", addr), handle)
}

pub fn client(base_url: &str, session: Session) -> BackendClient {
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    BackendClient::with_http(base_url, session, http)
}

/// What a scripted handle or frame scheduler was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Load(HandleId, String),
    Play(HandleId),
    Pause(HandleId),
    Seek(HandleId, f64),
    Destroy(HandleId),
    FramesStarted(HandleId),
    FramesCancelled(HandleId),
}

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn push(&self, call: Call) {
        self.0.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.0.lock().iter().filter(|c| *c == call).count()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Spy source: records every command and never emits on its own. Tests push
/// events through the sinks collected in [`ScriptedFactory::sinks`].
pub struct ScriptedSource {
    sink: EventSink,
    log: CallLog,
    clock: Arc<Mutex<f64>>,
    fail_load: Option<MediaLoadError>,
    destroyed: bool,
}

impl AudioSource for ScriptedSource {
    fn load(&mut self, url: &str) -> Result<(), MediaLoadError> {
        self.log.push(Call::Load(self.sink.handle(), url.to_string()));
        match self.fail_load.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn play(&mut self) -> Result<(), TransportError> {
        self.log.push(Call::Play(self.sink.handle()));
        Ok(())
    }

    fn pause(&mut self) -> Result<(), TransportError> {
        self.log.push(Call::Pause(self.sink.handle()));
        Ok(())
    }

    fn seek_to(&mut self, fraction: f64) -> Result<(), TransportError> {
        self.log.push(Call::Seek(self.sink.handle(), fraction));
        Ok(())
    }

    fn current_time(&self) -> f64 {
        *self.clock.lock()
    }

    fn duration(&self) -> f64 {
        0.0
    }

    fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            self.log.push(Call::Destroy(self.sink.handle()));
        }
    }
}

#[derive(Clone, Default)]
pub struct ScriptedFactory {
    pub log: CallLog,
    pub sinks: Arc<Mutex<Vec<EventSink>>>,
    /// Value reported by `current_time` on every handle.
    pub clock: Arc<Mutex<f64>>,
    pub fail_load: Option<MediaLoadError>,
}

impl ScriptedFactory {
    /// Sink of the most recently created handle.
    pub fn last_sink(&self) -> EventSink {
        self.sinks.lock().last().cloned().expect("no handle created yet")
    }
}

impl SourceFactory for ScriptedFactory {
    fn create(&mut self, sink: EventSink) -> Box<dyn AudioSource> {
        self.sinks.lock().push(sink.clone());
        Box::new(ScriptedSource {
            sink,
            log: self.log.clone(),
            clock: self.clock.clone(),
            fail_load: self.fail_load.clone(),
            destroyed: false,
        })
    }
}

/// Frame scheduler that never ticks by itself; it only records start/cancel.
pub struct ManualFrames {
    pub log: CallLog,
}

struct ManualFrameTask {
    handle: HandleId,
    log: CallLog,
    cancelled: bool,
}

impl FrameScheduler for ManualFrames {
    fn start(&mut self, sink: EventSink) -> Box<dyn FrameTask> {
        self.log.push(Call::FramesStarted(sink.handle()));
        Box::new(ManualFrameTask {
            handle: sink.handle(),
            log: self.log.clone(),
            cancelled: false,
        })
    }
}

impl FrameTask for ManualFrameTask {
    fn cancel(&mut self) {
        if !self.cancelled {
            self.cancelled = true;
            self.log.push(Call::FramesCancelled(self.handle));
        }
    }
}

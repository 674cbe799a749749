use crossbeam::scope;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use scopeguard::defer_on_unwind;
use uuid::Uuid;

use std::io::{BufRead, Write};
use std::time::Duration;

use log::*;

use crate::analyzer::Analyzer;
use crate::senti::Prediction;
use crate::status::Status;
use crate::{Error, RX_TIMEOUT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Render {
    Text,
    Json,
}

impl Render {
    pub fn prediction(self, prediction: &Prediction) -> Result<String, Error> {
        match self {
            Render::Text => Ok(prediction.to_string()),
            Render::Json => Ok(serde_json::to_string(prediction)?),
        }
    }
}

pub struct Request {
    pub id: Uuid,
    pub text: String,
    pub reply: Sender<Response>,
}

pub struct Response {
    pub id: Uuid,
    pub result: Result<Prediction, Error>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeOptions {
    pub workers: usize,
    pub request_timeout: Duration,
    pub render: Render,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub answered: usize,
    pub failed: usize,
    pub timed_out: usize,
}

/// Reads one text per line from `input` and writes one answer per line to
/// `output`, scoring on a pool of worker threads. An empty line, end of
/// input or a stop on `status` ends the session.
pub fn serve<R, W>(
    analyzer: &Analyzer,
    status: &Status,
    options: ServeOptions,
    input: R,
    output: W,
) -> Result<Summary, Error>
where
    R: BufRead,
    W: Write,
{
    let (send_request, get_request) = unbounded::<Request>();
    for worker in 0..options.workers {
        status.not_ready(&worker_tag(worker));
    }

    scope(|s| {
        for worker in 0..options.workers {
            let get_request = get_request.clone();
            s.spawn(move |_| {
                start_worker(worker_tag(worker), analyzer, status, get_request);
            });
        }

        let result = console(status, &options, input, output, &send_request);
        drop(send_request);
        if result.is_err() {
            status.stop();
        }
        result
    })
    .map_err(|_| Error::WorkerPanicked)?
}

fn worker_tag(worker: usize) -> String {
    format!("worker-{}", worker)
}

fn start_worker(tag: String, analyzer: &Analyzer, status: &Status, get_request: Receiver<Request>) {
    defer_on_unwind! { status.stop(); }
    debug!("{}: Ready", tag);
    status.ready(&tag);

    while status.is_alive() {
        match get_request.recv_timeout(RX_TIMEOUT) {
            Ok(request) => {
                trace!("{}: Handling {}", tag, request.id);
                let result = analyzer.analyze(&request.text);
                let response = Response {
                    id: request.id,
                    result,
                };
                if request.reply.send(response).is_err() {
                    debug!("{}: Nobody waiting for {}", tag, request.id);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    status.not_ready(&tag);
    debug!("{}: Shutting down", tag);
}

fn console<R, W>(
    status: &Status,
    options: &ServeOptions,
    input: R,
    mut output: W,
    send_request: &Sender<Request>,
) -> Result<Summary, Error>
where
    R: BufRead,
    W: Write,
{
    while !status.all_ready() && status.is_alive() {
        std::thread::sleep(Duration::from_millis(10));
    }
    info!("Ready for input");

    let mut summary = Summary::default();
    let mut lines = input.lines();
    while status.is_alive() {
        write!(output, "You: ")?;
        output.flush()?;
        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let text = line.as_str();
        if text.trim().is_empty() {
            break;
        }

        let id = Uuid::new_v4();
        let (reply, get_reply) = bounded::<Response>(1);
        let request = Request {
            id,
            text: text.to_string(),
            reply,
        };
        if send_request.send(request).is_err() {
            error!("No workers left to answer");
            break;
        }

        match get_reply.recv_timeout(options.request_timeout) {
            Ok(Response {
                result: Ok(prediction),
                ..
            }) => {
                status.record_answer();
                summary.answered += 1;
                writeln!(output, "{}", options.render.prediction(&prediction)?)?;
            }
            Ok(Response { id, result: Err(e) }) => {
                status.record_failure();
                summary.failed += 1;
                debug!("Request {} failed: {}", id, e);
                writeln!(output, "Error: {}", e)?;
            }
            Err(RecvTimeoutError::Timeout) => {
                status.record_failure();
                summary.timed_out += 1;
                warn!("Request {} timed out", id);
                writeln!(output, "Error: no answer within {:?}", options.request_timeout)?;
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("Request {} was dropped by its worker", id);
                break;
            }
        }
    }

    info!(
        "Session over: {} answered, {} failed, {} timed out",
        summary.answered, summary.failed, summary.timed_out
    );
    Ok(summary)
}
